//! Runtime core: handles, registry, resources and their workers.
//!
//! The only public API from this module is [`Lifecycle`] (plus its builder and
//! the value types it hands out: [`Handle`], [`ResourceState`]).
//!
//! Internal modules:
//! - [`handle`]: opaque positive integer identifying a resource;
//! - [`registry`]: append-only handle → `Weak<Resource>` table;
//! - [`resource`]: cancellation flag and state machine of one resource;
//! - [`worker`]: the poll-and-sleep loop on a detached thread;
//! - [`lifecycle`]: `open` / `close`;
//! - [`builder`]: wires subscribers onto the event bus.

mod builder;
mod handle;
mod lifecycle;
mod registry;
mod resource;
mod worker;

pub use builder::LifecycleBuilder;
pub use handle::Handle;
pub use lifecycle::Lifecycle;
pub use resource::ResourceState;
