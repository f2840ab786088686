//! # Example: open_close
//!
//! Opens one resource, lets it run for a second, closes it and waits another
//! second so the early exit and destruction show up in the log.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► open()            → "Resource 1 constructed", worker starts
//!   ├─► sleep 1s          → worker logs "Still running..." every 100ms
//!   ├─► close(1)          → worker sees the flag on its next poll, exits early
//!   ├─► sleep 1s          → "Resource 1 destructed"
//!   ├─► close(1) again    → "Resource 1 has already been deleted"
//!   └─► close(999)        → "Resource 999 was never opened"
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example open_close
//! ```

use std::{sync::Arc, time::Duration};

use handlevisor::{Config, Lifecycle, LogWriter, Subscribe};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let lc = Lifecycle::builder(Config::default())
        .with_subscribers(subs)
        .build()?;

    let h = lc.open()?;
    LogWriter::note(format!("Opened resource {h}, waiting for 1 second"));
    tokio::time::sleep(Duration::from_secs(1)).await;

    LogWriter::note(format!("Closing resource {h}, waiting for 1 second"));
    lc.close(h);
    tokio::time::sleep(Duration::from_secs(1)).await;

    lc.close(h);
    lc.close(999u64);
    tokio::time::sleep(Duration::from_millis(100)).await;

    LogWriter::note("Exiting");
    Ok(())
}
