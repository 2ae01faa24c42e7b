//! The background TTL expiration scanner.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::collection::{ConcurrentCollection, DashMapCollection};
use crate::time::now_millis;

/// Default scan period when none is configured.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);

/// An explicitly owned worker: started with `start()`, stopped with
/// `shutdown()`. Never an ad-hoc spawned task with no handle back to the
/// owner.
pub struct Cleaner {
    handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Cleaner {
    /// Spawns the scan loop. Consults the collection only through
    /// `list_expired`/`delete_expired`; holds no copy of the data model.
    #[must_use]
    pub fn start(collection: Arc<DashMapCollection>, period: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let notify = collection.notify_handle();
        let next_deadline = collection.next_deadline_handle();

        let handle = tokio::spawn(async move {
            loop {
                let sleep_for = next_sleep_duration(period, next_deadline.load(Ordering::Relaxed));

                tokio::select! {
                    () = tokio::time::sleep(sleep_for) => {}
                    () = notify.notified() => {
                        debug!("cleaner nudged by a shorter TTL insert");
                    }
                    _ = shutdown_rx.changed() => {}
                }

                if *shutdown_rx.borrow() {
                    break;
                }

                let expired = collection.list_expired();
                if !expired.is_empty() {
                    debug!(count = expired.len(), "sweeping expired entries");
                }
                for obj in expired {
                    collection.delete_expired(&obj.key);
                }
            }
            info!("cleaner stopped");
        });

        Self { handle: Some(handle), shutdown_tx }
    }

    /// Signals the loop to exit after its current pass and waits for it.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// `min(period, time until the next known deadline)`, clamped to be
/// non-negative. A deadline of `0` means "none known".
fn next_sleep_duration(period: Duration, deadline_millis: i64) -> Duration {
    if deadline_millis == 0 {
        return period;
    }
    let remaining_millis = deadline_millis - now_millis();
    if remaining_millis <= 0 {
        return Duration::from_millis(0);
    }
    period.min(Duration::from_millis(remaining_millis as u64))
}
