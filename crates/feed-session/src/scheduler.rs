//! Proactive credential renewal
//!
//! Spawns a periodic task that probes the access record and refreshes it
//! when it expires within the threshold. The first probe runs immediately
//! at startup; after that the task wakes once per interval and does nothing
//! unless a session exists and its credential is close to expiry. The
//! manager aborts the task on `dispose()` so no timer outlives the process
//! teardown.

use std::time::Duration;

use feed_auth::{StoredToken, now_millis};
use tracing::{debug, warn};

use crate::manager::SessionManager;

/// Lead time before expiry at which renewal is triggered.
pub const DEFAULT_EXPIRY_THRESHOLD: Duration = Duration::from_secs(300);

/// How often the scheduler probes the access record.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Whether a record needs renewal within `threshold`.
///
/// An absent record counts as expiring — there is nothing left to present.
pub fn is_expiring_soon(record: Option<&StoredToken>, threshold: Duration) -> bool {
    match record {
        None => true,
        Some(record) => record.expires <= now_millis() + threshold.as_millis() as u64,
    }
}

/// Spawn the background renewal task.
///
/// Returns the `JoinHandle` the manager aborts on `dispose()`.
pub(crate) fn spawn_refresh_task(
    manager: SessionManager,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        // The first tick fires immediately: one eager check at startup.
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match manager.check_and_refresh().await {
                Ok(true) => {}
                Ok(false) => debug!("no session to keep alive"),
                Err(e) => warn!(error = %e, "scheduled credential renewal failed"),
            }
        }
    })
}
