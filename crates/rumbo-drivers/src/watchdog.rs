//! Stuck-driver watchdog.
//!
//! A driver can win the availability flip here yet lose the assignment at
//! the orders service (another driver's accept event arrived first). The
//! loser stays `en_servicio` with no assignment and would be stranded
//! forever. This sweep flips any driver whose acceptance has gone
//! unconfirmed past the grace period back to `disponible`.

use sqlx::PgPool;
use tokio::time::{Duration, interval};
use tracing::{info, warn};

use crate::repo;

/// Run the watchdog sweep forever.
///
/// Spawned as a task at service startup; only ends with the process.
pub async fn run(pool: PgPool, grace_secs: u64, interval_secs: u64) {
    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
    info!(grace_secs, interval_secs, "assignment watchdog started");

    loop {
        ticker.tick().await;
        match repo::reset_stale_unconfirmed(&pool, grace_secs as f64).await {
            Ok(reset) => {
                for driver_id in reset {
                    warn!(
                        driver_id = %driver_id,
                        grace_secs,
                        "driver stuck en_servicio without confirmed assignment, reset to disponible"
                    );
                }
            },
            Err(sweep_error) => {
                warn!(%sweep_error, "watchdog sweep failed");
            },
        }
    }
}
