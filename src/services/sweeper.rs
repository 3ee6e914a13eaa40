//! Periodic booking status sweep

use std::time::Duration;

use tokio::task::JoinHandle;

use super::bookings::BookingsService;

/// Run the promotion sweep every `interval` until the runtime shuts down.
///
/// Reads sweep on their own, so this only keeps stored statuses fresh for
/// consumers that read the table directly.
pub fn spawn(bookings: BookingsService, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = bookings.sweep().await {
                tracing::error!("Background booking sweep failed: {}", e);
            }
        }
    })
}
