//! Request spacing shared across concurrent scan tasks.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces request starts at least `interval` apart.
///
/// The lock is held while waiting, so callers are released one at a time
/// in arrival order.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Wait until the next request slot is free and claim it.
    pub async fn acquire(&self) {
        let mut next_slot = self.next_slot.lock().await;
        if *next_slot > Instant::now() {
            tokio::time::sleep_until(*next_slot).await;
        }
        *next_slot = Instant::now() + self.interval;
    }
}
