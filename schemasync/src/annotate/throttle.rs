use std::time::Duration;

use tokio::time::Instant;

/// Fixed minimum idle gap between consecutive calls, measured from the end of
/// one call to the start of the next. No bursts, no adaptation.
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    last_done: Option<Instant>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_done: None,
        }
    }

    /// Wait until `delay` has passed since the previous call finished. The
    /// first call never waits.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_done {
            tokio::time::sleep_until(last + self.delay).await;
        }
    }

    /// Mark the end of a call, whatever its outcome.
    pub fn done(&mut self) {
        self.last_done = Some(Instant::now());
    }
}
