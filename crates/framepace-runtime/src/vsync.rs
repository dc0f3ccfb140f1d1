//! Simulated display refresh
//!
//! Posts the frame signal once per refresh period. Posts coalesce in the
//! signal, so a render task that falls behind sees one pending frame (or up
//! to the configured count) rather than a growing backlog.

use std::sync::Arc;

use framepace_core::Signal;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Debug)]
pub struct VsyncTicker {
    frame: Arc<Signal>,
    period: Duration,
}

impl VsyncTicker {
    pub fn new(frame: Arc<Signal>, period: Duration) -> Self {
        Self { frame, period }
    }

    /// Tick until the frame signal is closed
    pub async fn run(self) {
        info!(period_us = self.period.as_micros() as u64, "Vsync ticker starting");
        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut coalesced = 0u64;
        while !self.frame.is_closed() {
            ticker.tick().await;
            if !self.frame.post() {
                coalesced += 1;
            }
        }

        debug!(coalesced, "frame posts coalesced");
        info!("Vsync ticker stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticker_posts_frames_until_closed() {
        let frame = Arc::new(Signal::binary("frame", false));
        let handle = VsyncTicker::new(frame.clone(), Duration::from_millis(16)).spawn();

        for _ in 0..3 {
            frame.wait(Some(Duration::from_millis(50))).await.unwrap();
        }

        frame.close();
        time::timeout(Duration::from_millis(50), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
