//! Per-second submission pacing.
//!
//! Submissions are not delayed individually. After every `rate` submissions
//! the pacer sleeps until the next whole second of a grid anchored at its
//! creation, so time spent inside slow calls is absorbed and the average
//! rate does not drift. A window that already overran its second does not
//! let the next window burst to catch up.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
pub struct SecondPacer {
    rate: u32,
    anchor: Instant,
    in_window: u32,
    /// Grid seconds consumed so far.
    windows: u64,
}

impl SecondPacer {
    /// Start a grid now. A zero rate is treated as one per second.
    pub fn new(rate: u32) -> Self {
        Self {
            rate: rate.max(1),
            anchor: Instant::now(),
            in_window: 0,
            windows: 0,
        }
    }

    /// Record one submission; sleeps when the current window is full.
    pub async fn tick(&mut self) {
        self.in_window += 1;
        if self.in_window >= self.rate {
            self.close_window().await;
        }
    }

    /// Wait out a trailing partial window.
    pub async fn settle(&mut self) {
        if self.in_window > 0 {
            self.close_window().await;
        }
    }

    /// Time since the grid was anchored.
    pub fn elapsed(&self) -> Duration {
        self.anchor.elapsed()
    }

    async fn close_window(&mut self) {
        self.in_window = 0;
        let overrun = self.anchor.elapsed().as_secs() + 1;
        self.windows = (self.windows + 1).max(overrun);
        sleep_until(self.anchor + Duration::from_secs(self.windows)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_full_windows_take_whole_seconds() {
        let mut pacer = SecondPacer::new(5);
        for _ in 0..20 {
            pacer.tick().await;
        }
        pacer.settle().await;
        assert_eq!(pacer.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_window_is_settled() {
        let mut pacer = SecondPacer::new(5);
        for _ in 0..7 {
            pacer.tick().await;
        }
        assert_eq!(pacer.elapsed(), Duration::from_secs(1));
        pacer.settle().await;
        assert_eq!(pacer.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_calls_are_absorbed() {
        let mut pacer = SecondPacer::new(2);
        // 300ms per call: a window of two calls fits inside its second.
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(300)).await;
            pacer.tick().await;
        }
        assert_eq!(pacer.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_moves_to_next_boundary() {
        let mut pacer = SecondPacer::new(1);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        pacer.tick().await;
        assert_eq!(pacer.elapsed(), Duration::from_secs(3));
        pacer.tick().await;
        assert_eq!(pacer.elapsed(), Duration::from_secs(4));
    }
}
