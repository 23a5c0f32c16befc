//! Restartable one-shot deadlines for the service loop.

use std::time::Duration;

use tokio::time::Instant;

/// A deadline that re-arming pushes back.
///
/// Each call to [`arm`](Self::arm) replaces the previous deadline, so a burst
/// of triggers fires once, `delay` after the last of them.
#[derive(Debug, Default)]
pub struct DebounceTimer {
    deadline: Option<Instant>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarms the timer if it has expired at `now`.
    pub fn take_expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(at) if at <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Sleeps until `deadline`; never resolves when there is none.
pub async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn rearming_coalesces_a_burst() {
        let delay = Duration::from_millis(100);
        let mut timer = DebounceTimer::new();
        let mut fired = 0usize;

        for _ in 0..5 {
            timer.arm(Instant::now(), delay);
            advance(Duration::from_millis(10)).await;
            if timer.take_expired(Instant::now()) {
                fired += 1;
            }
        }
        assert_eq!(fired, 0, "still inside the quiet window");

        advance(Duration::from_millis(150)).await;
        if timer.take_expired(Instant::now()) {
            fired += 1;
        }
        assert_eq!(fired, 1, "burst should collapse to one firing");
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn cancelled_timer_never_fires() {
        let mut timer = DebounceTimer::new();
        timer.arm(Instant::now(), Duration::from_millis(50));
        timer.cancel();
        advance(Duration::from_millis(100)).await;
        assert!(!timer.take_expired(Instant::now()));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn wait_for_resolves_at_deadline() {
        let at = Instant::now() + Duration::from_millis(30);
        wait_for(Some(at)).await;
        assert!(Instant::now() >= at);
    }
}
