//! One-shot, cancellable retraction timer.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Runs a callback once after a delay unless cancelled first.
///
/// Dropping the timer cancels it. Cancellation aborts the sleeping task, so a
/// cancelled timer never fires; a callback that already started runs to
/// completion and must detect for itself that it is stale.
#[derive(Debug)]
pub struct RetractionTimer {
    deadline: Instant,
    task: Option<JoinHandle<()>>,
}

impl RetractionTimer {
    /// Arm a timer on `runtime` that calls `on_fire` after `delay`.
    pub fn arm<F>(runtime: &Handle, delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire();
        });
        Self {
            deadline,
            task: Some(task),
        }
    }

    /// Cancel the timer. Calling this more than once is harmless.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether the timer can still fire.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Time left until the timer fires.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

impl Drop for RetractionTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicU32>, impl FnOnce() + Send + 'static) {
        let fired = Arc::new(AtomicU32::new(0));
        let clone = Arc::clone(&fired);
        (fired, move || {
            clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (fired, on_fire) = counter();
        let timer = RetractionTimer::arm(&Handle::current(), Duration::from_secs(5), on_fire);
        assert!(timer.is_armed());
        assert_eq!(timer.remaining(), Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
        assert_eq!(timer.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (fired, on_fire) = counter();
        let mut timer = RetractionTimer::arm(&Handle::current(), Duration::from_secs(5), on_fire);

        tokio::time::sleep(Duration::from_secs(1)).await;
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (fired, on_fire) = counter();
        let timer = RetractionTimer::arm(&Handle::current(), Duration::from_secs(1), on_fire);
        drop(timer);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
