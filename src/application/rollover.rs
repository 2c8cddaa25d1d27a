use crate::application::planner::NowProvider;
use crate::domain::window::next_rollover;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Small buffer added past the boundary so the wakeup lands strictly
/// after it even with coarse timers.
const ROLLOVER_BUFFER_MS: u64 = 50;

/// Handle to a background timer. Cancelling (or dropping) the handle
/// aborts the underlying task, so replacing a timer never leaks the
/// old one.
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// How long to sleep from `now` until just past the next day boundary.
pub fn rollover_wait(now: DateTime<Utc>) -> Duration {
    let millis = (next_rollover(now) - now).num_milliseconds().max(0) as u64;
    Duration::from_millis(millis + ROLLOVER_BUFFER_MS)
}

/// Fires `on_rollover` just after every 4 AM day boundary, re-arming
/// itself against the clock each time rather than assuming a fixed
/// 24-hour period.
pub fn spawn_rollover_task<F>(now_provider: NowProvider, on_rollover: F) -> ScheduledTask
where
    F: Fn() + Send + Sync + 'static,
{
    let handle = tokio::spawn(async move {
        loop {
            let wait = rollover_wait((now_provider)());
            sleep(wait).await;
            on_rollover();
        }
    });
    ScheduledTask { handle }
}

/// Fires `on_tick` at a fixed period, for current-time indicators.
pub fn spawn_clock_tick_task<F>(period: Duration, on_tick: F) -> ScheduledTask
where
    F: Fn() + Send + Sync + 'static,
{
    let handle = tokio::spawn(async move {
        loop {
            sleep(period).await;
            on_tick();
        }
    });
    ScheduledTask { handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn wait_reaches_just_past_the_next_boundary() {
        let now = fixed_time("2026-03-02T01:30:00Z");
        // 2.5 hours to 4 AM, plus the buffer.
        assert_eq!(
            rollover_wait(now),
            Duration::from_millis(2 * 3600 * 1000 + 30 * 60 * 1000 + ROLLOVER_BUFFER_MS)
        );

        let after = fixed_time("2026-03-02T04:00:00Z");
        assert_eq!(
            rollover_wait(after),
            Duration::from_millis(24 * 3600 * 1000 + ROLLOVER_BUFFER_MS)
        );
    }

    #[tokio::test]
    async fn tick_task_fires_repeatedly_until_cancelled() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let task = spawn_clock_tick_task(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(55)).await;
        task.cancel();
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected repeated ticks, saw {seen}");

        tokio::time::sleep(Duration::from_millis(30)).await;
        // At most one tick could have been mid-flight at cancel time.
        assert!(ticks.load(Ordering::SeqCst) <= seen + 1);
    }

    #[tokio::test]
    async fn dropping_the_handle_aborts_the_task() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        {
            let _task = spawn_clock_tick_task(Duration::from_millis(10), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }
}
