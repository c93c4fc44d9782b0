use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use tokio::{
    sync::watch,
    task::{self, JoinHandle},
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::appsettings::TimerSettings;

/// Answer of a tick callback telling the timer whether to keep firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerControl {
    Continue,
    Stop,
}

/// A periodic timer backed by a tokio task.
///
/// Instances are owned by a [`TimerHost`]; everybody else only gets a [`Weak`] to them.
pub struct RepeatingTimer {
    task: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

impl RepeatingTimer {
    fn spawn<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> TimerControl + Send + 'static,
    {
        let cancellation_token = CancellationToken::new();
        let task_cancellation_token = cancellation_token.clone();
        let first_tick = Instant::now() + interval;

        let task = task::spawn(async move {
            let mut ticker = time::interval_at(first_tick, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = task_cancellation_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if on_tick() == TimerControl::Stop {
                            task_cancellation_token.cancel();
                            break;
                        }
                    }
                }
            }
        });

        Self {
            task,
            cancellation_token,
        }
    }

    /// Stops the timer. No tick is delivered after this returns.
    pub fn invalidate(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_valid(&self) -> bool {
        !self.cancellation_token.is_cancelled()
    }

    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

struct CleanupTask(watch::Sender<()>);

type TimerStore = Mutex<Vec<Arc<RepeatingTimer>>>;

/// Owner of every timer it schedules, the way a run loop owns the timers added to it.
///
/// Must be created inside a tokio runtime. Dropping the host invalidates all of its timers,
/// which leaves the weak references handed out by [`TimerHost::schedule_repeating`] dangling.
pub struct TimerHost {
    tick_interval: Duration,
    timers: Arc<TimerStore>,
    cleanup_task: CleanupTask,
}

impl TimerHost {
    pub fn new(settings: &TimerSettings) -> Self {
        let timers = Arc::new(Mutex::new(Vec::new()));
        let cleanup_task =
            Self::spawn_cleanup_task(Arc::clone(&timers), settings.cleanup_interval());

        Self {
            tick_interval: settings.tick_interval(),
            timers,
            cleanup_task,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Calls `on_tick` once per tick interval, the first time one interval from now, until it
    /// answers [`TimerControl::Stop`] or the timer is invalidated.
    pub fn schedule_repeating<F>(&self, on_tick: F) -> Weak<RepeatingTimer>
    where
        F: FnMut() -> TimerControl + Send + 'static,
    {
        let timer = Arc::new(RepeatingTimer::spawn(self.tick_interval, on_tick));
        let weak_timer = Arc::downgrade(&timer);
        lock_timers(&self.timers).push(timer);

        weak_timer
    }

    /// Number of timers that are still firing.
    pub fn active_timers(&self) -> usize {
        lock_timers(&self.timers)
            .iter()
            .filter(|timer| timer.is_valid())
            .count()
    }

    pub fn invalidate_all(&self) {
        for timer in lock_timers(&self.timers).iter() {
            timer.invalidate();
        }
    }

    fn spawn_cleanup_task(timers: Arc<TimerStore>, cleanup_interval: Duration) -> CleanupTask {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(());
        task::spawn(async move {
            loop {
                tokio::select! {
                    _ = time::sleep(cleanup_interval) => {
                        Self::clean_finished_timers(&timers);
                    }
                    _ = shutdown_rx.changed() => {
                        log::info!("Timer cleanup task shutting down");
                        break;
                    }
                };
            }
        });

        CleanupTask(shutdown_tx)
    }

    fn clean_finished_timers(timers: &TimerStore) {
        let mut timers = lock_timers(timers);
        let before = timers.len();
        timers.retain(|timer| !timer.is_finished());
        let after = timers.len();

        if before != after {
            log::info!("Cleaned up {} finished timers", before - after);
        }
    }
}

impl Drop for TimerHost {
    fn drop(&mut self) {
        self.invalidate_all();
        let _ = self.cleanup_task.0.send(());
    }
}

fn lock_timers(timers: &TimerStore) -> MutexGuard<'_, Vec<Arc<RepeatingTimer>>> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}
