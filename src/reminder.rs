use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::scheduling::timer::{RepeatingTimer, TimerControl, TimerHost};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReminderId(String);

impl ReminderId {
    pub fn new(inner: impl Into<String>) -> Self {
        Self(inner.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReminderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// What happens once the countdown reaches zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatPolicy {
    /// Stop the timer. Another `start` begins a new countdown.
    #[default]
    Once,
    /// Reset the counter to the full period and keep counting.
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ignored,
    Decremented,
    Finished,
    Restarted,
}

pub type ReminderCallback = Box<dyn Fn(&Reminder) + Send + Sync>;

pub struct Reminder {
    id: ReminderId,
    pub description: String,
    /// Full countdown length in minutes.
    pub reminder_period: u32,
    pub minutes_remaining_for_next_reminder: u32,
    pub repeat: RepeatPolicy,
    repeating_timer: Weak<RepeatingTimer>,
    timer_generation: u64,
    started_at: Option<DateTime<Utc>>,
    on_reminder_period_decremented: Option<ReminderCallback>,
    on_reminder_period_finished: Option<ReminderCallback>,
}

impl Reminder {
    pub fn new(id: ReminderId) -> Self {
        Self {
            id,
            description: String::new(),
            reminder_period: 0,
            minutes_remaining_for_next_reminder: 0,
            repeat: RepeatPolicy::default(),
            repeating_timer: Weak::new(),
            timer_generation: 0,
            started_at: None,
            on_reminder_period_decremented: None,
            on_reminder_period_finished: None,
        }
    }

    pub fn id(&self) -> &ReminderId {
        &self.id
    }

    /// When the current countdown was started, if it ever was.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Called on every tick, after the counter has been decremented.
    pub fn set_on_reminder_period_decremented(
        &mut self,
        callback: impl Fn(&Reminder) + Send + Sync + 'static,
    ) {
        self.on_reminder_period_decremented = Some(Box::new(callback));
    }

    /// Called on the tick that brings the counter to zero.
    pub fn set_on_reminder_period_finished(
        &mut self,
        callback: impl Fn(&Reminder) + Send + Sync + 'static,
    ) {
        self.on_reminder_period_finished = Some(Box::new(callback));
    }

    pub fn is_running(&self) -> bool {
        self.repeating_timer
            .upgrade()
            .is_some_and(|timer| timer.is_valid())
    }

    /// Cancels the timer if there is one. Counters are left as they are.
    pub fn stop(&mut self) {
        if let Some(timer) = self.repeating_timer.upgrade() {
            if timer.is_valid() {
                log::info!(
                    "[STOP] Stopping countdown with {} minutes left. ReminderId {}",
                    self.minutes_remaining_for_next_reminder,
                    self.id
                );
            }
            timer.invalidate();
        }

        self.repeating_timer = Weak::new();
        self.timer_generation += 1;
    }

    pub(crate) fn tick(&mut self) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Ignored;
        }

        self.minutes_remaining_for_next_reminder =
            self.minutes_remaining_for_next_reminder.saturating_sub(1);

        if let Some(callback) = &self.on_reminder_period_decremented {
            callback(&*self);
        }

        if self.minutes_remaining_for_next_reminder > 0 {
            return TickOutcome::Decremented;
        }

        log::info!("[FINISHED] Reminder period elapsed. ReminderId {}", self.id);

        if let Some(callback) = &self.on_reminder_period_finished {
            callback(&*self);
        }

        match self.repeat {
            RepeatPolicy::Repeat if self.reminder_period > 0 => {
                self.minutes_remaining_for_next_reminder = self.reminder_period;
                TickOutcome::Restarted
            }
            RepeatPolicy::Repeat => {
                log::warn!(
                    "Repeating reminder lost its period, stopping. ReminderId {}",
                    self.id
                );
                self.stop();
                TickOutcome::Finished
            }
            RepeatPolicy::Once => {
                self.stop();
                TickOutcome::Finished
            }
        }
    }
}

impl fmt::Debug for Reminder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reminder")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("reminder_period", &self.reminder_period)
            .field(
                "minutes_remaining_for_next_reminder",
                &self.minutes_remaining_for_next_reminder,
            )
            .field("repeat", &self.repeat)
            .field("is_running", &self.is_running())
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// A reminder shared between its owner and the timer that drives it.
///
/// The timer task only keeps a weak reference, so dropping every `SharedReminder` stops the
/// countdown on the next tick. Callbacks run while the reminder is locked and must not call
/// back into the same `SharedReminder`.
#[derive(Clone)]
pub struct SharedReminder(Arc<Mutex<Reminder>>);

impl SharedReminder {
    pub fn new(reminder: Reminder) -> Self {
        Self(Arc::new(Mutex::new(reminder)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Reminder> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> ReminderId {
        self.lock().id.clone()
    }

    /// Starts a new countdown of `reminder_period` ticks on `host`.
    ///
    /// Starting a running reminder restarts it. A reminder without a positive period is left
    /// untouched.
    pub fn start(&self, host: &TimerHost) {
        let mut reminder = self.lock();
        if reminder.reminder_period == 0 {
            log::warn!(
                "[START] Ignoring start of reminder without a period. ReminderId {}",
                reminder.id
            );
            return;
        }

        if reminder.is_running() {
            log::info!("[RESTART] Restarting countdown. ReminderId {}", reminder.id);
        }
        reminder.stop();

        reminder.minutes_remaining_for_next_reminder = reminder.reminder_period;
        reminder.started_at = Some(Utc::now());

        let generation = reminder.timer_generation;
        let weak_reminder = Arc::downgrade(&self.0);
        reminder.repeating_timer =
            host.schedule_repeating(move || tick_reminder(&weak_reminder, generation));

        log::info!(
            "[START] Counting down {} minutes. ReminderId {}",
            reminder.reminder_period,
            reminder.id
        );
    }

    pub fn stop(&self) {
        self.lock().stop();
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }
}

impl fmt::Debug for SharedReminder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedReminder").field(&*self.lock()).finish()
    }
}

fn tick_reminder(reminder: &Weak<Mutex<Reminder>>, generation: u64) -> TimerControl {
    let Some(reminder) = reminder.upgrade() else {
        return TimerControl::Stop;
    };
    let mut reminder = reminder.lock().unwrap_or_else(PoisonError::into_inner);

    // A timer replaced by a restart may still be waiting on the lock.
    if reminder.timer_generation != generation {
        return TimerControl::Stop;
    }

    match reminder.tick() {
        TickOutcome::Decremented | TickOutcome::Restarted => TimerControl::Continue,
        TickOutcome::Finished | TickOutcome::Ignored => TimerControl::Stop,
    }
}
