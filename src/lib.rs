pub mod appsettings;
pub mod reminder;
pub mod scheduling;

pub use reminder::{
    Reminder, ReminderCallback, ReminderId, RepeatPolicy, SharedReminder, TickOutcome,
};
pub use scheduling::{ReminderManager, RepeatingTimer, TimerControl, TimerHost};
