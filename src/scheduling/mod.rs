mod manager;
pub mod timer;

pub use manager::ReminderManager;
pub use timer::{RepeatingTimer, TimerControl, TimerHost};
