use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::reminder::{RepeatPolicy, Reminder, ReminderId};

const DEFAULT_TICK_INTERVAL_SECS: u64 = 60;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TimerSettings {
    /// Length of one tick. A reminder period is counted in ticks, so this is one minute
    /// outside of tests and demos.
    pub tick_interval_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl TimerSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReminderSettings {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub period_minutes: u32,
    #[serde(default)]
    pub repeat: RepeatPolicy,
}

impl ReminderSettings {
    pub fn to_reminder(&self) -> Reminder {
        let mut reminder = Reminder::new(ReminderId::new(self.id.clone()));
        reminder.description = self.description.clone();
        reminder.reminder_period = self.period_minutes;
        reminder.repeat = self.repeat;

        reminder
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub timer: TimerSettings,
    #[serde(default)]
    pub reminders: Vec<ReminderSettings>,
}

impl AppSettings {
    pub fn new() -> anyhow::Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name("appsettings").required(true))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let settings: AppSettings = settings.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for reminder in &self.reminders {
            anyhow::ensure!(
                reminder.period_minutes > 0,
                "Reminder {} must have a positive period",
                reminder.id
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn parse(toml: &str) -> AppSettings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let settings = parse("");

        assert_eq!(settings.timer, TimerSettings::default());
        assert_eq!(settings.timer.tick_interval(), Duration::from_secs(60));
        assert!(settings.reminders.is_empty());
    }

    #[test]
    fn reminders_are_read_with_repeat_policy() {
        let settings = parse(
            r#"
            [timer]
            tick_interval_secs = 1

            [[reminders]]
            id = "water"
            description = "Drink some water"
            period_minutes = 30
            repeat = "repeat"

            [[reminders]]
            id = "stretch"
            period_minutes = 45
            "#,
        );

        assert_eq!(settings.timer.tick_interval_secs, 1);
        assert_eq!(settings.timer.cleanup_interval_secs, DEFAULT_CLEANUP_INTERVAL_SECS);
        assert_eq!(settings.reminders.len(), 2);
        assert_eq!(settings.reminders[0].repeat, RepeatPolicy::Repeat);
        assert_eq!(settings.reminders[1].repeat, RepeatPolicy::Once);
        assert_eq!(settings.reminders[1].description, "");
    }

    #[test]
    fn reminder_settings_build_a_stopped_reminder() {
        let settings = ReminderSettings {
            id: "water".to_owned(),
            description: "Drink some water".to_owned(),
            period_minutes: 30,
            repeat: RepeatPolicy::Repeat,
        };

        let reminder = settings.to_reminder();

        assert_eq!(reminder.id().as_str(), "water");
        assert_eq!(reminder.description, "Drink some water");
        assert_eq!(reminder.reminder_period, 30);
        assert_eq!(reminder.minutes_remaining_for_next_reminder, 0);
        assert_eq!(reminder.repeat, RepeatPolicy::Repeat);
        assert!(!reminder.is_running());
    }

    #[test]
    fn zero_period_is_rejected() {
        let settings = parse(
            r#"
            [[reminders]]
            id = "broken"
            period_minutes = 0
            "#,
        );

        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let settings = TimerSettings {
            tick_interval_secs: 0,
            cleanup_interval_secs: 0,
        };

        assert_eq!(settings.tick_interval(), Duration::from_secs(1));
        assert_eq!(settings.cleanup_interval(), Duration::from_secs(1));
    }
}
