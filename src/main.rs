use remind_me_again::{ReminderManager, TimerHost, appsettings::AppSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = AppSettings::new()?;
    let mut manager = ReminderManager::new(TimerHost::new(&settings.timer));

    for reminder_settings in &settings.reminders {
        let mut reminder = reminder_settings.to_reminder();
        reminder.set_on_reminder_period_decremented(|reminder| {
            log::info!(
                "{} in {} minutes. ReminderId {}",
                reminder.description,
                reminder.minutes_remaining_for_next_reminder,
                reminder.id()
            )
        });
        reminder.set_on_reminder_period_finished(|reminder| {
            log::info!("Reminder: {}. ReminderId {}", reminder.description, reminder.id())
        });

        manager.add(reminder)?;
    }

    if manager.is_empty() {
        log::warn!("No reminders configured, nothing to do");
        return Ok(());
    }

    manager.start_all();
    log::info!("Started {} reminders", manager.len());

    tokio::signal::ctrl_c().await?;

    log::info!("Shutting down");
    manager.stop_all();

    Ok(())
}
