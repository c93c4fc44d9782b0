use std::collections::{HashMap, hash_map::Entry};

use crate::reminder::{Reminder, ReminderId, SharedReminder};

use super::timer::TimerHost;

/// Owns a set of reminders together with the timer host driving them.
pub struct ReminderManager {
    timer_host: TimerHost,
    reminders: HashMap<ReminderId, SharedReminder>,
}

impl ReminderManager {
    pub fn new(timer_host: TimerHost) -> Self {
        Self {
            timer_host,
            reminders: HashMap::new(),
        }
    }

    pub fn timer_host(&self) -> &TimerHost {
        &self.timer_host
    }

    pub fn add(&mut self, reminder: Reminder) -> anyhow::Result<SharedReminder> {
        match self.reminders.entry(reminder.id().clone()) {
            Entry::Vacant(e) => {
                log::info!("Registered reminder {}", e.key());
                let shared = SharedReminder::new(reminder);
                e.insert(shared.clone());
                Ok(shared)
            }
            Entry::Occupied(e) => anyhow::bail!("Reminder {} is already registered", e.key()),
        }
    }

    pub fn get(&self, id: &ReminderId) -> Option<&SharedReminder> {
        self.reminders.get(id)
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<ReminderId> {
        let mut ids: Vec<_> = self.reminders.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }

    pub fn remove(&mut self, id: &ReminderId) -> anyhow::Result<SharedReminder> {
        let Some(reminder) = self.reminders.remove(id) else {
            anyhow::bail!("No such reminder {id}")
        };
        reminder.stop();
        log::info!("Removed reminder {id}");

        Ok(reminder)
    }

    pub fn start(&self, id: &ReminderId) -> anyhow::Result<()> {
        self.existing(id)?.start(&self.timer_host);
        Ok(())
    }

    pub fn stop(&self, id: &ReminderId) -> anyhow::Result<()> {
        self.existing(id)?.stop();
        Ok(())
    }

    pub fn is_running(&self, id: &ReminderId) -> anyhow::Result<bool> {
        Ok(self.existing(id)?.is_running())
    }

    pub fn start_all(&self) {
        for reminder in self.reminders.values() {
            reminder.start(&self.timer_host);
        }
    }

    pub fn stop_all(&self) {
        for reminder in self.reminders.values() {
            reminder.stop();
        }
    }

    fn existing(&self, id: &ReminderId) -> anyhow::Result<&SharedReminder> {
        self.reminders
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("No such reminder {id}"))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use crate::appsettings::TimerSettings;

    use super::*;

    const TICK: Duration = Duration::from_secs(60);

    fn manager() -> ReminderManager {
        ReminderManager::new(TimerHost::new(&TimerSettings::default()))
    }

    fn reminder(id: &str, period: u32) -> Reminder {
        let mut reminder = Reminder::new(ReminderId::from(id));
        reminder.reminder_period = period;
        reminder
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_ids_are_rejected() {
        let mut manager = manager();

        manager.add(reminder("water", 5)).unwrap();
        let result = manager.add(reminder("water", 10));

        assert!(result.is_err());
        assert_eq!(manager.len(), 1);
        let water = manager.get(&ReminderId::from("water")).unwrap();
        assert_eq!(water.lock().reminder_period, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_ids_are_errors() {
        let mut manager = manager();
        let id = ReminderId::from("missing");

        assert!(manager.start(&id).is_err());
        assert!(manager.stop(&id).is_err());
        assert!(manager.is_running(&id).is_err());
        assert!(manager.remove(&id).is_err());
        assert!(manager.get(&id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_by_id() {
        let mut manager = manager();
        let id = ReminderId::from("water");
        manager.add(reminder("water", 5)).unwrap();

        manager.start(&id).unwrap();
        assert!(manager.is_running(&id).unwrap());
        assert_eq!(manager.timer_host().active_timers(), 1);

        manager.stop(&id).unwrap();
        assert!(!manager.is_running(&id).unwrap());
        assert_eq!(manager.timer_host().active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn removed_reminder_is_stopped() {
        let mut manager = manager();
        let id = ReminderId::from("water");
        manager.add(reminder("water", 5)).unwrap();
        manager.start(&id).unwrap();

        let removed = manager.remove(&id).unwrap();

        assert!(!removed.is_running());
        assert!(manager.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_all_counts_every_reminder_down() {
        let mut manager = manager();
        let finished = Arc::new(AtomicUsize::new(0));

        for (id, period) in [("water", 1), ("stretch", 2), ("walk", 3)] {
            let mut reminder = reminder(id, period);
            let finished = Arc::clone(&finished);
            reminder.set_on_reminder_period_finished(move |_| {
                finished.fetch_add(1, Ordering::SeqCst);
            });
            manager.add(reminder).unwrap();
        }

        manager.start_all();
        tokio::time::sleep(TICK * 2 + Duration::from_secs(1)).await;

        assert_eq!(finished.load(Ordering::SeqCst), 2);
        assert!(manager.is_running(&ReminderId::from("walk")).unwrap());

        manager.stop_all();
        tokio::time::sleep(TICK * 2).await;

        assert_eq!(finished.load(Ordering::SeqCst), 2);
        assert_eq!(manager.timer_host().active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ids_are_sorted() {
        let mut manager = manager();
        manager.add(reminder("walk", 1)).unwrap();
        manager.add(reminder("water", 1)).unwrap();
        manager.add(reminder("stretch", 1)).unwrap();

        let ids: Vec<_> = manager.ids().iter().map(|id| id.to_string()).collect();

        assert_eq!(ids, vec!["stretch", "walk", "water"]);
    }
}
