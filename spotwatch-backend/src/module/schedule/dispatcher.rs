use chrono::{DateTime, Datelike, DurationRound, TimeDelta, Timelike, Utc};
use spotwatch_common::ScheduleEntry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{parse_time_utc, ScheduleStore};

/// Whether `entry` should fire in the minute containing `now`.
pub fn is_due(entry: &ScheduleEntry, now: DateTime<Utc>) -> bool {
    if !entry.enabled {
        return false;
    }
    if u32::from(entry.dow) != now.weekday().num_days_from_monday() {
        return false;
    }
    match parse_time_utc(&entry.time_utc) {
        Ok((hour, minute)) => now.hour() == hour && now.minute() == minute,
        Err(_) => {
            warn!(
                "Scheduled message '{}' has malformed time '{}'",
                entry.name, entry.time_utc
            );
            false
        }
    }
}

/// Entries due at `now`, in configured order. Stateless; does not deduplicate.
pub fn due_entries(entries: &[ScheduleEntry], now: DateTime<Utc>) -> Vec<&ScheduleEntry> {
    entries.iter().filter(|entry| is_due(entry, now)).collect()
}

/// Once-a-minute evaluator over the schedule file.
///
/// Keeps a per-entry "last fired minute" so a second tick landing in the same
/// minute (after a stall, say) does not send the message twice.
pub struct Dispatcher {
    store: Arc<ScheduleStore>,
    last_fired: HashMap<String, DateTime<Utc>>,
}

impl Dispatcher {
    pub fn new(store: Arc<ScheduleStore>) -> Self {
        Self {
            store,
            last_fired: HashMap::new(),
        }
    }

    /// Reload the schedule and return what should be sent now.
    /// A schedule that cannot be read means nothing is due this tick.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Vec<ScheduleEntry> {
        let entries = match self.store.load().await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to load schedule {:?}: {}", self.store.path(), e);
                return Vec::new();
            }
        };

        let minute = now
            .duration_trunc(TimeDelta::minutes(1))
            .unwrap_or(now);

        let mut due = Vec::new();
        for entry in due_entries(&entries, now) {
            if self.last_fired.get(&entry.name) == Some(&minute) {
                debug!("Scheduled message '{}' already fired at {}", entry.name, minute);
                continue;
            }
            self.last_fired.insert(entry.name.clone(), minute);
            due.push(entry.clone());
        }

        // Forget watermarks for entries that were removed from the file.
        self.last_fired
            .retain(|name, _| entries.iter().any(|e| &e.name == name));

        due
    }
}
