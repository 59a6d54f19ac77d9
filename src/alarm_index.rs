// Pending-alarm ledger for hosts without a system alarm service (desktop).
//
// The index file (alarm_index.json) holds every registered reminder, sorted by
// trigger time, so the host loop can sleep until the next one and fire what is
// due without recomputing any prayer times.
//
// ⚠️ VERSION BUMP REQUIRED:
// Changes to AlarmIndex or AlarmIndexEntry require incrementing INDEX_VERSION so
// stale files are discarded instead of misread.

use crate::context::{AppContext, SharedContext};
use crate::model::{PrayerEvent, ScheduledAlarm};
use crate::storage::FileStore;
use crate::timer::{TimerMode, TimerService};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const INDEX_VERSION: u32 = 1;

/// Alarms missed by less than this (host asleep, process down) still fire.
pub const GRACE_PERIOD_MINUTES: i64 = 120;

/// One registered reminder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlarmIndexEntry {
    pub notification_id: u32,

    /// Unix timestamp in milliseconds when the alarm should fire
    pub trigger_ms: i64,

    pub prayer: PrayerEvent,
    pub day_offset: u32,
    pub title: String,
    pub body: String,

    #[serde(default)]
    pub image_resource: Option<String>,

    #[serde(default)]
    pub extend_horizon: bool,

    /// Registration mode the scheduler asked for.
    #[serde(default)]
    pub exact: bool,
}

impl AlarmIndexEntry {
    pub fn from_alarm(alarm: &ScheduledAlarm, mode: TimerMode) -> Self {
        Self {
            notification_id: alarm.notification_id,
            trigger_ms: alarm.trigger.timestamp_millis(),
            prayer: alarm.kind,
            day_offset: alarm.day_offset,
            title: alarm.title.clone(),
            body: alarm.body.clone(),
            image_resource: alarm.image_resource.clone(),
            extend_horizon: alarm.extend_horizon,
            exact: mode.is_exact(),
        }
    }

    /// Returns `None` if the stored timestamp is out of chrono's range.
    pub fn to_alarm(&self) -> Option<ScheduledAlarm> {
        Some(ScheduledAlarm {
            notification_id: self.notification_id,
            trigger: DateTime::from_timestamp_millis(self.trigger_ms)?,
            kind: self.prayer,
            day_offset: self.day_offset,
            title: self.title.clone(),
            body: self.body.clone(),
            image_resource: self.image_resource.clone(),
            extend_horizon: self.extend_horizon,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmIndex {
    pub version: u32,

    /// Timestamp when this index was last written (for debugging)
    pub last_updated: i64,

    /// Sorted by trigger_ms; at most one entry per notification id.
    pub alarms: Vec<AlarmIndexEntry>,
}

impl Default for AlarmIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            last_updated: Utc::now().timestamp(),
            alarms: Vec::new(),
        }
    }
}

impl AlarmIndex {
    /// Loads the index from disk.
    /// Returns an empty index if the file doesn't exist, is corrupted, or has
    /// another version.
    pub fn load(ctx: &dyn AppContext) -> Self {
        let loaded = ctx
            .get_alarm_index_path()
            .and_then(|path| FileStore::read_locked(&path))
            .and_then(|content| match content {
                Some(json) => Ok(Some(serde_json::from_str::<AlarmIndex>(&json)?)),
                None => Ok(None),
            });

        match loaded {
            Ok(Some(index)) if index.version == INDEX_VERSION => index,
            Ok(Some(index)) => {
                log::warn!(
                    "Discarding alarm index version {} (expected {})",
                    index.version,
                    INDEX_VERSION
                );
                Self::default()
            }
            Ok(None) => Self::default(),
            Err(e) => {
                log::warn!("Alarm index unreadable, starting empty: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&mut self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_alarm_index_path()?;
        self.last_updated = Utc::now().timestamp();
        let json = serde_json::to_string_pretty(&self)?;
        FileStore::write_locked(&path, json)
    }

    /// Inserts `entry`, replacing any entry with the same notification id.
    pub fn upsert(&mut self, entry: AlarmIndexEntry) {
        self.alarms
            .retain(|a| a.notification_id != entry.notification_id);
        let pos = self
            .alarms
            .partition_point(|a| a.trigger_ms <= entry.trigger_ms);
        self.alarms.insert(pos, entry);
    }

    /// Returns true if an entry was removed.
    pub fn remove(&mut self, notification_id: u32) -> bool {
        let before = self.alarms.len();
        self.alarms.retain(|a| a.notification_id != notification_id);
        self.alarms.len() != before
    }

    pub fn contains(&self, notification_id: u32) -> bool {
        self.alarms
            .iter()
            .any(|a| a.notification_id == notification_id)
    }

    /// Alarms that are due at `now` but not older than the grace period.
    pub fn get_firing_alarms(&self, now: DateTime<Utc>) -> Vec<AlarmIndexEntry> {
        let now_ms = now.timestamp_millis();
        let grace_ms = Duration::minutes(GRACE_PERIOD_MINUTES).num_milliseconds();

        self.alarms
            .iter()
            .filter(|a| a.trigger_ms <= now_ms && now_ms - a.trigger_ms < grace_ms)
            .cloned()
            .collect()
    }

    /// Instant of the first alarm strictly after `now`.
    pub fn next_alarm_time(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let now_ms = now.timestamp_millis();
        self.alarms
            .iter()
            .find(|a| a.trigger_ms > now_ms)
            .and_then(|a| DateTime::from_timestamp_millis(a.trigger_ms))
    }

    /// Drops every alarm that is due at `now` and returns those still within
    /// the grace period. Timers are one-shot, so a fired entry must go.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<AlarmIndexEntry> {
        let firing = self.get_firing_alarms(now);
        let now_ms = now.timestamp_millis();
        let dropped = self.alarms.len();
        self.alarms.retain(|a| a.trigger_ms > now_ms);
        let stale = dropped - self.alarms.len() - firing.len();
        if stale > 0 {
            log::info!("Dropped {} alarm(s) missed beyond the grace period", stale);
        }
        firing
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }
}

/// `TimerService` that persists registrations to the alarm index file.
/// Every mutation is written through immediately.
#[derive(Debug)]
pub struct IndexedTimerService {
    ctx: SharedContext,
    index: AlarmIndex,
    exact_permitted: bool,
}

impl IndexedTimerService {
    pub fn open(ctx: SharedContext, exact_permitted: bool) -> Self {
        let index = AlarmIndex::load(ctx.as_ref());
        Self {
            ctx,
            index,
            exact_permitted,
        }
    }

    pub fn index(&self) -> &AlarmIndex {
        &self.index
    }

    /// Picks up registrations written by another process (e.g. the CLI while
    /// the host loop sleeps).
    pub fn reload(&mut self) {
        self.index = AlarmIndex::load(self.ctx.as_ref());
    }

    /// Removes due alarms from the ledger and returns those that should fire.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Result<Vec<ScheduledAlarm>> {
        let due = self.index.take_due(now);
        self.index.save(self.ctx.as_ref())?;
        Ok(due.iter().filter_map(AlarmIndexEntry::to_alarm).collect())
    }
}

impl TimerService for IndexedTimerService {
    fn exact_alarms_permitted(&self) -> bool {
        self.exact_permitted
    }

    fn schedule_at(&mut self, alarm: &ScheduledAlarm, mode: TimerMode) -> Result<()> {
        self.index.upsert(AlarmIndexEntry::from_alarm(alarm, mode));
        self.index.save(self.ctx.as_ref())
    }

    fn cancel(&mut self, notification_id: u32) -> Result<()> {
        if self.index.remove(notification_id) {
            self.index.save(self.ctx.as_ref())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;
    use std::sync::Arc;

    fn entry(id: u32, trigger: DateTime<Utc>) -> AlarmIndexEntry {
        AlarmIndexEntry {
            notification_id: id,
            trigger_ms: trigger.timestamp_millis(),
            prayer: PrayerEvent::Dhuhr,
            day_offset: 0,
            title: "Time for Dhuhr".to_string(),
            body: "It's time for Dhuhr prayer".to_string(),
            image_resource: None,
            extend_horizon: true,
            exact: true,
        }
    }

    #[test]
    fn test_alarm_index_serialization() {
        let now = Utc::now();
        let mut index = AlarmIndex::default();
        index.upsert(entry(1002, now));

        let json = serde_json::to_string(&index).unwrap();
        let deserialized: AlarmIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.alarms, index.alarms);
    }

    #[test]
    fn test_upsert_replaces_same_id_and_keeps_order() {
        let now = Utc::now();
        let mut index = AlarmIndex::default();
        index.upsert(entry(1002, now + Duration::hours(3)));
        index.upsert(entry(1003, now + Duration::hours(1)));
        index.upsert(entry(1002, now + Duration::hours(2)));

        assert_eq!(index.len(), 2);
        let ids: Vec<u32> = index.alarms.iter().map(|a| a.notification_id).collect();
        assert_eq!(ids, vec![1003, 1002]);
        assert_eq!(
            index.alarms[1].trigger_ms,
            (now + Duration::hours(2)).timestamp_millis()
        );
    }

    #[test]
    fn test_get_firing_alarms_respects_grace_period() {
        let now = Utc::now();
        let mut index = AlarmIndex::default();
        index.upsert(entry(1001, now - Duration::minutes(30)));
        index.upsert(entry(1002, now + Duration::minutes(30)));
        index.upsert(entry(1003, now - Duration::hours(3)));

        let firing = index.get_firing_alarms(now);
        assert_eq!(firing.len(), 1);
        assert_eq!(firing[0].notification_id, 1001);
        let next = index.next_alarm_time(now).unwrap();
        assert_eq!(next.timestamp_millis(), index.alarms[2].trigger_ms);
    }

    #[test]
    fn test_take_due_removes_fired_and_stale() {
        let now = Utc::now();
        let mut index = AlarmIndex::default();
        index.upsert(entry(1001, now - Duration::minutes(5)));
        index.upsert(entry(1003, now - Duration::hours(5)));
        index.upsert(entry(1004, now + Duration::minutes(5)));

        let fired = index.take_due(now);
        assert_eq!(fired.len(), 1);
        assert_eq!(index.len(), 1);
        assert!(index.contains(1004));
    }

    #[test]
    fn test_service_persists_through_reopen() {
        let ctx: SharedContext = Arc::new(TestContext::new());
        let now = Utc::now();
        let alarm = entry(1011, now + Duration::hours(1)).to_alarm().unwrap();

        let mut timers = IndexedTimerService::open(ctx.clone(), false);
        timers.schedule_at(&alarm, TimerMode::AlarmClock).unwrap();

        let reopened = IndexedTimerService::open(ctx.clone(), false);
        assert_eq!(reopened.index().len(), 1);
        assert!(!reopened.index().alarms[0].exact);

        timers.cancel(1011).unwrap();
        timers.cancel(1011).unwrap();
        let reopened = IndexedTimerService::open(ctx, false);
        assert!(reopened.index().is_empty());
    }

    #[test]
    fn test_corrupt_index_loads_empty() {
        let ctx = TestContext::new();
        let path = ctx.get_alarm_index_path().unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert!(AlarmIndex::load(&ctx).is_empty());
    }
}
