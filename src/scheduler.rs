// Turns a schedule configuration into the concrete set of alarms for the
// rolling horizon, and pushes that set to a timer backend.
use crate::config::ScheduleConfig;
use crate::engine::compute_day_times;
use crate::model::{
    HORIZON_DAYS, MAX_HORIZON_DAYS, PrayerEvent, ScheduledAlarm, horizon_ids, notification_id,
};
use crate::timer::{TimerMode, TimerService};
use anyhow::{Context, Result};
use chrono::{DateTime, Days, Duration, TimeZone, Utc};
use std::collections::HashSet;

pub fn default_title(kind: PrayerEvent) -> String {
    format!("Time for {}", kind.display_name())
}

pub fn default_body(kind: PrayerEvent) -> String {
    format!("It's time for {} prayer", kind.display_name())
}

/// Outcome of pushing a trigger set to the timer backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub mode: TimerMode,
    pub registered: usize,
    /// Previously pending ids that are no longer part of the set.
    pub cancelled: usize,
}

/// Stateless between calls: everything derives from the config, `now` and
/// the zone that defines "today".
#[derive(Debug, Clone)]
pub struct ReminderScheduler<Tz: TimeZone> {
    tz: Tz,
    horizon_days: u32,
}

impl<Tz: TimeZone> ReminderScheduler<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            horizon_days: HORIZON_DAYS,
        }
    }

    /// Horizons longer than `MAX_HORIZON_DAYS` are clamped.
    pub fn with_horizon(mut self, horizon_days: u32) -> Self {
        if horizon_days > MAX_HORIZON_DAYS {
            log::warn!(
                "Horizon of {} days exceeds {}, clamping",
                horizon_days,
                MAX_HORIZON_DAYS
            );
        }
        self.horizon_days = horizon_days.min(MAX_HORIZON_DAYS);
        self
    }

    pub fn tz(&self) -> &Tz {
        &self.tz
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    /// Every alarm of the horizon starting today, sorted by trigger time.
    ///
    /// Triggers at or before `now` are dropped, as are events the sun does
    /// not produce on a given day.
    pub fn build_trigger_set(
        &self,
        config: &ScheduleConfig,
        now: DateTime<Utc>,
        rng: &mut fastrand::Rng,
    ) -> Vec<ScheduledAlarm> {
        let params = config.params();
        let offset = Duration::minutes(config.offset_minutes as i64);
        let today = now.with_timezone(&self.tz).date_naive();

        let mut alarms = Vec::new();
        for day_offset in 0..self.horizon_days {
            let Some(date) = today.checked_add_days(Days::new(day_offset as u64)) else {
                break;
            };
            let times = compute_day_times(date, &params, &self.tz);

            for &kind in &config.prayers {
                let Some(id) = notification_id(kind, day_offset) else {
                    continue;
                };
                let Some(event) = times.get(kind) else {
                    continue;
                };

                let trigger = event + offset;
                if trigger <= now {
                    continue;
                }

                alarms.push(ScheduledAlarm {
                    notification_id: id,
                    trigger,
                    kind,
                    day_offset,
                    title: config
                        .custom_title
                        .clone()
                        .unwrap_or_else(|| default_title(kind)),
                    body: pick_body(config, kind, rng),
                    image_resource: config
                        .show_image
                        .then(|| format!("notification_{}", kind)),
                    extend_horizon: true,
                });
            }
        }

        alarms.sort_by_key(|a| (a.trigger, a.notification_id));
        alarms
    }

    /// Registers `alarms` and cancels every other id of the horizon, so the
    /// pending set ends up equal to `alarms` however often this runs.
    pub fn register<T: TimerService + ?Sized>(
        &self,
        timers: &mut T,
        alarms: &[ScheduledAlarm],
    ) -> Result<Registration> {
        let mode = TimerMode::negotiate(timers.exact_alarms_permitted());
        if !mode.is_exact() {
            log::info!("Exact alarms not permitted, falling back to {} timers", mode);
        }

        for alarm in alarms {
            timers.schedule_at(alarm, mode).with_context(|| {
                format!(
                    "Failed to register {} reminder {}",
                    alarm.kind, alarm.notification_id
                )
            })?;
        }

        let live: HashSet<u32> = alarms.iter().map(|a| a.notification_id).collect();
        let mut cancelled = 0;
        for id in self.all_ids() {
            if !live.contains(&id) {
                timers.cancel(id)?;
                cancelled += 1;
            }
        }

        Ok(Registration {
            mode,
            registered: alarms.len(),
            cancelled,
        })
    }

    /// Cancels every (kind, day) id of the horizon.
    pub fn cancel_all<T: TimerService + ?Sized>(&self, timers: &mut T) -> Result<()> {
        for id in self.all_ids() {
            timers.cancel(id)?;
        }
        Ok(())
    }

    /// Cancels every day of the horizon for one kind.
    pub fn cancel_kind<T: TimerService + ?Sized>(
        &self,
        timers: &mut T,
        kind: PrayerEvent,
    ) -> Result<()> {
        for id in horizon_ids(&[kind], self.horizon_days) {
            timers.cancel(id)?;
        }
        Ok(())
    }

    fn all_ids(&self) -> Vec<u32> {
        let kinds: Vec<PrayerEvent> = PrayerEvent::remindable().collect();
        horizon_ids(&kinds, self.horizon_days)
    }
}

fn pick_body(config: &ScheduleConfig, kind: PrayerEvent, rng: &mut fastrand::Rng) -> String {
    if !config.random_messages.is_empty() {
        let i = rng.usize(..config.random_messages.len());
        return config.random_messages[i].clone();
    }
    config
        .custom_body
        .clone()
        .unwrap_or_else(|| default_body(kind))
}
