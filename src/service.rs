/* awqat/src/service.rs
 *
 * Entry points the host application calls: configure, query times, schedule,
 * cancel, and the two reschedule triggers (alarm fired, boot).
 */

use crate::cascade::{CascadeState, RescheduleCascade, Trigger};
use crate::config::{ConfigStore, ScheduleConfig};
use crate::engine::compute_day_times;
use crate::model::{DayTimes, PrayerEvent, ScheduledAlarm};
use crate::notify::NotificationSink;
use crate::scheduler::ReminderScheduler;
use crate::timer::TimerService;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Malformed configuration input.
    Init(String),
    /// Times could not be computed (bad date, nothing configured).
    PrayerTimes(String),
    /// Persisting the configuration or registering timers failed.
    Schedule(String),
    /// The timer backend failed while removing alarms.
    Cancel(String),
    /// Unknown reminder kind.
    InvalidPrayer(String),
}

impl ServiceError {
    /// Stable code exposed to the host application.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Init(_) => "INIT_ERROR",
            ServiceError::PrayerTimes(_) => "PRAYER_TIMES_ERROR",
            ServiceError::Schedule(_) => "SCHEDULE_ERROR",
            ServiceError::Cancel(_) => "CANCEL_ERROR",
            ServiceError::InvalidPrayer(_) => "INVALID_PRAYER",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ServiceError::Init(m)
            | ServiceError::PrayerTimes(m)
            | ServiceError::Schedule(m)
            | ServiceError::Cancel(m)
            | ServiceError::InvalidPrayer(m) => m,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for ServiceError {}

pub struct PrayerService<S: ConfigStore, T: TimerService, Tz: TimeZone> {
    store: S,
    timers: T,
    scheduler: ReminderScheduler<Tz>,
    cascade: RescheduleCascade,
    rng: fastrand::Rng,
}

impl<S: ConfigStore, T: TimerService, Tz: TimeZone> PrayerService<S, T, Tz> {
    pub fn new(store: S, timers: T, tz: Tz) -> Self {
        Self {
            store,
            timers,
            scheduler: ReminderScheduler::new(tz),
            cascade: RescheduleCascade::new(),
            rng: fastrand::Rng::new(),
        }
    }

    /// Replaces the generator used to draw random message bodies.
    pub fn with_rng(mut self, rng: fastrand::Rng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_horizon(mut self, horizon_days: u32) -> Self {
        self.scheduler = self.scheduler.with_horizon(horizon_days);
        self
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    pub fn scheduler(&self) -> &ReminderScheduler<Tz> {
        &self.scheduler
    }

    pub fn cascade_state(&self) -> CascadeState {
        self.cascade.state()
    }

    /// Capability query forwarded to the timer backend.
    pub fn exact_alarms_permitted(&self) -> bool {
        self.timers.exact_alarms_permitted()
    }

    /// The stored configuration, if any.
    pub fn config(&self) -> Result<Option<ScheduleConfig>, ServiceError> {
        self.store
            .load()
            .map_err(|e| ServiceError::PrayerTimes(format!("Failed to load configuration: {:#}", e)))
    }

    /// Validates and stores `config` wholesale. Pending timers are left as
    /// they are; the next reschedule trigger picks the new values up.
    pub fn initialize(&mut self, config: ScheduleConfig) -> Result<(), ServiceError> {
        config
            .validate()
            .map_err(|e| ServiceError::Init(format!("{:#}", e)))?;
        self.store
            .save(&config)
            .map_err(|e| ServiceError::Init(format!("Failed to save configuration: {:#}", e)))?;
        log::debug!(
            "Configured {} / {} at ({}, {})",
            config.method,
            config.madhab,
            config.location.latitude,
            config.location.longitude
        );
        Ok(())
    }

    pub fn update_config(&mut self, config: ScheduleConfig) -> Result<(), ServiceError> {
        self.initialize(config)
    }

    /// Times for the calendar day (in the service's zone) containing the
    /// instant `date_ms` (Unix milliseconds).
    pub fn get_prayer_times(&self, date_ms: i64) -> Result<DayTimes, ServiceError> {
        let instant = DateTime::<Utc>::from_timestamp_millis(date_ms).ok_or_else(|| {
            ServiceError::PrayerTimes(format!("Timestamp {} is out of range", date_ms))
        })?;
        let date = instant.with_timezone(self.scheduler.tz()).date_naive();
        self.prayer_times_on(date)
    }

    pub fn prayer_times_on(&self, date: NaiveDate) -> Result<DayTimes, ServiceError> {
        let config = self
            .config()?
            .ok_or_else(|| ServiceError::PrayerTimes("Not initialized".to_string()))?;
        // (0, 0) only disables scheduling; times are computed for any stored
        // location.
        Ok(compute_day_times(date, &config.params(), self.scheduler.tz()))
    }

    /// Stores the reminder selection, enables reminders and registers the
    /// whole horizon. Returns the number of registered alarms.
    pub fn schedule_reminders(
        &mut self,
        prayers: &[PrayerEvent],
        offset_minutes: i32,
        title: Option<String>,
        body: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<usize, ServiceError> {
        let mut config = self
            .store
            .load()
            .map_err(|e| ServiceError::Schedule(format!("Failed to load configuration: {:#}", e)))?
            .ok_or_else(|| ServiceError::Schedule("Not initialized".to_string()))?;

        if config.location.is_unset() {
            return Err(ServiceError::Schedule("Location not configured".to_string()));
        }

        config.prayers = prayers
            .iter()
            .copied()
            .filter(|p| {
                if !p.is_remindable() {
                    log::warn!("Ignoring reminder request for {}", p);
                }
                p.is_remindable()
            })
            .collect();
        config.offset_minutes = offset_minutes;
        config.custom_title = title;
        config.custom_body = body;
        config.enabled = true;

        config
            .validate()
            .map_err(|e| ServiceError::Schedule(format!("{:#}", e)))?;
        self.store
            .save(&config)
            .map_err(|e| ServiceError::Schedule(format!("Failed to save configuration: {:#}", e)))?;

        let alarms = self
            .scheduler
            .build_trigger_set(&config, now, &mut self.rng);
        let registration = self
            .scheduler
            .register(&mut self.timers, &alarms)
            .map_err(|e| ServiceError::Schedule(format!("{:#}", e)))?;

        log::info!(
            "Scheduled {} reminder(s) for {} prayer(s) over {} day(s)",
            registration.registered,
            config.prayers.len(),
            self.scheduler.horizon_days()
        );
        Ok(registration.registered)
    }

    /// Disables reminders and removes every alarm of the horizon.
    pub fn cancel_all_reminders(&mut self) -> Result<(), ServiceError> {
        // Disable first so a partially failed removal is not undone by the
        // next reschedule.
        if let Some(mut config) = self.load_for_cancel()? {
            config.enabled = false;
            self.save_for_cancel(&config)?;
        }

        self.scheduler
            .cancel_all(&mut self.timers)
            .map_err(|e| ServiceError::Cancel(format!("{:#}", e)))?;
        log::info!("Cancelled all reminders");
        Ok(())
    }

    /// Removes one prayer from the selection and cancels its alarms on every
    /// day of the horizon.
    pub fn cancel_reminder(&mut self, kind: &str) -> Result<(), ServiceError> {
        let kind = PrayerEvent::parse_remindable(kind)
            .ok_or_else(|| ServiceError::InvalidPrayer(format!("Unknown prayer: {}", kind)))?;

        if let Some(mut config) = self.load_for_cancel()?
            && config.prayers.remove(&kind)
        {
            self.save_for_cancel(&config)?;
        }

        self.scheduler
            .cancel_kind(&mut self.timers, kind)
            .map_err(|e| ServiceError::Cancel(format!("{:#}", e)))?;
        log::info!("Cancelled {} reminders", kind);
        Ok(())
    }

    /// Re-derives the horizon from the stored configuration.
    pub fn reconcile(&mut self, trigger: Trigger, now: DateTime<Utc>) -> bool {
        self.cascade.reconcile(
            trigger,
            &self.store,
            &mut self.timers,
            &self.scheduler,
            &mut self.rng,
            now,
        )
    }

    /// Host restart: timers may have been wiped, rebuild them.
    pub fn on_boot(&mut self, now: DateTime<Utc>) -> bool {
        let rescheduled = self.reconcile(Trigger::Boot, now);
        if rescheduled {
            log::info!("Successfully rescheduled prayer reminders after boot");
        } else {
            log::debug!("Nothing rescheduled after boot");
        }
        rescheduled
    }

    /// Shows a fired alarm and, if it asks for it, tops the horizon back up.
    /// Returns whether a reschedule happened.
    pub fn on_alarm_fired<N: NotificationSink + ?Sized>(
        &mut self,
        alarm: &ScheduledAlarm,
        sink: &mut N,
        now: DateTime<Utc>,
    ) -> bool {
        log::debug!("Alarm received! ID: {}", alarm.notification_id);

        if let Err(e) = sink.deliver(alarm.notification_id, &alarm.title, &alarm.body) {
            log::error!(
                "Failed to show notification {}: {:#}",
                alarm.notification_id,
                e
            );
        }

        if !alarm.extend_horizon {
            return false;
        }
        self.reconcile(Trigger::AlarmFired(alarm.notification_id), now)
    }

    fn load_for_cancel(&self) -> Result<Option<ScheduleConfig>, ServiceError> {
        self.store
            .load()
            .map_err(|e| ServiceError::Cancel(format!("Failed to load configuration: {:#}", e)))
    }

    fn save_for_cancel(&mut self, config: &ScheduleConfig) -> Result<(), ServiceError> {
        self.store
            .save(config)
            .map_err(|e| ServiceError::Cancel(format!("Failed to save configuration: {:#}", e)))
    }
}
