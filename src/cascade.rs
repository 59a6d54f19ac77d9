// Keeps the horizon full: re-derives every alarm from the persisted
// configuration whenever an alarm fires or the host restarts.
use crate::config::ConfigStore;
use crate::scheduler::ReminderScheduler;
use crate::timer::TimerService;
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CascadeState {
    #[default]
    Idle,
    Reconciling,
}

/// What woke the cascade up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    AlarmFired(u32),
    Boot,
    /// Explicit request from the host (e.g. after a time zone change).
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::AlarmFired(id) => write!(f, "alarm {}", id),
            Trigger::Boot => write!(f, "boot"),
            Trigger::Manual => write!(f, "manual request"),
        }
    }
}

#[derive(Debug, Default)]
pub struct RescheduleCascade {
    state: CascadeState,
}

impl RescheduleCascade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CascadeState {
        self.state
    }

    /// Rebuilds the horizon from the stored configuration, anchored at `now`.
    ///
    /// Returns false when there is nothing to schedule (disabled, no prayers,
    /// no location) or when loading/registration failed; failures are logged
    /// and the next trigger simply tries again.
    pub fn reconcile<S, T, Tz>(
        &mut self,
        trigger: Trigger,
        store: &S,
        timers: &mut T,
        scheduler: &ReminderScheduler<Tz>,
        rng: &mut fastrand::Rng,
        now: DateTime<Utc>,
    ) -> bool
    where
        S: ConfigStore + ?Sized,
        T: TimerService + ?Sized,
        Tz: TimeZone,
    {
        self.state = CascadeState::Reconciling;
        let outcome = Self::rebuild(trigger, store, timers, scheduler, rng, now);
        self.state = CascadeState::Idle;

        match outcome {
            Ok(done) => done,
            Err(e) => {
                log::error!("Failed to reschedule after {}: {:#}", trigger, e);
                false
            }
        }
    }

    fn rebuild<S, T, Tz>(
        trigger: Trigger,
        store: &S,
        timers: &mut T,
        scheduler: &ReminderScheduler<Tz>,
        rng: &mut fastrand::Rng,
        now: DateTime<Utc>,
    ) -> Result<bool>
    where
        S: ConfigStore + ?Sized,
        T: TimerService + ?Sized,
        Tz: TimeZone,
    {
        let Some(config) = store.load()? else {
            log::debug!("No saved schedule, skipping reschedule after {}", trigger);
            return Ok(false);
        };

        if !config.enabled {
            log::debug!("Reminders disabled, skipping reschedule after {}", trigger);
            return Ok(false);
        }

        if !config.is_schedulable() {
            log::debug!("No prayers configured or invalid location");
            return Ok(false);
        }

        let alarms = scheduler.build_trigger_set(&config, now, rng);
        let registration = scheduler.register(timers, &alarms)?;

        log::info!(
            "Rescheduled {} reminder(s) for {} day(s) after {} ({} mode, {} cancelled)",
            registration.registered,
            scheduler.horizon_days(),
            trigger,
            registration.mode,
            registration.cancelled
        );
        Ok(true)
    }
}
