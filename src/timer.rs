// Boundary to whatever actually wakes the device up at a given instant.
use crate::model::ScheduledAlarm;
use anyhow::Result;
use std::fmt;

/// How an alarm is registered with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Exact and allowed to fire while the device idles. Needs the host's
    /// exact-alarm capability.
    ExactAllowWhileIdle,
    /// Visible alarm-clock style timer. Fires reliably without special
    /// capability, but the host may surface it to the user.
    AlarmClock,
}

impl TimerMode {
    /// Picks the preferred mode for the capability the host reports.
    pub fn negotiate(exact_permitted: bool) -> Self {
        if exact_permitted {
            TimerMode::ExactAllowWhileIdle
        } else {
            TimerMode::AlarmClock
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, TimerMode::ExactAllowWhileIdle)
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerMode::ExactAllowWhileIdle => write!(f, "exact"),
            TimerMode::AlarmClock => write!(f, "alarm-clock"),
        }
    }
}

/// Host timer registry.
///
/// Registration is keyed by `ScheduledAlarm::notification_id`: scheduling an
/// id that is already pending replaces it.
pub trait TimerService {
    fn exact_alarms_permitted(&self) -> bool;
    fn schedule_at(&mut self, alarm: &ScheduledAlarm, mode: TimerMode) -> Result<()>;
    /// Removing an id that is not pending is not an error.
    fn cancel(&mut self, notification_id: u32) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate_prefers_exact() {
        assert_eq!(TimerMode::negotiate(true), TimerMode::ExactAllowWhileIdle);
        assert_eq!(TimerMode::negotiate(false), TimerMode::AlarmClock);
        assert!(!TimerMode::AlarmClock.is_exact());
    }
}
