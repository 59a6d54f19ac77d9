// File: ./src/system.rs
// Desktop host loop: plays the role of the OS alarm service on machines that
// have none, using the alarm index as the pending-timer registry.
use crate::alarm_index::IndexedTimerService;
use crate::config::ConfigStore;
use crate::notify::NotificationSink;
use crate::service::PrayerService;
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use tokio::time::{Duration, Instant, sleep_until};

/// Upper bound on a single sleep, so registrations written by another
/// process (the CLI) are noticed without a restart.
pub const MAX_IDLE: Duration = Duration::from_secs(60);

/// Fires every alarm due at `now`. Returns how many were delivered.
pub fn fire_due<S, N, Tz>(
    service: &mut PrayerService<S, IndexedTimerService, Tz>,
    sink: &mut N,
    now: DateTime<Utc>,
) -> Result<usize>
where
    S: ConfigStore,
    N: NotificationSink + ?Sized,
    Tz: TimeZone,
{
    service.timers_mut().reload();
    let due = service.timers_mut().take_due(now)?;

    for alarm in &due {
        service.on_alarm_fired(alarm, sink, now);
    }
    Ok(due.len())
}

/// Runs until Ctrl-C. Repairs the horizon once on start, as a freshly
/// booted device would.
pub async fn run_host_loop<S, N, Tz>(
    service: &mut PrayerService<S, IndexedTimerService, Tz>,
    sink: &mut N,
) -> Result<()>
where
    S: ConfigStore,
    N: NotificationSink + ?Sized,
    Tz: TimeZone,
{
    // Missed alarms still inside the grace period go out before the boot
    // repair replaces the pending set.
    let now = Utc::now();
    fire_due(service, sink, now)?;
    service.on_boot(now);

    loop {
        let now = Utc::now();
        let fired = fire_due(service, sink, now)?;
        if fired > 0 {
            log::info!("Fired {} reminder(s)", fired);
        }

        let wait = match service.timers().index().next_alarm_time(Utc::now()) {
            Some(next) => (next - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(MAX_IDLE),
            None => MAX_IDLE,
        };
        let deadline = Instant::now() + wait;

        tokio::select! {
            _ = sleep_until(deadline) => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping host loop");
                return Ok(());
            }
        }
    }
}
