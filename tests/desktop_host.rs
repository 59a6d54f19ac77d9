// Tests for the file-backed configuration and the desktop alarm ledger.
use anyhow::Result;
use awqat::alarm_index::{AlarmIndex, IndexedTimerService};
use awqat::config::{ConfigStore, FileConfigStore, ScheduleConfig};
use awqat::context::{AppContext, SharedContext, TestContext};
use awqat::model::{CalculationMethod, GeoCoordinate, HORIZON_DAYS, Madhab, PrayerEvent};
use awqat::notify::NotificationSink;
use awqat::service::PrayerService;
use awqat::system::fire_due;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use std::sync::Arc;

#[derive(Default)]
struct RecordingSink {
    delivered: Vec<u32>,
}

impl NotificationSink for RecordingSink {
    fn deliver(&mut self, notification_id: u32, _title: &str, _body: &str) -> Result<()> {
        self.delivered.push(notification_id);
        Ok(())
    }
}

fn london() -> ScheduleConfig {
    let mut config = ScheduleConfig::new(
        GeoCoordinate::new(51.5072, -0.1276).unwrap(),
        CalculationMethod::Karachi,
        Madhab::Hanafi,
    );
    config.random_messages = vec!["Pray, then rest".to_string(), "Remember".to_string()];
    config
}

fn early() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

fn host(
    ctx: &SharedContext,
) -> PrayerService<FileConfigStore, IndexedTimerService, FixedOffset> {
    PrayerService::new(
        FileConfigStore::new(ctx.clone()),
        IndexedTimerService::open(ctx.clone(), true),
        FixedOffset::east_opt(0).unwrap(),
    )
}

#[test]
fn test_config_survives_restart() {
    let ctx: SharedContext = Arc::new(TestContext::new());
    let mut store = FileConfigStore::new(ctx.clone());
    assert!(store.load().unwrap().is_none());

    let mut config = london();
    config.prayers = [PrayerEvent::Fajr, PrayerEvent::Isha].into_iter().collect();
    config.enabled = true;
    store.save(&config).unwrap();

    let reopened = FileConfigStore::new(ctx.clone());
    assert_eq!(reopened.load().unwrap(), Some(config));
    assert!(ctx.get_schedule_config_path().unwrap().exists());
}

#[test]
fn test_corrupt_config_is_an_error() {
    let ctx: SharedContext = Arc::new(TestContext::new());
    let path = ctx.get_schedule_config_path().unwrap();
    std::fs::write(&path, "latitude = \"north\"").unwrap();

    let store = FileConfigStore::new(ctx.clone());
    assert!(store.load().is_err());

    let s = host(&ctx);
    assert_eq!(
        s.prayer_times_on(early().date_naive()).unwrap_err().code(),
        "PRAYER_TIMES_ERROR"
    );
}

#[test]
fn test_registrations_are_persisted() {
    let ctx: SharedContext = Arc::new(TestContext::new());
    let mut s = host(&ctx);
    s.initialize(london()).unwrap();
    let count = s
        .schedule_reminders(&[PrayerEvent::Fajr, PrayerEvent::Asr], 0, None, None, early())
        .unwrap();
    assert_eq!(count, 2 * HORIZON_DAYS as usize);

    let index = AlarmIndex::load(ctx.as_ref());
    assert_eq!(index.len(), count);
    assert!(index.alarms.windows(2).all(|w| w[0].trigger_ms <= w[1].trigger_ms));
    assert!(index.alarms.iter().all(|a| a.exact));
    assert!(
        index
            .alarms
            .iter()
            .all(|a| a.body == "Pray, then rest" || a.body == "Remember")
    );

    s.cancel_reminder("fajr").unwrap();
    let index = AlarmIndex::load(ctx.as_ref());
    assert_eq!(index.len(), HORIZON_DAYS as usize);
    assert!(index.alarms.iter().all(|a| a.prayer == PrayerEvent::Asr));
}

#[test]
fn test_fire_due_delivers_and_tops_up() {
    let ctx: SharedContext = Arc::new(TestContext::new());
    let mut s = host(&ctx);
    s.initialize(london()).unwrap();
    s.schedule_reminders(&[PrayerEvent::Fajr, PrayerEvent::Dhuhr], 0, None, None, early())
        .unwrap();

    let fajr = s
        .timers()
        .index()
        .next_alarm_time(early())
        .unwrap();
    let mut sink = RecordingSink::default();

    // Nothing is due yet
    assert_eq!(fire_due(&mut s, &mut sink, early()).unwrap(), 0);

    let now = fajr + Duration::minutes(1);
    assert_eq!(fire_due(&mut s, &mut sink, now).unwrap(), 1);
    assert_eq!(sink.delivered, vec![1001]);

    // Today's fajr is gone, the rest of the horizon is still pending
    let index = AlarmIndex::load(ctx.as_ref());
    assert!(!index.contains(1001));
    assert_eq!(index.len(), 2 * HORIZON_DAYS as usize - 1);
    assert!(index.alarms.iter().all(|a| a.trigger_ms > now.timestamp_millis()));
}

#[test]
fn test_alarms_missed_beyond_grace_are_dropped() {
    let ctx: SharedContext = Arc::new(TestContext::new());
    let mut s = host(&ctx);
    s.initialize(london()).unwrap();
    s.schedule_reminders(&[PrayerEvent::Fajr], 0, None, None, early())
        .unwrap();

    let fajr = s
        .timers()
        .index()
        .next_alarm_time(early())
        .unwrap();
    let mut sink = RecordingSink::default();

    // Host was down for three hours
    let now = fajr + Duration::hours(3);
    assert_eq!(fire_due(&mut s, &mut sink, now).unwrap(), 0);
    assert!(sink.delivered.is_empty());

    let index = AlarmIndex::load(ctx.as_ref());
    assert_eq!(index.len(), HORIZON_DAYS as usize - 1);
}

#[test]
fn test_host_sees_registrations_from_another_process() {
    let ctx: SharedContext = Arc::new(TestContext::new());
    let mut host_service = host(&ctx);

    // A separate CLI invocation configures and schedules
    let mut cli = host(&ctx);
    cli.initialize(london()).unwrap();
    cli.schedule_reminders(&[PrayerEvent::Maghrib], 0, None, None, early())
        .unwrap();

    assert!(host_service.timers().index().is_empty());
    let mut sink = RecordingSink::default();
    let maghrib = cli.timers().index().next_alarm_time(early()).unwrap();
    assert_eq!(
        fire_due(&mut host_service, &mut sink, maghrib).unwrap(),
        1
    );
    assert_eq!(sink.delivered, vec![1004]);
}

#[test]
fn test_boot_restores_wiped_ledger() {
    let ctx: SharedContext = Arc::new(TestContext::new());
    let mut s = host(&ctx);
    s.initialize(london()).unwrap();
    s.schedule_reminders(&[PrayerEvent::Isha], 0, None, None, early())
        .unwrap();

    std::fs::remove_file(ctx.get_alarm_index_path().unwrap()).unwrap();
    let mut restarted = host(&ctx);
    assert!(restarted.timers().index().is_empty());

    assert!(restarted.on_boot(early()));
    assert_eq!(AlarmIndex::load(ctx.as_ref()).len(), HORIZON_DAYS as usize);
}
