use anyhow::{Result, anyhow};
use awqat::alarm_index::IndexedTimerService;
use awqat::cli;
use awqat::config::{FileConfigStore, ScheduleConfig};
use awqat::context::{SharedContext, StandardContext};
use awqat::model::{GeoCoordinate, PrayerEvent};
use awqat::notify::{DesktopNotifier, LogNotifier};
use awqat::service::{PrayerService, ServiceError};
use awqat::system;
use chrono::{Local, NaiveDate, Utc};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use strum::IntoEnumIterator;

type Service = PrayerService<FileConfigStore, IndexedTimerService, Local>;

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();

    let mut args: Vec<String> = env::args().skip(1).collect();

    if args
        .first()
        .is_none_or(|a| a == "--help" || a == "-h" || a == "help")
    {
        cli::print_help("awqat");
        return ExitCode::SUCCESS;
    }

    match run(&mut args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ServiceError>() {
                Some(service_err) => eprintln!("{}", service_err),
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logger() {
    let level = env::var("AWQAT_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    let config = ConfigBuilder::new()
        .set_location_level(LevelFilter::Off)
        .build();
    // Fails only if a logger is already installed.
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}

async fn run(args: &mut Vec<String>) -> Result<()> {
    let root = cli::take_value(args, "--root", Some("-r"))?.map(PathBuf::from);
    let ctx: SharedContext = Arc::new(StandardContext::new(root));

    let store = FileConfigStore::new(ctx.clone());
    let timers = IndexedTimerService::open(ctx, true);
    let mut service = PrayerService::new(store, timers, Local);

    if args.is_empty() {
        return Err(anyhow!("Missing command. Try --help."));
    }
    let command = args.remove(0);
    log::debug!("Running command {} with {:?}", command, args);

    match command.as_str() {
        "times" => cmd_times(&service, args),
        "init" => cmd_init(&mut service, args),
        "schedule" => cmd_schedule(&mut service, args),
        "cancel" => {
            let kind = args
                .first()
                .ok_or_else(|| anyhow!("Usage: awqat cancel <prayer>"))?;
            service.cancel_reminder(kind)?;
            println!("Cancelled {} reminders.", kind);
            Ok(())
        }
        "cancel-all" => {
            service.cancel_all_reminders()?;
            println!("Cancelled all reminders.");
            Ok(())
        }
        "boot" => {
            if service.on_boot(Utc::now()) {
                println!("Rescheduled {} reminder(s).", service.timers().index().len());
            } else {
                println!("Nothing to reschedule.");
            }
            Ok(())
        }
        "status" => cmd_status(&service),
        "run" => {
            if cli::take_flag(args, "--log-only") {
                let mut sink = LogNotifier;
                system::run_host_loop(&mut service, &mut sink).await
            } else {
                let mut sink = DesktopNotifier;
                system::run_host_loop(&mut service, &mut sink).await
            }
        }
        other => Err(anyhow!("Unknown command '{}'. Try --help.", other)),
    }
}

fn cmd_times(service: &Service, args: &[String]) -> Result<()> {
    let date = match args.first() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| anyhow!("Invalid date '{}', expected YYYY-MM-DD", raw))?,
        None => Local::now().date_naive(),
    };
    let times = service.prayer_times_on(date)?;

    println!("{}", times.date);
    for event in PrayerEvent::iter() {
        match times.get(event) {
            Some(t) => println!(
                "  {:<8} {}",
                event.display_name(),
                t.with_timezone(&Local).format("%H:%M")
            ),
            None => println!("  {:<8} --:--", event.display_name()),
        }
    }
    if let Some((event, t)) = times.next_event(Utc::now()) {
        println!(
            "Next: {} at {}",
            event.display_name(),
            t.with_timezone(&Local).format("%H:%M")
        );
    }
    Ok(())
}

/// Merges the given flags onto the stored configuration, so re-running
/// `init` with a new location keeps the reminder selection.
fn cmd_init(service: &mut Service, args: &mut Vec<String>) -> Result<()> {
    let mut config = service.config()?.unwrap_or_default();

    let lat = cli::take_value(args, "--lat", None)?;
    let lng = cli::take_value(args, "--lng", None)?;
    match (lat, lng) {
        (Some(lat), Some(lng)) => {
            config.location = GeoCoordinate {
                latitude: cli::parse_number(&lat, "latitude")?,
                longitude: cli::parse_number(&lng, "longitude")?,
            };
        }
        (None, None) if !config.location.is_unset() => {}
        _ => return Err(anyhow!("Both --lat and --lng are required")),
    }
    if let Some(method) = cli::take_value(args, "--method", None)? {
        config.method = cli::parse_method(&method)?;
    }
    if let Some(madhab) = cli::take_value(args, "--madhab", None)? {
        config.madhab = cli::parse_madhab(&madhab)?;
    }
    let messages = cli::take_all_values(args, "--message")?;
    if !messages.is_empty() {
        config.random_messages = messages;
    }
    if cli::take_flag(args, "--no-image") {
        config.show_image = false;
    }
    reject_leftovers(args)?;

    service.initialize(config.clone())?;
    print_config(&config);
    Ok(())
}

fn cmd_schedule(service: &mut Service, args: &mut Vec<String>) -> Result<()> {
    let offset = match cli::take_value(args, "--offset", None)? {
        Some(raw) => cli::parse_number::<i32>(&raw, "offset")?,
        None => 0,
    };
    let title = cli::take_value(args, "--title", None)?;
    let body = cli::take_value(args, "--body", None)?;
    let prayers = cli::parse_prayers(args)?;
    if prayers.is_empty() {
        return Err(anyhow!("Usage: awqat schedule <prayer>... [--offset <minutes>]"));
    }

    let count = service.schedule_reminders(&prayers, offset, title, body, Utc::now())?;
    println!(
        "Scheduled {} reminder(s) ({} mode).",
        count,
        awqat::timer::TimerMode::negotiate(service.exact_alarms_permitted())
    );
    Ok(())
}

fn cmd_status(service: &Service) -> Result<()> {
    match service.config()? {
        Some(config) => print_config(&config),
        None => println!("Not initialized. Run `awqat init --lat <deg> --lng <deg>`."),
    }

    let index = service.timers().index();
    if index.is_empty() {
        println!("No pending reminders.");
        return Ok(());
    }
    println!("Pending reminders:");
    for entry in &index.alarms {
        let Some(alarm) = entry.to_alarm() else {
            continue;
        };
        println!(
            "  [{}] {} {}  {}",
            alarm.notification_id,
            alarm.trigger.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            alarm.kind.display_name(),
            alarm.title
        );
    }
    Ok(())
}

fn print_config(config: &ScheduleConfig) {
    println!(
        "Location: {:.4}, {:.4}  Method: {}  Madhab: {}",
        config.location.latitude, config.location.longitude, config.method, config.madhab
    );
    let prayers: Vec<&str> = config.prayers.iter().map(|p| p.display_name()).collect();
    println!(
        "Reminders: {}  Prayers: {}  Offset: {} min",
        if config.enabled { "on" } else { "off" },
        if prayers.is_empty() {
            "-".to_string()
        } else {
            prayers.join(", ")
        },
        config.offset_minutes
    );
}

fn reject_leftovers(args: &[String]) -> Result<()> {
    match args.first() {
        Some(arg) => Err(anyhow!("Unexpected argument '{}'", arg)),
        None => Ok(()),
    }
}
