// File: ./src/cli.rs
//! Shared command-line interface logic, like printing help and parsing flags.
use crate::model::{CalculationMethod, Madhab, PrayerEvent};
use anyhow::{Context, Result, anyhow};
use std::str::FromStr;
use strum::IntoEnumIterator;

pub fn print_help(binary_name: &str) {
    println!(
        "Awqat v{} - Prayer times and rolling prayer reminders",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    {} [--root <path>] <command> [args]", binary_name);
    println!();
    println!("COMMANDS:");
    println!("    times [YYYY-MM-DD]                     Show prayer times (default: today)");
    println!("    init --lat <deg> --lng <deg> [opts]    Save location and calculation settings");
    println!("    schedule <prayer>... [opts]            Enable reminders for the given prayers");
    println!("    cancel <prayer>                        Stop reminders for one prayer");
    println!("    cancel-all                             Stop all reminders");
    println!("    boot                                   Rebuild pending reminders after a restart");
    println!("    status                                 List pending reminders");
    println!("    run [--log-only]                       Fire reminders until interrupted");
    println!();
    println!("INIT OPTIONS:");
    println!("    --method <id>         Calculation method (default: muslim_world_league)");
    println!("    --madhab <id>         shafi | hanafi (default: shafi)");
    println!("    --message <text>      Add a random reminder body (repeatable)");
    println!("    --no-image            Do not attach prayer images to notifications");
    println!();
    println!("SCHEDULE OPTIONS:");
    println!("    --offset <minutes>    Shift reminders (negative = before the prayer)");
    println!("    --title <text>        Custom notification title");
    println!("    --body <text>         Custom notification body");
    println!();
    println!("OPTIONS:");
    println!("    -r, --root <path>     Use a different directory for config and data.");
    println!("    -h, --help            Show this help message.");
    println!();
    let methods: Vec<String> = CalculationMethod::iter().map(|m| m.to_string()).collect();
    println!("METHODS:");
    println!("    {}", methods.join(", "));
    let prayers: Vec<String> = PrayerEvent::remindable().map(|p| p.to_string()).collect();
    println!("PRAYERS:");
    println!("    {}", prayers.join(", "));
}

/// Removes `--flag <value>` (or `-s <value>`) from `args` and returns the value.
pub fn take_value(args: &mut Vec<String>, long: &str, short: Option<&str>) -> Result<Option<String>> {
    let Some(pos) = args
        .iter()
        .position(|a| a == long || Some(a.as_str()) == short)
    else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        return Err(anyhow!("Missing value for {}", long));
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

/// Removes every `--flag <value>` occurrence and returns the values in order.
pub fn take_all_values(args: &mut Vec<String>, long: &str) -> Result<Vec<String>> {
    let mut values = Vec::new();
    while let Some(v) = take_value(args, long, None)? {
        values.push(v);
    }
    Ok(values)
}

/// Removes a boolean `--flag` from `args`.
pub fn take_flag(args: &mut Vec<String>, long: &str) -> bool {
    match args.iter().position(|a| a == long) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

pub fn parse_number<T: FromStr>(raw: &str, what: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("Invalid {}: '{}'", what, raw))
}

pub fn parse_method(raw: &str) -> Result<CalculationMethod> {
    CalculationMethod::from_str(raw).map_err(|_| anyhow!("Unknown calculation method '{}'", raw))
}

pub fn parse_madhab(raw: &str) -> Result<Madhab> {
    Madhab::from_str(raw).map_err(|_| anyhow!("Unknown madhab '{}'", raw))
}

pub fn parse_prayers(raw: &[String]) -> Result<Vec<PrayerEvent>> {
    raw.iter()
        .flat_map(|s| s.split(','))
        .filter(|s| !s.trim().is_empty())
        .map(|s| PrayerEvent::parse_remindable(s).ok_or_else(|| anyhow!("Unknown prayer '{}'", s)))
        .collect()
}
