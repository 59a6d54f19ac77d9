// Core domain types shared by the engine, scheduler and persistence layers.
use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Number of days kept pre-scheduled at any moment.
pub const HORIZON_DAYS: u32 = 7;

/// Longest horizon a scheduler accepts.
pub const MAX_HORIZON_DAYS: u32 = 366;

/// Distance between the notification ids of the same prayer on consecutive days.
/// Must stay larger than the spread of the base ids.
pub const ID_DAY_STRIDE: u32 = 10;

// --- LOCATION ---

/// Observer position in degrees. `(0, 0)` means "not configured yet".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoCoordinate {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

impl GeoCoordinate {
    /// Builds a coordinate, rejecting values outside the valid ranges.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let coord = Self {
            latitude,
            longitude,
        };
        coord.check()?;
        Ok(coord)
    }

    pub fn check(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            bail!("Latitude out of range: {}", self.latitude);
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            bail!("Longitude out of range: {}", self.longitude);
        }
        Ok(())
    }

    pub fn is_unset(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

// --- CALCULATION PARAMETERS ---

/// Twilight angles (degrees below the horizon) for a calculation method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodAngles {
    pub fajr: f64,
    pub isha: f64,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CalculationMethod {
    #[default]
    MuslimWorldLeague,
    Egyptian,
    Karachi,
    UmmAlQura,
    NorthAmerica,
    Dubai,
    Kuwait,
    Qatar,
    Singapore,
    Turkey,
    Tehran,
    MoonsightingCommittee,
}

impl CalculationMethod {
    pub fn angles(&self) -> MethodAngles {
        let (fajr, isha) = match self {
            CalculationMethod::MuslimWorldLeague => (18.0, 17.0),
            CalculationMethod::Egyptian => (19.5, 17.5),
            CalculationMethod::Karachi => (18.0, 18.0),
            // 90 stands for "90 minutes after maghrib" in these conventions,
            // but it is fed to the angle formula as-is.
            CalculationMethod::UmmAlQura => (18.5, 90.0),
            CalculationMethod::NorthAmerica => (15.0, 15.0),
            CalculationMethod::Dubai => (18.2, 18.2),
            CalculationMethod::Kuwait => (18.0, 17.5),
            CalculationMethod::Qatar => (18.0, 90.0),
            CalculationMethod::Singapore => (20.0, 18.0),
            CalculationMethod::Turkey => (18.0, 17.0),
            CalculationMethod::Tehran => (17.7, 14.0),
            CalculationMethod::MoonsightingCommittee => (18.0, 17.0),
        };
        MethodAngles { fajr, isha }
    }

    /// Parses a method id, falling back to the default for unknown ids.
    pub fn from_id_or_default(id: &str) -> Self {
        Self::from_str(id).unwrap_or_else(|_| {
            log::warn!("Unknown calculation method '{}', using default", id);
            Self::default()
        })
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Madhab {
    #[default]
    Shafi,
    Hanafi,
}

impl Madhab {
    /// Shadow length multiplier used for Asr.
    pub fn shadow_factor(&self) -> f64 {
        match self {
            Madhab::Shafi => 1.0,
            Madhab::Hanafi => 2.0,
        }
    }

    pub fn from_id_or_default(id: &str) -> Self {
        Self::from_str(id).unwrap_or_default()
    }
}

// --- EVENTS ---

/// The six daily events, declared in chronological order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PrayerEvent {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerEvent {
    /// Human readable name used in notification texts.
    pub fn display_name(&self) -> &'static str {
        match self {
            PrayerEvent::Fajr => "Fajr",
            PrayerEvent::Sunrise => "Sunrise",
            PrayerEvent::Dhuhr => "Dhuhr",
            PrayerEvent::Asr => "Asr",
            PrayerEvent::Maghrib => "Maghrib",
            PrayerEvent::Isha => "Isha",
        }
    }

    /// Notification id of the day-0 reminder. Sunrise is not a prayer and
    /// has no reminder.
    pub fn base_notification_id(&self) -> Option<u32> {
        match self {
            PrayerEvent::Fajr => Some(1001),
            PrayerEvent::Sunrise => None,
            PrayerEvent::Dhuhr => Some(1002),
            PrayerEvent::Asr => Some(1003),
            PrayerEvent::Maghrib => Some(1004),
            PrayerEvent::Isha => Some(1005),
        }
    }

    pub fn is_remindable(&self) -> bool {
        self.base_notification_id().is_some()
    }

    /// All events that can carry a reminder, in chronological order.
    pub fn remindable() -> impl Iterator<Item = PrayerEvent> {
        PrayerEvent::iter().filter(PrayerEvent::is_remindable)
    }

    /// Parses a reminder kind. Returns `None` for unknown ids and for sunrise.
    pub fn parse_remindable(id: &str) -> Option<PrayerEvent> {
        PrayerEvent::from_str(id.trim())
            .ok()
            .filter(PrayerEvent::is_remindable)
    }
}

/// Derives the stable id for a reminder of `kind` on `day_offset` days from today.
/// `None` for sunrise and for offsets whose id does not fit in a `u32`.
pub fn notification_id(kind: PrayerEvent, day_offset: u32) -> Option<u32> {
    let base = kind.base_notification_id()?;
    day_offset
        .checked_mul(ID_DAY_STRIDE)
        .and_then(|step| base.checked_add(step))
}

/// Every id that can be live within a horizon of `horizon_days`.
pub fn horizon_ids(kinds: &[PrayerEvent], horizon_days: u32) -> Vec<u32> {
    kinds
        .iter()
        .flat_map(|k| (0..horizon_days).filter_map(move |d| notification_id(*k, d)))
        .collect()
}

// --- DAILY RESULT ---

/// Event instants for one calendar day. An event is `None` when the sun does
/// not reach the required angle on that day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTimes {
    pub date: NaiveDate,
    pub fajr: Option<DateTime<Utc>>,
    pub sunrise: Option<DateTime<Utc>>,
    pub dhuhr: Option<DateTime<Utc>>,
    pub asr: Option<DateTime<Utc>>,
    pub maghrib: Option<DateTime<Utc>>,
    pub isha: Option<DateTime<Utc>>,
}

impl DayTimes {
    pub fn get(&self, event: PrayerEvent) -> Option<DateTime<Utc>> {
        match event {
            PrayerEvent::Fajr => self.fajr,
            PrayerEvent::Sunrise => self.sunrise,
            PrayerEvent::Dhuhr => self.dhuhr,
            PrayerEvent::Asr => self.asr,
            PrayerEvent::Maghrib => self.maghrib,
            PrayerEvent::Isha => self.isha,
        }
    }

    /// True when every event has a time on this day.
    pub fn is_complete(&self) -> bool {
        PrayerEvent::iter().all(|e| self.get(e).is_some())
    }

    /// Events that have a time, in chronological order.
    pub fn present(&self) -> Vec<(PrayerEvent, DateTime<Utc>)> {
        PrayerEvent::iter()
            .filter_map(|e| self.get(e).map(|t| (e, t)))
            .collect()
    }

    pub fn missing(&self) -> Vec<PrayerEvent> {
        PrayerEvent::iter().filter(|e| self.get(*e).is_none()).collect()
    }

    /// First event strictly after `now`.
    pub fn next_event(&self, now: DateTime<Utc>) -> Option<(PrayerEvent, DateTime<Utc>)> {
        self.present().into_iter().find(|(_, t)| *t > now)
    }
}

// --- ALARMS ---

/// A single reminder ready to be handed to the timer backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAlarm {
    pub notification_id: u32,
    pub trigger: DateTime<Utc>,
    pub kind: PrayerEvent,
    pub day_offset: u32,
    pub title: String,
    pub body: String,
    /// Rendering hint for the notification layer.
    pub image_resource: Option<String>,
    /// When set, firing this alarm tops the horizon back up.
    pub extend_horizon: bool,
}
