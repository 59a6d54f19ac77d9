// File: ./src/config.rs
// Schedule configuration: the single source of truth for what gets reminded,
// plus its on-disk key/value layout.
use crate::context::SharedContext;
use crate::engine::CalculationParams;
use crate::model::{CalculationMethod, GeoCoordinate, Madhab, PrayerEvent};
use crate::storage::FileStore;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Separator of the `prayers` list on disk.
pub const PRAYER_SEPARATOR: &str = ",";
/// Separator of the `random_messages` list on disk. Distinct from the prayer
/// separator because messages routinely contain commas.
pub const MESSAGE_SEPARATOR: &str = "|#|";

/// Largest accepted reminder offset, before or after the event.
pub const MAX_OFFSET_MINUTES: i32 = 24 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub location: GeoCoordinate,
    pub method: CalculationMethod,
    pub madhab: Madhab,
    /// Prayers that get a reminder. Never contains sunrise.
    pub prayers: BTreeSet<PrayerEvent>,
    /// Minutes added to each event time; negative means "before".
    pub offset_minutes: i32,
    pub custom_title: Option<String>,
    pub custom_body: Option<String>,
    /// Alternative bodies; one is drawn at random per alarm when non-empty.
    pub random_messages: Vec<String>,
    pub enabled: bool,
    pub show_image: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            location: GeoCoordinate::default(),
            method: CalculationMethod::default(),
            madhab: Madhab::default(),
            prayers: BTreeSet::new(),
            offset_minutes: 0,
            custom_title: None,
            custom_body: None,
            random_messages: Vec::new(),
            enabled: false,
            show_image: true,
        }
    }
}

impl ScheduleConfig {
    pub fn new(location: GeoCoordinate, method: CalculationMethod, madhab: Madhab) -> Self {
        Self {
            location,
            method,
            madhab,
            ..Self::default()
        }
    }

    pub fn params(&self) -> CalculationParams {
        CalculationParams {
            location: self.location,
            method: self.method,
            madhab: self.madhab,
        }
    }

    /// Rejects input that could not be persisted or scheduled faithfully.
    pub fn validate(&self) -> Result<()> {
        self.location.check()?;

        if self.offset_minutes.abs() > MAX_OFFSET_MINUTES {
            bail!(
                "Offset of {} minutes exceeds {} minutes",
                self.offset_minutes,
                MAX_OFFSET_MINUTES
            );
        }

        if let Some(p) = self.prayers.iter().find(|p| !p.is_remindable()) {
            bail!("'{}' cannot carry a reminder", p);
        }

        for msg in &self.random_messages {
            if msg.trim().is_empty() {
                bail!("Random messages must not be empty");
            }
            if msg.contains(MESSAGE_SEPARATOR) {
                bail!("Random message contains reserved sequence '{}'", MESSAGE_SEPARATOR);
            }
        }

        Ok(())
    }

    /// Whether the cascade has anything to do with this configuration.
    pub fn is_schedulable(&self) -> bool {
        self.enabled && !self.prayers.is_empty() && !self.location.is_unset()
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(&StoredSchedule::from(self))?)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let stored: StoredSchedule = toml::from_str(contents)?;
        Ok(stored.into())
    }
}

// --- ON-DISK LAYOUT ---

fn default_method_id() -> String {
    CalculationMethod::default().to_string()
}

fn default_madhab_id() -> String {
    Madhab::default().to_string()
}

fn default_true() -> bool {
    true
}

/// Flat key/value record. Key names are shared with the platform hosts.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSchedule {
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
    #[serde(default = "default_method_id")]
    method: String,
    #[serde(default = "default_madhab_id")]
    madhab: String,
    #[serde(default)]
    prayers: String,
    #[serde(default)]
    offset_minutes: i32,
    #[serde(default)]
    reminders_enabled: bool,
    #[serde(default = "default_true")]
    show_image: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    random_messages: Option<String>,
}

impl From<&ScheduleConfig> for StoredSchedule {
    fn from(c: &ScheduleConfig) -> Self {
        let prayers: Vec<&str> = c.prayers.iter().map(|p| p.as_ref()).collect();
        Self {
            latitude: c.location.latitude,
            longitude: c.location.longitude,
            method: c.method.to_string(),
            madhab: c.madhab.to_string(),
            prayers: prayers.join(PRAYER_SEPARATOR),
            offset_minutes: c.offset_minutes,
            reminders_enabled: c.enabled,
            show_image: c.show_image,
            custom_title: c.custom_title.clone(),
            custom_body: c.custom_body.clone(),
            random_messages: if c.random_messages.is_empty() {
                None
            } else {
                Some(c.random_messages.join(MESSAGE_SEPARATOR))
            },
        }
    }
}

impl From<StoredSchedule> for ScheduleConfig {
    fn from(s: StoredSchedule) -> Self {
        // Unknown ids are skipped rather than failing the whole record.
        let prayers = s
            .prayers
            .split(PRAYER_SEPARATOR)
            .filter(|p| !p.trim().is_empty())
            .filter_map(|p| {
                let parsed = PrayerEvent::parse_remindable(p);
                if parsed.is_none() {
                    log::warn!("Ignoring unknown prayer '{}' in stored schedule", p);
                }
                parsed
            })
            .collect();

        let random_messages = s
            .random_messages
            .map(|m| {
                m.split(MESSAGE_SEPARATOR)
                    .filter(|msg| !msg.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            location: GeoCoordinate {
                latitude: s.latitude,
                longitude: s.longitude,
            },
            method: CalculationMethod::from_id_or_default(&s.method),
            madhab: Madhab::from_id_or_default(&s.madhab),
            prayers,
            offset_minutes: s.offset_minutes,
            custom_title: s.custom_title,
            custom_body: s.custom_body,
            random_messages,
            enabled: s.reminders_enabled,
            show_image: s.show_image,
        }
    }
}

// --- STORES ---

/// Where the schedule configuration is kept between process lifetimes.
pub trait ConfigStore {
    /// `Ok(None)` means nothing was ever saved.
    fn load(&self) -> Result<Option<ScheduleConfig>>;
    /// Overwrites the stored configuration wholesale.
    fn save(&mut self, config: &ScheduleConfig) -> Result<()>;
}

/// TOML file under the context's config directory.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    ctx: SharedContext,
}

impl FileConfigStore {
    pub fn new(ctx: SharedContext) -> Self {
        Self { ctx }
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Option<ScheduleConfig>> {
        let path = self.ctx.get_schedule_config_path()?;
        let Some(contents) = FileStore::read_locked(&path)? else {
            return Ok(None);
        };
        let config = ScheduleConfig::from_toml(&contents)
            .with_context(|| format!("Failed to parse schedule file '{}'", path.display()))?;
        Ok(Some(config))
    }

    fn save(&mut self, config: &ScheduleConfig) -> Result<()> {
        let path = self.ctx.get_schedule_config_path()?;
        FileStore::write_locked(&path, config.to_toml()?)
    }
}

/// Keeps the configuration in memory only. Used when the host persists
/// state itself, and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    pub config: Option<ScheduleConfig>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ScheduleConfig) -> Self {
        Self {
            config: Some(config),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Option<ScheduleConfig>> {
        Ok(self.config.clone())
    }

    fn save(&mut self, config: &ScheduleConfig) -> Result<()> {
        self.config = Some(config.clone());
        Ok(())
    }
}
