//! Configuration loading and typed config structures for the crossing monitor.
//!
//! The canonical configuration lives in `railguard-config.yaml` at the
//! working directory. This module defines strongly-typed structs that mirror
//! the YAML structure, a loader that reads and validates the file, and the
//! named `DEFAULT_*` constants every field falls back to.
//!
//! All timing and threshold values form one consistent configuration: a 1 s
//! train tick advancing 0.2 km, a 500 ms city tick, a 5 s unit tick, an 8 s
//! incident dwell and a 1 s snapshot broadcast.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Named defaults
// ---------------------------------------------------------------------------

/// Identifier of the simulated train.
pub const DEFAULT_TRAIN_ID: &str = "KA-101";
/// Distance (km) at which every lap starts.
pub const DEFAULT_INITIAL_DISTANCE_KM: f64 = 10.0;
/// Speed (km/h) at which every lap starts.
pub const DEFAULT_INITIAL_SPEED_KMH: f64 = 80.0;
/// Distance covered per train tick (km).
pub const DEFAULT_DISTANCE_STEP_KM: f64 = 0.2;
/// Smallest distance step the metre-rounded simulation can resolve (km).
pub const MIN_DISTANCE_STEP_KM: f64 = 0.001;
/// Speed shed per train tick while an incident is active (km/h).
pub const DEFAULT_INCIDENT_DECELERATION_KMH: f64 = 10.0;
/// Below this distance (km) the train status is `CRITICAL`.
pub const DEFAULT_TRAIN_CRITICAL_KM: f64 = 1.0;
/// Below this distance (km) the train status is `WARNING`.
pub const DEFAULT_TRAIN_WARNING_KM: f64 = 3.0;
/// Train simulation tick (ms).
pub const DEFAULT_TRAIN_TICK_MS: u64 = 1_000;

/// City state machine tick (ms).
pub const DEFAULT_CITY_TICK_MS: u64 = 500;
/// At or below this distance (km) the city goes to maximum alert.
pub const DEFAULT_CITY_CRITICAL_KM: f64 = 0.5;
/// At or below this distance (km) the city goes to partial alert.
pub const DEFAULT_CITY_WARNING_KM: f64 = 1.5;
/// At or below this distance (km) the city starts clearing traffic.
pub const DEFAULT_CITY_CAUTION_KM: f64 = 3.0;
/// Nominal safe distance (km); beyond the caution threshold is all-normal.
pub const DEFAULT_CITY_SAFE_KM: f64 = 5.0;

/// Unit status perturbation tick (ms).
pub const DEFAULT_UNIT_TICK_MS: u64 = 5_000;

/// How long an incident override stays active (ms).
pub const DEFAULT_INCIDENT_DWELL_MS: u64 = 8_000;
/// How many accepted incident reports are kept in memory.
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// Snapshot broadcast tick (ms).
pub const DEFAULT_BROADCAST_TICK_MS: u64 = 1_000;
/// Per-subscriber queue of pending snapshot batches.
pub const DEFAULT_SNAPSHOT_QUEUE: usize = 16;
/// Snapshot hub mailbox capacity.
pub const DEFAULT_HUB_MAILBOX: usize = 64;

/// Per-subscriber queue of pending video frames.
pub const DEFAULT_FRAME_QUEUE: usize = 4;
/// Frame hub mailbox capacity.
pub const DEFAULT_FRAME_MAILBOX: usize = 8;
/// Largest accepted frame (bytes).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 2 * 1024 * 1024;

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Top-level configuration.
///
/// Mirrors the structure of `railguard-config.yaml`. Every field has a
/// default so an empty file (or no file) yields a working setup.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RailguardConfig {
    /// Train simulation parameters.
    #[serde(default)]
    pub train: TrainConfig,

    /// City state machine parameters.
    #[serde(default)]
    pub city: CityConfig,

    /// Unit status simulator parameters.
    #[serde(default)]
    pub units: UnitsConfig,

    /// Incident ingestion parameters.
    #[serde(default)]
    pub incident: IncidentConfig,

    /// Snapshot broadcast parameters.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Video frame hub parameters.
    #[serde(default)]
    pub frames: FrameConfig,

    /// HTTP listener.
    #[serde(default)]
    pub server: HttpConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RailguardConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `RAILGUARD_HOST` overrides `server.host`
    /// - `RAILGUARD_PORT` overrides `server.port`
    /// - `RAILGUARD_LOG` overrides `logging.level`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string without env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Override listener and logging settings from the environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("RAILGUARD_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("RAILGUARD_PORT") {
            self.server.port = val.parse().map_err(|e| ConfigError::Invalid {
                field: "server.port",
                reason: format!("RAILGUARD_PORT={val}: {e}"),
            })?;
        }
        if let Ok(val) = std::env::var("RAILGUARD_LOG") {
            self.logging.level = val;
        }
        Ok(())
    }

    /// Check that intervals are positive and thresholds ascend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_ms("train.tick_interval_ms", self.train.tick_interval_ms)?;
        positive_ms("city.tick_interval_ms", self.city.tick_interval_ms)?;
        positive_ms("units.tick_interval_ms", self.units.tick_interval_ms)?;
        positive_ms("incident.dwell_ms", self.incident.dwell_ms)?;
        positive_ms("broadcast.tick_interval_ms", self.broadcast.tick_interval_ms)?;

        if !(self.train.distance_step_km >= MIN_DISTANCE_STEP_KM) {
            return Err(invalid("train.distance_step_km", "must be >= 0.001 (one metre)"));
        }
        if !(self.train.initial_distance_km > 0.0) {
            return Err(invalid("train.initial_distance_km", "must be > 0"));
        }
        if !(self.train.initial_speed_kmh >= 0.0) || !(self.train.deceleration_kmh >= 0.0) {
            return Err(invalid("train", "speeds must be >= 0"));
        }
        if !(self.train.critical_km < self.train.warning_km) {
            return Err(invalid("train.critical_km", "must be below train.warning_km"));
        }

        let city = &self.city;
        if !(0.0 <= city.critical_km
            && city.critical_km < city.warning_km
            && city.warning_km < city.caution_km
            && city.caution_km <= city.safe_km)
        {
            return Err(invalid(
                "city",
                "thresholds must ascend: critical < warning < caution <= safe",
            ));
        }

        if self.incident.history_capacity == 0 {
            return Err(invalid("incident.history_capacity", "must be > 0"));
        }
        if self.broadcast.subscriber_queue == 0 || self.broadcast.mailbox == 0 {
            return Err(invalid("broadcast", "queue sizes must be > 0"));
        }
        if self.frames.subscriber_queue == 0 || self.frames.mailbox == 0 {
            return Err(invalid("frames", "queue sizes must be > 0"));
        }
        if self.frames.max_frame_bytes == 0 {
            return Err(invalid("frames.max_frame_bytes", "must be > 0"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_owned(),
    }
}

fn positive_ms(field: &'static str, ms: u64) -> Result<(), ConfigError> {
    if ms == 0 {
        return Err(invalid(field, "must be > 0"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Train simulation parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrainConfig {
    /// Train identifier.
    #[serde(default = "default_train_id")]
    pub train_id: String,

    /// Distance at the start of each lap (km).
    #[serde(default = "default_initial_distance_km")]
    pub initial_distance_km: f64,

    /// Speed at the start of each lap (km/h).
    #[serde(default = "default_initial_speed_kmh")]
    pub initial_speed_kmh: f64,

    /// Distance covered per tick (km).
    #[serde(default = "default_distance_step_km")]
    pub distance_step_km: f64,

    /// Speed shed per tick during an incident (km/h).
    #[serde(default = "default_deceleration_kmh")]
    pub deceleration_kmh: f64,

    /// Status is `CRITICAL` below this distance (km).
    #[serde(default = "default_train_critical_km")]
    pub critical_km: f64,

    /// Status is `WARNING` below this distance (km).
    #[serde(default = "default_train_warning_km")]
    pub warning_km: f64,

    /// Tick interval (ms).
    #[serde(default = "default_train_tick_ms")]
    pub tick_interval_ms: u64,
}

impl TrainConfig {
    /// Tick interval as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_id: default_train_id(),
            initial_distance_km: DEFAULT_INITIAL_DISTANCE_KM,
            initial_speed_kmh: DEFAULT_INITIAL_SPEED_KMH,
            distance_step_km: DEFAULT_DISTANCE_STEP_KM,
            deceleration_kmh: DEFAULT_INCIDENT_DECELERATION_KMH,
            critical_km: DEFAULT_TRAIN_CRITICAL_KM,
            warning_km: DEFAULT_TRAIN_WARNING_KM,
            tick_interval_ms: DEFAULT_TRAIN_TICK_MS,
        }
    }
}

/// City state machine parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CityConfig {
    /// Maximum alert at or below this distance (km).
    #[serde(default = "default_city_critical_km")]
    pub critical_km: f64,

    /// Partial alert at or below this distance (km).
    #[serde(default = "default_city_warning_km")]
    pub warning_km: f64,

    /// Traffic clearing at or below this distance (km).
    #[serde(default = "default_city_caution_km")]
    pub caution_km: f64,

    /// Nominal safe distance (km). Only bounds-checked against
    /// `caution_km`: every distance beyond `caution_km` is already `Normal`.
    #[serde(default = "default_city_safe_km")]
    pub safe_km: f64,

    /// Tick interval (ms).
    #[serde(default = "default_city_tick_ms")]
    pub tick_interval_ms: u64,
}

impl CityConfig {
    /// Tick interval as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for CityConfig {
    fn default() -> Self {
        Self {
            critical_km: DEFAULT_CITY_CRITICAL_KM,
            warning_km: DEFAULT_CITY_WARNING_KM,
            caution_km: DEFAULT_CITY_CAUTION_KM,
            safe_km: DEFAULT_CITY_SAFE_KM,
            tick_interval_ms: DEFAULT_CITY_TICK_MS,
        }
    }
}

/// Unit status simulator parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnitsConfig {
    /// Tick interval (ms).
    #[serde(default = "default_unit_tick_ms")]
    pub tick_interval_ms: u64,

    /// RNG seed; `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl UnitsConfig {
    /// Tick interval as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_UNIT_TICK_MS,
            seed: None,
        }
    }
}

/// Incident ingestion parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IncidentConfig {
    /// How long the override stays active (ms).
    #[serde(default = "default_incident_dwell_ms")]
    pub dwell_ms: u64,

    /// How many accepted reports the history ring keeps.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl IncidentConfig {
    /// Dwell time as a [`Duration`].
    pub const fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

impl Default for IncidentConfig {
    fn default() -> Self {
        Self {
            dwell_ms: DEFAULT_INCIDENT_DWELL_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Snapshot broadcast parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BroadcastConfig {
    /// Broadcast tick (ms).
    #[serde(default = "default_broadcast_tick_ms")]
    pub tick_interval_ms: u64,

    /// Pending batches per subscriber before batches are dropped for it.
    #[serde(default = "default_snapshot_queue")]
    pub subscriber_queue: usize,

    /// Hub mailbox capacity.
    #[serde(default = "default_hub_mailbox")]
    pub mailbox: usize,
}

impl BroadcastConfig {
    /// Tick interval as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_BROADCAST_TICK_MS,
            subscriber_queue: DEFAULT_SNAPSHOT_QUEUE,
            mailbox: DEFAULT_HUB_MAILBOX,
        }
    }
}

/// Video frame hub parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FrameConfig {
    /// Pending frames per subscriber before frames are dropped for it.
    #[serde(default = "default_frame_queue")]
    pub subscriber_queue: usize,

    /// Hub mailbox capacity.
    #[serde(default = "default_frame_mailbox")]
    pub mailbox: usize,

    /// Largest accepted frame (bytes).
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            subscriber_queue: DEFAULT_FRAME_QUEUE,
            mailbox: DEFAULT_FRAME_MAILBOX,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpConfig {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_PORT,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// serde default functions
// ---------------------------------------------------------------------------

fn default_train_id() -> String {
    String::from(DEFAULT_TRAIN_ID)
}

const fn default_initial_distance_km() -> f64 {
    DEFAULT_INITIAL_DISTANCE_KM
}

const fn default_initial_speed_kmh() -> f64 {
    DEFAULT_INITIAL_SPEED_KMH
}

const fn default_distance_step_km() -> f64 {
    DEFAULT_DISTANCE_STEP_KM
}

const fn default_deceleration_kmh() -> f64 {
    DEFAULT_INCIDENT_DECELERATION_KMH
}

const fn default_train_critical_km() -> f64 {
    DEFAULT_TRAIN_CRITICAL_KM
}

const fn default_train_warning_km() -> f64 {
    DEFAULT_TRAIN_WARNING_KM
}

const fn default_train_tick_ms() -> u64 {
    DEFAULT_TRAIN_TICK_MS
}

const fn default_city_critical_km() -> f64 {
    DEFAULT_CITY_CRITICAL_KM
}

const fn default_city_warning_km() -> f64 {
    DEFAULT_CITY_WARNING_KM
}

const fn default_city_caution_km() -> f64 {
    DEFAULT_CITY_CAUTION_KM
}

const fn default_city_safe_km() -> f64 {
    DEFAULT_CITY_SAFE_KM
}

const fn default_city_tick_ms() -> u64 {
    DEFAULT_CITY_TICK_MS
}

const fn default_unit_tick_ms() -> u64 {
    DEFAULT_UNIT_TICK_MS
}

const fn default_incident_dwell_ms() -> u64 {
    DEFAULT_INCIDENT_DWELL_MS
}

const fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

const fn default_broadcast_tick_ms() -> u64 {
    DEFAULT_BROADCAST_TICK_MS
}

const fn default_snapshot_queue() -> usize {
    DEFAULT_SNAPSHOT_QUEUE
}

const fn default_hub_mailbox() -> usize {
    DEFAULT_HUB_MAILBOX
}

const fn default_frame_queue() -> usize {
    DEFAULT_FRAME_QUEUE
}

const fn default_frame_mailbox() -> usize {
    DEFAULT_FRAME_MAILBOX
}

const fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

fn default_host() -> String {
    String::from(DEFAULT_HOST)
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    String::from(DEFAULT_LOG_LEVEL)
}
