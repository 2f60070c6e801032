use std::collections::BTreeMap;

use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};

/// Whether the library actively polls the panel for state.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActiveMode {
    /// Never poll. State queries are refused.
    #[default]
    Off,
    /// Poll each entity once at start-up, no retries.
    Init,
    /// Poll at start-up and keep every query alive until answered.
    On,
}

/// Area kind, selecting how preset changes map to a state.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AreaKind {
    #[default]
    Light,
    Cover,
}

/// Log line formatter
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
}

/// Logging configuration
/// Controls application-level structured logging (stdout/stderr)
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    /// Default: "info"
    /// Can be overridden at runtime via RUST_LOG environment variable
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Line format: "full", "compact" or "pretty"
    /// Default: "full"
    #[serde(default)]
    pub format: LogFormat,
    /// Show module path (target) in log messages
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
}

/// Panel-wide defaults applied where an entity does not override them
#[derive(Debug, Deserialize, Clone)]
pub struct Defaults {
    /// Fade in seconds for preset and level changes
    /// Default: 2.0
    #[serde(default = "default_fade")]
    pub fade: f64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self { fade: default_fade() }
    }
}

/// A preset within an area (or a panel-wide default preset)
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PresetConfig {
    /// Display name; "Preset <n>" when omitted
    pub name: Option<String>,
    /// Fade in seconds; falls back to the area fade
    pub fade: Option<f64>,
    /// Channel level 0.0..=1.0 associated with this preset, used when
    /// a channel command names the preset instead of a level
    pub level: Option<f64>,
}

/// A dimmable output within an area
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChannelConfig {
    /// Display name; "Channel <n>" when omitted
    pub name: Option<String>,
    /// Fade in seconds; falls back to the area fade
    pub fade: Option<f64>,
}

/// One logical area on the panel
#[serde_as]
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AreaConfig {
    /// Display name; "Area <n>" when omitted
    pub name: Option<String>,
    /// Default fade in seconds for this area
    pub fade: Option<f64>,
    /// Skip the panel-wide default presets for this area
    /// Default: false
    #[serde(default)]
    pub nodefault: bool,
    /// "light" (default) or "cover"
    #[serde(default)]
    pub kind: AreaKind,
    /// Preset that means "on" for a light area
    /// Default: 1
    pub on_preset: Option<u8>,
    /// Preset that means "open" for a cover area
    /// Default: 1
    pub open_preset: Option<u8>,
    /// Preset that means "closed" for a cover area
    /// Default: 2
    pub close_preset: Option<u8>,
    /// Presets keyed by preset number (1..=64)
    #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
    #[serde(default)]
    pub preset: BTreeMap<u8, PresetConfig>,
    /// Channels keyed by channel number (1..=255)
    #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
    #[serde(default)]
    pub channel: BTreeMap<u8, ChannelConfig>,
}

/// Main configuration structure
#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// RS485-to-IP gateway host. Required.
    pub host: String,
    /// Gateway TCP port
    /// Default: 12345
    #[serde(default = "default_port")]
    pub port: u16,
    /// Create areas, presets and channels on first sight instead of
    /// ignoring traffic for unconfigured entities
    /// Default: false
    #[serde(default)]
    pub autodiscover: bool,
    /// Seconds between level polls while a fade is in progress
    /// Default: 1.0
    #[serde(default = "default_polltimer")]
    pub polltimer: f64,
    /// Active polling mode: "off", "init" or "on"
    /// Default: "off"
    #[serde(default)]
    pub active: ActiveMode,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Panel-wide defaults
    #[serde(default)]
    pub default: Defaults,
    /// Default presets applied to every area without `nodefault`,
    /// keyed by preset number (1..=64)
    #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
    #[serde(default)]
    pub preset: BTreeMap<u8, PresetConfig>,
    /// Areas keyed by area number (1..=255)
    #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
    #[serde(default)]
    pub area: BTreeMap<u8, AreaConfig>,
}

impl Config {
    /// Minimal configuration for a gateway address; everything else
    /// takes defaults.
    pub fn for_gateway(host: impl Into<String>, port: u16) -> Config {
        Config {
            host: host.into(),
            port,
            autodiscover: false,
            polltimer: default_polltimer(),
            active: ActiveMode::default(),
            logging: LoggingConfig::default(),
            default: Defaults::default(),
            preset: BTreeMap::new(),
            area: BTreeMap::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_fade() -> f64 {
    2.0
}

fn default_port() -> u16 {
    12345
}

fn default_polltimer() -> f64 {
    1.0
}
