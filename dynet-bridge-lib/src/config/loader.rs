use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::dynet::outbound::MAX_PRESET;
use crate::error::{BridgeError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| BridgeError::Config(format!("Failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| BridgeError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.host.trim().is_empty() {
        return Err(BridgeError::Config("host must not be empty".into()));
    }
    if !(cfg.polltimer.is_finite() && cfg.polltimer > 0.0) {
        return Err(BridgeError::Config(format!("polltimer must be positive, got {}", cfg.polltimer)));
    }
    check_fade("default.fade", cfg.default.fade)?;

    for (&preset_id, preset) in &cfg.preset {
        check_preset_entry("preset", preset_id, preset.fade, preset.level)?;
    }

    for (&area_id, area) in &cfg.area {
        if area_id == 0 {
            return Err(BridgeError::Config("area 0 is not addressable".into()));
        }
        if let Some(fade) = area.fade {
            check_fade(&format!("area.{area_id}.fade"), fade)?;
        }
        for (&preset_id, preset) in &area.preset {
            check_preset_entry(&format!("area.{area_id}.preset"), preset_id, preset.fade, preset.level)?;
        }
        for (&channel_id, channel) in &area.channel {
            if channel_id == 0 {
                return Err(BridgeError::Config(format!(
                    "area.{area_id}.channel.0 is not addressable"
                )));
            }
            if let Some(fade) = channel.fade {
                check_fade(&format!("area.{area_id}.channel.{channel_id}.fade"), fade)?;
            }
        }
    }

    Ok(())
}

fn check_preset_entry(table: &str, preset_id: u8, fade: Option<f64>, level: Option<f64>) -> Result<()> {
    if preset_id == 0 || preset_id > MAX_PRESET {
        return Err(BridgeError::Config(format!(
            "{table}.{preset_id} outside 1..={MAX_PRESET}"
        )));
    }
    if let Some(fade) = fade {
        check_fade(&format!("{table}.{preset_id}.fade"), fade)?;
    }
    if let Some(level) = level {
        if !(0.0..=1.0).contains(&level) {
            return Err(BridgeError::Config(format!(
                "{table}.{preset_id}.level {level} outside 0.0..=1.0"
            )));
        }
    }
    Ok(())
}

fn check_fade(what: &str, fade: f64) -> Result<()> {
    if fade.is_finite() && fade >= 0.0 {
        Ok(())
    } else {
        Err(BridgeError::Config(format!("{what} must be a non-negative number, got {fade}")))
    }
}
