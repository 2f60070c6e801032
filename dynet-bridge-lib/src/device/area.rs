use std::collections::BTreeMap;

use crate::config::AreaKind;
use crate::retry::RequestCounter;

/// A pre-programmed scene within an area.
#[derive(Debug)]
pub struct Preset {
    pub id: u8,
    pub name: String,
    pub fade: f64,
    /// Channel level this preset stands for, when configured.
    pub level: Option<f64>,
    pub active: bool,
}

/// A dimmable output within an area. `level` is 0.0..=1.0 with 1.0
/// full on.
#[derive(Debug)]
pub struct Channel {
    pub id: u8,
    pub name: String,
    pub fade: f64,
    pub level: f64,
    /// Counter slot for the "current channel level" query.
    pub query: RequestCounter,
}

/// A logical lighting zone addressed by an 8-bit id.
#[derive(Debug)]
pub struct Area {
    pub id: u8,
    pub name: String,
    pub fade: f64,
    pub kind: AreaKind,
    pub on_preset: u8,
    pub open_preset: u8,
    pub close_preset: u8,
    pub presets: BTreeMap<u8, Preset>,
    pub channels: BTreeMap<u8, Channel>,
    /// At most one preset is active at any moment.
    pub active_preset: Option<u8>,
    /// Counter slot for the "current preset" query.
    pub preset_query: RequestCounter,
}

impl Area {
    /// Bare area as created by autodiscovery: no presets or channels
    /// yet, light semantics.
    pub fn bare(id: u8, fade: f64) -> Area {
        Area {
            id,
            name: format!("Area {id}"),
            fade,
            kind: AreaKind::Light,
            on_preset: 1,
            open_preset: 1,
            close_preset: 2,
            presets: BTreeMap::new(),
            channels: BTreeMap::new(),
            active_preset: None,
            preset_query: RequestCounter::new(),
        }
    }

    /// Number of presets currently marked active; 0 or 1 by invariant.
    pub fn active_count(&self) -> usize {
        self.presets.values().filter(|p| p.active).count()
    }
}
