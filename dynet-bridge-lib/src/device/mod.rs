//! The live panel model: areas, presets and channels, plus the
//! query-scheduling side of the request-retry engine.
//!
//! The model is owned by the engine task; every method runs on that
//! task, so there is no locking. Wire traffic leaves through the
//! connection's request channel and retry timers report back through
//! the engine's retry channel.

pub mod area;

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{ActiveMode, AreaKind, Config, PresetConfig, ChannelConfig};
use crate::connection::WireRequest;
use crate::dynet::outbound;
use crate::event::{ChannelAction, ChannelSelector, DynetEvent, EventKind, EventState};
use crate::retry::{
    self, RequestCounter, RetryDelay, INITIAL_RETRY_DELAY, STARTUP_RETRY_DELAY,
};

pub use area::{Area, Channel, Preset};

/// One state query the retry engine can keep alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Preset { area: u8 },
    ChannelLevel { area: u8, channel: u8 },
}

/// A retry timer elapsed. `sampled` is the slot sequence at arming
/// time; a mismatch means the answer already arrived.
#[derive(Debug)]
pub struct RetryFired {
    pub query: Query,
    pub sampled: u64,
    pub elapsed: Duration,
}

pub struct DeviceModel {
    active: ActiveMode,
    autodiscover: bool,
    polltimer: Duration,
    default_fade: f64,
    areas: BTreeMap<u8, Area>,
    wire: mpsc::UnboundedSender<WireRequest>,
    retry_tx: mpsc::UnboundedSender<RetryFired>,
    /// Events produced by model operations, drained by the engine
    /// after each operation and broadcast in order.
    pending: Vec<DynetEvent>,
}

impl DeviceModel {
    pub fn new(
        cfg: &Config,
        wire: mpsc::UnboundedSender<WireRequest>,
        retry_tx: mpsc::UnboundedSender<RetryFired>,
    ) -> DeviceModel {
        DeviceModel {
            active: cfg.active,
            autodiscover: cfg.autodiscover,
            polltimer: Duration::from_secs_f64(cfg.polltimer),
            default_fade: cfg.default.fade,
            areas: BTreeMap::new(),
            wire,
            retry_tx,
            pending: Vec::new(),
        }
    }

    pub fn autodiscover(&self) -> bool {
        self.autodiscover
    }

    pub fn active(&self) -> ActiveMode {
        self.active
    }

    pub fn area(&self, id: u8) -> Option<&Area> {
        self.areas.get(&id)
    }

    pub fn take_events(&mut self) -> Vec<DynetEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Build every configured area. Presets and channels announce
    /// themselves with NEWPRESET/NEWCHANNEL exactly once; the first
    /// state queries are scheduled according to the active mode.
    pub fn configure(&mut self, cfg: &Config) {
        for (&area_id, area_cfg) in &cfg.area {
            let mut area = Area {
                id: area_id,
                name: area_cfg.name.clone().unwrap_or_else(|| format!("Area {area_id}")),
                fade: area_cfg.fade.unwrap_or(self.default_fade),
                kind: area_cfg.kind,
                on_preset: area_cfg.on_preset.unwrap_or(1),
                open_preset: area_cfg.open_preset.unwrap_or(1),
                close_preset: area_cfg.close_preset.unwrap_or(2),
                presets: BTreeMap::new(),
                channels: BTreeMap::new(),
                active_preset: None,
                preset_query: RequestCounter::new(),
            };
            debug!(area = area_id, name = %area.name, fade = area.fade, "creating area");
            for (&preset_id, preset_cfg) in &area_cfg.preset {
                insert_preset(&mut area, &mut self.pending, preset_id, Some(preset_cfg));
            }
            if !area_cfg.nodefault {
                for (&preset_id, preset_cfg) in &cfg.preset {
                    insert_preset(&mut area, &mut self.pending, preset_id, Some(preset_cfg));
                }
            }
            for (&channel_id, channel_cfg) in &area_cfg.channel {
                insert_channel(&mut area, &mut self.pending, channel_id, Some(channel_cfg));
            }
            let channel_ids: Vec<u8> = area.channels.keys().copied().collect();
            self.areas.insert(area_id, area);
            self.schedule_startup_queries(area_id, &channel_ids);
        }
    }

    /// Mark `preset` active in `area` and every sibling inactive.
    /// Sibling OFF events are emitted first; the chosen preset's own
    /// event only when `send_notify` (inbound traffic suppresses it
    /// because the decoded event is broadcast by the caller).
    pub fn preset_on(
        &mut self,
        area_id: u8,
        preset: u16,
        send_wire: bool,
        send_notify: bool,
        autodiscover: bool,
        fade: Option<f64>,
    ) {
        let Some(preset_id) = valid_preset(preset) else {
            warn!(area = area_id, preset, "ignoring preset out of range");
            return;
        };
        if !self.areas.contains_key(&area_id) {
            if autodiscover {
                self.discover_area(area_id);
            } else {
                // Unconfigured area: the command still goes out, the
                // model just has nothing to track.
                if send_wire {
                    send_select(&self.wire, area_id, preset_id, fade.unwrap_or(self.default_fade));
                }
                return;
            }
        }

        let resolved_fade;
        {
            let Some(area) = self.areas.get_mut(&area_id) else { return };
            if !area.presets.contains_key(&preset_id) {
                if autodiscover {
                    insert_preset(area, &mut self.pending, preset_id, None);
                } else {
                    if send_wire {
                        send_select(&self.wire, area_id, preset_id, fade.unwrap_or(area.fade));
                    }
                    return;
                }
            }

            let (chosen_state, sibling_state) = match area.kind {
                AreaKind::Light => (
                    if preset_id == area.on_preset { EventState::On } else { EventState::Off },
                    EventState::Off,
                ),
                AreaKind::Cover => (
                    if preset_id == area.open_preset {
                        EventState::Open
                    } else {
                        EventState::Closed
                    },
                    EventState::Closed,
                ),
            };

            for (&sibling_id, sibling) in area.presets.iter_mut() {
                if sibling_id != preset_id && sibling.active {
                    sibling.active = false;
                    self.pending.push(DynetEvent {
                        area: Some(area_id),
                        preset: Some(u16::from(sibling_id)),
                        state: Some(sibling_state),
                        name: Some(format!("{} {}", area.name, sibling.name)),
                        ..DynetEvent::new(EventKind::Preset)
                    });
                }
            }

            let Some(chosen) = area.presets.get_mut(&preset_id) else { return };
            chosen.active = true;
            area.active_preset = Some(preset_id);
            resolved_fade = fade.unwrap_or(chosen.fade);
            if send_notify {
                self.pending.push(DynetEvent {
                    area: Some(area_id),
                    preset: Some(u16::from(preset_id)),
                    fade: Some(resolved_fade),
                    state: Some(chosen_state),
                    name: Some(format!("{} {}", area.name, chosen.name)),
                    ..DynetEvent::new(EventKind::Preset)
                });
            }
        }

        if send_wire {
            send_select(&self.wire, area_id, preset_id, resolved_fade);
            if self.active == ActiveMode::On {
                self.request_all_channel_levels(
                    area_id,
                    RetryDelay::After(INITIAL_RETRY_DELAY),
                    false,
                );
            }
        }
    }

    /// Mark a known preset inactive. Unknown presets are ignored, not
    /// auto-created.
    pub fn preset_off(&mut self, area_id: u8, preset: u16) {
        let Some(preset_id) = valid_preset(preset) else { return };
        let Some(area) = self.areas.get_mut(&area_id) else { return };
        let Some(entry) = area.presets.get_mut(&preset_id) else { return };
        entry.active = false;
        if area.active_preset == Some(preset_id) {
            area.active_preset = None;
        }
        let state = match area.kind {
            AreaKind::Light => EventState::Off,
            AreaKind::Cover => EventState::Closed,
        };
        self.pending.push(DynetEvent {
            area: Some(area_id),
            preset: Some(u16::from(preset_id)),
            state: Some(state),
            name: Some(format!("{} {}", area.name, entry.name)),
            ..DynetEvent::new(EventKind::Preset)
        });
    }

    /// Record a channel level. The counter slot advances first, so
    /// the answer cancels any pending retry, then the level is stored
    /// (auto-creating the channel iff `autodiscover`).
    pub fn set_channel_level(&mut self, area_id: u8, channel: u16, level: f64, autodiscover: bool) {
        let Some(channel_id) = valid_channel(channel) else {
            warn!(area = area_id, channel, "ignoring channel out of range");
            return;
        };
        if !self.areas.contains_key(&area_id) {
            if autodiscover {
                self.discover_area(area_id);
            } else {
                return;
            }
        }
        let created;
        {
            let Some(area) = self.areas.get_mut(&area_id) else { return };
            created = !area.channels.contains_key(&channel_id);
            if created {
                if !autodiscover {
                    return;
                }
                insert_channel(area, &mut self.pending, channel_id, None);
            }
        }
        if created {
            self.schedule_channel_query(area_id, channel_id);
        }
        let Some(area) = self.areas.get_mut(&area_id) else { return };
        let Some(entry) = area.channels.get_mut(&channel_id) else { return };
        entry.query.update();
        entry.level = level.clamp(0.0, 1.0);
    }

    /// Ask the panel for the current preset of `area`, kept alive by
    /// the retry engine until a preset report lands.
    pub fn request_preset(&mut self, area_id: u8, delay: RetryDelay, immediate: bool) {
        if self.refuse_when_inactive("preset query") {
            return;
        }
        let wire = self.wire.clone();
        let retry_tx = self.retry_tx.clone();
        let Some(area) = self.areas.get_mut(&area_id) else { return };
        let query = Query::Preset { area: area_id };
        match delay {
            RetryDelay::NoRetry => send_query(&wire, &area.preset_query, query),
            RetryDelay::After(delay) => {
                if immediate {
                    send_query(&wire, &area.preset_query, query);
                }
                let fired =
                    RetryFired { query, sampled: area.preset_query.sequence(), elapsed: delay };
                retry::arm_timer(&mut area.preset_query, delay, &retry_tx, fired);
            }
        }
    }

    /// Ask the panel for one channel's level, kept alive until a
    /// channel report lands.
    pub fn request_channel_level(
        &mut self,
        area_id: u8,
        channel_id: u8,
        delay: RetryDelay,
        immediate: bool,
    ) {
        if self.refuse_when_inactive("channel level query") {
            return;
        }
        let wire = self.wire.clone();
        let retry_tx = self.retry_tx.clone();
        let Some(area) = self.areas.get_mut(&area_id) else { return };
        let Some(entry) = area.channels.get_mut(&channel_id) else { return };
        let query = Query::ChannelLevel { area: area_id, channel: channel_id };
        match delay {
            RetryDelay::NoRetry => send_query(&wire, &entry.query, query),
            RetryDelay::After(delay) => {
                if immediate {
                    send_query(&wire, &entry.query, query);
                }
                let fired = RetryFired { query, sampled: entry.query.sequence(), elapsed: delay };
                retry::arm_timer(&mut entry.query, delay, &retry_tx, fired);
            }
        }
    }

    pub fn request_all_channel_levels(&mut self, area_id: u8, delay: RetryDelay, immediate: bool) {
        let Some(area) = self.areas.get(&area_id) else { return };
        let channels: Vec<u8> = area.channels.keys().copied().collect();
        for channel_id in channels {
            self.request_channel_level(area_id, channel_id, delay, immediate);
        }
    }

    /// Closed-loop handling of decoded inbound traffic. The caller
    /// broadcasts the event itself afterwards, so everything emitted
    /// here (sibling OFFs, discoveries) precedes it.
    pub fn handle_event(&mut self, event: &DynetEvent) {
        match event.kind {
            EventKind::Preset => self.handle_preset_event(event),
            EventKind::Channel => self.handle_channel_event(event),
            _ => {}
        }
    }

    /// A retry timer elapsed: resend unless the answer arrived, then
    /// re-arm with the doubled delay.
    pub fn handle_retry(&mut self, fired: RetryFired) {
        let wire = self.wire.clone();
        let retry_tx = self.retry_tx.clone();
        let Some(slot) = self.slot_mut(fired.query) else { return };
        if slot.sequence() != fired.sampled {
            slot.disarm();
            return;
        }
        send_query(&wire, slot, fired.query);
        let next = retry::next_delay(fired.elapsed);
        let refire = RetryFired { query: fired.query, sampled: fired.sampled, elapsed: next };
        retry::arm_timer(slot, next, &retry_tx, refire);
    }

    /// Fade for a select-preset command: preset override, then area,
    /// then the panel default.
    pub fn preset_fade(&self, area_id: u8, preset_id: u8) -> f64 {
        match self.areas.get(&area_id) {
            Some(area) => {
                area.presets.get(&preset_id).map(|p| p.fade).unwrap_or(area.fade)
            }
            None => self.default_fade,
        }
    }

    pub fn channel_fade(&self, area_id: u8, channel_id: u8) -> f64 {
        match self.areas.get(&area_id) {
            Some(area) => {
                area.channels.get(&channel_id).map(|c| c.fade).unwrap_or(area.fade)
            }
            None => self.default_fade,
        }
    }

    pub fn area_fade(&self, area_id: u8) -> f64 {
        self.areas.get(&area_id).map(|a| a.fade).unwrap_or(self.default_fade)
    }

    fn handle_preset_event(&mut self, event: &DynetEvent) {
        let (Some(area_id), Some(preset)) = (event.area, event.preset) else { return };
        let autodiscover = self.autodiscover;
        self.preset_on(area_id, preset, false, false, autodiscover, event.fade);
        if let Some(area) = self.areas.get_mut(&area_id) {
            area.preset_query.update();
        }
    }

    fn handle_channel_event(&mut self, event: &DynetEvent) {
        let Some(area_id) = event.area else { return };
        let autodiscover = self.autodiscover;
        match event.action {
            Some(ChannelAction::Report) => {
                let Some(ChannelSelector::Channel(channel)) = event.channel else { return };
                let (Some(target), Some(actual)) = (event.target_level, event.actual_level) else {
                    return;
                };
                // In active=on the actual level is authoritative;
                // otherwise only the target is meaningful.
                let level = if self.active == ActiveMode::On {
                    wire_to_level(actual)
                } else {
                    wire_to_level(target)
                };
                self.set_channel_level(area_id, channel, level, autodiscover);
                if actual != target {
                    // Fade in progress: poll until they agree.
                    if let Some(channel_id) = valid_channel(channel) {
                        self.request_channel_level(
                            area_id,
                            channel_id,
                            RetryDelay::After(self.polltimer),
                            false,
                        );
                    }
                }
            }
            Some(ChannelAction::Cmd) => match event.channel {
                Some(ChannelSelector::All) => {
                    self.request_all_channel_levels(
                        area_id,
                        RetryDelay::After(self.polltimer),
                        false,
                    );
                }
                Some(ChannelSelector::Channel(channel)) => {
                    if let Some(level) = self.cmd_target_level(area_id, event) {
                        self.set_channel_level(area_id, channel, level, autodiscover);
                    }
                    if let Some(channel_id) = valid_channel(channel) {
                        self.request_channel_level(
                            area_id,
                            channel_id,
                            RetryDelay::After(self.polltimer),
                            false,
                        );
                    }
                }
                None => {}
            },
            None => {}
        }
    }

    /// Target level for a channel command: a configured per-preset
    /// level wins over the wire byte.
    fn cmd_target_level(&self, area_id: u8, event: &DynetEvent) -> Option<f64> {
        if let Some(preset) = event.preset {
            if let (Some(area), Some(preset_id)) = (self.areas.get(&area_id), valid_preset(preset))
            {
                if let Some(level) = area.presets.get(&preset_id).and_then(|p| p.level) {
                    return Some(level);
                }
            }
        }
        event.target_level.map(wire_to_level)
    }

    fn discover_area(&mut self, area_id: u8) {
        if self.areas.contains_key(&area_id) {
            return;
        }
        info!(area = area_id, "discovered area");
        self.areas.insert(area_id, Area::bare(area_id, self.default_fade));
        self.schedule_startup_queries(area_id, &[]);
    }

    fn schedule_startup_queries(&mut self, area_id: u8, channels: &[u8]) {
        let Some((delay, immediate)) = self.startup_policy() else { return };
        self.request_preset(area_id, delay, immediate);
        for &channel_id in channels {
            self.request_channel_level(area_id, channel_id, delay, immediate);
        }
    }

    fn schedule_channel_query(&mut self, area_id: u8, channel_id: u8) {
        if let Some((delay, immediate)) = self.startup_policy() {
            self.request_channel_level(area_id, channel_id, delay, immediate);
        }
    }

    fn startup_policy(&self) -> Option<(RetryDelay, bool)> {
        match self.active {
            ActiveMode::On => Some((RetryDelay::After(STARTUP_RETRY_DELAY), true)),
            ActiveMode::Init => Some((RetryDelay::NoRetry, true)),
            ActiveMode::Off => None,
        }
    }

    fn refuse_when_inactive(&self, what: &str) -> bool {
        if self.active == ActiveMode::Off {
            debug!(what, "refusing state query in active=off mode");
            true
        } else {
            false
        }
    }

    fn slot_mut(&mut self, query: Query) -> Option<&mut RequestCounter> {
        match query {
            Query::Preset { area } => self.areas.get_mut(&area).map(|a| &mut a.preset_query),
            Query::ChannelLevel { area, channel } => {
                self.areas.get_mut(&area)?.channels.get_mut(&channel).map(|c| &mut c.query)
            }
        }
    }
}

/// Wire level byte to 0.0..=1.0 (wire 1 is full on, 255 full off).
pub fn wire_to_level(wire: u8) -> f64 {
    ((255.0 - f64::from(wire)) / 254.0).clamp(0.0, 1.0)
}

fn valid_preset(preset: u16) -> Option<u8> {
    match u8::try_from(preset) {
        Ok(id) if (1..=outbound::MAX_PRESET).contains(&id) => Some(id),
        _ => None,
    }
}

fn valid_channel(channel: u16) -> Option<u8> {
    match u8::try_from(channel) {
        Ok(id) if id >= 1 => Some(id),
        _ => None,
    }
}

fn insert_preset(
    area: &mut Area,
    pending: &mut Vec<DynetEvent>,
    preset_id: u8,
    cfg: Option<&PresetConfig>,
) {
    if area.presets.contains_key(&preset_id) {
        return;
    }
    let name = cfg
        .and_then(|c| c.name.clone())
        .unwrap_or_else(|| format!("Preset {preset_id}"));
    let fade = cfg.and_then(|c| c.fade).unwrap_or(area.fade);
    let level = cfg.and_then(|c| c.level);
    debug!(area = area.id, preset = preset_id, name = %name, fade, "creating preset");
    pending.push(DynetEvent {
        area: Some(area.id),
        preset: Some(u16::from(preset_id)),
        state: Some(EventState::Off),
        name: Some(format!("{} {}", area.name, name)),
        ..DynetEvent::new(EventKind::NewPreset)
    });
    area.presets.insert(preset_id, Preset { id: preset_id, name, fade, level, active: false });
}

fn insert_channel(
    area: &mut Area,
    pending: &mut Vec<DynetEvent>,
    channel_id: u8,
    cfg: Option<&ChannelConfig>,
) {
    if area.channels.contains_key(&channel_id) {
        return;
    }
    let name = cfg
        .and_then(|c| c.name.clone())
        .unwrap_or_else(|| format!("Channel {channel_id}"));
    let fade = cfg.and_then(|c| c.fade).unwrap_or(area.fade);
    debug!(area = area.id, channel = channel_id, name = %name, fade, "creating channel");
    pending.push(DynetEvent {
        area: Some(area.id),
        channel: Some(ChannelSelector::Channel(u16::from(channel_id))),
        name: Some(format!("{} {}", area.name, name)),
        ..DynetEvent::new(EventKind::NewChannel)
    });
    area.channels.insert(
        channel_id,
        Channel { id: channel_id, name, fade, level: 0.0, query: RequestCounter::new() },
    );
}

fn send_select(wire: &mpsc::UnboundedSender<WireRequest>, area: u8, preset: u8, fade: f64) {
    match outbound::select_preset(area, preset, fade) {
        Ok(packet) => {
            let _ = wire.send(WireRequest::plain(packet));
        }
        Err(e) => warn!(area, preset, error = %e, "cannot build preset frame"),
    }
}

fn send_query(wire: &mpsc::UnboundedSender<WireRequest>, slot: &RequestCounter, query: Query) {
    let packet = match query {
        Query::Preset { area } => outbound::request_preset(area),
        Query::ChannelLevel { area, channel } => match outbound::request_channel_level(area, channel)
        {
            Ok(packet) => packet,
            Err(_) => return,
        },
    };
    let _ = wire.send(WireRequest::guarded(packet, slot.guard()));
}
