use std::time::Duration;

use dynet_bridge_lib::config::{
    ActiveMode, AreaConfig, AreaKind, ChannelConfig, Config, PresetConfig,
};
use dynet_bridge_lib::connection::WireRequest;
use dynet_bridge_lib::device::{DeviceModel, Query, RetryFired};
use dynet_bridge_lib::dynet::inbound::decode;
use dynet_bridge_lib::dynet::packet::DynetPacket;
use dynet_bridge_lib::event::{ChannelSelector, EventKind, EventState};
use tokio::sync::mpsc;
use tokio::task::yield_now;
use tokio::time::advance;

fn base_cfg() -> Config {
    Config::for_gateway("127.0.0.1", 12345)
}

fn new_model(
    cfg: &Config,
) -> (DeviceModel, mpsc::UnboundedReceiver<WireRequest>, mpsc::UnboundedReceiver<RetryFired>) {
    let (wire_tx, wire_rx) = mpsc::unbounded_channel();
    let (retry_tx, retry_rx) = mpsc::unbounded_channel();
    let model = DeviceModel::new(cfg, wire_tx, retry_tx);
    (model, wire_rx, retry_rx)
}

fn named_preset(name: &str) -> PresetConfig {
    PresetConfig { name: Some(name.into()), fade: None, level: None }
}

async fn settle() {
    for _ in 0..5 {
        yield_now().await;
    }
}

#[tokio::test]
async fn configure_announces_entities_once_in_order() {
    let mut cfg = base_cfg();
    cfg.preset.insert(4, named_preset("Off"));
    let mut area = AreaConfig::default();
    area.name = Some("Kitchen".into());
    area.preset.insert(1, named_preset("Full"));
    area.channel.insert(2, ChannelConfig { name: Some("Bench".into()), fade: None });
    cfg.area.insert(8, area);

    let (mut model, _wire_rx, _retry_rx) = new_model(&cfg);
    model.configure(&cfg);
    let events = model.take_events();
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::NewPreset, EventKind::NewPreset, EventKind::NewChannel]);
    assert_eq!(events[0].preset, Some(1));
    assert_eq!(events[0].name.as_deref(), Some("Kitchen Full"));
    assert_eq!(events[1].preset, Some(4));
    assert_eq!(events[2].channel, Some(ChannelSelector::Channel(2)));

    let area = model.area(8).unwrap();
    assert_eq!(area.presets.len(), 2);
    assert_eq!(area.channels.len(), 1);
    assert_eq!(area.active_preset, None);
}

#[tokio::test]
async fn nodefault_skips_panel_wide_presets() {
    let mut cfg = base_cfg();
    cfg.preset.insert(4, named_preset("Off"));
    let mut area = AreaConfig::default();
    area.nodefault = true;
    area.preset.insert(1, named_preset("Full"));
    cfg.area.insert(8, area);

    let (mut model, _wire_rx, _retry_rx) = new_model(&cfg);
    model.configure(&cfg);
    assert_eq!(model.area(8).unwrap().presets.len(), 1);
}

#[tokio::test]
async fn at_most_one_preset_active() {
    let mut cfg = base_cfg();
    let mut area = AreaConfig::default();
    for id in 1..=4 {
        area.preset.insert(id, PresetConfig::default());
    }
    cfg.area.insert(8, area);
    let (mut model, _wire_rx, _retry_rx) = new_model(&cfg);
    model.configure(&cfg);
    model.take_events();

    model.preset_on(8, 2, false, true, false, None);
    let events = model.take_events();
    assert_eq!(events.len(), 1);
    // Preset 2 is not the on-preset of a light area.
    assert_eq!(events[0].state, Some(EventState::Off));
    assert_eq!(model.area(8).unwrap().active_count(), 1);
    assert_eq!(model.area(8).unwrap().active_preset, Some(2));

    model.preset_on(8, 1, false, true, false, None);
    let events = model.take_events();
    // Sibling OFF first, then the chosen preset.
    assert_eq!(events[0].preset, Some(2));
    assert_eq!(events[0].state, Some(EventState::Off));
    assert_eq!(events[1].preset, Some(1));
    assert_eq!(events[1].state, Some(EventState::On));
    assert_eq!(model.area(8).unwrap().active_count(), 1);
    assert_eq!(model.area(8).unwrap().active_preset, Some(1));
}

#[tokio::test]
async fn cover_areas_use_open_and_closed() {
    let mut cfg = base_cfg();
    let mut area = AreaConfig::default();
    area.kind = AreaKind::Cover;
    area.preset.insert(1, named_preset("Open"));
    area.preset.insert(2, named_preset("Closed"));
    cfg.area.insert(9, area);
    let (mut model, _wire_rx, _retry_rx) = new_model(&cfg);
    model.configure(&cfg);
    model.take_events();

    model.preset_on(9, 1, false, true, false, None);
    assert_eq!(model.take_events()[0].state, Some(EventState::Open));
    model.preset_on(9, 2, false, true, false, None);
    let events = model.take_events();
    assert_eq!(events[0].preset, Some(1));
    assert_eq!(events[0].state, Some(EventState::Closed));
    assert_eq!(events[1].state, Some(EventState::Closed));
}

#[tokio::test]
async fn preset_off_is_noop_for_unknown_presets() {
    let mut cfg = base_cfg();
    let mut area = AreaConfig::default();
    area.preset.insert(1, PresetConfig::default());
    cfg.area.insert(8, area);
    let (mut model, _wire_rx, _retry_rx) = new_model(&cfg);
    model.configure(&cfg);
    model.take_events();

    // An off command for a preset nobody declared must not register it.
    model.preset_off(8, 9);
    assert!(model.take_events().is_empty());
    assert_eq!(model.area(8).unwrap().presets.len(), 1);

    model.preset_on(8, 1, false, false, false, None);
    model.take_events();
    model.preset_off(8, 1);
    let events = model.take_events();
    assert_eq!(events[0].state, Some(EventState::Off));
    assert_eq!(model.area(8).unwrap().active_preset, None);
    assert_eq!(model.area(8).unwrap().active_count(), 0);
}

#[tokio::test]
async fn autodiscover_creates_entities_from_traffic() {
    let mut cfg = base_cfg();
    cfg.autodiscover = true;
    let (mut model, _wire_rx, _retry_rx) = new_model(&cfg);
    model.configure(&cfg);

    let event = decode(&DynetPacket::logical(7, 0, [0, 0, 0])).unwrap();
    model.handle_event(&event);
    let emitted = model.take_events();
    assert!(emitted.iter().any(|e| e.kind == EventKind::NewPreset && e.area == Some(7)));
    // The decoded event itself is broadcast by the orchestrator, not
    // re-emitted by the model.
    assert!(!emitted.iter().any(|e| e.kind == EventKind::Preset));
    assert!(model.area(7).unwrap().presets.contains_key(&1));

    model.handle_event(&event);
    assert!(model.take_events().iter().all(|e| e.kind != EventKind::NewPreset));
}

#[tokio::test]
async fn traffic_for_unknown_areas_is_ignored_without_autodiscover() {
    let cfg = base_cfg();
    let (mut model, _wire_rx, _retry_rx) = new_model(&cfg);
    model.configure(&cfg);

    let event = decode(&DynetPacket::logical(7, 0, [0, 0, 0])).unwrap();
    model.handle_event(&event);
    assert!(model.take_events().is_empty());
    assert!(model.area(7).is_none());
}

#[tokio::test]
async fn set_channel_level_respects_autodiscover() {
    let mut cfg = base_cfg();
    cfg.area.insert(2, AreaConfig::default());
    let (mut model, _wire_rx, _retry_rx) = new_model(&cfg);
    model.configure(&cfg);
    model.take_events();

    model.set_channel_level(2, 5, 0.5, false);
    assert!(model.take_events().is_empty());
    assert!(model.area(2).unwrap().channels.is_empty());

    model.set_channel_level(2, 5, 0.5, true);
    let events = model.take_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::NewChannel);
    let level = model.area(2).unwrap().channels[&5].level;
    assert!((level - 0.5).abs() < 1e-9);

    // Levels are clamped into 0.0..=1.0.
    model.set_channel_level(2, 5, 7.0, false);
    let level = model.area(2).unwrap().channels[&5].level;
    assert!((level - 1.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn channel_report_sets_level_and_polls_during_fade() {
    let mut cfg = base_cfg();
    cfg.active = ActiveMode::On;
    let mut area = AreaConfig::default();
    area.channel.insert(3, ChannelConfig::default());
    cfg.area.insert(5, area);
    let (mut model, mut wire_rx, mut retry_rx) = new_model(&cfg);
    model.configure(&cfg);
    while wire_rx.try_recv().is_ok() {}

    // Target full off, actual full on: a fade is in progress.
    let report =
        decode(&DynetPacket::decode(&[0x1C, 0x05, 0x02, 0x60, 0xFF, 0x01, 0xFF, 0x7E]).unwrap())
            .unwrap();
    model.handle_event(&report);
    let level = model.area(5).unwrap().channels[&3].level;
    assert!((level - 1.0).abs() < 1e-9, "actual level is authoritative in active=on");

    // The poll timer re-queries the channel.
    advance(Duration::from_secs(1)).await;
    settle().await;
    let fired = retry_rx.try_recv().expect("poll retry");
    assert!(matches!(fired.query, Query::ChannelLevel { area: 5, channel: 3 }));
}

#[tokio::test]
async fn settled_channel_report_does_not_poll() {
    let mut cfg = base_cfg();
    cfg.active = ActiveMode::On;
    let mut area = AreaConfig::default();
    area.channel.insert(3, ChannelConfig::default());
    cfg.area.insert(5, area);
    let (mut model, mut wire_rx, _retry_rx) = new_model(&cfg);
    model.configure(&cfg);
    while wire_rx.try_recv().is_ok() {}

    // Target and actual agree: no further polling.
    let report = decode(&DynetPacket::logical(5, 96, [2, 1, 1])).unwrap();
    model.handle_event(&report);
    assert!(wire_rx.try_recv().is_err());
}

#[tokio::test]
async fn channel_command_uses_preset_level_mapping() {
    let mut cfg = base_cfg();
    let mut area = AreaConfig::default();
    area.preset.insert(1, PresetConfig { name: None, fade: None, level: Some(1.0) });
    area.channel.insert(3, ChannelConfig::default());
    cfg.area.insert(4, area);
    let (mut model, _wire_rx, _retry_rx) = new_model(&cfg);
    model.configure(&cfg);
    model.take_events();

    // FADE_CHANNEL_AREA_TO_PRESET for channel 3, preset 1.
    let event = decode(&DynetPacket::logical(4, 107, [2, 0, 100])).unwrap();
    model.handle_event(&event);
    let level = model.area(4).unwrap().channels[&3].level;
    assert!((level - 1.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn area_wide_stop_polls_every_channel() {
    let mut cfg = base_cfg();
    cfg.active = ActiveMode::On;
    let mut area = AreaConfig::default();
    area.channel.insert(1, ChannelConfig::default());
    area.channel.insert(2, ChannelConfig::default());
    cfg.area.insert(6, area);
    let (mut model, mut wire_rx, mut retry_rx) = new_model(&cfg);
    model.configure(&cfg);
    while wire_rx.try_recv().is_ok() {}

    let event = decode(&DynetPacket::logical(6, 118, [255, 0, 0])).unwrap();
    model.handle_event(&event);
    advance(Duration::from_secs(1)).await;
    settle().await;
    let mut polled = Vec::new();
    while let Ok(fired) = retry_rx.try_recv() {
        if let Query::ChannelLevel { channel, .. } = fired.query {
            polled.push(channel);
        }
    }
    polled.sort_unstable();
    assert_eq!(polled, vec![1, 2]);
}
