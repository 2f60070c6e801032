//! Decoding of logical frames into typed events.
//!
//! Permissive by design: anything with a valid checksum produces an
//! event, falling back to `UNHANDLED` for opcodes outside the
//! interpreted subset so nothing disappears from the bus silently.

use crate::event::{ChannelAction, ChannelSelector, Direction, DynetEvent, EventKind, EventState};

use super::opcode::Opcode;
use super::packet::DynetPacket;

/// Seconds per fade tick on the wire.
pub const FADE_TICK: f64 = 0.02;

/// Wire sentinel: channel value meaning "whole area".
const CHANNEL_ALL: u16 = 256;

/// Decode a logical packet into an event. Returns `None` only for
/// frames that are outbound-only queries (`REQUEST_CHANNEL_LEVEL`).
pub fn decode(packet: &DynetPacket) -> Option<DynetEvent> {
    let Some(opcode) = packet.opcode() else {
        return Some(unhandled(packet));
    };

    use Opcode::*;
    let event = match opcode {
        Preset1 | Preset2 | Preset3 | Preset4 | Preset5 | Preset6 | Preset7 | Preset8 => {
            preset_bank(packet)
        }
        ReportPreset => DynetEvent {
            preset: Some(u16::from(packet.data[0]) + 1),
            state: Some(EventState::On),
            ..base(packet, EventKind::Preset)
        },
        RequestPreset => base(packet, EventKind::ReqPreset),
        LinearPreset => DynetEvent {
            preset: Some(u16::from(packet.data[0]) + 1),
            fade: Some(wire_fade(packet.data[1], packet.data[2])),
            state: Some(EventState::On),
            ..base(packet, EventKind::Preset)
        },
        ReportChannelLevel => DynetEvent {
            channel: Some(ChannelSelector::Channel(u16::from(packet.data[0]) + 1)),
            target_level: Some(packet.data[1]),
            actual_level: Some(packet.data[2]),
            action: Some(ChannelAction::Report),
            ..base(packet, EventKind::Channel)
        },
        SetChannel1ToLevelWithFade
        | SetChannel2ToLevelWithFade
        | SetChannel3ToLevelWithFade
        | SetChannel4ToLevelWithFade => {
            let offset = u16::from(packet.command) - Opcode::SetChannel1ToLevelWithFade as u16 + 1;
            // The (data1 + 1) mod 256 wrap is what deployed panels
            // emit; preserve it bit-for-bit.
            let bank = (u16::from(packet.data[1]) + 1) % 256;
            DynetEvent {
                channel: Some(ChannelSelector::Channel(bank * 4 + offset)),
                target_level: Some(packet.data[0]),
                action: Some(ChannelAction::Cmd),
                ..base(packet, EventKind::Channel)
            }
        }
        StopFading => DynetEvent {
            channel: Some(channel_or_all(packet.data[0])),
            action: Some(ChannelAction::Cmd),
            ..base(packet, EventKind::Channel)
        },
        FadeChannelAreaToPreset => {
            let channel = channel_or_all(packet.data[0]);
            let preset = Some(u16::from(packet.data[1]) + 1);
            let fade = Some(f64::from(packet.data[2]) * FADE_TICK);
            match channel {
                ChannelSelector::All => DynetEvent {
                    preset,
                    fade,
                    state: Some(EventState::On),
                    ..base(packet, EventKind::Preset)
                },
                ChannelSelector::Channel(_) => DynetEvent {
                    channel: Some(channel),
                    preset,
                    fade,
                    action: Some(ChannelAction::Cmd),
                    ..base(packet, EventKind::Channel)
                },
            }
        }
        RequestChannelLevel => return None,
        _ => unhandled(packet),
    };
    Some(event)
}

fn base(packet: &DynetPacket, kind: EventKind) -> DynetEvent {
    DynetEvent {
        area: Some(packet.area),
        join: Some(packet.join),
        direction: Some(Direction::In),
        raw: Some(packet.encode()),
        ..DynetEvent::new(kind)
    }
}

fn unhandled(packet: &DynetPacket) -> DynetEvent {
    base(packet, EventKind::Unhandled)
}

/// PRESET_1..4 occupy opcodes 0..=3 and PRESET_5..8 occupy 10..=13;
/// data2 selects the bank of eight.
fn preset_bank(packet: &DynetPacket) -> DynetEvent {
    let index = if packet.command <= 3 { packet.command } else { packet.command - 6 };
    let preset = u16::from(index) + u16::from(packet.data[2]) * 8 + 1;
    DynetEvent {
        preset: Some(preset),
        fade: Some(wire_fade(packet.data[0], packet.data[1])),
        state: Some(EventState::On),
        ..base(packet, EventKind::Preset)
    }
}

fn wire_fade(low: u8, high: u8) -> f64 {
    f64::from(u16::from(low) + u16::from(high) * 256) * FADE_TICK
}

fn channel_or_all(data0: u8) -> ChannelSelector {
    let channel = u16::from(data0) + 1;
    if channel == CHANNEL_ALL {
        ChannelSelector::All
    } else {
        ChannelSelector::Channel(channel)
    }
}
