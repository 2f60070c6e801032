//! Building outbound frames from high-level commands.
//!
//! Strict where inbound is permissive: a request that cannot be
//! represented in valid wire bytes is rejected here and nothing is
//! sent.

use crate::error::{BridgeError, Result};

use super::opcode::Opcode;
use super::packet::DynetPacket;

pub const MAX_PRESET: u8 = 64;

/// Fade ticks, computed as round(fade * 50) rather than repeated
/// division to avoid float drift.
fn fade_ticks(fade: f64) -> Result<u32> {
    if !fade.is_finite() || fade < 0.0 {
        return Err(BridgeError::Fade(fade));
    }
    Ok((fade * 50.0).round() as u32)
}

fn check_preset(preset: u8) -> Result<()> {
    if (1..=MAX_PRESET).contains(&preset) {
        Ok(())
    } else {
        Err(BridgeError::Range {
            entity: "preset",
            value: u32::from(preset),
            min: 1,
            max: u32::from(MAX_PRESET),
        })
    }
}

fn check_channel(channel: u8) -> Result<()> {
    if channel >= 1 {
        Ok(())
    } else {
        Err(BridgeError::Range { entity: "channel", value: 0, min: 1, max: 255 })
    }
}

/// Select a preset in an area. Presets are numbered 1..=64 and are
/// encoded as a bank of eight plus an opcode within the bank.
pub fn select_preset(area: u8, preset: u8, fade: f64) -> Result<DynetPacket> {
    check_preset(preset)?;
    let ticks = fade_ticks(fade)?;
    if ticks > u32::from(u16::MAX) {
        return Err(BridgeError::Fade(fade));
    }
    let index = preset - 1;
    let bank = index / 8;
    let mut opcode = index % 8;
    if opcode > 3 {
        opcode += 6;
    }
    let fade_low = (ticks % 256) as u8;
    let fade_high = (ticks / 256) as u8;
    Ok(DynetPacket::logical(area, opcode, [fade_low, fade_high, bank]))
}

/// Turn every channel in the area off. Fade resolution on the wire is
/// a tenth of a second, so the value is clamped to 0.0..=25.5.
pub fn area_off(area: u8, fade: f64) -> DynetPacket {
    let fade = if fade.is_finite() { fade.clamp(0.0, 25.5) } else { 0.0 };
    DynetPacket::logical(area, Opcode::TurnAllAreasOff as u8, [255, 0, (fade * 10.0) as u8])
}

/// Fade one channel to a level in `0.0..=1.0` (1.0 is full on). The
/// wire encodes 1 as full on and 255 as full off.
pub fn set_channel_level(area: u8, channel: u8, level: f64, fade: f64) -> Result<DynetPacket> {
    check_channel(channel)?;
    if !(0.0..=1.0).contains(&level) {
        return Err(BridgeError::Level(level));
    }
    let channel_bank = if channel <= 4 { 0xFF } else { (channel - 1) / 4 - 1 };
    let wire_level = (255.0 - 254.0 * level).round() as u8;
    let opcode = Opcode::SetChannel1ToLevelWithFade as u8 + (channel - 1) % 4;
    let ticks = fade_ticks(fade)?.min(0xFF) as u8;
    Ok(DynetPacket::logical(area, opcode, [wire_level, channel_bank, ticks]))
}

pub fn request_preset(area: u8) -> DynetPacket {
    DynetPacket::logical(area, Opcode::RequestPreset as u8, [0, 0, 0])
}

pub fn request_channel_level(area: u8, channel: u8) -> Result<DynetPacket> {
    check_channel(channel)?;
    Ok(DynetPacket::logical(area, Opcode::RequestChannelLevel as u8, [channel - 1, 0, 0]))
}

pub fn stop_channel_fade(area: u8, channel: u8) -> Result<DynetPacket> {
    check_channel(channel)?;
    Ok(DynetPacket::logical(area, Opcode::StopFading as u8, [channel - 1, 0, 0]))
}
