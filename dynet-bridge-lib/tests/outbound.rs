use dynet_bridge_lib::dynet::inbound::decode;
use dynet_bridge_lib::dynet::outbound::{
    area_off, request_channel_level, request_preset, select_preset, set_channel_level,
    stop_channel_fade,
};
use dynet_bridge_lib::error::BridgeError;
use dynet_bridge_lib::event::ChannelSelector;

#[test]
fn select_preset_1_area_8_fade_2s() {
    let packet = select_preset(8, 1, 2.0).unwrap();
    assert_eq!(packet.encode(), [0x1C, 0x08, 0x64, 0x00, 0x00, 0x00, 0xFF, 0x79]);
}

#[test]
fn select_preset_splits_bank_and_opcode() {
    // Preset 14 lives in bank 1 as the sixth preset; 11 s of fade is
    // 550 ticks = 2 * 256 + 38.
    let packet = select_preset(3, 14, 11.0).unwrap();
    assert_eq!(packet.area, 3);
    assert_eq!(packet.command, 11);
    assert_eq!(packet.data, [38, 2, 1]);
    assert_eq!(packet.join, 0xFF);

    let packet = select_preset(3, 1, 11.0).unwrap();
    assert_eq!(packet.command, 0);
    assert_eq!(packet.data, [38, 2, 0]);
}

#[test]
fn select_preset_rejects_out_of_range() {
    assert!(matches!(select_preset(3, 0, 2.0), Err(BridgeError::Range { .. })));
    assert!(matches!(select_preset(3, 65, 2.0), Err(BridgeError::Range { .. })));
}

#[test]
fn select_preset_rejects_unrepresentable_fade() {
    assert!(matches!(select_preset(3, 1, -1.0), Err(BridgeError::Fade(_))));
    assert!(matches!(select_preset(3, 1, f64::NAN), Err(BridgeError::Fade(_))));
    // 2000 s is 100_000 ticks, past the 16-bit fade field.
    assert!(matches!(select_preset(3, 1, 2000.0), Err(BridgeError::Fade(_))));
}

#[test]
fn area_off_clamps_fade() {
    for (fade, expected) in [(1.0, 10), (100.0, 255), (-1.0, 0)] {
        let packet = area_off(3, fade);
        assert_eq!(packet.command, 104);
        assert_eq!(packet.data, [255, 0, expected]);
        assert_eq!(packet.join, 0xFF);
    }
}

#[test]
fn set_channel_level_low_channel_uses_sentinel_bank() {
    // Channel 1 off with a 0.5 s fade.
    let packet = set_channel_level(3, 1, 0.0, 0.5).unwrap();
    assert_eq!(packet.command, 128);
    assert_eq!(packet.data, [255, 0xFF, 25]);
}

#[test]
fn set_channel_level_high_channel() {
    // Channel 14 full on; 10 s of fade saturates the tick byte.
    let packet = set_channel_level(3, 14, 1.0, 10.0).unwrap();
    assert_eq!(packet.command, 129);
    assert_eq!(packet.data, [1, 2, 0xFF]);
}

#[test]
fn set_channel_level_rejects_bad_level() {
    assert!(matches!(set_channel_level(3, 1, -0.1, 2.0), Err(BridgeError::Level(_))));
    assert!(matches!(set_channel_level(3, 1, 1.1, 2.0), Err(BridgeError::Level(_))));
    assert!(matches!(set_channel_level(3, 0, 0.5, 2.0), Err(BridgeError::Range { .. })));
}

#[test]
fn request_preset_area_2() {
    let packet = request_preset(2);
    assert_eq!(packet.encode(), [0x1C, 0x02, 0x00, 0x63, 0x00, 0x00, 0xFF, 0x80]);
}

#[test]
fn request_channel_level_frame() {
    let packet = request_channel_level(3, 5).unwrap();
    assert_eq!(packet.command, 97);
    assert_eq!(packet.data, [4, 0, 0]);
    assert!(matches!(request_channel_level(3, 0), Err(BridgeError::Range { .. })));
}

#[test]
fn stop_channel_fade_frame() {
    let packet = stop_channel_fade(3, 5).unwrap();
    assert_eq!(packet.command, 118);
    assert_eq!(packet.data, [4, 0, 0]);
    assert!(matches!(stop_channel_fade(3, 0), Err(BridgeError::Range { .. })));
}

#[test]
fn built_frames_decode_back() {
    let packet = select_preset(3, 14, 11.0).unwrap();
    let event = decode(&packet).unwrap();
    assert_eq!(event.area, Some(3));
    assert_eq!(event.preset, Some(14));

    let packet = set_channel_level(3, 14, 1.0, 2.0).unwrap();
    let event = decode(&packet).unwrap();
    assert_eq!(event.channel, Some(ChannelSelector::Channel(14)));
    assert_eq!(event.target_level, Some(1));
}
