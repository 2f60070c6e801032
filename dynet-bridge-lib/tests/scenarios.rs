//! End-to-end scenarios against a fake panel socket.

use std::time::Duration;

use dynet_bridge_lib::bridge::ListenerHandle;
use dynet_bridge_lib::config::{AreaConfig, Config, PresetConfig};
use dynet_bridge_lib::event::{DynetEvent, EventKind, EventState};
use dynet_bridge_lib::Bridge;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const PRESET_1_AREA_8_FADE_2S: [u8; 8] = [0x1C, 0x08, 0x64, 0x00, 0x00, 0x00, 0xFF, 0x79];

fn panel_config(port: u16) -> Config {
    let mut cfg = Config::for_gateway("127.0.0.1", port);
    let mut area = AreaConfig::default();
    area.name = Some("Kitchen".into());
    area.preset.insert(1, PresetConfig { name: Some("Full".into()), fade: None, level: None });
    cfg.area.insert(8, area);
    cfg
}

async fn next_of_kind(listener: &mut ListenerHandle, kind: EventKind) -> TestResult<DynetEvent> {
    loop {
        let event = timeout(Duration::from_secs(5), listener.next_event())
            .await?
            .ok_or("event stream ended")?;
        if event.kind == kind {
            return Ok(event);
        }
    }
}

#[tokio::test]
async fn reports_configuration_connection_and_traffic() -> TestResult<()> {
    let panel = TcpListener::bind("127.0.0.1:0").await?;
    let port = panel.local_addr()?.port();

    let bridge = Bridge::new(panel_config(port))?;
    let mut listener = bridge.add_listener();
    listener.monitor_all();
    bridge.start();

    let new_preset = next_of_kind(&mut listener, EventKind::NewPreset).await?;
    assert_eq!(new_preset.area, Some(8));
    assert_eq!(new_preset.name.as_deref(), Some("Kitchen Full"));
    next_of_kind(&mut listener, EventKind::Configured).await?;

    let (mut panel_stream, _) = timeout(Duration::from_secs(5), panel.accept()).await??;
    next_of_kind(&mut listener, EventKind::Connected).await?;

    // The panel announces preset 1 in area 8 with a 2 s fade.
    panel_stream.write_all(&PRESET_1_AREA_8_FADE_2S).await?;
    let preset = next_of_kind(&mut listener, EventKind::Preset).await?;
    assert_eq!(preset.area, Some(8));
    assert_eq!(preset.preset, Some(1));
    assert_eq!(preset.state, Some(EventState::On));
    assert!((preset.fade.unwrap() - 2.0).abs() < 1e-9);
    assert_eq!(preset.raw, Some(PRESET_1_AREA_8_FADE_2S));

    bridge.shutdown();
    Ok(())
}

#[tokio::test]
async fn select_preset_reaches_the_wire() -> TestResult<()> {
    let panel = TcpListener::bind("127.0.0.1:0").await?;
    let port = panel.local_addr()?.port();

    let bridge = Bridge::new(panel_config(port))?;
    let mut listener = bridge.add_listener();
    listener.monitor_all();
    bridge.start();

    let (mut panel_stream, _) = timeout(Duration::from_secs(5), panel.accept()).await??;
    next_of_kind(&mut listener, EventKind::Connected).await?;

    bridge.select_preset(8, 1, Some(2.0))?;
    let mut buf = [0u8; 8];
    timeout(Duration::from_secs(5), panel_stream.read_exact(&mut buf)).await??;
    assert_eq!(buf, PRESET_1_AREA_8_FADE_2S);

    // Listeners observe the model change as well.
    let preset = next_of_kind(&mut listener, EventKind::Preset).await?;
    assert_eq!(preset.preset, Some(1));
    assert_eq!(preset.state, Some(EventState::On));

    bridge.shutdown();
    Ok(())
}

#[tokio::test]
async fn disconnect_is_reported_and_recovered() -> TestResult<()> {
    let panel = TcpListener::bind("127.0.0.1:0").await?;
    let port = panel.local_addr()?.port();

    let bridge = Bridge::new(panel_config(port))?;
    let mut listener = bridge.add_listener();
    listener.monitor_all();
    bridge.start();

    let (panel_stream, _) = timeout(Duration::from_secs(5), panel.accept()).await??;
    next_of_kind(&mut listener, EventKind::Connected).await?;

    drop(panel_stream);
    next_of_kind(&mut listener, EventKind::Disconnected).await?;

    // The bridge reconnects on its own after the 1 s delay.
    let _ = timeout(Duration::from_secs(5), panel.accept()).await??;
    next_of_kind(&mut listener, EventKind::Connected).await?;

    bridge.shutdown();
    Ok(())
}

#[tokio::test]
async fn rejects_out_of_range_commands() -> TestResult<()> {
    let panel = TcpListener::bind("127.0.0.1:0").await?;
    let port = panel.local_addr()?.port();
    let bridge = Bridge::new(panel_config(port))?;
    bridge.start();

    assert!(bridge.select_preset(8, 0, None).is_err());
    assert!(bridge.select_preset(8, 65, None).is_err());
    assert!(bridge.set_channel_level(8, 0, 0.5, None).is_err());
    assert!(bridge.set_channel_level(8, 1, 1.5, None).is_err());
    assert!(bridge.request_channel_level(8, 0).is_err());

    bridge.shutdown();
    Ok(())
}
