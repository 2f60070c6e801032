#![forbid(unsafe_code)]

use clap::Parser;
use dynet_bridge_lib::{load_from_path, telemetry, Bridge};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "DyNet bridge monitor (RS485-to-IP gateway client)")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Select a preset after starting: AREA:PRESET[:FADE]
    #[arg(long, value_name = "AREA:PRESET[:FADE]")]
    select_preset: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = telemetry::init_tracing(&cfg.logging) {
        eprintln!("failed to initialize logging: {err}");
        std::process::exit(1);
    }
    info!(host = %cfg.host, port = cfg.port, areas = cfg.area.len(), "configuration loaded");

    let select = match cli.select_preset.as_deref().map(parse_select).transpose() {
        Ok(select) => select,
        Err(err) => {
            error!(%err, "invalid --select-preset");
            std::process::exit(2);
        }
    };

    let bridge = match Bridge::new(cfg) {
        Ok(bridge) => bridge,
        Err(err) => {
            error!(%err, "failed to start bridge");
            std::process::exit(1);
        }
    };
    let mut listener = bridge.add_listener();
    listener.monitor_all();
    bridge.start();

    if let Some((area, preset, fade)) = select {
        if let Err(err) = bridge.select_preset(area, preset, fade) {
            error!(%err, area, preset, "select preset failed");
        }
    }

    loop {
        tokio::select! {
            event = listener.next_event() => match event {
                Some(event) => println!("{}", event.to_json()),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }
    bridge.shutdown();
}

fn parse_select(spec: &str) -> Result<(u8, u8, Option<f64>), String> {
    let mut parts = spec.split(':');
    let area = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| format!("invalid area in '{spec}'"))?;
    let preset = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| format!("invalid preset in '{spec}'"))?;
    let fade = match parts.next() {
        Some(s) => Some(s.parse().map_err(|_| format!("invalid fade in '{spec}'"))?),
        None => None,
    };
    if parts.next().is_some() {
        return Err(format!("too many fields in '{spec}'"));
    }
    Ok((area, preset, fade))
}
