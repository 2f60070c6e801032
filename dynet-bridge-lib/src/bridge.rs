//! The orchestrator: wires configuration, connection, model and
//! broadcaster together and exposes the public command surface.
//!
//! Lifecycle follows new → add listeners → start, so listeners
//! registered before start-up observe the NEWPRESET/NEWCHANNEL and
//! CONFIGURED events from model construction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::config::{validate_config, ActiveMode, Config};
use crate::connection::{self, ConnEvent, WireRequest};
use crate::device::{DeviceModel, RetryFired};
use crate::dynet::inbound;
use crate::dynet::outbound::{self, MAX_PRESET};
use crate::error::{BridgeError, Result};
use crate::event::{DynetEvent, EventKind};
use crate::retry::{RetryDelay, INITIAL_RETRY_DELAY};

pub(crate) enum Command {
    SelectPreset { area: u8, preset: u8, fade: Option<f64> },
    PresetOff { area: u8, preset: u8 },
    AreaOff { area: u8, fade: Option<f64> },
    SetChannelLevel { area: u8, channel: u8, level: f64, fade: Option<f64> },
    StopChannelFade { area: u8, channel: u8 },
    RequestPreset { area: u8 },
    RequestChannelLevel { area: u8, channel: u8 },
    RegisterListener { id: u64, tx: mpsc::UnboundedSender<DynetEvent> },
    Monitor { id: u64, kind: EventKind },
    Unmonitor { id: u64, kind: EventKind },
    MonitorAll { id: u64 },
    RemoveListener { id: u64 },
}

/// Subscription to bridge events. Nothing is delivered until kinds
/// are monitored (or [`ListenerHandle::monitor_all`] is called).
pub struct ListenerHandle {
    id: u64,
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<DynetEvent>,
}

impl ListenerHandle {
    pub async fn next_event(&mut self) -> Option<DynetEvent> {
        self.events.recv().await
    }

    pub fn monitor(&self, kind: EventKind) {
        let _ = self.commands.send(Command::Monitor { id: self.id, kind });
    }

    pub fn unmonitor(&self, kind: EventKind) {
        let _ = self.commands.send(Command::Unmonitor { id: self.id, kind });
    }

    pub fn monitor_all(&self) {
        let _ = self.commands.send(Command::MonitorAll { id: self.id });
    }

    pub fn close(self) {
        let _ = self.commands.send(Command::RemoveListener { id: self.id });
    }
}

/// Parts consumed when the engine is spawned.
struct Boot {
    cfg: Config,
    commands_rx: mpsc::UnboundedReceiver<Command>,
}

/// Handle to a bridge. Commands are validated here and executed on
/// the engine task; dropping the handle does not stop the bridge,
/// [`Bridge::shutdown`] does.
pub struct Bridge {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: watch::Sender<bool>,
    next_listener: AtomicU64,
    boot: Mutex<Option<Boot>>,
}

impl Bridge {
    /// Validate the configuration and prepare a bridge. Nothing runs
    /// until [`Bridge::start`]; listeners added in between observe
    /// the configuration events.
    pub fn new(cfg: Config) -> Result<Bridge> {
        validate_config(&cfg)?;
        let (shutdown, _) = watch::channel(false);
        let (commands, commands_rx) = mpsc::unbounded_channel();
        Ok(Bridge {
            commands,
            shutdown,
            next_listener: AtomicU64::new(1),
            boot: Mutex::new(Some(Boot { cfg, commands_rx })),
        })
    }

    /// Spawn the connection and engine tasks onto the current tokio
    /// runtime. The connection is established (and re-established) in
    /// the background. Subsequent calls do nothing.
    pub fn start(&self) {
        let boot = self.boot.lock().ok().and_then(|mut b| b.take());
        let Some(Boot { cfg, commands_rx }) = boot else { return };
        let (conn_events_tx, conn_events_rx) = mpsc::unbounded_channel();
        let wire = connection::spawn(
            cfg.host.clone(),
            cfg.port,
            cfg.active,
            conn_events_tx,
            self.shutdown.subscribe(),
        );
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        let model = DeviceModel::new(&cfg, wire.clone(), retry_tx);
        let engine = Engine {
            cfg,
            model,
            broadcaster: Broadcaster::new(),
            wire,
            commands: commands_rx,
            conn_events: conn_events_rx,
            retry_rx,
            shutdown: self.shutdown.subscribe(),
        };
        tokio::spawn(engine.run());
    }

    pub fn add_listener(&self) -> ListenerHandle {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        let (tx, events) = mpsc::unbounded_channel();
        let _ = self.commands.send(Command::RegisterListener { id, tx });
        ListenerHandle { id, commands: self.commands.clone(), events }
    }

    pub fn select_preset(&self, area: u8, preset: u8, fade: Option<f64>) -> Result<()> {
        check_preset(preset)?;
        self.send(Command::SelectPreset { area, preset, fade })
    }

    pub fn preset_off(&self, area: u8, preset: u8) -> Result<()> {
        check_preset(preset)?;
        self.send(Command::PresetOff { area, preset })
    }

    pub fn area_off(&self, area: u8, fade: Option<f64>) -> Result<()> {
        self.send(Command::AreaOff { area, fade })
    }

    pub fn set_channel_level(
        &self,
        area: u8,
        channel: u8,
        level: f64,
        fade: Option<f64>,
    ) -> Result<()> {
        check_channel(channel)?;
        if !(0.0..=1.0).contains(&level) {
            return Err(BridgeError::Level(level));
        }
        self.send(Command::SetChannelLevel { area, channel, level, fade })
    }

    pub fn stop_channel_fade(&self, area: u8, channel: u8) -> Result<()> {
        check_channel(channel)?;
        self.send(Command::StopChannelFade { area, channel })
    }

    pub fn request_preset(&self, area: u8) -> Result<()> {
        self.send(Command::RequestPreset { area })
    }

    pub fn request_channel_level(&self, area: u8, channel: u8) -> Result<()> {
        check_channel(channel)?;
        self.send(Command::RequestChannelLevel { area, channel })
    }

    /// Stop the connection and engine tasks.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| BridgeError::Closed)
    }
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

struct Engine {
    cfg: Config,
    model: DeviceModel,
    broadcaster: Broadcaster,
    wire: mpsc::UnboundedSender<WireRequest>,
    commands: mpsc::UnboundedReceiver<Command>,
    conn_events: mpsc::UnboundedReceiver<ConnEvent>,
    retry_rx: mpsc::UnboundedReceiver<RetryFired>,
    shutdown: watch::Receiver<bool>,
}

impl Engine {
    async fn run(mut self) {
        // Listener registrations queued before start-up come first,
        // so those listeners observe the configuration events.
        while let Ok(command) = self.commands.try_recv() {
            self.handle_command(command);
        }
        self.model.configure(&self.cfg);
        self.flush_model_events();
        self.broadcaster.dispatch(&DynetEvent::new(EventKind::Configured));
        info!(areas = self.cfg.area.len(), "bridge configured");

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = self.conn_events.recv() => match event {
                    Some(event) => self.handle_conn_event(event),
                    None => break,
                },
                fired = self.retry_rx.recv() => if let Some(fired) = fired {
                    self.model.handle_retry(fired);
                    self.flush_model_events();
                },
            }
        }
        debug!("engine stopped");
    }

    /// Model first, then broadcast, so listeners always observe a
    /// consistent snapshot.
    fn handle_conn_event(&mut self, event: ConnEvent) {
        match event {
            ConnEvent::Up => self.broadcaster.dispatch(&DynetEvent::new(EventKind::Connected)),
            ConnEvent::Down => {
                self.broadcaster.dispatch(&DynetEvent::new(EventKind::Disconnected))
            }
            ConnEvent::Packet(packet) => {
                if let Some(event) = inbound::decode(&packet) {
                    self.model.handle_event(&event);
                    self.flush_model_events();
                    self.broadcaster.dispatch(&event);
                }
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SelectPreset { area, preset, fade } => {
                let fade = fade.unwrap_or_else(|| self.model.preset_fade(area, preset));
                let autodiscover = self.model.autodiscover();
                self.model.preset_on(area, u16::from(preset), true, true, autodiscover, Some(fade));
                self.flush_model_events();
            }
            Command::PresetOff { area, preset } => {
                self.model.preset_off(area, u16::from(preset));
                self.flush_model_events();
            }
            Command::AreaOff { area, fade } => {
                let fade = fade.unwrap_or_else(|| self.model.area_fade(area));
                let _ = self.wire.send(WireRequest::plain(outbound::area_off(area, fade)));
            }
            Command::SetChannelLevel { area, channel, level, fade } => {
                let fade = fade.unwrap_or_else(|| self.model.channel_fade(area, channel));
                match outbound::set_channel_level(area, channel, level, fade) {
                    Ok(packet) => {
                        let _ = self.wire.send(WireRequest::plain(packet));
                    }
                    Err(e) => {
                        warn!(area, channel, error = %e, "cannot build channel frame");
                        return;
                    }
                }
                let autodiscover = self.model.autodiscover();
                self.model.set_channel_level(area, u16::from(channel), level, autodiscover);
                self.flush_model_events();
                if self.model.active() != ActiveMode::Off {
                    self.model.request_channel_level(
                        area,
                        channel,
                        RetryDelay::After(INITIAL_RETRY_DELAY),
                        true,
                    );
                }
            }
            Command::StopChannelFade { area, channel } => {
                match outbound::stop_channel_fade(area, channel) {
                    Ok(packet) => {
                        let _ = self.wire.send(WireRequest::plain(packet));
                    }
                    Err(e) => warn!(area, channel, error = %e, "cannot build stop frame"),
                }
            }
            Command::RequestPreset { area } => {
                self.model.request_preset(area, RetryDelay::After(INITIAL_RETRY_DELAY), true);
            }
            Command::RequestChannelLevel { area, channel } => {
                self.model.request_channel_level(
                    area,
                    channel,
                    RetryDelay::After(INITIAL_RETRY_DELAY),
                    true,
                );
            }
            Command::RegisterListener { id, tx } => self.broadcaster.register(id, tx),
            Command::Monitor { id, kind } => self.broadcaster.monitor(id, kind),
            Command::Unmonitor { id, kind } => self.broadcaster.unmonitor(id, kind),
            Command::MonitorAll { id } => self.broadcaster.monitor_all(id),
            Command::RemoveListener { id } => self.broadcaster.remove(id),
        }
    }

    fn flush_model_events(&mut self) {
        for event in self.model.take_events() {
            self.broadcaster.dispatch(&event);
        }
    }
}
