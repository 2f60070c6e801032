#![forbid(unsafe_code)]

//! Client library for the DyNet lighting control protocol over a
//! persistent TCP transport (an RS485-to-IP gateway).
//!
//! The bridge keeps a live model of areas, their active preset and
//! per-channel dimming levels, translates high-level commands into
//! 8-byte DyNet frames, decodes inbound frames into typed events and
//! broadcasts them to subscribed listeners. State queries are retried
//! with exponential backoff until the panel confirms the state.

pub mod bridge;
pub mod broadcast;
pub mod config;
pub mod connection;
pub mod device;
pub mod dynet;
pub mod error;
pub mod event;
pub mod retry;
pub mod telemetry;

pub use bridge::{Bridge, ListenerHandle};
pub use config::{load_from_path, ActiveMode, Config};
pub use error::{BridgeError, Result};
pub use event::{DynetEvent, EventKind};
