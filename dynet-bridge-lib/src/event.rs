//! Typed events emitted to listeners.

use serde::{Serialize, Serializer};

use crate::dynet::packet::PACKET_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Connected,
    Disconnected,
    Configured,
    NewPreset,
    NewChannel,
    Preset,
    Channel,
    ReqPreset,
    Unhandled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventState {
    On,
    Off,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelAction {
    Report,
    Cmd,
}

/// Channel addressed by an event. Several opcodes reserve the wire
/// value 256 as an area-wide sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSelector {
    All,
    Channel(u16),
}

impl Serialize for ChannelSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChannelSelector::All => serializer.serialize_str("ALL"),
            ChannelSelector::Channel(id) => serializer.serialize_u16(*id),
        }
    }
}

/// One decoded or internally generated event. Immutable once emitted;
/// listeners receive clones.
#[derive(Debug, Clone, Serialize)]
pub struct DynetEvent {
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelSelector>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<EventState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ChannelAction>,
    /// Display name, e.g. "Kitchen Full" on NEWPRESET.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Original frame bytes for diagnostic relay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<[u8; PACKET_SIZE]>,
}

impl DynetEvent {
    pub fn new(kind: EventKind) -> DynetEvent {
        DynetEvent {
            kind,
            area: None,
            preset: None,
            channel: None,
            fade: None,
            target_level: None,
            actual_level: None,
            join: None,
            state: None,
            direction: None,
            action: None,
            name: None,
            raw: None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}
