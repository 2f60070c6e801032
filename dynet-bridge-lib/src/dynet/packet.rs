//! Fixed 8-byte DyNet frame codec.
//!
//! Wire layout: `sync, area, data0, command, data1, data2, join,
//! checksum`. The codec is byte-exact; any deviation breaks
//! interoperability with deployed panels.

use thiserror::Error;

use super::opcode::{Opcode, SyncByte};

pub const PACKET_SIZE: usize = 8;

/// Default join bit-field: all joins participate.
pub const JOIN_ALL: u8 = 0xFF;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet too short ({0} bytes)")]
    TooShort(usize),
    #[error("packet too long ({0} bytes)")]
    TooLong(usize),
    #[error("checksum mismatch (expected {expected:#04x}, found {found:#04x})")]
    ChecksumMismatch { expected: u8, found: u8 },
}

/// Low byte of the two's complement of the byte sum.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
        .wrapping_neg()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynetPacket {
    pub sync: u8,
    pub area: u8,
    /// `[data0, data1, data2]` in wire positions 2, 4 and 5.
    pub data: [u8; 3],
    pub command: u8,
    pub join: u8,
    pub checksum: u8,
}

impl DynetPacket {
    pub fn new(sync: u8, area: u8, command: u8, data: [u8; 3], join: u8) -> DynetPacket {
        let bytes = [sync, area, data[0], command, data[1], data[2], join];
        DynetPacket { sync, area, data, command, join, checksum: checksum(&bytes) }
    }

    /// Logical frame addressed to all joins.
    pub fn logical(area: u8, command: u8, data: [u8; 3]) -> DynetPacket {
        DynetPacket::new(SyncByte::Logical as u8, area, command, data, JOIN_ALL)
    }

    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        [
            self.sync,
            self.area,
            self.data[0],
            self.command,
            self.data[1],
            self.data[2],
            self.join,
            self.checksum,
        ]
    }

    pub fn decode(bytes: &[u8]) -> Result<DynetPacket, PacketError> {
        if bytes.len() < PACKET_SIZE {
            return Err(PacketError::TooShort(bytes.len()));
        }
        if bytes.len() > PACKET_SIZE {
            return Err(PacketError::TooLong(bytes.len()));
        }
        let expected = checksum(&bytes[..7]);
        if bytes[7] != expected {
            return Err(PacketError::ChecksumMismatch { expected, found: bytes[7] });
        }
        Ok(DynetPacket {
            sync: bytes[0],
            area: bytes[1],
            data: [bytes[2], bytes[4], bytes[5]],
            command: bytes[3],
            join: bytes[6],
            checksum: bytes[7],
        })
    }

    /// Symbolic opcode, for logical frames with a known command byte.
    pub fn opcode(&self) -> Option<Opcode> {
        if self.sync == SyncByte::Logical as u8 {
            Opcode::from_u8(self.command)
        } else {
            None
        }
    }
}
