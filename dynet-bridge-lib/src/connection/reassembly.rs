//! In-buffer frame reassembly with sync-byte resynchronisation.

use bytes::{Buf, BytesMut};

use crate::dynet::opcode::SyncByte;
use crate::dynet::packet::{DynetPacket, PACKET_SIZE};

/// One unit extracted from the inbound byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A checksummed logical frame.
    Packet(DynetPacket),
    /// A debug frame's ASCII payload (bytes 1..=6).
    Debug([u8; 6]),
    /// A device-addressed frame, passed through for logging only.
    Device([u8; PACKET_SIZE]),
}

/// Consume as many frames as the buffer holds.
///
/// At the head of the buffer: a logical sync byte is decoded as an
/// 8-byte frame, and on checksum failure the buffer advances exactly
/// one byte so a frame straddling garbage is found again. Debug and
/// device frames are consumed whole. Any other head byte is skipped.
/// Stops once fewer than 8 bytes remain.
pub fn drain(buf: &mut BytesMut) -> Vec<Inbound> {
    let mut out = Vec::new();
    while buf.len() >= PACKET_SIZE {
        match SyncByte::from_u8(buf[0]) {
            Some(SyncByte::Logical) => match DynetPacket::decode(&buf[..PACKET_SIZE]) {
                Ok(packet) => {
                    out.push(Inbound::Packet(packet));
                    buf.advance(PACKET_SIZE);
                }
                Err(_) => buf.advance(1),
            },
            Some(SyncByte::Debug) => {
                let mut msg = [0u8; 6];
                msg.copy_from_slice(&buf[1..7]);
                out.push(Inbound::Debug(msg));
                buf.advance(PACKET_SIZE);
            }
            Some(SyncByte::Device) => {
                let mut frame = [0u8; PACKET_SIZE];
                frame.copy_from_slice(&buf[..PACKET_SIZE]);
                out.push(Inbound::Device(frame));
                buf.advance(PACKET_SIZE);
            }
            None => buf.advance(1),
        }
    }
    out
}
