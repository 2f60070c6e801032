pub mod inbound;
pub mod opcode;
pub mod outbound;
pub mod packet;

pub use opcode::{Opcode, SyncByte};
pub use packet::{DynetPacket, PacketError};
