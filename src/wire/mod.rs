pub mod error;
pub mod handshake;
pub mod message;
pub mod parser;

pub use error::WireError;
pub use handshake::Handshake;
pub use message::Message;
pub use parser::{Event, MessageParser};

pub const BLOCK_SIZE: u32 = 1 << 14;
