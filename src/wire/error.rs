use std::fmt;

#[derive(Debug)]
pub enum WireError {
    /// Handshake failed length/field validation.
    HandshakeReject(String),
    /// A framed message violated the id table in some way: unknown id,
    /// a length too short for the id's fixed fields, etc.
    ProtocolViolation(String),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WireError::HandshakeReject(msg) => write!(f, "handshake rejected: {}", msg),
            WireError::ProtocolViolation(msg) => write!(f, "protocol violation: {}", msg),
        }
    }
}

impl std::error::Error for WireError {}
