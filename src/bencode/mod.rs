pub mod encoder;
pub mod error;
pub mod helper;
pub mod parser;
pub mod value;

pub use error::BencodeError;
pub use value::{BencodeValue, Dict};

/// Decodes a full byte buffer into a single value, erroring if anything is
/// left over — the entry point `metainfo::load` and the wire handshake
/// decoder use this instead of `parser::parse_value` directly.
pub fn decode(input: &[u8]) -> Result<BencodeValue, BencodeError> {
    let (value, rest) = parser::parse_value(input)?;
    if !rest.is_empty() {
        return Err(BencodeError::InvalidDict(format!(
            "{} trailing bytes after top-level value",
            rest.len()
        )));
    }
    Ok(value)
}

pub fn encode(value: &BencodeValue) -> Vec<u8> {
    encoder::encode(value)
}
