use std::fmt;

/// Errors raised while decoding a bencoded byte stream.
#[derive(Debug)]
pub enum BencodeError {
    UnexpectedEof,
    InvalidInteger(String),
    InvalidString(String),
    InvalidList(String),
    InvalidDict(String),
    MissingKey(String),
    WrongType { expected: String, found: String },
}

impl fmt::Display for BencodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BencodeError::UnexpectedEof => write!(f, "unexpected end of input"),
            BencodeError::InvalidInteger(msg) => write!(f, "invalid integer: {}", msg),
            BencodeError::InvalidString(msg) => write!(f, "invalid string: {}", msg),
            BencodeError::InvalidList(msg) => write!(f, "invalid list: {}", msg),
            BencodeError::InvalidDict(msg) => write!(f, "invalid dict: {}", msg),
            BencodeError::MissingKey(msg) => write!(f, "missing key: {}", msg),
            BencodeError::WrongType { expected, found } => {
                write!(f, "wrong type, expected: {} found: {}", expected, found)
            }
        }
    }
}

impl std::error::Error for BencodeError {}
