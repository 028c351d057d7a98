use std::fmt;

use crate::bencode::BencodeError;

#[derive(Debug)]
pub enum MetainfoError {
    Io(std::io::Error),
    Decode(BencodeError),
    Invalid(String),
}

impl fmt::Display for MetainfoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MetainfoError::Io(e) => write!(f, "i/o error reading torrent file: {}", e),
            MetainfoError::Decode(e) => write!(f, "malformed torrent file: {}", e),
            MetainfoError::Invalid(msg) => write!(f, "invalid metainfo: {}", msg),
        }
    }
}

impl std::error::Error for MetainfoError {}

impl From<std::io::Error> for MetainfoError {
    fn from(err: std::io::Error) -> Self {
        MetainfoError::Io(err)
    }
}

impl From<BencodeError> for MetainfoError {
    fn from(err: BencodeError) -> Self {
        MetainfoError::Decode(err)
    }
}
