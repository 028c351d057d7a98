use std::fmt;

use crate::metainfo::MetainfoError;

/// Startup-level failures — these abort the process (see the CLI entry
/// point). Per-session failures never reach here; they close that session
/// and are logged, not propagated.
#[derive(Debug)]
pub enum EngineError {
    Io(std::io::Error),
    Metainfo(MetainfoError),
    NoTorrentsLoaded,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineError::Io(e) => write!(f, "{}", e),
            EngineError::Metainfo(e) => write!(f, "{}", e),
            EngineError::NoTorrentsLoaded => write!(f, "no torrents found in torrents/"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err)
    }
}

impl From<MetainfoError> for EngineError {
    fn from(err: MetainfoError) -> Self {
        EngineError::Metainfo(err)
    }
}
