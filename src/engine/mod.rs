//! The peer I/O engine: connection handling, the per-session handshake
//! state machine, the cooperative dispatcher, and file-backed block
//! transfer with SHA-1 piece verification.

pub mod block;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod session;
pub mod store;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

pub use error::EngineError;

use crate::metainfo::Metainfo;

use dispatcher::{Dispatcher, NewSession};

/// Loads every non-dot-prefixed `.torrent` file directly under `dir`,
/// keyed by infohash — the direct port of `async_seeder.py::start`'s
/// `os.walk('torrents')` scan (this engine doesn't recurse into
/// subdirectories, matching the top-level-only scope of that scan).
pub fn load_torrents_dir(dir: impl AsRef<Path>) -> Result<HashMap<[u8; 20], Metainfo>, EngineError> {
    let mut torrents = HashMap::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(torrents),
        Err(err) => return Err(err.into()),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false);
        if is_hidden {
            continue;
        }
        let metainfo = crate::metainfo::load(&path)?;
        torrents.insert(metainfo.infohash(), metainfo);
    }

    Ok(torrents)
}

/// Opens every loaded torrent's backing file read-only, assuming
/// `files/<info.name>` holds the complete content already.
fn open_seed_files(
    torrents: &HashMap<[u8; 20], Metainfo>,
    files_dir: impl AsRef<Path>,
) -> Result<HashMap<[u8; 20], std::fs::File>, EngineError> {
    let files_dir = files_dir.as_ref();
    let mut files = HashMap::new();
    for (info_hash, metainfo) in torrents {
        let path = files_dir.join(&metainfo.info.name);
        let file = store::open_read_only(&path)?;
        files.insert(*info_hash, file);
    }
    Ok(files)
}

async fn run_dispatcher(
    own_peer_id: [u8; 20],
    torrents: HashMap<[u8; 20], Metainfo>,
    files: HashMap<[u8; 20], std::fs::File>,
    new_sessions: mpsc::UnboundedReceiver<NewSession>,
    shutdown: watch::Receiver<bool>,
) {
    let dispatcher = Dispatcher::new(own_peer_id, torrents, files, new_sessions, shutdown);
    dispatcher.run().await;
}

/// Runs as a seeder: loads every torrent in `torrents/`, opens each one's
/// backing file in `files/`, and serves any number of inbound peers until
/// Ctrl-C.
pub async fn run_seed(port: u16, own_peer_id: [u8; 20]) -> Result<(), EngineError> {
    let torrents = load_torrents_dir("torrents")?;
    if torrents.is_empty() {
        return Err(EngineError::NoTorrentsLoaded);
    }
    for metainfo in torrents.values() {
        tracing::info!(name = %metainfo.info.name, infohash = %hex(&metainfo.infohash()), "serving");
    }
    let files = open_seed_files(&torrents, "files")?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "listening");

    let (new_sessions_tx, new_sessions_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let next_id = Arc::new(AtomicU64::new(1));

    tokio::spawn(connection::accept_loop(
        listener,
        new_sessions_tx,
        next_id,
        shutdown_rx.clone(),
    ));
    tokio::spawn(watch_ctrl_c(shutdown_tx));

    run_dispatcher(own_peer_id, torrents, files, new_sessions_rx, shutdown_rx).await;
    Ok(())
}

/// Runs as a leecher: loads a single torrent, opens or creates its
/// destination file in `downloads/`, dials the given peer, and fetches
/// every piece, verifying each against its SHA-1 hash before writing.
pub async fn run_leech(
    torrent_path: impl AsRef<Path>,
    host: String,
    port: u16,
    own_peer_id: [u8; 20],
) -> Result<(), EngineError> {
    let metainfo = crate::metainfo::load(torrent_path)?;
    let info_hash = metainfo.infohash();
    tracing::info!(infohash = %hex(&info_hash), "leeching");

    std::fs::create_dir_all("downloads")?;
    let destination = Path::new("downloads").join(&metainfo.info.name);
    let file = store::open_read_write(&destination, metainfo.total_size())?;

    let (new_sessions_tx, new_sessions_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let new_session =
        connection::connect_and_spawn(&host, port, own_peer_id, info_hash, &metainfo, 1).await?;
    new_sessions_tx
        .send(new_session)
        .map_err(|_| EngineError::Io(std::io::Error::other("dispatcher not running")))?;

    let mut torrents = HashMap::new();
    torrents.insert(info_hash, metainfo);
    let mut files = HashMap::new();
    files.insert(info_hash, file);

    tokio::spawn(watch_ctrl_c(shutdown_tx));
    run_dispatcher(own_peer_id, torrents, files, new_sessions_rx, shutdown_rx).await;
    Ok(())
}

async fn watch_ctrl_c(shutdown_tx: watch::Sender<bool>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutting down");
        let _ = shutdown_tx.send(true);
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
