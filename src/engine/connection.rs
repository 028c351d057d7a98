use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

use crate::metainfo::Metainfo;
use crate::wire::{Handshake, Message, MessageParser};

use super::block::BlockPlan;
use super::dispatcher::NewSession;
use super::session::InboundEvent;

/// Owns the socket's read half: feeds bytes into the wire parser and
/// forwards each parsed event to the session's inbound queue. Synthesizes
/// `Closed` on EOF or any I/O error — the parser itself has no notion of
/// transport closure.
pub async fn reader_task<R: AsyncRead + Unpin>(
    mut reader: R,
    session_id: u64,
    tx: mpsc::UnboundedSender<InboundEvent>,
) {
    let span = tracing::debug_span!("session", id = session_id);
    let _enter = span.enter();

    let mut parser = MessageParser::new();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                let _ = tx.send(InboundEvent::Closed);
                return;
            }
            Ok(n) => {
                parser.feed(&buf[..n]);
                loop {
                    match parser.poll() {
                        Ok(Some(event)) => {
                            if tx.send(event.into()).is_err() {
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            tracing::debug!(error = %err, "protocol violation");
                            let _ = tx.send(InboundEvent::Closed);
                            return;
                        }
                    }
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "read error");
                let _ = tx.send(InboundEvent::Closed);
                return;
            }
        }
    }
}

/// Owns the socket's write half: drains pre-encoded frames from the
/// session's outbound queue. Exits once the channel closes, which happens
/// when the dispatcher drops the session.
pub async fn writer_task<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(bytes) = rx.recv().await {
        if writer.write_all(&bytes).await.is_err() {
            return;
        }
    }
}

/// Spawns the reader/writer task pair for a freshly connected (inbound or
/// outbound) transport, returning the outbound sender and inbound receiver
/// the dispatcher wires into a new `Session`.
pub fn spawn_connection<S>(
    stream: S,
    session_id: u64,
) -> (
    mpsc::UnboundedSender<Vec<u8>>,
    mpsc::UnboundedReceiver<InboundEvent>,
)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    tokio::spawn(reader_task(read_half, session_id, inbound_tx));
    tokio::spawn(writer_task(write_half, outbound_rx));

    (outbound_tx, inbound_rx)
}

/// Accepts inbound connections until told to shut down, handing each one
/// to the dispatcher as a fresh session that still has to go through the
/// handshake (it didn't initiate, so it doesn't yet know which torrent
/// it's about).
pub async fn accept_loop(
    listener: TcpListener,
    new_sessions: mpsc::UnboundedSender<NewSession>,
    next_id: Arc<AtomicU64>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        let id = next_id.fetch_add(1, Ordering::Relaxed);
                        let (outbound, inbound) = spawn_connection(stream, id);
                        let new_session = NewSession {
                            id,
                            peer_addr: peer_addr.to_string(),
                            expected_info_hash: None,
                            inbound,
                            outbound,
                        };
                        if new_sessions.send(new_session).is_err() {
                            return;
                        }
                    }
                    Err(err) => tracing::debug!(error = %err, "accept failed"),
                }
            }
            _ = shutdown.changed() => return,
        }
    }
}

/// Dials a single remote peer and, in one step, sends our handshake and
/// enqueues every block request the whole file needs — a leech session,
/// unlike an accepted one, already knows the infohash and the metainfo it's
/// after the moment the connection is made, so it doesn't wait for the
/// remote to speak first before requesting anything.
pub async fn connect_and_spawn(
    host: &str,
    port: u16,
    own_peer_id: [u8; 20],
    info_hash: [u8; 20],
    metainfo: &Metainfo,
    session_id: u64,
) -> std::io::Result<NewSession> {
    let stream = tokio::net::TcpStream::connect((host, port)).await?;
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| format!("{}:{}", host, port));

    let (outbound, inbound) = spawn_connection(stream, session_id);
    let handshake = Handshake::new(info_hash, own_peer_id);
    let _ = outbound.send(handshake.to_bytes());

    let plan = BlockPlan::from_metainfo(metainfo);
    for block in plan.request_all() {
        let _ = outbound.send(
            Message::Request {
                index: block.index,
                begin: block.begin,
                length: block.length,
            }
            .encode(),
        );
    }

    Ok(NewSession {
        id: session_id,
        peer_addr,
        expected_info_hash: Some(info_hash),
        inbound,
        outbound,
    })
}
