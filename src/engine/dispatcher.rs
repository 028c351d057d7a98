use std::collections::{HashMap, HashSet};
use std::time::Duration;

use sha1::{Digest, Sha1};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::watch;

use crate::metainfo::Metainfo;
use crate::wire::{self, Handshake, Message};

use super::block::BlockPlan;
use super::hex;
use super::session::{HandshakePhase, InboundEvent, PendingBlock, Session};
use super::store;

/// Messages serviced per session per pass — keeps one noisy or malicious
/// peer from starving the rest.
const MESSAGES_PER_PASS: usize = 10;
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// A freshly accepted or dialed connection, handed to the dispatcher by
/// the accept loop / connector once its reader and writer tasks are
/// already running.
pub struct NewSession {
    pub id: u64,
    pub peer_addr: String,
    pub expected_info_hash: Option<[u8; 20]>,
    pub inbound: mpsc::UnboundedReceiver<InboundEvent>,
    pub outbound: mpsc::UnboundedSender<Vec<u8>>,
}

/// The single cooperative task that owns every session's state and every
/// torrent's open file handle. Nothing else touches a `std::fs::File` or
/// mutates session state, so none of this needs locking.
pub struct Dispatcher {
    own_peer_id: [u8; 20],
    torrents: HashMap<[u8; 20], Metainfo>,
    files: HashMap<[u8; 20], std::fs::File>,
    sessions: HashMap<u64, Session>,
    order: Vec<u64>,
    new_sessions: mpsc::UnboundedReceiver<NewSession>,
    shutdown: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(
        own_peer_id: [u8; 20],
        torrents: HashMap<[u8; 20], Metainfo>,
        files: HashMap<[u8; 20], std::fs::File>,
        new_sessions: mpsc::UnboundedReceiver<NewSession>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Dispatcher {
            own_peer_id,
            torrents,
            files,
            sessions: HashMap::new(),
            order: Vec::new(),
            new_sessions,
            shutdown,
        }
    }

    /// The dispatcher's main loop: register new connections, service each
    /// live session's inbound queue round-robin, drop sessions that closed
    /// or finished, and yield briefly whenever a full pass did no work.
    /// Never awaits except on that yield — every other step is either pure
    /// computation, a non-blocking channel op, or synchronous file I/O.
    pub async fn run(mut self) {
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            while let Ok(new_session) = self.new_sessions.try_recv() {
                self.register(new_session);
            }

            let mut did_work = false;
            let mut closed = Vec::new();

            for id in self.order.clone() {
                if closed.contains(&id) {
                    continue;
                }
                for _ in 0..MESSAGES_PER_PASS {
                    let event = {
                        let session = match self.sessions.get_mut(&id) {
                            Some(s) => s,
                            None => break,
                        };
                        match session.inbound.try_recv() {
                            Ok(event) => event,
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => {
                                closed.push(id);
                                break;
                            }
                        }
                    };
                    did_work = true;
                    if !self.handle_event(id, event) {
                        closed.push(id);
                        break;
                    }
                    if self
                        .sessions
                        .get(&id)
                        .map(|s| s.leech_complete())
                        .unwrap_or(false)
                    {
                        tracing::debug!(session = id, "leech session complete");
                        closed.push(id);
                        break;
                    }
                }
            }

            for id in closed {
                self.sessions.remove(&id);
                self.order.retain(|&x| x != id);
            }

            if !did_work {
                tokio::time::sleep(IDLE_SLEEP).await;
            }
        }
    }

    fn register(&mut self, new: NewSession) {
        tracing::debug!(session = new.id, peer = %new.peer_addr, "connection made");
        let session = Session::new(
            new.id,
            new.peer_addr,
            new.expected_info_hash,
            new.inbound,
            new.outbound,
        );
        self.order.push(session.id);
        self.sessions.insert(session.id, session);
    }

    /// Returns `false` if the session should be torn down.
    fn handle_event(&mut self, id: u64, event: InboundEvent) -> bool {
        match event {
            InboundEvent::Closed => false,
            InboundEvent::Handshake { info_hash, .. } => self.handle_handshake(id, info_hash),
            InboundEvent::PeerId(peer_id) => self.handle_peer_id(id, peer_id),
            InboundEvent::Message(message) => self.handle_message(id, message),
        }
    }

    fn handle_handshake(&mut self, id: u64, info_hash: [u8; 20]) -> bool {
        let phase = match self.sessions.get(&id) {
            Some(s) => s.phase,
            None => return false,
        };
        if phase != HandshakePhase::AwaitInfohash {
            tracing::debug!(session = id, "handshake received out of order");
            return false;
        }

        let expected = self.sessions.get(&id).and_then(|s| s.expected_info_hash);
        if let Some(expected) = expected {
            if expected != info_hash {
                tracing::debug!(session = id, "infohash mismatch");
                return false;
            }
        }

        let metainfo = match self.torrents.get(&info_hash) {
            Some(m) => m.clone(),
            None => {
                tracing::debug!(session = id, infohash = %hex(&info_hash), "unknown torrent requested");
                return false;
            }
        };

        let initiated = expected.is_some();
        let session = self.sessions.get_mut(&id).expect("session present");
        session.info_hash = Some(info_hash);

        // A leech session's block requests are already on the wire by the
        // time this handshake is processed — `connect_and_spawn` enqueues
        // them at `connection_made`, before the session is even registered
        // with the dispatcher (see `SPEC_FULL.md` §4.4). All that's left to
        // do here is seed `pieces_remaining` so `leech_complete` can track
        // convergence.
        if initiated {
            session.pieces_remaining = (0..metainfo.piece_count() as u32).collect();
        }
        session.metainfo = Some(metainfo);
        session.phase = HandshakePhase::AwaitPeerId;

        if !initiated {
            let handshake = Handshake::new(info_hash, self.own_peer_id);
            session.send(handshake.to_bytes());
        }

        true
    }

    fn handle_peer_id(&mut self, id: u64, peer_id: [u8; 20]) -> bool {
        let session = match self.sessions.get_mut(&id) {
            Some(s) => s,
            None => return false,
        };
        if session.phase != HandshakePhase::AwaitPeerId {
            tracing::debug!(session = id, "peer id received out of order");
            return false;
        }
        session.peer_id = Some(peer_id);
        session.phase = HandshakePhase::Established;
        true
    }

    fn handle_message(&mut self, id: u64, message: Message) -> bool {
        let established = matches!(
            self.sessions.get(&id).map(|s| s.phase),
            Some(HandshakePhase::Established)
        );
        if !established {
            tracing::debug!(session = id, "message received before handshake completed");
            return false;
        }

        if matches!(message, Message::Bitfield(_)) {
            let is_first = self
                .sessions
                .get(&id)
                .map(|s| !s.first_message_seen)
                .unwrap_or(false);
            if !is_first {
                tracing::debug!(session = id, "bitfield received after initial message");
                return false;
            }
        }

        if let Some(session) = self.sessions.get_mut(&id) {
            session.first_message_seen = true;
        }

        match message {
            Message::KeepAlive => true,
            Message::Choke => {
                self.with_session(id, |s| s.peer_choking = true);
                true
            }
            Message::Unchoke => {
                self.with_session(id, |s| s.peer_choking = false);
                true
            }
            Message::Interested => {
                self.with_session(id, |s| s.peer_interested = true);
                true
            }
            Message::NotInterested => {
                self.with_session(id, |s| s.peer_interested = false);
                true
            }
            Message::Have { index } => self.handle_have(id, index),
            Message::Bitfield(bits) => self.handle_bitfield(id, bits),
            Message::Request {
                index,
                begin,
                length,
            } => self.handle_request(id, index, begin, length),
            Message::Piece {
                index,
                begin,
                block,
            } => self.handle_piece(id, index, begin, block),
            Message::Cancel { .. } => true,
            Message::Port { .. } => true,
        }
    }

    fn with_session(&mut self, id: u64, f: impl FnOnce(&mut Session)) {
        if let Some(session) = self.sessions.get_mut(&id) {
            f(session);
        }
    }

    fn handle_have(&mut self, id: u64, index: u32) -> bool {
        let session = match self.sessions.get_mut(&id) {
            Some(s) => s,
            None => return false,
        };
        if let Some(metainfo) = &session.metainfo {
            if index as usize >= metainfo.piece_count() {
                tracing::debug!(session = id, "have index out of range");
                return false;
            }
        }
        session.peer_has.insert(index);
        true
    }

    fn handle_bitfield(&mut self, id: u64, bits: Vec<u8>) -> bool {
        let session = match self.sessions.get_mut(&id) {
            Some(s) => s,
            None => return false,
        };
        let piece_count = match &session.metainfo {
            Some(m) => m.piece_count(),
            None => return false,
        };
        let expected_len = piece_count.div_ceil(8);
        if bits.len() != expected_len {
            tracing::debug!(session = id, "invalid bitfield length");
            return false;
        }

        let mut has = HashSet::new();
        for (byte_index, byte) in bits.iter().enumerate() {
            for bit in 0..8u32 {
                if byte & (0x80 >> bit) != 0 {
                    let piece_index = byte_index as u32 * 8 + bit;
                    if piece_index as usize >= piece_count {
                        tracing::debug!(session = id, "bitfield sets bit beyond piece count");
                        return false;
                    }
                    has.insert(piece_index);
                }
            }
        }
        session.peer_has = has;
        true
    }

    fn handle_request(&mut self, id: u64, index: u32, begin: u32, length: u32) -> bool {
        let (info_hash, offset, file_length) = {
            let session = match self.sessions.get(&id) {
                Some(s) => s,
                None => return false,
            };
            let metainfo = match &session.metainfo {
                Some(m) => m,
                None => return false,
            };
            let offset = index as u64 * metainfo.info.piece_length + begin as u64;
            (
                session.info_hash.expect("bound after handshake"),
                offset,
                metainfo.info.length,
            )
        };

        if offset + length as u64 > file_length {
            tracing::debug!(session = id, "requested block overflows file, ignoring");
            return true;
        }

        let block = {
            let file = match self.files.get_mut(&info_hash) {
                Some(f) => f,
                None => return false,
            };
            match store::read_block(file, offset, length) {
                Ok(b) => b,
                Err(err) => {
                    tracing::debug!(session = id, error = %err, "block read failed");
                    return false;
                }
            }
        };

        if let Some(session) = self.sessions.get(&id) {
            session.send(Message::Piece { index, begin, block }.encode());
        }
        true
    }

    fn handle_piece(&mut self, id: u64, index: u32, begin: u32, block: Vec<u8>) -> bool {
        let metainfo = match self.sessions.get(&id).and_then(|s| s.metainfo.clone()) {
            Some(m) => m,
            None => return false,
        };
        let piece_count = metainfo.piece_count();

        if index as usize >= piece_count {
            tracing::debug!(session = id, "piece index out of range");
            return false;
        }
        if begin % wire::BLOCK_SIZE != 0 {
            tracing::debug!(session = id, "piece begin not block aligned");
            return false;
        }
        if block.len() as u32 > wire::BLOCK_SIZE {
            tracing::debug!(session = id, "piece block larger than block size");
            return false;
        }

        let plan = BlockPlan::from_metainfo(&metainfo);
        let expected_blocks = plan.block_count_for_piece(index as usize);

        let complete = {
            let session = match self.sessions.get_mut(&id) {
                Some(s) => s,
                None => return false,
            };
            let entry = session.partial_pieces.entry(index).or_default();
            entry.push(PendingBlock { begin, data: block });
            entry.len() >= expected_blocks
        };

        if !complete {
            return true;
        }

        let mut blocks = match self.sessions.get_mut(&id) {
            Some(s) => s.partial_pieces.remove(&index).unwrap_or_default(),
            None => return false,
        };
        blocks.sort_by_key(|b| b.begin);
        let mut candidate = Vec::with_capacity(blocks.iter().map(|b| b.data.len()).sum());
        for b in &blocks {
            candidate.extend_from_slice(&b.data);
        }

        let mut hasher = Sha1::new();
        hasher.update(&candidate);
        let digest: [u8; 20] = hasher.finalize().into();

        if metainfo.piece_hash(index as usize).copied() != Some(digest) {
            tracing::debug!(session = id, piece = index, "piece hash mismatch, re-requesting");
            if let Some(session) = self.sessions.get(&id) {
                for block in plan.blocks_for_piece(index as usize) {
                    session.send(
                        Message::Request {
                            index: block.index,
                            begin: block.begin,
                            length: block.length,
                        }
                        .encode(),
                    );
                }
            }
            return true;
        }

        let info_hash = match self.sessions.get(&id).and_then(|s| s.info_hash) {
            Some(h) => h,
            None => return false,
        };
        let offset = index as u64 * metainfo.info.piece_length;
        {
            let file = match self.files.get_mut(&info_hash) {
                Some(f) => f,
                None => return false,
            };
            if let Err(err) = store::write_block(file, offset, &candidate) {
                tracing::debug!(session = id, error = %err, "piece write failed");
                return false;
            }
        }

        if let Some(session) = self.sessions.get_mut(&id) {
            session.pieces_remaining.remove(&index);
            session.send(Message::Have { index }.encode());
        }
        true
    }
}
