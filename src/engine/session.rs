use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;

use crate::metainfo::Metainfo;
use crate::wire::{self, Message};

/// Mirrors `wire::Event` plus the transport-close sentinel. The incremental
/// parser itself never produces `Closed` — the reader task synthesizes it
/// directly on EOF or I/O error, since closing is a transport-level fact
/// the parser has no visibility into.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Handshake {
        pstr: Vec<u8>,
        reserved: [u8; 8],
        info_hash: [u8; 20],
    },
    PeerId([u8; 20]),
    Message(Message),
    Closed,
}

impl From<wire::Event> for InboundEvent {
    fn from(event: wire::Event) -> Self {
        match event {
            wire::Event::Handshake {
                pstr,
                reserved,
                info_hash,
            } => InboundEvent::Handshake {
                pstr,
                reserved,
                info_hash,
            },
            wire::Event::PeerId(id) => InboundEvent::PeerId(id),
            wire::Event::Message(m) => InboundEvent::Message(m),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    AwaitInfohash,
    AwaitPeerId,
    Established,
}

/// A block of a not-yet-assembled piece, as received out of order.
#[derive(Debug, Clone)]
pub struct PendingBlock {
    pub begin: u32,
    pub data: Vec<u8>,
}

/// Per-connection state, created when a transport connects and destroyed
/// when it closes or is terminated for a protocol violation.
pub struct Session {
    pub id: u64,
    pub peer_addr: String,
    pub phase: HandshakePhase,
    /// `Some` for a session this engine initiated (leech mode): the
    /// infohash it dialed out to verify against. `None` for an accepted
    /// inbound connection, which must look the infohash up instead.
    pub expected_info_hash: Option<[u8; 20]>,
    pub info_hash: Option<[u8; 20]>,
    pub metainfo: Option<Metainfo>,
    pub peer_id: Option<[u8; 20]>,

    pub am_choking: bool,
    pub am_interested: bool,
    pub peer_choking: bool,
    pub peer_interested: bool,
    pub peer_has: HashSet<u32>,
    /// Set after the first post-handshake message is processed. A bitfield
    /// is only legal as that very first message.
    pub first_message_seen: bool,

    /// Leech sessions only: blocks received for a piece not yet complete.
    pub partial_pieces: HashMap<u32, Vec<PendingBlock>>,
    /// Leech sessions only: piece indices not yet written and verified.
    /// Populated in full the moment the session reaches `Established`;
    /// emptying it is exactly the session's completion condition.
    pub pieces_remaining: HashSet<u32>,

    pub inbound: mpsc::UnboundedReceiver<InboundEvent>,
    pub outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl Session {
    pub fn new(
        id: u64,
        peer_addr: String,
        expected_info_hash: Option<[u8; 20]>,
        inbound: mpsc::UnboundedReceiver<InboundEvent>,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        Session {
            id,
            peer_addr,
            phase: HandshakePhase::AwaitInfohash,
            expected_info_hash,
            info_hash: None,
            metainfo: None,
            peer_id: None,
            am_choking: true,
            am_interested: false,
            peer_choking: true,
            peer_interested: false,
            peer_has: HashSet::new(),
            first_message_seen: false,
            partial_pieces: HashMap::new(),
            pieces_remaining: HashSet::new(),
            inbound,
            outbound,
        }
    }

    /// A session is done leeching once every piece it started with has
    /// been written and verified.
    pub fn leech_complete(&self) -> bool {
        self.expected_info_hash.is_some()
            && self.phase == HandshakePhase::Established
            && self.pieces_remaining.is_empty()
    }

    pub fn send(&self, bytes: Vec<u8>) {
        let _ = self.outbound.send(bytes);
    }
}
