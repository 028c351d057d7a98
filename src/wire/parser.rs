use super::error::WireError;
use super::message::Message;

/// The three-phase tagged variant described in the design notes: an
/// incremental parser owns the append-only byte buffer and dispatches on
/// its own phase tag instead of rebinding a handler closure (the shape
/// `original_source/async_seeder.py`'s `_infohash_handler` /
/// `_peer_id_handler` / `_message_handler` chain approximates informally).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitHandshakePrefix,
    AwaitPeerId,
    AwaitFrame,
}

/// Out-of-band pseudo-messages and regular framed messages, as yielded by
/// `MessageParser::poll`. `Handshake` and `PeerId` always precede any
/// `Message` on the same connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Handshake {
        pstr: Vec<u8>,
        reserved: [u8; 8],
        info_hash: [u8; 20],
    },
    PeerId([u8; 20]),
    Message(Message),
}

/// An incremental, byte-granularity-robust parser over a growing buffer.
/// `feed` appends bytes as they arrive off the wire; `poll` extracts as
/// many complete frames as are buffered, never blocking and never losing
/// bytes on a partial frame — however a fragmentation of the underlying
/// stream occurred, the sequence of `Event`s produced is identical to the
/// unfragmented case (see the `fragmentation_is_order_preserving` test).
pub struct MessageParser {
    buf: Vec<u8>,
    phase: Phase,
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageParser {
    pub fn new() -> Self {
        MessageParser {
            buf: Vec::new(),
            phase: Phase::AwaitHandshakePrefix,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Yields the next complete event, or `Ok(None)` if the buffer doesn't
    /// yet hold a whole frame.
    pub fn poll(&mut self) -> Result<Option<Event>, WireError> {
        match self.phase {
            Phase::AwaitHandshakePrefix => self.poll_handshake_prefix(),
            Phase::AwaitPeerId => self.poll_peer_id(),
            Phase::AwaitFrame => self.poll_frame(),
        }
    }

    fn poll_handshake_prefix(&mut self) -> Result<Option<Event>, WireError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let pstrlen = self.buf[0] as usize;
        let needed = 1 + pstrlen + 8 + 20;
        if self.buf.len() < needed {
            return Ok(None);
        }

        let pstr = self.buf[1..1 + pstrlen].to_vec();
        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&self.buf[1 + pstrlen..1 + pstrlen + 8]);
        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&self.buf[1 + pstrlen + 8..needed]);

        self.buf.drain(0..needed);
        self.phase = Phase::AwaitPeerId;

        Ok(Some(Event::Handshake {
            pstr,
            reserved,
            info_hash,
        }))
    }

    fn poll_peer_id(&mut self) -> Result<Option<Event>, WireError> {
        if self.buf.len() < 20 {
            return Ok(None);
        }
        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&self.buf[0..20]);
        self.buf.drain(0..20);
        self.phase = Phase::AwaitFrame;
        Ok(Some(Event::PeerId(peer_id)))
    }

    fn poll_frame(&mut self) -> Result<Option<Event>, WireError> {
        if self.buf.len() < 4 {
            return Ok(None);
        }
        let length = u32::from_be_bytes(self.buf[0..4].try_into().expect("slice of len 4")) as usize;

        if length == 0 {
            self.buf.drain(0..4);
            return Ok(Some(Event::Message(Message::KeepAlive)));
        }

        if self.buf.len() < 4 + length {
            return Ok(None);
        }

        let id = self.buf[4];
        let body = self.buf[5..4 + length].to_vec();
        let message = Message::decode(id, &body)?;
        self.buf.drain(0..4 + length);
        Ok(Some(Event::Message(message)))
    }

    /// Drains every event currently buffered — a convenience for callers
    /// that want to process a whole batch without manually looping `poll`.
    pub fn drain(&mut self) -> Result<Vec<Event>, WireError> {
        let mut events = Vec::new();
        while let Some(event) = self.poll()? {
            events.push(event);
        }
        Ok(events)
    }
}
