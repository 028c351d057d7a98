use super::error::WireError;

pub const PSTR: &[u8] = b"BitTorrent protocol";

/// The 68-byte (with the standard `pstr`) BEP 3 handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub pstr: Vec<u8>,
    pub reserved: [u8; 8],
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

impl Handshake {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Handshake {
            pstr: PSTR.to_vec(),
            reserved: [0u8; 8],
            info_hash,
            peer_id,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.pstr.len() + 8 + 20 + 20);
        bytes.push(self.pstr.len() as u8);
        bytes.extend_from_slice(&self.pstr);
        bytes.extend_from_slice(&self.reserved);
        bytes.extend_from_slice(&self.info_hash);
        bytes.extend_from_slice(&self.peer_id);
        bytes
    }

    /// Parses a complete handshake from a buffer that is exactly the right
    /// length for the `pstrlen` encoded in its first byte. The incremental
    /// parser (`wire::parser`) is responsible for working out that length
    /// and buffering enough bytes before calling this.
    pub fn from_bytes(bytes: &[u8]) -> Result<Handshake, WireError> {
        if bytes.is_empty() {
            return Err(WireError::HandshakeReject("empty handshake".into()));
        }

        let pstrlen = bytes[0] as usize;
        let expected_len = 1 + pstrlen + 8 + 20 + 20;
        if bytes.len() != expected_len {
            return Err(WireError::HandshakeReject(format!(
                "expected {} bytes for pstrlen {}, got {}",
                expected_len,
                pstrlen,
                bytes.len()
            )));
        }

        let pstr = bytes[1..1 + pstrlen].to_vec();

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&bytes[1 + pstrlen..1 + pstrlen + 8]);

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&bytes[1 + pstrlen + 8..1 + pstrlen + 28]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&bytes[1 + pstrlen + 28..1 + pstrlen + 48]);

        Ok(Handshake {
            pstr,
            reserved,
            info_hash,
            peer_id,
        })
    }
}
