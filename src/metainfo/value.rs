use sha1::{Digest, Sha1};

use crate::bencode::BencodeValue;

use super::error::MetainfoError;

/// A typed projection of a single-file torrent's `info` dictionary.
/// Multi-file torrents (an `info.files` list) are out of scope and rejected
/// at load time — see `metainfo::parser::from_bencode`.
#[derive(Debug, Clone)]
pub struct Info {
    pub name: String,
    pub piece_length: u64,
    pub length: u64,
    pub pieces: Vec<[u8; 20]>,
    pub md5sum: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct Metainfo {
    pub announce: String,
    pub info: Info,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    pub encoding: Option<String>,
    pub creation_date: Option<i64>,
    /// The exact decoded `info` sub-mapping, retained byte-for-byte (modulo
    /// key re-sorting on encode, which is idempotent) so that `infohash`
    /// reproduces what the peer on the wire actually saw, including any
    /// keys this struct doesn't model.
    info_bencode: BencodeValue,
}

impl Info {
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn piece_hash(&self, index: usize) -> Option<&[u8; 20]> {
        self.pieces.get(index)
    }

    /// The byte size of piece `index`: `piece_length` for every piece except
    /// the last, which is whatever remains of `length`.
    pub fn piece_size(&self, index: usize) -> Option<u64> {
        let count = self.piece_count();
        if index >= count {
            return None;
        }
        if index + 1 == count {
            Some(self.length - self.piece_length * (count as u64 - 1))
        } else {
            Some(self.piece_length)
        }
    }
}

impl Metainfo {
    pub(super) fn new(
        announce: String,
        info: Info,
        comment: Option<String>,
        created_by: Option<String>,
        encoding: Option<String>,
        creation_date: Option<i64>,
        info_bencode: BencodeValue,
    ) -> Self {
        Metainfo {
            announce,
            info,
            comment,
            created_by,
            encoding,
            creation_date,
            info_bencode,
        }
    }

    /// The 20-byte SHA-1 of the bencoded `info` sub-mapping, exactly as
    /// received — a torrent's identity on the wire.
    pub fn infohash(&self) -> [u8; 20] {
        let encoded = crate::bencode::encode(&self.info_bencode);
        let mut hasher = Sha1::new();
        hasher.update(&encoded);
        hasher.finalize().into()
    }

    pub fn piece_count(&self) -> usize {
        self.info.piece_count()
    }

    pub fn piece_hash(&self, index: usize) -> Option<&[u8; 20]> {
        self.info.piece_hash(index)
    }

    pub fn piece_size(&self, index: usize) -> Option<u64> {
        self.info.piece_size(index)
    }

    pub fn total_size(&self) -> u64 {
        self.info.length
    }

    /// Re-validates the invariant relating piece count to file length —
    /// callers that hand-build a `Metainfo` outside of `parser::load` (none
    /// do today, but tests do) can use this to assert consistency.
    pub fn check_invariants(&self) -> Result<(), MetainfoError> {
        let expected_pieces = self.info.length.div_ceil(self.info.piece_length);
        if expected_pieces as usize != self.info.pieces.len() {
            return Err(MetainfoError::Invalid(format!(
                "piece count mismatch: ceil(length/piece_length) = {} but pieces table has {}",
                expected_pieces,
                self.info.pieces.len()
            )));
        }
        Ok(())
    }
}
