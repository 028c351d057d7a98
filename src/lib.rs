pub mod bencode;
pub mod engine;
pub mod metainfo;
pub mod wire;

/// Peer id a seed session presents. Any 20-byte value is acceptable on the
/// wire; these match the reference implementation's fixed constants.
pub const SEED_PEER_ID: [u8; 20] = [b'1'; 20];
pub const LEECH_PEER_ID: [u8; 20] = [b'2'; 20];
