use super::error::BencodeError;
use super::value::{BencodeValue, Dict};

fn lookup<'a>(dict: &'a Dict, key: &[u8]) -> Result<&'a BencodeValue, BencodeError> {
    dict.iter()
        .find(|(k, _)| k.as_slice() == key)
        .map(|(_, v)| v)
        .ok_or_else(|| BencodeError::MissingKey(String::from_utf8_lossy(key).into_owned()))
}

pub fn get_int(dict: &Dict, key: &[u8]) -> Result<i64, BencodeError> {
    lookup(dict, key)?.as_int()
}

pub fn get_str(dict: &Dict, key: &[u8]) -> Result<&str, BencodeError> {
    lookup(dict, key)?.as_str()
}

/// Raw byte value regardless of whether the decoder happened to classify it
/// as `String` or `Bytes` — the right accessor for opaque fields like
/// `pieces`, or any field whose UTF-8-ness shouldn't matter.
pub fn get_raw_bytes<'a>(dict: &'a Dict, key: &[u8]) -> Result<&'a [u8], BencodeError> {
    lookup(dict, key)?.as_raw_bytes()
}

pub fn get_list<'a>(dict: &'a Dict, key: &[u8]) -> Result<&'a Vec<BencodeValue>, BencodeError> {
    lookup(dict, key)?.as_list()
}

pub fn get_dict<'a>(dict: &'a Dict, key: &[u8]) -> Result<&'a Dict, BencodeError> {
    lookup(dict, key)?.as_dict()
}

pub fn has_key(dict: &Dict, key: &[u8]) -> bool {
    dict.iter().any(|(k, _)| k.as_slice() == key)
}
