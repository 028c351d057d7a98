use std::fs;
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::bencode::helper::{get_int, get_raw_bytes, get_str, has_key};
use crate::bencode::value::Dict;
use crate::bencode::BencodeValue;

use super::error::MetainfoError;
use super::value::{Info, Metainfo};

pub fn load(path: impl AsRef<Path>) -> Result<Metainfo, MetainfoError> {
    let contents = fs::read(path)?;
    from_bytes(&contents)
}

pub fn from_bytes(contents: &[u8]) -> Result<Metainfo, MetainfoError> {
    let value = crate::bencode::decode(contents)?;
    from_bencode(&value)
}

pub fn from_bencode(value: &BencodeValue) -> Result<Metainfo, MetainfoError> {
    let top = value.as_dict()?;

    let announce = get_str(top, b"announce").unwrap_or("").to_string();
    let info_value = top
        .iter()
        .find(|(k, _)| k.as_slice() == b"info")
        .map(|(_, v)| v)
        .ok_or_else(|| MetainfoError::Invalid("missing 'info' dictionary".into()))?;
    let info_dict = info_value.as_dict()?;

    if has_key(info_dict, b"files") {
        return Err(MetainfoError::Invalid(
            "multi-file torrents (info.files) are not supported".into(),
        ));
    }

    let name = get_str(info_dict, b"name")?.to_string();
    let piece_length = get_int(info_dict, b"piece length")?;
    if piece_length <= 0 {
        return Err(MetainfoError::Invalid(
            "info.piece length must be positive".into(),
        ));
    }
    let piece_length = piece_length as u64;

    let length = get_int(info_dict, b"length")?;
    if length < 0 {
        return Err(MetainfoError::Invalid("info.length must be non-negative".into()));
    }
    let length = length as u64;

    let pieces_bytes = get_raw_bytes(info_dict, b"pieces")?;
    if pieces_bytes.len() % 20 != 0 {
        return Err(MetainfoError::Invalid(
            "info.pieces length is not a multiple of 20".into(),
        ));
    }
    let pieces: Vec<[u8; 20]> = pieces_bytes
        .chunks_exact(20)
        .map(|chunk| chunk.try_into().expect("chunks_exact(20) yields 20 bytes"))
        .collect();

    let md5sum = get_raw_bytes(info_dict, b"md5sum").ok().map(|b| b.to_vec());

    let comment = get_str(top, b"comment").ok().map(str::to_string);
    let created_by = get_str(top, b"created by").ok().map(str::to_string);
    let encoding = get_str(top, b"encoding").ok().map(str::to_string);
    let creation_date = get_int(top, b"creation date").ok();

    let info = Info {
        name,
        piece_length,
        length,
        pieces,
        md5sum,
    };

    let metainfo = Metainfo::new(
        announce,
        info,
        comment,
        created_by,
        encoding,
        creation_date,
        info_value.clone(),
    );
    metainfo.check_invariants()?;
    Ok(metainfo)
}

/// Builds a bencoded single-file torrent from a local file, the direct
/// port of `original_source/torrent.py::create_torrent`: chunk the file
/// into `piece_length`-sized pieces, SHA-1 each one, and record the
/// concatenated digests as `info.pieces`.
pub fn create_torrent(
    file_path: impl AsRef<Path>,
    piece_length: u64,
    comment: Option<&str>,
) -> Result<BencodeValue, MetainfoError> {
    let file_path = file_path.as_ref();
    let name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| MetainfoError::Invalid("file path has no file name".into()))?;

    let contents = fs::read(file_path)?;
    let mut pieces = Vec::new();
    for chunk in contents.chunks(piece_length as usize) {
        let mut hasher = Sha1::new();
        hasher.update(chunk);
        pieces.extend_from_slice(&hasher.finalize());
    }

    let info: Dict = vec![
        (b"length".to_vec(), BencodeValue::Integer(contents.len() as i64)),
        (b"name".to_vec(), BencodeValue::String(name)),
        (
            b"piece length".to_vec(),
            BencodeValue::Integer(piece_length as i64),
        ),
        (b"pieces".to_vec(), BencodeValue::Bytes(pieces)),
    ];

    let mut top: Dict = vec![
        (b"announce".to_vec(), BencodeValue::String(String::new())),
        (
            b"creation date".to_vec(),
            BencodeValue::Integer(unix_epoch_seconds()),
        ),
        (b"info".to_vec(), BencodeValue::Dictionary(info)),
    ];
    if let Some(comment) = comment {
        top.push((b"comment".to_vec(), BencodeValue::String(comment.to_string())));
    }

    Ok(BencodeValue::Dictionary(top))
}

fn unix_epoch_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
