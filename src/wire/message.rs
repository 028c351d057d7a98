use super::error::WireError;

pub const MSG_CHOKE: u8 = 0;
pub const MSG_UNCHOKE: u8 = 1;
pub const MSG_INTERESTED: u8 = 2;
pub const MSG_NOT_INTERESTED: u8 = 3;
pub const MSG_HAVE: u8 = 4;
pub const MSG_BITFIELD: u8 = 5;
pub const MSG_REQUEST: u8 = 6;
pub const MSG_PIECE: u8 = 7;
pub const MSG_CANCEL: u8 = 8;
pub const MSG_PORT: u8 = 9;

/// A framed PWP message, keep-alive included. Keep-alive has no id on the
/// wire (length prefix of 0); every other variant corresponds to the id
/// table in BEP 3.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have { index: u32 },
    Bitfield(Vec<u8>),
    Request { index: u32, begin: u32, length: u32 },
    Piece { index: u32, begin: u32, block: Vec<u8> },
    Cancel { index: u32, begin: u32, length: u32 },
    Port { port: u16 },
}

fn u32_at(body: &[u8], offset: usize) -> Result<u32, WireError> {
    let bytes: [u8; 4] = body
        .get(offset..offset + 4)
        .ok_or_else(|| WireError::ProtocolViolation("message too short".into()))?
        .try_into()
        .expect("slice of len 4");
    Ok(u32::from_be_bytes(bytes))
}

impl Message {
    /// Decodes the id + body of a single frame (the length prefix has
    /// already been stripped by the caller). `body` excludes the id byte.
    pub fn decode(id: u8, body: &[u8]) -> Result<Message, WireError> {
        match id {
            MSG_CHOKE => Ok(Message::Choke),
            MSG_UNCHOKE => Ok(Message::Unchoke),
            MSG_INTERESTED => Ok(Message::Interested),
            MSG_NOT_INTERESTED => Ok(Message::NotInterested),
            MSG_HAVE => Ok(Message::Have {
                index: u32_at(body, 0)?,
            }),
            MSG_BITFIELD => Ok(Message::Bitfield(body.to_vec())),
            MSG_REQUEST => Ok(Message::Request {
                index: u32_at(body, 0)?,
                begin: u32_at(body, 4)?,
                length: u32_at(body, 8)?,
            }),
            MSG_PIECE => {
                if body.len() < 8 {
                    return Err(WireError::ProtocolViolation(
                        "piece message shorter than index+begin".into(),
                    ));
                }
                Ok(Message::Piece {
                    index: u32_at(body, 0)?,
                    begin: u32_at(body, 4)?,
                    block: body[8..].to_vec(),
                })
            }
            MSG_CANCEL => Ok(Message::Cancel {
                index: u32_at(body, 0)?,
                begin: u32_at(body, 4)?,
                length: u32_at(body, 8)?,
            }),
            MSG_PORT => {
                let bytes: [u8; 2] = body
                    .get(0..2)
                    .ok_or_else(|| WireError::ProtocolViolation("port message too short".into()))?
                    .try_into()
                    .expect("slice of len 2");
                Ok(Message::Port {
                    port: u16::from_be_bytes(bytes),
                })
            }
            other => Err(WireError::ProtocolViolation(format!(
                "unknown message id: {}",
                other
            ))),
        }
    }

    /// Encodes this message including its 4-byte length prefix.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Message::KeepAlive => {
                out.extend_from_slice(&0u32.to_be_bytes());
            }
            Message::Choke => encode_empty(&mut out, MSG_CHOKE),
            Message::Unchoke => encode_empty(&mut out, MSG_UNCHOKE),
            Message::Interested => encode_empty(&mut out, MSG_INTERESTED),
            Message::NotInterested => encode_empty(&mut out, MSG_NOT_INTERESTED),
            Message::Have { index } => {
                out.extend_from_slice(&5u32.to_be_bytes());
                out.push(MSG_HAVE);
                out.extend_from_slice(&index.to_be_bytes());
            }
            Message::Bitfield(bits) => {
                out.extend_from_slice(&(1 + bits.len() as u32).to_be_bytes());
                out.push(MSG_BITFIELD);
                out.extend_from_slice(bits);
            }
            Message::Request { index, begin, length } => {
                out.extend_from_slice(&13u32.to_be_bytes());
                out.push(MSG_REQUEST);
                out.extend_from_slice(&index.to_be_bytes());
                out.extend_from_slice(&begin.to_be_bytes());
                out.extend_from_slice(&length.to_be_bytes());
            }
            Message::Piece { index, begin, block } => {
                out.extend_from_slice(&(9 + block.len() as u32).to_be_bytes());
                out.push(MSG_PIECE);
                out.extend_from_slice(&index.to_be_bytes());
                out.extend_from_slice(&begin.to_be_bytes());
                out.extend_from_slice(block);
            }
            Message::Cancel { index, begin, length } => {
                out.extend_from_slice(&13u32.to_be_bytes());
                out.push(MSG_CANCEL);
                out.extend_from_slice(&index.to_be_bytes());
                out.extend_from_slice(&begin.to_be_bytes());
                out.extend_from_slice(&length.to_be_bytes());
            }
            Message::Port { port } => {
                out.extend_from_slice(&3u32.to_be_bytes());
                out.push(MSG_PORT);
                out.extend_from_slice(&port.to_be_bytes());
            }
        }
        out
    }
}

fn encode_empty(out: &mut Vec<u8>, id: u8) {
    out.extend_from_slice(&1u32.to_be_bytes());
    out.push(id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_encodes_request() {
        let msg = Message::Request {
            index: 2,
            begin: 16384,
            length: 16384,
        };
        let bytes = msg.encode();
        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x0d, 0x06, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x40, 0x00, 0x00,
            0x00, 0x40, 0x00,
        ];
        assert_eq!(bytes, expected);

        let body = &bytes[5..];
        assert_eq!(Message::decode(bytes[4], body).unwrap(), msg);
    }

    #[test]
    fn round_trips_every_non_keepalive_variant() {
        let samples = vec![
            Message::Choke,
            Message::Unchoke,
            Message::Interested,
            Message::NotInterested,
            Message::Have { index: 7 },
            Message::Bitfield(vec![0xff, 0x00, 0x3c]),
            Message::Request {
                index: 1,
                begin: 0,
                length: 16384,
            },
            Message::Piece {
                index: 1,
                begin: 0,
                block: vec![1, 2, 3, 4, 5],
            },
            Message::Cancel {
                index: 1,
                begin: 0,
                length: 16384,
            },
            Message::Port { port: 6881 },
        ];

        for msg in samples {
            let bytes = msg.encode();
            let len = u32::from_be_bytes(bytes[0..4].try_into().unwrap()) as usize;
            let id = bytes[4];
            let body = &bytes[5..4 + len];
            assert_eq!(Message::decode(id, body).unwrap(), msg);
        }
    }

    #[test]
    fn rejects_unknown_id() {
        assert!(Message::decode(200, &[]).is_err());
    }

    #[test]
    fn rejects_short_request() {
        assert!(Message::decode(MSG_REQUEST, &[0, 0]).is_err());
    }
}
