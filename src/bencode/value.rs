use super::error::BencodeError;

/// Bencode mappings preserve the key order they were decoded in; only
/// `encode` re-sorts them. Keys are raw bytes so that a non-UTF-8 `info.name`
/// (or any other field) survives a decode/encode round trip untouched.
pub type Dict = Vec<(Vec<u8>, BencodeValue)>;

#[derive(Debug, Clone, PartialEq)]
pub enum BencodeValue {
    Integer(i64),
    /// A byte string that happened to be valid UTF-8 at decode time.
    String(String),
    /// A byte string that is not valid UTF-8, or is known to be opaque
    /// (e.g. `pieces`).
    Bytes(Vec<u8>),
    List(Vec<BencodeValue>),
    Dictionary(Dict),
}

impl std::fmt::Display for BencodeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BencodeValue::Integer(i) => write!(f, "{}", i),
            BencodeValue::String(s) => write!(f, "\"{}\"", s),
            BencodeValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            BencodeValue::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            BencodeValue::Dictionary(d) => {
                write!(f, "{{")?;
                for (i, (k, v)) in d.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", String::from_utf8_lossy(k), v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl BencodeValue {
    pub fn type_name(&self) -> &str {
        match self {
            BencodeValue::Integer(_) => "Integer",
            BencodeValue::String(_) => "String",
            BencodeValue::Bytes(_) => "Bytes",
            BencodeValue::List(_) => "List",
            BencodeValue::Dictionary(_) => "Dictionary",
        }
    }

    pub fn as_dict(&self) -> Result<&Dict, BencodeError> {
        match self {
            BencodeValue::Dictionary(d) => Ok(d),
            _ => Err(BencodeError::WrongType {
                expected: "Dictionary".into(),
                found: self.type_name().into(),
            }),
        }
    }

    pub fn as_int(&self) -> Result<i64, BencodeError> {
        match self {
            BencodeValue::Integer(i) => Ok(*i),
            _ => Err(BencodeError::WrongType {
                expected: "Integer".into(),
                found: self.type_name().into(),
            }),
        }
    }

    pub fn as_list(&self) -> Result<&Vec<BencodeValue>, BencodeError> {
        match self {
            BencodeValue::List(l) => Ok(l),
            _ => Err(BencodeError::WrongType {
                expected: "List".into(),
                found: self.type_name().into(),
            }),
        }
    }

    /// The raw bytes of this value whether it decoded as text or as opaque
    /// bytes — callers that don't care about UTF-8-ness (e.g. `pieces`,
    /// `info_hash`) should use this instead of `as_str`.
    pub fn as_raw_bytes(&self) -> Result<&[u8], BencodeError> {
        match self {
            BencodeValue::String(s) => Ok(s.as_bytes()),
            BencodeValue::Bytes(b) => Ok(b),
            _ => Err(BencodeError::WrongType {
                expected: "String/Bytes".into(),
                found: self.type_name().into(),
            }),
        }
    }

    pub fn as_str(&self) -> Result<&str, BencodeError> {
        match self {
            BencodeValue::String(s) => Ok(s),
            _ => Err(BencodeError::WrongType {
                expected: "String".into(),
                found: self.type_name().into(),
            }),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        super::encoder::encode(self)
    }
}
