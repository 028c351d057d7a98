use super::error::BencodeError;
use super::value::BencodeValue;

pub fn parse_value(input: &[u8]) -> Result<(BencodeValue, &[u8]), BencodeError> {
    if input.is_empty() {
        return Err(BencodeError::UnexpectedEof);
    }

    match input[0] {
        b'i' => parse_int(input),
        b'l' => parse_list(input),
        b'd' => parse_dict(input),
        b'0'..=b'9' => parse_string(input),
        other => Err(BencodeError::WrongType {
            expected: "String/List/Integer/Dictionary".into(),
            found: format!("unknown byte: {}", other),
        }),
    }
}

// Integers are represented by an 'i' followed by the number in base 10
// followed by an 'e'. i3e == 3, i-3e == -3.
//
// A conformant BEP 3 decoder rejects leading zeros (i03e) and -0 (i-0e);
// this one accepts them, matching the reference Python implementation
// (which just calls int() on the digit run and never validates the
// grammar). Torrents produced by loose encoders in the wild rely on this.
pub fn parse_int(input: &[u8]) -> Result<(BencodeValue, &[u8]), BencodeError> {
    if !input.starts_with(b"i") {
        return Err(BencodeError::InvalidInteger("missing 'i'".to_string()));
    }

    let end = input
        .iter()
        .position(|&b| b == b'e')
        .ok_or_else(|| BencodeError::InvalidInteger("missing 'e'".into()))?;

    let num_str = std::str::from_utf8(&input[1..end])
        .map_err(|_| BencodeError::InvalidInteger("invalid UTF-8 in number".into()))?;

    let value = num_str
        .parse::<i64>()
        .map_err(|_| BencodeError::InvalidInteger(format!("cannot parse: {}", num_str)))?;

    Ok((BencodeValue::Integer(value), &input[end + 1..]))
}

// Strings are length-prefixed base ten followed by a colon and the bytes.
// 4:spam == "spam".
pub fn parse_string(input: &[u8]) -> Result<(BencodeValue, &[u8]), BencodeError> {
    let colon_pos = input
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| BencodeError::InvalidString("missing ':'".into()))?;

    let len_str = std::str::from_utf8(&input[..colon_pos])
        .map_err(|_| BencodeError::InvalidString("invalid UTF-8 in length".into()))?;
    let len = len_str
        .parse::<usize>()
        .map_err(|_| BencodeError::InvalidString(format!("cannot parse length: {}", len_str)))?;

    let start = colon_pos + 1;
    let end = start
        .checked_add(len)
        .ok_or_else(|| BencodeError::InvalidString("length overflow".into()))?;

    if input.len() < end {
        return Err(BencodeError::InvalidString(
            "string length exceeds input length".into(),
        ));
    }

    let bytes = &input[start..end];

    let value = match std::str::from_utf8(bytes) {
        Ok(s) => BencodeValue::String(s.to_string()),
        Err(_) => BencodeValue::Bytes(bytes.to_vec()),
    };

    Ok((value, &input[end..]))
}

/// Parses a dictionary key, which bencode requires to be a byte string, as
/// raw bytes regardless of whether it happens to be valid UTF-8 — key
/// lookups should never depend on `String`-vs-`Bytes` decode luck.
fn parse_key(input: &[u8]) -> Result<(Vec<u8>, &[u8]), BencodeError> {
    let (value, rest) = parse_string(input)?;
    let bytes = value.as_raw_bytes()?.to_vec();
    Ok((bytes, rest))
}

// Lists are an 'l' followed by elements followed by an 'e'.
pub fn parse_list(input: &[u8]) -> Result<(BencodeValue, &[u8]), BencodeError> {
    if !input.starts_with(b"l") {
        return Err(BencodeError::InvalidList(
            "input does not start with 'l'".into(),
        ));
    }

    let mut values = Vec::new();
    let mut rest = &input[1..];

    while !rest.is_empty() && !rest.starts_with(b"e") {
        let (value, remaining) = parse_value(rest)?;
        values.push(value);
        rest = remaining;
    }

    if !rest.starts_with(b"e") {
        return Err(BencodeError::InvalidList("missing ending 'e'".into()));
    }

    Ok((BencodeValue::List(values), &rest[1..]))
}

// Dictionaries are a 'd' followed by alternating key/value pairs followed
// by an 'e'. Keys are accepted in whatever order they appear on the wire
// and that order is preserved — only `encode` imposes lexicographic order.
pub fn parse_dict(input: &[u8]) -> Result<(BencodeValue, &[u8]), BencodeError> {
    if !input.starts_with(b"d") {
        return Err(BencodeError::InvalidDict(
            "input does not start with 'd'".into(),
        ));
    }

    let mut entries = Vec::new();
    let mut rest = &input[1..];

    while !rest.is_empty() && !rest.starts_with(b"e") {
        let (key, remaining) = parse_key(rest)?;
        rest = remaining;

        let (value, remaining) = parse_value(rest)?;
        entries.push((key, value));
        rest = remaining;
    }

    if !rest.starts_with(b"e") {
        return Err(BencodeError::InvalidDict("missing ending 'e'".into()));
    }

    Ok((BencodeValue::Dictionary(entries), &rest[1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_dictionary_s2() {
        let (value, rest) = parse_value(b"d3:cow3:moo4:spam4:eggse").unwrap();
        assert!(rest.is_empty());
        let dict = value.as_dict().unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict[0].0, b"cow");
        assert_eq!(dict[0].1.as_str().unwrap(), "moo");
        assert_eq!(dict[1].0, b"spam");
        assert_eq!(dict[1].1.as_str().unwrap(), "eggs");
    }

    #[test]
    fn decodes_integers_s3() {
        assert_eq!(parse_value(b"i-42e").unwrap().0.as_int().unwrap(), -42);
        assert_eq!(parse_value(b"i0e").unwrap().0.as_int().unwrap(), 0);
    }

    #[test]
    fn decodes_int_list_s3() {
        let (value, rest) = parse_value(b"li1ei2ei3ee").unwrap();
        assert!(rest.is_empty());
        let list = value.as_list().unwrap();
        let nums: Vec<i64> = list.iter().map(|v| v.as_int().unwrap()).collect();
        assert_eq!(nums, vec![1, 2, 3]);
    }

    #[test]
    fn accepts_leading_zero_and_negative_zero() {
        assert_eq!(parse_value(b"i03e").unwrap().0.as_int().unwrap(), 3);
        assert_eq!(parse_value(b"i-0e").unwrap().0.as_int().unwrap(), 0);
    }

    #[test]
    fn rejects_truncated_string() {
        assert!(parse_value(b"5:ab").is_err());
    }

    #[test]
    fn rejects_missing_terminator() {
        assert!(parse_value(b"li1e").is_err());
        assert!(parse_value(b"i5").is_err());
    }

    #[test]
    fn preserves_non_utf8_bytes_value() {
        let mut input = b"4:".to_vec();
        input.extend_from_slice(&[0xff, 0xfe, 0x00, 0x01]);
        let (value, rest) = parse_value(&input).unwrap();
        assert!(rest.is_empty());
        assert_eq!(value.as_raw_bytes().unwrap(), &[0xff, 0xfe, 0x00, 0x01]);
    }
}
