use super::value::{BencodeValue, Dict};

pub fn encode(input: &BencodeValue) -> Vec<u8> {
    match input {
        BencodeValue::Integer(i) => encode_integer(*i),
        BencodeValue::String(s) => encode_bytes(s.as_bytes()),
        BencodeValue::Bytes(b) => encode_bytes(b),
        BencodeValue::List(l) => encode_list(l),
        BencodeValue::Dictionary(d) => encode_dict(d),
    }
}

pub fn encode_integer(n: i64) -> Vec<u8> {
    format!("i{}e", n).into_bytes()
}

pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut result = format!("{}:", bytes.len()).into_bytes();
    result.extend_from_slice(bytes);
    result
}

pub fn encode_list(l: &[BencodeValue]) -> Vec<u8> {
    let mut result = b"l".to_vec();

    for item in l {
        result.extend(encode(item));
    }

    result.push(b'e');
    result
}

/// Dictionary keys are sorted lexicographically on raw bytes before
/// emission — this is what makes the infohash stable regardless of the
/// order a decoder happened to preserve them in.
pub fn encode_dict(dict: &Dict) -> Vec<u8> {
    let mut entries: Vec<&(Vec<u8>, BencodeValue)> = dict.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut result = b"d".to_vec();
    for (key, value) in entries {
        result.extend(encode_bytes(key));
        result.extend(encode(value));
    }
    result.push(b'e');
    result
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse_value;
    use super::*;

    #[test]
    fn round_trips_decoded_dictionary_s2() {
        let input = b"d3:cow3:moo4:spam4:eggse";
        let (value, _) = parse_value(input).unwrap();
        assert_eq!(encode(&value), input);
    }

    #[test]
    fn sorts_keys_on_encode() {
        let dict = vec![
            (b"zebra".to_vec(), BencodeValue::Integer(1)),
            (b"apple".to_vec(), BencodeValue::Integer(2)),
        ];
        let encoded = encode_dict(&dict);
        assert_eq!(encoded, b"d5:applei2e5:zebrai1ee");
    }

    #[test]
    fn encodes_request_message_layout_is_independent_of_map_order() {
        // Not a message encoding test (that lives in wire::message), just a
        // sanity check that re-encoding an arbitrary decode is byte stable.
        let input = b"d4:spaml1:a1:bee";
        let (value, _) = parse_value(input).unwrap();
        assert_eq!(encode(&value), input);
    }
}
