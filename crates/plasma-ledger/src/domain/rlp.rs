//! Canonical RLP.
//!
//! Encoding follows the usual rules: a single byte below 0x80 is its own
//! encoding, short payloads (< 56 bytes) carry a one-byte header, longer ones
//! a header followed by the minimal big-endian length.
//!
//! Decoding is strict. Every input that a canonical encoder could not have
//! produced is rejected: trailing bytes, lengths with leading zeros, long-form
//! headers for short payloads and single bytes below 0x80 wrapped in a string
//! header.

use super::errors::RlpError;

/// Deepest list nesting the decoder follows. Ledger structures nest at most
/// five levels (block or record, signed, unsigned, inputs, input).
pub const MAX_DEPTH: usize = 16;

// =============================================================================
// RLP ENCODING HELPERS
// =============================================================================

/// RLP-encode a byte slice.
pub fn rlp_encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        vec![data[0]]
    } else {
        let mut result = encode_header(0x80, data.len());
        result.extend_from_slice(data);
        result
    }
}

/// RLP-encode already-encoded items as a list.
pub fn rlp_encode_list(encoded_items: &[Vec<u8>]) -> Vec<u8> {
    let total_len: usize = encoded_items.iter().map(|e| e.len()).sum();
    let mut result = encode_header(0xc0, total_len);
    result.reserve(total_len);
    for encoded in encoded_items {
        result.extend_from_slice(encoded);
    }
    result
}

fn encode_header(offset: u8, len: usize) -> Vec<u8> {
    if len < 56 {
        vec![offset + len as u8]
    } else {
        let len_bytes = encode_length(len);
        let mut result = Vec::with_capacity(1 + len_bytes.len() + len);
        result.push(offset + 55 + len_bytes.len() as u8);
        result.extend_from_slice(&len_bytes);
        result
    }
}

/// Encode a length as minimal big-endian bytes.
fn encode_length(len: usize) -> Vec<u8> {
    let bytes = len.to_be_bytes();
    let start = bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(bytes.len() - 1);
    bytes[start..].to_vec()
}

// =============================================================================
// RLP DECODING
// =============================================================================

/// A decoded RLP item borrowing from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem<'a> {
    /// Byte string payload
    Bytes(&'a [u8]),
    /// List of nested items
    List(Vec<RlpItem<'a>>),
}

impl<'a> RlpItem<'a> {
    /// Borrow the payload of a byte string.
    pub fn as_bytes(&self) -> Result<&'a [u8], RlpError> {
        match self {
            RlpItem::Bytes(b) => Ok(b),
            RlpItem::List(_) => Err(RlpError::ExpectedBytes),
        }
    }

    /// Borrow the items of a list.
    pub fn as_list(&self) -> Result<&[RlpItem<'a>], RlpError> {
        match self {
            RlpItem::List(items) => Ok(items),
            RlpItem::Bytes(_) => Err(RlpError::ExpectedList),
        }
    }
}

/// Decode exactly one item spanning the whole input.
pub fn decode(data: &[u8]) -> Result<RlpItem<'_>, RlpError> {
    let (item, consumed) = decode_item(data, 0)?;
    if consumed != data.len() {
        return Err(RlpError::TrailingBytes(data.len() - consumed));
    }
    Ok(item)
}

fn decode_item(data: &[u8], depth: usize) -> Result<(RlpItem<'_>, usize), RlpError> {
    let prefix = *data.first().ok_or(RlpError::UnexpectedEnd)?;
    match prefix {
        0x00..=0x7f => Ok((RlpItem::Bytes(&data[..1]), 1)),
        0x80..=0xb7 => {
            let len = (prefix - 0x80) as usize;
            let payload = slice(data, 1, len)?;
            if len == 1 && payload[0] < 0x80 {
                return Err(RlpError::NonCanonicalSingleByte);
            }
            Ok((RlpItem::Bytes(payload), 1 + len))
        }
        0xb8..=0xbf => {
            let len_of_len = (prefix - 0xb7) as usize;
            let len = decode_long_length(data, len_of_len)?;
            let start = 1 + len_of_len;
            let payload = slice(data, start, len)?;
            Ok((RlpItem::Bytes(payload), start + len))
        }
        0xc0..=0xf7 => {
            let len = (prefix - 0xc0) as usize;
            let payload = slice(data, 1, len)?;
            Ok((RlpItem::List(decode_list_payload(payload, depth + 1)?), 1 + len))
        }
        0xf8..=0xff => {
            let len_of_len = (prefix - 0xf7) as usize;
            let len = decode_long_length(data, len_of_len)?;
            let start = 1 + len_of_len;
            let payload = slice(data, start, len)?;
            Ok((RlpItem::List(decode_list_payload(payload, depth + 1)?), start + len))
        }
    }
}

fn decode_list_payload(mut payload: &[u8], depth: usize) -> Result<Vec<RlpItem<'_>>, RlpError> {
    if depth > MAX_DEPTH {
        return Err(RlpError::TooDeep(MAX_DEPTH));
    }
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, consumed) = decode_item(payload, depth)?;
        items.push(item);
        payload = &payload[consumed..];
    }
    Ok(items)
}

fn decode_long_length(data: &[u8], len_of_len: usize) -> Result<usize, RlpError> {
    let len_bytes = slice(data, 1, len_of_len)?;
    if len_bytes[0] == 0 {
        return Err(RlpError::NonCanonicalSize);
    }
    if len_of_len > std::mem::size_of::<usize>() {
        return Err(RlpError::LengthOverflow);
    }
    let len = len_bytes
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    if len < 56 {
        return Err(RlpError::NonCanonicalSize);
    }
    Ok(len)
}

fn slice(data: &[u8], start: usize, len: usize) -> Result<&[u8], RlpError> {
    let end = start.checked_add(len).ok_or(RlpError::LengthOverflow)?;
    data.get(start..end).ok_or(RlpError::UnexpectedEnd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_single_byte() {
        assert_eq!(rlp_encode_bytes(&[0x05]), vec![0x05]);
        assert_eq!(rlp_encode_bytes(&[0x80]), vec![0x81, 0x80]);
        assert_eq!(rlp_encode_bytes(&[]), vec![0x80]);
    }

    #[test]
    fn test_encode_long_string() {
        let data = [0xaa; 60];
        let encoded = rlp_encode_bytes(&data);
        assert_eq!(&encoded[..2], &[0xb8, 60]);
        assert_eq!(encoded.len(), 62);
        assert_eq!(decode(&encoded).unwrap(), RlpItem::Bytes(&data));
    }

    #[test]
    fn test_encode_list() {
        let encoded = rlp_encode_list(&[rlp_encode_bytes(b"cat"), rlp_encode_bytes(b"dog")]);
        assert_eq!(
            encoded,
            vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );
    }

    #[test]
    fn test_decode_nested_list() {
        let inner = rlp_encode_list(&[rlp_encode_bytes(&[0x01]), rlp_encode_bytes(&[0xff; 4])]);
        let outer = rlp_encode_list(&[inner, rlp_encode_bytes(&[])]);
        let item = decode(&outer).unwrap();
        let items = item.as_list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_list().unwrap()[1].as_bytes().unwrap(), &[0xff; 4]);
        assert_eq!(items[1].as_bytes().unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_decode_long_list() {
        let items: Vec<Vec<u8>> = (0..20).map(|_| rlp_encode_bytes(&[0xaa; 10])).collect();
        let encoded = rlp_encode_list(&items);
        assert_eq!(encoded[0], 0xf8);
        assert_eq!(decode(&encoded).unwrap().as_list().unwrap().len(), 20);
    }

    #[test]
    fn test_reject_trailing_bytes() {
        assert_eq!(decode(&[0x05, 0x06]), Err(RlpError::TrailingBytes(1)));
    }

    #[test]
    fn test_reject_truncated() {
        assert_eq!(decode(&[0x83, b'c', b'a']), Err(RlpError::UnexpectedEnd));
        assert_eq!(decode(&[0xc2, 0x01]), Err(RlpError::UnexpectedEnd));
        assert_eq!(decode(&[]), Err(RlpError::UnexpectedEnd));
    }

    /// `levels` lists wrapped around an empty list, built inside out.
    fn nested(levels: usize) -> Vec<u8> {
        let mut headers = Vec::with_capacity(levels);
        let mut len = 1;
        for _ in 0..levels {
            let header = encode_header(0xc0, len);
            len += header.len();
            headers.push(header);
        }
        let mut out: Vec<u8> = headers.into_iter().rev().flatten().collect();
        out.push(0xc0);
        out
    }

    #[test]
    fn test_reject_excessive_nesting() {
        assert_eq!(nested(2), vec![0xc2, 0xc1, 0xc0]);
        assert!(decode(&nested(MAX_DEPTH - 1)).is_ok());
        assert_eq!(decode(&nested(MAX_DEPTH)), Err(RlpError::TooDeep(MAX_DEPTH)));
        assert_eq!(decode(&nested(200_000)), Err(RlpError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn test_reject_non_canonical_single_byte() {
        assert_eq!(decode(&[0x81, 0x05]), Err(RlpError::NonCanonicalSingleByte));
    }

    #[test]
    fn test_reject_long_form_for_short_payload() {
        let mut data = vec![0xb8, 0x03];
        data.extend_from_slice(b"abc");
        assert_eq!(decode(&data), Err(RlpError::NonCanonicalSize));
    }

    #[test]
    fn test_reject_leading_zero_length() {
        let mut data = vec![0xb9, 0x00, 0x40];
        data.extend_from_slice(&[0u8; 64]);
        assert_eq!(decode(&data), Err(RlpError::NonCanonicalSize));
    }

    #[test]
    fn test_type_mismatch() {
        let item = decode(&[0xc0]).unwrap();
        assert_eq!(item.as_bytes(), Err(RlpError::ExpectedBytes));
        let item = decode(&[0x80]).unwrap();
        assert_eq!(item.as_list().map(|l| l.len()), Err(RlpError::ExpectedList));
    }
}
