//! Tag=value wire codec.
//!
//! Encoding produces a complete FIX 4.4 message: standard header
//! (8/9/35/34/49/52/56), application body, and a modulo-256 checksum
//! trailer. Decoding is lenient about field order beyond the header but
//! verifies the checksum when one is present. Neither direction allocates
//! a dictionary; messages are flat `(tag, value)` lists.

use bytes::{BufMut, Bytes, BytesMut};

use crate::fields::{tags, BEGIN_STRING, SOH};

/// Codec-level failures. These abort the offending message, never the
/// session.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("message is missing tag {0}")]
    MissingTag(u32),
    #[error("malformed field (no '=' separator): {0:?}")]
    MalformedField(String),
    #[error("invalid value for tag {tag}: {value:?}")]
    InvalidValue { tag: u32, value: String },
    #[error("checksum mismatch: declared {declared}, computed {computed}")]
    ChecksumMismatch { declared: String, computed: String },
}

/// A decoded message: ordered `(tag, value)` pairs.
#[derive(Debug, Clone)]
pub struct RawMessage {
    fields: Vec<(u32, String)>,
}

impl RawMessage {
    /// Parse one SOH-delimited frame.
    ///
    /// When a CheckSum (10) field is present it is verified against all
    /// bytes preceding it.
    pub fn parse(frame: &[u8]) -> Result<Self, CodecError> {
        let mut fields = Vec::new();
        let mut checksum_declared: Option<String> = None;
        let mut body_end = 0usize;
        let mut pos = 0usize;

        for part in frame.split(|b| *b == SOH) {
            if part.is_empty() {
                pos += 1;
                continue;
            }
            let text = String::from_utf8_lossy(part);
            let (tag_str, value) = text
                .split_once('=')
                .ok_or_else(|| CodecError::MalformedField(text.to_string()))?;
            let tag: u32 = tag_str.parse().map_err(|_| CodecError::InvalidValue {
                tag: 0,
                value: tag_str.to_string(),
            })?;

            if tag == tags::CHECKSUM {
                checksum_declared = Some(value.to_string());
                body_end = pos;
            } else {
                fields.push((tag, value.to_string()));
            }
            pos += part.len() + 1;
        }

        if let Some(declared) = checksum_declared {
            let computed = checksum(&frame[..body_end]);
            if declared != computed {
                return Err(CodecError::ChecksumMismatch { declared, computed });
            }
        }

        Ok(Self { fields })
    }

    /// First value for `tag`, if present.
    pub fn get(&self, tag: u32) -> Option<&str> {
        self.fields
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_required(&self, tag: u32) -> Result<&str, CodecError> {
        self.get(tag).ok_or(CodecError::MissingTag(tag))
    }

    pub fn get_i64(&self, tag: u32) -> Result<i64, CodecError> {
        let value = self.get_required(tag)?;
        value.parse().map_err(|_| CodecError::InvalidValue {
            tag,
            value: value.to_string(),
        })
    }

    pub fn get_f64(&self, tag: u32) -> Result<f64, CodecError> {
        let value = self.get_required(tag)?;
        value.parse().map_err(|_| CodecError::InvalidValue {
            tag,
            value: value.to_string(),
        })
    }

    pub fn get_char(&self, tag: u32) -> Result<char, CodecError> {
        let value = self.get_required(tag)?;
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(CodecError::InvalidValue {
                tag,
                value: value.to_string(),
            }),
        }
    }

    /// MsgType (35), if present.
    pub fn msg_type(&self) -> Option<&str> {
        self.get(tags::MSG_TYPE)
    }
}

/// Encode a complete message: header, body fields, checksum trailer.
pub fn encode(
    msg_type: &str,
    sender_comp_id: &str,
    target_comp_id: &str,
    seq_num: u64,
    body: &[(u32, String)],
) -> Bytes {
    let sending_time = chrono::Utc::now().format("%Y%m%d-%H:%M:%S%.3f").to_string();

    let mut inner = BytesMut::with_capacity(128);
    put_field(&mut inner, tags::MSG_TYPE, msg_type);
    put_field(&mut inner, tags::MSG_SEQ_NUM, &seq_num.to_string());
    put_field(&mut inner, tags::SENDER_COMP_ID, sender_comp_id);
    put_field(&mut inner, tags::SENDING_TIME, &sending_time);
    put_field(&mut inner, tags::TARGET_COMP_ID, target_comp_id);
    for (tag, value) in body {
        put_field(&mut inner, *tag, value);
    }

    let mut msg = BytesMut::with_capacity(inner.len() + 32);
    put_field(&mut msg, tags::BEGIN_STRING, BEGIN_STRING);
    put_field(&mut msg, tags::BODY_LENGTH, &inner.len().to_string());
    msg.extend_from_slice(&inner);
    let cks = checksum(&msg);
    put_field(&mut msg, tags::CHECKSUM, &cks);

    msg.freeze()
}

fn put_field(buf: &mut BytesMut, tag: u32, value: &str) {
    buf.extend_from_slice(tag.to_string().as_bytes());
    buf.put_u8(b'=');
    buf.extend_from_slice(value.as_bytes());
    buf.put_u8(SOH);
}

/// Modulo-256 checksum over `bytes`, formatted as three digits.
fn checksum(bytes: &[u8]) -> String {
    let sum: u32 = bytes.iter().map(|b| *b as u32).sum();
    format!("{:03}", sum % 256)
}

/// Pull the next complete frame out of a read buffer, if one is present.
///
/// A frame ends at the SOH terminating the CheckSum (10) field. Bytes
/// before an incomplete frame stay in the buffer for the next read.
pub fn extract_frame(buf: &mut BytesMut) -> Option<BytesMut> {
    const CHECKSUM_MARK: &[u8] = b"\x0110=";

    let start = buf
        .windows(CHECKSUM_MARK.len())
        .position(|w| w == CHECKSUM_MARK)?;
    let after_mark = start + CHECKSUM_MARK.len();
    let end = buf[after_mark..].iter().position(|b| *b == SOH)?;
    Some(buf.split_to(after_mark + end + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::msg_type;

    fn wire(parts: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for p in parts {
            out.extend_from_slice(p.as_bytes());
            out.push(SOH);
        }
        out
    }

    #[test]
    fn test_encode_shape() {
        let msg = encode(
            msg_type::EXECUTION_REPORT,
            "BLOTTER",
            "CLIENT",
            7,
            &[(tags::CL_ORD_ID, "abc".to_string())],
        );
        let text = String::from_utf8_lossy(&msg);
        assert!(text.starts_with("8=FIX.4.4\x019="));
        assert!(text.contains("\x0135=8\x01"));
        assert!(text.contains("\x0134=7\x01"));
        assert!(text.contains("\x0149=BLOTTER\x01"));
        assert!(text.contains("\x0156=CLIENT\x01"));
        assert!(text.contains("\x0111=abc\x01"));
        assert!(text.ends_with('\x01'));
        // trailer is 10=NNN followed by SOH: seven bytes
        let tail = &text[text.len() - 7..];
        assert!(tail.starts_with("10="));
    }

    #[test]
    fn test_encode_parse_roundtrip_with_checksum() {
        let msg = encode(
            msg_type::NEW_ORDER_SINGLE,
            "CLIENT",
            "BLOTTER",
            1,
            &[
                (tags::CL_ORD_ID, "ord-1".to_string()),
                (tags::SYMBOL, "AAPL".to_string()),
                (tags::SIDE, "1".to_string()),
                (tags::ORDER_QTY, "500".to_string()),
                (tags::PRICE, "150.25".to_string()),
            ],
        );

        let raw = RawMessage::parse(&msg).unwrap();
        assert_eq!(raw.msg_type(), Some("D"));
        assert_eq!(raw.get(tags::CL_ORD_ID), Some("ord-1"));
        assert_eq!(raw.get_i64(tags::ORDER_QTY).unwrap(), 500);
        assert_eq!(raw.get_f64(tags::PRICE).unwrap(), 150.25);
        assert_eq!(raw.get_char(tags::SIDE).unwrap(), '1');
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let mut msg = encode(msg_type::HEARTBEAT, "A", "B", 1, &[]).to_vec();
        // Corrupt a body byte without fixing the checksum.
        let pos = msg.iter().position(|b| *b == b'A').unwrap();
        msg[pos] = b'Z';
        let err = RawMessage::parse(&msg).unwrap_err();
        assert!(matches!(err, CodecError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_parse_without_checksum_is_lenient() {
        let msg = wire(&["8=FIX.4.4", "35=D", "11=x", "55=AAPL", "54=1", "38=10"]);
        let raw = RawMessage::parse(&msg).unwrap();
        assert_eq!(raw.msg_type(), Some("D"));
    }

    #[test]
    fn test_parse_malformed_field() {
        let msg = wire(&["8=FIX.4.4", "35=D", "garbage"]);
        assert!(matches!(
            RawMessage::parse(&msg),
            Err(CodecError::MalformedField(_))
        ));
    }

    #[test]
    fn test_missing_tag_error() {
        let msg = wire(&["8=FIX.4.4", "35=D"]);
        let raw = RawMessage::parse(&msg).unwrap();
        assert!(matches!(
            raw.get_required(tags::CL_ORD_ID),
            Err(CodecError::MissingTag(11))
        ));
    }

    #[test]
    fn test_invalid_numeric_value() {
        let msg = wire(&["8=FIX.4.4", "35=D", "38=many"]);
        let raw = RawMessage::parse(&msg).unwrap();
        assert!(matches!(
            raw.get_i64(tags::ORDER_QTY),
            Err(CodecError::InvalidValue { tag: 38, .. })
        ));
    }

    #[test]
    fn test_extract_frame_single() {
        let msg = encode(msg_type::HEARTBEAT, "A", "B", 1, &[]);
        let mut buf = BytesMut::from(&msg[..]);
        let frame = extract_frame(&mut buf).unwrap();
        assert_eq!(&frame[..], &msg[..]);
        assert!(buf.is_empty());
        assert!(extract_frame(&mut buf).is_none());
    }

    #[test]
    fn test_extract_frame_partial_then_complete() {
        let msg = encode(msg_type::HEARTBEAT, "A", "B", 1, &[]);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&msg[..10]);
        assert!(extract_frame(&mut buf).is_none());
        buf.extend_from_slice(&msg[10..]);
        let frame = extract_frame(&mut buf).unwrap();
        assert_eq!(&frame[..], &msg[..]);
    }

    #[test]
    fn test_extract_frame_two_back_to_back() {
        let a = encode(msg_type::HEARTBEAT, "A", "B", 1, &[]);
        let b = encode(msg_type::LOGOUT, "A", "B", 2, &[]);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&a);
        buf.extend_from_slice(&b);

        let f1 = extract_frame(&mut buf).unwrap();
        let f2 = extract_frame(&mut buf).unwrap();
        assert_eq!(RawMessage::parse(&f1).unwrap().msg_type(), Some("0"));
        assert_eq!(RawMessage::parse(&f2).unwrap().msg_type(), Some("5"));
        assert!(buf.is_empty());
    }
}
