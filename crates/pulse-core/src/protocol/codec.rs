//! Field-exact encoders and decoders for the three message schemas.
//!
//! | Message   | Field           | Number | Type                         |
//! |-----------|-----------------|--------|------------------------------|
//! | Heartbeat | kind            | 1      | varint (omitted, always 0)   |
//! | Heartbeat | text            | 2      | string                       |
//! | Heartbeat | origin_host     | 3      | string                       |
//! | Heartbeat | origin_port     | 4      | varint                       |
//! | Heartbeat | identifier      | 5      | varint                       |
//! | Status    | kind            | 1      | varint                       |
//! | Status    | heartbeat_count | 2      | varint                       |
//! | Status    | identifier      | 3      | varint                       |
//! | Error     | kind            | 1      | varint                       |
//! | Error     | text            | 2      | string                       |
//!
//! Default values (zero, empty string) are never written.
//!
//! # Shape check
//!
//! Tag/value parsing is permissive: status bytes fed to the heartbeat decoder
//! parse without a structural error.  After parsing, every decoder therefore
//! checks that each known field number carries the wire type its schema
//! expects, and that the kind tag (0 when absent) is its own kind.  A payload
//! that fails either test is reported as [`CodecError::IncorrectDecoder`].

use crate::protocol::messages::{
    error_fields, heartbeat_fields, status_fields, ErrorMessage, HeartbeatMessage, Message,
    MessageKind, StatusMessage, FIELD_KIND,
};
use crate::protocol::wire::{
    parse_fields, write_string_field, write_varint_field, RawField, RawValue, WireType,
};
use thiserror::Error;

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A required field was absent when encoding.
    #[error("cannot set {message}.{field} to None: expected {expected}, got nothing")]
    MissingField {
        message: &'static str,
        field: &'static str,
        expected: &'static str,
    },

    /// The bytes parse, but their field profile belongs to another schema.
    #[error("incorrect decoder")]
    IncorrectDecoder,

    /// The bytes are not a valid tag/value stream for any schema.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl From<CodecError> for ErrorMessage {
    fn from(err: CodecError) -> Self {
        ErrorMessage::new(err.to_string())
    }
}

// ── Schemas ───────────────────────────────────────────────────────────────────

struct Schema {
    kind: MessageKind,
    fields: &'static [(u32, WireType)],
}

const HEARTBEAT_SCHEMA: Schema = Schema {
    kind: MessageKind::Heartbeat,
    fields: &[
        (FIELD_KIND, WireType::Varint),
        (heartbeat_fields::TEXT, WireType::LengthDelimited),
        (heartbeat_fields::ORIGIN_HOST, WireType::LengthDelimited),
        (heartbeat_fields::ORIGIN_PORT, WireType::Varint),
        (heartbeat_fields::IDENTIFIER, WireType::Varint),
    ],
};

const STATUS_SCHEMA: Schema = Schema {
    kind: MessageKind::Status,
    fields: &[
        (FIELD_KIND, WireType::Varint),
        (status_fields::HEARTBEAT_COUNT, WireType::Varint),
        (status_fields::IDENTIFIER, WireType::Varint),
    ],
};

const ERROR_SCHEMA: Schema = Schema {
    kind: MessageKind::Error,
    fields: &[
        (FIELD_KIND, WireType::Varint),
        (error_fields::TEXT, WireType::LengthDelimited),
    ],
};

impl Schema {
    fn expected_wire_type(&self, number: u32) -> Option<WireType> {
        self.fields
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, wt)| *wt)
    }

    fn check_shape(&self, fields: &[RawField<'_>]) -> Result<(), CodecError> {
        let mut kind = 0u64;
        for field in fields {
            if let Some(expected) = self.expected_wire_type(field.number) {
                if field.value.wire_type() != expected {
                    return Err(CodecError::IncorrectDecoder);
                }
            }
            if let (FIELD_KIND, RawValue::Varint(v)) = (field.number, field.value) {
                kind = v;
            }
        }
        if kind != self.kind.as_u64() {
            return Err(CodecError::IncorrectDecoder);
        }
        Ok(())
    }
}

// ── Public API: heartbeat ─────────────────────────────────────────────────────

/// Encodes a [`HeartbeatMessage`].
///
/// # Errors
///
/// Returns [`CodecError::MissingField`] if `text` or `origin_host` is `None`.
///
/// # Examples
///
/// ```rust
/// use pulse_core::protocol::{decode_heartbeat, encode_heartbeat, HeartbeatMessage};
///
/// let msg = HeartbeatMessage::new("I’m here!", "0.0.0.0", 2222, 7777);
/// let bytes = encode_heartbeat(&msg).unwrap();
/// assert_eq!(decode_heartbeat(&bytes).unwrap(), msg);
/// ```
pub fn encode_heartbeat(m: &HeartbeatMessage) -> Result<Vec<u8>, CodecError> {
    let text = required(&m.text, "text")?;
    let origin_host = required(&m.origin_host, "origin_host")?;

    let mut buf = Vec::with_capacity(text.len() + origin_host.len() + 16);
    // kind is HEARTBEAT (0) and therefore never written.
    write_string_field(&mut buf, heartbeat_fields::TEXT, text);
    write_string_field(&mut buf, heartbeat_fields::ORIGIN_HOST, origin_host);
    write_varint_field(&mut buf, heartbeat_fields::ORIGIN_PORT, m.origin_port.into());
    write_varint_field(&mut buf, heartbeat_fields::IDENTIFIER, m.identifier.into());
    Ok(buf)
}

/// Decodes a [`HeartbeatMessage`].
///
/// # Errors
///
/// Returns [`CodecError::IncorrectDecoder`] when the bytes belong to another
/// schema and [`CodecError::Malformed`] when they are not a valid field stream.
pub fn decode_heartbeat(bytes: &[u8]) -> Result<HeartbeatMessage, CodecError> {
    heartbeat_from_fields(&parse_fields(bytes)?)
}

// ── Public API: status ────────────────────────────────────────────────────────

/// Encodes a [`StatusMessage`].  Status messages have no required strings, so
/// this cannot fail.
///
/// ```rust
/// use pulse_core::protocol::{encode_status, StatusMessage};
///
/// let bytes = encode_status(&StatusMessage { heartbeat_count: 100, identifier: 1234 });
/// assert_eq!(bytes, [0x08, 0x01, 0x10, 0x64, 0x18, 0xD2, 0x09]);
/// ```
pub fn encode_status(m: &StatusMessage) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16);
    write_varint_field(&mut buf, FIELD_KIND, MessageKind::Status.as_u64());
    write_varint_field(&mut buf, status_fields::HEARTBEAT_COUNT, m.heartbeat_count);
    write_varint_field(&mut buf, status_fields::IDENTIFIER, m.identifier.into());
    buf
}

/// Decodes a [`StatusMessage`].
///
/// # Errors
///
/// See [`decode_heartbeat`].
pub fn decode_status(bytes: &[u8]) -> Result<StatusMessage, CodecError> {
    status_from_fields(&parse_fields(bytes)?)
}

// ── Public API: error ─────────────────────────────────────────────────────────

pub fn encode_error(m: &ErrorMessage) -> Vec<u8> {
    let mut buf = Vec::with_capacity(m.text.len() + 8);
    write_varint_field(&mut buf, FIELD_KIND, MessageKind::Error.as_u64());
    write_string_field(&mut buf, error_fields::TEXT, &m.text);
    buf
}

pub fn decode_error(bytes: &[u8]) -> Result<ErrorMessage, CodecError> {
    error_from_fields(&parse_fields(bytes)?)
}

// ── Public API: kind sniffing ─────────────────────────────────────────────────

/// Decodes a message of unknown kind by reading its kind tag first.
///
/// A payload without field 1 is a heartbeat.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] if the kind tag is not a varint or names
/// no known kind, and any error of the selected decoder.
pub fn decode_any(bytes: &[u8]) -> Result<Message, CodecError> {
    let fields = parse_fields(bytes)?;
    let mut kind_value = 0u64;
    for field in fields.iter().filter(|f| f.number == FIELD_KIND) {
        match field.value {
            RawValue::Varint(v) => kind_value = v,
            other => {
                return Err(CodecError::Malformed(format!(
                    "kind tag must be a varint, found wire type {}",
                    other.wire_type() as u8
                )))
            }
        }
    }
    let kind = MessageKind::try_from(kind_value)
        .map_err(|v| CodecError::Malformed(format!("unknown message kind {v}")))?;

    match kind {
        MessageKind::Heartbeat => heartbeat_from_fields(&fields).map(Message::Heartbeat),
        MessageKind::Status => status_from_fields(&fields).map(Message::Status),
        MessageKind::Error => error_from_fields(&fields).map(Message::Error),
    }
}

// ── Per-schema field extraction ───────────────────────────────────────────────

fn heartbeat_from_fields(fields: &[RawField<'_>]) -> Result<HeartbeatMessage, CodecError> {
    HEARTBEAT_SCHEMA.check_shape(fields)?;
    let mut m = HeartbeatMessage {
        text: Some(String::new()),
        origin_host: Some(String::new()),
        origin_port: 0,
        identifier: 0,
    };
    for field in fields {
        match (field.number, field.value) {
            (heartbeat_fields::TEXT, RawValue::Bytes(b)) => m.text = Some(utf8(b, "text")?),
            (heartbeat_fields::ORIGIN_HOST, RawValue::Bytes(b)) => {
                m.origin_host = Some(utf8(b, "origin_host")?)
            }
            (heartbeat_fields::ORIGIN_PORT, RawValue::Varint(v)) => {
                m.origin_port = narrow(v, "origin_port")?
            }
            (heartbeat_fields::IDENTIFIER, RawValue::Varint(v)) => {
                m.identifier = narrow(v, "identifier")?
            }
            _ => {} // kind tag or unknown field
        }
    }
    Ok(m)
}

fn status_from_fields(fields: &[RawField<'_>]) -> Result<StatusMessage, CodecError> {
    STATUS_SCHEMA.check_shape(fields)?;
    let mut m = StatusMessage::default();
    for field in fields {
        match (field.number, field.value) {
            (status_fields::HEARTBEAT_COUNT, RawValue::Varint(v)) => m.heartbeat_count = v,
            (status_fields::IDENTIFIER, RawValue::Varint(v)) => {
                m.identifier = narrow(v, "identifier")?
            }
            _ => {}
        }
    }
    Ok(m)
}

fn error_from_fields(fields: &[RawField<'_>]) -> Result<ErrorMessage, CodecError> {
    ERROR_SCHEMA.check_shape(fields)?;
    let mut m = ErrorMessage::default();
    for field in fields {
        if let (error_fields::TEXT, RawValue::Bytes(b)) = (field.number, field.value) {
            m.text = utf8(b, "text")?;
        }
    }
    Ok(m)
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, CodecError> {
    value.as_deref().ok_or(CodecError::MissingField {
        message: "HeartbeatMessage",
        field,
        expected: "a UTF-8 string",
    })
}

fn utf8(bytes: &[u8], field: &str) -> Result<String, CodecError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| CodecError::Malformed(format!("{field}: invalid UTF-8: {e}")))
}

fn narrow(value: u64, field: &str) -> Result<u32, CodecError> {
    u32::try_from(value)
        .map_err(|_| CodecError::Malformed(format!("{field}: value {value} exceeds u32")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_heartbeat() -> HeartbeatMessage {
        HeartbeatMessage::new("send me count please", "0.0.0.0", 4000, 1234)
    }

    // ── Heartbeat ────────────────────────────────────────────────────────────

    #[test]
    fn test_heartbeat_literal_vector() {
        let bytes = encode_heartbeat(&sample_heartbeat()).unwrap();

        let mut expected = vec![0x12, 0x14];
        expected.extend_from_slice(b"send me count please");
        expected.extend_from_slice(&[0x1A, 0x07]);
        expected.extend_from_slice(b"0.0.0.0");
        expected.extend_from_slice(&[0x20, 0xA0, 0x1F, 0x28, 0xD2, 0x09]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_heartbeat_never_writes_kind_tag() {
        let bytes = encode_heartbeat(&sample_heartbeat()).unwrap();
        assert_ne!(bytes[0], 0x08, "heartbeat kind is zero and must be omitted");
    }

    #[test]
    fn test_heartbeat_round_trip() {
        let msg = sample_heartbeat();
        let bytes = encode_heartbeat(&msg).unwrap();
        assert_eq!(decode_heartbeat(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_heartbeat_with_empty_strings_and_zero_ints_round_trips() {
        let msg = HeartbeatMessage::new("", "", 0, 0);
        let bytes = encode_heartbeat(&msg).unwrap();
        assert!(bytes.is_empty());
        assert_eq!(decode_heartbeat(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_heartbeat_with_non_ascii_text_round_trips() {
        let msg = HeartbeatMessage::new("I’m here!", "hôte.local", 65535, u32::MAX);
        let bytes = encode_heartbeat(&msg).unwrap();
        assert_eq!(decode_heartbeat(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_heartbeat_missing_text_is_missing_field() {
        let msg = HeartbeatMessage {
            text: None,
            ..sample_heartbeat()
        };
        let err = encode_heartbeat(&msg).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot set HeartbeatMessage.text to None: expected a UTF-8 string, got nothing"
        );
    }

    #[test]
    fn test_heartbeat_missing_origin_host_names_the_field() {
        let msg = HeartbeatMessage {
            origin_host: None,
            ..sample_heartbeat()
        };
        let err = encode_heartbeat(&msg).unwrap_err();
        assert!(matches!(err, CodecError::MissingField { field: "origin_host", .. }));
    }

    // ── Status ───────────────────────────────────────────────────────────────

    #[test]
    fn test_status_literal_vector() {
        let bytes = encode_status(&StatusMessage {
            heartbeat_count: 100,
            identifier: 1234,
        });
        assert_eq!(bytes, vec![0x08, 0x01, 0x10, 0x64, 0x18, 0xD2, 0x09]);
    }

    #[test]
    fn test_status_round_trip() {
        let msg = StatusMessage {
            heartbeat_count: 1 << 40,
            identifier: 7777,
        };
        assert_eq!(decode_status(&encode_status(&msg)).unwrap(), msg);
    }

    #[test]
    fn test_status_zero_count_still_carries_kind() {
        let bytes = encode_status(&StatusMessage::default());
        assert_eq!(bytes, vec![0x08, 0x01]);
        assert_eq!(decode_status(&bytes).unwrap(), StatusMessage::default());
    }

    // ── Error ────────────────────────────────────────────────────────────────

    #[test]
    fn test_error_round_trip() {
        let msg = ErrorMessage::new("incorrect decoder");
        let bytes = encode_error(&msg);
        assert_eq!(&bytes[..2], &[0x08, 0x03]);
        assert_eq!(decode_error(&bytes).unwrap(), msg);
    }

    // ── Shape check ──────────────────────────────────────────────────────────

    #[test]
    fn test_status_bytes_through_heartbeat_decoder_is_incorrect_decoder() {
        let bytes = encode_status(&StatusMessage {
            heartbeat_count: 100,
            identifier: 1234,
        });
        assert_eq!(decode_heartbeat(&bytes), Err(CodecError::IncorrectDecoder));
    }

    #[test]
    fn test_heartbeat_bytes_through_status_decoder_is_incorrect_decoder() {
        let bytes = encode_heartbeat(&sample_heartbeat()).unwrap();
        assert_eq!(decode_status(&bytes), Err(CodecError::IncorrectDecoder));
    }

    #[test]
    fn test_error_bytes_through_heartbeat_decoder_is_incorrect_decoder() {
        // Same field numbers and wire types as a heartbeat, but kind = 3.
        let bytes = encode_error(&ErrorMessage::new("boom"));
        assert_eq!(decode_heartbeat(&bytes), Err(CodecError::IncorrectDecoder));
    }

    #[test]
    fn test_empty_bytes_are_a_heartbeat_but_not_a_status() {
        assert!(decode_heartbeat(&[]).is_ok());
        assert_eq!(decode_status(&[]), Err(CodecError::IncorrectDecoder));
    }

    #[test]
    fn test_reserved_kind_fails_every_decoder() {
        let bytes = [0x08, 0x02];
        assert_eq!(decode_heartbeat(&bytes), Err(CodecError::IncorrectDecoder));
        assert_eq!(decode_status(&bytes), Err(CodecError::IncorrectDecoder));
        assert_eq!(decode_error(&bytes), Err(CodecError::IncorrectDecoder));
    }

    #[test]
    fn test_incorrect_decoder_display_text() {
        assert_eq!(CodecError::IncorrectDecoder.to_string(), "incorrect decoder");
    }

    // ── Tolerance ────────────────────────────────────────────────────────────

    #[test]
    fn test_unknown_fields_are_skipped() {
        let mut bytes = encode_status(&StatusMessage {
            heartbeat_count: 3,
            identifier: 9,
        });
        // field 9, length-delimited "xyz"
        bytes.extend_from_slice(&[0x4A, 0x03, b'x', b'y', b'z']);

        let decoded = decode_status(&bytes).unwrap();

        assert_eq!(decoded.heartbeat_count, 3);
        assert_eq!(decoded.identifier, 9);
    }

    #[test]
    fn test_repeated_field_keeps_last_value() {
        let bytes = [0x08, 0x01, 0x10, 0x01, 0x10, 0x05];
        assert_eq!(decode_status(&bytes).unwrap().heartbeat_count, 5);
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let bytes = [0x12, 0x02, 0xC3, 0x28];
        assert!(matches!(decode_heartbeat(&bytes), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_identifier_over_u32_is_malformed() {
        let mut bytes = vec![0x08, 0x01, 0x18];
        crate::protocol::wire::write_varint(&mut bytes, u64::from(u32::MAX) + 1);
        assert!(matches!(decode_status(&bytes), Err(CodecError::Malformed(_))));
    }

    // ── decode_any ───────────────────────────────────────────────────────────

    #[test]
    fn test_decode_any_selects_decoder_by_kind() {
        let hb = sample_heartbeat();
        let st = StatusMessage {
            heartbeat_count: 4,
            identifier: 1,
        };
        let er = ErrorMessage::new("nope");

        assert_eq!(
            decode_any(&encode_heartbeat(&hb).unwrap()),
            Ok(Message::Heartbeat(hb))
        );
        assert_eq!(decode_any(&encode_status(&st)), Ok(Message::Status(st)));
        assert_eq!(decode_any(&encode_error(&er)), Ok(Message::Error(er)));
    }

    #[test]
    fn test_decode_any_rejects_reserved_kind() {
        let err = decode_any(&[0x08, 0x02]).unwrap_err();
        assert_eq!(err, CodecError::Malformed("unknown message kind 2".to_string()));
    }

    #[test]
    fn test_decode_any_rejects_non_varint_kind_tag() {
        let result = decode_any(&[0x0A, 0x01, b'x']);
        assert!(matches!(result, Err(CodecError::Malformed(_))));
    }

    // ── Conversion ───────────────────────────────────────────────────────────

    #[test]
    fn test_codec_error_converts_to_error_message() {
        let msg: ErrorMessage = CodecError::IncorrectDecoder.into();
        assert_eq!(msg.text, "incorrect decoder");
    }
}
