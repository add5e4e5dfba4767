//! Low-level tag/value primitives shared by every message schema.
//!
//! Wire format:
//! ```text
//! field := tag value
//! tag   := varint(field_number << 3 | wire_type)
//! value := varint                      (wire type 0)
//!        | 8 bytes                     (wire type 1, skipped)
//!        | varint(len) len-bytes       (wire type 2)
//!        | 4 bytes                     (wire type 5, skipped)
//! ```
//!
//! # Varints (for beginners)
//!
//! A varint stores an unsigned integer in 7-bit groups, least significant group
//! first.  The high bit of each byte says "another byte follows".  So `1234`
//! (`0b100_1101_0010`) becomes `0xD2 0x09`: the low seven bits `101_0010` with
//! the continuation bit set, then the remaining `1001`.

use crate::protocol::codec::CodecError;

/// Longest legal varint: ten 7-bit groups cover 64 bits.
pub const MAX_VARINT_LEN: usize = 10;

/// Wire type carried in the low three bits of every tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            other => Err(other),
        }
    }
}

/// A single parsed field, borrowing its payload from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawField<'a> {
    pub number: u32,
    pub value: RawValue<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawValue<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(&'a [u8]),
    Fixed32(u32),
}

impl RawValue<'_> {
    pub fn wire_type(&self) -> WireType {
        match self {
            RawValue::Varint(_) => WireType::Varint,
            RawValue::Fixed64(_) => WireType::Fixed64,
            RawValue::Bytes(_) => WireType::LengthDelimited,
            RawValue::Fixed32(_) => WireType::Fixed32,
        }
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

pub fn write_tag(buf: &mut Vec<u8>, field: u32, wire_type: WireType) {
    write_varint(buf, (u64::from(field) << 3) | wire_type as u64);
}

/// Writes a varint field, omitting it entirely when `value` is zero.
pub fn write_varint_field(buf: &mut Vec<u8>, field: u32, value: u64) {
    if value == 0 {
        return;
    }
    write_tag(buf, field, WireType::Varint);
    write_varint(buf, value);
}

/// Writes a length-delimited string field, omitting it when empty.
pub fn write_string_field(buf: &mut Vec<u8>, field: u32, value: &str) {
    if value.is_empty() {
        return;
    }
    write_tag(buf, field, WireType::LengthDelimited);
    write_varint(buf, value.len() as u64);
    buf.extend_from_slice(value.as_bytes());
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Reads one varint starting at `offset`.
///
/// Returns the value and the offset of the byte after it.
pub fn read_varint(buf: &[u8], offset: usize) -> Result<(u64, usize), CodecError> {
    let mut value: u64 = 0;
    for i in 0..MAX_VARINT_LEN {
        let Some(&byte) = buf.get(offset + i) else {
            return Err(CodecError::Malformed(format!(
                "truncated varint at offset {offset}"
            )));
        };
        // The tenth group only has room for the top bit of a u64.
        if i == MAX_VARINT_LEN - 1 && byte > 0x01 {
            return Err(CodecError::Malformed(format!(
                "varint at offset {offset} overflows 64 bits"
            )));
        }
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, offset + i + 1));
        }
    }
    Err(CodecError::Malformed(format!(
        "varint at offset {offset} is longer than {MAX_VARINT_LEN} bytes"
    )))
}

/// Splits `buf` into its fields, in wire order.
///
/// Unknown field numbers are kept; deciding what they mean is the schema's
/// job.  Only structural problems (truncation, bad wire types, field 0) are
/// reported here.
pub fn parse_fields(buf: &[u8]) -> Result<Vec<RawField<'_>>, CodecError> {
    let mut fields = Vec::new();
    let mut off = 0;
    while off < buf.len() {
        let (tag, next) = read_varint(buf, off)?;
        let number = u32::try_from(tag >> 3).map_err(|_| {
            CodecError::Malformed(format!("field number {} out of range", tag >> 3))
        })?;
        if number == 0 {
            return Err(CodecError::Malformed(format!(
                "field number 0 at offset {off}"
            )));
        }
        let raw_type = (tag & 0x07) as u8;
        let wire_type = WireType::try_from(raw_type).map_err(|t| {
            CodecError::Malformed(format!("unsupported wire type {t} for field {number}"))
        })?;
        off = next;

        let value = match wire_type {
            WireType::Varint => {
                let (v, next) = read_varint(buf, off)?;
                off = next;
                RawValue::Varint(v)
            }
            WireType::Fixed64 => {
                let bytes = take(buf, off, 8, number)?;
                off += 8;
                let mut le = [0u8; 8];
                le.copy_from_slice(bytes);
                RawValue::Fixed64(u64::from_le_bytes(le))
            }
            WireType::LengthDelimited => {
                let (len, next) = read_varint(buf, off)?;
                off = next;
                let len = usize::try_from(len).map_err(|_| {
                    CodecError::Malformed(format!("length {len} of field {number} too large"))
                })?;
                let bytes = take(buf, off, len, number)?;
                off += len;
                RawValue::Bytes(bytes)
            }
            WireType::Fixed32 => {
                let bytes = take(buf, off, 4, number)?;
                off += 4;
                let mut le = [0u8; 4];
                le.copy_from_slice(bytes);
                RawValue::Fixed32(u32::from_le_bytes(le))
            }
        };
        fields.push(RawField { number, value });
    }
    Ok(fields)
}

fn take(buf: &[u8], offset: usize, len: usize, field: u32) -> Result<&[u8], CodecError> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or_else(|| {
            CodecError::Malformed(format!(
                "field {field}: need {len} bytes at offset {offset}, buffer has {}",
                buf.len()
            ))
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
