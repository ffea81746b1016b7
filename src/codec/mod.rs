#![forbid(unsafe_code)]
//! Binary wire format for mutation payloads, records and historical events.
//!
//! Every backend stores and exchanges these bytes, so the layout is fixed:
//! big-endian integers, `i32` length prefixes where `-1` means absent, a
//! flag byte ahead of nullable integers, and single-byte tags for element
//! kinds, directions, slots and mutation type ids.
//!
//! ```text
//! payload: [version][type_id][fields]
//! record:  [version]['M'][element][slot][timestamp][sequence][visibility][type_id][fields]
//! event:   [version]['H'][type_id][element][slot][timestamp][sequence][visibility][fields]
//! ```

use serde::Serialize;

use crate::mutation::{HistoricalEvent, MutationPayload, MutationRecord, RecordParts};
use crate::primitives::bytes::{be, buf::Cursor};
use crate::types::{DecodeError, Result};

mod fields;

/// Current wire format version.
pub const FORMAT_VERSION: u8 = 1;
/// Frame tag for a full mutation record.
pub const FRAME_RECORD: u8 = b'M';
/// Frame tag for a historical event.
pub const FRAME_EVENT: u8 = b'H';

/// Types with a stable binary encoding.
pub trait WireCodec: Sized {
    /// Appends the encoding of `self` to `out`.
    ///
    /// # Panics
    ///
    /// Panics if any length-prefixed field or list holds more than
    /// `i32::MAX` bytes or entries, which the `i32` prefix cannot express.
    fn encode_into(&self, out: &mut Vec<u8>);

    /// Decodes a value; every byte of `src` must be consumed.
    fn decode(src: &[u8]) -> Result<Self>;

    /// Encodes `self` into a fresh buffer.
    ///
    /// # Panics
    ///
    /// Same conditions as [`WireCodec::encode_into`].
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }
}

fn read_version(cur: &mut Cursor<'_>) -> std::result::Result<(), DecodeError> {
    let version = cur.u8()?;
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    Ok(())
}

fn expect_frame(cur: &mut Cursor<'_>, tag: u8) -> std::result::Result<(), DecodeError> {
    let at = cur.offset();
    let found = cur.u8()?;
    if found != tag {
        return Err(DecodeError::corrupt(
            at,
            format!(
                "expected frame tag {:?}, found 0x{found:02X}",
                char::from(tag)
            ),
        ));
    }
    Ok(())
}

impl WireCodec for MutationPayload {
    fn encode_into(&self, out: &mut Vec<u8>) {
        be::put_u8(out, FORMAT_VERSION);
        be::put_u8(out, self.type_id());
        self.encode_fields(out);
    }

    fn decode(src: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(src);
        read_version(&mut cur)?;
        let kind = fields::read_kind(&mut cur)?;
        let payload = MutationPayload::decode_fields(kind, &mut cur)?;
        cur.ensure_consumed()?;
        payload.validate()?;
        Ok(payload)
    }
}

impl WireCodec for MutationRecord {
    fn encode_into(&self, out: &mut Vec<u8>) {
        be::put_u8(out, FORMAT_VERSION);
        be::put_u8(out, FRAME_RECORD);
        fields::put_element(out, self.element());
        fields::put_slot(out, self.slot());
        be::put_i64(out, self.timestamp());
        be::put_u64(out, self.sequence());
        fields::put_visibility(out, self.visibility());
        be::put_u8(out, self.payload().type_id());
        self.payload().encode_fields(out);
    }

    fn decode(src: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(src);
        read_version(&mut cur)?;
        expect_frame(&mut cur, FRAME_RECORD)?;
        let element = fields::read_element(&mut cur)?;
        let slot = fields::read_slot(&mut cur)?;
        let timestamp = cur.i64()?;
        let sequence = cur.u64()?;
        let visibility = fields::read_visibility(&mut cur)?;
        let kind = fields::read_kind(&mut cur)?;
        let payload = MutationPayload::decode_fields(kind, &mut cur)?;
        cur.ensure_consumed()?;
        MutationRecord::from_parts(RecordParts {
            element,
            slot,
            timestamp,
            visibility,
            payload,
            sequence,
        })
    }
}

impl WireCodec for HistoricalEvent {
    fn encode_into(&self, out: &mut Vec<u8>) {
        be::put_u8(out, FORMAT_VERSION);
        be::put_u8(out, FRAME_EVENT);
        be::put_u8(out, self.payload().type_id());
        fields::put_element(out, self.element());
        fields::put_slot(out, self.slot());
        be::put_i64(out, self.timestamp());
        be::put_u64(out, self.sequence());
        fields::put_visibility(out, self.visibility());
        self.payload().encode_fields(out);
    }

    fn decode(src: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(src);
        read_version(&mut cur)?;
        expect_frame(&mut cur, FRAME_EVENT)?;
        let kind = fields::read_kind(&mut cur)?;
        let element = fields::read_element(&mut cur)?;
        let slot = fields::read_slot(&mut cur)?;
        let timestamp = cur.i64()?;
        let sequence = cur.u64()?;
        let visibility = fields::read_visibility(&mut cur)?;
        let payload = MutationPayload::decode_fields(kind, &mut cur)?;
        cur.ensure_consumed()?;
        // Events narrate records, so they obey the same construction rules.
        let record = MutationRecord::from_parts(RecordParts {
            element,
            slot,
            timestamp,
            visibility,
            payload,
            sequence,
        })?;
        Ok(record.describe())
    }
}

/// Encodes a standalone payload.
pub fn encode_payload(payload: &MutationPayload) -> Vec<u8> {
    payload.encode()
}

/// Decodes a standalone payload.
pub fn decode_payload(src: &[u8]) -> Result<MutationPayload> {
    MutationPayload::decode(src)
}

/// Any frame the codec understands, as recognized by [`decode_frame`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "frame", content = "value", rename_all = "snake_case")]
pub enum Frame {
    /// A bare payload (`[version][type_id]...`).
    Payload(MutationPayload),
    /// A full mutation record.
    Record(MutationRecord),
    /// A historical event.
    Event(HistoricalEvent),
}

/// Decodes bytes of unknown frame type by inspecting the byte after the version.
///
/// Record and event tags (`'M'`, `'H'`) lie outside the type-id range, so the
/// three layouts never collide.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    match src.get(1) {
        Some(&FRAME_RECORD) => Ok(Frame::Record(MutationRecord::decode(src)?)),
        Some(&FRAME_EVENT) => Ok(Frame::Event(HistoricalEvent::decode(src)?)),
        Some(_) => Ok(Frame::Payload(MutationPayload::decode(src)?)),
        None => {
            let mut cur = Cursor::new(src);
            read_version(&mut cur)?;
            Err(DecodeError::corrupt(cur.offset(), "frame ends after version byte").into())
        }
    }
}
