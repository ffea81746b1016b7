//! Field-level encoders shared by every frame.

use crate::mutation::{EdgeRef, MetadataEntry, MutationKind, MutationPayload, PropertyValue, SlotKey};
use crate::primitives::bytes::{be, buf::Cursor, len};
use crate::types::{DecodeError, Direction, EdgeEndpoints, ElementId, ElementKind};
use crate::visibility::Visibility;

pub const TYPE_NULL: u8 = 0;
pub const TYPE_BOOL: u8 = 1;
pub const TYPE_INT: u8 = 2;
pub const TYPE_FLOAT: u8 = 3;
pub const TYPE_STR: u8 = 4;
pub const TYPE_BYTES: u8 = 5;
pub const TYPE_DATETIME: u8 = 6;
pub const TYPE_DATE: u8 = 7;

pub const SLOT_EXISTENCE: u8 = b'X';
pub const SLOT_PROPERTY: u8 = b'P';
pub const SLOT_ADJACENCY: u8 = b'A';

pub fn put_value(out: &mut Vec<u8>, value: &PropertyValue) {
    match value {
        PropertyValue::Null => be::put_u8(out, TYPE_NULL),
        PropertyValue::Bool(v) => {
            be::put_u8(out, TYPE_BOOL);
            be::put_u8(out, u8::from(*v));
        }
        PropertyValue::Int(v) => {
            be::put_u8(out, TYPE_INT);
            be::put_i64(out, *v);
        }
        PropertyValue::Float(v) => {
            be::put_u8(out, TYPE_FLOAT);
            be::put_f64(out, *v);
        }
        PropertyValue::Str(v) => {
            be::put_u8(out, TYPE_STR);
            len::put_str(out, v);
        }
        PropertyValue::Bytes(v) => {
            be::put_u8(out, TYPE_BYTES);
            len::put_bytes(out, Some(v.as_slice()));
        }
        PropertyValue::DateTime(v) => {
            be::put_u8(out, TYPE_DATETIME);
            be::put_i64(out, *v);
        }
        PropertyValue::Date(v) => {
            be::put_u8(out, TYPE_DATE);
            be::put_i64(out, *v);
        }
    }
}

pub fn read_value(cur: &mut Cursor<'_>) -> Result<PropertyValue, DecodeError> {
    let at = cur.offset();
    let value = match cur.u8()? {
        TYPE_NULL => PropertyValue::Null,
        TYPE_BOOL => {
            let at = cur.offset();
            match cur.u8()? {
                0 => PropertyValue::Bool(false),
                1 => PropertyValue::Bool(true),
                other => {
                    return Err(DecodeError::corrupt(
                        at,
                        format!("invalid boolean encoding 0x{other:02X}"),
                    ))
                }
            }
        }
        TYPE_INT => PropertyValue::Int(cur.i64()?),
        TYPE_FLOAT => PropertyValue::Float(cur.f64()?),
        TYPE_STR => PropertyValue::Str(cur.str()?),
        TYPE_BYTES => PropertyValue::Bytes(cur.bytes()?.to_vec()),
        TYPE_DATETIME => PropertyValue::DateTime(cur.i64()?),
        TYPE_DATE => PropertyValue::Date(cur.i64()?),
        other => {
            return Err(DecodeError::corrupt(
                at,
                format!("unknown value tag 0x{other:02X}"),
            ))
        }
    };
    Ok(value)
}

pub fn put_visibility(out: &mut Vec<u8>, visibility: &Visibility) {
    len::put_str(out, visibility.as_str());
}

pub fn read_visibility(cur: &mut Cursor<'_>) -> Result<Visibility, DecodeError> {
    let at = cur.offset();
    let text = cur.str()?;
    Visibility::new(text)
        .map_err(|err| DecodeError::corrupt(at, format!("invalid visibility label: {err}")))
}

pub fn put_direction(out: &mut Vec<u8>, direction: Direction) {
    be::put_u8(out, direction.tag());
}

pub fn read_direction(cur: &mut Cursor<'_>) -> Result<Direction, DecodeError> {
    let at = cur.offset();
    let tag = cur.u8()?;
    Direction::from_tag(tag)
        .ok_or_else(|| DecodeError::corrupt(at, format!("unknown direction tag 0x{tag:02X}")))
}

pub fn put_element(out: &mut Vec<u8>, element: &ElementId) {
    be::put_u8(out, element.kind.tag());
    len::put_str(out, &element.id);
}

pub fn read_element(cur: &mut Cursor<'_>) -> Result<ElementId, DecodeError> {
    let at = cur.offset();
    let tag = cur.u8()?;
    let kind = ElementKind::from_tag(tag)
        .ok_or_else(|| DecodeError::corrupt(at, format!("unknown element kind tag 0x{tag:02X}")))?;
    let id = cur.str()?;
    Ok(ElementId { kind, id })
}

pub fn put_slot(out: &mut Vec<u8>, slot: &SlotKey) {
    match slot {
        SlotKey::Existence => be::put_u8(out, SLOT_EXISTENCE),
        SlotKey::Property {
            key,
            name,
            visibility,
        } => {
            be::put_u8(out, SLOT_PROPERTY);
            len::put_str(out, key);
            len::put_str(out, name);
            put_visibility(out, visibility);
        }
        SlotKey::Adjacency { edge_id, direction } => {
            be::put_u8(out, SLOT_ADJACENCY);
            len::put_str(out, edge_id);
            put_direction(out, *direction);
        }
    }
}

pub fn read_slot(cur: &mut Cursor<'_>) -> Result<SlotKey, DecodeError> {
    let at = cur.offset();
    match cur.u8()? {
        SLOT_EXISTENCE => Ok(SlotKey::Existence),
        SLOT_PROPERTY => {
            let key = cur.str()?;
            let name = cur.str()?;
            let visibility = read_visibility(cur)?;
            Ok(SlotKey::Property {
                key,
                name,
                visibility,
            })
        }
        SLOT_ADJACENCY => {
            let edge_id = cur.str()?;
            let direction = read_direction(cur)?;
            Ok(SlotKey::Adjacency { edge_id, direction })
        }
        other => Err(DecodeError::corrupt(
            at,
            format!("unknown slot tag 0x{other:02X}"),
        )),
    }
}

fn put_edge_ref(out: &mut Vec<u8>, edge: &EdgeRef) {
    len::put_str(out, &edge.edge_id);
    put_direction(out, edge.direction);
    len::put_opt_str(out, edge.edge_label.as_deref());
    len::put_str(out, &edge.other_vertex_id);
    put_visibility(out, &edge.edge_visibility);
}

fn read_edge_ref(cur: &mut Cursor<'_>) -> Result<EdgeRef, DecodeError> {
    let edge_id = cur.str()?;
    let direction = read_direction(cur)?;
    let edge_label = cur.opt_str()?;
    let other_vertex_id = cur.str()?;
    let edge_visibility = read_visibility(cur)?;
    Ok(EdgeRef {
        edge_id,
        direction,
        edge_label,
        other_vertex_id,
        edge_visibility,
    })
}

fn put_metadata_entry(out: &mut Vec<u8>, entry: &MetadataEntry) {
    len::put_str(out, &entry.key);
    put_value(out, &entry.value);
    put_visibility(out, &entry.visibility);
}

fn read_metadata_entry(cur: &mut Cursor<'_>) -> Result<MetadataEntry, DecodeError> {
    let key = cur.str()?;
    let value = read_value(cur)?;
    let visibility = read_visibility(cur)?;
    Ok(MetadataEntry {
        key,
        value,
        visibility,
    })
}

fn put_endpoints(out: &mut Vec<u8>, endpoints: Option<&EdgeEndpoints>) {
    match endpoints {
        None => len::put_bytes(out, None),
        Some(ends) => {
            let mut nested = Vec::new();
            len::put_str(&mut nested, &ends.out_vertex_id);
            len::put_str(&mut nested, &ends.in_vertex_id);
            len::put_str(&mut nested, &ends.label);
            len::put_bytes(out, Some(nested.as_slice()));
        }
    }
}

fn read_endpoints(cur: &mut Cursor<'_>) -> Result<Option<EdgeEndpoints>, DecodeError> {
    let base = cur.offset();
    let Some(body) = cur.opt_bytes()? else {
        return Ok(None);
    };
    let mut nested = Cursor::new(body);
    let rebase = |err: DecodeError| match err {
        DecodeError::CorruptPayload { offset, reason } => DecodeError::CorruptPayload {
            offset: base + 4 + offset,
            reason,
        },
        other => other,
    };
    let out_vertex_id = nested.str().map_err(rebase)?;
    let in_vertex_id = nested.str().map_err(rebase)?;
    let label = nested.str().map_err(rebase)?;
    nested.ensure_consumed().map_err(rebase)?;
    Ok(Some(EdgeEndpoints {
        out_vertex_id,
        in_vertex_id,
        label,
    }))
}

impl MutationPayload {
    /// Appends the variant's fields (without its type id).
    ///
    /// # Panics
    ///
    /// Panics if a string, byte value or metadata list exceeds `i32::MAX`
    /// bytes or entries.
    pub fn encode_fields(&self, out: &mut Vec<u8>) {
        match self {
            MutationPayload::AddPropertyValue { value, metadata } => {
                put_value(out, value);
                be::put_i32(out, len::prefix(metadata.len()));
                for entry in metadata {
                    put_metadata_entry(out, entry);
                }
            }
            MutationPayload::DeleteProperty => {}
            MutationPayload::AddEdgeToVertex(edge) | MutationPayload::DeleteEdgeToVertex(edge) => {
                put_edge_ref(out, edge)
            }
            MutationPayload::MarkHidden {
                hide_visibility,
                timestamp_of_hide: at,
            }
            | MutationPayload::MarkVisible {
                hide_visibility,
                timestamp_of_visible: at,
            } => {
                put_visibility(out, hide_visibility);
                len::put_opt_i64(out, *at);
            }
            MutationPayload::SoftDeleteElement { timestamp } => be::put_i64(out, *timestamp),
            MutationPayload::AlterElementVisibility { new_visibility } => {
                put_visibility(out, new_visibility)
            }
            MutationPayload::SetMetadata(entry) => put_metadata_entry(out, entry),
            MutationPayload::DeleteMetadata { key, visibility } => {
                len::put_str(out, key);
                put_visibility(out, visibility);
            }
            MutationPayload::CreateElement { edge } => put_endpoints(out, edge.as_ref()),
        }
    }

    /// Reads the fields of a `kind` variant.
    pub fn decode_fields(kind: MutationKind, cur: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        let payload = match kind {
            MutationKind::AddPropertyValue => {
                let value = read_value(cur)?;
                let at = cur.offset();
                let count = cur.i32()?;
                let count = usize::try_from(count).map_err(|_| {
                    DecodeError::corrupt(at, format!("negative metadata count {count}"))
                })?;
                let mut metadata = Vec::with_capacity(count.min(cur.remaining()));
                for _ in 0..count {
                    metadata.push(read_metadata_entry(cur)?);
                }
                MutationPayload::AddPropertyValue { value, metadata }
            }
            MutationKind::DeleteProperty => MutationPayload::DeleteProperty,
            MutationKind::AddEdgeToVertex => MutationPayload::AddEdgeToVertex(read_edge_ref(cur)?),
            MutationKind::DeleteEdgeToVertex => {
                MutationPayload::DeleteEdgeToVertex(read_edge_ref(cur)?)
            }
            MutationKind::MarkHidden => MutationPayload::MarkHidden {
                hide_visibility: read_visibility(cur)?,
                timestamp_of_hide: cur.opt_i64()?,
            },
            MutationKind::MarkVisible => MutationPayload::MarkVisible {
                hide_visibility: read_visibility(cur)?,
                timestamp_of_visible: cur.opt_i64()?,
            },
            MutationKind::SoftDeleteElement => MutationPayload::SoftDeleteElement {
                timestamp: cur.i64()?,
            },
            MutationKind::AlterElementVisibility => MutationPayload::AlterElementVisibility {
                new_visibility: read_visibility(cur)?,
            },
            MutationKind::SetMetadata => MutationPayload::SetMetadata(read_metadata_entry(cur)?),
            MutationKind::DeleteMetadata => MutationPayload::DeleteMetadata {
                key: cur.str()?,
                visibility: read_visibility(cur)?,
            },
            MutationKind::CreateElement => MutationPayload::CreateElement {
                edge: read_endpoints(cur)?,
            },
        };
        Ok(payload)
    }
}

pub fn read_kind(cur: &mut Cursor<'_>) -> Result<MutationKind, DecodeError> {
    let at = cur.offset();
    let id = cur.u8()?;
    MutationKind::from_type_id(id)
        .ok_or_else(|| DecodeError::corrupt(at, format!("unknown mutation type id {id}")))
}
