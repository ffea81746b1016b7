use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Direction, ElementId, ElementKind, Result, Sequence, StrataError, Timestamp};
use crate::visibility::Visibility;

use super::{require_non_empty, HistoricalEvent, MutationPayload};

/// Which facet of an element a record versions.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "slot", rename_all = "snake_case")]
pub enum SlotKey {
    /// Element existence, element visibility and element-level hides.
    Existence,
    /// One property instance; several may share a name under different keys
    /// or visibilities.
    Property {
        /// Instance key distinguishing multi-valued properties.
        key: String,
        /// Property name.
        name: String,
        /// Label gating the value.
        #[serde(default)]
        visibility: Visibility,
    },
    /// One incident edge on a vertex.
    Adjacency {
        /// Edge identifier.
        edge_id: String,
        /// Direction relative to the vertex.
        direction: Direction,
    },
}

impl SlotKey {
    /// Builds a property slot.
    pub fn property(key: impl Into<String>, name: impl Into<String>, visibility: Visibility) -> Self {
        SlotKey::Property {
            key: key.into(),
            name: name.into(),
            visibility,
        }
    }

    /// Builds an adjacency slot.
    pub fn adjacency(edge_id: impl Into<String>, direction: Direction) -> Self {
        SlotKey::Adjacency {
            edge_id: edge_id.into(),
            direction,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKey::Existence => write!(f, "existence"),
            SlotKey::Property {
                key,
                name,
                visibility,
            } if visibility.is_empty() => write!(f, "{key}:{name}"),
            SlotKey::Property {
                key,
                name,
                visibility,
            } => write!(f, "{key}:{name}[{visibility}]"),
            SlotKey::Adjacency { edge_id, direction } => write!(f, "{direction}:{edge_id}"),
        }
    }
}

/// Unvalidated record fields, as read from JSON or assembled by a writer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordParts {
    /// Element the record belongs to.
    pub element: ElementId,
    /// Facet being versioned.
    pub slot: SlotKey,
    /// Write timestamp.
    pub timestamp: Timestamp,
    /// Label gating the record.
    #[serde(default)]
    pub visibility: Visibility,
    /// The mutation.
    pub payload: MutationPayload,
    /// Arrival sequence; zero until ingestion assigns one.
    #[serde(default)]
    pub sequence: Sequence,
}

/// An immutable, validated mutation record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordParts", into = "RecordParts")]
pub struct MutationRecord {
    element: ElementId,
    slot: SlotKey,
    timestamp: Timestamp,
    visibility: Visibility,
    payload: MutationPayload,
    sequence: Sequence,
}

impl MutationRecord {
    /// Validates and builds a record with sequence zero.
    pub fn new(
        element: ElementId,
        slot: SlotKey,
        timestamp: Timestamp,
        visibility: Visibility,
        payload: MutationPayload,
    ) -> Result<Self> {
        Self::from_parts(RecordParts {
            element,
            slot,
            timestamp,
            visibility,
            payload,
            sequence: 0,
        })
    }

    /// Validates and builds a record from its parts.
    pub fn from_parts(parts: RecordParts) -> Result<Self> {
        require_non_empty(&parts.element.id, "element id")?;
        parts.payload.validate()?;
        check_slot(&parts.element, &parts.slot, &parts.payload)?;
        Ok(Self {
            element: parts.element,
            slot: parts.slot,
            timestamp: parts.timestamp,
            visibility: parts.visibility,
            payload: parts.payload,
            sequence: parts.sequence,
        })
    }

    /// Returns a copy stamped with an arrival sequence.
    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = sequence;
        self
    }

    /// Element the record belongs to.
    pub fn element(&self) -> &ElementId {
        &self.element
    }

    /// Facet being versioned.
    pub fn slot(&self) -> &SlotKey {
        &self.slot
    }

    /// Write timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Label gating the record.
    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// The mutation.
    pub fn payload(&self) -> &MutationPayload {
        &self.payload
    }

    /// Arrival sequence.
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    /// The time at which the mutation takes effect.
    ///
    /// Soft deletes use their payload timestamp; hides and unhides use theirs
    /// when present. Everything else takes effect at the record timestamp.
    pub fn effective_timestamp(&self) -> Timestamp {
        effective_timestamp(self.timestamp, &self.payload)
    }

    /// Projects the record into its historical event.
    pub fn describe(&self) -> HistoricalEvent {
        HistoricalEvent::from_record(self)
    }

    /// Splits the record back into its parts.
    pub fn into_parts(self) -> RecordParts {
        RecordParts {
            element: self.element,
            slot: self.slot,
            timestamp: self.timestamp,
            visibility: self.visibility,
            payload: self.payload,
            sequence: self.sequence,
        }
    }
}

pub(crate) fn effective_timestamp(timestamp: Timestamp, payload: &MutationPayload) -> Timestamp {
    match payload {
        MutationPayload::SoftDeleteElement { timestamp } => *timestamp,
        MutationPayload::MarkHidden {
            timestamp_of_hide: Some(at),
            ..
        } => *at,
        MutationPayload::MarkVisible {
            timestamp_of_visible: Some(at),
            ..
        } => *at,
        _ => timestamp,
    }
}

impl TryFrom<RecordParts> for MutationRecord {
    type Error = StrataError;

    fn try_from(parts: RecordParts) -> Result<Self> {
        MutationRecord::from_parts(parts)
    }
}

impl From<MutationRecord> for RecordParts {
    fn from(record: MutationRecord) -> Self {
        record.into_parts()
    }
}

fn check_slot(element: &ElementId, slot: &SlotKey, payload: &MutationPayload) -> Result<()> {
    let kind = payload.kind();
    let mismatch = || {
        StrataError::invalid(format!("{kind} cannot target the {} slot", slot_name(slot)))
    };
    match (payload, slot) {
        (MutationPayload::AddPropertyValue { .. }, SlotKey::Property { .. } | SlotKey::Existence) => {}
        (
            MutationPayload::DeleteProperty
            | MutationPayload::SetMetadata(_)
            | MutationPayload::DeleteMetadata { .. },
            SlotKey::Property { .. },
        ) => {}
        (
            MutationPayload::AddEdgeToVertex(edge) | MutationPayload::DeleteEdgeToVertex(edge),
            SlotKey::Adjacency { edge_id, direction },
        ) => {
            if element.kind != ElementKind::Vertex {
                return Err(StrataError::invalid(format!(
                    "{kind} only applies to vertices, not {}",
                    element.kind
                )));
            }
            if &edge.edge_id != edge_id || edge.direction != *direction {
                return Err(StrataError::invalid(format!(
                    "{kind} for edge {} ({}) does not match slot {} ({})",
                    edge.edge_id, edge.direction, edge_id, direction
                )));
            }
        }
        (MutationPayload::MarkHidden { .. } | MutationPayload::MarkVisible { .. }, _) => {}
        (
            MutationPayload::SoftDeleteElement { .. } | MutationPayload::AlterElementVisibility { .. },
            SlotKey::Existence,
        ) => {}
        (MutationPayload::CreateElement { edge }, SlotKey::Existence) => {
            match (element.kind, edge.is_some()) {
                (ElementKind::Edge, false) => {
                    return Err(StrataError::invalid("creating an edge requires its endpoints"));
                }
                (ElementKind::Vertex, true) => {
                    return Err(StrataError::invalid("vertices do not carry edge endpoints"));
                }
                _ => {}
            }
        }
        _ => return Err(mismatch()),
    }
    if let SlotKey::Property { name, .. } = slot {
        require_non_empty(name, "property name")?;
    }
    if let SlotKey::Adjacency { edge_id, .. } = slot {
        require_non_empty(edge_id, "adjacency edge id")?;
    }
    Ok(())
}

fn slot_name(slot: &SlotKey) -> &'static str {
    match slot {
        SlotKey::Existence => "existence",
        SlotKey::Property { .. } => "property",
        SlotKey::Adjacency { .. } => "adjacency",
    }
}
