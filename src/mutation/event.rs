use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ElementId, Sequence, StrataError, Timestamp};
use crate::visibility::Visibility;

use super::record::effective_timestamp;
use super::{MutationKind, MutationPayload, MutationRecord, RecordParts, SlotKey};

/// Position of an event in a history stream; used to resume after it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoricalEventId {
    /// Effective timestamp.
    pub timestamp: Timestamp,
    /// Arrival sequence.
    pub sequence: Sequence,
    /// Element the event belongs to.
    pub element: ElementId,
    /// Slot the event versioned.
    pub slot: SlotKey,
}

impl Ord for HistoricalEventId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then(self.sequence.cmp(&other.sequence))
            .then_with(|| self.element.cmp(&other.element))
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for HistoricalEventId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for HistoricalEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}#{}", self.element, self.timestamp, self.sequence)
    }
}

/// Immutable narration of one accepted mutation.
///
/// Only built from a record, so its kind always matches its payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EventFields")]
pub struct HistoricalEvent {
    kind: MutationKind,
    element: ElementId,
    slot: SlotKey,
    timestamp: Timestamp,
    sequence: Sequence,
    visibility: Visibility,
    payload: MutationPayload,
}

#[derive(Deserialize)]
struct EventFields {
    kind: MutationKind,
    element: ElementId,
    slot: SlotKey,
    timestamp: Timestamp,
    sequence: Sequence,
    visibility: Visibility,
    payload: MutationPayload,
}

impl TryFrom<EventFields> for HistoricalEvent {
    type Error = StrataError;

    fn try_from(fields: EventFields) -> Result<Self, Self::Error> {
        if fields.kind != fields.payload.kind() {
            return Err(StrataError::InvalidMutation(format!(
                "event kind {} does not match payload kind {}",
                fields.kind,
                fields.payload.kind()
            )));
        }
        let record = MutationRecord::from_parts(RecordParts {
            element: fields.element,
            slot: fields.slot,
            timestamp: fields.timestamp,
            visibility: fields.visibility,
            payload: fields.payload,
            sequence: fields.sequence,
        })?;
        Ok(record.describe())
    }
}

impl HistoricalEvent {
    pub(crate) fn from_record(record: &MutationRecord) -> Self {
        Self {
            kind: record.payload().kind(),
            element: record.element().clone(),
            slot: record.slot().clone(),
            timestamp: record.timestamp(),
            sequence: record.sequence(),
            visibility: record.visibility().clone(),
            payload: record.payload().clone(),
        }
    }

    /// Payload kind.
    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    /// Element the mutation targeted.
    pub fn element(&self) -> &ElementId {
        &self.element
    }

    /// Slot the mutation versioned.
    pub fn slot(&self) -> &SlotKey {
        &self.slot
    }

    /// Record timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Arrival sequence.
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    /// Record visibility.
    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// The mutation itself.
    pub fn payload(&self) -> &MutationPayload {
        &self.payload
    }

    /// The wire type id.
    pub fn type_id(&self) -> u8 {
        self.payload.type_id()
    }

    /// Effective timestamp, as used for ordering.
    pub fn effective_timestamp(&self) -> Timestamp {
        effective_timestamp(self.timestamp, &self.payload)
    }

    /// Stream position of this event.
    pub fn id(&self) -> HistoricalEventId {
        HistoricalEventId {
            timestamp: self.effective_timestamp(),
            sequence: self.sequence,
            element: self.element.clone(),
            slot: self.slot.clone(),
        }
    }

    /// One-line human-readable narration.
    pub fn describe(&self) -> String {
        match &self.payload {
            MutationPayload::AddPropertyValue { value, metadata } if metadata.is_empty() => {
                format!("set property {} = {value}", self.slot)
            }
            MutationPayload::AddPropertyValue { value, metadata } => format!(
                "set property {} = {value} with {} metadata entries",
                self.slot,
                metadata.len()
            ),
            MutationPayload::DeleteProperty => format!("deleted property {}", self.slot),
            MutationPayload::AddEdgeToVertex(edge) => format!(
                "added {} edge {} ({}) to {}",
                edge.direction,
                edge.edge_id,
                edge.edge_label.as_deref().unwrap_or("?"),
                edge.other_vertex_id
            ),
            MutationPayload::DeleteEdgeToVertex(edge) => format!(
                "removed {} edge {} to {}",
                edge.direction, edge.edge_id, edge.other_vertex_id
            ),
            MutationPayload::MarkHidden {
                hide_visibility, ..
            } => format!("hid {} for [{hide_visibility}]", self.slot),
            MutationPayload::MarkVisible {
                hide_visibility, ..
            } => format!("unhid {} for [{hide_visibility}]", self.slot),
            MutationPayload::SoftDeleteElement { timestamp } => {
                format!("soft-deleted {} at {timestamp}", self.element)
            }
            MutationPayload::AlterElementVisibility { new_visibility } => {
                format!("changed {} visibility to [{new_visibility}]", self.element)
            }
            MutationPayload::SetMetadata(entry) => format!(
                "set metadata {}.{} = {}",
                self.slot, entry.key, entry.value
            ),
            MutationPayload::DeleteMetadata { key, .. } => {
                format!("deleted metadata {}.{key}", self.slot)
            }
            MutationPayload::CreateElement { edge: None } => format!("created {}", self.element),
            MutationPayload::CreateElement { edge: Some(ends) } => format!(
                "created {} {} -[{}]-> {}",
                self.element, ends.out_vertex_id, ends.label, ends.in_vertex_id
            ),
        }
    }
}

impl fmt::Display for HistoricalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id(), self.describe())
    }
}

/// A history entry paired with the caller's visibility verdict.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedEvent {
    /// The event.
    pub event: HistoricalEvent,
    /// Whether the caller may see the underlying record.
    pub visible: bool,
}
