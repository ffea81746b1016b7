#![forbid(unsafe_code)]
//! The closed set of mutation kinds and the records that carry them.
//!
//! Graph state is never stored directly; it is the fold of [`MutationRecord`]s.
//! Each record names an element, the [`SlotKey`] it versions, a timestamp, a
//! visibility label and a [`MutationPayload`]. The payload variants double as
//! the historical event vocabulary, so applying a mutation and narrating it
//! read the same fields.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Direction, EdgeEndpoints, Result, StrataError, Timestamp};
use crate::visibility::Visibility;

mod event;
mod record;

pub use event::{AnnotatedEvent, HistoricalEvent, HistoricalEventId};
pub use record::{MutationRecord, RecordParts, SlotKey};

/// Stable wire identifier for every payload variant.
///
/// Ids are append-only: a retired variant keeps its number forever and new
/// variants take the next free one.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// [`MutationPayload::AddPropertyValue`].
    AddPropertyValue = 1,
    /// [`MutationPayload::DeleteProperty`].
    DeleteProperty = 2,
    /// [`MutationPayload::AddEdgeToVertex`].
    AddEdgeToVertex = 3,
    /// [`MutationPayload::DeleteEdgeToVertex`].
    DeleteEdgeToVertex = 4,
    /// [`MutationPayload::MarkHidden`].
    MarkHidden = 5,
    /// [`MutationPayload::MarkVisible`].
    MarkVisible = 6,
    /// [`MutationPayload::SoftDeleteElement`].
    SoftDeleteElement = 7,
    /// [`MutationPayload::AlterElementVisibility`].
    AlterElementVisibility = 8,
    /// [`MutationPayload::SetMetadata`].
    SetMetadata = 9,
    /// [`MutationPayload::DeleteMetadata`].
    DeleteMetadata = 10,
    /// [`MutationPayload::CreateElement`].
    CreateElement = 11,
}

impl MutationKind {
    /// Every kind, in type-id order.
    pub const ALL: [MutationKind; 11] = [
        MutationKind::AddPropertyValue,
        MutationKind::DeleteProperty,
        MutationKind::AddEdgeToVertex,
        MutationKind::DeleteEdgeToVertex,
        MutationKind::MarkHidden,
        MutationKind::MarkVisible,
        MutationKind::SoftDeleteElement,
        MutationKind::AlterElementVisibility,
        MutationKind::SetMetadata,
        MutationKind::DeleteMetadata,
        MutationKind::CreateElement,
    ];

    /// The wire type id.
    pub const fn type_id(self) -> u8 {
        self as u8
    }

    /// Resolves a wire type id.
    pub fn from_type_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_id() == id)
    }

    /// Returns a stable snake_case name.
    pub const fn name(self) -> &'static str {
        match self {
            MutationKind::AddPropertyValue => "add_property_value",
            MutationKind::DeleteProperty => "delete_property",
            MutationKind::AddEdgeToVertex => "add_edge_to_vertex",
            MutationKind::DeleteEdgeToVertex => "delete_edge_to_vertex",
            MutationKind::MarkHidden => "mark_hidden",
            MutationKind::MarkVisible => "mark_visible",
            MutationKind::SoftDeleteElement => "soft_delete_element",
            MutationKind::AlterElementVisibility => "alter_element_visibility",
            MutationKind::SetMetadata => "set_metadata",
            MutationKind::DeleteMetadata => "delete_metadata",
            MutationKind::CreateElement => "create_element",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A property or metadata value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Milliseconds since epoch.
    DateTime(i64),
    /// Days since epoch.
    Date(i64),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "null"),
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Str(v) => write!(f, "{v}"),
            PropertyValue::Bytes(v) => write!(f, "bytes(len={})", v.len()),
            PropertyValue::DateTime(v) => write!(f, "datetime({v})"),
            PropertyValue::Date(v) => write!(f, "date({v})"),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(i64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

/// One metadata entry attached to a property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Metadata key.
    pub key: String,
    /// Metadata value.
    pub value: PropertyValue,
    /// Label gating this entry independently of the property.
    #[serde(default)]
    pub visibility: Visibility,
}

impl MetadataEntry {
    /// Builds an entry.
    pub fn new(key: impl Into<String>, value: impl Into<PropertyValue>, visibility: Visibility) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            visibility,
        }
    }
}

/// The adjacency facts recorded on a vertex for one incident edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRef {
    /// Edge identifier.
    pub edge_id: String,
    /// Direction relative to the owning vertex.
    pub direction: Direction,
    /// Edge label; optional on deletes.
    #[serde(default)]
    pub edge_label: Option<String>,
    /// Vertex at the other end.
    pub other_vertex_id: String,
    /// Label gating the edge itself.
    #[serde(default)]
    pub edge_visibility: Visibility,
}

/// A typed mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationPayload {
    /// Sets a property value, optionally with initial metadata.
    AddPropertyValue {
        /// New value.
        value: PropertyValue,
        /// Metadata written together with the value.
        #[serde(default)]
        metadata: Vec<MetadataEntry>,
    },
    /// Removes the property value in this slot.
    DeleteProperty,
    /// Attaches an incident edge to a vertex.
    AddEdgeToVertex(EdgeRef),
    /// Detaches an incident edge from a vertex.
    DeleteEdgeToVertex(EdgeRef),
    /// Hides the slot for the audience selected by `hide_visibility`.
    MarkHidden {
        /// Label naming the hide audience; also the key `MarkVisible` matches.
        hide_visibility: Visibility,
        /// When the hide takes effect; defaults to the record timestamp.
        #[serde(default)]
        timestamp_of_hide: Option<Timestamp>,
    },
    /// Lifts a hide with exactly the same label.
    MarkVisible {
        /// Label of the hide being lifted.
        hide_visibility: Visibility,
        /// When the unhide takes effect; defaults to the record timestamp.
        #[serde(default)]
        timestamp_of_visible: Option<Timestamp>,
    },
    /// Logically removes the element from this timestamp on.
    SoftDeleteElement {
        /// Effective deletion time.
        timestamp: Timestamp,
    },
    /// Replaces the label gating the element as a whole.
    AlterElementVisibility {
        /// Replacement label.
        new_visibility: Visibility,
    },
    /// Sets one metadata entry on the property in this slot.
    SetMetadata(MetadataEntry),
    /// Removes one metadata entry from the property in this slot.
    DeleteMetadata {
        /// Metadata key.
        key: String,
        /// Visibility of the entry being removed.
        #[serde(default)]
        visibility: Visibility,
    },
    /// Creates (or re-creates) the element. Edges carry their fixed endpoints.
    CreateElement {
        /// Required for edges, absent for vertices.
        #[serde(default)]
        edge: Option<EdgeEndpoints>,
    },
}

impl MutationPayload {
    /// The variant's stable kind.
    pub fn kind(&self) -> MutationKind {
        match self {
            MutationPayload::AddPropertyValue { .. } => MutationKind::AddPropertyValue,
            MutationPayload::DeleteProperty => MutationKind::DeleteProperty,
            MutationPayload::AddEdgeToVertex(_) => MutationKind::AddEdgeToVertex,
            MutationPayload::DeleteEdgeToVertex(_) => MutationKind::DeleteEdgeToVertex,
            MutationPayload::MarkHidden { .. } => MutationKind::MarkHidden,
            MutationPayload::MarkVisible { .. } => MutationKind::MarkVisible,
            MutationPayload::SoftDeleteElement { .. } => MutationKind::SoftDeleteElement,
            MutationPayload::AlterElementVisibility { .. } => MutationKind::AlterElementVisibility,
            MutationPayload::SetMetadata(_) => MutationKind::SetMetadata,
            MutationPayload::DeleteMetadata { .. } => MutationKind::DeleteMetadata,
            MutationPayload::CreateElement { .. } => MutationKind::CreateElement,
        }
    }

    /// The variant's wire type id.
    pub fn type_id(&self) -> u8 {
        self.kind().type_id()
    }

    /// Builds a validated [`MutationPayload::AddPropertyValue`].
    pub fn add_property(value: impl Into<PropertyValue>, metadata: Vec<MetadataEntry>) -> Result<Self> {
        let payload = MutationPayload::AddPropertyValue {
            value: value.into(),
            metadata,
        };
        payload.validate()?;
        Ok(payload)
    }

    /// Builds a validated [`MutationPayload::AddEdgeToVertex`].
    pub fn add_edge(
        edge_id: impl Into<String>,
        direction: Direction,
        edge_label: impl Into<String>,
        other_vertex_id: impl Into<String>,
        edge_visibility: Visibility,
    ) -> Result<Self> {
        let payload = MutationPayload::AddEdgeToVertex(EdgeRef {
            edge_id: edge_id.into(),
            direction,
            edge_label: Some(edge_label.into()),
            other_vertex_id: other_vertex_id.into(),
            edge_visibility,
        });
        payload.validate()?;
        Ok(payload)
    }

    /// Builds a validated [`MutationPayload::DeleteEdgeToVertex`].
    pub fn delete_edge(
        edge_id: impl Into<String>,
        direction: Direction,
        other_vertex_id: impl Into<String>,
        edge_visibility: Visibility,
    ) -> Result<Self> {
        let payload = MutationPayload::DeleteEdgeToVertex(EdgeRef {
            edge_id: edge_id.into(),
            direction,
            edge_label: None,
            other_vertex_id: other_vertex_id.into(),
            edge_visibility,
        });
        payload.validate()?;
        Ok(payload)
    }

    /// Builds a validated [`MutationPayload::SetMetadata`].
    pub fn set_metadata(
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
        visibility: Visibility,
    ) -> Result<Self> {
        let payload = MutationPayload::SetMetadata(MetadataEntry::new(key, value, visibility));
        payload.validate()?;
        Ok(payload)
    }

    /// Builds a validated [`MutationPayload::CreateElement`] for an edge.
    pub fn create_edge(endpoints: EdgeEndpoints) -> Result<Self> {
        let payload = MutationPayload::CreateElement {
            edge: Some(endpoints),
        };
        payload.validate()?;
        Ok(payload)
    }

    /// Builds a [`MutationPayload::CreateElement`] for a vertex.
    pub fn create_vertex() -> Self {
        MutationPayload::CreateElement { edge: None }
    }

    /// Checks the structural constraints of the variant's own fields.
    pub fn validate(&self) -> Result<()> {
        match self {
            MutationPayload::AddPropertyValue { metadata, .. } => {
                for (idx, entry) in metadata.iter().enumerate() {
                    require_non_empty(&entry.key, "metadata key")?;
                    let duplicate = metadata[..idx]
                        .iter()
                        .any(|prior| prior.key == entry.key && prior.visibility == entry.visibility);
                    if duplicate {
                        return Err(StrataError::invalid(format!(
                            "duplicate metadata entry '{}' with visibility '{}'",
                            entry.key, entry.visibility
                        )));
                    }
                }
                Ok(())
            }
            MutationPayload::AddEdgeToVertex(edge) => {
                validate_edge_ref(edge)?;
                match edge.edge_label.as_deref() {
                    Some(label) => require_non_empty(label, "edge label"),
                    None => Err(StrataError::invalid("edge label is required when attaching an edge")),
                }
            }
            MutationPayload::DeleteEdgeToVertex(edge) => {
                validate_edge_ref(edge)?;
                if let Some(label) = edge.edge_label.as_deref() {
                    require_non_empty(label, "edge label")?;
                }
                Ok(())
            }
            MutationPayload::SetMetadata(entry) => require_non_empty(&entry.key, "metadata key"),
            MutationPayload::DeleteMetadata { key, .. } => require_non_empty(key, "metadata key"),
            MutationPayload::CreateElement { edge: Some(endpoints) } => {
                require_non_empty(&endpoints.out_vertex_id, "edge out-vertex id")?;
                require_non_empty(&endpoints.in_vertex_id, "edge in-vertex id")?;
                require_non_empty(&endpoints.label, "edge label")
            }
            MutationPayload::DeleteProperty
            | MutationPayload::MarkHidden { .. }
            | MutationPayload::MarkVisible { .. }
            | MutationPayload::SoftDeleteElement { .. }
            | MutationPayload::AlterElementVisibility { .. }
            | MutationPayload::CreateElement { edge: None } => Ok(()),
        }
    }
}

fn validate_edge_ref(edge: &EdgeRef) -> Result<()> {
    require_non_empty(&edge.edge_id, "edge id")?;
    require_non_empty(&edge.other_vertex_id, "other vertex id")
}

pub(crate) fn require_non_empty(value: &str, what: &str) -> Result<()> {
    if value.is_empty() {
        return Err(StrataError::invalid(format!("{what} must be non-empty")));
    }
    Ok(())
}
