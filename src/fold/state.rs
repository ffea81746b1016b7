use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mutation::PropertyValue;
use crate::types::{Direction, EdgeEndpoints, ElementId, Timestamp};
use crate::visibility::Visibility;

/// Where an element stands after a fold, from one caller's point of view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementStatus {
    /// No constructive record applied.
    Initial,
    /// The element exists and the caller may see it.
    Live,
    /// The element exists but a hide or its own visibility keeps it from the caller.
    Hidden,
    /// Soft-deleted and not re-created since.
    Deleted,
}

impl fmt::Display for ElementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementStatus::Initial => "initial",
            ElementStatus::Live => "live",
            ElementStatus::Hidden => "hidden",
            ElementStatus::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// A surviving metadata entry on a property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataState {
    /// Metadata key.
    pub key: String,
    /// Current value.
    pub value: PropertyValue,
    /// Entry visibility.
    pub visibility: Visibility,
    /// Effective timestamp of the write that produced this value.
    pub timestamp: Timestamp,
}

/// The surviving value of one property instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyState {
    /// Instance key.
    pub key: String,
    /// Property name.
    pub name: String,
    /// Property visibility.
    pub visibility: Visibility,
    /// Current value.
    pub value: PropertyValue,
    /// Effective timestamp of the winning write.
    pub timestamp: Timestamp,
    /// Metadata entries visible to the caller, sorted by key then visibility.
    pub metadata: Vec<MetadataState>,
    /// Set only when hidden entries are requested and a hide applies.
    pub hidden: bool,
}

impl PropertyState {
    /// Looks up a metadata value by key.
    pub fn metadata_value(&self, key: &str) -> Option<&PropertyValue> {
        self.metadata
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }
}

/// A surviving adjacency entry on a vertex.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacencyState {
    /// Edge identifier.
    pub edge_id: String,
    /// Direction relative to the vertex.
    pub direction: Direction,
    /// Edge label.
    pub label: Option<String>,
    /// Vertex at the other end.
    pub other_vertex_id: String,
    /// Edge visibility.
    pub visibility: Visibility,
    /// Effective timestamp of the winning write.
    pub timestamp: Timestamp,
    /// Set only when hidden entries are requested and a hide applies.
    pub hidden: bool,
}

/// The materialized view of one element as seen by one caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FoldedState {
    /// The element.
    pub element: ElementId,
    /// Lifecycle status for the caller.
    pub status: ElementStatus,
    /// Current element visibility.
    pub visibility: Visibility,
    /// Endpoints for edge elements, from the creating record.
    pub endpoints: Option<EdgeEndpoints>,
    /// Surviving properties, sorted by key, name, then visibility.
    pub properties: Vec<PropertyState>,
    /// Surviving adjacency entries, sorted by edge id then direction.
    pub edges: Vec<AdjacencyState>,
    /// Element-level hide labels that apply to the caller.
    pub hidden_by: Vec<Visibility>,
    /// Effective timestamp of the soft delete in force, if any.
    pub soft_deleted_at: Option<Timestamp>,
    /// Latest effective timestamp among applied records.
    pub last_modified: Option<Timestamp>,
    /// Horizon the fold was evaluated at; `None` means all records.
    pub as_of: Option<Timestamp>,
}

impl FoldedState {
    pub(crate) fn initial(element: ElementId, as_of: Option<Timestamp>) -> Self {
        Self {
            element,
            status: ElementStatus::Initial,
            visibility: Visibility::empty(),
            endpoints: None,
            properties: Vec::new(),
            edges: Vec::new(),
            hidden_by: Vec::new(),
            soft_deleted_at: None,
            last_modified: None,
            as_of,
        }
    }

    /// Returns `true` when the element is live for the caller.
    pub fn visible(&self) -> bool {
        self.status == ElementStatus::Live
    }

    /// Returns `true` unless the element was never created or is deleted.
    pub fn exists(&self) -> bool {
        matches!(self.status, ElementStatus::Live | ElementStatus::Hidden)
    }

    /// First property instance with `name`, in sort order.
    pub fn property(&self, name: &str) -> Option<&PropertyState> {
        self.properties.iter().find(|prop| prop.name == name)
    }

    /// Every property instance with `name`.
    pub fn properties_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a PropertyState> + 'a {
        self.properties.iter().filter(move |prop| prop.name == name)
    }

    /// Value of the first property instance with `name`.
    pub fn value(&self, name: &str) -> Option<&PropertyValue> {
        self.property(name).map(|prop| &prop.value)
    }

    /// Adjacency entries in one direction.
    pub fn edges_in(&self, direction: Direction) -> impl Iterator<Item = &AdjacencyState> + '_ {
        self.edges.iter().filter(move |edge| edge.direction == direction)
    }
}
