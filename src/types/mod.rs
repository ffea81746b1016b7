#![forbid(unsafe_code)]
//! Identifiers and shared value types used across the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

mod error;

pub use error::{
    DecodeError, EvaluationError, FoldError, ParseError, ParseErrorKind, Result, StrataError,
};

/// Milliseconds since the Unix epoch, as carried by every mutation record.
pub type Timestamp = i64;

/// Arrival sequence assigned at ingestion; breaks ties between equal timestamps.
pub type Sequence = u64;

/// The two kinds of graph element a record can describe.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A vertex.
    Vertex,
    /// An edge.
    Edge,
}

impl ElementKind {
    /// Wire tag for vertices.
    pub const VERTEX_TAG: u8 = b'V';
    /// Wire tag for edges.
    pub const EDGE_TAG: u8 = b'E';

    /// Returns the single-byte wire tag.
    pub const fn tag(self) -> u8 {
        match self {
            ElementKind::Vertex => Self::VERTEX_TAG,
            ElementKind::Edge => Self::EDGE_TAG,
        }
    }

    /// Resolves a wire tag, returning `None` for unknown bytes.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            Self::VERTEX_TAG => Some(ElementKind::Vertex),
            Self::EDGE_TAG => Some(ElementKind::Edge),
            _ => None,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Vertex => write!(f, "vertex"),
            ElementKind::Edge => write!(f, "edge"),
        }
    }
}

/// Identity of a graph element: its kind plus an opaque string id.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ElementId {
    /// Vertex or edge.
    pub kind: ElementKind,
    /// Caller-assigned identifier, unique within its kind.
    pub id: String,
}

impl ElementId {
    /// Builds a vertex id.
    pub fn vertex(id: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Vertex,
            id: id.into(),
        }
    }

    /// Builds an edge id.
    pub fn edge(id: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Edge,
            id: id.into(),
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Orientation of an adjacency entry relative to the owning vertex.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The edge points away from the owning vertex.
    Out,
    /// The edge points at the owning vertex.
    In,
}

impl Direction {
    /// Wire tag for outgoing adjacency.
    pub const OUT_TAG: u8 = b'O';
    /// Wire tag for incoming adjacency.
    pub const IN_TAG: u8 = b'I';

    /// Returns the single-byte wire tag.
    pub const fn tag(self) -> u8 {
        match self {
            Direction::Out => Self::OUT_TAG,
            Direction::In => Self::IN_TAG,
        }
    }

    /// Resolves a wire tag, returning `None` for unknown bytes.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            Self::OUT_TAG => Some(Direction::Out),
            Self::IN_TAG => Some(Direction::In),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Out => write!(f, "out"),
            Direction::In => write!(f, "in"),
        }
    }
}

/// Endpoints fixed when an edge is created; never changed afterwards.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct EdgeEndpoints {
    /// Vertex the edge leaves.
    pub out_vertex_id: String,
    /// Vertex the edge enters.
    pub in_vertex_id: String,
    /// Edge label.
    pub label: String,
}

impl EdgeEndpoints {
    /// Builds endpoints from owned or borrowed strings.
    pub fn new(
        out_vertex_id: impl Into<String>,
        in_vertex_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            out_vertex_id: out_vertex_id.into(),
            in_vertex_id: in_vertex_id.into(),
            label: label.into(),
        }
    }
}
