//! Strata: visibility-labelled mutation logs for graph elements.
//!
//! Vertices and edges are never stored as rows. Every change is an immutable
//! [`mutation::MutationRecord`] carrying a [`visibility::Visibility`] label,
//! and the state a caller sees is the [`fold::FoldEngine`] reduction of those
//! records under the caller's [`visibility::Authorizations`].

#![warn(missing_docs)]

pub mod codec;
pub mod fold;
pub mod mutation;
pub mod primitives;
pub mod storage;
pub mod types;
pub mod visibility;

pub use fold::{FoldEngine, FoldOptions, FoldedState};
pub use mutation::{MutationPayload, MutationRecord, SlotKey};
pub use types::{ElementId, Result, StrataError};
pub use visibility::{Authorizations, Visibility};
