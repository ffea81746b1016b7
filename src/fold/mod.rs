#![forbid(unsafe_code)]
//! Folding mutation records into element state and event history.
//!
//! Records may arrive in any order. Each facet of an element (a property
//! instance, a metadata entry, an adjacency, a hide label, the element's own
//! visibility and existence) is a last-writer-wins register ordered by
//! `(effective timestamp, arrival sequence)`, so two runs over the same
//! multiset produce the same [`FoldedState`]. Visibility is evaluated once per
//! distinct label per call through a [`crate::visibility::LabelCache`].

mod engine;
mod history;
mod ingest;
mod options;
mod state;

pub use engine::FoldEngine;
pub use history::{History, HistoryOrder, HistoryQuery};
pub use ingest::{Ingestor, RawRecord};
pub use options::{FoldOptions, HideAudience, TieBreak};
pub use state::{AdjacencyState, ElementStatus, FoldedState, MetadataState, PropertyState};
