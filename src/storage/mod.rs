#![forbid(unsafe_code)]
//! In-memory reference backend.
//!
//! Stores payload bytes exactly as a persistent backend would and serves them
//! back grouped by element and ordered by `(slot, timestamp, sequence)`.

mod memory;

pub use memory::MemoryLog;
