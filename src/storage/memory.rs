use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::fold::{FoldEngine, FoldedState, History, Ingestor, RawRecord};
use crate::mutation::{MutationRecord, SlotKey};
use crate::types::{ElementId, Result, Sequence, Timestamp};
use crate::visibility::Authorizations;

#[derive(Clone, Debug)]
struct StoredRecord {
    slot: SlotKey,
    timestamp: Timestamp,
    sequence: Sequence,
    visibility: Vec<u8>,
    payload: Vec<u8>,
}

impl StoredRecord {
    fn sort_key(&self) -> (&SlotKey, Timestamp, Sequence) {
        (&self.slot, self.timestamp, self.sequence)
    }

    fn raw(&self, element: &ElementId) -> RawRecord {
        RawRecord {
            element: element.clone(),
            slot: self.slot.clone(),
            timestamp: self.timestamp,
            visibility: self.visibility.clone(),
            payload: self.payload.clone(),
        }
    }
}

/// A thread-safe, append-only record store keyed by element.
///
/// Sequences are assigned at append time and survive reads, so folds see the
/// same arrival order no matter how often the log is scanned.
#[derive(Debug, Default)]
pub struct MemoryLog {
    elements: RwLock<BTreeMap<ElementId, Vec<StoredRecord>>>,
    ingestor: Ingestor,
    engine: FoldEngine,
}

impl MemoryLog {
    /// Creates an empty log folding with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty log that folds with `engine`.
    pub fn with_engine(engine: FoldEngine) -> Self {
        Self {
            engine,
            ..Self::default()
        }
    }

    /// The engine used by [`MemoryLog::fold`] and [`MemoryLog::history`].
    pub fn engine(&self) -> &FoldEngine {
        &self.engine
    }

    /// Stores a record and returns the sequence it was assigned.
    pub fn append(&self, record: &MutationRecord) -> Sequence {
        let raw = RawRecord::from_record(record);
        let mut elements = self.elements.write();
        // Claimed under the lock so per-element order matches sequence order.
        let sequence = self.ingestor.next_sequence();
        let stored = StoredRecord {
            slot: raw.slot,
            timestamp: raw.timestamp,
            sequence,
            visibility: raw.visibility,
            payload: raw.payload,
        };
        let records = elements.entry(raw.element).or_default();
        let at = records.partition_point(|existing| existing.sort_key() <= stored.sort_key());
        records.insert(at, stored);
        trace!(element = %record.element(), sequence, "memlog.append");
        sequence
    }

    /// Stores every record in order.
    pub fn extend<'r, I>(&self, records: I) -> Vec<Sequence>
    where
        I: IntoIterator<Item = &'r MutationRecord>,
    {
        let sequences: Vec<Sequence> = records.into_iter().map(|record| self.append(record)).collect();
        debug!(appended = sequences.len(), "memlog.extend");
        sequences
    }

    /// Total number of stored records.
    pub fn len(&self) -> usize {
        self.elements.read().values().map(Vec::len).sum()
    }

    /// Returns `true` when nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.elements.read().is_empty()
    }

    /// Every element with at least one record, in id order.
    pub fn elements(&self) -> Vec<ElementId> {
        self.elements.read().keys().cloned().collect()
    }

    /// Raw tuples for one element, ordered by slot, timestamp, then sequence.
    pub fn scan(&self, element: &ElementId) -> Vec<RawRecord> {
        self.elements
            .read()
            .get(element)
            .map(|records| records.iter().map(|stored| stored.raw(element)).collect())
            .unwrap_or_default()
    }

    /// Decoded records for one element, carrying their stored sequences.
    pub fn records(&self, element: &ElementId) -> Result<Vec<MutationRecord>> {
        let stored: Vec<StoredRecord> = self
            .elements
            .read()
            .get(element)
            .cloned()
            .unwrap_or_default();
        stored
            .iter()
            .map(|record| Ok(record.raw(element).decode()?.with_sequence(record.sequence)))
            .collect()
    }

    /// Folds one element for a caller.
    pub fn fold(
        &self,
        element: &ElementId,
        auths: &Authorizations,
        as_of: Option<Timestamp>,
    ) -> Result<FoldedState> {
        let records = self.records(element)?;
        self.engine.fold_element(element, &records, auths, as_of)
    }

    /// Folds every stored element for a caller.
    pub fn fold_all(
        &self,
        auths: &Authorizations,
        as_of: Option<Timestamp>,
    ) -> Result<BTreeMap<ElementId, FoldedState>> {
        let mut records = Vec::new();
        for element in self.elements() {
            records.extend(self.records(&element)?);
        }
        self.engine.fold_partition(&records, auths, as_of)
    }

    /// Event history for one element; filtered when `auths` is given.
    pub fn history(&self, element: &ElementId, auths: Option<&Authorizations>) -> Result<History> {
        let records = self.records(element)?;
        self.engine.historical_events(&records, auths)
    }
}
