use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::codec::decode_payload;
use crate::mutation::{MutationRecord, SlotKey};
use crate::types::{DecodeError, ElementId, Result, Sequence, Timestamp};
use crate::visibility::{Authorizations, Visibility};

use super::{FoldEngine, FoldedState, History};

/// One record as a storage backend hands it over: identity and timestamp in
/// the clear, visibility and payload still encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Element the record belongs to.
    pub element: ElementId,
    /// Facet being versioned.
    pub slot: SlotKey,
    /// Write timestamp.
    pub timestamp: Timestamp,
    /// UTF-8 visibility expression.
    pub visibility: Vec<u8>,
    /// Payload frame as produced by [`crate::codec::encode_payload`].
    pub payload: Vec<u8>,
}

impl RawRecord {
    /// Encodes a typed record into backend form; the sequence is not carried.
    pub fn from_record(record: &MutationRecord) -> Self {
        Self {
            element: record.element().clone(),
            slot: record.slot().clone(),
            timestamp: record.timestamp(),
            visibility: record.visibility().as_str().as_bytes().to_vec(),
            payload: crate::codec::encode_payload(record.payload()),
        }
    }

    /// Decodes visibility and payload into a record with sequence zero.
    pub fn decode(self) -> Result<MutationRecord> {
        let visibility = self.decode_visibility()?;
        let payload = decode_payload(&self.payload)?;
        MutationRecord::new(self.element, self.slot, self.timestamp, visibility, payload)
    }

    fn decode_visibility(&self) -> Result<Visibility> {
        let text = std::str::from_utf8(&self.visibility).map_err(|err| {
            DecodeError::corrupt(err.valid_up_to(), "visibility is not valid UTF-8")
        })?;
        Visibility::new(text).map_err(|err| {
            DecodeError::corrupt(err.position, format!("invalid visibility label: {err}")).into()
        })
    }
}

/// Hands out strictly increasing arrival sequences.
#[derive(Debug)]
pub struct Ingestor {
    next: AtomicU64,
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new()
    }
}

impl Ingestor {
    /// Starts numbering at 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Starts numbering at `first`.
    pub fn starting_at(first: Sequence) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Claims the next sequence.
    pub fn next_sequence(&self) -> Sequence {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Sequence the next claim will return.
    pub fn peek(&self) -> Sequence {
        self.next.load(Ordering::Relaxed)
    }

    /// Decodes one raw record and stamps it with the next sequence.
    ///
    /// Nothing is claimed when decoding fails.
    pub fn ingest(&self, raw: RawRecord) -> Result<MutationRecord> {
        let record = raw.decode()?;
        let sequence = self.next_sequence();
        trace!(
            element = %record.element(),
            slot = %record.slot(),
            sequence,
            "ingest.assign"
        );
        Ok(record.with_sequence(sequence))
    }

    /// Ingests a stream, stopping at the first upstream or decode error.
    pub fn ingest_all<I>(&self, raw: I) -> Result<Vec<MutationRecord>>
    where
        I: IntoIterator<Item = Result<RawRecord>>,
    {
        raw.into_iter().map(|item| self.ingest(item?)).collect()
    }
}

impl FoldEngine {
    /// Decodes a backend stream and folds it; see [`FoldEngine::fold`].
    ///
    /// Any error in the stream aborts the fold before a state is produced.
    pub fn fold_raw<I>(
        &self,
        raw: I,
        auths: &Authorizations,
        as_of: Option<Timestamp>,
    ) -> Result<Option<FoldedState>>
    where
        I: IntoIterator<Item = Result<RawRecord>>,
    {
        let records = Ingestor::new().ingest_all(raw)?;
        self.fold(&records, auths, as_of)
    }

    /// Decodes a backend stream and narrates it; see [`FoldEngine::historical_events`].
    pub fn historical_events_raw<I>(&self, raw: I, auths: Option<&Authorizations>) -> Result<History>
    where
        I: IntoIterator<Item = Result<RawRecord>>,
    {
        let records = Ingestor::new().ingest_all(raw)?;
        self.historical_events(&records, auths)
    }
}
