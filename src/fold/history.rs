use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::mutation::{AnnotatedEvent, HistoricalEvent, HistoricalEventId, MutationRecord};
use crate::types::Result;
use crate::visibility::Authorizations;

use super::FoldEngine;

/// Direction of a history scan.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOrder {
    /// Oldest first.
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}

/// Paging and ordering for [`History::query`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Resume strictly after this event, in scan order.
    pub after: Option<HistoricalEventId>,
    /// Scan direction.
    pub order: HistoryOrder,
    /// Maximum number of events to return.
    pub limit: Option<usize>,
}

impl HistoryQuery {
    /// An unbounded ascending query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes after `id`.
    pub fn after(mut self, id: HistoricalEventId) -> Self {
        self.after = Some(id);
        self
    }

    /// Sets the scan direction.
    pub fn order(mut self, order: HistoryOrder) -> Self {
        self.order = order;
        self
    }

    /// Caps the number of returned events.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// An ordered, finite event sequence that can be iterated any number of times.
///
/// Events are ordered by [`HistoricalEventId`]: effective timestamp, then
/// arrival sequence, then element and slot. Paging with [`HistoryQuery::after`] relies
/// on this being the same order the ids compare in. Events that share an id
/// keep their input order but cannot be told apart by a cursor, so records
/// should carry distinct sequences (see [`super::Ingestor`]).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    events: Vec<HistoricalEvent>,
}

impl History {
    fn from_events(mut events: Vec<HistoricalEvent>) -> Self {
        events.sort_by_cached_key(HistoricalEvent::id);
        Self { events }
    }

    /// Iterates events oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, HistoricalEvent> {
        self.events.iter()
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` when there are no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events as a slice, oldest first.
    pub fn as_slice(&self) -> &[HistoricalEvent] {
        &self.events
    }

    /// Consumes the history into its events.
    pub fn into_vec(self) -> Vec<HistoricalEvent> {
        self.events
    }

    /// Scans the history with paging.
    pub fn query<'a>(&'a self, query: &HistoryQuery) -> Box<dyn Iterator<Item = &'a HistoricalEvent> + 'a> {
        let limit = query.limit.unwrap_or(usize::MAX);
        let after = query.after.clone();
        match query.order {
            HistoryOrder::Ascending => Box::new(
                self.events
                    .iter()
                    .filter(move |event| after.as_ref().map_or(true, |id| event.id() > *id))
                    .take(limit),
            ),
            HistoryOrder::Descending => Box::new(
                self.events
                    .iter()
                    .rev()
                    .filter(move |event| after.as_ref().map_or(true, |id| event.id() < *id))
                    .take(limit),
            ),
        }
    }

    /// Pairs every event with whether `auths` may see its record.
    pub fn annotate(&self, engine: &FoldEngine, auths: &Authorizations) -> Result<Vec<AnnotatedEvent>> {
        annotate_events(self.events.iter(), engine, auths)
    }

    /// Annotates only the page `query` selects, in scan order.
    pub fn annotate_query(
        &self,
        query: &HistoryQuery,
        engine: &FoldEngine,
        auths: &Authorizations,
    ) -> Result<Vec<AnnotatedEvent>> {
        annotate_events(self.query(query), engine, auths)
    }
}

fn annotate_events<'a, I>(events: I, engine: &FoldEngine, auths: &Authorizations) -> Result<Vec<AnnotatedEvent>>
where
    I: Iterator<Item = &'a HistoricalEvent>,
{
    let mut cache = engine.label_cache(auths);
    events
        .map(|event| {
            let visible = cache.can_see(event.visibility())?;
            Ok(AnnotatedEvent {
                event: event.clone(),
                visible,
            })
        })
        .collect()
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a HistoricalEvent;
    type IntoIter = std::slice::Iter<'a, HistoricalEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl IntoIterator for History {
    type Item = HistoricalEvent;
    type IntoIter = std::vec::IntoIter<HistoricalEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl FoldEngine {
    /// Narrates records as an ordered event history.
    ///
    /// With `auths` the history is filtered to records the caller may see;
    /// without, every record is narrated. Records for several elements may be
    /// mixed, as when replaying a partition.
    pub fn historical_events<'r, I>(&self, records: I, auths: Option<&Authorizations>) -> Result<History>
    where
        I: IntoIterator<Item = &'r MutationRecord>,
    {
        let mut cache = auths.map(|auths| self.label_cache(auths));
        let mut events = Vec::new();
        let mut hidden = 0usize;
        for record in records {
            if let Some(cache) = cache.as_mut() {
                if !cache.can_see(record.visibility())? {
                    trace!(element = %record.element(), "history.skip not visible");
                    hidden += 1;
                    continue;
                }
            }
            events.push(record.describe());
        }
        debug!(events = events.len(), hidden, filtered = auths.is_some(), "history.build");
        Ok(History::from_events(events))
    }
}
