use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::mutation::{EdgeRef, MutationPayload, MutationRecord, PropertyValue, SlotKey};
use crate::types::{EdgeEndpoints, ElementId, FoldError, Result, Timestamp};
use crate::visibility::{Authorizations, LabelCache, Visibility};

use super::options::{FoldOptions, TieBreak};
use super::state::{AdjacencyState, ElementStatus, FoldedState, MetadataState, PropertyState};

/// Total order over applied records: effective timestamp, then arrival.
///
/// Position in the input breaks ties between records that share a sequence,
/// which only happens for records that never went through ingestion.
type Rank = (Timestamp, i128, i128);

#[derive(Copy, Clone, Debug)]
struct Stamp {
    timestamp: Timestamp,
    rank: Rank,
}

impl Stamp {
    fn new(tie_break: TieBreak, record: &MutationRecord, position: usize) -> Self {
        let timestamp = record.effective_timestamp();
        let sequence = i128::from(record.sequence());
        let position = position as i128;
        let rank = match tie_break {
            TieBreak::LastArrivalWins => (timestamp, sequence, position),
            TieBreak::FirstArrivalWins => (timestamp, -sequence, -position),
        };
        Self { timestamp, rank }
    }
}

#[derive(Clone, Debug)]
struct Register<T> {
    stamp: Stamp,
    value: T,
}

fn write<T>(slot: &mut Option<Register<T>>, stamp: Stamp, value: T) {
    if slot.as_ref().map_or(true, |cur| stamp.rank > cur.stamp.rank) {
        *slot = Some(Register { stamp, value });
    }
}

fn write_entry<K: Ord, T>(map: &mut BTreeMap<K, Register<T>>, key: K, stamp: Stamp, value: T) {
    match map.entry(key) {
        Entry::Vacant(entry) => {
            entry.insert(Register { stamp, value });
        }
        Entry::Occupied(mut entry) => {
            if stamp.rank > entry.get().stamp.rank {
                entry.insert(Register { stamp, value });
            }
        }
    }
}

fn latest(slot: &mut Option<Stamp>, stamp: Stamp) {
    if slot.map_or(true, |cur| stamp.rank > cur.rank) {
        *slot = Some(stamp);
    }
}

/// Last-writer-wins registers for every facet of one element.
///
/// Every register keeps the highest-ranked write it has seen, so the result
/// does not depend on the order records are applied in.
#[derive(Default)]
struct Accumulator {
    constructive: bool,
    last_modified: Option<Timestamp>,
    created: Option<Stamp>,
    endpoints: Option<Register<EdgeEndpoints>>,
    deleted: Option<Stamp>,
    visibility: Option<Register<Visibility>>,
    hides: BTreeMap<SlotKey, BTreeMap<Visibility, Register<bool>>>,
    values: BTreeMap<SlotKey, Register<Option<PropertyValue>>>,
    metadata: BTreeMap<SlotKey, BTreeMap<(String, Visibility), Register<Option<PropertyValue>>>>,
    adjacency: BTreeMap<SlotKey, Register<Option<EdgeRef>>>,
}

impl Accumulator {
    fn apply(&mut self, record: &MutationRecord, stamp: Stamp) {
        self.last_modified = Some(
            self.last_modified
                .map_or(stamp.timestamp, |ts| ts.max(stamp.timestamp)),
        );
        let slot = record.slot();
        match record.payload() {
            MutationPayload::AddPropertyValue { .. } if *slot == SlotKey::Existence => {
                self.constructive = true;
                latest(&mut self.created, stamp);
            }
            MutationPayload::AddPropertyValue { value, metadata } => {
                self.constructive = true;
                write_entry(&mut self.values, slot.clone(), stamp, Some(value.clone()));
                let entries = self.metadata.entry(slot.clone()).or_default();
                for entry in metadata {
                    write_entry(
                        entries,
                        (entry.key.clone(), entry.visibility.clone()),
                        stamp,
                        Some(entry.value.clone()),
                    );
                }
            }
            MutationPayload::DeleteProperty => {
                write_entry(&mut self.values, slot.clone(), stamp, None);
            }
            MutationPayload::AddEdgeToVertex(edge) => {
                self.constructive = true;
                write_entry(&mut self.adjacency, slot.clone(), stamp, Some(edge.clone()));
            }
            MutationPayload::DeleteEdgeToVertex(_) => {
                write_entry(&mut self.adjacency, slot.clone(), stamp, None);
            }
            MutationPayload::MarkHidden {
                hide_visibility, ..
            } => {
                let hides = self.hides.entry(slot.clone()).or_default();
                write_entry(hides, hide_visibility.clone(), stamp, true);
            }
            MutationPayload::MarkVisible {
                hide_visibility, ..
            } => {
                let hides = self.hides.entry(slot.clone()).or_default();
                write_entry(hides, hide_visibility.clone(), stamp, false);
            }
            MutationPayload::SoftDeleteElement { .. } => latest(&mut self.deleted, stamp),
            MutationPayload::AlterElementVisibility { new_visibility } => {
                write(&mut self.visibility, stamp, new_visibility.clone());
            }
            MutationPayload::SetMetadata(entry) => {
                self.constructive = true;
                let entries = self.metadata.entry(slot.clone()).or_default();
                write_entry(
                    entries,
                    (entry.key.clone(), entry.visibility.clone()),
                    stamp,
                    Some(entry.value.clone()),
                );
            }
            MutationPayload::DeleteMetadata { key, visibility } => {
                let entries = self.metadata.entry(slot.clone()).or_default();
                write_entry(entries, (key.clone(), visibility.clone()), stamp, None);
            }
            MutationPayload::CreateElement { edge } => {
                self.constructive = true;
                latest(&mut self.created, stamp);
                if let Some(ends) = edge {
                    // Endpoints are fixed by the first creation.
                    if self
                        .endpoints
                        .as_ref()
                        .map_or(true, |cur| stamp.rank < cur.stamp.rank)
                    {
                        self.endpoints = Some(Register {
                            stamp,
                            value: ends.clone(),
                        });
                    }
                }
            }
        }
    }
}

/// Per-call view of the options and the caller's label verdicts.
struct Resolver<'a, 'c> {
    options: &'a FoldOptions,
    cache: &'a mut LabelCache<'c>,
    /// Writes ranked at or below this were wiped by a soft delete.
    floor: Option<Rank>,
}

impl Resolver<'_, '_> {
    fn survives(&self, stamp: &Stamp) -> bool {
        self.floor.map_or(true, |floor| stamp.rank > floor)
    }

    fn active_hides(
        &mut self,
        hides: &BTreeMap<SlotKey, BTreeMap<Visibility, Register<bool>>>,
        slot: &SlotKey,
    ) -> Result<Vec<Visibility>> {
        let mut active = Vec::new();
        let Some(labels) = hides.get(slot) else {
            return Ok(active);
        };
        for (label, reg) in labels {
            if !reg.value || !self.survives(&reg.stamp) {
                continue;
            }
            let satisfies = self.cache.can_see(label)?;
            if self.options.hide_audience.applies(satisfies) {
                active.push(label.clone());
            }
        }
        Ok(active)
    }
}

/// Reduces mutation records into per-caller element state.
#[derive(Clone, Debug, Default)]
pub struct FoldEngine {
    options: FoldOptions,
}

impl FoldEngine {
    /// Creates an engine with the given options.
    pub fn new(options: FoldOptions) -> Self {
        Self { options }
    }

    /// The engine's configuration.
    pub fn options(&self) -> &FoldOptions {
        &self.options
    }

    pub(crate) fn label_cache<'c>(&self, auths: &'c Authorizations) -> LabelCache<'c> {
        if self.options.memoize_labels {
            LabelCache::new(auths)
        } else {
            LabelCache::disabled(auths)
        }
    }

    /// Folds the records of a single element.
    ///
    /// The element is taken from the first record; returns `Ok(None)` for
    /// empty input. Records that belong to another element fail with
    /// [`FoldError`]. Only records with an effective timestamp at or before
    /// `as_of` take part.
    pub fn fold<'r, I>(
        &self,
        records: I,
        auths: &Authorizations,
        as_of: Option<Timestamp>,
    ) -> Result<Option<FoldedState>>
    where
        I: IntoIterator<Item = &'r MutationRecord>,
    {
        let mut records = records.into_iter().peekable();
        let Some(first) = records.peek() else {
            return Ok(None);
        };
        let element = first.element().clone();
        let mut cache = self.label_cache(auths);
        self.fold_with(&element, records, as_of, &mut cache).map(Some)
    }

    /// Folds the records of `element`; empty input yields an `Initial` state.
    pub fn fold_element<'r, I>(
        &self,
        element: &ElementId,
        records: I,
        auths: &Authorizations,
        as_of: Option<Timestamp>,
    ) -> Result<FoldedState>
    where
        I: IntoIterator<Item = &'r MutationRecord>,
    {
        let mut cache = self.label_cache(auths);
        self.fold_with(element, records, as_of, &mut cache)
    }

    /// Groups records by element and folds each group.
    pub fn fold_partition<'r, I>(
        &self,
        records: I,
        auths: &Authorizations,
        as_of: Option<Timestamp>,
    ) -> Result<BTreeMap<ElementId, FoldedState>>
    where
        I: IntoIterator<Item = &'r MutationRecord>,
    {
        let mut groups: BTreeMap<&ElementId, Vec<&MutationRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.element()).or_default().push(record);
        }
        debug!(elements = groups.len(), "fold.partition");
        let mut cache = self.label_cache(auths);
        let mut out = BTreeMap::new();
        for (element, group) in groups {
            let state = self.fold_with(element, group, as_of, &mut cache)?;
            out.insert(element.clone(), state);
        }
        Ok(out)
    }

    fn fold_with<'r, I>(
        &self,
        element: &ElementId,
        records: I,
        as_of: Option<Timestamp>,
        cache: &mut LabelCache<'_>,
    ) -> Result<FoldedState>
    where
        I: IntoIterator<Item = &'r MutationRecord>,
    {
        let mut acc = Accumulator::default();
        let mut seen = 0usize;
        let mut applied = 0usize;
        for (position, record) in records.into_iter().enumerate() {
            seen += 1;
            check_element(element, record.element())?;
            let stamp = Stamp::new(self.options.tie_break, record, position);
            if as_of.is_some_and(|horizon| stamp.timestamp > horizon) {
                trace!(
                    element = %element,
                    timestamp = stamp.timestamp,
                    "fold.skip after horizon"
                );
                continue;
            }
            // Soft deletes bind every caller, whatever the record's label.
            let binds_all = matches!(record.payload(), MutationPayload::SoftDeleteElement { .. });
            if !binds_all && !cache.can_see(record.visibility())? {
                trace!(
                    element = %element,
                    visibility = record.visibility().as_str(),
                    "fold.skip not visible"
                );
                continue;
            }
            acc.apply(record, stamp);
            applied += 1;
        }
        let state = self.resolve(element, acc, as_of, cache)?;
        debug!(
            element = %element,
            records = seen,
            applied,
            status = %state.status,
            properties = state.properties.len(),
            edges = state.edges.len(),
            "fold.finish"
        );
        Ok(state)
    }

    fn resolve(
        &self,
        element: &ElementId,
        acc: Accumulator,
        as_of: Option<Timestamp>,
        cache: &mut LabelCache<'_>,
    ) -> Result<FoldedState> {
        let mut state = FoldedState::initial(element.clone(), as_of);
        state.last_modified = acc.last_modified;
        state.endpoints = acc.endpoints.map(|reg| reg.value);
        if let Some(reg) = acc.visibility {
            state.visibility = reg.value;
        }

        if let Some(deleted) = acc.deleted {
            let recreated = acc.created.is_some_and(|created| created.rank > deleted.rank);
            if !recreated {
                state.status = ElementStatus::Deleted;
                state.soft_deleted_at = Some(deleted.timestamp);
                return Ok(state);
            }
        }
        if !acc.constructive {
            return Ok(state);
        }
        if !cache.can_see(&state.visibility)? {
            state.status = ElementStatus::Hidden;
            return Ok(state);
        }

        let mut resolver = Resolver {
            options: &self.options,
            cache,
            floor: acc.deleted.map(|stamp| stamp.rank),
        };
        let include_hidden = self.options.include_hidden;

        state.hidden_by = resolver.active_hides(&acc.hides, &SlotKey::Existence)?;
        if state.hidden_by.is_empty() {
            state.status = ElementStatus::Live;
        } else {
            state.status = ElementStatus::Hidden;
            if !include_hidden {
                return Ok(state);
            }
        }

        for (slot, reg) in &acc.values {
            let (Some(value), SlotKey::Property { key, name, visibility }) = (&reg.value, slot) else {
                continue;
            };
            if !resolver.survives(&reg.stamp) || !resolver.cache.can_see(visibility)? {
                continue;
            }
            let hidden = !resolver.active_hides(&acc.hides, slot)?.is_empty();
            if hidden && !include_hidden {
                continue;
            }
            let mut metadata = Vec::new();
            for ((meta_key, meta_vis), entry) in acc.metadata.get(slot).into_iter().flatten() {
                let Some(meta_value) = &entry.value else {
                    continue;
                };
                // A new value starts with only the metadata written alongside or after it.
                if entry.stamp.rank < reg.stamp.rank || !resolver.cache.can_see(meta_vis)? {
                    continue;
                }
                metadata.push(MetadataState {
                    key: meta_key.clone(),
                    value: meta_value.clone(),
                    visibility: meta_vis.clone(),
                    timestamp: entry.stamp.timestamp,
                });
            }
            state.properties.push(PropertyState {
                key: key.clone(),
                name: name.clone(),
                visibility: visibility.clone(),
                value: value.clone(),
                timestamp: reg.stamp.timestamp,
                metadata,
                hidden,
            });
        }

        for (slot, reg) in &acc.adjacency {
            let Some(edge) = &reg.value else {
                continue;
            };
            if !resolver.survives(&reg.stamp) || !resolver.cache.can_see(&edge.edge_visibility)? {
                continue;
            }
            let hidden = !resolver.active_hides(&acc.hides, slot)?.is_empty();
            if hidden && !include_hidden {
                continue;
            }
            state.edges.push(AdjacencyState {
                edge_id: edge.edge_id.clone(),
                direction: edge.direction,
                label: edge.edge_label.clone(),
                other_vertex_id: edge.other_vertex_id.clone(),
                visibility: edge.edge_visibility.clone(),
                timestamp: reg.stamp.timestamp,
                hidden,
            });
        }
        Ok(state)
    }
}

fn check_element(expected: &ElementId, found: &ElementId) -> Result<()> {
    if expected.kind != found.kind {
        return Err(FoldError::MixedElementKinds {
            expected: expected.kind,
            found: found.kind,
        }
        .into());
    }
    if expected.id != found.id {
        return Err(FoldError::MixedElements {
            expected: expected.clone(),
            found: found.clone(),
        }
        .into());
    }
    Ok(())
}
