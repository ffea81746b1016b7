#![allow(missing_docs)]

use proptest::prelude::*;
use strata::fold::{ElementStatus, FoldEngine, FoldOptions, FoldedState, TieBreak};
use strata::mutation::{MutationPayload, MutationRecord, PropertyValue, SlotKey};
use strata::types::{Direction, ElementId, Timestamp};
use strata::visibility::{Authorizations, Visibility};

fn vis(expr: &str) -> Visibility {
    Visibility::new(expr).expect("valid label")
}

fn vertex_record(slot: SlotKey, ts: Timestamp, payload: MutationPayload) -> MutationRecord {
    MutationRecord::new(ElementId::vertex("v1"), slot, ts, Visibility::empty(), payload)
        .expect("valid record")
}

fn age_slot() -> SlotKey {
    SlotKey::property("k1", "age", Visibility::empty())
}

fn fold(records: &[MutationRecord], auths: &Authorizations, as_of: Option<Timestamp>) -> FoldedState {
    FoldEngine::default()
        .fold(records, auths, as_of)
        .expect("fold succeeds")
        .expect("non-empty input")
}

#[test]
fn end_to_end_age_scenario() {
    let records = vec![
        vertex_record(age_slot(), 100, MutationPayload::add_property(30, Vec::new()).unwrap()),
        vertex_record(age_slot(), 200, MutationPayload::add_property(31, Vec::new()).unwrap()),
    ];
    let auths = Authorizations::empty();
    let state = fold(&records, &auths, None);
    assert!(state.visible());
    assert_eq!(state.value("age"), Some(&PropertyValue::Int(31)));
    assert_eq!(state.properties.len(), 1);

    let history = FoldEngine::default()
        .historical_events(&records, Some(&auths))
        .unwrap();
    let values: Vec<_> = history
        .iter()
        .map(|event| match event.payload() {
            MutationPayload::AddPropertyValue { value, .. } => value.clone(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(values, [PropertyValue::Int(30), PropertyValue::Int(31)]);
    let stamps: Vec<_> = history.iter().map(|event| event.timestamp()).collect();
    assert_eq!(stamps, [100, 200]);
}

#[test]
fn hide_scoping_at_time_five() {
    let records = vec![
        vertex_record(SlotKey::Existence, 1, MutationPayload::create_vertex()),
        vertex_record(
            SlotKey::Existence,
            5,
            MutationPayload::MarkHidden {
                hide_visibility: vis("secret"),
                timestamp_of_hide: Some(5),
            },
        ),
    ];
    let without = fold(&records, &Authorizations::new(["other"]), Some(10));
    assert_eq!(without.status, ElementStatus::Hidden);
    assert!(!without.visible());
    assert_eq!(without.hidden_by, [vis("secret")]);

    let with = fold(&records, &Authorizations::new(["secret"]), Some(10));
    assert!(with.visible());
}

#[test]
fn soft_delete_then_property_write_stays_deleted() {
    let records = vec![
        vertex_record(SlotKey::Existence, 1, MutationPayload::create_vertex()),
        vertex_record(SlotKey::Existence, 10, MutationPayload::SoftDeleteElement { timestamp: 10 }),
        vertex_record(age_slot(), 20, MutationPayload::add_property(7, Vec::new()).unwrap()),
    ];
    let state = fold(&records, &Authorizations::empty(), Some(25));
    assert_eq!(state.status, ElementStatus::Deleted);
    assert_eq!(state.soft_deleted_at, Some(10));
    assert!(!state.exists());

    // History below and above the delete is kept.
    let history = FoldEngine::default().historical_events(&records, None).unwrap();
    assert_eq!(history.len(), 3);
}

#[test]
fn labelled_soft_delete_removes_element_for_every_caller() {
    let records = vec![
        vertex_record(SlotKey::Existence, 1, MutationPayload::create_vertex()),
        vertex_record(age_slot(), 2, MutationPayload::add_property(30, Vec::new()).unwrap()),
        vertex_record(
            SlotKey::Existence,
            10,
            MutationPayload::SoftDeleteElement { timestamp: 10 },
        )
        .with_visibility("admin"),
    ];
    for auths in [Authorizations::empty(), Authorizations::new(["admin"])] {
        let state = fold(&records, &auths, None);
        assert_eq!(state.status, ElementStatus::Deleted, "auths {auths:?}");
        assert!(state.properties.is_empty());
        assert_eq!(fold(&records, &auths, Some(9)).status, ElementStatus::Live);
    }
}

#[test]
fn existence_add_after_soft_delete_recreates() {
    let records = vec![
        vertex_record(SlotKey::Existence, 1, MutationPayload::create_vertex()),
        vertex_record(age_slot(), 2, MutationPayload::add_property(1, Vec::new()).unwrap()),
        vertex_record(SlotKey::Existence, 10, MutationPayload::SoftDeleteElement { timestamp: 10 }),
        vertex_record(
            SlotKey::Existence,
            20,
            MutationPayload::add_property(true, Vec::new()).unwrap(),
        ),
    ];
    let state = fold(&records, &Authorizations::empty(), Some(25));
    assert_eq!(state.status, ElementStatus::Live);
    // Values written before the delete do not come back.
    assert!(state.value("age").is_none());

    let before_recreate = fold(&records, &Authorizations::empty(), Some(15));
    assert_eq!(before_recreate.status, ElementStatus::Deleted);
    let before_delete = fold(&records, &Authorizations::empty(), Some(9));
    assert_eq!(before_delete.value("age"), Some(&PropertyValue::Int(1)));
}

#[test]
fn edge_elements_fold_with_endpoints() {
    let edge = ElementId::edge("e1");
    let records = vec![
        MutationRecord::new(
            edge.clone(),
            SlotKey::Existence,
            1,
            Visibility::empty(),
            MutationPayload::create_edge(strata::types::EdgeEndpoints::new("v1", "v2", "knows"))
                .unwrap(),
        )
        .unwrap(),
        MutationRecord::new(
            edge,
            SlotKey::property("k", "since", Visibility::empty()),
            2,
            Visibility::empty(),
            MutationPayload::add_property(PropertyValue::Date(19000), Vec::new()).unwrap(),
        )
        .unwrap(),
    ];
    let state = fold(&records, &Authorizations::empty(), None);
    assert_eq!(state.endpoints.as_ref().map(|e| e.label.as_str()), Some("knows"));
    assert_eq!(state.value("since"), Some(&PropertyValue::Date(19000)));
}

#[test]
fn partition_fold_groups_elements() {
    let mut records = Vec::new();
    for (idx, id) in ["a", "b", "c"].into_iter().enumerate() {
        records.push(
            MutationRecord::new(
                ElementId::vertex(id),
                age_slot(),
                10,
                Visibility::empty(),
                MutationPayload::add_property(idx as i64, Vec::new()).unwrap(),
            )
            .unwrap(),
        );
    }
    let states = FoldEngine::default()
        .fold_partition(&records, &Authorizations::empty(), None)
        .unwrap();
    assert_eq!(states.len(), 3);
    assert_eq!(
        states[&ElementId::vertex("c")].value("age"),
        Some(&PropertyValue::Int(2))
    );
}

#[test]
fn same_timestamp_ties_follow_arrival() {
    let first = vertex_record(age_slot(), 50, MutationPayload::add_property(1, Vec::new()).unwrap())
        .with_sequence(10);
    let second = vertex_record(age_slot(), 50, MutationPayload::add_property(2, Vec::new()).unwrap())
        .with_sequence(11);
    let auths = Authorizations::empty();
    for records in [vec![first.clone(), second.clone()], vec![second.clone(), first.clone()]] {
        assert_eq!(fold(&records, &auths, None).value("age"), Some(&PropertyValue::Int(2)));
        let engine = FoldEngine::new(FoldOptions::new().tie_break(TieBreak::FirstArrivalWins));
        let state = engine.fold(&records, &auths, None).unwrap().unwrap();
        assert_eq!(state.value("age"), Some(&PropertyValue::Int(1)));
    }
}

fn arb_record() -> impl Strategy<Value = MutationRecord> {
    prop_oneof![arb_slot_record(), arb_element_record()]
}

fn arb_label() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(""), Just("a"), Just("b"), Just("a|b")]
}

fn hide_label(label: &str) -> Visibility {
    vis(if label.is_empty() { "a" } else { label })
}

/// Property, metadata and adjacency mutations.
fn arb_slot_record() -> impl Strategy<Value = MutationRecord> {
    let ts = 0i64..40;
    let key = prop_oneof![Just("k1"), Just("k2")];
    let dir = prop_oneof![Just(Direction::Out), Just(Direction::In)];
    prop_oneof![
        (ts.clone(), key.clone(), any::<i64>(), arb_label()).prop_map(|(ts, key, v, label)| {
            vertex_record(
                SlotKey::property(key, "p", Visibility::empty()),
                ts,
                MutationPayload::add_property(v, Vec::new()).unwrap(),
            )
            .with_visibility(label)
        }),
        (ts.clone(), key).prop_map(|(ts, key)| vertex_record(
            SlotKey::property(key, "p", Visibility::empty()),
            ts,
            MutationPayload::DeleteProperty,
        )),
        (ts.clone(), arb_label()).prop_map(|(ts, label)| vertex_record(
            SlotKey::property("k1", "p", Visibility::empty()),
            ts,
            MutationPayload::set_metadata("m", ts, vis(label)).unwrap(),
        )),
        (ts.clone(), arb_label()).prop_map(|(ts, label)| vertex_record(
            SlotKey::property("k1", "p", Visibility::empty()),
            ts,
            MutationPayload::DeleteMetadata {
                key: "m".to_owned(),
                visibility: vis(label),
            },
        )),
        (ts.clone(), dir.clone()).prop_map(|(ts, dir)| vertex_record(
            SlotKey::adjacency("e1", dir),
            ts,
            MutationPayload::add_edge("e1", dir, "knows", "v2", Visibility::empty()).unwrap(),
        )),
        (ts, dir).prop_map(|(ts, dir)| vertex_record(
            SlotKey::adjacency("e1", dir),
            ts,
            MutationPayload::delete_edge("e1", dir, "v2", Visibility::empty()).unwrap(),
        )),
    ]
}

/// Existence-slot mutations: creation, hides, deletes and relabelling.
fn arb_element_record() -> impl Strategy<Value = MutationRecord> {
    let ts = 0i64..40;
    prop_oneof![
        ts.clone()
            .prop_map(|ts| vertex_record(SlotKey::Existence, ts, MutationPayload::create_vertex())),
        (ts.clone(), arb_label()).prop_map(|(ts, label)| vertex_record(
            SlotKey::Existence,
            ts,
            MutationPayload::MarkHidden {
                hide_visibility: hide_label(label),
                timestamp_of_hide: None,
            },
        )),
        (ts.clone(), arb_label()).prop_map(|(ts, label)| vertex_record(
            SlotKey::Existence,
            ts,
            MutationPayload::MarkVisible {
                hide_visibility: hide_label(label),
                timestamp_of_visible: None,
            },
        )),
        (ts.clone(), arb_label()).prop_map(|(ts, label)| {
            vertex_record(
                SlotKey::Existence,
                ts,
                MutationPayload::SoftDeleteElement { timestamp: ts },
            )
            .with_visibility(label)
        }),
        (ts, arb_label()).prop_map(|(ts, label)| vertex_record(
            SlotKey::Existence,
            ts,
            MutationPayload::AlterElementVisibility {
                new_visibility: vis(label),
            },
        )),
    ]
}

fn sequenced(records: Vec<MutationRecord>) -> Vec<MutationRecord> {
    // Sequences are fixed before shuffling, as ingestion would assign them.
    records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| record.with_sequence(idx as u64 + 1))
        .collect()
}

trait WithVisibility {
    fn with_visibility(self, label: &str) -> MutationRecord;
}

impl WithVisibility for MutationRecord {
    fn with_visibility(self, label: &str) -> MutationRecord {
        let mut parts = self.into_parts();
        parts.visibility = vis(label);
        MutationRecord::from_parts(parts).expect("valid record")
    }
}

proptest! {
    #[test]
    fn fold_is_order_independent(
        (records, shuffled) in proptest::collection::vec(arb_record(), 1..24)
            .prop_map(sequenced)
            .prop_flat_map(|records| (Just(records.clone()), Just(records).prop_shuffle())),
        auths in prop_oneof![
            Just(Authorizations::empty()),
            Just(Authorizations::new(["a"])),
            Just(Authorizations::new(["a", "b"])),
        ],
        as_of in proptest::option::of(0i64..40),
    ) {
        let engine = FoldEngine::default();
        let expected = engine.fold(&records, &auths, as_of).unwrap();
        let actual = engine.fold(&shuffled, &auths, as_of).unwrap();
        prop_assert_eq!(expected, actual);
    }
}
