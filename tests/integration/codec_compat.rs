#![allow(missing_docs)]

use strata::codec::{decode_frame, decode_payload, encode_payload, Frame, WireCodec, FORMAT_VERSION};
use strata::fold::{FoldEngine, Ingestor, RawRecord};
use strata::mutation::{
    HistoricalEvent, MetadataEntry, MutationPayload, MutationRecord, PropertyValue, SlotKey,
};
use strata::types::{Direction, EdgeEndpoints, ElementId};
use strata::visibility::{Authorizations, Visibility};

fn vis(expr: &str) -> Visibility {
    Visibility::new(expr).unwrap()
}

fn sample_records() -> Vec<MutationRecord> {
    let v1 = ElementId::vertex("v1");
    vec![
        MutationRecord::new(
            v1.clone(),
            SlotKey::Existence,
            1,
            Visibility::empty(),
            MutationPayload::create_vertex(),
        )
        .unwrap(),
        MutationRecord::new(
            v1.clone(),
            SlotKey::property("k1", "name", vis("pii")),
            2,
            vis("pii|admin"),
            MutationPayload::add_property(
                "Ada",
                vec![MetadataEntry::new("source", "census", vis("audit"))],
            )
            .unwrap(),
        )
        .unwrap(),
        MutationRecord::new(
            v1.clone(),
            SlotKey::adjacency("e1", Direction::Out),
            3,
            Visibility::empty(),
            MutationPayload::add_edge("e1", Direction::Out, "knows", "v2", Visibility::empty())
                .unwrap(),
        )
        .unwrap(),
        MutationRecord::new(
            v1,
            SlotKey::Existence,
            4,
            Visibility::empty(),
            MutationPayload::MarkHidden {
                hide_visibility: vis("redacted"),
                timestamp_of_hide: Some(9),
            },
        )
        .unwrap()
        .with_sequence(77),
        MutationRecord::new(
            ElementId::edge("e1"),
            SlotKey::Existence,
            3,
            Visibility::empty(),
            MutationPayload::create_edge(EdgeEndpoints::new("v1", "v2", "knows")).unwrap(),
        )
        .unwrap(),
    ]
}

#[test]
fn record_frames_survive_the_wire() {
    for record in sample_records() {
        let bytes = record.encode();
        assert_eq!(bytes[0], FORMAT_VERSION);
        assert_eq!(MutationRecord::decode(&bytes).unwrap(), record);
        match decode_frame(&bytes).unwrap() {
            Frame::Record(decoded) => assert_eq!(decoded, record),
            other => panic!("expected record frame, got {other:?}"),
        }
    }
}

#[test]
fn event_frames_carry_effective_time() {
    let records = sample_records();
    let hide = &records[3];
    let event = hide.describe();
    assert_eq!(event.effective_timestamp(), 9);
    assert_eq!(event.sequence(), 77);
    let decoded = HistoricalEvent::decode(&event.encode()).unwrap();
    assert_eq!(decoded, event);
    assert!(matches!(decode_frame(&event.encode()).unwrap(), Frame::Event(_)));
}

#[test]
fn backend_bytes_fold_like_typed_records() {
    let records = sample_records();
    let vertex_raw: Vec<_> = records
        .iter()
        .filter(|record| record.element().id == "v1")
        .map(|record| Ok(RawRecord::from_record(record)))
        .collect();
    let auths = Authorizations::new(["pii"]);
    let engine = FoldEngine::default();
    let from_raw = engine.fold_raw(vertex_raw, &auths, Some(5)).unwrap().unwrap();
    assert_eq!(from_raw.value("name"), Some(&PropertyValue::Str("Ada".into())));
    // Metadata gated by its own label.
    assert!(from_raw.property("name").unwrap().metadata.is_empty());
    assert_eq!(from_raw.edges.len(), 1);

    // The hide takes effect at 9, not at its record time.
    let later = engine
        .fold_raw(
            records
                .iter()
                .filter(|record| record.element().id == "v1")
                .map(|record| Ok(RawRecord::from_record(record))),
            &auths,
            Some(10),
        )
        .unwrap()
        .unwrap();
    assert!(!later.visible());
}

#[test]
fn payload_bytes_are_stable() {
    let payload = MutationPayload::add_property(PropertyValue::Int(30), Vec::new()).unwrap();
    let bytes = encode_payload(&payload);
    assert_eq!(&bytes[..2], &[FORMAT_VERSION, 1]);
    assert_eq!(decode_payload(&bytes).unwrap(), payload);
    assert_eq!(decode_payload(&[FORMAT_VERSION, 2]).unwrap(), MutationPayload::DeleteProperty);
}

#[test]
fn damaged_frames_are_rejected() {
    let record = sample_records().remove(1);
    let bytes = record.encode();
    for cut in [0, 1, 2, bytes.len() / 2, bytes.len() - 1] {
        let err = MutationRecord::decode(&bytes[..cut]).unwrap_err();
        assert_eq!(err.code(), "CorruptPayload", "cut at {cut}");
    }
    let mut trailing = bytes.clone();
    trailing.push(0);
    assert_eq!(MutationRecord::decode(&trailing).unwrap_err().code(), "CorruptPayload");

    let mut future = bytes;
    future[0] = FORMAT_VERSION + 1;
    assert_eq!(decode_frame(&future).unwrap_err().code(), "UnsupportedVersion");
}

#[test]
fn ingestor_rejects_corrupt_rows_without_claiming() {
    let ingestor = Ingestor::new();
    let mut raw = RawRecord::from_record(&sample_records()[0]);
    raw.payload = vec![FORMAT_VERSION, 42];
    assert_eq!(ingestor.ingest(raw).unwrap_err().code(), "CorruptPayload");
    assert_eq!(ingestor.peek(), 1);
}

#[test]
fn deeply_nested_labels_are_rejected_not_recursed() {
    let deep = format!("{}a{}", "(".repeat(10_000), ")".repeat(10_000));
    assert_eq!(Visibility::new(&deep).unwrap_err().code(), "TooDeep");

    let ingestor = Ingestor::new();
    let mut raw = RawRecord::from_record(&sample_records()[0]);
    raw.visibility = deep.into_bytes();
    assert_eq!(ingestor.ingest(raw).unwrap_err().code(), "CorruptPayload");
    assert_eq!(ingestor.peek(), 1);
}
