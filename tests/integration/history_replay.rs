#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;

use strata::fold::{ElementStatus, FoldEngine, FoldOptions, HideAudience, HistoryOrder, HistoryQuery};
use strata::mutation::{MutationKind, MutationPayload, MutationRecord, PropertyValue, SlotKey};
use strata::storage::MemoryLog;
use strata::types::{ElementId, Timestamp};
use strata::visibility::{Authorizations, Visibility};

fn vis(expr: &str) -> Visibility {
    Visibility::new(expr).unwrap()
}

fn record(ts: Timestamp, slot: SlotKey, label: &str, payload: MutationPayload) -> MutationRecord {
    MutationRecord::new(ElementId::vertex("v1"), slot, ts, vis(label), payload).unwrap()
}

fn salary(ts: Timestamp, value: i64) -> MutationRecord {
    record(
        ts,
        SlotKey::property("k1", "salary", Visibility::empty()),
        "hr",
        MutationPayload::add_property(value, Vec::new()).unwrap(),
    )
}

fn seeded_log() -> MemoryLog {
    let log = MemoryLog::new();
    log.extend(&[
        record(1, SlotKey::Existence, "", MutationPayload::create_vertex()),
        salary(10, 100),
        record(
            5,
            SlotKey::property("k1", "name", Visibility::empty()),
            "",
            MutationPayload::add_property("Ada", Vec::new()).unwrap(),
        ),
        salary(20, 120),
        record(
            30,
            SlotKey::Existence,
            "",
            MutationPayload::SoftDeleteElement { timestamp: 30 },
        ),
    ]);
    log
}

#[test]
fn history_is_time_ordered_and_filtered() {
    let log = seeded_log();
    let v1 = ElementId::vertex("v1");

    let everything = log.history(&v1, None).unwrap();
    let stamps: Vec<_> = everything.iter().map(|event| event.timestamp()).collect();
    assert_eq!(stamps, [1, 5, 10, 20, 30]);

    let public = log.history(&v1, Some(&Authorizations::empty())).unwrap();
    let kinds: Vec<_> = public.iter().map(|event| event.kind()).collect();
    assert_eq!(
        kinds,
        [
            MutationKind::CreateElement,
            MutationKind::AddPropertyValue,
            MutationKind::SoftDeleteElement,
        ]
    );
}

#[test]
fn history_pages_in_both_directions() {
    let history = seeded_log()
        .history(&ElementId::vertex("v1"), None)
        .unwrap();
    let first_page: Vec<_> = history.query(&HistoryQuery::new().limit(2)).collect();
    assert_eq!(first_page.len(), 2);
    let resume = first_page[1].id();
    let rest: Vec<_> = history
        .query(&HistoryQuery::new().after(resume))
        .map(|event| event.timestamp())
        .collect();
    assert_eq!(rest, [10, 20, 30]);

    let newest: Vec<_> = history
        .query(&HistoryQuery::new().order(HistoryOrder::Descending).limit(2))
        .map(|event| event.timestamp())
        .collect();
    assert_eq!(newest, [30, 20]);
}

#[test]
fn annotated_history_marks_invisible_records() {
    let engine = FoldEngine::default();
    let history = seeded_log()
        .history(&ElementId::vertex("v1"), None)
        .unwrap();
    let annotated = history.annotate(&engine, &Authorizations::empty()).unwrap();
    let verdicts: Vec<_> = annotated.iter().map(|entry| entry.visible).collect();
    assert_eq!(verdicts, [true, true, false, false, true]);
}

#[test]
fn replaying_history_prefixes_matches_as_of() {
    let log = seeded_log();
    let v1 = ElementId::vertex("v1");
    let auths = Authorizations::new(["hr"]);
    for as_of in [0, 1, 5, 10, 15, 20, 29, 30, 40] {
        let state = log.fold(&v1, &auths, Some(as_of)).unwrap();
        let expected = match as_of {
            0 => ElementStatus::Initial,
            30.. => ElementStatus::Deleted,
            _ => ElementStatus::Live,
        };
        assert_eq!(state.status, expected, "as_of {as_of}");
    }
    let mid = log.fold(&v1, &auths, Some(15)).unwrap();
    assert_eq!(mid.value("salary"), Some(&PropertyValue::Int(100)));
    let late = log.fold(&v1, &auths, Some(25)).unwrap();
    assert_eq!(late.value("salary"), Some(&PropertyValue::Int(120)));
    assert_eq!(late.last_modified, Some(20));
}

#[test]
fn holder_audience_flips_who_sees_a_hide() {
    let hide = record(
        2,
        SlotKey::property("k1", "name", Visibility::empty()),
        "",
        MutationPayload::MarkHidden {
            hide_visibility: vis("moderator"),
            timestamp_of_hide: None,
        },
    );
    let log = MemoryLog::with_engine(FoldEngine::new(
        FoldOptions::new().hide_audience(HideAudience::Holders),
    ));
    log.extend(&[
        record(1, SlotKey::Existence, "", MutationPayload::create_vertex()),
        record(
            1,
            SlotKey::property("k1", "name", Visibility::empty()),
            "",
            MutationPayload::add_property("Ada", Vec::new()).unwrap(),
        ),
        hide,
    ]);
    let v1 = ElementId::vertex("v1");
    let public = log.fold(&v1, &Authorizations::empty(), None).unwrap();
    assert!(public.value("name").is_some());
    let moderator = log.fold(&v1, &Authorizations::new(["moderator"]), None).unwrap();
    assert!(moderator.value("name").is_none());
}

#[test]
fn concurrent_writers_and_readers_agree() {
    let log = Arc::new(MemoryLog::new());
    let writers: Vec<_> = (0..4i64)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..25 {
                    log.append(&salary(t * 100 + i, t * 100 + i));
                }
            })
        })
        .collect();
    let reader = {
        let log = Arc::clone(&log);
        thread::spawn(move || {
            for _ in 0..25 {
                let state = log
                    .fold(&ElementId::vertex("v1"), &Authorizations::new(["hr"]), None)
                    .unwrap();
                assert_ne!(state.status, ElementStatus::Deleted);
            }
        })
    };
    for handle in writers {
        handle.join().unwrap();
    }
    reader.join().unwrap();

    let state = log
        .fold(&ElementId::vertex("v1"), &Authorizations::new(["hr"]), None)
        .unwrap();
    assert_eq!(state.value("salary"), Some(&PropertyValue::Int(324)));
    assert_eq!(log.len(), 100);
}
