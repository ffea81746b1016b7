#![allow(missing_docs)]

use proptest::prelude::*;
use strata::types::ParseErrorKind;
use strata::visibility::{evaluate, parse, quote, Authorizations, Visibility, VisibilityLabel};

fn sees(expr: &str, tokens: &[&str]) -> bool {
    let label = parse(expr).expect("valid expression");
    evaluate(&label, &Authorizations::new(tokens.iter().copied())).expect("evaluates")
}

#[test]
fn empty_label_is_always_visible() {
    assert_eq!(parse("").unwrap(), VisibilityLabel::Always);
    assert!(sees("", &[]));
    assert!(Authorizations::empty().can_see(&Visibility::empty()).unwrap());
}

#[test]
fn conjunction_and_disjunction() {
    assert!(sees("a&b", &["a", "b"]));
    assert!(!sees("a&b", &["a"]));
    assert!(sees("a|b", &["b"]));
    assert!(!sees("a|b", &["c"]));
    assert!(sees("(a&b)|c", &["c"]));
    assert!(sees("a&(b|c)", &["a", "c"]));
    assert!(!sees("a&(b|c)", &["b", "c"]));
}

#[test]
fn tokens_are_case_sensitive() {
    assert!(!sees("Secret", &["secret"]));
    assert!(sees("\"Top Secret\"", &["Top Secret"]));
}

#[test]
fn quoted_tokens_round_trip() {
    let label = parse(r#""a\"b"|"c\\d""#).unwrap();
    assert_eq!(
        label,
        VisibilityLabel::Or(vec![
            VisibilityLabel::Term("a\"b".into()),
            VisibilityLabel::Term("c\\d".into()),
        ])
    );
    assert_eq!(parse(&label.to_expression()).unwrap(), label);
    assert_eq!(quote("plain_token"), "plain_token");
    assert_eq!(quote("has space"), "\"has space\"");
}

#[test]
fn malformed_expressions_report_kind_and_position() {
    let cases: &[(&str, ParseErrorKind)] = &[
        ("a&b|c", ParseErrorKind::MixedOperators),
        ("(a&b", ParseErrorKind::UnbalancedParens),
        ("a&b)", ParseErrorKind::UnbalancedParens),
        ("a&", ParseErrorKind::Empty),
        ("()", ParseErrorKind::Empty),
        ("\"abc", ParseErrorKind::UnterminatedQuote),
        ("\"\"", ParseErrorKind::EmptyQuotedToken),
        ("\"a\\x\"", ParseErrorKind::InvalidEscape),
    ];
    for (expr, kind) in cases {
        let err = parse(expr).unwrap_err();
        assert_eq!(&err.kind, kind, "expression {expr:?}");
        assert!(err.position <= expr.len(), "position inside input for {expr:?}");
    }
    assert_eq!(parse("a&b|c").unwrap_err().position, 3);
}

#[test]
fn visibility_rejects_bad_labels_at_construction() {
    assert!(Visibility::new("a&b|c").is_err());
    let err = serde_json::from_str::<Visibility>("\"(a\"").unwrap_err();
    assert!(err.to_string().contains("unbalanced"));
    let ok: Visibility = serde_json::from_str("\"a|b\"").unwrap();
    assert_eq!(ok.as_str(), "a|b");
}

fn arb_label() -> impl Strategy<Value = VisibilityLabel> {
    let leaf = "[a-d]{1,2}".prop_map(VisibilityLabel::Term);
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 2..4).prop_map(VisibilityLabel::And),
            proptest::collection::vec(inner, 2..4).prop_map(VisibilityLabel::Or),
        ]
    })
}

proptest! {
    #[test]
    fn canonical_form_reparses_to_the_same_verdict(
        label in arb_label(),
        held in proptest::collection::btree_set("[a-d]{1,2}", 0..6),
    ) {
        let auths = Authorizations::new(held.iter().map(String::as_str));
        let canonical = label.to_expression();
        let reparsed = parse(&canonical).unwrap();
        prop_assert_eq!(evaluate(&label, &auths).unwrap(), evaluate(&reparsed, &auths).unwrap());
        prop_assert_eq!(reparsed.to_expression(), canonical);
    }
}
