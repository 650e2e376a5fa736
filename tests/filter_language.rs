//! Integration and property tests for the filter language.
//!
//! Property tests verify the canonical-printer fixpoint, the
//! parse/print/parse round-trip and the evaluator's sorted-subset
//! guarantee with proptest-generated inputs.

mod common;

use common::registry;
use proptest::prelude::*;
use scim_patch::{
    AttrPath, CompareOp, FilterExpr, Literal, LogicalOp, evaluate_filter, parse_filter,
};
use serde_json::{Value, json};

// ===== deterministic cases ==============================================

const ROUND_TRIP_CASES: &[&str] = &[
    r#"userName eq "jdoe""#,
    r#"name.familyName co "O'Malley""#,
    r#"userName sw "J""#,
    "title pr",
    r#"meta.lastModified gt "2011-05-13T04:42:34Z""#,
    r#"userType eq "Employee" and (emails co "example.com" or emails.value co "example.org")"#,
    r#"userType ne "Employee" and not (emails co "example.com" or emails.value co "example.org")"#,
    r#"userType eq "Employee" and (emails.type eq "work")"#,
    r#"active eq true"#,
    r#"score gt 3.5"#,
    r#"count le 10"#,
    r#"manager eq null"#,
    r#"A pr and B pr and C pr or D pr"#,
    r#"urn:ietf:params:scim:schemas:core:2.0:User:userName sw "j""#,
];

#[test]
fn parse_print_parse_is_identity_on_known_filters() {
    for case in ROUND_TRIP_CASES {
        let first = parse_filter(case).unwrap_or_else(|e| panic!("parse '{case}': {e}"));
        let printed = first.to_string();
        let second =
            parse_filter(&printed).unwrap_or_else(|e| panic!("reparse '{printed}': {e}"));
        assert_eq!(second, first, "round trip changed the AST for '{case}'");
    }
}

#[test]
fn rejects_malformed_filters() {
    for case in [
        "",
        "userName",
        r#"userName eq"#,
        r#"eq "x""#,
        r#"userName qq "x""#,
        r#"(userName eq "x""#,
        r#"userName eq "unterminated"#,
        r#"not userName eq "x""#,
        r#"userName eq "x" and"#,
        r#"a pr b pr"#,
    ] {
        assert!(parse_filter(case).is_err(), "expected '{case}' to be rejected");
    }
}

#[test]
fn evaluates_rfc_style_filter_against_schema() {
    let registry = registry();
    let emails = registry
        .resolve("User", "emails")
        .unwrap()
        .attribute
        .clone();
    let elements = vec![
        json!({"type": "work", "value": "a@example.com", "primary": true}),
        json!({"type": "home", "value": "b@example.org"}),
        json!({"type": "work", "value": "c@example.org"}),
    ];

    let expr = parse_filter(r#"type eq "work" and value ew ".org""#).unwrap();
    assert_eq!(
        evaluate_filter(&expr, &elements, Some(&emails)).unwrap(),
        vec![2]
    );

    let expr = parse_filter(r#"primary pr or type eq "home""#).unwrap();
    assert_eq!(
        evaluate_filter(&expr, &elements, Some(&emails)).unwrap(),
        vec![0, 1]
    );
}

// ===== proptest strategies ==============================================

fn attr_path_strategy() -> impl Strategy<Value = AttrPath> {
    let name = "[a-z][a-zA-Z0-9_]{0,7}";
    let sub = proptest::option::of("[a-z][a-zA-Z0-9_]{0,7}");
    let uri = proptest::option::of(Just(
        "urn:ietf:params:scim:schemas:core:2.0:User".to_string(),
    ));
    (uri, name, sub).prop_map(|(uri, name, sub)| AttrPath { uri, name, sub })
}

fn literal_strategy() -> impl Strategy<Value = Literal> {
    prop_oneof![
        ".{0,12}".prop_map(Literal::String),
        any::<i64>().prop_map(|n| Literal::Number(n.into())),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(|f| Literal::Number(
                serde_json::Number::from_f64(f).expect("finite f64")
            )),
        any::<bool>().prop_map(Literal::Boolean),
        Just(Literal::Null),
    ]
}

fn compare_strategy() -> impl Strategy<Value = FilterExpr> {
    let with_literal = (
        attr_path_strategy(),
        prop::sample::select(vec![
            CompareOp::Eq,
            CompareOp::Ne,
            CompareOp::Co,
            CompareOp::Sw,
            CompareOp::Ew,
            CompareOp::Gt,
            CompareOp::Ge,
            CompareOp::Lt,
            CompareOp::Le,
        ]),
        literal_strategy(),
    )
        .prop_map(|(path, op, literal)| FilterExpr::Compare {
            path,
            op,
            literal: Some(literal),
        });
    let present = attr_path_strategy().prop_map(|path| FilterExpr::Compare {
        path,
        op: CompareOp::Pr,
        literal: None,
    });
    prop_oneof![4 => with_literal, 1 => present]
}

fn filter_expr_strategy() -> impl Strategy<Value = FilterExpr> {
    compare_strategy().prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone(), any::<bool>()).prop_map(|(left, right, is_and)| {
                FilterExpr::Logical {
                    op: if is_and { LogicalOp::And } else { LogicalOp::Or },
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }),
            inner.clone().prop_map(|e| FilterExpr::Not(Box::new(e))),
            inner.prop_map(|e| FilterExpr::Group(Box::new(e))),
        ]
    })
}

fn email_strategy() -> impl Strategy<Value = Value> {
    (
        prop::sample::select(vec!["work", "home", "other"]),
        "[a-z]{1,8}",
        any::<bool>(),
    )
        .prop_map(|(kind, user, primary)| {
            json!({"type": kind, "value": format!("{user}@example.com"), "primary": primary})
        })
}

// ===== properties =======================================================

proptest! {
    /// The canonical printer is a fixpoint: printing, reparsing and
    /// printing again yields the same text, and the reparsed tree prints
    /// identically even when the input tree used implicit grouping.
    #[test]
    fn printer_is_a_fixpoint(expr in filter_expr_strategy()) {
        let printed = expr.to_string();
        let reparsed = parse_filter(&printed)
            .unwrap_or_else(|e| panic!("printed form '{printed}' failed to parse: {e}"));
        prop_assert_eq!(reparsed.to_string(), printed);
    }

    /// Parse → print → parse returns an equal AST for anything the parser
    /// itself produced.
    #[test]
    fn parse_print_parse_round_trips(expr in filter_expr_strategy()) {
        let first = parse_filter(&expr.to_string()).unwrap();
        let second = parse_filter(&first.to_string()).unwrap();
        prop_assert_eq!(second, first);
    }

    /// Matching indices are a sorted, duplicate-free subset of the array's
    /// index range.
    #[test]
    fn evaluator_returns_sorted_unique_subset(
        elements in prop::collection::vec(email_strategy(), 0..8),
        kind in prop::sample::select(vec!["work", "home", "other", "missing"]),
    ) {
        let expr = parse_filter(&format!(r#"type eq "{kind}""#)).unwrap();
        let indices = evaluate_filter(&expr, &elements, None).unwrap();
        prop_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(indices.iter().all(|&i| i < elements.len()));
    }

    /// `ne` is the complement of `eq` over the same elements.
    #[test]
    fn ne_complements_eq(
        elements in prop::collection::vec(email_strategy(), 0..8),
        kind in prop::sample::select(vec!["work", "home", "other"]),
    ) {
        let eq = parse_filter(&format!(r#"type eq "{kind}""#)).unwrap();
        let ne = parse_filter(&format!(r#"type ne "{kind}""#)).unwrap();
        let eq_indices = evaluate_filter(&eq, &elements, None).unwrap();
        let ne_indices = evaluate_filter(&ne, &elements, None).unwrap();
        prop_assert_eq!(eq_indices.len() + ne_indices.len(), elements.len());
        prop_assert!(eq_indices.iter().all(|i| !ne_indices.contains(i)));
    }
}
