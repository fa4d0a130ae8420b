#![allow(clippy::all)]

use std::sync::Once;

use catalog_gate::{
    error::{NON_FIELD_ERRORS, UNKNOWN_FIELDS},
    Action, Caller, ErrorDetail, FieldDef, FieldKind, Gate, GateConfig, GateError, MalformedQuery,
    MemoryStore, Record, Result, SchemaArena, Value,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn row(country: &str, age: i64) -> Record {
    [
        ("country".to_owned(), Value::from(country)),
        ("age".to_owned(), Value::Int(age)),
    ]
    .into_iter()
    .collect()
}

fn gate() -> Gate<SchemaArena, MemoryStore> {
    init_tracing();
    let mut schema = SchemaArena::new();
    let record = schema.define("core", "record", vec![FieldDef::new("id", FieldKind::Integer)]);
    let sample = schema.derive(
        record,
        "project",
        "sample",
        vec![
            FieldDef::new(
                "country",
                FieldKind::Choice(vec!["eng".into(), "wales".into(), "scot".into()]),
            ),
            FieldDef::new("age", FieldKind::Integer).nullable(),
            FieldDef::new("secret", FieldKind::Text),
        ],
    );
    schema.restrict_viewable(sample, ["id", "country", "age"]);

    let store = MemoryStore::new();
    store.seed(
        "sample",
        [
            row("eng", 30),
            row("eng", 40),
            row("eng", 50),
            row("wales", 30),
        ],
    );
    Gate::new(schema, store, GateConfig::default())
}

fn full_viewer(gate: &Gate<SchemaArena, MemoryStore>) -> Result<Caller> {
    let compiled = gate.compiled("sample")?;
    Ok(Caller::new("viewer").grant_all(compiled.permissions.all_for(Action::View)))
}

fn nested_query() -> serde_json::Value {
    json!({"&": [{"country": "eng"}, {"|": [{"age": 30}, {"age": 40}]}]})
}

#[test]
fn missing_field_permission_is_forbidden_before_execution() -> Result<()> {
    let gate = gate();
    let caller = full_viewer(&gate)?.revoke("project.view_sample__age");

    let err = gate
        .filter(&caller, "sample", Some(&nested_query()))
        .unwrap_err();
    match err {
        GateError::Forbidden { missing, errors } => {
            assert_eq!(
                missing.into_iter().collect::<Vec<_>>(),
                vec!["project.view_sample__age".to_owned()]
            );
            assert!(errors.is_empty());
        }
        other => panic!("expected Forbidden, got {other:?}"),
    }
    assert_eq!(gate.store().execution_count(), 0);
    Ok(())
}

#[test]
fn full_permissions_compile_and_execute_once() -> Result<()> {
    let gate = gate();
    let caller = full_viewer(&gate)?;

    let predicate = gate
        .compile_filter(&caller, "sample", Some(&nested_query()))?
        .expect("filter supplied");
    assert_eq!(
        predicate.to_string(),
        "country = \"eng\" AND (age = 30 OR age = 40)"
    );
    assert_eq!(gate.store().execution_count(), 0);

    let rows = gate.filter(&caller, "sample", Some(&nested_query()))?;
    assert_eq!(gate.store().execution_count(), 1);
    let ages: Vec<_> = rows.iter().map(|r| r["age"].clone()).collect();
    assert_eq!(ages, vec![Value::Int(30), Value::Int(40)]);
    Ok(())
}

#[test]
fn inherited_field_uses_owner_permission() -> Result<()> {
    let gate = gate();
    let caller = full_viewer(&gate)?.revoke("core.view_record__id");
    let err = gate
        .filter(&caller, "sample", Some(&json!({"id": 1})))
        .unwrap_err();
    assert!(
        matches!(&err, GateError::Forbidden { missing, .. } if missing.contains("core.view_record__id")),
        "{err:?}"
    );
    Ok(())
}

#[test]
fn xor_and_not_follow_tree_semantics() -> Result<()> {
    let gate = gate();
    let caller = full_viewer(&gate)?;

    let xor = gate.filter(
        &caller,
        "sample",
        Some(&json!({"^": [{"country": "eng"}, {"age": 30}]})),
    )?;
    let mut got: Vec<_> = xor
        .iter()
        .map(|r| (r["country"].to_string(), r["age"].clone()))
        .collect();
    got.sort_by_key(|(country, _)| country.clone());
    assert_eq!(
        got,
        vec![
            ("\"eng\"".to_owned(), Value::Int(40)),
            ("\"eng\"".to_owned(), Value::Int(50)),
            ("\"wales\"".to_owned(), Value::Int(30)),
        ]
    );

    let not = gate.filter(&caller, "sample", Some(&json!({"~": [{"country": "eng"}]})))?;
    assert_eq!(not.len(), 1);
    Ok(())
}

#[test]
fn lookups_are_cleaned_before_evaluation() -> Result<()> {
    let gate = gate();
    let caller = full_viewer(&gate)?;
    let predicate = gate
        .compile_filter(
            &caller,
            "sample",
            Some(&json!({"&": [{"age__range": ["30", "45"]}, {"country__in": ["eng"]}]})),
        )?
        .expect("filter supplied");
    assert_eq!(
        predicate.to_string(),
        "age BETWEEN 30 AND 45 AND country IN (\"eng\")"
    );
    Ok(())
}

#[test]
fn malformed_tree_fails_before_validation() {
    let gate = gate();
    let caller = Caller::new("nobody");
    let err = gate
        .filter(&caller, "sample", Some(&json!({"&": []})))
        .unwrap_err();
    assert!(
        matches!(err, GateError::Malformed(MalformedQuery::EmptyOperands { .. })),
        "{err:?}"
    );
    assert_eq!(gate.store().execution_count(), 0);
}

#[test]
fn unknown_and_invalid_fields_are_reported_together() -> Result<()> {
    let gate = gate();
    let caller = full_viewer(&gate)?;
    let err = gate
        .filter(
            &caller,
            "sample",
            Some(&json!({"|": [
                {"colour": "red"},
                {"secret": "x"},
                {"age": "old"},
                {"country": "france"}
            ]})),
        )
        .unwrap_err();
    let GateError::Invalid(errors) = err else {
        panic!("expected Invalid, got {err:?}");
    };
    assert_eq!(
        errors.get(UNKNOWN_FIELDS),
        Some(
            &[
                ErrorDetail::Message("colour".into()),
                ErrorDetail::Message("secret".into()),
            ][..]
        )
    );
    assert!(errors.get("age").is_some());
    assert!(errors.get("country").is_some());
    assert!(errors.get(NON_FIELD_ERRORS).is_none());
    assert_eq!(gate.store().execution_count(), 0);
    Ok(())
}

#[test]
fn unknown_fields_win_over_forbidden_classification() -> Result<()> {
    let gate = gate();
    let caller = full_viewer(&gate)?.revoke("project.view_sample__country");
    let err = gate
        .filter(
            &caller,
            "sample",
            Some(&json!({"&": [{"country": "eng"}, {"colour": "red"}]})),
        )
        .unwrap_err();
    let GateError::Forbidden { missing, errors } = err else {
        panic!("expected Forbidden, got {err:?}");
    };
    assert_eq!(missing.len(), 1);
    assert!(missing.contains("project.view_sample__country"));
    assert_eq!(
        errors.get(UNKNOWN_FIELDS),
        Some(&[ErrorDetail::Message("colour".into())][..])
    );
    Ok(())
}

#[test]
fn no_filter_requires_only_type_permission() -> Result<()> {
    let gate = gate();
    let caller = Caller::new("reader").grant("project.view_sample");
    assert!(gate.compile_filter(&caller, "sample", None)?.is_none());
    assert_eq!(gate.filter(&caller, "sample", None)?.len(), 4);

    let err = gate
        .filter(&Caller::new("nobody"), "sample", None)
        .unwrap_err();
    assert_eq!(err.code(), "Forbidden");
    Ok(())
}

#[test]
fn unknown_type_is_rejected() {
    let gate = gate();
    let err = gate
        .filter(&Caller::superuser("root"), "run", None)
        .unwrap_err();
    assert!(matches!(err, GateError::UnknownType(name) if name == "run"));
}

#[test]
fn integers_beyond_i64_are_invalid_not_clamped() -> Result<()> {
    let gate = gate();
    let caller = full_viewer(&gate)?;
    for literal in [json!(1e20), json!(18446744073709551615u64)] {
        let err = gate
            .filter(&caller, "sample", Some(&json!({ "age": literal })))
            .unwrap_err();
        let GateError::Invalid(errors) = err else {
            panic!("expected Invalid, got {err:?}");
        };
        assert_eq!(
            errors.get("age"),
            Some(&[ErrorDetail::Message("a valid integer is required".into())][..])
        );
    }
    assert_eq!(gate.store().execution_count(), 0);
    Ok(())
}

#[test]
fn empty_key_is_reported_with_other_field_errors() -> Result<()> {
    let gate = gate();
    let caller = full_viewer(&gate)?;
    let err = gate
        .filter(
            &caller,
            "sample",
            Some(&json!({"&": [{"": 1}, {"age": "x"}]})),
        )
        .unwrap_err();
    let GateError::Invalid(errors) = err else {
        panic!("expected Invalid, got {err:?}");
    };
    assert_eq!(
        errors.get(UNKNOWN_FIELDS),
        Some(&[ErrorDetail::Message(String::new())][..])
    );
    assert!(errors.get("age").is_some());
    assert_eq!(gate.store().execution_count(), 0);
    Ok(())
}
