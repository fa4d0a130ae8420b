#![allow(clippy::all)]

use catalog_gate::{
    error::UNKNOWN_FIELDS, Action, Caller, ErrorDetail, FieldDef, FieldKind, Gate, GateConfig,
    GateError, MemoryStore, QueryLimits, Record, Result, SchemaArena, Value,
};

fn sample(accession: &str, country: &str, age: i64) -> Record {
    [
        ("accession".to_owned(), Value::from(accession)),
        ("country".to_owned(), Value::from(country)),
        ("age".to_owned(), Value::Int(age)),
    ]
    .into_iter()
    .collect()
}

fn gate_with(config: GateConfig) -> Gate<SchemaArena, MemoryStore> {
    let mut schema = SchemaArena::new();
    schema.define(
        "project",
        "sample",
        vec![
            FieldDef::new("accession", FieldKind::Text),
            FieldDef::new(
                "country",
                FieldKind::Choice(vec!["eng".into(), "wales".into(), "scot".into()]),
            ),
            FieldDef::new("age", FieldKind::Integer),
        ],
    );
    let store = MemoryStore::new();
    store.seed(
        "sample",
        [
            sample("S1", "eng", 25),
            sample("S2", "eng", 35),
            sample("S3", "wales", 35),
            sample("S4", "scot", 60),
        ],
    );
    Gate::new(schema, store, config)
}

fn gate() -> Gate<SchemaArena, MemoryStore> {
    gate_with(GateConfig::default())
}

fn viewer(gate: &Gate<SchemaArena, MemoryStore>) -> Result<Caller> {
    let compiled = gate.compiled("sample")?;
    Ok(Caller::new("viewer").grant_all(compiled.permissions.all_for(Action::View)))
}

fn accessions(rows: &[Record]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| match row.get("accession") {
            Some(Value::Text(text)) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn parameters_combine_with_and() -> Result<()> {
    let gate = gate();
    let caller = viewer(&gate)?;
    let rows = gate.list(&caller, "sample", [("country", "eng"), ("age__gte", "30")])?;
    assert_eq!(accessions(&rows), vec!["S2"]);
    assert_eq!(gate.store().execution_count(), 1);
    Ok(())
}

#[test]
fn comma_separated_lookups() -> Result<()> {
    let gate = gate();
    let caller = viewer(&gate)?;
    let rows = gate.list(&caller, "sample", [("country__in", "wales,scot")])?;
    assert_eq!(accessions(&rows), vec!["S3", "S4"]);

    let rows = gate.list(&caller, "sample", [("age__range", "30,40")])?;
    assert_eq!(accessions(&rows), vec!["S2", "S3"]);
    Ok(())
}

#[test]
fn repeated_parameters_narrow_the_result() -> Result<()> {
    let gate = gate();
    let caller = viewer(&gate)?;
    let rows = gate.list(&caller, "sample", [("age", "35"), ("age", "35")])?;
    assert_eq!(accessions(&rows), vec!["S2", "S3"]);

    let rows = gate.list(&caller, "sample", [("country", "eng"), ("country", "wales")])?;
    assert!(rows.is_empty());
    Ok(())
}

#[test]
fn invalid_values_are_collected() -> Result<()> {
    let gate = gate();
    let caller = viewer(&gate)?;
    let err = gate
        .list(
            &caller,
            "sample",
            [("age", "old"), ("country", "france"), ("colour", "red")],
        )
        .unwrap_err();
    let GateError::Invalid(errors) = err else {
        panic!("expected Invalid, got {err:?}");
    };
    assert_eq!(
        errors.get("age"),
        Some(&[ErrorDetail::Message("a valid integer is required".into())][..])
    );
    assert_eq!(
        errors.get("country"),
        Some(&[ErrorDetail::Message("\"france\" is not a valid choice".into())][..])
    );
    assert_eq!(
        errors.get(UNKNOWN_FIELDS),
        Some(&[ErrorDetail::Message("colour".into())][..])
    );
    assert_eq!(gate.store().execution_count(), 0);
    Ok(())
}

#[test]
fn later_groups_skip_unknown_field_detection_by_default() -> Result<()> {
    let gate = gate();
    let caller = viewer(&gate)?;
    let err = gate
        .list(&caller, "sample", [("age", "35"), ("age", "x")])
        .unwrap_err();
    let GateError::Invalid(errors) = err else {
        panic!("expected Invalid, got {err:?}");
    };
    assert!(errors.get("age").is_some());
    Ok(())
}

#[test]
fn all_groups_checked_when_configured() -> Result<()> {
    let gate = gate_with(GateConfig {
        query: QueryLimits {
            check_unknown_in_all_groups: true,
            ..QueryLimits::default()
        },
        ..GateConfig::default()
    });
    let caller = viewer(&gate)?;
    let rows = gate.list(&caller, "sample", [("age", "35"), ("age", "35")])?;
    assert_eq!(rows.len(), 2);
    Ok(())
}

#[test]
fn missing_permission_blocks_list() -> Result<()> {
    let gate = gate();
    let caller = viewer(&gate)?.revoke("project.view_sample__age");
    let err = gate
        .list(&caller, "sample", [("country", "eng"), ("age", "35")])
        .unwrap_err();
    assert!(
        matches!(&err, GateError::Forbidden { missing, .. }
            if missing.iter().collect::<Vec<_>>() == ["project.view_sample__age"]),
        "{err:?}"
    );
    assert_eq!(gate.store().execution_count(), 0);
    Ok(())
}

#[test]
fn empty_key_is_malformed() {
    let gate = gate();
    let err = gate
        .list(&Caller::superuser("root"), "sample", [("", "x")])
        .unwrap_err();
    assert_eq!(err.code(), "MalformedQuery");
}
