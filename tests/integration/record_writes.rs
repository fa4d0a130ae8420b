#![allow(clippy::all)]

use catalog_gate::{
    error::{AT_LEAST_ONE_REQUIRED, NON_FIELD_ERRORS},
    Action, Caller, ErrorDetail, FieldDef, FieldKind, Gate, GateConfig, GateError, MemoryStore,
    Record, Result, SchemaArena, Value, YearMonth,
};
use serde_json::{json, Map, Value as Json};
use time::macros::date;

const CONFIG: &str = r#"
[types.sample]
required_one_of = [{ name = "location", fields = ["country", "region"] }]
ordered = [{ lower = "collection_month", higher = "received_month" }]
no_future = ["collection_month", "received_month"]
"#;

fn gate() -> Result<Gate<SchemaArena, MemoryStore>> {
    let mut schema = SchemaArena::new();
    schema.define(
        "project",
        "sample",
        vec![
            FieldDef::new("accession", FieldKind::Text),
            FieldDef::new("country", FieldKind::Text).nullable(),
            FieldDef::new("region", FieldKind::Text).nullable(),
            FieldDef::new("collection_month", FieldKind::YearMonth).nullable(),
            FieldDef::new("received_month", FieldKind::YearMonth).nullable(),
        ],
    );
    let store = MemoryStore::new().with_unique_key("sample", ["accession"]);
    let config = GateConfig::from_toml_str(CONFIG)?;
    Ok(Gate::new(schema, store, config).with_today(date!(2024 - 03 - 10)))
}

fn writer(gate: &Gate<SchemaArena, MemoryStore>) -> Result<Caller> {
    let compiled = gate.compiled("sample")?;
    Ok(Caller::new("curator")
        .grant_all(compiled.permissions.all_for(Action::Add))
        .grant_all(compiled.permissions.all_for(Action::Change)))
}

fn payload(value: Json) -> Map<String, Json> {
    match value {
        Json::Object(map) => map,
        other => panic!("payload must be an object, got {other}"),
    }
}

fn invalid(err: GateError) -> catalog_gate::ErrorMap {
    match err {
        GateError::Invalid(errors) => errors,
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn create_requires_one_location_field() -> Result<()> {
    let gate = gate()?;
    let caller = writer(&gate)?;

    let err = gate
        .create(
            &caller,
            "sample",
            &payload(json!({"accession": "A1", "country": null, "region": null})),
        )
        .unwrap_err();
    let errors = invalid(err);
    assert_eq!(
        errors.to_json(),
        json!({ AT_LEAST_ONE_REQUIRED: [["country", "region"]] })
    );
    assert_eq!(gate.store().len("sample"), 0);

    let record = gate.create(
        &caller,
        "sample",
        &payload(json!({"accession": "A1", "country": "eng", "region": null})),
    )?;
    assert_eq!(record.get("country"), Some(&Value::from("eng")));
    assert_eq!(gate.store().len("sample"), 1);
    Ok(())
}

#[test]
fn ordering_violation_names_both_fields() -> Result<()> {
    let gate = gate()?;
    let caller = writer(&gate)?;
    let err = gate
        .create(
            &caller,
            "sample",
            &payload(json!({
                "accession": "A2",
                "country": "eng",
                "collection_month": "2023-05",
                "received_month": "2023-01",
            })),
        )
        .unwrap_err();
    let errors = invalid(err);
    let Some([ErrorDetail::Message(message)]) = errors.get(NON_FIELD_ERRORS) else {
        panic!("expected one non-field error, got {errors}");
    };
    assert!(message.contains("collection_month"));
    assert!(message.contains("received_month"));

    let record = gate.create(
        &caller,
        "sample",
        &payload(json!({
            "accession": "A2",
            "country": "eng",
            "collection_month": "2023-01",
            "received_month": "2023-05",
        })),
    )?;
    assert_eq!(
        record.get("collection_month"),
        YearMonth::new(2023, 1).map(Value::YearMonth).as_ref()
    );
    Ok(())
}

#[test]
fn future_month_is_rejected() -> Result<()> {
    let gate = gate()?;
    let caller = writer(&gate)?;
    let err = gate
        .create(
            &caller,
            "sample",
            &payload(json!({"accession": "A3", "region": "north", "received_month": "2024-04"})),
        )
        .unwrap_err();
    let errors = invalid(err);
    assert_eq!(
        errors.get("received_month"),
        Some(&[ErrorDetail::Message("'received_month' cannot be in the future".into())][..])
    );
    Ok(())
}

#[test]
fn duplicate_key_is_an_integrity_conflict() -> Result<()> {
    let gate = gate()?;
    let caller = writer(&gate)?;
    let body = payload(json!({"accession": "A4", "country": "eng"}));
    gate.create(&caller, "sample", &body)?;

    let errors = invalid(gate.create(&caller, "sample", &body).unwrap_err());
    assert_eq!(
        errors.get(NON_FIELD_ERRORS),
        Some(&[ErrorDetail::Message("sample with this accession already exists".into())][..])
    );
    assert_eq!(gate.store().len("sample"), 1);
    Ok(())
}

#[test]
fn create_checks_add_permissions() -> Result<()> {
    let gate = gate()?;
    let caller = writer(&gate)?.revoke("project.add_sample__region");
    let err = gate
        .create(
            &caller,
            "sample",
            &payload(json!({"accession": "A5", "region": "north", "colour": "red"})),
        )
        .unwrap_err();
    let GateError::Forbidden { missing, errors } = err else {
        panic!("expected Forbidden, got {err:?}");
    };
    assert_eq!(
        missing.into_iter().collect::<Vec<_>>(),
        vec!["project.add_sample__region".to_owned()]
    );
    assert!(errors.get("unknown_fields").is_some());
    assert_eq!(gate.store().len("sample"), 0);
    Ok(())
}

#[test]
fn update_merges_over_existing_record() -> Result<()> {
    let gate = gate()?;
    let caller = writer(&gate)?;
    let existing: Record = [
        ("accession".to_owned(), Value::from("A6")),
        ("country".to_owned(), Value::from("eng")),
        ("region".to_owned(), Value::from("north")),
        (
            "received_month".to_owned(),
            Value::YearMonth(YearMonth::new(2023, 2).expect("valid month")),
        ),
    ]
    .into_iter()
    .collect();

    let changes = gate.update(&caller, "sample", &payload(json!({"country": null})), &existing)?;
    assert_eq!(changes.get("country"), Some(&Value::Null));

    let errors = invalid(
        gate.update(
            &caller,
            "sample",
            &payload(json!({"country": null, "region": null})),
            &existing,
        )
        .unwrap_err(),
    );
    assert!(errors.get(AT_LEAST_ONE_REQUIRED).is_some());

    let errors = invalid(
        gate.update(
            &caller,
            "sample",
            &payload(json!({"collection_month": "2023-06"})),
            &existing,
        )
        .unwrap_err(),
    );
    assert!(errors.get(NON_FIELD_ERRORS).is_some());
    Ok(())
}

#[test]
fn validate_write_applies_only_value_groups() -> Result<()> {
    let gate = gate()?;
    let empty = Record::new();
    assert!(matches!(
        gate.validate_write("sample", &empty, None),
        Err(GateError::Invalid(_))
    ));
    assert!(gate.validate_write("run", &empty, None).is_ok());
    Ok(())
}

#[test]
fn invalid_values_are_reported_per_field() -> Result<()> {
    let gate = gate()?;
    let caller = writer(&gate)?;
    let errors = invalid(
        gate.create(
            &caller,
            "sample",
            &payload(json!({"accession": "A7", "country": "eng", "collection_month": "May 2023"})),
        )
        .unwrap_err(),
    );
    assert_eq!(
        errors.get("collection_month"),
        Some(&[ErrorDetail::Message("year-month has wrong format, use YYYY-MM".into())][..])
    );
    Ok(())
}

#[test]
fn rejected_values_do_not_trigger_value_group_rules() -> Result<()> {
    let gate = gate()?;
    let caller = writer(&gate)?;
    let errors = invalid(
        gate.create(
            &caller,
            "sample",
            &payload(json!({
                "accession": "A8",
                "country": "eng",
                "collection_month": "later",
                "received_month": "2023-01",
            })),
        )
        .unwrap_err(),
    );
    assert!(errors.get("collection_month").is_some());
    assert!(errors.get(NON_FIELD_ERRORS).is_none());

    let existing: Record = [
        ("accession".to_owned(), Value::from("A8")),
        ("country".to_owned(), Value::from("eng")),
        (
            "collection_month".to_owned(),
            Value::YearMonth(YearMonth::new(2023, 6).expect("valid month")),
        ),
        (
            "received_month".to_owned(),
            Value::YearMonth(YearMonth::new(2023, 7).expect("valid month")),
        ),
    ]
    .into_iter()
    .collect();
    let errors = invalid(
        gate.update(
            &caller,
            "sample",
            &payload(json!({
                "collection_month": "2023-09",
                "received_month": "soon",
                "country": null,
            })),
            &existing,
        )
        .unwrap_err(),
    );
    assert!(errors.get("received_month").is_some());
    assert!(errors.get(NON_FIELD_ERRORS).is_none());
    assert!(errors.get(AT_LEAST_ONE_REQUIRED).is_some());
    Ok(())
}
