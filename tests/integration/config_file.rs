#![allow(clippy::all)]

use std::fs;

use catalog_gate::{
    config::{default_config_path, CONFIG_ENV},
    ConfigError, GateConfig, GateError,
};

#[test]
fn loads_explicit_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gate.toml");
    fs::write(
        &path,
        r#"
default_permissions = ["project.access_catalog"]

[query]
max_depth = 6
max_in_values = 50
check_unknown_in_all_groups = true

[types.sample]
required_one_of = [{ name = "location", fields = ["country", "region"] }]
"#,
    )?;

    let config = GateConfig::load(Some(path))?;
    assert_eq!(config.default_permissions, vec!["project.access_catalog"]);
    assert_eq!(config.query.max_depth, 6);
    assert_eq!(config.query.max_in_values, 50);
    assert_eq!(config.query.max_nodes, 1_000);
    assert!(config.query.check_unknown_in_all_groups);
    let rules = config.rules_for("sample").expect("sample rules");
    assert_eq!(rules.required_one_of[0].name, "location");
    assert!(rules.ordered.is_empty());
    Ok(())
}

#[test]
fn missing_file_falls_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = GateConfig::load(Some(dir.path().join("absent.toml")))?;
    assert_eq!(config, GateConfig::default());
    Ok(())
}

#[test]
fn parse_errors_carry_the_path() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[query\nmax_depth = ")?;

    let err = GateConfig::from_path(&path).unwrap_err();
    match &err {
        ConfigError::Parse { path: reported, .. } => assert_eq!(reported, &path),
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(err.to_string().contains("broken.toml"));

    let gate_err: GateError = err.into();
    assert_eq!(gate_err.code(), "ConfigError");
    Ok(())
}

#[test]
fn rules_are_checked_after_parsing() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gate.toml");
    fs::write(
        &path,
        "[types.sample]\nrequired_one_of = [{ name = \"empty\", fields = [] }]\n",
    )?;
    assert!(matches!(
        GateConfig::from_path(&path),
        Err(ConfigError::InvalidRule { type_name, .. }) if type_name == "sample"
    ));
    Ok(())
}

#[test]
fn default_path_lives_under_the_config_dir() {
    assert_eq!(CONFIG_ENV, "CATALOG_GATE_CONFIG");
    if let Some(path) = default_config_path() {
        assert!(path.ends_with("catalog-gate/gate.toml"));
    }
}
