use super::*;
use pretty_assertions::assert_eq;
use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults() {
    let config = SandboxConfig::default();
    assert_eq!(config.max_execution_ms, 10_000);
    assert!(config.capture_plan);
    assert_eq!(config.plan_mode, PlanMode::Estimate);
    assert!(config.databases.is_empty());
}

#[test]
fn test_from_toml_partial() {
    let config = SandboxConfig::from_toml_str(
        r#"
max_execution_ms = 2500
plan_mode = "analyze"

[databases]
students_db = "postgres://reader@localhost/students"
"#,
    )
    .unwrap();

    assert_eq!(config.max_execution_ms, 2500);
    assert_eq!(config.plan_mode, PlanMode::Analyze);
    assert!(config.capture_plan);
    assert_eq!(
        config.database_url("students_db").unwrap(),
        "postgres://reader@localhost/students"
    );
}

#[test]
fn test_from_toml_rejects_zero_timeout() {
    let err = SandboxConfig::from_toml_str("max_execution_ms = 0").unwrap_err();
    assert!(matches!(err, QueryGateError::Configuration(_)));
}

#[test]
fn test_env_overrides() {
    let config = SandboxConfig::default()
        .with_env_overrides(env(&[
            ("MAX_EXECUTION_MS", "750"),
            ("QUERYGATE_CAPTURE_PLAN", "off"),
            ("LOG_LEVEL", "DEBUG"),
            ("DATABASE_URL", "postgres://localhost/app"),
        ]))
        .unwrap();

    assert_eq!(config.max_execution_ms, 750);
    assert!(!config.capture_plan);
    assert_eq!(config.log_level, "debug");
    assert_eq!(
        config.database_url(DEFAULT_DATABASE_ID).unwrap(),
        "postgres://localhost/app"
    );
}

#[test]
fn test_load_applies_env_once_over_file() {
    let path = std::env::temp_dir().join(format!("querygate-config-{}.toml", std::process::id()));
    std::fs::write(&path, "max_execution_ms = 2500\nplan_mode = \"analyze\"\n").unwrap();

    let lookups = std::cell::Cell::new(0);
    let config = SandboxConfig::load_with(Some(&path), |key| {
        if key == "MAX_EXECUTION_MS" {
            lookups.set(lookups.get() + 1);
            return Some("750".to_string());
        }
        None
    });
    std::fs::remove_file(&path).unwrap();

    let config = config.unwrap();
    assert_eq!(lookups.get(), 1);
    assert_eq!(config.max_execution_ms, 750);
    assert_eq!(config.plan_mode, PlanMode::Analyze);
}

#[test]
fn test_env_override_rejects_garbage() {
    let result = SandboxConfig::default().with_env_overrides(env(&[("MAX_EXECUTION_MS", "soon")]));
    assert!(result.is_err());

    let result =
        SandboxConfig::default().with_env_overrides(env(&[("QUERYGATE_PLAN_MODE", "verbose")]));
    assert!(result.is_err());
}

#[test]
fn test_resolve_timeout() {
    let config = SandboxConfig::default();
    assert_eq!(config.resolve_timeout(None).unwrap(), 10_000);
    assert_eq!(config.resolve_timeout(Some(250)).unwrap(), 250);
    assert!(config.resolve_timeout(Some(0)).is_err());
}

#[test]
fn test_unknown_database() {
    let err = SandboxConfig::default().database_url("retail_db").unwrap_err();
    assert_eq!(err.to_string(), "Configuration error: unknown database: retail_db");
}
