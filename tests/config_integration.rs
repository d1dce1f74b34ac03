//! Integration tests for configuration parsing and handling.

use std::io::Write;

use pretty_assertions::assert_eq;
use prax_fetch::planner::{DatabaseType, ErrorCode, Strategy};
use prax_fetch::PlannerConfig;

/// Test an empty configuration
#[test]
fn test_config_empty() {
    let config = PlannerConfig::from_str("").expect("empty config parses");
    assert_eq!(config, PlannerConfig::default());
    assert_eq!(config.loading.max_depth, 8);
    assert_eq!(config.loading.batch_size, 1000);
    assert_eq!(config.sql.max_identifier_length, 63);
}

/// Test full configuration with all options
#[test]
fn test_config_full() {
    let config = PlannerConfig::from_str(
        r#"
        [loading]
        eager_strategy = "select_in"
        populate_strategy = "joined"
        max_depth = 4
        batch_size = 250
        max_concurrency = 8

        [sql]
        database = "sqlite"
        max_identifier_length = 30
        max_alias_suffix = 9

        [filters]
        notDeleted = false
        visible = true

        [debug]
        log_plans = true
        log_statements = true
    "#,
    )
    .expect("full config parses");

    assert_eq!(config.loading.eager_strategy, Strategy::SelectIn);
    assert_eq!(config.loading.populate_strategy, Strategy::Joined);
    assert_eq!(config.loading.max_concurrency, 8);
    assert_eq!(config.sql.database, DatabaseType::SQLite);
    assert_eq!(config.sql.max_alias_suffix, 9);
    assert!(config.debug.log_plans);

    let defaults = config.filter_defaults();
    assert_eq!(defaults.is_enabled("notDeleted"), Some(false));
    assert_eq!(defaults.is_enabled("visible"), Some(true));
    assert_eq!(defaults.is_enabled("other"), None);
}

/// Test environment variable interpolation
#[test]
fn test_config_env_vars() {
    // SAFETY: test-local variable name, not read by other tests.
    unsafe { std::env::set_var("PRAX_FETCH_TEST_BATCH", "42") };

    let config = PlannerConfig::from_str(
        r#"
        [loading]
        batch_size = ${PRAX_FETCH_TEST_BATCH}
    "#,
    )
    .expect("expanded config parses");
    assert_eq!(config.loading.batch_size, 42);
}

/// Test that unknown keys are rejected
#[test]
fn test_config_unknown_key() {
    let err = PlannerConfig::from_str("[loading]\nmax_dept = 3").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidConfiguration);
}

/// Test validation of limits
#[test]
fn test_config_validation() {
    for bad in [
        "[loading]\nmax_depth = 0",
        "[loading]\nbatch_size = 0",
        "[loading]\nmax_concurrency = 0",
        "[sql]\nmax_identifier_length = 4",
    ] {
        let err = PlannerConfig::from_str(bad).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration, "{bad}");
    }
}

/// Test loading from a file
#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[sql]\ndatabase = \"mysql\"").unwrap();

    let config = PlannerConfig::from_file(file.path()).expect("file config parses");
    assert_eq!(config.sql.database, DatabaseType::MySQL);
}

/// Test a missing file
#[test]
fn test_config_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = PlannerConfig::from_file(dir.path().join("prax.toml")).unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigurationIo);
}

/// Test round-tripping through TOML
#[test]
fn test_config_serialize() {
    let mut config = PlannerConfig::default();
    config.filters.insert("notDeleted".into(), false);
    let text = toml::to_string(&config).unwrap();
    assert_eq!(PlannerConfig::from_str(&text).unwrap(), config);
}
