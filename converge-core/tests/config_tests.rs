//! Settings file error-message and persistence tests.

use assert_fs::prelude::*;
use converge_core::{config, ConfigError, Settings};
use predicates::prelude::predicate;

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".converge/config.yaml")
        .write_str("timeout_secs: [unclosed\n")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"), "must name the file, got: {err}");
}

#[test]
fn wrong_type_returns_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".converge/config.yaml")
        .write_str("wait: \"sometimes\"\n")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[test]
fn empty_file_means_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".converge/config.yaml").write_str("").expect("write");

    let settings = config::load_at(home.path()).expect("load");
    assert_eq!(settings, Settings::default());
}

#[test]
fn save_writes_yaml_under_converge_root() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let settings = Settings {
        timeout_secs: 42,
        ..Settings::default()
    };
    config::save_at(home.path(), &settings).expect("save");

    home.child(".converge/config.yaml")
        .assert(predicate::str::contains("timeout_secs: 42"));
    home.child(".converge/config.yaml.tmp")
        .assert(predicate::path::missing());
}
