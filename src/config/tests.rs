//! Tests for config functionality.

use crate::config::{Config, DirLockStrategyChoice, DriverChoice};
use crate::error::LfsError;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.driver, DriverChoice::Auto);
    assert_eq!(config.dir_lock_strategy, DirLockStrategyChoice::Auto);
    assert_eq!(config.sentinel_name, "lockfile.lfs");
    assert!(config.write_sentinel_metadata);
    assert_eq!(config.stale_sentinel_minutes, 120);
    assert_eq!(config.collector_thread_name, "lfs-reclaim");
    assert!(config.drain_on_exit);
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_empty_yaml() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
driver: fallback
sentinel_name: dir.lock
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.driver, DriverChoice::Fallback);
    assert_eq!(config.sentinel_name, "dir.lock");

    // Unspecified values should use defaults
    assert_eq!(config.dir_lock_strategy, DirLockStrategyChoice::Auto);
    assert_eq!(config.stale_sentinel_minutes, 120);
}

#[test]
fn test_unknown_fields_ignored() {
    let yaml = r#"
driver: posix
some_future_knob: 42
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.driver, DriverChoice::Posix);
}

#[test]
fn test_strategy_snake_case() {
    let yaml = "dir_lock_strategy: create_exclusive\n";
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(
        config.dir_lock_strategy,
        DirLockStrategyChoice::CreateExclusive
    );
}

#[test]
fn test_invalid_driver_rejected() {
    let result = Config::from_yaml("driver: flock\n");
    assert!(matches!(result, Err(LfsError::Config(_))));
}

#[test]
fn test_sentinel_name_must_be_plain() {
    for bad in ["", "../escape", "nested/lock", "/abs"] {
        let config = Config {
            sentinel_name: bad.to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err(), "accepted '{}'", bad);
    }
}

#[test]
fn test_zero_stale_minutes_rejected() {
    let err = Config::from_yaml("stale_sentinel_minutes: 0\n").unwrap_err();
    assert!(err.to_string().contains("stale_sentinel_minutes"));
}

#[test]
fn test_blank_thread_name_rejected() {
    let config = Config {
        collector_thread_name: "  ".to_string(),
        ..Config::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_thread_name_with_nul_rejected() {
    let config = Config {
        collector_thread_name: "lfs\0reclaim".to_string(),
        ..Config::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("NUL"));

    let yaml = "collector_thread_name: \"lfs\\0reclaim\"\n";
    assert!(Config::from_yaml(yaml).is_err());
}

#[test]
fn test_yaml_roundtrip_preserves_choices() {
    let config = Config {
        driver: DriverChoice::Windows,
        dir_lock_strategy: DirLockStrategyChoice::HardLink,
        drain_on_exit: false,
        ..Config::default()
    };
    let yaml = config.to_yaml().unwrap();
    assert!(yaml.contains("driver: windows"));
    assert!(yaml.contains("dir_lock_strategy: hard_link"));
    assert_eq!(Config::from_yaml(&yaml).unwrap(), config);
}

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("lfs.yaml");
    std::fs::write(&path, "write_sentinel_metadata: false\n").unwrap();

    let config = Config::load(&path).unwrap();
    assert!(!config.write_sentinel_metadata);
}

#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = Config::load(temp_dir.path().join("absent.yaml")).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn test_choice_from_str() {
    assert_eq!(DriverChoice::from_str("posix"), Some(DriverChoice::Posix));
    assert_eq!(DriverChoice::from_str("bogus"), None);
    assert_eq!(
        DirLockStrategyChoice::from_str("create_new"),
        Some(DirLockStrategyChoice::CreateNew)
    );
    assert_eq!(DirLockStrategyChoice::HardLink.as_str(), "hard_link");
}
