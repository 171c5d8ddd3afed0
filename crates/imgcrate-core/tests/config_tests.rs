use imgcrate_core::config::{CURRENT_CONFIG_VERSION, EngineConfig};
use imgcrate_core::error::CoreError;
use imgcrate_core::ops::Interpolation;
use imgcrate_test_harness::fixtures::{fixture_dir, write_json};

#[test]
fn test_config_save_load() {
    let config = EngineConfig {
        debounce_ms: 33,
        max_dimension: 4096,
        default_interpolation: Interpolation::Nearest,
        cache_watermark_assets: false,
    };

    let dir = fixture_dir();
    let path = dir.path().join("engine.json");
    config.save(&path).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["version"], CURRENT_CONFIG_VERSION);
    assert_eq!(raw["config"]["debounceMs"], 33);

    let loaded = EngineConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_version_too_new() {
    let dir = fixture_dir();
    let path = write_json(
        dir.path(),
        "future.json",
        &serde_json::json!({ "version": "2.0.0", "config": {} }),
    );
    match EngineConfig::load(&path) {
        Err(CoreError::VersionTooNew { got, max }) => {
            assert_eq!(got, "2.0.0");
            assert_eq!(max, CURRENT_CONFIG_VERSION);
        }
        other => panic!("expected VersionTooNew, got {other:?}"),
    }
}

#[test]
fn test_config_version_too_old() {
    let dir = fixture_dir();
    let path = write_json(
        dir.path(),
        "old.json",
        &serde_json::json!({ "version": "0.9.0", "config": {} }),
    );
    assert!(matches!(
        EngineConfig::load(&path),
        Err(CoreError::VersionTooOld { .. })
    ));
}

#[test]
fn test_config_missing_version() {
    let dir = fixture_dir();
    let path = write_json(dir.path(), "bare.json", &serde_json::json!({ "config": {} }));
    match EngineConfig::load(&path) {
        Err(CoreError::InvalidConfigFile(msg)) => assert!(msg.contains("version")),
        other => panic!("expected InvalidConfigFile, got {other:?}"),
    }
}

#[test]
fn test_config_missing_file_is_io_error() {
    let dir = fixture_dir();
    let err = EngineConfig::load(&dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, CoreError::Io(_)));
}
