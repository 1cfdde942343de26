//! Integration tests for configuration file resolution and loading
//!
//! Tests that manipulate GVP_CONFIG are marked with #[serial] so they run
//! sequentially, not in parallel.

use gvp_common::config::{
    load_config, resolve_config_source, ConfigSource, TomlConfig, CONFIG_ENV_VAR,
    MAX_DURATION_SECONDS,
};
use gvp_common::{Error, FadeCurve, SceneSet};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/gvp-from-env.toml");

    let source = resolve_config_source(Some(Path::new("/tmp/gvp-from-cli.toml")));
    assert_eq!(
        source,
        ConfigSource::Explicit(PathBuf::from("/tmp/gvp-from-cli.toml"))
    );

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_arg() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/gvp-from-env.toml");

    let source = resolve_config_source(None);
    assert_eq!(
        source,
        ConfigSource::Explicit(PathBuf::from("/tmp/gvp-from-env.toml"))
    );

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_env_var_ignored() {
    env::set_var(CONFIG_ENV_VAR, "   ");

    let source = resolve_config_source(None);
    assert!(!matches!(source, ConfigSource::Explicit(_)));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_builtin_source_loads_defaults() {
    let config = load_config(&ConfigSource::BuiltIn).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_explicit_missing_file_is_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = load_config(&ConfigSource::Explicit(missing)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_load_file_resolves_relative_paths() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "config.toml",
        r#"
        scenes_file = "data/scenes.json"
        media_root = "media"
        preload_buffer_seconds = 1.0
        initial_buffer_delay_seconds = 0.5

        [fader]
        duration_seconds = 2.0
        curve = "equal_power"

        [logging]
        level = "debug"
        "#,
    );

    let config = load_config(&ConfigSource::Explicit(path)).unwrap();
    assert_eq!(config.scenes_file, dir.path().join("data/scenes.json"));
    assert_eq!(config.media_root, dir.path().join("media"));
    assert_eq!(config.preload_buffer_seconds, 1.0);
    assert_eq!(config.initial_buffer_delay_seconds, 0.5);
    assert_eq!(config.fader.curve, FadeCurve::EqualPower);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_invalid_file_is_error() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "config.toml", "initial_buffer_delay_seconds = -2");

    assert!(load_config(&ConfigSource::Explicit(path)).is_err());
}

#[test]
fn test_oversized_durations_are_config_errors() {
    let fields: [fn(&mut TomlConfig); 5] = [
        |c| c.initial_buffer_delay_seconds = 1e30,
        |c| c.soundtrack_delay_seconds = 1e30,
        |c| c.preload_buffer_seconds = 1e30,
        |c| c.fader.duration_seconds = MAX_DURATION_SECONDS + 1.0,
        |c| c.fader.delay_seconds = 1e30,
    ];
    for set in fields {
        let mut config = TomlConfig::default();
        set(&mut config);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    let mut config = TomlConfig::default();
    config.initial_buffer_delay_seconds = MAX_DURATION_SECONDS;
    assert!(config.validate().is_ok());
}

#[test]
fn test_oversized_delay_in_file_is_rejected_at_load() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "config.toml", "initial_buffer_delay_seconds = 1e30");

    let err = load_config(&ConfigSource::Explicit(path)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_scene_file_round_trip_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "scenes.json",
        r#"{ "scenes": [
            { "name": "One", "videos": [{"video": "a.mp4"}, {"video": "b.mp4"}],
              "displayDuration": 5, "SceneLength": 12, "nextScene": 1, "soundtrack": "one.ogg" },
            { "name": "Two", "videos": [{"video": "c.mp4"}],
              "displayDuration": 3, "SceneLength": 3, "nextScene": 0 }
        ] }"#,
    );

    let scenes = SceneSet::load(&path).unwrap();
    assert_eq!(scenes.len(), 2);
    assert_eq!(scenes.get(1).unwrap().next_scene, 0);
}

#[test]
fn test_missing_scene_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let err = SceneSet::load(&dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
