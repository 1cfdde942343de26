//! Rehearsal wiring: config file + scene document on disk → running scheduler

use gvp_common::config::{load_config, ConfigSource};
use gvp_common::time::{Clock, ManualClock};
use gvp_common::SceneSet;
use gvp_player::playback::timeline::TickOutcome;
use gvp_player::runner::{build_rehearsal, clip_source};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const SCENES: &str = r#"{
    "scenes": [
        {
            "name": "Tide Pool",
            "videos": [
                {"video": "clips/kelp.mp4"},
                {"video": "clips/anemone.mov"},
                {"video": "clips/crab.mp4"}
            ],
            "displayDuration": 2.0,
            "SceneLength": 7.0,
            "nextScene": 1,
            "soundtrack": "audio/waves.ogg"
        },
        {
            "name": "Open Sea",
            "videos": [{"video": "clips/whale.mp4"}, {"video": "clips/missing.mp4"}],
            "displayDuration": 3.0,
            "sceneLength": 6.0,
            "nextScene": 0,
            "soundtrack": "audio/waves.wav"
        }
    ]
}"#;

fn write_installation(dir: &TempDir) -> ConfigSource {
    let media = dir.path().join("media");
    fs::create_dir_all(media.join("clips")).unwrap();
    fs::create_dir_all(media.join("audio")).unwrap();
    for clip in ["kelp.mp4", "anemone.mov", "crab.mp4", "whale.mp4"] {
        fs::write(media.join("clips").join(clip), b"").unwrap();
    }
    fs::write(media.join("audio/waves.ogg"), b"").unwrap();
    fs::write(dir.path().join("scenes.json"), SCENES).unwrap();

    let config = r#"
scenes_file = "scenes.json"
media_root = "media"
preload_buffer_seconds = 0.5
soundtrack_delay_seconds = 1.0
shuffle_seed = 11

[rehearsal]
prepare_latency_ms = 100
first_frame_latency_ms = 20

[surfaces]
duplicates_a = 1
duplicates_b = 1
"#;
    let path = dir.path().join("config.toml");
    fs::write(&path, config).unwrap();
    ConfigSource::Explicit(path)
}

#[test]
fn test_rehearsal_from_files_runs_both_scenes() {
    let dir = TempDir::new().unwrap();
    let config = load_config(&write_installation(&dir)).unwrap();
    assert_eq!(config.media_root, dir.path().join("media"));

    let scenes = SceneSet::load(&config.scenes_file).unwrap();
    let source = clip_source(&config, &scenes);
    let clock = ManualClock::new();
    let mut rehearsal =
        build_rehearsal(&config, scenes, source, Arc::new(clock.clone())).unwrap();

    assert_eq!(rehearsal.preload.loaded, 4);
    assert_eq!(rehearsal.preload.missing_clips, vec!["clips/missing.mp4".to_string()]);
    assert!(rehearsal.preload.missing_soundtracks.is_empty());

    let mut events = rehearsal.events.subscribe();
    rehearsal.driver.start().unwrap();

    let mut advances = Vec::new();
    for _ in 0..(14 * 4) {
        clock.advance(Duration::from_millis(250));
        rehearsal.deliver().unwrap();
        if let TickOutcome::SceneAdvanced { from, to } = rehearsal.driver.tick(0.25).unwrap() {
            advances.push((from, to, clock.now().as_millis()));
        }
    }

    assert_eq!(advances, vec![(0, 1, 7000), (1, 0, 13000)]);

    let diagnostics = rehearsal.driver.core().diagnostics();
    assert!(diagnostics.swaps >= 3);
    assert_eq!(diagnostics.clips_skipped, 0);

    let mut cued = 0;
    while let Ok(event) = events.try_recv() {
        if event.name() == "SoundtrackCued" {
            cued += 1;
        }
    }
    assert_eq!(cued, 2);
}

#[test]
fn test_missing_media_root_rehearses_with_simulated_media() {
    let dir = TempDir::new().unwrap();
    let source = write_installation(&dir);
    fs::remove_dir_all(dir.path().join("media")).unwrap();

    let config = load_config(&source).unwrap();
    let scenes = SceneSet::load(&config.scenes_file).unwrap();
    let media = clip_source(&config, &scenes);
    let rehearsal = build_rehearsal(&config, scenes, media, Arc::new(ManualClock::new())).unwrap();

    assert_eq!(rehearsal.preload.loaded, 5);
    assert!(rehearsal.preload.missing_clips.is_empty());
}

#[test]
fn test_invalid_start_scene_halts_before_playback() {
    let dir = TempDir::new().unwrap();
    let mut config = load_config(&write_installation(&dir)).unwrap();
    config.start_scene = 9;

    let scenes = SceneSet::load(&config.scenes_file).unwrap();
    let source = clip_source(&config, &scenes);
    let err = build_rehearsal(&config, scenes, source, Arc::new(ManualClock::new()))
        .err()
        .unwrap();
    assert!(err.is_fatal());
}
