//! Scene soundtracks
//!
//! The scene timeline driver only knows scene names; [`SoundtrackManager`]
//! maps them to tracks and keeps a track playing across scenes that share it.

use crate::catalog::ClipSource;
use crate::error::{Error, Result};
use gvp_common::scene::{logical_clip_path, normalize_scene_name};
use gvp_common::SceneSet;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Soundtrack capability handed to the scene timeline driver
pub trait SoundtrackService: Send {
    /// Play the track for `scene_name`
    ///
    /// Names match case- and whitespace-insensitively. Asking for the track
    /// that is already playing is a no-op.
    fn play_soundtrack(&mut self, scene_name: &str);
}

/// Audio output that loops one track at a time
pub trait AudioSink: Send {
    /// Replace whatever is playing with `track`, looped
    fn play_looped(&mut self, track: &Path, volume: f32) -> Result<()>;
}

/// Audio sink that only logs; used for headless rehearsals
#[derive(Debug, Default)]
pub struct LogAudioSink;

impl LogAudioSink {
    pub fn new() -> Self {
        Self
    }
}

impl AudioSink for LogAudioSink {
    fn play_looped(&mut self, track: &Path, volume: f32) -> Result<()> {
        info!("Soundtrack: {} (volume {:.2}, looped)", track.display(), volume);
        Ok(())
    }
}

/// Scene name → soundtrack mapping with the currently playing track
pub struct SoundtrackManager {
    /// Normalized scene name → logical track path (None: scene has no soundtrack)
    tracks: HashMap<String, Option<String>>,
    current: Option<String>,
    source: Arc<dyn ClipSource>,
    sink: Box<dyn AudioSink>,
    volume: f32,
}

impl SoundtrackManager {
    pub fn new(
        scenes: &SceneSet,
        source: Arc<dyn ClipSource>,
        sink: Box<dyn AudioSink>,
        volume: f32,
    ) -> Self {
        let tracks = scenes
            .iter()
            .map(|scene| {
                (
                    normalize_scene_name(&scene.name),
                    scene.soundtrack.as_deref().map(logical_clip_path),
                )
            })
            .collect();

        Self {
            tracks,
            current: None,
            source,
            sink,
            volume: volume.clamp(0.0, 1.0),
        }
    }

    /// Logical path of the track currently playing
    pub fn current_track(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn start(&mut self, track: &str) -> Result<()> {
        let location = self
            .source
            .locate(track)
            .ok_or_else(|| Error::AssetMissing(track.to_string()))?;
        self.sink.play_looped(&location, self.volume)?;
        self.current = Some(track.to_string());
        Ok(())
    }
}

impl SoundtrackService for SoundtrackManager {
    fn play_soundtrack(&mut self, scene_name: &str) {
        let key = normalize_scene_name(scene_name);
        let track = match self.tracks.get(&key) {
            Some(Some(track)) => track.clone(),
            Some(None) => {
                debug!("Scene '{}' has no soundtrack", scene_name);
                return;
            }
            None => {
                warn!("No soundtrack found for scene: {}", scene_name);
                return;
            }
        };

        if self.current.as_deref() == Some(track.as_str()) {
            debug!("Soundtrack '{}' already playing, skipping", track);
            return;
        }

        match self.start(&track) {
            Ok(()) => info!("Playing soundtrack '{}' for scene '{}'", track, scene_name),
            Err(e) => error!("Soundtrack for scene '{}' not started: {}", scene_name, e),
        }
    }
}

impl std::fmt::Debug for SoundtrackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundtrackManager")
            .field("scenes", &self.tracks.len())
            .field("current", &self.current)
            .field("volume", &self.volume)
            .finish()
    }
}
