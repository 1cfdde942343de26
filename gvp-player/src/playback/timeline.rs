//! Scene timeline driver
//!
//! Owns the scene timer and the scene sequence. Each tick it checks two
//! deadlines independently of the playback core:
//! - fade-out start: `scene_length - fade_duration - FADE_OUT_LEAD_SECONDS`,
//!   signalled at most once per activation
//! - scene end: `scene_length`, which tears the core down and activates
//!   `next_scene`
//!
//! Every activation draws a fresh shuffle and a new activation id, so decoder
//! results from an earlier run of the same scene are recognized as stale.

use crate::catalog::ClipHandle;
use crate::error::{Error, Result};
use crate::media::Completion;
use crate::playback::core::{CoreSignal, PlaybackCore};
use crate::playback::shuffle::ShuffleSequencer;
use crate::soundtrack::SoundtrackService;
use crate::transition::TransitionSignaler;
use chrono::Utc;
use gvp_common::events::{EventBus, InstallationEvent};
use gvp_common::{SceneDescriptor, SceneSet};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tracing::{error, info, warn};

/// Fade-out starts this long before the fade would have to end to finish
/// exactly at the scene boundary
pub const FADE_OUT_LEAD_SECONDS: f64 = 1.0;

/// Per-activation timeline state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneTimelineState {
    pub current_scene_index: usize,
    pub scene_elapsed: f64,
    pub fade_out_triggered: bool,
    /// Mirrors the core: the initial buffer delay is over
    pub scene_ready: bool,
}

impl SceneTimelineState {
    fn fresh(index: usize) -> Self {
        Self {
            current_scene_index: index,
            scene_elapsed: 0.0,
            fade_out_triggered: false,
            scene_ready: false,
        }
    }
}

/// What one tick did at the scene level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continued,
    SceneAdvanced { from: usize, to: usize },
}

/// Driver settings
#[derive(Debug, Clone, Default)]
pub struct TimelineSettings {
    pub start_scene: usize,
    /// Real-time wait before each scene's first clip is prepared
    pub buffer_delay: Duration,
    /// Fixed seed for reproducible shuffles
    pub shuffle_seed: Option<u64>,
}

/// Drives the scene sequence around one [`PlaybackCore`]
pub struct SceneTimelineDriver {
    scenes: SceneSet,
    playlists: Vec<Vec<ClipHandle>>,
    core: PlaybackCore,
    signaler: TransitionSignaler,
    soundtrack: Box<dyn SoundtrackService>,
    events: EventBus,
    rng: StdRng,
    settings: TimelineSettings,
    state: SceneTimelineState,
    activation: u64,
    started: bool,
}

impl SceneTimelineDriver {
    /// Build a driver for `scenes`
    ///
    /// Every scene's playlist is resolved against the core's catalog up
    /// front. A scene with no playable clip, or a start scene out of range,
    /// is a configuration error and no timer starts.
    pub fn new(
        scenes: SceneSet,
        core: PlaybackCore,
        signaler: TransitionSignaler,
        soundtrack: Box<dyn SoundtrackService>,
        events: EventBus,
        settings: TimelineSettings,
    ) -> Result<Self> {
        if settings.start_scene >= scenes.len() {
            return Err(Error::Configuration(format!(
                "Start scene {} out of range ({} scenes)",
                settings.start_scene,
                scenes.len()
            )));
        }

        let playlists = scenes
            .iter()
            .map(|scene| core.catalog().playlist(scene))
            .collect::<Result<Vec<_>>>()?;

        let rng = match settings.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            scenes,
            playlists,
            core,
            signaler,
            soundtrack,
            events,
            rng,
            state: SceneTimelineState::fresh(settings.start_scene),
            settings,
            activation: 0,
            started: false,
        })
    }

    /// Activate the start scene
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::InvalidState("Timeline already started".to_string()));
        }
        self.started = true;
        self.activate(self.settings.start_scene)
    }

    /// Advance one logical frame by `dt` seconds
    pub fn tick(&mut self, dt: f64) -> Result<TickOutcome> {
        if !self.started {
            return Err(Error::InvalidState("Timeline not started".to_string()));
        }
        let dt = dt.max(0.0);
        self.state.scene_elapsed += dt;

        let (scene_length, next_scene) = {
            let scene = self.current_scene()?;
            (scene.scene_length, scene.next_scene)
        };

        let fade_out_at =
            scene_length - self.signaler.fade_duration_seconds() - FADE_OUT_LEAD_SECONDS;
        if self.state.scene_elapsed >= fade_out_at {
            self.request_fade_out();
        }

        if self.state.scene_elapsed >= scene_length {
            let from = self.state.current_scene_index;
            // Frame belongs to the outgoing scene; the fade-in starts from zero
            self.signaler.tick(dt);
            self.end_scene(next_scene)?;
            self.activate(next_scene)?;
            return Ok(TickOutcome::SceneAdvanced {
                from,
                to: next_scene,
            });
        }

        match self.core.tick(dt) {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!("Playback degraded: {}", e),
        }
        self.forward_signals();
        self.signaler.tick(dt);
        self.state.scene_ready = self.core.state().scene_ready;

        Ok(TickOutcome::Continued)
    }

    /// Pass a decoder result to the core
    ///
    /// Recoverable failures are logged and playback continues.
    pub fn handle_completion(&mut self, completion: Completion) -> Result<()> {
        match self.core.handle_completion(completion) {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!("Playback degraded: {}", e),
        }
        self.forward_signals();
        self.state.scene_ready = self.core.state().scene_ready;
        Ok(())
    }

    /// Start the fade-out unless it already ran this activation
    ///
    /// Returns true if this call started it.
    pub fn request_fade_out(&mut self) -> bool {
        if self.state.fade_out_triggered {
            return false;
        }
        self.state.fade_out_triggered = true;
        info!(
            "Fading out scene {} at {:.3}s",
            self.state.current_scene_index, self.state.scene_elapsed
        );
        self.signaler.trigger_fade_out();
        self.events.emit_lossy(InstallationEvent::FadeOutStarted {
            activation: self.activation,
            timestamp: Utc::now(),
        });
        true
    }

    pub fn state(&self) -> &SceneTimelineState {
        &self.state
    }

    pub fn core(&self) -> &PlaybackCore {
        &self.core
    }

    pub fn activation(&self) -> u64 {
        self.activation
    }

    pub fn scenes(&self) -> &SceneSet {
        &self.scenes
    }

    pub fn current_scene(&self) -> Result<&SceneDescriptor> {
        Ok(self.scenes.get(self.state.current_scene_index)?)
    }

    /// Stop the current scene
    pub fn shutdown(&mut self) {
        self.core.teardown();
    }

    fn activate(&mut self, index: usize) -> Result<()> {
        let scene = self.scenes.get(index)?;
        let playlist = self.playlists.get(index).cloned().ok_or_else(|| {
            Error::Configuration(format!("Scene {} has no playlist", index))
        })?;
        let sequencer = ShuffleSequencer::new(playlist.len(), &mut self.rng)?;

        self.activation += 1;
        self.state = SceneTimelineState::fresh(index);

        info!(
            "Activating scene {} '{}' ({} clips, display {:.1}s, length {:.1}s, order {:?})",
            index,
            scene.name,
            playlist.len(),
            scene.display_duration,
            scene.scene_length,
            sequencer.order()
        );
        self.events.emit_lossy(InstallationEvent::SceneActivated {
            scene_index: index,
            scene_name: scene.name.clone(),
            activation: self.activation,
            timestamp: Utc::now(),
        });

        self.signaler.trigger_fade_in();
        self.events.emit_lossy(InstallationEvent::FadeInStarted {
            activation: self.activation,
            timestamp: Utc::now(),
        });

        self.core.start(
            self.activation,
            scene,
            playlist,
            sequencer,
            self.settings.buffer_delay,
        )?;
        self.state.scene_ready = self.core.state().scene_ready;
        Ok(())
    }

    fn end_scene(&mut self, next_scene: usize) -> Result<()> {
        let index = self.state.current_scene_index;
        let name = self.current_scene()?.name.clone();
        self.core.teardown();

        info!("Scene {} '{}' ended, next scene {}", index, name, next_scene);
        self.events.emit_lossy(InstallationEvent::SceneEnded {
            scene_index: index,
            scene_name: name.clone(),
            activation: self.activation,
            next_scene,
            timestamp: Utc::now(),
        });

        if next_scene >= self.scenes.len() {
            let err = Error::Configuration(format!(
                "Scene '{}' names next scene {} but only {} scenes exist",
                name,
                next_scene,
                self.scenes.len()
            ));
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    fn forward_signals(&mut self) {
        for signal in self.core.drain_signals() {
            match signal {
                CoreSignal::SoundtrackCue { activation } if activation == self.activation => {
                    let name = match self.current_scene() {
                        Ok(scene) => scene.name.clone(),
                        Err(e) => {
                            warn!("Soundtrack cue without a scene: {}", e);
                            continue;
                        }
                    };
                    info!("Starting soundtrack for scene '{}'", name);
                    self.soundtrack.play_soundtrack(&name);
                    self.events.emit_lossy(InstallationEvent::SoundtrackCued {
                        activation,
                        scene_name: name,
                        timestamp: Utc::now(),
                    });
                }
                CoreSignal::SoundtrackCue { .. } => {}
            }
        }
    }
}

impl std::fmt::Debug for SceneTimelineDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneTimelineDriver")
            .field("activation", &self.activation)
            .field("state", &self.state)
            .field("core", &self.core)
            .finish()
    }
}
