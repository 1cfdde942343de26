//! Dual-buffer playback core
//!
//! **Responsibilities:**
//! - Owns the two playback buffers and decides which one is active
//! - Drives prepare → play → preload-next → swap against the video timer
//! - Enables renderers only once real decoded pixels exist
//! - Cues the soundtrack once per scene activation
//! - Discards completions that belong to a torn-down activation or a
//!   superseded request
//!
//! Everything runs on the tick thread. Decoder results come back through
//! [`PlaybackCore::handle_completion`], any number of ticks after the request.

use crate::catalog::{ClipCatalog, ClipHandle};
use crate::error::{Error, Result};
use crate::media::{Completion, Decoder, RenderState, RenderSurfaces, SurfaceLayout, Ticket};
use crate::playback::buffer::{BoundClip, PlaybackBuffer};
use crate::playback::shuffle::ShuffleSequencer;
use chrono::Utc;
use gvp_common::events::{EventBus, InstallationEvent};
use gvp_common::time::{Clock, Deadline};
use gvp_common::{BufferId, SceneDescriptor};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Prepare attempts per clip before its slot is skipped (first try plus one retry)
pub const MAX_PREPARE_ATTEMPTS: u32 = 2;

/// Static core settings, fixed for the life of the process
#[derive(Debug, Clone, Default)]
pub struct CoreSettings {
    /// How long before the display duration ends to start preparing the next clip
    pub preload_buffer_seconds: f64,

    /// Real-time wait between the first clip starting and the soundtrack cue
    pub soundtrack_delay: Duration,

    pub layout: SurfaceLayout,
}

/// Lifecycle phase of one scene activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorePhase {
    /// Never started
    Idle,
    /// Waiting out the initial buffer delay
    BufferWaiting,
    /// Clips are being prepared, played and swapped
    Playing,
    /// Scene torn down; every completion is stale until the next start
    TornDown,
}

/// Per-activation scheduler state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackCoreState {
    pub active: BufferId,
    /// Shuffle position of the clip on the active buffer
    pub position: usize,
    pub video_elapsed: f64,
    pub preload_in_flight: bool,
    pub first_clip_started: bool,
    pub scene_ready: bool,
}

impl PlaybackCoreState {
    fn fresh() -> Self {
        Self {
            active: BufferId::A,
            position: 0,
            video_elapsed: 0.0,
            preload_in_flight: false,
            first_clip_started: false,
            scene_ready: false,
        }
    }
}

/// Counters for operators; survive across scene activations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackDiagnostics {
    pub stale_callbacks: u64,
    pub swaps: u64,
    pub deferred_swaps: u64,
    pub prepare_retries: u64,
    pub clips_skipped: u64,
    pub clips_started: u64,
}

/// Requests the core hands up to the scene timeline driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreSignal {
    /// The soundtrack delay after the first clip has elapsed
    SoundtrackCue { activation: u64 },
}

/// The scene currently scheduled
#[derive(Debug)]
struct ActiveScene {
    name: String,
    display_duration: f64,
    playlist: Vec<ClipHandle>,
    sequencer: ShuffleSequencer,
}

/// Dual-buffer playback scheduler
pub struct PlaybackCore {
    decoder: Box<dyn Decoder + Send>,
    surfaces: Box<dyn RenderSurfaces + Send>,
    catalog: Arc<ClipCatalog>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    settings: CoreSettings,

    activation: u64,
    phase: CorePhase,
    scene: Option<ActiveScene>,
    buffers: [PlaybackBuffer; 2],
    state: PlaybackCoreState,
    render: RenderState,

    start_deadline: Option<Deadline>,
    soundtrack_deadline: Option<Deadline>,
    /// Outstanding first-frame watch; cleared once the first frame shows
    first_frame: Option<Ticket>,
    first_frame_shown: bool,
    swap_deferred: bool,
    next_request: u64,

    signals: Vec<CoreSignal>,
    diagnostics: PlaybackDiagnostics,
}

impl PlaybackCore {
    pub fn new(
        decoder: Box<dyn Decoder + Send>,
        surfaces: Box<dyn RenderSurfaces + Send>,
        catalog: Arc<ClipCatalog>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        settings: CoreSettings,
    ) -> Self {
        Self {
            decoder,
            surfaces,
            catalog,
            clock,
            events,
            settings,
            activation: 0,
            phase: CorePhase::Idle,
            scene: None,
            buffers: [PlaybackBuffer::new(BufferId::A), PlaybackBuffer::new(BufferId::B)],
            state: PlaybackCoreState::fresh(),
            render: RenderState::hidden(),
            start_deadline: None,
            soundtrack_deadline: None,
            first_frame: None,
            first_frame_shown: false,
            swap_deferred: false,
            next_request: 0,
            signals: Vec::new(),
            diagnostics: PlaybackDiagnostics::default(),
        }
    }

    /// Begin a scene activation
    ///
    /// Resets both buffers and the video timer, makes A the active buffer and
    /// schedules the first prepare `buffer_delay` of real time from now.
    pub fn start(
        &mut self,
        activation: u64,
        scene: &SceneDescriptor,
        playlist: Vec<ClipHandle>,
        sequencer: ShuffleSequencer,
        buffer_delay: Duration,
    ) -> Result<()> {
        if playlist.is_empty() || sequencer.len() != playlist.len() {
            return Err(Error::InvalidState(format!(
                "Scene '{}': shuffle covers {} slots but playlist has {}",
                scene.name,
                sequencer.len(),
                playlist.len()
            )));
        }
        if activation <= self.activation {
            return Err(Error::InvalidState(format!(
                "Activation {} does not follow {}",
                activation, self.activation
            )));
        }

        if matches!(self.phase, CorePhase::BufferWaiting | CorePhase::Playing) {
            self.teardown();
        }

        self.activation = activation;
        self.buffers.iter_mut().for_each(PlaybackBuffer::reset);
        self.state = PlaybackCoreState::fresh();
        self.state.position = sequencer.first_playable().unwrap_or(0);
        self.scene = Some(ActiveScene {
            name: scene.name.clone(),
            display_duration: scene.display_duration,
            playlist,
            sequencer,
        });
        self.first_frame = None;
        self.first_frame_shown = false;
        self.swap_deferred = false;
        self.soundtrack_deadline = None;
        self.apply_render(RenderState::hidden());

        self.phase = CorePhase::BufferWaiting;
        self.start_deadline = Some(Deadline::after(self.clock.as_ref(), buffer_delay));
        debug!(
            "Scene '{}' activation {}: first clip in {:.3}s",
            scene.name,
            activation,
            buffer_delay.as_secs_f64()
        );

        // A zero delay starts right away rather than on the next tick
        self.poll_deadlines()
    }

    /// Advance one logical frame
    ///
    /// Order within a tick is fixed: real-time deadlines, video timer,
    /// preload threshold, swap threshold.
    pub fn tick(&mut self, dt: f64) -> Result<()> {
        if !matches!(self.phase, CorePhase::BufferWaiting | CorePhase::Playing) {
            return Ok(());
        }

        self.poll_deadlines()?;

        if self.state.scene_ready {
            self.state.video_elapsed += dt.max(0.0);
        }

        if !self.buffer(self.state.active).is_playing() {
            return Ok(());
        }

        let display = self.display_duration();
        let inactive = self.state.active.other();

        if !self.state.preload_in_flight
            && self.buffer(inactive).clip().is_none()
            && self.state.video_elapsed >= display - self.settings.preload_buffer_seconds
        {
            self.preload_next()?;
        }

        if self.state.video_elapsed >= display {
            if self.buffer(inactive).is_prepared() {
                self.swap()?;
            } else if !self.swap_deferred {
                self.swap_deferred = true;
                self.diagnostics.deferred_swaps += 1;
                warn!(
                    "Swap deferred at {:.3}s: buffer {} not prepared yet",
                    self.state.video_elapsed, inactive
                );
                self.events.emit_lossy(InstallationEvent::SwapDeferred {
                    activation: self.activation,
                    position: self.state.position,
                    timestamp: Utc::now(),
                });
            }
        }

        Ok(())
    }

    /// Apply a decoder result
    ///
    /// Results for another activation, a superseded request or a torn-down
    /// scene are counted and dropped without touching buffer state.
    pub fn handle_completion(&mut self, completion: Completion) -> Result<()> {
        let ticket = completion.ticket();
        if ticket.activation != self.activation
            || !matches!(self.phase, CorePhase::BufferWaiting | CorePhase::Playing)
        {
            self.discard_stale(ticket);
            return Ok(());
        }

        match completion {
            Completion::Prepared(ticket) => {
                if !self.buffers[ticket.buffer.index()].take_pending(ticket) {
                    self.discard_stale(ticket);
                    return Ok(());
                }
                self.buffers[ticket.buffer.index()].mark_prepared();
                if ticket.buffer == self.state.active {
                    self.on_active_prepared()
                } else {
                    self.on_inactive_prepared();
                    Ok(())
                }
            }
            Completion::PrepareFailed { ticket, reason } => {
                if !self.buffers[ticket.buffer.index()].take_pending(ticket) {
                    self.discard_stale(ticket);
                    return Ok(());
                }
                self.on_prepare_failed(ticket.buffer, &reason)
            }
            Completion::FirstFrame(ticket) => {
                if self.first_frame != Some(ticket) {
                    self.discard_stale(ticket);
                    return Ok(());
                }
                self.first_frame = None;
                self.first_frame_shown = true;
                self.apply_render(RenderState::showing(ticket.buffer));
                info!("First frame on buffer {}, renderer enabled", ticket.buffer);
                self.events.emit_lossy(InstallationEvent::FirstFrameShown {
                    activation: self.activation,
                    buffer: ticket.buffer,
                    timestamp: Utc::now(),
                });
                Ok(())
            }
        }
    }

    /// Stop both buffers, hide every surface and forget outstanding requests
    pub fn teardown(&mut self) {
        if matches!(self.phase, CorePhase::Idle | CorePhase::TornDown) {
            return;
        }
        for id in [BufferId::A, BufferId::B] {
            self.decoder.stop(id);
            self.decoder.release(id);
        }
        self.buffers.iter_mut().for_each(PlaybackBuffer::reset);
        self.apply_render(RenderState::hidden());
        self.start_deadline = None;
        self.soundtrack_deadline = None;
        self.first_frame = None;
        self.swap_deferred = false;
        self.state.scene_ready = false;
        self.state.preload_in_flight = false;
        self.phase = CorePhase::TornDown;
        debug!("Playback core torn down (activation {})", self.activation);
    }

    /// Take pending signals for the driver
    pub fn drain_signals(&mut self) -> Vec<CoreSignal> {
        std::mem::take(&mut self.signals)
    }

    pub fn buffer(&self, id: BufferId) -> &PlaybackBuffer {
        &self.buffers[id.index()]
    }

    pub fn state(&self) -> &PlaybackCoreState {
        &self.state
    }

    pub fn phase(&self) -> CorePhase {
        self.phase
    }

    pub fn activation(&self) -> u64 {
        self.activation
    }

    pub fn render(&self) -> RenderState {
        self.render
    }

    pub fn diagnostics(&self) -> &PlaybackDiagnostics {
        &self.diagnostics
    }

    pub fn catalog(&self) -> &ClipCatalog {
        &self.catalog
    }

    /// Shuffle order of the current activation
    pub fn shuffle_order(&self) -> Option<&[usize]> {
        self.scene.as_ref().map(|s| s.sequencer.order())
    }

    /// Logical path of the clip bound to a buffer
    pub fn clip_path(&self, id: BufferId) -> Option<&str> {
        let bound = self.buffer(id).clip()?;
        self.catalog
            .asset(bound.handle)
            .map(|asset| asset.logical_path.as_str())
    }

    fn display_duration(&self) -> f64 {
        self.scene.as_ref().map_or(f64::INFINITY, |s| s.display_duration)
    }

    fn scene_name(&self) -> &str {
        self.scene.as_ref().map_or("", |s| s.name.as_str())
    }

    fn poll_deadlines(&mut self) -> Result<()> {
        let now = self.clock.now();

        if self.phase == CorePhase::BufferWaiting
            && self.start_deadline.is_some_and(|d| d.is_due(now))
        {
            self.start_deadline = None;
            self.begin_scene()?;
        }

        if self.soundtrack_deadline.is_some_and(|d| d.is_due(now)) {
            self.soundtrack_deadline = None;
            debug!("Soundtrack delay elapsed for '{}'", self.scene_name());
            self.signals.push(CoreSignal::SoundtrackCue {
                activation: self.activation,
            });
        }

        Ok(())
    }

    /// Buffer delay over: prepare the first clip and watch for its first frame
    fn begin_scene(&mut self) -> Result<()> {
        self.phase = CorePhase::Playing;
        self.state.scene_ready = true;

        let active = self.state.active;
        let position = self.state.position;
        self.bind(active, position)?;
        self.issue_prepare(active)?;

        let ticket = self.new_ticket(active);
        self.first_frame = Some(ticket);
        self.decoder.watch_first_frame(ticket);

        info!(
            "Scene '{}' ready, preparing '{}' on buffer {}",
            self.scene_name(),
            self.clip_path(active).unwrap_or("?"),
            active
        );
        Ok(())
    }

    fn on_active_prepared(&mut self) -> Result<()> {
        let active = self.state.active;
        self.start_playing(active);

        if !self.state.first_clip_started {
            self.state.first_clip_started = true;
            self.soundtrack_deadline = Some(Deadline::after(
                self.clock.as_ref(),
                self.settings.soundtrack_delay,
            ));
            self.poll_deadlines()?;
        }
        Ok(())
    }

    fn on_inactive_prepared(&mut self) {
        self.state.preload_in_flight = false;
        trace!(
            "Preload ready on buffer {}: '{}'",
            self.state.active.other(),
            self.clip_path(self.state.active.other()).unwrap_or("?")
        );
    }

    fn on_prepare_failed(&mut self, id: BufferId, reason: &str) -> Result<()> {
        let attempts = self.buffers[id.index()].record_failure();
        let clip = self.clip_path(id).unwrap_or("?").to_string();

        if attempts < MAX_PREPARE_ATTEMPTS {
            self.diagnostics.prepare_retries += 1;
            warn!(
                "Prepare failed for '{}' on buffer {} ({}), retrying",
                clip, id, reason
            );
            return self.issue_prepare(id);
        }

        let failure = Error::PrepareFailed {
            clip: clip.clone(),
            attempts,
        };
        error!("{}: {}, skipping clip", failure, reason);
        self.diagnostics.clips_skipped += 1;
        self.events.emit_lossy(InstallationEvent::ClipSkipped {
            activation: self.activation,
            clip,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });

        if let Some(bound) = self.buffers[id.index()].clip() {
            if let Some(scene) = self.scene.as_mut() {
                scene.sequencer.skip_slot(bound.slot);
            }
        }
        self.decoder.release(id);
        self.buffers[id.index()].reset();

        if id == self.state.active {
            // Replace the active clip; whatever the inactive buffer holds is
            // re-preloaded after the new active clip starts
            let inactive = id.other();
            if self.buffer(inactive).clip().is_some() {
                self.decoder.release(inactive);
                self.buffers[inactive.index()].reset();
                self.state.preload_in_flight = false;
            }
            let position = self.next_playable(self.state.position)?;
            self.state.position = position;
            self.bind(id, position)?;
            self.issue_prepare(id)?;
            if !self.first_frame_shown {
                self.rewatch_first_frame(id);
            }
            Ok(())
        } else {
            self.state.preload_in_flight = false;
            self.preload_next()
        }
    }

    /// Bind the clip after the active one to the inactive buffer and prepare it
    fn preload_next(&mut self) -> Result<()> {
        let inactive = self.state.active.other();
        let position = self.next_playable(self.state.position)?;

        self.decoder.release(inactive);
        self.bind(inactive, position)?;
        self.issue_prepare(inactive)?;
        self.state.preload_in_flight = true;

        let clip = self.clip_path(inactive).unwrap_or("?").to_string();
        debug!(
            "Preloading '{}' (position {}) on buffer {}",
            clip, position, inactive
        );
        self.events.emit_lossy(InstallationEvent::PreloadStarted {
            activation: self.activation,
            buffer: inactive,
            clip,
            position,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Exchange buffer roles
    ///
    /// The clip shown after the swap is the one the inactive buffer
    /// preloaded. Both renderer states change in one surface update.
    fn swap(&mut self) -> Result<()> {
        let old = self.state.active;
        let new = old.other();
        let position = self
            .buffer(new)
            .clip()
            .map(|bound| bound.position)
            .ok_or_else(|| Error::InvalidState(format!("Swap to unbound buffer {}", new)))?;

        self.state.active = new;
        self.state.position = position;
        self.swap_deferred = false;

        if self.first_frame_shown {
            self.apply_render(RenderState::showing(new));
        } else {
            self.rewatch_first_frame(new);
        }

        self.decoder.stop(old);
        self.buffers[old.index()].set_playing(false);

        self.diagnostics.swaps += 1;
        info!("Swapped to buffer {} (position {})", new, position);
        self.events.emit_lossy(InstallationEvent::BuffersSwapped {
            activation: self.activation,
            active: new,
            position,
            timestamp: Utc::now(),
        });

        if self.buffer(new).is_prepared() {
            self.start_playing(new);
        } else if !self.buffer(new).is_preparing() {
            // Plays from on_active_prepared once ready
            self.issue_prepare(new)?;
        }

        self.preload_next()
    }

    fn start_playing(&mut self, id: BufferId) {
        self.decoder.play(id);
        self.buffers[id.index()].set_playing(true);
        self.state.video_elapsed = 0.0;
        self.diagnostics.clips_started += 1;

        let clip = self.clip_path(id).unwrap_or("?").to_string();
        info!("Playing '{}' on buffer {}", clip, id);
        self.events.emit_lossy(InstallationEvent::ClipStarted {
            activation: self.activation,
            buffer: id,
            clip,
            position: self.state.position,
            timestamp: Utc::now(),
        });
    }

    /// Move the first-frame watch to `id`; the previous ticket becomes stale
    fn rewatch_first_frame(&mut self, id: BufferId) {
        let ticket = self.new_ticket(id);
        self.first_frame = Some(ticket);
        self.decoder.watch_first_frame(ticket);
    }

    fn next_playable(&self, position: usize) -> Result<usize> {
        let scene = self
            .scene
            .as_ref()
            .ok_or_else(|| Error::InvalidState("No scene scheduled".to_string()))?;
        scene
            .sequencer
            .next_playable(position)
            .ok_or_else(|| Error::NoPlayableClips(scene.name.clone()))
    }

    fn bind(&mut self, id: BufferId, position: usize) -> Result<()> {
        let scene = self
            .scene
            .as_ref()
            .ok_or_else(|| Error::InvalidState("No scene scheduled".to_string()))?;
        let slot = scene.sequencer.slot_at(position);
        let handle = scene.playlist.get(slot).copied().ok_or_else(|| {
            Error::InvalidState(format!("Slot {} outside playlist of '{}'", slot, scene.name))
        })?;
        self.buffers[id.index()].bind(BoundClip {
            handle,
            position,
            slot,
        });
        Ok(())
    }

    fn issue_prepare(&mut self, id: BufferId) -> Result<()> {
        let bound = self.buffer(id).clip().ok_or_else(|| {
            Error::InvalidState(format!("Prepare on unbound buffer {}", id))
        })?;
        let ticket = self.new_ticket(id);
        self.buffers[id.index()].begin_prepare(ticket);

        let asset = self.catalog.asset(bound.handle).ok_or_else(|| {
            Error::InvalidState(format!("Clip handle {:?} not in catalog", bound.handle))
        })?;
        self.decoder.prepare(ticket, asset);
        Ok(())
    }

    fn new_ticket(&mut self, buffer: BufferId) -> Ticket {
        self.next_request += 1;
        Ticket {
            activation: self.activation,
            buffer,
            request: self.next_request,
        }
    }

    fn apply_render(&mut self, render: RenderState) {
        self.render = render;
        for id in [BufferId::A, BufferId::B] {
            self.buffers[id.index()].set_visible(render.is_enabled(id));
        }
        let states = self.settings.layout.expand(render);
        self.surfaces.apply(&states);
    }

    fn discard_stale(&mut self, ticket: Ticket) {
        self.diagnostics.stale_callbacks += 1;
        debug!(
            "Discarding stale completion (activation {}, buffer {}, request {})",
            ticket.activation, ticket.buffer, ticket.request
        );
        self.events.emit_lossy(InstallationEvent::StaleCallbackDiscarded {
            activation: ticket.activation,
            current_activation: self.activation,
            buffer: ticket.buffer,
            timestamp: Utc::now(),
        });
    }
}

impl std::fmt::Debug for PlaybackCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackCore")
            .field("activation", &self.activation)
            .field("phase", &self.phase)
            .field("state", &self.state)
            .field("render", &self.render)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}
