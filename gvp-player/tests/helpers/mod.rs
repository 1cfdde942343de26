//! Test harness for scheduler integration tests
//!
//! Provides the `Rig` wrapper with:
//! - A manual clock shared by the scheduler and the simulated decoder
//! - Recording render surfaces, fader and soundtrack service
//! - `step` / `deliver` helpers that mimic the host tick loop

#![allow(dead_code)]

use gvp_common::events::{EventBus, InstallationEvent};
use gvp_common::time::{seconds, Clock, ManualClock};
use gvp_common::{BufferId, SceneDescriptor, SceneSet};
use gvp_player::catalog::{ClipCatalog, StaticClipSource};
use gvp_player::media::{RenderState, SurfaceId, SurfaceLayout};
use gvp_player::playback::core::{CoreSettings, PlaybackCore};
use gvp_player::playback::timeline::{SceneTimelineDriver, TickOutcome, TimelineSettings};
use gvp_player::sim::{SimTiming, SimulatedDecoder};
use gvp_player::soundtrack::SoundtrackService;
use gvp_player::transition::{FadeAnimator, TransitionSignaler};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Every surface update, in order
#[derive(Clone, Default)]
pub struct RecordingSurfaces(pub Arc<Mutex<Vec<Vec<(SurfaceId, bool)>>>>);

impl gvp_player::media::RenderSurfaces for RecordingSurfaces {
    fn apply(&mut self, states: &[(SurfaceId, bool)]) {
        self.0.lock().unwrap().push(states.to_vec());
    }
}

impl RecordingSurfaces {
    pub fn updates(&self) -> Vec<Vec<(SurfaceId, bool)>> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug, Default)]
pub struct FadeLog {
    pub fade_ins: usize,
    pub fade_outs: usize,
    /// Fader time ticked since the latest fade-in
    pub since_fade_in: f64,
}

/// Fader that only counts triggers
#[derive(Clone)]
pub struct RecordingFader {
    pub log: Arc<Mutex<FadeLog>>,
    duration: f64,
}

impl RecordingFader {
    pub fn new(duration: f64) -> Self {
        Self {
            log: Arc::new(Mutex::new(FadeLog::default())),
            duration,
        }
    }

    pub fn fade_ins(&self) -> usize {
        self.log.lock().unwrap().fade_ins
    }

    pub fn fade_outs(&self) -> usize {
        self.log.lock().unwrap().fade_outs
    }

    pub fn since_fade_in(&self) -> f64 {
        self.log.lock().unwrap().since_fade_in
    }
}

impl FadeAnimator for RecordingFader {
    fn start_fade_in(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.fade_ins += 1;
        log.since_fade_in = 0.0;
    }

    fn start_fade_out(&mut self) {
        self.log.lock().unwrap().fade_outs += 1;
    }

    fn fade_duration(&self) -> f64 {
        self.duration
    }

    fn tick(&mut self, dt: f64) {
        self.log.lock().unwrap().since_fade_in += dt;
    }
}

/// Soundtrack service that records requested scene names
#[derive(Clone, Default)]
pub struct RecordingSoundtrack(pub Arc<Mutex<Vec<String>>>);

impl SoundtrackService for RecordingSoundtrack {
    fn play_soundtrack(&mut self, scene_name: &str) {
        self.0.lock().unwrap().push(scene_name.to_string());
    }
}

impl RecordingSoundtrack {
    pub fn requests(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Scheduler knobs for a rig
#[derive(Debug, Clone)]
pub struct RigOptions {
    pub preload_buffer: f64,
    pub buffer_delay: f64,
    pub soundtrack_delay: f64,
    pub fade_duration: f64,
    pub timing: SimTiming,
    pub seed: u64,
    pub layout: SurfaceLayout,
}

impl Default for RigOptions {
    fn default() -> Self {
        Self {
            preload_buffer: 1.0,
            buffer_delay: 0.0,
            soundtrack_delay: 4.0,
            fade_duration: 1.0,
            timing: SimTiming::default(),
            seed: 42,
            layout: SurfaceLayout::default(),
        }
    }
}

/// Scene with clips named by their logical paths
pub fn scene(
    name: &str,
    clips: &[&str],
    display: f64,
    length: f64,
    next: usize,
    soundtrack: Option<&str>,
) -> SceneDescriptor {
    SceneDescriptor {
        name: name.to_string(),
        clips: clips.iter().map(|c| c.to_string()).collect(),
        display_duration: display,
        scene_length: length,
        next_scene: next,
        soundtrack: soundtrack.map(str::to_string),
    }
}

/// The three-clip scene used by the timing scenarios
pub fn scenario_scene() -> SceneDescriptor {
    scene("Forest", &["x", "y", "z"], 5.0, 12.0, 0, Some("audio/forest"))
}

/// Whole scheduler on a manual clock
pub struct Rig {
    pub clock: ManualClock,
    pub decoder: SimulatedDecoder,
    pub surfaces: RecordingSurfaces,
    pub fader: RecordingFader,
    pub soundtrack: RecordingSoundtrack,
    pub driver: SceneTimelineDriver,
    pub events: broadcast::Receiver<InstallationEvent>,
    pub scenes: Vec<SceneDescriptor>,
}

impl Rig {
    pub fn new(scenes: Vec<SceneDescriptor>, options: RigOptions) -> gvp_player::Result<Self> {
        let set = SceneSet::new(scenes.clone())?;
        let source = StaticClipSource::from_scenes(&set);
        let mut catalog = ClipCatalog::new();
        catalog.preload_scenes(&set, &source);
        Self::with_catalog(set, catalog, options)
    }

    pub fn with_catalog(
        set: SceneSet,
        catalog: ClipCatalog,
        options: RigOptions,
    ) -> gvp_player::Result<Self> {
        let clock = ManualClock::new();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let decoder = SimulatedDecoder::new(Arc::clone(&shared), options.timing, Some(options.seed));
        let surfaces = RecordingSurfaces::default();
        let fader = RecordingFader::new(options.fade_duration);
        let soundtrack = RecordingSoundtrack::default();
        let bus = EventBus::new(4096);
        let events = bus.subscribe();

        let core = PlaybackCore::new(
            Box::new(decoder.clone()),
            Box::new(surfaces.clone()),
            Arc::new(catalog),
            shared,
            bus.clone(),
            CoreSettings {
                preload_buffer_seconds: options.preload_buffer,
                soundtrack_delay: seconds(options.soundtrack_delay),
                layout: options.layout,
            },
        );

        let scenes = set.iter().cloned().collect();
        let driver = SceneTimelineDriver::new(
            set,
            core,
            TransitionSignaler::new(Box::new(fader.clone())),
            Box::new(soundtrack.clone()),
            bus,
            TimelineSettings {
                start_scene: 0,
                buffer_delay: seconds(options.buffer_delay),
                shuffle_seed: Some(options.seed),
            },
        )?;

        Ok(Self {
            clock,
            decoder,
            surfaces,
            fader,
            soundtrack,
            driver,
            events,
            scenes,
        })
    }

    /// Activate the first scene and deliver anything already due
    pub fn start(&mut self) {
        self.driver.start().unwrap();
        self.deliver();
    }

    /// Deliver decoder results until none are due at the current time
    pub fn deliver(&mut self) {
        loop {
            let due = self.decoder.poll(self.clock.now());
            if due.is_empty() {
                break;
            }
            for completion in due {
                self.driver.handle_completion(completion).unwrap();
            }
        }
    }

    /// One host frame: advance the clock, deliver results, tick
    pub fn step(&mut self, dt: f64) -> TickOutcome {
        self.clock.advance(Duration::from_secs_f64(dt));
        self.deliver();
        self.driver.tick(dt).unwrap()
    }

    /// Step `count` frames of `dt`, returning every scene advance seen
    pub fn steps(&mut self, count: usize, dt: f64) -> Vec<TickOutcome> {
        (0..count)
            .map(|_| self.step(dt))
            .filter(|o| *o != TickOutcome::Continued)
            .collect()
    }

    pub fn now(&self) -> f64 {
        self.clock.now().as_secs_f64()
    }

    /// Logical paths of clips started, in order
    pub fn played(&self) -> Vec<String> {
        self.decoder.played()
    }

    /// The current activation's shuffle order mapped to clip paths, cycled
    pub fn expected_cycle(&self, scene: usize, len: usize) -> Vec<String> {
        let order = self.driver.core().shuffle_order().unwrap().to_vec();
        let clips = &self.scenes[scene].clips;
        (0..len)
            .map(|i| clips[order[i % order.len()]].clone())
            .collect()
    }

    pub fn render(&self) -> RenderState {
        self.driver.core().render()
    }

    pub fn active(&self) -> BufferId {
        self.driver.core().state().active
    }

    /// Events published since the last call
    pub fn drain_events(&mut self) -> Vec<InstallationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn count<F>(events: &[InstallationEvent], pred: F) -> usize
where
    F: Fn(&InstallationEvent) -> bool,
{
    events.iter().filter(|e| pred(e)).count()
}
