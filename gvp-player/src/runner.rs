//! Rehearsal runner
//!
//! Wires the scheduler to the simulated decoder, logging surfaces, the
//! opacity fader and a logging audio sink, then drives it from a tokio
//! interval at the configured tick rate until shutdown.

use crate::catalog::{ClipCatalog, ClipSource, DirectoryClipSource, PreloadReport, StaticClipSource};
use crate::error::{Error, Result};
use crate::media::SurfaceLayout;
use crate::playback::core::{CoreSettings, PlaybackCore, PlaybackDiagnostics};
use crate::playback::timeline::{SceneTimelineDriver, TickOutcome, TimelineSettings};
use crate::sim::{LoggingSurfaces, SimTiming, SimulatedDecoder};
use crate::soundtrack::{LogAudioSink, SoundtrackManager};
use crate::transition::{OpacityFader, TransitionSignaler};
use gvp_common::config::TomlConfig;
use gvp_common::events::EventBus;
use gvp_common::time::{seconds, Clock};
use gvp_common::SceneSet;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A fully wired headless installation
pub struct Rehearsal {
    pub driver: SceneTimelineDriver,
    pub decoder: SimulatedDecoder,
    pub clock: Arc<dyn Clock>,
    pub events: EventBus,
    pub preload: PreloadReport,
    pub tick_rate_hz: u32,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub scenes_activated: u64,
    pub elapsed: Duration,
    pub diagnostics: PlaybackDiagnostics,
}

/// Media lookup for a rehearsal
///
/// Uses the media root when it exists; otherwise every referenced path is
/// assumed present so timing can be rehearsed without media on disk.
pub fn clip_source(config: &TomlConfig, scenes: &SceneSet) -> Arc<dyn ClipSource> {
    if config.media_root.is_dir() {
        info!("Media root: {}", config.media_root.display());
        Arc::new(DirectoryClipSource::new(config.media_root.clone()))
    } else {
        warn!(
            "Media root {} not found, rehearsing with simulated media",
            config.media_root.display()
        );
        Arc::new(StaticClipSource::from_scenes(scenes))
    }
}

/// Build the scheduler and its simulated collaborators
pub fn build_rehearsal(
    config: &TomlConfig,
    scenes: SceneSet,
    source: Arc<dyn ClipSource>,
    clock: Arc<dyn Clock>,
) -> Result<Rehearsal> {
    config.validate()?;

    let mut catalog = ClipCatalog::new();
    let preload = catalog.preload_scenes(&scenes, source.as_ref());
    if catalog.is_empty() {
        return Err(Error::Configuration(
            "No clip referenced by any scene could be loaded".to_string(),
        ));
    }

    let events = EventBus::new(config.event_capacity);
    let decoder = SimulatedDecoder::new(
        Arc::clone(&clock),
        SimTiming::from(&config.rehearsal),
        config.shuffle_seed,
    );

    let core = PlaybackCore::new(
        Box::new(decoder.clone()),
        Box::new(LoggingSurfaces::new()),
        Arc::new(catalog),
        Arc::clone(&clock),
        events.clone(),
        CoreSettings {
            preload_buffer_seconds: config.preload_buffer_seconds,
            soundtrack_delay: seconds(config.soundtrack_delay_seconds),
            layout: SurfaceLayout {
                duplicates_a: config.surfaces.duplicates_a,
                duplicates_b: config.surfaces.duplicates_b,
            },
        },
    );

    let soundtrack = SoundtrackManager::new(
        &scenes,
        source,
        Box::new(LogAudioSink::new()),
        config.soundtrack.volume,
    );
    let signaler = TransitionSignaler::new(Box::new(OpacityFader::new(&config.fader)));

    let driver = SceneTimelineDriver::new(
        scenes,
        core,
        signaler,
        Box::new(soundtrack),
        events.clone(),
        TimelineSettings {
            start_scene: config.start_scene,
            buffer_delay: seconds(config.initial_buffer_delay_seconds),
            shuffle_seed: config.shuffle_seed,
        },
    )?;

    Ok(Rehearsal {
        driver,
        decoder,
        clock,
        events,
        preload,
        tick_rate_hz: config.tick_rate_hz,
    })
}

impl Rehearsal {
    /// Deliver every decoder result due now
    pub fn deliver(&mut self) -> Result<()> {
        let now = self.clock.now();
        for completion in self.decoder.poll(now) {
            self.driver.handle_completion(completion)?;
        }
        Ok(())
    }

    /// Run until `shutdown` resolves or `max_run` of real time has passed
    pub async fn run<F>(mut self, max_run: Option<Duration>, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let period = Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let began = self.clock.now();
        let mut last = began;
        let mut ticks = 0u64;
        let mut scenes_activated = 1u64;

        self.driver.start()?;
        self.deliver()?;
        info!("Installation running at {} Hz", self.tick_rate_hz);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = self.clock.now();
                    let dt = now.saturating_sub(last).as_secs_f64();
                    last = now;

                    self.deliver()?;
                    if let TickOutcome::SceneAdvanced { from, to } = self.driver.tick(dt)? {
                        scenes_activated += 1;
                        debug!("Scene {} → {}", from, to);
                    }
                    ticks += 1;

                    if max_run.is_some_and(|max| now.saturating_sub(began) >= max) {
                        info!("Rehearsal time limit reached");
                        break;
                    }
                }
                _ = &mut shutdown => {
                    break;
                }
            }
        }

        self.driver.shutdown();
        let summary = RunSummary {
            ticks,
            scenes_activated,
            elapsed: self.clock.now().saturating_sub(began),
            diagnostics: *self.driver.core().diagnostics(),
        };
        info!(
            "Stopped after {} ticks, {} scene activations, {} swaps, {} stale callbacks",
            summary.ticks,
            summary.scenes_activated,
            summary.diagnostics.swaps,
            summary.diagnostics.stale_callbacks
        );
        Ok(summary)
    }
}
