//! Gallery Video Player (gvp-player) - Main entry point
//!
//! Loads the configuration and scene document, then runs the scene
//! scheduler against the headless rehearsal backend until Ctrl+C, SIGTERM or
//! the optional time limit.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gvp_common::config::{load_config, resolve_config_source, TomlConfig};
use gvp_common::time::SystemClock;
use gvp_common::{FadeCurve, SceneSet};
use gvp_player::runner::{build_rehearsal, clip_source};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for gvp-player
#[derive(Parser, Debug)]
#[command(name = "gvp-player")]
#[command(about = "Dual-buffer video installation scheduler")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scene document (JSON), overrides the config file
    #[arg(short, long, env = "GVP_SCENES")]
    scenes: Option<PathBuf>,

    /// Folder containing clips and soundtracks, overrides the config file
    #[arg(short, long, env = "GVP_MEDIA_ROOT")]
    media_root: Option<PathBuf>,

    /// Scene index to start with
    #[arg(long)]
    start_scene: Option<usize>,

    /// Fixed shuffle seed
    #[arg(long)]
    seed: Option<u64>,

    /// Fade curve for scene transitions, overrides the config file
    #[arg(long, env = "GVP_FADE_CURVE")]
    fade_curve: Option<FadeCurve>,

    /// Stop after this many seconds
    #[arg(long)]
    max_seconds: Option<f64>,
}

impl Args {
    fn apply(&self, config: &mut TomlConfig) {
        if let Some(scenes) = &self.scenes {
            config.scenes_file = scenes.clone();
        }
        if let Some(root) = &self.media_root {
            config.media_root = root.clone();
        }
        if let Some(index) = self.start_scene {
            config.start_scene = index;
        }
        if let Some(seed) = self.seed {
            config.shuffle_seed = Some(seed);
        }
        if let Some(curve) = self.fade_curve {
            config.fader.curve = curve;
        }
    }
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("gvp_player={0},gvp_common={0}", config.logging.level).into());

    match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Configuration comes before tracing so the log level can be applied
    let source = resolve_config_source(args.config.as_deref());
    let mut config = load_config(&source).context("Failed to load configuration")?;
    args.apply(&mut config);

    init_tracing(&config)?;
    info!(
        "Starting Gallery Video Player (gvp-player) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Configuration: {:?}", source);
    info!(
        "Scene fades: {} over {:.1}s",
        config.fader.curve, config.fader.duration_seconds
    );

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e).context("Invalid configuration");
    }

    let scenes = match SceneSet::load(&config.scenes_file) {
        Ok(scenes) => scenes,
        Err(e) => {
            error!("Scene document rejected, installation halted: {}", e);
            return Err(e).context("Failed to load scenes");
        }
    };
    info!(
        "Loaded {} scenes from {}",
        scenes.len(),
        config.scenes_file.display()
    );

    let media = clip_source(&config, &scenes);
    let rehearsal = match build_rehearsal(&config, scenes, media, Arc::new(SystemClock::new())) {
        Ok(rehearsal) => rehearsal,
        Err(e) => {
            error!("Installation halted: {}", e);
            return Err(e).context("Failed to prepare installation");
        }
    };

    if !rehearsal.preload.missing_clips.is_empty() {
        error!(
            "{} clip(s) missing: {:?}",
            rehearsal.preload.missing_clips.len(),
            rehearsal.preload.missing_clips
        );
    }

    let max_run = args
        .max_seconds
        .filter(|s| s.is_finite() && *s > 0.0)
        .map(Duration::from_secs_f64);

    let summary = rehearsal
        .run(max_run, shutdown_signal())
        .await
        .context("Scheduler stopped")?;

    info!(
        "Shutdown complete after {:.1}s ({} clips started)",
        summary.elapsed.as_secs_f64(),
        summary.diagnostics.clips_started
    );
    match serde_json::to_string(&summary) {
        Ok(json) => info!("Run summary: {}", json),
        Err(e) => error!("Failed to serialize run summary: {}", e),
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_curve_override_applies_to_config() {
        let args = Args::try_parse_from(["gvp-player", "--fade-curve", "Cosine"]).unwrap();
        let mut config = TomlConfig::default();
        args.apply(&mut config);
        assert_eq!(config.fader.curve, FadeCurve::SCurve);
    }

    #[test]
    fn test_unknown_fade_curve_is_rejected() {
        assert!(Args::try_parse_from(["gvp-player", "--fade-curve", "wobble"]).is_err());
    }

    #[test]
    fn test_absent_overrides_keep_config() {
        let args = Args::try_parse_from(["gvp-player"]).unwrap();
        let mut config = TomlConfig::default();
        config.fader.curve = FadeCurve::Exponential;
        args.apply(&mut config);
        assert_eq!(config.fader.curve, FadeCurve::Exponential);
    }
}
