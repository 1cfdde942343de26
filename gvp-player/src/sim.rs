//! Simulated media backend for headless rehearsals
//!
//! [`SimulatedDecoder`] answers prepare requests after a configurable
//! latency (plus optional random jitter) measured on a [`Clock`], and reports
//! the first frame shortly after a watched buffer starts playing. Results are
//! collected with [`SimulatedDecoder::poll`] and fed back to the scheduler.
//!
//! Releasing a buffer does not cancel results already in flight; they are
//! still delivered, and the scheduler must recognize them as stale.

use crate::catalog::ClipAsset;
use crate::media::{Completion, Decoder, RenderSurfaces, SurfaceId, Ticket};
use gvp_common::config::RehearsalConfig;
use gvp_common::time::Clock;
use gvp_common::BufferId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, trace};

/// Decoder request as seen by the simulated backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderCall {
    Prepare { ticket: Ticket, clip: String },
    /// `clip` is the logical path bound to the buffer when play was requested
    Play { buffer: BufferId, clip: Option<String> },
    Stop(BufferId),
    WatchFirstFrame(Ticket),
    Release(BufferId),
}

/// Timing of the simulated decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimTiming {
    pub prepare_latency: Duration,
    /// Up to this much extra latency, drawn uniformly per prepare
    pub jitter: Duration,
    pub first_frame_latency: Duration,
}

impl From<&RehearsalConfig> for SimTiming {
    fn from(config: &RehearsalConfig) -> Self {
        Self {
            prepare_latency: Duration::from_millis(config.prepare_latency_ms),
            jitter: Duration::from_millis(config.jitter_ms),
            first_frame_latency: Duration::from_millis(config.first_frame_latency_ms),
        }
    }
}

#[derive(Debug)]
struct Scheduled {
    due: Duration,
    seq: u64,
    completion: Completion,
}

struct SimState {
    clock: Arc<dyn Clock>,
    timing: SimTiming,
    rng: StdRng,
    scheduled: Vec<Scheduled>,
    seq: u64,
    latency_overrides: VecDeque<Duration>,
    failures_pending: u32,
    watches: HashMap<BufferId, Ticket>,
    playing: HashSet<BufferId>,
    bound: HashMap<BufferId, String>,
    calls: Vec<DecoderCall>,
}

impl SimState {
    fn schedule(&mut self, delay: Duration, completion: Completion) {
        self.seq += 1;
        let due = self.clock.now() + delay;
        trace!("Simulated {:?} due at {:?}", completion, due);
        self.scheduled.push(Scheduled {
            due,
            seq: self.seq,
            completion,
        });
    }
}

/// Shared handle to a simulated decoder
///
/// Clones drive the same decoder, so a test or runner can keep one handle
/// for [`poll`](Self::poll) while the scheduler owns another.
#[derive(Clone)]
pub struct SimulatedDecoder {
    inner: Arc<Mutex<SimState>>,
}

impl SimulatedDecoder {
    pub fn new(clock: Arc<dyn Clock>, timing: SimTiming, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            inner: Arc::new(Mutex::new(SimState {
                clock,
                timing,
                rng,
                scheduled: Vec::new(),
                seq: 0,
                latency_overrides: VecDeque::new(),
                failures_pending: 0,
                watches: HashMap::new(),
                playing: HashSet::new(),
                bound: HashMap::new(),
                calls: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Results due at `now`, in the order they became due
    pub fn poll(&self, now: Duration) -> Vec<Completion> {
        let mut state = self.lock();
        let (mut due, pending): (Vec<_>, Vec<_>) =
            state.scheduled.drain(..).partition(|s| s.due <= now);
        state.scheduled = pending;
        due.sort_by_key(|s| (s.due, s.seq));
        due.into_iter().map(|s| s.completion).collect()
    }

    /// Results not yet delivered
    pub fn in_flight(&self) -> usize {
        self.lock().scheduled.len()
    }

    /// Use `latency` for the next prepare instead of the configured timing
    ///
    /// Overrides queue up and are consumed one per prepare.
    pub fn push_latency(&self, latency: Duration) {
        self.lock().latency_overrides.push_back(latency);
    }

    /// Make the next `count` prepares fail
    pub fn fail_next_prepares(&self, count: u32) {
        self.lock().failures_pending += count;
    }

    /// Every request received so far
    pub fn calls(&self) -> Vec<DecoderCall> {
        self.lock().calls.clone()
    }

    /// Logical paths of clips started, in order
    pub fn played(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                DecoderCall::Play { clip, .. } => clip.clone(),
                _ => None,
            })
            .collect()
    }
}

impl Decoder for SimulatedDecoder {
    fn prepare(&mut self, ticket: Ticket, clip: &ClipAsset) {
        let mut state = self.lock();
        state.calls.push(DecoderCall::Prepare {
            ticket,
            clip: clip.logical_path.clone(),
        });
        state.bound.insert(ticket.buffer, clip.logical_path.clone());
        state.playing.remove(&ticket.buffer);

        let latency = match state.latency_overrides.pop_front() {
            Some(latency) => latency,
            None => {
                let jitter = state.timing.jitter.as_millis() as u64;
                let extra = if jitter > 0 {
                    state.rng.gen_range(0..=jitter)
                } else {
                    0
                };
                state.timing.prepare_latency + Duration::from_millis(extra)
            }
        };

        let completion = if state.failures_pending > 0 {
            state.failures_pending -= 1;
            Completion::PrepareFailed {
                ticket,
                reason: format!("simulated decode error for '{}'", clip.logical_path),
            }
        } else {
            Completion::Prepared(ticket)
        };
        debug!(
            "Simulated prepare of '{}' on buffer {} ({:?})",
            clip.logical_path, ticket.buffer, latency
        );
        state.schedule(latency, completion);
    }

    fn play(&mut self, buffer: BufferId) {
        let mut state = self.lock();
        let clip = state.bound.get(&buffer).cloned();
        state.calls.push(DecoderCall::Play { buffer, clip });
        state.playing.insert(buffer);
        if let Some(ticket) = state.watches.remove(&buffer) {
            let latency = state.timing.first_frame_latency;
            state.schedule(latency, Completion::FirstFrame(ticket));
        }
    }

    fn stop(&mut self, buffer: BufferId) {
        let mut state = self.lock();
        state.calls.push(DecoderCall::Stop(buffer));
        state.playing.remove(&buffer);
    }

    fn watch_first_frame(&mut self, ticket: Ticket) {
        let mut state = self.lock();
        state.calls.push(DecoderCall::WatchFirstFrame(ticket));
        if state.playing.contains(&ticket.buffer) {
            let latency = state.timing.first_frame_latency;
            state.schedule(latency, Completion::FirstFrame(ticket));
        } else {
            state.watches.insert(ticket.buffer, ticket);
        }
    }

    fn release(&mut self, buffer: BufferId) {
        let mut state = self.lock();
        state.calls.push(DecoderCall::Release(buffer));
        state.watches.remove(&buffer);
        state.playing.remove(&buffer);
        state.bound.remove(&buffer);
    }
}

impl std::fmt::Debug for SimulatedDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SimulatedDecoder")
            .field("timing", &state.timing)
            .field("in_flight", &state.scheduled.len())
            .finish()
    }
}

/// Render surfaces that log enable changes
#[derive(Debug, Default)]
pub struct LoggingSurfaces {
    current: HashMap<SurfaceId, bool>,
    updates: usize,
}

impl LoggingSurfaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, surface: SurfaceId) -> bool {
        self.current.get(&surface).copied().unwrap_or(false)
    }

    /// Surface updates applied so far
    pub fn updates(&self) -> usize {
        self.updates
    }
}

impl RenderSurfaces for LoggingSurfaces {
    fn apply(&mut self, states: &[(SurfaceId, bool)]) {
        self.updates += 1;
        for (surface, enabled) in states {
            if self.current.insert(*surface, *enabled) != Some(*enabled) {
                debug!("Surface {:?} {}", surface, if *enabled { "on" } else { "off" });
            }
        }
    }
}
