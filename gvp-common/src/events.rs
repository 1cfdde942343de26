//! Installation events and the event bus
//!
//! Every scheduler transition worth observing is published as an
//! [`InstallationEvent`]. Publishing never blocks the tick thread; slow or
//! absent subscribers simply miss events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One of the two playback buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferId {
    A,
    B,
}

impl BufferId {
    /// The other buffer
    pub fn other(self) -> Self {
        match self {
            BufferId::A => BufferId::B,
            BufferId::B => BufferId::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            BufferId::A => 0,
            BufferId::B => 1,
        }
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferId::A => write!(f, "A"),
            BufferId::B => write!(f, "B"),
        }
    }
}

/// Installation event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstallationEvent {
    /// A scene became active; `activation` identifies this run of it
    SceneActivated {
        scene_index: usize,
        scene_name: String,
        activation: u64,
        timestamp: DateTime<Utc>,
    },

    /// A scene reached its length and was torn down
    SceneEnded {
        scene_index: usize,
        scene_name: String,
        activation: u64,
        next_scene: usize,
        timestamp: DateTime<Utc>,
    },

    FadeInStarted {
        activation: u64,
        timestamp: DateTime<Utc>,
    },

    FadeOutStarted {
        activation: u64,
        timestamp: DateTime<Utc>,
    },

    /// The inactive buffer began preparing the upcoming clip
    PreloadStarted {
        activation: u64,
        buffer: BufferId,
        clip: String,
        position: usize,
        timestamp: DateTime<Utc>,
    },

    /// A clip began playing on the active buffer
    ClipStarted {
        activation: u64,
        buffer: BufferId,
        clip: String,
        position: usize,
        timestamp: DateTime<Utc>,
    },

    /// Active and inactive buffers exchanged roles
    BuffersSwapped {
        activation: u64,
        active: BufferId,
        position: usize,
        timestamp: DateTime<Utc>,
    },

    /// The swap deadline passed before the upcoming clip was prepared
    SwapDeferred {
        activation: u64,
        position: usize,
        timestamp: DateTime<Utc>,
    },

    /// First decoded frame of the scene reached the screen
    FirstFrameShown {
        activation: u64,
        buffer: BufferId,
        timestamp: DateTime<Utc>,
    },

    /// The soundtrack service was asked to play this scene's track
    SoundtrackCued {
        activation: u64,
        scene_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A completion arrived for a torn-down activation or superseded request
    StaleCallbackDiscarded {
        activation: u64,
        current_activation: u64,
        buffer: BufferId,
        timestamp: DateTime<Utc>,
    },

    /// A clip was dropped from the cyclic walk after repeated prepare failures
    ClipSkipped {
        activation: u64,
        clip: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl InstallationEvent {
    /// Short event name for logs
    pub fn name(&self) -> &'static str {
        match self {
            InstallationEvent::SceneActivated { .. } => "SceneActivated",
            InstallationEvent::SceneEnded { .. } => "SceneEnded",
            InstallationEvent::FadeInStarted { .. } => "FadeInStarted",
            InstallationEvent::FadeOutStarted { .. } => "FadeOutStarted",
            InstallationEvent::PreloadStarted { .. } => "PreloadStarted",
            InstallationEvent::ClipStarted { .. } => "ClipStarted",
            InstallationEvent::BuffersSwapped { .. } => "BuffersSwapped",
            InstallationEvent::SwapDeferred { .. } => "SwapDeferred",
            InstallationEvent::FirstFrameShown { .. } => "FirstFrameShown",
            InstallationEvent::SoundtrackCued { .. } => "SoundtrackCued",
            InstallationEvent::StaleCallbackDiscarded { .. } => "StaleCallbackDiscarded",
            InstallationEvent::ClipSkipped { .. } => "ClipSkipped",
        }
    }
}

/// Central event distribution bus
///
/// Uses `tokio::sync::broadcast` internally:
/// - Non-blocking publish (slow subscribers don't block the tick thread)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use gvp_common::events::{EventBus, InstallationEvent};
///
/// let bus = EventBus::new(64);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(InstallationEvent::FadeInStarted {
///     activation: 1,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(InstallationEvent::FadeInStarted { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<InstallationEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<InstallationEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: InstallationEvent,
    ) -> Result<usize, broadcast::error::SendError<InstallationEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: InstallationEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
