//! Host seams: the decoder behind the two playback buffers and the render
//! surfaces that show them
//!
//! The scheduler never blocks on the decoder. It issues requests tagged
//! with a [`Ticket`] and the host hands results back later as
//! [`Completion`]s on the tick thread, in any order and after any number of
//! ticks.

use crate::catalog::ClipAsset;
use gvp_common::BufferId;

/// Identifies one asynchronous request
///
/// `activation` ties the request to one scene activation so results that
/// arrive after teardown can be recognized; `request` distinguishes
/// successive requests on the same buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub activation: u64,
    pub buffer: BufferId,
    pub request: u64,
}

/// Result of an earlier decoder request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The clip bound to the buffer is ready to play
    Prepared(Ticket),

    /// The decoder could not prepare the clip
    PrepareFailed { ticket: Ticket, reason: String },

    /// The buffer produced its first decoded frame after starting playback
    FirstFrame(Ticket),
}

impl Completion {
    pub fn ticket(&self) -> Ticket {
        match self {
            Completion::Prepared(ticket)
            | Completion::FirstFrame(ticket)
            | Completion::PrepareFailed { ticket, .. } => *ticket,
        }
    }
}

/// Video decoder driving the two playback buffers
pub trait Decoder {
    /// Bind `clip` to the ticket's buffer and start preparing it
    ///
    /// Must eventually report `Prepared` or `PrepareFailed` with `ticket`.
    fn prepare(&mut self, ticket: Ticket, clip: &ClipAsset);

    /// Start playback of the prepared clip
    fn play(&mut self, buffer: BufferId);

    /// Stop playback
    fn stop(&mut self, buffer: BufferId);

    /// Report `FirstFrame` with `ticket` once the buffer renders a decoded frame
    fn watch_first_frame(&mut self, ticket: Ticket);

    /// Unbind the buffer's clip and forget any frame watch
    ///
    /// Results already in flight may still be delivered; the scheduler
    /// discards them by ticket.
    fn release(&mut self, buffer: BufferId);
}

/// One render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceId {
    /// The buffer's own surface
    Primary(BufferId),
    /// A mirrored copy that follows its buffer's surface
    Duplicate(BufferId, usize),
}

impl SurfaceId {
    pub fn buffer(&self) -> BufferId {
        match self {
            SurfaceId::Primary(buffer) | SurfaceId::Duplicate(buffer, _) => *buffer,
        }
    }
}

/// Renderer-enable flags for the two buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderState {
    pub a: bool,
    pub b: bool,
}

impl RenderState {
    /// Nothing on screen
    pub fn hidden() -> Self {
        Self::default()
    }

    /// Only `buffer` on screen
    pub fn showing(buffer: BufferId) -> Self {
        match buffer {
            BufferId::A => Self { a: true, b: false },
            BufferId::B => Self { a: false, b: true },
        }
    }

    pub fn is_enabled(&self, buffer: BufferId) -> bool {
        match buffer {
            BufferId::A => self.a,
            BufferId::B => self.b,
        }
    }

    pub fn visible_count(&self) -> usize {
        usize::from(self.a) + usize::from(self.b)
    }
}

/// How many mirrored surfaces each buffer has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceLayout {
    pub duplicates_a: usize,
    pub duplicates_b: usize,
}

impl SurfaceLayout {
    pub fn duplicates(&self, buffer: BufferId) -> usize {
        match buffer {
            BufferId::A => self.duplicates_a,
            BufferId::B => self.duplicates_b,
        }
    }

    /// Enable flag for every surface, derived from one render state
    pub fn expand(&self, render: RenderState) -> Vec<(SurfaceId, bool)> {
        let mut states = Vec::with_capacity(2 + self.duplicates_a + self.duplicates_b);
        for buffer in [BufferId::A, BufferId::B] {
            let enabled = render.is_enabled(buffer);
            states.push((SurfaceId::Primary(buffer), enabled));
            for copy in 0..self.duplicates(buffer) {
                states.push((SurfaceId::Duplicate(buffer, copy), enabled));
            }
        }
        states
    }
}

/// Host render targets
pub trait RenderSurfaces {
    /// Apply the enable flag of every surface as one step
    ///
    /// Implementations must not present a frame between individual entries.
    fn apply(&mut self, states: &[(SurfaceId, bool)]);
}
