//! Playback buffer bookkeeping
//!
//! Scheduler-side view of one of the two decoder buffers. Only the
//! playback core mutates these.

use crate::catalog::ClipHandle;
use crate::media::Ticket;
use gvp_common::BufferId;

/// Clip bound to a buffer, with where it sits in the shuffled walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundClip {
    pub handle: ClipHandle,
    pub position: usize,
    pub slot: usize,
}

/// One of the two playback buffers
#[derive(Debug, Clone)]
pub struct PlaybackBuffer {
    id: BufferId,
    clip: Option<BoundClip>,
    prepared: bool,
    visible: bool,
    playing: bool,
    /// Outstanding prepare request, if any
    pending: Option<Ticket>,
    /// Failed prepare attempts for the bound clip
    attempts: u32,
}

impl PlaybackBuffer {
    pub fn new(id: BufferId) -> Self {
        Self {
            id,
            clip: None,
            prepared: false,
            visible: false,
            playing: false,
            pending: None,
            attempts: 0,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn clip(&self) -> Option<BoundClip> {
        self.clip
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// A prepare request is outstanding
    pub fn is_preparing(&self) -> bool {
        self.pending.is_some()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Back to unbound, unprepared, invisible and stopped
    pub fn reset(&mut self) {
        *self = Self::new(self.id);
    }

    /// Bind a new clip; clears preparation state
    pub(crate) fn bind(&mut self, clip: BoundClip) {
        self.clip = Some(clip);
        self.prepared = false;
        self.playing = false;
        self.pending = None;
        self.attempts = 0;
    }

    /// Record an issued prepare request
    pub(crate) fn begin_prepare(&mut self, ticket: Ticket) {
        self.prepared = false;
        self.pending = Some(ticket);
    }

    /// Accept a prepare result if it answers the outstanding request
    pub(crate) fn take_pending(&mut self, ticket: Ticket) -> bool {
        if self.pending == Some(ticket) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_prepared(&mut self) {
        self.prepared = true;
        self.attempts = 0;
    }

    /// Count a failed attempt; returns the total so far
    pub(crate) fn record_failure(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub(crate) fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}
