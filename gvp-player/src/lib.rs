//! # Gallery Video Player (gvp-player)
//!
//! Unattended multi-scene video installation scheduler.
//!
//! **Purpose:** Play an endlessly shuffled sequence of clips per scene on a
//! two-buffer swap rig, timed against a fixed scene length, a soundtrack cue
//! and a fade transition, then advance to the next scene.
//!
//! **Architecture:** Single-threaded tick loop. The decoder, render surfaces,
//! fader and soundtrack service are host seams behind traits; the rehearsal
//! backend in [`sim`] drives the whole scheduler headless.

pub mod catalog;
pub mod error;
pub mod media;
pub mod playback;
pub mod runner;
pub mod sim;
pub mod soundtrack;
pub mod transition;

pub use error::{Error, Result};
