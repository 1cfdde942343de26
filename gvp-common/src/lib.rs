//! # GVP Common Library
//!
//! Shared code for the generative video installation:
//! - Scene descriptions (loading and validation)
//! - Event types (InstallationEvent enum) and the event bus
//! - Configuration loading
//! - Fade curve definitions
//! - Real-time clock and deadlines

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod scene;
pub mod time;

pub use error::{Error, Result};
pub use events::{BufferId, EventBus, InstallationEvent};
pub use fade_curves::FadeCurve;
pub use scene::{SceneDescriptor, SceneSet};
