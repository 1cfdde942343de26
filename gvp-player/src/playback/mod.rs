//! Clip scheduling: shuffle order, the dual-buffer core and the scene timeline

pub mod buffer;
pub mod core;
pub mod shuffle;
pub mod timeline;

pub use self::core::{CorePhase, CoreSettings, PlaybackCore, PlaybackCoreState, PlaybackDiagnostics};
pub use buffer::PlaybackBuffer;
pub use shuffle::ShuffleSequencer;
pub use timeline::{SceneTimelineDriver, SceneTimelineState, TickOutcome};
