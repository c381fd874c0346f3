//! Live preview: redraw scheduling and the play/pause/loop state machine.

pub mod animation_loop;
pub mod scheduler;

pub use animation_loop::{AnimationLoop, PlaybackState, Tick};
pub use scheduler::{QueuedScheduler, RedrawScheduler, RedrawToken};
