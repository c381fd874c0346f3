#![forbid(unsafe_code)]

//! TypeCut: a font-switching text animation engine.
//!
//! One shared state model ([`AnimationConfig`] + [`FontPool`] -> [`Timeline`]) drives the live
//! preview loop and three exporters (offline GIF, realtime WebM capture, keyframe script), so
//! every output shows the same font at the same elapsed time.

pub mod config;
pub mod export;
pub mod fonts;
pub mod foundation;
pub mod playback;
pub mod render;
pub mod timing;

pub use config::{AnimationConfig, ConfigInput};
pub use export::{
    Artifact, CaptureOptions, ExportCoordinator, ExportGuard, ExportJob, ExportKind,
    ExportStatus, GifEncoder, GifOptions, RealtimeCapture, ScriptOptions, export_script,
    generate_script,
};
pub use fonts::loader::{FALLBACK_CHAIN, FontLoader};
pub use fonts::pool::{CURATED_FONTS, FontPool, normalize_font_name, randomize_pool};
pub use fonts::resolver::{FontDbResolver, FontResolver, ResolvedFont};
pub use fonts::sequence::FontSequence;
pub use foundation::clock::{ClockSource, ManualClock, SystemClock};
pub use foundation::core::{Canvas, FrameIndex, Rgb};
pub use foundation::error::{TypeCutError, TypeCutResult};
pub use playback::{AnimationLoop, PlaybackState, QueuedScheduler, RedrawScheduler, Tick};
pub use render::{EdgeMode, Frame, FrameRenderer, Surface};
pub use timing::{Timeline, TimingModel};
