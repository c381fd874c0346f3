//! CPU frame rendering on `vello_cpu` with Parley text layout.

pub mod renderer;
pub mod surface;
pub(crate) mod text;

pub use renderer::{EdgeMode, FrameRenderer, RenderOutcome};
pub use surface::{Frame, Surface};
