use crate::foundation::core::FrameIndex;
use crate::foundation::error::{TypeCutError, TypeCutResult};
use crate::render::Frame;

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Keep alpha in the output stream instead of flattening over the background.
    pub keep_alpha: bool,
    /// Straight RGBA8 background used when flattening.
    pub bg_rgba: [u8; 4],
}

/// Streaming consumer of captured frames.
///
/// Ordering contract: `push_frame` is called in strictly increasing `FrameIndex` order.
/// `end` consumes the stream and yields the finished container bytes.
pub trait FrameSink: Send {
    fn begin(&mut self, cfg: SinkConfig) -> TypeCutResult<()>;
    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> TypeCutResult<()>;
    fn end(&mut self) -> TypeCutResult<Vec<u8>>;
}

/// Tracks the ordering contract for sink implementations.
#[derive(Debug, Default)]
pub(crate) struct FrameOrder {
    last: Option<FrameIndex>,
}

impl FrameOrder {
    pub(crate) fn check(&mut self, idx: FrameIndex) -> TypeCutResult<()> {
        if let Some(last) = self.last
            && idx <= last
        {
            return Err(TypeCutError::validation(format!(
                "out-of-order frame index {} after {}",
                idx.0, last.0
            )));
        }
        self.last = Some(idx);
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.last = None;
    }
}

/// In-memory sink for tests; the "container" is the concatenated premultiplied frames.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    order: FrameOrder,
    frames: Vec<(FrameIndex, Frame)>,
    ended: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    pub fn frames(&self) -> &[(FrameIndex, Frame)] {
        &self.frames
    }

    pub fn ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> TypeCutResult<()> {
        self.cfg = Some(cfg);
        self.order.reset();
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> TypeCutResult<()> {
        if self.cfg.is_none() {
            return Err(TypeCutError::validation("sink not started"));
        }
        self.order.check(idx)?;
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> TypeCutResult<Vec<u8>> {
        if self.cfg.is_none() {
            return Err(TypeCutError::validation("sink not started"));
        }
        self.ended = true;
        Ok(self
            .frames
            .iter()
            .flat_map(|(_, f)| f.data.iter().copied())
            .collect())
    }
}
