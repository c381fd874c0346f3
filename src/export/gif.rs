use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::config::AnimationConfig;
use crate::export::job::{ExportCoordinator, ExportGuard};
use crate::export::palette::{DEFAULT_PALETTE_SIZE, Palette};
use crate::export::{Artifact, ExportKind};
use crate::fonts::loader::FontLoader;
use crate::fonts::pool::FontPool;
use crate::foundation::error::{TypeCutError, TypeCutResult};
use crate::render::renderer::DEFAULT_ALPHA_CUTOFF;
use crate::render::{EdgeMode, Frame, FrameRenderer, Surface};
use crate::timing::Timeline;

/// Fonts warmed up before the first frame is drawn.
const PREFETCH_LIMIT: usize = 32;

/// Offline export knobs. Defaults: 50 ms frames, 2x render, 16 colors, cutoff 128.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GifOptions {
    /// Offline frame interval; also the per-frame delay.
    pub interval_ms: u64,
    /// Integer render scale applied to canvas and font size.
    pub upscale: u32,
    pub palette_size: usize,
    pub alpha_cutoff: u8,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            interval_ms: 50,
            upscale: 2,
            palette_size: DEFAULT_PALETTE_SIZE,
            alpha_cutoff: DEFAULT_ALPHA_CUTOFF,
        }
    }
}

impl GifOptions {
    /// Reject intervals the container cannot store and render scales outside 1..=8.
    pub fn validate(&self) -> TypeCutResult<()> {
        // GIF delays are centiseconds stored in a u16.
        if !(10..=655_350).contains(&self.interval_ms) {
            return Err(TypeCutError::validation(format!(
                "gif frame interval must be in 10..=655350 ms (got {})",
                self.interval_ms
            )));
        }
        if !(1..=8).contains(&self.upscale) {
            return Err(TypeCutError::validation(format!(
                "gif upscale must be in 1..=8 (got {})",
                self.upscale
            )));
        }
        Ok(())
    }

    /// `ceil(duration / interval)`, at least one frame.
    pub fn frame_count(&self, duration_ms: u64) -> u64 {
        duration_ms.div_ceil(self.interval_ms.max(1)).max(1)
    }

    /// Per-frame delay in the container's centisecond unit.
    pub fn delay_cs(&self) -> u16 {
        ((self.interval_ms + 5) / 10).clamp(1, u64::from(u16::MAX)) as u16
    }
}

/// Offline frame-batch GIF export on a dedicated offscreen surface.
pub struct GifEncoder {
    loader: Arc<FontLoader>,
    opts: GifOptions,
}

impl GifEncoder {
    /// Encoder with [`GifOptions::default`]. Each font may wait up to `loader`'s full budget.
    pub fn new(loader: Arc<FontLoader>) -> Self {
        Self {
            loader,
            opts: GifOptions::default(),
        }
    }

    pub fn with_options(mut self, opts: GifOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn options(&self) -> &GifOptions {
        &self.opts
    }

    /// Render, quantize and write the whole animation. Progress runs capture 0-50,
    /// palette 50-60, writing 60-95 and finalize 95-100.
    #[tracing::instrument(skip_all, fields(duration_ms = cfg.duration_ms, switches = cfg.switch_count))]
    pub fn encode(
        &self,
        coordinator: &ExportCoordinator,
        cfg: &AnimationConfig,
        pool: &FontPool,
    ) -> TypeCutResult<Artifact> {
        let guard = coordinator.begin(ExportKind::Gif)?;
        let bytes = self.run(&guard, cfg, pool);
        guard.complete(bytes.map(|b| Artifact::new(ExportKind::Gif, &cfg.text, b)))
    }

    fn run(
        &self,
        guard: &ExportGuard,
        cfg: &AnimationConfig,
        pool: &FontPool,
    ) -> TypeCutResult<Vec<u8>> {
        self.opts.validate()?;
        cfg.validate()?;

        let timeline = Timeline::new(pool, cfg.duration_ms, cfg.switch_count);
        let unique = timeline.sequence().unique();
        self.loader
            .prefetch(&unique[..unique.len().min(PREFETCH_LIMIT)]);

        let captured = self.capture(guard, cfg, &timeline)?;

        let first = captured
            .order
            .first()
            .and_then(|slot| captured.frames.get(*slot))
            .ok_or_else(|| TypeCutError::encode(ExportKind::Gif, "no frames captured"))?;
        let palette = Palette::from_frame(
            first,
            self.opts.palette_size,
            cfg.transparent_background,
            self.opts.alpha_cutoff,
        )?;
        guard.progress(60);
        tracing::debug!(colors = palette.len(), "gif palette built");

        let indexed: Vec<Vec<u8>> = captured
            .frames
            .par_iter()
            .map(|frame| palette.index_frame(frame))
            .collect();
        let (width, height) = (first.width, first.height);
        drop(captured.frames);

        let bytes = self.write(guard, &palette, width, height, &captured.order, &indexed)?;
        guard.progress(100);
        tracing::info!(
            frames = captured.order.len(),
            distinct = indexed.len(),
            bytes = bytes.len(),
            "gif export finished"
        );
        Ok(bytes)
    }

    /// Frames with the same active index are pixel-identical, so each index is drawn once and
    /// the frame order refers back to it.
    fn capture(
        &self,
        guard: &ExportGuard,
        cfg: &AnimationConfig,
        timeline: &Timeline,
    ) -> TypeCutResult<Captured> {
        let scaled = cfg.upscaled(self.opts.upscale);
        let mut surface = Surface::new(scaled.canvas)?;
        let mut renderer = FrameRenderer::new(Arc::clone(&self.loader)).with_edge_mode(
            EdgeMode::Hard {
                alpha_cutoff: self.opts.alpha_cutoff,
            },
        );

        let count = self.opts.frame_count(cfg.duration_ms);
        let mut frames: Vec<Frame> = Vec::new();
        let mut slot_of: HashMap<usize, usize> = HashMap::new();
        let mut order = Vec::with_capacity(count as usize);

        for i in 0..count {
            let elapsed = (i * self.opts.interval_ms) as f64;
            let (index, font) = timeline.font_at(elapsed);
            let slot = match slot_of.get(&index) {
                Some(slot) => *slot,
                None => {
                    let frame = renderer.render_frame(&scaled, font, &mut surface)?;
                    frames.push(frame);
                    slot_of.insert(index, frames.len() - 1);
                    frames.len() - 1
                }
            };
            order.push(slot);
            guard.progress_in(0, 50, (i + 1) as f64 / count as f64);
            if i % 8 == 7 {
                std::thread::yield_now();
            }
        }
        tracing::debug!(frames = count, distinct = frames.len(), "gif frames captured");
        Ok(Captured { frames, order })
    }

    fn write(
        &self,
        guard: &ExportGuard,
        palette: &Palette,
        width: u32,
        height: u32,
        order: &[usize],
        indexed: &[Vec<u8>],
    ) -> TypeCutResult<Vec<u8>> {
        let w: u16 = width
            .try_into()
            .map_err(|_| TypeCutError::encode(ExportKind::Gif, "frame width exceeds u16"))?;
        let h: u16 = height
            .try_into()
            .map_err(|_| TypeCutError::encode(ExportKind::Gif, "frame height exceeds u16"))?;

        let table = palette.rgb_table();
        let mut encoder = gif::Encoder::new(Vec::new(), w, h, &table).map_err(gif_error)?;
        encoder
            .set_repeat(gif::Repeat::Infinite)
            .map_err(gif_error)?;

        let delay = self.opts.delay_cs();
        let total = order.len().max(1);
        for (i, slot) in order.iter().enumerate() {
            let pixels = indexed.get(*slot).ok_or_else(|| {
                TypeCutError::encode(ExportKind::Gif, format!("missing indexed frame {slot}"))
            })?;
            let frame = gif::Frame {
                width: w,
                height: h,
                buffer: Cow::Borrowed(pixels.as_slice()),
                delay,
                dispose: gif::DisposalMethod::Background,
                transparent: palette.transparent_index(),
                ..gif::Frame::default()
            };
            encoder.write_frame(&frame).map_err(gif_error)?;
            guard.progress_in(60, 95, (i + 1) as f64 / total as f64);
            if i % 8 == 7 {
                std::thread::yield_now();
            }
        }

        encoder
            .into_inner()
            .map_err(|e| TypeCutError::encode(ExportKind::Gif, format!("finalize failed: {e}")))
    }
}

struct Captured {
    /// Distinct rendered frames.
    frames: Vec<Frame>,
    /// Output frame -> slot in `frames`.
    order: Vec<usize>,
}

fn gif_error(e: gif::EncodingError) -> TypeCutError {
    TypeCutError::encode(ExportKind::Gif, e.to_string())
}
