use std::sync::Arc;
use std::time::Duration;

use crate::config::AnimationConfig;
use crate::fonts::loader::{FALLBACK_CHAIN, FontLoader};
use crate::fonts::pool::normalize_font_name;
use crate::foundation::error::TypeCutResult;
use crate::render::surface::{Frame, Surface};
use crate::render::text::{ShapedText, TextBrushRgba8, TextLayoutEngine, draw_glyphs};

pub const DEFAULT_ALPHA_CUTOFF: u8 = 128;

/// How glyph coverage reaches the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeMode {
    /// Anti-aliased glyphs composited over the background.
    Smooth,
    /// Coverage thresholded at `alpha_cutoff`: every pixel is exactly text color or background.
    Hard { alpha_cutoff: u8 },
}

impl EdgeMode {
    pub fn hard() -> Self {
        Self::Hard {
            alpha_cutoff: DEFAULT_ALPHA_CUTOFF,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Family the glyphs were drawn with; `None` if not even the fallback chain resolved.
    pub font_used: Option<String>,
    pub fell_back: bool,
}

/// Draws one frame: background, then the configured text centered in the requested font.
///
/// Font problems never fail a render; they degrade to the fallback chain, and ultimately to a
/// background-only frame.
pub struct FrameRenderer {
    loader: Arc<FontLoader>,
    font_wait: Duration,
    edge: EdgeMode,
    engine: TextLayoutEngine,
}

impl FrameRenderer {
    /// Smooth edges; the requested font may wait up to the loader's full budget.
    pub fn new(loader: Arc<FontLoader>) -> Self {
        let font_wait = loader.timeout();
        Self {
            loader,
            font_wait,
            edge: EdgeMode::Smooth,
            engine: TextLayoutEngine::new(),
        }
    }

    pub fn with_edge_mode(mut self, edge: EdgeMode) -> Self {
        self.edge = edge;
        self
    }

    /// How long a frame may wait on the requested font. Live preview uses zero.
    pub fn with_font_wait(mut self, wait: Duration) -> Self {
        self.font_wait = wait;
        self
    }

    pub fn edge_mode(&self) -> EdgeMode {
        self.edge
    }

    pub fn loader(&self) -> &Arc<FontLoader> {
        &self.loader
    }

    /// Clear `surface` and draw `cfg.text` in `font`, centered on whole pixels.
    ///
    /// Errors only on surface problems; an unresolvable font yields a background-only frame.
    pub fn render(
        &mut self,
        cfg: &AnimationConfig,
        font: &str,
        surface: &mut Surface,
    ) -> TypeCutResult<RenderOutcome> {
        surface.ensure_canvas(cfg.canvas)?;
        let bg = cfg.background_rgba();
        surface.clear(bg);

        let Some((shaped, used)) = self.shape_with_fallback(cfg, font) else {
            tracing::warn!(font, "no usable font in fallback chain; drawing background only");
            return Ok(RenderOutcome {
                font_used: None,
                fell_back: true,
            });
        };

        let canvas = surface.canvas();
        let x = ((canvas.width as f32 - shaped.width()) / 2.0).round();
        let y = ((canvas.height as f32 - shaped.height()) / 2.0).round();
        let origin = vello_cpu::kurbo::Affine::translate((f64::from(x), f64::from(y)));

        match self.edge {
            EdgeMode::Smooth => surface.paint(|ctx| {
                if !cfg.transparent_background {
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(bg[0], bg[1], bg[2], 255));
                    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                        0.0,
                        0.0,
                        f64::from(canvas.width),
                        f64::from(canvas.height),
                    ));
                }
                ctx.set_transform(origin);
                draw_glyphs(ctx, &shaped);
            })?,
            EdgeMode::Hard { alpha_cutoff } => {
                let mut coverage = surface.scratch_pixmap()?;
                surface.paint_into(&mut coverage, |ctx| {
                    ctx.set_transform(origin);
                    draw_glyphs(ctx, &shaped);
                })?;
                let ink = cfg.text_color.to_rgba8();
                threshold_onto(
                    surface.pixels_mut(),
                    coverage.data_as_u8_slice(),
                    ink,
                    bg,
                    alpha_cutoff,
                );
            }
        }

        let fell_back = used != normalize_font_name(font);
        if fell_back {
            tracing::debug!(requested = font, used = %used, "rendered with fallback font");
        }
        Ok(RenderOutcome {
            font_used: Some(used),
            fell_back,
        })
    }

    /// Render and copy the surface out as a [`Frame`] tagged with the requested font.
    pub fn render_frame(
        &mut self,
        cfg: &AnimationConfig,
        font: &str,
        surface: &mut Surface,
    ) -> TypeCutResult<Frame> {
        self.render(cfg, font, surface)?;
        Ok(surface.snapshot(Some(normalize_font_name(font))))
    }

    fn shape_with_fallback(
        &mut self,
        cfg: &AnimationConfig,
        font: &str,
    ) -> Option<(ShapedText, String)> {
        let brush = TextBrushRgba8 {
            r: cfg.text_color.r,
            g: cfg.text_color.g,
            b: cfg.text_color.b,
            a: 255,
        };
        let size = cfg.font_size as f32;

        let loader = Arc::clone(&self.loader);
        let budget = loader.timeout();
        let requested = loader.resolve(font, self.font_wait);
        let mut fallbacks = FALLBACK_CHAIN.iter();

        let mut next = requested;
        loop {
            let resolved = match next.take() {
                Some(resolved) => resolved,
                None => {
                    let name = fallbacks.next()?;
                    match loader.resolve(name, budget) {
                        Some(resolved) => resolved,
                        None => continue,
                    }
                }
            };
            match self.engine.shape(&cfg.text, &resolved, size, brush) {
                Ok(shaped) => return Some((shaped, resolved.family)),
                Err(e) => {
                    tracing::warn!(
                        family = %resolved.family,
                        error = %e,
                        "font could not be shaped"
                    );
                }
            }
        }
    }
}

/// Write `ink` where coverage alpha reaches `cutoff`, `bg` elsewhere. No partial alpha survives.
fn threshold_onto(dst: &mut [u8], coverage: &[u8], ink: [u8; 4], bg: [u8; 4], cutoff: u8) {
    let cutoff = cutoff.max(1);
    for (px, cov) in dst.chunks_exact_mut(4).zip(coverage.chunks_exact(4)) {
        if cov[3] >= cutoff {
            px.copy_from_slice(&ink);
        } else {
            px.copy_from_slice(&bg);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/renderer.rs"]
mod tests;
