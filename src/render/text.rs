use std::collections::HashMap;

use crate::fonts::resolver::ResolvedFont;
use crate::foundation::error::{TypeCutError, TypeCutResult};

/// RGBA8 brush color carried through Parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TextBrushRgba8 {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

/// Font bytes registered once with Parley, plus the raster handle `vello_cpu` draws with.
#[derive(Clone)]
struct PreparedFace {
    family_name: String,
    data: vello_cpu::peniko::FontData,
}

/// Laid-out line of text ready to be rasterized.
pub(crate) struct ShapedText {
    pub(crate) layout: parley::Layout<TextBrushRgba8>,
    pub(crate) font: vello_cpu::peniko::FontData,
}

impl ShapedText {
    pub(crate) fn width(&self) -> f32 {
        self.layout.width()
    }

    pub(crate) fn height(&self) -> f32 {
        self.layout.height()
    }
}

/// Stateful helper for building Parley layouts from resolved font bytes.
pub(crate) struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    faces: HashMap<String, PreparedFace>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub(crate) fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            faces: HashMap::new(),
        }
    }

    fn prepare(&mut self, font: &ResolvedFont) -> TypeCutResult<PreparedFace> {
        if let Some(face) = self.faces.get(&font.family) {
            return Ok(face.clone());
        }

        let bytes: Vec<u8> = font.bytes.as_ref().clone();
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            TypeCutError::font(format!("no font families registered for '{}'", font.family))
        })?;
        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| TypeCutError::font("registered font family has no name"))?
            .to_string();

        let face = PreparedFace {
            family_name,
            data: vello_cpu::peniko::FontData::new(
                vello_cpu::peniko::Blob::from(bytes),
                font.index,
            ),
        };
        self.faces.insert(font.family.clone(), face.clone());
        Ok(face)
    }

    /// Shape `text` as a single unwrapped line.
    pub(crate) fn shape(
        &mut self,
        text: &str,
        font: &ResolvedFont,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> TypeCutResult<ShapedText> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(TypeCutError::validation(
                "text size_px must be finite and > 0",
            ));
        }
        let face = self.prepare(font)?;

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(face.family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);

        Ok(ShapedText {
            layout,
            font: face.data,
        })
    }
}

/// Emit every glyph run of `shaped` into `ctx` at the current transform.
pub(crate) fn draw_glyphs(ctx: &mut vello_cpu::RenderContext, shaped: &ShapedText) {
    for line in shaped.layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let brush = run.style().brush;
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                brush.r, brush.g, brush.b, brush.a,
            ));
            // `glyphs()` is offsets within a cluster; the positioned form carries pen and baseline.
            let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(&shaped.font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
}
