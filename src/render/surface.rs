use crate::foundation::core::Canvas;
use crate::foundation::error::{TypeCutError, TypeCutResult};

/// A rendered frame as RGBA8 pixels, tagged with the font that was active when it was drawn.
///
/// Pixels are premultiplied alpha, matching `vello_cpu`'s pixmap layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major, premultiplied.
    pub data: Vec<u8>,
    /// Font active in the sequence when the frame was drawn.
    pub font: Option<String>,
}

impl Frame {
    /// Premultiplied RGBA at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Straight-alpha copy for PNG writers and palette lookups.
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        unpremultiply_in_place(&mut out);
        out
    }
}

pub(crate) fn unpremultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// Raster target owned by exactly one user at a time (live loop or one export stage).
pub struct Surface {
    canvas: Canvas,
    pixmap: vello_cpu::Pixmap,
    ctx: Option<vello_cpu::RenderContext>,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface").field("canvas", &self.canvas).finish()
    }
}

impl Surface {
    /// Transparent surface sized to `canvas`.
    pub fn new(canvas: Canvas) -> TypeCutResult<Self> {
        let (w, h) = pixmap_dims(canvas)?;
        Ok(Self {
            canvas,
            pixmap: vello_cpu::Pixmap::new(w, h),
            ctx: None,
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Reallocate if the canvas changed; contents are undefined afterwards.
    pub fn ensure_canvas(&mut self, canvas: Canvas) -> TypeCutResult<()> {
        if canvas != self.canvas {
            *self = Self::new(canvas)?;
        }
        Ok(())
    }

    pub fn pixels(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        self.pixmap.data_as_u8_slice_mut()
    }

    /// Fill every pixel with a premultiplied RGBA8 value.
    pub fn clear(&mut self, rgba_premul: [u8; 4]) {
        if rgba_premul == [0; 4] {
            self.pixels_mut().fill(0);
            return;
        }
        for px in self.pixels_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&rgba_premul);
        }
    }

    /// Copy the current pixels out, tagged with the font they were drawn for.
    pub fn snapshot(&self, font: Option<String>) -> Frame {
        Frame {
            width: self.canvas.width,
            height: self.canvas.height,
            data: self.pixels().to_vec(),
            font,
        }
    }

    /// Run `f` with a reset render context sized to this surface, then rasterize into `dst`.
    pub(crate) fn paint_into(
        &mut self,
        dst: &mut vello_cpu::Pixmap,
        f: impl FnOnce(&mut vello_cpu::RenderContext),
    ) -> TypeCutResult<()> {
        let (w, h) = pixmap_dims(self.canvas)?;
        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == w && ctx.height() == h => ctx,
            _ => vello_cpu::RenderContext::new(w, h),
        };
        ctx.reset();
        f(&mut ctx);
        ctx.flush();
        ctx.render_to_pixmap(dst);
        self.ctx = Some(ctx);
        Ok(())
    }

    /// Rasterize straight onto this surface.
    pub(crate) fn paint(
        &mut self,
        f: impl FnOnce(&mut vello_cpu::RenderContext),
    ) -> TypeCutResult<()> {
        let (w, h) = pixmap_dims(self.canvas)?;
        let mut target = std::mem::replace(&mut self.pixmap, vello_cpu::Pixmap::new(w, h));
        let out = self.paint_into(&mut target, f);
        self.pixmap = target;
        out
    }

    pub(crate) fn scratch_pixmap(&self) -> TypeCutResult<vello_cpu::Pixmap> {
        let (w, h) = pixmap_dims(self.canvas)?;
        Ok(vello_cpu::Pixmap::new(w, h))
    }
}

fn pixmap_dims(canvas: Canvas) -> TypeCutResult<(u16, u16)> {
    let w: u16 = canvas
        .width
        .try_into()
        .map_err(|_| TypeCutError::validation("surface width exceeds u16"))?;
    let h: u16 = canvas
        .height
        .try_into()
        .map_err(|_| TypeCutError::validation("surface height exceeds u16"))?;
    if w == 0 || h == 0 {
        return Err(TypeCutError::validation("surface width/height must be > 0"));
    }
    Ok((w, h))
}
