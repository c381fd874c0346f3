//! Animation configuration: the immutable snapshot renderers consume, and the clamped UI-facing
//! input it is built from.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::fonts::pool::{CURATED_FONTS, FontPool};
use crate::foundation::core::{Canvas, Rgb};
use crate::foundation::error::{TypeCutError, TypeCutResult};

pub const MAX_TEXT_CHARS: usize = 100;
pub const DURATION_SECS_RANGE: (u32, u32) = (1, 10);
pub const SWITCH_COUNT_RANGE: (u32, u32) = (2, 100);
pub const FONT_SIZE_RANGE: (u32, u32) = (48, 240);
pub const DEFAULT_CANVAS: Canvas = Canvas {
    width: 640,
    height: 640,
};

/// Immutable animation snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationConfig {
    pub text: String,
    pub duration_ms: u64,
    pub switch_count: u32,
    pub font_size: u32,
    pub text_color: Rgb,
    pub background_color: Rgb,
    pub transparent_background: bool,
    pub canvas: Canvas,
}

impl AnimationConfig {
    /// Check every field against its allowed range. [`ConfigInput::resolve`] clamps instead.
    pub fn validate(&self) -> TypeCutResult<()> {
        let chars = self.text.chars().count();
        if chars == 0 || chars > MAX_TEXT_CHARS {
            return Err(TypeCutError::validation(format!(
                "text must be 1..={MAX_TEXT_CHARS} characters (got {chars})"
            )));
        }
        if self.duration_ms == 0 {
            return Err(TypeCutError::validation("duration_ms must be > 0"));
        }
        if !(SWITCH_COUNT_RANGE.0..=SWITCH_COUNT_RANGE.1).contains(&self.switch_count) {
            return Err(TypeCutError::validation(format!(
                "switch_count must be in {}..={} (got {})",
                SWITCH_COUNT_RANGE.0, SWITCH_COUNT_RANGE.1, self.switch_count
            )));
        }
        if self.font_size == 0 {
            return Err(TypeCutError::validation("font_size must be > 0"));
        }
        Canvas::new(self.canvas.width, self.canvas.height)?;
        Ok(())
    }

    /// Same animation at `factor`× the pixel resolution.
    pub fn upscaled(&self, factor: u32) -> Self {
        let factor = factor.max(1);
        Self {
            font_size: self.font_size.saturating_mul(factor),
            canvas: self.canvas.scaled(factor),
            ..self.clone()
        }
    }

    /// Premultiplied clear color: fully transparent, or the opaque background.
    pub fn background_rgba(&self) -> [u8; 4] {
        if self.transparent_background {
            [0, 0, 0, 0]
        } else {
            self.background_color.to_rgba8()
        }
    }
}

/// Settings as the UI collaborator hands them over; every field is optional and clamped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigInput {
    pub text: Option<String>,
    pub duration_secs: Option<u32>,
    pub switch_count: Option<u32>,
    pub font_size: Option<u32>,
    pub text_color: Option<String>,
    pub background_color: Option<String>,
    pub transparent_background: Option<bool>,
    pub fonts: Option<Vec<String>>,
    pub canvas_width: Option<u32>,
    pub canvas_height: Option<u32>,
    /// Extra directories scanned for installable font files.
    pub font_dirs: Vec<PathBuf>,
}

impl ConfigInput {
    /// Read a settings file. Unknown fields are rejected.
    pub fn from_json_file(path: &Path) -> TypeCutResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> TypeCutResult<Self> {
        serde_json::from_str(raw).map_err(|e| TypeCutError::serde(e.to_string()))
    }

    /// Fields set in `other` win.
    pub fn merge(mut self, other: ConfigInput) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            text,
            duration_secs,
            switch_count,
            font_size,
            text_color,
            background_color,
            transparent_background,
            fonts,
            canvas_width,
            canvas_height
        );
        self.font_dirs.extend(other.font_dirs);
        self
    }

    /// Clamp ranges, cap the text, parse colors, and build the pool.
    pub fn resolve(&self) -> TypeCutResult<(AnimationConfig, FontPool)> {
        let text: String = self
            .text
            .as_deref()
            .unwrap_or("TypeCut")
            .chars()
            .take(MAX_TEXT_CHARS)
            .collect();
        if text.trim().is_empty() {
            return Err(TypeCutError::validation("text must not be empty"));
        }

        let clamp = |v: Option<u32>, default: u32, (lo, hi): (u32, u32)| {
            v.unwrap_or(default).clamp(lo, hi)
        };
        let duration_secs = clamp(self.duration_secs, 3, DURATION_SECS_RANGE);
        let switch_count = clamp(self.switch_count, 20, SWITCH_COUNT_RANGE);
        let font_size = clamp(self.font_size, 80, FONT_SIZE_RANGE);

        let text_color = Rgb::from_hex(self.text_color.as_deref().unwrap_or("#111111"))?;
        let background_color =
            Rgb::from_hex(self.background_color.as_deref().unwrap_or("#ffffff"))?;

        let canvas = Canvas::new(
            self.canvas_width.unwrap_or(DEFAULT_CANVAS.width),
            self.canvas_height.unwrap_or(DEFAULT_CANVAS.height),
        )?;

        let pool = match &self.fonts {
            Some(fonts) => FontPool::new(fonts),
            None => FontPool::new(CURATED_FONTS.iter().take(5)),
        };

        let cfg = AnimationConfig {
            text,
            duration_ms: u64::from(duration_secs) * 1000,
            switch_count,
            font_size,
            text_color,
            background_color,
            transparent_background: self.transparent_background.unwrap_or(true),
            canvas,
        };
        cfg.validate()?;
        Ok((cfg, pool))
    }
}
