use crate::foundation::error::{TypeCutError, TypeCutResult};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    /// Both dimensions must be non-zero.
    pub fn new(width: u32, height: u32) -> TypeCutResult<Self> {
        if width == 0 || height == 0 {
            return Err(TypeCutError::validation("canvas width/height must be > 0"));
        }
        Ok(Self { width, height })
    }

    pub fn scaled(self, factor: u32) -> Self {
        Self {
            width: self.width.saturating_mul(factor),
            height: self.height.saturating_mul(factor),
        }
    }
}

/// Opaque 8-bit RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `#rgb` (the leading `#` is optional).
    pub fn from_hex(s: &str) -> TypeCutResult<Self> {
        let raw = s.trim();
        let hex = raw.strip_prefix('#').unwrap_or(raw);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeCutError::validation(format!(
                "invalid hex color '{raw}'"
            )));
        }

        let channel = |digits: &str| -> TypeCutResult<u8> {
            u8::from_str_radix(digits, 16)
                .map_err(|e| TypeCutError::validation(format!("invalid hex color '{raw}': {e}")))
        };

        match hex.len() {
            6 => Ok(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                Ok(Self::new(expand(0)?, expand(1)?, expand(2)?))
            }
            _ => Err(TypeCutError::validation(format!(
                "hex color '{raw}' must have 3 or 6 digits"
            ))),
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl serde::Serialize for Rgb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Rgb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rgb::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

pub(crate) fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}
