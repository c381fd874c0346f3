//! Shared GIF palette: built once from a representative frame, reused for every frame.

use std::collections::HashMap;

use crate::foundation::error::{TypeCutError, TypeCutResult};
use crate::render::Frame;

pub const DEFAULT_PALETTE_SIZE: usize = 16;
pub const MAX_PALETTE_SIZE: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    /// Opaque entries; when `transparent` is set they start at index 1.
    colors: Vec<[u8; 3]>,
    transparent: bool,
    alpha_cutoff: u8,
}

impl Palette {
    /// Build from `frame`, keeping at most `max_colors` entries (transparent slot included).
    pub fn from_frame(
        frame: &Frame,
        max_colors: usize,
        transparent: bool,
        alpha_cutoff: u8,
    ) -> TypeCutResult<Self> {
        if !(2..=MAX_PALETTE_SIZE).contains(&max_colors) {
            return Err(TypeCutError::validation(format!(
                "palette size must be in 2..={MAX_PALETTE_SIZE} (got {max_colors})"
            )));
        }
        let alpha_cutoff = alpha_cutoff.max(1);
        let slots = max_colors - usize::from(transparent);

        let mut histogram: HashMap<[u8; 3], u32> = HashMap::new();
        for px in frame.to_straight_rgba().chunks_exact(4) {
            if transparent && px[3] < alpha_cutoff {
                continue;
            }
            *histogram.entry([px[0], px[1], px[2]]).or_default() += 1;
        }
        let mut entries: Vec<([u8; 3], u32)> = histogram.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut colors: Vec<[u8; 3]> = if entries.len() <= slots {
            entries.into_iter().map(|(c, _)| c).collect()
        } else {
            median_cut(entries, slots)
        };
        if colors.is_empty() {
            colors.push([0, 0, 0]);
        }
        tracing::debug!(colors = colors.len(), transparent, "palette built");

        Ok(Self {
            colors,
            transparent,
            alpha_cutoff,
        })
    }

    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    pub fn transparent_index(&self) -> Option<u8> {
        self.transparent.then_some(0)
    }

    /// Indices in use, transparent slot included.
    pub fn len(&self) -> usize {
        self.colors.len() + usize::from(self.transparent)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat RGB table padded to a power-of-two entry count, as GIF color tables require.
    pub fn rgb_table(&self) -> Vec<u8> {
        let entries = self.len().max(2).next_power_of_two();
        let mut table = Vec::with_capacity(entries * 3);
        if self.transparent {
            table.extend_from_slice(&[0, 0, 0]);
        }
        for c in &self.colors {
            table.extend_from_slice(c);
        }
        table.resize(entries * 3, 0);
        table
    }

    /// Map every pixel to a palette index. Alpha is binary: below the cutoff is transparent.
    pub fn index_frame(&self, frame: &Frame) -> Vec<u8> {
        let offset = u8::from(self.transparent);
        let mut cache: HashMap<[u8; 3], u8> = HashMap::new();
        frame
            .to_straight_rgba()
            .chunks_exact(4)
            .map(|px| {
                if self.transparent && px[3] < self.alpha_cutoff {
                    return 0;
                }
                let rgb = [px[0], px[1], px[2]];
                *cache
                    .entry(rgb)
                    .or_insert_with(|| offset + self.nearest(rgb))
            })
            .collect()
    }

    fn nearest(&self, rgb: [u8; 3]) -> u8 {
        let mut best = (0usize, u32::MAX);
        for (i, c) in self.colors.iter().enumerate() {
            let d = distance2(*c, rgb);
            if d < best.1 {
                best = (i, d);
                if d == 0 {
                    break;
                }
            }
        }
        best.0 as u8
    }
}

fn distance2(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = i32::from(x) - i32::from(y);
            (d * d) as u32
        })
        .sum()
}

struct ColorBox {
    entries: Vec<([u8; 3], u32)>,
}

impl ColorBox {
    /// Widest channel and its extent.
    fn widest(&self) -> (usize, u8) {
        (0..3)
            .map(|ch| {
                let (lo, hi) = self
                    .entries
                    .iter()
                    .fold((u8::MAX, u8::MIN), |(lo, hi), (c, _)| {
                        (lo.min(c[ch]), hi.max(c[ch]))
                    });
                (ch, hi.saturating_sub(lo))
            })
            .max_by_key(|&(ch, range)| (range, std::cmp::Reverse(ch)))
            .unwrap_or((0, 0))
    }

    fn split(mut self) -> (ColorBox, ColorBox) {
        let (ch, _) = self.widest();
        self.entries.sort_by_key(|(c, _)| (c[ch], *c));
        let total: u64 = self.entries.iter().map(|(_, n)| u64::from(*n)).sum();
        let mut acc = 0u64;
        let mut cut = self.entries.len() / 2;
        for (i, (_, n)) in self.entries.iter().enumerate() {
            acc += u64::from(*n);
            if acc * 2 >= total {
                cut = i + 1;
                break;
            }
        }
        let cut = cut.clamp(1, self.entries.len() - 1);
        let rest = self.entries.split_off(cut);
        (self, ColorBox { entries: rest })
    }

    fn average(&self) -> [u8; 3] {
        let mut sum = [0u64; 3];
        let mut weight = 0u64;
        for (c, n) in &self.entries {
            for ch in 0..3 {
                sum[ch] += u64::from(c[ch]) * u64::from(*n);
            }
            weight += u64::from(*n);
        }
        let weight = weight.max(1);
        [
            ((sum[0] + weight / 2) / weight) as u8,
            ((sum[1] + weight / 2) / weight) as u8,
            ((sum[2] + weight / 2) / weight) as u8,
        ]
    }
}

fn median_cut(mut entries: Vec<([u8; 3], u32)>, slots: usize) -> Vec<[u8; 3]> {
    entries.sort_by_key(|(c, _)| *c);
    let mut boxes = vec![ColorBox { entries }];
    while boxes.len() < slots {
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.entries.len() >= 2)
            .max_by_key(|(i, b)| (b.widest().1, std::cmp::Reverse(*i)))
            .map(|(i, _)| i);
        let Some(i) = candidate else { break };
        let (a, b) = boxes.swap_remove(i).split();
        boxes.push(a);
        boxes.push(b);
    }
    let mut colors: Vec<[u8; 3]> = boxes.iter().map(ColorBox::average).collect();
    colors.sort();
    colors.dedup();
    colors
}
