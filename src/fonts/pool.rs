use crate::fonts::loader::FontLoader;
use crate::foundation::error::{TypeCutError, TypeCutResult};

/// Built-in curated families, used to pad short pools and as randomize candidates.
pub const CURATED_FONTS: &[&str] = &[
    "Inter",
    "Roboto",
    "Poppins",
    "Oswald",
    "Merriweather",
    "Montserrat",
    "Space Grotesk",
    "JetBrains Mono",
    "Lora",
    "Work Sans",
];

/// Upper bound on user-selected fonts.
pub const MAX_SELECTED_FONTS: usize = 50;

const RANDOMIZE_LIMIT: usize = 8;
const MIN_POOL: usize = 2;

/// Trim and collapse internal whitespace runs to a single space.
pub fn normalize_font_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ordered set of distinct font family names selected by the user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FontPool {
    names: Vec<String>,
}

impl FontPool {
    /// Normalize, drop empties, de-duplicate keeping first occurrence.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pool = Self::default();
        for name in names {
            pool.add(name.as_ref());
        }
        pool
    }

    /// Entries in display (and cycling) order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Append `name` after normalizing it.
    ///
    /// Returns `false` and leaves the pool unchanged when the name is empty or already present,
    /// or when the pool holds [`MAX_SELECTED_FONTS`] entries.
    pub fn add(&mut self, name: &str) -> bool {
        let name = normalize_font_name(name);
        if name.is_empty() || self.names.len() >= MAX_SELECTED_FONTS || self.names.contains(&name)
        {
            return false;
        }
        self.names.push(name);
        true
    }

    /// Remove and return the entry at `index`; `None` if out of range.
    pub fn remove(&mut self, index: usize) -> Option<String> {
        (index < self.names.len()).then(|| self.names.remove(index))
    }

    /// Move the entry at `from` so it ends up at `to` (drag-reorder). Out-of-range indices
    /// are ignored.
    pub fn reorder(&mut self, from: usize, to: usize) {
        if from == to || from >= self.names.len() || to >= self.names.len() {
            return;
        }
        let moved = self.names.remove(from);
        self.names.insert(to, moved);
    }

    /// Remove every entry. [`FontPool::effective`] still yields the curated padding.
    pub fn clear(&mut self) {
        self.names.clear();
    }

    /// The pool the sequence generator actually cycles through: at least two entries, padded
    /// from [`CURATED_FONTS`] in order, user entries first.
    pub fn effective(&self) -> Vec<String> {
        let mut out = self.names.clone();
        for curated in CURATED_FONTS {
            if out.len() >= MIN_POOL {
                break;
            }
            if !out.iter().any(|n| n == curated) {
                out.push((*curated).to_owned());
            }
        }
        out
    }
}

/// Deterministic shuffle source (SplitMix64).
#[derive(Clone, Debug)]
pub struct ShuffleRng {
    state: u64,
}

impl ShuffleRng {
    /// Same seed, same shuffles.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }

    /// Fisher-Yates.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i + 1);
            items.swap(i, j);
        }
    }
}

/// Build a fresh random pool from the curated list plus `extra` candidates (local and system
/// families), keeping only fonts the loader can verify.
///
/// Every verified curated name is already a candidate, so padding could only add fonts that
/// failed verification. Fewer than two usable fonts is therefore a [`TypeCutError::Font`].
pub fn randomize_pool<S: AsRef<str>>(
    extra: &[S],
    loader: &FontLoader,
    rng: &mut ShuffleRng,
) -> TypeCutResult<FontPool> {
    let candidates = FontPool::new(
        CURATED_FONTS
            .iter()
            .copied()
            .chain(extra.iter().map(|s| s.as_ref())),
    );
    let mut verified = loader.verify_usable(candidates.names());
    if verified.len() < MIN_POOL {
        return Err(TypeCutError::font(format!(
            "only {} of {} candidate fonts are usable; need at least {MIN_POOL}",
            verified.len(),
            candidates.len()
        )));
    }
    rng.shuffle(&mut verified);
    verified.truncate(RANDOMIZE_LIMIT);

    let pool = FontPool::new(&verified);
    tracing::debug!(fonts = ?pool.names(), "randomized font pool");
    Ok(pool)
}

#[cfg(test)]
#[path = "../../tests/unit/fonts/pool.rs"]
mod tests;
