use crate::fonts::pool::FontPool;

/// Fixed-length font timeline: `names[i] == pool[i mod pool.len()]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontSequence {
    names: Vec<String>,
}

impl FontSequence {
    /// Cycle the effective pool (padded to at least two entries) `switch_count` times.
    pub fn generate(pool: &FontPool, switch_count: u32) -> Self {
        Self::from_effective(&pool.effective(), switch_count)
    }

    /// Cycle an already-effective pool. `effective` must not be empty.
    pub fn from_effective(effective: &[String], switch_count: u32) -> Self {
        if effective.is_empty() {
            return Self { names: Vec::new() };
        }
        let names = (0..switch_count as usize)
            .map(|i| effective[i % effective.len()].clone())
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Font shown at step `index` of an arbitrarily long run, wrapping around the sequence.
    pub fn cyclic(&self, index: u64) -> Option<&str> {
        if self.names.is_empty() {
            return None;
        }
        let i = (index % self.names.len() as u64) as usize;
        Some(self.names[i].as_str())
    }

    /// Distinct names in first-appearance order.
    pub fn unique(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for n in &self.names {
            if !out.contains(&n.as_str()) {
                out.push(n);
            }
        }
        out
    }
}
