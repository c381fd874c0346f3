//! Duration/switch-count arithmetic shared by live preview and every exporter.

use crate::fonts::pool::FontPool;
use crate::fonts::sequence::FontSequence;

/// Lower bound on the switch interval; bounds the worst-case redraw rate.
pub const MIN_MS_PER_SWITCH: u64 = 10;

/// Fixed per-switch interval derived from a duration and a switch count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingModel {
    duration_ms: u64,
    ms_per_switch: u64,
}

impl TimingModel {
    /// `ms_per_switch = max(10, floor(duration_ms / switch_count))`.
    ///
    /// Switch counts below 2 count as 2.
    pub fn new(duration_ms: u64, switch_count: u32) -> Self {
        let divisor = u64::from(switch_count.max(2));
        Self {
            duration_ms,
            ms_per_switch: (duration_ms / divisor).max(MIN_MS_PER_SWITCH),
        }
    }

    pub fn duration_ms(self) -> u64 {
        self.duration_ms
    }

    pub fn ms_per_switch(self) -> u64 {
        self.ms_per_switch
    }

    /// `floor(elapsed / ms_per_switch) mod len`. Valid for any elapsed time, including past
    /// the end of the animation; negative or non-finite input counts as zero.
    pub fn active_index(self, elapsed_ms: f64, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let elapsed = if elapsed_ms.is_finite() {
            elapsed_ms.max(0.0)
        } else {
            0.0
        };
        let step = (elapsed / self.ms_per_switch as f64).floor() as u64;
        (step % len as u64) as usize
    }

    /// Number of switch steps that fit in one pass of the animation.
    pub fn steps_in_duration(self) -> u64 {
        self.duration_ms / self.ms_per_switch
    }
}

/// Font sequence plus timing: everything needed to answer "which font is showing at t".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timeline {
    sequence: FontSequence,
    timing: TimingModel,
}

impl Timeline {
    /// Sequence from `pool`'s effective (padded) entries, timed over `duration_ms`.
    pub fn new(pool: &FontPool, duration_ms: u64, switch_count: u32) -> Self {
        Self {
            sequence: FontSequence::generate(pool, switch_count),
            timing: TimingModel::new(duration_ms, switch_count),
        }
    }

    pub fn sequence(&self) -> &FontSequence {
        &self.sequence
    }

    pub fn timing(&self) -> TimingModel {
        self.timing
    }

    pub fn active_index(&self, elapsed_ms: f64) -> usize {
        self.timing.active_index(elapsed_ms, self.sequence.len())
    }

    /// Active index and its font name at `elapsed_ms`.
    pub fn font_at(&self, elapsed_ms: f64) -> (usize, &str) {
        let idx = self.active_index(elapsed_ms);
        (idx, self.sequence.get(idx).unwrap_or_default())
    }
}
