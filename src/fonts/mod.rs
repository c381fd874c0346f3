//! Font pool curation, sequence generation and timeout-bounded font resolution.

pub mod loader;
pub mod pool;
pub mod resolver;
pub mod sequence;
