// Recommendation scoring: pure functions over backend payloads.
// Nothing here performs I/O or holds state.

pub mod ranking;
pub mod resolution;
pub mod skill_gap;

pub use ranking::{rank_matches, RankedMatch};
