// Five-step assessment wizard: step descriptors, question catalog, gating rules
// and the state machine that ties them together.

pub mod machine;
pub mod questions;
pub mod steps;
pub mod validation;

pub use machine::{AdvanceOutcome, QuizSubmitter, Wizard};
