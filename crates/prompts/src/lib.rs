//! Prompt construction for every workflow stage.
//!
//! Every builder is a pure function of its arguments: identical inputs give
//! byte-identical prompts. Whether the model follows the embedded
//! instructions is not something a builder can check.

pub mod blocks;
pub mod code;
pub mod copy;
pub mod refine;
pub mod structure;
pub mod understanding;

pub use code::code_generation;
pub use copy::section_copy;
pub use refine::{refinement, RefinementCommand};
pub use structure::structure;
pub use understanding::{conversation, understanding};

/// A system prompt plus the user turn that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}
