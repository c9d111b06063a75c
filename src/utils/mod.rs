//! Shared utilities: JSON merging and run identifier generation.

pub mod id_generator;
pub mod json_ext;

pub use id_generator::IdGenerator;
pub use json_ext::{deep_merge, merge_multiple, MergeStrategy};
