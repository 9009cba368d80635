//! Similarity index adapters.

pub mod memory_index;

pub use memory_index::InMemoryIndex;
