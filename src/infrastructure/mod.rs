//! Infrastructure layer wiring concrete adapters (embeddings, term files, index).

pub mod embeddings;
pub mod index;
pub mod storage;

#[cfg(feature = "fastembed-engine")]
pub use embeddings::FastEmbedEngine;
pub use embeddings::SimpleEmbedEngine;
pub use index::InMemoryIndex;
pub use storage::JsonTermStore;
