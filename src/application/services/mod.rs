//! Service layer orchestrating domain operations and infrastructure adapters.

mod alignment_service;
mod embedding_provider;

pub use alignment_service::{
    embed_records, AlignmentService, ConceptGroup, EmbeddingEngine, ServiceConfig,
    SimilarityIndex, TermStore, MAX_RESULTS,
};
pub use embedding_provider::EmbeddingProvider;
