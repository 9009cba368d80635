//! Domain layer: core business entities and value objects for Semantic MDM.

pub mod errors;
pub mod models;
pub mod similarity;

pub use errors::{DataLoadError, DomainError};
pub use models::{
    CanonicalConcept, Domain, IndexQuery, SimilarityResult, Term, TermEmbedding, TermRecord,
};
pub use similarity::{cosine_similarity, vector_norm};
