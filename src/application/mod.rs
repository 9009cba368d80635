//! Application layer wiring DTOs and services for Semantic MDM.

pub mod dtos;
pub mod services;

pub use dtos::{
    CanonicalMappingRequest, CanonicalMappingResponse, ConceptListResponse, ConceptTermsResponse,
    CrossDomainRequest, CrossDomainResponse, HealthStatusResponse, ResolveRequest,
    ResolveResponse, SearchRequest, SearchResponse, StatsResponse,
};
pub use services::{AlignmentService, EmbeddingProvider, ServiceConfig};
