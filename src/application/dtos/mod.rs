use std::collections::BTreeMap;

#[cfg(feature = "mcp-server")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::application::services::ConceptGroup;
use crate::domain::{CanonicalConcept, Domain, SimilarityResult, Term};

/// Flat semantic search, optionally restricted to one domain.
#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    #[cfg_attr(feature = "mcp-server", schemars(with = "Option<String>"))]
    pub domain: Option<Domain>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub min_score: Option<f32>,
}

/// Per-domain resolution of a query.
#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub query: String,
    #[serde(default)]
    pub top_k_per_domain: Option<usize>,
}

/// Matches for a term in every domain except its own.
#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossDomainRequest {
    pub term: String,
    #[cfg_attr(feature = "mcp-server", schemars(with = "String"))]
    pub source_domain: Domain,
    #[serde(default)]
    pub min_score: Option<f32>,
}

#[cfg_attr(feature = "mcp-server", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalMappingRequest {
    pub term: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptTermsQuery {
    pub id: String,
}

/// A term as shown to API consumers, without its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermDto {
    pub term: String,
    pub domain: Domain,
    pub canonical_concept_id: String,
    pub canonical_name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl From<&Term> for TermDto {
    fn from(term: &Term) -> Self {
        Self {
            term: term.text.clone(),
            domain: term.domain,
            canonical_concept_id: term.canonical_concept_id.clone(),
            canonical_name: term.concept().display_name,
            metadata: term.metadata.clone(),
        }
    }
}

/// Result row returned from semantic retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultDto {
    #[serde(flatten)]
    pub term: TermDto,
    pub score: f32,
}

impl From<&SimilarityResult> for SearchResultDto {
    fn from(result: &SimilarityResult) -> Self {
        Self {
            term: TermDto::from(result.term.as_ref()),
            score: result.score,
        }
    }
}

pub type DomainMatches = BTreeMap<Domain, Vec<SearchResultDto>>;

pub fn domain_matches(resolved: &BTreeMap<Domain, Vec<SimilarityResult>>) -> DomainMatches {
    resolved
        .iter()
        .map(|(domain, results)| (*domain, results.iter().map(SearchResultDto::from).collect()))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResultDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptGroupDto {
    pub concept: CanonicalConcept,
    pub best_score: f32,
    pub matches: DomainMatches,
}

impl From<&ConceptGroup> for ConceptGroupDto {
    fn from(group: &ConceptGroup) -> Self {
        Self {
            concept: group.concept.clone(),
            best_score: group.best_score,
            matches: domain_matches(&group.matches),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub query: String,
    pub matches: DomainMatches,
    pub concepts: Vec<ConceptGroupDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossDomainResponse {
    pub term: String,
    pub source_domain: Domain,
    pub matches: DomainMatches,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalMappingResponse {
    pub term: String,
    /// Concept of the best semantic match.
    pub best_match: Option<CanonicalConcept>,
    /// Concepts of terms whose text equals the query exactly.
    pub exact_concepts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptListResponse {
    pub items: Vec<CanonicalConcept>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptTermsResponse {
    pub concept_id: String,
    pub terms: Vec<TermDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_terms: usize,
    pub indexed_terms: usize,
    pub skipped_terms: usize,
    pub domains: BTreeMap<Domain, usize>,
    pub concepts: usize,
    pub dimensions: Option<usize>,
    pub model: String,
}

/// Health/readiness report for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatusResponse {
    pub ok: bool,
    pub message: String,
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::domain::{TermEmbedding, TermRecord};

    #[test]
    fn test_search_result_flattens_term_fields() {
        let mut metadata = Map::new();
        metadata.insert("definition".into(), json!("Long-term land lease"));
        let term = Term::new(
            TermRecord {
                text: "ground lease".into(),
                domain: Domain::Legal,
                canonical_concept_id: "Agreements > Real Estate > Ground Lease".into(),
                canonical_name: None,
                metadata,
            },
            TermEmbedding::new("test", vec![1.0]),
        );
        let result = SimilarityResult {
            term: Arc::new(term),
            score: 0.875,
        };

        let value = serde_json::to_value(SearchResultDto::from(&result)).unwrap();
        assert_eq!(value["term"], "ground lease");
        assert_eq!(value["domain"], "Legal");
        assert_eq!(value["canonical_name"], "Ground Lease");
        assert_eq!(value["metadata"]["definition"], "Long-term land lease");
        assert_eq!(value["score"], 0.875);
    }

    #[test]
    fn test_search_request_defaults() {
        let request: SearchRequest =
            serde_json::from_value(json!({ "query": "site lease" })).unwrap();
        assert!(request.domain.is_none());
        assert!(request.top_k.is_none());
        assert!(request.min_score.is_none());

        let scoped: SearchRequest = serde_json::from_value(
            json!({ "query": "site lease", "domain": "restdev", "top_k": 3 }),
        )
        .unwrap();
        assert_eq!(scoped.domain, Some(Domain::RestaurantDevelopment));
        assert_eq!(scoped.top_k, Some(3));
    }
}
