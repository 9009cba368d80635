use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::embedding_provider::EmbeddingProvider;
use crate::{
    application::dtos::{HealthStatusResponse, StatsResponse},
    domain::{
        CanonicalConcept, DataLoadError, Domain, DomainError, IndexQuery, SimilarityResult, Term,
        TermEmbedding, TermRecord,
    },
};

/// Upper bound on any single result list.
pub const MAX_RESULTS: usize = 100;

/// High level configuration shared by the service and its adapters.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub embedding_model: String,
    pub default_top_k: usize,
    pub default_top_k_per_domain: usize,
    pub cross_domain_min_score: f32,
    pub cross_domain_candidates: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            embedding_model: "semantic-mdm/simple-hash".into(),
            default_top_k: 10,
            default_top_k_per_domain: 5,
            cross_domain_min_score: 0.45,
            cross_domain_candidates: 50,
        }
    }
}

impl ServiceConfig {
    pub fn with_model(embedding_model: impl Into<String>) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            ..Self::default()
        }
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}

/// Abstraction over any embedding engine (hash embedder, FastEmbed, etc).
pub trait EmbeddingEngine: Send + Sync {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError>;

    fn embed_batch(&self, model: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>, DomainError> {
        texts.iter().map(|text| self.embed(model, text)).collect()
    }

    fn dims(&self, _model: &str) -> Option<usize> {
        None
    }
}

/// Source of per-domain term records.
pub trait TermStore: Send + Sync {
    fn load(&self, domain: Domain) -> Result<Vec<TermRecord>, DomainError>;

    /// Domains this store serves, in load order.
    fn domains(&self) -> Vec<Domain> {
        Domain::ALL.to_vec()
    }

    /// Whether a missing backing file for `domain` should abort startup.
    fn is_required(&self, _domain: Domain) -> bool {
        true
    }

    /// Load every served domain. Optional domains without a backing file are
    /// skipped; every other failure is returned as is.
    fn load_all(&self) -> Result<Vec<TermRecord>, DomainError> {
        let mut records = Vec::new();

        for domain in self.domains() {
            match self.load(domain) {
                Ok(mut loaded) => {
                    info!(
                        target: "semantic_mdm::store",
                        %domain,
                        count = loaded.len(),
                        "loaded terms"
                    );
                    records.append(&mut loaded);
                }
                Err(DomainError::DataLoad(err))
                    if err.is_missing() && !self.is_required(domain) =>
                {
                    info!(
                        target: "semantic_mdm::store",
                        %domain,
                        "optional term file not found; skipping"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        if records.is_empty() {
            return Err(DataLoadError::Empty.into());
        }
        Ok(records)
    }
}

/// Contract for the immutable in-memory similarity index.
pub trait SimilarityIndex: Send + Sync {
    /// Ranked matches by descending cosine similarity; ties keep load order.
    fn query(
        &self,
        vector: &[f32],
        params: &IndexQuery,
    ) -> Result<Vec<SimilarityResult>, DomainError>;

    /// Number of searchable terms.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of terms excluded at build time.
    fn skipped(&self) -> usize;

    fn dimensions(&self) -> Option<usize>;
}

/// Terms that share one canonical concept within a resolved query.
#[derive(Debug, Clone)]
pub struct ConceptGroup {
    pub concept: CanonicalConcept,
    pub matches: BTreeMap<Domain, Vec<SimilarityResult>>,
    pub best_score: f32,
}

/// Embed loaded records into terms using one provider for every record.
pub fn embed_records(
    provider: &EmbeddingProvider,
    records: Vec<TermRecord>,
) -> Result<Vec<Arc<Term>>, DomainError> {
    let texts: Vec<String> = records.iter().map(|record| record.text.clone()).collect();
    let vectors = provider.embed_many(&texts)?;

    Ok(records
        .into_iter()
        .zip(vectors)
        .map(|(record, vector)| {
            let embedding = TermEmbedding::new(provider.model(), vector);
            Arc::new(Term::new(record, embedding))
        })
        .collect())
}

/// Cross-domain resolver: validates queries, embeds them and ranks terms per domain.
pub struct AlignmentService {
    provider: Arc<EmbeddingProvider>,
    index: Arc<dyn SimilarityIndex>,
    terms: Vec<Arc<Term>>,
    domains: Vec<Domain>,
    config: ServiceConfig,
}

impl AlignmentService {
    pub fn new(
        provider: Arc<EmbeddingProvider>,
        index: Arc<dyn SimilarityIndex>,
        terms: Vec<Arc<Term>>,
        config: ServiceConfig,
    ) -> Self {
        let domains = Domain::ALL
            .into_iter()
            .filter(|domain| terms.iter().any(|term| term.domain == *domain))
            .collect();

        Self {
            provider,
            index,
            terms,
            domains,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Domains that contributed at least one term, in declaration order.
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn terms(&self) -> &[Arc<Term>] {
        &self.terms
    }

    /// Rank terms against `query_text` independently for every loaded domain.
    pub fn resolve(
        &self,
        query_text: &str,
        top_k_per_domain: usize,
    ) -> Result<BTreeMap<Domain, Vec<SimilarityResult>>, DomainError> {
        let vector = self.embed_query(query_text)?;
        let top_k = top_k_per_domain.min(MAX_RESULTS);

        let mut resolved = BTreeMap::new();
        for domain in &self.domains {
            let params = IndexQuery::new(top_k).in_domain(*domain);
            resolved.insert(*domain, self.index.query(&vector, &params)?);
        }

        debug!(target: "semantic_mdm::resolver", query = query_text.trim(), top_k, "resolved query");
        Ok(resolved)
    }

    /// Canonical concept ids of every term whose text equals `term_text`.
    pub fn concepts_for(&self, term_text: &str) -> BTreeSet<String> {
        self.terms
            .iter()
            .filter(|term| term.text_matches(term_text))
            .map(|term| term.canonical_concept_id.clone())
            .collect()
    }

    /// Flat ranked search, optionally restricted to one domain.
    pub fn semantic_search(
        &self,
        query_text: &str,
        domain: Option<Domain>,
        top_k: Option<usize>,
        min_score: Option<f32>,
    ) -> Result<Vec<SimilarityResult>, DomainError> {
        validate_min_score(min_score)?;
        let vector = self.embed_query(query_text)?;

        let top_k = top_k.unwrap_or(self.config.default_top_k).min(MAX_RESULTS);
        let mut params = IndexQuery::new(top_k).with_min_score(min_score);
        params.domain = domain;

        self.index.query(&vector, &params)
    }

    /// Canonical concept of the single best match for `term_text`.
    pub fn canonical_mapping(
        &self,
        term_text: &str,
    ) -> Result<Option<CanonicalConcept>, DomainError> {
        let best = self.semantic_search(term_text, None, Some(1), None)?;
        Ok(best.first().map(|result| result.term.concept()))
    }

    /// Matches for `term_text` outside `source_domain`, grouped by domain.
    pub fn cross_domain_matches(
        &self,
        term_text: &str,
        source_domain: Domain,
        min_score: Option<f32>,
    ) -> Result<BTreeMap<Domain, Vec<SimilarityResult>>, DomainError> {
        let threshold = min_score.unwrap_or(self.config.cross_domain_min_score);
        let candidates = self.semantic_search(
            term_text,
            None,
            Some(self.config.cross_domain_candidates),
            Some(threshold),
        )?;

        let mut grouped: BTreeMap<Domain, Vec<SimilarityResult>> = BTreeMap::new();
        for result in candidates {
            if result.term.domain != source_domain {
                grouped.entry(result.term.domain).or_default().push(result);
            }
        }
        Ok(grouped)
    }

    /// Resolve `query_text` and present the hits grouped by canonical concept.
    pub fn concept_groups(
        &self,
        query_text: &str,
        top_k_per_domain: usize,
    ) -> Result<Vec<ConceptGroup>, DomainError> {
        let resolved = self.resolve(query_text, top_k_per_domain)?;
        Ok(Self::group_by_concept(&resolved))
    }

    /// Group per-domain results by canonical concept, strongest concept first.
    pub fn group_by_concept(
        resolved: &BTreeMap<Domain, Vec<SimilarityResult>>,
    ) -> Vec<ConceptGroup> {
        let mut groups: Vec<ConceptGroup> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for (domain, results) in resolved {
            for result in results {
                let id = result.term.canonical_concept_id.as_str();
                let position = *positions.entry(id).or_insert_with(|| {
                    groups.push(ConceptGroup {
                        concept: result.term.concept(),
                        matches: BTreeMap::new(),
                        best_score: result.score,
                    });
                    groups.len() - 1
                });

                let group = &mut groups[position];
                group.best_score = group.best_score.max(result.score);
                group.matches.entry(*domain).or_default().push(result.clone());
            }
        }

        groups.sort_by(|a, b| b.best_score.total_cmp(&a.best_score));
        groups
    }

    /// Every canonical concept referenced by a loaded term, sorted by id.
    pub fn concepts(&self) -> Vec<CanonicalConcept> {
        let mut seen = BTreeMap::new();
        for term in &self.terms {
            seen.entry(term.canonical_concept_id.as_str())
                .or_insert_with(|| term.concept());
        }
        seen.into_values().collect()
    }

    /// Terms mapped to `concept_id`, in load order.
    pub fn terms_for_concept(&self, concept_id: &str) -> Result<Vec<Arc<Term>>, DomainError> {
        let id = concept_id.trim();
        let matches: Vec<Arc<Term>> = self
            .terms
            .iter()
            .filter(|term| term.canonical_concept_id == id)
            .cloned()
            .collect();

        if matches.is_empty() {
            return Err(DomainError::not_found(format!(
                "no terms map to concept `{id}`"
            )));
        }
        Ok(matches)
    }

    pub fn embedding_dimensions(&self) -> Option<usize> {
        self.index
            .dimensions()
            .or_else(|| self.provider.dimensions())
    }

    pub fn stats(&self) -> StatsResponse {
        let mut domains: BTreeMap<Domain, usize> = BTreeMap::new();
        for term in &self.terms {
            *domains.entry(term.domain).or_default() += 1;
        }

        StatsResponse {
            total_terms: self.terms.len(),
            indexed_terms: self.index.len(),
            skipped_terms: self.index.skipped(),
            domains,
            concepts: self.concepts().len(),
            dimensions: self.embedding_dimensions(),
            model: self.config.embedding_model().to_string(),
        }
    }

    pub fn health(&self) -> HealthStatusResponse {
        let ready = self.provider.is_loaded() && !self.index.is_empty();

        HealthStatusResponse {
            ok: ready,
            message: if ready { "ready" } else { "not ready" }.into(),
            details: Some(format!(
                "model: {}, indexed_terms: {}, checked_at: {}",
                self.config.embedding_model(),
                self.index.len(),
                Utc::now()
            )),
        }
    }

    fn embed_query(&self, query_text: &str) -> Result<Vec<f32>, DomainError> {
        if query_text.trim().is_empty() {
            return Err(DomainError::validation("query cannot be empty"));
        }
        self.provider.embed(query_text)
    }
}

fn validate_min_score(min_score: Option<f32>) -> Result<(), DomainError> {
    match min_score {
        Some(score) if !(-1.0..=1.0).contains(&score) => Err(DomainError::validation(format!(
            "min_score must lie in [-1, 1], got {score}"
        ))),
        _ => Ok(()),
    }
}
