use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    application::services::SimilarityIndex,
    domain::{
        similarity::cosine_with_norms, vector_norm, DomainError, IndexQuery, SimilarityResult,
        Term,
    },
};

struct IndexedTerm {
    term: Arc<Term>,
    norm: f32,
}

/// Immutable in-memory cosine index over every loaded term.
///
/// Norms are computed once at build time. Terms whose embedding cannot take
/// part in cosine similarity (zero or non-finite norm, or a dimension that
/// disagrees with the rest of the index) are dropped here, so queries never
/// see a degenerate candidate.
pub struct InMemoryIndex {
    entries: Vec<IndexedTerm>,
    dimensions: Option<usize>,
    skipped: usize,
}

impl InMemoryIndex {
    pub fn build(terms: impl IntoIterator<Item = Arc<Term>>) -> Self {
        let mut entries = Vec::new();
        let mut dimensions: Option<usize> = None;
        let mut skipped = 0;

        for term in terms {
            let norm = vector_norm(&term.embedding.vector);
            let dims = term.embedding.dims();

            if norm == 0.0 || !norm.is_finite() {
                warn!(
                    target: "semantic_mdm::index",
                    term = %term.text,
                    domain = %term.domain,
                    "skipping term with degenerate embedding"
                );
                skipped += 1;
                continue;
            }

            match dimensions {
                Some(expected) if expected != dims => {
                    warn!(
                        target: "semantic_mdm::index",
                        term = %term.text,
                        domain = %term.domain,
                        expected,
                        actual = dims,
                        "skipping term with mismatched embedding dimension"
                    );
                    skipped += 1;
                    continue;
                }
                Some(_) => {}
                None => dimensions = Some(dims),
            }

            entries.push(IndexedTerm { term, norm });
        }

        info!(
            target: "semantic_mdm::index",
            indexed = entries.len(),
            skipped,
            dimensions = ?dimensions,
            "similarity index built"
        );

        Self {
            entries,
            dimensions,
            skipped,
        }
    }
}

impl SimilarityIndex for InMemoryIndex {
    fn query(
        &self,
        vector: &[f32],
        params: &IndexQuery,
    ) -> Result<Vec<SimilarityResult>, DomainError> {
        if params.top_k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(dims) = self.dimensions {
            if dims != vector.len() {
                return Err(DomainError::embedding(format!(
                    "embedding dimension mismatch: query {} vs index {}",
                    vector.len(),
                    dims
                )));
            }
        }

        let query_norm = vector_norm(vector);
        if query_norm == 0.0 || !query_norm.is_finite() {
            return Err(DomainError::validation(
                "query has no embeddable content",
            ));
        }

        let mut scored: Vec<SimilarityResult> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let score =
                    cosine_with_norms(vector, query_norm, &entry.term.embedding.vector, entry.norm);
                params.admits(&entry.term, score).then(|| SimilarityResult {
                    term: Arc::clone(&entry.term),
                    score,
                })
            })
            .collect();

        // Stable: equal scores keep load order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(params.top_k);

        Ok(scored)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn skipped(&self) -> usize {
        self.skipped
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;
    use crate::domain::{Domain, TermEmbedding, TermRecord};

    fn term(text: &str, domain: Domain, vector: Vec<f32>) -> Arc<Term> {
        Arc::new(Term::new(
            TermRecord {
                text: text.into(),
                domain,
                canonical_concept_id: format!("concept/{text}"),
                canonical_name: None,
                metadata: Map::new(),
            },
            TermEmbedding::new("test", vector),
        ))
    }

    fn texts(results: &[SimilarityResult]) -> Vec<&str> {
        results.iter().map(|r| r.term.text.as_str()).collect()
    }

    #[test]
    fn test_results_are_sorted_descending() {
        let index = InMemoryIndex::build(vec![
            term("far", Domain::Legal, vec![0.0, 1.0]),
            term("near", Domain::Legal, vec![1.0, 0.1]),
            term("middle", Domain::Legal, vec![1.0, 1.0]),
        ]);

        let results = index.query(&[1.0, 0.0], &IndexQuery::new(10)).unwrap();
        assert_eq!(texts(&results), vec!["near", "middle", "far"]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_keep_load_order() {
        let index = InMemoryIndex::build(vec![
            term("first", Domain::Legal, vec![1.0, 0.0]),
            term("second", Domain::Finance, vec![2.0, 0.0]),
            term("third", Domain::Legal, vec![0.5, 0.0]),
        ]);

        let results = index.query(&[3.0, 0.0], &IndexQuery::new(3)).unwrap();
        assert_eq!(texts(&results), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_top_k_min_score_and_domain_filters() {
        let index = InMemoryIndex::build(vec![
            term("a", Domain::Legal, vec![1.0, 0.0]),
            term("b", Domain::RestaurantDevelopment, vec![1.0, 0.2]),
            term("c", Domain::RestaurantDevelopment, vec![0.0, 1.0]),
            term("d", Domain::RestaurantDevelopment, vec![-1.0, 0.0]),
        ]);

        let top_one = index.query(&[1.0, 0.0], &IndexQuery::new(1)).unwrap();
        assert_eq!(texts(&top_one), vec!["a"]);

        let restdev = index
            .query(
                &[1.0, 0.0],
                &IndexQuery::new(10).in_domain(Domain::RestaurantDevelopment),
            )
            .unwrap();
        assert_eq!(texts(&restdev), vec!["b", "c", "d"]);

        let positive = index
            .query(&[1.0, 0.0], &IndexQuery::new(10).with_min_score(Some(0.0)))
            .unwrap();
        assert_eq!(texts(&positive), vec!["a", "b", "c"]);

        assert!(index.query(&[1.0, 0.0], &IndexQuery::new(0)).unwrap().is_empty());
    }

    #[test]
    fn test_degenerate_terms_are_skipped_at_build() {
        let index = InMemoryIndex::build(vec![
            term("zero", Domain::Legal, vec![0.0, 0.0]),
            term("ok", Domain::Legal, vec![1.0, 0.0]),
            term("wrong dims", Domain::Legal, vec![1.0, 0.0, 0.0]),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.skipped(), 2);
        assert_eq!(index.dimensions(), Some(2));

        let results = index.query(&[0.0, 1.0], &IndexQuery::new(5)).unwrap();
        assert_eq!(texts(&results), vec!["ok"]);
    }

    #[test]
    fn test_degenerate_or_mismatched_query_is_rejected() {
        let index = InMemoryIndex::build(vec![term("ok", Domain::Legal, vec![1.0, 0.0])]);

        assert!(matches!(
            index.query(&[0.0, 0.0], &IndexQuery::new(5)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            index.query(&[1.0, 0.0, 0.0], &IndexQuery::new(5)),
            Err(DomainError::Embedding(_))
        ));
    }

    #[test]
    fn test_scores_stay_in_unit_range() {
        let index = InMemoryIndex::build(vec![
            term("x", Domain::Legal, vec![0.3, -0.9, 0.2]),
            term("y", Domain::Finance, vec![-0.3, 0.9, -0.2]),
            term("z", Domain::Finance, vec![0.7, 0.7, 0.7]),
        ]);

        let results = index.query(&[0.3, -0.9, 0.2], &IndexQuery::new(10)).unwrap();
        assert!(results.iter().all(|r| (-1.0..=1.0).contains(&r.score)));
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }
}
