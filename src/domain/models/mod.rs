use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::DomainError;

/// Separator used by taxonomy paths such as `Agreements > Real Estate > Ground Lease`.
pub const TAXONOMY_SEPARATOR: char = '>';

/// Business department whose vocabulary is being aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Domain {
    Legal,
    RestaurantDevelopment,
    Finance,
}

impl Domain {
    pub const ALL: [Domain; 3] = [
        Domain::Legal,
        Domain::RestaurantDevelopment,
        Domain::Finance,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Domain::Legal => "Legal",
            Domain::RestaurantDevelopment => "Restaurant Development",
            Domain::Finance => "Finance",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Domain {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "legal" => Ok(Domain::Legal),
            "restaurant development"
            | "restaurantdevelopment"
            | "restaurant-development"
            | "restdev" => Ok(Domain::RestaurantDevelopment),
            "finance" => Ok(Domain::Finance),
            _ => Err(DomainError::validation(format!("unknown domain `{}`", raw.trim()))),
        }
    }
}

impl TryFrom<String> for Domain {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Domain> for String {
    fn from(value: Domain) -> Self {
        value.label().to_string()
    }
}

/// A domain-independent business idea that department-specific terms map to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalConcept {
    pub id: String,
    pub display_name: String,
}

impl CanonicalConcept {
    pub fn new(id: impl Into<String>, display_name: Option<&str>) -> Self {
        let id = id.into();
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| display_name_from_path(&id));
        Self { id, display_name }
    }
}

fn display_name_from_path(id: &str) -> String {
    id.rsplit(TAXONOMY_SEPARATOR)
        .map(str::trim)
        .find(|segment| !segment.is_empty())
        .unwrap_or(id)
        .to_string()
}

/// Validated record read from a domain term file, before it is embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct TermRecord {
    pub text: String,
    pub domain: Domain,
    pub canonical_concept_id: String,
    pub canonical_name: Option<String>,
    pub metadata: Map<String, Value>,
}

/// Vector representation of a term's text.
#[derive(Debug, Clone)]
pub struct TermEmbedding {
    pub model: String,
    pub vector: Vec<f32>,
}

impl TermEmbedding {
    pub fn new(model: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            model: model.into(),
            vector,
        }
    }

    pub fn dims(&self) -> usize {
        self.vector.len()
    }
}

/// A loaded, embedded term. Immutable after startup; identity is `(text, domain)`.
#[derive(Debug, Clone)]
pub struct Term {
    pub text: String,
    pub domain: Domain,
    pub canonical_concept_id: String,
    pub canonical_name: Option<String>,
    pub metadata: Map<String, Value>,
    pub embedding: TermEmbedding,
}

impl Term {
    pub fn new(record: TermRecord, embedding: TermEmbedding) -> Self {
        Self {
            text: record.text,
            domain: record.domain,
            canonical_concept_id: record.canonical_concept_id,
            canonical_name: record.canonical_name,
            metadata: record.metadata,
            embedding,
        }
    }

    pub fn concept(&self) -> CanonicalConcept {
        CanonicalConcept::new(&self.canonical_concept_id, self.canonical_name.as_deref())
    }

    /// Trimmed, case-insensitive text comparison used for exact term lookups.
    pub fn text_matches(&self, text: &str) -> bool {
        self.text.trim().eq_ignore_ascii_case(text.trim())
    }
}

/// A term paired with its cosine similarity to a query. Produced per query.
#[derive(Debug, Clone)]
pub struct SimilarityResult {
    pub term: Arc<Term>,
    pub score: f32,
}

/// Parameters for a single similarity index lookup.
#[derive(Debug, Clone, Default)]
pub struct IndexQuery {
    pub top_k: usize,
    pub min_score: Option<f32>,
    pub domain: Option<Domain>,
}

impl IndexQuery {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            ..Self::default()
        }
    }

    pub fn in_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn admits(&self, term: &Term, score: f32) -> bool {
        if let Some(domain) = self.domain {
            if term.domain != domain {
                return false;
            }
        }
        if let Some(min) = self.min_score {
            if score < min {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_parsing_accepts_labels_and_aliases() {
        assert_eq!("Legal".parse::<Domain>().unwrap(), Domain::Legal);
        assert_eq!(
            "Restaurant Development".parse::<Domain>().unwrap(),
            Domain::RestaurantDevelopment
        );
        assert_eq!(
            " restdev ".parse::<Domain>().unwrap(),
            Domain::RestaurantDevelopment
        );
        assert_eq!("FINANCE".parse::<Domain>().unwrap(), Domain::Finance);
        assert!("Operations".parse::<Domain>().is_err());
    }

    #[test]
    fn test_domain_serializes_as_label() {
        let value = serde_json::to_value(Domain::RestaurantDevelopment).unwrap();
        assert_eq!(value, serde_json::json!("Restaurant Development"));

        let parsed: Domain = serde_json::from_value(serde_json::json!("legal")).unwrap();
        assert_eq!(parsed, Domain::Legal);
    }

    #[test]
    fn test_concept_display_name_falls_back_to_last_path_segment() {
        let concept = CanonicalConcept::new("Agreements > Real Estate > Ground Lease", None);
        assert_eq!(concept.display_name, "Ground Lease");

        let named = CanonicalConcept::new("ground-lease", Some("Ground Lease"));
        assert_eq!(named.display_name, "Ground Lease");

        let bare = CanonicalConcept::new("operator", Some("  "));
        assert_eq!(bare.display_name, "operator");
    }

    #[test]
    fn test_index_query_filters_by_domain_and_score() {
        let term = Term::new(
            TermRecord {
                text: "site lease".into(),
                domain: Domain::RestaurantDevelopment,
                canonical_concept_id: "ground-lease".into(),
                canonical_name: None,
                metadata: Map::new(),
            },
            TermEmbedding::new("test", vec![1.0, 0.0]),
        );

        let query = IndexQuery::new(5)
            .in_domain(Domain::RestaurantDevelopment)
            .with_min_score(Some(0.5));
        assert!(query.admits(&term, 0.7));
        assert!(!query.admits(&term, 0.2));
        assert!(!IndexQuery::new(5).in_domain(Domain::Legal).admits(&term, 0.9));
    }
}
