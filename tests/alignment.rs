//! End-to-end resolution over the bundled term files and small fixtures,
//! using the offline hash embedder so results are reproducible.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use semantic_mdm::{
    application::AlignmentService,
    bootstrap_service,
    domain::{DataLoadError, Domain, DomainError},
    infrastructure::{embeddings::DEFAULT_SIMPLE_MODEL, JsonTermStore},
    init_embedder,
    settings::{AppConfig, DataSource, EmbeddingBackend},
};
use tempfile::tempdir;

const GROUND_LEASE: &str = "Agreements > Real Estate > Ground Lease";

fn bundled_data() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data")
}

fn simple_backend() -> EmbeddingBackend {
    EmbeddingBackend::Simple {
        model: DEFAULT_SIMPLE_MODEL.to_string(),
        dimensions: 256,
    }
}

fn simple_config() -> AppConfig {
    AppConfig {
        embedding: simple_backend(),
        ..AppConfig::default()
    }
}

fn load(dir: &Path) -> Result<AlignmentService, DomainError> {
    let config = simple_config();
    let store = JsonTermStore::new(dir, config.data.sources.clone());
    let provider = Arc::new(init_embedder(&config.embedding));
    bootstrap_service(&store, provider, config.service_config())
}

fn service() -> AlignmentService {
    load(&bundled_data()).unwrap()
}

#[test]
fn test_bundled_data_loads_every_domain() {
    let svc = service();
    let stats = svc.stats();

    assert_eq!(
        svc.domains(),
        &[Domain::Legal, Domain::RestaurantDevelopment, Domain::Finance]
    );
    assert_eq!(stats.total_terms, stats.indexed_terms);
    assert_eq!(stats.skipped_terms, 0);
    assert_eq!(stats.dimensions, Some(256));
    assert!(svc.health().ok);
}

#[test]
fn test_ground_lease_resolves_to_site_lease() {
    let svc = service();
    let resolved = svc.resolve("ground lease", 3).unwrap();

    let legal = &resolved[&Domain::Legal];
    assert_eq!(legal[0].term.text, "ground lease");
    assert!((legal[0].score - 1.0).abs() < 1e-4);

    let restdev = &resolved[&Domain::RestaurantDevelopment];
    assert_eq!(restdev[0].term.text, "site lease");
    assert!(restdev[0].score > 0.45);

    let groups = AlignmentService::group_by_concept(&resolved);
    assert_eq!(groups[0].concept.id, GROUND_LEASE);
    assert_eq!(groups[0].concept.display_name, "Ground Lease");
    assert!(groups[0].matches.contains_key(&Domain::RestaurantDevelopment));
}

#[test]
fn test_results_are_sorted_bounded_and_limited() {
    let svc = service();
    let results = svc.semantic_search("lease", None, Some(3), None).unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(results.iter().all(|r| (-1.0..=1.0).contains(&r.score)));

    let legal = svc
        .semantic_search("ground lease", Some(Domain::Legal), Some(3), None)
        .unwrap();
    let all_legal = svc
        .semantic_search("ground lease", Some(Domain::Legal), Some(10), None)
        .unwrap();
    assert_eq!(all_legal.len(), 10);
    assert_eq!(legal.len(), 3);
    assert!(legal
        .iter()
        .zip(&all_legal)
        .all(|(top, full)| top.term.text == full.term.text));

    for results in svc.resolve("tenant improvements", 4).unwrap().values() {
        assert!(results.len() <= 4);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[test]
fn test_repeated_and_independent_queries_agree() {
    let first = service();
    let second = service();

    let scores = |svc: &AlignmentService| -> Vec<(String, f32)> {
        svc.semantic_search("franchise royalty agreement", None, Some(10), None)
            .unwrap()
            .iter()
            .map(|r| (r.term.text.clone(), r.score))
            .collect()
    };

    assert_eq!(scores(&first), scores(&first));
    assert_eq!(scores(&first), scores(&second));
}

#[test]
fn test_every_term_matches_itself_first() {
    let svc = service();

    for term in svc.terms() {
        let best = svc
            .semantic_search(&term.text, Some(term.domain), Some(1), None)
            .unwrap();
        assert_eq!(best[0].term.text, term.text);
        assert!(
            best[0].score > 0.999,
            "{} scored {}",
            term.text,
            best[0].score
        );
    }
}

#[test]
fn test_empty_query_is_a_validation_error() {
    let svc = service();
    assert!(matches!(svc.resolve("", 5), Err(DomainError::Validation(_))));
    assert!(matches!(
        svc.canonical_mapping("   "),
        Err(DomainError::Validation(_))
    ));
}

#[test]
fn test_cross_domain_default_threshold_on_bundled_data() {
    let svc = service();
    assert!((svc.config().cross_domain_min_score - 0.45).abs() < f32::EPSILON);

    let matches = svc
        .cross_domain_matches("ground lease", Domain::Legal, None)
        .unwrap();
    assert!(!matches.contains_key(&Domain::Legal));
    assert!(matches[&Domain::RestaurantDevelopment]
        .iter()
        .any(|r| r.term.text == "site lease"));

    let net = svc
        .cross_domain_matches("triple net lease", Domain::Legal, None)
        .unwrap();
    assert!(net.values().map(Vec::len).sum::<usize>() > 0);
}

#[test]
fn test_punctuation_only_query_is_a_validation_error() {
    let svc = service();
    assert!(matches!(
        svc.semantic_search("--- ...", None, None, None),
        Err(DomainError::Validation(_))
    ));
}

#[test]
fn test_cross_domain_and_canonical_mapping() {
    let svc = service();

    let matches = svc
        .cross_domain_matches("ground lease", Domain::Legal, Some(0.45))
        .unwrap();
    assert!(!matches.contains_key(&Domain::Legal));
    assert!(matches[&Domain::RestaurantDevelopment]
        .iter()
        .any(|r| r.term.text == "site lease"));

    let best = svc.canonical_mapping("site lease").unwrap().unwrap();
    assert_eq!(best.id, GROUND_LEASE);
    assert!(svc.concepts_for("Site Lease").contains(GROUND_LEASE));

    let terms = svc.terms_for_concept(GROUND_LEASE).unwrap();
    let domains: Vec<Domain> = terms.iter().map(|t| t.domain).collect();
    assert!(domains.contains(&Domain::Legal));
    assert!(domains.contains(&Domain::Finance));
}

#[test]
fn test_missing_optional_finance_file_is_skipped() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("legal_terms.json"),
        r#"[{"term": "ground lease", "canonical": "Agreements > Real Estate > Ground Lease"}]"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("restdev_terms.json"),
        r#"[{"term": "site lease", "canonical": "Agreements > Real Estate > Ground Lease"}]"#,
    )
    .unwrap();

    let svc = load(dir.path()).unwrap();
    assert_eq!(svc.domains(), &[Domain::Legal, Domain::RestaurantDevelopment]);
    assert!(!svc.resolve("lease", 5).unwrap().contains_key(&Domain::Finance));
}

#[test]
fn test_record_without_canonical_id_fails_startup() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("legal_terms.json"),
        r#"{"domain": "Legal", "terms": [{"term": "ground lease"}]}"#,
    )
    .unwrap();
    fs::write(dir.path().join("restdev_terms.json"), "[]").unwrap();

    assert!(matches!(
        load(dir.path()),
        Err(DomainError::DataLoad(DataLoadError::InvalidRecord { index: 0, .. }))
    ));
}

#[test]
fn test_custom_sources_are_honoured() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("contracts.json"),
        r#"[{"term": "master lease", "canonical": "Agreements > Real Estate > Master Lease"}]"#,
    )
    .unwrap();

    let store = JsonTermStore::new(
        dir.path(),
        vec![DataSource::new(Domain::Legal, "contracts.json", true)],
    );
    let config = simple_config();
    let provider = Arc::new(init_embedder(&config.embedding));
    let svc = bootstrap_service(&store, provider, config.service_config()).unwrap();

    assert_eq!(svc.terms().len(), 1);
    assert_eq!(svc.concepts()[0].display_name, "Master Lease");
}
