use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::services::ServiceConfig;
use crate::domain::Domain;

/// Default filename used for configuration within the config directory.
const CONFIG_FILENAME: &str = "config.json";

pub const ENV_CONFIG: &str = "SEMANTIC_MDM_CONFIG";
pub const ENV_DATA_DIR: &str = "SEMANTIC_MDM_DATA_DIR";

/// Declarative list of embedding backends compiled into the binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum EmbeddingBackend {
    /// Lightweight deterministic hash embedder (always available).
    Simple {
        #[serde(default = "default_simple_model")]
        model: String,
        #[serde(default = "default_simple_dim")]
        dimensions: usize,
    },
    /// Sentence embeddings powered by FastEmbed (feature gated).
    #[cfg(feature = "fastembed-engine")]
    #[serde(rename = "fastembed")]
    FastEmbed {
        #[serde(default = "default_fastembed_model")]
        model: String,
    },
}

impl EmbeddingBackend {
    pub fn label(&self) -> &'static str {
        match self {
            EmbeddingBackend::Simple { .. } => "Deterministic Hash (offline)",
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { .. } => "FastEmbed (semantic)",
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            EmbeddingBackend::Simple { model, .. } => model,
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { model } => model,
        }
    }

    /// Cross-domain threshold used when the config leaves it unset. The hash
    /// embedder only sees token overlap, so one shared word out of two scores 0.5.
    pub fn default_cross_domain_min_score(&self) -> f32 {
        match self {
            EmbeddingBackend::Simple { .. } => 0.45,
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { .. } => 0.7,
        }
    }

    pub fn expected_dimensions(&self) -> Option<usize> {
        match self {
            EmbeddingBackend::Simple { dimensions, .. } => Some(*dimensions),
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { .. } => None,
        }
    }
}

impl Default for EmbeddingBackend {
    fn default() -> Self {
        #[cfg(feature = "fastembed-engine")]
        {
            EmbeddingBackend::FastEmbed {
                model: default_fastembed_model(),
            }
        }
        #[cfg(not(feature = "fastembed-engine"))]
        {
            EmbeddingBackend::Simple {
                model: default_simple_model(),
                dimensions: default_simple_dim(),
            }
        }
    }
}

/// One domain's term file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataSource {
    pub domain: Domain,
    pub file: PathBuf,
    #[serde(default = "default_required")]
    pub required: bool,
}

impl DataSource {
    pub fn new(domain: Domain, file: impl Into<PathBuf>, required: bool) -> Self {
        Self {
            domain,
            file: file.into(),
            required,
        }
    }
}

/// Where the term files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_sources")]
    pub sources: Vec<DataSource>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            sources: default_sources(),
        }
    }
}

/// Query defaults applied when a request leaves them unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_top_k_per_domain")]
    pub top_k_per_domain: usize,
    /// Unset means the embedding backend's own default.
    #[serde(default)]
    pub cross_domain_min_score: Option<f32>,
    #[serde(default = "default_cross_domain_candidates")]
    pub cross_domain_candidates: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            top_k_per_domain: default_top_k_per_domain(),
            cross_domain_min_score: None,
            cross_domain_candidates: default_cross_domain_candidates(),
        }
    }
}

/// Complete configuration payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub embedding: EmbeddingBackend,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl AppConfig {
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            embedding_model: self.embedding.model_name().to_string(),
            default_top_k: self.search.top_k.max(1),
            default_top_k_per_domain: self.search.top_k_per_domain.max(1),
            cross_domain_min_score: self
                .search
                .cross_domain_min_score
                .unwrap_or_else(|| self.embedding.default_cross_domain_min_score())
                .clamp(-1.0, 1.0),
            cross_domain_candidates: self.search.cross_domain_candidates.max(1),
        }
    }
}

/// Read-only holder of the `AppConfig` loaded at startup.
pub struct ConfigManager {
    path: PathBuf,
    state: AppConfig,
}

impl ConfigManager {
    /// Load `<path>`. A missing file yields defaults; an unreadable or
    /// malformed one logs a warning and yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let config = if path.exists() {
            match fs::read(&path)
                .map_err(|err| err.to_string())
                .and_then(|bytes| {
                    serde_json::from_slice::<AppConfig>(&bytes).map_err(|err| err.to_string())
                }) {
                Ok(config) => config,
                Err(err) => {
                    warn!(
                        target: "semantic_mdm::settings",
                        path = %path.display(),
                        error = %err,
                        "ignoring unreadable config file; using defaults"
                    );
                    AppConfig::default()
                }
            }
        } else {
            AppConfig::default()
        };

        Self {
            path,
            state: config,
        }
    }

    /// Resolve the config path from `SEMANTIC_MDM_CONFIG` or the platform
    /// config directory, then apply `SEMANTIC_MDM_DATA_DIR`.
    pub fn from_env() -> Self {
        let path = std::env::var_os(ENV_CONFIG)
            .map(PathBuf::from)
            .or_else(default_config_path)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

        let mut manager = Self::load(path);
        if let Some(dir) = std::env::var_os(ENV_DATA_DIR) {
            manager.state.data.dir = PathBuf::from(dir);
        }
        manager
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current configuration.
    pub fn current(&self) -> AppConfig {
        self.state.clone()
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "semantic-mdm", "SemanticMDM")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

const fn default_simple_dim() -> usize {
    crate::infrastructure::embeddings::DEFAULT_SIMPLE_DIMENSIONS
}

fn default_simple_model() -> String {
    crate::infrastructure::embeddings::DEFAULT_SIMPLE_MODEL.to_string()
}

#[cfg(feature = "fastembed-engine")]
fn default_fastembed_model() -> String {
    "Qdrant/all-MiniLM-L6-v2-onnx".to_string()
}

const fn default_required() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_sources() -> Vec<DataSource> {
    vec![
        DataSource::new(Domain::Legal, "legal_terms.json", true),
        DataSource::new(Domain::RestaurantDevelopment, "restdev_terms.json", true),
        DataSource::new(Domain::Finance, "finance_terms.json", false),
    ]
}

const fn default_top_k() -> usize {
    10
}

const fn default_top_k_per_domain() -> usize {
    5
}

const fn default_cross_domain_candidates() -> usize {
    50
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::load(dir.path().join("config.json"));
        let config = manager.current();

        assert_eq!(config.data.dir, PathBuf::from("data"));
        assert_eq!(config.data.sources.len(), 3);
        assert!(!config.data.sources[2].required);
        assert_eq!(config.search.top_k, 10);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "embedding": { "backend": "simple", "dimensions": 128 },
                "data": { "dir": "/srv/terms" },
                "search": { "top_k": 3 }
            }"#,
        )
        .unwrap();

        let config = ConfigManager::load(&path).current();
        assert_eq!(config.embedding.expected_dimensions(), Some(128));
        assert_eq!(config.embedding.model_name(), "semantic-mdm/simple-hash");
        assert_eq!(config.data.dir, PathBuf::from("/srv/terms"));
        assert_eq!(config.data.sources, default_sources());

        let service = config.service_config();
        assert_eq!(service.default_top_k, 3);
        assert_eq!(service.default_top_k_per_domain, 5);
        assert!((service.cross_domain_min_score - 0.45).abs() < f32::EPSILON);
    }

    #[test]
    fn test_explicit_cross_domain_threshold_wins() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "embedding": { "backend": "simple" }, "search": { "cross_domain_min_score": 0.8 } }"#,
        )
        .unwrap();
        assert_eq!(config.search.cross_domain_min_score, Some(0.8));
        assert!((config.service_config().cross_domain_min_score - 0.8).abs() < f32::EPSILON);
    }

    #[cfg(feature = "fastembed-engine")]
    #[test]
    fn test_fastembed_backend_tag_and_threshold() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "embedding": { "backend": "fastembed" } }"#).unwrap();
        assert_eq!(config.embedding.model_name(), "Qdrant/all-MiniLM-L6-v2-onnx");
        assert!((config.service_config().cross_domain_min_score - 0.7).abs() < f32::EPSILON);

        let encoded = serde_json::to_value(&config.embedding).unwrap();
        assert_eq!(encoded["backend"], "fastembed");
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();

        let manager = ConfigManager::load(&path);
        assert_eq!(manager.path(), path.as_path());
        assert_eq!(manager.current().search.top_k_per_domain, 5);
    }

    #[test]
    fn test_data_source_parses_domain_label() {
        let source: DataSource = serde_json::from_str(
            r#"{ "domain": "Restaurant Development", "file": "restdev.json" }"#,
        )
        .unwrap();
        assert_eq!(source.domain, Domain::RestaurantDevelopment);
        assert!(source.required);
    }
}
