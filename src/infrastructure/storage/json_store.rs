use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    application::services::TermStore,
    domain::{DataLoadError, Domain, DomainError, TermRecord},
    settings::DataSource,
};

/// Term file shapes found in the wild: a `{domain, terms}` envelope or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TermFile {
    Nested {
        #[serde(default)]
        domain: Option<String>,
        terms: Vec<Value>,
    },
    Flat(Vec<Value>),
}

/// One record as written in the file, before validation.
#[derive(Debug, Deserialize)]
struct RawTermRecord {
    #[serde(default)]
    term: Option<String>,
    #[serde(default)]
    canonical_concept_id: Option<String>,
    #[serde(default)]
    canonical: Option<String>,
    #[serde(default)]
    canonical_name: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(flatten)]
    metadata: Map<String, Value>,
}

/// Read-only term store backed by one JSON file per domain.
pub struct JsonTermStore {
    data_dir: PathBuf,
    sources: Vec<DataSource>,
}

impl JsonTermStore {
    pub fn new(data_dir: impl AsRef<Path>, sources: Vec<DataSource>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            sources,
        }
    }

    fn source(&self, domain: Domain) -> Option<&DataSource> {
        self.sources.iter().find(|source| source.domain == domain)
    }

    fn path_for(&self, source: &DataSource) -> PathBuf {
        if source.file.is_absolute() {
            source.file.clone()
        } else {
            self.data_dir.join(&source.file)
        }
    }

    fn read_file(path: &Path) -> Result<Vec<u8>, DataLoadError> {
        fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => DataLoadError::Missing {
                path: path.to_path_buf(),
            },
            _ => DataLoadError::Unreadable {
                path: path.to_path_buf(),
                source: err,
            },
        })
    }

    fn parse(path: &Path, domain: Domain, bytes: &[u8]) -> Result<Vec<TermRecord>, DataLoadError> {
        let malformed = |reason: String| DataLoadError::Malformed {
            path: path.to_path_buf(),
            reason,
        };

        let file: TermFile = serde_json::from_slice(bytes).map_err(|err| {
            if err.is_data() {
                malformed("expected an array of terms or an object with a `terms` array".into())
            } else {
                malformed(err.to_string())
            }
        })?;

        let values = match file {
            TermFile::Nested {
                domain: Some(declared),
                ..
            } if !declares(&declared, domain) => {
                return Err(malformed(format!(
                    "file declares domain `{declared}` but is configured for `{domain}`"
                )));
            }
            TermFile::Nested { terms, .. } => terms,
            TermFile::Flat(terms) => terms,
        };

        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| Self::parse_record(path, domain, index, value))
            .collect()
    }

    fn parse_record(
        path: &Path,
        domain: Domain,
        index: usize,
        value: Value,
    ) -> Result<TermRecord, DataLoadError> {
        let invalid = |reason: String| DataLoadError::InvalidRecord {
            path: path.to_path_buf(),
            index,
            reason,
        };

        if !value.is_object() {
            return Err(invalid("record must be a JSON object".into()));
        }

        let raw: RawTermRecord =
            serde_json::from_value(value).map_err(|err| invalid(err.to_string()))?;

        let text = required(raw.term, "term").map_err(invalid)?;
        let canonical_concept_id =
            required(raw.canonical_concept_id.or(raw.canonical), "canonical_concept_id")
                .map_err(invalid)?;

        if let Some(declared) = raw.domain.as_deref() {
            if !declares(declared, domain) {
                return Err(invalid(format!(
                    "record declares domain `{declared}` but the file is configured for `{domain}`"
                )));
            }
        }

        Ok(TermRecord {
            text,
            domain,
            canonical_concept_id,
            canonical_name: raw.canonical_name.filter(|name| !name.trim().is_empty()),
            metadata: raw.metadata,
        })
    }
}

impl TermStore for JsonTermStore {
    fn load(&self, domain: Domain) -> Result<Vec<TermRecord>, DomainError> {
        let source = self
            .source(domain)
            .ok_or(DataLoadError::Unconfigured(domain))?;
        let path = self.path_for(source);

        let bytes = Self::read_file(&path)?;
        Ok(Self::parse(&path, domain, &bytes)?)
    }

    fn domains(&self) -> Vec<Domain> {
        Domain::ALL
            .into_iter()
            .filter(|domain| self.source(*domain).is_some())
            .collect()
    }

    fn is_required(&self, domain: Domain) -> bool {
        self.source(domain).map_or(true, |source| source.required)
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        Some(_) => Err(format!("field `{field}` cannot be blank")),
        None => Err(format!("missing required field `{field}`")),
    }
}

fn declares(declared: &str, domain: Domain) -> bool {
    declared.parse::<Domain>().map_or(false, |parsed| parsed == domain)
}
