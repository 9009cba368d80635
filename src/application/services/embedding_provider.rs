use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::alignment_service::EmbeddingEngine;
use crate::domain::DomainError;

type EngineLoader = Box<dyn Fn() -> Result<Arc<dyn EmbeddingEngine>, DomainError> + Send + Sync>;

/// Maps text to vectors through a lazily loaded embedding engine.
///
/// The engine is supplied as a loader and materialised on first use. Loading
/// happens at most once: concurrent first callers serialise on `init_guard`,
/// and every later call reads the cached engine without taking a lock. A
/// failed load is not cached, so the next call tries again.
pub struct EmbeddingProvider {
    model: String,
    loader: EngineLoader,
    engine: OnceLock<Arc<dyn EmbeddingEngine>>,
    init_guard: Mutex<()>,
}

impl EmbeddingProvider {
    pub fn new<F>(model: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn EmbeddingEngine>, DomainError> + Send + Sync + 'static,
    {
        Self {
            model: model.into(),
            loader: Box::new(loader),
            engine: OnceLock::new(),
            init_guard: Mutex::new(()),
        }
    }

    /// Wrap an engine that is already loaded.
    pub fn with_engine(model: impl Into<String>, engine: Arc<dyn EmbeddingEngine>) -> Self {
        let provider = Self::new(model, || {
            Err(DomainError::embedding("preloaded engine has no loader"))
        });
        let _ = provider.engine.set(engine);
        provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.get().is_some()
    }

    /// Vector dimension of the loaded engine, if it is loaded and reports one.
    pub fn dimensions(&self) -> Option<usize> {
        self.engine.get().and_then(|engine| engine.dims(&self.model))
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let text = non_empty(text)?;
        let engine = self.engine()?;
        let vector = engine.embed(&self.model, text)?;
        self.check_dims(engine.as_ref(), &vector)?;
        Ok(vector)
    }

    /// Embed a batch of texts; output order and length match the input.
    pub fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs = texts
            .iter()
            .enumerate()
            .map(|(idx, text)| {
                non_empty(text).map_err(|_| {
                    DomainError::validation(format!("text #{idx} in batch is empty"))
                })
            })
            .collect::<Result<Vec<&str>, DomainError>>()?;

        let engine = self.engine()?;
        let vectors = engine.embed_batch(&self.model, &inputs)?;

        if vectors.len() != inputs.len() {
            return Err(DomainError::embedding(format!(
                "engine returned {} embeddings for {} inputs",
                vectors.len(),
                inputs.len()
            )));
        }
        for vector in &vectors {
            self.check_dims(engine.as_ref(), vector)?;
        }

        debug!(target: "semantic_mdm::embeddings", count = vectors.len(), "embedded batch");
        Ok(vectors)
    }

    fn engine(&self) -> Result<&Arc<dyn EmbeddingEngine>, DomainError> {
        if let Some(engine) = self.engine.get() {
            return Ok(engine);
        }

        let _guard = self.init_guard.lock();
        if let Some(engine) = self.engine.get() {
            return Ok(engine);
        }

        info!(target: "semantic_mdm::embeddings", model = %self.model, "loading embedding model");
        let loaded = (self.loader)().map_err(|err| match err {
            DomainError::Embedding(_) => err,
            other => DomainError::embedding(format!(
                "failed to load model `{}`: {other}",
                self.model
            )),
        })?;

        Ok(self.engine.get_or_init(|| loaded))
    }

    fn check_dims(&self, engine: &dyn EmbeddingEngine, vector: &[f32]) -> Result<(), DomainError> {
        match engine.dims(&self.model) {
            Some(expected) if expected != vector.len() => Err(DomainError::embedding(format!(
                "unexpected embedding dimension (expected {}, got {})",
                expected,
                vector.len()
            ))),
            _ => Ok(()),
        }
    }
}

fn non_empty(text: &str) -> Result<&str, DomainError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("text payload cannot be empty"));
    }
    Ok(trimmed)
}
