use std::{any::Any, fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::AlignedBuffer;

/// Opaque failure reported by the engine.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub cache_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { cache_size: 0 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseOptions {
    pub quality_scores: bool,
    pub alignment: bool,
    pub html: bool,
}

/// `[begin, end)` offsets into the UTF-8 encoding of a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub begin: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }
}

/// One response per input paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResponse {
    pub original_text: String,
    pub translated_text: String,
    pub source_sentences: Vec<ByteRange>,
    pub translated_sentences: Vec<ByteRange>,
}

impl EngineResponse {
    pub fn sentence_count(&self) -> usize {
        self.source_sentences
            .len()
            .min(self.translated_sentences.len())
    }
}

/// Buffers consumed by model construction. The engine takes ownership;
/// they are released when the returned model is dropped.
#[derive(Debug)]
pub struct ModelBuffers {
    pub model: AlignedBuffer,
    pub shortlist: AlignedBuffer,
    /// Source vocabulary first, then target. A shared vocabulary appears twice.
    pub vocabs: Vec<Arc<AlignedBuffer>>,
    pub quality_model: Option<AlignedBuffer>,
}

pub trait EngineModel: Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

pub trait TranslationService: Send + Sync {
    fn translate(
        &self,
        model: &dyn EngineModel,
        inputs: &[String],
        options: &ResponseOptions,
    ) -> Result<Vec<EngineResponse>, EngineError>;
}

pub trait TranslationEngine: Send + Sync {
    fn create_service(
        &self,
        config: &ServiceConfig,
    ) -> Result<Arc<dyn TranslationService>, EngineError>;

    fn create_model(
        &self,
        config: &str,
        buffers: ModelBuffers,
    ) -> Result<Box<dyn EngineModel>, EngineError>;
}

/// Brings the engine up. Runs on the `import` command.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn TranslationEngine>, EngineError>;
}

/// Loader for an engine that is already constructed in-process.
pub struct StaticEngine(pub Arc<dyn TranslationEngine>);

#[async_trait]
impl EngineLoader for StaticEngine {
    async fn load(&self) -> Result<Arc<dyn TranslationEngine>, EngineError> {
        Ok(Arc::clone(&self.0))
    }
}

/// Loader used when the binary is built without an engine.
pub struct UnlinkedEngine;

#[async_trait]
impl EngineLoader for UnlinkedEngine {
    async fn load(&self) -> Result<Arc<dyn TranslationEngine>, EngineError> {
        Err(EngineError(
            "no translation engine is linked into this build".to_string(),
        ))
    }
}
