use std::{
    any::Any,
    collections::HashMap,
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use flate2::{Compression, write::GzEncoder};
use futures::{StreamExt, stream};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use crate::{
    artifact::{ByteStream, Transport, sha256_hex},
    engine::{
        ByteRange, EngineError, EngineModel, EngineResponse, ModelBuffers, ResponseOptions,
        ServiceConfig, TranslationEngine, TranslationService,
    },
    error::ServiceError,
};

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Uncompressed content served for `name` of pair `key`.
pub fn payload(key: &str, name: &str) -> Vec<u8> {
    format!("payload:{key}:{name}").into_bytes()
}

/// Registry JSON for `(key, modelType, separate_vocabs)` entries.
pub fn fixture_registry(entries: &[(&str, &str, bool)]) -> Value {
    let mut doc = Map::new();
    for &(key, model_type, separate) in entries {
        let descriptor = |name: String| {
            json!({
                "name": name,
                "size": 16,
                "expectedSha256Hash": sha256_hex(&payload(key, &name)),
                "modelType": model_type,
            })
        };
        let mut entry = Map::new();
        entry.insert("model".into(), descriptor(format!("model.{key}.intgemm.alphas.bin")));
        entry.insert("lex".into(), descriptor(format!("lex.50.50.{key}.s2t.bin")));
        if separate {
            entry.insert("srcvocab".into(), descriptor(format!("srcvocab.{key}.spm")));
            entry.insert("trgvocab".into(), descriptor(format!("trgvocab.{key}.spm")));
        } else {
            entry.insert("vocab".into(), descriptor(format!("vocab.{key}.spm")));
        }
        doc.insert(key.to_string(), Value::Object(entry));
    }
    Value::Object(doc)
}

/// A transport serving every artifact of `registry` under `base`.
pub fn mirror_for(registry: &Value, base: &str) -> MockTransport {
    let transport = MockTransport::new();
    let Some(entries) = registry.as_object() else {
        return transport;
    };
    for (key, entry) in entries {
        let model_type = entry["model"]["modelType"].as_str().unwrap_or("prod");
        for field in ["model", "lex", "vocab", "srcvocab", "trgvocab"] {
            if let Some(name) = entry.get(field).and_then(|d| d["name"].as_str()) {
                let url = format!("{base}/models/{model_type}/{key}/{name}.gz");
                transport.set_body(&url, gzip(&payload(key, name)));
            }
        }
    }
    transport
}

#[derive(Clone)]
enum MockResponse {
    Body(Vec<Vec<u8>>),
    Status(u16, String),
}

/// Serves canned bodies by URL; anything else is a 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, MockResponse>>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(self, url: &str, body: Vec<u8>) -> Self {
        self.set_body(url, body);
        self
    }

    pub fn with_chunked(self, url: &str, body: Vec<u8>, chunk_size: usize) -> Self {
        let chunks = body.chunks(chunk_size).map(<[u8]>::to_vec).collect();
        self.routes
            .lock()
            .insert(url.to_string(), MockResponse::Body(chunks));
        self
    }

    pub fn with_status(self, url: &str, status: u16, text: &str) -> Self {
        self.set_status(url, status, text);
        self
    }

    pub fn set_body(&self, url: &str, body: Vec<u8>) {
        self.routes
            .lock()
            .insert(url.to_string(), MockResponse::Body(vec![body]));
    }

    pub fn set_status(&self, url: &str, status: u16, text: &str) {
        self.routes
            .lock()
            .insert(url.to_string(), MockResponse::Status(status, text.to_string()));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<ByteStream, ServiceError> {
        self.requests.lock().push(url.to_string());
        let route = self.routes.lock().get(url).cloned();
        match route {
            Some(MockResponse::Body(chunks)) => {
                Ok(stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c)))).boxed())
            }
            Some(MockResponse::Status(status, text)) => Err(ServiceError::Transport {
                url: url.to_string(),
                status: Some(status),
                reason: format!("HTTP {status} - {text}"),
            }),
            None => Err(ServiceError::Transport {
                url: url.to_string(),
                status: Some(404),
                reason: "HTTP 404 - Not Found".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatedModel {
    pub id: String,
    pub config: String,
    pub model_alignment: usize,
    pub shortlist_alignment: usize,
    pub vocab_count: usize,
    pub vocabs_shared: bool,
    pub vocab_payloads: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateCall {
    pub model: String,
    pub inputs: Vec<String>,
}

#[derive(Debug)]
pub struct MockModel {
    id: String,
    _buffers: ModelBuffers,
    dropped: Arc<AtomicUsize>,
}

impl EngineModel for MockModel {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockModel {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Engine whose model id is the pair key embedded in the model payload and
/// whose translation of `x` by model `id` is `"{id}({x})"`.
#[derive(Default)]
pub struct MockEngine {
    created: Mutex<Vec<CreatedModel>>,
    failing: Mutex<Vec<String>>,
    dropped: Arc<AtomicUsize>,
    service: Arc<MockService>,
    services_created: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_model(&self, id: &str) {
        self.failing.lock().push(id.to_string());
    }

    pub fn created(&self) -> Vec<CreatedModel> {
        self.created.lock().clone()
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn services_created(&self) -> usize {
        self.services_created.load(Ordering::SeqCst)
    }

    pub fn service(&self) -> Arc<MockService> {
        Arc::clone(&self.service)
    }
}

impl TranslationEngine for MockEngine {
    fn create_service(
        &self,
        _config: &ServiceConfig,
    ) -> Result<Arc<dyn TranslationService>, EngineError> {
        self.services_created.fetch_add(1, Ordering::SeqCst);
        Ok(self.service.clone())
    }

    fn create_model(
        &self,
        config: &str,
        buffers: ModelBuffers,
    ) -> Result<Box<dyn EngineModel>, EngineError> {
        let text = String::from_utf8_lossy(&buffers.model).into_owned();
        let id = text.split(':').nth(1).unwrap_or_default().to_string();
        if self.failing.lock().contains(&id) {
            return Err(EngineError(format!("cannot construct {id}")));
        }

        self.created.lock().push(CreatedModel {
            id: id.clone(),
            config: config.to_string(),
            model_alignment: buffers.model.alignment(),
            shortlist_alignment: buffers.shortlist.alignment(),
            vocab_count: buffers.vocabs.len(),
            vocabs_shared: buffers.vocabs.len() == 2
                && Arc::ptr_eq(&buffers.vocabs[0], &buffers.vocabs[1]),
            vocab_payloads: buffers
                .vocabs
                .iter()
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .collect(),
        });

        Ok(Box::new(MockModel {
            id,
            _buffers: buffers,
            dropped: Arc::clone(&self.dropped),
        }))
    }
}

#[derive(Default)]
pub struct MockService {
    calls: Mutex<Vec<TranslateCall>>,
    options: Mutex<Vec<ResponseOptions>>,
    fail: Mutex<bool>,
}

impl MockService {
    pub fn calls(&self) -> Vec<TranslateCall> {
        self.calls.lock().clone()
    }

    /// Options received by each translate call, in order.
    pub fn options(&self) -> Vec<ResponseOptions> {
        self.options.lock().clone()
    }

    pub fn fail_translations(&self) {
        *self.fail.lock() = true;
    }
}

impl TranslationService for MockService {
    fn translate(
        &self,
        model: &dyn EngineModel,
        inputs: &[String],
        options: &ResponseOptions,
    ) -> Result<Vec<EngineResponse>, EngineError> {
        let id = model
            .as_any()
            .downcast_ref::<MockModel>()
            .map(|m| m.id.clone())
            .ok_or_else(|| EngineError("foreign model handle".to_string()))?;
        self.calls.lock().push(TranslateCall {
            model: id.clone(),
            inputs: inputs.to_vec(),
        });
        self.options.lock().push(*options);
        if *self.fail.lock() {
            return Err(EngineError("decoder crashed".to_string()));
        }

        Ok(inputs
            .iter()
            .map(|input| {
                let translated = format!("{id}({input})");
                EngineResponse {
                    source_sentences: vec![ByteRange::new(0, input.len())],
                    translated_sentences: vec![ByteRange::new(0, translated.len())],
                    original_text: input.clone(),
                    translated_text: translated,
                }
            })
            .collect())
    }
}
