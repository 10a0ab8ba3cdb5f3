use std::{sync::Arc, time::Instant};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    artifact::{ArtifactFetcher, Transport},
    config::AppConfig,
    engine::{
        EngineLoader, ResponseOptions, ServiceConfig, TranslationEngine, TranslationService,
    },
    error::ServiceError,
    model::{LanguagePair, ModelBuilder, ModelManager, ModelRegistry},
    protocol::{Command, ImportReply, LoadStatus, Reply, ReplyError},
    translation::{TranslationOutput, Translator, count_words},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Uninitialized,
    EngineImported,
    ModelReady,
}

pub struct WorkerContext {
    config: Arc<AppConfig>,
    loader: Arc<dyn EngineLoader>,
    fetcher: ArtifactFetcher,
    engine: Option<Arc<dyn TranslationEngine>>,
    service: Option<Arc<dyn TranslationService>>,
    registry: Option<Arc<ModelRegistry>>,
    models: ModelManager,
    options: ResponseOptions,
    state: WorkerState,
}

impl WorkerContext {
    pub fn new(
        config: Arc<AppConfig>,
        loader: Arc<dyn EngineLoader>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let options = config.response_options;
        Self {
            config,
            loader,
            fetcher: ArtifactFetcher::new(transport),
            engine: None,
            service: None,
            registry: None,
            models: ModelManager::new(),
            options,
            state: WorkerState::Uninitialized,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn models(&self) -> &ModelManager {
        &self.models
    }

    pub fn registry(&self) -> Option<&ModelRegistry> {
        self.registry.as_deref()
    }

    pub async fn handle(&mut self, command: Command) -> Reply {
        let name = command.name();
        debug!(command = name, "command received");

        let reply = match command {
            Command::Import => Reply::Import(self.import().await.map_err(|err| {
                error!(%err, "engine import failed");
                ReplyError::from(&err)
            })),
            Command::LoadModel { from, to } => {
                let pair = LanguagePair::new(from, to);
                let start = Instant::now();
                Reply::LoadModel(match self.load_model(&pair).await {
                    Ok(status) => {
                        info!(
                            %pair,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "model successfully constructed"
                        );
                        Ok(status)
                    }
                    Err(err) => {
                        warn!(%pair, %err, "model construction failed");
                        Err(ReplyError::from(&err))
                    }
                })
            }
            Command::Translate {
                from,
                to,
                paragraphs,
            } => {
                let pair = LanguagePair::new(from, to);
                let words = count_words(&paragraphs);
                let start = Instant::now();
                Reply::Translate(match self.translate(&pair, &paragraphs) {
                    Ok(output) => {
                        let secs = start.elapsed().as_secs_f64();
                        let wps = if secs > 0.0 { words as f64 / secs } else { words as f64 };
                        info!(%pair, words, secs, wps = wps.round() as u64, "translation successful");
                        Ok(output.paragraphs)
                    }
                    Err(err) => {
                        warn!(%pair, %err, "translation failed");
                        Err(ReplyError::from(&err))
                    }
                })
            }
        };

        debug!(command = name, "command done, posting reply");
        reply
    }

    async fn import(&mut self) -> Result<ImportReply, ServiceError> {
        if self.engine.is_none() {
            let start = Instant::now();
            let engine = self
                .loader
                .load()
                .await
                .map_err(|e| ServiceError::EngineImport(e.to_string()))?;
            info!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                "engine runtime initialized"
            );
            self.engine = Some(engine);
        }
        if self.state == WorkerState::Uninitialized {
            self.state = WorkerState::EngineImported;
        }

        let registry = match &self.registry {
            Some(registry) => Arc::clone(registry),
            None => {
                let registry: ModelRegistry =
                    self.fetcher.fetch_json(&self.config.registry_url).await?;
                info!(pairs = registry.len(), "model registry loaded");
                let registry = Arc::new(registry);
                self.registry = Some(Arc::clone(&registry));
                registry
            }
        };

        Ok(ImportReply {
            registry,
            version: self.config.version_tag.clone(),
        })
    }

    async fn load_model(&mut self, pair: &LanguagePair) -> Result<LoadStatus, ServiceError> {
        let engine = self.engine.clone().ok_or(ServiceError::EngineNotImported)?;
        let registry = self
            .registry
            .clone()
            .ok_or_else(|| ServiceError::Registry("registry not loaded".to_string()))?;

        if self.service.is_none() {
            let config = ServiceConfig::default();
            debug!(?config, "creating translation service");
            let service = engine
                .create_service(&config)
                .map_err(|e| ServiceError::EngineConstruction(e.to_string()))?;
            self.service = Some(service);
        }

        let builder = ModelBuilder {
            engine: engine.as_ref(),
            registry: registry.as_ref(),
            fetcher: &self.fetcher,
            config: &self.config,
        };
        self.models.load_pair(&builder, pair).await?;
        self.state = WorkerState::ModelReady;

        Ok(if registry.is_experimental(pair) {
            LoadStatus::Experimental
        } else {
            LoadStatus::Loaded
        })
    }

    fn translate(
        &self,
        pair: &LanguagePair,
        paragraphs: &[String],
    ) -> Result<TranslationOutput, ServiceError> {
        let service = self.service.as_deref().ok_or(ServiceError::EngineNotImported)?;
        Translator {
            service,
            models: &self.models,
            options: &self.options,
        }
        .translate(pair, paragraphs)
    }
}

struct Envelope {
    command: Command,
    reply: oneshot::Sender<Reply>,
}

/// Cloneable sender side of the command queue.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Envelope>,
}

impl WorkerHandle {
    pub async fn send(&self, command: Command) -> Result<Reply, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { command, reply })
            .await
            .map_err(|_| ServiceError::WorkerUnavailable)?;
        rx.await.map_err(|_| ServiceError::WorkerUnavailable)
    }
}

/// Starts the command loop. Commands are handled strictly in arrival order.
pub fn spawn_worker(context: WorkerContext, queue_depth: usize) -> (WorkerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(queue_depth.max(1));
    let task = tokio::spawn(run(context, rx));
    (WorkerHandle { tx }, task)
}

async fn run(mut context: WorkerContext, mut rx: mpsc::Receiver<Envelope>) {
    while let Some(Envelope { command, reply }) = rx.recv().await {
        let response = context.handle(command).await;
        if reply.send(response).is_err() {
            debug!("caller went away before the reply was posted");
        }
    }
    debug!("command queue closed, worker exiting");
}
