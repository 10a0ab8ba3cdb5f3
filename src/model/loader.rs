use std::{collections::HashMap, sync::Arc, time::Instant};

use futures::future::{try_join_all, try_join3};
use tokio::task;
use tracing::{debug, info};

use crate::{
    artifact::{AlignedBuffer, ArtifactFetcher},
    config::{AppConfig, MODEL_CONFIG},
    engine::{EngineModel, ModelBuffers, TranslationEngine},
    error::ServiceError,
    model::{
        registry::{ArtifactPlan, ModelRegistry},
        types::LanguagePair,
    },
};

/// An engine model resident for one language pair.
#[derive(Debug)]
pub struct LoadedModel {
    pair: LanguagePair,
    size_bytes: usize,
    handle: Box<dyn EngineModel>,
}

impl LoadedModel {
    pub fn pair(&self) -> &LanguagePair {
        &self.pair
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn handle(&self) -> &dyn EngineModel {
        self.handle.as_ref()
    }
}

/// Collaborators needed to turn a registry entry into an engine model.
pub struct ModelBuilder<'a> {
    pub engine: &'a dyn TranslationEngine,
    pub registry: &'a ModelRegistry,
    pub fetcher: &'a ArtifactFetcher,
    pub config: &'a AppConfig,
}

impl ModelBuilder<'_> {
    pub fn plan(&self, pair: &LanguagePair) -> Result<ArtifactPlan, ServiceError> {
        self.registry.resolve(pair, &self.config.artifact_base_url())
    }

    pub async fn build(&self, plan: &ArtifactPlan) -> Result<LoadedModel, ServiceError> {
        let pair = &plan.pair;
        debug!(
            %pair,
            model = %plan.model.url,
            shortlist = %plan.shortlist.url,
            unique_vocabs = plan.unique_vocabs.len(),
            "resolved model artifacts"
        );

        let start = Instant::now();
        let vocab_downloads =
            try_join_all(plan.unique_vocabs.iter().map(|v| self.fetcher.fetch_verified(v)));
        let (model_bytes, shortlist_bytes, vocab_bytes) = try_join3(
            self.fetcher.fetch_verified(&plan.model),
            self.fetcher.fetch_verified(&plan.shortlist),
            vocab_downloads,
        )
        .await?;
        info!(
            %pair,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "downloaded all model files"
        );

        let alignments = (
            self.config.model_alignment,
            self.config.shortlist_alignment,
            self.config.vocab_alignment,
        );
        let (model, shortlist, unique) = task::spawn_blocking(move || {
            let (model_align, shortlist_align, vocab_align) = alignments;
            let model = AlignedBuffer::from_bytes(&model_bytes, model_align)?;
            let shortlist = AlignedBuffer::from_bytes(&shortlist_bytes, shortlist_align)?;
            let unique = vocab_bytes
                .iter()
                .map(|bytes| AlignedBuffer::from_bytes(bytes, vocab_align).map(Arc::new))
                .collect::<Result<Vec<_>, ServiceError>>()?;
            Ok::<_, ServiceError>((model, shortlist, unique))
        })
        .await??;
        let vocabs: Vec<Arc<AlignedBuffer>> = plan
            .vocab_slots
            .iter()
            .map(|&slot| Arc::clone(&unique[slot]))
            .collect();

        let size_bytes =
            model.len() + shortlist.len() + unique.iter().map(|v| v.len()).sum::<usize>();
        drop(unique);
        debug!(
            %pair,
            model_size = model.len(),
            shortlist_size = shortlist.len(),
            vocab_sizes = ?vocabs.iter().map(|v| v.len()).collect::<Vec<_>>(),
            "aligned memory ready"
        );
        debug!(%pair, config = MODEL_CONFIG, "constructing translation model");

        let handle = self
            .engine
            .create_model(
                MODEL_CONFIG,
                ModelBuffers {
                    model,
                    shortlist,
                    vocabs,
                    quality_model: None,
                },
            )
            .map_err(|e| ServiceError::EngineConstruction(format!("{pair}: {e}")))?;

        Ok(LoadedModel {
            pair: pair.clone(),
            size_bytes,
            handle,
        })
    }
}

/// The set of resident models. Holds only what the last requested pair needs.
#[derive(Debug, Default)]
pub struct ModelManager {
    models: HashMap<LanguagePair, LoadedModel>,
}

impl ModelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every resident model along with its buffers.
    pub fn clear(&mut self) {
        for (pair, _) in self.models.drain() {
            debug!(%pair, "destructing model");
        }
    }

    /// Evicts everything, then constructs the model(s) serving `pair`.
    ///
    /// Non-English pairs get `from→en` and `en→to`, built concurrently.
    /// On failure the set is left empty.
    pub async fn load_pair(
        &mut self,
        builder: &ModelBuilder<'_>,
        pair: &LanguagePair,
    ) -> Result<(), ServiceError> {
        self.clear();

        let hops = pair.hops();
        if hops.len() > 1 {
            info!(%pair, via = ?hops.iter().map(LanguagePair::key).collect::<Vec<_>>(), "constructing model via pivot");
        } else {
            info!(%pair, "constructing model");
        }

        let plans = hops
            .iter()
            .map(|hop| builder.plan(hop))
            .collect::<Result<Vec<_>, _>>()?;

        let built = try_join_all(plans.iter().map(|plan| builder.build(plan))).await?;

        for model in built {
            self.models.insert(model.pair.clone(), model);
        }
        info!(
            %pair,
            resident = self.models.len(),
            size_bytes = self.models.values().map(LoadedModel::size_bytes).sum::<usize>(),
            "models ready"
        );
        Ok(())
    }

    pub fn get(&self, pair: &LanguagePair) -> Result<&LoadedModel, ServiceError> {
        self.models
            .get(pair)
            .ok_or_else(|| ServiceError::ModelNotLoaded(pair.key()))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn pairs(&self) -> Vec<LanguagePair> {
        let mut pairs: Vec<_> = self.models.keys().cloned().collect();
        pairs.sort();
        pairs
    }
}
