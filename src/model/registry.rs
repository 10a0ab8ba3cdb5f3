use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    artifact::RemoteArtifact,
    error::ServiceError,
    model::types::{LanguagePair, PIVOT_LANGUAGE},
};

/// `modelType` tag of models still in development.
pub const EXPERIMENTAL_MODEL_TYPE: &str = "dev";
const DEFAULT_MODEL_TYPE: &str = "prod";
const COMPRESSED_SUFFIX: &str = ".gz";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArtifactDescriptor {
    pub name: String,
    #[serde(rename = "expectedSha256Hash")]
    pub expected_hash: String,
    #[serde(rename = "modelType", default)]
    pub model_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegistryEntry {
    pub model: ArtifactDescriptor,
    pub lex: ArtifactDescriptor,
    #[serde(default)]
    pub vocab: Option<ArtifactDescriptor>,
    #[serde(default)]
    pub srcvocab: Option<ArtifactDescriptor>,
    #[serde(default)]
    pub trgvocab: Option<ArtifactDescriptor>,
}

impl RegistryEntry {
    pub fn model_type(&self) -> &str {
        self.model.model_type.as_deref().unwrap_or(DEFAULT_MODEL_TYPE)
    }

    pub fn is_experimental(&self) -> bool {
        self.model_type() == EXPERIMENTAL_MODEL_TYPE
    }

    /// Source and target vocabulary, in that order.
    fn vocab_descriptors(&self) -> Option<[&ArtifactDescriptor; 2]> {
        match (&self.srcvocab, &self.trgvocab, &self.vocab) {
            (Some(src), Some(trg), _) => Some([src, trg]),
            (_, _, Some(shared)) => Some([shared, shared]),
            _ => None,
        }
    }
}

/// Everything needed to construct the model for one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPlan {
    pub pair: LanguagePair,
    pub model: RemoteArtifact,
    pub shortlist: RemoteArtifact,
    /// Vocabulary files to download, without duplicates.
    pub unique_vocabs: Vec<RemoteArtifact>,
    /// Index into `unique_vocabs` for the source and target vocabulary.
    pub vocab_slots: [usize; 2],
}

/// Registry document keyed by pair key (`"ende"`), held as received so it
/// can be echoed back unchanged. Entries are only typed when a pair is
/// resolved, so one malformed entry does not affect the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRegistry {
    document: Map<String, Value>,
}

impl ModelRegistry {
    /// `Ok(None)` when the registry has no entry for `pair`.
    pub fn entry(&self, pair: &LanguagePair) -> Result<Option<RegistryEntry>, ServiceError> {
        let key = pair.key();
        self.document
            .get(&key)
            .map(|raw| {
                RegistryEntry::deserialize(raw).map_err(|err| {
                    ServiceError::Registry(format!("entry '{key}' is malformed: {err}"))
                })
            })
            .transpose()
    }

    pub fn len(&self) -> usize {
        self.document.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    /// Resolves download URLs for `pair` under `base_url`.
    ///
    /// URLs have the shape `{base}/models/{modelType}/{pair}/{file}.gz`.
    pub fn resolve(&self, pair: &LanguagePair, base_url: &str) -> Result<ArtifactPlan, ServiceError> {
        let key = pair.key();
        let entry = self
            .entry(pair)?
            .ok_or_else(|| ServiceError::UnsupportedPair(key.clone()))?;
        let vocabs = entry.vocab_descriptors().ok_or_else(|| {
            ServiceError::Registry(format!("entry '{key}' does not declare a vocabulary"))
        })?;

        let common_path = format!(
            "{}/models/{}/{}",
            base_url.trim_end_matches('/'),
            entry.model_type(),
            key
        );
        let remote = |descriptor: &ArtifactDescriptor| RemoteArtifact {
            name: descriptor.name.clone(),
            url: format!("{common_path}/{}{COMPRESSED_SUFFIX}", descriptor.name),
            expected_hash: descriptor.expected_hash.clone(),
        };

        let mut unique_vocabs: Vec<RemoteArtifact> = Vec::with_capacity(2);
        let mut vocab_slots = [0; 2];
        for (slot, descriptor) in vocabs.into_iter().enumerate() {
            let artifact = remote(descriptor);
            vocab_slots[slot] = match unique_vocabs.iter().position(|v| *v == artifact) {
                Some(index) => index,
                None => {
                    unique_vocabs.push(artifact);
                    unique_vocabs.len() - 1
                }
            };
        }

        Ok(ArtifactPlan {
            pair: pair.clone(),
            model: remote(&entry.model),
            shortlist: remote(&entry.lex),
            unique_vocabs,
            vocab_slots,
        })
    }

    /// True if the pair, or either half of its English pivot, is tagged as
    /// a development model. Advisory only; malformed entries count as untagged.
    pub fn is_experimental(&self, pair: &LanguagePair) -> bool {
        let tagged = |p: &LanguagePair| {
            matches!(self.entry(p), Ok(Some(entry)) if entry.is_experimental())
        };
        tagged(pair)
            || tagged(&LanguagePair::new(pair.from.clone(), PIVOT_LANGUAGE))
            || tagged(&LanguagePair::new(PIVOT_LANGUAGE, pair.to.clone()))
    }
}
