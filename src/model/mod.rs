mod loader;
mod registry;
mod types;

pub use loader::{LoadedModel, ModelBuilder, ModelManager};
pub use registry::{
    ArtifactDescriptor, ArtifactPlan, EXPERIMENTAL_MODEL_TYPE, ModelRegistry, RegistryEntry,
};
pub use types::{LanguagePair, PIVOT_LANGUAGE};
