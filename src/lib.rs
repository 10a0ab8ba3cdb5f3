pub mod artifact;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod protocol;
pub mod server;
pub mod translation;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::AppConfig;
pub use error::{ErrorKind, ServiceError};
pub use model::{LanguagePair, ModelRegistry};
pub use protocol::{Command, Reply};
pub use server::build_router;
pub use worker::{WorkerContext, WorkerHandle, spawn_worker};
