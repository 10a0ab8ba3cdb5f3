use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("downloading {url} failed: {reason}")]
    Transport {
        url: String,
        status: Option<u16>,
        reason: String,
    },
    #[error("downloading {name} failed: invalid file hash (expected {expected}, got {actual})")]
    Integrity {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("please load translation model '{0}' before translating")]
    ModelNotLoaded(String),
    #[error("language pair '{0}' is not present in the model registry")]
    UnsupportedPair(String),
    #[error("engine failed to construct model: {0}")]
    EngineConstruction(String),
    #[error("translation engine has not been imported")]
    EngineNotImported,
    #[error("translation engine import failed: {0}")]
    EngineImport(String),
    #[error("decompressing {url} failed: {source}")]
    Decompression {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("model registry unavailable: {0}")]
    Registry(String),
    #[error("aligned allocation failed: {0}")]
    Allocation(String),
    #[error("engine translation failed: {0}")]
    Translation(String),
    #[error("invalid command: {0}")]
    BadCommand(String),
    #[error("command worker is not running")]
    WorkerUnavailable,
    #[error("blocking task failed: {0}")]
    BlockingTask(#[from] tokio::task::JoinError),
}

/// Coarse error category carried across the command boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Integrity,
    ModelNotLoaded,
    UnsupportedPair,
    EngineConstruction,
    EngineNotImported,
    EngineImport,
    Decompression,
    Registry,
    Allocation,
    Translation,
    BadCommand,
    WorkerUnavailable,
    BlockingTask,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Transport { .. } => ErrorKind::Transport,
            ServiceError::Integrity { .. } => ErrorKind::Integrity,
            ServiceError::ModelNotLoaded(_) => ErrorKind::ModelNotLoaded,
            ServiceError::UnsupportedPair(_) => ErrorKind::UnsupportedPair,
            ServiceError::EngineConstruction(_) => ErrorKind::EngineConstruction,
            ServiceError::EngineNotImported => ErrorKind::EngineNotImported,
            ServiceError::EngineImport(_) => ErrorKind::EngineImport,
            ServiceError::Decompression { .. } => ErrorKind::Decompression,
            ServiceError::Registry(_) => ErrorKind::Registry,
            ServiceError::Allocation(_) => ErrorKind::Allocation,
            ServiceError::Translation(_) => ErrorKind::Translation,
            ServiceError::BadCommand(_) => ErrorKind::BadCommand,
            ServiceError::WorkerUnavailable => ErrorKind::WorkerUnavailable,
            ServiceError::BlockingTask(_) => ErrorKind::BlockingTask,
        }
    }

    pub(crate) fn network(url: &str, err: impl std::fmt::Display) -> Self {
        ServiceError::Transport {
            url: url.to_string(),
            status: None,
            reason: err.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::BadCommand(_) => StatusCode::BAD_REQUEST,
            ServiceError::EngineNotImported | ServiceError::WorkerUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });

        (status, axum::Json(body)).into_response()
    }
}
