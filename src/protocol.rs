//! Typed commands and replies, carried on the wire as positional JSON arrays:
//! `["load_model", "fr", "de"]` in, `["load_model_reply", "..."]` out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{ErrorKind, ServiceError},
    model::ModelRegistry,
};

pub const LOAD_SUCCESS_STATUS: &str = "Model successfully loaded";
pub const LOAD_EXPERIMENTAL_SUFFIX: &str = ". This model is experimental";
pub const LOAD_FAILURE_STATUS: &str = "Model loading failed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Value>", into = "Vec<Value>")]
pub enum Command {
    Import,
    LoadModel {
        from: String,
        to: String,
    },
    Translate {
        from: String,
        to: String,
        paragraphs: Vec<String>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Import => "import",
            Command::LoadModel { .. } => "load_model",
            Command::Translate { .. } => "translate",
        }
    }
}

fn string_at(values: &[Value], index: usize, field: &str) -> Result<String, ServiceError> {
    values
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ServiceError::BadCommand(format!("missing string field '{field}'")))
}

impl TryFrom<Vec<Value>> for Command {
    type Error = ServiceError;

    fn try_from(values: Vec<Value>) -> Result<Self, Self::Error> {
        let name = string_at(&values, 0, "command")?;
        match name.as_str() {
            "import" => Ok(Command::Import),
            "load_model" => Ok(Command::LoadModel {
                from: string_at(&values, 1, "from")?,
                to: string_at(&values, 2, "to")?,
            }),
            "translate" => {
                let paragraphs = values
                    .get(3)
                    .cloned()
                    .ok_or_else(|| ServiceError::BadCommand("missing field 'paragraphs'".into()))
                    .and_then(|v| {
                        serde_json::from_value::<Vec<String>>(v).map_err(|e| {
                            ServiceError::BadCommand(format!("invalid paragraphs: {e}"))
                        })
                    })?;
                Ok(Command::Translate {
                    from: string_at(&values, 1, "from")?,
                    to: string_at(&values, 2, "to")?,
                    paragraphs,
                })
            }
            other => Err(ServiceError::BadCommand(format!("unknown command '{other}'"))),
        }
    }
}

impl From<Command> for Vec<Value> {
    fn from(command: Command) -> Self {
        let name = Value::from(command.name());
        match command {
            Command::Import => vec![name],
            Command::LoadModel { from, to } => vec![name, from.into(), to.into()],
            Command::Translate {
                from,
                to,
                paragraphs,
            } => vec![name, from.into(), to.into(), paragraphs.into()],
        }
    }
}

/// Error detail attached to a failed reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ServiceError> for ReplyError {
    fn from(err: &ServiceError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportReply {
    pub registry: Arc<ModelRegistry>,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    Experimental,
}

impl LoadStatus {
    pub fn message(&self) -> String {
        match self {
            LoadStatus::Loaded => LOAD_SUCCESS_STATUS.to_string(),
            LoadStatus::Experimental => format!("{LOAD_SUCCESS_STATUS}{LOAD_EXPERIMENTAL_SUFFIX}"),
        }
    }
}

/// Exactly one reply is produced per command.
#[derive(Debug, Clone, Serialize)]
#[serde(into = "Vec<Value>")]
pub enum Reply {
    Import(Result<ImportReply, ReplyError>),
    LoadModel(Result<LoadStatus, ReplyError>),
    Translate(Result<Vec<String>, ReplyError>),
}

impl Reply {
    pub fn name(&self) -> &'static str {
        match self {
            Reply::Import(_) => "import_reply",
            Reply::LoadModel(_) => "load_model_reply",
            Reply::Translate(_) => "translate_reply",
        }
    }

    pub fn error(&self) -> Option<&ReplyError> {
        match self {
            Reply::Import(Err(e)) | Reply::LoadModel(Err(e)) | Reply::Translate(Err(e)) => Some(e),
            _ => None,
        }
    }
}

fn error_value(err: &ReplyError) -> Value {
    serde_json::to_value(err).unwrap_or(Value::Null)
}

impl From<Reply> for Vec<Value> {
    fn from(reply: Reply) -> Self {
        let name = Value::from(reply.name());
        match reply {
            Reply::Import(Ok(ImportReply { registry, version })) => vec![
                name,
                serde_json::to_value(registry.as_ref()).unwrap_or(Value::Null),
                version.into(),
            ],
            Reply::Import(Err(err)) => vec![name, Value::Null, error_value(&err)],
            Reply::LoadModel(Ok(status)) => vec![name, status.message().into()],
            Reply::LoadModel(Err(err)) => {
                vec![name, LOAD_FAILURE_STATUS.into(), error_value(&err)]
            }
            Reply::Translate(Ok(paragraphs)) => vec![name, paragraphs.into()],
            Reply::Translate(Err(err)) => vec![name, Value::Array(Vec::new()), error_value(&err)],
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn commands_parse_from_positional_arrays() {
        let import: Command = serde_json::from_value(json!(["import"])).unwrap();
        assert_eq!(import, Command::Import);

        let load: Command = serde_json::from_value(json!(["load_model", "fr", "de"])).unwrap();
        assert_eq!(
            load,
            Command::LoadModel {
                from: "fr".into(),
                to: "de".into(),
            }
        );

        let translate: Command =
            serde_json::from_value(json!(["translate", "de", "en", ["Hallo", "Welt"]])).unwrap();
        assert_eq!(
            translate,
            Command::Translate {
                from: "de".into(),
                to: "en".into(),
                paragraphs: vec!["Hallo".into(), "Welt".into()],
            }
        );
        assert_eq!(
            serde_json::to_value(&translate).unwrap(),
            json!(["translate", "de", "en", ["Hallo", "Welt"]])
        );
    }

    #[test]
    fn malformed_commands_are_rejected() {
        for raw in [
            json!([]),
            json!(["load_model", "fr"]),
            json!(["translate", "de", "en", "not a list"]),
            json!(["shutdown"]),
            json!({"command": "import"}),
        ] {
            assert!(serde_json::from_value::<Command>(raw.clone()).is_err(), "{raw}");
        }
    }

    #[test]
    fn load_replies_keep_status_strings() {
        let ok = serde_json::to_value(Reply::LoadModel(Ok(LoadStatus::Loaded))).unwrap();
        assert_eq!(ok, json!(["load_model_reply", "Model successfully loaded"]));

        let experimental =
            serde_json::to_value(Reply::LoadModel(Ok(LoadStatus::Experimental))).unwrap();
        assert_eq!(
            experimental,
            json!([
                "load_model_reply",
                "Model successfully loaded. This model is experimental"
            ])
        );

        let failed = Reply::LoadModel(Err(ReplyError::from(&ServiceError::UnsupportedPair(
            "xxyy".into(),
        ))));
        let value = serde_json::to_value(failed).unwrap();
        assert_eq!(value[1], "Model loading failed");
        assert_eq!(value[2]["kind"], "unsupported_pair");
    }

    #[test]
    fn translate_failure_is_distinguishable() {
        let err = ServiceError::ModelNotLoaded("fren".into());
        let value = serde_json::to_value(Reply::Translate(Err(ReplyError::from(&err)))).unwrap();
        assert_eq!(value[0], "translate_reply");
        assert_eq!(value[1], json!([]));
        assert_eq!(value[2]["kind"], "model_not_loaded");
        assert!(value[2]["message"].as_str().unwrap().contains("'fren'"));
    }

    #[test]
    fn import_reply_echoes_registry_and_version() {
        let registry: ModelRegistry = serde_json::from_value(json!({
            "deen": {
                "model": {"name": "m", "expectedSha256Hash": "aa", "modelType": "prod"},
                "lex": {"name": "l", "expectedSha256Hash": "bb"},
                "vocab": {"name": "v", "expectedSha256Hash": "cc"},
            }
        }))
        .unwrap();
        let reply = Reply::Import(Ok(ImportReply {
            registry: Arc::new(registry),
            version: "github latest".into(),
        }));
        let value = serde_json::to_value(reply).unwrap();
        assert_eq!(value[0], "import_reply");
        assert_eq!(value[1]["deen"]["model"]["name"], "m");
        assert_eq!(value[2], "github latest");
    }
}
