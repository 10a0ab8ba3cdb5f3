use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

use crate::engine::ResponseOptions;

const DEFAULT_REGISTRY_URL: &str =
    "https://raw.githubusercontent.com/mozilla/firefox-translations-models/refs/heads/main/registry.json";
const DEFAULT_ARTIFACT_MIRROR_URL: &str =
    "https://github.com/mozilla/firefox-translations-models/raw/refs/heads/main";
const DEFAULT_ARTIFACT_PROXY_URL: &str = "https://corsproxy.io/?url=";

/// Marian decoder options handed verbatim to the engine for every model.
///
/// Whitespace and ordering are part of the engine's expected format.
pub const MODEL_CONFIG: &str = "beam-size: 1
normalize: 1.0
word-penalty: 0
max-length-break: 128
mini-batch-words: 1024
workspace: 128
max-length-factor: 2.0
skip-cost: true
cpu-threads: 0
quiet: true
quiet-translation: true
gemm-precision: int8shiftAll
";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    /// Trusted source of the registry; never routed through the proxy.
    pub registry_url: String,
    pub artifact_mirror_url: String,
    pub artifact_proxy_url: Option<String>,
    pub version_tag: String,
    pub model_alignment: usize,
    pub shortlist_alignment: usize,
    pub vocab_alignment: usize,
    pub command_queue_depth: usize,
    /// Passed to the engine with every translation batch.
    pub response_options: ResponseOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::from_lookup(|key| env::var(key).ok()))
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("SERVER_ADDR")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080));

        let registry_url =
            lookup("MODEL_REGISTRY_URL").unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());
        let artifact_mirror_url = lookup("ARTIFACT_MIRROR_URL")
            .unwrap_or_else(|| DEFAULT_ARTIFACT_MIRROR_URL.to_string());
        let artifact_proxy_url = match lookup("ARTIFACT_PROXY_URL") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(v),
            None => Some(DEFAULT_ARTIFACT_PROXY_URL.to_string()),
        };
        let version_tag =
            lookup("ENGINE_VERSION_TAG").unwrap_or_else(|| "github latest".to_string());

        let parse_usize = |key: &str, default: usize| {
            lookup(key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        let parse_flag = |key: &str| {
            lookup(key).is_some_and(|v| {
                matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
            })
        };

        Self {
            listen_addr,
            registry_url,
            artifact_mirror_url,
            artifact_proxy_url,
            version_tag,
            model_alignment: parse_usize("MODEL_ALIGNMENT", 256),
            shortlist_alignment: parse_usize("SHORTLIST_ALIGNMENT", 64),
            vocab_alignment: parse_usize("VOCAB_ALIGNMENT", 64),
            command_queue_depth: parse_usize("COMMAND_QUEUE_DEPTH", 32).max(1),
            response_options: ResponseOptions {
                quality_scores: parse_flag("RESPONSE_QUALITY_SCORES"),
                alignment: parse_flag("RESPONSE_ALIGNMENT"),
                html: parse_flag("RESPONSE_HTML"),
            },
        }
    }

    /// Base URL that artifact paths are appended to, proxy prefix included.
    pub fn artifact_base_url(&self) -> String {
        let mirror = self.artifact_mirror_url.trim_end_matches('/');
        match &self.artifact_proxy_url {
            Some(proxy) => format!("{proxy}{mirror}"),
            None => mirror.to_string(),
        }
    }
}
