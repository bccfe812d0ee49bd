use crate::llm::{LlmSettings, Provider, provider::DEFAULT_AZURE_API_VERSION};
use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Key value shipped in `.env` templates; treated as "no key configured".
pub const PLACEHOLDER_API_KEY: &str = "your-openai-api-key-here";

/// Config file picked up from the working directory when none is named.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Seconds of inactivity before a conversation is dropped (0 keeps them forever)
    #[arg(long)]
    pub session_idle_timeout: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sessions: SessionConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Whole-request deadline enforced by middleware.
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// 0 disables idle eviction.
    pub idle_timeout_secs: u64,
    /// 0 means unbounded.
    pub max_sessions: usize,
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    /// Idle timeout, or `None` when sweeping is disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Deadline for a single model turn.
    pub request_timeout_secs: u64,
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    /// Layered load: defaults, config file, `TUTOR_` env vars, then CLI flags.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.request_timeout_secs", 120)?
            .set_default("server.body_limit_bytes", 1024 * 1024)?
            .set_default("sessions.idle_timeout_secs", 3600)?
            .set_default("sessions.max_sessions", 1000)?
            .set_default("sessions.sweep_interval_secs", 60)?
            .set_default("llm.request_timeout_secs", 60)?;

        match cli.config.as_deref() {
            Some(path) => {
                builder = builder.add_source(File::new(path, FileFormat::Yaml).required(true));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder
                    .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));
            }
            None => {}
        }

        // E.g. TUTOR_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("TUTOR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(secs) = cli.session_idle_timeout {
            builder = builder.set_override(
                "sessions.idle_timeout_secs",
                i64::try_from(secs).unwrap_or(i64::MAX),
            )?;
        }

        builder.build()?.try_deserialize()
    }
}

/// Model provider settings from the environment.
///
/// Returns `Ok(None)` when no provider is configured (no base URL, or the
/// placeholder key), in which case the service runs offline.
pub fn load_llm_settings() -> Result<Option<LlmSettings>, String> {
    let Some(base_url) = std::env::var("LLM_BASE_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
    else {
        return Ok(None);
    };

    let api_key = std::env::var("LLM_API_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty());
    if api_key.as_deref() == Some(PLACEHOLDER_API_KEY) {
        return Ok(None);
    }

    let model = std::env::var("LLM_MODEL")
        .map_err(|_| "Missing required env var: LLM_MODEL".to_string())?;
    if model.trim().is_empty() {
        return Err("LLM_MODEL cannot be empty".to_string());
    }

    let mut provider = Provider::detect_from_url(&base_url);
    if let Provider::AzureOpenAI { .. } = &provider {
        let deployment_name = std::env::var("AZURE_DEPLOYMENT_NAME")
            .map_err(|_| "AZURE_DEPLOYMENT_NAME is required for Azure OpenAI".to_string())?;
        provider = Provider::AzureOpenAI {
            deployment_name,
            api_version: std::env::var("AZURE_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_AZURE_API_VERSION.to_string()),
        };
    }

    let parallel_tool_calls = std::env::var("LLM_PARALLEL_TOOLS")
        .ok()
        .and_then(|s| s.parse().ok());

    Ok(Some(LlmSettings {
        base_url,
        api_key,
        model,
        provider,
        parallel_tool_calls,
    }))
}
