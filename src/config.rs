//! Configuration management for the qaserve service.
//!
//! Sources, in order of precedence (later sources override earlier ones):
//! 1. Default configuration embedded in the binary (`config/default.toml`)
//! 2. System-wide configuration file (`/etc/qaserve/config.toml`)
//! 3. User-specified configuration file (`--config`)
//! 4. Environment variables prefixed with `QASERVE_` (`__` separates nesting,
//!    e.g. `QASERVE_MODEL__NAME`)
//! 5. Vertex AI serving variables `AIP_HTTP_PORT` and `AIP_HEALTH_ROUTE`
//! 6. Command-line arguments
//!
//! # Credentials
//!
//! The Hugging Face token is read from `auth_token`, falling back to
//! `HF_TOKEN`. It is never read from a file and never serialized.

use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{QaError, Result};
use crate::runtime::span::SpanStrategy;

/// Environment variables consulted for the registry token, in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["auth_token", "HF_TOKEN"];

const RESERVED_ROUTES: [&str; 2] = ["/qa", "/model"];

/// Configuration flags shared by every subcommand
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Hub model identifier or path to a local model directory
    #[arg(short, long)]
    pub model: Option<String>,

    /// Directory holding downloaded models
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Allow running on CUDA or Metal when available
    #[arg(long)]
    pub use_gpu: Option<bool>,

    /// Span selection strategy
    #[arg(long, value_enum)]
    pub span_strategy: Option<SpanStrategy>,

    /// Maximum number of tokens fed to the model
    #[arg(long)]
    pub max_seq_len: Option<usize>,
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub server: ServerSettings,
    pub model: ModelSettings,
    /// Registry token, taken from the environment only
    #[serde(skip)]
    pub auth_token: Option<String>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path answering the liveness check
    #[serde(default = "default_health_route")]
    pub health_route: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Model resolution and inference settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Hub identifier (`org/name`) or local directory
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Cache directory; XDG data home when unset
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_use_gpu")]
    pub use_gpu: bool,
    #[serde(default = "default_max_seq_len")]
    pub max_seq_len: usize,
    #[serde(default)]
    pub span_strategy: SpanStrategy,
    #[serde(default = "default_max_answer_len")]
    pub max_answer_len: usize,
}

impl ServiceConfig {
    /// Load configuration from all sources using the process environment
    pub fn load(args: &ConfigArgs) -> Result<Self> {
        Self::load_with_env(args, |key| std::env::var(key).ok())
    }

    /// Load configuration, resolving platform variables and the token through `lookup`
    pub fn load_with_env<F>(args: &ConfigArgs, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name("/etc/qaserve/config.toml").required(false));

        if let Some(path) = &args.config {
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("QASERVE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: ServiceConfig = builder.build()?.try_deserialize()?;

        config.apply_platform_env(&lookup)?;
        config.apply_args(args);
        config.auth_token = TOKEN_ENV_VARS
            .iter()
            .filter_map(|key| lookup(key))
            .find(|token| !token.trim().is_empty());

        Ok(config)
    }

    fn apply_platform_env<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("AIP_HTTP_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| QaError::Config(format!("Invalid AIP_HTTP_PORT '{}': {}", port, e)))?;
        }
        if let Some(route) = lookup("AIP_HEALTH_ROUTE") {
            self.server.health_route = route;
        }
        Ok(())
    }

    fn apply_args(&mut self, args: &ConfigArgs) {
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(model) = &args.model {
            self.model.name = model.clone();
        }
        if let Some(dir) = &args.cache_dir {
            self.model.cache_dir = Some(dir.clone());
        }
        if let Some(use_gpu) = args.use_gpu {
            self.model.use_gpu = use_gpu;
        }
        if let Some(strategy) = args.span_strategy {
            self.model.span_strategy = strategy;
        }
        if let Some(len) = args.max_seq_len {
            self.model.max_seq_len = len;
        }
    }

    /// Startup checks. Runs once, before any model work or request handling.
    pub fn validate(&self) -> Result<()> {
        if self.auth_token.is_none() {
            return Err(QaError::Config(format!(
                "Hugging Face token is not set (expected one of: {})",
                TOKEN_ENV_VARS.join(", ")
            )));
        }
        if !self.server.health_route.starts_with('/') {
            return Err(QaError::Config(format!(
                "Health route must start with '/': {}",
                self.server.health_route
            )));
        }
        if RESERVED_ROUTES.contains(&self.server.health_route.as_str()) {
            return Err(QaError::Config(format!(
                "Health route {} collides with an API route",
                self.server.health_route
            )));
        }
        if self.model.name.trim().is_empty() {
            return Err(QaError::Config("Model name is empty".to_string()));
        }
        if self.model.max_seq_len < 8 {
            return Err(QaError::Config(format!(
                "max_seq_len {} is too small",
                self.model.max_seq_len
            )));
        }
        if self.model.max_answer_len == 0 {
            return Err(QaError::Config("max_answer_len must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Cache directory, falling back to the XDG data home
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.model.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::storage::paths::StoragePaths::new()?.models_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_health_route() -> String {
    "/health".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_model_name() -> String {
    "deepset/bert-base-cased-squad2".to_string()
}

fn default_use_gpu() -> bool {
    true
}

fn default_max_seq_len() -> usize {
    512
}

fn default_max_answer_len() -> usize {
    30
}
