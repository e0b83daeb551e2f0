//! Configuration for the decider and executor.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SNAPFLOW_ENDPOINT, SNAPFLOW_DOMAIN,
//!    SNAPFLOW_TASK_LIST, SNAPFLOW_IDENTITY)
//! 2. Config file (`--config`, else .snapflow/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .snapflow/config.yaml
//! - Falls back to ~/.snapflow/config.yaml

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::{PollRequest, TaskList};
use crate::core::{Pipeline, RetryPolicy};
use crate::decoder::DecodeLimits;

const CONFIG_DIR: &str = ".snapflow";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub pipeline: Option<Pipeline>,
    #[serde(default)]
    pub decoder: Option<DecodeLimits>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    pub endpoint: Option<String>,
    pub domain: Option<String>,
    pub task_list: Option<String>,
    pub identity: Option<String>,
    pub max_page_size: Option<u32>,
    pub request_timeout_seconds: Option<u64>,
    pub execution_context: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollerConfig {
    pub max_in_flight: Option<usize>,
    pub max_poll_failures: Option<u32>,
    pub retry: Option<RetryPolicy>,
}

/// Resolved configuration
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub service: ServiceSettings,
    pub poller: PollerSettings,
    pub pipeline: Pipeline,
    pub decoder: DecodeLimits,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSettings {
    pub endpoint: String,
    pub domain: String,
    pub task_list: String,
    pub identity: String,
    pub max_page_size: u32,
    pub request_timeout_seconds: u64,
    /// Execution context for decisions other than task scheduling
    pub execution_context: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://swf.us-east-1.amazonaws.com".to_string(),
            domain: "snapflow".to_string(),
            task_list: "snapflow-decisions".to_string(),
            identity: "snapflow-decider".to_string(),
            max_page_size: 100,
            request_timeout_seconds: 70,
            execution_context: "Data".to_string(),
        }
    }
}

impl ServiceSettings {
    /// Poll request for these settings; history always newest first
    pub fn poll_request(&self) -> PollRequest {
        PollRequest {
            domain: self.domain.clone(),
            task_list: TaskList {
                name: self.task_list.clone(),
            },
            identity: self.identity.clone(),
            maximum_page_size: self.max_page_size,
            reverse_order: true,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollerSettings {
    pub max_in_flight: usize,
    pub max_poll_failures: u32,
    pub retry: RetryPolicy,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            max_poll_failures: 5,
            retry: RetryPolicy::default(),
        }
    }
}

/// Find config file by searching current directory and parents, then home
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
        .filter(|path| path.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Source of environment overrides
type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Merge file values and environment overrides over the defaults
fn resolve(
    file: ConfigFile,
    config_file: Option<PathBuf>,
    env: EnvLookup<'_>,
) -> Result<ResolvedConfig> {
    let defaults = ServiceSettings::default();
    let service = file.service;

    let service = ServiceSettings {
        endpoint: env("SNAPFLOW_ENDPOINT")
            .or(service.endpoint)
            .unwrap_or(defaults.endpoint),
        domain: env("SNAPFLOW_DOMAIN")
            .or(service.domain)
            .unwrap_or(defaults.domain),
        task_list: env("SNAPFLOW_TASK_LIST")
            .or(service.task_list)
            .unwrap_or(defaults.task_list),
        identity: env("SNAPFLOW_IDENTITY")
            .or(service.identity)
            .unwrap_or(defaults.identity),
        max_page_size: service.max_page_size.unwrap_or(defaults.max_page_size),
        request_timeout_seconds: service
            .request_timeout_seconds
            .unwrap_or(defaults.request_timeout_seconds),
        execution_context: service
            .execution_context
            .unwrap_or(defaults.execution_context),
    };

    let poller_defaults = PollerSettings::default();
    let poller = PollerSettings {
        max_in_flight: file
            .poller
            .max_in_flight
            .unwrap_or(poller_defaults.max_in_flight),
        max_poll_failures: file
            .poller
            .max_poll_failures
            .unwrap_or(poller_defaults.max_poll_failures),
        retry: file.poller.retry.unwrap_or(poller_defaults.retry),
    };

    let pipeline = file.pipeline.unwrap_or_default();
    pipeline
        .validate()
        .with_context(|| format!("Invalid pipeline '{}'", pipeline.name))?;

    Ok(ResolvedConfig {
        service,
        poller,
        pipeline,
        decoder: file.decoder.unwrap_or_default(),
        config_file,
    })
}

/// Load configuration from all sources.
///
/// An explicit path must exist; otherwise the usual locations are searched.
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let config_file = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve(file, config_file, &|key: &str| std::env::var(key).ok())
}

/// The only section the executor reads
#[derive(Debug, Default, Deserialize)]
struct ExecutorConfigFile {
    #[serde(default)]
    decoder: Option<DecodeLimits>,
}

/// Load just the decoder limits, for the executor.
///
/// The rest of the file (pipeline included) is neither parsed nor
/// validated, so a decider misconfiguration never stops a task from
/// reporting its result.
pub fn load_decoder_limits(explicit: Option<&Path>) -> Result<DecodeLimits> {
    let config_file = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    let Some(path) = config_file else {
        return Ok(DecodeLimits::default());
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let file: ExecutorConfigFile = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(file.decoder.unwrap_or_default())
}
