// src/config.rs
use crate::types::{Config, OutputFormat, ReconError};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// On-disk layout. Every key is optional; missing keys keep the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    concurrency: Option<usize>,
    timeout_ms: Option<u64>,
    user_agent: Option<String>,
    proxy: Option<String>,
    validate: Option<bool>,
    fcrdns: Option<bool>,
    ipv6: Option<bool>,
    dictionary: Option<PathBuf>,
    sources: Option<Vec<String>>,
    #[serde(default)]
    rate_limits: HashMap<String, u32>,
    #[serde(default)]
    api_keys: HashMap<String, Vec<String>>,
    #[serde(default)]
    resolver: FileResolver,
    #[serde(default)]
    output: FileOutput,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileResolver {
    server: Option<String>,
    timeout_ms: Option<u64>,
    attempts: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileOutput {
    format: Option<OutputFormat>,
    file: Option<String>,
    silent: Option<bool>,
}

pub fn load_config(config_path: &Path) -> Result<Config, ReconError> {
    let contents = fs::read_to_string(config_path).map_err(|e| {
        ReconError::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.display(),
            e
        ))
    })?;

    let mut config = parse_config(&contents)?;
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

/// Defaults plus environment overrides, for runs without a config file.
pub fn default_config() -> Result<Config, ReconError> {
    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn parse_config(contents: &str) -> Result<Config, ReconError> {
    let file: FileConfig = toml::from_str(contents)
        .map_err(|e| ReconError::ConfigError(format!("Failed to parse config file: {}", e)))?;

    let mut config = Config::default();
    merge(&mut config, file);
    Ok(config)
}

fn merge(config: &mut Config, file: FileConfig) {
    if let Some(concurrency) = file.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(ms) = file.timeout_ms {
        config.timeout = Duration::from_millis(ms);
    }
    if let Some(user_agent) = file.user_agent {
        config.user_agent = user_agent;
    }
    if file.proxy.is_some() {
        config.proxy = file.proxy;
    }
    config.validate = file.validate.unwrap_or(config.validate);
    config.fcrdns = file.fcrdns.unwrap_or(config.fcrdns);
    config.ipv6 = file.ipv6.unwrap_or(config.ipv6);
    if file.dictionary.is_some() {
        config.dictionary = file.dictionary;
    }
    if let Some(sources) = file.sources {
        config.sources = sources;
    }
    for (source, limit) in file.rate_limits {
        config.rate_limits.insert(source, Some(limit));
    }
    for (source, keys) in file.api_keys {
        config.api_keys.insert(source.to_lowercase(), clean_keys(keys));
    }

    if let Some(server) = file.resolver.server {
        config.resolver.server = server;
    }
    if let Some(ms) = file.resolver.timeout_ms {
        config.resolver.timeout = Duration::from_millis(ms);
    }
    if let Some(attempts) = file.resolver.attempts {
        config.resolver.attempts = attempts;
    }

    if let Some(format) = file.output.format {
        config.output.format = format;
    }
    if file.output.file.is_some() {
        config.output.file = file.output.file;
    }
    config.output.silent = file.output.silent.unwrap_or(config.output.silent);
}

/// Environment variables holding comma-separated API keys, by source.
const API_KEY_VARS: &[(&str, &str)] = &[
    ("shodan", "SHODAN_API_KEYS"),
    ("virustotal", "VIRUSTOTAL_API_KEYS"),
];

fn clean_keys(keys: Vec<String>) -> Vec<String> {
    keys.into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

fn apply_env_overrides(config: &mut Config) -> Result<(), ReconError> {
    apply_overrides_from(config, |key| env::var(key).ok())
}

fn apply_overrides_from<F>(config: &mut Config, lookup: F) -> Result<(), ReconError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(server) = lookup("HOSTRECON_SERVER") {
        config.resolver.server = server;
    }
    if let Some(value) = lookup("HOSTRECON_CONCURRENCY") {
        config.concurrency = value.trim().parse().map_err(|_| {
            ReconError::ConfigError(format!("HOSTRECON_CONCURRENCY is not a number: {}", value))
        })?;
    }
    if let Some(value) = lookup("HOSTRECON_TIMEOUT_MS") {
        let ms: u64 = value.trim().parse().map_err(|_| {
            ReconError::ConfigError(format!("HOSTRECON_TIMEOUT_MS is not a number: {}", value))
        })?;
        config.timeout = Duration::from_millis(ms);
    }
    for &(source, var) in API_KEY_VARS {
        if let Some(keys) = lookup(var) {
            let keys = clean_keys(keys.split(',').map(str::to_string).collect());
            config.api_keys.insert(source.to_string(), keys);
        }
    }
    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ReconError> {
    if config.concurrency == 0 {
        return Err(ReconError::ConfigError("Concurrency must be greater than 0".to_string()));
    }
    if config.timeout.is_zero() {
        return Err(ReconError::ConfigError("Timeout must be greater than 0".to_string()));
    }
    if config.resolver.timeout.is_zero() {
        return Err(ReconError::ConfigError("Resolver timeout must be greater than 0".to_string()));
    }
    if config.resolver.attempts == 0 {
        return Err(ReconError::ConfigError("Resolver attempts must be greater than 0".to_string()));
    }
    crate::resolver::parse_server_addr(&config.resolver.server)?;
    Ok(())
}
