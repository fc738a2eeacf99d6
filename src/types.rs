// src/types.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    /// Number of workers draining the task queue.
    pub concurrency: usize,
    /// Socket timeout for active probes (HTTP headers).
    pub timeout: Duration,
    pub user_agent: String,
    pub proxy: Option<String>,
    pub rate_limits: HashMap<String, Option<u32>>,
    /// API keys per source name.
    pub api_keys: HashMap<String, Vec<String>>,
    pub validate: bool,
    pub fcrdns: bool,
    pub ipv6: bool,
    pub debug: bool,
    pub dictionary: Option<PathBuf>,
    pub output: OutputConfig,
    pub resolver: ResolverConfig,
    pub sources: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut rate_limits = HashMap::new();
        rate_limits.insert("crtsh".to_string(), Some(1));
        rate_limits.insert("hackertarget".to_string(), Some(1));
        rate_limits.insert("shodan".to_string(), Some(1));
        rate_limits.insert("virustotal".to_string(), Some(1));

        Self {
            concurrency: 100,
            timeout: Duration::from_millis(600),
            user_agent: format!("hostrecon/{}", env!("CARGO_PKG_VERSION")),
            proxy: None,
            rate_limits,
            api_keys: HashMap::new(),
            validate: false,
            fcrdns: false,
            ipv6: false,
            debug: false,
            dictionary: None,
            output: OutputConfig::default(),
            resolver: ResolverConfig::default(),
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<String>,
    pub silent: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
    Clean,
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// DNS server every query is sent to, with or without a port.
    pub server: String,
    pub timeout: Duration,
    pub attempts: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            server: "8.8.8.8".to_string(),
            timeout: Duration::from_secs(2),
            attempts: 1,
        }
    }
}

/// A single `(source, ip, hostname)` finding. The whole triple is the
/// deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostResult {
    #[serde(rename = "src")]
    pub source: String,
    pub ip: String,
    pub hostname: String,
}

impl HostResult {
    pub fn new(source: impl Into<String>, ip: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ip: ip.into(),
            hostname: hostname.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Ip(IpAddr),
    Domain(String),
}

impl Target {
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Ip(_) => TargetKind::Ip,
            Target::Domain(_) => TargetKind::Domain,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Ip(ip) => write!(f, "{}", ip),
            Target::Domain(domain) => f.write_str(domain),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Ip,
    Domain,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub tasks_submitted: usize,
    pub outcomes_received: usize,
    pub failed_tasks: usize,
    pub unique_results: usize,
    pub sources_used: Vec<String>,
    pub duration: Duration,
}

pub struct SourceInfo {
    pub name: String,
    pub target: TargetKind,
    /// Active sources talk to the targets themselves.
    pub active: bool,
    pub needs_key: bool,
}

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source error in {source_name}: {message}")]
    SourceError {
        source_name: String,
        message: String,
    },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No answer for {0}")]
    NotFound(String),

    #[error("Resolution error: {0}")]
    ResolutionError(String),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("Task {0} panicked: {1}")]
    TaskPanicked(String, String),

    #[error("Task queue closed")]
    QueueClosed,

    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_result_wire_shape() {
        let result = HostResult::new("Reverse", "10.0.0.1", "host.example.com");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"src": "Reverse", "ip": "10.0.0.1", "hostname": "host.example.com"})
        );

        let parsed: HostResult =
            serde_json::from_str(r#"{"src":"ns","ip":"1.2.3.4","hostname":"ns1.example.com"}"#).unwrap();
        assert_eq!(parsed, HostResult::new("ns", "1.2.3.4", "ns1.example.com"));
    }

    #[test]
    fn test_target_display() {
        assert_eq!(Target::Ip("10.1.1.1".parse().unwrap()).to_string(), "10.1.1.1");
        assert_eq!(Target::Domain("example.com".to_string()).to_string(), "example.com");
        assert_eq!(Target::Domain("example.com".to_string()).kind(), TargetKind::Domain);
    }
}
