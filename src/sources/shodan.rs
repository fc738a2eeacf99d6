// src/sources/shodan.rs
use crate::engine::RunContext;
use crate::sources::{wrong_target, Source};
use crate::task::TaskOutcome;
use crate::types::{ReconError, SourceInfo, Target, TargetKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;

const SHODAN_URL: &str = "https://api.shodan.io";

/// Reverse DNS names Shodan has recorded for an address.
#[derive(Debug, Clone)]
pub struct ShodanSource {
    name: String,
    base_url: String,
    api_keys: Vec<String>,
}

impl Default for ShodanSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ShodanSource {
    pub fn new() -> Self {
        Self::with_base_url(SHODAN_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            name: "shodan".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_keys: Vec::new(),
        }
    }

    pub fn with_api_keys(mut self, keys: Vec<String>) -> Self {
        self.api_keys = keys;
        self
    }

    fn get_random_api_key(&self) -> Option<&String> {
        use rand::seq::SliceRandom;
        self.api_keys.choose(&mut rand::thread_rng())
    }

    async fn hostnames(&self, ip: &IpAddr, api_key: &str, ctx: &RunContext) -> Result<Vec<String>, ReconError> {
        ctx.session.wait_for_rate_limit(&self.name).await;

        let url = format!(
            "{}/dns/reverse?ips={}&key={}",
            self.base_url,
            ip,
            urlencoding::encode(api_key)
        );
        // `{"<ip>": ["name", ...]}`, with null for unknown addresses.
        let mut response: HashMap<String, Option<Vec<String>>> =
            ctx.session.get_json(&url).await.map_err(|e| ReconError::SourceError {
                source_name: self.name.clone(),
                message: format!("Shodan API request failed: {}", e),
            })?;

        Ok(response.remove(&ip.to_string()).flatten().unwrap_or_default())
    }
}

#[async_trait]
impl Source for ShodanSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            target: TargetKind::Ip,
            active: false,
            needs_key: true,
        }
    }

    fn clone_source(&self) -> Box<dyn Source> {
        Box::new(self.clone())
    }

    async fn probe(&self, target: &Target, ctx: &RunContext) -> TaskOutcome {
        let Target::Ip(ip) = target else {
            return wrong_target(&self.name, target);
        };

        let Some(api_key) = self.get_random_api_key().cloned() else {
            return TaskOutcome::failed(
                &self.name,
                ReconError::SourceError {
                    source_name: self.name.clone(),
                    message: "No API key configured".to_string(),
                },
            );
        };

        let mut outcome = TaskOutcome::new(&self.name);
        match self.hostnames(ip, &api_key, ctx).await {
            Ok(names) if names.is_empty() => outcome.add_error(ReconError::NotFound(ip.to_string())),
            Ok(names) => {
                for name in names {
                    outcome.add_result(ip.to_string(), name);
                }
            }
            Err(e) => outcome.add_error(e),
        }
        outcome
    }
}
