// src/sources/virustotal.rs
use crate::engine::RunContext;
use crate::sources::{add_resolved, wrong_target, Source};
use crate::task::TaskOutcome;
use crate::types::{ReconError, SourceInfo, Target, TargetKind};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;

const VIRUSTOTAL_URL: &str = "https://www.virustotal.com";

#[derive(Debug, Deserialize)]
struct VirusTotalResponse {
    data: Vec<VirusTotalData>,
}

#[derive(Debug, Deserialize)]
struct VirusTotalData {
    id: String,
}

/// Subdomains VirusTotal has observed, resolved to addresses.
#[derive(Debug, Clone)]
pub struct VirusTotalSource {
    name: String,
    base_url: String,
    api_keys: Vec<String>,
}

impl Default for VirusTotalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl VirusTotalSource {
    pub fn new() -> Self {
        Self::with_base_url(VIRUSTOTAL_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            name: "virustotal".to_string(),
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

    async fn subdomains(&self, domain: &str, api_key: &str, ctx: &RunContext) -> Result<BTreeSet<String>, ReconError> {
        ctx.session.wait_for_rate_limit(&self.name).await;

        let url = format!("{}/api/v3/domains/{}/subdomains?limit=40", self.base_url, domain);
        let data: VirusTotalResponse = ctx
            .session
            .get_json_with_headers(&url, &[("x-apikey", api_key)])
            .await
            .map_err(|e| ReconError::SourceError {
                source_name: self.name.clone(),
                message: format!("Request failed: {}", e),
            })?;

        let suffix = format!(".{}", domain);
        Ok(data
            .data
            .into_iter()
            .map(|item| item.id.trim().to_lowercase())
            .filter(|name| name.ends_with(&suffix))
            .collect())
    }
}

#[async_trait]
impl Source for VirusTotalSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            target: TargetKind::Domain,
            active: false,
            needs_key: true,
        }
    }

    fn clone_source(&self) -> Box<dyn Source> {
        Box::new(self.clone())
    }

    async fn probe(&self, target: &Target, ctx: &RunContext) -> TaskOutcome {
        let Target::Domain(domain) = target else {
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
        match self.subdomains(domain, &api_key, ctx).await {
            Ok(names) => {
                for name in names {
                    add_resolved(&mut outcome, ctx.dns.as_ref(), &name).await;
                }
            }
            Err(e) => outcome.add_error(e),
        }
        outcome
    }
}
