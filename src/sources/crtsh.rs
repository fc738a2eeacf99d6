// src/sources/crtsh.rs
use crate::engine::RunContext;
use crate::sources::{add_resolved, wrong_target, Source};
use crate::task::TaskOutcome;
use crate::types::{ReconError, SourceInfo, Target, TargetKind};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;

const CRTSH_URL: &str = "https://crt.sh";

#[derive(Debug, Deserialize)]
struct CrtShEntry {
    name_value: String,
}

/// Names from certificate transparency logs, resolved to addresses.
#[derive(Debug, Clone)]
pub struct CrtShSource {
    name: String,
    base_url: String,
}

impl Default for CrtShSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CrtShSource {
    pub fn new() -> Self {
        Self::with_base_url(CRTSH_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            name: "crtsh".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn names(&self, domain: &str, ctx: &RunContext) -> Result<BTreeSet<String>, ReconError> {
        ctx.session.wait_for_rate_limit(&self.name).await;

        let url = format!(
            "{}/?q={}&output=json",
            self.base_url,
            urlencoding::encode(&format!("%.{}", domain))
        );
        let entries: Vec<CrtShEntry> = ctx.session.get_json(&url).await.map_err(|e| {
            ReconError::SourceError {
                source_name: self.name.clone(),
                message: format!("Failed to fetch certificates: {}", e),
            }
        })?;

        Ok(certificate_names(&entries, domain))
    }
}

/// `name_value` may hold several names, one per line. Wildcards and names
/// outside the domain are skipped.
fn certificate_names(entries: &[CrtShEntry], domain: &str) -> BTreeSet<String> {
    let suffix = format!(".{}", domain);
    entries
        .iter()
        .flat_map(|entry| entry.name_value.lines())
        .map(|line| line.trim().to_lowercase())
        .filter(|name| !name.starts_with('*'))
        .filter(|name| name == domain || name.ends_with(&suffix))
        .collect()
}

#[async_trait]
impl Source for CrtShSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            target: TargetKind::Domain,
            active: false,
            needs_key: false,
        }
    }

    fn clone_source(&self) -> Box<dyn Source> {
        Box::new(self.clone())
    }

    async fn probe(&self, target: &Target, ctx: &RunContext) -> TaskOutcome {
        let Target::Domain(domain) = target else {
            return wrong_target(&self.name, target);
        };

        let mut outcome = TaskOutcome::new(&self.name);
        match self.names(domain, ctx).await {
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
