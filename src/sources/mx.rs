// src/sources/mx.rs
use crate::engine::RunContext;
use crate::sources::{add_resolved, wrong_target, Source};
use crate::task::TaskOutcome;
use crate::types::{SourceInfo, Target, TargetKind};
use async_trait::async_trait;

/// Mail exchangers of a domain and their addresses.
#[derive(Debug, Clone)]
pub struct MxSource {
    name: String,
}

impl Default for MxSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MxSource {
    pub fn new() -> Self {
        Self { name: "mx".to_string() }
    }
}

#[async_trait]
impl Source for MxSource {
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
        match ctx.dns.resolve_mx(domain).await {
            Ok(exchanges) => {
                for exchange in exchanges {
                    add_resolved(&mut outcome, ctx.dns.as_ref(), &exchange).await;
                }
            }
            Err(e) => outcome.add_error(e),
        }
        outcome
    }
}
