// src/sources/reverse.rs
use crate::engine::RunContext;
use crate::sources::{wrong_target, Source};
use crate::task::TaskOutcome;
use crate::types::{SourceInfo, Target, TargetKind};
use async_trait::async_trait;

/// PTR lookup for each address.
#[derive(Debug, Clone)]
pub struct ReverseSource {
    name: String,
}

impl Default for ReverseSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ReverseSource {
    pub fn new() -> Self {
        Self { name: "reverse".to_string() }
    }
}

#[async_trait]
impl Source for ReverseSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            target: TargetKind::Ip,
            active: false,
            needs_key: false,
        }
    }

    fn clone_source(&self) -> Box<dyn Source> {
        Box::new(self.clone())
    }

    async fn probe(&self, target: &Target, ctx: &RunContext) -> TaskOutcome {
        let Target::Ip(ip) = target else {
            return wrong_target(&self.name, target);
        };

        let mut outcome = TaskOutcome::new(&self.name);
        match ctx.dns.resolve_ptr(*ip).await {
            Ok(hostnames) => {
                for hostname in hostnames {
                    outcome.add_result(ip.to_string(), hostname);
                }
            }
            Err(e) => outcome.add_error(e),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_support::context;
    use crate::testing::FakeDns;
    use crate::types::HostResult;

    #[tokio::test]
    async fn test_reverse_lookup() {
        let ctx = context(FakeDns::new().ptr("192.0.2.5", &["mail.example.com", "smtp.example.com"]));
        let source = ReverseSource::new();

        let outcome = source.probe(&Target::Ip("192.0.2.5".parse().unwrap()), &ctx).await;
        assert_eq!(
            outcome.results,
            vec![
                HostResult::new("reverse", "192.0.2.5", "mail.example.com"),
                HostResult::new("reverse", "192.0.2.5", "smtp.example.com"),
            ]
        );

        let missing = source.probe(&Target::Ip("192.0.2.6".parse().unwrap()), &ctx).await;
        assert!(missing.has_errors());
        assert!(!missing.has_results());
    }

    #[tokio::test]
    async fn test_reverse_rejects_domain() {
        let ctx = context(FakeDns::new());
        let outcome = ReverseSource::new()
            .probe(&Target::Domain("example.com".to_string()), &ctx)
            .await;
        assert!(outcome.has_errors());
    }
}
