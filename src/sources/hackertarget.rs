// src/sources/hackertarget.rs
use crate::engine::RunContext;
use crate::sources::{wrong_target, Source};
use crate::task::TaskOutcome;
use crate::types::{ReconError, SourceInfo, Target, TargetKind};
use async_trait::async_trait;

const HACKERTARGET_URL: &str = "https://api.hackertarget.com";

/// HackerTarget host search. Answers already carry addresses, so nothing is
/// resolved locally.
#[derive(Debug, Clone)]
pub struct HackerTargetSource {
    name: String,
    base_url: String,
}

impl Default for HackerTargetSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HackerTargetSource {
    pub fn new() -> Self {
        Self::with_base_url(HACKERTARGET_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            name: "hackertarget".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Parses `host,ip` lines, keeping hosts inside `domain`.
fn parse_hostsearch(body: &str, domain: &str) -> Result<Vec<(String, String)>, String> {
    let suffix = format!(".{}", domain);
    let mut pairs = Vec::new();

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("error") || line.starts_with("API count exceeded") {
            return Err(line.to_string());
        }

        let Some((host, ip)) = line.split_once(',') else {
            continue;
        };
        let host = host.trim().to_lowercase();
        let ip = ip.trim();
        if ip.is_empty() || (host != domain && !host.ends_with(&suffix)) {
            continue;
        }
        pairs.push((ip.to_string(), host));
    }
    Ok(pairs)
}

#[async_trait]
impl Source for HackerTargetSource {
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

        ctx.session.wait_for_rate_limit(&self.name).await;

        let url = format!(
            "{}/hostsearch/?q={}",
            self.base_url,
            urlencoding::encode(domain)
        );
        let mut outcome = TaskOutcome::new(&self.name);
        let parsed = match ctx.session.get_text(&url).await {
            Ok(body) => parse_hostsearch(&body, domain),
            Err(e) => Err(format!("Failed to fetch data: {}", e)),
        };

        match parsed {
            Ok(pairs) => {
                for (ip, host) in pairs {
                    outcome.add_result(ip, host);
                }
            }
            Err(message) => outcome.add_error(ReconError::SourceError {
                source_name: self.name.clone(),
                message,
            }),
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

    #[test]
    fn test_parse_hostsearch() {
        let body = "www.example.com,192.0.2.80\nMAIL.example.com, 192.0.2.25\n\nother.org,192.0.2.1\nbroken-line\n";
        let pairs = parse_hostsearch(body, "example.com").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("192.0.2.80".to_string(), "www.example.com".to_string()),
                ("192.0.2.25".to_string(), "mail.example.com".to_string()),
            ]
        );

        assert!(parse_hostsearch("error check your search parameter", "example.com").is_err());
    }

    #[tokio::test]
    async fn test_hackertarget_results() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/hostsearch/")
            .match_query(mockito::Matcher::UrlEncoded("q".into(), "example.com".into()))
            .with_status(200)
            .with_body("www.example.com,192.0.2.80\n")
            .create_async()
            .await;

        let ctx = context(FakeDns::new());
        let outcome = HackerTargetSource::with_base_url(&server.url())
            .probe(&Target::Domain("example.com".to_string()), &ctx)
            .await;

        assert!(!outcome.has_errors());
        assert_eq!(
            outcome.results,
            vec![HostResult::new("hackertarget", "192.0.2.80", "www.example.com")]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_hackertarget_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/hostsearch/")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("API count exceeded - Increase Quota with Membership")
            .create_async()
            .await;

        let ctx = context(FakeDns::new());
        let outcome = HackerTargetSource::with_base_url(&server.url())
            .probe(&Target::Domain("example.com".to_string()), &ctx)
            .await;
        assert!(outcome.has_errors());
        assert!(!outcome.has_results());
    }
}
