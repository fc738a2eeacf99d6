// src/sources/headers.rs
use crate::engine::RunContext;
use crate::sources::{wrong_target, Source};
use crate::task::TaskOutcome;
use crate::types::{ReconError, SourceInfo, Target, TargetKind};
use async_trait::async_trait;
use reqwest::header::LOCATION;
use std::net::IpAddr;
use url::Url;

/// Hostnames leaked through the `Location` header of plain requests to an IP.
#[derive(Debug, Clone)]
pub struct HeadersSource {
    name: String,
}

impl Default for HeadersSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadersSource {
    pub fn new() -> Self {
        Self { name: "headers".to_string() }
    }

    async fn location_host(&self, url: &str, ctx: &RunContext) -> Result<String, ReconError> {
        let response = ctx
            .session
            .probe_client
            .get(url)
            .send()
            .await
            .map_err(|e| ReconError::NetworkError(e.to_string()))?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ReconError::NotFound(format!("{}: no Location header", url)))?;

        hostname_from_location(location)
            .ok_or_else(|| ReconError::ParseError(format!("{}: unsuccessful header match", url)))
    }
}

pub(crate) fn probe_url(proto: &str, ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => format!("{}://{}", proto, v4),
        IpAddr::V6(v6) => format!("{}://[{}]", proto, v6),
    }
}

/// Host part of a `Location` value, when it looks like a name rather than an
/// address.
pub fn hostname_from_location(location: &str) -> Option<String> {
    let url = Url::parse(location).ok()?;
    let host = url.host_str()?;
    if host.chars().any(|c| c.is_ascii_alphabetic()) && !host.starts_with('[') {
        Some(host.to_string())
    } else {
        None
    }
}

#[async_trait]
impl Source for HeadersSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            target: TargetKind::Ip,
            active: true,
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
        let mut failures = Vec::new();
        for proto in ["http", "https"] {
            match self.location_host(&probe_url(proto, ip), ctx).await {
                Ok(host) => outcome.add_result(ip.to_string(), host),
                Err(e) => failures.push(e),
            }
        }

        // A hit on either protocol is enough.
        if !outcome.has_results() {
            for e in failures {
                outcome.add_error(e);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_support::context;
    use crate::testing::FakeDns;

    #[test]
    fn test_hostname_from_location() {
        assert_eq!(
            hostname_from_location("https://intranet.example.com/login"),
            Some("intranet.example.com".to_string())
        );
        assert_eq!(
            hostname_from_location("http://portal.example.com:8080/"),
            Some("portal.example.com".to_string())
        );
        assert_eq!(hostname_from_location("https://192.0.2.1/"), None);
        assert_eq!(hostname_from_location("https://[2001:db8::1]/"), None);
        assert_eq!(hostname_from_location("/relative/path"), None);
    }

    #[test]
    fn test_probe_url_brackets_ipv6() {
        assert_eq!(probe_url("http", &"192.0.2.1".parse().unwrap()), "http://192.0.2.1");
        assert_eq!(probe_url("https", &"2001:db8::1".parse().unwrap()), "https://[2001:db8::1]");
    }

    #[tokio::test]
    async fn test_location_host_from_server() {
        let mut server = mockito::Server::new_async().await;
        let redirect = server
            .mock("GET", "/")
            .with_status(301)
            .with_header("location", "https://www.example.com/")
            .create_async()
            .await;

        let ctx = context(FakeDns::new());
        let source = HeadersSource::new();
        let host = source.location_host(&server.url(), &ctx).await.unwrap();
        assert_eq!(host, "www.example.com");
        redirect.assert_async().await;
    }

    #[tokio::test]
    async fn test_location_missing_is_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/").with_status(200).create_async().await;

        let ctx = context(FakeDns::new());
        let err = HeadersSource::new()
            .location_host(&server.url(), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::NotFound(_)));
    }
}
