// src/sources/tls.rs
use crate::engine::RunContext;
use crate::sources::headers::probe_url;
use crate::sources::{wrong_target, Source};
use crate::task::TaskOutcome;
use crate::types::{ReconError, SourceInfo, Target, TargetKind};
use async_trait::async_trait;
use reqwest::tls::TlsInfo;
use std::net::IpAddr;
use x509_parser::extensions::GeneralName;

const HTTPS_PORT: u16 = 443;

/// Common name and DNS alternative names of the certificate an address
/// presents over HTTPS.
#[derive(Debug, Clone)]
pub struct TlsSource {
    name: String,
    port: u16,
}

impl Default for TlsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsSource {
    pub fn new() -> Self {
        Self {
            name: "tls".to_string(),
            port: HTTPS_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn peer_certificate(&self, ip: &IpAddr, ctx: &RunContext) -> Result<Vec<u8>, ReconError> {
        let url = format!("{}:{}/", probe_url("https", ip), self.port);
        let response = ctx
            .session
            .probe_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ReconError::NetworkError(e.to_string()))?;

        response
            .extensions()
            .get::<TlsInfo>()
            .and_then(|info| info.peer_certificate())
            .map(|der| der.to_vec())
            .ok_or_else(|| ReconError::NotFound(format!("{}: no peer certificate", url)))
    }
}

/// Subject common names first, then DNS alternative names, without repeats.
pub fn certificate_hostnames(der: &[u8]) -> Result<Vec<String>, ReconError> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| ReconError::ParseError(format!("Invalid certificate: {}", e)))?;

    let mut names: Vec<String> = cert
        .subject()
        .iter_common_name()
        .filter_map(|cn| cn.as_str().ok())
        .map(str::to_string)
        .collect();

    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for general_name in &san.value.general_names {
            if let GeneralName::DNSName(dns_name) = general_name {
                names.push(dns_name.to_string());
            }
        }
    }

    let mut unique = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim().to_string();
        if !name.is_empty() && !unique.contains(&name) {
            unique.push(name);
        }
    }
    Ok(unique)
}

#[async_trait]
impl Source for TlsSource {
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
        let names = match self.peer_certificate(ip, ctx).await {
            Ok(der) => certificate_hostnames(&der),
            Err(e) => Err(e),
        };
        match names {
            Ok(names) if names.is_empty() => {
                outcome.add_error(ReconError::NotFound(format!("{}: certificate names no host", ip)))
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_support::context;
    use crate::testing::FakeDns;

    const EXAMPLE_CERT: &[u8] = include_bytes!("testdata/example_cert.der");

    #[test]
    fn test_certificate_hostnames() {
        let names = certificate_hostnames(EXAMPLE_CERT).unwrap();
        assert_eq!(names, vec!["www.example.com", "mail.example.com"]);
    }

    #[test]
    fn test_garbage_certificate_is_error() {
        assert!(matches!(
            certificate_hostnames(b"not a certificate"),
            Err(ReconError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_port_is_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let ctx = context(FakeDns::new());
        let outcome = TlsSource::new()
            .with_port(port)
            .probe(&Target::Ip("127.0.0.1".parse().unwrap()), &ctx)
            .await;
        assert!(outcome.has_errors());
        assert!(!outcome.has_results());
    }
}
