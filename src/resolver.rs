// src/resolver.rs
use crate::types::{ReconError, ResolverConfig};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use trust_dns_resolver::config::{
    NameServerConfig, Protocol, ResolverConfig as DnsResolverConfig, ResolverOpts,
};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::rr::{Name, RData, RecordType};
use trust_dns_resolver::TokioAsyncResolver;

/// Single-query DNS primitives. Every method returns the answers of one
/// query, or `ReconError::NotFound` when there are none.
#[async_trait]
pub trait DnsClient: Send + Sync {
    async fn resolve_a(&self, name: &str) -> Result<Vec<Ipv4Addr>, ReconError>;
    async fn resolve_aaaa(&self, name: &str) -> Result<Vec<Ipv6Addr>, ReconError>;
    async fn resolve_cname(&self, name: &str) -> Result<Vec<String>, ReconError>;
    async fn resolve_ptr(&self, ip: IpAddr) -> Result<Vec<String>, ReconError>;
    async fn resolve_ns(&self, name: &str) -> Result<Vec<String>, ReconError>;
    async fn resolve_mx(&self, name: &str) -> Result<Vec<String>, ReconError>;
    async fn resolve_srv(&self, name: &str) -> Result<Vec<String>, ReconError>;
}

/// `DnsClient` backed by trust-dns, sending every query to one server.
pub struct Resolver {
    resolver: TokioAsyncResolver,
    server: SocketAddr,
}

impl Resolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, ReconError> {
        let server = parse_server_addr(&config.server)?;

        let mut resolver_config = DnsResolverConfig::new();
        resolver_config.add_name_server(NameServerConfig {
            socket_addr: server,
            protocol: Protocol::Udp,
            tls_dns_name: None,
            trust_negative_responses: false,
            bind_addr: None,
        });

        let mut opts = ResolverOpts::default();
        opts.timeout = config.timeout;
        opts.attempts = config.attempts;
        opts.ndots = 0;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
            server,
        })
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    async fn query(&self, name: &str, record_type: RecordType) -> Result<Vec<RData>, ReconError> {
        let fqdn = fqdn(name);
        let lookup = self
            .resolver
            .lookup(fqdn.as_str(), record_type)
            .await
            .map_err(|e| map_resolve_error(name, e))?;
        Ok(lookup.iter().cloned().collect())
    }
}

#[async_trait]
impl DnsClient for Resolver {
    async fn resolve_a(&self, name: &str) -> Result<Vec<Ipv4Addr>, ReconError> {
        let ips: Vec<Ipv4Addr> = self
            .query(name, RecordType::A)
            .await?
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::A(a) => Some(a.0),
                _ => None,
            })
            .collect();
        non_empty(name, ips)
    }

    async fn resolve_aaaa(&self, name: &str) -> Result<Vec<Ipv6Addr>, ReconError> {
        let ips: Vec<Ipv6Addr> = self
            .query(name, RecordType::AAAA)
            .await?
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::AAAA(aaaa) => Some(aaaa.0),
                _ => None,
            })
            .collect();
        non_empty(name, ips)
    }

    async fn resolve_cname(&self, name: &str) -> Result<Vec<String>, ReconError> {
        let names: Vec<String> = self
            .query(name, RecordType::CNAME)
            .await?
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::CNAME(cname) => Some(trim_name(&cname.0)),
                _ => None,
            })
            .collect();
        non_empty(name, names)
    }

    async fn resolve_ptr(&self, ip: IpAddr) -> Result<Vec<String>, ReconError> {
        let arpa = Name::from(ip);
        let names: Vec<String> = self
            .resolver
            .lookup(arpa, RecordType::PTR)
            .await
            .map_err(|e| map_resolve_error(&ip.to_string(), e))?
            .iter()
            .filter_map(|rdata| match rdata {
                RData::PTR(ptr) => Some(trim_name(&ptr.0)),
                _ => None,
            })
            .collect();
        non_empty(&ip.to_string(), names)
    }

    async fn resolve_ns(&self, name: &str) -> Result<Vec<String>, ReconError> {
        let names: Vec<String> = self
            .query(name, RecordType::NS)
            .await?
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::NS(ns) => Some(trim_name(&ns.0)),
                _ => None,
            })
            .collect();
        non_empty(name, names)
    }

    async fn resolve_mx(&self, name: &str) -> Result<Vec<String>, ReconError> {
        let names: Vec<String> = self
            .query(name, RecordType::MX)
            .await?
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::MX(mx) => Some(trim_name(mx.exchange())),
                _ => None,
            })
            .collect();
        non_empty(name, names)
    }

    async fn resolve_srv(&self, name: &str) -> Result<Vec<String>, ReconError> {
        let names: Vec<String> = self
            .query(name, RecordType::SRV)
            .await?
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::SRV(srv) => Some(trim_name(srv.target())),
                _ => None,
            })
            .collect();
        non_empty(name, names)
    }
}

/// Accepts `host` or `host:port`; port 53 is assumed when absent.
pub fn parse_server_addr(server: &str) -> Result<SocketAddr, ReconError> {
    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok(addr);
    }
    server
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, 53))
        .map_err(|e| ReconError::ConfigError(format!("Invalid DNS server address {}: {}", server, e)))
}

fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

pub(crate) fn trim_name(name: &Name) -> String {
    name.to_utf8().trim_end_matches('.').to_string()
}

fn non_empty<T>(name: &str, answers: Vec<T>) -> Result<Vec<T>, ReconError> {
    if answers.is_empty() {
        Err(ReconError::NotFound(name.to_string()))
    } else {
        Ok(answers)
    }
}

fn map_resolve_error(name: &str, e: ResolveError) -> ReconError {
    match e.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => ReconError::NotFound(name.to_string()),
        _ => ReconError::ResolutionError(format!("Failed to resolve {}: {}", name, e)),
    }
}
