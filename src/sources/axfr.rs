// src/sources/axfr.rs
use crate::chain::{follow_chain, AddrFamily};
use crate::engine::RunContext;
use crate::resolver::{trim_name, DnsClient};
use crate::sources::{wrong_target, Source};
use crate::task::TaskOutcome;
use crate::types::{ReconError, SourceInfo, Target, TargetKind};
use async_trait::async_trait;
use log::debug;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use trust_dns_resolver::proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use trust_dns_resolver::proto::rr::{Name, RData, Record, RecordType};

const DNS_PORT: u16 = 53;
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(10);

/// Zone transfers from each name server of a domain.
#[derive(Debug, Clone)]
pub struct AxfrSource {
    name: String,
    port: u16,
    timeout: Duration,
}

impl Default for AxfrSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AxfrSource {
    pub fn new() -> Self {
        Self {
            name: "axfr".to_string(),
            port: DNS_PORT,
            timeout: TRANSFER_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn transfer(&self, server: IpAddr, domain: &str) -> Result<Vec<Record>, ReconError> {
        tokio::time::timeout(self.timeout, self.read_zone(server, domain))
            .await
            .map_err(|_| ReconError::NetworkError(format!("{}: zone transfer timed out", server)))?
    }

    /// Reads messages until the closing SOA, or until the server hangs up.
    async fn read_zone(&self, server: IpAddr, domain: &str) -> Result<Vec<Record>, ReconError> {
        let mut stream = TcpStream::connect(SocketAddr::new(server, self.port))
            .await
            .map_err(|e| ReconError::NetworkError(format!("{}: {}", server, e)))?;

        let query = axfr_query(domain)?;
        let length = u16::try_from(query.len())
            .map_err(|_| ReconError::InvalidDomain(domain.to_string()))?;
        stream.write_u16(length).await?;
        stream.write_all(&query).await?;

        let mut records = Vec::new();
        let mut soa_seen = 0;
        while soa_seen < 2 {
            let length = match stream.read_u16().await {
                Ok(length) => length,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && !records.is_empty() => break,
                Err(e) => return Err(e.into()),
            };
            let mut buf = vec![0u8; usize::from(length)];
            stream.read_exact(&mut buf).await?;

            let message = Message::from_vec(&buf).map_err(|e| ReconError::ParseError(e.to_string()))?;
            if message.response_code() != ResponseCode::NoError {
                return Err(ReconError::SourceError {
                    source_name: self.name.clone(),
                    message: format!("{} answered {} for {}", server, message.response_code(), domain),
                });
            }
            if message.answers().is_empty() {
                return Err(ReconError::NotFound(format!("{} zone from {}", domain, server)));
            }

            for record in message.answers() {
                if record.record_type() == RecordType::SOA {
                    soa_seen += 1;
                }
                records.push(record.clone());
            }
        }
        Ok(records)
    }
}

fn axfr_query(domain: &str) -> Result<Vec<u8>, ReconError> {
    let name = Name::from_ascii(format!("{}.", domain.trim_end_matches('.')))
        .map_err(|e| ReconError::InvalidDomain(format!("{}: {}", domain, e)))?;

    let mut message = Message::new();
    message
        .set_id(rand::random())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(false)
        .add_query(Query::query(name, RecordType::AXFR));
    message.to_vec().map_err(|e| ReconError::ParseError(e.to_string()))
}

/// Records `hostname` against every address `lookup` resolves to.
async fn add_as(outcome: &mut TaskOutcome, dns: &dyn DnsClient, lookup: &str, hostname: &str) {
    if let Ok(resolution) = follow_chain(dns, lookup, AddrFamily::V4).await {
        for addr in &resolution.addrs {
            outcome.add_result(addr.to_string(), hostname);
        }
    }
}

/// Address records map directly; name records are resolved first.
async fn add_record(outcome: &mut TaskOutcome, dns: &dyn DnsClient, record: &Record) {
    let owner = trim_name(record.name());
    match record.data() {
        Some(RData::A(a)) => outcome.add_result(a.0.to_string(), owner),
        Some(RData::AAAA(aaaa)) => outcome.add_result(aaaa.0.to_string(), owner),
        Some(RData::PTR(ptr)) => {
            if let Ok(net) = record.name().parse_arpa_name() {
                outcome.add_result(net.addr().to_string(), trim_name(&ptr.0));
            }
        }
        Some(RData::NS(ns)) => {
            let server = trim_name(&ns.0);
            add_as(outcome, dns, &server, &server).await;
        }
        Some(RData::CNAME(cname)) => add_as(outcome, dns, &trim_name(&cname.0), &owner).await,
        Some(RData::SRV(srv)) => {
            let target = trim_name(srv.target());
            add_as(outcome, dns, &target, &target).await;
        }
        _ => {}
    }
}

#[async_trait]
impl Source for AxfrSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            target: TargetKind::Domain,
            active: true,
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
        let servers = match ctx.dns.resolve_ns(domain).await {
            Ok(servers) => servers,
            Err(e) => {
                outcome.add_error(e);
                return outcome;
            }
        };

        let mut failures = Vec::new();
        for server in servers {
            let addr = match follow_chain(ctx.dns.as_ref(), &server, AddrFamily::V4).await {
                Ok(resolution) => resolution.addrs.first().copied(),
                Err(e) => {
                    failures.push(e);
                    continue;
                }
            };
            let Some(addr) = addr else {
                continue;
            };

            match self.transfer(addr, domain).await {
                Ok(records) => {
                    debug!("{}: {} records from {}", domain, records.len(), server);
                    for record in &records {
                        add_record(&mut outcome, ctx.dns.as_ref(), record).await;
                    }
                }
                Err(e) => failures.push(e),
            }
        }

        // One open server is enough.
        if !outcome.has_results() {
            if failures.is_empty() {
                failures.push(ReconError::NotFound(format!("{}: no transferable zone", domain)));
            }
            for e in failures {
                outcome.add_error(e);
            }
        }
        outcome
    }
}
