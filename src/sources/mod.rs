// src/sources/mod.rs
use crate::chain::{follow_chain, AddrFamily};
use crate::engine::RunContext;
use crate::resolver::DnsClient;
use crate::scheduler::Scheduler;
use crate::task::{SourceTask, TaskOutcome};
use crate::types::{Config, ReconError, SourceInfo, Target, TargetKind};
use async_trait::async_trait;
use std::sync::Arc;

mod axfr;
mod crtsh;
mod dictionary;
mod hackertarget;
mod headers;
mod mx;
mod ns;
mod reverse;
mod shodan;
mod srv;
mod tls;
mod virustotal;

pub use axfr::AxfrSource;
pub use crtsh::CrtShSource;
pub use dictionary::DictionarySource;
pub use hackertarget::HackerTargetSource;
pub use headers::HeadersSource;
pub use mx::MxSource;
pub use ns::NsSource;
pub use reverse::ReverseSource;
pub use shodan::ShodanSource;
pub use srv::SrvSource;
pub use tls::TlsSource;
pub use virustotal::VirusTotalSource;

/// A family of probes against one kind of target.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;
    fn info(&self) -> SourceInfo;
    fn clone_source(&self) -> Box<dyn Source>;

    /// Runs the probe for one target.
    async fn probe(&self, target: &Target, ctx: &RunContext) -> TaskOutcome;

    /// Enqueues the work for one target. One task per target unless the
    /// source fans out further.
    async fn schedule(
        &self,
        target: &Target,
        ctx: &Arc<RunContext>,
        scheduler: &Scheduler,
    ) -> Result<(), ReconError> {
        let task = SourceTask::new(self.clone_source(), target.clone(), ctx.clone());
        scheduler.submit(Box::new(task)).await
    }
}

/// Sources selectable by name. The dictionary source is enabled through its
/// word list instead.
pub const SOURCE_NAMES: &[&str] = &[
    "reverse",
    "headers",
    "tls",
    "shodan",
    "ns",
    "mx",
    "srv",
    "axfr",
    "crtsh",
    "hackertarget",
    "virustotal",
];

pub fn create_source(name: &str, config: &Config) -> Option<Box<dyn Source>> {
    let name = name.to_lowercase();
    let keys = || config.api_keys.get(&name).cloned().unwrap_or_default();
    match name.as_str() {
        "reverse" => Some(Box::new(ReverseSource::new())),
        "headers" => Some(Box::new(HeadersSource::new())),
        "tls" => Some(Box::new(TlsSource::new())),
        "shodan" => Some(Box::new(ShodanSource::new().with_api_keys(keys()))),
        "ns" => Some(Box::new(NsSource::new())),
        "mx" => Some(Box::new(MxSource::new())),
        "srv" => Some(Box::new(SrvSource::new())),
        "axfr" => Some(Box::new(AxfrSource::new())),
        "crtsh" => Some(Box::new(CrtShSource::new())),
        "hackertarget" => Some(Box::new(HackerTargetSource::new())),
        "virustotal" => Some(Box::new(VirusTotalSource::new().with_api_keys(keys()))),
        _ => None,
    }
}

/// Whether a keyed source has at least one key configured.
pub fn has_api_key(config: &Config, source_name: &str) -> bool {
    config
        .api_keys
        .get(&source_name.to_lowercase())
        .is_some_and(|keys| !keys.is_empty())
}

pub fn get_all_sources(config: &Config) -> Vec<Box<dyn Source>> {
    SOURCE_NAMES
        .iter()
        .filter_map(|name| create_source(name, config))
        .collect()
}

pub fn requires_domain(source_name: &str) -> bool {
    matches!(
        source_name.to_lowercase().as_str(),
        "ns" | "mx" | "srv" | "axfr" | "crtsh" | "hackertarget" | "virustotal" | "dictionary"
    )
}

pub(crate) fn wrong_target(source: &str, target: &Target) -> TaskOutcome {
    TaskOutcome::failed(
        source,
        ReconError::InvalidTarget(format!("{} does not accept {}", source, target)),
    )
}

pub(crate) fn accepts(info: &SourceInfo, target: &Target) -> bool {
    info.target == target.kind()
}

/// Resolves `hostname` and records it, plus every CNAME crossed, against each
/// address found. Returns false when nothing resolved.
pub(crate) async fn add_resolved(outcome: &mut TaskOutcome, dns: &dyn DnsClient, hostname: &str) -> bool {
    let Ok(resolution) = follow_chain(dns, hostname, AddrFamily::V4).await else {
        return false;
    };
    for addr in &resolution.addrs {
        let ip = addr.to_string();
        outcome.add_result(ip.clone(), hostname);
        for cname in &resolution.chain {
            outcome.add_result(ip.clone(), cname.as_str());
        }
    }
    true
}
