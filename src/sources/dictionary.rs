// src/sources/dictionary.rs
use crate::chain::{detect_wildcard, follow_chain, AddrFamily, Wildcard};
use crate::engine::RunContext;
use crate::resolver::DnsClient;
use crate::scheduler::Scheduler;
use crate::sources::Source;
use crate::task::{FnTask, TaskOutcome, TaskProducer};
use crate::types::{ReconError, SourceInfo, Target, TargetKind};
use crate::utils;
use async_trait::async_trait;
use log::info;
use std::path::Path;
use std::sync::Arc;

/// Subdomain guessing from a word list, with wildcard answers filtered out.
#[derive(Debug, Clone)]
pub struct DictionarySource {
    name: String,
    words: Arc<Vec<String>>,
}

impl DictionarySource {
    pub fn new(words: Vec<String>) -> Self {
        Self {
            name: "dictionary".to_string(),
            words: Arc::new(words),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ReconError> {
        let words = utils::read_lines(path).map_err(|e| {
            ReconError::ConfigError(format!("Failed to read dictionary {}: {}", path.display(), e))
        })?;
        Ok(Self::new(
            words
                .into_iter()
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty())
                .collect(),
        ))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

fn families(ipv6: bool) -> &'static [AddrFamily] {
    if ipv6 {
        &[AddrFamily::V4, AddrFamily::V6]
    } else {
        &[AddrFamily::V4]
    }
}

fn family_label(family: AddrFamily) -> &'static str {
    match family {
        AddrFamily::V4 => "IPv4",
        AddrFamily::V6 => "IPv6",
    }
}

#[async_trait]
impl Source for DictionarySource {
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

    /// Guesses only run through `schedule`, one task per word.
    async fn probe(&self, target: &Target, _ctx: &RunContext) -> TaskOutcome {
        TaskOutcome::failed(
            &self.name,
            ReconError::SourceError {
                source_name: self.name.clone(),
                message: format!("{} is guessed through per-word tasks only", target),
            },
        )
    }

    /// One task per word and address family, after the wildcard probe. Blocks
    /// whenever the queue is full.
    async fn schedule(
        &self,
        target: &Target,
        ctx: &Arc<RunContext>,
        scheduler: &Scheduler,
    ) -> Result<(), ReconError> {
        let Target::Domain(domain) = target else {
            return Ok(());
        };

        for &family in families(ctx.ipv6) {
            let wildcard = detect_wildcard(ctx.dns.as_ref(), domain, family).await;
            if !wildcard.is_empty() {
                info!(
                    "{}: wildcard {} answers {:?}, matching guesses are dropped",
                    domain,
                    family_label(family),
                    wildcard.addrs().collect::<Vec<_>>()
                );
            }

            for addr in wildcard.addrs() {
                let label = format!("Wildcard {}", family_label(family));
                let ip = addr.to_string();
                let hostname = format!("*.{}", domain);
                scheduler
                    .submit(FnTask::boxed(label.clone(), move || async move {
                        let mut outcome = TaskOutcome::new(label);
                        outcome.add_result(ip, hostname);
                        outcome
                    }))
                    .await?;
            }

            let wildcard = Arc::new(wildcard);
            for word in self.words.iter() {
                let guess = Guess::new(domain, word, family, wildcard.clone(), ctx.dns.clone());
                scheduler.submit(Box::new(guess)).await?;
            }
        }
        Ok(())
    }
}

/// A single `word.domain` lookup.
pub struct Guess {
    label: String,
    fqdn: String,
    family: AddrFamily,
    wildcard: Arc<Wildcard>,
    dns: Arc<dyn DnsClient>,
}

impl Guess {
    pub fn new(
        domain: &str,
        word: &str,
        family: AddrFamily,
        wildcard: Arc<Wildcard>,
        dns: Arc<dyn DnsClient>,
    ) -> Self {
        Self {
            label: format!("Dictionary {}", family_label(family)),
            fqdn: format!("{}.{}", word, domain),
            family,
            wildcard,
            dns,
        }
    }

    async fn resolve(&self) -> TaskOutcome {
        let mut outcome = TaskOutcome::new(&self.label);

        let resolution = match follow_chain(self.dns.as_ref(), &self.fqdn, self.family).await {
            Ok(resolution) => resolution,
            Err(e) => {
                outcome.add_error(e);
                return outcome;
            }
        };

        if self.wildcard.matches(&resolution.addrs) {
            outcome.add_error(ReconError::SourceError {
                source_name: self.label.clone(),
                message: format!("{} matches the wildcard answer", self.fqdn),
            });
            return outcome;
        }

        if !resolution.chain.is_empty() {
            outcome.set_source("Dictionary-CNAME");
        }
        for addr in &resolution.addrs {
            let ip = addr.to_string();
            outcome.add_result(ip.clone(), self.fqdn.as_str());
            for cname in &resolution.chain {
                outcome.add_result(ip.clone(), cname.as_str());
            }
        }
        outcome
    }
}

#[async_trait]
impl TaskProducer for Guess {
    fn name(&self) -> &str {
        &self.label
    }

    async fn run(self: Box<Self>) -> TaskOutcome {
        self.resolve().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{Aggregator, AggregatorOptions};
    use crate::chain::WILDCARD_SENTINEL;
    use crate::session::Session;
    use crate::testing::FakeDns;
    use crate::types::{Config, HostResult};
    use std::io::Write;

    fn wildcard_dns() -> FakeDns {
        FakeDns::new()
            .a(&format!("{}.example.com", WILDCARD_SENTINEL), &["1.2.3.9"])
            .a("www.example.com", &["1.2.3.9"])
            .a("vpn.example.com", &["1.2.3.10"])
            .cname("shop.example.com", "shops.example.net")
            .a("shops.example.net", &["198.51.100.4"])
    }

    async fn run_dictionary(dns: FakeDns, words: &[&str], ipv6: bool) -> Vec<HostResult> {
        let dns: Arc<dyn DnsClient> = Arc::new(dns);
        let ctx = Arc::new(RunContext::new(dns.clone(), Session::new(&Config::default()).unwrap(), ipv6));
        let aggregator = Aggregator::new(AggregatorOptions::default(), dns).unwrap();
        let scheduler = Scheduler::start(4, aggregator);

        let source = DictionarySource::new(words.iter().map(|w| w.to_string()).collect());
        source
            .schedule(&Target::Domain("example.com".to_string()), &ctx, &scheduler)
            .await
            .unwrap();
        scheduler.finish().await.results
    }

    #[tokio::test]
    async fn test_wildcard_matches_are_suppressed() {
        let results = run_dictionary(wildcard_dns(), &["www", "vpn", "nothing"], false).await;

        assert!(results.contains(&HostResult::new("Dictionary IPv4", "1.2.3.10", "vpn.example.com")));
        assert!(results.contains(&HostResult::new("Wildcard IPv4", "1.2.3.9", "*.example.com")));
        assert!(!results.iter().any(|r| r.hostname == "www.example.com"));
        assert!(!results.iter().any(|r| r.hostname == "nothing.example.com"));
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_cname_guess_records_chain() {
        let results = run_dictionary(wildcard_dns(), &["shop"], false).await;

        assert!(results.contains(&HostResult::new("Dictionary-CNAME", "198.51.100.4", "shop.example.com")));
        assert!(results.contains(&HostResult::new("Dictionary-CNAME", "198.51.100.4", "shops.example.net")));
    }

    #[tokio::test]
    async fn test_ipv6_guesses() {
        let dns = FakeDns::new()
            .a("www.example.com", &["192.0.2.80"])
            .aaaa("www.example.com", &["2001:db8::80"]);
        let results = run_dictionary(dns, &["www"], true).await;

        assert_eq!(
            results,
            vec![
                HostResult::new("Dictionary IPv6", "2001:db8::80", "www.example.com"),
                HostResult::new("Dictionary IPv4", "192.0.2.80", "www.example.com"),
            ]
        );
    }

    #[tokio::test]
    async fn test_single_task_guessing_is_refused() {
        let ctx = RunContext::new(Arc::new(wildcard_dns()), Session::new(&Config::default()).unwrap(), false);
        let source = DictionarySource::new(vec!["vpn".to_string()]);

        let outcome = source.probe(&Target::Domain("example.com".to_string()), &ctx).await;
        assert!(outcome.has_errors());
        assert!(!outcome.has_results());
    }

    #[test]
    fn test_from_file_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "www\n\n  mail \nvpn").unwrap();

        let source = DictionarySource::from_file(file.path()).unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(source.words.as_slice(), ["www", "mail", "vpn"]);

        assert!(DictionarySource::from_file(Path::new("/nonexistent/words.txt")).is_err());
    }
}
