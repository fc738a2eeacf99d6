// src/aggregator.rs
use crate::chain::{follow_chain, AddrFamily};
use crate::resolver::DnsClient;
use crate::task::TaskOutcome;
use crate::types::{HostResult, ReconError};
use indicatif::ProgressBar;
use log::{debug, error};
use regex::Regex;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Permissive hostname grammar used by validation mode.
pub const HOSTNAME_PATTERN: &str = r"^\.?[a-z\d]+(?:(?:[a-z\d]*)|(?:[a-z\d\-]*[a-z\d]))(?:\.[a-z\d]+(?:(?:[a-z\d]*)|(?:[a-z\d\-]*[a-z\d])))*$";

pub const FCRDNS_SOURCE: &str = "fcrdns";

/// Deduplicated results of one run.
#[derive(Debug, Default, Clone)]
pub struct ResultSet {
    results: HashSet<HostResult>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the result was rejected or already present.
    pub fn insert(&mut self, result: HostResult) -> bool {
        if result.hostname.is_empty() || result.ip.is_empty() {
            return false;
        }
        self.results.insert(result)
    }

    pub fn contains(&self, result: &HostResult) -> bool {
        self.results.contains(result)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_sorted(self) -> Vec<HostResult> {
        let mut results: Vec<HostResult> = self.results.into_iter().collect();
        sort_results(&mut results);
        results
    }
}

/// IPv6 and unparseable addresses first, then IPv4 in ascending numeric
/// order. Remaining ties fall back to the string fields so output is stable.
pub fn sort_results(results: &mut [HostResult]) {
    results.sort_by(|a, b| {
        ipv4_key(&a.ip)
            .cmp(&ipv4_key(&b.ip))
            .then_with(|| a.ip.cmp(&b.ip))
            .then_with(|| a.hostname.cmp(&b.hostname))
            .then_with(|| a.source.cmp(&b.source))
    });
}

fn ipv4_key(ip: &str) -> Option<u32> {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => Some(u32::from(v4)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregatorOptions {
    pub validate: bool,
    pub fcrdns: bool,
}

/// What the aggregator hands back once its inbound channel is closed.
#[derive(Debug, Default)]
pub struct Aggregate {
    pub results: Vec<HostResult>,
    pub outcomes: usize,
    pub failed: usize,
}

/// Sole owner and writer of the `ResultSet`.
pub struct Aggregator {
    options: AggregatorOptions,
    dns: Arc<dyn DnsClient>,
    validator: Regex,
    set: ResultSet,
    outcomes: usize,
    failed: usize,
    progress: Option<ProgressBar>,
}

impl Aggregator {
    pub fn new(options: AggregatorOptions, dns: Arc<dyn DnsClient>) -> Result<Self, ReconError> {
        let validator = Regex::new(HOSTNAME_PATTERN)
            .map_err(|e| ReconError::ConfigError(format!("Invalid hostname pattern: {}", e)))?;

        Ok(Self {
            options,
            dns,
            validator,
            set: ResultSet::new(),
            outcomes: 0,
            failed: 0,
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Inserts results from a previous run as-is.
    pub fn seed(&mut self, results: impl IntoIterator<Item = HostResult>) {
        for result in results {
            self.set.insert(result);
        }
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub async fn ingest(&mut self, outcome: TaskOutcome) {
        self.outcomes += 1;
        if let Some(progress) = &self.progress {
            progress.set_message(format!("{} tasks completed", self.outcomes));
            progress.tick();
        }

        if outcome.has_errors() {
            self.failed += 1;
            for e in &outcome.errors {
                debug!("{}: {}", outcome.source, e);
            }
            return;
        }

        if let Some(first) = outcome.results.first() {
            debug!(
                "{}: {} {}: task completed successfully",
                outcome.source, first.hostname, first.ip
            );
        }

        for result in outcome.results {
            self.accept(result).await;
        }
    }

    async fn accept(&mut self, mut result: HostResult) {
        result.hostname = result.hostname.to_lowercase();

        if self.options.validate && !self.validator.is_match(&result.hostname) {
            return;
        }

        if self.options.fcrdns {
            self.confirm(result).await;
        } else {
            self.set.insert(result);
        }
    }

    /// Replaces a candidate with whatever its hostname resolves to forward.
    /// The candidate itself is never stored.
    async fn confirm(&mut self, candidate: HostResult) {
        let hostname = candidate.hostname;
        if hostname.is_empty() {
            return;
        }

        let resolution = match follow_chain(self.dns.as_ref(), &hostname, AddrFamily::V4).await {
            Ok(resolution) => resolution,
            Err(_) => match follow_chain(self.dns.as_ref(), &hostname, AddrFamily::V6).await {
                Ok(resolution) => resolution,
                Err(e) => {
                    debug!("{}: forward confirmation failed: {}", hostname, e);
                    return;
                }
            },
        };

        for addr in resolution.addrs {
            self.set
                .insert(HostResult::new(FCRDNS_SOURCE, addr.to_string(), hostname.clone()));
        }
    }

    /// Drains `inbound` until every sender is gone, then hands the frozen,
    /// sorted results to `done`.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<TaskOutcome>, done: oneshot::Sender<Aggregate>) {
        while let Some(outcome) = inbound.recv().await {
            self.ingest(outcome).await;
        }
        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }
        if done.send(self.finish()).is_err() {
            error!("Completion tracker went away before the aggregator finished");
        }
    }

    pub fn finish(self) -> Aggregate {
        Aggregate {
            outcomes: self.outcomes,
            failed: self.failed,
            results: self.set.into_sorted(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDns;

    fn aggregator(options: AggregatorOptions, dns: FakeDns) -> Aggregator {
        Aggregator::new(options, Arc::new(dns)).unwrap()
    }

    fn outcome(source: &str, pairs: &[(&str, &str)]) -> TaskOutcome {
        let mut outcome = TaskOutcome::new(source);
        for (ip, hostname) in pairs {
            outcome.add_result(*ip, *hostname);
        }
        outcome
    }

    #[test]
    fn test_result_set_dedup() {
        let mut set = ResultSet::new();
        assert!(set.insert(HostResult::new("Reverse", "10.0.0.1", "a.example.com")));
        assert!(!set.insert(HostResult::new("Reverse", "10.0.0.1", "a.example.com")));
        assert!(set.insert(HostResult::new("TLS", "10.0.0.1", "a.example.com")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_result_set_rejects_empty_fields() {
        let mut set = ResultSet::new();
        assert!(!set.insert(HostResult::new("Reverse", "", "a.example.com")));
        assert!(!set.insert(HostResult::new("Reverse", "10.0.0.1", "")));
        assert!(set.is_empty());
    }

    #[test]
    fn test_sort_order() {
        let mut results: Vec<HostResult> = ["10.0.0.5", "10.0.0.1", "::1", "10.0.0.20"]
            .iter()
            .map(|ip| HostResult::new("test", *ip, "host.example.com"))
            .collect();
        sort_results(&mut results);

        let ips: Vec<&str> = results.iter().map(|r| r.ip.as_str()).collect();
        assert_eq!(ips, vec!["::1", "10.0.0.1", "10.0.0.5", "10.0.0.20"]);
    }

    #[test]
    fn test_sort_unparseable_first() {
        let mut results = vec![
            HostResult::new("test", "192.168.1.1", "a.example.com"),
            HostResult::new("test", "not-an-ip", "b.example.com"),
            HostResult::new("test", "2001:db8::1", "c.example.com"),
            HostResult::new("test", "9.9.9.9", "d.example.com"),
        ];
        sort_results(&mut results);

        assert_eq!(results[2].ip, "9.9.9.9");
        assert_eq!(results[3].ip, "192.168.1.1");
        assert!(results[..2].iter().all(|r| r.ip.parse::<std::net::Ipv4Addr>().is_err()));
    }

    #[tokio::test]
    async fn test_duplicate_outcomes_are_idempotent() {
        let mut agg = aggregator(AggregatorOptions::default(), FakeDns::new());
        agg.ingest(outcome("Reverse", &[("10.0.0.1", "A.Example.com")])).await;
        agg.ingest(outcome("Reverse", &[("10.0.0.1", "a.example.com")])).await;

        let aggregate = agg.finish();
        assert_eq!(aggregate.outcomes, 2);
        assert_eq!(
            aggregate.results,
            vec![HostResult::new("Reverse", "10.0.0.1", "a.example.com")]
        );
    }

    #[tokio::test]
    async fn test_outcome_with_errors_is_discarded() {
        let mut agg = aggregator(AggregatorOptions::default(), FakeDns::new());
        let mut failed = outcome("Headers", &[("10.0.0.1", "a.example.com")]);
        failed.add_error(ReconError::NetworkError("connection refused".to_string()));
        agg.ingest(failed).await;
        agg.ingest(TaskOutcome::new("Reverse")).await;

        let aggregate = agg.finish();
        assert_eq!(aggregate.outcomes, 2);
        assert_eq!(aggregate.failed, 1);
        assert!(aggregate.results.is_empty());
    }

    #[tokio::test]
    async fn test_validation_drops_bad_hostnames() {
        let options = AggregatorOptions {
            validate: true,
            ..Default::default()
        };
        let mut agg = aggregator(options, FakeDns::new());
        agg.ingest(outcome(
            "TLS",
            &[
                ("10.0.0.1", "Good-Host.example.com"),
                ("10.0.0.1", ".leading.example.com"),
                ("10.0.0.1", "*.example.com"),
                ("10.0.0.1", "bad_host.example.com"),
                ("10.0.0.1", "trailing-.example.com"),
            ],
        ))
        .await;

        let hostnames: Vec<String> = agg.finish().results.into_iter().map(|r| r.hostname).collect();
        assert_eq!(hostnames, vec![".leading.example.com", "good-host.example.com"]);
    }

    #[tokio::test]
    async fn test_fcrdns_replaces_candidate() {
        let dns = FakeDns::new().a("h.example.com", &["5.6.7.8"]);
        let options = AggregatorOptions {
            fcrdns: true,
            ..Default::default()
        };
        let mut agg = aggregator(options, dns);
        agg.ingest(outcome("reverse", &[("1.2.3.4", "h.example.com")])).await;

        let results = agg.finish().results;
        assert!(results.contains(&HostResult::new("fcrdns", "5.6.7.8", "h.example.com")));
        assert!(!results.contains(&HostResult::new("reverse", "1.2.3.4", "h.example.com")));
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_fcrdns_follows_cname_and_falls_back_to_aaaa() {
        let dns = FakeDns::new()
            .cname("alias.example.com", "edge.example.net")
            .a("edge.example.net", &["5.6.7.9"])
            .aaaa("v6only.example.com", &["2001:db8::5"]);
        let options = AggregatorOptions {
            fcrdns: true,
            ..Default::default()
        };
        let mut agg = aggregator(options, dns);
        agg.ingest(outcome(
            "reverse",
            &[("1.2.3.4", "alias.example.com"), ("1.2.3.5", "v6only.example.com")],
        ))
        .await;

        let results = agg.finish().results;
        assert_eq!(
            results,
            vec![
                HostResult::new("fcrdns", "2001:db8::5", "v6only.example.com"),
                HostResult::new("fcrdns", "5.6.7.9", "alias.example.com"),
            ]
        );
    }

    #[tokio::test]
    async fn test_fcrdns_drops_unresolvable() {
        let options = AggregatorOptions {
            fcrdns: true,
            ..Default::default()
        };
        let mut agg = aggregator(options, FakeDns::new());
        agg.ingest(outcome("reverse", &[("1.2.3.4", "gone.example.com")])).await;
        assert!(agg.finish().results.is_empty());
    }

    #[tokio::test]
    async fn test_seed_is_kept() {
        let mut agg = aggregator(AggregatorOptions::default(), FakeDns::new());
        agg.seed(vec![
            HostResult::new("ns", "1.1.1.1", "ns1.example.com"),
            HostResult::new("ns", "", "empty.example.com"),
        ]);
        assert_eq!(agg.len(), 1);
    }

    #[tokio::test]
    async fn test_run_hands_back_aggregate() {
        let agg = aggregator(AggregatorOptions::default(), FakeDns::new());
        let (tx, rx) = mpsc::channel(4);
        let (done_tx, done_rx) = oneshot::channel();
        let handle = tokio::spawn(agg.run(rx, done_tx));

        tx.send(outcome("mx", &[("10.0.0.2", "mail.example.com")])).await.unwrap();
        tx.send(outcome("ns", &[("10.0.0.1", "ns.example.com")])).await.unwrap();
        drop(tx);

        let aggregate = done_rx.await.unwrap();
        handle.await.unwrap();
        assert_eq!(aggregate.outcomes, 2);
        assert_eq!(aggregate.results[0].hostname, "ns.example.com");
        assert_eq!(aggregate.results[1].hostname, "mail.example.com");
    }
}
