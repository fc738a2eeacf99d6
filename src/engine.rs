// src/engine.rs
use crate::aggregator::{Aggregator, AggregatorOptions};
use crate::cli::Args;
use crate::config;
use crate::output::OutputManager;
use crate::resolver::{DnsClient, Resolver};
use crate::scheduler::Scheduler;
use crate::session::Session;
use crate::sources::{
    accepts, create_source, get_all_sources, has_api_key, requires_domain, DictionarySource, Source,
};
use crate::types::{Config, HostResult, OutputFormat, ReconError, RunStats, Target, TargetKind};
use crate::utils;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Read-only state shared by every task of a run.
pub struct RunContext {
    pub dns: Arc<dyn DnsClient>,
    pub session: Session,
    /// Dictionary guesses also try AAAA.
    pub ipv6: bool,
}

impl RunContext {
    pub fn new(dns: Arc<dyn DnsClient>, session: Session, ipv6: bool) -> Self {
        Self { dns, session, ipv6 }
    }
}

pub struct ReconEngine {
    config: Config,
    sources: Vec<Box<dyn Source>>,
    /// Whether the source list was chosen rather than defaulted.
    explicit_sources: bool,
    dns: Arc<dyn DnsClient>,
    session: Session,
    output_manager: OutputManager,
}

impl ReconEngine {
    pub fn new(args: &Args) -> Result<Self, ReconError> {
        let mut config = match args.config_path.as_deref() {
            Some(path) => config::load_config(path)?,
            None => config::default_config()?,
        };
        apply_args(&mut config, args);
        config::validate_config(&config)?;

        let dns: Arc<dyn DnsClient> = Arc::new(Resolver::new(&config.resolver)?);
        let (sources, explicit_sources) = build_sources(args.sources.as_deref(), &config)?;

        Self::with_parts(config, sources, explicit_sources, dns)
    }

    pub fn with_parts(
        config: Config,
        sources: Vec<Box<dyn Source>>,
        explicit_sources: bool,
        dns: Arc<dyn DnsClient>,
    ) -> Result<Self, ReconError> {
        let session = Session::new(&config)?;
        let output_manager = OutputManager::new(config.output.clone());

        Ok(Self {
            config,
            sources,
            explicit_sources,
            dns,
            session,
            output_manager,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Rejects option combinations that cannot produce work.
    pub fn check_targets(&self, ips: &[IpAddr], domains: &[String]) -> Result<(), ReconError> {
        if ips.is_empty() && domains.is_empty() {
            return Err(ReconError::ConfigError(
                "No targets provided. Give an IP, network or range, -i <file> or -d <domain>".to_string(),
            ));
        }

        if domains.is_empty() {
            let needs_domain: Vec<String> = self
                .sources
                .iter()
                .map(|s| s.name().to_string())
                .filter(|name| requires_domain(name))
                .filter(|name| self.explicit_sources || name == "dictionary")
                .collect();
            if !needs_domain.is_empty() {
                return Err(ReconError::ConfigError(format!(
                    "{} requires a domain set with -d",
                    needs_domain.join(", ")
                )));
            }
        } else {
            if !self.sources.iter().any(|s| s.info().target == TargetKind::Domain) {
                return Err(ReconError::ConfigError(
                    "-d provided but no sources selected that use it".to_string(),
                ));
            }
            if let Some(bad) = domains.iter().find(|d| !utils::is_valid_domain(d)) {
                return Err(ReconError::InvalidDomain(bad.clone()));
            }
        }

        if !ips.is_empty() && !self.sources.iter().any(|s| s.info().target == TargetKind::Ip) {
            warn!("IP targets given but no selected source probes addresses");
        }
        Ok(())
    }

    /// Schedules every target against every source that accepts it, waits for
    /// all tasks, then writes the sorted result set.
    pub async fn run(
        &self,
        ips: Vec<IpAddr>,
        domains: Vec<String>,
        seed: Vec<HostResult>,
    ) -> Result<RunStats, ReconError> {
        self.check_targets(&ips, &domains)?;

        info!(
            "Starting run: {} addresses, {} domains, sources: {}",
            ips.len(),
            domains.len(),
            self.source_names().join(", ")
        );
        let start_time = Instant::now();

        let ctx = Arc::new(RunContext::new(
            self.dns.clone(),
            self.session.clone(),
            self.config.ipv6,
        ));

        let mut aggregator = Aggregator::new(
            AggregatorOptions {
                validate: self.config.validate,
                fcrdns: self.config.fcrdns,
            },
            self.dns.clone(),
        )?;
        aggregator.seed(seed);
        if !self.config.debug && !self.config.output.silent {
            aggregator = aggregator.with_progress(spinner());
        }

        let scheduler = Scheduler::start(self.config.concurrency, aggregator);

        let targets = ips
            .into_iter()
            .map(Target::Ip)
            .chain(domains.into_iter().map(|d| Target::Domain(d.to_lowercase())));
        for target in targets {
            for source in self.sources.iter().filter(|s| accepts(&s.info(), &target)) {
                source.schedule(&target, &ctx, &scheduler).await?;
            }
        }

        let tasks_submitted = scheduler.submitted();
        let aggregate = scheduler.finish().await;

        self.output_manager.write_results(&aggregate.results).await?;

        Ok(RunStats {
            tasks_submitted,
            outcomes_received: aggregate.outcomes,
            failed_tasks: aggregate.failed,
            unique_results: aggregate.results.len(),
            sources_used: self.source_names(),
            duration: start_time.elapsed(),
        })
    }
}

/// Command line flags win over the config file.
fn apply_args(config: &mut Config, args: &Args) {
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(ms) = args.timeout {
        config.timeout = Duration::from_millis(ms);
    }
    if let Some(server) = &args.server {
        config.resolver.server = server.clone();
    }
    if let Some(dictionary) = &args.dictionary {
        config.dictionary = Some(dictionary.clone());
    }
    if let Some(output_file) = &args.output_file {
        config.output.file = Some(output_file.clone());
    }
    config.ipv6 |= args.ipv6;
    config.validate |= args.validate;
    config.fcrdns |= args.fcrdns;
    config.debug |= args.debug;
    config.output.silent |= args.silent;

    if args.json {
        config.output.format = OutputFormat::Json;
    }
    if args.csv {
        config.output.format = OutputFormat::Csv;
    }
    if args.clean {
        config.output.format = OutputFormat::Clean;
    }
}

/// Sources named on the command line, else in the config file, else all of
/// them. The dictionary source joins whenever a word list is configured.
fn build_sources(
    selected: Option<&[String]>,
    config: &Config,
) -> Result<(Vec<Box<dyn Source>>, bool), ReconError> {
    let names: Option<&[String]> = match selected {
        Some(names) => Some(names),
        None if !config.sources.is_empty() => Some(config.sources.as_slice()),
        None => None,
    };

    let mut sources = match names {
        Some(names) => {
            let mut sources = Vec::new();
            for name in names {
                let name = name.trim();
                if name.eq_ignore_ascii_case("dictionary") {
                    continue;
                }
                match create_source(name, config) {
                    Some(source) if source.info().needs_key && !has_api_key(config, name) => {
                        return Err(ReconError::ConfigError(format!(
                            "{} needs an API key in [api_keys] or {}_API_KEYS",
                            name,
                            name.to_uppercase()
                        )));
                    }
                    Some(source) => sources.push(source),
                    None => warn!("Unknown source: {}", name),
                }
            }
            sources
        }
        None => get_all_sources(config)
            .into_iter()
            .filter(|source| {
                let keyed = source.info().needs_key;
                if keyed && !has_api_key(config, source.name()) {
                    info!("Skipping {}: no API key configured", source.name());
                    return false;
                }
                true
            })
            .collect(),
    };

    if let Some(path) = &config.dictionary {
        let dictionary = DictionarySource::from_file(path)?;
        if dictionary.is_empty() {
            warn!("Dictionary {} has no words", path.display());
        }
        sources.push(Box::new(dictionary));
    }

    if sources.is_empty() {
        return Err(ReconError::ConfigError("No valid sources configured".to_string()));
    }
    Ok((sources, names.is_some()))
}

fn spinner() -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        progress.set_style(style);
    }
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::read_results;
    use crate::sources::{NsSource, ReverseSource};
    use crate::testing::FakeDns;
    use crate::types::OutputConfig;
    use std::io::Write;

    fn engine(sources: Vec<Box<dyn Source>>, explicit: bool, dns: FakeDns, config: Config) -> ReconEngine {
        ReconEngine::with_parts(config, sources, explicit, Arc::new(dns)).unwrap()
    }

    fn quiet_config(file: &std::path::Path) -> Config {
        Config {
            concurrency: 4,
            output: OutputConfig {
                format: OutputFormat::Json,
                file: Some(file.to_string_lossy().to_string()),
                silent: true,
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_check_targets() {
        let all = engine(get_all_sources(&Config::default()), false, FakeDns::new(), Config::default());
        let ip: Vec<IpAddr> = vec!["192.0.2.1".parse().unwrap()];

        assert!(all.check_targets(&[], &[]).is_err());
        assert!(all.check_targets(&ip, &[]).is_ok());
        assert!(all.check_targets(&[], &["example.com".to_string()]).is_ok());
        assert!(matches!(
            all.check_targets(&[], &["not a domain".to_string()]),
            Err(ReconError::InvalidDomain(_))
        ));

        let ns_only = engine(vec![Box::new(NsSource::new())], true, FakeDns::new(), Config::default());
        assert!(ns_only.check_targets(&ip, &[]).is_err());

        let reverse_only = engine(vec![Box::new(ReverseSource::new())], true, FakeDns::new(), Config::default());
        assert!(reverse_only.check_targets(&[], &["example.com".to_string()]).is_err());

        let dictionary = engine(
            vec![Box::new(ReverseSource::new()), Box::new(DictionarySource::new(vec!["www".to_string()]))],
            false,
            FakeDns::new(),
            Config::default(),
        );
        assert!(dictionary.check_targets(&ip, &[]).is_err());
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            concurrency: Some(3),
            timeout: Some(1200),
            server: Some("1.1.1.1".to_string()),
            fcrdns: true,
            clean: true,
            ..Args::default()
        };
        apply_args(&mut config, &args);

        assert_eq!(config.concurrency, 3);
        assert_eq!(config.timeout, Duration::from_millis(1200));
        assert_eq!(config.resolver.server, "1.1.1.1");
        assert!(config.fcrdns);
        assert!(!config.validate);
        assert_eq!(config.output.format, OutputFormat::Clean);
    }

    #[test]
    fn test_build_sources() {
        let config = Config::default();

        let (all, explicit) = build_sources(None, &config).unwrap();
        assert!(!explicit);
        assert_eq!(all.len(), crate::sources::SOURCE_NAMES.len() - 2);
        assert!(!all.iter().any(|s| s.info().needs_key));

        let selected = vec!["reverse".to_string(), "bogus".to_string()];
        let (some, explicit) = build_sources(Some(selected.as_slice()), &config).unwrap();
        assert!(explicit);
        assert_eq!(some.len(), 1);

        assert!(build_sources(Some(&["bogus".to_string()][..]), &config).is_err());
        assert!(build_sources(Some(&["shodan".to_string()][..]), &config).is_err());

        let mut keyed = Config::default();
        keyed.api_keys.insert("shodan".to_string(), vec!["abc".to_string()]);
        let (with_key, _) = build_sources(None, &keyed).unwrap();
        assert!(with_key.iter().any(|s| s.name() == "shodan"));
        assert!(!with_key.iter().any(|s| s.name() == "virustotal"));
        assert!(build_sources(Some(&["shodan".to_string()][..]), &keyed).is_ok());

        let mut words = tempfile::NamedTempFile::new().unwrap();
        writeln!(words, "www\nmail").unwrap();
        let with_dictionary = Config {
            dictionary: Some(words.path().to_path_buf()),
            ..Config::default()
        };
        let (sources, _) = build_sources(Some(&["ns".to_string()][..]), &with_dictionary).unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["ns", "dictionary"]);
    }

    #[tokio::test]
    async fn test_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results.json");

        let dns = FakeDns::new()
            .ptr("192.0.2.1", &["a.example.com"])
            .ptr("192.0.2.2", &["B.Example.com"])
            .ns("example.com", &["ns1.example.com"])
            .a("ns1.example.com", &["192.0.2.53"]);
        let engine = engine(
            vec![Box::new(ReverseSource::new()), Box::new(NsSource::new())],
            true,
            dns,
            quiet_config(&out),
        );

        let seed = vec![HostResult::new("reverse", "10.0.0.1", "seeded.example.com")];
        let ips = utils::lines_to_ip_list(&["192.0.2.1-3".to_string()]).unwrap();
        let stats = engine
            .run(ips, vec!["example.com".to_string()], seed)
            .await
            .unwrap();

        assert_eq!(stats.tasks_submitted, 4);
        assert_eq!(stats.outcomes_received, 4);
        assert_eq!(stats.failed_tasks, 1);
        assert_eq!(stats.unique_results, 4);

        let written = read_results(&out).unwrap();
        assert_eq!(
            written,
            vec![
                HostResult::new("reverse", "10.0.0.1", "seeded.example.com"),
                HostResult::new("reverse", "192.0.2.1", "a.example.com"),
                HostResult::new("reverse", "192.0.2.2", "b.example.com"),
                HostResult::new("ns", "192.0.2.53", "ns1.example.com"),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_with_fcrdns() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results.json");

        let dns = FakeDns::new()
            .ptr("192.0.2.1", &["a.example.com", "stale.example.com"])
            .a("a.example.com", &["192.0.2.100"]);
        let config = Config {
            fcrdns: true,
            ..quiet_config(&out)
        };
        let engine = engine(vec![Box::new(ReverseSource::new())], true, dns, config);

        let stats = engine
            .run(vec!["192.0.2.1".parse().unwrap()], Vec::new(), Vec::new())
            .await
            .unwrap();
        assert_eq!(stats.unique_results, 1);
        assert_eq!(
            read_results(&out).unwrap(),
            vec![HostResult::new("fcrdns", "192.0.2.100", "a.example.com")]
        );
    }
}
