// src/cli.rs
use clap::Parser;
use std::path::PathBuf;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "hostrecon",
    version = VERSION,
    about = "Collects hostnames for IP addresses and domains",
    long_about = "hostrecon gathers (ip, hostname) pairs for a set of addresses and domains from\nreverse DNS, HTTP Location headers, NS/MX/SRV records, certificate transparency,\nHackerTarget host search and dictionary guessing, then prints one sorted,\ndeduplicated result set."
)]
pub struct Args {
    /// IP address, CIDR network or range (192.0.2.1-192.0.2.9 or 192.0.2.1-9)
    #[arg(value_name = "TARGET")]
    pub target: Option<String>,

    /// Domain to search, or a file with one domain per line
    #[arg(short = 'd', long = "domain", value_name = "DOMAIN")]
    pub domain: Option<String>,

    /// File of IP addresses, networks or ranges, one per line
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Sources to use (comma-separated)
    #[arg(short = 's', long = "sources", value_delimiter = ',')]
    pub sources: Option<Vec<String>>,

    /// Word list for subdomain guessing
    #[arg(long = "dictionary", value_name = "FILE")]
    pub dictionary: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short = 'c', long = "concurrency")]
    pub concurrency: Option<usize>,

    /// Probe timeout in milliseconds
    #[arg(short = 't', long = "timeout", value_name = "MS")]
    pub timeout: Option<u64>,

    /// DNS server used for every lookup
    #[arg(long = "server", value_name = "ADDR")]
    pub server: Option<String>,

    /// Also guess IPv6 addresses with the dictionary
    #[arg(long = "ipv6")]
    pub ipv6: bool,

    /// Drop hostnames that are not syntactically valid
    #[arg(long = "validate")]
    pub validate: bool,

    /// Keep only hostnames that resolve forward, with their forward addresses
    #[arg(long = "fcrdns")]
    pub fcrdns: bool,

    /// Debug logging, including per-task errors
    #[arg(long = "debug")]
    pub debug: bool,

    /// Print a result file from a previous --json run and exit
    #[arg(long = "parse", value_name = "FILE")]
    pub parse: Option<PathBuf>,

    /// Output file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_file: Option<String>,

    /// Output in JSON format
    #[arg(long = "json", conflicts_with_all = ["csv", "clean"])]
    pub json: bool,

    /// Output in CSV format (hostname,ip,source)
    #[arg(long = "csv", conflicts_with = "clean")]
    pub csv: bool,

    /// Hostnames grouped by IP
    #[arg(long = "clean")]
    pub clean: bool,

    /// No progress output
    #[arg(long = "silent")]
    pub silent: bool,

    /// List all available sources
    #[arg(long = "list-sources")]
    pub list_sources: bool,

    /// Configuration file path (TOML)
    #[arg(long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,
}

impl Args {
    /// True when stdin is piped rather than a terminal.
    pub fn use_stdin(&self) -> bool {
        !atty::is(atty::Stream::Stdin)
    }
}
