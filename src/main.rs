// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use hostrecon::cli::Args;
use hostrecon::engine::ReconEngine;
use hostrecon::output::{self, OutputManager};
use hostrecon::sources;
use hostrecon::types::{Config, HostResult, OutputFormat, TargetKind};
use hostrecon::utils;
use log::{error, info};
use std::io::Read;
use std::net::IpAddr;
use std::process;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let level = if args.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    if args.list_sources {
        list_sources();
        return Ok(());
    }

    if let Some(path) = &args.parse {
        let results = output::read_results(path)?;
        let mut config = Config::default();
        config.output.format = if args.json {
            OutputFormat::Json
        } else if args.csv {
            OutputFormat::Csv
        } else if args.clean {
            OutputFormat::Clean
        } else {
            OutputFormat::Text
        };
        config.output.file = args.output_file.clone();
        OutputManager::new(config.output).write_results(&results).await?;
        return Ok(());
    }

    let engine = ReconEngine::new(&args)?;

    let mut ips = collect_ips(&args)?;
    let domains = match &args.domain {
        Some(arg) => utils::domains_from_arg(arg)?,
        None => Vec::new(),
    };

    let seed = if args.use_stdin() {
        let piped = read_stdin_results()?;
        ips.extend(piped.iter().filter_map(|r| r.ip.parse::<IpAddr>().ok()));
        piped
    } else {
        Vec::new()
    };

    let stats = engine
        .run(ips, domains, seed)
        .await
        .context("Run failed")?;

    if !engine.config().output.silent {
        info!(
            "Run completed: {} results from {} tasks ({} failed) in {:.2}s",
            stats.unique_results,
            stats.tasks_submitted,
            stats.failed_tasks,
            stats.duration.as_secs_f64()
        );
    }
    Ok(())
}

fn collect_ips(args: &Args) -> Result<Vec<IpAddr>> {
    let mut ips = Vec::new();
    if let Some(target) = &args.target {
        ips.extend(utils::lines_to_ip_list(&[target.clone()])?);
    }
    if let Some(path) = &args.input {
        let lines = utils::read_lines(path)
            .with_context(|| format!("Error reading {}", path.display()))?;
        ips.extend(utils::lines_to_ip_list(&lines)?);
    }
    Ok(ips)
}

/// Results piped in from a previous `--json` run.
fn read_stdin_results() -> Result<Vec<HostResult>> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Error reading stdin")?;
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    output::parse_results(&input).context("Error parsing JSON from stdin")
}

fn list_sources() {
    println!("Available sources:\n");

    let config = Config::default();
    let mut ip_sources = Vec::new();
    let mut domain_sources = Vec::new();

    for source in sources::get_all_sources(&config) {
        let info = source.info();
        let active = if info.active { " *" } else { "" };
        let keyed = if info.needs_key { " (key)" } else { "" };
        let line = format!("{}{}{}", info.name, active, keyed);
        match info.target {
            TargetKind::Ip => ip_sources.push(line),
            TargetKind::Domain => domain_sources.push(line),
        }
    }

    println!("IP sources ({})", ip_sources.len());
    for source in ip_sources {
        println!("  {}", source);
    }

    println!("\nDomain sources ({})", domain_sources.len());
    for source in domain_sources {
        println!("  {}", source);
    }

    println!("\n* = Connects to the target itself");
    println!("(key) = Needs an API key, from [api_keys] in the config file or <SOURCE>_API_KEYS");
    println!("\nDictionary guessing is enabled with --dictionary <FILE> and needs -d.");
}
