// src/output.rs
use crate::error::ErrorContext;
use crate::types::{HostResult, OutputConfig, OutputFormat, ReconError};
use log::info;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

const COLUMN_PADDING: usize = 4;

pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Writes the final, already sorted result sequence.
    pub async fn write_results(&self, results: &[HostResult]) -> Result<(), ReconError> {
        if let Some(file_path) = &self.config.file {
            self.write_to_file(file_path, results)
        } else {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            self.write_output(&mut handle, results)
        }
    }

    fn write_to_file(&self, file_path: &str, results: &[HostResult]) -> Result<(), ReconError> {
        if let Some(parent) = Path::new(file_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| ReconError::OutputError(format!("Failed to create directory: {}", e)))?;
            }
        }

        let mut file = File::create(file_path)
            .map_err(|e| ReconError::OutputError(format!("Failed to create file: {}", e)))?;
        self.write_output(&mut file, results)?;

        info!("Results written to: {}", file_path);
        Ok(())
    }

    pub fn write_output<W: Write>(&self, writer: &mut W, results: &[HostResult]) -> Result<(), ReconError> {
        match self.config.format {
            OutputFormat::Text => write_text_output(writer, results),
            OutputFormat::Json => write_json_output(writer, results),
            OutputFormat::Csv => write_csv_output(writer, results),
            OutputFormat::Clean => write_clean_output(writer, results),
        }
        .map_err(|e| ReconError::OutputError(e.to_string()))
    }
}

/// Left-aligned `IP  Hostname  Source` table.
fn write_text_output<W: Write>(writer: &mut W, results: &[HostResult]) -> std::io::Result<()> {
    let header = ("IP", "Hostname", "Source");
    let ip_width = results
        .iter()
        .map(|r| r.ip.len())
        .chain(std::iter::once(header.0.len()))
        .max()
        .unwrap_or_default()
        + COLUMN_PADDING;
    let host_width = results
        .iter()
        .map(|r| r.hostname.len())
        .chain(std::iter::once(header.1.len()))
        .max()
        .unwrap_or_default()
        + COLUMN_PADDING;

    writeln!(writer, "{:<ip_width$}{:<host_width$}{}", header.0, header.1, header.2)?;
    for r in results {
        writeln!(writer, "{:<ip_width$}{:<host_width$}{}", r.ip, r.hostname, r.source)?;
    }
    Ok(())
}

fn write_json_output<W: Write>(writer: &mut W, results: &[HostResult]) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    writeln!(writer, "{}", json)
}

fn write_csv_output<W: Write>(writer: &mut W, results: &[HostResult]) -> std::io::Result<()> {
    for r in results {
        writeln!(writer, "{},{},{}", r.hostname, r.ip, r.source)?;
    }
    Ok(())
}

/// Hostnames grouped under each IP, in first-seen order.
fn write_clean_output<W: Write>(writer: &mut W, results: &[HostResult]) -> std::io::Result<()> {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for r in results {
        let slot = *index.entry(r.ip.as_str()).or_insert_with(|| {
            groups.push((r.ip.as_str(), Vec::new()));
            groups.len() - 1
        });
        if seen.insert((r.ip.as_str(), r.hostname.as_str())) {
            groups[slot].1.push(&r.hostname);
        }
    }

    for (ip, hostnames) in groups {
        writeln!(writer, "{}:", ip)?;
        for hostname in hostnames {
            writeln!(writer, "\t{}", hostname)?;
        }
    }
    Ok(())
}

/// Loads a result set previously written with `--json`.
pub fn read_results(path: &Path) -> Result<Vec<HostResult>, ReconError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Error reading file {}", path.display()))?;
    parse_results(&data)
}

pub fn parse_results(data: &str) -> Result<Vec<HostResult>, ReconError> {
    serde_json::from_str(data)
        .map_err(|e| ReconError::ParseError(format!("Error parsing JSON results: {}", e)))
}
