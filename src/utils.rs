// src/utils.rs
use crate::error::ErrorContext;
use crate::types::ReconError;
use ipnet::{IpAddrRange, IpNet, Ipv4AddrRange, Ipv6AddrRange};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

/// Upper bound on the addresses a single network or range may expand to.
pub const MAX_RANGE_SIZE: usize = 1 << 20;

/// Reads the non-empty lines of a file, trimmed.
pub fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// `--domain` takes either a file of domains or a single domain.
pub fn domains_from_arg(arg: &str) -> Result<Vec<String>, ReconError> {
    let path = Path::new(arg);
    if path.exists() {
        read_lines(path).with_context(|| format!("Error reading {}", arg))
    } else {
        Ok(vec![arg.to_string()])
    }
}

/// Expands IP addresses, CIDR networks and ranges (`a.b.c.d-e.f.g.h` or
/// `a.b.c.d-N`) into every address they cover, in order.
pub fn lines_to_ip_list(lines: &[String]) -> Result<Vec<IpAddr>, ReconError> {
    let mut ips = Vec::new();
    for line in lines {
        let line = line.trim();
        if let Ok(ip) = line.parse::<IpAddr>() {
            ips.push(ip);
        } else if let Ok(net) = line.parse::<IpNet>() {
            ips.extend(expand_network(line, net)?);
        } else if let Some((start, end)) = line.split_once('-') {
            ips.extend(expand_range(line, start, end)?);
        } else {
            return Err(not_a_network(line));
        }
    }
    Ok(ips)
}

fn not_a_network(line: &str) -> ReconError {
    ReconError::InvalidTarget(format!("{} is not an IP Address or CIDR Network", line))
}

fn too_large(line: &str) -> ReconError {
    ReconError::InvalidTarget(format!("{} covers more than {} addresses", line, MAX_RANGE_SIZE))
}

/// Every address of the network, network and broadcast included.
fn expand_network(line: &str, net: IpNet) -> Result<Vec<IpAddr>, ReconError> {
    let host_bits = u32::from(net.max_prefix_len() - net.prefix_len());
    if 1u128.checked_shl(host_bits).map_or(true, |size| size > MAX_RANGE_SIZE as u128) {
        return Err(too_large(line));
    }

    let range = match net {
        IpNet::V4(v4) => IpAddrRange::from(Ipv4AddrRange::new(v4.network(), v4.broadcast())),
        IpNet::V6(v6) => IpAddrRange::from(Ipv6AddrRange::new(v6.network(), v6.broadcast())),
    };
    Ok(range.collect())
}

fn expand_range(line: &str, start: &str, end: &str) -> Result<Vec<IpAddr>, ReconError> {
    let start: IpAddr = start.trim().parse().map_err(|_| not_a_network(line))?;
    let end = end.trim();

    let end: IpAddr = match end.parse::<IpAddr>() {
        Ok(end) => end,
        // Last-octet shorthand, only for IPv4.
        Err(_) => match (start, end.parse::<u8>()) {
            (IpAddr::V4(v4), Ok(last)) => {
                let [a, b, c, _] = v4.octets();
                IpAddr::V4(Ipv4Addr::new(a, b, c, last))
            }
            _ => return Err(not_a_network(line)),
        },
    };

    let range = match (start, end) {
        (IpAddr::V4(first), IpAddr::V4(last)) if first <= last => {
            IpAddrRange::from(Ipv4AddrRange::new(first, last))
        }
        (IpAddr::V6(first), IpAddr::V6(last)) if first <= last => {
            IpAddrRange::from(Ipv6AddrRange::new(first, last))
        }
        _ => {
            return Err(ReconError::InvalidTarget(format!("{} is greater than {}", start, end)));
        }
    };

    let ips: Vec<IpAddr> = range.take(MAX_RANGE_SIZE + 1).collect();
    if ips.len() > MAX_RANGE_SIZE {
        return Err(too_large(line));
    }
    Ok(ips)
}

/// Check if a string is a valid domain
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }

    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() < 2 {
        return false;
    }

    parts.iter().all(|part| {
        !part.is_empty()
            && part.len() <= 63
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            && !part.starts_with('-')
            && !part.ends_with('-')
    })
}
