// src/chain.rs
//! CNAME chain following and wildcard detection on top of the DNS primitives.
use crate::resolver::DnsClient;
use crate::types::ReconError;
use log::debug;
use std::collections::BTreeSet;
use std::net::IpAddr;

/// Maximum number of CNAME records followed for a single name.
pub const MAX_CNAME_HOPS: usize = 10;

/// Label queried to discover wildcard answers. Nobody registers this.
pub const WILDCARD_SENTINEL: &str = "youmustcontstuctmoreplyons";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrFamily {
    V4,
    V6,
}

/// Addresses a name resolved to and the CNAME targets crossed on the way,
/// in the order they were followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub addrs: Vec<IpAddr>,
    pub chain: Vec<String>,
}

enum ChainState {
    Resolving(String),
    FollowingCname(String),
    Done(Vec<IpAddr>),
    Failed(ReconError),
}

/// Resolves `name`, re-querying CNAME targets until an address record shows
/// up. Gives up with an error after `MAX_CNAME_HOPS` hops, which also covers
/// cyclic zones.
pub async fn follow_chain(
    dns: &dyn DnsClient,
    name: &str,
    family: AddrFamily,
) -> Result<Resolution, ReconError> {
    let mut chain: Vec<String> = Vec::new();
    let mut state = ChainState::Resolving(name.to_string());

    loop {
        state = match state {
            ChainState::Resolving(current) => match lookup_addrs(dns, &current, family).await {
                Ok(addrs) => ChainState::Done(addrs),
                Err(_) => ChainState::FollowingCname(current),
            },
            ChainState::FollowingCname(current) => match dns.resolve_cname(&current).await {
                Ok(targets) => match targets.into_iter().next() {
                    Some(target) => {
                        chain.push(target.clone());
                        if chain.len() > MAX_CNAME_HOPS {
                            debug!("{}: CNAME chain exceeded {} hops", name, MAX_CNAME_HOPS);
                            ChainState::Failed(ReconError::NotFound(name.to_string()))
                        } else {
                            ChainState::Resolving(target)
                        }
                    }
                    None => ChainState::Failed(ReconError::NotFound(current)),
                },
                Err(e) => ChainState::Failed(e),
            },
            ChainState::Done(addrs) => return Ok(Resolution { addrs, chain }),
            ChainState::Failed(e) => return Err(e),
        };
    }
}

async fn lookup_addrs(
    dns: &dyn DnsClient,
    name: &str,
    family: AddrFamily,
) -> Result<Vec<IpAddr>, ReconError> {
    match family {
        AddrFamily::V4 => Ok(dns
            .resolve_a(name)
            .await?
            .into_iter()
            .map(IpAddr::V4)
            .collect()),
        AddrFamily::V6 => Ok(dns
            .resolve_aaaa(name)
            .await?
            .into_iter()
            .map(IpAddr::V6)
            .collect()),
    }
}

/// The synthetic answer set of a wildcard zone. Empty when the domain has
/// no wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wildcard {
    addrs: BTreeSet<IpAddr>,
}

impl Wildcard {
    pub fn new(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            addrs: addrs.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn addrs(&self) -> impl Iterator<Item = &IpAddr> {
        self.addrs.iter()
    }

    /// True when `addrs` is exactly the wildcard answer set.
    pub fn matches(&self, addrs: &[IpAddr]) -> bool {
        if self.addrs.is_empty() {
            return false;
        }
        addrs.iter().copied().collect::<BTreeSet<_>>() == self.addrs
    }
}

pub async fn detect_wildcard(dns: &dyn DnsClient, domain: &str, family: AddrFamily) -> Wildcard {
    let sentinel = format!("{}.{}", WILDCARD_SENTINEL, domain);
    match follow_chain(dns, &sentinel, family).await {
        Ok(resolution) => Wildcard::new(resolution.addrs),
        Err(_) => Wildcard::default(),
    }
}
