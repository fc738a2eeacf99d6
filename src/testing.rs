//! In-memory `DnsClient` for unit tests.
use crate::resolver::DnsClient;
use crate::types::ReconError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct FakeDns {
    a: HashMap<String, Vec<Ipv4Addr>>,
    aaaa: HashMap<String, Vec<Ipv6Addr>>,
    cname: HashMap<String, String>,
    ptr: HashMap<IpAddr, Vec<String>>,
    ns: HashMap<String, Vec<String>>,
    mx: HashMap<String, Vec<String>>,
    srv: HashMap<String, Vec<String>>,
    queries: AtomicUsize,
}

impl FakeDns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn a(mut self, name: &str, ips: &[&str]) -> Self {
        let ips = ips.iter().map(|ip| ip.parse().unwrap()).collect();
        self.a.insert(name.to_string(), ips);
        self
    }

    pub fn aaaa(mut self, name: &str, ips: &[&str]) -> Self {
        let ips = ips.iter().map(|ip| ip.parse().unwrap()).collect();
        self.aaaa.insert(name.to_string(), ips);
        self
    }

    pub fn cname(mut self, name: &str, target: &str) -> Self {
        self.cname.insert(name.to_string(), target.to_string());
        self
    }

    pub fn ptr(mut self, ip: &str, names: &[&str]) -> Self {
        self.ptr.insert(ip.parse().unwrap(), to_strings(names));
        self
    }

    pub fn ns(mut self, name: &str, names: &[&str]) -> Self {
        self.ns.insert(name.to_string(), to_strings(names));
        self
    }

    pub fn mx(mut self, name: &str, names: &[&str]) -> Self {
        self.mx.insert(name.to_string(), to_strings(names));
        self
    }

    pub fn srv(mut self, name: &str, names: &[&str]) -> Self {
        self.srv.insert(name.to_string(), to_strings(names));
        self
    }

    /// Total number of queries answered so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn answer<K, T>(&self, map: &HashMap<K, Vec<T>>, key: &K, name: &str) -> Result<Vec<T>, ReconError>
    where
        K: std::hash::Hash + Eq,
        T: Clone,
    {
        self.queries.fetch_add(1, Ordering::SeqCst);
        map.get(key)
            .filter(|answers| !answers.is_empty())
            .cloned()
            .ok_or_else(|| ReconError::NotFound(name.to_string()))
    }
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[async_trait]
impl DnsClient for FakeDns {
    async fn resolve_a(&self, name: &str) -> Result<Vec<Ipv4Addr>, ReconError> {
        self.answer(&self.a, &name.to_string(), name)
    }

    async fn resolve_aaaa(&self, name: &str) -> Result<Vec<Ipv6Addr>, ReconError> {
        self.answer(&self.aaaa, &name.to_string(), name)
    }

    async fn resolve_cname(&self, name: &str) -> Result<Vec<String>, ReconError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.cname
            .get(name)
            .map(|target| vec![target.clone()])
            .ok_or_else(|| ReconError::NotFound(name.to_string()))
    }

    async fn resolve_ptr(&self, ip: IpAddr) -> Result<Vec<String>, ReconError> {
        self.answer(&self.ptr, &ip, &ip.to_string())
    }

    async fn resolve_ns(&self, name: &str) -> Result<Vec<String>, ReconError> {
        self.answer(&self.ns, &name.to_string(), name)
    }

    async fn resolve_mx(&self, name: &str) -> Result<Vec<String>, ReconError> {
        self.answer(&self.mx, &name.to_string(), name)
    }

    async fn resolve_srv(&self, name: &str) -> Result<Vec<String>, ReconError> {
        self.answer(&self.srv, &name.to_string(), name)
    }
}
