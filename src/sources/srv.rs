// src/sources/srv.rs
use crate::engine::RunContext;
use crate::sources::{add_resolved, wrong_target, Source};
use crate::task::TaskOutcome;
use crate::types::{SourceInfo, Target, TargetKind};
use async_trait::async_trait;

/// Well-known service labels tried under every domain.
const SERVICE_LABELS: &[&str] = &[
    "_gc._tcp", "_kerberos._tcp", "_kerberos._udp", "_ldap._tcp",
    "_test._tcp", "_sips._tcp", "_sip._udp", "_sip._tcp", "_aix._tcp",
    "_finger._tcp", "_ftp._tcp", "_http._tcp", "_nntp._tcp",
    "_telnet._tcp", "_whois._tcp", "_h323cs._tcp", "_h323cs._udp",
    "_h323be._tcp", "_h323be._udp", "_h323ls._tcp", "_https._tcp",
    "_h323ls._udp", "_sipinternal._tcp", "_sipinternaltls._tcp",
    "_sip._tls", "_sipfederationtls._tcp", "_jabber._tcp",
    "_xmpp-server._tcp", "_xmpp-client._tcp", "_imap.tcp",
    "_certificates._tcp", "_crls._tcp", "_pgpkeys._tcp",
    "_pgprevokations._tcp", "_cmp._tcp", "_svcp._tcp", "_crl._tcp",
    "_ocsp._tcp", "_PKIXREP._tcp", "_smtp._tcp", "_hkp._tcp",
    "_hkps._tcp", "_jabber._udp", "_xmpp-server._udp", "_xmpp-client._udp",
    "_jabber-client._tcp", "_jabber-client._udp", "_kpasswd._tcp", "_kpasswd._udp",
    "_imap._tcp",
];

/// Targets of common SRV records and their addresses.
#[derive(Debug, Clone)]
pub struct SrvSource {
    name: String,
}

impl Default for SrvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SrvSource {
    pub fn new() -> Self {
        Self { name: "srv".to_string() }
    }
}

#[async_trait]
impl Source for SrvSource {
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

    async fn probe(&self, target: &Target, ctx: &RunContext) -> TaskOutcome {
        let Target::Domain(domain) = target else {
            return wrong_target(&self.name, target);
        };

        // Most labels do not exist; misses are expected and not errors.
        let mut outcome = TaskOutcome::new(&self.name);
        for label in SERVICE_LABELS {
            let fqdn = format!("{}.{}", label, domain);
            let Ok(targets) = ctx.dns.resolve_srv(&fqdn).await else {
                continue;
            };
            for srv_target in targets {
                add_resolved(&mut outcome, ctx.dns.as_ref(), &srv_target).await;
            }
        }
        outcome
    }
}
