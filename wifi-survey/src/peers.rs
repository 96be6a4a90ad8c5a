//! Rough count of devices sharing a wireless network with this machine.
//!
//! For every wireless interface with an IPv4 broadcast address we ping the
//! broadcast address so that answering hosts land in the neighbor (ARP) cache,
//! then count the cache lines that look like hosts of the target network.
//! Nothing guarantees that replies have been processed by the time the table
//! is read, so the numbers are a lower bound at best.

use std::net::Ipv4Addr;

use nix::{
    ifaddrs::getifaddrs,
    sys::socket::{AddressFamily, SockaddrLike as _},
};
use regex::Regex;
use serde::{ser::SerializeMap as _, Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::{
    config::PeerConfig,
    shell::{CommandLine, Shell},
    Result,
};

/// One address entry of a local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub name: String,
    pub broadcast: Option<Ipv4Addr>,
}

pub trait InterfaceSource {
    /// Address entries in the order the system reports them.
    fn interfaces(&self) -> Result<Vec<InterfaceAddr>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> Result<Vec<InterfaceAddr>> {
        let addrs = getifaddrs()?
            .filter(|ifaddr| {
                ifaddr
                    .address
                    .as_ref()
                    .and_then(|addr| addr.family())
                    .is_some_and(|family| family == AddressFamily::Inet)
            })
            .map(|ifaddr| InterfaceAddr {
                broadcast: ifaddr
                    .broadcast
                    .as_ref()
                    .and_then(|addr| addr.as_sockaddr_in())
                    .map(|sin| *std::net::SocketAddrV4::from(*sin).ip()),
                name: ifaddr.interface_name,
            })
            .collect();

        Ok(addrs)
    }
}

/// Number of matching neighbor table lines seen after pinging `broadcast`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCount {
    pub broadcast: Ipv4Addr,
    pub count: usize,
}

/// Serialized as `{"<broadcast>": <count>}`.
impl Serialize for PeerCount {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.broadcast.to_string(), &self.count)?;
        map.end()
    }
}

/// First broadcast address of every interface whose name matches `pattern`,
/// in enumeration order.
pub fn wireless_broadcasts(addrs: &[InterfaceAddr], pattern: &Regex) -> Vec<Ipv4Addr> {
    let mut seen: Vec<&str> = Vec::new();
    let mut out = Vec::new();

    for addr in addrs {
        if !pattern.is_match(&addr.name) || seen.contains(&addr.name.as_str()) {
            continue;
        }
        match addr.broadcast {
            Some(broadcast) => {
                seen.push(&addr.name);
                out.push(broadcast);
            }
            None => debug!(interface = %addr.name, "no broadcast address, skipping"),
        }
    }

    out
}

pub fn count_matching_lines(table: &str, pattern: &Regex) -> usize {
    table.lines().filter(|line| pattern.is_match(line)).count()
}

pub struct PeerCounter<'a, S> {
    shell: &'a S,
    cfg: &'a PeerConfig,
}

impl<'a, S: Shell> PeerCounter<'a, S> {
    pub fn new(shell: &'a S, cfg: &'a PeerConfig) -> Self {
        Self { shell, cfg }
    }

    fn ping_command(&self, broadcast: Ipv4Addr) -> CommandLine {
        let mut args = vec!["-c".to_string(), self.cfg.ping_count.to_string()];
        // Linux refuses broadcast destinations without -b.
        if cfg!(target_os = "linux") {
            args.push("-b".to_string());
        }
        args.push(broadcast.to_string());

        CommandLine::new(&self.cfg.ping_program, args)
    }

    fn count_for(&self, broadcast: Ipv4Addr) -> Result<PeerCount> {
        let ping = self.ping_command(broadcast);
        let output = self.shell.exec(&ping)?;
        if !output.success {
            debug!(%broadcast, status = %output.status, "broadcast ping did not succeed");
        }

        let table = self
            .shell
            .exec(&self.cfg.neighbor_command)?
            .ensure_success(&self.cfg.neighbor_command)?;
        let count = count_matching_lines(&table.stdout, &self.cfg.hostname_pattern);
        info!(%broadcast, count, "counted peers");

        Ok(PeerCount { broadcast, count })
    }

    pub fn count(&self, source: &impl InterfaceSource) -> Result<Vec<PeerCount>> {
        let addrs = source.interfaces()?;
        let broadcasts = wireless_broadcasts(&addrs, &self.cfg.interface_pattern);
        if broadcasts.is_empty() {
            warn!("no wireless interface with a broadcast address");
        }

        broadcasts
            .into_iter()
            .map(|broadcast| self.count_for(broadcast))
            .collect()
    }
}
