// Scope parsing and candidate address enumeration.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::Serialize;

use crate::error::{Error, Result};

/// A validated discovery scope: a single address or a network-masked CIDR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scope(IpNetwork);

impl Scope {
    pub fn parse(input: &str) -> Result<Scope> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::validation("invalid_scope", "scope is empty"));
        }
        let network = match input.parse::<IpAddr>() {
            Ok(addr) => IpNetwork::from(addr),
            Err(_) => input.parse::<IpNetwork>().map_err(|_| {
                Error::validation(
                    "invalid_scope",
                    format!("{:?} is neither an IP address nor a CIDR prefix", input),
                )
            })?,
        };
        // Mask host bits away so 10.0.1.7/24 and 10.0.1.0/24 are the same scope.
        let masked = IpNetwork::new(network.network(), network.prefix()).map_err(|_| {
            Error::validation("invalid_scope", format!("{:?} has an invalid prefix", input))
        })?;
        Ok(Scope(masked))
    }

    pub fn network(&self) -> IpNetwork {
        self.0
    }

    fn is_single_address(&self) -> bool {
        match self.0 {
            IpNetwork::V4(net) => net.prefix() == 32,
            IpNetwork::V6(net) => net.prefix() == 128,
        }
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        self.0.contains(addr)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_single_address() {
            write!(f, "{}", self.0.ip())
        } else {
            write!(f, "{}/{}", self.0.network(), self.0.prefix())
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Targets {
    pub addresses: Vec<IpAddr>,
    /// Usable addresses in the scope before the cap was applied.
    pub total: u128,
    pub truncated: bool,
}

/// Expand a scope into at most `max_targets` addresses, lowest first.
///
/// IPv4 networks shorter than /31 skip their network and broadcast
/// addresses; IPv6 networks shorter than /127 skip the subnet-router anycast.
pub fn enumerate(scope: &Scope, max_targets: usize) -> Targets {
    match scope.network() {
        IpNetwork::V4(net) => {
            let size = host_count(32 - net.prefix());
            let (skip, total) = if net.prefix() < 31 {
                (1, size - 2)
            } else {
                (0, size)
            };
            let take = total.min(max_targets as u128) as usize;
            let addresses = net.iter().skip(skip).take(take).map(IpAddr::V4).collect();
            Targets {
                addresses,
                total,
                truncated: total > take as u128,
            }
        }
        IpNetwork::V6(net) => {
            let size = host_count(128 - net.prefix());
            let (skip, total) = if net.prefix() < 127 {
                (1, size - 1)
            } else {
                (0, size)
            };
            let take = total.min(max_targets as u128) as usize;
            let addresses = net.iter().skip(skip).take(take).map(IpAddr::V6).collect();
            Targets {
                addresses,
                total,
                truncated: total > take as u128,
            }
        }
    }
}

fn host_count(host_bits: u8) -> u128 {
    if host_bits >= 128 {
        u128::MAX
    } else {
        1u128 << host_bits
    }
}

// Network of the first non-loopback IPv4 interface.
pub fn local_scope() -> Option<Scope> {
    let ifaces = if_addrs::get_if_addrs().ok()?;
    ifaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .find_map(|iface| match iface.addr {
            if_addrs::IfAddr::V4(v4) => {
                let prefix = u32::from(v4.netmask).count_ones() as u8;
                let net = IpNetwork::new(IpAddr::V4(v4.ip), prefix).ok()?;
                Scope::parse(&format!("{}/{}", net.network(), prefix)).ok()
            }
            if_addrs::IfAddr::V6(_) => None,
        })
}
