//! Probe seam between the orchestrator and the network.
//!
//! Every probe is a stateless request/response call carrying its own
//! timeout. [`NetworkProbes`] talks to the real network; tests substitute a
//! scripted implementation.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use dns_lookup::lookup_addr;
use log::{debug, warn};
use surge_ping::{Client, Config as PingConfig, PingIdentifier, PingSequence, ICMP};

use super::arp;
use super::snmp;
use crate::config::SnmpSettings;
use crate::db::facts::{InterfaceFact, SnmpFact};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("timed out")]
    Timeout,
    /// The probe mechanism itself cannot run (no raw socket, unreadable table).
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PingOutcome {
    Alive,
    Silent,
    /// ICMP could not be attempted at all.
    Unavailable,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnmpReport {
    pub system: SnmpFact,
    pub interfaces: Vec<InterfaceFact>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NeighborProtocol {
    Lldp,
    Cdp,
}

impl NeighborProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            NeighborProtocol::Lldp => "lldp",
            NeighborProtocol::Cdp => "cdp",
        }
    }
}

/// One adjacency announcement harvested from a device.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
    pub protocol: NeighborProtocol,
    pub local_port: Option<String>,
    pub remote_name: Option<String>,
    pub remote_port: Option<String>,
    pub remote_mac: Option<String>,
    pub remote_address: Option<IpAddr>,
}

#[async_trait]
pub trait Probes: Send + Sync {
    async fn arp_table(&self) -> Result<HashMap<IpAddr, String>, ProbeError>;

    async fn ping(&self, address: IpAddr, timeout: Duration) -> PingOutcome;

    async fn resolve_name(&self, address: IpAddr, timeout: Duration) -> Option<String>;

    async fn snmp_poll(
        &self,
        address: IpAddr,
        settings: &SnmpSettings,
    ) -> Result<SnmpReport, ProbeError>;

    async fn tcp_connect(&self, address: IpAddr, port: u16, timeout: Duration) -> bool;

    async fn neighbors(
        &self,
        address: IpAddr,
        settings: &SnmpSettings,
        protocol: NeighborProtocol,
    ) -> Result<Vec<Neighbor>, ProbeError>;
}

pub struct NetworkProbes {
    arp_table_path: String,
    icmp_v4: Option<Client>,
    icmp_v6: Option<Client>,
}

impl NetworkProbes {
    // Must be called inside a tokio runtime; ICMP clients spawn a receive task.
    pub fn new(arp_table_path: &str) -> Self {
        let icmp_v4 = match Client::new(&PingConfig::default()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("ICMPv4 unavailable ({}), liveness will fall back to ARP", e);
                None
            }
        };
        let icmp_v6 = match Client::new(&PingConfig::builder().kind(ICMP::V6).build()) {
            Ok(client) => Some(client),
            Err(e) => {
                debug!("ICMPv6 unavailable: {}", e);
                None
            }
        };
        NetworkProbes {
            arp_table_path: arp_table_path.to_string(),
            icmp_v4,
            icmp_v6,
        }
    }
}

fn ping_identifier(address: IpAddr) -> PingIdentifier {
    let seed = match address {
        IpAddr::V4(v4) => u32::from(v4) as u16,
        IpAddr::V6(v6) => u128::from(v6) as u16,
    };
    PingIdentifier(seed ^ (std::process::id() as u16))
}

#[async_trait]
impl Probes for NetworkProbes {
    async fn arp_table(&self) -> Result<HashMap<IpAddr, String>, ProbeError> {
        arp::read_arp_table(&self.arp_table_path)
            .await
            .map_err(|e| ProbeError::Unavailable(format!("{}: {}", self.arp_table_path, e)))
    }

    async fn ping(&self, address: IpAddr, timeout: Duration) -> PingOutcome {
        let client = match address {
            IpAddr::V4(_) => self.icmp_v4.as_ref(),
            IpAddr::V6(_) => self.icmp_v6.as_ref(),
        };
        let client = match client {
            Some(client) => client,
            None => return PingOutcome::Unavailable,
        };
        let payload = [0u8; 56];
        let mut pinger = client.pinger(address, ping_identifier(address)).await;
        pinger.timeout(timeout);
        match pinger.ping(PingSequence(0), &payload).await {
            Ok(_) => PingOutcome::Alive,
            Err(e) => {
                debug!("no echo reply from {}: {}", address, e);
                PingOutcome::Silent
            }
        }
    }

    async fn resolve_name(&self, address: IpAddr, timeout: Duration) -> Option<String> {
        let lookup = tokio::task::spawn_blocking(move || lookup_addr(&address));
        match tokio::time::timeout(timeout, lookup).await {
            Ok(Ok(Ok(name))) if name != address.to_string() => Some(name),
            _ => None,
        }
    }

    async fn snmp_poll(
        &self,
        address: IpAddr,
        settings: &SnmpSettings,
    ) -> Result<SnmpReport, ProbeError> {
        snmp::poll(address, settings).await
    }

    async fn tcp_connect(&self, address: IpAddr, port: u16, timeout: Duration) -> bool {
        let target = SocketAddr::new(address, port);
        matches!(
            tokio::time::timeout(timeout, tokio::net::TcpStream::connect(target)).await,
            Ok(Ok(_))
        )
    }

    async fn neighbors(
        &self,
        address: IpAddr,
        settings: &SnmpSettings,
        protocol: NeighborProtocol,
    ) -> Result<Vec<Neighbor>, ProbeError> {
        match protocol {
            NeighborProtocol::Lldp => snmp::lldp_neighbors(address, settings).await,
            NeighborProtocol::Cdp => snmp::cdp_neighbors(address, settings).await,
        }
    }
}
