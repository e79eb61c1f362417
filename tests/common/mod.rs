// Scripted probes and store helpers shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DatabaseConnection;

use netatlas::config::{DiscoveryConfig, SnmpSettings};
use netatlas::db;
use netatlas::db::facts::{self, Fact, IpFact, SnmpFact};
use netatlas::discovery::probe::{
    Neighbor, NeighborProtocol, PingOutcome, ProbeError, Probes, SnmpReport,
};
use netatlas::discovery::Orchestrator;
use netatlas::metrics::RunMetrics;

/// Probe results answered from tables instead of the network.
#[derive(Default)]
pub struct ScriptedProbes {
    pub arp: HashMap<IpAddr, String>,
    pub alive: HashSet<IpAddr>,
    pub icmp_unavailable: bool,
    pub ping_delay: Option<Duration>,
    pub names: HashMap<IpAddr, String>,
    pub snmp: HashMap<IpAddr, SnmpReport>,
    pub open_ports: HashMap<IpAddr, Vec<u16>>,
    pub neighbors: HashMap<IpAddr, Vec<Neighbor>>,
    /// Every address a TCP connect was attempted against.
    pub connects: Mutex<Vec<IpAddr>>,
}

impl ScriptedProbes {
    pub fn alive(mut self, addresses: &[&str]) -> Self {
        self.alive.extend(addresses.iter().map(|a| ip(a)));
        self
    }

    pub fn sys_name(mut self, address: &str, name: &str) -> Self {
        self.snmp.insert(
            ip(address),
            SnmpReport {
                system: SnmpFact {
                    address: Some(address.to_string()),
                    version: Some("2c".to_string()),
                    sys_name: Some(name.to_string()),
                    ..Default::default()
                },
                interfaces: Vec::new(),
            },
        );
        self
    }

    pub fn connected(&self) -> Vec<IpAddr> {
        self.connects.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Probes for ScriptedProbes {
    async fn arp_table(&self) -> Result<HashMap<IpAddr, String>, ProbeError> {
        Ok(self.arp.clone())
    }

    async fn ping(&self, address: IpAddr, _timeout: Duration) -> PingOutcome {
        if let Some(delay) = self.ping_delay {
            tokio::time::sleep(delay).await;
        }
        if self.icmp_unavailable {
            PingOutcome::Unavailable
        } else if self.alive.contains(&address) {
            PingOutcome::Alive
        } else {
            PingOutcome::Silent
        }
    }

    async fn resolve_name(&self, address: IpAddr, _timeout: Duration) -> Option<String> {
        self.names.get(&address).cloned()
    }

    async fn snmp_poll(
        &self,
        address: IpAddr,
        _settings: &SnmpSettings,
    ) -> Result<SnmpReport, ProbeError> {
        self.snmp.get(&address).cloned().ok_or(ProbeError::Timeout)
    }

    async fn tcp_connect(&self, address: IpAddr, port: u16, _timeout: Duration) -> bool {
        if let Ok(mut connects) = self.connects.lock() {
            connects.push(address);
        }
        self.open_ports
            .get(&address)
            .map(|ports| ports.contains(&port))
            .unwrap_or(false)
    }

    async fn neighbors(
        &self,
        address: IpAddr,
        _settings: &SnmpSettings,
        protocol: NeighborProtocol,
    ) -> Result<Vec<Neighbor>, ProbeError> {
        Ok(self
            .neighbors
            .get(&address)
            .map(|all| {
                all.iter()
                    .filter(|n| n.protocol == protocol)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn ip(address: &str) -> IpAddr {
    address.parse().expect("test address should parse")
}

pub async fn memory_db() -> DatabaseConnection {
    db::open("sqlite::memory:")
        .await
        .expect("in-memory database should open")
}

/// Defaults with the host-dependent lookups turned off.
pub fn test_config() -> DiscoveryConfig {
    DiscoveryConfig {
        arp_enabled: false,
        oui_lookup: false,
        ..Default::default()
    }
}

pub fn orchestrator(
    db: &DatabaseConnection,
    config: DiscoveryConfig,
    probes: Arc<ScriptedProbes>,
) -> Orchestrator {
    Orchestrator::new(db.clone(), config, probes, Arc::new(RunMetrics::default()))
}

/// A device carrying the given addresses, as discovery would have left it.
pub async fn device_with_ips(db: &DatabaseConnection, addresses: &[&str]) -> i32 {
    let now = Utc::now();
    let device = db::devices::insert_device(db, None, now)
        .await
        .expect("device insert");
    for address in addresses {
        let fact = Fact::Ip(IpFact {
            address: ip(address),
            prefix_len: None,
            source: "ping".to_string(),
        });
        facts::record(db, device.device_id, &fact, now)
            .await
            .expect("ip fact");
    }
    device.device_id
}
