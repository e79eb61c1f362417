//! Discovery orchestrator.
//!
//! A background loop claims the oldest queued run, drives it through the
//! phase pipeline under a wall-clock budget, and finalizes it. Network work
//! fans out through [`pool::run_bounded`]; every result is written to the
//! store from this task, one fact at a time.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn, Level};
use sea_orm::{DatabaseConnection, DbErr};
use tokio::time::Instant;

use netatlas_entity::discovery_run::{self, RunStatus};

use crate::config::DiscoveryConfig;
use crate::db::{self, devices, facts, runs};
use crate::metrics::RunMetrics;

pub mod arp;
pub mod plan;
pub mod pool;
pub mod probe;
pub mod snmp;
pub mod targets;

use arp::VendorLookup;
use facts::{Fact, IpFact, LinkFact, MacFact, ServiceFact};
use plan::{Phase, PhasePlan, Preset, RunStats};
use pool::run_bounded;
use probe::{NeighborProtocol, PingOutcome, Probes};
use targets::{enumerate, Scope};

const BUDGET_EXCEEDED: &str = "runtime budget exceeded";

#[derive(Debug, thiserror::Error)]
enum RunFailure {
    #[error("store unavailable: {0}")]
    Store(#[from] DbErr),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Clone, Debug)]
struct LiveHost {
    address: IpAddr,
    device_id: i32,
}

pub struct Orchestrator {
    db: DatabaseConnection,
    config: DiscoveryConfig,
    probes: Arc<dyn Probes>,
    vendors: Arc<VendorLookup>,
    metrics: Arc<RunMetrics>,
}

impl Orchestrator {
    pub fn new(
        db: DatabaseConnection,
        config: DiscoveryConfig,
        probes: Arc<dyn Probes>,
        metrics: Arc<RunMetrics>,
    ) -> Self {
        let vendors = Arc::new(VendorLookup::new(config.oui_lookup));
        Orchestrator {
            db,
            config,
            probes,
            vendors,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<RunMetrics> {
        &self.metrics
    }

    // Poll forever; store errors are logged and retried on the next tick.
    pub async fn run_forever(&self) {
        info!(
            "discovery orchestrator polling every {}s",
            self.config.poll_interval_secs
        );
        loop {
            if let Err(e) = self.poll_once().await {
                error!("discovery poll failed: {}", e);
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Recover stale runs, then claim and execute at most one queued run.
    pub async fn poll_once(&self) -> Result<Option<discovery_run::Model>, DbErr> {
        for run_id in runs::recover_stale(&self.db, self.config.max_runtime(), Utc::now()).await? {
            warn!("run {} was abandoned and has been marked failed", run_id);
        }
        match runs::claim_next(&self.db, Utc::now()).await? {
            Some(run) => self.execute(run).await.map(Some),
            None => Ok(None),
        }
    }

    /// Execute a claimed run and finalize it; returns the terminal row.
    pub async fn execute(&self, run: discovery_run::Model) -> Result<discovery_run::Model, DbErr> {
        let started = std::time::Instant::now();
        let run_id = run.run_id;
        let mut stats = RunStats::default();

        let (status, last_error) = match self.pipeline(&run, &mut stats).await {
            Ok(()) => {
                let message = format!(
                    "run succeeded: {} live, {} devices created, {} change events{}",
                    stats.live,
                    stats.devices_created,
                    stats.change_events,
                    if stats.budget_exceeded {
                        " (runtime budget exceeded, partial results)"
                    } else {
                        ""
                    }
                );
                // Store-level failures here still leave the run to be finalized below.
                let _ = self.log(run_id, Level::Info, &message).await;
                (RunStatus::Succeeded, None)
            }
            Err(e) => {
                let message = e.to_string();
                let _ = self
                    .log(run_id, Level::Error, &format!("run failed: {}", message))
                    .await;
                (RunStatus::Failed, Some(message))
            }
        };

        runs::finalize(
            &self.db,
            run_id,
            status,
            stats.to_json(),
            last_error,
            Utc::now(),
        )
        .await?;
        self.metrics.record(status, started.elapsed());
        info!(
            "run {} {} in {:?}; totals {:?}",
            run_id,
            status.as_str(),
            started.elapsed(),
            self.metrics.snapshot()
        );

        runs::get(&self.db, run_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("discovery run {}", run_id)))
    }

    async fn pipeline(
        &self,
        run: &discovery_run::Model,
        stats: &mut RunStats,
    ) -> Result<(), RunFailure> {
        let run_id = run.run_id;
        let deadline = Instant::now() + self.config.max_runtime();
        let preset = Preset::parse(Some(&run.preset))
            .map_err(|e| RunFailure::Invalid(e.to_string()))?;
        let plan = preset.plan(&self.config);
        let scope =
            Scope::parse(&run.scope).map_err(|e| RunFailure::Invalid(e.to_string()))?;
        self.log(
            run_id,
            Level::Info,
            &format!("discovery of {} started (preset {})", scope, preset.as_str()),
        )
        .await?;

        // Target enumeration.
        let targets = enumerate(&scope, self.config.max_targets);
        stats.targets_total = u64::try_from(targets.total).unwrap_or(u64::MAX);
        stats.targets_enumerated = targets.addresses.len();
        stats.targets_truncated = targets.truncated;
        if targets.truncated {
            self.log(
                run_id,
                Level::Warn,
                &format!(
                    "scope {} holds {} addresses; scanning the lowest {}",
                    scope,
                    targets.total,
                    targets.addresses.len()
                ),
            )
            .await?;
        } else {
            self.log(
                run_id,
                Level::Info,
                &format!("enumerated {} targets", targets.addresses.len()),
            )
            .await?;
        }
        stats.phases_completed.push(Phase::Targets);

        let arp_table = self.arp_phase(run_id, plan, &targets.addresses, stats).await?;

        if Instant::now() >= deadline {
            self.skip_remaining(run_id, &[Phase::Ping, Phase::Names, Phase::Snmp, Phase::PortScan, Phase::Topology], stats)
                .await?;
            return Ok(());
        }
        let hosts = self
            .liveness_phase(run_id, plan, &targets.addresses, &arp_table, deadline, stats)
            .await?;

        let remaining = [Phase::Names, Phase::Snmp, Phase::PortScan, Phase::Topology];
        for (i, phase) in remaining.iter().enumerate() {
            if stats.budget_exceeded || Instant::now() >= deadline {
                self.skip_remaining(run_id, &remaining[i..], stats).await?;
                break;
            }
            match phase {
                Phase::Names => self.names_phase(run_id, plan, &hosts, deadline, stats).await?,
                Phase::Snmp => self.snmp_phase(run_id, plan, &hosts, deadline, stats).await?,
                Phase::PortScan => {
                    self.port_scan_phase(run_id, plan, &hosts, deadline, stats)
                        .await?
                }
                Phase::Topology => {
                    self.topology_phase(run_id, plan, &hosts, deadline, stats)
                        .await?
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn skip_remaining(
        &self,
        run_id: i32,
        phases: &[Phase],
        stats: &mut RunStats,
    ) -> Result<(), RunFailure> {
        stats.budget_exceeded = true;
        for phase in phases {
            stats.skip(*phase, BUDGET_EXCEEDED);
        }
        let names: Vec<&str> = phases.iter().map(Phase::as_str).collect();
        self.log(
            run_id,
            Level::Warn,
            &format!("{}; skipped {}", BUDGET_EXCEEDED, names.join(", ")),
        )
        .await
    }

    async fn arp_phase(
        &self,
        run_id: i32,
        plan: PhasePlan,
        targets: &[IpAddr],
        stats: &mut RunStats,
    ) -> Result<HashMap<IpAddr, String>, RunFailure> {
        if !plan.arp {
            stats.skip(Phase::Arp, "disabled");
            return Ok(HashMap::new());
        }
        let wanted: HashSet<&IpAddr> = targets.iter().collect();
        let table = match self.probes.arp_table().await {
            Ok(table) => table,
            Err(e) => {
                stats.probe_errors += 1;
                self.log(run_id, Level::Warn, &format!("ARP table unavailable: {}", e))
                    .await?;
                HashMap::new()
            }
        };
        stats.arp_entries = table.len();
        let matched: HashMap<IpAddr, String> = table
            .into_iter()
            .filter(|(address, _)| wanted.contains(address))
            .collect();
        stats.arp_matched = matched.len();
        self.log(
            run_id,
            Level::Info,
            &format!(
                "ARP: {} neighbor entries, {} within targets",
                stats.arp_entries, stats.arp_matched
            ),
        )
        .await?;
        stats.phases_completed.push(Phase::Arp);
        Ok(matched)
    }

    async fn liveness_phase(
        &self,
        run_id: i32,
        plan: PhasePlan,
        targets: &[IpAddr],
        arp_table: &HashMap<IpAddr, String>,
        deadline: Instant,
        stats: &mut RunStats,
    ) -> Result<Vec<LiveHost>, RunFailure> {
        let arp_visible: Vec<IpAddr> = targets
            .iter()
            .filter(|address| arp_table.contains_key(address))
            .copied()
            .collect();

        let mut expired = false;
        let (live, source) = if plan.ping {
            let probes = self.probes.clone();
            let timeout = self.config.ping_timeout();
            let output = run_bounded(
                targets.to_vec(),
                self.config.ping_workers,
                deadline,
                move |address| {
                    let probes = probes.clone();
                    async move { probes.ping(address, timeout).await }
                },
            )
            .await;
            expired = output.expired;
            stats.probe_errors += output.failed;

            let unavailable = !output.results.is_empty()
                && output
                    .results
                    .iter()
                    .all(|(_, outcome)| *outcome == PingOutcome::Unavailable);
            if unavailable {
                stats.ping_fallback = true;
                self.log(
                    run_id,
                    Level::Warn,
                    "ICMP unavailable; using ARP visibility for liveness",
                )
                .await?;
                (arp_visible, "arp")
            } else {
                let alive = output
                    .results
                    .into_iter()
                    .filter(|(_, outcome)| *outcome == PingOutcome::Alive)
                    .map(|(address, _)| address)
                    .collect();
                (alive, "ping")
            }
        } else {
            stats.skip(Phase::Ping, "disabled; ARP visibility used for liveness");
            (arp_visible, "arp")
        };
        stats.live = live.len();
        self.log(
            run_id,
            Level::Info,
            &format!("liveness: {} of {} targets responded", live.len(), targets.len()),
        )
        .await?;

        let mut hosts = Vec::with_capacity(live.len());
        for address in live {
            let mac = arp_table.get(&address).cloned();
            if let Some(host) = self.observe_host(run_id, address, mac, source, stats).await? {
                hosts.push(host);
            }
        }
        if plan.ping {
            stats.finish(Phase::Ping, expired);
        }
        Ok(hosts)
    }

    // Identity resolution plus the address facts every live host carries.
    async fn observe_host(
        &self,
        run_id: i32,
        address: IpAddr,
        mac: Option<String>,
        source: &str,
        stats: &mut RunStats,
    ) -> Result<Option<LiveHost>, RunFailure> {
        let now = Utc::now();
        let resolved =
            devices::resolve_or_create(&self.db, &address.to_string(), mac.as_deref(), now).await;
        let (device, created) = match self
            .absorb(run_id, stats, resolved, &format!("resolving {}", address))
            .await?
        {
            Some(resolved) => resolved,
            None => return Ok(None),
        };
        if created {
            stats.devices_created += 1;
        }
        let seen = devices::mark_seen(&self.db, device.device_id, now).await;
        self.absorb(run_id, stats, seen, &format!("marking {} seen", address))
            .await?;

        let ip = Fact::Ip(IpFact {
            address,
            prefix_len: None,
            source: source.to_string(),
        });
        self.write_fact(run_id, device.device_id, ip, stats).await?;
        if let Some(mac) = mac {
            let vendor = self.vendors.lookup(&mac);
            let fact = Fact::Mac(MacFact {
                address: mac,
                vendor,
            });
            self.write_fact(run_id, device.device_id, fact, stats).await?;
        }
        Ok(Some(LiveHost {
            address,
            device_id: device.device_id,
        }))
    }

    async fn names_phase(
        &self,
        run_id: i32,
        plan: PhasePlan,
        hosts: &[LiveHost],
        deadline: Instant,
        stats: &mut RunStats,
    ) -> Result<(), RunFailure> {
        if !plan.names {
            stats.skip(Phase::Names, "disabled");
            return Ok(());
        }
        let probes = self.probes.clone();
        let timeout = self.config.name_timeout();
        let output = run_bounded(
            hosts.to_vec(),
            self.config.name_workers,
            deadline,
            move |host: LiveHost| {
                let probes = probes.clone();
                async move { probes.resolve_name(host.address, timeout).await }
            },
        )
        .await;
        let expired = output.expired;

        for (host, name) in output.results {
            if let Some(name) = name {
                stats.names_resolved += 1;
                self.name_candidate(run_id, &host, &name, "dns", stats).await?;
            }
        }
        self.log(
            run_id,
            Level::Info,
            &format!("names: {} of {} hosts resolved", stats.names_resolved, hosts.len()),
        )
        .await?;
        stats.finish(Phase::Names, expired);
        Ok(())
    }

    async fn snmp_phase(
        &self,
        run_id: i32,
        plan: PhasePlan,
        hosts: &[LiveHost],
        deadline: Instant,
        stats: &mut RunStats,
    ) -> Result<(), RunFailure> {
        if !plan.snmp {
            stats.skip(Phase::Snmp, "disabled");
            return Ok(());
        }
        let eligible: Vec<LiveHost> = hosts
            .iter()
            .take(self.config.enrich_max_targets)
            .cloned()
            .collect();
        if hosts.len() > eligible.len() {
            self.log(
                run_id,
                Level::Info,
                &format!(
                    "SNMP limited to the first {} of {} live hosts",
                    eligible.len(),
                    hosts.len()
                ),
            )
            .await?;
        }

        let probes = self.probes.clone();
        let settings = self.config.snmp_settings();
        let output = run_bounded(
            eligible,
            self.config.enrich_workers,
            deadline,
            move |host: LiveHost| {
                let probes = probes.clone();
                let settings = settings.clone();
                async move { probes.snmp_poll(host.address, &settings).await }
            },
        )
        .await;
        let expired = output.expired;

        for (host, result) in output.results {
            match result {
                Ok(report) => {
                    stats.enriched += 1;
                    let sys_name = report.system.sys_name.clone();
                    self.write_fact(run_id, host.device_id, Fact::Snmp(report.system), stats)
                        .await?;
                    for iface in report.interfaces {
                        stats.interfaces += 1;
                        self.write_fact(run_id, host.device_id, Fact::Interface(iface), stats)
                            .await?;
                    }
                    if let Some(name) = sys_name {
                        self.name_candidate(run_id, &host, &name, "snmp", stats).await?;
                    }
                }
                Err(e) => {
                    stats.snmp_errors += 1;
                    let failure = facts::record_snmp_failure(
                        &self.db,
                        host.device_id,
                        &host.address.to_string(),
                        &e.to_string(),
                        Utc::now(),
                    )
                    .await;
                    self.absorb(
                        run_id,
                        stats,
                        failure,
                        &format!("recording SNMP failure for {}", host.address),
                    )
                    .await?;
                }
            }
        }
        self.log(
            run_id,
            Level::Info,
            &format!(
                "SNMP: {} enriched, {} without a response",
                stats.enriched, stats.snmp_errors
            ),
        )
        .await?;
        stats.finish(Phase::Snmp, expired);
        Ok(())
    }

    async fn port_scan_phase(
        &self,
        run_id: i32,
        plan: PhasePlan,
        hosts: &[LiveHost],
        deadline: Instant,
        stats: &mut RunStats,
    ) -> Result<(), RunFailure> {
        if !plan.port_scan {
            stats.skip(Phase::PortScan, "disabled");
            return Ok(());
        }
        let allowlist = self.config.port_scan_networks();
        if allowlist.is_empty() {
            stats.skip(Phase::PortScan, "no allow-list configured");
            self.log(run_id, Level::Warn, "port scan skipped: no allow-list configured")
                .await?;
            return Ok(());
        }
        let allowed: Vec<LiveHost> = hosts
            .iter()
            .filter(|host| allowlist.iter().any(|net| net.contains(host.address)))
            .cloned()
            .collect();
        if allowed.len() < hosts.len() {
            self.log(
                run_id,
                Level::Info,
                &format!(
                    "port scan refused for {} hosts outside the allow-list",
                    hosts.len() - allowed.len()
                ),
            )
            .await?;
        }
        if allowed.is_empty() {
            stats.skip(Phase::PortScan, "no live hosts inside the allow-list");
            return Ok(());
        }
        let eligible: Vec<LiveHost> = allowed
            .into_iter()
            .take(self.config.port_scan_max_targets)
            .collect();

        let probes = self.probes.clone();
        let ports = self.config.port_scan_ports.clone();
        let timeout = self.config.port_scan_timeout();
        let output = run_bounded(
            eligible,
            self.config.port_scan_workers,
            deadline,
            move |host: LiveHost| {
                let probes = probes.clone();
                let ports = ports.clone();
                async move {
                    let mut open = Vec::new();
                    for port in ports {
                        if probes.tcp_connect(host.address, port, timeout).await {
                            open.push(port);
                        }
                    }
                    open
                }
            },
        )
        .await;
        let expired = output.expired;

        for (host, open) in output.results {
            stats.ports_scanned += 1;
            for port in open {
                stats.services_open += 1;
                let fact = Fact::Service(ServiceFact {
                    protocol: "tcp".to_string(),
                    port,
                    name: well_known_service(port).map(str::to_string),
                    state: "open".to_string(),
                    source: "port_scan".to_string(),
                });
                self.write_fact(run_id, host.device_id, fact, stats).await?;
            }
        }
        self.log(
            run_id,
            Level::Info,
            &format!(
                "port scan: {} hosts scanned, {} open services",
                stats.ports_scanned, stats.services_open
            ),
        )
        .await?;
        stats.finish(Phase::PortScan, expired);
        Ok(())
    }

    async fn topology_phase(
        &self,
        run_id: i32,
        plan: PhasePlan,
        hosts: &[LiveHost],
        deadline: Instant,
        stats: &mut RunStats,
    ) -> Result<(), RunFailure> {
        let mut protocols = Vec::new();
        if plan.lldp {
            protocols.push(NeighborProtocol::Lldp);
        }
        if plan.cdp {
            protocols.push(NeighborProtocol::Cdp);
        }
        if protocols.is_empty() {
            stats.skip(Phase::Topology, "disabled");
            return Ok(());
        }
        let allowlist = self.config.topology_networks();
        if allowlist.is_empty() {
            stats.skip(Phase::Topology, "no allow-list configured");
            self.log(run_id, Level::Warn, "topology discovery skipped: no allow-list configured")
                .await?;
            return Ok(());
        }
        let eligible: Vec<LiveHost> = hosts
            .iter()
            .filter(|host| allowlist.iter().any(|net| net.contains(host.address)))
            .cloned()
            .collect();
        if eligible.is_empty() {
            stats.skip(Phase::Topology, "no live hosts inside the allow-list");
            return Ok(());
        }

        let probes = self.probes.clone();
        let settings = self.config.snmp_settings();
        let output = run_bounded(
            eligible,
            self.config.enrich_workers,
            deadline,
            move |host: LiveHost| {
                let probes = probes.clone();
                let settings = settings.clone();
                let protocols = protocols.clone();
                async move {
                    let mut harvested = Vec::new();
                    for protocol in protocols {
                        harvested.push((
                            protocol,
                            probes.neighbors(host.address, &settings, protocol).await,
                        ));
                    }
                    harvested
                }
            },
        )
        .await;
        let expired = output.expired;

        for (host, harvested) in output.results {
            for (protocol, result) in harvested {
                let neighbors = match result {
                    Ok(neighbors) => neighbors,
                    Err(e) => {
                        stats.probe_errors += 1;
                        self.log(
                            run_id,
                            Level::Warn,
                            &format!("{} harvest from {} failed: {}", protocol.as_str(), host.address, e),
                        )
                        .await?;
                        continue;
                    }
                };
                for neighbor in neighbors {
                    let peer = self.resolve_neighbor(run_id, &neighbor, stats).await?;
                    let peer = match peer {
                        Some(peer) if peer != host.device_id => peer,
                        _ => {
                            stats.neighbors_unresolved += 1;
                            continue;
                        }
                    };
                    stats.links_discovered += 1;
                    let fact = Fact::Link(LinkFact {
                        peer_device_id: peer,
                        local_port: neighbor.local_port.clone(),
                        peer_port: neighbor.remote_port.clone(),
                        source: protocol.as_str().to_string(),
                        link_type: None,
                    });
                    self.write_fact(run_id, host.device_id, fact, stats).await?;
                }
            }
        }
        self.log(
            run_id,
            Level::Info,
            &format!(
                "topology: {} links, {} unresolved neighbors",
                stats.links_discovered, stats.neighbors_unresolved
            ),
        )
        .await?;
        stats.finish(Phase::Topology, expired);
        Ok(())
    }

    // Address first, then chassis MAC, then advertised name.
    async fn resolve_neighbor(
        &self,
        run_id: i32,
        neighbor: &probe::Neighbor,
        stats: &mut RunStats,
    ) -> Result<Option<i32>, RunFailure> {
        if let Some(address) = neighbor.remote_address {
            let found = devices::find_by_ip(&self.db, &address.to_string()).await;
            if let Some(Some(device)) = self.absorb(run_id, stats, found, "neighbor lookup").await? {
                return Ok(Some(device.device_id));
            }
        }
        if let Some(mac) = &neighbor.remote_mac {
            let found = devices::find_by_mac(&self.db, mac).await;
            if let Some(Some(device)) = self.absorb(run_id, stats, found, "neighbor lookup").await? {
                return Ok(Some(device.device_id));
            }
        }
        if let Some(name) = &neighbor.remote_name {
            let found = devices::find_by_name(&self.db, name).await;
            if let Some(Some(device)) = self.absorb(run_id, stats, found, "neighbor lookup").await? {
                return Ok(Some(device.device_id));
            }
        }
        Ok(None)
    }

    async fn name_candidate(
        &self,
        run_id: i32,
        host: &LiveHost,
        name: &str,
        source: &str,
        stats: &mut RunStats,
    ) -> Result<(), RunFailure> {
        let address = host.address.to_string();
        let result = devices::record_name_candidate(
            &self.db,
            host.device_id,
            name,
            source,
            Some(&address),
            Utc::now(),
        )
        .await;
        if let Some(true) = self
            .absorb(run_id, stats, result, &format!("recording name for {}", address))
            .await?
        {
            stats.change_events += 1;
        }
        Ok(())
    }

    async fn write_fact(
        &self,
        run_id: i32,
        device_id: i32,
        fact: Fact,
        stats: &mut RunStats,
    ) -> Result<(), RunFailure> {
        let result = facts::record(&self.db, device_id, &fact, Utc::now()).await;
        let context = format!("writing {} fact for device {}", fact.kind().name(), device_id);
        if let Some(outcome) = self.absorb(run_id, stats, result, &context).await? {
            if outcome.is_change() {
                stats.change_events += 1;
            }
        }
        Ok(())
    }

    // A failed write is counted and logged unless the store itself is gone.
    async fn absorb<T>(
        &self,
        run_id: i32,
        stats: &mut RunStats,
        result: Result<T, DbErr>,
        context: &str,
    ) -> Result<Option<T>, RunFailure> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if db::is_unavailable(&e) => Err(RunFailure::Store(e)),
            Err(e) => {
                stats.fact_errors += 1;
                self.log(run_id, Level::Warn, &format!("{} failed: {}", context, e))
                    .await?;
                Ok(None)
            }
        }
    }

    async fn log(&self, run_id: i32, level: Level, message: &str) -> Result<(), RunFailure> {
        match runs::append_log(&self.db, run_id, level, message, Utc::now()).await {
            Ok(_) => Ok(()),
            Err(e) if db::is_unavailable(&e) => Err(RunFailure::Store(e)),
            Err(e) => {
                warn!("run {}: could not append run log: {}", run_id, e);
                Ok(())
            }
        }
    }
}

fn well_known_service(port: u16) -> Option<&'static str> {
    let name = match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "dns",
        80 => "http",
        110 => "pop3",
        143 => "imap",
        161 => "snmp",
        443 => "https",
        445 => "smb",
        3389 => "rdp",
        8080 => "http-alt",
        8443 => "https-alt",
        _ => return None,
    };
    Some(name)
}
