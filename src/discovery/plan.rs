// Run presets, the phase plan they produce, and per-run statistics.

use serde::Serialize;

use crate::config::DiscoveryConfig;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Preset {
    /// Enumeration, ARP and ping only.
    Quick,
    /// Whatever the configuration enables.
    #[default]
    Standard,
    /// Standard plus port scan and LLDP/CDP; allow-lists still apply.
    Deep,
}

impl Preset {
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim) {
            None | Some("") | Some("standard") => Ok(Preset::Standard),
            Some("quick") => Ok(Preset::Quick),
            Some("deep") => Ok(Preset::Deep),
            Some(other) => Err(Error::validation(
                "invalid_preset",
                format!("unknown preset {:?}, expected quick, standard or deep", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Quick => "quick",
            Preset::Standard => "standard",
            Preset::Deep => "deep",
        }
    }

    pub fn plan(&self, config: &DiscoveryConfig) -> PhasePlan {
        let standard = PhasePlan {
            arp: config.arp_enabled,
            ping: config.ping_enabled,
            names: config.name_resolution_enabled,
            snmp: config.snmp_enabled,
            port_scan: config.port_scan_enabled,
            lldp: config.lldp_enabled,
            cdp: config.cdp_enabled,
        };
        match self {
            Preset::Quick => PhasePlan {
                names: false,
                snmp: false,
                port_scan: false,
                lldp: false,
                cdp: false,
                ..standard
            },
            Preset::Standard => standard,
            Preset::Deep => PhasePlan {
                port_scan: true,
                lldp: true,
                cdp: true,
                ..standard
            },
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhasePlan {
    pub arp: bool,
    pub ping: bool,
    pub names: bool,
    pub snmp: bool,
    pub port_scan: bool,
    pub lldp: bool,
    pub cdp: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Targets,
    Arp,
    Ping,
    Names,
    Snmp,
    PortScan,
    Topology,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Targets => "targets",
            Phase::Arp => "arp",
            Phase::Ping => "ping",
            Phase::Names => "names",
            Phase::Snmp => "snmp",
            Phase::PortScan => "port_scan",
            Phase::Topology => "topology",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedPhase {
    pub phase: Phase,
    pub reason: String,
}

/// Counters persisted as the run's `stats` document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub targets_total: u64,
    pub targets_enumerated: usize,
    pub targets_truncated: bool,
    pub arp_entries: usize,
    pub arp_matched: usize,
    pub live: usize,
    /// ICMP could not run and ARP visibility stood in for liveness.
    pub ping_fallback: bool,
    pub devices_created: usize,
    pub names_resolved: usize,
    pub enriched: usize,
    pub snmp_errors: usize,
    pub interfaces: usize,
    pub ports_scanned: usize,
    pub services_open: usize,
    pub links_discovered: usize,
    pub neighbors_unresolved: usize,
    pub change_events: usize,
    pub fact_errors: usize,
    pub probe_errors: usize,
    pub phases_completed: Vec<Phase>,
    /// Started but cut off by the runtime budget; results gathered so far were kept.
    pub partial_phases: Vec<Phase>,
    pub skipped_phases: Vec<SkippedPhase>,
    pub budget_exceeded: bool,
}

impl RunStats {
    pub fn skip(&mut self, phase: Phase, reason: impl Into<String>) {
        self.skipped_phases.push(SkippedPhase {
            phase,
            reason: reason.into(),
        });
    }

    /// Close out a phase that ran; one the deadline interrupted counts as partial.
    pub fn finish(&mut self, phase: Phase, expired: bool) {
        if expired {
            self.budget_exceeded = true;
            self.partial_phases.push(phase);
        } else {
            self.phases_completed.push(phase);
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}
