use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "netatlas.toml";
pub const ENV_PREFIX: &str = "NETATLAS_";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path and name of the SQLite database.
    pub database: String,
    /// One of error, warn, info, debug, trace.
    pub log_level: String,
    /// Optional file to mirror log output to.
    pub log_file: Option<String>,
    pub discovery: DiscoveryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: "netatlas.db".to_string(),
            log_level: "info".to_string(),
            log_file: None,
            discovery: DiscoveryConfig::default(),
        }
    }
}

// Values set on the command line; `None` leaves the lower layers alone.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    // Defaults, then toml file, then NETATLAS_* environment, then flags.
    pub fn load(path: &str, overrides: &Overrides) -> anyhow::Result<Config> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
            .extract()?;
        config
            .discovery
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid discovery configuration: {}", e))?;
        Ok(config)
    }

    pub fn database_url(&self) -> String {
        if self.database.contains("://") || self.database.starts_with("sqlite:") {
            self.database.clone()
        } else {
            format!("sqlite://{}?mode=rwc", self.database)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub poll_interval_secs: u64,
    pub max_runtime_secs: u64,
    pub max_targets: usize,
    pub default_scope: Option<String>,

    pub arp_enabled: bool,
    pub arp_table_path: String,
    pub oui_lookup: bool,

    pub ping_enabled: bool,
    pub ping_workers: usize,
    pub ping_timeout_ms: u64,

    pub name_resolution_enabled: bool,
    pub name_workers: usize,
    pub name_timeout_ms: u64,

    pub snmp_enabled: bool,
    pub enrich_workers: usize,
    pub enrich_max_targets: usize,
    pub snmp_community: String,
    pub snmp_version: String,
    pub snmp_timeout_ms: u64,
    pub snmp_retries: u32,
    pub snmp_port: u16,
    pub snmp_walk_interfaces: bool,

    pub port_scan_enabled: bool,
    pub port_scan_workers: usize,
    pub port_scan_max_targets: usize,
    pub port_scan_timeout_ms: u64,
    pub port_scan_ports: Vec<u16>,
    pub port_scan_allowlist: Vec<String>,

    pub lldp_enabled: bool,
    pub cdp_enabled: bool,
    pub topology_allowlist: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            poll_interval_secs: 5,
            max_runtime_secs: 600,
            max_targets: 1024,
            default_scope: None,
            arp_enabled: true,
            arp_table_path: "/proc/net/arp".to_string(),
            oui_lookup: true,
            ping_enabled: true,
            ping_workers: 64,
            ping_timeout_ms: 1000,
            name_resolution_enabled: true,
            name_workers: 16,
            name_timeout_ms: 2000,
            snmp_enabled: true,
            enrich_workers: 16,
            enrich_max_targets: 256,
            snmp_community: "public".to_string(),
            snmp_version: "2c".to_string(),
            snmp_timeout_ms: 1000,
            snmp_retries: 1,
            snmp_port: 161,
            snmp_walk_interfaces: true,
            port_scan_enabled: false,
            port_scan_workers: 32,
            port_scan_max_targets: 128,
            port_scan_timeout_ms: 500,
            port_scan_ports: vec![22, 23, 53, 80, 161, 443, 445, 3389, 8080],
            port_scan_allowlist: Vec::new(),
            lldp_enabled: false,
            cdp_enabled: false,
            topology_allowlist: Vec::new(),
        }
    }
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("poll_interval_secs", self.poll_interval_secs as usize),
            ("max_runtime_secs", self.max_runtime_secs as usize),
            ("max_targets", self.max_targets),
            ("ping_workers", self.ping_workers),
            ("ping_timeout_ms", self.ping_timeout_ms as usize),
            ("name_workers", self.name_workers),
            ("name_timeout_ms", self.name_timeout_ms as usize),
            ("enrich_workers", self.enrich_workers),
            ("snmp_timeout_ms", self.snmp_timeout_ms as usize),
            ("port_scan_workers", self.port_scan_workers),
            ("port_scan_timeout_ms", self.port_scan_timeout_ms as usize),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(format!("{} must be greater than zero", name));
            }
        }
        if !matches!(self.snmp_version.as_str(), "1" | "2c") {
            return Err(format!(
                "snmp_version must be \"1\" or \"2c\", got {:?}",
                self.snmp_version
            ));
        }
        for entry in self
            .port_scan_allowlist
            .iter()
            .chain(self.topology_allowlist.iter())
        {
            if entry.parse::<IpNetwork>().is_err() {
                return Err(format!("allow-list entry {:?} is not a CIDR", entry));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_runtime(&self) -> Duration {
        Duration::from_secs(self.max_runtime_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn name_timeout(&self) -> Duration {
        Duration::from_millis(self.name_timeout_ms)
    }

    pub fn port_scan_timeout(&self) -> Duration {
        Duration::from_millis(self.port_scan_timeout_ms)
    }

    pub fn snmp_settings(&self) -> SnmpSettings {
        SnmpSettings {
            community: self.snmp_community.clone(),
            version: self.snmp_version.clone(),
            timeout: Duration::from_millis(self.snmp_timeout_ms),
            retries: self.snmp_retries,
            port: self.snmp_port,
            walk_interfaces: self.snmp_walk_interfaces,
        }
    }

    pub fn port_scan_networks(&self) -> Vec<IpNetwork> {
        parse_allowlist(&self.port_scan_allowlist)
    }

    pub fn topology_networks(&self) -> Vec<IpNetwork> {
        parse_allowlist(&self.topology_allowlist)
    }
}

// Connection parameters handed to every SNMP probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnmpSettings {
    pub community: String,
    pub version: String,
    pub timeout: Duration,
    pub retries: u32,
    pub port: u16,
    pub walk_interfaces: bool,
}

fn parse_allowlist(entries: &[String]) -> Vec<IpNetwork> {
    entries
        .iter()
        .filter_map(|entry| entry.parse::<IpNetwork>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DiscoveryConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let config = DiscoveryConfig {
            ping_workers: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate().unwrap_err(),
            "ping_workers must be greater than zero"
        );
    }

    #[test]
    fn bad_allowlist_rejected() {
        let config = DiscoveryConfig {
            port_scan_allowlist: vec!["10.0.0.0/8".to_string(), "lan".to_string()],
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("\"lan\""));
    }

    #[test]
    fn unknown_snmp_version_rejected() {
        let config = DiscoveryConfig {
            snmp_version: "3".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn database_url_from_path() {
        let config = Config::default();
        assert_eq!(config.database_url(), "sqlite://netatlas.db?mode=rwc");

        let config = Config {
            database: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        assert_eq!(config.database_url(), "sqlite::memory:");
    }

    #[test]
    fn environment_overrides_nested_discovery_keys() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "netatlas.toml",
                r#"
                database = "from-file.db"
                [discovery]
                ping_workers = 8
                "#,
            )?;
            jail.set_env("NETATLAS_DISCOVERY__PING_WORKERS", "12");
            jail.set_env("NETATLAS_DISCOVERY__PORT_SCAN_ENABLED", "true");

            let config = Config::load("netatlas.toml", &Overrides::default())
                .map_err(|e| e.to_string())?;
            assert_eq!(config.database, "from-file.db");
            assert_eq!(config.discovery.ping_workers, 12);
            assert!(config.discovery.port_scan_enabled);

            let overrides = Overrides {
                database: Some("flag.db".to_string()),
                log_level: None,
            };
            let config =
                Config::load("netatlas.toml", &overrides).map_err(|e| e.to_string())?;
            assert_eq!(config.database, "flag.db");
            assert_eq!(config.log_level, "info");
            Ok(())
        });
    }
}
