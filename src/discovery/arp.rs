// Local ARP/neighbor table and MAC helpers.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::OnceLock;

use log::{debug, warn};
use mac_oui::Oui;
use regex::Regex;

fn mac_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9a-f]{2}:){5}[0-9a-f]{2}$").expect("static MAC pattern is valid")
    })
}

/// Lowercase, colon separated form; `None` for malformed or all-zero addresses.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let mac = raw.trim().to_lowercase().replace('-', ":");
    if !mac_pattern().is_match(&mac) || mac == "00:00:00:00:00:00" {
        return None;
    }
    Some(mac)
}

pub fn mac_from_bytes(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 6 {
        return None;
    }
    let raw = bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":");
    normalize_mac(&raw)
}

/// Parse the Linux `/proc/net/arp` format into address → MAC.
///
/// Incomplete entries (flags 0x0) and malformed lines are skipped.
pub fn parse_arp_table(contents: &str) -> HashMap<IpAddr, String> {
    let mut table = HashMap::new();
    for line in contents.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        if fields[2] == "0x0" {
            continue;
        }
        let address = match fields[0].parse::<IpAddr>() {
            Ok(address) => address,
            Err(_) => {
                debug!("skipping arp line with bad address: {}", line);
                continue;
            }
        };
        if let Some(mac) = normalize_mac(fields[3]) {
            table.insert(address, mac);
        }
    }
    table
}

pub async fn read_arp_table(path: &str) -> std::io::Result<HashMap<IpAddr, String>> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(parse_arp_table(&contents))
}

// Map MAC to vendor through the bundled OUI database.
pub struct VendorLookup {
    oui: Option<Oui>,
}

impl VendorLookup {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return VendorLookup { oui: None };
        }
        match Oui::default() {
            Ok(oui) => VendorLookup { oui: Some(oui) },
            Err(e) => {
                warn!("OUI database unavailable, vendor lookup disabled: {}", e);
                VendorLookup { oui: None }
            }
        }
    }

    pub fn disabled() -> Self {
        VendorLookup { oui: None }
    }

    pub fn lookup(&self, mac: &str) -> Option<String> {
        let oui = self.oui.as_ref()?;
        match oui.lookup_by_mac(mac) {
            Ok(Some(record)) => Some(record.company_name.to_string()),
            Ok(None) => None,
            Err(e) => {
                debug!("OUI lookup error for {}: {}", mac, e);
                None
            }
        }
    }
}
