// SNMP v1/v2c polling: system group, interface tables, LLDP and CDP caches.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use log::debug;
use snmp2::{AsyncSession, Oid, Value};
use tokio::time::timeout;

use super::arp::mac_from_bytes;
use super::probe::{Neighbor, NeighborProtocol, ProbeError, SnmpReport};
use crate::config::SnmpSettings;
use crate::db::facts::{InterfaceFact, SnmpFact};

const SYS_DESCR: &[u64] = &[1, 3, 6, 1, 2, 1, 1, 1, 0];
const SYS_OBJECT_ID: &[u64] = &[1, 3, 6, 1, 2, 1, 1, 2, 0];
const SYS_CONTACT: &[u64] = &[1, 3, 6, 1, 2, 1, 1, 4, 0];
const SYS_NAME: &[u64] = &[1, 3, 6, 1, 2, 1, 1, 5, 0];
const SYS_LOCATION: &[u64] = &[1, 3, 6, 1, 2, 1, 1, 6, 0];

const IF_DESCR: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 2];
const IF_MTU: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 4];
const IF_SPEED: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 5];
const IF_PHYS_ADDRESS: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 6];
const IF_ADMIN_STATUS: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 7];
const IF_OPER_STATUS: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 8];
const IF_HIGH_SPEED: &[u64] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 15];
const IF_ALIAS: &[u64] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 18];

// BRIDGE-MIB base port to ifIndex, Q-BRIDGE-MIB base port to PVID.
const DOT1D_BASE_PORT_IF_INDEX: &[u64] = &[1, 3, 6, 1, 2, 1, 17, 1, 4, 1, 2];
const DOT1Q_PVID: &[u64] = &[1, 3, 6, 1, 2, 1, 17, 7, 1, 4, 5, 1, 1];

const LLDP_LOC_PORT_ID: &[u64] = &[1, 0, 8802, 1, 1, 2, 1, 3, 7, 1, 3];
const LLDP_LOC_PORT_DESC: &[u64] = &[1, 0, 8802, 1, 1, 2, 1, 3, 7, 1, 4];
const LLDP_REM_CHASSIS_ID: &[u64] = &[1, 0, 8802, 1, 1, 2, 1, 4, 1, 1, 5];
const LLDP_REM_PORT_ID: &[u64] = &[1, 0, 8802, 1, 1, 2, 1, 4, 1, 1, 7];
const LLDP_REM_SYS_NAME: &[u64] = &[1, 0, 8802, 1, 1, 2, 1, 4, 1, 1, 9];

const CDP_CACHE_ADDRESS: &[u64] = &[1, 3, 6, 1, 4, 1, 9, 9, 23, 1, 2, 1, 1, 4];
const CDP_CACHE_DEVICE_ID: &[u64] = &[1, 3, 6, 1, 4, 1, 9, 9, 23, 1, 2, 1, 1, 6];
const CDP_CACHE_DEVICE_PORT: &[u64] = &[1, 3, 6, 1, 4, 1, 9, 9, 23, 1, 2, 1, 1, 7];

// Upper bound on rows per walked column.
const MAX_WALK: usize = 4096;

/// Owned copy of a varbind value; snmp2 values borrow the session buffer.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum SnmpValue {
    Bytes(Vec<u8>),
    Int(i64),
    Unsigned(u64),
    Oid(String),
    Ip(IpAddr),
    End,
    Other,
}

impl SnmpValue {
    fn from_value(value: &Value<'_>) -> Self {
        match value {
            Value::OctetString(bytes) => SnmpValue::Bytes(bytes.to_vec()),
            Value::Integer(i) => SnmpValue::Int(*i),
            Value::Counter32(u) | Value::Unsigned32(u) | Value::Timeticks(u) => {
                SnmpValue::Unsigned(u64::from(*u))
            }
            Value::Counter64(u) => SnmpValue::Unsigned(*u),
            Value::ObjectIdentifier(oid) => SnmpValue::Oid(oid.to_string()),
            Value::IpAddress(octets) => SnmpValue::Ip(IpAddr::V4(Ipv4Addr::from(*octets))),
            Value::EndOfMibView | Value::NoSuchObject | Value::NoSuchInstance => SnmpValue::End,
            _ => SnmpValue::Other,
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            SnmpValue::Bytes(bytes) => text(bytes),
            SnmpValue::Oid(oid) => Some(oid.clone()),
            SnmpValue::Int(i) => Some(i.to_string()),
            SnmpValue::Unsigned(u) => Some(u.to_string()),
            SnmpValue::Ip(ip) => Some(ip.to_string()),
            _ => None,
        }
    }

    fn number(&self) -> Option<i64> {
        match self {
            SnmpValue::Int(i) => Some(*i),
            SnmpValue::Unsigned(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }
}

pub(crate) fn text(bytes: &[u8]) -> Option<String> {
    let value = String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn oid_parts(oid: &Oid<'_>) -> Vec<u64> {
    oid.to_string()
        .split('.')
        .filter_map(|part| part.parse::<u64>().ok())
        .collect()
}

fn to_oid(parts: &[u64]) -> Result<Oid<'static>, ProbeError> {
    Oid::from(parts).map_err(|e| ProbeError::Failed(format!("bad OID {:?}: {:?}", parts, e)))
}

async fn open(address: IpAddr, settings: &SnmpSettings) -> Result<AsyncSession, ProbeError> {
    let target = SocketAddr::new(address, settings.port);
    let community = settings.community.as_bytes();
    let session = match settings.version.as_str() {
        "1" => timeout(settings.timeout, AsyncSession::new_v1(target, community, 0)).await,
        _ => timeout(settings.timeout, AsyncSession::new_v2c(target, community, 0)).await,
    };
    match session {
        Ok(Ok(session)) => Ok(session),
        Ok(Err(e)) => Err(ProbeError::Unavailable(e.to_string())),
        Err(_) => Err(ProbeError::Timeout),
    }
}

async fn get(
    session: &mut AsyncSession,
    parts: &[u64],
    settings: &SnmpSettings,
) -> Result<SnmpValue, ProbeError> {
    let oid = to_oid(parts)?;
    for attempt in 0..=settings.retries {
        match timeout(settings.timeout, session.get(&oid)).await {
            Ok(Ok(mut pdu)) => {
                return Ok(pdu
                    .varbinds
                    .next()
                    .map(|(_, value)| SnmpValue::from_value(&value))
                    .unwrap_or(SnmpValue::End));
            }
            Ok(Err(e)) => return Err(ProbeError::Failed(e.to_string())),
            Err(_) => debug!("snmp get {:?} timed out (attempt {})", parts, attempt + 1),
        }
    }
    Err(ProbeError::Timeout)
}

async fn get_next(
    session: &mut AsyncSession,
    parts: &[u64],
    settings: &SnmpSettings,
) -> Result<Option<(Vec<u64>, SnmpValue)>, ProbeError> {
    let oid = to_oid(parts)?;
    for _ in 0..=settings.retries {
        match timeout(settings.timeout, session.getnext(&oid)).await {
            Ok(Ok(mut pdu)) => {
                return Ok(pdu
                    .varbinds
                    .next()
                    .map(|(oid, value)| (oid_parts(&oid), SnmpValue::from_value(&value))));
            }
            Ok(Err(e)) => return Err(ProbeError::Failed(e.to_string())),
            Err(_) => continue,
        }
    }
    Err(ProbeError::Timeout)
}

/// Walk one table column, returning (row index suffix, value) pairs.
async fn walk(
    session: &mut AsyncSession,
    root: &[u64],
    settings: &SnmpSettings,
) -> Result<Vec<(Vec<u64>, SnmpValue)>, ProbeError> {
    let mut rows = Vec::new();
    let mut current = root.to_vec();
    while rows.len() < MAX_WALK {
        let (oid, value) = match get_next(session, &current, settings).await {
            Ok(Some(next)) => next,
            Ok(None) => break,
            // SNMPv1 agents answer noSuchName past the end of the MIB view.
            Err(ProbeError::Failed(e)) => {
                debug!("snmp walk {:?} ended: {}", root, e);
                break;
            }
            Err(e) => return Err(e),
        };
        if value == SnmpValue::End || !oid.starts_with(root) || oid <= current {
            break;
        }
        rows.push((oid[root.len()..].to_vec(), value));
        current = oid;
    }
    Ok(rows)
}

// Optional columns: a failure just yields no rows.
async fn walk_optional(
    session: &mut AsyncSession,
    root: &[u64],
    settings: &SnmpSettings,
) -> Vec<(Vec<u64>, SnmpValue)> {
    match walk(session, root, settings).await {
        Ok(rows) => rows,
        Err(e) => {
            debug!("snmp walk {:?} failed: {}", root, e);
            Vec::new()
        }
    }
}

fn if_status(value: &SnmpValue) -> Option<String> {
    let status = match value.number()? {
        1 => "up",
        2 => "down",
        3 => "testing",
        4 => "unknown",
        5 => "dormant",
        6 => "notPresent",
        7 => "lowerLayerDown",
        _ => return None,
    };
    Some(status.to_string())
}

fn row_index(suffix: &[u64]) -> Option<i32> {
    match suffix {
        [index] => i32::try_from(*index).ok(),
        _ => None,
    }
}

pub async fn poll(address: IpAddr, settings: &SnmpSettings) -> Result<SnmpReport, ProbeError> {
    let mut session = open(address, settings).await?;

    // A silent agent fails here; later scalars are best effort.
    let sys_descr = get(&mut session, SYS_DESCR, settings).await?.text();
    let mut system = SnmpFact {
        address: Some(address.to_string()),
        version: Some(settings.version.clone()),
        sys_descr,
        ..Default::default()
    };
    system.sys_object_id = get(&mut session, SYS_OBJECT_ID, settings)
        .await
        .ok()
        .and_then(|v| v.text());
    system.sys_contact = get(&mut session, SYS_CONTACT, settings)
        .await
        .ok()
        .and_then(|v| v.text());
    system.sys_name = get(&mut session, SYS_NAME, settings)
        .await
        .ok()
        .and_then(|v| v.text());
    system.sys_location = get(&mut session, SYS_LOCATION, settings)
        .await
        .ok()
        .and_then(|v| v.text());

    let interfaces = if settings.walk_interfaces {
        walk_interfaces(&mut session, settings).await
    } else {
        Vec::new()
    };
    Ok(SnmpReport { system, interfaces })
}

async fn walk_interfaces(session: &mut AsyncSession, settings: &SnmpSettings) -> Vec<InterfaceFact> {
    let mut table: BTreeMap<i32, InterfaceFact> = BTreeMap::new();

    for (suffix, value) in walk_optional(session, IF_DESCR, settings).await {
        if let Some(index) = row_index(&suffix) {
            table.insert(
                index,
                InterfaceFact {
                    if_index: index,
                    descr: value.text(),
                    ..Default::default()
                },
            );
        }
    }
    if table.is_empty() {
        return Vec::new();
    }

    let columns: [&[u64]; 7] = [
        IF_MTU,
        IF_SPEED,
        IF_PHYS_ADDRESS,
        IF_ADMIN_STATUS,
        IF_OPER_STATUS,
        IF_ALIAS,
        IF_HIGH_SPEED,
    ];
    for column in columns {
        for (suffix, value) in walk_optional(session, column, settings).await {
            let iface = match row_index(&suffix).and_then(|i| table.get_mut(&i)) {
                Some(iface) => iface,
                None => continue,
            };
            match column {
                c if c == IF_MTU => iface.mtu = value.number().and_then(|n| i32::try_from(n).ok()),
                c if c == IF_SPEED => iface.speed = value.number(),
                c if c == IF_PHYS_ADDRESS => {
                    iface.mac = match &value {
                        SnmpValue::Bytes(bytes) => mac_from_bytes(bytes),
                        _ => None,
                    }
                }
                c if c == IF_ADMIN_STATUS => iface.admin_status = if_status(&value),
                c if c == IF_OPER_STATUS => iface.oper_status = if_status(&value),
                c if c == IF_ALIAS => iface.alias = value.text(),
                c if c == IF_HIGH_SPEED => {
                    // ifSpeed saturates at 2^32-1; ifHighSpeed is in Mbit/s.
                    if let Some(mbps) = value.number().filter(|m| *m > 0) {
                        if iface.speed.map_or(true, |s| s >= u32::MAX as i64) {
                            iface.speed = Some(mbps * 1_000_000);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    let base_ports: BTreeMap<u64, i32> = walk_optional(session, DOT1D_BASE_PORT_IF_INDEX, settings)
        .await
        .into_iter()
        .filter_map(|(suffix, value)| {
            let port = *suffix.first()?;
            let if_index = i32::try_from(value.number()?).ok()?;
            Some((port, if_index))
        })
        .collect();
    for (suffix, value) in walk_optional(session, DOT1Q_PVID, settings).await {
        let if_index = suffix.first().and_then(|port| base_ports.get(port));
        let pvid = value.number().and_then(|n| i32::try_from(n).ok());
        if let (Some(if_index), Some(pvid)) = (if_index, pvid) {
            if let Some(iface) = table.get_mut(if_index) {
                iface.pvid = Some(pvid);
            }
        }
    }

    table.into_values().collect()
}

// Port ids are text on most agents, a MAC on some.
fn port_label(value: &SnmpValue) -> Option<String> {
    match value {
        SnmpValue::Bytes(bytes) if bytes.len() == 6 && !printable(bytes) => mac_from_bytes(bytes),
        other => other.text(),
    }
}

fn printable(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ')
}

pub async fn lldp_neighbors(
    address: IpAddr,
    settings: &SnmpSettings,
) -> Result<Vec<Neighbor>, ProbeError> {
    let mut session = open(address, settings).await?;

    // lldpRemTable rows are indexed by (timeMark, localPortNum, remIndex).
    let mut rows: BTreeMap<Vec<u64>, Neighbor> = BTreeMap::new();
    for (suffix, value) in walk(&mut session, LLDP_REM_SYS_NAME, settings).await? {
        rows.entry(suffix).or_insert_with(|| empty_neighbor(NeighborProtocol::Lldp)).remote_name =
            value.text();
    }
    for (suffix, value) in walk_optional(&mut session, LLDP_REM_CHASSIS_ID, settings).await {
        let neighbor = rows
            .entry(suffix)
            .or_insert_with(|| empty_neighbor(NeighborProtocol::Lldp));
        if let SnmpValue::Bytes(bytes) = &value {
            if printable(bytes) {
                if neighbor.remote_name.is_none() {
                    neighbor.remote_name = text(bytes);
                }
            } else {
                neighbor.remote_mac = mac_from_bytes(bytes);
            }
        }
    }
    for (suffix, value) in walk_optional(&mut session, LLDP_REM_PORT_ID, settings).await {
        rows.entry(suffix)
            .or_insert_with(|| empty_neighbor(NeighborProtocol::Lldp))
            .remote_port = port_label(&value);
    }

    let mut local_ports: BTreeMap<u64, String> = BTreeMap::new();
    for column in [LLDP_LOC_PORT_ID, LLDP_LOC_PORT_DESC] {
        for (suffix, value) in walk_optional(&mut session, column, settings).await {
            if let (Some(port), Some(label)) = (suffix.first(), port_label(&value)) {
                local_ports.insert(*port, label);
            }
        }
    }

    Ok(rows
        .into_iter()
        .map(|(suffix, mut neighbor)| {
            neighbor.local_port = suffix.get(1).and_then(|port| local_ports.get(port).cloned());
            neighbor
        })
        .collect())
}

pub async fn cdp_neighbors(
    address: IpAddr,
    settings: &SnmpSettings,
) -> Result<Vec<Neighbor>, ProbeError> {
    let mut session = open(address, settings).await?;

    // cdpCacheTable rows are indexed by (ifIndex, deviceIndex).
    let mut rows: BTreeMap<Vec<u64>, Neighbor> = BTreeMap::new();
    for (suffix, value) in walk(&mut session, CDP_CACHE_DEVICE_ID, settings).await? {
        rows.entry(suffix)
            .or_insert_with(|| empty_neighbor(NeighborProtocol::Cdp))
            .remote_name = value.text();
    }
    for (suffix, value) in walk_optional(&mut session, CDP_CACHE_DEVICE_PORT, settings).await {
        rows.entry(suffix)
            .or_insert_with(|| empty_neighbor(NeighborProtocol::Cdp))
            .remote_port = value.text();
    }
    for (suffix, value) in walk_optional(&mut session, CDP_CACHE_ADDRESS, settings).await {
        if let SnmpValue::Bytes(bytes) = &value {
            if let Ok(octets) = <[u8; 4]>::try_from(bytes.as_slice()) {
                rows.entry(suffix)
                    .or_insert_with(|| empty_neighbor(NeighborProtocol::Cdp))
                    .remote_address = Some(IpAddr::V4(Ipv4Addr::from(octets)));
            }
        }
    }

    let descrs: BTreeMap<u64, String> = walk_optional(&mut session, IF_DESCR, settings)
        .await
        .into_iter()
        .filter_map(|(suffix, value)| Some((*suffix.first()?, value.text()?)))
        .collect();

    Ok(rows
        .into_iter()
        .map(|(suffix, mut neighbor)| {
            neighbor.local_port = suffix.first().and_then(|index| descrs.get(index).cloned());
            neighbor
        })
        .collect())
}

fn empty_neighbor(protocol: NeighborProtocol) -> Neighbor {
    Neighbor {
        protocol,
        local_port: None,
        remote_name: None,
        remote_port: None,
        remote_mac: None,
        remote_address: None,
    }
}
