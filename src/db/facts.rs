//! Compare-and-upsert for the six observed fact kinds.
//!
//! Every fact write goes through [`record`]: the fact is upserted by its
//! natural key, and exactly one change event is appended when a persisted
//! field was created or changed. Observation timestamps (`updated_at`,
//! `observed_at`, `last_observed_at`, `last_success_at`) are bookkeeping and
//! never produce events on their own.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use sea_orm::*;
use serde::Serialize;
use serde_json::{Map, Value};

use netatlas_entity::{
    device_change_event, device_interface, device_ip, device_link, device_mac, device_service,
    device_snmp,
};

use super::devices;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FactKind {
    Ip,
    Mac,
    Interface,
    Service,
    Snmp,
    Link,
}

impl FactKind {
    pub fn event_kind(&self) -> &'static str {
        match self {
            FactKind::Ip => "ip_observation",
            FactKind::Mac => "mac_observation",
            FactKind::Interface => "interface_observation",
            FactKind::Service => "service_observation",
            FactKind::Snmp => "snmp_observation",
            FactKind::Link => "link_observation",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FactKind::Ip => "ip",
            FactKind::Mac => "mac",
            FactKind::Interface => "interface",
            FactKind::Service => "service",
            FactKind::Snmp => "snmp",
            FactKind::Link => "link",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IpFact {
    pub address: IpAddr,
    pub prefix_len: Option<u8>,
    pub source: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MacFact {
    pub address: String,
    pub vendor: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InterfaceFact {
    pub if_index: i32,
    pub descr: Option<String>,
    pub alias: Option<String>,
    pub mac: Option<String>,
    pub admin_status: Option<String>,
    pub oper_status: Option<String>,
    pub mtu: Option<i32>,
    pub speed: Option<i64>,
    pub pvid: Option<i32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServiceFact {
    pub protocol: String,
    pub port: u16,
    pub name: Option<String>,
    pub state: String,
    pub source: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnmpFact {
    pub address: Option<String>,
    pub version: Option<String>,
    pub sys_name: Option<String>,
    pub sys_descr: Option<String>,
    pub sys_object_id: Option<String>,
    pub sys_contact: Option<String>,
    pub sys_location: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkFact {
    pub peer_device_id: i32,
    pub local_port: Option<String>,
    pub peer_port: Option<String>,
    /// One of `manual`, `lldp`, `cdp`.
    pub source: String,
    pub link_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Fact {
    Ip(IpFact),
    Mac(MacFact),
    Interface(InterfaceFact),
    Service(ServiceFact),
    Snmp(SnmpFact),
    Link(LinkFact),
}

// Field level diff carried in the change event details.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Changes {
    current: Map<String, Value>,
    previous: Map<String, Value>,
}

impl Changes {
    fn track<T: Serialize + PartialEq>(&mut self, field: &str, old: &T, new: &T) -> bool {
        if old == new {
            return false;
        }
        self.previous.insert(field.to_string(), to_json(old));
        self.current.insert(field.to_string(), to_json(new));
        true
    }

    fn created(fields: Vec<(&str, Value)>) -> Self {
        let mut changes = Changes::default();
        for (field, value) in fields {
            changes.current.insert(field.to_string(), value);
        }
        changes
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.current.keys().map(String::as_str).collect()
    }

    pub fn current(&self) -> &Map<String, Value> {
        &self.current
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Unchanged,
    Created(Changes),
    Updated(Changes),
}

impl Outcome {
    fn from_changes(changes: Changes) -> Self {
        if changes.is_empty() {
            Outcome::Unchanged
        } else {
            Outcome::Updated(changes)
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, Outcome::Unchanged)
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl Fact {
    pub fn kind(&self) -> FactKind {
        match self {
            Fact::Ip(_) => FactKind::Ip,
            Fact::Mac(_) => FactKind::Mac,
            Fact::Interface(_) => FactKind::Interface,
            Fact::Service(_) => FactKind::Service,
            Fact::Snmp(_) => FactKind::Snmp,
            Fact::Link(_) => FactKind::Link,
        }
    }

    fn describe(&self) -> String {
        match self {
            Fact::Ip(ip) => format!("IP address {}", ip.address),
            Fact::Mac(mac) => format!("MAC address {}", mac.address),
            Fact::Interface(iface) => match &iface.descr {
                Some(descr) => format!("Interface {} ({})", iface.if_index, descr),
                None => format!("Interface {}", iface.if_index),
            },
            Fact::Service(svc) => match &svc.name {
                Some(name) => format!("Service {}/{} ({})", svc.protocol, svc.port, name),
                None => format!("Service {}/{}", svc.protocol, svc.port),
            },
            Fact::Snmp(snmp) => match &snmp.sys_name {
                Some(name) => format!("SNMP identity {}", name),
                None => "SNMP identity".to_string(),
            },
            Fact::Link(link) => format!(
                "Link to device {} ({})",
                link.peer_device_id, link.source
            ),
        }
    }

    // Natural key of the fact, repeated in every event so the feed can be replayed.
    fn key(&self, device_id: i32) -> Value {
        match self {
            Fact::Ip(ip) => serde_json::json!({ "address": ip.address.to_string() }),
            Fact::Mac(mac) => serde_json::json!({ "address": mac.address }),
            Fact::Interface(iface) => serde_json::json!({ "if_index": iface.if_index }),
            Fact::Service(svc) => {
                serde_json::json!({ "protocol": svc.protocol, "port": svc.port })
            }
            Fact::Snmp(_) => serde_json::json!({ "device_id": device_id }),
            Fact::Link(link) => serde_json::json!({
                "link_key": link_key(
                    device_id,
                    link.local_port.as_deref(),
                    link.peer_device_id,
                    link.peer_port.as_deref(),
                )
            }),
        }
    }

    async fn upsert<C: ConnectionTrait>(
        &self,
        db: &C,
        device_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Outcome, DbErr> {
        match self {
            Fact::Ip(fact) => upsert_ip(db, device_id, fact, now).await,
            Fact::Mac(fact) => upsert_mac(db, device_id, fact, now).await,
            Fact::Interface(fact) => upsert_interface(db, device_id, fact, now).await,
            Fact::Service(fact) => upsert_service(db, device_id, fact, now).await,
            Fact::Snmp(fact) => upsert_snmp(db, device_id, fact, now).await,
            Fact::Link(fact) => upsert_link(db, device_id, fact, now).await,
        }
    }
}

/// Upsert one fact and emit a change event if anything persisted changed.
pub async fn record(
    db: &DatabaseConnection,
    device_id: i32,
    fact: &Fact,
    now: DateTime<Utc>,
) -> Result<Outcome, DbErr> {
    let txn = db.begin().await?;
    let outcome = fact.upsert(&txn, device_id, now).await?;

    let (action, changes) = match &outcome {
        Outcome::Unchanged => {
            txn.commit().await?;
            return Ok(outcome);
        }
        Outcome::Created(changes) => ("created", changes),
        Outcome::Updated(changes) => ("updated", changes),
    };

    let summary = match action {
        "created" => format!("{} observed", fact.describe()),
        _ => format!("{} changed: {}", fact.describe(), changes.fields().join(", ")),
    };
    let mut details = serde_json::json!({
        "fact": fact.kind().name(),
        "action": action,
        "key": fact.key(device_id),
        "changes": Value::Object(changes.current.clone()),
    });
    if !changes.previous.is_empty() {
        details["previous"] = Value::Object(changes.previous.clone());
    }

    append_event(&txn, device_id, fact.kind().event_kind(), &summary, details, now).await?;
    devices::mark_changed(&txn, device_id, now).await?;
    txn.commit().await?;
    Ok(outcome)
}

pub async fn append_event<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
    kind: &str,
    summary: &str,
    details: Value,
    now: DateTime<Utc>,
) -> Result<device_change_event::Model, DbErr> {
    device_change_event::ActiveModel {
        device_id: Set(device_id),
        occurred_at: Set(now),
        kind: Set(kind.to_string()),
        summary: Set(summary.to_string()),
        details: Set(details),
        ..Default::default()
    }
    .insert(db)
    .await
}

// Only the error bookkeeping moves; a prior identity snapshot is kept intact.
pub async fn record_snmp_failure(
    db: &DatabaseConnection,
    device_id: i32,
    address: &str,
    error: &str,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    match device_snmp::Entity::find_by_id(device_id).one(db).await? {
        Some(row) => {
            let mut active: device_snmp::ActiveModel = row.into();
            active.last_error = Set(Some(error.to_string()));
            active.updated_at = Set(now);
            active.update(db).await?;
        }
        None => {
            device_snmp::ActiveModel {
                device_id: Set(device_id),
                address: Set(Some(address.to_string())),
                last_error: Set(Some(error.to_string())),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }
    Ok(())
}

/// Undirected key: both `device/port` endpoints, sorted.
pub fn link_key(a: i32, port_a: Option<&str>, b: i32, port_b: Option<&str>) -> String {
    let left = format!("{}/{}", a, port_a.unwrap_or("-"));
    let right = format!("{}/{}", b, port_b.unwrap_or("-"));
    if (a, &left) <= (b, &right) {
        format!("{}--{}", left, right)
    } else {
        format!("{}--{}", right, left)
    }
}

async fn upsert_ip<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
    fact: &IpFact,
    now: DateTime<Utc>,
) -> Result<Outcome, DbErr> {
    let address = fact.address.to_string();
    let prefix_len = fact.prefix_len.map(i32::from);
    let existing = device_ip::Entity::find()
        .filter(device_ip::Column::DeviceId.eq(device_id))
        .filter(device_ip::Column::Address.eq(address.as_str()))
        .one(db)
        .await?;

    match existing {
        None => {
            device_ip::ActiveModel {
                device_id: Set(device_id),
                interface_id: Set(None),
                address: Set(address.clone()),
                prefix_len: Set(prefix_len),
                source: Set(fact.source.clone()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            Ok(Outcome::Created(Changes::created(vec![
                ("address", to_json(&address)),
                ("prefix_len", to_json(&prefix_len)),
            ])))
        }
        Some(row) => {
            let mut changes = Changes::default();
            // An observation without a prefix never erases a known one.
            let prefix_len = prefix_len.or(row.prefix_len);
            changes.track("prefix_len", &row.prefix_len, &prefix_len);
            let mut active: device_ip::ActiveModel = row.into();
            active.prefix_len = Set(prefix_len);
            active.updated_at = Set(now);
            active.update(db).await?;
            Ok(Outcome::from_changes(changes))
        }
    }
}

async fn upsert_mac<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
    fact: &MacFact,
    now: DateTime<Utc>,
) -> Result<Outcome, DbErr> {
    let existing = device_mac::Entity::find()
        .filter(device_mac::Column::DeviceId.eq(device_id))
        .filter(device_mac::Column::Address.eq(fact.address.as_str()))
        .one(db)
        .await?;

    match existing {
        None => {
            device_mac::ActiveModel {
                device_id: Set(device_id),
                interface_id: Set(None),
                address: Set(fact.address.clone()),
                vendor: Set(fact.vendor.clone()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            Ok(Outcome::Created(Changes::created(vec![
                ("address", to_json(&fact.address)),
                ("vendor", to_json(&fact.vendor)),
            ])))
        }
        Some(row) => {
            let mut changes = Changes::default();
            let vendor = fact.vendor.clone().or_else(|| row.vendor.clone());
            changes.track("vendor", &row.vendor, &vendor);
            let mut active: device_mac::ActiveModel = row.into();
            active.vendor = Set(vendor);
            active.updated_at = Set(now);
            active.update(db).await?;
            Ok(Outcome::from_changes(changes))
        }
    }
}

async fn upsert_interface<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
    fact: &InterfaceFact,
    now: DateTime<Utc>,
) -> Result<Outcome, DbErr> {
    let existing = device_interface::Entity::find()
        .filter(device_interface::Column::DeviceId.eq(device_id))
        .filter(device_interface::Column::IfIndex.eq(fact.if_index))
        .one(db)
        .await?;
    let pvid_observed_at = fact.pvid.map(|_| now);

    match existing {
        None => {
            device_interface::ActiveModel {
                device_id: Set(device_id),
                if_index: Set(fact.if_index),
                descr: Set(fact.descr.clone()),
                alias: Set(fact.alias.clone()),
                mac: Set(fact.mac.clone()),
                admin_status: Set(fact.admin_status.clone()),
                oper_status: Set(fact.oper_status.clone()),
                mtu: Set(fact.mtu),
                speed: Set(fact.speed),
                pvid: Set(fact.pvid),
                pvid_observed_at: Set(pvid_observed_at),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            Ok(Outcome::Created(Changes::created(vec![
                ("if_index", to_json(&fact.if_index)),
                ("descr", to_json(&fact.descr)),
                ("alias", to_json(&fact.alias)),
                ("mac", to_json(&fact.mac)),
                ("admin_status", to_json(&fact.admin_status)),
                ("oper_status", to_json(&fact.oper_status)),
                ("mtu", to_json(&fact.mtu)),
                ("speed", to_json(&fact.speed)),
                ("pvid", to_json(&fact.pvid)),
            ])))
        }
        Some(row) => {
            let mut changes = Changes::default();
            changes.track("descr", &row.descr, &fact.descr);
            changes.track("alias", &row.alias, &fact.alias);
            changes.track("mac", &row.mac, &fact.mac);
            changes.track("admin_status", &row.admin_status, &fact.admin_status);
            changes.track("oper_status", &row.oper_status, &fact.oper_status);
            changes.track("mtu", &row.mtu, &fact.mtu);
            changes.track("speed", &row.speed, &fact.speed);
            changes.track("pvid", &row.pvid, &fact.pvid);
            let mut active: device_interface::ActiveModel = row.into();
            active.descr = Set(fact.descr.clone());
            active.alias = Set(fact.alias.clone());
            active.mac = Set(fact.mac.clone());
            active.admin_status = Set(fact.admin_status.clone());
            active.oper_status = Set(fact.oper_status.clone());
            active.mtu = Set(fact.mtu);
            active.speed = Set(fact.speed);
            active.pvid = Set(fact.pvid);
            if pvid_observed_at.is_some() {
                active.pvid_observed_at = Set(pvid_observed_at);
            }
            active.updated_at = Set(now);
            active.update(db).await?;
            Ok(Outcome::from_changes(changes))
        }
    }
}

async fn upsert_service<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
    fact: &ServiceFact,
    now: DateTime<Utc>,
) -> Result<Outcome, DbErr> {
    let existing = device_service::Entity::find()
        .filter(device_service::Column::DeviceId.eq(device_id))
        .filter(device_service::Column::Protocol.eq(fact.protocol.as_str()))
        .filter(device_service::Column::Port.eq(i32::from(fact.port)))
        .one(db)
        .await?;

    match existing {
        None => {
            device_service::ActiveModel {
                device_id: Set(device_id),
                protocol: Set(fact.protocol.clone()),
                port: Set(i32::from(fact.port)),
                name: Set(fact.name.clone()),
                state: Set(fact.state.clone()),
                source: Set(fact.source.clone()),
                observed_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            Ok(Outcome::Created(Changes::created(vec![
                ("protocol", to_json(&fact.protocol)),
                ("port", to_json(&fact.port)),
                ("name", to_json(&fact.name)),
                ("state", to_json(&fact.state)),
                ("source", to_json(&fact.source)),
            ])))
        }
        Some(row) => {
            let mut changes = Changes::default();
            changes.track("name", &row.name, &fact.name);
            changes.track("state", &row.state, &fact.state);
            changes.track("source", &row.source, &fact.source);
            let mut active: device_service::ActiveModel = row.into();
            active.name = Set(fact.name.clone());
            active.state = Set(fact.state.clone());
            active.source = Set(fact.source.clone());
            active.observed_at = Set(now);
            active.update(db).await?;
            Ok(Outcome::from_changes(changes))
        }
    }
}

fn snmp_snapshot(fact: &SnmpFact) -> Changes {
    Changes::created(vec![
        ("address", to_json(&fact.address)),
        ("version", to_json(&fact.version)),
        ("sys_name", to_json(&fact.sys_name)),
        ("sys_descr", to_json(&fact.sys_descr)),
        ("sys_object_id", to_json(&fact.sys_object_id)),
        ("sys_contact", to_json(&fact.sys_contact)),
        ("sys_location", to_json(&fact.sys_location)),
    ])
}

async fn upsert_snmp<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
    fact: &SnmpFact,
    now: DateTime<Utc>,
) -> Result<Outcome, DbErr> {
    let existing = device_snmp::Entity::find_by_id(device_id).one(db).await?;

    match existing {
        None => {
            device_snmp::ActiveModel {
                device_id: Set(device_id),
                address: Set(fact.address.clone()),
                version: Set(fact.version.clone()),
                sys_name: Set(fact.sys_name.clone()),
                sys_descr: Set(fact.sys_descr.clone()),
                sys_object_id: Set(fact.sys_object_id.clone()),
                sys_contact: Set(fact.sys_contact.clone()),
                sys_location: Set(fact.sys_location.clone()),
                last_error: Set(None),
                last_success_at: Set(Some(now)),
                updated_at: Set(now),
            }
            .insert(db)
            .await?;
            Ok(Outcome::Created(snmp_snapshot(fact)))
        }
        Some(row) => {
            let mut changes = Changes::default();
            changes.track("address", &row.address, &fact.address);
            changes.track("version", &row.version, &fact.version);
            changes.track("sys_name", &row.sys_name, &fact.sys_name);
            changes.track("sys_descr", &row.sys_descr, &fact.sys_descr);
            changes.track("sys_object_id", &row.sys_object_id, &fact.sys_object_id);
            changes.track("sys_contact", &row.sys_contact, &fact.sys_contact);
            changes.track("sys_location", &row.sys_location, &fact.sys_location);
            // A row created by a failed poll has no snapshot yet.
            let outcome = if row.last_success_at.is_none() {
                Outcome::Created(snmp_snapshot(fact))
            } else {
                Outcome::from_changes(changes)
            };
            let mut active: device_snmp::ActiveModel = row.into();
            active.address = Set(fact.address.clone());
            active.version = Set(fact.version.clone());
            active.sys_name = Set(fact.sys_name.clone());
            active.sys_descr = Set(fact.sys_descr.clone());
            active.sys_object_id = Set(fact.sys_object_id.clone());
            active.sys_contact = Set(fact.sys_contact.clone());
            active.sys_location = Set(fact.sys_location.clone());
            active.last_error = Set(None);
            active.last_success_at = Set(Some(now));
            active.updated_at = Set(now);
            active.update(db).await?;
            Ok(outcome)
        }
    }
}

async fn upsert_link<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
    fact: &LinkFact,
    now: DateTime<Utc>,
) -> Result<Outcome, DbErr> {
    let key = link_key(
        device_id,
        fact.local_port.as_deref(),
        fact.peer_device_id,
        fact.peer_port.as_deref(),
    );
    // Endpoints are stored in key order so either side observing yields the same row.
    let local = format!("{}/{}", device_id, fact.local_port.as_deref().unwrap_or("-"));
    let (a_id, port_a, b_id, port_b) = if key.starts_with(&format!("{}--", local)) {
        (device_id, fact.local_port.clone(), fact.peer_device_id, fact.peer_port.clone())
    } else {
        (fact.peer_device_id, fact.peer_port.clone(), device_id, fact.local_port.clone())
    };

    let existing = device_link::Entity::find()
        .filter(device_link::Column::LinkKey.eq(key.as_str()))
        .one(db)
        .await?;

    match existing {
        None => {
            device_link::ActiveModel {
                link_key: Set(key.clone()),
                device_a_id: Set(a_id),
                port_a: Set(port_a.clone()),
                device_b_id: Set(b_id),
                port_b: Set(port_b.clone()),
                source: Set(fact.source.clone()),
                link_type: Set(fact.link_type.clone()),
                created_at: Set(now),
                last_observed_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            Ok(Outcome::Created(Changes::created(vec![
                ("link_key", to_json(&key)),
                ("device_a_id", to_json(&a_id)),
                ("port_a", to_json(&port_a)),
                ("device_b_id", to_json(&b_id)),
                ("port_b", to_json(&port_b)),
                ("source", to_json(&fact.source)),
                ("link_type", to_json(&fact.link_type)),
            ])))
        }
        Some(row) => {
            let mut changes = Changes::default();
            let link_type = fact.link_type.clone().or_else(|| row.link_type.clone());
            changes.track("source", &row.source, &fact.source);
            changes.track("link_type", &row.link_type, &link_type);
            let mut active: device_link::ActiveModel = row.into();
            active.source = Set(fact.source.clone());
            active.link_type = Set(link_type);
            active.last_observed_at = Set(now);
            active.update(db).await?;
            Ok(Outcome::from_changes(changes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{devices, test_connection};
    use netatlas_entity::prelude::*;

    fn ip_fact(address: &str, prefix_len: Option<u8>) -> Fact {
        Fact::Ip(IpFact {
            address: address.parse().unwrap(),
            prefix_len,
            source: "ping".to_string(),
        })
    }

    async fn event_count(db: &DatabaseConnection) -> u64 {
        DeviceChangeEvent::find().count(db).await.unwrap()
    }

    #[tokio::test]
    async fn unchanged_fact_emits_no_event() {
        let db = test_connection().await;
        let now = Utc::now();
        let device = devices::insert_device(&db, None, now).await.unwrap();

        let first = record(&db, device.device_id, &ip_fact("10.0.1.10", None), now)
            .await
            .unwrap();
        assert!(matches!(first, Outcome::Created(_)));
        assert_eq!(event_count(&db).await, 1);

        let later = now + chrono::Duration::seconds(30);
        let second = record(&db, device.device_id, &ip_fact("10.0.1.10", None), later)
            .await
            .unwrap();
        assert_eq!(second, Outcome::Unchanged);
        assert_eq!(event_count(&db).await, 1);

        // The observation still refreshes the bookkeeping timestamp.
        let row = DeviceIp::find().one(&db).await.unwrap().unwrap();
        assert_eq!(row.updated_at, later);
    }

    #[tokio::test]
    async fn changed_field_emits_one_event_with_previous_value() {
        let db = test_connection().await;
        let now = Utc::now();
        let device = devices::insert_device(&db, None, now).await.unwrap();

        record(&db, device.device_id, &ip_fact("10.0.1.10", None), now)
            .await
            .unwrap();
        let outcome = record(&db, device.device_id, &ip_fact("10.0.1.10", Some(16)), now)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Updated(_)));

        let events = DeviceChangeEvent::find()
            .order_by_asc(device_change_event::Column::EventId)
            .all(&db)
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, "ip_observation");
        assert_eq!(events[1].details["changes"]["prefix_len"], 16);
        assert_eq!(events[1].details["previous"]["prefix_len"], Value::Null);
        assert_eq!(events[1].details["key"]["address"], "10.0.1.10");
    }

    #[tokio::test]
    async fn snmp_failure_keeps_prior_snapshot() {
        let db = test_connection().await;
        let now = Utc::now();
        let device = devices::insert_device(&db, None, now).await.unwrap();
        let snapshot = Fact::Snmp(SnmpFact {
            sys_name: Some("sw1".to_string()),
            sys_descr: Some("switch".to_string()),
            ..Default::default()
        });
        record(&db, device.device_id, &snapshot, now).await.unwrap();

        let later = now + chrono::Duration::minutes(5);
        record_snmp_failure(&db, device.device_id, "10.0.1.2", "timeout", later)
            .await
            .unwrap();

        let row = DeviceSnmp::find_by_id(device.device_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.sys_name.as_deref(), Some("sw1"));
        assert_eq!(row.last_error.as_deref(), Some("timeout"));
        assert_eq!(row.last_success_at, Some(now));
        assert_eq!(event_count(&db).await, 1);
    }

    #[tokio::test]
    async fn snapshot_after_failed_first_poll_counts_as_created() {
        let db = test_connection().await;
        let now = Utc::now();
        let device = devices::insert_device(&db, None, now).await.unwrap();
        record_snmp_failure(&db, device.device_id, "10.0.1.2", "timeout", now)
            .await
            .unwrap();
        let snapshot = Fact::Snmp(SnmpFact {
            sys_name: Some("sw1".to_string()),
            ..Default::default()
        });
        let outcome = record(&db, device.device_id, &snapshot, now).await.unwrap();
        assert!(matches!(outcome, Outcome::Created(_)));
    }

    #[tokio::test]
    async fn snmp_endpoint_change_emits_event() {
        let db = test_connection().await;
        let now = Utc::now();
        let device = devices::insert_device(&db, None, now).await.unwrap();
        let mut snapshot = SnmpFact {
            address: Some("10.0.1.2".to_string()),
            version: Some("2c".to_string()),
            sys_name: Some("sw1".to_string()),
            ..Default::default()
        };
        record(&db, device.device_id, &Fact::Snmp(snapshot.clone()), now)
            .await
            .unwrap();
        let created = DeviceChangeEvent::find().one(&db).await.unwrap().unwrap();
        assert_eq!(created.details["changes"]["address"], "10.0.1.2");
        assert_eq!(created.details["changes"]["version"], "2c");

        snapshot.address = Some("10.0.9.9".to_string());
        snapshot.version = Some("1".to_string());
        let outcome = record(&db, device.device_id, &Fact::Snmp(snapshot), now)
            .await
            .unwrap();
        match outcome {
            Outcome::Updated(changes) => assert_eq!(changes.fields(), vec!["address", "version"]),
            other => panic!("expected update, got {:?}", other),
        }

        let events = DeviceChangeEvent::find()
            .order_by_asc(device_change_event::Column::EventId)
            .all(&db)
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].details["changes"]["address"], "10.0.9.9");
        assert_eq!(events[1].details["changes"]["version"], "1");
        assert_eq!(events[1].details["previous"]["address"], "10.0.1.2");
        assert_eq!(events[1].details["previous"]["version"], "2c");
    }

    #[tokio::test]
    async fn service_source_change_emits_event() {
        let db = test_connection().await;
        let now = Utc::now();
        let device = devices::insert_device(&db, None, now).await.unwrap();
        let mut service = ServiceFact {
            protocol: "tcp".to_string(),
            port: 22,
            name: Some("ssh".to_string()),
            state: "open".to_string(),
            source: "port_scan".to_string(),
        };
        record(&db, device.device_id, &Fact::Service(service.clone()), now)
            .await
            .unwrap();

        service.source = "import".to_string();
        let outcome = record(&db, device.device_id, &Fact::Service(service), now)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Updated(_)));

        let events = DeviceChangeEvent::find()
            .order_by_asc(device_change_event::Column::EventId)
            .all(&db)
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].details["changes"]["source"], "port_scan");
        assert_eq!(events[1].details["changes"]["source"], "import");
        assert_eq!(events[1].details["previous"]["source"], "port_scan");
        assert_eq!(events[1].details["key"]["port"], 22);
    }

    #[tokio::test]
    async fn link_is_deduplicated_from_either_side() {
        let db = test_connection().await;
        let now = Utc::now();
        let a = devices::insert_device(&db, None, now).await.unwrap();
        let b = devices::insert_device(&db, None, now).await.unwrap();

        let from_a = Fact::Link(LinkFact {
            peer_device_id: b.device_id,
            local_port: Some("Gi0/1".to_string()),
            peer_port: Some("eth0".to_string()),
            source: "lldp".to_string(),
            link_type: None,
        });
        let from_b = Fact::Link(LinkFact {
            peer_device_id: a.device_id,
            local_port: Some("eth0".to_string()),
            peer_port: Some("Gi0/1".to_string()),
            source: "lldp".to_string(),
            link_type: None,
        });
        record(&db, a.device_id, &from_a, now).await.unwrap();
        let outcome = record(&db, b.device_id, &from_b, now).await.unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(DeviceLink::find().count(&db).await.unwrap(), 1);
    }

    #[test]
    fn link_key_is_order_independent() {
        assert_eq!(
            link_key(3, Some("Gi0/1"), 12, None),
            link_key(12, None, 3, Some("Gi0/1"))
        );
        assert_eq!(link_key(3, Some("Gi0/1"), 12, None), "3/Gi0/1--12/-");
    }

    #[tokio::test]
    async fn interface_pvid_change_is_tracked() {
        let db = test_connection().await;
        let now = Utc::now();
        let device = devices::insert_device(&db, None, now).await.unwrap();
        let mut iface = InterfaceFact {
            if_index: 3,
            descr: Some("Gi0/3".to_string()),
            pvid: Some(10),
            ..Default::default()
        };
        record(&db, device.device_id, &Fact::Interface(iface.clone()), now)
            .await
            .unwrap();
        iface.pvid = Some(20);
        let outcome = record(&db, device.device_id, &Fact::Interface(iface), now)
            .await
            .unwrap();
        match outcome {
            Outcome::Updated(changes) => assert_eq!(changes.fields(), vec!["pvid"]),
            other => panic!("expected update, got {:?}", other),
        }
    }
}
