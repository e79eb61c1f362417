mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use serde_json::{Map, Value};

use netatlas::config::DiscoveryConfig;
use netatlas::db::facts::{self, Fact, InterfaceFact, ServiceFact, SnmpFact};
use netatlas::devices;
use netatlas::discovery::probe::SnmpReport;
use netatlas::runs::{self, StartRun};
use netatlas_entity::device_change_event;
use netatlas_entity::prelude::*;

use common::*;

const HOST: &str = "10.0.7.1";

fn scan_config() -> DiscoveryConfig {
    DiscoveryConfig {
        port_scan_allowlist: vec!["10.0.7.0/30".to_string()],
        port_scan_ports: vec![22, 80],
        ..test_config()
    }
}

fn interface(if_index: i32, oper_status: &str, pvid: i32) -> InterfaceFact {
    InterfaceFact {
        if_index,
        descr: Some(format!("Gi0/{}", if_index)),
        admin_status: Some("up".to_string()),
        oper_status: Some(oper_status.to_string()),
        mtu: Some(1500),
        speed: Some(1_000_000_000),
        pvid: Some(pvid),
        ..Default::default()
    }
}

fn probes(system: SnmpFact, interfaces: Vec<InterfaceFact>, open: Vec<u16>) -> ScriptedProbes {
    let mut probes = ScriptedProbes::default().alive(&[HOST]);
    probes
        .snmp
        .insert(ip(HOST), SnmpReport { system, interfaces });
    probes.open_ports.insert(ip(HOST), open);
    probes
}

async fn discover(db: &DatabaseConnection, probes: ScriptedProbes) {
    let config = scan_config();
    let request = StartRun {
        scope: Some("10.0.7.0/30".to_string()),
        preset: Some("deep".to_string()),
        tags: Vec::new(),
    };
    runs::start_run(db, &config, &request, Utc::now())
        .await
        .unwrap();
    orchestrator(db, config, Arc::new(probes))
        .poll_once()
        .await
        .unwrap()
        .unwrap();
}

type Replayed = BTreeMap<(String, String), Map<String, Value>>;

/// Fold every event's changes, oldest first, into per fact state keyed by (fact, key).
async fn replay(db: &DatabaseConnection, device_id: i32) -> Replayed {
    let events = DeviceChangeEvent::find()
        .filter(device_change_event::Column::DeviceId.eq(device_id))
        .order_by_asc(device_change_event::Column::OccurredAt)
        .order_by_asc(device_change_event::Column::EventId)
        .all(db)
        .await
        .unwrap();
    let mut state = Replayed::new();
    for event in events {
        // Metadata events describe the device row itself.
        let fact = event.details["fact"].as_str().unwrap_or("device").to_string();
        let key = match event.details.get("key") {
            Some(key) => key.to_string(),
            None => serde_json::json!({ "device_id": device_id }).to_string(),
        };
        let changes = event.details["changes"].as_object().unwrap();
        let entry = state.entry((fact, key)).or_default();
        for (field, value) in changes {
            entry.insert(field.clone(), value.clone());
        }
    }
    state
}

/// Every replayed field of `fact` must match the stored row with the same key.
fn assert_matches_store<T: Serialize>(replayed: &Replayed, fact: &str, rows: &[T]) {
    let rows: Vec<Value> = rows
        .iter()
        .map(|row| serde_json::to_value(row).unwrap())
        .collect();
    let entries: Vec<_> = replayed.iter().filter(|((f, _), _)| f == fact).collect();
    assert_eq!(entries.len(), rows.len(), "{} rows vs replayed facts", fact);

    for ((_, key), fields) in entries {
        let key: Map<String, Value> = serde_json::from_str(key).unwrap();
        let row = rows
            .iter()
            .find(|row| key.iter().all(|(k, v)| &row[k] == v))
            .unwrap_or_else(|| panic!("no stored {} for key {:?}", fact, key));
        for (field, value) in fields {
            assert_eq!(&row[field], value, "{} {:?} field {}", fact, key, field);
        }
    }
}

#[tokio::test]
async fn replaying_events_reproduces_current_facts() {
    let db = memory_db().await;

    let first_system = SnmpFact {
        address: Some(HOST.to_string()),
        version: Some("2c".to_string()),
        sys_name: Some("edge-1".to_string()),
        sys_descr: Some("IOS 15.2".to_string()),
        ..Default::default()
    };
    discover(
        &db,
        probes(first_system, vec![interface(1, "up", 10)], vec![22]),
    )
    .await;

    let device = netatlas::db::devices::find_by_ip(&db, HOST)
        .await
        .unwrap()
        .unwrap();

    // An import claims the service; the next scan takes it back.
    let imported = Fact::Service(ServiceFact {
        protocol: "tcp".to_string(),
        port: 22,
        name: Some("ssh".to_string()),
        state: "open".to_string(),
        source: "import".to_string(),
    });
    assert!(facts::record(&db, device.device_id, &imported, Utc::now())
        .await
        .unwrap()
        .is_change());

    let second_system = SnmpFact {
        address: Some(format!("{}:1161", HOST)),
        version: Some("1".to_string()),
        sys_name: Some("edge-1".to_string()),
        sys_descr: Some("IOS 15.9".to_string()),
        sys_location: Some("rack 4".to_string()),
        ..Default::default()
    };
    discover(
        &db,
        probes(
            second_system,
            vec![interface(1, "down", 20), interface(2, "up", 10)],
            vec![22, 80],
        ),
    )
    .await;

    let current = devices::get_device(&db, device.device_id).await.unwrap();
    let snmp = current.snmp.clone().unwrap();
    assert_eq!(snmp.address.as_deref(), Some("10.0.7.1:1161"));
    assert_eq!(snmp.version.as_deref(), Some("1"));
    assert_eq!(current.interfaces.len(), 2);
    assert_eq!(current.services.len(), 2);

    let replayed = replay(&db, device.device_id).await;
    assert_matches_store(&replayed, "snmp", &[snmp]);
    assert_matches_store(&replayed, "interface", &current.interfaces);
    assert_matches_store(&replayed, "service", &current.services);
    assert_matches_store(&replayed, "ip", &current.ips);
    assert_matches_store(&replayed, "device", &[current.device.clone()]);
    assert_eq!(current.device.display_name.as_deref(), Some("edge-1"));
}
