mod common;

use chrono::Utc;
use sea_orm::DatabaseConnection;

use netatlas::db::facts::{self, Fact, InterfaceFact, ServiceFact};
use netatlas::devices::{self, Endpoint};
use netatlas::topology::capped::{EDGE_CEILING, NODE_CEILING, REGION_CEILING};
use netatlas::topology::{project, Layer, StoreSource, TopologyQuery};

use common::*;

fn query(layer: &str, focus_type: &str, focus_id: &str, limit: Option<u64>) -> TopologyQuery {
    TopologyQuery::parse(layer, Some(focus_type), Some(focus_id), None, limit).unwrap()
}

async fn access_ports(db: &DatabaseConnection, device_id: i32, pvids: &[i32]) {
    for (n, pvid) in pvids.iter().enumerate() {
        let fact = Fact::Interface(InterfaceFact {
            if_index: n as i32 + 1,
            descr: Some(format!("Gi0/{}", n + 1)),
            pvid: Some(*pvid),
            ..Default::default()
        });
        facts::record(db, device_id, &fact, Utc::now()).await.unwrap();
    }
}

fn endpoint(device_id: i32, port: &str) -> Endpoint {
    Endpoint {
        device_id,
        port: Some(port.to_string()),
    }
}

#[tokio::test]
async fn l3_regions_around_a_multihomed_device() {
    let db = memory_db().await;
    let d = device_with_ips(&db, &["10.0.2.10", "10.0.1.10"]).await;
    let same_first = device_with_ips(&db, &["10.0.1.20"]).await;
    let same_second = device_with_ips(&db, &["10.0.2.30"]).await;
    let elsewhere = device_with_ips(&db, &["10.0.9.9"]).await;

    let projection = project(
        &StoreSource::new(&db),
        &query("l3", "device", &d.to_string(), None),
    )
    .await
    .unwrap();

    let regions: Vec<&str> = projection.regions.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(regions, vec!["10.0.1.0/24", "10.0.2.0/24"]);

    let focus = projection.nodes.iter().find(|n| n.is_focus).unwrap();
    assert_eq!(focus.device_id, Some(d));
    assert_eq!(focus.primary_region_id.as_deref(), Some("10.0.1.0/24"));

    let mut targets: Vec<i32> = projection
        .edges
        .iter()
        .map(|e| e.target.parse().unwrap())
        .collect();
    targets.sort();
    assert_eq!(targets, vec![same_first, same_second]);
    assert!(projection.edges.iter().all(|e| e.source == d.to_string()));
    assert!(!projection
        .nodes
        .iter()
        .any(|n| n.device_id == Some(elsewhere)));
    assert!(!projection.truncation.nodes.truncated);
}

#[tokio::test]
async fn empty_subnet_focus_is_not_an_error() {
    let db = memory_db().await;
    device_with_ips(&db, &["10.0.1.10"]).await;

    let projection = project(
        &StoreSource::new(&db),
        &query("l3", "subnet", "10.99.0.0/16", None),
    )
    .await
    .unwrap();
    assert_eq!(projection.regions.len(), 1);
    assert_eq!(projection.regions[0].id, "10.99.0.0/16");
    assert!(projection.nodes.is_empty());
    assert!(projection.edges.is_empty());
    assert!(!projection.guidance.is_empty());
}

#[tokio::test]
async fn unknown_focus_device_is_not_found() {
    let db = memory_db().await;
    let err = project(&StoreSource::new(&db), &query("physical", "device", "77", None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn truncation_never_exceeds_the_effective_limit() {
    let db = memory_db().await;
    let focus = device_with_ips(&db, &["10.0.8.1"]).await;
    for host in 2..=14 {
        device_with_ips(&db, &[&format!("10.0.8.{}", host)]).await;
    }

    for limit in [None, Some(1), Some(5), Some(13), Some(14), Some(500)] {
        for (focus_type, focus_id) in [("device", focus.to_string()), ("subnet", "10.0.8.0/24".to_string())] {
            let projection = project(
                &StoreSource::new(&db),
                &query("l3", focus_type, &focus_id, limit),
            )
            .await
            .unwrap();
            let t = &projection.truncation;
            let cap = |ceiling: usize| limit.map_or(ceiling, |l| (l as usize).min(ceiling));

            assert!(t.regions.returned <= cap(REGION_CEILING));
            assert!(t.nodes.returned <= cap(NODE_CEILING));
            assert!(t.edges.returned <= cap(EDGE_CEILING));
            assert_eq!(t.nodes.returned, projection.nodes.len());
            assert_eq!(t.edges.returned, projection.edges.len());
            if let Some(total) = t.nodes.total {
                assert_eq!(t.nodes.truncated, total > t.nodes.returned);
            }
            if let Some(total) = t.edges.total {
                assert_eq!(t.edges.truncated, total > t.edges.returned);
            }
        }
    }

    // Fourteen devices share the subnet; a limit of five shows five of them.
    let projection = project(
        &StoreSource::new(&db),
        &query("l3", "subnet", "10.0.8.0/24", Some(5)),
    )
    .await
    .unwrap();
    assert_eq!(projection.nodes.len(), 5);
    assert!(projection.truncation.nodes.truncated);
    assert_eq!(projection.truncation.nodes.total, Some(14));
    assert!(projection.truncation.nodes.warning.is_some());
}

#[tokio::test]
async fn projection_is_deterministic() {
    let db = memory_db().await;
    let focus = device_with_ips(&db, &["10.1.0.1", "10.2.0.1"]).await;
    for address in ["10.2.0.5", "10.1.0.7", "10.1.0.3"] {
        device_with_ips(&db, &[address]).await;
    }
    let q = query("l3", "device", &focus.to_string(), None);
    let first = project(&StoreSource::new(&db), &q).await.unwrap();
    let second = project(&StoreSource::new(&db), &q).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.layer, Layer::L3);
}

#[tokio::test]
async fn l2_vlan_regions_sort_numerically() {
    let db = memory_db().await;
    let switch = device_with_ips(&db, &["10.0.4.1"]).await;
    access_ports(&db, switch, &[100, 3, 20, 20]).await;
    let peer = device_with_ips(&db, &["10.0.4.2"]).await;
    access_ports(&db, peer, &[20]).await;
    let unrelated = device_with_ips(&db, &["10.0.4.3"]).await;
    access_ports(&db, unrelated, &[7]).await;

    let projection = project(
        &StoreSource::new(&db),
        &query("l2", "device", &switch.to_string(), None),
    )
    .await
    .unwrap();

    let regions: Vec<&str> = projection.regions.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(regions, vec!["3", "20", "100"]);
    assert!(projection.regions.iter().all(|r| r.kind == "vlan"));
    assert_eq!(projection.regions[0].label, "VLAN 3");

    let ids: Vec<&str> = projection.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec![switch.to_string(), peer.to_string()]);
    let peer_node = projection.nodes.iter().find(|n| !n.is_focus).unwrap();
    assert_eq!(peer_node.region_ids, vec!["20".to_string()]);

    assert_eq!(projection.edges.len(), 1);
    assert_eq!(projection.edges[0].id, format!("{}->{}", switch, peer));
    assert_eq!(projection.edges[0].kind, "peer");
}

#[tokio::test]
async fn vlan_focus_lists_members_without_edges() {
    let db = memory_db().await;
    let first = device_with_ips(&db, &["10.0.4.1"]).await;
    access_ports(&db, first, &[20, 30]).await;
    let second = device_with_ips(&db, &["10.0.4.2"]).await;
    access_ports(&db, second, &[20]).await;
    let other = device_with_ips(&db, &["10.0.4.3"]).await;
    access_ports(&db, other, &[30]).await;

    let projection = project(&StoreSource::new(&db), &query("l2", "vlan", "20", None))
        .await
        .unwrap();
    assert_eq!(projection.regions.len(), 1);
    assert_eq!(projection.regions[0].id, "20");
    let members: Vec<Option<i32>> = projection.nodes.iter().map(|n| n.device_id).collect();
    assert_eq!(members, vec![Some(first), Some(second)]);
    assert!(projection.nodes.iter().all(|n| !n.is_focus));
    assert!(projection.edges.is_empty());

    let inspector = projection.inspector.unwrap();
    let members = inspector.status.iter().find(|f| f.label == "Members").unwrap();
    assert_eq!(members.value, "2");
}

#[tokio::test]
async fn physical_layer_has_one_node_per_linked_peer() {
    let db = memory_db().await;
    let core = device_with_ips(&db, &["10.0.5.1"]).await;
    let access = device_with_ips(&db, &["10.0.5.2"]).await;
    let server = device_with_ips(&db, &["10.0.5.3"]).await;

    // Two parallel links to the same peer still make one peer node.
    let fiber = || Some("fiber".to_string());
    devices::link_devices(
        &db,
        &endpoint(core, "Gi0/1"),
        &endpoint(access, "Gi0/49"),
        fiber(),
        Utc::now(),
    )
    .await
    .unwrap();
    devices::link_devices(
        &db,
        &endpoint(core, "Gi0/2"),
        &endpoint(access, "Gi0/50"),
        fiber(),
        Utc::now(),
    )
    .await
    .unwrap();
    let uplink = devices::link_devices(
        &db,
        &endpoint(server, "eth0"),
        &endpoint(core, "Gi0/3"),
        None,
        Utc::now(),
    )
    .await
    .unwrap();

    let projection = project(
        &StoreSource::new(&db),
        &query("physical", "device", &core.to_string(), None),
    )
    .await
    .unwrap();

    let ids: Vec<Option<i32>> = projection.nodes.iter().map(|n| n.device_id).collect();
    assert_eq!(ids, vec![Some(core), Some(access), Some(server)]);
    assert_eq!(projection.edges.len(), 3);
    for edge in &projection.edges {
        assert_eq!(edge.kind, "link");
        assert_eq!(edge.source, core.to_string());
        let metadata = edge.metadata.as_ref().unwrap();
        assert_eq!(metadata["link_key"], edge.id.as_str());
        assert_eq!(metadata["source"], "manual");
    }

    // Ports are reported from the focus's side whichever end recorded the link.
    let to_server = projection
        .edges
        .iter()
        .find(|e| e.id == uplink.link_key)
        .unwrap();
    assert_eq!(to_server.target, server.to_string());
    let metadata = to_server.metadata.as_ref().unwrap();
    assert_eq!(metadata["local_port"], "Gi0/3");
    assert_eq!(metadata["peer_port"], "eth0");
    assert!(metadata["link_type"].is_null());
    assert!(projection
        .edges
        .iter()
        .filter(|e| e.target == access.to_string())
        .all(|e| e.metadata.as_ref().unwrap()["link_type"] == "fiber"));
}

#[tokio::test]
async fn services_layer_hangs_services_off_the_device() {
    let db = memory_db().await;
    let host = device_with_ips(&db, &["10.0.6.1"]).await;
    for (port, name) in [(443, "https"), (22, "ssh")] {
        let fact = Fact::Service(ServiceFact {
            protocol: "tcp".to_string(),
            port,
            name: Some(name.to_string()),
            state: "open".to_string(),
            source: "port_scan".to_string(),
        });
        facts::record(&db, host, &fact, Utc::now()).await.unwrap();
    }

    let projection = project(
        &StoreSource::new(&db),
        &query("services", "device", &host.to_string(), None),
    )
    .await
    .unwrap();

    let ids: Vec<&str> = projection.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            host.to_string(),
            format!("svc:{}:tcp/22", host),
            format!("svc:{}:tcp/443", host),
        ]
    );
    let ssh = projection
        .nodes
        .iter()
        .find(|n| n.id == format!("svc:{}:tcp/22", host))
        .unwrap();
    assert_eq!(ssh.kind, "service");
    assert_eq!(ssh.label, "tcp/22 ssh");

    assert_eq!(projection.edges.len(), 2);
    assert!(projection.edges.iter().all(|e| e.kind == "service"));
    assert!(projection.edges.iter().all(|e| e.source == host.to_string()));
    let edge = projection
        .edges
        .iter()
        .find(|e| e.target == ssh.id)
        .unwrap();
    assert_eq!(edge.metadata.as_ref().unwrap()["state"], "open");
}

#[tokio::test]
async fn no_focus_returns_guidance_and_an_empty_graph() {
    let db = memory_db().await;
    device_with_ips(&db, &["10.0.1.10"]).await;

    let query = TopologyQuery::parse("physical", None, None, None, None).unwrap();
    let projection = project(&StoreSource::new(&db), &query).await.unwrap();
    assert!(projection.focus.is_none());
    assert!(projection.regions.is_empty());
    assert!(projection.nodes.is_empty());
    assert!(projection.edges.is_empty());
    assert_eq!(
        projection.guidance,
        vec!["Select a focus (focusType and focusId) to project the Physical layer.".to_string()]
    );
}

#[tokio::test]
async fn inspector_offers_every_other_layer() {
    let db = memory_db().await;
    let d = device_with_ips(&db, &["10.0.1.10"]).await;

    let projection = project(
        &StoreSource::new(&db),
        &query("l3", "device", &d.to_string(), None),
    )
    .await
    .unwrap();
    let inspector = projection.inspector.unwrap();

    let views: Vec<(&str, Layer)> = inspector
        .relationships
        .iter()
        .filter(|r| r.label.starts_with("View in "))
        .map(|r| (r.label.as_str(), r.layer))
        .collect();
    assert_eq!(
        views,
        vec![
            ("View in Physical", Layer::Physical),
            ("View in L2", Layer::L2),
            ("View in Services", Layer::Services),
            ("View in Security", Layer::Security),
        ]
    );
    assert!(inspector
        .relationships
        .iter()
        .filter(|r| r.label.starts_with("View in "))
        .all(|r| r.focus_type == "device" && r.focus_id == d.to_string()));

    // The focus's subnet is offered as a drill-in on the same layer.
    assert!(inspector.relationships.iter().any(|r| r.layer == Layer::L3
        && r.focus_type == "subnet"
        && r.focus_id == "10.0.1.0/24"));
}

#[tokio::test]
async fn out_of_range_device_ids_are_not_found() {
    let db = memory_db().await;
    device_with_ips(&db, &["10.0.1.10"]).await;
    for id in ["0", "-4"] {
        let err = project(&StoreSource::new(&db), &query("l3", "device", id, None))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}
