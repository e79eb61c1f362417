// Per-layer graph builders.

use std::collections::{BTreeMap, BTreeSet};

use ipnetwork::IpNetwork;
use sea_orm::DbErr;
use serde_json::json;

use netatlas_entity::device;

use super::capped::cap;
use super::inspector::{count_of, device_label, Inspector};
use super::source::{Members, TopologySource};
use super::{
    id_order, subnet_for, subnet_id, Edge, Focus, Layer, Limits, Node, Projection, Region,
    TopologyQuery,
};
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RegionKey {
    Subnet(IpNetwork),
    Vlan(u16),
}

impl RegionKey {
    fn id(&self) -> String {
        match self {
            RegionKey::Subnet(net) => subnet_id(net),
            RegionKey::Vlan(vlan) => vlan.to_string(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            RegionKey::Subnet(_) => "subnet",
            RegionKey::Vlan(_) => "vlan",
        }
    }

    fn label(&self) -> String {
        match self {
            RegionKey::Subnet(net) => subnet_id(net),
            RegionKey::Vlan(vlan) => format!("VLAN {}", vlan),
        }
    }

    fn region(&self) -> Region {
        Region {
            id: self.id(),
            kind: self.kind(),
            label: self.label(),
        }
    }

    async fn members<S>(
        &self,
        source: &S,
        exclude: Option<i32>,
        limit: usize,
    ) -> std::result::Result<Members, DbErr>
    where
        S: TopologySource + ?Sized,
    {
        match self {
            RegionKey::Subnet(net) => source.subnet_members(*net, exclude, limit).await,
            RegionKey::Vlan(vlan) => source.vlan_members(*vlan, exclude, limit).await,
        }
    }
}

fn device_node(device: &device::Model, region_ids: Vec<String>, is_focus: bool) -> Node {
    Node {
        id: device.device_id.to_string(),
        kind: "device",
        label: device_label(device),
        device_id: Some(device.device_id),
        primary_region_id: region_ids.first().cloned(),
        region_ids,
        is_focus,
    }
}

fn depth_zero(projection: &mut Projection) {
    projection
        .guidance
        .push("Depth 0 shows the focus only; raise depth to include neighbors.".to_string());
}

/// L3 subnets or L2 VLANs around a device, with a star of peers.
pub(super) async fn regions_around<S>(
    source: &S,
    query: &TopologyQuery,
    limits: Limits,
    device: &device::Model,
    projection: &mut Projection,
) -> Result<()>
where
    S: TopologySource + ?Sized,
{
    let focus_id = device.device_id;
    let l3 = query.layer == Layer::L3;
    let (noun, status_label) = if l3 {
        ("subnets", "Subnets")
    } else {
        ("VLANs", "VLANs")
    };

    let mut keys: Vec<RegionKey> = if l3 {
        source
            .device_ips(focus_id)
            .await?
            .iter()
            .filter_map(|ip| subnet_for(&ip.address, ip.prefix_len))
            .map(RegionKey::Subnet)
            .collect()
    } else {
        source
            .device_pvids(focus_id)
            .await?
            .into_iter()
            .filter_map(|pvid| u16::try_from(pvid).ok())
            .filter(|vlan| (1..=4094).contains(vlan))
            .map(RegionKey::Vlan)
            .collect()
    };
    keys.sort_by(|a, b| id_order(&a.id()).cmp(&id_order(&b.id())));
    keys.dedup();
    let total_regions = keys.len();
    let (kept, report) = cap(keys, limits.regions, Some(total_regions), noun);
    projection.truncation.regions = report;
    projection.regions = kept.iter().map(RegionKey::region).collect();
    let region_ids: Vec<String> = kept.iter().map(RegionKey::id).collect();

    let mut inspector = Inspector::for_focus(&Focus::Device(focus_id), query.layer, Some(device));
    inspector.status(status_label, count_of(kept.len(), Some(total_regions)));

    if kept.is_empty() {
        projection.guidance.push(if l3 {
            "No subnet regions derived; run discovery or add IP facts.".to_string()
        } else {
            "No VLAN regions derived; PVIDs are learned from SNMP interface walks.".to_string()
        });
    }

    let mut peers: BTreeMap<i32, (device::Model, Vec<String>)> = BTreeMap::new();
    let mut peers_capped = false;
    if query.depth == 0 {
        depth_zero(projection);
    } else {
        for key in &kept {
            let members = key.members(source, Some(focus_id), limits.nodes).await?;
            peers_capped |= members.total > members.devices.len();
            for peer in members.devices {
                let peer_id = peer.device_id;
                peers
                    .entry(peer_id)
                    .or_insert_with(|| (peer, Vec::new()))
                    .1
                    .push(key.id());
            }
        }
        if !kept.is_empty() && peers.is_empty() {
            projection
                .guidance
                .push(format!("No other devices share these {}.", noun));
        }
    }
    let peer_total = peers.len();

    let mut nodes = vec![device_node(device, region_ids, true)];
    nodes.extend(
        peers
            .into_values()
            .map(|(peer, regions)| device_node(&peer, regions, false)),
    );
    let node_total = if peers_capped { None } else { Some(nodes.len()) };
    let (nodes, report) = cap(nodes, limits.nodes, node_total, "devices");
    projection.truncation.nodes = report;

    let edges: Vec<Edge> = nodes
        .iter()
        .filter(|node| !node.is_focus)
        .map(|node| Edge {
            id: format!("{}->{}", focus_id, node.id),
            source: focus_id.to_string(),
            target: node.id.clone(),
            kind: "peer",
            metadata: Some(json!({ "shared_regions": node.region_ids })),
        })
        .collect();
    let edge_total = edges.len();
    let (edges, report) = cap(edges, limits.edges, Some(edge_total), "edges");
    projection.truncation.edges = report;

    let shown_peers = nodes.len().saturating_sub(1);
    inspector.status(
        "Peers",
        count_of(shown_peers, if peers_capped { None } else { Some(peer_total) }),
    );
    for key in &kept {
        inspector.relate(key.label(), query.layer, key.kind(), key.id());
    }
    for node in nodes.iter().filter(|node| !node.is_focus) {
        inspector.relate(node.label.clone(), query.layer, "device", node.id.clone());
    }

    projection.nodes = nodes;
    projection.edges = edges;
    projection.inspector = Some(inspector);
    Ok(())
}

pub(super) async fn physical<S>(
    source: &S,
    query: &TopologyQuery,
    limits: Limits,
    device: &device::Model,
    projection: &mut Projection,
) -> Result<()>
where
    S: TopologySource + ?Sized,
{
    let focus_id = device.device_id;
    let mut inspector = Inspector::for_focus(&Focus::Device(focus_id), query.layer, Some(device));

    // (link, peer, local port, peer port), self-links dropped.
    let links: Vec<_> = source
        .device_links(focus_id)
        .await?
        .into_iter()
        .filter_map(|link| {
            if link.device_a_id == focus_id && link.device_b_id != focus_id {
                let (peer, local, remote) = (link.device_b_id, link.port_a.clone(), link.port_b.clone());
                Some((link, peer, local, remote))
            } else if link.device_b_id == focus_id && link.device_a_id != focus_id {
                let (peer, local, remote) = (link.device_a_id, link.port_b.clone(), link.port_a.clone());
                Some((link, peer, local, remote))
            } else {
                None
            }
        })
        .collect();
    let peer_ids: BTreeSet<i32> = links.iter().map(|(_, peer, _, _)| *peer).collect();
    inspector.status("Links", links.len().to_string());

    if links.is_empty() {
        projection.guidance.push(
            "No physical links recorded; enable LLDP/CDP discovery or link devices manually."
                .to_string(),
        );
    }

    let mut nodes = vec![device_node(device, Vec::new(), true)];
    if query.depth == 0 {
        depth_zero(projection);
    } else {
        let wanted: Vec<i32> = peer_ids
            .iter()
            .copied()
            .take(limits.nodes.saturating_sub(1))
            .collect();
        for peer in source.devices_by_id(&wanted).await? {
            nodes.push(device_node(&peer, Vec::new(), false));
        }
    }
    let node_total = if query.depth == 0 {
        1
    } else {
        peer_ids.len() + 1
    };
    let (nodes, report) = cap(nodes, limits.nodes, Some(node_total), "devices");
    projection.truncation.nodes = report;

    let retained: BTreeSet<i32> = nodes.iter().filter_map(|node| node.device_id).collect();
    let edges: Vec<Edge> = links
        .into_iter()
        .filter(|(_, peer, _, _)| retained.contains(peer))
        .map(|(link, peer, local_port, peer_port)| Edge {
            id: link.link_key.clone(),
            source: focus_id.to_string(),
            target: peer.to_string(),
            kind: "link",
            metadata: Some(json!({
                "link_key": link.link_key,
                "link_type": link.link_type,
                "source": link.source,
                "local_port": local_port,
                "peer_port": peer_port,
            })),
        })
        .collect();
    let edge_total = edges.len();
    let (edges, report) = cap(edges, limits.edges, Some(edge_total), "links");
    projection.truncation.edges = report;

    inspector.status(
        "Peers",
        count_of(nodes.len().saturating_sub(1), Some(peer_ids.len())),
    );
    for node in nodes.iter().filter(|node| !node.is_focus) {
        inspector.relate(node.label.clone(), query.layer, "device", node.id.clone());
    }
    projection.nodes = nodes;
    projection.edges = edges;
    projection.inspector = Some(inspector);
    Ok(())
}

pub(super) async fn services<S>(
    source: &S,
    query: &TopologyQuery,
    limits: Limits,
    device: &device::Model,
    projection: &mut Projection,
) -> Result<()>
where
    S: TopologySource + ?Sized,
{
    let focus_id = device.device_id;
    let mut inspector = Inspector::for_focus(&Focus::Device(focus_id), query.layer, Some(device));
    let services = source.device_services(focus_id).await?;
    if services.is_empty() {
        projection.guidance.push(
            "No services observed; enable the port scan for this address range.".to_string(),
        );
    }

    let mut nodes = vec![device_node(device, Vec::new(), true)];
    let mut meta = BTreeMap::new();
    if query.depth == 0 {
        depth_zero(projection);
    } else {
        for svc in &services {
            let id = format!("svc:{}:{}/{}", focus_id, svc.protocol, svc.port);
            let label = match &svc.name {
                Some(name) => format!("{}/{} {}", svc.protocol, svc.port, name),
                None => format!("{}/{}", svc.protocol, svc.port),
            };
            meta.insert(
                id.clone(),
                json!({ "state": svc.state, "source": svc.source, "observed_at": svc.observed_at }),
            );
            nodes.push(Node {
                id,
                kind: "service",
                label,
                device_id: Some(focus_id),
                region_ids: Vec::new(),
                primary_region_id: None,
                is_focus: false,
            });
        }
    }
    let node_total = nodes.len();
    let (nodes, report) = cap(nodes, limits.nodes, Some(node_total), "nodes");
    projection.truncation.nodes = report;

    let edges: Vec<Edge> = nodes
        .iter()
        .filter(|node| !node.is_focus)
        .map(|node| Edge {
            id: format!("{}->{}", focus_id, node.id),
            source: focus_id.to_string(),
            target: node.id.clone(),
            kind: "service",
            metadata: meta.remove(&node.id),
        })
        .collect();
    let edge_total = edges.len();
    let (edges, report) = cap(edges, limits.edges, Some(edge_total), "edges");
    projection.truncation.edges = report;

    inspector.status(
        "Services",
        count_of(nodes.len().saturating_sub(1), Some(services.len())),
    );
    projection.nodes = nodes;
    projection.edges = edges;
    projection.inspector = Some(inspector);
    Ok(())
}

pub(super) fn security(query: &TopologyQuery, device: &device::Model, projection: &mut Projection) {
    projection
        .guidance
        .push("Security zones are not modelled yet; this layer has nothing to show.".to_string());
    projection.inspector = Some(Inspector::for_focus(
        &Focus::Device(device.device_id),
        query.layer,
        Some(device),
    ));
}

/// Flat membership view for a subnet or VLAN focus; no edges are inferred.
pub(super) async fn membership<S>(
    source: &S,
    query: &TopologyQuery,
    limits: Limits,
    focus: &Focus,
    projection: &mut Projection,
) -> Result<()>
where
    S: TopologySource + ?Sized,
{
    let key = match focus {
        Focus::Subnet(net) => RegionKey::Subnet(*net),
        Focus::Vlan(vlan) => RegionKey::Vlan(*vlan),
        _ => return Ok(()),
    };
    let (regions, report) = cap(vec![key.region()], limits.regions, Some(1), "regions");
    projection.regions = regions;
    projection.truncation.regions = report;

    let members = if query.depth == 0 {
        depth_zero(projection);
        Members::default()
    } else {
        key.members(source, None, limits.nodes).await?
    };
    if query.depth > 0 && members.total == 0 {
        projection
            .guidance
            .push(format!("No devices observed in {}.", key.label()));
    }
    let nodes: Vec<Node> = members
        .devices
        .iter()
        .map(|member| device_node(member, vec![key.id()], false))
        .collect();
    let (nodes, report) = cap(nodes, limits.nodes, Some(members.total), "devices");
    projection.truncation.nodes = report;

    let mut inspector = Inspector::for_focus(focus, query.layer, None);
    inspector.status("Members", count_of(nodes.len(), Some(members.total)));
    for node in &nodes {
        inspector.relate(node.label.clone(), query.layer, "device", node.id.clone());
    }
    projection.nodes = nodes;
    projection.inspector = Some(inspector);
    Ok(())
}
