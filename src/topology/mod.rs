//! Topology projection.
//!
//! A projection is computed per request from the fact store: the caller
//! picks a layer and a focus, and gets back a bounded graph of regions,
//! nodes and edges, a truncation report, and an inspector panel for the
//! focused object. Nothing here writes to the store.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::Serialize;

use crate::error::{Error, Result};

pub mod capped;
mod inspector;
mod layers;
pub mod source;

pub use capped::CapReport;
pub use inspector::{Field, Inspector, Relationship};
pub use source::{Members, StoreSource, TopologySource};

use capped::{effective_limit, EDGE_CEILING, NODE_CEILING, REGION_CEILING};

pub const DEFAULT_DEPTH: u8 = 1;
pub const MAX_DEPTH: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Physical,
    L2,
    L3,
    Services,
    Security,
}

impl Layer {
    pub const ALL: [Layer; 5] = [
        Layer::Physical,
        Layer::L2,
        Layer::L3,
        Layer::Services,
        Layer::Security,
    ];

    pub fn parse(value: &str) -> Result<Layer> {
        match value.trim().to_ascii_lowercase().as_str() {
            "physical" => Ok(Layer::Physical),
            "l2" => Ok(Layer::L2),
            "l3" => Ok(Layer::L3),
            "services" => Ok(Layer::Services),
            "security" => Ok(Layer::Security),
            other => Err(Error::validation(
                "invalid_layer",
                format!(
                    "unknown layer {:?}, expected physical, l2, l3, services or security",
                    other
                ),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Physical => "physical",
            Layer::L2 => "l2",
            Layer::L3 => "l3",
            Layer::Services => "services",
            Layer::Security => "security",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Layer::Physical => "Physical",
            Layer::L2 => "L2",
            Layer::L3 => "L3",
            Layer::Services => "Services",
            Layer::Security => "Security",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Focus {
    Device(i32),
    /// Always network-masked.
    Subnet(IpNetwork),
    Vlan(u16),
    Zone(String),
    Service(String),
}

impl Focus {
    /// Parse a focus from its type and id; both absent means no focus.
    pub fn parse(kind: Option<&str>, id: Option<&str>) -> Result<Option<Focus>> {
        let kind = kind.map(str::trim).filter(|k| !k.is_empty());
        let id = id.map(str::trim).filter(|i| !i.is_empty());
        let (kind, id) = match (kind, id) {
            (None, None) => return Ok(None),
            (Some(kind), Some(id)) => (kind, id),
            _ => {
                return Err(Error::validation(
                    "invalid_focus",
                    "focus type and focus id must be given together",
                ))
            }
        };
        let focus = match kind.to_ascii_lowercase().as_str() {
            // Any integer is well formed; an id with no device is not_found later.
            "device" => Focus::Device(id.parse::<i32>().map_err(|_| {
                Error::validation("invalid_focus", format!("{:?} is not a device id", id))
            })?),
            "subnet" => {
                let net = id.parse::<IpNetwork>().map_err(|_| {
                    Error::validation("invalid_focus", format!("{:?} is not a CIDR prefix", id))
                })?;
                let masked = IpNetwork::new(net.network(), net.prefix()).map_err(|_| {
                    Error::validation("invalid_focus", format!("{:?} is not a CIDR prefix", id))
                })?;
                Focus::Subnet(masked)
            }
            "vlan" => Focus::Vlan(parse_vlan(id)?),
            "zone" => Focus::Zone(id.to_string()),
            "service" => Focus::Service(id.to_string()),
            other => {
                return Err(Error::validation(
                    "invalid_focus",
                    format!(
                        "unknown focus type {:?}, expected device, subnet, vlan, zone or service",
                        other
                    ),
                ))
            }
        };
        Ok(Some(focus))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Focus::Device(_) => "device",
            Focus::Subnet(_) => "subnet",
            Focus::Vlan(_) => "vlan",
            Focus::Zone(_) => "zone",
            Focus::Service(_) => "service",
        }
    }

    pub fn id(&self) -> String {
        match self {
            Focus::Device(id) => id.to_string(),
            Focus::Subnet(net) => subnet_id(net),
            Focus::Vlan(vlan) => vlan.to_string(),
            Focus::Zone(id) | Focus::Service(id) => id.clone(),
        }
    }
}

fn parse_vlan(id: &str) -> Result<u16> {
    match id.parse::<u16>() {
        Ok(vlan) if (1..=4094).contains(&vlan) => Ok(vlan),
        _ => Err(Error::validation(
            "invalid_vlan",
            format!("VLAN id {:?} must be an integer between 1 and 4094", id),
        )),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopologyQuery {
    pub layer: Layer,
    pub focus: Option<Focus>,
    pub depth: u8,
    pub limit: Option<usize>,
}

impl TopologyQuery {
    pub fn parse(
        layer: &str,
        focus_type: Option<&str>,
        focus_id: Option<&str>,
        depth: Option<i64>,
        limit: Option<u64>,
    ) -> Result<Self> {
        let depth = match depth {
            None => DEFAULT_DEPTH,
            Some(d) if (0..=i64::from(MAX_DEPTH)).contains(&d) => d as u8,
            Some(d) => {
                return Err(Error::validation(
                    "invalid_depth",
                    format!("depth {} is outside 0..={}", d, MAX_DEPTH),
                ))
            }
        };
        let limit = match limit {
            None => None,
            Some(0) => {
                return Err(Error::validation("invalid_limit", "limit must be at least 1"))
            }
            Some(n) => Some(usize::try_from(n).unwrap_or(usize::MAX)),
        };
        Ok(TopologyQuery {
            layer: Layer::parse(layer)?,
            focus: Focus::parse(focus_type, focus_id)?,
            depth,
            limit,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Limits {
    regions: usize,
    nodes: usize,
    edges: usize,
}

impl Limits {
    fn for_query(query: &TopologyQuery) -> Self {
        Limits {
            regions: effective_limit(REGION_CEILING, query.limit),
            nodes: effective_limit(NODE_CEILING, query.limit),
            edges: effective_limit(EDGE_CEILING, query.limit),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FocusRef {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Region {
    pub id: String,
    pub kind: &'static str,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub kind: &'static str,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<i32>,
    pub region_ids: Vec<String>,
    pub primary_region_id: Option<String>,
    pub is_focus: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Truncation {
    pub regions: CapReport,
    pub nodes: CapReport,
    pub edges: CapReport,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Projection {
    pub layer: Layer,
    pub focus: Option<FocusRef>,
    pub depth: u8,
    pub regions: Vec<Region>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub truncation: Truncation,
    pub guidance: Vec<String>,
    pub inspector: Option<Inspector>,
}

impl Projection {
    fn empty(query: &TopologyQuery, limits: Limits) -> Self {
        let report = |limit| CapReport {
            limit,
            ..Default::default()
        };
        Projection {
            layer: query.layer,
            focus: query.focus.as_ref().map(|f| FocusRef {
                kind: f.kind(),
                id: f.id(),
            }),
            depth: query.depth,
            regions: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            truncation: Truncation {
                regions: report(limits.regions),
                nodes: report(limits.nodes),
                edges: report(limits.edges),
            },
            guidance: Vec::new(),
            inspector: None,
        }
    }

    // Deterministic output regardless of the order facts were found in.
    fn sort(&mut self) {
        self.regions.sort_by(|a, b| id_order(&a.id).cmp(&id_order(&b.id)));
        self.nodes.sort_by(|a, b| id_order(&a.id).cmp(&id_order(&b.id)));
        self.edges.sort_by(|a, b| id_order(&a.id).cmp(&id_order(&b.id)));
        let truncated = [
            &self.truncation.regions,
            &self.truncation.nodes,
            &self.truncation.edges,
        ]
        .iter()
        .any(|report| report.truncated);
        if truncated {
            self.guidance.push(
                "Results were capped; narrow the focus or lower depth to see everything."
                    .to_string(),
            );
        }
    }
}

/// Sort key for ids: numeric ids first in numeric order, everything else lexically.
pub(crate) fn id_order(id: &str) -> (u8, u64, &str) {
    match id.parse::<u64>() {
        Ok(n) => (0, n, id),
        Err(_) => (1, 0, id),
    }
}

pub(crate) fn subnet_id(net: &IpNetwork) -> String {
    format!("{}/{}", net.network(), net.prefix())
}

fn is_link_local(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

/// Derive the subnet an observed address belongs to.
///
/// A stored prefix is used when it is neither 0 nor a host route; otherwise
/// IPv4 falls back to /24 and IPv6 to /64. Unspecified, loopback, multicast
/// and link-local addresses belong to no subnet.
pub fn subnet_for(address: &str, prefix_len: Option<i32>) -> Option<IpNetwork> {
    let mut parts = address.trim().splitn(2, '/');
    let addr: IpAddr = parts.next()?.parse().ok()?;
    let inline = parts.next().and_then(|p| p.parse::<i32>().ok());
    if addr.is_unspecified() || addr.is_loopback() || addr.is_multicast() || is_link_local(&addr) {
        return None;
    }
    let (max, default) = match addr {
        IpAddr::V4(_) => (32, 24),
        IpAddr::V6(_) => (128, 64),
    };
    let prefix = inline
        .or(prefix_len)
        .filter(|p| *p > 0 && *p < max)
        .unwrap_or(default) as u8;
    let net = IpNetwork::new(addr, prefix).ok()?;
    IpNetwork::new(net.network(), prefix).ok()
}

/// Build the projection for `query` from whatever `source` holds.
pub async fn project<S>(source: &S, query: &TopologyQuery) -> Result<Projection>
where
    S: TopologySource + ?Sized,
{
    let limits = Limits::for_query(query);
    let mut projection = Projection::empty(query, limits);
    let focus = match &query.focus {
        Some(focus) => focus,
        None => {
            projection.guidance.push(format!(
                "Select a focus (focusType and focusId) to project the {} layer.",
                query.layer.label()
            ));
            return Ok(projection);
        }
    };

    match focus {
        Focus::Device(id) => {
            let device = source
                .device(*id)
                .await?
                .ok_or_else(|| Error::not_found(format!("device {}", id)))?;
            match query.layer {
                Layer::L3 | Layer::L2 => {
                    layers::regions_around(source, query, limits, &device, &mut projection).await?
                }
                Layer::Physical => {
                    layers::physical(source, query, limits, &device, &mut projection).await?
                }
                Layer::Services => {
                    layers::services(source, query, limits, &device, &mut projection).await?
                }
                Layer::Security => layers::security(query, &device, &mut projection),
            }
        }
        Focus::Subnet(_) | Focus::Vlan(_) => {
            layers::membership(source, query, limits, focus, &mut projection).await?
        }
        Focus::Zone(_) | Focus::Service(_) => {
            projection.guidance.push(format!(
                "{} focus has no backing inventory yet; nothing to project.",
                focus.kind()
            ));
            projection.inspector = Some(Inspector::for_focus(focus, query.layer, None));
        }
    }
    projection.sort();
    Ok(projection)
}
