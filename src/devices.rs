//! Device facts API: listing, per-device fact bundles, change history and
//! explicit edits.

use chrono::{DateTime, Duration, Utc};
use sea_orm::*;
use serde::Serialize;

use netatlas_entity::{
    device, device_change_event, device_interface, device_ip, device_link, device_mac,
    device_name_candidate, device_service, device_snmp,
};

use crate::db::devices::{self, DeviceQuery, DeviceSort, DeviceStatus, MetadataUpdate};
use crate::db::facts::{self, Fact, LinkFact};
use crate::error::{Error, Result};
use crate::pagination::{Page, PageRequest};

/// One row of the device list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub device_id: i32,
    pub display_name: Option<String>,
    pub owner: Option<String>,
    pub location: Option<String>,
    pub primary_ip: Option<String>,
    pub online: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub last_changed_at: DateTime<Utc>,
}

/// Everything known about one device.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceFacts {
    pub device: device::Model,
    pub primary_ip: Option<String>,
    pub ips: Vec<device_ip::Model>,
    pub macs: Vec<device_mac::Model>,
    pub interfaces: Vec<device_interface::Model>,
    pub services: Vec<device_service::Model>,
    pub snmp: Option<device_snmp::Model>,
    pub links: Vec<device_link::Model>,
    pub name_candidates: Vec<device_name_candidate::Model>,
}

#[derive(Clone, Debug, Default)]
pub struct ListParams {
    pub q: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u64>,
    pub online_window_minutes: Option<i64>,
    pub changed_window_hours: Option<i64>,
}

pub async fn list_devices(
    db: &DatabaseConnection,
    params: &ListParams,
    now: DateTime<Utc>,
) -> Result<Page<DeviceSummary>> {
    let page = PageRequest::parse(params.cursor.as_deref(), params.limit)?;
    let mut query = DeviceQuery {
        q: params.q.clone(),
        status: DeviceStatus::parse(params.status.as_deref())?,
        sort: DeviceSort::parse(params.sort.as_deref())?,
        ..Default::default()
    };
    if let Some(minutes) = params.online_window_minutes.filter(|m| *m > 0) {
        query.online_window = Duration::minutes(minutes);
    }
    if let Some(hours) = params.changed_window_hours.filter(|h| *h > 0) {
        query.changed_window = Duration::hours(hours);
    }

    let rows = devices::list(db, &query, &page, now).await?;
    let mut items = Vec::with_capacity(rows.items.len());
    for row in rows.items {
        let primary_ip = devices::ips(db, row.device_id)
            .await?
            .into_iter()
            .next()
            .map(|ip| ip.address);
        items.push(DeviceSummary {
            device_id: row.device_id,
            online: row.last_seen_at >= now - query.online_window,
            display_name: row.display_name,
            owner: row.owner,
            location: row.location,
            primary_ip,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_seen_at: row.last_seen_at,
            last_changed_at: row.last_changed_at,
        });
    }
    Ok(Page {
        items,
        next_cursor: rows.next_cursor,
    })
}

async fn require(db: &DatabaseConnection, device_id: i32) -> Result<device::Model> {
    device::Entity::find_by_id(device_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("device {}", device_id)))
}

pub async fn get_device(db: &DatabaseConnection, device_id: i32) -> Result<DeviceFacts> {
    let device = require(db, device_id).await?;
    let ips = devices::ips(db, device_id).await?;
    Ok(DeviceFacts {
        device,
        primary_ip: ips.first().map(|ip| ip.address.clone()),
        ips,
        macs: devices::macs(db, device_id).await?,
        interfaces: devices::interfaces(db, device_id).await?,
        services: devices::services(db, device_id).await?,
        snmp: devices::snmp(db, device_id).await?,
        links: devices::links(db, device_id).await?,
        name_candidates: devices::name_candidates(db, device_id).await?,
    })
}

pub async fn device_events(
    db: &DatabaseConnection,
    device_id: i32,
    cursor: Option<&str>,
    limit: Option<u64>,
) -> Result<Page<device_change_event::Model>> {
    let page = PageRequest::parse(cursor, limit)?;
    require(db, device_id).await?;
    Ok(devices::events(db, device_id, &page).await?)
}

pub async fn create_device(
    db: &DatabaseConnection,
    metadata: &MetadataUpdate,
    now: DateTime<Utc>,
) -> Result<device::Model> {
    Ok(devices::create(db, metadata, now).await?)
}

pub async fn update_device(
    db: &DatabaseConnection,
    device_id: i32,
    metadata: &MetadataUpdate,
    now: DateTime<Utc>,
) -> Result<device::Model> {
    devices::update_metadata(db, device_id, metadata, now).await
}

/// One end of a manual link.
#[derive(Clone, Debug, Default)]
pub struct Endpoint {
    pub device_id: i32,
    pub port: Option<String>,
}

/// Record a manual physical link; relinking the same ports updates it in place.
pub async fn link_devices(
    db: &DatabaseConnection,
    local: &Endpoint,
    peer: &Endpoint,
    link_type: Option<String>,
    now: DateTime<Utc>,
) -> Result<device_link::Model> {
    if local.device_id == peer.device_id {
        return Err(Error::validation(
            "invalid_link",
            "a device cannot be linked to itself",
        ));
    }
    require(db, local.device_id).await?;
    require(db, peer.device_id).await?;

    let port = |p: &Option<String>| {
        p.as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    };
    let fact = LinkFact {
        peer_device_id: peer.device_id,
        local_port: port(&local.port),
        peer_port: port(&peer.port),
        source: "manual".to_string(),
        link_type,
    };
    let key = facts::link_key(
        local.device_id,
        fact.local_port.as_deref(),
        peer.device_id,
        fact.peer_port.as_deref(),
    );
    facts::record(db, local.device_id, &Fact::Link(fact), now).await?;
    device_link::Entity::find()
        .filter(device_link::Column::LinkKey.eq(key.as_str()))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("link {}", key)))
}
