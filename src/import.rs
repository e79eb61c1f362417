//! Bulk import of third-party inventory.
//!
//! Payloads are NetBox style device lists, either the paged API shape
//! (`{"results": [...]}`) or a bare array. Records match existing devices by
//! primary address; anything unmatched becomes a new device. Imported
//! metadata only fills blank fields.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use log::{debug, info};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};

use netatlas_entity::device;

use crate::db::devices::{self, MetadataUpdate};
use crate::db::facts::{self, Fact, IpFact};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct Named {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Address {
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NetboxDevice {
    name: Option<String>,
    site: Option<Named>,
    tenant: Option<Named>,
    comments: Option<String>,
    primary_ip: Option<Address>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Paged { results: Vec<NetboxDevice> },
    Bare(Vec<NetboxDevice>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportRecord {
    pub name: Option<String>,
    pub owner: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub address: Option<IpAddr>,
    pub prefix_len: Option<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub records: usize,
    pub matched: usize,
    pub created: usize,
    pub fields_filled: usize,
    pub skipped: usize,
}

fn text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_address(raw: &str) -> Option<(IpAddr, Option<u8>)> {
    let mut parts = raw.trim().splitn(2, '/');
    let address = parts.next()?.parse().ok()?;
    let prefix = parts.next().and_then(|p| p.parse().ok());
    Some((address, prefix))
}

pub fn parse_payload(payload: &str) -> Result<Vec<ImportRecord>> {
    let devices = match serde_json::from_str::<Payload>(payload)
        .map_err(|e| Error::Upstream(format!("import payload is not a device list: {}", e)))?
    {
        Payload::Paged { results } => results,
        Payload::Bare(devices) => devices,
    };
    Ok(devices
        .into_iter()
        .map(|device| {
            let address = device
                .primary_ip
                .and_then(|ip| ip.address)
                .and_then(|raw| split_address(&raw));
            ImportRecord {
                name: text(device.name),
                owner: text(device.tenant.and_then(|t| t.name)),
                location: text(device.site.and_then(|s| s.name)),
                notes: text(device.comments),
                address: address.map(|(a, _)| a),
                prefix_len: address.and_then(|(_, p)| p),
            }
        })
        .collect())
}

/// Read a payload from a local path or an http(s) URL.
pub async fn fetch(source: &str) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        debug!("fetching import payload from {}", source);
        let response = reqwest::get(source).await?.error_for_status()?;
        Ok(response.text().await?)
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(|e| Error::Upstream(format!("{}: {}", source, e)))
    }
}

pub async fn import_records(
    db: &DatabaseConnection,
    records: &[ImportRecord],
    now: DateTime<Utc>,
) -> Result<ImportReport> {
    let mut report = ImportReport {
        records: records.len(),
        ..Default::default()
    };
    for record in records {
        if record.address.is_none() && record.name.is_none() {
            report.skipped += 1;
            continue;
        }

        let existing = match record.address {
            Some(address) => devices::find_by_ip(db, &address.to_string()).await?,
            None => None,
        };
        let device_id = match existing {
            Some(existing) => {
                report.matched += 1;
                existing.device_id
            }
            None => {
                report.created += 1;
                devices::insert_device(db, None, now).await?.device_id
            }
        };

        if let Some(address) = record.address {
            let fact = Fact::Ip(IpFact {
                address,
                prefix_len: record.prefix_len,
                source: "import".to_string(),
            });
            facts::record(db, device_id, &fact, now).await?;
        }
        if let Some(name) = &record.name {
            let address = record.address.map(|a| a.to_string());
            if devices::record_name_candidate(db, device_id, name, "import", address.as_deref(), now)
                .await?
            {
                report.fields_filled += 1;
            }
        }

        let metadata = MetadataUpdate {
            display_name: None,
            owner: record.owner.clone(),
            location: record.location.clone(),
            notes: record.notes.clone(),
        };
        // Reload: the name candidate may have just set the display name.
        let current = match device::Entity::find_by_id(device_id).one(db).await? {
            Some(current) => current,
            None => continue,
        };
        report.fields_filled += devices::fill_blank_metadata(db, current, &metadata, now)
            .await?
            .len();
    }
    info!(
        "import: {} records, {} matched, {} created, {} fields filled, {} skipped",
        report.records, report.matched, report.created, report.fields_filled, report.skipped
    );
    Ok(report)
}

/// Fetch, parse and apply one import source.
pub async fn import(db: &DatabaseConnection, source: &str, now: DateTime<Utc>) -> Result<ImportReport> {
    let payload = fetch(source).await?;
    let records = parse_payload(&payload)?;
    import_records(db, &records, now).await
}
