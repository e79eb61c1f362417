// Device identity, metadata and list queries.

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::*;
use serde_json::{json, Map, Value};

use netatlas_entity::{
    device, device_change_event, device_interface, device_ip, device_link, device_mac,
    device_name_candidate, device_service, device_snmp,
};

use super::facts;
use crate::error::{Error, Result};
use crate::pagination::{after_cursor, Page, PageRequest};

pub const METADATA_EVENT: &str = "metadata";

pub async fn insert_device<C: ConnectionTrait>(
    db: &C,
    display_name: Option<String>,
    now: DateTime<Utc>,
) -> std::result::Result<device::Model, DbErr> {
    device::ActiveModel {
        display_name: Set(display_name),
        created_at: Set(now),
        updated_at: Set(now),
        last_seen_at: Set(now),
        last_changed_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn mark_changed<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
    now: DateTime<Utc>,
) -> std::result::Result<(), DbErr> {
    device::Entity::update_many()
        .col_expr(device::Column::LastChangedAt, Expr::value(now))
        .filter(device::Column::DeviceId.eq(device_id))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn mark_seen<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
    now: DateTime<Utc>,
) -> std::result::Result<(), DbErr> {
    device::Entity::update_many()
        .col_expr(device::Column::LastSeenAt, Expr::value(now))
        .filter(device::Column::DeviceId.eq(device_id))
        .exec(db)
        .await?;
    Ok(())
}

// The device that most recently reported this address.
pub async fn find_by_ip<C: ConnectionTrait>(
    db: &C,
    address: &str,
) -> std::result::Result<Option<device::Model>, DbErr> {
    let ip = device_ip::Entity::find()
        .filter(device_ip::Column::Address.eq(address))
        .order_by_desc(device_ip::Column::UpdatedAt)
        .one(db)
        .await?;
    match ip {
        Some(ip) => device::Entity::find_by_id(ip.device_id).one(db).await,
        None => Ok(None),
    }
}

pub async fn find_by_mac<C: ConnectionTrait>(
    db: &C,
    mac: &str,
) -> std::result::Result<Option<device::Model>, DbErr> {
    let mac = mac.to_lowercase();
    let row = device_mac::Entity::find()
        .filter(device_mac::Column::Address.eq(mac.as_str()))
        .order_by_desc(device_mac::Column::UpdatedAt)
        .one(db)
        .await?;
    let device_id = match row {
        Some(row) => Some(row.device_id),
        // Interface MACs learned over SNMP identify the device too.
        None => device_interface::Entity::find()
            .filter(device_interface::Column::Mac.eq(mac.as_str()))
            .one(db)
            .await?
            .map(|iface| iface.device_id),
    };
    match device_id {
        Some(id) => device::Entity::find_by_id(id).one(db).await,
        None => Ok(None),
    }
}

// Match on SNMP sysName first, then display name.
pub async fn find_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> std::result::Result<Option<device::Model>, DbErr> {
    if name.is_empty() {
        return Ok(None);
    }
    if let Some(snmp) = device_snmp::Entity::find()
        .filter(device_snmp::Column::SysName.eq(name))
        .one(db)
        .await?
    {
        return device::Entity::find_by_id(snmp.device_id).one(db).await;
    }
    device::Entity::find()
        .filter(device::Column::DisplayName.eq(name))
        .order_by_asc(device::Column::DeviceId)
        .one(db)
        .await
}

/// Find the device behind an observed address, creating it when unknown.
///
/// Returns the device and whether it was created by this call.
pub async fn resolve_or_create(
    db: &DatabaseConnection,
    address: &str,
    mac: Option<&str>,
    now: DateTime<Utc>,
) -> std::result::Result<(device::Model, bool), DbErr> {
    if let Some(device) = find_by_ip(db, address).await? {
        return Ok((device, false));
    }
    if let Some(mac) = mac {
        if let Some(device) = find_by_mac(db, mac).await? {
            return Ok((device, false));
        }
    }
    let device = insert_device(db, None, now).await?;
    Ok((device, true))
}

/// Remember an observed name and adopt it as display name if none is set.
///
/// Returns true when the display name was assigned.
pub async fn record_name_candidate(
    db: &DatabaseConnection,
    device_id: i32,
    name: &str,
    source: &str,
    address: Option<&str>,
    now: DateTime<Utc>,
) -> std::result::Result<bool, DbErr> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(false);
    }

    let txn = db.begin().await?;
    match device_name_candidate::Entity::find()
        .filter(device_name_candidate::Column::DeviceId.eq(device_id))
        .filter(device_name_candidate::Column::Name.eq(name))
        .filter(device_name_candidate::Column::Source.eq(source))
        .one(&txn)
        .await?
    {
        Some(row) => {
            let mut active: device_name_candidate::ActiveModel = row.into();
            active.address = Set(address.map(str::to_string));
            active.observed_at = Set(now);
            active.update(&txn).await?;
        }
        None => {
            device_name_candidate::ActiveModel {
                device_id: Set(device_id),
                name: Set(name.to_string()),
                source: Set(source.to_string()),
                address: Set(address.map(str::to_string)),
                observed_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }

    // Conditional update so a concurrently assigned name is never replaced.
    let assigned = device::Entity::update_many()
        .col_expr(device::Column::DisplayName, Expr::value(name))
        .col_expr(device::Column::LastChangedAt, Expr::value(now))
        .filter(device::Column::DeviceId.eq(device_id))
        .filter(device::Column::DisplayName.is_null())
        .exec(&txn)
        .await?
        .rows_affected
        == 1;
    if assigned {
        facts::append_event(
            &txn,
            device_id,
            METADATA_EVENT,
            &format!("Display name set to {} from {}", name, source),
            json!({
                "action": "updated",
                "changes": { "display_name": name },
                "previous": { "display_name": Value::Null },
                "source": source,
            }),
            now,
        )
        .await?;
    }
    txn.commit().await?;
    Ok(assigned)
}

/// Explicit metadata. `None` leaves a field alone; `Some("")` clears it.
#[derive(Clone, Debug, Default)]
pub struct MetadataUpdate {
    pub display_name: Option<String>,
    pub owner: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl MetadataUpdate {
    fn fields(&self) -> [(&'static str, &Option<String>); 4] {
        [
            ("display_name", &self.display_name),
            ("owner", &self.owner),
            ("location", &self.location),
            ("notes", &self.notes),
        ]
    }
}

fn current_value(model: &device::Model, field: &str) -> Option<String> {
    match field {
        "display_name" => model.display_name.clone(),
        "owner" => model.owner.clone(),
        "location" => model.location.clone(),
        "notes" => model.notes.clone(),
        _ => None,
    }
}

fn set_value(active: &mut device::ActiveModel, field: &str, value: Option<String>) {
    match field {
        "display_name" => active.display_name = Set(value),
        "owner" => active.owner = Set(value),
        "location" => active.location = Set(value),
        "notes" => active.notes = Set(value),
        _ => {}
    }
}

// Apply changes, emitting one metadata event listing every changed field.
async fn apply_metadata(
    db: &DatabaseConnection,
    model: device::Model,
    changes: Vec<(&'static str, Option<String>)>,
    summary_prefix: &str,
    now: DateTime<Utc>,
) -> std::result::Result<(device::Model, Vec<&'static str>), DbErr> {
    let mut current = Map::new();
    let mut previous = Map::new();
    let mut changed = Vec::new();
    for (field, value) in &changes {
        let old = current_value(&model, field);
        if &old != value {
            previous.insert(field.to_string(), json!(old));
            current.insert(field.to_string(), json!(value));
            changed.push(*field);
        }
    }
    if changed.is_empty() {
        return Ok((model, changed));
    }

    let device_id = model.device_id;
    let txn = db.begin().await?;
    let mut active: device::ActiveModel = model.into();
    for (field, value) in changes {
        if changed.contains(&field) {
            set_value(&mut active, field, value);
        }
    }
    active.updated_at = Set(now);
    active.last_changed_at = Set(now);
    let updated = active.update(&txn).await?;
    facts::append_event(
        &txn,
        device_id,
        METADATA_EVENT,
        &format!("{}: {}", summary_prefix, changed.join(", ")),
        json!({
            "action": "updated",
            "changes": Value::Object(current),
            "previous": Value::Object(previous),
        }),
        now,
    )
    .await?;
    txn.commit().await?;
    Ok((updated, changed))
}

fn normalize(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub async fn update_metadata(
    db: &DatabaseConnection,
    device_id: i32,
    update: &MetadataUpdate,
    now: DateTime<Utc>,
) -> Result<device::Model> {
    let model = device::Entity::find_by_id(device_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("device {}", device_id)))?;
    let changes = update
        .fields()
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, normalize(v))))
        .collect();
    let (model, _) = apply_metadata(db, model, changes, "Metadata updated", now).await?;
    Ok(model)
}

/// Explicitly create a device; the creation itself is the first change event.
pub async fn create(
    db: &DatabaseConnection,
    metadata: &MetadataUpdate,
    now: DateTime<Utc>,
) -> std::result::Result<device::Model, DbErr> {
    let value = |v: &Option<String>| v.as_deref().and_then(normalize);
    let txn = db.begin().await?;
    let model = device::ActiveModel {
        display_name: Set(value(&metadata.display_name)),
        owner: Set(value(&metadata.owner)),
        location: Set(value(&metadata.location)),
        notes: Set(value(&metadata.notes)),
        created_at: Set(now),
        updated_at: Set(now),
        last_seen_at: Set(now),
        last_changed_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut changes = Map::new();
    for (field, _) in metadata.fields() {
        if let Some(v) = current_value(&model, field) {
            changes.insert(field.to_string(), json!(v));
        }
    }
    facts::append_event(
        &txn,
        model.device_id,
        METADATA_EVENT,
        "Device created",
        json!({ "action": "created", "changes": Value::Object(changes) }),
        now,
    )
    .await?;
    txn.commit().await?;
    Ok(model)
}

// Fill only the fields that are currently blank; returns the filled field names.
pub async fn fill_blank_metadata(
    db: &DatabaseConnection,
    model: device::Model,
    update: &MetadataUpdate,
    now: DateTime<Utc>,
) -> std::result::Result<Vec<&'static str>, DbErr> {
    let changes = update
        .fields()
        .into_iter()
        .filter(|(field, _)| current_value(&model, field).is_none())
        .filter_map(|(field, value)| {
            value
                .as_deref()
                .and_then(normalize)
                .map(|v| (field, Some(v)))
        })
        .collect();
    let (_, filled) = apply_metadata(db, model, changes, "Imported metadata", now).await?;
    Ok(filled)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceSort {
    #[default]
    LastSeen,
    Created,
    Updated,
    LastChanged,
}

impl DeviceSort {
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim) {
            None | Some("") | Some("last_seen") => Ok(DeviceSort::LastSeen),
            Some("created") => Ok(DeviceSort::Created),
            Some("updated") => Ok(DeviceSort::Updated),
            Some("last_changed") => Ok(DeviceSort::LastChanged),
            Some(other) => Err(Error::validation(
                "invalid_sort",
                format!(
                    "unknown sort {:?}, expected last_seen, created, updated or last_changed",
                    other
                ),
            )),
        }
    }

    fn column(&self) -> device::Column {
        match self {
            DeviceSort::LastSeen => device::Column::LastSeenAt,
            DeviceSort::Created => device::Column::CreatedAt,
            DeviceSort::Updated => device::Column::UpdatedAt,
            DeviceSort::LastChanged => device::Column::LastChangedAt,
        }
    }

    fn key(&self, model: &device::Model) -> DateTime<Utc> {
        match self {
            DeviceSort::LastSeen => model.last_seen_at,
            DeviceSort::Created => model.created_at,
            DeviceSort::Updated => model.updated_at,
            DeviceSort::LastChanged => model.last_changed_at,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceStatus {
    Online,
    Offline,
    Changed,
}

impl DeviceStatus {
    pub fn parse(value: Option<&str>) -> Result<Option<Self>> {
        match value.map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some("online") => Ok(Some(DeviceStatus::Online)),
            Some("offline") => Ok(Some(DeviceStatus::Offline)),
            Some("changed") => Ok(Some(DeviceStatus::Changed)),
            Some(other) => Err(Error::validation(
                "invalid_status",
                format!("unknown status {:?}, expected online, offline or changed", other),
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeviceQuery {
    pub q: Option<String>,
    pub status: Option<DeviceStatus>,
    pub sort: DeviceSort,
    /// Seen within this window counts as online.
    pub online_window: Duration,
    /// Changed within this window counts as changed.
    pub changed_window: Duration,
}

impl Default for DeviceQuery {
    fn default() -> Self {
        DeviceQuery {
            q: None,
            status: None,
            sort: DeviceSort::LastSeen,
            online_window: Duration::minutes(15),
            changed_window: Duration::hours(24),
        }
    }
}

pub async fn list(
    db: &DatabaseConnection,
    query: &DeviceQuery,
    page: &PageRequest,
    now: DateTime<Utc>,
) -> std::result::Result<Page<device::Model>, DbErr> {
    let sort_col = query.sort.column();
    let mut select = device::Entity::find();

    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let by_address = Query::select()
            .column(device_ip::Column::DeviceId)
            .from(device_ip::Entity)
            .and_where(device_ip::Column::Address.contains(q))
            .to_owned();
        select = select.filter(
            Condition::any()
                .add(device::Column::DisplayName.contains(q))
                .add(device::Column::Owner.contains(q))
                .add(device::Column::Location.contains(q))
                .add(device::Column::Notes.contains(q))
                .add(device::Column::DeviceId.in_subquery(by_address)),
        );
    }

    match query.status {
        Some(DeviceStatus::Online) => {
            select = select.filter(device::Column::LastSeenAt.gte(now - query.online_window));
        }
        Some(DeviceStatus::Offline) => {
            select = select.filter(device::Column::LastSeenAt.lt(now - query.online_window));
        }
        Some(DeviceStatus::Changed) => {
            select =
                select.filter(device::Column::LastChangedAt.gte(now - query.changed_window));
        }
        None => {}
    }

    if let Some(cursor) = &page.cursor {
        select = select.filter(after_cursor(sort_col, device::Column::DeviceId, cursor));
    }

    let rows = select
        .order_by_desc(sort_col)
        .order_by_desc(device::Column::DeviceId)
        .limit(page.fetch_limit())
        .all(db)
        .await?;
    let sort = query.sort;
    Ok(Page::from_rows(rows, page.limit, |row| {
        (sort.key(row), row.device_id)
    }))
}

pub async fn events(
    db: &DatabaseConnection,
    device_id: i32,
    page: &PageRequest,
) -> std::result::Result<Page<device_change_event::Model>, DbErr> {
    let mut select = device_change_event::Entity::find()
        .filter(device_change_event::Column::DeviceId.eq(device_id));
    if let Some(cursor) = &page.cursor {
        select = select.filter(after_cursor(
            device_change_event::Column::OccurredAt,
            device_change_event::Column::EventId,
            cursor,
        ));
    }
    let rows = select
        .order_by_desc(device_change_event::Column::OccurredAt)
        .order_by_desc(device_change_event::Column::EventId)
        .limit(page.fetch_limit())
        .all(db)
        .await?;
    Ok(Page::from_rows(rows, page.limit, |row| {
        (row.occurred_at, row.event_id)
    }))
}

pub async fn ips<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
) -> std::result::Result<Vec<device_ip::Model>, DbErr> {
    device_ip::Entity::find()
        .filter(device_ip::Column::DeviceId.eq(device_id))
        .order_by_desc(device_ip::Column::UpdatedAt)
        .order_by_desc(device_ip::Column::IpId)
        .all(db)
        .await
}

pub async fn macs<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
) -> std::result::Result<Vec<device_mac::Model>, DbErr> {
    device_mac::Entity::find()
        .filter(device_mac::Column::DeviceId.eq(device_id))
        .order_by_asc(device_mac::Column::Address)
        .all(db)
        .await
}

pub async fn interfaces<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
) -> std::result::Result<Vec<device_interface::Model>, DbErr> {
    device_interface::Entity::find()
        .filter(device_interface::Column::DeviceId.eq(device_id))
        .order_by_asc(device_interface::Column::IfIndex)
        .all(db)
        .await
}

pub async fn services<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
) -> std::result::Result<Vec<device_service::Model>, DbErr> {
    device_service::Entity::find()
        .filter(device_service::Column::DeviceId.eq(device_id))
        .order_by_asc(device_service::Column::Protocol)
        .order_by_asc(device_service::Column::Port)
        .all(db)
        .await
}

pub async fn snmp<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
) -> std::result::Result<Option<device_snmp::Model>, DbErr> {
    device_snmp::Entity::find_by_id(device_id).one(db).await
}

pub async fn links<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
) -> std::result::Result<Vec<device_link::Model>, DbErr> {
    device_link::Entity::find()
        .filter(
            Condition::any()
                .add(device_link::Column::DeviceAId.eq(device_id))
                .add(device_link::Column::DeviceBId.eq(device_id)),
        )
        .order_by_asc(device_link::Column::LinkKey)
        .all(db)
        .await
}

pub async fn name_candidates<C: ConnectionTrait>(
    db: &C,
    device_id: i32,
) -> std::result::Result<Vec<device_name_candidate::Model>, DbErr> {
    device_name_candidate::Entity::find()
        .filter(device_name_candidate::Column::DeviceId.eq(device_id))
        .order_by_desc(device_name_candidate::Column::ObservedAt)
        .order_by_asc(device_name_candidate::Column::CandidateId)
        .all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::db::facts::{record, Fact, IpFact};
    use netatlas_entity::prelude::*;

    async fn device_with_ip(db: &DatabaseConnection, address: &str, now: DateTime<Utc>) -> i32 {
        let device = insert_device(db, None, now).await.unwrap();
        let fact = Fact::Ip(IpFact {
            address: address.parse().unwrap(),
            prefix_len: None,
            source: "ping".to_string(),
        });
        record(db, device.device_id, &fact, now).await.unwrap();
        device.device_id
    }

    #[tokio::test]
    async fn first_name_candidate_wins() {
        let db = test_connection().await;
        let now = Utc::now();
        let device = insert_device(&db, None, now).await.unwrap();

        assert!(record_name_candidate(&db, device.device_id, "sw1", "snmp", None, now)
            .await
            .unwrap());
        assert!(
            !record_name_candidate(&db, device.device_id, "other", "dns", None, now)
                .await
                .unwrap()
        );
        // Re-observing an existing candidate does not duplicate it.
        record_name_candidate(&db, device.device_id, "sw1", "snmp", None, now)
            .await
            .unwrap();

        let device = Device::find_by_id(device.device_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(device.display_name.as_deref(), Some("sw1"));
        assert_eq!(name_candidates(&db, device.device_id).await.unwrap().len(), 2);
        let metadata_events = DeviceChangeEvent::find()
            .filter(device_change_event::Column::Kind.eq(METADATA_EVENT))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(metadata_events, 1);
    }

    #[tokio::test]
    async fn explicit_update_overwrites_and_emits_one_event() {
        let db = test_connection().await;
        let now = Utc::now();
        let device = insert_device(&db, Some("sw1".to_string()), now).await.unwrap();

        let update = MetadataUpdate {
            display_name: Some("core-switch".to_string()),
            owner: Some("netops".to_string()),
            ..Default::default()
        };
        let updated = update_metadata(&db, device.device_id, &update, now)
            .await
            .unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("core-switch"));
        assert_eq!(updated.owner.as_deref(), Some("netops"));

        let page = events(&db, device.device_id, &PageRequest::parse(None, None).unwrap())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].kind, METADATA_EVENT);
        assert_eq!(page.items[0].details["previous"]["display_name"], "sw1");

        // Same values again: nothing changes.
        update_metadata(&db, device.device_id, &update, now)
            .await
            .unwrap();
        assert_eq!(
            DeviceChangeEvent::find().count(&db).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn update_unknown_device_is_not_found() {
        let db = test_connection().await;
        let err = update_metadata(&db, 99, &MetadataUpdate::default(), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn explicit_create_records_a_creation_event() {
        let db = test_connection().await;
        let metadata = MetadataUpdate {
            display_name: Some("printer".to_string()),
            location: Some("  ".to_string()),
            ..Default::default()
        };
        let device = create(&db, &metadata, Utc::now()).await.unwrap();
        assert_eq!(device.display_name.as_deref(), Some("printer"));
        assert_eq!(device.location, None);

        let page = events(&db, device.device_id, &PageRequest::parse(None, None).unwrap())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].details["action"], "created");
        assert_eq!(page.items[0].details["changes"]["display_name"], "printer");
    }

    #[tokio::test]
    async fn fill_blank_never_overwrites() {
        let db = test_connection().await;
        let now = Utc::now();
        let mut device = insert_device(&db, None, now).await.unwrap();
        device = update_metadata(
            &db,
            device.device_id,
            &MetadataUpdate {
                owner: Some("netops".to_string()),
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();

        let filled = fill_blank_metadata(
            &db,
            device.clone(),
            &MetadataUpdate {
                owner: Some("tenant-b".to_string()),
                location: Some("dc1".to_string()),
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();
        assert_eq!(filled, vec!["location"]);
        let device = Device::find_by_id(device.device_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(device.owner.as_deref(), Some("netops"));
        assert_eq!(device.location.as_deref(), Some("dc1"));
    }

    #[tokio::test]
    async fn resolve_prefers_existing_address() {
        let db = test_connection().await;
        let now = Utc::now();
        let id = device_with_ip(&db, "10.0.1.10", now).await;

        let (found, created) = resolve_or_create(&db, "10.0.1.10", None, now).await.unwrap();
        assert_eq!(found.device_id, id);
        assert!(!created);

        let (other, created) = resolve_or_create(&db, "10.0.1.11", None, now).await.unwrap();
        assert_ne!(other.device_id, id);
        assert!(created);
        assert!(other.display_name.is_none());
    }

    #[tokio::test]
    async fn list_filters_by_address_substring_and_status() {
        let db = test_connection().await;
        let now = Utc::now();
        let recent = device_with_ip(&db, "10.0.1.10", now).await;
        let stale = device_with_ip(&db, "10.0.2.20", now).await;
        mark_seen(&db, stale, now - Duration::hours(2)).await.unwrap();

        let page = PageRequest::parse(None, None).unwrap();
        let query = DeviceQuery {
            q: Some("10.0.1".to_string()),
            ..Default::default()
        };
        let found = list(&db, &query, &page, now).await.unwrap();
        assert_eq!(found.items.iter().map(|d| d.device_id).collect::<Vec<_>>(), vec![recent]);

        let query = DeviceQuery {
            status: Some(DeviceStatus::Offline),
            ..Default::default()
        };
        let found = list(&db, &query, &page, now).await.unwrap();
        assert_eq!(found.items.iter().map(|d| d.device_id).collect::<Vec<_>>(), vec![stale]);
    }

    #[tokio::test]
    async fn list_pages_are_exhaustive_and_ordered() {
        let db = test_connection().await;
        let now = Utc::now();
        // Several devices share a timestamp so the id tiebreak matters.
        for i in 0..7 {
            let seen = now - Duration::seconds(i / 2);
            let device = insert_device(&db, None, now).await.unwrap();
            mark_seen(&db, device.device_id, seen).await.unwrap();
        }

        let query = DeviceQuery::default();
        let all = list(&db, &query, &PageRequest::parse(None, Some(500)).unwrap(), now)
            .await
            .unwrap();
        assert!(all.next_cursor.is_none());

        let mut collected = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let request = PageRequest::parse(cursor.as_deref(), Some(3)).unwrap();
            let page = list(&db, &query, &request, now).await.unwrap();
            collected.extend(page.items.iter().map(|d| d.device_id));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(
            collected,
            all.items.iter().map(|d| d.device_id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn unknown_sort_and_status_are_rejected() {
        assert_eq!(DeviceSort::parse(Some("name")).unwrap_err().code(), "invalid_sort");
        assert_eq!(DeviceSort::parse(None).unwrap(), DeviceSort::LastSeen);
        assert_eq!(
            DeviceStatus::parse(Some("asleep")).unwrap_err().code(),
            "invalid_status"
        );
        assert_eq!(DeviceStatus::parse(Some("all")).unwrap(), None);
    }
}
