use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "device")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub device_id: i32,
    pub display_name: Option<String>,
    pub owner: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub last_seen_at: DateTimeUtc,
    pub last_changed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::device_ip::Entity")]
    DeviceIp,
    #[sea_orm(has_many = "super::device_mac::Entity")]
    DeviceMac,
    #[sea_orm(has_many = "super::device_change_event::Entity")]
    DeviceChangeEvent,
}

impl Related<super::device_ip::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeviceIp.def()
    }
}

impl Related<super::device_mac::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeviceMac.def()
    }
}

impl Related<super::device_change_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeviceChangeEvent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
