use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "device_interface")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub interface_id: i32,
    pub device_id: i32,
    pub if_index: i32,
    pub descr: Option<String>,
    pub alias: Option<String>,
    pub mac: Option<String>,
    pub admin_status: Option<String>,
    pub oper_status: Option<String>,
    pub mtu: Option<i32>,
    pub speed: Option<i64>,
    pub pvid: Option<i32>,
    pub pvid_observed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
