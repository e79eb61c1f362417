use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "device_link")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub link_id: i32,
    #[sea_orm(unique)]
    pub link_key: String,
    pub device_a_id: i32,
    pub port_a: Option<String>,
    pub device_b_id: i32,
    pub port_b: Option<String>,
    /// One of `manual`, `lldp`, `cdp`.
    pub source: String,
    pub link_type: Option<String>,
    pub created_at: DateTimeUtc,
    pub last_observed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
