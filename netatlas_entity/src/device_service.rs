use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "device_service")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub service_id: i32,
    pub device_id: i32,
    pub protocol: String,
    pub port: i32,
    pub name: Option<String>,
    pub state: String,
    pub source: String,
    pub observed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
