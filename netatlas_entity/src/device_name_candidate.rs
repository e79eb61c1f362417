use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "device_name_candidate")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub candidate_id: i32,
    pub device_id: i32,
    pub name: String,
    pub source: String,
    pub address: Option<String>,
    pub observed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
