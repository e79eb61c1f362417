use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "discovery_run_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub log_id: i32,
    pub run_id: i32,
    pub level: String,
    pub message: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::discovery_run::Entity",
        from = "Column::RunId",
        to = "super::discovery_run::Column::RunId"
    )]
    DiscoveryRun,
}

impl Related<super::discovery_run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DiscoveryRun.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
