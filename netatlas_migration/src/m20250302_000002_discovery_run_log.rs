use sea_orm_migration::prelude::*;

use super::m20250302_000001_discovery_run::DiscoveryRun;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DiscoveryRunLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DiscoveryRunLog::LogId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DiscoveryRunLog::RunId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-discovery_run_log-run")
                            .from(DiscoveryRunLog::Table, DiscoveryRunLog::RunId)
                            .to(DiscoveryRun::Table, DiscoveryRun::RunId),
                    )
                    .col(ColumnDef::new(DiscoveryRunLog::Level).string_len(8).not_null())
                    .col(ColumnDef::new(DiscoveryRunLog::Message).text().not_null())
                    .col(
                        ColumnDef::new(DiscoveryRunLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-discovery_run_log-run")
                    .table(DiscoveryRunLog::Table)
                    .col(DiscoveryRunLog::RunId)
                    .col(DiscoveryRunLog::LogId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DiscoveryRunLog::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum DiscoveryRunLog {
    Table,
    LogId,
    RunId,
    Level,
    Message,
    CreatedAt,
}
