use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DiscoveryRun::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DiscoveryRun::RunId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DiscoveryRun::Status).string_len(16).not_null())
                    .col(ColumnDef::new(DiscoveryRun::Scope).string().not_null())
                    .col(ColumnDef::new(DiscoveryRun::Preset).string().not_null())
                    .col(ColumnDef::new(DiscoveryRun::Tags).json().not_null())
                    .col(ColumnDef::new(DiscoveryRun::Stats).json().not_null())
                    .col(
                        ColumnDef::new(DiscoveryRun::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DiscoveryRun::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(DiscoveryRun::CompletedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(DiscoveryRun::LastError).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-discovery_run-status-created")
                    .table(DiscoveryRun::Table)
                    .col(DiscoveryRun::Status)
                    .col(DiscoveryRun::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DiscoveryRun::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub(crate) enum DiscoveryRun {
    Table,
    RunId,
    Status,
    Scope,
    Preset,
    Tags,
    Stats,
    CreatedAt,
    StartedAt,
    CompletedAt,
    LastError,
}
