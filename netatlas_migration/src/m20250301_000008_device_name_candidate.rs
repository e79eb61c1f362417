use sea_orm_migration::prelude::*;

use super::m20250301_000001_device::Device;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeviceNameCandidate::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceNameCandidate::CandidateId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeviceNameCandidate::DeviceId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-device_name_candidate-device")
                            .from(DeviceNameCandidate::Table, DeviceNameCandidate::DeviceId)
                            .to(Device::Table, Device::DeviceId),
                    )
                    .col(ColumnDef::new(DeviceNameCandidate::Name).string().not_null())
                    .col(ColumnDef::new(DeviceNameCandidate::Source).string().not_null())
                    .col(ColumnDef::new(DeviceNameCandidate::Address).string())
                    .col(
                        ColumnDef::new(DeviceNameCandidate::ObservedAt)
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
                    .name("idx-device_name_candidate-device-name-source")
                    .unique()
                    .table(DeviceNameCandidate::Table)
                    .col(DeviceNameCandidate::DeviceId)
                    .col(DeviceNameCandidate::Name)
                    .col(DeviceNameCandidate::Source)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceNameCandidate::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DeviceNameCandidate {
    Table,
    CandidateId,
    DeviceId,
    Name,
    Source,
    Address,
    ObservedAt,
}
