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
                    .table(DeviceIp::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceIp::IpId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeviceIp::DeviceId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-device_ip-device")
                            .from(DeviceIp::Table, DeviceIp::DeviceId)
                            .to(Device::Table, Device::DeviceId),
                    )
                    .col(ColumnDef::new(DeviceIp::InterfaceId).integer())
                    .col(ColumnDef::new(DeviceIp::Address).string().not_null())
                    .col(ColumnDef::new(DeviceIp::PrefixLen).integer())
                    .col(ColumnDef::new(DeviceIp::Source).string().not_null())
                    .col(
                        ColumnDef::new(DeviceIp::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeviceIp::UpdatedAt)
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
                    .name("idx-device_ip-device-address")
                    .unique()
                    .table(DeviceIp::Table)
                    .col(DeviceIp::DeviceId)
                    .col(DeviceIp::Address)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-device_ip-address")
                    .table(DeviceIp::Table)
                    .col(DeviceIp::Address)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceIp::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DeviceIp {
    Table,
    IpId,
    DeviceId,
    InterfaceId,
    Address,
    PrefixLen,
    Source,
    CreatedAt,
    UpdatedAt,
}
