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
                    .table(DeviceMac::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceMac::MacId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeviceMac::DeviceId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-device_mac-device")
                            .from(DeviceMac::Table, DeviceMac::DeviceId)
                            .to(Device::Table, Device::DeviceId),
                    )
                    .col(ColumnDef::new(DeviceMac::InterfaceId).integer())
                    .col(ColumnDef::new(DeviceMac::Address).string().not_null())
                    .col(ColumnDef::new(DeviceMac::Vendor).string())
                    .col(
                        ColumnDef::new(DeviceMac::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeviceMac::UpdatedAt)
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
                    .name("idx-device_mac-device-address")
                    .unique()
                    .table(DeviceMac::Table)
                    .col(DeviceMac::DeviceId)
                    .col(DeviceMac::Address)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceMac::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DeviceMac {
    Table,
    MacId,
    DeviceId,
    InterfaceId,
    Address,
    Vendor,
    CreatedAt,
    UpdatedAt,
}
