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
                    .table(DeviceLink::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceLink::LinkId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeviceLink::LinkKey).string().not_null())
                    .col(ColumnDef::new(DeviceLink::DeviceAId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-device_link-device-a")
                            .from(DeviceLink::Table, DeviceLink::DeviceAId)
                            .to(Device::Table, Device::DeviceId),
                    )
                    .col(ColumnDef::new(DeviceLink::PortA).string())
                    .col(ColumnDef::new(DeviceLink::DeviceBId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-device_link-device-b")
                            .from(DeviceLink::Table, DeviceLink::DeviceBId)
                            .to(Device::Table, Device::DeviceId),
                    )
                    .col(ColumnDef::new(DeviceLink::PortB).string())
                    .col(ColumnDef::new(DeviceLink::Source).string().not_null())
                    .col(ColumnDef::new(DeviceLink::LinkType).string())
                    .col(
                        ColumnDef::new(DeviceLink::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeviceLink::LastObservedAt)
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
                    .name("idx-device_link-key")
                    .unique()
                    .table(DeviceLink::Table)
                    .col(DeviceLink::LinkKey)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceLink::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DeviceLink {
    Table,
    LinkId,
    LinkKey,
    DeviceAId,
    PortA,
    DeviceBId,
    PortB,
    Source,
    LinkType,
    CreatedAt,
    LastObservedAt,
}
