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
                    .table(DeviceInterface::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceInterface::InterfaceId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeviceInterface::DeviceId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-device_interface-device")
                            .from(DeviceInterface::Table, DeviceInterface::DeviceId)
                            .to(Device::Table, Device::DeviceId),
                    )
                    .col(ColumnDef::new(DeviceInterface::IfIndex).integer().not_null())
                    .col(ColumnDef::new(DeviceInterface::Descr).string())
                    .col(ColumnDef::new(DeviceInterface::Alias).string())
                    .col(ColumnDef::new(DeviceInterface::Mac).string())
                    .col(ColumnDef::new(DeviceInterface::AdminStatus).string())
                    .col(ColumnDef::new(DeviceInterface::OperStatus).string())
                    .col(ColumnDef::new(DeviceInterface::Mtu).integer())
                    .col(ColumnDef::new(DeviceInterface::Speed).big_integer())
                    .col(ColumnDef::new(DeviceInterface::Pvid).integer())
                    .col(ColumnDef::new(DeviceInterface::PvidObservedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(DeviceInterface::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeviceInterface::UpdatedAt)
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
                    .name("idx-device_interface-device-index")
                    .unique()
                    .table(DeviceInterface::Table)
                    .col(DeviceInterface::DeviceId)
                    .col(DeviceInterface::IfIndex)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-device_interface-pvid")
                    .table(DeviceInterface::Table)
                    .col(DeviceInterface::Pvid)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceInterface::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DeviceInterface {
    Table,
    InterfaceId,
    DeviceId,
    IfIndex,
    Descr,
    Alias,
    Mac,
    AdminStatus,
    OperStatus,
    Mtu,
    Speed,
    Pvid,
    PvidObservedAt,
    CreatedAt,
    UpdatedAt,
}
