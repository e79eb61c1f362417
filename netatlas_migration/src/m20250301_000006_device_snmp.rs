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
                    .table(DeviceSnmp::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceSnmp::DeviceId)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-device_snmp-device")
                            .from(DeviceSnmp::Table, DeviceSnmp::DeviceId)
                            .to(Device::Table, Device::DeviceId),
                    )
                    .col(ColumnDef::new(DeviceSnmp::Address).string())
                    .col(ColumnDef::new(DeviceSnmp::Version).string())
                    .col(ColumnDef::new(DeviceSnmp::SysName).string())
                    .col(ColumnDef::new(DeviceSnmp::SysDescr).text())
                    .col(ColumnDef::new(DeviceSnmp::SysObjectId).string())
                    .col(ColumnDef::new(DeviceSnmp::SysContact).string())
                    .col(ColumnDef::new(DeviceSnmp::SysLocation).string())
                    .col(ColumnDef::new(DeviceSnmp::LastError).text())
                    .col(ColumnDef::new(DeviceSnmp::LastSuccessAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(DeviceSnmp::UpdatedAt)
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
                    .name("idx-device_snmp-sys-name")
                    .table(DeviceSnmp::Table)
                    .col(DeviceSnmp::SysName)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceSnmp::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DeviceSnmp {
    Table,
    DeviceId,
    Address,
    Version,
    SysName,
    SysDescr,
    SysObjectId,
    SysContact,
    SysLocation,
    LastError,
    LastSuccessAt,
    UpdatedAt,
}
