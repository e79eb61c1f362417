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
                    .table(DeviceService::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceService::ServiceId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeviceService::DeviceId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-device_service-device")
                            .from(DeviceService::Table, DeviceService::DeviceId)
                            .to(Device::Table, Device::DeviceId),
                    )
                    .col(ColumnDef::new(DeviceService::Protocol).string().not_null())
                    .col(ColumnDef::new(DeviceService::Port).integer().not_null())
                    .col(ColumnDef::new(DeviceService::Name).string())
                    .col(ColumnDef::new(DeviceService::State).string().not_null())
                    .col(ColumnDef::new(DeviceService::Source).string().not_null())
                    .col(
                        ColumnDef::new(DeviceService::ObservedAt)
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
                    .name("idx-device_service-device-protocol-port")
                    .unique()
                    .table(DeviceService::Table)
                    .col(DeviceService::DeviceId)
                    .col(DeviceService::Protocol)
                    .col(DeviceService::Port)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceService::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DeviceService {
    Table,
    ServiceId,
    DeviceId,
    Protocol,
    Port,
    Name,
    State,
    Source,
    ObservedAt,
}
