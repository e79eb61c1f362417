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
                    .table(DeviceChangeEvent::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceChangeEvent::EventId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeviceChangeEvent::DeviceId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-device_change_event-device")
                            .from(DeviceChangeEvent::Table, DeviceChangeEvent::DeviceId)
                            .to(Device::Table, Device::DeviceId),
                    )
                    .col(
                        ColumnDef::new(DeviceChangeEvent::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeviceChangeEvent::Kind).string().not_null())
                    .col(ColumnDef::new(DeviceChangeEvent::Summary).string().not_null())
                    .col(ColumnDef::new(DeviceChangeEvent::Details).json().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-device_change_event-device-occurred")
                    .table(DeviceChangeEvent::Table)
                    .col(DeviceChangeEvent::DeviceId)
                    .col(DeviceChangeEvent::OccurredAt)
                    .col(DeviceChangeEvent::EventId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceChangeEvent::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DeviceChangeEvent {
    Table,
    EventId,
    DeviceId,
    OccurredAt,
    Kind,
    Summary,
    Details,
}
