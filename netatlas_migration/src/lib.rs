pub use sea_orm_migration::prelude::*;

mod m20250301_000001_device;
mod m20250301_000002_device_ip;
mod m20250301_000003_device_mac;
mod m20250301_000004_device_interface;
mod m20250301_000005_device_service;
mod m20250301_000006_device_snmp;
mod m20250301_000007_device_link;
mod m20250301_000008_device_name_candidate;
mod m20250301_000009_device_change_event;
mod m20250302_000001_discovery_run;
mod m20250302_000002_discovery_run_log;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_device::Migration),
            Box::new(m20250301_000002_device_ip::Migration),
            Box::new(m20250301_000003_device_mac::Migration),
            Box::new(m20250301_000004_device_interface::Migration),
            Box::new(m20250301_000005_device_service::Migration),
            Box::new(m20250301_000006_device_snmp::Migration),
            Box::new(m20250301_000007_device_link::Migration),
            Box::new(m20250301_000008_device_name_candidate::Migration),
            Box::new(m20250301_000009_device_change_event::Migration),
            Box::new(m20250302_000001_discovery_run::Migration),
            Box::new(m20250302_000002_discovery_run_log::Migration),
        ]
    }
}
