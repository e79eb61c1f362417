pub use super::device::Entity as Device;
pub use super::device_change_event::Entity as DeviceChangeEvent;
pub use super::device_interface::Entity as DeviceInterface;
pub use super::device_ip::Entity as DeviceIp;
pub use super::device_link::Entity as DeviceLink;
pub use super::device_mac::Entity as DeviceMac;
pub use super::device_name_candidate::Entity as DeviceNameCandidate;
pub use super::device_service::Entity as DeviceService;
pub use super::device_snmp::Entity as DeviceSnmp;
pub use super::discovery_run::Entity as DiscoveryRun;
pub use super::discovery_run_log::Entity as DiscoveryRunLog;
