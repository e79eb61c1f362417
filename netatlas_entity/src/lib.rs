pub mod prelude;

pub mod device;
pub mod device_change_event;
pub mod device_interface;
pub mod device_ip;
pub mod device_link;
pub mod device_mac;
pub mod device_name_candidate;
pub mod device_service;
pub mod device_snmp;
pub mod discovery_run;
pub mod discovery_run_log;
