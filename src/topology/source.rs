// Read-only query surface the projection engine runs against.

use std::collections::BTreeSet;
use std::net::IpAddr;

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use sea_orm::*;

use netatlas_entity::{device, device_interface, device_ip, device_link, device_service};

use crate::db::devices;

/// Devices belonging to a region, with the size of the full membership.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Members {
    pub devices: Vec<device::Model>,
    pub total: usize,
}

#[async_trait]
pub trait TopologySource: Send + Sync {
    async fn device(&self, device_id: i32) -> Result<Option<device::Model>, DbErr>;

    async fn device_ips(&self, device_id: i32) -> Result<Vec<device_ip::Model>, DbErr>;

    async fn device_pvids(&self, device_id: i32) -> Result<Vec<i32>, DbErr>;

    /// Devices with at least one address inside `subnet`, lowest id first.
    async fn subnet_members(
        &self,
        subnet: IpNetwork,
        exclude: Option<i32>,
        limit: usize,
    ) -> Result<Members, DbErr>;

    /// Devices with a port whose PVID is `vlan`, lowest id first.
    async fn vlan_members(
        &self,
        vlan: u16,
        exclude: Option<i32>,
        limit: usize,
    ) -> Result<Members, DbErr>;

    async fn device_links(&self, device_id: i32) -> Result<Vec<device_link::Model>, DbErr>;

    async fn device_services(&self, device_id: i32) -> Result<Vec<device_service::Model>, DbErr>;

    async fn devices_by_id(&self, ids: &[i32]) -> Result<Vec<device::Model>, DbErr>;
}

pub struct StoreSource<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> StoreSource<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        StoreSource { db }
    }

    async fn members(&self, ids: BTreeSet<i32>, limit: usize) -> Result<Members, DbErr> {
        let total = ids.len();
        let wanted: Vec<i32> = ids.into_iter().take(limit).collect();
        Ok(Members {
            devices: self.devices_by_id(&wanted).await?,
            total,
        })
    }
}

// Dotted prefix shared by every IPv4 address in the network, for a LIKE pre-filter.
fn v4_text_prefix(subnet: &IpNetwork) -> Option<String> {
    match subnet {
        IpNetwork::V4(net) if net.prefix() >= 8 => {
            let octets = net.network().octets();
            let whole = (net.prefix() / 8) as usize;
            let mut prefix: String = octets[..whole]
                .iter()
                .map(|o| format!("{}.", o))
                .collect();
            if whole == 4 {
                prefix.pop();
            }
            Some(prefix)
        }
        _ => None,
    }
}

#[async_trait]
impl<'a> TopologySource for StoreSource<'a> {
    async fn device(&self, device_id: i32) -> Result<Option<device::Model>, DbErr> {
        device::Entity::find_by_id(device_id).one(self.db).await
    }

    async fn device_ips(&self, device_id: i32) -> Result<Vec<device_ip::Model>, DbErr> {
        devices::ips(self.db, device_id).await
    }

    async fn device_pvids(&self, device_id: i32) -> Result<Vec<i32>, DbErr> {
        let rows = device_interface::Entity::find()
            .filter(device_interface::Column::DeviceId.eq(device_id))
            .filter(device_interface::Column::Pvid.is_not_null())
            .all(self.db)
            .await?;
        Ok(rows.into_iter().filter_map(|row| row.pvid).collect())
    }

    async fn subnet_members(
        &self,
        subnet: IpNetwork,
        exclude: Option<i32>,
        limit: usize,
    ) -> Result<Members, DbErr> {
        let mut select = device_ip::Entity::find();
        if let Some(prefix) = v4_text_prefix(&subnet) {
            select = select.filter(device_ip::Column::Address.starts_with(prefix.as_str()));
        }
        if let Some(exclude) = exclude {
            select = select.filter(device_ip::Column::DeviceId.ne(exclude));
        }
        let ids: BTreeSet<i32> = select
            .all(self.db)
            .await?
            .into_iter()
            .filter(|row| {
                row.address
                    .split('/')
                    .next()
                    .and_then(|a| a.parse::<IpAddr>().ok())
                    .map_or(false, |a| subnet.contains(a))
            })
            .map(|row| row.device_id)
            .collect();
        self.members(ids, limit).await
    }

    async fn vlan_members(
        &self,
        vlan: u16,
        exclude: Option<i32>,
        limit: usize,
    ) -> Result<Members, DbErr> {
        let mut select = device_interface::Entity::find()
            .filter(device_interface::Column::Pvid.eq(i32::from(vlan)));
        if let Some(exclude) = exclude {
            select = select.filter(device_interface::Column::DeviceId.ne(exclude));
        }
        let ids: BTreeSet<i32> = select
            .all(self.db)
            .await?
            .into_iter()
            .map(|row| row.device_id)
            .collect();
        self.members(ids, limit).await
    }

    async fn device_links(&self, device_id: i32) -> Result<Vec<device_link::Model>, DbErr> {
        devices::links(self.db, device_id).await
    }

    async fn device_services(&self, device_id: i32) -> Result<Vec<device_service::Model>, DbErr> {
        devices::services(self.db, device_id).await
    }

    async fn devices_by_id(&self, ids: &[i32]) -> Result<Vec<device::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        device::Entity::find()
            .filter(device::Column::DeviceId.is_in(ids.iter().copied()))
            .order_by_asc(device::Column::DeviceId)
            .all(self.db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_prefix_covers_whole_octets() {
        let net: IpNetwork = "10.0.1.0/24".parse().unwrap();
        assert_eq!(v4_text_prefix(&net).as_deref(), Some("10.0.1."));
        let net: IpNetwork = "10.0.0.0/12".parse().unwrap();
        assert_eq!(v4_text_prefix(&net).as_deref(), Some("10."));
        let net: IpNetwork = "10.0.1.9/32".parse().unwrap();
        assert_eq!(v4_text_prefix(&net).as_deref(), Some("10.0.1.9"));
        let net: IpNetwork = "0.0.0.0/0".parse().unwrap();
        assert_eq!(v4_text_prefix(&net), None);
    }
}
