//! Network interface enumeration and information

use ipnetwork::IpNetwork;
use packetimpact_core::{Error, Result};
use packetimpact_packet::MacAddress;
use pnet_datalink::{self, NetworkInterface};

/// Information about a network interface
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    /// Interface name (e.g., "eth0", "wlan0")
    pub name: String,
    /// Interface index
    pub index: u32,
    /// MAC address if available
    pub mac: Option<MacAddress>,
    /// Addresses assigned to this interface, with their networks
    pub ips: Vec<IpNetwork>,
    /// Whether the interface is up
    pub is_up: bool,
    /// Whether the interface is a loopback
    pub is_loopback: bool,
}

impl From<&NetworkInterface> for InterfaceInfo {
    fn from(iface: &NetworkInterface) -> Self {
        InterfaceInfo {
            name: iface.name.clone(),
            index: iface.index,
            mac: iface
                .mac
                .map(|mac| MacAddress::new([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5])),
            ips: iface.ips.clone(),
            is_up: iface.is_up(),
            is_loopback: iface.is_loopback(),
        }
    }
}

/// List all available network interfaces
pub fn list_interfaces() -> Result<Vec<InterfaceInfo>> {
    let interfaces = pnet_datalink::interfaces();

    if interfaces.is_empty() {
        return Err(Error::Capture(
            "No network interfaces found. Are you running with sufficient privileges?".to_string(),
        ));
    }

    Ok(interfaces.iter().map(InterfaceInfo::from).collect())
}

/// Get information about a specific interface by name
pub fn get_interface(name: &str) -> Result<InterfaceInfo> {
    find_interface(name).map(|iface| InterfaceInfo::from(&iface))
}

/// The pnet handle for the interface called `name`
pub(crate) fn find_interface(name: &str) -> Result<NetworkInterface> {
    pnet_datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_interface() {
        let interfaces = list_interfaces().unwrap();

        // Should have at least one loopback interface
        let loopback = interfaces.iter().find(|iface| iface.is_loopback);
        assert!(loopback.is_some());
    }

    #[test]
    fn test_get_interface_by_name() {
        let interfaces = list_interfaces().unwrap();
        let first = &interfaces[0];

        let found = get_interface(&first.name).unwrap();
        assert_eq!(found.name, first.name);
        assert_eq!(found.index, first.index);
    }

    #[test]
    fn test_get_nonexistent_interface() {
        let result = get_interface("nonexistent_interface_xyz");
        match result {
            Err(Error::InterfaceNotFound(name)) => assert_eq!(name, "nonexistent_interface_xyz"),
            _ => panic!("Expected InterfaceNotFound error"),
        }
    }
}
