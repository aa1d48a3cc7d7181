//! Device and address discovery from `ip addr show` output

use ipnetwork::{Ipv4Network, Ipv6Network};
use packetimpact_core::{Error, Result};
use packetimpact_packet::MacAddress;
use regex::Regex;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::process::Command;
use tracing::debug;

/// Addresses configured on one network device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Hardware address
    pub mac: Option<MacAddress>,
    /// IPv4 address with its prefix length
    pub ipv4: Option<Ipv4Network>,
    /// IPv6 address with its prefix length
    pub ipv6: Option<Ipv6Network>,
}

impl DeviceInfo {
    pub fn ipv4_addr(&self) -> Option<Ipv4Addr> {
        self.ipv4.map(|net| net.ip())
    }

    pub fn ipv6_addr(&self) -> Option<Ipv6Addr> {
        self.ipv6.map(|net| net.ip())
    }
}

struct LinePatterns {
    device: Regex,
    link: Regex,
    inet: Regex,
    inet6: Regex,
}

impl LinePatterns {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::setup(format!("bad pattern {}: {}", pattern, e)))
        };
        Ok(LinePatterns {
            device: compile(r"^\s*\d+: (\w+)")?,
            link: compile(r"^\s*link/\w+ ([0-9a-fA-F:]+)")?,
            inet: compile(r"^\s*inet ([0-9./]+)")?,
            inet6: compile(r"^\s*inet6 ([0-9a-fA-Z:/]+)")?,
        })
    }
}

fn capture<'a>(pattern: &Regex, line: &'a str) -> Option<&'a str> {
    pattern
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Parse the output of `ip addr show` into a map from device name to the
/// addresses configured on it.
///
/// When a device lists several addresses of one family the last one wins.
pub fn parse_devices(output: &str) -> Result<HashMap<String, DeviceInfo>> {
    let patterns = LinePatterns::new()?;
    let mut devices = HashMap::new();
    let mut current: Option<(String, DeviceInfo)> = None;

    for line in output.lines() {
        if let Some(name) = capture(&patterns.device, line) {
            if let Some((name, info)) = current.take() {
                devices.insert(name, info);
            }
            current = Some((name.to_string(), DeviceInfo::default()));
            continue;
        }

        // Address lines before the first device line belong to nothing
        let Some((_, info)) = current.as_mut() else {
            continue;
        };

        if let Some(mac) = capture(&patterns.link, line) {
            info.mac = Some(mac.parse()?);
        } else if let Some(cidr) = capture(&patterns.inet, line) {
            let net = cidr
                .parse::<Ipv4Network>()
                .map_err(|e| Error::setup(format!("invalid IPv4 address {}: {}", cidr, e)))?;
            info.ipv4 = Some(net);
        } else if let Some(cidr) = capture(&patterns.inet6, line) {
            let net = cidr
                .parse::<Ipv6Network>()
                .map_err(|e| Error::setup(format!("invalid IPv6 address {}: {}", cidr, e)))?;
            info.ipv6 = Some(net);
        }
    }

    if let Some((name, info)) = current {
        devices.insert(name, info);
    }
    Ok(devices)
}

/// The IPv6 link-local address derived from a hardware address, as in
/// RFC 4291 appendix A without inverting the universal/local bit.
pub fn mac_to_ip(mac: MacAddress) -> Ipv6Addr {
    let m = mac.as_bytes();
    Ipv6Addr::from([
        0xfe, 0x80, 0, 0, 0, 0, 0, 0, m[0], m[1], m[2], 0xff, 0xfe, m[3], m[4], m[5],
    ])
}

/// Find the device whose IPv4 address is `ip`
pub fn find_device_by_ip<'a>(
    ip: Ipv4Addr,
    devices: &'a HashMap<String, DeviceInfo>,
) -> Result<(&'a str, &'a DeviceInfo)> {
    devices
        .iter()
        .find(|(_, info)| info.ipv4_addr() == Some(ip))
        .map(|(name, info)| (name.as_str(), info))
        .ok_or_else(|| Error::setup(format!("can't find {} on any interface", ip)))
}

/// Run `ip addr show` and parse its output
pub fn list_devices() -> Result<HashMap<String, DeviceInfo>> {
    let output = Command::new("ip")
        .args(["addr", "show"])
        .output()
        .map_err(|e| Error::setup(format!("failed to run ip addr show: {}", e)))?;
    if !output.status.success() {
        return Err(Error::setup(format!(
            "ip addr show failed with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let devices = parse_devices(&String::from_utf8_lossy(&output.stdout))?;
    debug!("discovered {} network devices", devices.len());
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP_ADDR_SHOW: &str = "\
1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN group default qlen 1000
    link/loopback 00:00:00:00:00:00 brd 00:00:00:00:00:00
    inet 127.0.0.1/8 scope host lo
       valid_lft forever preferred_lft forever
    inet6 ::1/128 scope host
       valid_lft forever preferred_lft forever
2: eth0@if5: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue state UP group default
    link/ether 02:42:c0:a8:00:02 brd ff:ff:ff:ff:ff:ff link-netnsid 0
    inet 192.168.0.2/24 brd 192.168.0.255 scope global eth0
       valid_lft forever preferred_lft forever
    inet6 fe80::42:c0ff:fea8:2/64 scope link
       valid_lft forever preferred_lft forever
3: tun0: <POINTOPOINT,NOARP> mtu 1500 qdisc noop state DOWN group default qlen 500
    link/none
";

    #[test]
    fn test_parse_devices() {
        let devices = parse_devices(IP_ADDR_SHOW).unwrap();
        assert_eq!(devices.len(), 3);

        let eth0 = &devices["eth0"];
        assert_eq!(eth0.mac, Some(MacAddress::new([0x02, 0x42, 0xc0, 0xa8, 0x00, 0x02])));
        assert_eq!(eth0.ipv4_addr(), Some(Ipv4Addr::new(192, 168, 0, 2)));
        assert_eq!(eth0.ipv4.map(|net| net.prefix()), Some(24));
        assert_eq!(eth0.ipv6_addr(), Some("fe80::42:c0ff:fea8:2".parse().unwrap()));

        let lo = &devices["lo"];
        assert_eq!(lo.mac, Some(MacAddress::ZERO));
        assert_eq!(lo.ipv6_addr(), Some(Ipv6Addr::LOCALHOST));

        assert_eq!(devices["tun0"], DeviceInfo::default());
    }

    #[test]
    fn test_parse_devices_rejects_bad_address() {
        let output = "1: eth0: <UP>\n    inet 192.168.0.300/24 scope global eth0\n";
        assert!(parse_devices(output).is_err());
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_devices("").unwrap().is_empty());
    }

    #[test]
    fn test_mac_to_ip() {
        let mac = MacAddress::new([0x02, 0x42, 0xc0, 0xa8, 0x00, 0x02]);
        let expected: Ipv6Addr = "fe80::242:c0ff:fea8:2".parse().unwrap();
        assert_eq!(mac_to_ip(mac), expected);
    }

    #[test]
    fn test_find_device_by_ip() {
        let devices = parse_devices(IP_ADDR_SHOW).unwrap();

        let (name, info) = find_device_by_ip(Ipv4Addr::new(192, 168, 0, 2), &devices).unwrap();
        assert_eq!(name, "eth0");
        assert!(info.mac.is_some());

        let err = find_device_by_ip(Ipv4Addr::new(10, 0, 0, 1), &devices).unwrap_err();
        assert!(matches!(err, Error::Setup(_)));
    }
}
