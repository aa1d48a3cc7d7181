//! Testbench configuration
//!
//! The addresses of both ends of the test network are given as flags or
//! `PACKETIMPACT_*` environment variables. The local hardware address and
//! IPv6 address are derived from the device holding the local IPv4 address.

use clap::Parser;
use packetimpact_capture::netdevs::{find_device_by_ip, list_devices, mac_to_ip, DeviceInfo};
use packetimpact_core::{Error, Result};
use packetimpact_packet::MacAddress;
use std::collections::HashMap;
use std::ffi::OsString;
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::info;

#[derive(Parser, Debug, Clone)]
#[command(name = "packetimpact")]
#[command(version, about = "Conformance test harness driving a remote network stack", long_about = None)]
pub struct Flags {
    /// Local IPv4 address for test packets
    #[arg(long, env = "PACKETIMPACT_LOCAL_IPV4", value_name = "ADDR")]
    pub local_ipv4: Ipv4Addr,

    /// Remote IPv4 address for test packets
    #[arg(long, env = "PACKETIMPACT_REMOTE_IPV4", value_name = "ADDR")]
    pub remote_ipv4: Ipv4Addr,

    /// Remote IPv6 address for test packets
    #[arg(long, env = "PACKETIMPACT_REMOTE_IPV6", value_name = "ADDR")]
    pub remote_ipv6: Ipv6Addr,

    /// Remote MAC address for test packets
    #[arg(long, env = "PACKETIMPACT_REMOTE_MAC", value_name = "MAC")]
    pub remote_mac: MacAddress,

    /// Device to inject and sniff on (defaults to the one holding --local-ipv4)
    #[arg(long, env = "PACKETIMPACT_DEVICE", value_name = "NAME")]
    pub device: Option<String>,
}

impl Flags {
    /// Read the flags from the environment only, ignoring the process
    /// arguments that belong to the test runner.
    pub fn from_env() -> Result<Self> {
        Self::parse_from_args(["packetimpact"])
    }

    pub fn parse_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).map_err(|e| Error::setup(e.to_string()))
    }
}

/// Both ends of the test network, fully resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Device frames are injected on and sniffed from
    pub device: String,
    pub local_mac: MacAddress,
    pub remote_mac: MacAddress,
    pub local_ipv4: Ipv4Addr,
    pub remote_ipv4: Ipv4Addr,
    pub local_ipv6: Ipv6Addr,
    pub remote_ipv6: Ipv6Addr,
}

impl Endpoints {
    /// Resolve the flags against the devices configured on this host
    pub fn resolve(flags: &Flags) -> Result<Self> {
        let devices = list_devices()?;
        Self::from_devices(flags, &devices)
    }

    /// Resolve the flags against already parsed device information
    pub fn from_devices(flags: &Flags, devices: &HashMap<String, DeviceInfo>) -> Result<Self> {
        let (name, info) = find_device_by_ip(flags.local_ipv4, devices)?;
        let local_mac = info
            .mac
            .ok_or_else(|| Error::setup(format!("device {} has no hardware address", name)))?;
        let local_ipv6 = info.ipv6_addr().unwrap_or_else(|| mac_to_ip(local_mac));

        let endpoints = Endpoints {
            device: flags.device.clone().unwrap_or_else(|| name.to_string()),
            local_mac,
            remote_mac: flags.remote_mac,
            local_ipv4: flags.local_ipv4,
            remote_ipv4: flags.remote_ipv4,
            local_ipv6,
            remote_ipv6: flags.remote_ipv6,
        };
        info!(
            "Testing {} ({}) from {} ({}) on {}",
            endpoints.remote_ipv4,
            endpoints.remote_mac,
            endpoints.local_ipv4,
            endpoints.local_mac,
            endpoints.device
        );
        Ok(endpoints)
    }

    /// Read the flags from the environment and resolve them
    pub fn from_env() -> Result<Self> {
        Self::resolve(&Flags::from_env()?)
    }
}
