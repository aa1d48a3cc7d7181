//! Example: List all network interfaces and their addresses
//!
//! Run with: cargo run --example list_interfaces

use packetimpact_capture::{list_devices, list_interfaces, mac_to_ip};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== All Network Interfaces ===\n");

    for iface in &list_interfaces()? {
        println!("Interface: {} (index {})", iface.name, iface.index);

        if let Some(mac) = iface.mac {
            println!("  MAC Address: {}", mac);
            println!("  Link-local: {}", mac_to_ip(mac));
        }

        println!("  IP Addresses:");
        for ip in &iface.ips {
            println!("    - {}", ip);
        }

        println!("  Up: {}, Loopback: {}", iface.is_up, iface.is_loopback);
        println!();
    }

    println!("=== ip addr show ===\n");

    let mut devices: Vec<_> = list_devices()?.into_iter().collect();
    devices.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, info) in devices {
        println!("{}: mac={:?} ipv4={:?} ipv6={:?}", name, info.mac, info.ipv4, info.ipv6);
    }

    Ok(())
}
