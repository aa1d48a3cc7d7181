//! BPF (Berkeley Packet Filter) expressions for narrowing a sniffer to one peer

use packetimpact_packet::MacAddress;

/// Frames sent by the given hardware address
pub fn src_mac_filter(mac: MacAddress) -> String {
    format!("ether src {}", mac)
}

/// Frames addressed to the given hardware address
pub fn dst_mac_filter(mac: MacAddress) -> String {
    format!("ether dst {}", mac)
}

/// Traffic from `remote` to `local` at the link layer, the only frames a
/// connection to one peer can ever match
pub fn peer_filter(remote: MacAddress, local: MacAddress) -> String {
    combine_filters(&[&src_mac_filter(remote), &dst_mac_filter(local)])
}

/// Combine multiple filters with AND logic
pub fn combine_filters(filters: &[&str]) -> String {
    if filters.is_empty() {
        return String::new();
    }

    filters
        .iter()
        .map(|f| format!("({})", f))
        .collect::<Vec<_>>()
        .join(" and ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: MacAddress = MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

    #[test]
    fn test_mac_filters() {
        assert_eq!(src_mac_filter(MAC), "ether src aa:bb:cc:dd:ee:ff");
        assert_eq!(dst_mac_filter(MAC), "ether dst aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_peer_filter() {
        let local = MacAddress::new([0x02, 0, 0, 0, 0, 1]);
        assert_eq!(
            peer_filter(MAC, local),
            "(ether src aa:bb:cc:dd:ee:ff) and (ether dst 02:00:00:00:00:01)"
        );
    }

    #[test]
    fn test_combine_filters() {
        assert_eq!(combine_filters(&["ether src aa:bb:cc:dd:ee:ff"]), "(ether src aa:bb:cc:dd:ee:ff)");

        let empty: Vec<&str> = vec![];
        assert_eq!(combine_filters(&empty), "");
    }
}
