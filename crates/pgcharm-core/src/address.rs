//! Subscriber address ranges.
//!
//! Address ranges end up in `pg_hba.conf` style allow-lists, so every entry is
//! either a CIDR network or, when the hint is not an address at all, a hostname.

use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::relation::UnitData;

/// Converts an address hint into a network range.
///
/// - CIDR ranges pass through
/// - bare IPv4/IPv6 addresses get an exact-host mask (`/32`, `/128`)
/// - anything else is treated as a hostname and returned unchanged
pub fn range_of(hint: &str) -> String {
    let trimmed = hint.trim();
    match trimmed.parse::<IpAddr>() {
        Ok(addr) => IpNetwork::from(addr).to_string(),
        Err(_) => hint.to_string(),
    }
}

/// Returns the incoming address ranges advertised by a subscriber unit.
///
/// Hints are consulted in decreasing precision: `egress-subnets` (already a
/// comma separated list of ranges), then `ingress-address`, then
/// `private-address`. Order is preserved so repeated calls never reshuffle
/// the allow-list.
pub fn incoming_addresses(data: &UnitData) -> Vec<String> {
    if let Some(subnets) = &data.egress_subnets {
        return subnets
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(addr) = &data.ingress_address {
        return vec![range_of(addr)];
    }
    if let Some(addr) = &data.private_address {
        return vec![range_of(addr)];
    }
    tracing::debug!("No address hints in relation data");
    Vec::new()
}

/// Joins ranges into the comma separated form published to subscribers.
pub fn join_ranges<S: AsRef<str>>(ranges: &[S]) -> String {
    ranges
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_of_host_address() {
        assert_eq!(range_of("10.216.12.86"), "10.216.12.86/32");
        assert_eq!(range_of("2001:db8::f00f"), "2001:db8::f00f/128");
    }

    #[test]
    fn test_range_of_network_passes_through() {
        assert_eq!(range_of("192.168.1.0/24"), "192.168.1.0/24");
        assert_eq!(range_of("2001:db8::/64"), "2001:db8::/64");
        assert_eq!(range_of("2001:DB8::/64"), "2001:DB8::/64");
    }

    #[test]
    fn test_range_of_hostname() {
        assert_eq!(range_of("db.example.com"), "db.example.com");
        assert_eq!(range_of("not an address"), "not an address");
        assert_eq!(range_of(" db.example.com "), " db.example.com ");
    }

    #[test]
    fn test_egress_subnets_win() {
        let data = UnitData {
            egress_subnets: Some(" 10.0.0.1/32, ,10.0.1.0/24 ".into()),
            ingress_address: Some("10.9.9.9".into()),
            private_address: Some("10.8.8.8".into()),
            ..Default::default()
        };
        assert_eq!(incoming_addresses(&data), vec!["10.0.0.1/32", "10.0.1.0/24"]);
    }

    #[test]
    fn test_ingress_before_private() {
        let data = UnitData {
            ingress_address: Some("10.9.9.9".into()),
            private_address: Some("10.8.8.8".into()),
            ..Default::default()
        };
        assert_eq!(incoming_addresses(&data), vec!["10.9.9.9/32"]);

        let data = UnitData {
            private_address: Some("10.8.8.8".into()),
            ..Default::default()
        };
        assert_eq!(incoming_addresses(&data), vec!["10.8.8.8/32"]);
    }

    #[test]
    fn test_no_hints() {
        assert!(incoming_addresses(&UnitData::default()).is_empty());
    }

    #[test]
    fn test_join_ranges_skips_empty() {
        assert_eq!(join_ranges(&["10.0.0.1/32", "", "10.0.0.2/32"]), "10.0.0.1/32,10.0.0.2/32");
        assert_eq!(join_ranges::<&str>(&[]), "");
    }
}
