//! Input validators shared by clap value parsers, prompts and config defaults.

use std::net::Ipv4Addr;
use std::sync::OnceLock;

use regex::Regex;

static MAC_RE: OnceLock<Regex> = OnceLock::new();

/// Uppercase `value` and check it is a colon-separated MAC address.
pub fn mac_address(value: &str) -> Result<String, String> {
    let re = MAC_RE.get_or_init(|| {
        Regex::new(r"^([0-9A-F]{2}:){5}[0-9A-F]{2}$").expect("MAC address regex is valid")
    });
    let upper = value.trim().to_ascii_uppercase();
    if re.is_match(&upper) {
        Ok(upper)
    } else {
        Err("Invalid MAC address".to_string())
    }
}

/// Parse one or two whitespace-separated IPv4 addresses.
///
/// Duplicates are dropped, keeping the first occurrence's position.
pub fn dns_servers(input: &str) -> Result<Vec<Ipv4Addr>, String> {
    let mut servers = Vec::new();
    for token in input.split_whitespace() {
        let addr: Ipv4Addr = token
            .parse()
            .map_err(|_| format!("Invalid IPv4 address: {token}"))?;
        if !servers.contains(&addr) {
            servers.push(addr);
        }
    }
    check_server_count(servers)
}

/// Drop duplicates from an already-parsed list and check its length.
pub fn dedup_servers(addrs: &[Ipv4Addr]) -> Result<Vec<Ipv4Addr>, String> {
    let mut servers = Vec::with_capacity(addrs.len());
    for addr in addrs {
        if !servers.contains(addr) {
            servers.push(*addr);
        }
    }
    check_server_count(servers)
}

fn check_server_count(servers: Vec<Ipv4Addr>) -> Result<Vec<Ipv4Addr>, String> {
    match servers.len() {
        0 => Err("Expected one or two DNS servers".to_string()),
        1 | 2 => Ok(servers),
        n => Err(format!("Expected at most two DNS servers, got {n}")),
    }
}

/// Whether a resolver at `addr` is reached through the LAN bridge rather than
/// the WAN data interface.
///
/// Covers the IANA special-purpose IPv4 ranges, not only RFC 1918.
pub fn is_private(addr: Ipv4Addr) -> bool {
    let [a, b, c, d] = addr.octets();
    addr.is_private()
        || addr.is_loopback()
        || addr.is_link_local()
        || addr.is_documentation()
        || addr.is_broadcast()
        || a == 0
        || (a == 192 && b == 0 && c == 0 && (d < 8 || d == 170 || d == 171))
        || (a == 198 && (b & 0xfe) == 18)
        || a >= 240
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_is_uppercased() {
        assert_eq!(
            mac_address("aa:bb:cc:0d:1e:ff").unwrap(),
            "AA:BB:CC:0D:1E:FF"
        );
    }

    #[test]
    fn mac_rejects_bad_shapes() {
        for bad in [
            "",
            "AA:BB:CC:DD:EE",
            "AA:BB:CC:DD:EE:FF:00",
            "AA-BB-CC-DD-EE-FF",
            "AABBCCDDEEFF",
            "GG:BB:CC:DD:EE:FF",
            "AA:BB:CC:DD:EE:FFF",
        ] {
            assert_eq!(
                mac_address(bad),
                Err("Invalid MAC address".to_string()),
                "{bad}"
            );
        }
    }

    #[test]
    fn dns_servers_parses_two() {
        assert_eq!(
            dns_servers("1.1.1.1 192.168.2.10").unwrap(),
            vec![Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(192, 168, 2, 10)]
        );
    }

    #[test]
    fn dns_servers_dedups_in_order() {
        assert_eq!(
            dns_servers("  8.8.8.8   8.8.8.8 ").unwrap(),
            vec![Ipv4Addr::new(8, 8, 8, 8)]
        );
    }

    #[test]
    fn dns_servers_reports_bad_token() {
        assert_eq!(
            dns_servers("1.1.1.1 example.com"),
            Err("Invalid IPv4 address: example.com".to_string())
        );
    }

    #[test]
    fn dns_servers_count_limits() {
        assert!(dns_servers("").is_err());
        assert!(dns_servers("1.1.1.1 2.2.2.2 3.3.3.3").is_err());
    }

    #[test]
    fn private_ranges() {
        for addr in [
            "10.0.0.1",
            "172.16.5.4",
            "192.168.2.1",
            "127.0.0.1",
            "169.254.1.1",
            "0.1.2.3",
            "192.0.0.5",
            "192.0.2.1",
            "198.18.0.1",
            "198.19.255.255",
            "203.0.113.9",
            "240.0.0.1",
            "255.255.255.255",
        ] {
            assert!(is_private(addr.parse().unwrap()), "{addr}");
        }
    }

    #[test]
    fn public_ranges() {
        for addr in ["1.1.1.1", "8.8.8.8", "100.64.0.1", "172.32.0.1", "198.20.0.1"] {
            assert!(!is_private(addr.parse().unwrap()), "{addr}");
        }
    }
}
