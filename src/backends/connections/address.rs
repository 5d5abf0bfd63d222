// "address:port" token parsing for socket listing output

use std::net::Ipv4Addr;

/// Placeholder used for a missing address or port
pub const WILDCARD: &str = "*";

/// Split an endpoint token into (address, port)
///
/// Formats:
/// - "127.0.0.1:8080" (IPv4)
/// - "[::1]:8080" (bracketed IPv6)
/// - "fe80::1%en0:5353" (bare IPv6, split on the last colon)
/// - "*:8080" / "*:*" (wildcard)
pub fn parse_address_port(token: &str) -> (String, String) {
    let Some((address, port)) = token.rsplit_once(':') else {
        return (token.to_string(), WILDCARD.to_string());
    };

    let address = match address.strip_prefix('[').and_then(|a| a.strip_suffix(']')) {
        Some(inner) => inner,
        None => address,
    };

    let address = if address.is_empty() {
        WILDCARD
    } else {
        address
    };

    (address.to_string(), port.to_string())
}

/// Whether a token looks like "a.b.c.d:port" (port may be the wildcard)
pub fn is_ipv4_endpoint(token: &str) -> bool {
    let Some((address, port)) = token.rsplit_once(':') else {
        return false;
    };

    let port_ok = port == WILDCARD || (!port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()));

    port_ok && address.parse::<Ipv4Addr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: &str, p: &str) -> (String, String) {
        (a.to_string(), p.to_string())
    }

    #[test]
    fn test_ipv4() {
        assert_eq!(parse_address_port("192.168.1.5:8080"), pair("192.168.1.5", "8080"));
    }

    #[test]
    fn test_bracketed_ipv6() {
        assert_eq!(parse_address_port("[::1]:443"), pair("::1", "443"));
        assert_eq!(
            parse_address_port("[2606:4700::1111]:443"),
            pair("2606:4700::1111", "443")
        );
    }

    #[test]
    fn test_bare_ipv6_splits_on_last_colon() {
        assert_eq!(parse_address_port("fe80::1%en0:5353"), pair("fe80::1%en0", "5353"));
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(parse_address_port("*:*"), pair("*", "*"));
        assert_eq!(parse_address_port(":80"), pair("*", "80"));
        assert_eq!(parse_address_port("[]:80"), pair("*", "80"));
    }

    #[test]
    fn test_no_colon() {
        assert_eq!(parse_address_port("localhost"), pair("localhost", "*"));
    }

    #[test]
    fn test_only_one_bracket_pair_stripped() {
        assert_eq!(parse_address_port("[[::1]]:22"), pair("[::1]", "22"));
    }

    #[test]
    fn test_ipv4_endpoint_detection() {
        assert!(is_ipv4_endpoint("192.168.1.5:5353"));
        assert!(is_ipv4_endpoint("0.0.0.0:*"));
        assert!(!is_ipv4_endpoint("*:5353"));
        assert!(!is_ipv4_endpoint("[::1]:22"));
        assert!(!is_ipv4_endpoint("0t0"));
        assert!(!is_ipv4_endpoint("1.2.3.4:"));
        assert!(!is_ipv4_endpoint("host.local:80"));
    }
}
