//! Coarse geography heuristic for remote addresses
//!
//! This is not a GeoIP database. The first octet of an IPv4 address is
//! matched against a hand-authored table of ranges, which is good enough to
//! put a flag next to a connection and nothing more. Ranges are checked in
//! table order and the first match wins, so overlapping entries resolve to
//! the earlier region.

use std::ops::RangeInclusive;

/// Coarse region buckets the heuristic knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    China,
    UnitedStates,
    Europe,
    Japan,
    Korea,
    Singapore,
}

impl Region {
    pub fn code(&self) -> &'static str {
        match self {
            Region::China => "CN",
            Region::UnitedStates => "US",
            Region::Europe => "EU",
            Region::Japan => "JP",
            Region::Korea => "KR",
            Region::Singapore => "SG",
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Region::China => "🇨🇳",
            Region::UnitedStates => "🇺🇸",
            Region::Europe => "🇪🇺",
            Region::Japan => "🇯🇵",
            Region::Korea => "🇰🇷",
            Region::Singapore => "🇸🇬",
        }
    }
}

/// Outcome of classifying one address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoLocation {
    /// Wildcard, loopback or private - not geographically meaningful
    Local,
    /// First octet fell into a known bucket
    Region(Region),
    /// Well-formed address outside every known range
    Unmapped,
    /// Not four dot-separated numeric octets
    Malformed,
}

pub const UNKNOWN_CODE: &str = "UN";
pub const UNMAPPED_FLAG: &str = "🌍";
pub const MALFORMED_FLAG: &str = "🏳️";

impl GeoLocation {
    pub fn country_code(&self) -> Option<&'static str> {
        match self {
            GeoLocation::Local => None,
            GeoLocation::Region(region) => Some(region.code()),
            GeoLocation::Unmapped | GeoLocation::Malformed => Some(UNKNOWN_CODE),
        }
    }

    pub fn flag(&self) -> Option<&'static str> {
        match self {
            GeoLocation::Local => None,
            GeoLocation::Region(region) => Some(region.flag()),
            GeoLocation::Unmapped => Some(UNMAPPED_FLAG),
            GeoLocation::Malformed => Some(MALFORMED_FLAG),
        }
    }

    /// (country code, flag) pair as attached to a connection
    pub fn as_pair(&self) -> (Option<&'static str>, Option<&'static str>) {
        (self.country_code(), self.flag())
    }
}

const LOCAL_PREFIXES: [&str; 3] = ["127.", "192.168.", "10."];

/// First-octet ranges per region, in precedence order
const REGION_TABLE: &[(Region, &[RangeInclusive<u8>])] = &[
    (
        Region::China,
        &[
            1..=2,
            27..=27,
            39..=39,
            42..=42,
            49..=49,
            58..=61,
            101..=101,
            103..=103,
            106..=106,
            110..=125,
        ],
    ),
    (
        Region::UnitedStates,
        &[
            8..=8,
            15..=15,
            34..=35,
            50..=50,
            63..=76,
            96..=100,
            104..=104,
            107..=108,
            173..=174,
            184..=184,
            192..=192,
            198..=199,
            204..=209,
            216..=216,
        ],
    ),
    (
        Region::Europe,
        &[
            16..=26,
            31..=33,
            37..=37,
            46..=46,
            51..=57,
            62..=62,
            77..=95,
        ],
    ),
    (
        Region::Japan,
        &[
            126..=126,
            133..=133,
            150..=150,
            153..=153,
            163..=163,
            180..=180,
            182..=183,
            202..=203,
            210..=211,
            218..=223,
        ],
    ),
    // 210 is shadowed by Japan
    (Region::Korea, &[168..=168, 175..=175, 210..=210]),
    (
        Region::Singapore,
        &[
            14..=14,
            43..=43,
            45..=45,
            102..=102,
            129..=132,
            134..=149,
            152..=152,
            171..=171,
        ],
    ),
];

/// First octet of a dotted quad
///
/// `None` unless the address is exactly four all-digit parts. The value is
/// not range-checked, so "300.1.1.1" yields 300.
fn first_octet(address: &str) -> Option<u32> {
    let parts: Vec<&str> = address.split('.').collect();
    let numeric = |part: &&str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if parts.len() != 4 || !parts.iter().all(numeric) {
        return None;
    }
    Some(parts[0].parse().unwrap_or(u32::MAX))
}

/// Look up the region bucket for a first octet
pub fn region_for_octet(octet: u8) -> Option<Region> {
    REGION_TABLE
        .iter()
        .find(|(_, ranges)| ranges.iter().any(|r| r.contains(&octet)))
        .map(|(region, _)| *region)
}

/// Classify a remote address
///
/// This is the main entry point used by the connection enumerator.
pub fn classify(address: &str) -> GeoLocation {
    if address == "*" || LOCAL_PREFIXES.iter().any(|p| address.starts_with(p)) {
        return GeoLocation::Local;
    }

    let Some(first) = first_octet(address) else {
        return GeoLocation::Malformed;
    };

    match u8::try_from(first).ok().and_then(region_for_octet) {
        Some(region) => GeoLocation::Region(region),
        None => GeoLocation::Unmapped,
    }
}
