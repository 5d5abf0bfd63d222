use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Opaque icon handle attached to resolved process metadata
///
/// Bitmap loading and resizing belong to the presentation layer; the engine
/// only says where an icon lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum Icon {
    /// Icon resource shipped inside an application bundle
    Bundle(PathBuf),
    /// Placeholder for processes without an icon of their own
    Generic,
}

/// Identity metadata for a process, produced by one resolution pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessMetadata {
    pub pid: i32,
    pub display_name: String,
    pub bundle_identifier: Option<String>,
    pub executable_path: Option<PathBuf>,
    pub icon: Icon,
    pub resolved_at: DateTime<Local>,
}

impl ProcessMetadata {
    /// Record carrying only the caller-supplied name
    pub fn name_only(pid: i32, name: &str) -> Self {
        Self {
            pid,
            display_name: name.to_string(),
            bundle_identifier: None,
            executable_path: None,
            icon: Icon::Generic,
            resolved_at: Local::now(),
        }
    }
}

/// Transport protocol of a socket as reported by the listing tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportProtocol {
    Tcp,
    Udp,
    Tcp6,
    Udp6,
}

impl TransportProtocol {
    /// Parse a protocol column token ("TCP", "udp", ...)
    pub fn from_token(token: &str, ipv6: bool) -> Option<Self> {
        match (token.to_ascii_uppercase().as_str(), ipv6) {
            ("TCP", false) => Some(Self::Tcp),
            ("TCP", true) => Some(Self::Tcp6),
            ("UDP", false) => Some(Self::Udp),
            ("UDP", true) => Some(Self::Udp6),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Tcp6 => "TCP6",
            Self::Udp6 => "UDP6",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TransportProtocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Socket state token
///
/// Tokens the listing tool prints that are not in this list are kept
/// verbatim in `Other` rather than coerced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Established,
    Listen,
    SynSent,
    SynReceived,
    FinWait1,
    FinWait2,
    CloseWait,
    Closing,
    LastAck,
    TimeWait,
    Closed,
    Unknown,
    Other(String),
}

impl ConnectionState {
    pub fn from_token(token: &str) -> Self {
        match token {
            "ESTABLISHED" => Self::Established,
            "LISTEN" => Self::Listen,
            "SYN_SENT" => Self::SynSent,
            "SYN_RECEIVED" | "SYN_RCVD" => Self::SynReceived,
            "FIN_WAIT_1" | "FIN_WAIT1" => Self::FinWait1,
            "FIN_WAIT_2" | "FIN_WAIT2" => Self::FinWait2,
            "CLOSE_WAIT" => Self::CloseWait,
            "CLOSING" => Self::Closing,
            "LAST_ACK" => Self::LastAck,
            "TIME_WAIT" => Self::TimeWait,
            "CLOSED" => Self::Closed,
            "UNKNOWN" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Established => "ESTABLISHED",
            Self::Listen => "LISTEN",
            Self::SynSent => "SYN_SENT",
            Self::SynReceived => "SYN_RECEIVED",
            Self::FinWait1 => "FIN_WAIT_1",
            Self::FinWait2 => "FIN_WAIT_2",
            Self::CloseWait => "CLOSE_WAIT",
            Self::Closing => "CLOSING",
            Self::LastAck => "LAST_ACK",
            Self::TimeWait => "TIME_WAIT",
            Self::Closed => "CLOSED",
            Self::Unknown => "UNKNOWN",
            Self::Other(token) => token,
        }
    }

    /// Coarse bucket the monitor uses to colour state badges
    pub fn severity(&self) -> StateSeverity {
        match self {
            Self::Established => StateSeverity::Active,
            Self::Listen => StateSeverity::Listening,
            Self::TimeWait | Self::CloseWait => StateSeverity::Closing,
            _ => StateSeverity::Other,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ConnectionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSeverity {
    Active,    // green
    Listening, // blue
    Closing,   // orange
    Other,     // gray
}

/// One socket of a process, as observed by a single enumeration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkConnection {
    pub local_address: String,
    pub local_port: String,
    pub remote_address: String,
    pub remote_port: String,
    pub protocol: TransportProtocol,
    pub state: ConnectionState,
    pub country_code: Option<&'static str>,
    pub country_flag: Option<&'static str>,
}

impl NetworkConnection {
    pub fn is_listening(&self) -> bool {
        self.state == ConnectionState::Listen
    }
}

/// Format a per-second byte count the way the status bar shows it
///
/// Always KB/s or MB/s with one decimal; zero is "0 KB/s".
pub fn format_rate(bytes_per_sec: u64) -> String {
    let kbytes = bytes_per_sec as f64 / 1024.0;
    if kbytes <= 0.0 {
        "0 KB/s".to_string()
    } else if kbytes < 1024.0 {
        format!("{:.1} KB/s", kbytes)
    } else {
        format!("{:.1} MB/s", kbytes / 1024.0)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parse a rendered rate back into bytes/sec for ordering checks
    fn displayed_magnitude(rendered: &str) -> f64 {
        let (value, unit) = rendered.split_once(' ').unwrap();
        let value: f64 = value.parse().unwrap();
        match unit {
            "KB/s" => value * 1024.0,
            "MB/s" => value * 1024.0 * 1024.0,
            _ => panic!("unexpected unit {}", unit),
        }
    }

    #[test]
    fn test_format_rate_zero() {
        assert_eq!(format_rate(0), "0 KB/s");
    }

    #[test]
    fn test_format_rate_megabyte_boundary() {
        assert_eq!(format_rate(1_048_576), "1.0 MB/s");
        assert_eq!(format_rate(1536), "1.5 KB/s");
    }

    #[test]
    fn test_format_rate_monotonic() {
        let samples = [
            0u64, 1, 100, 1023, 1024, 1025, 50_000, 1_048_575, 1_048_576, 1_100_000, 5_000_000_000,
        ];
        let mut previous = 0.0;
        for bytes in samples {
            let magnitude = displayed_magnitude(&format_rate(bytes));
            assert!(
                magnitude >= previous,
                "{} rendered smaller than its predecessor",
                bytes
            );
            previous = magnitude;
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_state_tokens_preserved() {
        assert_eq!(
            ConnectionState::from_token("ESTABLISHED"),
            ConnectionState::Established
        );
        assert_eq!(
            ConnectionState::from_token("SYN_RCVD"),
            ConnectionState::SynReceived
        );
        let odd = ConnectionState::from_token("BOUND");
        assert_eq!(odd, ConnectionState::Other("BOUND".to_string()));
        assert_eq!(odd.as_str(), "BOUND");
        assert_eq!(odd.severity(), StateSeverity::Other);
        assert_eq!(ConnectionState::TimeWait.severity(), StateSeverity::Closing);
    }

    #[test]
    fn test_protocol_tokens() {
        assert_eq!(
            TransportProtocol::from_token("tcp", false),
            Some(TransportProtocol::Tcp)
        );
        assert_eq!(
            TransportProtocol::from_token("UDP", true),
            Some(TransportProtocol::Udp6)
        );
        assert_eq!(TransportProtocol::from_token("IPv4", false), None);
    }
}
