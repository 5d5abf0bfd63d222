// lsof-based per-process connection enumerator

use super::ConnectionEnumerator;
use super::address::{WILDCARD, is_ipv4_endpoint, parse_address_port};
use crate::backends::command::{CommandProbe, command_exists};
use crate::backends::{BackendCapabilities, BackendPriority};
use crate::error::ProbeError;
use crate::geo_classifier;
use crate::process::{ConnectionState, NetworkConnection, TransportProtocol};
use std::sync::Arc;

/// Lines with fewer fields than this cannot be a socket row
const MIN_FIELDS: usize = 8;

/// Nominal index of the TYPE column (IPv4 / IPv6)
const TYPE_COLUMN: usize = 4;

const ARROW: &str = "->";
const LISTEN_MARKER: &str = "(LISTEN)";

/// Enumerates a process's sockets by running `lsof -nP -a -p <pid> -i`
///
/// Output is the default human-readable column layout:
///
/// ```text
/// COMMAND  PID USER   FD   TYPE  DEVICE             SIZE/OFF NODE NAME
/// Safari   812 alice  23u  IPv4  0x1a2b3c4d5e6f7a8b 0t0      TCP  192.168.1.5:54321->142.250.72.14:443 (ESTABLISHED)
/// ```
pub struct LsofConnectionEnumerator {
    probe: Arc<dyn CommandProbe>,
    include_listening: bool,
}

impl LsofConnectionEnumerator {
    pub fn new(probe: Arc<dyn CommandProbe>, include_listening: bool) -> Self {
        Self {
            probe,
            include_listening,
        }
    }

    /// Parse one lsof row
    ///
    /// `Ok(None)` means the row was understood but deliberately filtered
    /// (a listening socket while `include_listening` is off).
    pub fn parse_line(
        line: &str,
        include_listening: bool,
    ) -> Result<Option<NetworkConnection>, ProbeError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            return Err(ProbeError::mismatch("socket row (too few fields)", line));
        }

        // COMMAND may contain spaces, which only ever shifts TYPE to the right
        let type_idx = fields[TYPE_COLUMN..]
            .iter()
            .position(|f| *f == "IPv4" || *f == "IPv6")
            .map(|i| i + TYPE_COLUMN)
            .ok_or_else(|| ProbeError::mismatch("socket row (no address family)", line))?;
        let ipv6 = fields[type_idx] == "IPv6";

        // NODE comes after DEVICE and SIZE/OFF
        let proto_idx = fields
            .iter()
            .enumerate()
            .skip(type_idx + 2)
            .find(|(_, f)| f.eq_ignore_ascii_case("TCP") || f.eq_ignore_ascii_case("UDP"))
            .map(|(i, _)| i)
            .ok_or_else(|| ProbeError::mismatch("socket row (no protocol)", line))?;

        let protocol = TransportProtocol::from_token(fields[proto_idx], ipv6)
            .ok_or_else(|| ProbeError::mismatch("protocol", fields[proto_idx]))?;

        let rest = &fields[proto_idx + 1..];

        for (i, token) in rest.iter().enumerate().rev() {
            if token.contains(ARROW) {
                let halves: Vec<&str> = token.split(ARROW).collect();
                if halves.len() != 2 {
                    continue;
                }

                let (local_address, local_port) = parse_address_port(halves[0]);
                let (remote_address, remote_port) = parse_address_port(halves[1]);
                let (country_code, country_flag) =
                    geo_classifier::classify(&remote_address).as_pair();

                let state = rest
                    .get(i + 1)
                    .and_then(|t| t.strip_prefix('(')?.strip_suffix(')'))
                    .map(ConnectionState::from_token)
                    .unwrap_or(ConnectionState::Established);

                return Ok(Some(NetworkConnection {
                    local_address,
                    local_port,
                    remote_address,
                    remote_port,
                    protocol,
                    state,
                    country_code,
                    country_flag,
                }));
            }

            if token.contains(LISTEN_MARKER) {
                if !include_listening {
                    return Ok(None);
                }

                let endpoint = i
                    .checked_sub(1)
                    .map(|j| rest[j])
                    .ok_or_else(|| ProbeError::mismatch("listening endpoint", line))?;
                let (local_address, local_port) = parse_address_port(endpoint);

                return Ok(Some(unconnected(
                    local_address,
                    local_port,
                    protocol,
                    ConnectionState::Listen,
                )));
            }

            if is_ipv4_endpoint(token) {
                let (local_address, local_port) = parse_address_port(token);
                return Ok(Some(unconnected(
                    local_address,
                    local_port,
                    protocol,
                    ConnectionState::Unknown,
                )));
            }
        }

        Err(ProbeError::mismatch("socket row (no endpoint)", line))
    }

    /// Parse full lsof output, dropping rows that don't parse
    pub fn parse_output(output: &str, include_listening: bool) -> Vec<NetworkConnection> {
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match Self::parse_line(line, include_listening) {
                Ok(conn) => conn,
                Err(e) => {
                    log::debug!("Skipping lsof row: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Connection with no remote peer
fn unconnected(
    local_address: String,
    local_port: String,
    protocol: TransportProtocol,
    state: ConnectionState,
) -> NetworkConnection {
    NetworkConnection {
        local_address,
        local_port,
        remote_address: WILDCARD.to_string(),
        remote_port: WILDCARD.to_string(),
        protocol,
        state,
        country_code: None,
        country_flag: None,
    }
}

impl ConnectionEnumerator for LsofConnectionEnumerator {
    fn name(&self) -> &'static str {
        "lsof"
    }

    fn priority(&self) -> BackendPriority {
        BackendPriority::Good // Reliable, but spawns an external process per call
    }

    fn is_available() -> bool {
        command_exists("lsof")
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            ipv4_support: true,
            ipv6_support: true,
            per_process: true,
            per_connection: true,
        }
    }

    fn enumerate(&self, pid: i32) -> Vec<NetworkConnection> {
        // -n: no host name lookups
        // -P: no port name lookups
        // -a: AND the selections below
        // -p: only this PID
        // -i: only internet sockets
        let pid_arg = pid.to_string();
        let Some(output) = self
            .probe
            .capture("lsof", &["-nP", "-a", "-p", &pid_arg, "-i"])
        else {
            return Vec::new();
        };

        let connections = Self::parse_output(&output, self.include_listening);
        log::debug!("lsof: {} connection(s) for PID {}", connections.len(), pid);
        connections
    }
}
