// Backend trait definitions and core types

pub mod command;
pub mod connections;
pub mod metadata;

/// Backend priority ranking (higher = better)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BackendPriority {
    Fallback = 1, // Heuristics, no external data
    Good = 2,     // Spawns an external tool per query (ps, lsof)
    Better = 3,   // Reads system files or bundle resources
    Best = 4,     // Native APIs
}

/// Capabilities that a backend supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    pub ipv4_support: bool,
    pub ipv6_support: bool,
    pub per_process: bool,
    pub per_connection: bool,
}
