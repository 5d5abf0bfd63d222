mod actions;
mod backends;
mod config;
mod error;
mod geo_classifier;
mod process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};

use crate::backends::command::{CommandProbe, SystemCommandProbe};
use crate::backends::connections::{
    ConnectionEnumerator, detect_connection_backends, select_connection_enumerator,
};
use crate::backends::metadata::{CacheJanitor, ProcessMetadataResolver, describe_sources};
use crate::config::Config;
use crate::process::{
    Icon, NetworkConnection, ProcessMetadata, StateSeverity, format_bytes, format_rate,
};

/// TrafficMon - attribute network sockets to processes
#[derive(Parser, Debug)]
#[command(name = "trafficmon")]
#[command(version)]
#[command(about = "Resolve process identity and inspect per-process sockets", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Metadata cache TTL in seconds (overrides config)
    #[arg(long, value_name = "SECONDS", global = true)]
    ttl: Option<u64>,

    /// Include listening sockets in connection listings
    #[arg(long, global = true)]
    include_listening: bool,

    /// Connection enumerator backend to use
    #[arg(long, value_name = "BACKEND", global = true)]
    connection_backend: Option<String>,

    /// List all available backends and exit
    #[arg(long)]
    list_backends: bool,

    /// Persist the effective settings (including overrides) to the config file
    #[arg(long)]
    save_config: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve metadata and list connections for one process
    Inspect {
        /// Process ID
        pid: i32,
        /// Name the process is known by (defaults to the system's process name)
        #[arg(long)]
        name: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Rank processes by disk I/O (not network traffic) and resolve their metadata
    Top {
        /// Maximum number of processes to show
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Forcefully terminate a process
    Kill {
        /// Process ID
        pid: i32,
    },
    /// Open the directory containing a path in the file browser
    Reveal {
        /// File path (usually an executable)
        path: String,
    },
}

#[derive(Serialize)]
struct InspectReport {
    metadata: ProcessMetadata,
    connections: Vec<NetworkConnection>,
}

#[derive(Serialize)]
struct TopEntry {
    #[serde(flatten)]
    metadata: ProcessMetadata,
    memory_bytes: u64,
    disk_io_bytes_per_sec: u64,
}

/// Window over which `top` samples per-process disk I/O
const SAMPLE_WINDOW: Duration = Duration::from_secs(1);

fn print_available_backends(resolver: &ProcessMetadataResolver) {
    println!("TrafficMon v{} - Available Backends\n", env!("CARGO_PKG_VERSION"));

    println!("Metadata sources (in fallback order):");
    for source in describe_sources(resolver.sources()) {
        println!("  {:24} [priority: {:?}]", source.name, source.priority);
    }

    println!();

    println!("Connection backends:");
    for backend in detect_connection_backends() {
        let status = if backend.available {
            "✅ available"
        } else {
            "❌ unavailable"
        };
        println!(
            "  {:24} [priority: {:?}] {}",
            backend.name, backend.priority, status
        );
    }
}

/// System process name for `pid`, used when the caller didn't supply one
fn system_process_name(pid: i32) -> String {
    let sys = System::new_all();
    u32::try_from(pid)
        .ok()
        .and_then(|p| sys.process(Pid::from_u32(p)))
        .map(|p| p.name().to_string_lossy().to_string())
        .unwrap_or_else(|| format!("PID {}", pid))
}

fn print_metadata(metadata: &ProcessMetadata) {
    println!("{} (PID {})", metadata.display_name, metadata.pid);
    println!(
        "  Bundle:     {}",
        metadata.bundle_identifier.as_deref().unwrap_or("N/A")
    );
    println!(
        "  Executable: {}",
        metadata
            .executable_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "N/A".to_string())
    );
    match &metadata.icon {
        Icon::Bundle(path) => println!("  Icon:       {}", path.display()),
        Icon::Generic => println!("  Icon:       (generic)"),
    }
    println!(
        "  Resolved:   {}",
        metadata.resolved_at.format("%Y-%m-%d %H:%M:%S")
    );
}

fn print_connections(connections: &[NetworkConnection]) {
    println!("Connections ({}):", connections.len());
    if connections.is_empty() {
        println!("  (none)");
        return;
    }

    for conn in connections {
        let badge = match conn.state.severity() {
            StateSeverity::Active => "●",
            StateSeverity::Listening => "◆",
            StateSeverity::Closing => "◐",
            StateSeverity::Other => "○",
        };

        let peer = if conn.is_listening() {
            format!("listening :{}", conn.local_port)
        } else {
            format!(
                "{} {}:{}",
                conn.country_flag.unwrap_or("  "),
                conn.remote_address,
                conn.remote_port
            )
        };

        println!(
            "  {:5} {:28} {:44} {} {}",
            conn.protocol.as_str(),
            format!("{}:{}", conn.local_address, conn.local_port),
            peer,
            badge,
            conn.state
        );
    }
}

async fn run_inspect(
    resolver: Arc<ProcessMetadataResolver>,
    enumerator: Arc<dyn ConnectionEnumerator>,
    pid: i32,
    name: Option<String>,
    json: bool,
) -> Result<()> {
    // Both queries block on subprocesses; run them side by side off the runtime
    let metadata = tokio::task::spawn_blocking(move || {
        let name = name.unwrap_or_else(|| system_process_name(pid));
        resolver.resolve(pid, &name)
    });
    let connections = tokio::task::spawn_blocking(move || enumerator.enumerate(pid));

    let (metadata, connections) = tokio::try_join!(metadata, connections)?;

    if json {
        let report = InspectReport {
            metadata,
            connections,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_metadata(&metadata);
        println!();
        print_connections(&connections);
    }

    Ok(())
}

fn top_header() -> String {
    format!(
        "{:>7}  {:24} {:>10} {:>11}  {:40} EXECUTABLE",
        "PID", "NAME", "MEM", "DISK I/O", "BUNDLE ID"
    )
}

async fn run_top(resolver: Arc<ProcessMetadataResolver>, limit: usize, json: bool) -> Result<()> {
    let entries = tokio::task::spawn_blocking(move || {
        let mut sys = System::new_all();
        let started = Instant::now();
        std::thread::sleep(SAMPLE_WINDOW);
        sys.refresh_all();
        let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);

        let mut processes: Vec<(i32, String, u64, u64)> = sys
            .processes()
            .iter()
            .map(|(pid, process)| {
                let usage = process.disk_usage();
                let rate = (usage.read_bytes + usage.written_bytes) as f64 / elapsed;
                (
                    pid.as_u32() as i32,
                    process.name().to_string_lossy().to_string(),
                    process.memory(),
                    rate as u64,
                )
            })
            .collect();
        // Busiest first, memory breaks ties
        processes.sort_by(|a, b| b.3.cmp(&a.3).then(b.2.cmp(&a.2)));

        processes
            .into_iter()
            .take(limit)
            .map(|(pid, name, memory_bytes, disk_io_bytes_per_sec)| TopEntry {
                metadata: resolver.resolve(pid, &name),
                memory_bytes,
                disk_io_bytes_per_sec,
            })
            .collect::<Vec<_>>()
    })
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{}", top_header());
    for entry in &entries {
        let record = &entry.metadata;
        println!(
            "{:>7}  {:24} {:>10} {:>11}  {:40} {}",
            record.pid,
            record.display_name,
            format_bytes(entry.memory_bytes),
            format_rate(entry.disk_io_bytes_per_sec),
            record.bundle_identifier.as_deref().unwrap_or("-"),
            record
                .executable_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::formatted_builder()
            .parse_default_env()
            .init();
    }

    let mut config = Config::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config, using defaults: {:#}", e);
        Config::default()
    });
    if let Some(ttl) = args.ttl {
        config.cache_ttl_secs = ttl;
    }
    if args.include_listening {
        config.include_listening = true;
    }
    if args.connection_backend.is_some() {
        config.preferred_connection_backend = args.connection_backend.clone();
    }

    if args.save_config {
        if let Err(e) = config.save() {
            log::warn!("Failed to save config: {}", e);
        }
    }

    let probe: Arc<dyn CommandProbe> = Arc::new(SystemCommandProbe);
    let resolver = Arc::new(ProcessMetadataResolver::with_default_sources(
        Arc::clone(&probe),
        config.cache_ttl(),
    ));

    if args.list_backends {
        print_available_backends(&resolver);
        return Ok(());
    }

    let enumerator: Arc<dyn ConnectionEnumerator> = Arc::from(select_connection_enumerator(
        config.preferred_connection_backend.as_deref(),
        Arc::clone(&probe),
        config.include_listening,
    )?);
    log::debug!("Using connection backend: {}", enumerator.name());

    let mut janitor = config
        .cache_clear_interval()
        .map(|interval| CacheJanitor::new(resolver.cache(), interval));
    if let Some(janitor) = janitor.as_mut() {
        janitor.start();
    }

    let result = match args.command {
        Some(Commands::Inspect { pid, name, json }) => {
            run_inspect(Arc::clone(&resolver), enumerator, pid, name, json).await
        }
        Some(Commands::Top { limit, json }) => run_top(Arc::clone(&resolver), limit, json).await,
        Some(Commands::Kill { pid }) => actions::terminate(pid),
        Some(Commands::Reveal { path }) => {
            if !actions::reveal_in_file_browser(&path, probe.as_ref()) {
                println!("Nothing to reveal for '{}'", path);
            }
            Ok(())
        }
        None => {
            // Default: show this process, handy as a smoke test
            let pid = std::process::id() as i32;
            run_inspect(Arc::clone(&resolver), enumerator, pid, None, false).await
        }
    };

    if let Some(mut janitor) = janitor {
        janitor.stop();
    }

    result
}
