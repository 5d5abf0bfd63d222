// Periodic metadata cache invalidation

use super::cache::MetadataCache;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound on how long `stop` waits for the thread to notice shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Background task that empties the metadata cache on a fixed interval
///
/// Started explicitly at process init and stopped on shutdown (or drop).
pub struct CacheJanitor {
    cache: Arc<MetadataCache>,
    interval: Duration,
    shutdown_flag: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CacheJanitor {
    pub fn new(cache: Arc<MetadataCache>, interval: Duration) -> Self {
        Self {
            cache,
            interval,
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the clearing thread; no-op if already running
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        self.shutdown_flag.store(false, Ordering::Relaxed);
        let cache = Arc::clone(&self.cache);
        let shutdown = Arc::clone(&self.shutdown_flag);
        let interval = self.interval;

        self.handle = Some(thread::spawn(move || {
            janitor_loop(cache, shutdown, interval);
        }));
        log::debug!("Cache janitor started (interval {:?})", self.interval);
    }

    /// Signal the thread and wait for it to exit
    pub fn stop(&mut self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Cache janitor thread panicked");
            }
            log::debug!("Cache janitor stopped");
        }
    }
}

impl Drop for CacheJanitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn janitor_loop(cache: Arc<MetadataCache>, shutdown: Arc<AtomicBool>, interval: Duration) {
    let tick = interval.clamp(Duration::from_millis(1), POLL_INTERVAL);
    let mut last_clear = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(tick);

        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        if last_clear.elapsed() >= interval {
            cache.clear_all();
            log::info!("Process metadata cache cleared");
            last_clear = Instant::now();
        }
    }
}
