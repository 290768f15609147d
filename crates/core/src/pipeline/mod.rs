//! Worker threads that move audio and keep the session alive.
//!
//! | Worker | Module | Runs while | Blocks on |
//! |--------|--------|------------|-----------|
//! | Ingest | [`ingest`] | recording and connected | capture read |
//! | Egress | [`egress`] | recording and connected | queue pop (timeout) |
//! | Keepalive | [`keepalive`] | recording and connected | poll sleep |
//!
//! Each worker owns a [`RunFlags`] clone and checks it at every loop
//! boundary. Clearing either flag stops all three within one timeout
//! interval.

pub mod egress;
pub mod ingest;
pub mod keepalive;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

pub use egress::EgressWorker;
pub use ingest::IngestWorker;
pub use keepalive::KeepaliveWorker;

/// Longest single sleep inside [`RunFlags::sleep`].
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Cancellation flags shared by one run's workers.
///
/// `connected` is bridge-wide and only cleared by a full cleanup;
/// `recording` belongs to a single start and is cleared on disconnect.
#[derive(Debug, Clone)]
pub struct RunFlags {
    connected: Arc<AtomicBool>,
    recording: Arc<AtomicBool>,
}

impl RunFlags {
    /// Start a new run under the given bridge-wide flag.
    pub fn new(connected: Arc<AtomicBool>) -> Self {
        Self {
            connected,
            recording: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.recording.load(Ordering::SeqCst) && self.connected.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Clear this run's recording flag.
    pub fn stop(&self) {
        self.recording.store(false, Ordering::SeqCst);
    }

    /// Sleep for `duration`, waking early if the run stops. Returns whether
    /// the run is still going.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
        false
    }
}
