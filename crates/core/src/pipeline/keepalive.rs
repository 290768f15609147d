use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::RunFlags;
use crate::session::RtspSession;

/// Keeps the camera's RTSP session from timing out.
///
/// Polls every `poll` and sends GET_PARAMETER whenever the session's
/// keepalive interval has elapsed. The first failure ends the worker.
pub struct KeepaliveWorker {
    session: Arc<RtspSession>,
    poll: Duration,
    flags: RunFlags,
}

impl KeepaliveWorker {
    pub fn new(session: Arc<RtspSession>, poll: Duration, flags: RunFlags) -> Self {
        Self {
            session,
            poll,
            flags,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<u64>> {
        thread::Builder::new()
            .name("keepalive".into())
            .spawn(move || self.run())
    }

    /// Run until a keepalive fails or the run stops. Returns keepalives sent.
    pub fn run(self) -> u64 {
        let mut sent: u64 = 0;
        while self.flags.is_running() {
            match self.session.send_keepalive() {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(error = %e, "keepalive failed, stopping keepalive worker");
                    break;
                }
            }
            self.flags.sleep(self.poll);
        }
        tracing::debug!(sent, "keepalive worker stopped");
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::protocol::Credentials;
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    #[test]
    fn stops_on_first_failure() {
        let mut config = SessionConfig::default();
        config.connect_timeout_ms = 200;
        let session = Arc::new(
            RtspSession::new("rtsp://127.0.0.1:9/stream", Credentials::new("u", "p"), config)
                .unwrap(),
        );
        let flags = RunFlags::new(Arc::new(AtomicBool::new(true)));

        let handle = KeepaliveWorker::new(session, Duration::from_millis(10), flags.clone())
            .spawn()
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(3);
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(handle.is_finished());
        assert!(flags.is_running());
        assert_eq!(handle.join().unwrap(), 0);
    }
}
