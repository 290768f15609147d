use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use super::RunFlags;
use crate::error::BridgeError;
use crate::media::FrameEncoder;
use crate::media::rtp::RtpPacketizer;
use crate::queue::BoundedQueue;
use crate::session::RtspSession;

/// Shared, resettable egress encoder.
pub type SharedEncoder = Arc<Mutex<Box<dyn FrameEncoder>>>;

/// Egress timing and sizing.
#[derive(Debug, Clone, Copy)]
pub struct EgressSettings {
    /// Short chunks are zero-padded to this many bytes before encoding.
    pub chunk_bytes: usize,
    pub pop_timeout: Duration,
    /// Delay after each packet sent.
    pub packet_interval: Duration,
}

/// What happened to one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendOutcome {
    Sent,
    Dropped,
}

/// Drains the egress queue, encodes, packetizes and paces RTP to the camera.
pub struct EgressWorker {
    session: Arc<RtspSession>,
    queue: Arc<BoundedQueue<Vec<u8>>>,
    encoder: SharedEncoder,
    packetizer: Arc<Mutex<RtpPacketizer>>,
    settings: EgressSettings,
    flags: RunFlags,
    warned_unavailable: bool,
}

impl EgressWorker {
    pub fn new(
        session: Arc<RtspSession>,
        queue: Arc<BoundedQueue<Vec<u8>>>,
        encoder: SharedEncoder,
        packetizer: Arc<Mutex<RtpPacketizer>>,
        settings: EgressSettings,
        flags: RunFlags,
    ) -> Self {
        Self {
            session,
            queue,
            encoder,
            packetizer,
            settings,
            flags,
            warned_unavailable: false,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<u64>> {
        thread::Builder::new()
            .name("egress".into())
            .spawn(move || self.run())
    }

    /// Run until the run flags clear. Returns packets sent.
    pub fn run(mut self) -> u64 {
        let encoder_name = self.encoder.lock().name();
        tracing::info!(encoder = encoder_name, "starting backchannel egress");
        let mut packets: u64 = 0;

        while self.flags.is_running() {
            let Some(mut chunk) = self.queue.pop_timeout(self.settings.pop_timeout) else {
                continue;
            };
            if chunk.len() < self.settings.chunk_bytes {
                tracing::debug!(len = chunk.len(), "padding short outgoing chunk");
                chunk.resize(self.settings.chunk_bytes, 0);
            }

            let frames = self.encoder.lock().encode(&chunk);
            for frame in frames {
                if !self.flags.is_running() {
                    break;
                }
                let packet = match self.packetizer.lock().packetize(&frame) {
                    Ok(packet) => packet,
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping frame");
                        continue;
                    }
                };

                if self.send(&packet) == SendOutcome::Sent {
                    if packets % 500 == 0 {
                        tracing::info!(packets, "backchannel active");
                    }
                    packets += 1;
                    self.flags.sleep(self.settings.packet_interval);
                }
            }
        }

        tracing::info!(packets, "backchannel egress stopped");
        packets
    }

    /// Send one packet. A failed send gets one keepalive probe; if that
    /// fails too the backchannel is invalidated and later sends fail fast.
    fn send(&mut self, packet: &[u8]) -> SendOutcome {
        match self.session.send_rtp(packet) {
            Ok(_) => {
                self.warned_unavailable = false;
                SendOutcome::Sent
            }
            Err(BridgeError::BackchannelUnavailable) => {
                if !self.warned_unavailable {
                    tracing::warn!("backchannel not configured, dropping frames");
                    self.warned_unavailable = true;
                }
                SendOutcome::Dropped
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to send RTP packet");
                match self.session.probe() {
                    Ok(()) => tracing::info!("recovered from packet drop"),
                    Err(probe_error) => {
                        tracing::error!(error = %probe_error, "failed to recover connection");
                        self.session.invalidate_backchannel();
                    }
                }
                SendOutcome::Dropped
            }
        }
    }
}
