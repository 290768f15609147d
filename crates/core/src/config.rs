use std::time::Duration;

use serde::Deserialize;

/// Top-level bridge configuration.
///
/// All fields have defaults tuned for a Reolink-style doorbell; a TOML file
/// only needs to name the values it overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub session: SessionConfig,
    pub audio: AudioConfig,
}

/// RTSP control and backchannel transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Local UDP port requested as `client_port` in SETUP (RTP; RTCP is +1).
    pub client_port: u16,
    /// Minimum time between keepalive GET_PARAMETER requests.
    pub keepalive_interval_ms: u64,
    /// How often the keepalive worker checks whether a keepalive is due.
    pub keepalive_poll_ms: u64,
    /// TCP connect timeout for the control channel.
    pub connect_timeout_ms: u64,
    /// Read/write timeout on the control channel.
    pub read_timeout_ms: u64,
    /// Upper bound on a single RTSP response, headers and body together.
    pub max_response_bytes: usize,
    /// Receive timeout set on the backchannel UDP socket.
    pub udp_read_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: crate::protocol::USER_AGENT.to_string(),
            client_port: 49154,
            keepalive_interval_ms: 15_000,
            keepalive_poll_ms: 1_000,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 5_000,
            max_response_bytes: 8192,
            udp_read_timeout_ms: 1_000,
        }
    }
}

impl SessionConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn keepalive_poll(&self) -> Duration {
        Duration::from_millis(self.keepalive_poll_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn udp_read_timeout(&self) -> Duration {
        Duration::from_millis(self.udp_read_timeout_ms)
    }
}

/// Which encode chain the egress pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EgressStrategy {
    /// In-process resampler, gain stages and G.711 encoder.
    #[default]
    Dsp,
    /// One-shot external filter process per chunk.
    ///
    /// A chunk is sent only if its encoded form is exactly one 160-byte
    /// frame, i.e. 20 ms of input. At the default `egress_chunk_bytes` of
    /// 4096 (about 85 ms at 24 kHz) nothing is sent; set `egress_chunk_bytes`
    /// to [`AudioConfig::filter_frame_bytes`] and feed 20 ms chunks.
    Filter,
}

/// Audio queue, pacing and processing parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub strategy: EgressStrategy,
    /// Sample rate of PCM16 on both collaborator queues.
    pub source_rate: u32,
    /// Nominal ingest queue entry size in bytes.
    pub ingest_chunk_bytes: usize,
    /// Nominal egress chunk size; shorter chunks are zero-padded to it.
    pub egress_chunk_bytes: usize,
    pub ingest_capacity: usize,
    pub egress_capacity: usize,
    /// Bounded wait for queue push/pop on the worker side.
    pub queue_timeout_ms: u64,
    /// Delay between consecutive RTP packets.
    pub packet_interval_ms: u64,
    /// How long `disconnect` waits for the egress queue to drain.
    pub drain_timeout_ms: u64,
    /// Volume factor applied by the forward capture filter.
    pub ingest_volume: f64,
    /// Resample through 16 kHz instead of going straight to 8 kHz.
    pub smooth_resampling: bool,
    pub dc_offset_removal: bool,
    /// RMS below which the soft noise gate attenuates a frame.
    pub noise_gate_threshold: f64,
    /// Smallest gain the noise gate applies.
    pub noise_gate_floor: f64,
    /// Peak target as a fraction of full scale.
    pub volume_target_ratio: f64,
    /// Absolute sample level above which frames are scaled down.
    pub peak_limiter_threshold: f64,
    /// Program used for capture and the external filter strategy.
    pub ffmpeg_path: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            strategy: EgressStrategy::Dsp,
            source_rate: 24_000,
            ingest_chunk_bytes: 4096,
            egress_chunk_bytes: 4096,
            ingest_capacity: 50,
            egress_capacity: 10,
            queue_timeout_ms: 500,
            packet_interval_ms: 20,
            drain_timeout_ms: 5_000,
            ingest_volume: 0.8,
            smooth_resampling: true,
            dc_offset_removal: false,
            noise_gate_threshold: 1000.0,
            noise_gate_floor: 0.01,
            volume_target_ratio: 0.1,
            peak_limiter_threshold: 2000.0,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

impl AudioConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }

    pub fn packet_interval(&self) -> Duration {
        Duration::from_millis(self.packet_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Bytes of source-rate PCM16 covering one 20 ms G.711 frame, the only
    /// chunk size the filter strategy turns into a packet.
    pub fn filter_frame_bytes(&self) -> usize {
        self.source_rate as usize / 50 * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_camera_tuning() {
        let config = BridgeConfig::default();
        assert_eq!(config.session.client_port, 49154);
        assert_eq!(config.session.keepalive_interval(), Duration::from_secs(15));
        assert_eq!(config.audio.ingest_capacity, 50);
        assert_eq!(config.audio.egress_capacity, 10);
        assert_eq!(config.audio.queue_timeout(), Duration::from_millis(500));
        assert_eq!(config.audio.strategy, EgressStrategy::Dsp);
    }

    #[test]
    fn filter_frame_is_twenty_milliseconds() {
        let mut audio = AudioConfig::default();
        assert_eq!(audio.filter_frame_bytes(), 960);
        assert_ne!(audio.egress_chunk_bytes, audio.filter_frame_bytes());
        audio.source_rate = 8000;
        assert_eq!(audio.filter_frame_bytes(), 320);
    }
}
