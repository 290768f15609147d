//! Audio encoding and RTP packetization for the backchannel.
//!
//! The egress pipeline turns source-rate PCM16 (little-endian, mono) into
//! 20 ms G.711 frames and wraps each in an RTP packet:
//!
//! ```text
//! PCM16 @ source_rate ──► FrameEncoder ──► [u8; 160] ──► RtpPacketizer ──► UDP
//! ```
//!
//! Two [`FrameEncoder`] implementations exist:
//!
//! | Encoder | Module | How |
//! |---------|--------|-----|
//! | [`DspEncoder`](dsp::DspEncoder) | [`dsp`] | In-process resampler, gain stages, G.711 |
//! | [`ExternalFilter`](filter::ExternalFilter) | [`filter`] | One child process per chunk |
//!
//! The packetizer ([`rtp::RtpPacketizer`]) does not care which one produced
//! a frame.

pub mod dsp;
pub mod filter;
pub mod g711;
pub mod rtp;

/// Samples per 20 ms frame at 8 kHz.
pub const FRAME_SAMPLES: usize = 160;

/// Encoded G.711 frame size (one byte per sample).
pub const FRAME_BYTES: usize = FRAME_SAMPLES;

/// G.711 sample rate.
pub const G711_RATE: u32 = 8000;

/// Turns raw PCM16 chunks into 160-byte G.711 frames.
///
/// A chunk may yield zero, one or many frames; encoders that resample keep
/// leftover samples for the next call. [`reset`](Self::reset) discards any
/// such state, e.g. when queued speech is interrupted.
pub trait FrameEncoder: Send {
    fn encode(&mut self, chunk: &[u8]) -> Vec<Vec<u8>>;

    fn reset(&mut self);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Decode little-endian PCM16 bytes. A trailing odd byte is ignored.
pub fn pcm16_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode samples as little-endian PCM16 bytes.
pub fn pcm16_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
