use super::{FRAME_BYTES, FRAME_SAMPLES};
use crate::error::{BridgeError, Result};

/// RTP fixed header state (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Version is always 2; padding, extension, CSRC count and marker are 0.
/// Sequence and timestamp both wrap.
#[derive(Debug)]
pub struct RtpHeader {
    /// RTP payload type (7-bit, RFC 3551).
    pub pt: u8,
    /// Synchronization source identifier (RFC 3550 §8.1).
    pub ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl RtpHeader {
    pub fn new(pt: u8, ssrc: u32) -> Self {
        tracing::debug!(
            pt,
            ssrc = format_args!("{:#010X}", ssrc),
            "RTP header state created"
        );
        Self {
            pt,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Create with a random SSRC (RFC 3550 §8.1).
    pub fn with_random_ssrc(pt: u8) -> Self {
        let ssrc = rand::random::<u32>();
        Self::new(pt, ssrc)
    }

    /// Sequence number the next [`write`](Self::write) will carry.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Timestamp the next [`write`](Self::write) will carry.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Serialize a 12-byte header, then advance the sequence by one and the
    /// timestamp by `increment`.
    pub fn write(&mut self, increment: u32) -> [u8; 12] {
        let mut header = [0u8; 12];
        header[0] = 2 << 6;
        header[1] = self.pt & 0x7f;
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(increment);
        header
    }
}

/// Wraps 160-byte G.711 frames (20 ms at 8 kHz) into RTP packets.
///
/// One instance lives for the whole bridge so the SSRC stays fixed across
/// re-negotiations; only the payload type follows the current session.
#[derive(Debug)]
pub struct RtpPacketizer {
    header: RtpHeader,
}

impl RtpPacketizer {
    pub fn new(payload_type: u8) -> Self {
        Self {
            header: RtpHeader::with_random_ssrc(payload_type),
        }
    }

    pub fn with_ssrc(payload_type: u8, ssrc: u32) -> Self {
        Self {
            header: RtpHeader::new(payload_type, ssrc),
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.header.ssrc
    }

    pub fn payload_type(&self) -> u8 {
        self.header.pt
    }

    pub fn set_payload_type(&mut self, payload_type: u8) {
        self.header.pt = payload_type;
    }

    pub fn sequence(&self) -> u16 {
        self.header.sequence()
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp()
    }

    /// Build one packet: header followed by exactly one frame.
    pub fn packetize(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        if frame.len() != FRAME_BYTES {
            return Err(BridgeError::PayloadLength(frame.len()));
        }
        let header = self.header.write(FRAME_SAMPLES as u32);
        let mut packet = Vec::with_capacity(header.len() + frame.len());
        packet.extend_from_slice(&header);
        packet.extend_from_slice(frame);
        Ok(packet)
    }
}
