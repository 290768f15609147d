//! Backchannel track discovery in SDP (RFC 4566 / RFC 8866).
//!
//! ONVIF cameras advertise the talk-back path as an extra audio media
//! section whose direction is `sendonly` from the camera's point of view:
//!
//! ```text
//! m=audio 0 RTP/AVP 8                           ← forward audio
//! a=control:trackID=2
//! a=rtpmap:8 PCMA/8000
//! a=recvonly
//! m=audio 0 RTP/AVP 0                           ← backchannel
//! a=control:trackID=3
//! a=rtpmap:0 PCMU/8000
//! a=sendonly
//! ```
//!
//! The first audio section that has a control URL, is `sendonly`, and maps a
//! G.711 codec (PCMU or PCMA) is the backchannel.

/// Media direction attribute of an SDP block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    SendOnly,
}

/// Parse state for one `m=audio` section.
#[derive(Debug, Default, Clone)]
pub struct MediaBlock {
    /// Fourth token of the `m=` line, when numeric.
    pub payload_type: Option<u8>,
    pub control: Option<String>,
    pub direction: Option<Direction>,
    /// Encoding token from `a=rtpmap`, e.g. `PCMU/8000`. Only set for G.711.
    pub codec: Option<String>,
}

impl MediaBlock {
    fn from_media_line(line: &str) -> Self {
        let payload_type = line
            .split_whitespace()
            .nth(3)
            .and_then(|pt| pt.parse().ok());
        Self {
            payload_type,
            ..Self::default()
        }
    }

    /// Consume one attribute line belonging to this block.
    fn apply(&mut self, line: &str) {
        if let Some(control) = line.strip_prefix("a=control:") {
            self.control = Some(control.trim().to_string());
        } else if line.starts_with("a=sendonly") {
            self.direction = Some(Direction::SendOnly);
        } else if let Some(rtpmap) = line.strip_prefix("a=rtpmap:") {
            if let Some(codec) = rtpmap.split_whitespace().nth(1)
                && (codec.contains("PCMU") || codec.contains("PCMA"))
            {
                tracing::debug!(codec, "found G.711 audio codec");
                self.codec = Some(codec.to_string());
            }
        }
    }

    /// Returns the selected track if this block qualifies as the backchannel.
    fn backchannel(&self) -> Option<BackchannelTrack> {
        if self.direction != Some(Direction::SendOnly) {
            return None;
        }
        Some(BackchannelTrack {
            control: self.control.clone()?,
            payload_type: self.payload_type?,
            codec: self.codec.clone()?,
        })
    }
}

/// The audio track selected for sending speech back to the camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackchannelTrack {
    /// Track control URL, relative to the content base or absolute.
    pub control: String,
    /// RTP payload type to stamp on outgoing packets.
    pub payload_type: u8,
    pub codec: String,
}

impl BackchannelTrack {
    pub fn is_pcma(&self) -> bool {
        self.codec.contains("PCMA")
    }
}

/// Scan an SDP body for the backchannel track.
///
/// Lines may be CRLF or LF terminated. A non-audio `m=` line closes the
/// current audio block so its attributes cannot leak into it.
pub fn find_backchannel(sdp: &str) -> Option<BackchannelTrack> {
    let mut current: Option<MediaBlock> = None;

    for line in sdp.lines() {
        let line = line.trim();

        if line.starts_with("m=audio") {
            current = Some(MediaBlock::from_media_line(line));
            continue;
        }
        if line.starts_with("m=") {
            current = None;
            continue;
        }

        if let Some(block) = current.as_mut() {
            block.apply(line);
            if let Some(track) = block.backchannel() {
                tracing::info!(
                    control = %track.control,
                    payload_type = track.payload_type,
                    codec = %track.codec,
                    "found backchannel track"
                );
                return Some(track);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const REOLINK_SDP: &str = "v=0\r\n\
        o=- 1109162014219182 0 IN IP4 0.0.0.0\r\n\
        s=Session streamed by \"preview\"\r\n\
        t=0 0\r\n\
        a=control:*\r\n\
        m=video 0 RTP/AVP 96\r\n\
        a=control:trackID=1\r\n\
        a=rtpmap:96 H264/90000\r\n\
        a=sendonly\r\n\
        m=audio 0 RTP/AVP 97\r\n\
        a=control:trackID=2\r\n\
        a=rtpmap:97 MPEG4-GENERIC/16000\r\n\
        a=recvonly\r\n\
        m=audio 0 RTP/AVP 0\r\n\
        a=control:trackID=3\r\n\
        a=rtpmap:0 PCMU/8000\r\n\
        a=sendonly\r\n";

    #[test]
    fn selects_second_audio_block() {
        let sdp = "v=0\n\
                   m=audio 0 RTP/AVP 8\n\
                   a=control:track1\n\
                   a=rtpmap:8 PCMA/8000\n\
                   a=recvonly\n\
                   m=audio 0 RTP/AVP 0\n\
                   a=control:track2\n\
                   a=sendonly\n\
                   a=rtpmap:0 PCMU/8000\n";
        let track = find_backchannel(sdp).unwrap();
        assert_eq!(track.control, "track2");
        assert_eq!(track.payload_type, 0);
        assert_eq!(track.codec, "PCMU/8000");
        assert!(!track.is_pcma());
    }

    #[test]
    fn camera_sdp_with_video_and_aac() {
        let track = find_backchannel(REOLINK_SDP).unwrap();
        assert_eq!(track.control, "trackID=3");
        assert_eq!(track.payload_type, 0);
    }

    #[test]
    fn sendonly_video_does_not_leak_into_audio() {
        let sdp = "m=audio 0 RTP/AVP 0\r\n\
                   a=control:trackID=2\r\n\
                   a=rtpmap:0 PCMU/8000\r\n\
                   m=video 0 RTP/AVP 96\r\n\
                   a=sendonly\r\n";
        assert!(find_backchannel(sdp).is_none());
    }

    #[test]
    fn non_g711_sendonly_is_rejected() {
        let sdp = "m=audio 0 RTP/AVP 97\r\n\
                   a=control:trackID=3\r\n\
                   a=rtpmap:97 opus/48000/2\r\n\
                   a=sendonly\r\n";
        assert!(find_backchannel(sdp).is_none());
    }

    #[test]
    fn pcma_backchannel() {
        let sdp = "m=audio 0 RTP/AVP 8\r\n\
                   a=rtpmap:8 PCMA/8000\r\n\
                   a=sendonly\r\n\
                   a=control:rtsp://cam/stream/trackID=4\r\n";
        let track = find_backchannel(sdp).unwrap();
        assert_eq!(track.payload_type, 8);
        assert_eq!(track.control, "rtsp://cam/stream/trackID=4");
        assert!(track.is_pcma());
    }

    #[test]
    fn empty_sdp() {
        assert!(find_backchannel("").is_none());
    }
}
