//! G.711 companding (ITU-T G.711), 8 kHz, one byte per sample.
//!
//! μ-law (PCMU, payload type 0) is what doorbell backchannels advertise in
//! practice. A-law (PCMA, payload type 8) is supported for cameras that only
//! offer that.

/// G.711 variant negotiated for the backchannel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum G711 {
    #[default]
    Ulaw,
    Alaw,
}

impl G711 {
    pub fn encode_sample(self, sample: i16) -> u8 {
        match self {
            Self::Ulaw => ulaw_encode(sample),
            Self::Alaw => alaw_encode(sample),
        }
    }

    /// Encode every sample of `pcm` into `out`.
    pub fn encode_into(self, pcm: &[i16], out: &mut Vec<u8>) {
        out.extend(pcm.iter().map(|&s| self.encode_sample(s)));
    }

    /// Output format name understood by `ffmpeg -f`.
    pub fn ffmpeg_format(self) -> &'static str {
        match self {
            Self::Ulaw => "mulaw",
            Self::Alaw => "alaw",
        }
    }

    /// Codec name understood by `ffmpeg -acodec`.
    pub fn ffmpeg_codec(self) -> &'static str {
        match self {
            Self::Ulaw => "pcm_mulaw",
            Self::Alaw => "pcm_alaw",
        }
    }
}

/// Encode one 16-bit sample to μ-law.
#[inline]
pub fn ulaw_encode(sample: i16) -> u8 {
    const BIAS: i32 = 0x84;
    const CLIP: i32 = 32635;

    let sample = sample as i32;
    let sign = if sample < 0 { 0x80 } else { 0x00 };
    let magnitude = sample.abs().min(CLIP) + BIAS;

    let exponent = match magnitude {
        m if m >= 0x4000 => 7,
        m if m >= 0x2000 => 6,
        m if m >= 0x1000 => 5,
        m if m >= 0x0800 => 4,
        m if m >= 0x0400 => 3,
        m if m >= 0x0200 => 2,
        m if m >= 0x0100 => 1,
        _ => 0,
    };
    let mantissa = (magnitude >> (exponent + 3)) & 0x0F;

    !(sign | (exponent << 4) | mantissa) as u8
}

#[inline]
pub fn ulaw_decode(byte: u8) -> i16 {
    let u = !byte as i32;
    let mut t = ((u & 0x0F) << 3) + 0x84;
    t <<= (u & 0x70) >> 4;
    (if u & 0x80 != 0 { 0x84 - t } else { t - 0x84 }) as i16
}

/// Encode one 16-bit sample to A-law (13-bit magnitude, even bits inverted).
#[inline]
pub fn alaw_encode(sample: i16) -> u8 {
    const SEGMENT_END: [i32; 8] = [0x1F, 0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF];

    let mut pcm = (sample as i32) >> 3;
    let mask = if pcm >= 0 {
        0xD5
    } else {
        pcm = -pcm - 1;
        0x55
    };

    let Some(segment) = SEGMENT_END.iter().position(|&end| pcm <= end) else {
        return (0x7F ^ mask) as u8;
    };
    let shift = if segment < 2 { 1 } else { segment };
    let value = ((segment as i32) << 4) | ((pcm >> shift) & 0x0F);
    (value ^ mask) as u8
}

#[inline]
pub fn alaw_decode(byte: u8) -> i16 {
    let a = (byte ^ 0x55) as i32;
    let mut t = (a & 0x0F) << 4;
    let segment = (a & 0x70) >> 4;
    match segment {
        0 => t += 8,
        1 => t += 0x108,
        _ => {
            t += 0x108;
            t <<= segment - 1;
        }
    }
    (if a & 0x80 != 0 { t } else { -t }) as i16
}
