//! In-process egress chain: resample, condition, G.711.
//!
//! ```text
//! PCM16 @ source_rate
//!   └─► Resampler (source → 16 kHz) ─► Resampler (16 kHz → 8 kHz)   smooth_resampling
//!   └─► Resampler (source → 8 kHz)                                  otherwise
//!   └─► DcBlocker                                                   dc_offset_removal
//!   └─► per 160 samples: volume → noise gate → peak limiter → G.711
//! ```
//!
//! Every stage keeps its state across chunks, so a stream split into
//! arbitrary chunk sizes encodes the same as one long buffer.

use super::g711::G711;
use super::{FRAME_SAMPLES, FrameEncoder, G711_RATE, pcm16_samples};
use crate::config::AudioConfig;

/// Intermediate rate for two-step resampling.
pub const INTERMEDIATE_RATE: u32 = 16_000;

/// Stateful linear-interpolation resampler for mono PCM16.
///
/// Rates are reduced by their gcd. `phase` counts in units of the reduced
/// rates: each input sample adds `out_rate`, each output sample subtracts
/// `in_rate`. Output is interpolated between the last two input samples.
#[derive(Debug, Clone)]
pub struct Resampler {
    in_rate: i64,
    out_rate: i64,
    phase: i64,
    prev: i64,
    cur: i64,
}

impl Resampler {
    pub fn new(in_rate: u32, out_rate: u32) -> Self {
        let d = gcd(in_rate.max(1), out_rate.max(1));
        let in_rate = (in_rate.max(1) / d) as i64;
        let out_rate = (out_rate.max(1) / d) as i64;
        Self {
            in_rate,
            out_rate,
            phase: -out_rate,
            prev: 0,
            cur: 0,
        }
    }

    pub fn process(&mut self, input: &[i16]) -> Vec<i16> {
        let capacity = (input.len() as i64 * self.out_rate / self.in_rate + 1) as usize;
        let mut out = Vec::with_capacity(capacity);
        let mut samples = input.iter();

        loop {
            while self.phase < 0 {
                let Some(&sample) = samples.next() else {
                    return out;
                };
                self.prev = self.cur;
                self.cur = sample as i64;
                self.phase += self.out_rate;
            }
            while self.phase >= 0 {
                let value = (self.prev * self.phase + self.cur * (self.out_rate - self.phase))
                    / self.out_rate;
                out.push(value.clamp(i16::MIN as i64, i16::MAX as i64) as i16);
                self.phase -= self.in_rate;
            }
        }
    }

    pub fn reset(&mut self) {
        self.phase = -self.out_rate;
        self.prev = 0;
        self.cur = 0;
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// One-pole DC blocking filter: `y[n] = x[n] - x[n-1] + R·y[n-1]`.
#[derive(Debug, Clone, Default)]
pub struct DcBlocker {
    x1: f64,
    y1: f64,
}

impl DcBlocker {
    const POLE: f64 = 0.995;

    pub fn process(&mut self, samples: &mut [i16]) {
        for sample in samples.iter_mut() {
            let x = *sample as f64;
            let y = x - self.x1 + Self::POLE * self.y1;
            self.x1 = x;
            self.y1 = y;
            *sample = saturate(y);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn saturate(value: f64) -> i16 {
    value.clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Largest absolute sample value.
pub fn peak(samples: &[i16]) -> i32 {
    samples
        .iter()
        .map(|&s| (s as i32).abs())
        .max()
        .unwrap_or(0)
}

pub fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt()
}

/// Multiply every sample by `factor`, truncating toward zero and saturating.
pub fn scale(samples: &mut [i16], factor: f64) {
    for sample in samples.iter_mut() {
        *sample = saturate((*sample as f64 * factor).trunc());
    }
}

/// Per-frame conditioning applied before G.711 encoding.
#[derive(Debug, Clone, Copy)]
pub struct FrameConditioner {
    pub volume_target_ratio: f64,
    pub noise_gate_threshold: f64,
    pub noise_gate_floor: f64,
    pub peak_limiter_threshold: f64,
}

impl FrameConditioner {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            volume_target_ratio: config.volume_target_ratio,
            noise_gate_threshold: config.noise_gate_threshold,
            noise_gate_floor: config.noise_gate_floor,
            peak_limiter_threshold: config.peak_limiter_threshold,
        }
    }

    pub fn apply(&self, frame: &mut [i16]) {
        self.normalize_volume(frame);
        self.noise_gate(frame);
        self.limit_peaks(frame);
    }

    /// Scale the peak toward `volume_target_ratio` of full scale. Never amplifies.
    pub fn normalize_volume(&self, frame: &mut [i16]) {
        let peak = peak(frame);
        if peak > 0 {
            let factor = (i16::MAX as f64 * self.volume_target_ratio / peak as f64).min(1.0);
            if factor < 1.0 {
                scale(frame, factor);
            }
        }
    }

    /// Attenuate a quiet frame by `max(floor, rms / threshold)`.
    ///
    /// Returns the factor applied, or `None` if the frame was loud enough to
    /// pass untouched.
    pub fn noise_gate(&self, frame: &mut [i16]) -> Option<f64> {
        let rms = rms(frame);
        if rms >= self.noise_gate_threshold {
            return None;
        }
        let factor = (rms / self.noise_gate_threshold).max(self.noise_gate_floor);
        scale(frame, factor);
        Some(factor)
    }

    pub fn limit_peaks(&self, frame: &mut [i16]) {
        let peak = peak(frame) as f64;
        if peak > self.peak_limiter_threshold {
            scale(frame, self.peak_limiter_threshold / peak);
        }
    }
}

/// Built-in encoder: resampling, optional DC removal, frame conditioning
/// and G.711.
#[derive(Debug)]
pub struct DspEncoder {
    resamplers: Vec<Resampler>,
    dc_blocker: Option<DcBlocker>,
    conditioner: FrameConditioner,
    codec: G711,
    pending: Vec<i16>,
}

impl DspEncoder {
    pub fn new(config: &AudioConfig, codec: G711) -> Self {
        let resamplers = if config.smooth_resampling && config.source_rate > INTERMEDIATE_RATE {
            vec![
                Resampler::new(config.source_rate, INTERMEDIATE_RATE),
                Resampler::new(INTERMEDIATE_RATE, G711_RATE),
            ]
        } else {
            vec![Resampler::new(config.source_rate, G711_RATE)]
        };
        tracing::debug!(
            source_rate = config.source_rate,
            stages = resamplers.len(),
            ?codec,
            "DSP encoder created"
        );

        Self {
            resamplers,
            dc_blocker: config.dc_offset_removal.then(DcBlocker::default),
            conditioner: FrameConditioner::from_config(config),
            codec,
            pending: Vec::new(),
        }
    }

    /// Resampled samples waiting for a full frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl FrameEncoder for DspEncoder {
    fn encode(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut samples = pcm16_samples(chunk);
        for resampler in &mut self.resamplers {
            samples = resampler.process(&samples);
        }
        if let Some(dc) = &mut self.dc_blocker {
            dc.process(&mut samples);
        }
        self.pending.extend_from_slice(&samples);

        let whole = self.pending.len() / FRAME_SAMPLES * FRAME_SAMPLES;
        let ready: Vec<i16> = self.pending.drain(..whole).collect();

        ready
            .chunks_exact(FRAME_SAMPLES)
            .map(|samples| {
                let mut frame = samples.to_vec();
                self.conditioner.apply(&mut frame);
                let mut encoded = Vec::with_capacity(FRAME_SAMPLES);
                self.codec.encode_into(&frame, &mut encoded);
                encoded
            })
            .collect()
    }

    fn reset(&mut self) {
        for resampler in &mut self.resamplers {
            resampler.reset();
        }
        if let Some(dc) = &mut self.dc_blocker {
            dc.reset();
        }
        self.pending.clear();
    }

    fn name(&self) -> &'static str {
        "dsp"
    }
}
