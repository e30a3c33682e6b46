//! Per-session streaming DSP chain: FIR smoothing, noise gate with hold,
//! one-pole asymmetric AGC, soft logarithmic limiter.
//!
//! [`Conditioner`] owns all state that must persist across chunks within one
//! mic session. It is never shared between sessions.

use crate::alaw;
use crate::protocol_constants::{
    AGC_ATTACK_COEFF, AGC_MAX_GAIN, AGC_MIN_GAIN, AGC_RELEASE_COEFF, AGC_TARGET, ALAW_SILENCE,
    NOISE_GATE_HOLD_CHUNKS, NOISE_GATE_THRESHOLD, SOFT_CEILING, SOFT_LIMIT,
};

/// Per-session DSP state: AGC gain and noise-gate hold counter.
///
/// Created fresh for every WebSocket session and discarded on disconnect;
/// never shared across sessions.
pub struct Conditioner {
    agc_gain: f64,
    gate_hold_chunks: u32,
    /// Diagnostic counter incremented once per processed chunk; exposed for
    /// logging, not used by the DSP math itself.
    diag_counter: u64,
    /// Whether the most recent [`Conditioner::process`] call hit the closed
    /// gate (substituted silence, did no AGC/encode work). The relay uses
    /// this to decide whether the chunk should actually reach the doorbell
    /// as an RTP packet, or be dropped on the floor like the rest of the
    /// closed-gate period.
    gated_last_chunk: bool,
}

impl Conditioner {
    /// Creates a conditioner with gain initialized to 1.0 (unity) and the
    /// gate closed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agc_gain: 1.0,
            gate_hold_chunks: 0,
            diag_counter: 0,
            gated_last_chunk: false,
        }
    }

    /// Current AGC gain, always within `[AGC_MIN_GAIN, AGC_MAX_GAIN]`.
    #[must_use]
    pub fn agc_gain(&self) -> f64 {
        self.agc_gain
    }

    /// Number of chunks remaining before the noise gate closes again.
    #[must_use]
    pub fn gate_hold_chunks(&self) -> u32 {
        self.gate_hold_chunks
    }

    /// Number of chunks processed so far.
    #[must_use]
    pub fn diag_counter(&self) -> u64 {
        self.diag_counter
    }

    /// Whether the chunk just returned by [`Conditioner::process`] was
    /// substituted silence from a closed noise gate, rather than real
    /// conditioned audio. The caller should not forward such a chunk to the
    /// doorbell as an RTP packet (§8 scenario 1: gate closed emits no RTP
    /// packet at all, not a silence-filled one).
    #[must_use]
    pub fn gated_last_chunk(&self) -> bool {
        self.gated_last_chunk
    }

    /// Processes one chunk of PCM16 samples through the full DSP chain and
    /// returns an equal-length sequence of A-law bytes.
    pub fn process(&mut self, samples: &[i16]) -> Vec<u8> {
        self.diag_counter += 1;

        let smoothed = smooth(samples);
        let peak = smoothed.iter().map(|&s| (s as i32).abs()).max().unwrap_or(0);

        if peak >= NOISE_GATE_THRESHOLD {
            self.gate_hold_chunks = NOISE_GATE_HOLD_CHUNKS;
        } else if self.gate_hold_chunks > 0 {
            self.gate_hold_chunks -= 1;
        } else {
            self.gated_last_chunk = true;
            return vec![ALAW_SILENCE; samples.len()];
        }

        self.gated_last_chunk = false;
        self.update_agc(peak);
        let int_gain = self.agc_gain.round() as i32;

        smoothed
            .iter()
            .map(|&s| {
                let v = apply_gain_and_limiter(s, int_gain);
                alaw::encode_sample(v)
            })
            .collect()
    }

    /// Updates `agc_gain` toward `AGC_TARGET / peak`, clamped to
    /// `[AGC_MIN_GAIN, AGC_MAX_GAIN]`, using a fast attack / slow release
    /// one-pole filter.
    fn update_agc(&mut self, peak: i32) {
        let peak = peak.max(1) as f64;
        let ideal = (AGC_TARGET / peak).clamp(AGC_MIN_GAIN, AGC_MAX_GAIN);

        self.agc_gain = if ideal < self.agc_gain {
            self.agc_gain * AGC_ATTACK_COEFF + ideal * (1.0 - AGC_ATTACK_COEFF)
        } else {
            self.agc_gain * AGC_RELEASE_COEFF + ideal * (1.0 - AGC_RELEASE_COEFF)
        };
        self.agc_gain = self.agc_gain.clamp(AGC_MIN_GAIN, AGC_MAX_GAIN);
    }
}

impl Default for Conditioner {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies a 5-tap `[1, 2, 4, 2, 1] / 10` FIR kernel in place, with narrower
/// truncated kernels at the two edges on each side so output length equals
/// input length.
fn smooth(x: &[i16]) -> Vec<i16> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![x[0]];
    }

    let xi = |i: usize| x[i.min(n - 1)] as i64;
    let mut y = vec![0i16; n];

    y[0] = ((4 * xi(0) + 2 * xi(1) + xi(2.min(n - 1))) / 7) as i16;
    if n >= 2 {
        y[1] = ((2 * xi(0) + 4 * xi(1) + 2 * xi(2) + xi(3.min(n - 1))) / 9) as i16;
    }

    for i in 2..n.saturating_sub(2) {
        let v = xi(i - 2) + 2 * xi(i - 1) + 4 * xi(i) + 2 * xi(i + 1) + xi(i + 2);
        y[i] = (v / 10) as i16;
    }

    if n >= 4 {
        let i = n - 2;
        let v = xi(i.saturating_sub(2)) + 2 * xi(i - 1) + 4 * xi(i) + 2 * xi(i + 1);
        y[i] = (v / 9) as i16;
    }
    if n >= 3 {
        let i = n - 1;
        let v = xi(i.saturating_sub(2)) + 2 * xi(i - 1) + 4 * xi(i);
        y[i] = (v / 7) as i16;
    }

    y
}

/// Applies integer AGC gain to one smoothed sample and runs it through the
/// hyperbolic soft-knee limiter, finally hard-clamping to the i16 range.
fn apply_gain_and_limiter(sample: i16, int_gain: i32) -> i16 {
    let v = sample as i64 * int_gain as i64;
    let sign = if v < 0 { -1i64 } else { 1i64 };
    let abs_v = v.abs();

    let limited = if abs_v > SOFT_LIMIT as i64 {
        let excess = abs_v - SOFT_LIMIT as i64;
        let span = (SOFT_CEILING - SOFT_LIMIT) as i64;
        SOFT_LIMIT as i64 + (span * excess) / (excess + span)
    } else {
        abs_v
    };

    (sign * limited).clamp(i16::MIN as i64, i16::MAX as i64) as i16
}
