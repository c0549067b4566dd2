//! Timing and velocity humanization

use fastrand::Rng;

/// Convert milliseconds to a whole number of samples.
pub fn ms_to_samples(sample_rate: f64, ms: f64) -> i64 {
    (sample_rate * ms / 1000.0).round() as i64
}

/// Bounded random perturbation for generated notes.
///
/// The generator is passed in by the caller so that tests (and offline
/// renders) can seed it and get repeatable output.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Humanizer {
    /// Maximum timing deviation either way, in samples
    pub timing_range: i64,
    /// Maximum velocity deviation either way
    pub velocity_range: u8,
}

impl Humanizer {
    pub fn new(sample_rate: f64, timing_ms: u32, velocity_range: u8) -> Self {
        let timing_range = if timing_ms == 0 { 0 } else { ms_to_samples(sample_rate, timing_ms as f64) };
        Self { timing_range, velocity_range }
    }

    /// No jitter at all; used by the exporter.
    pub fn off() -> Self {
        Self::default()
    }

    /// Signed timing offset in `[-range, +range]`.
    pub fn timing(&self, rng: &mut Rng) -> i64 {
        if self.timing_range <= 0 {
            return 0;
        }
        rng.i64(-self.timing_range..=self.timing_range)
    }

    /// Velocity with jitter applied, always within 1..=127.
    pub fn velocity(&self, base: u8, rng: &mut Rng) -> u8 {
        humanize_velocity(base, self.velocity_range, rng)
    }
}

/// Base velocity plus a uniform delta in `[-max_delta, +max_delta]`, clamped to 1..=127.
pub fn humanize_velocity(base: u8, max_delta: u8, rng: &mut Rng) -> u8 {
    if max_delta == 0 {
        return base.clamp(1, 127);
    }
    let delta = rng.i16(-(max_delta as i16)..=max_delta as i16);
    (base as i16 + delta).clamp(1, 127) as u8
}
