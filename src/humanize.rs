//! Input humanization: bounded positional jitter and the sine-wave
//! flick-to-key delay.

use crate::constants::{FLICK_SETTLE_MS, HUMANIZE_AMPLITUDE_MS, HUMANIZE_PHASE_RATE};
use std::time::Duration;

/// xorshift32 source for aim jitter. Seedable so replays and tests are
/// reproducible.
#[derive(Clone, Copy, Debug)]
pub struct JitterRng {
    state: u32,
}

impl JitterRng {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9 } else { seed },
        }
    }

    /// Seed from the wall clock's sub-second nanos.
    pub fn from_clock(now: Duration) -> Self {
        Self::new(now.subsec_nanos() ^ (now.as_secs() as u32).rotate_left(16))
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        (self.next_u32() >> 8) as f64 / (1u32 << 24) as f64
    }

    /// Uniform in `[-span, span]`.
    pub fn symmetric(&mut self, span: f64) -> f64 {
        (self.next_unit() * 2.0 - 1.0) * span
    }
}

/// Signed millisecond offset in `[-15, 15]`, phase driven by wall-clock time.
pub fn sine_offset_ms(now: Duration) -> i64 {
    let phase = now.as_secs_f64() * HUMANIZE_PHASE_RATE;
    (phase.sin() * HUMANIZE_AMPLITUDE_MS).round() as i64
}

/// Pause between an aim flick and the keystroke that consumes it.
pub fn flick_settle_delay(now: Duration) -> Duration {
    let ms = (FLICK_SETTLE_MS + sine_offset_ms(now)).max(0) as u64;
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_offset_stays_within_amplitude() {
        for step in 0..2_000u64 {
            let offset = sine_offset_ms(Duration::from_millis(step * 7));
            assert!((-15..=15).contains(&offset), "offset={offset} at step {step}");
        }
    }

    #[test]
    fn settle_delay_never_negative_and_bounded() {
        for step in 0..500u64 {
            let delay = flick_settle_delay(Duration::from_millis(step * 13));
            assert!(delay <= Duration::from_millis(35), "delay={delay:?}");
            assert!(delay >= Duration::from_millis(5), "delay={delay:?}");
        }
    }

    #[test]
    fn symmetric_jitter_is_bounded_and_centred() {
        let mut rng = JitterRng::new(0xC0FF_EE11);
        let mut sum = 0.0;
        for _ in 0..1_000 {
            let value = rng.symmetric(5.0);
            assert!(value.abs() <= 5.0);
            sum += value;
        }
        assert!((sum / 1_000.0).abs() < 0.5, "mean drifted: {}", sum / 1_000.0);
    }

    #[test]
    fn zero_seed_does_not_stall() {
        let mut rng = JitterRng::new(0);
        assert_ne!(rng.next_u32(), 0);
    }
}
