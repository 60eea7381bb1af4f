// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Jitter-compensated wake delays.
//!
//! The playback loop wakes once per segment to queue the next one. Timers
//! fire late (or early), so each delay is corrected by the error measured on
//! the previous cycle: the difference between the wall time that actually
//! elapsed and the interval that was predicted. The anticipation lead is
//! taken off the timer request but kept out of the prediction, so wakes
//! stay pinned to `segment end - anticipation` instead of creeping ahead.

use std::time::Duration;

/// Lead time before a segment's natural end at which the next one is queued
pub const ANTICIPATION_MS: f64 = 16.0;

/// Computes the next wake delay of the playback loop
#[derive(Debug, Clone)]
pub struct JitterCompensator {
    anticipation_ms: f64,
    prev_wake: Option<f64>,
    prev_predicted_ms: f64,
    last_error_ms: f64,
}

impl JitterCompensator {
    /// Create with the given anticipation in milliseconds
    pub fn new(anticipation_ms: f64) -> Self {
        Self {
            anticipation_ms: anticipation_ms.max(0.0),
            prev_wake: None,
            prev_predicted_ms: 0.0,
            last_error_ms: 0.0,
        }
    }

    /// Anticipation in milliseconds
    pub fn anticipation_ms(&self) -> f64 {
        self.anticipation_ms
    }

    /// Error measured on the most recent cycle, in milliseconds
    ///
    /// Positive means the previous wake came late.
    pub fn last_error_ms(&self) -> f64 {
        self.last_error_ms
    }

    /// Forget previous cycles; the next call measures zero elapsed time
    pub fn reset(&mut self) {
        self.prev_wake = None;
        self.prev_predicted_ms = 0.0;
        self.last_error_ms = 0.0;
    }

    /// Delay until the next wake, given the device time now and the length
    /// of the segment just queued
    pub fn next_delay(&mut self, now_secs: f64, segment_secs: f64) -> Duration {
        let elapsed_ms = match self.prev_wake {
            Some(prev) => (now_secs - prev) * 1000.0,
            None => 0.0,
        };
        let error_ms = elapsed_ms - self.prev_predicted_ms;
        let predicted_ms = segment_secs * 1000.0 - error_ms;

        self.prev_predicted_ms = predicted_ms;
        self.prev_wake = Some(now_secs);
        self.last_error_ms = error_ms;

        let delay_ms = predicted_ms - self.anticipation_ms;
        secs_to_duration(delay_ms / 1000.0)
    }
}

/// Convert seconds to a timer delay; negative and NaN map to zero, values
/// past the largest `Duration` saturate
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

impl Default for JitterCompensator {
    fn default() -> Self {
        Self::new(ANTICIPATION_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(d: Duration) -> f64 {
        d.as_secs_f64() * 1000.0
    }

    #[test]
    fn test_first_delay_is_duration_minus_anticipation() {
        let mut jitter = JitterCompensator::default();
        let delay = jitter.next_delay(10.0, 2.0);
        assert!((ms(delay) - 1984.0).abs() < 1e-6);
        assert_eq!(jitter.last_error_ms(), 0.0);
    }

    #[test]
    fn test_punctual_timer_keeps_steady_delay() {
        let mut jitter = JitterCompensator::default();
        let mut now = 0.0;
        let first = jitter.next_delay(now, 1.0);
        now += first.as_secs_f64();
        let second = jitter.next_delay(now, 1.0);
        // One anticipation lead is enough; later cycles run at full length
        assert!((ms(second) - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_late_wake_shortens_next_delay() {
        let mut jitter = JitterCompensator::new(0.0);
        jitter.next_delay(0.0, 1.0);
        let delay = jitter.next_delay(1.030, 1.0);
        assert!((jitter.last_error_ms() - 30.0).abs() < 1e-6);
        assert!((ms(delay) - 970.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_delay_clamps_to_zero() {
        let mut jitter = JitterCompensator::default();
        jitter.next_delay(0.0, 0.01);
        let delay = jitter.next_delay(5.0, 0.01);
        assert_eq!(delay, Duration::ZERO);
    }

    #[test]
    fn test_drift_stays_bounded() {
        let mut jitter = JitterCompensator::default();
        let segment = 0.5;
        let mut now = 0.0;
        let start = now;
        let mut max_lateness_ms: f64 = 0.0;

        for cycle in 0..2000u32 {
            let delay = jitter.next_delay(now, segment);
            // Timer fires between 0 and 12 ms late, in a repeating pattern
            let lateness_ms = ((cycle * 7) % 13) as f64;
            max_lateness_ms = max_lateness_ms.max(lateness_ms);
            now += delay.as_secs_f64() + lateness_ms / 1000.0;

            // Wake k+1 should sit at the end of segment k minus the lead
            let target = start + (cycle + 1) as f64 * segment - ANTICIPATION_MS / 1000.0;
            let drift_ms = (now - target) * 1000.0;
            assert!(
                drift_ms.abs() <= max_lateness_ms + 1e-3,
                "cycle {} drifted {} ms",
                cycle,
                drift_ms
            );
        }
    }

    #[test]
    fn test_oversized_segment_saturates() {
        let mut jitter = JitterCompensator::default();
        assert_eq!(jitter.next_delay(0.0, 1e300), Duration::MAX);
        assert_eq!(secs_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(secs_to_duration(-3.0), Duration::ZERO);
        assert_eq!(secs_to_duration(1.5), Duration::from_millis(1500));
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut jitter = JitterCompensator::default();
        jitter.next_delay(0.0, 1.0);
        jitter.next_delay(3.0, 1.0);
        jitter.reset();
        let delay = jitter.next_delay(50.0, 1.0);
        assert!((ms(delay) - 984.0).abs() < 1e-6);
    }
}
