//! Loudness metric for 16-bit PCM blocks.
//!
//! The calibrator works in a scaled RMS unit:
//!
//! | Quantity | Formula |
//! |----------|---------|
//! | normalised sample | `s / 32768` |
//! | RMS | `sqrt(mean(normalised²))` |
//! | metric | `RMS × 1000` |
//!
//! A full-scale square wave therefore reads `1000`, and a quiet room
//! typically sits somewhere in the tens.
//!
//! # Example
//!
//! ```rust
//! use voice_command::audio::rms_metric;
//!
//! // Constant amplitude A gives A / 32.768.
//! let block = vec![3_277_i16; 1_024];
//! assert!((rms_metric(&block) - 100.0).abs() < 0.01);
//! assert_eq!(rms_metric(&[]), 0.0);
//! ```

/// Full-scale value of a signed 16-bit sample.
const FULL_SCALE: f64 = 32_768.0;

/// Multiplier applied to the normalised RMS.
const METRIC_SCALE: f64 = 1_000.0;

/// Scaled RMS of `block`.  Returns `0.0` for an empty block.
pub fn rms_metric(block: &[i16]) -> f64 {
    if block.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = block
        .iter()
        .map(|&s| {
            let x = s as f64 / FULL_SCALE;
            x * x
        })
        .sum();
    (sum_sq / block.len() as f64).sqrt() * METRIC_SCALE
}

/// Constant sample amplitude that produces `metric`, rounded to the nearest
/// representable sample.  Handy for building synthetic blocks.
pub fn amplitude_for_metric(metric: f64) -> i16 {
    (metric / METRIC_SCALE * FULL_SCALE)
        .round()
        .clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_zero() {
        assert_eq!(rms_metric(&[0; 512]), 0.0);
    }

    #[test]
    fn sign_does_not_matter() {
        let pos = vec![1_000_i16; 256];
        let alternating: Vec<i16> = (0..256)
            .map(|i| if i % 2 == 0 { 1_000 } else { -1_000 })
            .collect();
        assert!((rms_metric(&pos) - rms_metric(&alternating)).abs() < 1e-9);
    }

    #[test]
    fn full_scale_reads_one_thousand() {
        let block = vec![i16::MIN; 64];
        assert!((rms_metric(&block) - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn mixed_block_uses_mean_square() {
        // Half the block at A, half at zero: metric = A/32.768 / sqrt(2).
        let mut block = vec![3_277_i16; 100];
        block.extend(vec![0_i16; 100]);
        let expected = 3_277.0 / 32.768 / 2.0_f64.sqrt();
        assert!((rms_metric(&block) - expected).abs() < 1e-6);
    }

    #[test]
    fn amplitude_for_metric_inverts_the_metric() {
        for metric in [2.0, 10.0, 50.0, 250.0] {
            let block = vec![amplitude_for_metric(metric); 32];
            assert!(
                (rms_metric(&block) - metric).abs() < 0.02,
                "metric {metric} read back as {}",
                rms_metric(&block)
            );
        }
    }
}
