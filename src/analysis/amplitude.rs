// Amplitude statistics - the two scalar loudness measures used by the monitor
//
// Calibration summarises a whole recording with RMS; live ticks use the mean
// absolute amplitude of a short window.

/// Root-mean-square amplitude: sqrt(mean(x^2))
///
/// Returns `None` for an empty sequence instead of dividing by zero.
pub fn rms(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum_sq: f64 = samples.iter().map(|s| s * s).sum();
    Some((sum_sq / samples.len() as f64).sqrt())
}

/// Mean absolute amplitude: mean(|x|)
///
/// An empty window reads as silence (0.0).
pub fn mean_abs(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.abs()).sum::<f64>() / samples.len() as f64
}

/// Round to a fixed number of decimal places, matching the precision the
/// threshold calculator reads from formatted samples.
pub fn quantize(value: f64, decimal_places: usize) -> f64 {
    format!("{:.*}", decimal_places, value)
        .parse::<f64>()
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_constant_is_magnitude() {
        for v in [0.3, -0.3, 1e-7, -0.75] {
            let samples = vec![v; 1_000];
            let value = rms(&samples).unwrap();
            assert!((value - f64::abs(v)).abs() < 1e-12, "rms({}) = {}", v, value);
        }
    }

    #[test]
    fn test_rms_known_values() {
        // sqrt((9 + 16) / 2)
        let value = rms(&[3.0, -4.0]).unwrap();
        assert!((value - 12.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_rms_empty_is_none() {
        assert!(rms(&[]).is_none());
    }

    #[test]
    fn test_mean_abs() {
        assert_eq!(mean_abs(&[0.5, -0.5, 0.25, -0.25]), 0.375);
        assert_eq!(mean_abs(&[]), 0.0);
        assert_eq!(mean_abs(&[0.0; 2_048]), 0.0);
    }

    #[test]
    fn test_quantize_rounds_to_fixed_places() {
        assert_eq!(quantize(0.000_000_500_4, 9), 0.000_000_5);
        assert_eq!(quantize(0.000_000_000_4, 9), 0.0);
        assert_eq!(quantize(0.123_456_789_9, 9), 0.123_456_790);
    }
}
