//! Confidence scoring for interpolation results.
//!
//! The score indicates how close a query sits to actual measured data; it
//! is not a statistical error bound. One full normalization unit of
//! distance from the nearest data is worth the entire 0-100 range.

/// Confidence for distance-weighted results (IDW, bilinear fallback):
/// exact match yields 100, a nearest-point distance of one normalized
/// unit or more yields 0.
pub fn from_nearest_distance(nearest_distance: f64) -> f64 {
    ((1.0 - nearest_distance) * 100.0).round().clamp(0.0, 100.0)
}

/// Confidence for bracketed results (linear/cubic/bilinear): 100 anywhere
/// inside the bracketing domain, decreasing linearly to 0 as the distance
/// beyond the domain approaches one normalization unit.
///
/// The engine itself never extrapolates with the bracketed methods; this
/// is for callers that choose to extrapolate deliberately.
pub fn from_domain_excess(excess_normalized: f64) -> f64 {
    if excess_normalized <= 0.0 {
        return 100.0;
    }
    ((1.0 - excess_normalized) * 100.0).round().clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_distance_scale() {
        assert_eq!(from_nearest_distance(0.0), 100.0);
        assert_eq!(from_nearest_distance(0.25), 75.0);
        assert_eq!(from_nearest_distance(1.0), 0.0);
        // Beyond one unit clamps rather than going negative.
        assert_eq!(from_nearest_distance(3.5), 0.0);
        // Cannot exceed 100 even for a (theoretical) negative distance.
        assert_eq!(from_nearest_distance(-0.1), 100.0);
    }

    #[test]
    fn test_domain_excess_scale() {
        assert_eq!(from_domain_excess(0.0), 100.0);
        assert_eq!(from_domain_excess(-5.0), 100.0);
        assert_eq!(from_domain_excess(0.5), 50.0);
        assert_eq!(from_domain_excess(1.0), 0.0);
        assert_eq!(from_domain_excess(2.0), 0.0);
    }
}
