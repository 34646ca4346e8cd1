//! Analytic ISA atmosphere correction for a single baseline figure.
//!
//! Used when a manufacturer's table provides one standard-condition
//! distance and no measured curve covers the actual condition. The
//! coefficients are a fixed, documented approximation (not an empirical
//! fit): downstream runway-sufficiency checks depend on this exact
//! scaling, so they must not be tuned.

use serde::{Deserialize, Serialize};

use crate::PerfError;

pub const ISA_SEA_LEVEL_TEMP_C: f64 = 15.0;
/// ISA lapse rate expressed per foot (2 C per 1000 ft).
pub const ISA_LAPSE_C_PER_FT: f64 = 0.002;

const ALTITUDE_FACTOR_PER_1000_FT: f64 = 0.1;
const TEMP_FACTOR_PER_10_C: f64 = 0.1;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct CorrectionResult {
    pub corrected_distance: f64,
    pub correction_factor: f64,
    pub isa_temp: f64,
    pub delta_t: f64,
}

/// ISA temperature at the given pressure altitude.
pub fn isa_temperature(altitude_ft: f64) -> f64 {
    ISA_SEA_LEVEL_TEMP_C - altitude_ft * ISA_LAPSE_C_PER_FT
}

/// Scale a baseline distance for actual pressure altitude and outside air
/// temperature: +10% per 1000 ft, +10% per 10 C above ISA. A factor below
/// 1 (cold, low conditions) is legitimate, not an error.
pub fn correct_distance(
    baseline_distance: f64,
    altitude_ft: f64,
    oat_c: f64,
) -> Result<CorrectionResult, PerfError> {
    for (name, value) in [
        ("baseline distance", baseline_distance),
        ("altitude", altitude_ft),
        ("temperature", oat_c),
    ] {
        if !value.is_finite() {
            return Err(PerfError::Validation(format!(
                "{} is not finite: {}",
                name, value
            )));
        }
    }

    let isa_temp = isa_temperature(altitude_ft);
    let delta_t = oat_c - isa_temp;
    let correction_factor = 1.0
        + (altitude_ft / 1000.0) * ALTITUDE_FACTOR_PER_1000_FT
        + (delta_t / 10.0) * TEMP_FACTOR_PER_10_C;

    Ok(CorrectionResult {
        corrected_distance: (baseline_distance * correction_factor).round(),
        correction_factor,
        isa_temp,
        delta_t,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_day_sea_level_identity() {
        let result = correct_distance(500.0, 0.0, 15.0).unwrap();
        assert_eq!(result.correction_factor, 1.0);
        assert_eq!(result.corrected_distance, 500.0);
        assert_eq!(result.delta_t, 0.0);
    }

    #[test]
    fn test_hot_and_high() {
        // 2000 ft, 25 C: ISA 11, dT 14, factor 1 + 0.2 + 0.14.
        let result = correct_distance(500.0, 2000.0, 25.0).unwrap();
        assert!((result.isa_temp - 11.0).abs() < 1e-12);
        assert!((result.delta_t - 14.0).abs() < 1e-12);
        assert!((result.correction_factor - 1.34).abs() < 1e-12);
        assert_eq!(result.corrected_distance, 670.0);
    }

    #[test]
    fn test_cold_low_factor_below_one() {
        let result = correct_distance(500.0, 0.0, -15.0).unwrap();
        assert!(result.correction_factor < 1.0);
        assert!((result.correction_factor - 0.7).abs() < 1e-12);
        assert_eq!(result.corrected_distance, 350.0);
    }

    #[test]
    fn test_isa_temperature_lapse() {
        assert_eq!(isa_temperature(0.0), 15.0);
        assert_eq!(isa_temperature(1000.0), 13.0);
        assert!((isa_temperature(2000.0) - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        assert!(matches!(
            correct_distance(f64::NAN, 0.0, 15.0),
            Err(PerfError::Validation(_))
        ));
        assert!(matches!(
            correct_distance(500.0, f64::INFINITY, 15.0),
            Err(PerfError::Validation(_))
        ));
    }
}
