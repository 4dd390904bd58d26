use thiserror::Error;

pub const SECONDS_PER_HOUR: u32 = 3_600;
pub const PASCALS_PER_KILOPASCAL: u32 = 1_000;

pub const ZERO_CELSIUS_IN_KELVIN: f64 = 273.15;

/// Stefan-Boltzmann constant, in W / (m2.K4)
pub const STEFAN_BOLTZMANN: f64 = 5.67e-8;

pub(crate) fn celsius_to_kelvin(temp_c: f64) -> Result<f64, BelowAbsoluteZeroError> {
    if temp_c < -ZERO_CELSIUS_IN_KELVIN {
        Err(BelowAbsoluteZeroError::from_c(temp_c))
    } else {
        Ok(temp_c + ZERO_CELSIUS_IN_KELVIN)
    }
}

pub(crate) fn kelvin_to_celsius(temp_k: f64) -> Result<f64, BelowAbsoluteZeroError> {
    if temp_k < 0.0 {
        Err(BelowAbsoluteZeroError::from_k(temp_k))
    } else {
        Ok(temp_k - ZERO_CELSIUS_IN_KELVIN)
    }
}

/// Convert an air change rate (1/h) for a space of the given height (m) into
/// a volumetric flow per unit of footprint area, in m3 / (s.m2)
pub(crate) fn air_changes_to_flow_per_area(air_changes_per_hour: f64, height: f64) -> f64 {
    air_changes_per_hour * height / SECONDS_PER_HOUR as f64
}

#[derive(Debug, Error)]
#[error("A temperature of {k}K/{}ºC was encountered, which is less than absolute zero", k - ZERO_CELSIUS_IN_KELVIN)]
pub struct BelowAbsoluteZeroError {
    k: f64,
}

impl BelowAbsoluteZeroError {
    fn from_k(k: f64) -> Self {
        Self { k }
    }

    fn from_c(c: f64) -> Self {
        Self {
            k: c + ZERO_CELSIUS_IN_KELVIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::*;

    #[rstest]
    fn should_convert_celsius_to_kelvin() {
        assert_relative_eq!(celsius_to_kelvin(20.).unwrap(), 293.15);
        assert!(celsius_to_kelvin(-300.).is_err());
    }

    #[rstest]
    fn should_convert_kelvin_to_celsius() {
        assert_relative_eq!(kelvin_to_celsius(293.15).unwrap(), 20., epsilon = 1e-12);
        assert!(kelvin_to_celsius(-1.).is_err());
    }

    #[rstest]
    fn should_convert_air_changes_to_flow() {
        // 0.5 ACH over a 36m tall block is 18 m3 of air per m2 footprint per hour
        assert_relative_eq!(air_changes_to_flow_per_area(0.5, 36.), 0.005);
    }
}
