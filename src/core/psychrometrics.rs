use crate::core::units::{kelvin_to_celsius, BelowAbsoluteZeroError, PASCALS_PER_KILOPASCAL};

// Moist air relations from ASHRAE Handbook Fundamentals (2009), chapter 1.

/// Ratio of molecular masses of water vapour and dry air
const MOLECULAR_MASS_RATIO: f64 = 0.621945;
/// Gas constant of dry air, in kJ / (kg.K)
const R_DRY_AIR: f64 = 0.287042;

// Hyland-Wexler saturation pressure coefficients over ice (eqn 5)
const C1: f64 = -5.674_535_9e3;
const C2: f64 = 6.392_524_7;
const C3: f64 = -9.677_843e-3;
const C4: f64 = 6.221_570_1e-7;
const C5: f64 = 2.074_782_5e-9;
const C6: f64 = -9.484_024e-13;
const C7: f64 = 4.163_501_9;

// Hyland-Wexler saturation pressure coefficients over liquid water (eqn 6)
const C8: f64 = -5.800_220_6e3;
const C9: f64 = 1.391_499_3;
const C10: f64 = -4.864_023_9e-2;
const C11: f64 = 4.176_476_8e-5;
const C12: f64 = -1.445_209_3e-8;
const C13: f64 = 6.545_967_3;

/// Saturation pressure of water vapour, in Pa
///
/// Arguments:
/// * `temp` - dry bulb temperature, in K
pub fn saturation_vapour_pressure(temp: f64) -> Result<f64, BelowAbsoluteZeroError> {
    let temp_c = kelvin_to_celsius(temp)?;
    let ln_pws = if temp_c < 0. {
        C1 / temp
            + C2
            + C3 * temp
            + C4 * temp.powi(2)
            + C5 * temp.powi(3)
            + C6 * temp.powi(4)
            + C7 * temp.ln()
    } else {
        C8 / temp + C9 + C10 * temp + C11 * temp.powi(2) + C12 * temp.powi(3) + C13 * temp.ln()
    };

    Ok(ln_pws.exp())
}

/// Partial pressure of water vapour, in Pa, for a humidity ratio (kg/kg) and
/// total pressure (Pa)
pub fn vapour_pressure(humidity_ratio: f64, pressure: f64) -> f64 {
    pressure * humidity_ratio / (MOLECULAR_MASS_RATIO + humidity_ratio)
}

/// Humidity ratio, in kg water / kg dry air, for a vapour partial pressure and
/// total pressure (both Pa)
pub fn humidity_ratio(vapour_pressure: f64, pressure: f64) -> f64 {
    MOLECULAR_MASS_RATIO * vapour_pressure / (pressure - vapour_pressure)
}

/// Humidity ratio of saturated air at the given temperature (K) and pressure (Pa)
pub fn saturation_humidity_ratio(temp: f64, pressure: f64) -> Result<f64, BelowAbsoluteZeroError> {
    Ok(humidity_ratio(saturation_vapour_pressure(temp)?, pressure))
}

/// Relative humidity, in %, of air at the given temperature (K), humidity
/// ratio (kg/kg) and pressure (Pa)
pub fn relative_humidity(
    temp: f64,
    humidity_ratio: f64,
    pressure: f64,
) -> Result<f64, BelowAbsoluteZeroError> {
    Ok(vapour_pressure(humidity_ratio, pressure) / saturation_vapour_pressure(temp)? * 100.)
}

/// Density of moist air, in kg of dry air / m3
///
/// Arguments:
/// * `pressure` - total pressure, in Pa
/// * `temp` - dry bulb temperature, in K
/// * `humidity_ratio` - in kg / kg
pub fn moist_air_density(pressure: f64, temp: f64, humidity_ratio: f64) -> f64 {
    pressure
        / (PASCALS_PER_KILOPASCAL as f64
            * R_DRY_AIR
            * temp
            * (1. + 1.607858 * humidity_ratio))
}
