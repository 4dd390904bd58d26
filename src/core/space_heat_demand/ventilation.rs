// Outdoor air exchange of a building: uncontrolled infiltration and
// mechanical ventilation. Flows are expressed per m2 of building footprint.

use crate::core::material_properties::{CP_AIR, LATENT_HEAT_VAPORISATION};
use crate::core::units::air_changes_to_flow_per_area;

/// Outdoor air flows entering (and leaving) the building
///
/// Arguments:
/// * `infiltration` - infiltration flow, in m3 / s per m2 of footprint
/// * `ventilation` - mechanical ventilation flow, in m3 / s per m2 of footprint
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AirExchange {
    infiltration: f64,
    ventilation: f64,
}

impl AirExchange {
    /// Arguments:
    /// * `infil_ach` - infiltration air change rate, in 1/h
    /// * `vent_per_floor_area` - ventilation rate, in m3 / s per m2 of floor area
    /// * `bld_height` - building height, in m
    /// * `n_floor` - number of floors
    pub fn new(infil_ach: f64, vent_per_floor_area: f64, bld_height: f64, n_floor: f64) -> Self {
        Self {
            infiltration: air_changes_to_flow_per_area(infil_ach, bld_height),
            ventilation: vent_per_floor_area * n_floor,
        }
    }

    pub fn infiltration_flow(&self) -> f64 {
        self.infiltration
    }

    pub fn ventilation_flow(&self) -> f64 {
        self.ventilation
    }

    /// Heat transfer coefficients (W / K per m2 of footprint) of infiltration
    /// and ventilation for air of the given density (kg / m3)
    pub fn sensible_coefficients(&self, density: f64) -> (f64, f64) {
        (
            self.infiltration * density * CP_AIR,
            self.ventilation * density * CP_AIR,
        )
    }

    /// Latent heat brought in by infiltration and ventilation, in W per m2 of
    /// footprint, for a difference in humidity ratio (outdoor - indoor, kg / kg)
    pub fn latent_gains(&self, density: f64, humidity_difference: f64) -> (f64, f64) {
        let latent_per_flow = density * LATENT_HEAT_VAPORISATION * humidity_difference;
        (
            self.infiltration * latent_per_flow,
            self.ventilation * latent_per_flow,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::*;

    #[fixture]
    fn air_exchange() -> AirExchange {
        AirExchange::new(0.26, 0.0005, 36., 10.)
    }

    #[rstest]
    fn should_convert_rates_to_footprint_flows(air_exchange: AirExchange) {
        assert_relative_eq!(air_exchange.infiltration_flow(), 0.0026);
        assert_relative_eq!(air_exchange.ventilation_flow(), 0.005);
    }

    #[rstest]
    fn should_calculate_sensible_coefficients(air_exchange: AirExchange) {
        let (h_infil, h_vent) = air_exchange.sensible_coefficients(1.2);
        assert_relative_eq!(h_infil, 0.0026 * 1.2 * 1004.);
        assert_relative_eq!(h_vent, 0.005 * 1.2 * 1004.);
    }

    #[rstest]
    fn should_calculate_latent_gains(air_exchange: AirExchange) {
        let (infil, vent) = air_exchange.latent_gains(1.2, 0.002);
        assert_relative_eq!(infil, 0.0026 * 1.2 * 2.26e6 * 0.002);
        assert_relative_eq!(vent, 0.005 * 1.2 * 2.26e6 * 0.002);
        let (dry_infil, _) = air_exchange.latent_gains(1.2, -0.002);
        assert!(dry_infil < 0.);
    }
}
