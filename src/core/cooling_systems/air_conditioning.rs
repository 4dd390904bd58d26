// This module provides objects to model the central cooling plant of a
// building archetype.

use crate::core::material_properties::{CP_AIR, LATENT_HEAT_VAPORISATION};
use crate::core::units::ZERO_CELSIUS_IN_KELVIN;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

// Outdoor temperature at which the rated COP of air-cooled plant applies, in deg C
const COP_RATING_TEMP_C: f64 = 35.;
// Fractional COP loss per K of condenser air above the rating temperature
const COP_DERATE_PER_K: f64 = 0.015;
const COP_MIN: f64 = 1.;

// Supply air leaving the cooling coil, in deg C, and its humidity ratio in kg/kg
// (90% of the 7.8 g/kg saturation value at the coil temperature)
const COIL_LEAVING_TEMP_C: f64 = 10.;
const COIL_LEAVING_HUM: f64 = 0.9 * 0.0078;
// Smallest room-to-coil temperature difference used to size the supply flow, in K
const MIN_COIL_TEMP_DIFF: f64 = 1.;

/// Heat rejection path of the cooling plant condenser
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, EnumString, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub enum CondenserType {
    /// Air-cooled condenser: heat rejected as sensible heat, COP falls as the
    /// condenser air warms up
    #[default]
    #[serde(rename = "AIR")]
    #[strum(serialize = "AIR")]
    Air,
    /// Water-cooled condenser with evaporative cooling tower: heat rejected as
    /// latent heat
    #[serde(rename = "WAT")]
    #[strum(serialize = "WAT")]
    Water,
}

/// Return the COP adjusted for the condenser type and outdoor conditions
///
/// Arguments:
/// * `cop` - rated coefficient of performance
/// * `cond_type` - condenser type
/// * `condenser_air_temp` - temperature of the air around the condenser, in K
pub fn cop_adjusted(cop: f64, cond_type: CondenserType, condenser_air_temp: f64) -> f64 {
    match cond_type {
        CondenserType::Air => {
            let rating_temp = COP_RATING_TEMP_C + ZERO_CELSIUS_IN_KELVIN;
            let excess = (condenser_air_temp - rating_temp).max(0.);
            (cop * (1. - COP_DERATE_PER_K * excess)).max(COP_MIN.min(cop))
        }
        CondenserType::Water => cop,
    }
}

/// Outcome of a request for cooling, all in W per m2 of building footprint
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CoolingOutcome {
    pub sensible_delivered: f64,
    pub dehum_delivered: f64,
    pub unmet: f64,
    pub consumption: f64,
    pub sensible_waste: f64,
    pub latent_waste: f64,
}

impl CoolingOutcome {
    pub fn total_delivered(&self) -> f64 {
        self.sensible_delivered + self.dehum_delivered
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AirConditioning {
    cooling_capacity: f64,
    cop_adj: f64,
    cond_type: CondenserType,
}

impl AirConditioning {
    /// Construct an air conditioning object
    ///
    /// Arguments:
    /// * `cooling_capacity` - maximum cooling output, in W per m2 of footprint
    /// * `cop_adj` - coefficient of performance under current conditions
    /// * `cond_type` - condenser heat rejection path
    pub fn new(cooling_capacity: f64, cop_adj: f64, cond_type: CondenserType) -> Self {
        Self {
            cooling_capacity,
            cop_adj,
            cond_type,
        }
    }

    /// Latent load of drying the supply air needed to remove a sensible load
    ///
    /// The supply air volume is the one that absorbs the sensible load between
    /// room and coil temperature; moisture is removed down to the coil leaving
    /// humidity.
    fn dehumidification_demand(
        &self,
        sensible_demand: f64,
        indoor_temp: f64,
        indoor_hum: f64,
        density: f64,
    ) -> f64 {
        let coil_temp = COIL_LEAVING_TEMP_C + ZERO_CELSIUS_IN_KELVIN;
        let vol_cool =
            sensible_demand / (density * CP_AIR * (indoor_temp - coil_temp).max(MIN_COIL_TEMP_DIFF));
        (vol_cool * density * (indoor_hum - COIL_LEAVING_HUM) * LATENT_HEAT_VAPORISATION).max(0.)
    }

    /// Demand cooling from the system
    ///
    /// Sensible and dehumidification loads are scaled back together when they
    /// exceed the capacity; the shortfall is reported as unmet load.
    ///
    /// Arguments:
    /// * `sensible_demand` - sensible load to remove, in W per m2 of footprint
    /// * `indoor_temp` - indoor air temperature being held, in K
    /// * `indoor_hum` - indoor humidity ratio, in kg / kg
    /// * `density` - indoor air density, in kg / m3
    pub fn demand_energy(
        &self,
        sensible_demand: f64,
        indoor_temp: f64,
        indoor_hum: f64,
        density: f64,
    ) -> CoolingOutcome {
        if sensible_demand <= 0. {
            return CoolingOutcome::default();
        }

        let dehum_demand =
            self.dehumidification_demand(sensible_demand, indoor_temp, indoor_hum, density);
        let total_demand = sensible_demand + dehum_demand;

        let (sensible_delivered, dehum_delivered, unmet) = if total_demand > self.cooling_capacity
        {
            let scale = self.cooling_capacity / total_demand;
            (
                sensible_demand * scale,
                dehum_demand * scale,
                total_demand - self.cooling_capacity,
            )
        } else {
            (sensible_demand, dehum_demand, 0.)
        };

        let delivered = sensible_delivered + dehum_delivered;
        let consumption = delivered / self.cop_adj;
        let rejected = delivered + consumption;
        let (sensible_waste, latent_waste) = match self.cond_type {
            CondenserType::Air => (rejected, 0.),
            CondenserType::Water => (0., rejected),
        };

        CoolingOutcome {
            sensible_delivered,
            dehum_delivered,
            unmet,
            consumption,
            sensible_waste,
            latent_waste,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::str::FromStr;

    #[fixture]
    fn aircon() -> AirConditioning {
        AirConditioning::new(100., 4., CondenserType::Air)
    }

    #[rstest]
    fn test_cop_adjustment() {
        assert_eq!(cop_adjusted(5.2, CondenserType::Air, 300.), 5.2);
        assert_relative_eq!(
            cop_adjusted(5.2, CondenserType::Air, 313.15),
            5.2 * (1. - 0.015 * 5.),
            max_relative = 1e-12
        );
        assert_eq!(cop_adjusted(5.2, CondenserType::Air, 500.), 1.);
        assert_eq!(cop_adjusted(5.2, CondenserType::Water, 313.15), 5.2);
    }

    #[rstest]
    fn test_demand_energy_within_capacity(aircon: AirConditioning) {
        let outcome = aircon.demand_energy(40., 297., 0.012, 1.2);
        let dehum = 40. / (1.2 * 1004. * 13.85) * 1.2 * (0.012 - 0.9 * 0.0078) * 2.26e6;
        assert_relative_eq!(outcome.sensible_delivered, 40.);
        assert_relative_eq!(outcome.dehum_delivered, dehum, max_relative = 1e-9);
        assert_eq!(outcome.unmet, 0.);
        assert_relative_eq!(outcome.consumption, (40. + dehum) / 4., max_relative = 1e-12);
        assert_relative_eq!(
            outcome.sensible_waste,
            (40. + dehum) * 1.25,
            max_relative = 1e-12
        );
        assert_eq!(outcome.latent_waste, 0.);
    }

    #[rstest]
    fn test_demand_energy_limited_by_capacity(aircon: AirConditioning) {
        let outcome = aircon.demand_energy(150., 297., 0.012, 1.2);
        assert_relative_eq!(outcome.total_delivered(), 100., max_relative = 1e-12);
        assert!(outcome.unmet > 50.);
        assert_relative_eq!(outcome.consumption, 25., max_relative = 1e-12);
    }

    #[rstest]
    fn test_no_demand_for_heating_load(aircon: AirConditioning) {
        assert_eq!(
            aircon.demand_energy(-10., 293., 0.012, 1.2),
            CoolingOutcome::default()
        );
    }

    #[rstest]
    fn test_water_cooled_rejects_latent_heat() {
        let aircon = AirConditioning::new(100., 5., CondenserType::Water);
        let outcome = aircon.demand_energy(50., 297., 0.005, 1.2);
        assert_eq!(outcome.dehum_delivered, 0.);
        assert_eq!(outcome.sensible_waste, 0.);
        assert_relative_eq!(outcome.latent_waste, 60.);
    }

    #[rstest]
    fn test_condenser_type_parses_from_tag() {
        assert_eq!(CondenserType::from_str("WAT").unwrap(), CondenserType::Water);
        assert_eq!(CondenserType::Air.to_string(), "AIR");
    }
}
