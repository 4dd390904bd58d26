use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// This module provides object(s) to model the space heating plant of a
/// building archetype.

/// Energy carrier consumed by the heating plant
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, EnumString, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub enum HeatingSource {
    /// Combustion heating: the part of the fuel energy not delivered to the
    /// building leaves through the flue as sensible waste heat
    #[default]
    Fuel,
    /// Electric resistance heating
    Electric,
}

/// Outcome of a request for heating, all in W per m2 of building footprint
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeatingOutcome {
    pub delivered: f64,
    pub unmet: f64,
    pub consumption: f64,
    pub sensible_waste: f64,
}

/// Type to represent the heating plant
#[derive(Clone, Copy, Debug)]
pub struct SpaceHeater {
    heating_capacity: f64,
    efficiency: f64,
    source: HeatingSource,
}

impl SpaceHeater {
    /// Arguments
    /// * `heating_capacity` - maximum heat output, in W per m2 of footprint
    /// * `efficiency` - ratio of heat delivered to energy consumed
    /// * `source` - energy carrier consumed
    pub fn new(heating_capacity: f64, efficiency: f64, source: HeatingSource) -> Self {
        Self {
            heating_capacity,
            efficiency,
            source,
        }
    }

    pub fn source(&self) -> HeatingSource {
        self.source
    }

    /// Demand heat (in W per m2 of footprint) from the heater
    pub fn demand_energy(&self, heat_demand: f64) -> HeatingOutcome {
        if heat_demand <= 0. {
            return HeatingOutcome::default();
        }

        let delivered = heat_demand.min(self.heating_capacity);
        let consumption = delivered / self.efficiency;
        let sensible_waste = match self.source {
            HeatingSource::Fuel => consumption - delivered,
            HeatingSource::Electric => 0.,
        };

        HeatingOutcome {
            delivered,
            unmet: heat_demand - delivered,
            consumption,
            sensible_waste,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    pub fn space_heater() -> SpaceHeater {
        SpaceHeater::new(50., 0.8, HeatingSource::Fuel)
    }

    #[rstest]
    pub fn should_calc_demand_energy(space_heater: SpaceHeater) {
        let demand = [40.0, 100.0, 0.0, -20.0];
        let delivered_expected = [40.0, 50.0, 0.0, 0.0];
        let unmet_expected = [0.0, 50.0, 0.0, 0.0];
        for (t_idx, heat_demand) in demand.iter().enumerate() {
            let outcome = space_heater.demand_energy(*heat_demand);
            assert_eq!(outcome.delivered, delivered_expected[t_idx]);
            assert_eq!(outcome.unmet, unmet_expected[t_idx]);
        }
    }

    #[rstest]
    pub fn should_reject_flue_losses_of_fuel_heating(space_heater: SpaceHeater) {
        let outcome = space_heater.demand_energy(40.);
        assert_relative_eq!(outcome.consumption, 50.);
        assert_relative_eq!(outcome.sensible_waste, 10.);
    }

    #[rstest]
    pub fn should_not_reject_heat_for_electric_heating() {
        let heater = SpaceHeater::new(50., 1., HeatingSource::Electric);
        let outcome = heater.demand_energy(40.);
        assert_eq!(outcome.consumption, 40.);
        assert_eq!(outcome.sensible_waste, 0.);
        assert_eq!(heater.source().to_string(), "Electric");
    }
}
