use crate::errors::BemError;
use crate::simulation_time::{SimulationTimeIteration, SolverSettings};
use serde::{Deserialize, Serialize};

/// Boundary conditions imposed on a building archetype for one timestep,
/// normally supplied by the urban canopy model
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[serde(deny_unknown_fields)]
pub struct BemForcing {
    /// Air temperature above the canopy (seen by the roof), in K
    pub outdoor_temp: f64,
    /// Air pressure, in Pa
    pub pressure: f64,
    /// Air temperature in the urban canyon, in K
    pub canyon_temp: f64,
    /// Humidity ratio in the urban canyon, in kg / kg
    pub canyon_hum: f64,
    /// Wind speed near the building surfaces, in m / s
    pub wind_speed: f64,
    /// Solar radiation incident on the walls, in W / m2
    pub solar_wall: f64,
    /// Solar radiation incident on the roof, in W / m2
    pub solar_roof: f64,
    /// Incoming long-wave radiation at the walls, in W / m2
    pub longwave_wall: f64,
    /// Incoming long-wave radiation at the roof, in W / m2
    pub longwave_roof: f64,
    pub is_night: bool,
    pub vegetation_active: bool,
    /// Scheduled equipment load, in W / m2 of floor area
    #[serde(default)]
    pub elec: f64,
    /// Scheduled lighting load, in W / m2 of floor area
    #[serde(default)]
    pub light: f64,
    /// Scheduled gas load (e.g. water heating), in W / m2 of floor area
    #[serde(default)]
    pub gas: f64,
}

/// One row of a forcing time series, as read from CSV. The day/night and
/// vegetation flags are derived from the simulation time.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct ForcingRecord {
    pub outdoor_temp: f64,
    pub pressure: f64,
    pub canyon_temp: f64,
    pub canyon_hum: f64,
    pub wind_speed: f64,
    pub solar_wall: f64,
    pub solar_roof: f64,
    pub longwave_wall: f64,
    pub longwave_roof: f64,
    #[serde(default)]
    pub elec: f64,
    #[serde(default)]
    pub light: f64,
    #[serde(default)]
    pub gas: f64,
}

impl ForcingRecord {
    pub fn to_forcing(
        &self,
        iteration: &SimulationTimeIteration,
        settings: &SolverSettings,
    ) -> BemForcing {
        BemForcing {
            outdoor_temp: self.outdoor_temp,
            pressure: self.pressure,
            canyon_temp: self.canyon_temp,
            canyon_hum: self.canyon_hum,
            wind_speed: self.wind_speed,
            solar_wall: self.solar_wall,
            solar_roof: self.solar_roof,
            longwave_wall: self.longwave_wall,
            longwave_roof: self.longwave_roof,
            is_night: iteration.is_night(settings),
            vegetation_active: iteration.vegetation_active(),
            elec: self.elec,
            light: self.light,
            gas: self.gas,
        }
    }
}

/// Read a forcing time series from CSV with a header row
pub fn read_forcing_csv(reader: impl std::io::Read) -> anyhow::Result<Vec<ForcingRecord>> {
    csv::Reader::from_reader(reader)
        .deserialize()
        .collect::<Result<Vec<ForcingRecord>, _>>()
        .map_err(anyhow::Error::from)
}

/// Urban form around the archetype
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[serde(deny_unknown_fields)]
pub struct UrbanGeometry {
    /// Average building height, in m
    pub bld_height: f64,
    /// Ratio of vertical (facade) area to horizontal (site) area
    pub ver_to_hor: f64,
    /// Fraction of the site covered by buildings
    pub bld_density: f64,
}

impl UrbanGeometry {
    pub fn new(bld_height: f64, ver_to_hor: f64, bld_density: f64) -> Result<Self, BemError> {
        let geometry = Self {
            bld_height,
            ver_to_hor,
            bld_density,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Check the geometry describes a built-up site. Needed for values read
    /// directly from configuration.
    pub fn validate(&self) -> Result<(), BemError> {
        if !(self.bld_height.is_finite() && self.bld_height > 0.) {
            return Err(BemError::InvalidGeometry(format!(
                "building height must be positive, got {}",
                self.bld_height
            )));
        }
        if !(self.ver_to_hor.is_finite() && self.ver_to_hor >= 0.) {
            return Err(BemError::InvalidGeometry(format!(
                "vertical to horizontal ratio must not be negative, got {}",
                self.ver_to_hor
            )));
        }
        if !(self.bld_density > 0. && self.bld_density <= 1.) {
            return Err(BemError::InvalidGeometry(format!(
                "building density must be in (0, 1], got {}",
                self.bld_density
            )));
        }
        Ok(())
    }

    /// Facade area per m2 of building footprint
    pub fn facade_area_per_footprint(&self) -> f64 {
        self.ver_to_hor / self.bld_density
    }
}

/// Design-day conditions used to size the HVAC plant
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[serde(deny_unknown_fields)]
pub struct DesignConditions {
    /// Outdoor design temperature for cooling, in K
    pub cooling_temp: f64,
    /// Outdoor design temperature for heating, in K
    pub heating_temp: f64,
    /// Outdoor design humidity ratio, in kg / kg
    #[serde(default = "default_design_humidity")]
    pub humidity: f64,
    /// Air pressure, in Pa
    #[serde(default = "default_design_pressure")]
    pub pressure: f64,
    /// Solar radiation on the walls at the cooling design condition, in W / m2
    #[serde(default)]
    pub solar_wall: f64,
    /// Solar radiation on the roof at the cooling design condition, in W / m2
    #[serde(default)]
    pub solar_roof: f64,
    #[serde(default)]
    pub wind_speed: f64,
    /// Replace the rated cooling capacity with the sized one
    #[serde(default)]
    pub autosize_cooling: bool,
}

fn default_design_humidity() -> f64 {
    0.01
}

fn default_design_pressure() -> f64 {
    101_325.
}

impl DesignConditions {
    pub fn new(cooling_temp: f64, heating_temp: f64) -> Self {
        Self {
            cooling_temp,
            heating_temp,
            humidity: default_design_humidity(),
            pressure: default_design_pressure(),
            solar_wall: 0.,
            solar_roof: 0.,
            wind_speed: 0.,
            autosize_cooling: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    #[rstest]
    fn should_deserialize_forcing_with_default_schedules() {
        let forcing: BemForcing = serde_json::from_value(json!({
            "outdoor_temp": 300.,
            "pressure": 101325.,
            "canyon_temp": 301.,
            "canyon_hum": 0.012,
            "wind_speed": 2.,
            "solar_wall": 150.,
            "solar_roof": 600.,
            "longwave_wall": 400.,
            "longwave_roof": 380.,
            "is_night": false,
            "vegetation_active": true,
        }))
        .unwrap();
        assert_eq!(forcing.elec, 0.);
        assert_eq!(forcing.gas, 0.);
        assert_eq!(forcing.canyon_temp, 301.);
    }

    #[rstest]
    fn should_reject_unknown_geometry_field() {
        let result = serde_json::from_value::<UrbanGeometry>(json!({
            "bld_height": 10.,
            "ver_to_hor": 0.5,
            "bld_density": 0.4,
            "road_width": 12.,
        }));
        assert!(result.is_err());
    }

    #[rstest]
    fn should_read_forcing_csv_and_derive_flags() {
        let csv = "outdoor_temp,pressure,canyon_temp,canyon_hum,wind_speed,\
solar_wall,solar_roof,longwave_wall,longwave_roof,elec\n\
300,101325,301,0.012,2,150,600,400,380,8\n";
        let records = read_forcing_csv(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].elec, 8.);
        assert_eq!(records[0].light, 0.);

        let iteration = SimulationTimeIteration {
            index: 0,
            time: 3982.5,
            timestep: 300.,
        };
        let forcing = records[0].to_forcing(&iteration, &SolverSettings::default());
        assert!(forcing.is_night);
        assert!(forcing.vegetation_active);
        assert_eq!(forcing.canyon_temp, 301.);
    }

    #[rstest]
    fn should_calculate_facade_area() {
        assert_relative_eq!(
            UrbanGeometry::new(10., 0.5, 0.4)
                .unwrap()
                .facade_area_per_footprint(),
            1.25
        );
    }

    #[rstest]
    #[case(0., 0.5, 0.4)]
    #[case(-10., 0.5, 0.4)]
    #[case(f64::NAN, 0.5, 0.4)]
    #[case(10., -0.1, 0.4)]
    #[case(10., 0.5, 0.)]
    #[case(10., 0.5, 1.2)]
    fn should_reject_invalid_geometry(
        #[case] bld_height: f64,
        #[case] ver_to_hor: f64,
        #[case] bld_density: f64,
    ) {
        assert!(matches!(
            UrbanGeometry::new(bld_height, ver_to_hor, bld_density),
            Err(BemError::InvalidGeometry(_))
        ));
    }

    #[rstest]
    fn should_accept_open_site_geometry() {
        let geometry = UrbanGeometry::new(10., 0., 1.).unwrap();
        assert_eq!(geometry.facade_area_per_footprint(), 0.);
    }

    #[rstest]
    fn should_apply_design_condition_defaults() {
        let design: DesignConditions =
            serde_json::from_value(json!({"cooling_temp": 306., "heating_temp": 283.})).unwrap();
        assert_eq!(design, DesignConditions::new(306., 283.));
    }
}
