use crate::core::space_heat_demand::building::{
    h_in_ceiling, Building, BuildingOverrides, BuildingPhase, BuildingState, ElementFluxes,
    SurfaceTemps, H_IN_MASS, H_IN_WALL,
};
use crate::core::space_heat_demand::building_element::{Boundary, Element};
use crate::errors::BemError;
use crate::external_conditions::{BemForcing, DesignConditions, UrbanGeometry};
use crate::input::{
    building_type_from_index, built_era_from_index, check_mapping_type, climate_zone_from_index,
    BemDefRecord, BuildingRecord, BuildingType, BuiltEra, ClimateZone, ElementRecord,
    BEMDEF_FORMAT_VERSION, BEMDEF_TYPE_TAG,
};
use crate::simulation_time::SolverSettings;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Custom archetype data replacing the reference parameters of a definition
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ArchetypeOverrides {
    pub floor_height: Option<f64>,
    pub canyon_fraction: Option<f64>,
    pub glazing_ratio: Option<f64>,
    pub shgc: Option<f64>,
    pub wall_albedo: Option<f64>,
    pub roof_albedo: Option<f64>,
    pub roof_veg_coverage: Option<f64>,
}

impl ArchetypeOverrides {
    fn building(&self) -> BuildingOverrides {
        BuildingOverrides {
            floor_height: self.floor_height,
            canyon_fraction: self.canyon_fraction,
            glazing_ratio: self.glazing_ratio,
            shgc: self.shgc,
            ..Default::default()
        }
    }
}

/// A building archetype: the building with its internal mass, wall and roof
/// constructions, and its share of the urban building stock
#[derive(Clone, Debug)]
pub struct BemDef {
    building: Building,
    mass: Element,
    wall: Element,
    roof: Element,
    frac: f64,
    bldtype: BuildingType,
    builtera: BuiltEra,
    zonetype: ClimateZone,
}

impl BemDef {
    /// Arguments:
    /// * `building` - building parameters and state
    /// * `mass` - internal mass (floors), node 0 facing the indoor air
    /// * `wall` - external wall, outside to inside
    /// * `roof` - roof, outside to inside
    /// * `frac` - share of the urban building stock, between 0 and 1
    /// * `bldtype` - building type
    /// * `builtera` - construction era
    /// * `zonetype` - climate zone
    pub fn new(
        building: Building,
        mass: Element,
        wall: Element,
        roof: Element,
        frac: f64,
        bldtype: BuildingType,
        builtera: BuiltEra,
        zonetype: ClimateZone,
    ) -> Result<Self, BemError> {
        if !(0. ..=1.).contains(&frac) {
            return Err(BemError::InvalidBuilding(format!(
                "archetype fraction {frac} outside [0, 1]"
            )));
        }
        Ok(Self {
            building,
            mass,
            wall,
            roof,
            frac,
            bldtype,
            builtera,
            zonetype,
        })
    }

    pub fn building(&self) -> &Building {
        &self.building
    }

    pub fn mass(&self) -> &Element {
        &self.mass
    }

    pub fn wall(&self) -> &Element {
        &self.wall
    }

    pub fn roof(&self) -> &Element {
        &self.roof
    }

    pub fn frac(&self) -> f64 {
        self.frac
    }

    pub fn bldtype(&self) -> BuildingType {
        self.bldtype
    }

    pub fn builtera(&self) -> BuiltEra {
        self.builtera
    }

    pub fn zonetype(&self) -> ClimateZone {
        self.zonetype
    }

    /// Apply custom archetype data; only possible before sizing
    pub fn apply_overrides(&mut self, overrides: &ArchetypeOverrides) -> Result<(), BemError> {
        if self.building.phase() != BuildingPhase::Uninitialized {
            return Err(BemError::AlreadySized);
        }
        let mut wall = self.wall.clone();
        let mut roof = self.roof.clone();
        if let Some(albedo) = overrides.wall_albedo {
            wall.set_albedo(albedo)?;
        }
        if let Some(albedo) = overrides.roof_albedo {
            roof.set_albedo(albedo)?;
        }
        if let Some(veg_coverage) = overrides.roof_veg_coverage {
            roof.set_veg_coverage(veg_coverage)?;
        }
        self.building.apply_overrides(&overrides.building())?;
        self.wall = wall;
        self.roof = roof;
        Ok(())
    }

    pub fn autosize(
        &mut self,
        design: &DesignConditions,
        geometry: &UrbanGeometry,
    ) -> Result<(), BemError> {
        self.building
            .autosize(design, geometry, &self.wall, &self.roof)
    }

    /// Advance the archetype by one timestep: conduction through the
    /// envelope followed by the indoor energy balance
    pub fn step(
        &mut self,
        forcing: &BemForcing,
        geometry: &UrbanGeometry,
        settings: &SolverSettings,
    ) -> Result<&BuildingState, BemError> {
        match self.building.phase() {
            BuildingPhase::Uninitialized => return Err(BemError::NotSized),
            BuildingPhase::Faulted => return Err(BemError::Faulted),
            BuildingPhase::Sized | BuildingPhase::Stepping => {}
        }
        geometry.validate()?;

        let dt = settings.dt;
        let max_fo = settings.max_fourier_number;
        for element in [&self.wall, &self.roof, &self.mass] {
            element.check_timestep(dt, max_fo)?;
        }

        let indoor_temp = self.building.state().indoor_temp;

        let wall_outside = self.wall.surface_flux(
            forcing.canyon_temp,
            forcing.wind_speed,
            forcing.solar_wall,
            forcing.longwave_wall,
            false,
        );
        let wall_inside = Boundary::Convective {
            air_temp: indoor_temp,
            coeff: H_IN_WALL,
            gain: 0.,
        };
        let (wall_flux_outside, wall_flux_inside) =
            self.wall
                .compute_flux_with_limit(wall_outside, wall_inside, dt, max_fo)?;

        let roof_outside = self.roof.surface_flux(
            forcing.outdoor_temp,
            forcing.wind_speed,
            forcing.solar_roof,
            forcing.longwave_roof,
            forcing.vegetation_active,
        );
        let roof_inside = Boundary::Convective {
            air_temp: indoor_temp,
            coeff: h_in_ceiling(self.roof.inner_surface_temp(), indoor_temp),
            gain: 0.,
        };
        let (roof_flux_outside, roof_flux_inside) =
            self.roof
                .compute_flux_with_limit(roof_outside, roof_inside, dt, max_fo)?;

        let mass_face = Boundary::Convective {
            air_temp: indoor_temp,
            coeff: H_IN_MASS,
            gain: self.building.mass_radiant_gain(forcing.is_night, geometry),
        };
        let (mass_flux, _) =
            self.mass
                .compute_flux_with_limit(mass_face, Boundary::Flux(0.), dt, max_fo)?;

        let surfaces = SurfaceTemps {
            wall: self.wall.inner_surface_temp(),
            roof: self.roof.inner_surface_temp(),
            mass: self.mass.outer_surface_temp(),
        };
        let element_fluxes = ElementFluxes {
            wall_outside: wall_flux_outside,
            wall_inside: wall_flux_inside,
            roof_outside: roof_flux_outside,
            roof_inside: roof_flux_inside,
            mass_inside: mass_flux,
        };
        self.building
            .bemcalc(forcing, geometry, &surfaces, &element_fluxes, dt)
    }

    pub fn to_record(&self) -> BemDefRecord {
        BemDefRecord {
            type_tag: BEMDEF_TYPE_TAG.to_string(),
            version: BEMDEF_FORMAT_VERSION,
            building: BuildingRecord::from(&self.building),
            mass: ElementRecord::from(&self.mass),
            wall: ElementRecord::from(&self.wall),
            roof: ElementRecord::from(&self.roof),
            frac: self.frac,
            bldtype: self.bldtype as usize,
            builtera: self.builtera as usize,
            zonetype: self.zonetype as usize,
        }
    }

    pub fn from_record(record: BemDefRecord) -> Result<Self, BemError> {
        record.check()?;
        Self::new(
            Building::try_from(record.building)?,
            Element::try_from(record.mass)?,
            Element::try_from(record.wall)?,
            Element::try_from(record.roof)?,
            record.frac,
            building_type_from_index(record.bldtype)?,
            built_era_from_index(record.builtera)?,
            climate_zone_from_index(record.zonetype)?,
        )
    }

    /// Flat field-keyed mapping of the archetype, tagged with its type and
    /// format version
    pub fn to_dict(&self) -> Result<IndexMap<String, Value>, BemError> {
        let serialization_error = |err: serde_json::Error| BemError::Serialization {
            entity: BEMDEF_TYPE_TAG,
            message: err.to_string(),
        };
        let json = serde_json::to_string(&self.to_record()).map_err(serialization_error)?;
        serde_json::from_str(&json).map_err(serialization_error)
    }

    pub fn from_dict(dict: &IndexMap<String, Value>) -> Result<Self, BemError> {
        check_mapping_type(BEMDEF_TYPE_TAG, dict)?;
        let value = Value::Object(dict.clone().into_iter().collect());
        let record: BemDefRecord = serde_json::from_value(value)
            .map_err(|err| BemError::deserialization(BEMDEF_TYPE_TAG, err))?;
        Self::from_record(record)
    }

    pub fn to_json_string(&self) -> Result<String, BemError> {
        serde_json::to_string_pretty(&self.to_record()).map_err(|err| BemError::Serialization {
            entity: BEMDEF_TYPE_TAG,
            message: err.to_string(),
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, BemError> {
        let dict: IndexMap<String, Value> = serde_json::from_str(json)
            .map_err(|err| BemError::deserialization(BEMDEF_TYPE_TAG, err))?;
        Self::from_dict(&dict)
    }
}

impl Display for BemDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BEMDef,\n building type: {}\n built era: {}\n climate zone: {}\n frac: {}\n \
             building:\n{}\n mass: {}\n wall: {}\n roof: {}",
            self.bldtype,
            self.builtera,
            self.zonetype,
            self.frac,
            self.building,
            self.mass,
            self.wall,
            self.roof,
        )
    }
}
