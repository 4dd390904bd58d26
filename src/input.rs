use crate::core::cooling_systems::air_conditioning::CondenserType;
use crate::core::heating_systems::space_heater::HeatingSource;
use crate::core::material_properties::Material;
use crate::core::space_heat_demand::building::{Building, BuildingOverrides};
use crate::core::space_heat_demand::building_element::Element;
use crate::errors::BemError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_valid::Validate;
use strum_macros::{Display, FromRepr};

/// Version of the persisted archetype layout written by this crate
pub const BEMDEF_FORMAT_VERSION: u32 = 1;

pub const MATERIAL_TYPE_TAG: &str = "Material";
pub const ELEMENT_TYPE_TAG: &str = "Element";
pub const BUILDING_TYPE_TAG: &str = "Building";
pub const BEMDEF_TYPE_TAG: &str = "BEMDef";

/// DOE reference building types, in the order of the archetype tables
#[derive(Clone, Copy, Debug, Display, Eq, FromRepr, PartialEq)]
#[repr(usize)]
pub enum BuildingType {
    FullServiceRestaurant,
    Hospital,
    LargeHotel,
    LargeOffice,
    MediumOffice,
    MidRiseApartment,
    OutPatient,
    PrimarySchool,
    QuickServiceRestaurant,
    SecondarySchool,
    SmallHotel,
    SmallOffice,
    StandAloneRetail,
    StripMall,
    SuperMarket,
    WareHouse,
}

/// Construction era of the reference buildings
#[derive(Clone, Copy, Debug, Display, Eq, FromRepr, PartialEq)]
#[repr(usize)]
pub enum BuiltEra {
    Pre80,
    Pst80,
    New,
}

/// ASHRAE climate zones of the reference buildings
#[derive(Clone, Copy, Debug, Display, Eq, FromRepr, PartialEq)]
#[repr(usize)]
pub enum ClimateZone {
    #[strum(serialize = "1A (Miami)")]
    Zone1A,
    #[strum(serialize = "2A (Houston)")]
    Zone2A,
    #[strum(serialize = "2B (Phoenix)")]
    Zone2B,
    #[strum(serialize = "3A (Atlanta)")]
    Zone3A,
    #[strum(serialize = "3B-CA (Los Angeles)")]
    Zone3BCa,
    #[strum(serialize = "3B (Las Vegas)")]
    Zone3B,
    #[strum(serialize = "3C (San Francisco)")]
    Zone3C,
    #[strum(serialize = "4A (Baltimore)")]
    Zone4A,
    #[strum(serialize = "4B (Albuquerque)")]
    Zone4B,
    #[strum(serialize = "4C (Seattle)")]
    Zone4C,
    #[strum(serialize = "5A (Chicago)")]
    Zone5A,
    #[strum(serialize = "5B (Boulder)")]
    Zone5B,
    #[strum(serialize = "6A (Minneapolis)")]
    Zone6A,
    #[strum(serialize = "6B (Helena)")]
    Zone6B,
    #[strum(serialize = "7 (Duluth)")]
    Zone7,
    #[strum(serialize = "8 (Fairbanks)")]
    Zone8,
}

fn classification<T>(
    entity: &'static str,
    index: usize,
    from_repr: impl Fn(usize) -> Option<T>,
) -> Result<T, BemError> {
    from_repr(index).ok_or_else(|| {
        BemError::deserialization(entity, format!("index {index} is out of range"))
    })
}

pub(crate) fn building_type_from_index(index: usize) -> Result<BuildingType, BemError> {
    classification("building type", index, BuildingType::from_repr)
}

pub(crate) fn built_era_from_index(index: usize) -> Result<BuiltEra, BemError> {
    classification("built era", index, BuiltEra::from_repr)
}

pub(crate) fn climate_zone_from_index(index: usize) -> Result<ClimateZone, BemError> {
    classification("climate zone", index, ClimateZone::from_repr)
}

fn check_type_tag(expected: &str, found: &str) -> Result<(), BemError> {
    if found != expected {
        return Err(BemError::TypeTagMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

/// Check the type tag of a mapping before deserializing the rest of it
pub(crate) fn check_mapping_type(
    expected: &str,
    mapping: &IndexMap<String, Value>,
) -> Result<(), BemError> {
    let found = match mapping.get("type") {
        Some(Value::String(tag)) => tag.clone(),
        Some(other) => other.to_string(),
        None => "<missing>".to_string(),
    };
    check_type_tag(expected, &found)
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct MaterialRecord {
    #[serde(rename = "type")]
    pub type_tag: String,
    /// W / (m.K)
    pub thermal_cond: f64,
    /// J / (m3.K)
    pub vol_heat: f64,
    pub name: String,
}

impl From<&Material> for MaterialRecord {
    fn from(material: &Material) -> Self {
        Self {
            type_tag: MATERIAL_TYPE_TAG.to_string(),
            thermal_cond: material.conductivity(),
            vol_heat: material.volumetric_heat_capacity(),
            name: material.name().to_string(),
        }
    }
}

impl TryFrom<MaterialRecord> for Material {
    type Error = BemError;

    fn try_from(record: MaterialRecord) -> Result<Self, Self::Error> {
        check_type_tag(MATERIAL_TYPE_TAG, &record.type_tag)?;
        Material::new(record.thermal_cond, record.vol_heat, record.name)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ElementRecord {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub albedo: f64,
    pub emissivity: f64,
    /// m, outside to inside
    pub layer_thickness_lst: Vec<f64>,
    pub material_lst: Vec<MaterialRecord>,
    pub veg_coverage: f64,
    /// K, one per layer interface
    pub layer_temp_lst: Vec<f64>,
    pub horizontal: bool,
    pub name: String,
}

impl From<&Element> for ElementRecord {
    fn from(element: &Element) -> Self {
        Self {
            type_tag: ELEMENT_TYPE_TAG.to_string(),
            albedo: element.albedo(),
            emissivity: element.emissivity(),
            layer_thickness_lst: element.layer_thickness(),
            material_lst: element
                .layers()
                .iter()
                .map(|layer| MaterialRecord::from(layer.material()))
                .collect(),
            veg_coverage: element.veg_coverage(),
            layer_temp_lst: element.node_temps().to_vec(),
            horizontal: element.horizontal(),
            name: element.name().to_string(),
        }
    }
}

impl TryFrom<ElementRecord> for Element {
    type Error = BemError;

    fn try_from(record: ElementRecord) -> Result<Self, Self::Error> {
        check_type_tag(ELEMENT_TYPE_TAG, &record.type_tag)?;
        let materials = record
            .material_lst
            .into_iter()
            .map(Material::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Element::with_node_temps(
            record.albedo,
            record.emissivity,
            record.layer_thickness_lst,
            materials,
            record.veg_coverage,
            record.layer_temp_lst,
            record.horizontal,
            record.name,
        )
    }
}

fn default_canyon_fraction() -> f64 {
    1.
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct BuildingRecord {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub floor_height: f64,
    pub int_heat_night: f64,
    pub int_heat_day: f64,
    pub int_heat_f_rad: f64,
    pub int_heat_f_lat: f64,
    pub infil: f64,
    pub vent: f64,
    pub glazing_ratio: f64,
    pub u_value: f64,
    pub shgc: f64,
    pub cond_type: CondenserType,
    pub cop: f64,
    pub cool_setpoint_day: f64,
    pub cool_setpoint_night: f64,
    pub heat_setpoint_day: f64,
    pub heat_setpoint_night: f64,
    pub cool_cap: f64,
    pub heat_eff: f64,
    pub initial_temp: f64,
    #[serde(default = "default_canyon_fraction")]
    pub canyon_fraction: f64,
    #[serde(default)]
    pub heating_source: HeatingSource,
    #[serde(default)]
    pub heat_cap: f64,
    #[serde(default)]
    pub m_sys: f64,
    #[serde(default)]
    pub fan_max: f64,
    pub indoor_temp: f64,
    pub indoor_hum: f64,
}

impl From<&Building> for BuildingRecord {
    fn from(building: &Building) -> Self {
        Self {
            type_tag: BUILDING_TYPE_TAG.to_string(),
            floor_height: building.floor_height(),
            int_heat_night: building.int_heat_night(),
            int_heat_day: building.int_heat_day(),
            int_heat_f_rad: building.int_heat_f_rad(),
            int_heat_f_lat: building.int_heat_f_lat(),
            infil: building.infil(),
            vent: building.vent(),
            glazing_ratio: building.glazing_ratio(),
            u_value: building.u_value(),
            shgc: building.shgc(),
            cond_type: building.cond_type(),
            cop: building.cop(),
            cool_setpoint_day: building.cool_setpoint_day(),
            cool_setpoint_night: building.cool_setpoint_night(),
            heat_setpoint_day: building.heat_setpoint_day(),
            heat_setpoint_night: building.heat_setpoint_night(),
            cool_cap: building.cool_cap(),
            heat_eff: building.heat_eff(),
            initial_temp: building.initial_temp(),
            canyon_fraction: building.canyon_fraction(),
            heating_source: building.heating_source(),
            heat_cap: building.heat_cap(),
            m_sys: building.m_sys(),
            fan_max: building.fan_max(),
            indoor_temp: building.state().indoor_temp,
            indoor_hum: building.state().indoor_hum,
        }
    }
}

impl TryFrom<BuildingRecord> for Building {
    type Error = BemError;

    fn try_from(record: BuildingRecord) -> Result<Self, Self::Error> {
        check_type_tag(BUILDING_TYPE_TAG, &record.type_tag)?;
        let mut building = Building::new(
            record.floor_height,
            record.int_heat_night,
            record.int_heat_day,
            record.int_heat_f_rad,
            record.int_heat_f_lat,
            record.infil,
            record.vent,
            record.glazing_ratio,
            record.u_value,
            record.shgc,
            record.cond_type,
            record.cop,
            record.cool_setpoint_day,
            record.cool_setpoint_night,
            record.heat_setpoint_day,
            record.heat_setpoint_night,
            record.cool_cap,
            record.heat_eff,
            record.initial_temp,
        )?;
        building.apply_overrides(&BuildingOverrides {
            canyon_fraction: Some(record.canyon_fraction),
            heating_source: Some(record.heating_source),
            ..Default::default()
        })?;
        building.restore(
            record.heat_cap,
            record.m_sys,
            record.fan_max,
            record.indoor_temp,
            record.indoor_hum,
        )?;
        Ok(building)
    }
}

/// Persisted form of a building archetype definition
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct BemDefRecord {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub version: u32,
    pub building: BuildingRecord,
    pub mass: ElementRecord,
    pub wall: ElementRecord,
    pub roof: ElementRecord,
    /// Share of the urban building stock represented by the archetype
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub frac: f64,
    pub bldtype: usize,
    pub builtera: usize,
    pub zonetype: usize,
}

impl BemDefRecord {
    /// Check the record header and field ranges before any entity is built
    pub(crate) fn check(&self) -> Result<(), BemError> {
        check_type_tag(BEMDEF_TYPE_TAG, &self.type_tag)?;
        if self.version != BEMDEF_FORMAT_VERSION {
            return Err(BemError::UnsupportedVersion {
                entity: BEMDEF_TYPE_TAG,
                found: self.version,
                supported: BEMDEF_FORMAT_VERSION,
            });
        }
        self.validate()
            .map_err(|errors| BemError::deserialization(BEMDEF_TYPE_TAG, errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    #[fixture]
    fn insulation() -> Material {
        Material::new(0.049, 836.8 * 265.0, "Insulation").unwrap()
    }

    #[rstest]
    fn should_index_classifications_in_table_order() {
        assert_eq!(building_type_from_index(3).unwrap(), BuildingType::LargeOffice);
        assert_eq!(building_type_from_index(15).unwrap(), BuildingType::WareHouse);
        assert_eq!(built_era_from_index(1).unwrap(), BuiltEra::Pst80);
        assert_eq!(climate_zone_from_index(0).unwrap().to_string(), "1A (Miami)");
        assert!(matches!(
            climate_zone_from_index(16),
            Err(BemError::Deserialization { .. })
        ));
    }

    #[rstest]
    fn should_round_trip_material_record(insulation: Material) {
        let record = MaterialRecord::from(&insulation);
        assert_eq!(record.type_tag, "Material");
        assert_eq!(Material::try_from(record).unwrap(), insulation);
    }

    #[rstest]
    fn should_reject_nested_tag_mismatch(insulation: Material) {
        let mut record = MaterialRecord::from(&insulation);
        record.type_tag = "Element".to_string();
        assert!(matches!(
            Material::try_from(record),
            Err(BemError::TypeTagMismatch { .. })
        ));
    }

    #[rstest]
    fn should_rebuild_element_with_node_temperatures(insulation: Material) {
        let mut record = ElementRecord::from(
            &Element::new(
                0.2,
                0.93,
                vec![0.058, 0.058],
                vec![insulation.clone(), insulation],
                0.5,
                293.,
                true,
                "IEAD",
            )
            .unwrap(),
        );
        record.layer_temp_lst = vec![300., 296., 293.];
        let element = Element::try_from(record).unwrap();
        assert_eq!(element.node_temps(), &[300., 296., 293.]);
        assert_eq!(element.veg_coverage(), 0.5);
    }

    #[rstest]
    fn should_check_mapping_type_before_deserializing() {
        let mapping: IndexMap<String, Value> =
            serde_json::from_value(json!({"type": "BemDef", "frac": 0.1})).unwrap();
        let err = check_mapping_type(BEMDEF_TYPE_TAG, &mapping).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected mapping of type 'BEMDef' but found type 'BemDef'"
        );
        let untagged = IndexMap::new();
        assert!(check_mapping_type(BEMDEF_TYPE_TAG, &untagged).is_err());
    }

    #[rstest]
    fn should_parse_condenser_tags_in_building_record() {
        let value = json!("WAT");
        let cond_type: CondenserType = serde_json::from_value(value).unwrap();
        assert_eq!(cond_type, CondenserType::Water);
    }
}
