
use crate::bem_def::BemDef;
use crate::core::cooling_systems::air_conditioning::CondenserType;
use crate::core::material_properties::Material;
use crate::core::space_heat_demand::building::Building;
use crate::core::space_heat_demand::building_element::Element;
use crate::external_conditions::{BemForcing, DesignConditions, UrbanGeometry};
use crate::input::{BuildingType, BuiltEra, ClimateZone};
use rstest::*;

// Reference large office, post-1980 construction, Miami

fn concrete() -> Material {
    Material::new(1.311, 836.8 * 2240., "Concrete").unwrap()
}

fn gypsum() -> Material {
    Material::new(0.16, 830.0 * 784.9, "Gypsum").unwrap()
}

fn stucco() -> Material {
    Material::new(0.6918, 837.0 * 1858., "Stucco").unwrap()
}

fn insulation() -> Material {
    Material::new(0.049, 836.8 * 265.0, "Insulation").unwrap()
}

/// Build the reference archetype with the given infiltration rate (ACH) and
/// initial temperature of the indoor air and the envelope
pub(crate) fn reference_archetype(infil: f64, initial_temp: f64) -> BemDef {
    let wall = Element::new(
        0.08,
        0.92,
        vec![0.0254, 0.0508, 0.0508, 0.0508, 0.0508, 0.0127],
        vec![
            stucco(),
            concrete(),
            concrete(),
            concrete(),
            concrete(),
            gypsum(),
        ],
        0.,
        initial_temp,
        false,
        "MassWall",
    )
    .unwrap();
    let roof = Element::new(
        0.2,
        0.93,
        vec![0.058, 0.058],
        vec![insulation(), insulation()],
        0.5,
        initial_temp,
        true,
        "IEAD",
    )
    .unwrap();
    let mass = Element::new(
        0.2,
        0.9,
        vec![0.054, 0.054],
        vec![concrete(), concrete()],
        0.,
        initial_temp,
        true,
        "MassFloor",
    )
    .unwrap();
    let building = Building::new(
        3.5,
        1.,
        1.,
        0.1,
        0.1,
        infil,
        0.0005,
        0.4,
        5.8,
        0.2,
        CondenserType::Air,
        5.2,
        297.,
        297.,
        293.,
        293.,
        76.,
        0.7,
        initial_temp,
    )
    .unwrap();

    BemDef::new(
        building,
        mass,
        wall,
        roof,
        0.1,
        BuildingType::LargeOffice,
        BuiltEra::Pst80,
        ClimateZone::Zone1A,
    )
    .unwrap()
}

#[fixture]
pub(crate) fn archetype() -> BemDef {
    reference_archetype(0.26, 293.)
}

#[fixture]
pub(crate) fn geometry() -> UrbanGeometry {
    UrbanGeometry::new(10., 0.5, 0.4).unwrap()
}

#[fixture]
pub(crate) fn design() -> DesignConditions {
    DesignConditions::new(306., 283.)
}

/// Hot, sunny summer afternoon in the canyon
#[fixture]
pub(crate) fn summer_forcing() -> BemForcing {
    BemForcing {
        outdoor_temp: 303.,
        pressure: 101325.,
        canyon_temp: 304.,
        canyon_hum: 0.016,
        wind_speed: 2.,
        solar_wall: 250.,
        solar_roof: 800.,
        longwave_wall: 430.,
        longwave_roof: 410.,
        is_night: false,
        vegetation_active: true,
        elec: 10.,
        light: 5.,
        gas: 1.,
    }
}
