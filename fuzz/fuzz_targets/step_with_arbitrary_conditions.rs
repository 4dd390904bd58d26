#![no_main]

use libfuzzer_sys::fuzz_target;
use ubem::external_conditions::{BemForcing, DesignConditions, UrbanGeometry};
use ubem::simulation_time::SolverSettings;
use ubem::BemDef;

fuzz_target!(|input: (&str, BemForcing, UrbanGeometry, DesignConditions)| {
    let (json, forcing, geometry, design) = input;
    let Ok(mut archetype) = BemDef::from_json_str(json) else {
        return;
    };
    if archetype.autosize(&design, &geometry).is_err() {
        return;
    }
    let settings = SolverSettings::default();
    for _ in 0..4 {
        if archetype.step(&forcing, &geometry, &settings).is_err() {
            break;
        }
    }
});
