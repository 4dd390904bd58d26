#![allow(clippy::too_many_arguments)]

pub mod bem_def;
pub mod core;
pub mod errors;
pub mod external_conditions;
pub mod input;
pub mod output;
pub mod simulation_time;

#[cfg(test)]
mod tests;

pub use crate::bem_def::{ArchetypeOverrides, BemDef};
pub use crate::core::material_properties::Material;
pub use crate::core::space_heat_demand::building::{Building, BuildingPhase, BuildingState};
pub use crate::core::space_heat_demand::building_element::{Boundary, Element};
pub use crate::errors::BemError;

use crate::external_conditions::{BemForcing, DesignConditions, ForcingRecord, UrbanGeometry};
use crate::output::{write_step_records, Output, StepRecord};
use crate::simulation_time::{SimulationTime, SolverSettings};
use anyhow::{anyhow, bail};
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::info;

/// Step independent archetypes through the same timestep in parallel
///
/// Results are returned in the order of the archetypes. A failing archetype
/// does not stop the others from being stepped.
pub fn step_archetypes(
    archetypes: &mut [BemDef],
    forcing: &BemForcing,
    geometry: &UrbanGeometry,
    settings: &SolverSettings,
) -> Vec<Result<BuildingState, BemError>> {
    archetypes
        .par_iter_mut()
        .map(|archetype| archetype.step(forcing, geometry, settings).cloned())
        .collect()
}

/// Key under which the results of an archetype are written
pub fn archetype_key(index: usize, archetype: &BemDef) -> String {
    format!(
        "{index}_{}_{}",
        archetype.bldtype(),
        archetype.builtera()
    )
}

/// Size and simulate a set of archetypes over a forcing time series, writing
/// the per-timestep results of each archetype to the output
///
/// The run stops at the first timestep in which any archetype fails.
pub fn run_simulation(
    mut archetypes: Vec<BemDef>,
    forcing: &[ForcingRecord],
    design: &DesignConditions,
    geometry: &UrbanGeometry,
    settings: &SolverSettings,
    simulation_time: &SimulationTime,
    output: impl Output,
) -> anyhow::Result<IndexMap<String, Vec<StepRecord>>> {
    if simulation_time.step() != settings.dt {
        bail!(
            "Simulation timestep of {}s does not match the solver timestep of {}s",
            simulation_time.step(),
            settings.dt
        );
    }
    if forcing.len() < simulation_time.total_steps() {
        bail!(
            "Forcing has {} rows but the simulation needs {} timesteps",
            forcing.len(),
            simulation_time.total_steps()
        );
    }

    for archetype in archetypes.iter_mut() {
        archetype.autosize(design, geometry)?;
    }

    let mut results: IndexMap<String, Vec<StepRecord>> = archetypes
        .iter()
        .enumerate()
        .map(|(i, archetype)| (archetype_key(i, archetype), vec![]))
        .collect();

    for iteration in simulation_time.iter() {
        let step_forcing = forcing[iteration.index].to_forcing(&iteration, settings);
        let outcomes = step_archetypes(&mut archetypes, &step_forcing, geometry, settings);
        for ((key, records), outcome) in results.iter_mut().zip(outcomes) {
            let state = outcome
                .map_err(|err| anyhow!("Archetype {key} failed at hour {}: {err}", iteration.time))?;
            records.push(StepRecord::new(iteration.index + 1, iteration.time, &state));
        }
    }

    for (key, records) in &results {
        write_step_records(&output, key, records)?;
    }
    info!(
        archetypes = results.len(),
        steps = simulation_time.total_steps(),
        "simulation complete"
    );

    Ok(results)
}
