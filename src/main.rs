extern crate ubem;

use anyhow::{bail, Context};
use clap::Parser;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;
use ubem::bem_def::{ArchetypeOverrides, BemDef};
use ubem::external_conditions::{read_forcing_csv, DesignConditions, UrbanGeometry};
use ubem::output::FileOutput;
use ubem::run_simulation;
use ubem::simulation_time::{SimulationTime, SolverSettings};

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct UbemArgs {
    /// JSON file holding a list of archetype definitions
    archetypes_file: PathBuf,
    /// CSV file with one row of canyon forcing per timestep
    #[arg(long, short)]
    forcing_file: PathBuf,
    /// JSON file with the urban geometry
    #[arg(long, short)]
    geometry_file: PathBuf,
    /// JSON file with the HVAC design conditions
    #[arg(long, short)]
    design_file: PathBuf,
    /// JSON file with solver settings; defaults are used when absent
    #[arg(long, short)]
    settings_file: Option<PathBuf>,
    /// JSON file with a list of overrides, one per archetype
    #[arg(long)]
    overrides_file: Option<PathBuf>,
    /// Start of the simulation, in hours from the start of the year
    #[arg(long, default_value_t = 0.)]
    start: f64,
    /// End of the simulation, in hours from the start of the year
    #[arg(long, default_value_t = 24.)]
    end: f64,
    /// Directory the results are written to
    #[arg(long, short, default_value = ".")]
    output_dir: PathBuf,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("Could not open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Could not parse {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Could not set up logging")?;

    let args = UbemArgs::parse();

    let settings: SolverSettings = match &args.settings_file {
        Some(path) => read_json(path)?,
        None => SolverSettings::default(),
    };
    let geometry: UrbanGeometry = read_json(&args.geometry_file)?;
    let design: DesignConditions = read_json(&args.design_file)?;

    let mut archetypes = read_json::<Vec<IndexMap<String, Value>>>(&args.archetypes_file)?
        .iter()
        .map(BemDef::from_dict)
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(path) = &args.overrides_file {
        let overrides: Vec<ArchetypeOverrides> = read_json(path)?;
        if overrides.len() != archetypes.len() {
            bail!(
                "{} overrides given for {} archetypes",
                overrides.len(),
                archetypes.len()
            );
        }
        for (archetype, archetype_overrides) in archetypes.iter_mut().zip(&overrides) {
            archetype.apply_overrides(archetype_overrides)?;
        }
    }

    let forcing_file = File::open(&args.forcing_file)
        .with_context(|| format!("Could not open {}", args.forcing_file.display()))?;
    let forcing = read_forcing_csv(BufReader::new(forcing_file))?;

    let simulation_time = SimulationTime::new(args.start, args.end, settings.dt);
    info!(
        archetypes = archetypes.len(),
        steps = simulation_time.total_steps(),
        "starting simulation"
    );

    let output = FileOutput::new(args.output_dir, "{}__results.csv".to_string());
    if let Err(err) = run_simulation(
        archetypes,
        &forcing,
        &design,
        &geometry,
        &settings,
        &simulation_time,
        &output,
    ) {
        error!("{err:#}");
        return Err(err);
    }

    Ok(())
}
