#![doc = include_str!("../README.md")]
#![deny(clippy::all)]

use arrow::record_batch::RecordBatch;
use fmi2_cs::{Fmu, InstantiateOptions};

pub mod options;
pub mod params;
pub mod sim;

use options::RunOptions;
use params::SimParams;
use sim::{SimStats, StartValues};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Fmi(#[from] fmi2_cs::Error),

    #[error("Invalid simulation parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("The FMU discarded the step at t = {0} without terminating")]
    StepDiscarded(f64),
}

/// Load the FMU library named in `options` and run it.
pub fn simulate(options: &RunOptions) -> Result<(SimStats, RecordBatch), Error> {
    let fmu = Fmu::from_path(&options.library)?;
    fmu.check_consistency()?;
    simulate_fmu(&fmu, options)
}

/// Run an already loaded FMU with `options`; the library path in `options` is ignored.
pub fn simulate_fmu(fmu: &Fmu, options: &RunOptions) -> Result<(SimStats, RecordBatch), Error> {
    let params = SimParams::new_from_options(options)?;

    let mut instantiate_options = InstantiateOptions::new(options.guid.as_str())
        .visible(false)
        .logging_on(options.logging_on);
    if let Some(dir) = &options.resource_dir {
        instantiate_options = instantiate_options.resource_dir(dir)?;
    }

    sim::co_simulation(
        fmu,
        &options.instance_name,
        &instantiate_options,
        &params,
        &StartValues::from_options(options),
        &options.outputs,
    )
}
