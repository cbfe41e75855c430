//! The model represents the static input data provided by the user.
use crate::commitment::CommitmentOptions;
use crate::power_system::PowerSystem;
use crate::timeline::Timeline;
use std::path::PathBuf;

pub mod parameters;
pub use parameters::ModelParameters;

/// Model definition
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// The master timeline
    pub timeline: Timeline,
    /// The power system to commit and dispatch
    pub power_system: PowerSystem,
}

impl Model {
    /// Options for the rolling-horizon run, as given in the model parameters
    pub fn commitment_options(&self) -> CommitmentOptions {
        let params = &self.parameters;
        CommitmentOptions {
            solver: params.solver,
            hours_commitment: params.hours_commitment,
            hours_commitment_overlap: params.hours_commitment_overlap,
            interval_hours: params.interval_hours,
            write_problem_files: params.write_problem_files,
            show_clock: params.show_clock,
        }
    }
}
