//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::input::{input_err_msg, read_toml};
use crate::optimisation::SolverName;
use crate::units::MoneyPerEnergy;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Deserializer};
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::new($value)
        }
    };
}

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_unit_param_default!(default_value_of_lost_load, MoneyPerEnergy, 10_000.0);
define_param_default!(default_hours_commitment, f64, 24.0);
define_param_default!(default_show_clock, bool, true);

/// Read a solver name, checking that the solver exists
fn deserialise_solver<'de, D>(deserialiser: D) -> Result<SolverName, D::Error>
where
    D: Deserializer<'de>,
{
    let name: String = Deserialize::deserialize(deserialiser)?;
    SolverName::from_name(&name).map_err(|err| {
        serde::de::Error::custom(format!(
            "{err}. Available solvers: {}",
            SolverName::available()
        ))
    })
}

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// The solver used for each stage
    #[serde(default, deserialize_with = "deserialise_solver")]
    pub solver: SolverName,
    /// The length of the non-overlapping part of each stage, in hours
    #[serde(default = "default_hours_commitment")]
    pub hours_commitment: f64,
    /// The length of the overlap solved at the end of each stage, in hours
    #[serde(default)]
    pub hours_commitment_overlap: f64,
    /// The length of each interval, in hours.
    ///
    /// Defaults to the spacing of the instants in the loads file.
    pub interval_hours: Option<f64>,
    /// Whether to write the formulation of each stage to file
    #[serde(default)]
    pub write_problem_files: bool,
    /// Whether to show the wall-clock time at the start of each stage
    #[serde(default = "default_show_clock")]
    pub show_clock: bool,
    /// The cost applied to unmet demand, when load shedding is needed
    #[serde(default = "default_value_of_lost_load")]
    pub value_of_lost_load: MoneyPerEnergy,
}

/// Check that the `hours_commitment` parameter is valid
fn check_hours_commitment(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "hours_commitment must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the `hours_commitment_overlap` parameter is valid
fn check_hours_commitment_overlap(value: f64, hours_commitment: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "hours_commitment_overlap must be a finite number >= 0"
    );
    ensure!(
        value < hours_commitment,
        "hours_commitment_overlap must be less than hours_commitment"
    );

    Ok(())
}

/// Check that the `interval_hours` parameter is valid
fn check_interval_hours(value: Option<f64>) -> Result<()> {
    if let Some(value) = value {
        ensure!(
            value.is_finite() && value > 0.0,
            "interval_hours must be a finite number greater than zero"
        );
    }

    Ok(())
}

/// Check that the `value_of_lost_load` parameter is valid
fn check_value_of_lost_load(value: MoneyPerEnergy) -> Result<()> {
    ensure!(
        value.is_finite() && value > MoneyPerEnergy(0.0),
        "value_of_lost_load must be a finite number greater than zero"
    );

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_hours_commitment(self.hours_commitment)?;
        check_hours_commitment_overlap(self.hours_commitment_overlap, self.hours_commitment)?;
        check_interval_hours(self.interval_hours)?;
        check_value_of_lost_load(self.value_of_lost_load)?;

        Ok(())
    }
}
