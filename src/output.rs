//! The module responsible for writing output data to disk.
use crate::model::Model;
use crate::power_system::generator::{power_var, status_var};
use crate::power_system::{GeneratorID, UnitStateMap, load_shed_var, power_balance_constraint};
use crate::solution::{MultiStageSolution, StageSummary};
use crate::timeline::Stage;
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "horizon_uc_results";

/// The output file name for the commitment and dispatch of each generator
const DISPATCH_FILE_NAME: &str = "dispatch.csv";

/// The output file name for system-wide results
const SYSTEM_FILE_NAME: &str = "system.csv";

/// The output file name for the summary of each stage
const STAGES_FILE_NAME: &str = "stages.csv";

/// Format used for instants in output files
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Get the model name from the specified directory path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model specified at `model_dir`.
///
/// If the directory already exists and contains files, it is only reused (after being emptied) if
/// `allow_overwrite` is true.
///
/// # Returns
///
/// Whether an existing output directory was overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let mut overwritten = false;
    if output_dir.is_dir() {
        if fs::read_dir(output_dir)?.next().is_none() {
            // Empty folder, nothing to overwrite
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Please delete the folder or pass the \
            --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir)?;
        overwritten = true;
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwritten)
}

/// Format an instant for writing to an output file
fn format_time(time: NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Represents a row in the unit states CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct UnitStateRow {
    time: String,
    generator_id: GeneratorID,
    status: bool,
    hours_in_status: f64,
    power: f64,
}

/// Write the given unit states to a CSV file, with one row per generator for each instant of the
/// stage
pub fn write_unit_states(file_path: &Path, stage: &Stage, states: &UnitStateMap) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    for (_, time) in stage.iter() {
        for (generator_id, state) in states {
            writer.serialize(UnitStateRow {
                time: format_time(time),
                generator_id: generator_id.clone(),
                status: state.status,
                hours_in_status: state.hours_in_status.value(),
                power: state.power.value(),
            })?;
        }
    }
    writer.flush()?;

    Ok(())
}

/// Represents a row in the dispatch CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct DispatchRow {
    time: String,
    generator_id: GeneratorID,
    status: bool,
    power: f64,
}

/// Represents a row in the system results CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SystemRow {
    time: String,
    demand: f64,
    load_shed: f64,
    /// Price of energy (empty if duals were not available)
    price: Option<f64>,
}

/// Represents a row in the stages CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct StageRow {
    stage: usize,
    start: String,
    first_instant: usize,
    last_instant: usize,
    status: String,
    solve_time_seconds: f64,
    objective_value: f64,
    duals_valid: bool,
    load_shedding: bool,
}

impl From<&StageSummary> for StageRow {
    fn from(summary: &StageSummary) -> Self {
        Self {
            stage: summary.index,
            start: format_time(summary.start),
            first_instant: summary.non_overlap.start,
            last_instant: summary.non_overlap.end - 1,
            status: summary.status.clone(),
            solve_time_seconds: summary.solve_time.as_secs_f64(),
            objective_value: summary.objective_value,
            duals_valid: summary.duals_valid,
            load_shedding: summary.load_shedding,
        }
    }
}

/// An object for writing the results of a run to CSV files
pub struct DataWriter {
    dispatch_writer: csv::Writer<File>,
    system_writer: csv::Writer<File>,
    stages_writer: csv::Writer<File>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    pub fn create(output_path: &Path) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        Ok(Self {
            dispatch_writer: new_writer(DISPATCH_FILE_NAME)?,
            system_writer: new_writer(SYSTEM_FILE_NAME)?,
            stages_writer: new_writer(STAGES_FILE_NAME)?,
        })
    }

    /// Write the commitment and output of each generator at each covered instant
    pub fn write_dispatch(&mut self, model: &Model, solution: &MultiStageSolution) -> Result<()> {
        for t in 0..solution.covered() {
            let time = format_time(model.timeline.time(t));
            for generator_id in model.power_system.generators.keys() {
                let status = solution
                    .value(status_var(generator_id, t).as_str())
                    .with_context(|| format!("Missing status for {generator_id} at {time}"))?;
                let power = solution
                    .value(power_var(generator_id, t).as_str())
                    .with_context(|| format!("Missing power for {generator_id} at {time}"))?;
                self.dispatch_writer.serialize(DispatchRow {
                    time: time.clone(),
                    generator_id: generator_id.clone(),
                    status: status > 0.5,
                    power,
                })?;
            }
        }

        Ok(())
    }

    /// Write demand, load shedding and prices at each covered instant.
    ///
    /// The price is the dual value of the power balance constraint per hour of the interval.
    pub fn write_system(&mut self, model: &Model, solution: &MultiStageSolution) -> Result<()> {
        let interval_hours = model
            .parameters
            .interval_hours
            .unwrap_or_else(|| model.timeline.interval_hours());
        for t in 0..solution.covered() {
            let demand = model.power_system.demand.get(t).map_or(0.0, |d| d.value());
            let load_shed = solution.value(load_shed_var(t).as_str()).unwrap_or(0.0);
            let price = solution
                .dual(power_balance_constraint(t).as_str())
                .map(|dual| dual / interval_hours);
            self.system_writer.serialize(SystemRow {
                time: format_time(model.timeline.time(t)),
                demand,
                load_shed,
                price,
            })?;
        }

        Ok(())
    }

    /// Write a summary of each stage
    pub fn write_stages(&mut self, solution: &MultiStageSolution) -> Result<()> {
        for summary in solution.stages() {
            self.stages_writer.serialize(StageRow::from(summary))?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.dispatch_writer.flush()?;
        self.system_writer.flush()?;
        self.stages_writer.flush()?;

        Ok(())
    }
}

/// Write all results of a run to the output folder
pub fn write_results(
    output_path: &Path,
    model: &Model,
    solution: &MultiStageSolution,
) -> Result<()> {
    let mut writer = DataWriter::create(output_path)?;
    writer.write_dispatch(model, solution)?;
    writer.write_system(model, solution)?;
    writer.write_stages(solution)?;
    writer.flush()
}
