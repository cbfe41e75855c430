//! Code for reading the system demand and building the master timeline from it.
use super::*;
use crate::timeline::{Timeline, hours_to_delta};
use crate::units::Power;
use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveDateTime;
use float_cmp::approx_eq;
use log::warn;
use serde::Deserialize;
use std::path::Path;

const LOADS_FILE_NAME: &str = "loads.csv";

/// A row of the loads CSV file
#[derive(PartialEq, Debug, Deserialize)]
struct LoadRaw {
    #[serde(deserialize_with = "deserialise_datetime")]
    time: NaiveDateTime,
    demand: Power,
}

/// Read the system demand from a CSV file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `interval_hours` - The interval length, if given in the model parameters
///
/// # Returns
///
/// The master timeline and the demand at each of its instants.
pub fn read_loads(model_dir: &Path, interval_hours: Option<f64>) -> Result<(Timeline, Vec<Power>)> {
    let file_path = model_dir.join(LOADS_FILE_NAME);
    let loads_csv = read_csv(&file_path)?;
    read_loads_from_iter(loads_csv, interval_hours).with_context(|| input_err_msg(&file_path))
}

fn read_loads_from_iter<I>(iter: I, interval_hours: Option<f64>) -> Result<(Timeline, Vec<Power>)>
where
    I: Iterator<Item = LoadRaw>,
{
    let mut times = Vec::new();
    let mut demand = Vec::new();
    for load in iter {
        ensure!(
            load.demand.is_finite() && load.demand >= Power(0.0),
            "Invalid demand at {} ({}). Must be a finite number >= 0.",
            load.time,
            load.demand
        );
        times.push(load.time);
        demand.push(load.demand);
    }

    let timeline = match (times.len(), interval_hours) {
        (1, None) => bail!("interval_hours must be given in model.toml for a single instant"),
        (1, Some(hours)) => Timeline::with_interval(times, hours_to_delta(hours))?,
        _ => Timeline::new(times)?,
    };

    if let Some(hours) = interval_hours {
        if !approx_eq!(f64, hours, timeline.interval_hours()) {
            warn!(
                "interval_hours ({hours}) differs from the spacing of the instants in \
                {LOADS_FILE_NAME} ({} hours). The given value will be used for costs and stage \
                lengths.",
                timeline.interval_hours()
            );
        }
    }

    Ok((timeline, demand))
}
