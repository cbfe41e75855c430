//! Code for reading generators from a CSV file.
use super::*;
use crate::id::collect_by_id;
use crate::power_system::{Generator, GeneratorMap, UnitState};
use crate::units::{Hours, Money, MoneyPerEnergy, MoneyPerHour, Power, PowerPerHour};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

const GENERATORS_FILE_NAME: &str = "generators.csv";

/// A row of the generators CSV file
#[derive(PartialEq, Debug, Deserialize)]
struct GeneratorRaw {
    id: String,
    #[serde(default)]
    min_power: Power,
    max_power: Power,
    marginal_cost: MoneyPerEnergy,
    #[serde(default)]
    no_load_cost: MoneyPerHour,
    #[serde(default)]
    startup_cost: Money,
    ramp_rate: Option<PowerPerHour>,
    #[serde(default)]
    min_up_hours: Hours,
    #[serde(default)]
    min_down_hours: Hours,
    #[serde(default)]
    must_run: bool,
    initial_status: bool,
    #[serde(default)]
    initial_hours_in_status: Hours,
    #[serde(default)]
    initial_power: Power,
}

impl GeneratorRaw {
    fn validate(&self) -> Result<()> {
        let id = &self.id;
        ensure!(
            self.max_power.is_finite() && self.max_power > Power(0.0),
            "Generator {id}: max_power must be a finite number greater than zero"
        );
        ensure!(
            self.min_power >= Power(0.0) && self.min_power <= self.max_power,
            "Generator {id}: min_power must be between zero and max_power"
        );
        for (name, value) in [
            ("marginal_cost", self.marginal_cost.value()),
            ("no_load_cost", self.no_load_cost.value()),
            ("startup_cost", self.startup_cost.value()),
            ("min_up_hours", self.min_up_hours.value()),
            ("min_down_hours", self.min_down_hours.value()),
            ("initial_hours_in_status", self.initial_hours_in_status.value()),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "Generator {id}: {name} must be a finite number >= 0"
            );
        }
        if let Some(ramp_rate) = self.ramp_rate {
            ensure!(
                ramp_rate.is_finite() && ramp_rate > PowerPerHour(0.0),
                "Generator {id}: ramp_rate must be a finite number greater than zero"
            );
        }

        if self.initial_status {
            ensure!(
                self.initial_power >= self.min_power && self.initial_power <= self.max_power,
                "Generator {id}: initial_power must be between min_power and max_power when the \
                generator is initially on"
            );
        } else {
            ensure!(
                self.initial_power == Power(0.0),
                "Generator {id}: initial_power must be zero when the generator is initially off"
            );
        }
        ensure!(
            !self.must_run || self.initial_status,
            "Generator {id}: must-run generators must be initially on"
        );

        Ok(())
    }
}

impl From<GeneratorRaw> for Generator {
    fn from(raw: GeneratorRaw) -> Self {
        Generator {
            id: raw.id.into(),
            min_power: raw.min_power,
            max_power: raw.max_power,
            marginal_cost: raw.marginal_cost,
            no_load_cost: raw.no_load_cost,
            startup_cost: raw.startup_cost,
            ramp_rate: raw.ramp_rate,
            min_up_hours: raw.min_up_hours,
            min_down_hours: raw.min_down_hours,
            must_run: raw.must_run,
            initial: UnitState {
                status: raw.initial_status,
                hours_in_status: raw.initial_hours_in_status,
                power: raw.initial_power,
            },
        }
    }
}

/// Read generators from a CSV file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// A map of generators, keyed by ID, in the order they appear in the file.
pub fn read_generators(model_dir: &Path) -> Result<GeneratorMap> {
    let file_path = model_dir.join(GENERATORS_FILE_NAME);
    let generators_csv = read_csv(&file_path)?;
    read_generators_from_iter(generators_csv).with_context(|| input_err_msg(&file_path))
}

fn read_generators_from_iter<I>(iter: I) -> Result<GeneratorMap>
where
    I: Iterator<Item = GeneratorRaw>,
{
    let generators = iter
        .map(|raw| {
            raw.validate()?;
            Ok(Generator::from(raw))
        })
        .collect::<Result<Vec<_>>>()?;

    collect_by_id(generators)
}
