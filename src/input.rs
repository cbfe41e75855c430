//! Common routines for handling input data.
use crate::model::{Model, ModelParameters};
use crate::power_system::PowerSystem;
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use log::warn;
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::fs;
use std::path::Path;

pub mod generator;
use generator::read_generators;
pub mod load;
use load::read_loads;

/// The formats accepted for date-times in input files
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = read_csv_internal(file_path)?;
    ensure!(
        !vec.is_empty(),
        "CSV file {} cannot be empty",
        file_path.display()
    );

    Ok(vec.into_iter())
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .collect::<Result<Vec<T>, _>>()
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Parse a date-time in one of the accepted formats
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .with_context(|| {
            format!(
                "Invalid date-time \"{s}\". Expected a format such as \"2024-01-01 00:00\"."
            )
        })
}

/// Deserialise a date-time in one of the accepted formats
pub fn deserialise_datetime<'de, D>(deserialiser: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserialiser)?;
    parse_datetime(&s).map_err(|err| serde::de::Error::custom(format!("{err:#}")))
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The static model data or an error.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;
    let (timeline, demand) = read_loads(model_dir, parameters.interval_hours)?;
    let generators = read_generators(model_dir)?;

    let power_system = PowerSystem::new(generators, demand, parameters.value_of_lost_load);
    let peak_demand = power_system
        .demand
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, |acc, demand| acc.max(demand.value()));
    if power_system.total_capacity().value() < peak_demand {
        warn!(
            "Peak demand ({peak_demand}) exceeds total generating capacity ({}). Load shedding \
            will be needed.",
            power_system.total_capacity()
        );
    }

    Ok(Model {
        model_path: model_dir.to_path_buf(),
        parameters,
        timeline,
        power_system,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, time};
    use serde::Deserialize;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Record {
        id: String,
        value: u32,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct TimedRecord {
        #[serde(deserialize_with = "deserialise_datetime")]
        time: NaiveDateTime,
    }

    /// Create an example CSV file in dir_path
    fn create_csv_file(dir_path: &Path, contents: &str) -> std::path::PathBuf {
        let file_path = dir_path.join("test.csv");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{contents}").unwrap();
        file_path
    }

    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(dir.path(), "id,value\nhello,1\nworld, 2\n");
        let records: Vec<Record> = read_csv(&file_path).unwrap().collect();
        assert_eq!(
            records,
            &[
                Record {
                    id: "hello".to_string(),
                    value: 1,
                },
                Record {
                    id: "world".to_string(),
                    value: 2,
                }
            ]
        );

        // File with no data (only column headers)
        let file_path = create_csv_file(dir.path(), "id,value\n");
        assert!(read_csv::<Record>(&file_path).is_err());
    }

    #[test]
    fn test_read_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "id = \"hello\"\nvalue = 1").unwrap();
        }

        assert_eq!(
            read_toml::<Record>(&file_path).unwrap(),
            Record {
                id: "hello".to_string(),
                value: 1,
            }
        );

        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "bad toml syntax").unwrap();
        }

        assert!(read_toml::<Record>(&file_path).is_err());
    }

    #[test]
    fn test_read_toml_missing() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("missing.toml");
        assert_error!(
            read_toml::<Record>(&file_path),
            format!("Error reading {}", file_path.display())
        );
    }

    #[test]
    fn test_deserialise_datetime() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(
            dir.path(),
            "time\n2024-01-01 05:00\n2024-01-01T06:00:00\n2024-01-01 07:00:00",
        );
        let records: Vec<TimedRecord> = read_csv(&file_path).unwrap().collect();
        assert_eq!(
            records,
            [
                TimedRecord {
                    time: time(2024, 1, 1, 5)
                },
                TimedRecord {
                    time: time(2024, 1, 1, 6)
                },
                TimedRecord {
                    time: time(2024, 1, 1, 7)
                }
            ]
        );

        let file_path = create_csv_file(dir.path(), "time\n1 January 2024");
        assert!(read_csv::<TimedRecord>(&file_path).is_err());
    }
}
