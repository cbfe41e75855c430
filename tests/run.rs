//! Integration tests for the `run` command.
use horizon_uc::cli::{RunOpts, handle_run_command};
use horizon_uc::settings::Settings;
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Get the path to the example model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// Read the rows of a CSV output file as maps from column name to value
fn read_output(file_path: &Path) -> Vec<Vec<(String, String)>> {
    let mut reader = csv::Reader::from_path(file_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| (header.to_string(), value.to_string()))
                .collect()
        })
        .collect()
}

/// Look up a column in a row read with [`read_output`]
fn column<'a>(row: &'a [(String, String)], name: &str) -> &'a str {
    &row.iter().find(|(header, _)| header == name).unwrap().1
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("HORIZON_UC_LOG_LEVEL", "off") };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: false,
        write_problems: true,
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();

    for file_name in [
        "dispatch.csv",
        "system.csv",
        "stages.csv",
        "metadata.toml",
        "horizon_uc_info.log",
        "horizon_uc_error.log",
        "problem-stage-2024-01-01--00-00.lp",
        "problem-stage-2024-01-02--00-00.lp",
    ] {
        assert!(output_dir.join(file_name).is_file(), "{file_name} missing");
    }

    // Every instant of the two days is covered, once per generator
    let dispatch = read_output(&output_dir.join("dispatch.csv"));
    assert_eq!(dispatch.len(), 48 * 3);

    // Demand is met without load shedding and prices are available
    let system = read_output(&output_dir.join("system.csv"));
    assert_eq!(system.len(), 48);
    for row in &system {
        assert_eq!(column(row, "load_shed").parse::<f64>().unwrap(), 0.0);
        assert!(!column(row, "price").is_empty());
    }

    let stages = read_output(&output_dir.join("stages.csv"));
    let ranges = stages
        .iter()
        .map(|row| (column(row, "first_instant"), column(row, "last_instant")))
        .collect_vec();
    assert_eq!(ranges, [("0", "23"), ("24", "47")]);

    // Running again into the same folder requires the overwrite option
    assert!(handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).is_err());
    let opts = RunOpts {
        overwrite: true,
        ..opts
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();
    assert!(!fs::read_to_string(output_dir.join("dispatch.csv"))
        .unwrap()
        .is_empty());
}
