//! Integration tests for the `validate` command.
use horizon_uc::cli::handle_validate_command;
use horizon_uc::log::is_logger_initialised;
use horizon_uc::settings::Settings;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the example model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// An integration test for the `validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("HORIZON_UC_LOG_LEVEL", "off") };

    assert!(!is_logger_initialised());

    handle_validate_command(&get_model_dir(), Some(Settings::default())).unwrap();

    assert!(is_logger_initialised());

    // A folder without a model fails validation
    let dir = tempdir().unwrap();
    assert!(handle_validate_command(dir.path(), Some(Settings::default())).is_err());
}
