//! Integration tests for loading models.
use horizon_uc::input::load_model;
use horizon_uc::optimisation::SolverName;
use std::path::PathBuf;

/// Get the path to the example model.
fn get_model_dir(name: &str) -> PathBuf {
    ["demos", name].iter().collect()
}

#[test]
fn test_load_model_simple() {
    let model = load_model(get_model_dir("simple")).unwrap();
    assert_eq!(model.timeline.len(), 48);
    assert_eq!(model.timeline.interval_hours(), 1.0);
    assert_eq!(model.power_system.generators.len(), 3);
    assert_eq!(model.power_system.demand.len(), 48);

    let options = model.commitment_options();
    assert_eq!(options.solver, SolverName::Highs);
    assert_eq!(options.hours_commitment, 24.0);
    assert_eq!(options.hours_commitment_overlap, 6.0);
}

#[test]
fn test_load_model_shortfall() {
    let model = load_model(get_model_dir("shortfall")).unwrap();
    assert_eq!(model.timeline.len(), 12);
    assert!(model.power_system.generators["hydro"].must_run);
}
