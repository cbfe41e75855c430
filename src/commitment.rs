//! The rolling-horizon controller.
//!
//! The timeline is divided into stages (see [`Timeline::subdivide`]) which are solved one after
//! another. Each stage goes through the following states:
//!
//! 1. *Initialised*: the units' initial conditions are the final conditions of the previous stage
//!    (or the model's own initial conditions for the first stage).
//! 2. The stage's problem is built and solved. If it is solved, the stage is *solved*.
//! 3. Otherwise it is retried with load shedding allowed. If the retry is solved, the stage is
//!    *solved*, otherwise it has *failed*.
//!
//! A failed stage aborts the whole run, after writing diagnostic files to the output folder. For
//! a solved stage, the state of the units at the end of the stage's non-overlapping range becomes
//! the initial condition for the next stage and the non-overlapping part of the solution is added
//! to the result.
use crate::optimisation::{OptimisationError, Problem, SolverName};
use crate::output::write_unit_states;
use crate::power_system::{FormulationOptions, PowerSystemModel};
use crate::solution::{MultiStageSolution, StageSolution};
use crate::timeline::{Stage, Timeline};
use anyhow::{Context, Result};
use chrono::Local;
use log::{error, info, warn};
use std::path::Path;

/// The file name for the formulation of a stage which could not be solved
pub const INFEASIBLE_PROBLEM_FILE_NAME: &str = "infeasible-problem.lp";

/// The file name for the unit states of a stage which could not be solved
pub const INFEASIBLE_STATUS_FILE_NAME: &str = "infeasible-stage-status.csv";

/// Options controlling a rolling-horizon run
#[derive(Debug, Clone, PartialEq)]
pub struct CommitmentOptions {
    /// The solver to use for each stage
    pub solver: SolverName,
    /// The length of the non-overlapping part of each stage, in hours
    pub hours_commitment: f64,
    /// The length of the overlap at the end of each stage, in hours
    pub hours_commitment_overlap: f64,
    /// The length of each interval (defaults to the timeline's interval)
    pub interval_hours: Option<f64>,
    /// Whether to write the formulation of each stage to file
    pub write_problem_files: bool,
    /// Whether to include the wall-clock time when logging the start of each stage
    pub show_clock: bool,
}

impl Default for CommitmentOptions {
    fn default() -> Self {
        Self {
            solver: SolverName::default(),
            hours_commitment: 24.0,
            hours_commitment_overlap: 0.0,
            interval_hours: None,
            write_problem_files: false,
            show_clock: true,
        }
    }
}

/// Divide the timeline into stages, or use a single stage if the timeline is short enough
fn create_stages(timeline: &Timeline, options: &CommitmentOptions) -> Result<Vec<Stage>> {
    let interval_hours = options
        .interval_hours
        .unwrap_or_else(|| timeline.interval_hours());
    if timeline.len() as f64 * interval_hours <= options.hours_commitment {
        info!("Timeline fits into a single stage");
        return Ok(vec![timeline.single_stage(options.interval_hours)]);
    }

    timeline.subdivide(
        options.hours_commitment,
        options.hours_commitment_overlap,
        options.interval_hours,
    )
}

/// Solve a power-system model over the whole timeline, stage by stage.
///
/// # Arguments
///
/// * `model` - The power-system model, holding the initial conditions for the first stage
/// * `timeline` - The master timeline
/// * `options` - Options for the run
/// * `output_path` - Folder for per-stage and diagnostic files
///
/// # Returns
///
/// The stitched solution, or an error if any stage could not be solved even with load shedding.
pub fn solve_commitment<M: PowerSystemModel>(
    model: &mut M,
    timeline: &Timeline,
    options: &CommitmentOptions,
    output_path: &Path,
) -> Result<MultiStageSolution> {
    let stages = create_stages(timeline, options)?;
    info!("Solving {} stage(s) with {}", stages.len(), options.solver);

    let mut solution = MultiStageSolution::new();
    let mut initial_conditions = model.initial_conditions();
    for stage in &stages {
        if options.show_clock {
            info!(
                "Stage {}/{} starting at {} (clock: {})",
                stage.index + 1,
                stages.len(),
                stage.start_time(),
                Local::now().format("%H:%M:%S")
            );
        } else {
            info!(
                "Stage {}/{} starting at {}",
                stage.index + 1,
                stages.len(),
                stage.start_time()
            );
        }

        model.set_initial_conditions(stage.initial_time, initial_conditions)?;
        let (problem, load_shedding) = solve_stage(model, stage, options, output_path)?;

        initial_conditions = model.final_conditions(&problem, stage, stage.boundary())?;
        solution.push(StageSolution::from_problem(&problem, stage, load_shedding)?)?;
    }

    info!(
        "All stages solved in {:.4} sec",
        solution.total_solve_time().as_secs_f64()
    );

    Ok(solution)
}

/// Solve a single stage, retrying with load shedding if needed
fn solve_stage<M: PowerSystemModel>(
    model: &M,
    stage: &Stage,
    options: &CommitmentOptions,
    output_path: &Path,
) -> Result<(Problem, bool)> {
    let problem = build_and_solve(model, stage, FormulationOptions::default(), options, output_path)?;
    if problem.is_solved() {
        return Ok((problem, false));
    }

    let err = OptimisationError::StageInfeasible {
        start: stage.start_time(),
        status: problem.status_text(),
    };
    error!("{err}. Retrying with load shedding allowed.");

    let relaxed = FormulationOptions {
        load_shedding_allowed: true,
    };
    let problem = build_and_solve(model, stage, relaxed, options, output_path)?;
    if problem.is_solved() {
        warn!(
            "Stage starting at {} solved with load shedding allowed",
            stage.start_time()
        );
        return Ok((problem, true));
    }

    Err(write_failure_diagnostics(model, stage, &problem, output_path)?.into())
}

/// Build the problem for a stage and solve it
fn build_and_solve<M: PowerSystemModel>(
    model: &M,
    stage: &Stage,
    formulation: FormulationOptions,
    options: &CommitmentOptions,
    output_path: &Path,
) -> Result<Problem> {
    let mut problem = Problem::new(format!("stage-{}", stage.file_label()));
    problem.add_variables(model.create_variables(stage, formulation).into_values())?;
    problem.add_constraints(model.create_constraints(stage, formulation))?;
    problem.add_objective(model.create_objective(stage, formulation))?;

    if options.write_problem_files {
        let suffix = if formulation.load_shedding_allowed {
            "-load-shedding"
        } else {
            ""
        };
        let file_path =
            output_path.join(format!("problem-stage-{}{suffix}.lp", stage.file_label()));
        problem.write(&file_path)?;
    }

    problem.solve(options.solver)?;

    Ok(problem)
}

/// Write files for examining a stage which could not be solved
fn write_failure_diagnostics<M: PowerSystemModel>(
    model: &M,
    stage: &Stage,
    problem: &Problem,
    output_path: &Path,
) -> Result<OptimisationError> {
    let problem_path = output_path.join(INFEASIBLE_PROBLEM_FILE_NAME);
    problem
        .write(&problem_path)
        .context("Failed to write infeasible problem")?;

    let status_path = output_path.join(INFEASIBLE_STATUS_FILE_NAME);
    write_unit_states(&status_path, stage, &model.initial_conditions())
        .context("Failed to write unit status for infeasible stage")?;

    Ok(OptimisationError::MultiStageInfeasible {
        start: stage.start_time(),
        path: problem_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::hourly_timeline;
    use crate::optimisation::{
        Constraint, ConstraintMap, LinearExpr, Variable, VariableID, VariableMap,
    };
    use crate::power_system::{UnitState, UnitStateMap};
    use crate::units::{Hours, Power};
    use chrono::NaiveDateTime;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use std::cell::RefCell;
    use tempfile::tempdir;

    /// A model with one unit whose output must equal the demand at each instant
    struct MockModel {
        /// Demand at each instant
        demand: Vec<f64>,
        /// Maximum output of the unit
        capacity: f64,
        /// Maximum load which can be shed at each instant
        max_shed: f64,
        /// The unit's current initial condition
        initial: UnitState,
        /// Whether load shedding was allowed, for each formulation built
        formulations: RefCell<Vec<bool>>,
        /// Every call made to `set_initial_conditions`
        initial_conditions_set: Vec<(NaiveDateTime, UnitStateMap)>,
    }

    impl MockModel {
        fn new(demand: Vec<f64>) -> Self {
            Self {
                demand,
                capacity: 100.0,
                max_shed: f64::INFINITY,
                initial: UnitState {
                    status: false,
                    hours_in_status: Hours(0.0),
                    power: Power(0.0),
                },
                formulations: RefCell::new(Vec::new()),
                initial_conditions_set: Vec::new(),
            }
        }
    }

    fn x_var(t: usize) -> VariableID {
        format!("x_t{t}").into()
    }

    fn shed_var(t: usize) -> VariableID {
        format!("shed_t{t}").into()
    }

    impl PowerSystemModel for MockModel {
        fn create_variables(&self, stage: &Stage, options: FormulationOptions) -> VariableMap {
            let mut vars = VariableMap::new();
            for t in stage.range.clone() {
                let var = Variable::continuous(x_var(t), 0.0, self.capacity).at_time(t);
                vars.insert(var.id.clone(), var);
                if options.load_shedding_allowed {
                    let var = Variable::continuous(shed_var(t), 0.0, self.max_shed).at_time(t);
                    vars.insert(var.id.clone(), var);
                }
            }
            vars
        }

        fn create_constraints(&self, stage: &Stage, options: FormulationOptions) -> ConstraintMap {
            self.formulations
                .borrow_mut()
                .push(options.load_shedding_allowed);

            let mut constraints = ConstraintMap::new();
            for t in stage.range.clone() {
                let mut expr = LinearExpr::new().with_term(&x_var(t), 1.0);
                if options.load_shedding_allowed {
                    expr.add_term(&shed_var(t), 1.0);
                }
                constraints.insert(
                    format!("balance_t{t}").into(),
                    Constraint::eq(expr, self.demand[t]).at_time(t),
                );
            }
            constraints
        }

        fn create_objective(&self, stage: &Stage, options: FormulationOptions) -> LinearExpr {
            let mut objective = LinearExpr::new();
            for t in stage.range.clone() {
                objective.add_term(&x_var(t), 1.0);
                if options.load_shedding_allowed {
                    objective.add_term(&shed_var(t), 1000.0);
                }
            }
            objective
        }

        fn set_initial_conditions(
            &mut self,
            initial_time: NaiveDateTime,
            states: UnitStateMap,
        ) -> Result<()> {
            self.initial = states["unit"];
            self.initial_conditions_set.push((initial_time, states));
            Ok(())
        }

        fn initial_conditions(&self) -> UnitStateMap {
            [("unit".into(), self.initial)].into_iter().collect()
        }

        fn final_conditions(
            &self,
            problem: &Problem,
            _stage: &Stage,
            at: usize,
        ) -> Result<UnitStateMap> {
            let power = problem.value(&x_var(at))?;
            let state = UnitState {
                status: power > 0.0,
                hours_in_status: Hours(0.0),
                power: Power(power),
            };
            Ok([("unit".into(), state)].into_iter().collect())
        }
    }

    fn options(hours_commitment: f64, overlap: f64) -> CommitmentOptions {
        CommitmentOptions {
            hours_commitment,
            hours_commitment_overlap: overlap,
            show_clock: false,
            ..CommitmentOptions::default()
        }
    }

    /// Demand equal to the index of each instant, so states identify the instant they came from
    fn ramp_demand(n: usize) -> Vec<f64> {
        (0..n).map(|t| t as f64).collect()
    }

    #[test]
    fn test_carry_over_from_boundary() {
        let timeline = hourly_timeline(48);
        let mut model = MockModel::new(ramp_demand(48));
        let dir = tempdir().unwrap();
        let solution =
            solve_commitment(&mut model, &timeline, &options(24.0, 6.0), dir.path()).unwrap();

        assert_eq!(solution.stages().len(), 2);
        assert_eq!(solution.covered(), 48);
        for t in 0..48 {
            let value = solution.value(x_var(t).as_str()).unwrap();
            assert_approx_eq!(f64, value, t as f64, epsilon = 1e-6);
        }

        // First stage starts from the model's own initial conditions
        let (time, states) = &model.initial_conditions_set[0];
        assert_eq!(*time, timeline.initial_time());
        assert_eq!(states["unit"].power, Power(0.0));

        // Second stage starts from the state at instant 23, not at the end of the overlap
        let (time, states) = &model.initial_conditions_set[1];
        assert_eq!(*time, timeline.time(23));
        assert_approx_eq!(f64, states["unit"].power.value(), 23.0, epsilon = 1e-6);

        assert_eq!(*model.formulations.borrow(), [false, false]);
    }

    #[test]
    fn test_single_stage() {
        let timeline = hourly_timeline(12);
        let mut model = MockModel::new(ramp_demand(12));
        let dir = tempdir().unwrap();
        let solution =
            solve_commitment(&mut model, &timeline, &options(24.0, 6.0), dir.path()).unwrap();

        assert_eq!(solution.stages().len(), 1);
        assert_eq!(solution.stages()[0].non_overlap, 0..12);
        assert_eq!(solution.covered(), 12);
    }

    #[test]
    fn test_retry_with_load_shedding() {
        let timeline = hourly_timeline(72);
        let mut demand = ramp_demand(72);
        demand[30] = 150.0; // more than the capacity, in the second stage only
        let mut model = MockModel::new(demand);
        let dir = tempdir().unwrap();
        let solution =
            solve_commitment(&mut model, &timeline, &options(24.0, 0.0), dir.path()).unwrap();

        // Load shedding is only allowed for the retry
        assert_eq!(*model.formulations.borrow(), [false, false, true, false]);
        let shedding: Vec<_> = solution
            .stages()
            .iter()
            .map(|stage| stage.load_shedding)
            .collect();
        assert_eq!(shedding, [false, true, false]);
        assert!(solution.load_shedding_used());
        assert_approx_eq!(
            f64,
            solution.value(shed_var(30).as_str()).unwrap(),
            50.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_retry_fails() {
        let timeline = hourly_timeline(48);
        let mut demand = ramp_demand(48);
        demand[40] = 150.0;
        let mut model = MockModel::new(demand);
        model.max_shed = 10.0;
        let dir = tempdir().unwrap();
        let result = solve_commitment(&mut model, &timeline, &options(24.0, 0.0), dir.path());

        let err = result.unwrap_err();
        let Some(OptimisationError::MultiStageInfeasible { start, path }) =
            err.downcast_ref::<OptimisationError>()
        else {
            panic!("Unexpected error: {err:?}");
        };
        assert_eq!(*start, timeline.time(24));
        assert_eq!(*path, dir.path().join(INFEASIBLE_PROBLEM_FILE_NAME));
        assert!(path.is_file());
        assert!(dir.path().join(INFEASIBLE_STATUS_FILE_NAME).is_file());
        assert_eq!(*model.formulations.borrow(), [false, false, true]);
    }

    #[rstest]
    #[case(false, 0)]
    #[case(true, 2)]
    fn test_write_problem_files(#[case] write_problem_files: bool, #[case] expected: usize) {
        let timeline = hourly_timeline(48);
        let mut model = MockModel::new(ramp_demand(48));
        let dir = tempdir().unwrap();
        let options = CommitmentOptions {
            write_problem_files,
            ..options(24.0, 0.0)
        };
        solve_commitment(&mut model, &timeline, &options, dir.path()).unwrap();

        let lp_files = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .unwrap()
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == "lp")
            })
            .count();
        assert_eq!(lp_files, expected);
        if write_problem_files {
            assert!(
                dir.path()
                    .join("problem-stage-2024-01-02--00-00.lp")
                    .is_file()
            );
        }
    }
}
