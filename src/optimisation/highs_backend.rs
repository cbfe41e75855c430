//! Solving problems with HiGHS.
//!
//! Mixed-integer problems do not have meaningful dual values, so once HiGHS has found the optimal
//! integer solution, every discrete variable is fixed to its (rounded) value and the resulting
//! linear problem is solved again. The duals of this second solve are the ones reported.
use super::solver::{RawSolution, SolverBackend, TerminationStatus};
use super::{OptimisationError, Problem, Variable};
use highs::{HighsModelStatus, RowProblem, Sense};
use log::{Level, error, log_enabled, trace};
use std::time::{Duration, Instant};

/// Solves problems with the HiGHS C library
pub struct HighsBackend;

/// How the discrete variables of a problem should be treated when building the HiGHS model
#[derive(Clone, Copy)]
enum Discrete<'a> {
    /// Keep them as integer columns
    Keep,
    /// Make them continuous, fixed to these values (indexed by column)
    Fix(&'a [f64]),
}

/// Convert a [`Problem`] into the row-wise form used by HiGHS
fn build_row_problem(problem: &Problem, discrete: Discrete) -> RowProblem {
    let mut highs_problem = RowProblem::default();
    let coeffs = problem.objective_coefficients();

    let columns: Vec<_> = problem
        .iter_variables()
        .zip(coeffs)
        .enumerate()
        .map(|(idx, (var, coeff))| add_column(&mut highs_problem, var, coeff, idx, discrete))
        .collect();

    for (_, constraint) in problem.iter_constraints() {
        let row: Vec<_> = constraint
            .expr
            .iter_terms()
            .map(|(var, coeff)| {
                let idx = problem
                    .variable_index(var)
                    .expect("Constraint variables are checked on registration");
                (columns[idx], coeff)
            })
            .collect();
        highs_problem.add_row(constraint.lower..=constraint.upper, row);
    }

    highs_problem
}

/// Add a single variable to the HiGHS problem as a column
fn add_column(
    highs_problem: &mut RowProblem,
    var: &Variable,
    coeff: f64,
    idx: usize,
    discrete: Discrete,
) -> highs::Col {
    if !var.kind.is_discrete() {
        return highs_problem.add_column(coeff, var.lower..=var.upper);
    }

    match discrete {
        Discrete::Keep => highs_problem.add_integer_column(coeff, var.lower..=var.upper),
        Discrete::Fix(values) => {
            let value = values[idx].round();
            highs_problem.add_column(coeff, value..=value)
        }
    }
}

/// Convert a HiGHS model status into a [`TerminationStatus`]
fn termination_status(status: HighsModelStatus) -> TerminationStatus {
    match status {
        // A problem without any variables is trivially solved
        HighsModelStatus::Optimal | HighsModelStatus::ModelEmpty => TerminationStatus::Optimal,
        HighsModelStatus::Infeasible => TerminationStatus::Infeasible,
        HighsModelStatus::Unbounded => TerminationStatus::Unbounded,
        HighsModelStatus::UnboundedOrInfeasible => TerminationStatus::InfeasibleOrUnbounded,
        status => TerminationStatus::Other(format!("{status:?}")),
    }
}

/// The result of a single call to HiGHS
struct HighsOutcome {
    termination: TerminationStatus,
    columns: Vec<f64>,
    duals: Vec<f64>,
}

/// Solve the problem once with HiGHS
fn run_highs(highs_problem: RowProblem, num_cols: usize, num_rows: usize) -> HighsOutcome {
    let mut model = match highs_problem.try_optimise(Sense::Minimise) {
        Ok(model) => model,
        Err(status) => {
            return HighsOutcome {
                termination: TerminationStatus::Other(format!("HiGHS error: {status:?}")),
                columns: Vec::new(),
                duals: Vec::new(),
            };
        }
    };

    // HiGHS writes straight to stdout, so only let it do so when the user really wants to know
    model.set_option("output_flag", log_enabled!(Level::Trace));

    let solved = match model.try_solve() {
        Ok(solved) => solved,
        Err(status) => {
            return HighsOutcome {
                termination: TerminationStatus::Other(format!("HiGHS error: {status:?}")),
                columns: Vec::new(),
                duals: Vec::new(),
            };
        }
    };

    let termination = termination_status(solved.status());
    if termination != TerminationStatus::Optimal || num_cols == 0 {
        return HighsOutcome {
            termination,
            columns: Vec::new(),
            duals: vec![0.0; if num_cols == 0 { num_rows } else { 0 }],
        };
    }

    let solution = solved.get_solution();
    HighsOutcome {
        termination,
        columns: solution.columns().to_vec(),
        duals: solution.dual_rows().to_vec(),
    }
}

impl SolverBackend for HighsBackend {
    fn supports_duals(&self) -> bool {
        true
    }

    fn solve(&self, problem: &Problem) -> RawSolution {
        let start = Instant::now();
        let num_cols = problem.num_variables();
        let num_rows = problem.num_constraints();

        let first = run_highs(
            build_row_problem(problem, Discrete::Keep),
            num_cols,
            num_rows,
        );
        if first.termination != TerminationStatus::Optimal {
            return RawSolution::unsolved(first.termination, start.elapsed());
        }

        if !problem.has_discrete_variables() {
            return RawSolution {
                termination: first.termination,
                columns: first.columns,
                duals: Some(first.duals),
                elapsed: start.elapsed(),
            };
        }

        // Resolve with the discrete variables fixed to get duals
        trace!("Fixing discrete variables and resolving for duals");
        let fixed = run_highs(
            build_row_problem(problem, Discrete::Fix(&first.columns)),
            num_cols,
            num_rows,
        );

        with_fixed_duals(first, fixed, start.elapsed())
    }
}

/// Combine the solution of a MILP with the duals from resolving it with discrete variables fixed.
///
/// A failed resolve leaves the MILP solution intact, but without duals.
fn with_fixed_duals(first: HighsOutcome, fixed: HighsOutcome, elapsed: Duration) -> RawSolution {
    let duals = if fixed.termination == TerminationStatus::Optimal {
        Some(fixed.duals)
    } else {
        error!(
            "{}",
            OptimisationError::DualsUnavailable(format!(
                "resolve with fixed discrete variables terminated with status \"{}\"",
                fixed.termination
            ))
        );
        None
    };

    RawSolution {
        termination: first.termination,
        columns: first.columns,
        duals,
        elapsed,
    }
}
