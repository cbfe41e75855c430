//! Solving problems with the pure-Rust microlp solver, through `good_lp`.
//!
//! microlp does not report dual values, so problems solved this way never have valid duals.
use super::solver::{RawSolution, SolverBackend, TerminationStatus};
use super::{LinearExpr, Problem, VariableKind};
use good_lp::solvers::microlp::microlp;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, constraint, variable,
};
use std::time::Instant;

/// Solves problems with microlp
pub struct MicrolpBackend;

/// Convert a [`LinearExpr`] into a `good_lp` expression, dropping the constant
fn to_expression(
    problem: &Problem,
    expr: &LinearExpr,
    columns: &[good_lp::Variable],
) -> Expression {
    let mut out = Expression::with_capacity(expr.len());
    for (var, coeff) in expr.iter_terms() {
        if let Some(idx) = problem.variable_index(var) {
            out.add_mul(coeff, columns[idx]);
        }
    }

    out
}

/// Convert a `good_lp` error into a [`TerminationStatus`]
fn termination_status(err: ResolutionError) -> TerminationStatus {
    match err {
        ResolutionError::Infeasible => TerminationStatus::Infeasible,
        ResolutionError::Unbounded => TerminationStatus::Unbounded,
        err => TerminationStatus::Other(err.to_string()),
    }
}

impl SolverBackend for MicrolpBackend {
    fn supports_duals(&self) -> bool {
        false
    }

    fn solve(&self, problem: &Problem) -> RawSolution {
        let start = Instant::now();

        let mut vars = ProblemVariables::new();
        let columns: Vec<_> = problem
            .iter_variables()
            .map(|var| {
                let definition = variable().name(var.id.as_str());
                let definition = match var.kind {
                    VariableKind::Continuous => definition.min(var.lower).max(var.upper),
                    VariableKind::Binary => definition.binary(),
                    VariableKind::Integer => definition.integer().min(var.lower).max(var.upper),
                };
                vars.add(definition)
            })
            .collect();

        let objective = to_expression(problem, problem.objective(), &columns);
        let mut model = vars.minimise(objective).using(microlp);
        for (_, con) in problem.iter_constraints() {
            let lhs = || to_expression(problem, &con.expr, &columns);
            if con.is_equality() {
                model.add_constraint(constraint::eq(lhs(), con.lower));
                continue;
            }
            if con.lower.is_finite() {
                model.add_constraint(constraint::geq(lhs(), con.lower));
            }
            if con.upper.is_finite() {
                model.add_constraint(constraint::leq(lhs(), con.upper));
            }
        }

        match model.solve() {
            Ok(solution) => RawSolution {
                termination: TerminationStatus::Optimal,
                columns: columns.iter().map(|col| solution.value(*col)).collect(),
                duals: None,
                elapsed: start.elapsed(),
            },
            Err(err) => RawSolution::unsolved(termination_status(err), start.elapsed()),
        }
    }
}
