//! Selection of solver backends.
//!
//! Each [`SolverName`] maps onto exactly one [`SolverBackend`] strategy. Backends receive a fully
//! registered [`Problem`] and report back the termination status, the column values and (if they
//! can) the dual values for each constraint row.
use super::good_lp_backend::MicrolpBackend;
use super::highs_backend::HighsBackend;
use super::{OptimisationError, Problem};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// The solvers which can be used to solve a [`Problem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SolverName {
    /// The HiGHS solver, called directly through its C API
    #[default]
    Highs,
    /// The pure-Rust microlp solver, called through the `good_lp` modelling layer
    Microlp,
}

impl SolverName {
    /// Look up a solver by name (case insensitive)
    pub fn from_name(name: &str) -> Result<Self, OptimisationError> {
        Self::from_str(name.trim()).map_err(|_| OptimisationError::SolverNotFound(name.into()))
    }

    /// A comma-separated list of the names of all available solvers
    pub fn available() -> String {
        Self::iter().map(|solver| solver.to_string()).collect::<Vec<_>>().join(", ")
    }

    /// Create the backend which implements this solver
    pub fn backend(self) -> Box<dyn SolverBackend> {
        match self {
            Self::Highs => Box::new(HighsBackend),
            Self::Microlp => Box::new(MicrolpBackend),
        }
    }
}

/// How a call to a solver finished
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem has no feasible solution
    Infeasible,
    /// The objective can be decreased without bound
    Unbounded,
    /// The solver could not tell whether the problem is infeasible or unbounded
    InfeasibleOrUnbounded,
    /// Any other outcome, including solver errors
    Other(String),
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimal => write!(f, "optimal"),
            Self::Infeasible => write!(f, "infeasible"),
            Self::Unbounded => write!(f, "unbounded"),
            Self::InfeasibleOrUnbounded => write!(f, "infeasible or unbounded"),
            Self::Other(status) => write!(f, "{status}"),
        }
    }
}

/// What a backend reports after solving a problem
#[derive(Debug, Clone, PartialEq)]
pub struct RawSolution {
    /// How the solver terminated
    pub termination: TerminationStatus,
    /// Values of the variables, in registration order (empty unless optimal)
    pub columns: Vec<f64>,
    /// Dual values of the constraints, in registration order, if valid ones are available
    pub duals: Option<Vec<f64>>,
    /// Total time spent solving, including any resolve for duals
    pub elapsed: Duration,
}

impl RawSolution {
    /// A solution for a problem which could not be solved to optimality
    pub fn unsolved(termination: TerminationStatus, elapsed: Duration) -> Self {
        Self {
            termination,
            columns: Vec::new(),
            duals: None,
            elapsed,
        }
    }
}

/// A strategy for solving a [`Problem`] with a particular solver
pub trait SolverBackend {
    /// Whether this backend can ever report dual values
    fn supports_duals(&self) -> bool;

    /// Solve the problem, minimising its objective.
    ///
    /// Failure to find an optimal solution is reported through the termination status rather than
    /// as an error.
    fn solve(&self, problem: &Problem) -> RawSolution;
}
