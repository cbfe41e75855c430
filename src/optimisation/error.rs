//! Errors arising from building and solving optimisation problems.
use chrono::NaiveDateTime;
use std::path::PathBuf;
use thiserror::Error;

/// An error raised while formulating or solving an optimisation problem.
///
/// These are generally wrapped in an [`anyhow::Error`]; use `downcast_ref` to recover them.
#[derive(Debug, Error, PartialEq)]
pub enum OptimisationError {
    /// The problem was built with malformed input (programmer error, never retried)
    #[error("Invalid problem formulation: {0}")]
    Configuration(String),
    /// The requested solver does not exist
    #[error("Solver \"{0}\" not found")]
    SolverNotFound(String),
    /// A single attempt at solving a stage failed
    #[error("Stage starting at {start} not solved: solver terminated with status \"{status}\"")]
    StageInfeasible {
        /// The first instant of the stage
        start: NaiveDateTime,
        /// The solver's termination status
        status: String,
    },
    /// Shadow prices could not be obtained
    #[error("Duals unavailable: {0}")]
    DualsUnavailable(String),
    /// A stage could not be solved even with load shedding allowed
    #[error(
        "Infeasible problem in stage starting at {start}. The formulation has been written to \
        {path:?} for examination."
    )]
    MultiStageInfeasible {
        /// The first instant of the stage
        start: NaiveDateTime,
        /// Where the formulation of the failed problem was written
        path: PathBuf,
    },
}
