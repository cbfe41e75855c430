//! Solutions for individual stages and the stitched multi-stage result.
use crate::optimisation::{ConstraintID, Problem, VariableID};
use crate::timeline::Stage;
use anyhow::{Result, ensure};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::ops::Range;
use std::time::Duration;

/// Summary information about how a stage was solved
#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary {
    /// The position of the stage in the sequence of stages
    pub index: usize,
    /// The first instant of the stage
    pub start: NaiveDateTime,
    /// Indices of the instants whose results were kept
    pub non_overlap: Range<usize>,
    /// The solver's termination status
    pub status: String,
    /// Time spent solving, including any resolve for duals
    pub solve_time: Duration,
    /// Value of the objective for the whole stage (including the overlap)
    pub objective_value: f64,
    /// Whether the duals for the stage are valid
    pub duals_valid: bool,
    /// Whether load shedding had to be allowed to solve the stage
    pub load_shedding: bool,
}

/// The solution to a single stage, restricted to the stage's non-overlapping range
#[derive(Debug, Clone, PartialEq)]
pub struct StageSolution {
    /// Information about how the stage was solved
    pub summary: StageSummary,
    values: IndexMap<VariableID, f64>,
    duals: IndexMap<ConstraintID, f64>,
}

impl StageSolution {
    /// Take a snapshot of the solution to a stage's problem.
    ///
    /// Only variables and constraints tagged with an instant in the stage's non-overlapping range
    /// are kept. Duals are only kept if they are valid.
    pub fn from_problem(problem: &Problem, stage: &Stage, load_shedding: bool) -> Result<Self> {
        ensure!(
            problem.is_solved(),
            "Cannot take solution of stage {} which has not been solved",
            stage.index
        );

        let is_kept = |time: Option<usize>| time.is_some_and(|t| stage.is_kept(t));
        let values = problem
            .iter_values()
            .filter(|(var, _)| is_kept(var.time))
            .map(|(var, value)| (var.id.clone(), value))
            .collect();
        let duals = problem
            .iter_duals()
            .filter(|(_, constraint, _)| is_kept(constraint.time))
            .map(|(name, _, dual)| (name.clone(), dual))
            .collect();

        Ok(Self {
            summary: StageSummary {
                index: stage.index,
                start: stage.start_time(),
                non_overlap: stage.non_overlap.clone(),
                status: problem.status_text(),
                solve_time: problem.solve_time(),
                objective_value: problem.objective_value()?,
                duals_valid: problem.duals_valid(),
                load_shedding,
            },
            values,
            duals,
        })
    }

    /// The value of a variable, if it is part of this solution
    pub fn value(&self, var: &str) -> Option<f64> {
        self.values.get(var).copied()
    }

    /// The dual value of a constraint, if it is part of this solution
    pub fn dual(&self, name: &str) -> Option<f64> {
        self.duals.get(name).copied()
    }
}

/// The stitched solution of a rolling-horizon run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiStageSolution {
    stages: Vec<StageSummary>,
    values: IndexMap<VariableID, f64>,
    duals: IndexMap<ConstraintID, f64>,
    covered: usize,
}

impl MultiStageSolution {
    /// Create an empty solution
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the solution for the next stage.
    ///
    /// The stage's non-overlapping range must start where the previous stage's ended.
    pub fn push(&mut self, solution: StageSolution) -> Result<()> {
        let range = &solution.summary.non_overlap;
        ensure!(
            range.start == self.covered,
            "Stage {} starts at instant {} but the solution so far ends at instant {}",
            solution.summary.index,
            range.start,
            self.covered
        );
        self.covered = range.end;

        self.values.extend(solution.values);
        self.duals.extend(solution.duals);
        self.stages.push(solution.summary);

        Ok(())
    }

    /// Summaries of each stage, in order
    pub fn stages(&self) -> &[StageSummary] {
        &self.stages
    }

    /// The number of instants of the master timeline covered so far
    pub fn covered(&self) -> usize {
        self.covered
    }

    /// The total time spent solving all stages
    pub fn total_solve_time(&self) -> Duration {
        self.stages.iter().map(|stage| stage.solve_time).sum()
    }

    /// The sum of the stages' objective values (which include the overlaps)
    pub fn total_objective_value(&self) -> f64 {
        self.stages.iter().map(|stage| stage.objective_value).sum()
    }

    /// Whether load shedding was needed in any stage
    pub fn load_shedding_used(&self) -> bool {
        self.stages.iter().any(|stage| stage.load_shedding)
    }

    /// The value of a variable
    pub fn value(&self, var: &str) -> Option<f64> {
        self.values.get(var).copied()
    }

    /// The dual value of a constraint (`None` if unavailable)
    pub fn dual(&self, name: &str) -> Option<f64> {
        self.duals.get(name).copied()
    }
}
