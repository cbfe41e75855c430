//! A uniform interface for building and solving optimisation problems.
//!
//! A [`Problem`] is populated with [`Variable`]s, [`Constraint`]s and a single objective to
//! minimise, then solved exactly once with one of the available solvers (see [`SolverName`]).
//! After solving, the values of variables and the dual values (shadow prices) of constraints can be
//! queried.
//!
//! Dual values are only meaningful for linear problems. For mixed-integer problems, the HiGHS
//! backend fixes all discrete variables to their solved values and solves the resulting linear
//! problem once more to obtain them. If this fails, or if the backend cannot report duals at all,
//! [`Problem::duals_valid`] is `false` and [`Problem::dual`] returns the caller's default.
use anyhow::{Context, Result, bail, ensure};
use log::{debug, error, info};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

pub mod error;
pub use error::OptimisationError;
pub mod expression;
pub use expression::{
    Constraint, ConstraintID, ConstraintMap, LinearExpr, Variable, VariableID, VariableKind,
    VariableMap,
};
mod good_lp_backend;
mod highs_backend;
mod lp_file;
pub mod solver;
pub use solver::{RawSolution, SolverBackend, SolverName, TerminationStatus};

/// The outcome of solving a [`Problem`]
#[derive(Debug, Clone, PartialEq)]
pub struct SolveStatus {
    /// The solver used
    pub solver: SolverName,
    /// How the solver terminated
    pub termination: TerminationStatus,
    /// Time spent in the solver, including any resolve for duals
    pub solve_time: Duration,
    /// Whether dual values are available
    pub duals_valid: bool,
}

impl SolveStatus {
    /// Whether an optimal solution was found
    pub fn is_solved(&self) -> bool {
        self.termination == TerminationStatus::Optimal
    }
}

/// An optimisation problem which is minimised.
///
/// Variables, constraints and the objective can only be added before the problem is solved.
#[derive(Debug, Default)]
pub struct Problem {
    name: String,
    variables: VariableMap,
    constraints: ConstraintMap,
    objective: LinearExpr,
    status: Option<SolveStatus>,
    values: Vec<f64>,
    duals: Option<Vec<f64>>,
}

/// Something which has a numeric value once a [`Problem`] has been solved
pub trait Value {
    /// The value of `self` in the solution to `problem`
    fn value_in(&self, problem: &Problem) -> Result<f64>;
}

impl Value for f64 {
    /// Plain numbers are their own value
    fn value_in(&self, _problem: &Problem) -> Result<f64> {
        Ok(*self)
    }
}

impl Value for VariableID {
    fn value_in(&self, problem: &Problem) -> Result<f64> {
        problem.variable_value(self.as_str())
    }
}

impl Value for Variable {
    fn value_in(&self, problem: &Problem) -> Result<f64> {
        problem.variable_value(self.id.as_str())
    }
}

impl Value for str {
    fn value_in(&self, problem: &Problem) -> Result<f64> {
        problem.variable_value(self)
    }
}

impl Value for LinearExpr {
    fn value_in(&self, problem: &Problem) -> Result<f64> {
        let mut value = self.constant_term();
        for (var, coeff) in self.iter_terms() {
            value += coeff * problem.variable_value(var.as_str())?;
        }

        Ok(value)
    }
}

/// Shorthand for creating an [`OptimisationError::Configuration`]
macro_rules! config_err {
    ($($arg:tt)*) => {
        OptimisationError::Configuration(format!($($arg)*))
    };
}

impl Problem {
    /// Create a new, empty problem
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The name of the problem
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check that the problem can still be modified
    fn ensure_unsolved(&self) -> Result<()> {
        if self.status.is_some() {
            return Err(config_err!(
                "Problem \"{}\" cannot be modified after it has been solved",
                self.name
            )
            .into());
        }

        Ok(())
    }

    /// Check that every variable in `expr` has been registered
    fn check_expression(&self, expr: &LinearExpr, context: &str) -> Result<()> {
        for (var, _) in expr.iter_terms() {
            if !self.variables.contains_key(var) {
                let err = config_err!("{context} references unknown variable \"{var}\"");
                return Err(err.into());
            }
        }

        Ok(())
    }

    /// Register a decision variable.
    ///
    /// Registering a variable which is identical to one already present has no effect. Registering
    /// a different variable with the same name is an error.
    pub fn add_variable(&mut self, var: Variable) -> Result<()> {
        self.ensure_unsolved()?;
        ensure!(
            var.lower <= var.upper && !var.lower.is_nan() && !var.upper.is_nan(),
            config_err!(
                "Variable \"{}\" has invalid bounds [{}, {}]",
                var.id,
                var.lower,
                var.upper
            )
        );

        if let Some(existing) = self.variables.get(&var.id) {
            if *existing == var {
                return Ok(());
            }

            return Err(config_err!(
                "Variable \"{}\" was registered twice with different definitions",
                var.id
            )
            .into());
        }

        self.variables.insert(var.id.clone(), var);
        Ok(())
    }

    /// Register several decision variables
    pub fn add_variables<I>(&mut self, variables: I) -> Result<()>
    where
        I: IntoIterator<Item = Variable>,
    {
        for var in variables {
            self.add_variable(var)?;
        }

        Ok(())
    }

    /// Register a named constraint
    pub fn add_constraint(
        &mut self,
        name: impl Into<ConstraintID>,
        constraint: Constraint,
    ) -> Result<()> {
        self.ensure_unsolved()?;
        let name = name.into();
        ensure!(
            !self.constraints.contains_key(&name),
            config_err!("Duplicate constraint name \"{name}\"")
        );
        ensure!(
            !constraint.lower.is_nan() && !constraint.upper.is_nan(),
            config_err!("Constraint \"{name}\" has a NaN bound")
        );
        self.check_expression(&constraint.expr, &format!("Constraint \"{name}\""))?;

        self.constraints.insert(name, constraint);
        Ok(())
    }

    /// Register several named constraints.
    ///
    /// An empty collection is a no-op.
    pub fn add_constraints<I>(&mut self, constraints: I) -> Result<()>
    where
        I: IntoIterator<Item = (ConstraintID, Constraint)>,
    {
        for (name, constraint) in constraints {
            self.add_constraint(name, constraint)?;
        }

        Ok(())
    }

    /// Set the objective to minimise, replacing any previous objective
    pub fn add_objective(&mut self, objective: LinearExpr) -> Result<()> {
        self.ensure_unsolved()?;
        self.check_expression(&objective, "Objective")?;
        self.objective = objective;

        Ok(())
    }

    /// Iterate over the registered variables in registration order
    pub fn iter_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    /// Iterate over the registered constraints in registration order
    pub fn iter_constraints(&self) -> impl Iterator<Item = (&ConstraintID, &Constraint)> {
        self.constraints.iter()
    }

    /// The objective to be minimised
    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    /// The number of registered variables
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// The number of registered constraints
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// The position of a variable in registration order
    pub fn variable_index(&self, var: &VariableID) -> Option<usize> {
        self.variables.get_index_of(var)
    }

    /// Whether any of the variables are binary or integer
    pub fn has_discrete_variables(&self) -> bool {
        self.variables.values().any(|var| var.kind.is_discrete())
    }

    /// The objective coefficient for each variable, in registration order
    pub fn objective_coefficients(&self) -> Vec<f64> {
        let mut coeffs = vec![0.0; self.variables.len()];
        for (var, coeff) in self.objective.iter_terms() {
            if let Some(idx) = self.variable_index(var) {
                coeffs[idx] += coeff;
            }
        }

        coeffs
    }

    /// Solve the problem with the given solver.
    ///
    /// Failing to find an optimal solution is *not* an error: check [`Problem::is_solved`]
    /// afterwards. An error is only returned if the problem has already been solved.
    pub fn solve(&mut self, solver: SolverName) -> Result<()> {
        self.ensure_unsolved()?;

        info!("Solving with {solver} ...");
        let backend = solver.backend();
        let raw = backend.solve(self);

        self.store_solution(solver, raw, backend.supports_duals())
    }

    /// Record what a solver reported for this problem
    fn store_solution(
        &mut self,
        solver: SolverName,
        raw: RawSolution,
        supports_duals: bool,
    ) -> Result<()> {
        let solved = raw.termination == TerminationStatus::Optimal;
        if solved {
            info!(
                "{} in {:.4} sec",
                raw.termination,
                raw.elapsed.as_secs_f64()
            );
            ensure!(
                raw.columns.len() == self.variables.len(),
                "Solver {solver} returned {} values for {} variables",
                raw.columns.len(),
                self.variables.len()
            );
            self.values = raw.columns;
            self.duals = raw
                .duals
                .filter(|duals| duals.len() == self.constraints.len());
            if supports_duals && self.duals.is_none() {
                debug!(
                    "{}",
                    OptimisationError::DualsUnavailable(format!(
                        "no valid duals for problem \"{}\"",
                        self.name
                    ))
                );
            }
        } else {
            error!(
                "Problem not solved. Solver terminated with status: \"{}\"",
                raw.termination
            );
        }

        self.status = Some(SolveStatus {
            solver,
            termination: raw.termination,
            solve_time: raw.elapsed,
            duals_valid: solved && self.duals.is_some(),
        });

        Ok(())
    }

    /// The outcome of solving the problem, if it has been solved
    pub fn status(&self) -> Option<&SolveStatus> {
        self.status.as_ref()
    }

    /// Whether the problem was solved to optimality
    pub fn is_solved(&self) -> bool {
        self.status.as_ref().is_some_and(SolveStatus::is_solved)
    }

    /// A description of the solver's termination status
    pub fn status_text(&self) -> String {
        self.status
            .as_ref()
            .map_or_else(|| "not solved".into(), |status| status.termination.to_string())
    }

    /// Time spent solving (zero if not yet solved)
    pub fn solve_time(&self) -> Duration {
        self.status
            .as_ref()
            .map_or(Duration::ZERO, |status| status.solve_time)
    }

    /// Whether valid dual values are available
    pub fn duals_valid(&self) -> bool {
        self.status.as_ref().is_some_and(|status| status.duals_valid)
    }

    /// Check that the problem has an optimal solution
    fn ensure_solved(&self) -> Result<()> {
        if !self.is_solved() {
            bail!(
                "Problem \"{}\" has no solution (status: {})",
                self.name,
                self.status_text()
            );
        }

        Ok(())
    }

    /// The value of a variable, by name
    fn variable_value(&self, name: &str) -> Result<f64> {
        self.ensure_solved()?;
        let idx = self
            .variables
            .get_index_of(name)
            .with_context(|| format!("Problem has no variable named \"{name}\""))?;

        Ok(self.values[idx])
    }

    /// The value of a variable, expression or plain number.
    ///
    /// Numbers are returned unchanged, which allows constants and variables to be treated in the
    /// same way.
    pub fn value<V: Value + ?Sized>(&self, item: &V) -> Result<f64> {
        item.value_in(self)
    }

    /// The value of the objective for the solution
    pub fn objective_value(&self) -> Result<f64> {
        self.value(&self.objective)
    }

    /// The dual value (shadow price) of the named constraint.
    ///
    /// If dual values are not available, `default` is returned instead.
    pub fn dual(&self, name: &str, default: f64) -> Result<f64> {
        self.ensure_solved()?;
        let idx = self
            .constraints
            .get_index_of(name)
            .with_context(|| format!("Problem has no constraint named \"{name}\""))?;

        match &self.duals {
            Some(duals) => Ok(duals[idx]),
            None => {
                debug!(
                    "{}. Using {default} for constraint \"{name}\".",
                    OptimisationError::DualsUnavailable(format!("problem \"{}\"", self.name))
                );
                Ok(default)
            }
        }
    }

    /// Write the formulation to a human-readable file in CPLEX LP format.
    ///
    /// This works whether or not the problem has been solved.
    pub fn write(&self, file_path: &Path) -> Result<()> {
        let file = File::create(file_path)
            .with_context(|| format!("Could not create file {}", file_path.display()))?;
        let mut writer = BufWriter::new(file);
        lp_file::write_lp(self, &mut writer)
            .with_context(|| format!("Could not write problem to {}", file_path.display()))?;

        Ok(())
    }

    /// Values of all variables, keyed by name
    pub fn iter_values(&self) -> impl Iterator<Item = (&Variable, f64)> {
        self.variables.values().zip(self.values.iter().copied())
    }

    /// Dual values of all constraints, keyed by name (empty if duals are unavailable)
    pub fn iter_duals(&self) -> impl Iterator<Item = (&ConstraintID, &Constraint, f64)> {
        self.constraints
            .iter()
            .zip(self.duals.iter().flatten().copied())
            .map(|((name, constraint), dual)| (name, constraint, dual))
    }
}
