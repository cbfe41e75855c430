//! The power-system model which is solved for each stage of a rolling-horizon run.
//!
//! The controller in [`crate::commitment`] only talks to the model through the
//! [`PowerSystemModel`] trait. [`PowerSystem`] is a copper-plate (single bus) implementation: a
//! set of generators which together must meet the system demand at every instant, optionally
//! shedding load at a cost when allowed to.
use crate::optimisation::{
    Constraint, ConstraintID, ConstraintMap, LinearExpr, Problem, Variable, VariableID,
    VariableMap,
};
use crate::timeline::Stage;
use crate::units::{Hours, MoneyPerEnergy, Power};
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

pub mod generator;
pub use generator::{Generator, GeneratorID, GeneratorMap};

/// Options which change how a stage's problem is formulated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormulationOptions {
    /// Whether demand may go unmet, at the value of lost load
    pub load_shedding_allowed: bool,
}

/// The operating state of a generating unit at an instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    /// Whether the unit is on
    pub status: bool,
    /// How long the unit has been in its current status
    pub hours_in_status: Hours,
    /// The unit's output
    pub power: Power,
}

/// Operating states for each generating unit
pub type UnitStateMap = IndexMap<GeneratorID, UnitState>;

/// A power-system model which can be formulated as an optimisation problem for a stage.
///
/// The variables and constraints for a stage are tagged with the global indices of the instants
/// they refer to (see [`Variable::time`] and [`Constraint::time`]).
pub trait PowerSystemModel {
    /// The decision variables for the stage
    fn create_variables(&self, stage: &Stage, options: FormulationOptions) -> VariableMap;

    /// The constraints for the stage
    fn create_constraints(&self, stage: &Stage, options: FormulationOptions) -> ConstraintMap;

    /// The objective (total cost) to minimise for the stage
    fn create_objective(&self, stage: &Stage, options: FormulationOptions) -> LinearExpr;

    /// Set the state of the units at `initial_time`, before the next stage is formulated
    fn set_initial_conditions(
        &mut self,
        initial_time: NaiveDateTime,
        states: UnitStateMap,
    ) -> Result<()>;

    /// The last known state of each unit
    fn initial_conditions(&self) -> UnitStateMap;

    /// The state of each unit at the instant with global index `at`, from a solved problem
    fn final_conditions(&self, problem: &Problem, stage: &Stage, at: usize)
    -> Result<UnitStateMap>;
}

/// Name of the load-shedding variable at an instant
pub fn load_shed_var(t: usize) -> VariableID {
    format!("load_shed_t{t}").into()
}

/// Name of the power balance constraint at an instant.
///
/// The dual value of this constraint is the system price.
pub fn power_balance_constraint(t: usize) -> ConstraintID {
    format!("power_balance_t{t}").into()
}

/// A copper-plate power system
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSystem {
    /// The generating units
    pub generators: GeneratorMap,
    /// System demand, indexed by instant in the master timeline
    pub demand: Vec<Power>,
    /// The cost of each unit of unmet demand
    pub value_of_lost_load: MoneyPerEnergy,
    initial_time: Option<NaiveDateTime>,
}

impl PowerSystem {
    /// Create a new power system
    pub fn new(
        generators: GeneratorMap,
        demand: Vec<Power>,
        value_of_lost_load: MoneyPerEnergy,
    ) -> Self {
        Self {
            generators,
            demand,
            value_of_lost_load,
            initial_time: None,
        }
    }

    /// The instant at which the current initial conditions apply, if they have been set
    pub fn initial_time(&self) -> Option<NaiveDateTime> {
        self.initial_time
    }

    /// The combined maximum output of all generators
    pub fn total_capacity(&self) -> Power {
        self.generators
            .values()
            .fold(Power(0.0), |acc, generator| acc + generator.max_power)
    }

    /// The demand at the instant with the given global index
    fn demand_at(&self, t: usize) -> f64 {
        self.demand.get(t).map_or(0.0, |demand| demand.value())
    }
}

impl PowerSystemModel for PowerSystem {
    fn create_variables(&self, stage: &Stage, options: FormulationOptions) -> VariableMap {
        let mut vars: VariableMap = self
            .generators
            .values()
            .flat_map(|generator| generator.variables(stage))
            .map(|var| (var.id.clone(), var))
            .collect();

        if options.load_shedding_allowed {
            for t in stage.range.clone() {
                let var = Variable::continuous(load_shed_var(t), 0.0, self.demand_at(t)).at_time(t);
                vars.insert(var.id.clone(), var);
            }
        }

        vars
    }

    fn create_constraints(&self, stage: &Stage, options: FormulationOptions) -> ConstraintMap {
        let mut constraints = ConstraintMap::new();
        for t in stage.range.clone() {
            let mut supply = LinearExpr::new();
            for id in self.generators.keys() {
                supply.add_term(&generator::power_var(id, t), 1.0);
            }
            if options.load_shedding_allowed {
                supply.add_term(&load_shed_var(t), 1.0);
            }

            constraints.insert(
                power_balance_constraint(t),
                Constraint::eq(supply, self.demand_at(t)).at_time(t),
            );
        }

        for generator in self.generators.values() {
            constraints.extend(generator.constraints(stage));
        }

        constraints
    }

    fn create_objective(&self, stage: &Stage, options: FormulationOptions) -> LinearExpr {
        let mut objective = LinearExpr::new();
        for generator in self.generators.values() {
            objective.extend(&generator.cost(stage));
        }

        if options.load_shedding_allowed {
            let cost = (self.value_of_lost_load * (Power(1.0) * Hours(stage.interval_hours))).value();
            for t in stage.range.clone() {
                objective.add_term(&load_shed_var(t), cost);
            }
        }

        objective
    }

    fn set_initial_conditions(
        &mut self,
        initial_time: NaiveDateTime,
        states: UnitStateMap,
    ) -> Result<()> {
        debug!("Setting initial conditions at {initial_time}");
        for (id, state) in states {
            let generator = self
                .generators
                .get_mut(&id)
                .with_context(|| format!("Initial condition given for unknown generator {id}"))?;
            ensure!(
                state.power <= generator.max_power,
                "Initial power for generator {id} exceeds its maximum power"
            );
            generator.initial = state;
        }
        self.initial_time = Some(initial_time);

        Ok(())
    }

    fn initial_conditions(&self) -> UnitStateMap {
        self.generators
            .values()
            .map(|generator| (generator.id.clone(), generator.initial))
            .collect()
    }

    fn final_conditions(
        &self,
        problem: &Problem,
        stage: &Stage,
        at: usize,
    ) -> Result<UnitStateMap> {
        ensure!(
            stage.range.contains(&at),
            "Instant {at} is not part of stage {}",
            stage.index
        );

        self.generators
            .values()
            .map(|generator| {
                let state = generator.final_state(problem, stage, at)?;
                Ok((generator.id.clone(), state))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{hourly_timeline, power_system};
    use crate::optimisation::SolverName;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    /// Build and solve the problem for a stage
    fn solve(system: &PowerSystem, stage: &Stage, options: FormulationOptions) -> Problem {
        let mut problem = Problem::new("test");
        problem
            .add_variables(system.create_variables(stage, options).into_values())
            .unwrap();
        problem
            .add_constraints(system.create_constraints(stage, options))
            .unwrap();
        problem
            .add_objective(system.create_objective(stage, options))
            .unwrap();
        problem.solve(SolverName::Highs).unwrap();
        problem
    }

    #[rstest]
    fn test_load_shedding_variables_only_when_allowed(power_system: PowerSystem) {
        let stage = hourly_timeline(4).single_stage(None);
        let vars = power_system.create_variables(&stage, FormulationOptions::default());
        assert!(!vars.contains_key(&load_shed_var(0)));

        let options = FormulationOptions {
            load_shedding_allowed: true,
        };
        let vars = power_system.create_variables(&stage, options);
        assert!(vars.contains_key(&load_shed_var(0)));
        let objective = power_system.create_objective(&stage, options);
        assert!(
            objective
                .iter_terms()
                .any(|(var, _)| *var == load_shed_var(3))
        );
    }

    #[rstest]
    fn test_solve_stage(power_system: PowerSystem) {
        let stage = hourly_timeline(4).single_stage(None);
        let problem = solve(&power_system, &stage, FormulationOptions::default());
        assert!(problem.is_solved());

        // The cheap generator covers the demand and sets the price
        let power = problem
            .value(&generator::power_var(&"cheap".into(), 0))
            .unwrap();
        assert_approx_eq!(f64, power, 80.0, epsilon = 1e-6);
        assert!(problem.duals_valid());
        let price = problem.dual(power_balance_constraint(0).as_str(), 0.0).unwrap();
        assert_approx_eq!(f64, price, 10.0, epsilon = 1e-6);
    }

    #[rstest]
    fn test_load_shedding_makes_feasible(mut power_system: PowerSystem) {
        power_system.demand = vec![Power(500.0); 4];
        let stage = hourly_timeline(4).single_stage(None);
        let problem = solve(&power_system, &stage, FormulationOptions::default());
        assert!(!problem.is_solved());

        let options = FormulationOptions {
            load_shedding_allowed: true,
        };
        let problem = solve(&power_system, &stage, options);
        assert!(problem.is_solved());
        let shed = problem.value(&load_shed_var(0)).unwrap();
        assert_approx_eq!(f64, shed, 350.0, epsilon = 1e-6);
    }

    #[rstest]
    fn test_final_conditions(power_system: PowerSystem) {
        let stage = hourly_timeline(4).single_stage(None);
        let problem = solve(&power_system, &stage, FormulationOptions::default());
        let states = power_system.final_conditions(&problem, &stage, 2).unwrap();

        // Cheap unit stays on from its initial state; peaker stays off
        let cheap = states["cheap"];
        assert!(cheap.status);
        assert_approx_eq!(f64, cheap.hours_in_status.value(), 3.0 + 5.0, epsilon = 1e-9);
        assert_approx_eq!(f64, cheap.power.value(), 80.0, epsilon = 1e-6);
        let peaker = states["peaker"];
        assert!(!peaker.status);
        assert_approx_eq!(f64, peaker.hours_in_status.value(), 3.0 + 2.0, epsilon = 1e-9);

        assert!(power_system.final_conditions(&problem, &stage, 4).is_err());
    }

    #[rstest]
    fn test_set_initial_conditions(mut power_system: PowerSystem) {
        let timeline = hourly_timeline(4);
        let state = UnitState {
            status: false,
            hours_in_status: Hours(1.0),
            power: Power(0.0),
        };
        let states: UnitStateMap = [("cheap".into(), state)].into_iter().collect();
        power_system
            .set_initial_conditions(timeline.time(1), states)
            .unwrap();
        assert_eq!(power_system.initial_conditions()["cheap"], state);
        assert_eq!(power_system.initial_time(), Some(timeline.time(1)));

        let states: UnitStateMap = [("unknown".into(), state)].into_iter().collect();
        assert!(
            power_system
                .set_initial_conditions(timeline.time(1), states)
                .is_err()
        );
    }

    #[rstest]
    fn test_total_capacity(power_system: PowerSystem) {
        assert_eq!(power_system.total_capacity(), Power(150.0));
    }
}
