//! Generating units and their part of the unit-commitment formulation.
use super::UnitState;
use crate::id::{define_id_getter, define_id_type};
use crate::optimisation::{
    Constraint, ConstraintID, LinearExpr, Problem, Variable, VariableID,
};
use crate::timeline::Stage;
use crate::units::{Hours, Money, MoneyPerEnergy, MoneyPerHour, Power, PowerPerHour};
use anyhow::Result;
use indexmap::IndexMap;

define_id_type! {GeneratorID}

/// A map of generators, keyed by ID
pub type GeneratorMap = IndexMap<GeneratorID, Generator>;

/// A dispatchable generating unit
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    /// Unique identifier for the generator
    pub id: GeneratorID,
    /// Minimum output when the unit is on
    pub min_power: Power,
    /// Maximum output
    pub max_power: Power,
    /// Cost of each unit of energy produced
    pub marginal_cost: MoneyPerEnergy,
    /// Cost per hour of being on, independent of output
    pub no_load_cost: MoneyPerHour,
    /// Cost of each start-up
    pub startup_cost: Money,
    /// Maximum change in output per hour (unlimited if `None`)
    pub ramp_rate: Option<PowerPerHour>,
    /// Minimum time the unit must stay on after starting up
    pub min_up_hours: Hours,
    /// Minimum time the unit must stay off after shutting down
    pub min_down_hours: Hours,
    /// Whether the unit must be on at all times
    pub must_run: bool,
    /// The unit's state before the first instant of the current stage
    pub initial: UnitState,
}
define_id_getter! {Generator, GeneratorID}

/// Name of the on/off status variable for a generator at an instant
pub fn status_var(id: &GeneratorID, t: usize) -> VariableID {
    format!("status_{id}_t{t}").into()
}

/// Name of the power output variable for a generator at an instant
pub fn power_var(id: &GeneratorID, t: usize) -> VariableID {
    format!("power_{id}_t{t}").into()
}

/// Name of the start-up indicator variable for a generator at an instant
pub fn startup_var(id: &GeneratorID, t: usize) -> VariableID {
    format!("startup_{id}_t{t}").into()
}

/// Name of the shut-down indicator variable for a generator at an instant
pub fn shutdown_var(id: &GeneratorID, t: usize) -> VariableID {
    format!("shutdown_{id}_t{t}").into()
}

/// A number of hours as a whole number of intervals, rounding up
fn hours_to_steps(hours: Hours, interval_hours: f64) -> usize {
    (hours.value() / interval_hours - 1e-9).ceil().max(0.0) as usize
}

/// Status as a number
fn status_value(status: bool) -> f64 {
    if status { 1.0 } else { 0.0 }
}

impl Generator {
    /// The decision variables for this generator over the stage
    pub fn variables(&self, stage: &Stage) -> Vec<Variable> {
        let max = self.max_power.value();
        stage
            .range
            .clone()
            .flat_map(|t| {
                [
                    Variable::binary(status_var(&self.id, t)).at_time(t),
                    Variable::continuous(power_var(&self.id, t), 0.0, max).at_time(t),
                    Variable::continuous(startup_var(&self.id, t), 0.0, 1.0).at_time(t),
                    Variable::continuous(shutdown_var(&self.id, t), 0.0, 1.0).at_time(t),
                ]
            })
            .collect()
    }

    /// The operating cost of this generator over the stage
    pub fn cost(&self, stage: &Stage) -> LinearExpr {
        let dt = Hours(stage.interval_hours);
        let energy_cost = (self.marginal_cost * (Power(1.0) * dt)).value();
        let no_load_cost = (self.no_load_cost * dt).value();

        let mut expr = LinearExpr::new();
        for t in stage.range.clone() {
            expr.add_term(&power_var(&self.id, t), energy_cost);
            expr.add_term(&status_var(&self.id, t), no_load_cost);
            expr.add_term(&startup_var(&self.id, t), self.startup_cost.value());
        }

        expr
    }

    /// The operating constraints for this generator over the stage
    pub fn constraints(&self, stage: &Stage) -> Vec<(ConstraintID, Constraint)> {
        let id = &self.id;
        let dt = stage.interval_hours;
        let start = stage.range.start;
        let up_steps = hours_to_steps(self.min_up_hours, dt);
        let down_steps = hours_to_steps(self.min_down_hours, dt);
        let (initial_up_steps, initial_down_steps) = self.initial_commitment_steps(dt);

        let mut out = Vec::new();
        let mut push = |name: String, constraint: Constraint, t: usize| {
            out.push((name.into(), constraint.at_time(t)));
        };

        for t in stage.range.clone() {
            let k = t - start;
            let status = status_var(id, t);
            let power = power_var(id, t);
            let startup = startup_var(id, t);
            let shutdown = shutdown_var(id, t);

            // Status (and power) at the previous instant, as an expression
            let (prev_status, prev_power) = if k == 0 {
                (
                    LinearExpr::constant(status_value(self.initial.status)),
                    LinearExpr::constant(self.initial.power.value()),
                )
            } else {
                (
                    LinearExpr::new().with_term(&status_var(id, t - 1), 1.0),
                    LinearExpr::new().with_term(&power_var(id, t - 1), 1.0),
                )
            };

            // Start-ups and shut-downs follow changes in status
            let mut expr = LinearExpr::new()
                .with_term(&status, 1.0)
                .with_term(&startup, -1.0)
                .with_term(&shutdown, 1.0);
            expr.extend(&negate(&prev_status));
            push(format!("status_change_{id}_t{t}"), Constraint::eq(expr, 0.0), t);

            // A start-up leaves the unit on and a shut-down leaves it off
            push(
                format!("startup_status_{id}_t{t}"),
                Constraint::leq(
                    LinearExpr::new()
                        .with_term(&startup, 1.0)
                        .with_term(&status, -1.0),
                    0.0,
                ),
                t,
            );
            push(
                format!("shutdown_status_{id}_t{t}"),
                Constraint::leq(
                    LinearExpr::new()
                        .with_term(&shutdown, 1.0)
                        .with_term(&status, 1.0),
                    1.0,
                ),
                t,
            );

            push(
                format!("max_power_{id}_t{t}"),
                Constraint::leq(
                    LinearExpr::new()
                        .with_term(&power, 1.0)
                        .with_term(&status, -self.max_power.value()),
                    0.0,
                ),
                t,
            );
            push(
                format!("min_power_{id}_t{t}"),
                Constraint::geq(
                    LinearExpr::new()
                        .with_term(&power, 1.0)
                        .with_term(&status, -self.min_power.value()),
                    0.0,
                ),
                t,
            );

            if let Some(ramp_rate) = self.ramp_rate {
                let ramp = (ramp_rate * Hours(dt)).value();
                let step = ramp.max(self.min_power.value());

                // Ramping up, allowing a start-up to reach the minimum output
                let mut expr = LinearExpr::new()
                    .with_term(&power, 1.0)
                    .with_term(&startup, -step);
                expr.extend(&negate(&prev_power));
                expr.extend(&scale(&prev_status, -ramp));
                push(format!("ramp_up_{id}_t{t}"), Constraint::leq(expr, 0.0), t);

                // Ramping down, allowing a shut-down from the minimum output
                let mut expr = LinearExpr::new()
                    .with_term(&power, -1.0)
                    .with_term(&status, -ramp)
                    .with_term(&shutdown, -step);
                expr.extend(&prev_power);
                push(format!("ramp_down_{id}_t{t}"), Constraint::leq(expr, 0.0), t);
            }

            // Minimum up time: a start-up in the last `up_steps` instants keeps the unit on
            if up_steps > 1 {
                let mut expr = LinearExpr::new().with_term(&status, -1.0);
                for j in (t + 1).saturating_sub(up_steps).max(start)..=t {
                    expr.add_term(&startup_var(id, j), 1.0);
                }
                push(format!("min_up_{id}_t{t}"), Constraint::leq(expr, 0.0), t);
            }

            // Minimum down time: a shut-down in the last `down_steps` instants keeps the unit off
            if down_steps > 1 {
                let mut expr = LinearExpr::new().with_term(&status, 1.0);
                for j in (t + 1).saturating_sub(down_steps).max(start)..=t {
                    expr.add_term(&shutdown_var(id, j), 1.0);
                }
                push(format!("min_down_{id}_t{t}"), Constraint::leq(expr, 1.0), t);
            }

            // Carry over minimum up/down times from before the stage started
            if k < initial_up_steps {
                push(
                    format!("initial_min_up_{id}_t{t}"),
                    Constraint::eq(LinearExpr::new().with_term(&status, 1.0), 1.0),
                    t,
                );
            }
            if k < initial_down_steps {
                push(
                    format!("initial_min_down_{id}_t{t}"),
                    Constraint::eq(LinearExpr::new().with_term(&status, 1.0), 0.0),
                    t,
                );
            }

            if self.must_run {
                push(
                    format!("must_run_{id}_t{t}"),
                    Constraint::eq(LinearExpr::new().with_term(&status, 1.0), 1.0),
                    t,
                );
            }
        }

        out
    }

    /// The number of instants at the start of a stage for which the unit must keep its initial
    /// status, as (must stay on, must stay off)
    fn initial_commitment_steps(&self, interval_hours: f64) -> (usize, usize) {
        let hours = self.initial.hours_in_status;
        if self.initial.status {
            let remaining = self.min_up_hours - hours;
            (hours_to_steps(remaining, interval_hours), 0)
        } else {
            let remaining = self.min_down_hours - hours;
            (0, hours_to_steps(remaining, interval_hours))
        }
    }

    /// The state of the unit at instant `at` in the solution of a stage's problem
    pub fn final_state(&self, problem: &Problem, stage: &Stage, at: usize) -> Result<UnitState> {
        let status_at = |t: usize| -> Result<bool> {
            Ok(problem.value(&status_var(&self.id, t))?.round() > 0.5)
        };

        let status = status_at(at)?;
        let mut steps = 0;
        let mut unchanged_since_start = true;
        for t in (stage.range.start..=at).rev() {
            if status_at(t)? != status {
                unchanged_since_start = false;
                break;
            }
            steps += 1;
        }

        let mut hours_in_status = Hours(steps as f64 * stage.interval_hours);
        if unchanged_since_start && self.initial.status == status {
            hours_in_status = hours_in_status + self.initial.hours_in_status;
        }

        // Solvers respect bounds only to within a tolerance
        let power = problem
            .value(&power_var(&self.id, at))?
            .clamp(0.0, self.max_power.value());

        Ok(UnitState {
            status,
            hours_in_status,
            power: Power(power),
        })
    }
}

/// Multiply every term and the constant of an expression by `factor`
fn scale(expr: &LinearExpr, factor: f64) -> LinearExpr {
    let mut out = LinearExpr::constant(expr.constant_term() * factor);
    for (var, coeff) in expr.iter_terms() {
        out.add_term(var, coeff * factor);
    }

    out
}

/// The negation of an expression
fn negate(expr: &LinearExpr) -> LinearExpr {
    scale(expr, -1.0)
}
