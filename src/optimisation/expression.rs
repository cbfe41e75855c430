//! Backend-neutral building blocks for optimisation problems.
//!
//! Power-system models describe their variables, constraints and objective using these types. The
//! [`Problem`](super::Problem) then hands them to whichever solver backend was selected.
use crate::id::define_id_type;
use indexmap::IndexMap;

define_id_type! {VariableID}
define_id_type! {ConstraintID}

/// An ordered map of variables, keyed by name
pub type VariableMap = IndexMap<VariableID, Variable>;

/// An ordered map of constraints, keyed by name
pub type ConstraintMap = IndexMap<ConstraintID, Constraint>;

/// The domain of a decision variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Any real value between the bounds
    Continuous,
    /// Either zero or one
    Binary,
    /// Any integer value between the bounds
    Integer,
}

impl VariableKind {
    /// Whether variables of this kind can only take whole-number values
    pub fn is_discrete(self) -> bool {
        !matches!(self, Self::Continuous)
    }
}

/// A decision variable.
///
/// Note that this type does **not** include the value of the variable. Values can be retrieved
/// from a solved [`Problem`](super::Problem).
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Unique name of the variable
    pub id: VariableID,
    /// The variable's domain
    pub kind: VariableKind,
    /// Lower bound (may be negative infinity)
    pub lower: f64,
    /// Upper bound (may be infinity)
    pub upper: f64,
    /// Index of the instant in the master timeline this variable belongs to, if any
    pub time: Option<usize>,
}

impl Variable {
    /// Create a new continuous variable
    pub fn continuous(id: impl Into<VariableID>, lower: f64, upper: f64) -> Self {
        Self {
            id: id.into(),
            kind: VariableKind::Continuous,
            lower,
            upper,
            time: None,
        }
    }

    /// Create a new binary variable
    pub fn binary(id: impl Into<VariableID>) -> Self {
        Self {
            id: id.into(),
            kind: VariableKind::Binary,
            lower: 0.0,
            upper: 1.0,
            time: None,
        }
    }

    /// Create a new integer variable
    pub fn integer(id: impl Into<VariableID>, lower: f64, upper: f64) -> Self {
        Self {
            id: id.into(),
            kind: VariableKind::Integer,
            lower,
            upper,
            time: None,
        }
    }

    /// Tag the variable with the index of an instant in the master timeline
    pub fn at_time(mut self, time: usize) -> Self {
        self.time = Some(time);
        self
    }
}

/// A linear combination of variables plus a constant.
///
/// Terms are kept in insertion order. Adding a term for a variable which is already present adds
/// to its existing coefficient.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearExpr {
    terms: IndexMap<VariableID, f64>,
    constant: f64,
}

impl LinearExpr {
    /// Create an empty expression (equal to zero)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an expression consisting only of a constant
    pub fn constant(value: f64) -> Self {
        Self {
            terms: IndexMap::new(),
            constant: value,
        }
    }

    /// Add `coeff * var` to the expression
    pub fn add_term(&mut self, var: &VariableID, coeff: f64) {
        *self.terms.entry(var.clone()).or_insert(0.0) += coeff;
    }

    /// Add `coeff * var` to the expression, returning it
    pub fn with_term(mut self, var: &VariableID, coeff: f64) -> Self {
        self.add_term(var, coeff);
        self
    }

    /// Add a constant to the expression
    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Add a constant to the expression, returning it
    pub fn with_constant(mut self, value: f64) -> Self {
        self.add_constant(value);
        self
    }

    /// Add all the terms of another expression to this one
    pub fn extend(&mut self, other: &LinearExpr) {
        for (var, coeff) in other.iter_terms() {
            self.add_term(var, coeff);
        }
        self.constant += other.constant;
    }

    /// Iterate over the variables and coefficients in the expression
    pub fn iter_terms(&self) -> impl Iterator<Item = (&VariableID, f64)> {
        self.terms.iter().map(|(var, coeff)| (var, *coeff))
    }

    /// The constant part of the expression
    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    /// The number of variable terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the expression has no variable terms
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate the expression given a value for each variable
    pub fn evaluate<F>(&self, mut value_of: F) -> f64
    where
        F: FnMut(&VariableID) -> f64,
    {
        self.iter_terms()
            .map(|(var, coeff)| coeff * value_of(var))
            .sum::<f64>()
            + self.constant
    }
}

impl From<&Variable> for LinearExpr {
    fn from(var: &Variable) -> Self {
        LinearExpr::new().with_term(&var.id, 1.0)
    }
}

/// A linear constraint of the form `lower <= expr <= upper`.
///
/// Any constant in the expression is moved into the bounds when the constraint is created, so
/// `expr` never has a constant term.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// The variable terms of the constraint
    pub expr: LinearExpr,
    /// Lower bound (may be negative infinity)
    pub lower: f64,
    /// Upper bound (may be infinity)
    pub upper: f64,
    /// Index of the instant in the master timeline this constraint belongs to, if any
    pub time: Option<usize>,
}

impl Constraint {
    fn new(mut expr: LinearExpr, lower: f64, upper: f64) -> Self {
        let constant = expr.constant;
        expr.constant = 0.0;
        Self {
            expr,
            lower: lower - constant,
            upper: upper - constant,
            time: None,
        }
    }

    /// `expr <= rhs`
    pub fn leq(expr: LinearExpr, rhs: f64) -> Self {
        Self::new(expr, f64::NEG_INFINITY, rhs)
    }

    /// `expr >= rhs`
    pub fn geq(expr: LinearExpr, rhs: f64) -> Self {
        Self::new(expr, rhs, f64::INFINITY)
    }

    /// `expr == rhs`
    pub fn eq(expr: LinearExpr, rhs: f64) -> Self {
        Self::new(expr, rhs, rhs)
    }

    /// `lower <= expr <= upper`
    pub fn range(lower: f64, expr: LinearExpr, upper: f64) -> Self {
        Self::new(expr, lower, upper)
    }

    /// Tag the constraint with the index of an instant in the master timeline
    pub fn at_time(mut self, time: usize) -> Self {
        self.time = Some(time);
        self
    }

    /// Whether the constraint is an equality
    pub fn is_equality(&self) -> bool {
        self.lower == self.upper
    }
}
