//! Writing problems to file in CPLEX LP format, for inspection by a human.
use super::{LinearExpr, Problem, VariableKind};
use itertools::Itertools;
use std::io::{self, Write};

/// Format a bound, using the `inf` keywords where needed
fn format_bound(value: f64) -> String {
    if value == f64::INFINITY {
        "+inf".into()
    } else if value == f64::NEG_INFINITY {
        "-inf".into()
    } else {
        value.to_string()
    }
}

/// Format the variable terms of an expression, e.g. `x - 2 y`.
///
/// Returns `None` for an expression without any terms, which cannot be written in LP format.
fn format_terms(expr: &LinearExpr) -> Option<String> {
    if expr.is_empty() {
        return None;
    }

    let mut out = String::new();
    for (i, (var, coeff)) in expr.iter_terms().enumerate() {
        let sign = if coeff < 0.0 { "-" } else { "+" };
        match (i, sign) {
            (0, "+") => {}
            (0, _) => out.push_str("- "),
            _ => {
                out.push(' ');
                out.push_str(sign);
                out.push(' ');
            }
        }

        let magnitude = coeff.abs();
        if magnitude != 1.0 {
            out.push_str(&magnitude.to_string());
            out.push(' ');
        }
        out.push_str(var.as_str());
    }

    Some(out)
}

/// Write the problem's formulation in CPLEX LP format
pub fn write_lp<W: Write>(problem: &Problem, out: &mut W) -> io::Result<()> {
    writeln!(out, "\\ Problem: {}", problem.name())?;
    let constant = problem.objective().constant_term();
    if constant != 0.0 {
        writeln!(out, "\\ Objective constant: {constant}")?;
    }

    writeln!(out, "Minimize")?;
    // An objective needs at least one term, so give the first variable a zero coefficient
    let objective = format_terms(problem.objective()).or_else(|| {
        let var = problem.iter_variables().next()?;
        Some(format!("0 {}", var.id))
    });
    writeln!(out, " obj: {}", objective.unwrap_or_default())?;

    writeln!(out, "Subject To")?;
    for (name, con) in problem.iter_constraints() {
        // Rows without variables only constrain the constant
        let Some(terms) = format_terms(&con.expr) else {
            writeln!(
                out,
                "\\ {name}: {} <= 0 <= {} (no variables)",
                format_bound(con.lower),
                format_bound(con.upper)
            )?;
            continue;
        };
        if con.is_equality() {
            writeln!(out, " {name}: {terms} = {}", con.lower)?;
        } else if con.lower.is_finite() && con.upper.is_finite() {
            writeln!(out, " {name}_lo: {terms} >= {}", con.lower)?;
            writeln!(out, " {name}_up: {terms} <= {}", con.upper)?;
        } else if con.lower.is_finite() {
            writeln!(out, " {name}: {terms} >= {}", con.lower)?;
        } else {
            writeln!(out, " {name}: {terms} <= {}", format_bound(con.upper))?;
        }
    }

    writeln!(out, "Bounds")?;
    for var in problem
        .iter_variables()
        .filter(|var| var.kind != VariableKind::Binary)
    {
        if var.lower == var.upper {
            writeln!(out, " {} = {}", var.id, var.lower)?;
        } else if var.lower == f64::NEG_INFINITY && var.upper == f64::INFINITY {
            writeln!(out, " {} free", var.id)?;
        } else {
            writeln!(
                out,
                " {} <= {} <= {}",
                format_bound(var.lower),
                var.id,
                format_bound(var.upper)
            )?;
        }
    }

    for (section, kind) in [
        ("Generals", VariableKind::Integer),
        ("Binaries", VariableKind::Binary),
    ] {
        let names = problem
            .iter_variables()
            .filter(|var| var.kind == kind)
            .map(|var| var.id.as_str())
            .join(" ");
        if !names.is_empty() {
            writeln!(out, "{section}")?;
            writeln!(out, " {names}")?;
        }
    }

    writeln!(out, "End")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimisation::{Constraint, Variable, VariableID};

    #[test]
    fn test_format_terms() {
        let x = VariableID::new("x");
        let y = VariableID::new("y");
        assert_eq!(format_terms(&LinearExpr::new()), None);
        assert_eq!(
            format_terms(&LinearExpr::new().with_term(&x, 1.0).with_term(&y, -2.5)).unwrap(),
            "x - 2.5 y"
        );
        assert_eq!(
            format_terms(&LinearExpr::new().with_term(&x, -1.0).with_term(&y, 3.0)).unwrap(),
            "- x + 3 y"
        );
    }

    #[test]
    fn test_write_lp() {
        let mut problem = Problem::new("test");
        let u = Variable::binary("u");
        let p = Variable::continuous("p", 0.0, f64::INFINITY);
        let n = Variable::integer("n", 0.0, 4.0);
        problem
            .add_variables([u.clone(), p.clone(), n.clone()])
            .unwrap();
        problem
            .add_constraint(
                "range",
                Constraint::range(1.0, LinearExpr::from(&p).with_term(&u.id, -1.0), 2.0),
            )
            .unwrap();
        problem
            .add_constraint("fix", Constraint::eq(LinearExpr::from(&n), 3.0))
            .unwrap();
        problem
            .add_objective(LinearExpr::constant(7.0).with_term(&p.id, 2.0))
            .unwrap();

        let mut out = Vec::new();
        write_lp(&problem, &mut out).unwrap();
        let expected = "\\ Problem: test
\\ Objective constant: 7
Minimize
 obj: 2 p
Subject To
 range_lo: p - u >= 1
 range_up: p - u <= 2
 fix: n = 3
Bounds
 0 <= p <= +inf
 0 <= n <= 4
Generals
 n
Binaries
 u
End
";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_write_lp_without_terms() {
        let mut problem = Problem::new("empty");
        let x = Variable::continuous("x", 0.0, 1.0);
        problem.add_variable(x).unwrap();
        problem
            .add_constraint("trivial", Constraint::geq(LinearExpr::new(), -1.0))
            .unwrap();

        let mut out = Vec::new();
        write_lp(&problem, &mut out).unwrap();
        let expected = "\\ Problem: empty
Minimize
 obj: 0 x
Subject To
\\ trivial: -1 <= 0 <= +inf (no variables)
Bounds
 0 <= x <= 1
End
";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }
}
