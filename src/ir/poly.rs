//! Polynomial-with-constants extraction.
//!
//! When a total cost is a polynomial in a single symbol with known rational
//! coefficients, the analyzer reports a closed-form bound with the constants
//! spelled out ("strong bounds"). Anything with logs, max/min alternatives,
//! or a second symbol is not a polynomial and yields `None`.

use std::collections::BTreeMap;

use num_rational::Rational64;
use num_traits::{One, Signed, Zero};
use serde::Serialize;

use super::Ir;

/// Dense-by-degree polynomial: degree → coefficient, zero coefficients absent.
type Coefficients = BTreeMap<u32, Rational64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundTerm {
    pub expr: String,
    pub degree: u32,
}

/// Closed-form polynomial bound with explicit rational coefficients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrongBounds {
    pub formula: String,
    pub terms: Vec<BoundTerm>,
    pub dominant_term: Option<String>,
    pub constant: String,
}

/// Interpret `ir` as a polynomial in `symbol`, if it is one.
fn as_polynomial(ir: &Ir, symbol: &str) -> Option<Coefficients> {
    match ir {
        Ir::K(r) => Some(singleton(0, *r)),
        Ir::Sym(name) => {
            if name == symbol {
                Some(singleton(1, Rational64::one()))
            } else {
                None
            }
        }
        Ir::Pow(base, exp) => {
            let Ir::K(e) = exp.as_ref() else {
                return None;
            };
            if !e.is_integer() || e.is_negative() {
                return None;
            }
            let base_poly = as_polynomial(base, symbol)?;
            let mut result = singleton(0, Rational64::one());
            for _ in 0..*e.numer() {
                result = multiply(&result, &base_poly);
            }
            Some(result)
        }
        Ir::Sum(terms) => {
            let mut total = Coefficients::new();
            for term in terms {
                add_into(&mut total, &as_polynomial(term, symbol)?);
            }
            Some(total)
        }
        Ir::Prod(factors) => {
            let mut result = singleton(0, Rational64::one());
            for factor in factors {
                result = multiply(&result, &as_polynomial(factor, symbol)?);
            }
            Some(result)
        }
        Ir::Log(..) | Ir::Max(_) | Ir::Min(_) => None,
    }
}

/// Build the strong-bounds report for a cost, or `None` when the cost is not
/// a polynomial in the given symbol.
pub fn strong_bounds(ir: &Ir, symbol: &str) -> Option<StrongBounds> {
    let coefficients = as_polynomial(ir, symbol)?;
    let mut entries: Vec<(u32, Rational64)> = coefficients
        .into_iter()
        .filter(|(_, coeff)| !coeff.is_zero())
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0));

    if entries.is_empty() {
        entries.push((0, Rational64::zero()));
    }

    let mut terms = Vec::new();
    let mut constant = Rational64::zero();
    for &(degree, coeff) in &entries {
        if degree == 0 {
            constant = coeff;
        } else {
            terms.push(BoundTerm {
                expr: render_term(coeff, degree, symbol),
                degree,
            });
        }
    }

    let rendered: Vec<String> = entries
        .iter()
        .map(|&(degree, coeff)| render_term(coeff, degree, symbol))
        .collect();
    let formula = format!("T({symbol}) = {}", rendered.join(" + "));
    let dominant_term = terms.first().map(|t| t.expr.clone());

    Some(StrongBounds {
        formula,
        terms,
        dominant_term,
        constant: render_rational(constant),
    })
}

fn render_term(coeff: Rational64, degree: u32, symbol: &str) -> String {
    let variable = match degree {
        0 => return render_rational(coeff),
        1 => symbol.to_string(),
        d => format!("{symbol}^{d}"),
    };
    if coeff.is_one() {
        variable
    } else {
        format!("{}{variable}", render_rational(coeff))
    }
}

fn render_rational(value: Rational64) -> String {
    if value.is_integer() {
        value.numer().to_string()
    } else {
        format!("{}/{}", value.numer(), value.denom())
    }
}

fn singleton(degree: u32, coeff: Rational64) -> Coefficients {
    if coeff.is_zero() {
        Coefficients::new()
    } else {
        Coefficients::from([(degree, coeff)])
    }
}

fn add_into(into: &mut Coefficients, from: &Coefficients) {
    for (&degree, &coeff) in from {
        let entry = into.entry(degree).or_insert_with(Rational64::zero);
        *entry += coeff;
        if entry.is_zero() {
            into.remove(&degree);
        }
    }
}

fn multiply(a: &Coefficients, b: &Coefficients) -> Coefficients {
    let mut result = Coefficients::new();
    for (&da, &ca) in a {
        for (&db, &cb) in b {
            let entry = result.entry(da + db).or_insert_with(Rational64::zero);
            *entry += ca * cb;
            if entry.is_zero() {
                result.remove(&(da + db));
            }
        }
    }
    result
}
