//! Symbolic cost IR.
//!
//! A small closed algebra over element counts: exact rational constants,
//! size symbols, sums, products, powers, logarithms, and max/min for the
//! worst/best combination of branches. Values are immutable; the smart
//! constructors canonicalize as they build (flattening, like-term collection,
//! constant folding, deterministic ordering), so structurally equal costs
//! compare equal with `==`.

use std::fmt;

use num_rational::Rational64;
use num_traits::{One, Signed, Zero};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub mod compare;
pub mod poly;
pub mod simplify;

pub use compare::{big_o_string, cmp, dominant_term, AsymptoticOrd};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ir {
    /// Exact rational constant.
    K(Rational64),
    /// Size parameter, e.g. `n`.
    Sym(String),
    /// Sum of terms; empty means zero.
    Sum(Vec<Ir>),
    /// Product of factors; empty means one.
    Prod(Vec<Ir>),
    /// `base ^ exp`; the exponent is a rational constant or a symbol.
    Pow(Box<Ir>, Box<Ir>),
    /// Logarithm with a positive integer base.
    Log(u32, Box<Ir>),
    /// Worst-case combination of alternatives.
    Max(Vec<Ir>),
    /// Best-case combination of alternatives.
    Min(Vec<Ir>),
}

pub fn k(value: i64) -> Ir {
    Ir::K(Rational64::from_integer(value))
}

pub fn kr(value: Rational64) -> Ir {
    Ir::K(value)
}

pub fn sym(name: impl Into<String>) -> Ir {
    Ir::Sym(name.into())
}

/// Build a canonical sum: flatten, fold constants, collect like terms by
/// their coefficient-free core, drop zero terms, order dominant-first.
pub fn sum(terms: Vec<Ir>) -> Ir {
    let mut constant = Rational64::zero();
    let mut collected: Vec<(Ir, Rational64)> = Vec::new();

    let mut pending = terms;
    pending.reverse();
    while let Some(term) = pending.pop() {
        match term {
            Ir::Sum(inner) => {
                for t in inner.into_iter().rev() {
                    pending.push(t);
                }
            }
            other => {
                let (coeff, core) = split_coefficient(other);
                match core {
                    None => constant += coeff,
                    Some(core) => {
                        if let Some(entry) = collected.iter_mut().find(|(c, _)| *c == core) {
                            entry.1 += coeff;
                        } else {
                            collected.push((core, coeff));
                        }
                    }
                }
            }
        }
    }

    let mut out: Vec<Ir> = collected
        .into_iter()
        .filter(|(_, coeff)| !coeff.is_zero())
        .map(|(core, coeff)| scale(core, coeff))
        .collect();
    out.sort_by(|a, b| {
        compare::growth_key(b)
            .cmp(&compare::growth_key(a))
            .then_with(|| a.cmp(b))
    });
    if !constant.is_zero() {
        out.push(Ir::K(constant));
    }

    match out.len() {
        0 => k(0),
        1 => out.into_iter().next().expect("length checked"),
        _ => Ir::Sum(out),
    }
}

/// Build a canonical product: flatten, fold constants, merge powers of equal
/// bases, short-circuit on zero, order constant / symbols / logs / rest.
pub fn prod(factors: Vec<Ir>) -> Ir {
    let mut constant = Rational64::one();
    // Powers with rational exponents, merged by base.
    let mut powers: Vec<(Ir, Rational64)> = Vec::new();
    let mut logs: Vec<(u32, Ir)> = Vec::new();
    let mut others: Vec<Ir> = Vec::new();

    let mut pending = factors;
    pending.reverse();
    while let Some(factor) = pending.pop() {
        match factor {
            Ir::K(r) => {
                if r.is_zero() {
                    return k(0);
                }
                constant *= r;
            }
            Ir::Prod(inner) => {
                for f in inner.into_iter().rev() {
                    pending.push(f);
                }
            }
            Ir::Pow(base, exp) => match *exp {
                Ir::K(r) => merge_power(&mut powers, *base, r),
                other_exp => others.push(Ir::Pow(base, Box::new(other_exp))),
            },
            Ir::Log(base, arg) => logs.push((base, *arg)),
            s @ Ir::Sym(_) => merge_power(&mut powers, s, Rational64::one()),
            other => others.push(other),
        }
    }

    let mut out: Vec<Ir> = Vec::new();
    if !constant.is_one() {
        out.push(Ir::K(constant));
    }

    powers.retain(|(_, exp)| !exp.is_zero());
    powers.sort_by(|(a, _), (b, _)| symbol_rank(a).cmp(&symbol_rank(b)).then_with(|| a.cmp(b)));
    for (base, exp) in powers {
        out.push(pow(base, Ir::K(exp)));
    }

    logs.sort();
    for (base, arg) in logs {
        out.push(Ir::Log(base, Box::new(arg)));
    }

    others.sort();
    out.extend(others);

    // A bare constant times a sum distributes, so `-1*(n + 1) + n + 1`
    // cancels; larger factored forms like `1/2*n*(n + 1)` stay factored.
    if out.len() == 2 {
        if let (Ir::K(c), Ir::Sum(terms)) = (&out[0], &out[1]) {
            let c = *c;
            let terms = terms.clone();
            return sum(terms
                .into_iter()
                .map(|t| prod(vec![Ir::K(c), t]))
                .collect());
        }
    }

    match out.len() {
        0 => k(1),
        1 => out.into_iter().next().expect("length checked"),
        _ => Ir::Prod(out),
    }
}

/// `base ^ exp` with the identity rules applied.
pub fn pow(base: Ir, exp: Ir) -> Ir {
    match (&base, &exp) {
        (_, Ir::K(e)) if e.is_zero() => return k(1),
        (_, Ir::K(e)) if e.is_one() => return base,
        (Ir::K(b), Ir::K(e)) if e.is_integer() && e.numer().unsigned_abs() <= 16 => {
            let mut value = Rational64::one();
            for _ in 0..e.numer().unsigned_abs() {
                value *= *b;
            }
            if e.is_negative() {
                if value.is_zero() {
                    return Ir::Pow(Box::new(base), Box::new(exp));
                }
                value = value.recip();
            }
            return Ir::K(value);
        }
        _ => {}
    }
    if let Ir::Pow(inner_base, inner_exp) = &base {
        if let (Ir::K(e1), Ir::K(e2)) = (inner_exp.as_ref(), &exp) {
            return pow((**inner_base).clone(), Ir::K(e1 * e2));
        }
    }
    Ir::Pow(Box::new(base), Box::new(exp))
}

/// `log_base(arg)` with the identity rules applied.
pub fn log(base: u32, arg: Ir) -> Ir {
    match arg {
        Ir::K(r) if r.is_one() => k(0),
        Ir::K(r) if r.is_integer() && r.numer() > &0 => {
            // Exact powers of the base fold to their exponent.
            let mut value = *r.numer();
            let mut exponent = 0i64;
            while value > 1 && value % base as i64 == 0 {
                value /= base as i64;
                exponent += 1;
            }
            if value == 1 {
                k(exponent)
            } else {
                Ir::Log(base, Box::new(Ir::K(r)))
            }
        }
        Ir::Pow(inner_base, exp) => {
            if *inner_base == k(base as i64) {
                *exp
            } else if let Ir::K(e) = *exp {
                // log(x^e) = e*log(x)
                prod(vec![Ir::K(e), log(base, *inner_base)])
            } else {
                Ir::Log(base, Box::new(Ir::Pow(inner_base, exp)))
            }
        }
        other => Ir::Log(base, Box::new(other)),
    }
}

/// Worst-case alternative; flattens and deduplicates, resolving when the
/// alternatives are asymptotically comparable.
pub fn max_of(alts: Vec<Ir>) -> Ir {
    combine_alts(alts, true)
}

/// Best-case alternative, dual of [`max_of`].
pub fn min_of(alts: Vec<Ir>) -> Ir {
    combine_alts(alts, false)
}

fn combine_alts(alts: Vec<Ir>, take_max: bool) -> Ir {
    let mut flat: Vec<Ir> = Vec::new();
    let mut pending = alts;
    pending.reverse();
    while let Some(alt) = pending.pop() {
        match (take_max, alt) {
            (true, Ir::Max(inner)) | (false, Ir::Min(inner)) => {
                for a in inner.into_iter().rev() {
                    pending.push(a);
                }
            }
            (_, other) => {
                if !flat.contains(&other) {
                    flat.push(other);
                }
            }
        }
    }

    if flat.is_empty() {
        return k(0);
    }

    // Keep only the alternatives not dominated by another one.
    let mut keep: Vec<Ir> = Vec::new();
    'outer: for candidate in &flat {
        for other in &flat {
            if other == candidate {
                continue;
            }
            let ord = cmp(candidate, other);
            let dominated = match (take_max, ord) {
                (true, AsymptoticOrd::Less) | (false, AsymptoticOrd::Greater) => true,
                _ => false,
            };
            if dominated {
                continue 'outer;
            }
        }
        if !keep.contains(candidate) {
            keep.push(candidate.clone());
        }
    }
    keep.sort();
    keep.dedup();

    if keep.len() == 1 {
        return keep.into_iter().next().expect("length checked");
    }
    // Asymptotically tied alternatives with equal growth collapse to the
    // structurally largest/smallest constant multiple when fully constant.
    if keep.iter().all(|a| matches!(a, Ir::K(_))) {
        let pick = if take_max {
            keep.iter().max()
        } else {
            keep.iter().min()
        };
        return pick.cloned().expect("non-empty");
    }
    if take_max {
        Ir::Max(keep)
    } else {
        Ir::Min(keep)
    }
}

fn merge_power(powers: &mut Vec<(Ir, Rational64)>, base: Ir, exp: Rational64) {
    if let Some(entry) = powers.iter_mut().find(|(b, _)| *b == base) {
        entry.1 += exp;
    } else {
        powers.push((base, exp));
    }
}

/// Split a term into its constant coefficient and coefficient-free core.
fn split_coefficient(term: Ir) -> (Rational64, Option<Ir>) {
    match term {
        Ir::K(r) => (r, None),
        Ir::Prod(factors) => {
            let mut coeff = Rational64::one();
            let rest: Vec<Ir> = factors
                .into_iter()
                .filter(|f| match f {
                    Ir::K(r) => {
                        coeff *= *r;
                        false
                    }
                    _ => true,
                })
                .collect();
            if rest.is_empty() {
                (coeff, None)
            } else if rest.len() == 1 {
                (coeff, rest.into_iter().next())
            } else {
                (coeff, Some(Ir::Prod(rest)))
            }
        }
        other => (Rational64::one(), Some(other)),
    }
}

fn scale(core: Ir, coeff: Rational64) -> Ir {
    if coeff.is_one() {
        core
    } else {
        prod(vec![Ir::K(coeff), core])
    }
}

/// Ordering rank for product factors: the conventional size symbol `n`
/// first, other symbols alphabetically, compound bases last.
fn symbol_rank(base: &Ir) -> (u8, String) {
    match base {
        Ir::Sym(name) if name == "n" => (0, name.clone()),
        Ir::Sym(name) => (1, name.clone()),
        other => (2, format!("{other:?}")),
    }
}

/// Fully distribute products over sums, turning `n*(n + 1)` into
/// `n^2 + n`. Totals are expanded before bound extraction; intermediate
/// results stay factored.
pub fn expand(ir: &Ir) -> Ir {
    match ir {
        Ir::K(_) | Ir::Sym(_) => ir.clone(),
        Ir::Sum(terms) => sum(terms.iter().map(expand).collect()),
        Ir::Prod(factors) => factors
            .iter()
            .map(expand)
            .reduce(|a, b| expand_mul(&a, &b))
            .unwrap_or_else(|| k(1)),
        Ir::Pow(base, exp) => match exp.as_ref() {
            Ir::K(e) if e.is_integer() && *e.numer() >= 2 && *e.numer() <= 4 => {
                let expanded_base = expand(base);
                let mut result = expanded_base.clone();
                for _ in 1..*e.numer() {
                    result = expand_mul(&result, &expanded_base);
                }
                result
            }
            _ => pow(expand(base), expand(exp)),
        },
        Ir::Log(base, arg) => log(*base, expand(arg)),
        Ir::Max(alts) => max_of(alts.iter().map(expand).collect()),
        Ir::Min(alts) => min_of(alts.iter().map(expand).collect()),
    }
}

fn expand_mul(a: &Ir, b: &Ir) -> Ir {
    let left: Vec<Ir> = match a {
        Ir::Sum(terms) => terms.clone(),
        other => vec![other.clone()],
    };
    let right: Vec<Ir> = match b {
        Ir::Sum(terms) => terms.clone(),
        other => vec![other.clone()],
    };
    let mut products = Vec::with_capacity(left.len() * right.len());
    for l in &left {
        for r in &right {
            products.push(prod(vec![l.clone(), r.clone()]));
        }
    }
    sum(products)
}

/// Whether the value mentions the given symbol.
pub fn contains_sym(ir: &Ir, name: &str) -> bool {
    match ir {
        Ir::K(_) => false,
        Ir::Sym(s) => s == name,
        Ir::Sum(items) | Ir::Prod(items) | Ir::Max(items) | Ir::Min(items) => {
            items.iter().any(|item| contains_sym(item, name))
        }
        Ir::Pow(base, exp) => contains_sym(base, name) || contains_sym(exp, name),
        Ir::Log(_, arg) => contains_sym(arg, name),
    }
}

/// Replace a symbol with another value, re-canonicalizing along the way.
pub fn substitute(ir: &Ir, name: &str, replacement: &Ir) -> Ir {
    match ir {
        Ir::K(_) => ir.clone(),
        Ir::Sym(s) => {
            if s == name {
                replacement.clone()
            } else {
                ir.clone()
            }
        }
        Ir::Sum(terms) => sum(terms.iter().map(|t| substitute(t, name, replacement)).collect()),
        Ir::Prod(factors) => prod(
            factors
                .iter()
                .map(|f| substitute(f, name, replacement))
                .collect(),
        ),
        Ir::Pow(base, exp) => pow(
            substitute(base, name, replacement),
            substitute(exp, name, replacement),
        ),
        Ir::Log(base, arg) => log(*base, substitute(arg, name, replacement)),
        Ir::Max(alts) => max_of(
            alts.iter()
                .map(|a| substitute(a, name, replacement))
                .collect(),
        ),
        Ir::Min(alts) => min_of(
            alts.iter()
                .map(|a| substitute(a, name, replacement))
                .collect(),
        ),
    }
}

impl Ir {
    pub fn is_zero(&self) -> bool {
        matches!(self, Ir::K(r) if r.is_zero())
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Ir::K(r) if r.is_one())
    }

    pub fn as_constant(&self) -> Option<Rational64> {
        match self {
            Ir::K(r) => Some(*r),
            _ => None,
        }
    }
}

impl fmt::Display for Ir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ir::K(r) => {
                if r.is_integer() {
                    write!(f, "{}", r.numer())
                } else {
                    write!(f, "{}/{}", r.numer(), r.denom())
                }
            }
            Ir::Sym(name) => write!(f, "{name}"),
            Ir::Sum(terms) => {
                let rendered: Vec<String> = terms.iter().map(|t| t.to_string()).collect();
                write!(f, "{}", rendered.join(" + "))
            }
            Ir::Prod(factors) => {
                let rendered: Vec<String> = factors
                    .iter()
                    .map(|factor| match factor {
                        Ir::Sum(_) => format!("({factor})"),
                        _ => factor.to_string(),
                    })
                    .collect();
                write!(f, "{}", rendered.join("*"))
            }
            Ir::Pow(base, exp) => {
                let base_text = match base.as_ref() {
                    Ir::Sum(_) | Ir::Prod(_) | Ir::Log(..) => format!("({base})"),
                    _ => base.to_string(),
                };
                let exp_text = match exp.as_ref() {
                    Ir::K(r) if !r.is_integer() => format!("({exp})"),
                    Ir::Sum(_) | Ir::Prod(_) => format!("({exp})"),
                    _ => exp.to_string(),
                };
                write!(f, "{base_text}^{exp_text}")
            }
            Ir::Log(base, arg) => {
                if *base == 2 {
                    write!(f, "log({arg})")
                } else {
                    write!(f, "log_{base}({arg})")
                }
            }
            Ir::Max(alts) => {
                let rendered: Vec<String> = alts.iter().map(|a| a.to_string()).collect();
                write!(f, "max({})", rendered.join(", "))
            }
            Ir::Min(alts) => {
                let rendered: Vec<String> = alts.iter().map(|a| a.to_string()).collect();
                write!(f, "min({})", rendered.join(", "))
            }
        }
    }
}

impl Serialize for Ir {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct PowRepr<'a> {
            base: &'a Ir,
            exp: &'a Ir,
        }
        #[derive(Serialize)]
        struct LogRepr<'a> {
            base: u32,
            arg: &'a Ir,
        }

        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Ir::K(r) => {
                if r.is_integer() {
                    map.serialize_entry("k", r.numer())?;
                } else {
                    map.serialize_entry("k", &[*r.numer(), *r.denom()])?;
                }
            }
            Ir::Sym(name) => map.serialize_entry("name", name)?,
            Ir::Sum(terms) => map.serialize_entry("terms", terms)?,
            Ir::Prod(factors) => map.serialize_entry("factors", factors)?,
            Ir::Pow(base, exp) => map.serialize_entry("pow", &PowRepr { base, exp })?,
            Ir::Log(base, arg) => map.serialize_entry("log", &LogRepr { base: *base, arg })?,
            Ir::Max(alts) => map.serialize_entry("max", alts)?,
            Ir::Min(alts) => map.serialize_entry("min", alts)?,
        }
        map.end()
    }
}
