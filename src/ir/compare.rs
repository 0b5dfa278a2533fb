//! Asymptotic comparison and dominant-term extraction.

use std::collections::BTreeMap;

use num_rational::Rational64;
use num_traits::Zero;

use super::{k, log, pow, prod, sum, Ir};

/// Index variables introduced by loops; for display purposes they grow with
/// the input and canonicalize to the program's size symbol.
pub const LOCAL_INDEX_VARS: [&str; 8] = ["i", "j", "k", "p", "q", "l", "h", "t"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsymptoticOrd {
    Less,
    Equal,
    Greater,
    Incomparable,
}

/// Aggregate growth rate of a value: exponential base (if any), total
/// polynomial degree, and logarithm power. Ordered by dominance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GrowthKey {
    pub exp_base: Option<Rational64>,
    pub poly: Rational64,
    pub log: i64,
}

impl GrowthKey {
    fn constant() -> Self {
        GrowthKey {
            exp_base: None,
            poly: Rational64::zero(),
            log: 0,
        }
    }
}

pub fn growth_key(ir: &Ir) -> GrowthKey {
    match ir {
        Ir::K(_) => GrowthKey::constant(),
        Ir::Sym(_) => GrowthKey {
            exp_base: None,
            poly: Rational64::from_integer(1),
            log: 0,
        },
        Ir::Log(_, arg) => {
            let inner = growth_key(arg);
            // log of a polynomial is a single log power; log of an
            // exponential collapses back to a polynomial.
            if inner.exp_base.is_some() {
                GrowthKey {
                    exp_base: None,
                    poly: Rational64::from_integer(1),
                    log: 0,
                }
            } else {
                GrowthKey {
                    exp_base: None,
                    poly: Rational64::zero(),
                    log: 1,
                }
            }
        }
        Ir::Pow(base, exp) => match exp.as_ref() {
            Ir::K(e) => {
                let inner = growth_key(base);
                GrowthKey {
                    exp_base: inner.exp_base,
                    poly: inner.poly * *e,
                    log: if e.is_integer() {
                        inner.log * *e.numer()
                    } else {
                        inner.log
                    },
                }
            }
            // c^n or worse; a symbolic exponent over a symbolic base (n^n)
            // outgrows every fixed-base exponential.
            _ => match base.as_ref() {
                Ir::K(b) => GrowthKey {
                    exp_base: Some(*b),
                    poly: Rational64::zero(),
                    log: 0,
                },
                _ => GrowthKey {
                    exp_base: Some(Rational64::from_integer(i64::MAX)),
                    poly: Rational64::zero(),
                    log: 0,
                },
            },
        },
        Ir::Prod(factors) => {
            let mut key = GrowthKey::constant();
            for factor in factors {
                let fk = growth_key(factor);
                key.poly += fk.poly;
                key.log += fk.log;
                key.exp_base = match (key.exp_base, fk.exp_base) {
                    (None, b) | (b, None) => b,
                    (Some(a), Some(b)) => Some(a * b),
                };
            }
            key
        }
        Ir::Sum(terms) | Ir::Max(terms) => terms
            .iter()
            .map(growth_key)
            .max()
            .unwrap_or_else(GrowthKey::constant),
        Ir::Min(alts) => alts
            .iter()
            .map(growth_key)
            .min()
            .unwrap_or_else(GrowthKey::constant),
    }
}

/// Polynomial degree per symbol, used to detect incomparable multi-symbol
/// values (`n` vs `m`).
fn per_symbol_degrees(ir: &Ir) -> BTreeMap<String, Rational64> {
    fn merge_max(
        into: &mut BTreeMap<String, Rational64>,
        from: BTreeMap<String, Rational64>,
    ) {
        for (name, degree) in from {
            let entry = into.entry(name).or_insert_with(Rational64::zero);
            if degree > *entry {
                *entry = degree;
            }
        }
    }

    match ir {
        Ir::K(_) | Ir::Log(..) => BTreeMap::new(),
        Ir::Sym(name) => BTreeMap::from([(name.clone(), Rational64::from_integer(1))]),
        Ir::Pow(base, exp) => match exp.as_ref() {
            Ir::K(e) => per_symbol_degrees(base)
                .into_iter()
                .map(|(name, degree)| (name, degree * *e))
                .collect(),
            _ => BTreeMap::new(),
        },
        Ir::Prod(factors) => {
            let mut degrees: BTreeMap<String, Rational64> = BTreeMap::new();
            for factor in factors {
                for (name, degree) in per_symbol_degrees(factor) {
                    *degrees.entry(name).or_insert_with(Rational64::zero) += degree;
                }
            }
            degrees
        }
        Ir::Sum(terms) | Ir::Max(terms) | Ir::Min(terms) => {
            let mut degrees = BTreeMap::new();
            for term in terms {
                merge_max(&mut degrees, per_symbol_degrees(term));
            }
            degrees
        }
    }
}

fn dominates(a: &BTreeMap<String, Rational64>, b: &BTreeMap<String, Rational64>) -> bool {
    b.iter().all(|(name, degree)| {
        a.get(name)
            .copied()
            .unwrap_or_else(Rational64::zero)
            >= *degree
    })
}

/// Compare two IR values by asymptotic growth. Constant factors are ignored.
pub fn cmp(a: &Ir, b: &Ir) -> AsymptoticOrd {
    let ka = growth_key(a);
    let kb = growth_key(b);

    match (ka.exp_base, kb.exp_base) {
        (Some(ba), Some(bb)) => {
            return if ba > bb {
                AsymptoticOrd::Greater
            } else if ba < bb {
                AsymptoticOrd::Less
            } else if ka.poly == kb.poly && ka.log == kb.log {
                AsymptoticOrd::Equal
            } else if (ka.poly, ka.log) > (kb.poly, kb.log) {
                AsymptoticOrd::Greater
            } else {
                AsymptoticOrd::Less
            };
        }
        (Some(_), None) => return AsymptoticOrd::Greater,
        (None, Some(_)) => return AsymptoticOrd::Less,
        (None, None) => {}
    }

    let da = per_symbol_degrees(a);
    let db = per_symbol_degrees(b);

    if da == db {
        return if ka.log > kb.log {
            AsymptoticOrd::Greater
        } else if ka.log < kb.log {
            AsymptoticOrd::Less
        } else {
            AsymptoticOrd::Equal
        };
    }

    let a_dominates = dominates(&da, &db);
    let b_dominates = dominates(&db, &da);
    match (a_dominates, b_dominates) {
        (true, false) => AsymptoticOrd::Greater,
        (false, true) => AsymptoticOrd::Less,
        // Equal degree maps were handled above; both-dominate cannot happen.
        _ => AsymptoticOrd::Incomparable,
    }
}

/// The unique maximum term of a sum under [`cmp`], or a canonical sum of
/// co-dominant terms when several tie.
pub fn dominant_term(ir: &Ir) -> Ir {
    let Ir::Sum(terms) = ir else {
        return ir.clone();
    };

    let mut dominant: Vec<Ir> = Vec::new();
    for term in terms {
        if dominant.is_empty() {
            dominant.push(term.clone());
            continue;
        }
        match cmp(term, &dominant[0]) {
            AsymptoticOrd::Greater => {
                dominant.clear();
                dominant.push(term.clone());
            }
            AsymptoticOrd::Equal | AsymptoticOrd::Incomparable => dominant.push(term.clone()),
            AsymptoticOrd::Less => {}
        }
    }

    if dominant.len() == 1 {
        dominant.into_iter().next().expect("length checked")
    } else {
        sum(dominant)
    }
}

/// Rewrite loop-index symbols to the size symbol before display, so a body
/// cost of `Σ i` reads as order `n` rather than order `i`.
pub fn canonicalize_index_symbols(ir: &Ir, size_symbol: &str) -> Ir {
    match ir {
        Ir::K(_) => ir.clone(),
        Ir::Sym(name) => {
            if LOCAL_INDEX_VARS.contains(&name.as_str()) {
                Ir::Sym(size_symbol.to_string())
            } else {
                ir.clone()
            }
        }
        Ir::Sum(terms) => sum(terms
            .iter()
            .map(|t| canonicalize_index_symbols(t, size_symbol))
            .collect()),
        Ir::Prod(factors) => prod(
            factors
                .iter()
                .map(|f| canonicalize_index_symbols(f, size_symbol))
                .collect(),
        ),
        Ir::Pow(base, exp) => pow(
            canonicalize_index_symbols(base, size_symbol),
            canonicalize_index_symbols(exp, size_symbol),
        ),
        Ir::Log(base, arg) => log(*base, canonicalize_index_symbols(arg, size_symbol)),
        Ir::Max(alts) => super::max_of(
            alts.iter()
                .map(|a| canonicalize_index_symbols(a, size_symbol))
                .collect(),
        ),
        Ir::Min(alts) => super::min_of(
            alts.iter()
                .map(|a| canonicalize_index_symbols(a, size_symbol))
                .collect(),
        ),
    }
}

/// Drop constant factors and normalize log bases, leaving pure growth shape.
fn strip_constants(ir: &Ir) -> Ir {
    match ir {
        Ir::K(_) => k(1),
        Ir::Prod(factors) => prod(
            factors
                .iter()
                .filter(|f| !matches!(f, Ir::K(_)))
                .map(strip_constants)
                .collect(),
        ),
        Ir::Log(_, arg) => Ir::Log(2, Box::new(strip_constants(arg))),
        Ir::Sum(terms) => sum(terms.iter().map(strip_constants).collect()),
        Ir::Max(alts) => super::max_of(alts.iter().map(strip_constants).collect()),
        Ir::Min(alts) => super::min_of(alts.iter().map(strip_constants).collect()),
        other => other.clone(),
    }
}

/// Render the big-O display form of a cost: canonicalize index symbols, take
/// the dominant term, drop constant factors.
pub fn big_o_string(ir: &Ir) -> String {
    big_o_string_with_symbol(ir, "n")
}

pub fn big_o_string_with_symbol(ir: &Ir, size_symbol: &str) -> String {
    let canonical = canonicalize_index_symbols(ir, size_symbol);
    let dominant = dominant_term(&canonical);
    let stripped = strip_constants(&dominant);
    if matches!(stripped, Ir::K(_)) {
        "1".to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{max_of, sym};

    #[test]
    fn orders_polynomials_by_degree() {
        assert_eq!(cmp(&pow(sym("n"), k(2)), &sym("n")), AsymptoticOrd::Greater);
        assert_eq!(cmp(&sym("n"), &pow(sym("n"), k(2))), AsymptoticOrd::Less);
        assert_eq!(cmp(&sym("n"), &sym("n")), AsymptoticOrd::Equal);
    }

    #[test]
    fn log_powers_break_polynomial_ties() {
        let n = sym("n");
        let nlogn = prod(vec![sym("n"), log(2, sym("n"))]);
        assert_eq!(cmp(&nlogn, &n), AsymptoticOrd::Greater);
        assert_eq!(cmp(&nlogn, &pow(sym("n"), k(2))), AsymptoticOrd::Less);
    }

    #[test]
    fn constants_do_not_matter_for_comparison() {
        let n2 = prod(vec![k(5), sym("n")]);
        assert_eq!(cmp(&n2, &sym("n")), AsymptoticOrd::Equal);
        assert_eq!(cmp(&k(100), &k(1)), AsymptoticOrd::Equal);
    }

    #[test]
    fn exponentials_beat_polynomials() {
        let two_n = pow(k(2), sym("n"));
        assert_eq!(cmp(&two_n, &pow(sym("n"), k(10))), AsymptoticOrd::Greater);
        assert_eq!(
            cmp(&pow(k(3), sym("n")), &two_n),
            AsymptoticOrd::Greater
        );
    }

    #[test]
    fn different_symbols_are_incomparable() {
        assert_eq!(cmp(&sym("n"), &sym("m")), AsymptoticOrd::Incomparable);
        // Factor-wise domination is still decidable.
        let nm = prod(vec![sym("n"), sym("m")]);
        assert_eq!(cmp(&nm, &sym("n")), AsymptoticOrd::Greater);
    }

    #[test]
    fn extracts_dominant_term() {
        let total = sum(vec![pow(sym("n"), k(2)), sym("n"), k(3)]);
        assert_eq!(dominant_term(&total), pow(sym("n"), k(2)));
    }

    #[test]
    fn keeps_codominant_terms() {
        let total = sum(vec![sym("n"), sym("m")]);
        let dominant = dominant_term(&total);
        assert_eq!(dominant, sum(vec![sym("m"), sym("n")]));
    }

    #[test]
    fn renders_big_o_strings() {
        assert_eq!(big_o_string(&k(7)), "1");
        assert_eq!(big_o_string(&sum(vec![sym("n"), k(2)])), "n");
        assert_eq!(
            big_o_string(&sum(vec![pow(sym("n"), k(2)), sym("n"), k(1)])),
            "n^2"
        );
        assert_eq!(big_o_string(&sum(vec![log(2, sym("n")), k(1)])), "log(n)");
        assert_eq!(
            big_o_string(&prod(vec![k(3), sym("n"), log(2, sym("n"))])),
            "n*log(n)"
        );
        assert_eq!(big_o_string(&pow(k(2), sym("n"))), "2^n");
    }

    #[test]
    fn canonicalizes_index_symbols() {
        let body = sum(vec![sym("i"), k(1)]);
        assert_eq!(big_o_string(&body), "n");
        let untouched = canonicalize_index_symbols(&sym("m"), "n");
        assert_eq!(untouched, sym("m"));
    }

    #[test]
    fn max_of_growth_keys() {
        let key = growth_key(&max_of(vec![sym("n"), pow(sym("n"), k(2))]));
        assert_eq!(key.poly, num_rational::Rational64::from_integer(2));
    }
}
