//! Budgeted re-simplification.
//!
//! The smart constructors already canonicalize, so simplification is a
//! bottom-up rebuild through them. The step budget bounds total work on
//! adversarial inputs; when it runs out the remaining subtree is returned
//! untouched and the caller records a note.

use log::debug;

use super::{log, max_of, min_of, pow, prod, sum, Ir};

/// Default ceiling on simplification steps for one analysis.
pub const DEFAULT_STEP_BUDGET: usize = 10_000;

pub struct Simplifier {
    remaining: usize,
    exhausted: bool,
}

impl Simplifier {
    pub fn new(budget: usize) -> Self {
        Self {
            remaining: budget,
            exhausted: false,
        }
    }

    /// True once the budget ran out at least once.
    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn simplify(&mut self, ir: &Ir) -> Ir {
        if !self.charge() {
            return ir.clone();
        }
        match ir {
            Ir::K(_) | Ir::Sym(_) => ir.clone(),
            Ir::Sum(terms) => sum(terms.iter().map(|t| self.simplify(t)).collect()),
            Ir::Prod(factors) => prod(factors.iter().map(|f| self.simplify(f)).collect()),
            Ir::Pow(base, exp) => pow(self.simplify(base), self.simplify(exp)),
            Ir::Log(base, arg) => log(*base, self.simplify(arg)),
            Ir::Max(alts) => max_of(alts.iter().map(|a| self.simplify(a)).collect()),
            Ir::Min(alts) => min_of(alts.iter().map(|a| self.simplify(a)).collect()),
        }
    }

    fn charge(&mut self) -> bool {
        if self.remaining == 0 {
            if !self.exhausted {
                debug!("simplification step budget exhausted");
                self.exhausted = true;
            }
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Simplify with the default budget.
pub fn simplify(ir: &Ir) -> Ir {
    Simplifier::new(DEFAULT_STEP_BUDGET).simplify(ir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{k, sym};

    #[test]
    fn simplification_is_idempotent() {
        let values = vec![
            sum(vec![sym("n"), sym("n"), k(3)]),
            prod(vec![k(2), sym("n"), log(2, sym("n"))]),
            pow(sym("n"), k(3)),
            max_of(vec![sym("n"), sym("m")]),
            sum(vec![
                prod(vec![sym("n"), sym("n")]),
                prod(vec![k(-1), pow(sym("n"), k(2))]),
            ]),
        ];
        for value in values {
            let once = simplify(&value);
            let twice = simplify(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn rebuild_applies_constructor_identities() {
        // A raw tree built without the smart constructors simplifies fully.
        let raw = Ir::Sum(vec![
            Ir::Prod(vec![k(1), sym("n")]),
            k(0),
            Ir::Pow(Box::new(sym("n")), Box::new(k(1))),
        ]);
        assert_eq!(simplify(&raw), prod(vec![k(2), sym("n")]));
    }

    #[test]
    fn exhausted_budget_returns_input_with_flag() {
        let mut simplifier = Simplifier::new(0);
        let value = Ir::Sum(vec![sym("n"), sym("n")]);
        let result = simplifier.simplify(&value);
        assert_eq!(result, value);
        assert!(simplifier.exhausted());
    }

    #[test]
    fn fresh_simplifier_is_not_exhausted() {
        let mut simplifier = Simplifier::new(DEFAULT_STEP_BUDGET);
        simplifier.simplify(&sum(vec![sym("n"), k(1)]));
        assert!(!simplifier.exhausted());
    }
}
