//! Structural cost walk for iterative programs.
//!
//! `cost(stmt, multiplier_stack)` descends the tree accumulating worst, best
//! and average costs per statement, emitting one [`LineCost`] record per
//! source line. Loop bodies are walked once per loop with a unit multiplier;
//! the loop node then closes the summation over its trip count (exactly for
//! polynomial bodies, conservatively otherwise) and rescales the body's line
//! records.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use num_rational::Rational64;

use crate::ir::poly;
use crate::ir::simplify::Simplifier;
use crate::ir::{
    self, cmp, contains_sym, k, kr, log as ir_log, pow, prod, substitute, sum, sym,
    AsymptoticOrd, Ir,
};
use crate::parser::ast::{BinOp, Block, Expr, Program, Stmt, UnaryOp};

use super::{
    summation, trace, AlgorithmKind, AnalysisResult, AnalyzeOptions, LineCost, LineKind,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Costs {
    pub worst: Ir,
    pub best: Ir,
    pub avg: Ir,
}

impl Costs {
    fn zero() -> Self {
        Costs {
            worst: k(0),
            best: k(0),
            avg: k(0),
        }
    }

    fn uniform(value: Ir) -> Self {
        Costs {
            worst: value.clone(),
            best: value.clone(),
            avg: value,
        }
    }

    fn add(self, other: Costs) -> Costs {
        Costs {
            worst: sum(vec![self.worst, other.worst]),
            best: sum(vec![self.best, other.best]),
            avg: sum(vec![self.avg, other.avg]),
        }
    }
}

/// What the walk remembers about a variable's current value; used for while
/// trip counts (`i <- n` before `while (i > 1)`).
#[derive(Debug, Clone, PartialEq)]
enum EnvValue {
    Num(i64),
    Sym(String),
}

/// One walk over one statement list. The walker is shared between the
/// iterative analyzer and the recursive analyzer's `f(n)` extraction, which
/// zeroes the self-calls.
pub(crate) struct Walker<'a> {
    program: &'a Program,
    /// Self-calls of the procedure under recurrence extraction cost nothing.
    zero_cost_calls: BTreeSet<String>,
    /// Procedures known to be on some recursion cycle; their calls are never
    /// inlined.
    recursive_procs: BTreeSet<String>,
    /// In recurrence extraction, calls to procedures the program does not
    /// define are assumed linear (the conventional reading of `CALL Merge`).
    assume_linear_externals: bool,
    size_symbol: String,
    env: HashMap<String, EnvValue>,
    inline_stack: Vec<String>,
    pub notes: Vec<String>,
    avg_note_emitted: bool,
    simplifier: Simplifier,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(
        program: &'a Program,
        size_symbol: &str,
        options: &AnalyzeOptions,
    ) -> Self {
        Walker {
            program,
            zero_cost_calls: BTreeSet::new(),
            recursive_procs: BTreeSet::new(),
            assume_linear_externals: false,
            size_symbol: size_symbol.to_string(),
            env: HashMap::new(),
            inline_stack: Vec::new(),
            notes: Vec::new(),
            avg_note_emitted: false,
            simplifier: Simplifier::new(options.simplify_budget),
        }
    }

    pub(crate) fn for_recurrence_extraction(
        program: &'a Program,
        size_symbol: &str,
        zero_cost_calls: BTreeSet<String>,
        recursive_procs: BTreeSet<String>,
        options: &AnalyzeOptions,
    ) -> Self {
        let mut walker = Walker::new(program, size_symbol, options);
        walker.zero_cost_calls = zero_cost_calls;
        walker.recursive_procs = recursive_procs;
        walker.assume_linear_externals = true;
        walker
    }

    pub(crate) fn budget_exhausted(&self) -> bool {
        self.simplifier.exhausted()
    }

    pub(crate) fn walk_stmts(&mut self, stmts: &[&Stmt]) -> (Costs, Vec<LineCost>) {
        let mut total = Costs::zero();
        let mut lines = Vec::new();
        for stmt in stmts {
            let (costs, stmt_lines) = self.walk_stmt(stmt);
            total = total.add(costs);
            lines.extend(stmt_lines);
            self.record_assign(stmt);
        }
        (total, lines)
    }

    fn walk_block(&mut self, block: &Block) -> (Costs, Vec<LineCost>) {
        let stmts: Vec<&Stmt> = block.stmts.iter().collect();
        self.walk_stmts(&stmts)
    }

    fn walk_stmt(&mut self, stmt: &Stmt) -> (Costs, Vec<LineCost>) {
        match stmt {
            Stmt::Assign { .. } => self.unit_line(stmt, LineKind::Assign),
            Stmt::Return { .. } => self.unit_line(stmt, LineKind::Return),
            Stmt::ExprStmt { .. } | Stmt::ObjectDecl { .. } => {
                let line = LineCost {
                    line: stmt.line(),
                    kind: LineKind::Declaration,
                    multiplier: k(1),
                    cost_worst: k(0),
                    cost_best: k(0),
                    cost_avg: k(0),
                };
                (Costs::zero(), vec![line])
            }
            Stmt::Call { name, .. } => {
                let cost = self.call_cost(name);
                let line = LineCost {
                    line: stmt.line(),
                    kind: LineKind::Call,
                    multiplier: k(1),
                    cost_worst: cost.clone(),
                    cost_best: cost.clone(),
                    cost_avg: cost.clone(),
                };
                (Costs::uniform(cost), vec![line])
            }
            Stmt::If {
                cond: _,
                then_body,
                else_body,
                ..
            } => self.walk_if(stmt, then_body, else_body.as_ref()),
            Stmt::For {
                var,
                start,
                end,
                step,
                body,
                ..
            } => self.walk_for(stmt, var, start, end, step.as_ref(), body),
            Stmt::While { cond, body, .. } => self.walk_loop(stmt, cond, body),
            Stmt::Repeat { body, until, .. } => {
                // A repeat is a while on its exit condition that runs at
                // least once; the trip-count rules below already bottom out
                // at one iteration.
                let block = Block {
                    stmts: body.clone(),
                    span: stmt.span(),
                };
                self.walk_loop(stmt, until, &block)
            }
        }
    }

    fn unit_line(&mut self, stmt: &Stmt, kind: LineKind) -> (Costs, Vec<LineCost>) {
        let line = LineCost {
            line: stmt.line(),
            kind,
            multiplier: k(1),
            cost_worst: k(1),
            cost_best: k(1),
            cost_avg: k(1),
        };
        (Costs::uniform(k(1)), vec![line])
    }

    /// Cost of a `CALL` statement. Plain analysis charges one unit; during
    /// recurrence extraction, defined helpers are inlined and unknown ones
    /// assumed linear so `f(n)` reflects the non-recursive work.
    fn call_cost(&mut self, name: &str) -> Ir {
        if self.zero_cost_calls.contains(name) {
            return k(0);
        }
        if !self.assume_linear_externals {
            return k(1);
        }
        if self.recursive_procs.contains(name) || self.inline_stack.iter().any(|n| n == name) {
            return sym(self.size_symbol.clone());
        }
        if let Some(proc) = self.program.find_proc(name) {
            self.inline_stack.push(name.to_string());
            let saved_env = std::mem::take(&mut self.env);
            let (costs, _) = self.walk_block(&proc.body);
            self.env = saved_env;
            self.inline_stack.pop();
            return self.simplifier.simplify(&costs.worst);
        }
        self.notes
            .push(format!("assuming CALL {name} does linear work"));
        sym(self.size_symbol.clone())
    }

    fn walk_if(
        &mut self,
        stmt: &Stmt,
        then_body: &Block,
        else_body: Option<&Block>,
    ) -> (Costs, Vec<LineCost>) {
        let saved_env = self.env.clone();
        let (then_costs, mut then_lines) = self.walk_block(then_body);
        self.env = saved_env.clone();
        let (else_costs, mut else_lines) = match else_body {
            Some(block) => self.walk_block(block),
            None => (Costs::zero(), Vec::new()),
        };
        self.env = saved_env;

        // Worst case takes the asymptotically larger branch; ties fall to the
        // branch with more statements.
        let then_wins_worst = match cmp(&then_costs.worst, &else_costs.worst) {
            AsymptoticOrd::Greater => true,
            AsymptoticOrd::Less => false,
            _ => then_lines.len() >= else_lines.len(),
        };
        if then_wins_worst {
            zero_case(&mut else_lines, Case::Worst);
        } else {
            zero_case(&mut then_lines, Case::Worst);
        }
        let worst_branch = if then_wins_worst {
            then_costs.worst.clone()
        } else {
            else_costs.worst.clone()
        };

        // Best case takes the smaller branch; a missing else means the best
        // case skips the conditional body entirely.
        let (best_branch, then_wins_best) = if else_body.is_none() {
            (k(0), false)
        } else {
            match cmp(&then_costs.best, &else_costs.best) {
                AsymptoticOrd::Less => (then_costs.best.clone(), true),
                AsymptoticOrd::Greater => (else_costs.best.clone(), false),
                _ => {
                    if then_lines.len() <= else_lines.len() {
                        (then_costs.best.clone(), true)
                    } else {
                        (else_costs.best.clone(), false)
                    }
                }
            }
        };
        if then_wins_best {
            zero_case(&mut else_lines, Case::Best);
        } else {
            zero_case(&mut then_lines, Case::Best);
        }

        // Average: arithmetic mean of the branches, no probability model.
        if !self.avg_note_emitted {
            self.avg_note_emitted = true;
            self.notes
                .push("average case assumes both if branches equally likely".to_string());
        }
        let half = kr(Rational64::new(1, 2));
        let avg_branches = prod(vec![
            half.clone(),
            sum(vec![then_costs.avg.clone(), else_costs.avg.clone()]),
        ]);
        halve_avg(&mut then_lines);
        halve_avg(&mut else_lines);

        let cond_line = LineCost {
            line: stmt.line(),
            kind: LineKind::If,
            multiplier: k(1),
            cost_worst: k(1),
            cost_best: k(1),
            cost_avg: k(1),
        };

        let costs = Costs {
            worst: sum(vec![k(1), worst_branch]),
            best: sum(vec![k(1), best_branch]),
            avg: sum(vec![k(1), avg_branches]),
        };

        let mut lines = vec![cond_line];
        lines.extend(then_lines);
        lines.extend(else_lines);
        (costs, lines)
    }

    fn walk_for(
        &mut self,
        stmt: &Stmt,
        var: &str,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        body: &Block,
    ) -> (Costs, Vec<LineCost>) {
        let start_ir = self.expr_ir(start);
        let end_ir = self.expr_ir(end);
        let step_ir = step.map(|s| self.expr_ir(s)).unwrap_or_else(|| k(1));
        let trips = for_trip_count(&start_ir, &end_ir, &step_ir);

        let saved_env = self.env.clone();
        // The loop variable is not a fixed value inside the body.
        self.env.remove(var);
        let (body_costs, mut body_lines) = self.walk_block(body);
        self.env = saved_env;

        let worst = self.close_loop(var, &start_ir, &end_ir, &trips, &body_costs.worst, true);
        let best = self.close_loop(var, &start_ir, &end_ir, &trips, &body_costs.best, false);
        let avg = self.close_loop(var, &start_ir, &end_ir, &trips, &body_costs.avg, true);

        // Display multiplier for body lines: the trip count with the loop
        // variable no longer free.
        let display_trips = self.display_trip_count(&trips);
        for line in &mut body_lines {
            line.multiplier = prod(vec![display_trips.clone(), line.multiplier.clone()]);
        }

        // The header costs one initialization.
        let header = LineCost {
            line: stmt.line(),
            kind: LineKind::For,
            multiplier: k(1),
            cost_worst: k(1),
            cost_best: k(1),
            cost_avg: k(1),
        };

        let costs = Costs {
            worst: sum(vec![k(1), worst]),
            best: sum(vec![k(1), best]),
            avg: sum(vec![k(1), avg]),
        };

        let mut lines = vec![header];
        lines.extend(body_lines);
        (costs, lines)
    }

    fn walk_loop(&mut self, stmt: &Stmt, cond: &Expr, body: &Block) -> (Costs, Vec<LineCost>) {
        let (worst_trips, best_trips) = self.while_trip_counts(cond, body);

        let saved_env = self.env.clone();
        let (body_costs, mut body_lines) = self.walk_block(body);
        self.env = saved_env;

        for line in &mut body_lines {
            line.multiplier = prod(vec![worst_trips.clone(), line.multiplier.clone()]);
        }

        // The loop header itself carries no cost; the condition checks ride
        // on the body's unit costs, which keeps totals in line with the
        // emitted records.
        let header = LineCost {
            line: stmt.line(),
            kind: LineKind::While,
            multiplier: k(1),
            cost_worst: k(0),
            cost_best: k(0),
            cost_avg: k(0),
        };

        let costs = Costs {
            worst: prod(vec![worst_trips.clone(), body_costs.worst]),
            best: prod(vec![best_trips, body_costs.best]),
            avg: prod(vec![worst_trips, body_costs.avg]),
        };

        let mut lines = vec![header];
        lines.extend(body_lines);
        (costs, lines)
    }

    /// Close `Σ_{var=lo}^{hi} body` — exactly for polynomial dependence on
    /// the loop variable, conservatively (bound × extreme value) otherwise.
    fn close_loop(
        &mut self,
        var: &str,
        lo: &Ir,
        hi: &Ir,
        trips: &Ir,
        body: &Ir,
        upper: bool,
    ) -> Ir {
        let closed = if !contains_sym(body, var) {
            prod(vec![trips.clone(), body.clone()])
        } else if let Some(exact) = closed_polynomial_sum(var, lo, hi, body) {
            exact
        } else {
            let bound = if upper { hi } else { lo };
            debug!("loop over {var} has a non-polynomial body; bounding by the {} end",
                if upper { "upper" } else { "lower" });
            prod(vec![trips.clone(), substitute(body, var, bound)])
        };
        self.simplifier.simplify(&closed)
    }

    fn display_trip_count(&mut self, trips: &Ir) -> Ir {
        self.simplifier.simplify(trips)
    }

    /// Worst and best trip counts of a while/repeat loop, from the visible
    /// update pattern of the condition's governing variable.
    fn while_trip_counts(&mut self, cond: &Expr, body: &Block) -> (Ir, Ir) {
        let size = sym(self.size_symbol.clone());
        let has_exit_flag = condition_has_flag_conjunct(cond);

        let Some(var) = governing_variable(cond) else {
            self.notes.push(
                "while pattern not recognized; assuming the loop runs n times".to_string(),
            );
            return (size, k(1));
        };

        let init = match self.env.get(&var) {
            Some(EnvValue::Sym(name)) => sym(name.clone()),
            Some(EnvValue::Num(_)) | None => size.clone(),
        };
        let bound = condition_bound(cond, &var)
            .map(|expr| self.expr_ir(&expr))
            .unwrap_or_else(|| size.clone());

        let worst = if let Some(divisor) = assign_div_const(body, &var) {
            ir_log(divisor, init)
        } else if let Some(factor) = assign_mul_const(body, &var) {
            ir_log(factor, bound)
        } else if let Some(c) = assign_sub_const(body, &var) {
            prod(vec![kr(Rational64::new(1, c)), init])
        } else if let Some(c) = assign_add_const(body, &var) {
            prod(vec![kr(Rational64::new(1, c)), bound])
        } else {
            self.notes.push(
                "while pattern not recognized; assuming the loop runs n times".to_string(),
            );
            return (size, k(1));
        };

        let best = if has_exit_flag {
            self.notes
                .push("early-exit flag in loop condition; best case is constant".to_string());
            k(1)
        } else {
            worst.clone()
        };
        (worst, best)
    }

    /// Lower an index/bound expression into the cost IR.
    fn expr_ir(&mut self, expr: &Expr) -> Ir {
        match expr {
            Expr::Num(value) => k(*value),
            Expr::Var(name) => match self.env.get(name) {
                Some(EnvValue::Num(value)) => k(*value),
                Some(EnvValue::Sym(target)) => sym(target.clone()),
                None => sym(name.clone()),
            },
            Expr::Bin { op, left, right } => {
                let left_ir = self.expr_ir(left);
                let right_ir = self.expr_ir(right);
                match op {
                    BinOp::Add => sum(vec![left_ir, right_ir]),
                    BinOp::Sub => sum(vec![left_ir, prod(vec![k(-1), right_ir])]),
                    BinOp::Mul => prod(vec![left_ir, right_ir]),
                    BinOp::Div | BinOp::IntDiv => divide(left_ir, right_ir),
                    // `a mod b` is below `b`; that bound is enough for trip counts.
                    BinOp::Mod => right_ir,
                    _ => {
                        self.notes.push(format!(
                            "non-arithmetic bound expression treated as {}",
                            self.size_symbol
                        ));
                        sym(self.size_symbol.clone())
                    }
                }
            }
            Expr::Unary {
                op: UnaryOp::Neg,
                expr,
            } => prod(vec![k(-1), self.expr_ir(expr)]),
            Expr::Floor(inner) | Expr::Ceil(inner) => self.expr_ir(inner),
            _ => {
                self.notes.push(format!(
                    "bound expression not recognized; treated as {}",
                    self.size_symbol
                ));
                sym(self.size_symbol.clone())
            }
        }
    }

    fn record_assign(&mut self, stmt: &Stmt) {
        let Stmt::Assign { target, expr, .. } = stmt else {
            return;
        };
        let crate::parser::ast::LValue::Var(name) = target else {
            return;
        };
        match expr {
            Expr::Num(value) => {
                self.env.insert(name.clone(), EnvValue::Num(*value));
            }
            Expr::Var(source) => {
                let value = match self.env.get(source) {
                    Some(value) => value.clone(),
                    None => EnvValue::Sym(source.clone()),
                };
                self.env.insert(name.clone(), value);
            }
            _ => {
                self.env.remove(name);
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Case {
    Worst,
    Best,
}

fn zero_case(lines: &mut [LineCost], case: Case) {
    for line in lines {
        match case {
            Case::Worst => line.cost_worst = k(0),
            Case::Best => line.cost_best = k(0),
        }
    }
}

fn halve_avg(lines: &mut [LineCost]) {
    let half = kr(Rational64::new(1, 2));
    for line in lines {
        line.cost_avg = prod(vec![half.clone(), line.cost_avg.clone()]);
    }
}

/// `((end − start) / step) + 1` — the dialect's `to` bound is inclusive.
pub(crate) fn for_trip_count(start: &Ir, end: &Ir, step: &Ir) -> Ir {
    let diff = sum(vec![end.clone(), prod(vec![k(-1), start.clone()])]);
    let quotient = divide(diff, step.clone());
    sum(vec![quotient, k(1)])
}

fn divide(numerator: Ir, denominator: Ir) -> Ir {
    match denominator.as_constant() {
        Some(r) if *r.numer() != 0 => prod(vec![numerator, kr(r.recip())]),
        _ => prod(vec![numerator, pow(denominator, k(-1))]),
    }
}

/// `Σ_{var=lo}^{hi} body` in closed form when the body is a polynomial of
/// degree ≤ 2 in the loop variable.
fn closed_polynomial_sum(var: &str, lo: &Ir, hi: &Ir, body: &Ir) -> Option<Ir> {
    let terms: Vec<Ir> = match body {
        Ir::Sum(terms) => terms.clone(),
        other => vec![other.clone()],
    };

    let mut closed_terms = Vec::new();
    for term in terms {
        let (degree, coefficient) = split_var_power(var, &term)?;
        let power_sum = match degree {
            0 => range_count(lo, hi),
            1 => sum_of_indices(lo, hi),
            2 => sum_of_squares(lo, hi),
            _ => return None,
        };
        closed_terms.push(prod(vec![coefficient, power_sum]));
    }
    Some(sum(closed_terms))
}

/// Split a product term into `(degree of var, remaining coefficient)`.
/// Returns `None` when the variable appears other than as an integer power.
fn split_var_power(var: &str, term: &Ir) -> Option<(i64, Ir)> {
    let factors: Vec<Ir> = match term {
        Ir::Prod(factors) => factors.clone(),
        other => vec![other.clone()],
    };

    let mut degree = 0i64;
    let mut rest = Vec::new();
    for factor in factors {
        let var_degree = match &factor {
            Ir::Sym(name) if name == var => Some(1),
            Ir::Pow(base, exp) => match (base.as_ref(), exp.as_ref()) {
                (Ir::Sym(name), Ir::K(e)) if name == var && e.is_integer() && *e.numer() > 0 => {
                    Some(*e.numer())
                }
                _ => None,
            },
            _ => None,
        };
        match var_degree {
            Some(d) => degree += d,
            None => {
                if contains_sym(&factor, var) {
                    return None;
                }
                rest.push(factor);
            }
        }
    }
    Some((degree, prod(rest)))
}

fn range_count(lo: &Ir, hi: &Ir) -> Ir {
    sum(vec![hi.clone(), prod(vec![k(-1), lo.clone()]), k(1)])
}

/// `Σ_{i=lo}^{hi} i = (hi(hi+1) − (lo−1)lo) / 2`
fn sum_of_indices(lo: &Ir, hi: &Ir) -> Ir {
    let half = kr(Rational64::new(1, 2));
    let upper = prod(vec![hi.clone(), sum(vec![hi.clone(), k(1)])]);
    let lower = prod(vec![sum(vec![lo.clone(), k(-1)]), lo.clone()]);
    prod(vec![half, sum(vec![upper, prod(vec![k(-1), lower])])])
}

/// `Σ_{i=1}^{x} i² = x(x+1)(2x+1)/6`, evaluated as a prefix difference.
fn sum_of_squares(lo: &Ir, hi: &Ir) -> Ir {
    fn prefix(x: &Ir) -> Ir {
        let sixth = kr(Rational64::new(1, 6));
        prod(vec![
            sixth,
            x.clone(),
            sum(vec![x.clone(), k(1)]),
            sum(vec![prod(vec![k(2), x.clone()]), k(1)]),
        ])
    }
    let below = sum(vec![lo.clone(), k(-1)]);
    sum(vec![prefix(hi), prod(vec![k(-1), prefix(&below)])])
}

/// The variable a while condition is governed by: the first bare variable on
/// either side of a relational operator.
pub(crate) fn governing_variable(cond: &Expr) -> Option<String> {
    match cond {
        Expr::Bin { op, left, right } if op.is_relational() => match (left.as_ref(), right.as_ref())
        {
            (Expr::Var(name), _) if !matches!(right.as_ref(), Expr::Bool(_)) => Some(name.clone()),
            (_, Expr::Var(name)) => Some(name.clone()),
            _ => None,
        },
        Expr::Bin { op, left, right } if op.is_logical() => {
            governing_variable(left).or_else(|| governing_variable(right))
        }
        Expr::Unary {
            op: UnaryOp::Not,
            expr,
        } => governing_variable(expr),
        _ => None,
    }
}

/// The non-variable side of the condition comparing the governing variable,
/// e.g. `n` in `while (i <= n)`.
pub(crate) fn condition_bound(cond: &Expr, var: &str) -> Option<Expr> {
    match cond {
        Expr::Bin { op, left, right } if op.is_relational() => {
            match (left.as_ref(), right.as_ref()) {
                (Expr::Var(name), other) if name == var => Some(other.clone()),
                (other, Expr::Var(name)) if name == var => Some(other.clone()),
                _ => None,
            }
        }
        Expr::Bin { op, left, right } if op.is_logical() => {
            condition_bound(left, var).or_else(|| condition_bound(right, var))
        }
        Expr::Unary {
            op: UnaryOp::Not,
            expr,
        } => condition_bound(expr, var),
        _ => None,
    }
}

/// A conjunct like `found = F` marks a search loop that can exit early.
pub(crate) fn condition_has_flag_conjunct(cond: &Expr) -> bool {
    match cond {
        Expr::Bin {
            op: BinOp::And,
            left,
            right,
        } => is_flag_test(left) || is_flag_test(right) || condition_has_flag_conjunct(left)
            || condition_has_flag_conjunct(right),
        _ => false,
    }
}

fn is_flag_test(expr: &Expr) -> bool {
    match expr {
        Expr::Bin { op, left, right } if op.is_relational() => {
            matches!(left.as_ref(), Expr::Bool(_)) || matches!(right.as_ref(), Expr::Bool(_))
        }
        Expr::Unary {
            op: UnaryOp::Not,
            expr,
        } => matches!(expr.as_ref(), Expr::Var(_)),
        _ => false,
    }
}

/// Assignment-pattern scanners over a loop body (top level only, as the
/// governing update is conventionally unconditional).
pub(crate) fn assign_div_const(body: &Block, var: &str) -> Option<u32> {
    scan_assign(body, var, |expr| match expr {
        Expr::Bin { op, left, right }
            if matches!(op, BinOp::Div | BinOp::IntDiv) && is_var(left, var) =>
        {
            positive_const(right).filter(|c| *c >= 2)
        }
        Expr::Floor(inner) | Expr::Ceil(inner) => match inner.as_ref() {
            Expr::Bin { op, left, right }
                if matches!(op, BinOp::Div | BinOp::IntDiv) && is_var(left, var) =>
            {
                positive_const(right).filter(|c| *c >= 2)
            }
            _ => None,
        },
        _ => None,
    })
}

pub(crate) fn assign_mul_const(body: &Block, var: &str) -> Option<u32> {
    scan_assign(body, var, |expr| match expr {
        Expr::Bin {
            op: BinOp::Mul,
            left,
            right,
        } => {
            if is_var(left, var) {
                positive_const(right).filter(|c| *c >= 2)
            } else if is_var(right, var) {
                positive_const(left).filter(|c| *c >= 2)
            } else {
                None
            }
        }
        _ => None,
    })
}

pub(crate) fn assign_sub_const(body: &Block, var: &str) -> Option<i64> {
    scan_assign(body, var, |expr| match expr {
        Expr::Bin {
            op: BinOp::Sub,
            left,
            right,
        } if is_var(left, var) => match right.as_ref() {
            Expr::Num(c) if *c >= 1 => Some(*c),
            _ => None,
        },
        _ => None,
    })
}

pub(crate) fn assign_add_const(body: &Block, var: &str) -> Option<i64> {
    scan_assign(body, var, |expr| match expr {
        Expr::Bin {
            op: BinOp::Add,
            left,
            right,
        } => {
            if is_var(left, var) {
                match right.as_ref() {
                    Expr::Num(c) if *c >= 1 => Some(*c),
                    _ => None,
                }
            } else if is_var(right, var) {
                match left.as_ref() {
                    Expr::Num(c) if *c >= 1 => Some(*c),
                    _ => None,
                }
            } else {
                None
            }
        }
        _ => None,
    })
}

fn scan_assign<T>(body: &Block, var: &str, matcher: impl Fn(&Expr) -> Option<T>) -> Option<T> {
    for stmt in &body.stmts {
        if let Stmt::Assign {
            target: crate::parser::ast::LValue::Var(name),
            expr,
            ..
        } = stmt
        {
            if name == var {
                if let Some(found) = matcher(expr) {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn is_var(expr: &Expr, name: &str) -> bool {
    matches!(expr, Expr::Var(n) if n == name)
}

fn positive_const(expr: &Expr) -> Option<u32> {
    match expr {
        Expr::Num(value) if *value > 0 => u32::try_from(*value).ok(),
        _ => None,
    }
}

/// Entry point for iterative programs.
pub fn analyze_iterative(program: &Program, options: &AnalyzeOptions) -> AnalysisResult {
    let main_stmts = program.main_stmts();
    let (stmts, size_symbol): (Vec<&Stmt>, String) = if !main_stmts.is_empty() {
        (main_stmts, "n".to_string())
    } else if let Some(proc) = program.procs().into_iter().next() {
        let size = proc
            .params
            .iter()
            .find(|p| p.bounds.is_none() && p.name == "n")
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "n".to_string());
        (proc.body.stmts.iter().collect(), size)
    } else {
        (Vec::new(), "n".to_string())
    };

    let mut walker = Walker::new(program, &size_symbol, options);
    let (costs, lines) = walker.walk_stmts(&stmts);

    let ir_worst = walker.simplifier.simplify(&ir::expand(&costs.worst));
    let ir_best = walker.simplifier.simplify(&ir::expand(&costs.best));
    let ir_avg = walker.simplifier.simplify(&ir::expand(&costs.avg));

    let big_o = ir::compare::big_o_string_with_symbol(&ir_worst, &size_symbol);
    let big_omega = ir::compare::big_o_string_with_symbol(&ir_best, &size_symbol);
    let theta = if big_o == big_omega {
        Some(big_o.clone())
    } else {
        None
    };

    let canonical_worst = ir::compare::canonicalize_index_symbols(&ir_worst, &size_symbol);
    let strong_bounds = poly::strong_bounds(&canonical_worst, &size_symbol);

    let summations = summation::build(&stmts, &size_symbol);
    let execution_trace = Some(trace::generate(&stmts, &big_o, &size_symbol, options));

    let mut notes = walker.notes;
    if walker.simplifier.exhausted() {
        notes.push("simplification budget exhausted; result may be partial".to_string());
    }

    AnalysisResult {
        normalized_code: String::new(),
        algorithm_kind: AlgorithmKind::Iterative,
        big_o,
        big_omega,
        theta,
        method_used: "summation".to_string(),
        ir_worst,
        ir_best,
        ir_avg,
        lines,
        summations,
        strong_bounds,
        recurrence_equation: None,
        execution_trace,
        notes,
        issues: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::sema::run_semantic;
    use indoc::indoc;

    fn analyze_source(source: &str) -> AnalysisResult {
        let (program, _) = run_semantic(parse(source).expect("parse should succeed"));
        analyze_iterative(&program, &AnalyzeOptions::default())
    }

    #[test]
    fn straight_line_code_is_constant() {
        let result = analyze_source("begin\nx <- 1\ny <- x + 2\nend");
        assert_eq!(result.big_o, "1");
        assert_eq!(result.big_omega, "1");
        assert_eq!(result.theta.as_deref(), Some("1"));
        assert_eq!(result.ir_worst, k(2));
    }

    #[test]
    fn single_loop_is_linear() {
        let result = analyze_source(indoc! {"
            begin
              s <- 0
              for i <- 1 to n do
              begin
                s <- s + i
              end
            end
        "});
        assert_eq!(result.big_o, "n");
        assert_eq!(result.theta.as_deref(), Some("n"));
        // s<-0, loop init, and n body executions.
        assert_eq!(result.ir_worst, sum(vec![sym("n"), k(2)]));
        let bounds = result.strong_bounds.expect("polynomial");
        assert_eq!(bounds.dominant_term.as_deref(), Some("n"));
    }

    #[test]
    fn emits_one_line_record_per_source_line() {
        let result = analyze_source(indoc! {"
            begin
              s <- 0
              for i <- 1 to n do
              begin
                s <- s + i
              end
            end
        "});
        let lines: Vec<usize> = result.lines.iter().map(|l| l.line).collect();
        assert_eq!(lines, vec![2, 3, 5]);
        assert_eq!(result.lines[2].multiplier, sym("n"));
        assert_eq!(result.lines[2].cost_worst, k(1));
    }

    #[test]
    fn nested_loops_are_quadratic() {
        let result = analyze_source(indoc! {"
            begin
              for i <- 1 to n do
              begin
                for j <- 1 to n do
                begin
                  x <- 1
                end
              end
            end
        "});
        assert_eq!(result.big_o, "n^2");
        assert_eq!(result.ir_worst, sum(vec![pow(sym("n"), k(2)), sym("n"), k(1)]));
        let bounds = result.strong_bounds.expect("polynomial");
        assert_eq!(bounds.dominant_term.as_deref(), Some("n^2"));
        let inner_line = result.lines.last().expect("body line");
        assert_eq!(inner_line.multiplier, pow(sym("n"), k(2)));
    }

    #[test]
    fn triangular_loop_has_exact_half_coefficient() {
        let result = analyze_source(indoc! {"
            begin
              for i <- 1 to n do
              begin
                for j <- 1 to i do
                begin
                  x <- 1
                end
              end
            end
        "});
        assert_eq!(result.big_o, "n^2");
        let bounds = result.strong_bounds.expect("polynomial");
        assert_eq!(bounds.dominant_term.as_deref(), Some("1/2n^2"));
    }

    #[test]
    fn halving_while_is_logarithmic() {
        let result = analyze_source(indoc! {"
            begin
              i <- n
              while (i > 1) do
              begin
                i <- i div 2
              end
            end
        "});
        assert_eq!(result.big_o, "log(n)");
        assert_eq!(result.theta.as_deref(), Some("log(n)"));
        assert!(result.strong_bounds.is_none());
    }

    #[test]
    fn decrementing_while_is_linear() {
        let result = analyze_source(indoc! {"
            begin
              i <- n
              while (i > 0) do
              begin
                i <- i - 1
              end
            end
        "});
        assert_eq!(result.big_o, "n");
    }

    #[test]
    fn unrecognized_while_is_conservative() {
        let result = analyze_source(indoc! {"
            begin
              while (x > 0) do
              begin
                x <- A[x]
              end
            end
        "});
        assert_eq!(result.big_o, "n");
        assert_eq!(result.big_omega, "1");
        assert!(result.theta.is_none());
        assert!(result
            .notes
            .iter()
            .any(|n| n.contains("pattern not recognized")));
    }

    #[test]
    fn search_loop_with_flag_has_constant_best_case() {
        let result = analyze_source(indoc! {"
            begin
              i <- 1
              found <- F
              while (i <= n and found = F) do
              begin
                if (A[i] = x) then
                begin
                  found <- T
                end
                i <- i + 1
              end
            end
        "});
        assert_eq!(result.big_o, "n");
        assert_eq!(result.big_omega, "1");
        assert!(result.theta.is_none());
    }

    #[test]
    fn if_worst_takes_larger_branch() {
        let result = analyze_source(indoc! {"
            begin
              if (x > 0) then
              begin
                for i <- 1 to n do
                begin
                  s <- s + i
                end
              end
              else
              begin
                s <- 0
              end
            end
        "});
        assert_eq!(result.big_o, "n");
        assert_eq!(result.big_omega, "1");
        // The else-branch line contributes nothing to the worst case.
        let else_line = result.lines.last().expect("else line");
        assert_eq!(else_line.cost_worst, k(0));
        assert_eq!(else_line.cost_best, k(1));
    }

    #[test]
    fn if_without_else_has_free_best_case() {
        let result = analyze_source(indoc! {"
            begin
              if (x > 0) then
              begin
                x <- x - 1
              end
            end
        "});
        // Worst: condition + then body; best: condition only.
        assert_eq!(result.ir_worst, k(2));
        assert_eq!(result.ir_best, k(1));
    }

    #[test]
    fn repeat_runs_at_least_once() {
        let result = analyze_source(indoc! {"
            begin
              x <- 0
              repeat
                x <- x + 1
              until (x > n)
            end
        "});
        assert_eq!(result.big_o, "n");
    }

    #[test]
    fn for_with_step_two_halves_the_count() {
        let result = analyze_source(indoc! {"
            begin
              for i <- 1 to n step 2 do
              begin
                s <- s + i
              end
            end
        "});
        assert_eq!(result.big_o, "n");
        let bounds = result.strong_bounds.expect("polynomial");
        assert_eq!(bounds.dominant_term.as_deref(), Some("1/2n"));
    }

    #[test]
    fn declarations_cost_nothing() {
        let result = analyze_source(indoc! {"
            begin
              A[1..n]
              x <- 1
            end
        "});
        assert_eq!(result.ir_worst, k(1));
        assert_eq!(result.lines[0].kind, LineKind::Declaration);
        assert_eq!(result.lines[0].cost_worst, k(0));
    }

    #[test]
    fn calls_cost_one_unit() {
        let result = analyze_source(indoc! {"
            Helper(x)
            begin
              return x + 1
            end
            begin
              CALL Helper(5)
            end
        "});
        assert_eq!(result.ir_worst, k(1));
    }

    #[test]
    fn doubling_while_is_logarithmic() {
        let result = analyze_source(indoc! {"
            begin
              i <- 1
              while (i < n) do
              begin
                i <- i * 2
              end
            end
        "});
        assert_eq!(result.big_o, "log(n)");
    }
}
