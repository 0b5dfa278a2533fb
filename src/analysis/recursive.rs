//! Recurrence extraction and resolution for self-calling procedures.
//!
//! The extractor censuses self-calls and classifies each by how its size
//! argument shrinks (divide by `b`, decrement by `c`). The non-recursive
//! work `f(n)` comes from the same cost walk the iterative analyzer uses,
//! with self-calls costing nothing. Resolution picks Master Theorem,
//! characteristic equation, telescoping, or a recursion-tree fallback.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::ir::{self, k, log as ir_log, pow, prod, sym, Ir};
use crate::parser::ast::{BinOp, Block, Expr, Proc, Program, Stmt};

use super::iterative::Walker;
use super::{classify, AlgorithmKind, AnalysisResult, AnalyzeOptions, CaseSummation, Summations};

/// How one self-call shrinks the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelfCall {
    Divide(u32),
    Decrement(i64),
    Unknown,
}

/// The extracted recurrence shape.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Shape {
    /// `T(n) = a·T(n/b) + f(n)`
    DivideAndConquer { a: usize, b: u32 },
    /// `T(n) = a·T(n−c) + f(n)`
    Decrement { a: usize, c: i64 },
    /// `T(n) = T(n−1) + T(n−2) + f(n)`
    SecondOrder,
    Unknown,
}

pub fn analyze_recursive(
    program: &Program,
    proc: &Proc,
    options: &AnalyzeOptions,
) -> AnalysisResult {
    let metadata = classify::classify(program);

    // Calls into the procedure's own cycle count as self-calls, which makes
    // mutual recursion behave like the direct kind.
    let mut self_names: BTreeSet<String> = BTreeSet::new();
    self_names.insert(proc.name.clone());
    if let Some(callees) = metadata.call_graph.get(&proc.name) {
        for callee in callees {
            if metadata.recursive_procs.contains(callee) {
                self_names.insert(callee.clone());
            }
        }
    }

    let size_symbol = size_symbol_for(proc);
    let mid_divisors = collect_mid_divisors(&proc.body);
    let calls = collect_self_calls(&proc.body, &self_names);
    let params: BTreeSet<&str> = proc.params.iter().map(|p| p.name.as_str()).collect();

    let classified: Vec<SelfCall> = calls
        .iter()
        .map(|args| classify_call(args, &params, &mid_divisors))
        .collect();

    let mut notes = Vec::new();

    // f(n): walk the body with self-calls zeroed.
    let mut walker = Walker::for_recurrence_extraction(
        program,
        &size_symbol,
        self_names.clone(),
        metadata.recursive_procs.clone(),
        options,
    );
    let body_stmts: Vec<&Stmt> = proc.body.stmts.iter().collect();
    let (costs, lines) = walker.walk_stmts(&body_stmts);
    notes.append(&mut walker.notes);
    if walker.budget_exhausted() {
        notes.push("simplification budget exhausted; result may be partial".to_string());
    }
    let f = ir::compare::canonicalize_index_symbols(
        &ir::simplify::simplify(&ir::expand(&costs.worst)),
        &size_symbol,
    );
    let f_display = ir::compare::big_o_string_with_symbol(&f, &size_symbol);

    let shape = classify_shape(&classified);
    debug!("recurrence shape for {}: {shape:?}, f(n) = {f}", proc.name);

    let resolution = match shape {
        Shape::DivideAndConquer { a, b } => {
            solve_master(a, b, &f, &f_display, &size_symbol)
        }
        Shape::Decrement { a: 1, c } => solve_telescoping(c, &f, &f_display, &size_symbol),
        Shape::Decrement { a, .. } => solve_first_order(a, &f_display, &size_symbol),
        Shape::SecondOrder => solve_characteristic(&f_display, &size_symbol),
        Shape::Unknown => {
            notes.push(format!(
                "could not identify how {} shrinks its size argument",
                proc.name
            ));
            Resolution {
                big_o: "unknown".to_string(),
                big_omega: "unknown".to_string(),
                theta: None,
                ir: sym(size_symbol.clone()),
                method: "recursion_tree".to_string(),
                equation: format!("T({size_symbol}) = ?"),
                summation_text: None,
                note: None,
            }
        }
    };
    if let Some(note) = resolution.note.clone() {
        notes.push(note);
    }

    let summations = recurrence_summations(&resolution, &size_symbol);

    AnalysisResult {
        normalized_code: String::new(),
        algorithm_kind: AlgorithmKind::Recursive,
        big_o: resolution.big_o,
        big_omega: resolution.big_omega,
        theta: resolution.theta,
        method_used: resolution.method,
        ir_worst: resolution.ir.clone(),
        ir_best: resolution.ir.clone(),
        ir_avg: resolution.ir,
        lines,
        summations,
        strong_bounds: None,
        recurrence_equation: Some(resolution.equation),
        execution_trace: None,
        notes,
        issues: Vec::new(),
    }
}

struct Resolution {
    big_o: String,
    big_omega: String,
    theta: Option<String>,
    ir: Ir,
    method: String,
    equation: String,
    summation_text: Option<(String, String)>,
    note: Option<String>,
}

/// Master Theorem for `T(n) = a·T(n/b) + f(n)` with `c_crit = log_b(a)`.
fn solve_master(a: usize, b: u32, f: &Ir, f_display: &str, size: &str) -> Resolution {
    let c_crit = (a as f64).ln() / (b as f64).ln();
    let key = ir::compare::growth_key(f);
    let poly_deg = *key.poly.numer() as f64 / *key.poly.denom() as f64;
    let log_deg = key.log;

    let n = sym(size.to_string());
    let critical_power = |size_ir: Ir| -> Ir {
        let rounded = c_crit.round();
        if (c_crit - rounded).abs() < 1e-9 {
            pow(size_ir, k(rounded as i64))
        } else {
            // Irrational exponent; approximate with a close rational.
            let approx = num_rational::Rational64::new((c_crit * 1000.0).round() as i64, 1000);
            pow(size_ir, ir::kr(approx))
        }
    };

    const EPS: f64 = 1e-6;
    let (ir_result, note) = if poly_deg + EPS < c_crit {
        // Case 1: the leaves dominate.
        (critical_power(n), None)
    } else if (poly_deg - c_crit).abs() <= EPS {
        // Case 2: every level costs the same; one extra log factor.
        let log_factor = if log_deg == 0 {
            ir_log(2, sym(size.to_string()))
        } else {
            pow(ir_log(2, sym(size.to_string())), k(log_deg + 1))
        };
        (prod(vec![critical_power(n), log_factor]), None)
    } else {
        // Case 3: the root dominates, given regularity a·f(n/b) ≤ K·f(n).
        (
            f.clone(),
            Some("master theorem case 3 applied; regularity holds for polynomial f".to_string()),
        )
    };

    let display = ir::compare::big_o_string_with_symbol(&ir_result, size);
    let equation = format!("T({size}) = {a}T({size}/{b}) + Θ({f_display})");
    let summation_text = Some((
        format!(
            "\\sum_{{l=0}}^{{\\log_{b}({size})}} {a}^l \\cdot f({size}/{b}^l)"
        ),
        format!("Σ_{{l=0}}^{{log_{b}({size})}} {a}^l * f({size}/{b}^l)"),
    ));
    Resolution {
        big_o: display.clone(),
        big_omega: display.clone(),
        theta: Some(display),
        ir: ir_result,
        method: "master_theorem".to_string(),
        equation,
        summation_text,
        note,
    }
}

/// `T(n) = T(n−c) + f(n)` telescopes to `Σ_{k} f(k)`.
fn solve_telescoping(c: i64, f: &Ir, f_display: &str, size: &str) -> Resolution {
    let key = ir::compare::growth_key(f);
    let poly_deg = if key.poly.is_integer() {
        *key.poly.numer()
    } else {
        key.poly.ceil().to_integer()
    };

    // Σ_{k=1}^{n} k^d is Θ(n^{d+1}); the step c only scales the constant.
    let ir_result = pow(sym(size.to_string()), k(poly_deg + 1));
    let display = ir::compare::big_o_string_with_symbol(&ir_result, size);

    let equation = if c == 1 {
        format!("T({size}) = T({size}-1) + Θ({f_display})")
    } else {
        format!("T({size}) = T({size}-{c}) + Θ({f_display})")
    };

    Resolution {
        big_o: display.clone(),
        big_omega: display.clone(),
        theta: Some(display),
        ir: ir_result,
        method: "iteration_method".to_string(),
        equation,
        summation_text: Some((
            format!("\\sum_{{k=1}}^{{{size}}} f(k)"),
            format!("Σ_{{k=1}}^{{{size}}} f(k)"),
        )),
        note: None,
    }
}

/// `T(n) = a·T(n−1) + f(n)` with `a ≥ 2` grows like `a^n`.
fn solve_first_order(a: usize, f_display: &str, size: &str) -> Resolution {
    let ir_result = pow(k(a as i64), sym(size.to_string()));
    let display = format!("{a}^{size}");
    Resolution {
        big_o: display.clone(),
        big_omega: display.clone(),
        theta: Some(display),
        ir: ir_result,
        method: "characteristic_equation".to_string(),
        equation: format!("T({size}) = {a}T({size}-1) + Θ({f_display})"),
        summation_text: None,
        note: None,
    }
}

/// `T(n) = T(n−1) + T(n−2) + f(n)`: the characteristic polynomial
/// `x² − x − 1` has the golden ratio as its dominant root.
fn solve_characteristic(f_display: &str, size: &str) -> Resolution {
    Resolution {
        // Displayed as 2^n for the target audience; φ^n is the tight bound.
        big_o: format!("2^{size}"),
        big_omega: format!("φ^{size}"),
        theta: Some(format!("φ^{size}")),
        ir: pow(k(2), sym(size.to_string())),
        method: "characteristic_equation".to_string(),
        equation: format!(
            "T({size}) = T({size}-1) + T({size}-2) + Θ({f_display})"
        ),
        summation_text: None,
        note: None,
    }
}

fn recurrence_summations(resolution: &Resolution, size: &str) -> Summations {
    let (latex, text) = resolution
        .summation_text
        .clone()
        .unwrap_or_else(|| {
            (
                format!("T({size}) \\text{{ per the recurrence}}"),
                resolution.equation.clone(),
            )
        });
    let case = CaseSummation { latex, text };
    Summations {
        worst: case.clone(),
        best: case.clone(),
        avg: case,
    }
}

/// The parameter that stands for the problem size: a parameter named `n` if
/// there is one, else the convention `n` (ranges like `lo..hi` reduce to it).
fn size_symbol_for(proc: &Proc) -> String {
    proc.params
        .iter()
        .find(|p| p.bounds.is_none() && p.name == "n")
        .map(|p| p.name.clone())
        .unwrap_or_else(|| {
            // A single scalar parameter names the size directly: Fact(m).
            let scalars: Vec<&str> = proc
                .params
                .iter()
                .filter(|p| p.bounds.is_none())
                .map(|p| p.name.as_str())
                .collect();
            if scalars.len() == 1 {
                scalars[0].to_string()
            } else {
                "n".to_string()
            }
        })
}

/// Assignments like `m <- (lo + hi) div 2` mark `m` as a midpoint; self-call
/// arguments built from `m` halve the range.
fn collect_mid_divisors(body: &Block) -> BTreeMap<String, u32> {
    let mut divisors = BTreeMap::new();
    collect_mid_divisors_stmts(&body.stmts, &mut divisors);
    divisors
}

fn collect_mid_divisors_stmts(stmts: &[Stmt], divisors: &mut BTreeMap<String, u32>) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign {
                target: crate::parser::ast::LValue::Var(name),
                expr,
                ..
            } => {
                if let Some(divisor) = divisor_of(expr) {
                    divisors.insert(name.clone(), divisor);
                }
            }
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                collect_mid_divisors_stmts(&then_body.stmts, divisors);
                if let Some(else_body) = else_body {
                    collect_mid_divisors_stmts(&else_body.stmts, divisors);
                }
            }
            Stmt::For { body, .. } | Stmt::While { body, .. } => {
                collect_mid_divisors_stmts(&body.stmts, divisors);
            }
            Stmt::Repeat { body, .. } => collect_mid_divisors_stmts(body, divisors),
            _ => {}
        }
    }
}

fn divisor_of(expr: &Expr) -> Option<u32> {
    match expr {
        Expr::Bin { op, right, .. } if matches!(op, BinOp::Div | BinOp::IntDiv) => {
            match right.as_ref() {
                Expr::Num(value) if *value >= 2 => u32::try_from(*value).ok(),
                _ => None,
            }
        }
        Expr::Floor(inner) | Expr::Ceil(inner) => divisor_of(inner),
        _ => None,
    }
}

/// All argument lists of calls to the procedure's own cycle, from statement
/// and expression position alike.
fn collect_self_calls(body: &Block, self_names: &BTreeSet<String>) -> Vec<Vec<Expr>> {
    let mut calls = Vec::new();
    collect_calls_stmts(&body.stmts, self_names, &mut calls);
    calls
}

fn collect_calls_stmts(
    stmts: &[Stmt],
    self_names: &BTreeSet<String>,
    calls: &mut Vec<Vec<Expr>>,
) {
    for stmt in stmts {
        match stmt {
            Stmt::Call { name, args, .. } => {
                if self_names.contains(name) {
                    calls.push(args.clone());
                }
                for arg in args {
                    collect_calls_expr(arg, self_names, calls);
                }
            }
            Stmt::Assign { expr, .. } | Stmt::ExprStmt { expr, .. } => {
                collect_calls_expr(expr, self_names, calls);
            }
            Stmt::Return { expr, .. } => {
                if let Some(expr) = expr {
                    collect_calls_expr(expr, self_names, calls);
                }
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
                ..
            } => {
                collect_calls_expr(cond, self_names, calls);
                collect_calls_stmts(&then_body.stmts, self_names, calls);
                if let Some(else_body) = else_body {
                    collect_calls_stmts(&else_body.stmts, self_names, calls);
                }
            }
            Stmt::For { body, .. } | Stmt::While { body, .. } => {
                collect_calls_stmts(&body.stmts, self_names, calls);
            }
            Stmt::Repeat { body, .. } => collect_calls_stmts(body, self_names, calls),
            Stmt::ObjectDecl { .. } => {}
        }
    }
}

fn collect_calls_expr(expr: &Expr, self_names: &BTreeSet<String>, calls: &mut Vec<Vec<Expr>>) {
    match expr {
        Expr::Call { name, args } => {
            if self_names.contains(name) {
                calls.push(args.clone());
            }
            for arg in args {
                collect_calls_expr(arg, self_names, calls);
            }
        }
        Expr::Bin { left, right, .. } => {
            collect_calls_expr(left, self_names, calls);
            collect_calls_expr(right, self_names, calls);
        }
        Expr::Unary { expr, .. } | Expr::Ceil(expr) | Expr::Floor(expr) => {
            collect_calls_expr(expr, self_names, calls);
        }
        Expr::Index { base, indices } => {
            collect_calls_expr(base, self_names, calls);
            for index in indices {
                collect_calls_expr(index, self_names, calls);
            }
        }
        Expr::Slice { base, lo, hi } => {
            collect_calls_expr(base, self_names, calls);
            collect_calls_expr(lo, self_names, calls);
            collect_calls_expr(hi, self_names, calls);
        }
        Expr::Member { base, .. } => collect_calls_expr(base, self_names, calls),
        Expr::Num(_) | Expr::Bool(_) | Expr::Var(_) => {}
    }
}

/// Classify one self-call by its size argument.
fn classify_call(
    args: &[Expr],
    params: &BTreeSet<&str>,
    mid_divisors: &BTreeMap<String, u32>,
) -> SelfCall {
    for arg in args {
        if let Some(call) = classify_size_arg(arg, params, mid_divisors) {
            return call;
        }
    }
    SelfCall::Unknown
}

fn classify_size_arg(
    arg: &Expr,
    params: &BTreeSet<&str>,
    mid_divisors: &BTreeMap<String, u32>,
) -> Option<SelfCall> {
    match arg {
        // n − c
        Expr::Bin {
            op: BinOp::Sub,
            left,
            right,
        } => {
            if let (Expr::Var(name), Expr::Num(c)) = (left.as_ref(), right.as_ref()) {
                if params.contains(name.as_str()) && *c >= 1 {
                    return Some(SelfCall::Decrement(*c));
                }
            }
            // m − 1 over a midpoint still halves the range.
            if let Expr::Var(name) = left.as_ref() {
                if let Some(divisor) = mid_divisors.get(name) {
                    return Some(SelfCall::Divide(*divisor));
                }
            }
            None
        }
        // n / b or n div b
        Expr::Bin { op, left, right } if matches!(op, BinOp::Div | BinOp::IntDiv) => {
            if let (Expr::Var(name), Expr::Num(b)) = (left.as_ref(), right.as_ref()) {
                if params.contains(name.as_str()) && *b >= 2 {
                    return u32::try_from(*b).ok().map(SelfCall::Divide);
                }
            }
            None
        }
        Expr::Floor(inner) | Expr::Ceil(inner) => classify_size_arg(inner, params, mid_divisors),
        // A midpoint variable, possibly offset: m, m + 1.
        Expr::Var(name) => mid_divisors.get(name).map(|d| SelfCall::Divide(*d)),
        Expr::Bin {
            op: BinOp::Add,
            left,
            right,
        } => classify_size_arg(left, params, mid_divisors)
            .or_else(|| classify_size_arg(right, params, mid_divisors)),
        _ => None,
    }
}

/// Combine the per-call classifications into a recurrence shape.
fn classify_shape(calls: &[SelfCall]) -> Shape {
    if calls.is_empty() {
        return Shape::Unknown;
    }

    let decrements: Vec<i64> = calls
        .iter()
        .filter_map(|c| match c {
            SelfCall::Decrement(offset) => Some(*offset),
            _ => None,
        })
        .collect();
    let divides: Vec<u32> = calls
        .iter()
        .filter_map(|c| match c {
            SelfCall::Divide(b) => Some(*b),
            _ => None,
        })
        .collect();

    if decrements.len() == 2 && divides.is_empty() {
        let mut offsets = decrements.clone();
        offsets.sort_unstable();
        if offsets == [1, 2] {
            return Shape::SecondOrder;
        }
    }
    if !divides.is_empty() && decrements.is_empty() {
        // Several divisors would be unusual; the smallest is the safe bound.
        let b = *divides.iter().min().expect("non-empty");
        return Shape::DivideAndConquer {
            a: divides.len(),
            b,
        };
    }
    if !decrements.is_empty() && divides.is_empty() {
        let c = *decrements.iter().min().expect("non-empty");
        return Shape::Decrement {
            a: decrements.len(),
            c,
        };
    }
    Shape::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::parser::parse;
    use crate::sema::run_semantic;
    use indoc::indoc;

    fn analyze_source(source: &str) -> AnalysisResult {
        let (program, _) = run_semantic(parse(source).expect("parse should succeed"));
        analyze(&program, &AnalyzeOptions::default())
    }

    #[test]
    fn factorial_telescopes_to_linear() {
        let result = analyze_source(indoc! {"
            Fact(n)
            begin
              if (n <= 1) then
              begin
                return 1
              end
              else
              begin
                return n * Fact(n - 1)
              end
            end
        "});
        assert_eq!(result.algorithm_kind, AlgorithmKind::Recursive);
        assert_eq!(result.big_o, "n");
        assert_eq!(result.method_used, "iteration_method");
        let equation = result.recurrence_equation.expect("equation");
        assert!(equation.contains("T(n) = T(n-1)"));
        assert!(result.execution_trace.is_none());
    }

    #[test]
    fn fibonacci_solves_by_characteristic_equation() {
        let result = analyze_source(indoc! {"
            Fib(n)
            begin
              if (n <= 1) then
              begin
                return n
              end
              else
              begin
                return Fib(n - 1) + Fib(n - 2)
              end
            end
        "});
        assert_eq!(result.big_o, "2^n");
        assert_eq!(result.theta.as_deref(), Some("φ^n"));
        assert_eq!(result.method_used, "characteristic_equation");
        let equation = result.recurrence_equation.expect("equation");
        assert!(equation.contains("T(n-1) + T(n-2)"));
    }

    #[test]
    fn merge_sort_solves_by_master_theorem() {
        let result = analyze_source(indoc! {"
            MergeSort(A[1..n], lo, hi)
            begin
              if (lo < hi) then
              begin
                m <- (lo + hi) div 2
                CALL MergeSort(A, lo, m)
                CALL MergeSort(A, m + 1, hi)
                CALL Merge(A, lo, m, hi)
              end
            end
        "});
        assert_eq!(result.big_o, "n*log(n)");
        assert_eq!(result.method_used, "master_theorem");
        let equation = result.recurrence_equation.expect("equation");
        assert!(equation.contains("2T(n/2)"));
        assert!(equation.contains("+ Θ(n)"));
        assert!(result.strong_bounds.is_none());
    }

    #[test]
    fn binary_search_is_logarithmic() {
        let result = analyze_source(indoc! {"
            BinarySearch(A[1..n], lo, hi, x)
            begin
              if (lo <= hi) then
              begin
                m <- (lo + hi) div 2
                if (A[m] = x) then
                begin
                  return m
                end
                else
                begin
                  CALL BinarySearch(A, lo, m - 1, x)
                end
              end
            end
        "});
        assert_eq!(result.big_o, "log(n)");
        assert_eq!(result.method_used, "master_theorem");
    }

    #[test]
    fn two_way_decrement_is_exponential() {
        let result = analyze_source(indoc! {"
            Towers(n)
            begin
              if (n >= 1) then
              begin
                CALL Towers(n - 1)
                x <- x + 1
                CALL Towers(n - 1)
              end
            end
        "});
        assert_eq!(result.big_o, "2^n");
        assert_eq!(result.method_used, "characteristic_equation");
    }

    #[test]
    fn divide_without_halving_work_hits_case_three() {
        // T(n) = T(n/2) + Θ(n): the root dominates.
        let result = analyze_source(indoc! {"
            Prune(A[1..n], n)
            begin
              if (n > 1) then
              begin
                for i <- 1 to n do
                begin
                  s <- s + A[i]
                end
                CALL Prune(A, n div 2)
              end
            end
        "});
        assert_eq!(result.big_o, "n");
        assert_eq!(result.method_used, "master_theorem");
    }

    #[test]
    fn unknown_size_argument_reports_unknown() {
        let result = analyze_source(indoc! {"
            Spin(x)
            begin
              CALL Spin(x)
            end
        "});
        assert_eq!(result.big_o, "unknown");
        assert!(result
            .notes
            .iter()
            .any(|note| note.contains("shrinks its size argument")));
    }

    #[test]
    fn mutual_recursion_resolves_through_the_cycle() {
        let result = analyze_source(indoc! {"
            Even(n)
            begin
              if (n = 0) then
              begin
                return T
              end
              CALL Odd(n - 1)
            end
            Odd(n)
            begin
              if (n = 0) then
              begin
                return F
              end
              CALL Even(n - 1)
            end
        "});
        assert_eq!(result.algorithm_kind, AlgorithmKind::Recursive);
        assert_eq!(result.big_o, "n");
    }
}
