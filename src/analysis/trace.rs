//! Execution-trace simulation for iterative programs.
//!
//! Not a general interpreter: the simulator recognizes the loop shapes the
//! analyzer classifies (simple, nested, halving, search-with-flag) and plays
//! each out on a small fixed input so the cost accumulation is visible step
//! by step. Unknown shapes produce a single-step fallback note.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

use crate::parser::ast::{Block, Stmt};

use super::AnalyzeOptions;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    pub step: usize,
    pub line: usize,
    pub kind: String,
    pub condition: Option<String>,
    pub variables: BTreeMap<String, Value>,
    pub operation: String,
    pub cost: String,
    pub cumulative_cost: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionTrace {
    pub steps: Vec<TraceStep>,
    pub total_iterations: usize,
    pub max_depth: usize,
    pub variables_tracked: Vec<String>,
    pub complexity_formula: String,
    pub description: String,
}

/// Shape of the first loop found in the program.
enum LoopShape<'a> {
    For { stmt: &'a Stmt, var: &'a str },
    While { stmt: &'a Stmt },
    None,
}

pub fn generate(
    stmts: &[&Stmt],
    big_o: &str,
    size_symbol: &str,
    options: &AnalyzeOptions,
) -> ExecutionTrace {
    let hint: String = big_o.to_lowercase().replace(' ', "");
    let shape = first_loop(stmts);

    if hint.contains("log") && !hint.contains("^") {
        return halving_trace(&shape, size_symbol, options);
    }
    if hint.contains("n^2") || hint.contains("n*n") {
        return nested_trace(&shape, size_symbol, options);
    }
    if hint.contains('n') {
        return match shape {
            LoopShape::While { stmt } => search_trace(stmt, size_symbol, options),
            LoopShape::For { stmt, var } => simple_trace(stmt, var, size_symbol, options),
            LoopShape::None => fallback_trace(size_symbol),
        };
    }
    fallback_trace(size_symbol)
}

fn first_loop<'a>(stmts: &[&'a Stmt]) -> LoopShape<'a> {
    for stmt in stmts {
        match stmt {
            Stmt::For { var, .. } => {
                return LoopShape::For {
                    stmt,
                    var: var.as_str(),
                }
            }
            Stmt::While { .. } | Stmt::Repeat { .. } => return LoopShape::While { stmt },
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                if let found @ (LoopShape::For { .. } | LoopShape::While { .. }) =
                    first_loop_block(then_body)
                {
                    return found;
                }
                if let Some(else_body) = else_body {
                    if let found @ (LoopShape::For { .. } | LoopShape::While { .. }) =
                        first_loop_block(else_body)
                    {
                        return found;
                    }
                }
            }
            _ => {}
        }
    }
    LoopShape::None
}

fn first_loop_block(block: &Block) -> LoopShape<'_> {
    let stmts: Vec<&Stmt> = block.stmts.iter().collect();
    first_loop(&stmts)
}

fn loop_line(shape: &LoopShape<'_>) -> usize {
    match shape {
        LoopShape::For { stmt, .. } | LoopShape::While { stmt } => stmt.line(),
        LoopShape::None => 1,
    }
}

fn vars(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

/// One step per iteration of a single counting loop.
fn simple_trace(
    stmt: &Stmt,
    var: &str,
    size_symbol: &str,
    options: &AnalyzeOptions,
) -> ExecutionTrace {
    let n = options.simple_trace_n;
    let line = stmt.line();
    let mut steps = Vec::new();

    steps.push(TraceStep {
        step: 0,
        line: 1,
        kind: "init".to_string(),
        condition: None,
        variables: vars(&[(size_symbol, json!(n))]),
        operation: format!("initialize {size_symbol}={n}"),
        cost: "1".to_string(),
        cumulative_cost: "1".to_string(),
    });

    let mut cumulative = 1i64;
    for i in 1..=n {
        cumulative += 1;
        steps.push(TraceStep {
            step: i as usize,
            line,
            kind: "for".to_string(),
            condition: Some(format!("{var} ≤ {size_symbol}")),
            variables: vars(&[(var, json!(i)), (size_symbol, json!(n))]),
            operation: format!("execute body (iteration {i})"),
            cost: "1".to_string(),
            cumulative_cost: cumulative.to_string(),
        });
    }

    steps.push(TraceStep {
        step: steps.len(),
        line,
        kind: "exit".to_string(),
        condition: Some(format!("{var} > {size_symbol}")),
        variables: vars(&[(var, json!(n + 1)), (size_symbol, json!(n))]),
        operation: "exit loop".to_string(),
        cost: "0".to_string(),
        cumulative_cost: cumulative.to_string(),
    });

    ExecutionTrace {
        steps,
        total_iterations: n as usize,
        max_depth: 1,
        variables_tracked: vec![size_symbol.to_string(), var.to_string()],
        complexity_formula: format!("O({size_symbol})"),
        description: format!(
            "Simple loop running {size_symbol} iterations; each iteration does O(1) work."
        ),
    }
}

/// Interleaved outer-iteration headers and inner operations, depth 2.
fn nested_trace(
    shape: &LoopShape<'_>,
    size_symbol: &str,
    options: &AnalyzeOptions,
) -> ExecutionTrace {
    let n = options.nested_trace_n;
    let line = loop_line(shape);
    let mut steps = Vec::new();

    steps.push(TraceStep {
        step: 0,
        line: 1,
        kind: "init".to_string(),
        condition: None,
        variables: vars(&[(size_symbol, json!(n))]),
        operation: format!("initialize {size_symbol}={n}"),
        cost: "1".to_string(),
        cumulative_cost: "1".to_string(),
    });

    let mut cumulative = 1i64;
    let mut step = 1usize;
    for i in 1..=n {
        cumulative += 1;
        steps.push(TraceStep {
            step,
            line,
            kind: "for_outer".to_string(),
            condition: Some(format!("i ≤ {size_symbol}")),
            variables: vars(&[("i", json!(i)), (size_symbol, json!(n))]),
            operation: format!("outer iteration i={i}"),
            cost: "1".to_string(),
            cumulative_cost: cumulative.to_string(),
        });
        step += 1;

        for j in 1..=n {
            cumulative += 1;
            steps.push(TraceStep {
                step,
                line: line + 1,
                kind: "for_inner".to_string(),
                condition: Some(format!("j ≤ {size_symbol}")),
                variables: vars(&[("i", json!(i)), ("j", json!(j)), (size_symbol, json!(n))]),
                operation: format!("execute body (i={i}, j={j})"),
                cost: "1".to_string(),
                cumulative_cost: cumulative.to_string(),
            });
            step += 1;
        }
    }

    ExecutionTrace {
        steps,
        total_iterations: (n * n) as usize,
        max_depth: 2,
        variables_tracked: vec![size_symbol.to_string(), "i".to_string(), "j".to_string()],
        complexity_formula: format!("O({size_symbol}^2)"),
        description: format!(
            "Nested loops: the outer loop runs {size_symbol} times and the inner loop \
             {size_symbol} times per outer iteration, {size_symbol}^2 operations in total."
        ),
    }
}

/// Search-space halving, shown as a binary search over `n` elements.
fn halving_trace(
    shape: &LoopShape<'_>,
    size_symbol: &str,
    options: &AnalyzeOptions,
) -> ExecutionTrace {
    let n = options.halving_trace_n;
    let line = loop_line(shape);
    let mut steps = Vec::new();

    let (mut left, mut right) = (0i64, n - 1);
    steps.push(TraceStep {
        step: 0,
        line: 1,
        kind: "init".to_string(),
        condition: None,
        variables: vars(&[
            (size_symbol, json!(n)),
            ("left", json!(left)),
            ("right", json!(right)),
        ]),
        operation: format!("initialize search: left=0, right={}", n - 1),
        cost: "1".to_string(),
        cumulative_cost: "1".to_string(),
    });

    let mut cumulative = 1i64;
    let mut step = 1usize;
    while left <= right {
        let mid = (left + right) / 2;
        let space = right - left + 1;
        cumulative += 1;
        steps.push(TraceStep {
            step,
            line,
            kind: "while".to_string(),
            condition: Some("left ≤ right".to_string()),
            variables: vars(&[
                (size_symbol, json!(n)),
                ("left", json!(left)),
                ("right", json!(right)),
                ("mid", json!(mid)),
                ("space", json!(space)),
            ]),
            operation: format!("halve search space: mid={mid}, {space} elements remain"),
            cost: "1".to_string(),
            cumulative_cost: cumulative.to_string(),
        });
        step += 1;

        // The simulated probe never matches; alternate which half survives.
        if step % 2 == 0 {
            right = mid - 1;
        } else {
            left = mid + 1;
        }
    }

    // ⌈log₂ n⌉
    let total = if n > 1 {
        64 - ((n - 1) as u64).leading_zeros() as i64
    } else {
        0
    };

    ExecutionTrace {
        steps,
        total_iterations: total as usize,
        max_depth: 1,
        variables_tracked: vec![
            size_symbol.to_string(),
            "left".to_string(),
            "right".to_string(),
            "mid".to_string(),
        ],
        complexity_formula: format!("O(log {size_symbol})"),
        description: format!(
            "Each iteration halves the search space; with {size_symbol}={n} elements, about \
             ⌈log2({n})⌉ = {total} iterations are needed."
        ),
    }
}

/// Linear search driven by a while loop with an exit flag.
fn search_trace(stmt: &Stmt, size_symbol: &str, options: &AnalyzeOptions) -> ExecutionTrace {
    let n = options.simple_trace_n;
    let line = stmt.line();
    let mut steps = Vec::new();

    steps.push(TraceStep {
        step: 0,
        line: 1,
        kind: "init".to_string(),
        condition: None,
        variables: vars(&[(size_symbol, json!(n)), ("i", json!(1)), ("found", json!("F"))]),
        operation: format!("initialize i=1, found=F, {size_symbol}={n}"),
        cost: "1".to_string(),
        cumulative_cost: "1".to_string(),
    });

    let mut cumulative = 1i64;
    for i in 1..=n {
        cumulative += 1;
        steps.push(TraceStep {
            step: i as usize,
            line,
            kind: "while".to_string(),
            condition: Some(format!("i ≤ {size_symbol} and found = F")),
            variables: vars(&[("i", json!(i)), ("found", json!("F")), (size_symbol, json!(n))]),
            operation: format!("compare A[{i}] with the target"),
            cost: "1".to_string(),
            cumulative_cost: cumulative.to_string(),
        });
    }

    cumulative += 1;
    steps.push(TraceStep {
        step: n as usize + 1,
        line: line + 1,
        kind: "assign".to_string(),
        condition: None,
        variables: vars(&[("i", json!(n)), ("found", json!("T")), (size_symbol, json!(n))]),
        operation: "target found: found <- T".to_string(),
        cost: "1".to_string(),
        cumulative_cost: cumulative.to_string(),
    });

    steps.push(TraceStep {
        step: n as usize + 2,
        line,
        kind: "exit".to_string(),
        condition: Some(format!("i > {size_symbol} or found = T")),
        variables: vars(&[("i", json!(n)), ("found", json!("T")), (size_symbol, json!(n))]),
        operation: "exit loop".to_string(),
        cost: "0".to_string(),
        cumulative_cost: cumulative.to_string(),
    });

    ExecutionTrace {
        steps,
        total_iterations: n as usize,
        max_depth: 1,
        variables_tracked: vec![size_symbol.to_string(), "i".to_string(), "found".to_string()],
        complexity_formula: format!("O({size_symbol})"),
        description: format!(
            "Linear search: in the worst case all {size_symbol} elements are inspected before \
             the target turns up in the last position."
        ),
    }
}

fn fallback_trace(size_symbol: &str) -> ExecutionTrace {
    ExecutionTrace {
        steps: vec![TraceStep {
            step: 0,
            line: 1,
            kind: "unknown".to_string(),
            condition: None,
            variables: vars(&[(size_symbol, json!(size_symbol))]),
            operation: "no step-by-step trace is available for this shape".to_string(),
            cost: "?".to_string(),
            cumulative_cost: "?".to_string(),
        }],
        total_iterations: 0,
        max_depth: 0,
        variables_tracked: vec![size_symbol.to_string()],
        complexity_formula: "O(?)".to_string(),
        description: "The trace simulator did not recognize this program's loop shape.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::sema::run_semantic;
    use indoc::indoc;

    fn trace_for(source: &str, big_o: &str) -> ExecutionTrace {
        let (program, _) = run_semantic(parse(source).expect("parse should succeed"));
        let stmts = program.main_stmts();
        generate(&stmts, big_o, "n", &AnalyzeOptions::default())
    }

    #[test]
    fn simple_loop_trace_runs_five_iterations() {
        let trace = trace_for(
            indoc! {"
                begin
                  s <- 0
                  for i <- 1 to n do
                  begin
                    s <- s + i
                  end
                end
            "},
            "n",
        );
        assert_eq!(trace.total_iterations, 5);
        assert_eq!(trace.max_depth, 1);
        // init + 5 iterations + exit
        assert_eq!(trace.steps.len(), 7);
        assert_eq!(trace.steps[1].condition.as_deref(), Some("i ≤ n"));
        assert_eq!(trace.steps[1].variables["i"], serde_json::json!(1));
        assert_eq!(trace.complexity_formula, "O(n)");
    }

    #[test]
    fn nested_loop_trace_totals_sixteen_operations() {
        let trace = trace_for(
            indoc! {"
                begin
                  for i <- 1 to n do
                  begin
                    for j <- 1 to n do
                    begin
                      x <- 1
                    end
                  end
                end
            "},
            "n^2",
        );
        assert_eq!(trace.total_iterations, 16);
        assert_eq!(trace.max_depth, 2);
        let inner_steps = trace
            .steps
            .iter()
            .filter(|s| s.kind == "for_inner")
            .count();
        assert_eq!(inner_steps, 16);
    }

    #[test]
    fn halving_trace_runs_logarithmically() {
        let trace = trace_for(
            indoc! {"
                begin
                  i <- n
                  while (i > 1) do
                  begin
                    i <- i div 2
                  end
                end
            "},
            "log(n)",
        );
        assert_eq!(trace.total_iterations, 4);
        assert!(trace
            .steps
            .iter()
            .skip(1)
            .all(|s| s.variables.contains_key("mid") || s.kind == "init"));
        assert_eq!(trace.complexity_formula, "O(log n)");
    }

    #[test]
    fn search_loop_trace_tracks_the_flag() {
        let trace = trace_for(
            indoc! {"
                begin
                  i <- 1
                  found <- F
                  while (i <= n and found = F) do
                  begin
                    i <- i + 1
                  end
                end
            "},
            "n",
        );
        assert_eq!(trace.total_iterations, 5);
        assert!(trace.variables_tracked.contains(&"found".to_string()));
        let last = trace.steps.last().expect("steps");
        assert_eq!(last.kind, "exit");
    }

    #[test]
    fn unknown_shape_falls_back_to_a_note() {
        let trace = trace_for("begin\nx <- 1\nend", "1");
        assert_eq!(trace.total_iterations, 0);
        assert_eq!(trace.steps.len(), 1);
        assert_eq!(trace.steps[0].kind, "unknown");
    }
}
