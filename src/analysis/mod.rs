//! Complexity analysis over the shared AST.
//!
//! Two cooperating engines share the cost IR: the iterative analyzer walks
//! loop structure into summations, the recursive analyzer extracts and
//! resolves recurrences. `analyze` classifies the program and dispatches;
//! every failure mode is represented inside the returned result, never as an
//! `Err` across this boundary.

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::ir::poly::StrongBounds;
use crate::ir::Ir;
use crate::parser::ast::Program;
use crate::parser::{self, pretty, ParseError};
use crate::sema::{self, Issue};

pub mod classify;
pub mod iterative;
pub mod recursive;
pub mod summation;
pub mod trace;

pub use trace::{ExecutionTrace, TraceStep};

/// All analysis knobs, passed explicitly; there is no global configuration.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Simulated `n` for linear execution traces.
    pub simple_trace_n: i64,
    /// Simulated `n` per nesting level for quadratic traces.
    pub nested_trace_n: i64,
    /// Simulated `n` for halving (binary-search-like) traces.
    pub halving_trace_n: i64,
    /// Ceiling on simplification steps for one analysis.
    pub simplify_budget: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            simple_trace_n: 5,
            nested_trace_n: 4,
            halving_trace_n: 16,
            simplify_budget: crate::ir::simplify::DEFAULT_STEP_BUDGET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmKind {
    Iterative,
    Recursive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Assign,
    If,
    For,
    While,
    Call,
    Return,
    Declaration,
}

fn serialize_ir_display<S: Serializer>(ir: &Ir, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ir.to_string())
}

/// Cost attribution for one source line. The multiplier is the product of
/// the worst-case trip counts of the enclosing loops; the three costs are
/// per-execution and case-specific.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineCost {
    pub line: usize,
    pub kind: LineKind,
    #[serde(serialize_with = "serialize_ir_display")]
    pub multiplier: Ir,
    #[serde(serialize_with = "serialize_ir_display")]
    pub cost_worst: Ir,
    #[serde(serialize_with = "serialize_ir_display")]
    pub cost_best: Ir,
    #[serde(serialize_with = "serialize_ir_display")]
    pub cost_avg: Ir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseSummation {
    pub latex: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summations {
    pub worst: CaseSummation,
    pub best: CaseSummation,
    pub avg: CaseSummation,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub normalized_code: String,
    pub algorithm_kind: AlgorithmKind,
    pub big_o: String,
    pub big_omega: String,
    pub theta: Option<String>,
    pub method_used: String,
    pub ir_worst: Ir,
    pub ir_best: Ir,
    pub ir_avg: Ir,
    pub lines: Vec<LineCost>,
    pub summations: Summations,
    pub strong_bounds: Option<StrongBounds>,
    pub recurrence_equation: Option<String>,
    pub execution_trace: Option<ExecutionTrace>,
    pub notes: Vec<String>,
    pub issues: Vec<Issue>,
}

/// Parse failure for the convenience chain; the underlying error list keeps
/// per-position detail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("program does not parse: {}", first_message(.errors))]
pub struct ParseFailed {
    pub errors: Vec<ParseError>,
}

fn first_message(errors: &[ParseError]) -> String {
    errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

/// Analyze a (semantically normalized) program.
pub fn analyze(program: &Program, options: &AnalyzeOptions) -> AnalysisResult {
    let metadata = classify::classify(program);
    let mut result = match metadata.first_recursive_proc(program) {
        Some(proc) => recursive::analyze_recursive(program, proc, options),
        None => iterative::analyze_iterative(program, options),
    };
    result.normalized_code = pretty::pretty_program(program);
    result
}

/// Convenience chain: parse, run the semantic pass, analyze.
pub fn analyze_full(text: &str, options: &AnalyzeOptions) -> Result<AnalysisResult, ParseFailed> {
    let program = parser::parse(text).map_err(|errors| ParseFailed { errors })?;
    let (program, issues) = sema::run_semantic(program);
    let mut result = analyze(&program, options);
    result.issues.extend(issues);
    Ok(result)
}
