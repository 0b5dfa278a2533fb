//! Summation rendering.
//!
//! For each case the total cost is presented as a sum of summations, one per
//! loop nest, plus constants — both as LaTeX and as plain text. This is a
//! didactic view of the same walk the analyzer performs; the IR totals stay
//! the source of truth.

use num_rational::Rational64;
use num_traits::Zero;

use crate::parser::ast::{Expr, Stmt};
use crate::parser::pretty::pretty_expr;

use super::iterative::{
    assign_add_const, assign_div_const, assign_mul_const, assign_sub_const,
    condition_has_flag_conjunct, governing_variable,
};
use super::{CaseSummation, Summations};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Case {
    Worst,
    Best,
    Avg,
}

pub fn build(stmts: &[&Stmt], size_symbol: &str) -> Summations {
    Summations {
        worst: render_case(stmts, Case::Worst, size_symbol),
        best: render_case(stmts, Case::Best, size_symbol),
        avg: render_case(stmts, Case::Avg, size_symbol),
    }
}

fn render_case(stmts: &[&Stmt], case: Case, size_symbol: &str) -> CaseSummation {
    let mut rendered = Rendered::default();
    render_stmts(stmts, case, size_symbol, &mut rendered);
    CaseSummation {
        latex: rendered.join(true),
        text: rendered.join(false),
    }
}

#[derive(Default)]
struct Rendered {
    latex_parts: Vec<String>,
    text_parts: Vec<String>,
    constant: Rational64,
}

impl Rendered {
    fn add_constant(&mut self, value: Rational64) {
        self.constant += value;
    }

    fn join(&self, latex: bool) -> String {
        let mut parts: Vec<String> = if latex {
            self.latex_parts.clone()
        } else {
            self.text_parts.clone()
        };
        if !self.constant.is_zero() || parts.is_empty() {
            parts.push(render_rational(self.constant));
        }
        parts.join(" + ")
    }
}

fn render_rational(value: Rational64) -> String {
    if value.is_integer() {
        value.numer().to_string()
    } else {
        format!("{}/{}", value.numer(), value.denom())
    }
}

fn render_stmts(stmts: &[&Stmt], case: Case, size_symbol: &str, out: &mut Rendered) {
    for stmt in stmts {
        render_stmt(stmt, case, size_symbol, out);
    }
}

fn render_stmt(stmt: &Stmt, case: Case, size_symbol: &str, out: &mut Rendered) {
    match stmt {
        Stmt::Assign { .. } | Stmt::Call { .. } | Stmt::Return { .. } => {
            out.add_constant(Rational64::from_integer(1));
        }
        Stmt::ExprStmt { .. } | Stmt::ObjectDecl { .. } => {}
        Stmt::If {
            then_body,
            else_body,
            ..
        } => {
            // One unit for the condition, then the branch the case selects.
            out.add_constant(Rational64::from_integer(1));
            let then_stmts: Vec<&Stmt> = then_body.stmts.iter().collect();
            let else_stmts: Vec<&Stmt> = else_body
                .as_ref()
                .map(|b| b.stmts.iter().collect())
                .unwrap_or_default();

            let mut then_rendered = Rendered::default();
            render_stmts(&then_stmts, case, size_symbol, &mut then_rendered);
            let mut else_rendered = Rendered::default();
            render_stmts(&else_stmts, case, size_symbol, &mut else_rendered);

            let (chosen, halve) = match case {
                Case::Worst => (pick_heavier(then_rendered, else_rendered, true), false),
                Case::Best => (pick_heavier(then_rendered, else_rendered, false), false),
                Case::Avg => (merge(then_rendered, else_rendered), true),
            };
            let scale = if halve {
                Rational64::new(1, 2)
            } else {
                Rational64::from_integer(1)
            };
            out.add_constant(chosen.constant * scale);
            out.latex_parts.extend(chosen.latex_parts);
            out.text_parts.extend(chosen.text_parts);
        }
        Stmt::For {
            var, start, end, body, ..
        } => {
            let body_stmts: Vec<&Stmt> = body.stmts.iter().collect();
            let mut inner = Rendered::default();
            render_stmts(&body_stmts, case, size_symbol, &mut inner);
            let (latex, text) = wrap_summation(
                var,
                &pretty_expr(start),
                &pretty_expr(end),
                &inner,
            );
            out.latex_parts.push(latex);
            out.text_parts.push(text);
        }
        Stmt::While { cond, body, .. } => {
            render_unbounded_loop(cond, &body.stmts, case, size_symbol, out);
        }
        Stmt::Repeat { body, until, .. } => {
            render_unbounded_loop(until, body, case, size_symbol, out);
        }
    }
}

fn render_unbounded_loop(
    cond: &Expr,
    body: &[Stmt],
    case: Case,
    size_symbol: &str,
    out: &mut Rendered,
) {
    let body_stmts: Vec<&Stmt> = body.iter().collect();
    let mut inner = Rendered::default();
    render_stmts(&body_stmts, case, size_symbol, &mut inner);

    let early_exit = condition_has_flag_conjunct(cond);
    if case == Case::Best && early_exit {
        // The search can succeed immediately; the body runs once.
        out.add_constant(inner.constant);
        out.latex_parts.extend(inner.latex_parts);
        out.text_parts.extend(inner.text_parts);
        return;
    }

    let bound = loop_bound_display(cond, body, size_symbol);
    let (latex, text) = wrap_summation("t", "1", &bound, &inner);
    out.latex_parts.push(latex);
    out.text_parts.push(text);
}

/// Upper bound shown for a while/repeat summation, from the same patterns
/// the cost walk recognizes.
fn loop_bound_display(cond: &Expr, body: &[Stmt], size_symbol: &str) -> String {
    let block = crate::parser::ast::Block {
        stmts: body.to_vec(),
        span: None,
    };
    let Some(var) = governing_variable(cond) else {
        return size_symbol.to_string();
    };
    if let Some(divisor) = assign_div_const(&block, &var) {
        if divisor == 2 {
            format!("log({size_symbol})")
        } else {
            format!("log_{divisor}({size_symbol})")
        }
    } else if let Some(factor) = assign_mul_const(&block, &var) {
        if factor == 2 {
            format!("log({size_symbol})")
        } else {
            format!("log_{factor}({size_symbol})")
        }
    } else if assign_sub_const(&block, &var).is_some() || assign_add_const(&block, &var).is_some()
    {
        size_symbol.to_string()
    } else {
        size_symbol.to_string()
    }
}

fn wrap_summation(var: &str, lo: &str, hi: &str, inner: &Rendered) -> (String, String) {
    let (latex_body, text_body) = if inner.latex_parts.is_empty() {
        let constant = render_rational(if inner.constant.is_zero() {
            Rational64::from_integer(1)
        } else {
            inner.constant
        });
        (constant.clone(), constant)
    } else {
        let latex = inner.join(true);
        let text = inner.join(false);
        (format!("\\left( {latex} \\right)"), format!("({text})"))
    };
    (
        format!("\\sum_{{{var}={lo}}}^{{{hi}}} {latex_body}"),
        format!("Σ_{{{var}={lo}}}^{{{hi}}} {text_body}"),
    )
}

fn weight(rendered: &Rendered) -> (usize, Rational64) {
    (rendered.latex_parts.len(), rendered.constant)
}

fn pick_heavier(then_rendered: Rendered, else_rendered: Rendered, heavier: bool) -> Rendered {
    let then_first = if heavier {
        weight(&then_rendered) >= weight(&else_rendered)
    } else {
        weight(&then_rendered) <= weight(&else_rendered)
    };
    if then_first {
        then_rendered
    } else {
        else_rendered
    }
}

fn merge(mut a: Rendered, b: Rendered) -> Rendered {
    a.latex_parts.extend(b.latex_parts);
    a.text_parts.extend(b.text_parts);
    a.constant += b.constant;
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::sema::run_semantic;
    use indoc::indoc;

    fn summations(source: &str) -> Summations {
        let (program, _) = run_semantic(parse(source).expect("parse should succeed"));
        let stmts = program.main_stmts();
        build(&stmts, "n")
    }

    #[test]
    fn renders_single_loop_summation() {
        let result = summations(indoc! {"
            begin
              s <- 0
              for i <- 1 to n do
              begin
                s <- s + i
              end
            end
        "});
        assert_eq!(result.worst.text, "Σ_{i=1}^{n} 1 + 1");
        assert_eq!(result.worst.latex, "\\sum_{i=1}^{n} 1 + 1");
        assert_eq!(result.worst, result.best);
    }

    #[test]
    fn renders_nested_loop_summation() {
        let result = summations(indoc! {"
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
        assert_eq!(result.worst.text, "Σ_{i=1}^{n} (Σ_{j=1}^{n} 1)");
        assert!(result.worst.latex.contains("\\sum_{i=1}^{n}"));
        assert!(result.worst.latex.contains("\\sum_{j=1}^{n} 1"));
    }

    #[test]
    fn renders_halving_while_with_log_bound() {
        let result = summations(indoc! {"
            begin
              i <- n
              while (i > 1) do
              begin
                i <- i div 2
              end
            end
        "});
        assert_eq!(result.worst.text, "Σ_{t=1}^{log(n)} 1 + 1");
    }

    #[test]
    fn best_case_of_search_loop_drops_the_summation() {
        let result = summations(indoc! {"
            begin
              i <- 1
              while (i <= n and found = F) do
              begin
                i <- i + 1
              end
            end
        "});
        assert!(result.worst.text.contains("Σ_{t=1}^{n}"));
        assert!(!result.best.text.contains("Σ"));
    }

    #[test]
    fn triangular_loop_uses_actual_bounds() {
        let result = summations(indoc! {"
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
        assert_eq!(result.worst.text, "Σ_{i=1}^{n} (Σ_{j=1}^{i} 1)");
    }

    #[test]
    fn constant_program_renders_its_count() {
        let result = summations("begin\nx <- 1\ny <- 2\nend");
        assert_eq!(result.worst.text, "2");
        assert_eq!(result.worst.latex, "2");
    }
}
