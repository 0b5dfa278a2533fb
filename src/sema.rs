//! Semantic normalization pass.
//!
//! A single traversal over the freshly parsed tree. It fills defaults (the
//! `for` step of 1) and collects non-fatal [`Issue`]s; it never changes the
//! meaning of the program. Analysis continues regardless of what it finds.

use serde::Serialize;

use crate::parser::ast::{Block, Expr, Item, Program, Stmt, UnaryOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    #[serde(rename = "where")]
    pub where_: Option<String>,
}

impl Issue {
    fn warning(message: impl Into<String>, where_: impl Into<String>) -> Self {
        Issue {
            severity: Severity::Warning,
            message: message.into(),
            where_: Some(where_.into()),
        }
    }

    fn error(message: impl Into<String>, where_: impl Into<String>) -> Self {
        Issue {
            severity: Severity::Error,
            message: message.into(),
            where_: Some(where_.into()),
        }
    }
}

/// Run the semantic pass: returns the normalized tree and any issues found.
pub fn run_semantic(program: Program) -> (Program, Vec<Issue>) {
    let mut issues = Vec::new();
    let body = program
        .body
        .into_iter()
        .map(|item| match item {
            Item::Stmt(stmt) => Item::Stmt(visit_stmt(stmt, &mut issues)),
            Item::Proc(mut proc) => {
                proc.body = visit_block(proc.body, &mut issues);
                Item::Proc(proc)
            }
            class @ Item::Class(_) => class,
        })
        .collect();
    (Program { body }, issues)
}

fn visit_block(block: Block, issues: &mut Vec<Issue>) -> Block {
    Block {
        stmts: block
            .stmts
            .into_iter()
            .map(|stmt| visit_stmt(stmt, issues))
            .collect(),
        span: block.span,
    }
}

fn visit_stmt(stmt: Stmt, issues: &mut Vec<Issue>) -> Stmt {
    match stmt {
        Stmt::For {
            var,
            start,
            end,
            step,
            body,
            span,
            ..
        } => {
            let step = step.unwrap_or(Expr::Num(1));
            if matches!(step, Expr::Num(0)) {
                issues.push(Issue::error("for step must not be 0", format!("for(var={var})")));
            }
            if body.stmts.is_empty() {
                issues.push(Issue::warning(
                    "for loop has an empty body",
                    format!("for(var={var})"),
                ));
            }
            Stmt::For {
                var,
                start,
                end,
                step: Some(step),
                inclusive: true,
                body: visit_block(body, issues),
                span,
            }
        }
        Stmt::While { cond, body, span } => {
            if !looks_boolean(&cond) {
                issues.push(Issue::warning(
                    "while condition does not look boolean (use comparisons or and/or/not)",
                    "while",
                ));
            }
            if body.stmts.is_empty() {
                issues.push(Issue::warning("while loop has an empty body", "while"));
            }
            Stmt::While {
                cond,
                body: visit_block(body, issues),
                span,
            }
        }
        Stmt::Repeat { body, until, span } => {
            if !looks_boolean(&until) {
                issues.push(Issue::warning(
                    "until condition does not look boolean",
                    "repeat-until",
                ));
            }
            Stmt::Repeat {
                body: body
                    .into_iter()
                    .map(|stmt| visit_stmt(stmt, issues))
                    .collect(),
                until,
                span,
            }
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
            span,
        } => {
            if !looks_boolean(&cond) {
                issues.push(Issue::warning("if condition does not look boolean", "if"));
            }
            Stmt::If {
                cond,
                then_body: visit_block(then_body, issues),
                else_body: else_body.map(|block| visit_block(block, issues)),
                span,
            }
        }
        other => other,
    }
}

/// Surface-level booleanness: relational or logical operators, boolean
/// literals, or `not` over one of those.
fn looks_boolean(expr: &Expr) -> bool {
    match expr {
        Expr::Bool(_) => true,
        Expr::Unary {
            op: UnaryOp::Not,
            expr,
        } => looks_boolean(expr),
        Expr::Bin { op, left, right } => {
            if op.is_relational() {
                true
            } else if op.is_logical() {
                looks_boolean(left) || looks_boolean(right)
            } else {
                false
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use indoc::indoc;

    fn run(source: &str) -> (Program, Vec<Issue>) {
        run_semantic(parse(source).expect("parse should succeed"))
    }

    #[test]
    fn fills_default_for_step() {
        let (program, issues) = run("for i <- 1 to n do s <- s + i");
        assert!(issues.is_empty());
        match &program.body[0] {
            Item::Stmt(Stmt::For { step, inclusive, .. }) => {
                assert_eq!(step, &Some(Expr::Num(1)));
                assert!(*inclusive);
            }
            other => panic!("expected for loop, got {other:?}"),
        }
    }

    #[test]
    fn keeps_explicit_step() {
        let (program, _) = run("for i <- 1 to n step 2 do s <- s + i");
        match &program.body[0] {
            Item::Stmt(Stmt::For { step, .. }) => assert_eq!(step, &Some(Expr::Num(2))),
            other => panic!("expected for loop, got {other:?}"),
        }
    }

    #[test]
    fn flags_zero_step_as_error() {
        let (_, issues) = run("for i <- 1 to n step 0 do s <- s + i");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues[0].message.contains("step"));
    }

    #[test]
    fn flags_empty_for_body() {
        let (_, issues) = run("begin\nfor i <- 1 to n do\nend");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[0].message.contains("empty body"));
    }

    #[test]
    fn flags_non_boolean_while_condition() {
        let (_, issues) = run(indoc! {"
            begin
              while (x) do
              begin
                x <- x - 1
              end
            end
        "});
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("boolean"));
    }

    #[test]
    fn accepts_boolean_conditions() {
        let (_, issues) = run(indoc! {"
            begin
              while (i <= n and found = F) do
              begin
                i <- i + 1
              end
              if (not (i > n)) then
              begin
                x <- 1
              end
            end
        "});
        assert!(issues.is_empty());
    }

    #[test]
    fn normalizes_nested_loops() {
        let (program, issues) = run(indoc! {"
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
        assert!(issues.is_empty());
        let Item::Stmt(Stmt::For { body, .. }) = &program.body[0] else {
            panic!("expected for");
        };
        let Stmt::For { step, .. } = &body.stmts[0] else {
            panic!("expected inner for");
        };
        assert_eq!(step, &Some(Expr::Num(1)));
    }
}
