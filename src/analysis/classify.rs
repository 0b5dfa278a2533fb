//! Iterative/recursive classification.
//!
//! Builds the call graph over the program's procedures and marks every
//! procedure on a call cycle as recursive, so mutual recursion is caught as
//! well as the direct kind.

use std::collections::{BTreeMap, BTreeSet};

use crate::parser::ast::{Block, Expr, Item, Proc, Program, Stmt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramMetadata {
    /// Procedure name → names it calls (statement or expression position).
    pub call_graph: BTreeMap<String, BTreeSet<String>>,
    pub recursive_procs: BTreeSet<String>,
}

impl ProgramMetadata {
    pub fn is_recursive(&self) -> bool {
        !self.recursive_procs.is_empty()
    }

    /// The procedure whose recurrence the recursive analyzer resolves: the
    /// first recursive one in program order.
    pub fn first_recursive_proc<'a>(&self, program: &'a Program) -> Option<&'a Proc> {
        program
            .procs()
            .into_iter()
            .find(|proc| self.recursive_procs.contains(&proc.name))
    }
}

pub fn classify(program: &Program) -> ProgramMetadata {
    let mut call_graph = BTreeMap::new();
    for item in &program.body {
        if let Item::Proc(proc) = item {
            let mut calls = BTreeSet::new();
            collect_calls_block(&proc.body, &mut calls);
            call_graph.insert(proc.name.clone(), calls);
        }
    }

    let mut recursive_procs = BTreeSet::new();
    for start in call_graph.keys() {
        let mut path = Vec::new();
        find_cycles(start, &call_graph, &mut path, &mut recursive_procs);
    }

    ProgramMetadata {
        call_graph,
        recursive_procs,
    }
}

fn find_cycles(
    func: &str,
    graph: &BTreeMap<String, BTreeSet<String>>,
    path: &mut Vec<String>,
    recursive: &mut BTreeSet<String>,
) {
    if let Some(position) = path.iter().position(|f| f == func) {
        // Everything on the cycle is recursive.
        for name in &path[position..] {
            recursive.insert(name.clone());
        }
        return;
    }
    let Some(callees) = graph.get(func) else {
        return;
    };
    path.push(func.to_string());
    for callee in callees {
        find_cycles(callee, graph, path, recursive);
    }
    path.pop();
}

pub fn collect_calls_block(block: &Block, calls: &mut BTreeSet<String>) {
    collect_calls_stmts(&block.stmts, calls);
}

fn collect_calls_stmts(stmts: &[Stmt], calls: &mut BTreeSet<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::Call { name, args, .. } => {
                calls.insert(name.clone());
                for arg in args {
                    collect_calls_expr(arg, calls);
                }
            }
            Stmt::Assign { expr, .. } => collect_calls_expr(expr, calls),
            Stmt::Return { expr, .. } => {
                if let Some(expr) = expr {
                    collect_calls_expr(expr, calls);
                }
            }
            Stmt::ExprStmt { expr, .. } => collect_calls_expr(expr, calls),
            Stmt::For { start, end, step, body, .. } => {
                collect_calls_expr(start, calls);
                collect_calls_expr(end, calls);
                if let Some(step) = step {
                    collect_calls_expr(step, calls);
                }
                collect_calls_block(body, calls);
            }
            Stmt::While { cond, body, .. } => {
                collect_calls_expr(cond, calls);
                collect_calls_block(body, calls);
            }
            Stmt::Repeat { body, until, .. } => {
                collect_calls_stmts(body, calls);
                collect_calls_expr(until, calls);
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
                ..
            } => {
                collect_calls_expr(cond, calls);
                collect_calls_block(then_body, calls);
                if let Some(else_body) = else_body {
                    collect_calls_block(else_body, calls);
                }
            }
            Stmt::ObjectDecl { .. } => {}
        }
    }
}

fn collect_calls_expr(expr: &Expr, calls: &mut BTreeSet<String>) {
    match expr {
        Expr::Call { name, args } => {
            calls.insert(name.clone());
            for arg in args {
                collect_calls_expr(arg, calls);
            }
        }
        Expr::Bin { left, right, .. } => {
            collect_calls_expr(left, calls);
            collect_calls_expr(right, calls);
        }
        Expr::Unary { expr, .. } | Expr::Ceil(expr) | Expr::Floor(expr) => {
            collect_calls_expr(expr, calls);
        }
        Expr::Index { base, indices } => {
            collect_calls_expr(base, calls);
            for index in indices {
                collect_calls_expr(index, calls);
            }
        }
        Expr::Slice { base, lo, hi } => {
            collect_calls_expr(base, calls);
            collect_calls_expr(lo, calls);
            collect_calls_expr(hi, calls);
        }
        Expr::Member { base, .. } => collect_calls_expr(base, calls),
        Expr::Num(_) | Expr::Bool(_) | Expr::Var(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use indoc::indoc;

    fn classify_source(source: &str) -> ProgramMetadata {
        classify(&parse(source).expect("parse should succeed"))
    }

    #[test]
    fn plain_loops_are_iterative() {
        let metadata = classify_source(indoc! {"
            begin
              for i <- 1 to n do
              begin
                s <- s + i
              end
            end
        "});
        assert!(!metadata.is_recursive());
    }

    #[test]
    fn detects_direct_recursion_in_expression_position() {
        let metadata = classify_source(indoc! {"
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
        assert!(metadata.recursive_procs.contains("Fact"));
    }

    #[test]
    fn detects_recursion_through_call_statements() {
        let metadata = classify_source(indoc! {"
            MergeSort(A, lo, hi)
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
        assert!(metadata.recursive_procs.contains("MergeSort"));
        assert!(!metadata.recursive_procs.contains("Merge"));
    }

    #[test]
    fn detects_mutual_recursion() {
        let metadata = classify_source(indoc! {"
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
        assert!(metadata.recursive_procs.contains("Even"));
        assert!(metadata.recursive_procs.contains("Odd"));
    }

    #[test]
    fn non_recursive_helpers_stay_iterative() {
        let metadata = classify_source(indoc! {"
            Helper(x)
            begin
              return x + 1
            end
            begin
              CALL Helper(5)
            end
        "});
        assert!(!metadata.is_recursive());
    }
}
