//! Read-only traversal over the input syntax tree.
//!
//! Implementors override the `visit_*` hooks they care about and call the
//! matching `walk_*` function to keep descending.

use super::{
    Clause, Expr, Guard, Header, JumpTarget, LineCondition, LineStatement, NodeDecl,
    ShortcutOption, Statement, TextPart,
};

pub trait Visit<'ast> {
    fn visit_node(&mut self, node: &'ast NodeDecl) {
        walk_node(self, node);
    }

    fn visit_statement(&mut self, stmt: &'ast Statement) {
        walk_statement(self, stmt);
    }

    fn visit_line(&mut self, line: &'ast LineStatement) {
        walk_line(self, line);
    }

    fn visit_expr(&mut self, expr: &'ast Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_node<'ast, V: Visit<'ast> + ?Sized>(v: &mut V, node: &'ast NodeDecl) {
    for header in &node.headers {
        if let Header::When(Guard::Expr(expr)) = header {
            v.visit_expr(expr);
        }
    }
    for stmt in &node.body {
        v.visit_statement(stmt);
    }
}

pub fn walk_statement<'ast, V: Visit<'ast> + ?Sized>(v: &mut V, stmt: &'ast Statement) {
    match stmt {
        Statement::Line(line) => v.visit_line(line),
        Statement::Set { value, .. } | Statement::Declare { value, .. } => v.visit_expr(value),
        Statement::Command { text, .. } => walk_text(v, text),
        Statement::Call { call } => v.visit_expr(call),
        Statement::If { clauses } => {
            for Clause { condition, body } in clauses {
                if let Some(cond) = condition {
                    v.visit_expr(cond);
                }
                for s in body {
                    v.visit_statement(s);
                }
            }
        }
        Statement::Once {
            condition,
            body,
            alternate,
        } => {
            if let Some(cond) = condition {
                v.visit_expr(cond);
            }
            for s in body.iter().chain(alternate.iter().flatten()) {
                v.visit_statement(s);
            }
        }
        Statement::Options { options: items } | Statement::LineGroup { items } => {
            for ShortcutOption { line, body } in items {
                v.visit_line(line);
                for s in body {
                    v.visit_statement(s);
                }
            }
        }
        Statement::Jump { target } | Statement::Detour { target } => {
            if let JumpTarget::Expr(expr) = target {
                v.visit_expr(expr);
            }
        }
        Statement::Enum { cases, .. } => {
            for case in cases {
                if let Some(value) = &case.value {
                    v.visit_expr(value);
                }
            }
        }
        Statement::Return => {}
    }
}

pub fn walk_line<'ast, V: Visit<'ast> + ?Sized>(v: &mut V, line: &'ast LineStatement) {
    walk_text(v, &line.text);
    match &line.condition {
        Some(LineCondition::If(expr)) | Some(LineCondition::Once(Some(expr))) => v.visit_expr(expr),
        _ => {}
    }
}

pub fn walk_text<'ast, V: Visit<'ast> + ?Sized>(v: &mut V, parts: &'ast [TextPart]) {
    for part in parts {
        if let TextPart::Expr(expr) = part {
            v.visit_expr(expr);
        }
    }
}

pub fn walk_expr<'ast, V: Visit<'ast> + ?Sized>(v: &mut V, expr: &'ast Expr) {
    match expr {
        Expr::Unary { operand, .. } => v.visit_expr(operand),
        Expr::Binary { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        Expr::Call { args, .. } => {
            for arg in args {
                v.visit_expr(arg);
            }
        }
        Expr::Number { .. }
        | Expr::String { .. }
        | Expr::Bool { .. }
        | Expr::Variable { .. }
        | Expr::EnumMember { .. } => {}
    }
}
