//! Expression lowering: syntax-tree expressions to C++ expression text.
//!
//! Post-order walk with an explicit stack of generated sub-expressions.
//! Nothing is evaluated; operands are popped and recombined as text.

use crate::context::CompilationContext;
use crate::error::CoreError;
use crate::syntax::{BinaryOp, Expr, UnaryOp};

pub struct ExprLowerer<'a> {
    ctx: &'a CompilationContext,
    stack: Vec<String>,
}

impl<'a> ExprLowerer<'a> {
    pub fn new(ctx: &'a CompilationContext) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
        }
    }

    /// Lower one expression tree to a single C++ expression.
    pub fn lower(&mut self, expr: &Expr) -> Result<String, CoreError> {
        self.visit(expr)?;
        Ok(self.flush())
    }

    /// Drain the stack into one string.
    fn flush(&mut self) -> String {
        let text = self.stack.join(" ");
        self.stack.clear();
        text
    }

    fn pop(&mut self) -> Result<String, CoreError> {
        self.stack
            .pop()
            .ok_or_else(|| CoreError::Unsupported("operator without operand".to_string()))
    }

    fn visit(&mut self, expr: &Expr) -> Result<(), CoreError> {
        match expr {
            Expr::Number { value } => {
                let text = lower_number(*value, &self.ctx.config.fixed_point)?;
                self.stack.push(text);
            }
            Expr::String { value } => self.stack.push(string_literal(value)),
            Expr::Bool { value } => self.stack.push(value.to_string()),
            Expr::Variable { name } => {
                let name = variable_name(name);
                let text = match self.ctx.resolved.get(name) {
                    Some(resolved) => resolved.clone(),
                    None => format!("{}.{name}", self.ctx.config.variables_path),
                };
                self.stack.push(text);
            }
            Expr::Unary { op, operand } => {
                self.visit(operand)?;
                let inner = self.pop()?;
                let sym = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                self.stack.push(format!("({sym}{inner})"));
            }
            Expr::Binary { op, left, right } => {
                self.visit(left)?;
                self.visit(right)?;
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                let text = match op {
                    BinaryOp::Xor => format!("(!{lhs} != !{rhs})"),
                    _ => format!("({lhs} {} {rhs})", op.symbol()),
                };
                self.stack.push(text);
            }
            Expr::Call { name, args } => self.visit_call(name, args)?,
            Expr::EnumMember { enum_name, member } => {
                let text = self.ctx.enum_member_ref(enum_name.as_deref(), member)?;
                self.stack.push(text);
            }
        }
        Ok(())
    }

    fn visit_call(&mut self, name: &str, args: &[Expr]) -> Result<(), CoreError> {
        let ctx = self.ctx;
        let runner = &ctx.config.runner;
        let text = match name {
            "visited" => {
                let node = visited_argument(name, args)?;
                format!("{runner}.VisitedNode(VisitedNodeName::{node})")
            }
            "visited_count" => {
                let node = visited_argument(name, args)?;
                format!("{runner}.VisitedCountNode(VisitCountedNodeName::{node})")
            }
            _ => {
                let mut lowered = Vec::with_capacity(args.len());
                for arg in args {
                    self.visit(arg)?;
                    lowered.push(self.pop()?);
                }
                format!("{}.{name}({})", ctx.config.functions_path, lowered.join(", "))
            }
        };
        self.stack.push(text);
        Ok(())
    }
}

/// The literal node name passed to `visited`/`visited_count`. Anything but
/// a single string literal is rejected.
pub fn visited_argument<'e>(function: &str, args: &'e [Expr]) -> Result<&'e str, CoreError> {
    match args {
        [Expr::String { value }] => Ok(value.as_str()),
        _ => Err(CoreError::Unsupported(format!(
            "`{function}` requires a single string literal node name"
        ))),
    }
}

/// Variable name without its `$` sigil.
pub fn variable_name(name: &str) -> &str {
    name.strip_prefix('$').unwrap_or(name)
}

/// Integers are written as-is, fractions through the fixed-point
/// constructor. Integers past 2^53 cannot be written exactly and are
/// rejected.
pub fn lower_number(value: f64, fixed_point: &str) -> Result<String, CoreError> {
    if !value.is_finite() {
        return Err(CoreError::Unsupported(format!("non-finite number literal {value}")));
    }
    if value.fract() != 0.0 {
        Ok(format!("{fixed_point}({value})"))
    } else if value.abs() < 2f64.powi(53) {
        Ok(format!("{value}"))
    } else {
        Err(CoreError::Unsupported(format!(
            "integer literal {value} is out of range"
        )))
    }
}

pub fn string_literal(value: &str) -> String {
    format!("\"{}\"", escape_cpp(value))
}

/// Escape text for a C++ string literal.
pub fn escape_cpp(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' | '\n' => {}
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{EnumCase, EnumDecl};

    fn lower(ctx: &CompilationContext, expr: &Expr) -> String {
        ExprLowerer::new(ctx).lower(expr).unwrap()
    }

    #[test]
    fn literals() {
        let ctx = CompilationContext::default();
        assert_eq!(lower(&ctx, &Expr::num(3.0)), "3");
        assert_eq!(lower(&ctx, &Expr::num(1.5)), "bn::fixed(1.5)");
        assert_eq!(lower(&ctx, &Expr::str("hi \"you\"")), "\"hi \\\"you\\\"\"");
        assert_eq!(lower(&ctx, &Expr::bool(false)), "false");
    }

    #[test]
    fn huge_integers_rejected() {
        let ctx = CompilationContext::default();
        assert_eq!(lower(&ctx, &Expr::num(9_007_199_254_740_991.0)), "9007199254740991");
        assert!(matches!(
            ExprLowerer::new(&ctx).lower(&Expr::num(1e20)),
            Err(CoreError::Unsupported(_))
        ));
        assert!(lower_number(f64::INFINITY, "bn::fixed").is_err());
    }

    #[test]
    fn operators_parenthesize() {
        let ctx = CompilationContext::default();
        let e = Expr::binary(
            BinaryOp::Add,
            Expr::var("$gold"),
            Expr::unary(UnaryOp::Neg, Expr::num(2.0)),
        );
        assert_eq!(lower(&ctx, &e), "(runner.variables.gold + (-2))");
    }

    #[test]
    fn xor_is_synthesized() {
        let ctx = CompilationContext::default();
        let e = Expr::binary(BinaryOp::Xor, Expr::var("a"), Expr::var("b"));
        assert_eq!(lower(&ctx, &e), "(!runner.variables.a != !runner.variables.b)");
    }

    #[test]
    fn resolved_smart_variable_substituted() {
        let mut ctx = CompilationContext::default();
        ctx.resolved
            .insert("rich".into(), "(runner.variables.gold > 10)".into());
        assert_eq!(lower(&ctx, &Expr::var("$rich")), "(runner.variables.gold > 10)");
    }

    #[test]
    fn calls() {
        let ctx = CompilationContext::default();
        let visited = Expr::call("visited", vec![Expr::str("Intro")]);
        assert_eq!(lower(&ctx, &visited), "runner.VisitedNode(VisitedNodeName::Intro)");
        let count = Expr::call("visited_count", vec![Expr::str("Intro")]);
        assert_eq!(
            lower(&ctx, &count),
            "runner.VisitedCountNode(VisitCountedNodeName::Intro)"
        );
        let user = Expr::call("dice", vec![Expr::num(6.0), Expr::var("bonus")]);
        assert_eq!(lower(&ctx, &user), "runner.variables.dice(6, runner.variables.bonus)");
    }

    #[test]
    fn dynamic_visited_rejected() {
        let ctx = CompilationContext::default();
        let e = Expr::call("visited", vec![Expr::var("where")]);
        assert!(matches!(
            ExprLowerer::new(&ctx).lower(&e),
            Err(CoreError::Unsupported(_))
        ));
    }

    #[test]
    fn enum_member_lowered() {
        let mut ctx = CompilationContext::default();
        ctx.enums.push(EnumDecl {
            name: "Mood".into(),
            cases: vec![EnumCase {
                name: "Happy".into(),
                value: None,
            }],
        });
        assert_eq!(lower(&ctx, &Expr::member(None, "Happy")), "Mood::Happy");
    }
}
