//! Input syntax tree handed over by the upstream dialogue parser.
//!
//! The parser lives outside this workspace; its output is one JSON document
//! per source file, deserialized into [`SourceFile`]. Everything here is
//! plain data, and [`visit`] provides the traversal used by the scans.

pub mod visit;

use serde::{Deserialize, Serialize};

pub use visit::Visit;

/// One parsed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub filename: String,
    #[serde(default)]
    pub nodes: Vec<NodeDecl>,
}

/// A titled node with its headers and body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDecl {
    pub title: String,
    /// Character offset of the node in its source file. Disambiguates
    /// members of a node group.
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Header {
    /// Space-separated node tags.
    Tags(String),
    /// Node-group membership guard.
    When(Guard),
    Other { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    Always,
    Once,
    Expr(Expr),
}

/// A chunk of formatted text: literal text or an embedded `{expression}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPart {
    Text(String),
    Expr(Expr),
}

/// Trailing `<<if ...>>` / `<<once ...>>` on a line or option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCondition {
    If(Expr),
    Once(Option<Expr>),
}

/// A line of dialogue, also the payload of options and line-group items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStatement {
    pub text: Vec<TextPart>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub condition: Option<LineCondition>,
}

/// One branch of an if/elseif/else chain. The else branch has no condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    #[serde(default)]
    pub condition: Option<Expr>,
    #[serde(default)]
    pub body: Vec<Statement>,
}

/// A `->` option or line-group item with its nested body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortcutOption {
    pub line: LineStatement,
    #[serde(default)]
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpTarget {
    Node(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOperator {
    #[default]
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl SetOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            SetOperator::Assign => "=",
            SetOperator::Add => "+=",
            SetOperator::Sub => "-=",
            SetOperator::Mul => "*=",
            SetOperator::Div => "/=",
            SetOperator::Mod => "%=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumCaseDecl {
    pub name: String,
    #[serde(default)]
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    Line(LineStatement),
    Set {
        variable: String,
        #[serde(default)]
        operator: SetOperator,
        value: Expr,
    },
    Command {
        text: Vec<TextPart>,
        #[serde(default)]
        hashtags: Vec<String>,
    },
    /// `<<call f(...)>>`
    Call { call: Expr },
    If { clauses: Vec<Clause> },
    Once {
        #[serde(default)]
        condition: Option<Expr>,
        #[serde(default)]
        body: Vec<Statement>,
        #[serde(default)]
        alternate: Option<Vec<Statement>>,
    },
    Options { options: Vec<ShortcutOption> },
    LineGroup { items: Vec<ShortcutOption> },
    Jump { target: JumpTarget },
    Detour { target: JumpTarget },
    Return,
    Declare { variable: String, value: Expr },
    Enum { name: String, cases: Vec<EnumCaseDecl> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    /// The C++ spelling of the operator. Xor has none and is synthesized
    /// by the lowerer.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Xor => "^",
        }
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Number {
        value: f64,
    },
    String {
        value: String,
    },
    Bool {
        value: bool,
    },
    /// `$name`; the leading `$` is optional.
    Variable {
        name: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// `Enum.Case` or `.Case`.
    EnumMember {
        #[serde(default)]
        enum_name: Option<String>,
        member: String,
    },
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

impl Expr {
    pub fn num(value: f64) -> Self {
        Expr::Number { value }
    }

    pub fn str(value: &str) -> Self {
        Expr::String {
            value: value.to_string(),
        }
    }

    pub fn bool(value: bool) -> Self {
        Expr::Bool { value }
    }

    pub fn var(name: &str) -> Self {
        Expr::Variable {
            name: name.to_string(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn call(name: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.to_string(),
            args,
        }
    }

    pub fn member(enum_name: Option<&str>, member: &str) -> Self {
        Expr::EnumMember {
            enum_name: enum_name.map(str::to_string),
            member: member.to_string(),
        }
    }

    /// True for number, string and boolean literals.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::Number { .. } | Expr::String { .. } | Expr::Bool { .. }
        )
    }

    /// Number of `and`/`or`/`xor`/`not` operators in this expression.
    pub fn boolean_connectives(&self) -> usize {
        match self {
            Expr::Unary { op, operand } => {
                usize::from(*op == UnaryOp::Not) + operand.boolean_connectives()
            }
            Expr::Binary { op, left, right } => {
                usize::from(op.is_boolean())
                    + left.boolean_connectives()
                    + right.boolean_connectives()
            }
            Expr::Call { args, .. } => args.iter().map(Expr::boolean_connectives).sum(),
            _ => 0,
        }
    }
}

impl TextPart {
    pub fn text(text: &str) -> Self {
        TextPart::Text(text.to_string())
    }

    pub fn expr(expr: Expr) -> Self {
        TextPart::Expr(expr)
    }
}

impl LineStatement {
    pub fn new(text: Vec<TextPart>) -> Self {
        Self {
            text,
            hashtags: Vec::new(),
            condition: None,
        }
    }

    pub fn with_hashtags(mut self, hashtags: &[&str]) -> Self {
        self.hashtags = hashtags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_condition(mut self, condition: LineCondition) -> Self {
        self.condition = Some(condition);
        self
    }
}

impl ShortcutOption {
    pub fn new(line: LineStatement, body: Vec<Statement>) -> Self {
        Self { line, body }
    }
}

impl Statement {
    /// A line of plain text.
    pub fn line(text: &str) -> Self {
        Statement::Line(LineStatement::new(vec![TextPart::text(text)]))
    }

    pub fn set(variable: &str, operator: SetOperator, value: Expr) -> Self {
        Statement::Set {
            variable: variable.to_string(),
            operator,
            value,
        }
    }

    pub fn command(text: &str) -> Self {
        Statement::Command {
            text: vec![TextPart::text(text)],
            hashtags: Vec::new(),
        }
    }

    pub fn jump(target: &str) -> Self {
        Statement::Jump {
            target: JumpTarget::Node(target.to_string()),
        }
    }

    pub fn detour(target: &str) -> Self {
        Statement::Detour {
            target: JumpTarget::Node(target.to_string()),
        }
    }

    pub fn declare(variable: &str, value: Expr) -> Self {
        Statement::Declare {
            variable: variable.to_string(),
            value,
        }
    }
}

impl NodeDecl {
    pub fn new(title: &str, body: Vec<Statement>) -> Self {
        Self {
            title: title.to_string(),
            offset: 0,
            headers: Vec::new(),
            body,
        }
    }

    pub fn at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.headers.push(header);
        self
    }

    /// Guards from `when:` headers, in source order.
    pub fn guards(&self) -> impl Iterator<Item = &Guard> {
        self.headers.iter().filter_map(|h| match h {
            Header::When(guard) => Some(guard),
            _ => None,
        })
    }

    pub fn is_group_member(&self) -> bool {
        self.guards().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_deserialize_from_kind_tagged_json() {
        let json = r#"[
            {"kind": "line", "text": [{"text": "Hello "}, {"expr": {"kind": "variable", "name": "$name"}}]},
            {"kind": "set", "variable": "gold", "operator": "sub", "value": {"kind": "number", "value": 2}},
            {"kind": "jump", "target": {"node": "End"}},
            {"kind": "return"}
        ]"#;
        let stmts: Vec<Statement> = serde_json::from_str(json).unwrap();
        assert_eq!(stmts.len(), 4);
        match &stmts[1] {
            Statement::Set { operator, .. } => assert_eq!(operator.as_str(), "-="),
            other => panic!("expected set, got {other:?}"),
        }
        assert_eq!(stmts[3], Statement::Return);
    }

    #[test]
    fn headers_deserialize() {
        let json = r#"{"title": "Start", "offset": 12, "headers": [
            {"tags": "intro chapter:1"},
            {"when": "once"},
            {"when": {"expr": {"kind": "bool", "value": true}}}
        ]}"#;
        let node: NodeDecl = serde_json::from_str(json).unwrap();
        assert!(node.is_group_member());
        assert_eq!(node.guards().count(), 2);
        assert!(node.body.is_empty());
    }

    #[test]
    fn boolean_connectives_counted() {
        let e = Expr::binary(
            BinaryOp::And,
            Expr::unary(UnaryOp::Not, Expr::var("a")),
            Expr::binary(BinaryOp::Eq, Expr::var("b"), Expr::num(1.0)),
        );
        assert_eq!(e.boolean_connectives(), 2);
        assert_eq!(Expr::var("a").boolean_connectives(), 0);
    }
}
