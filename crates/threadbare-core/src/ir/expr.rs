use serde::{Deserialize, Serialize};

/// A chunk of line or option content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Literal text, already unescaped. C++ string escaping happens at
    /// emission.
    Text(String),
    /// Lowered C++ expression text.
    Calculated(String),
    Markup(Markup),
    Select(Select),
    Plural(Plural),
}

impl Expression {
    pub fn text(text: &str) -> Self {
        Expression::Text(text.to_string())
    }

    pub fn calculated(text: &str) -> Self {
        Expression::Calculated(text.to_string())
    }
}

/// An attribute open or close marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Markup {
    pub name: String,
    pub is_start: bool,
    pub params: Vec<MarkupParam>,
}

impl Markup {
    pub fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_start: true,
            params: Vec::new(),
        }
    }

    pub fn end(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_start: false,
            params: Vec::new(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&MarkupValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupParam {
    pub name: String,
    pub value: MarkupValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarkupValue {
    /// Quoted string, content kept with backslash escapes intact.
    Str(String),
    /// Unquoted token.
    Bare(String),
    /// Lowered embedded expression.
    Expr(String),
}

impl MarkupValue {
    /// C++ text for this value. Bare numbers and booleans pass through;
    /// other bare words become string literals.
    pub fn render(&self) -> String {
        match self {
            MarkupValue::Str(s) => format!("\"{s}\""),
            MarkupValue::Bare(s) => {
                if s == "true" || s == "false" || s.parse::<f64>().is_ok() {
                    s.clone()
                } else {
                    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
                }
            }
            MarkupValue::Expr(e) => e.clone(),
        }
    }

    /// The value with no quoting, as used for keyed alternatives.
    pub fn raw(&self) -> &str {
        match self {
            MarkupValue::Str(s) | MarkupValue::Bare(s) | MarkupValue::Expr(s) => s,
        }
    }
}

/// `[select value=... key=alt ...]`, emitted as a keyed switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub value: String,
    /// Case key and rendered alternative.
    pub cases: Vec<(String, String)>,
    /// Keys are integers or enum members rather than hashed strings.
    pub numeric: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluralKind {
    Cardinal,
    Ordinal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PluralCase {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

impl PluralCase {
    pub fn from_param(name: &str) -> Option<Self> {
        Some(match name {
            "zero" => PluralCase::Zero,
            "one" => PluralCase::One,
            "two" => PluralCase::Two,
            "few" => PluralCase::Few,
            "many" => PluralCase::Many,
            "other" => PluralCase::Other,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PluralCase::Zero => "Zero",
            PluralCase::One => "One",
            PluralCase::Two => "Two",
            PluralCase::Few => "Few",
            PluralCase::Many => "Many",
            PluralCase::Other => "Other",
        }
    }
}

/// `[plural ...]` / `[ordinal ...]`, emitted as a switch on the plural
/// category of `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plural {
    pub kind: PluralKind,
    pub value: String,
    /// Alternatives in CLDR category order. `%` stands for the value.
    pub cases: Vec<(PluralCase, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluralPiece<'a> {
    Text(&'a str),
    Value,
}

impl Plural {
    pub fn classifier(&self) -> &'static str {
        match self.kind {
            PluralKind::Cardinal => "GetCardinalPluralCase",
            PluralKind::Ordinal => "GetOrdinalPluralCase",
        }
    }

    /// Split an alternative around its `%` placeholders.
    pub fn pieces(text: &str) -> Vec<PluralPiece<'_>> {
        let mut out = Vec::new();
        let mut rest = text;
        while let Some(pos) = rest.find('%') {
            if pos > 0 {
                out.push(PluralPiece::Text(&rest[..pos]));
            }
            out.push(PluralPiece::Value);
            rest = &rest[pos + 1..];
        }
        if !rest.is_empty() {
            out.push(PluralPiece::Text(rest));
        }
        out
    }
}
