//! Inline markup scanner.
//!
//! Runs over the chunks of one line or option after embedded expressions
//! have been lowered, turning `[name param=value]` / `[/name]` / `[/]`
//! annotations into [`Markup`] markers. `select`, `plural` and `ordinal`
//! markups are then rewritten into branching expressions, and lines get
//! their implicit `character` markup.

use crate::context::CompilationContext;
use crate::error::CoreError;
use crate::ir::{
    Expression, Markup, MarkupParam, MarkupValue, Plural, PluralCase, PluralKind, Select,
};

const NOMARKUP_CLOSE: &str = "[/nomarkup]";

/// Markups rewritten after the scan rather than emitted as attributes.
const REWRITTEN: [&str; 3] = ["select", "plural", "ordinal"];

/// Scan `chunks` for markup and rewrite them, updating the markup registry
/// and maxima in `ctx`.
pub fn extract_markup(
    ctx: &mut CompilationContext,
    chunks: Vec<Expression>,
    is_line: bool,
) -> Result<Vec<Expression>, CoreError> {
    let mut scanner = MarkupScanner::new(ctx);
    for chunk in chunks {
        match chunk {
            Expression::Text(text) => scanner.scan_text(&text)?,
            Expression::Calculated(text) => scanner.push_calculated(text)?,
            other => {
                return Err(CoreError::Markup(format!(
                    "unexpected expression in scanner input: {other:?}"
                )))
            }
        }
    }
    let mut result = scanner.finish()?;

    rewrite_branching(&mut result)?;

    let mut markups = 0;
    let mut params = 0;
    for expr in &result {
        if let Expression::Markup(m) = expr {
            markups += 1;
            params += m.params.len();
        }
    }
    if is_line && split_character(&mut result) {
        markups += 2;
        ctx.markup_names.insert("character".to_string());
    }
    ctx.record_markup(markups, params);
    Ok(result)
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// A markup whose opening tag is still being read.
struct OpenTag {
    name: String,
    params: Vec<MarkupParam>,
    /// Parameter whose value is the next embedded expression.
    awaiting: Option<String>,
}

struct MarkupScanner<'c> {
    ctx: &'c mut CompilationContext,
    result: Vec<Expression>,
    /// Names of markups opened and not yet closed, in open order.
    active: Vec<String>,
    current: Option<OpenTag>,
    verbatim: bool,
    /// Strip one whitespace character after the current tag ends. Reset
    /// for every text chunk and combined with `trimwhitespace=` by AND.
    trim: bool,
}

impl<'c> MarkupScanner<'c> {
    fn new(ctx: &'c mut CompilationContext) -> Self {
        Self {
            ctx,
            result: Vec::new(),
            active: Vec::new(),
            current: None,
            verbatim: false,
            trim: false,
        }
    }

    fn push_calculated(&mut self, text: String) -> Result<(), CoreError> {
        match &mut self.current {
            Some(tag) => {
                let name = tag.awaiting.take().ok_or_else(|| {
                    CoreError::Markup(format!(
                        "expression inside [{}] without a parameter name",
                        tag.name
                    ))
                })?;
                tag.params.push(MarkupParam {
                    name,
                    value: MarkupValue::Expr(text),
                });
            }
            None => self.result.push(Expression::Calculated(text)),
        }
        Ok(())
    }

    fn scan_text(&mut self, text: &str) -> Result<(), CoreError> {
        self.trim = false;
        let mut rest = text;
        while !rest.is_empty() {
            if self.verbatim {
                rest = self.scan_verbatim(rest);
            } else if self.current.is_some() {
                rest = self.scan_inside_tag(rest)?;
            } else {
                rest = self.scan_outside_tag(rest)?;
            }
        }
        Ok(())
    }

    fn scan_verbatim<'t>(&mut self, rest: &'t str) -> &'t str {
        match rest.find(NOMARKUP_CLOSE) {
            Some(pos) => {
                self.push_text(&rest[..pos]);
                self.verbatim = false;
                &rest[pos + NOMARKUP_CLOSE.len()..]
            }
            None => {
                self.push_text(rest);
                ""
            }
        }
    }

    fn scan_outside_tag<'t>(&mut self, rest: &'t str) -> Result<&'t str, CoreError> {
        let Some(idx) = find_unescaped_bracket(rest) else {
            self.push_text(rest);
            return Ok("");
        };
        if idx == 0 || rest[..idx].ends_with(char::is_whitespace) {
            self.trim = true;
        }
        self.push_text(&rest[..idx]);
        let after = &rest[idx + 1..];

        if let Some(closing) = after.strip_prefix('/') {
            let name_len = word_len(closing);
            let name = &closing[..name_len];
            let Some(tail) = closing[name_len..].strip_prefix(']') else {
                return Err(CoreError::Markup(format!("unterminated closing tag [/{name}")));
            };
            if name.is_empty() {
                while let Some(open) = self.active.pop() {
                    self.result.push(Expression::Markup(Markup::end(&open)));
                }
            } else {
                if let Some(pos) = self.active.iter().rposition(|a| a == name) {
                    self.active.remove(pos);
                }
                if !REWRITTEN.contains(&name) {
                    self.ctx.markup_names.insert(name.to_string());
                }
                self.result.push(Expression::Markup(Markup::end(name)));
            }
            return Ok(tail);
        }

        let name_len = word_len(after);
        if name_len == 0 {
            // A bracket that does not start a tag is plain text.
            self.push_text("[");
            return Ok(after);
        }
        let name = &after[..name_len];
        self.current = Some(OpenTag {
            name: name.to_string(),
            params: Vec::new(),
            awaiting: None,
        });
        // `[name=value]` keeps the name so it is read back as a parameter.
        if after[name_len..].starts_with('=') {
            Ok(after)
        } else {
            Ok(&after[name_len..])
        }
    }

    fn scan_inside_tag<'t>(&mut self, rest: &'t str) -> Result<&'t str, CoreError> {
        let rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(rest);
        }
        let self_closing = rest.starts_with("/]");
        if self_closing || rest.starts_with(']') {
            let tail = &rest[if self_closing { 2 } else { 1 }..];
            self.close_tag(self_closing);
            if self.trim {
                if let Some(ch) = tail.chars().next().filter(|c| c.is_whitespace()) {
                    return Ok(&tail[ch.len_utf8()..]);
                }
            }
            return Ok(tail);
        }

        let name_len = rest
            .find(|c: char| c == ']' || c == '|' || c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        if name_len == 0 {
            let skip = rest.chars().next().map_or(1, char::len_utf8);
            return Ok(&rest[skip..]);
        }
        let name = rest[..name_len].to_string();
        let rest = &rest[name_len..];

        let Some(value_text) = rest.strip_prefix('=') else {
            self.add_param(name, MarkupValue::Bare("true".to_string()));
            return Ok(rest);
        };
        if value_text.is_empty() {
            if let Some(tag) = &mut self.current {
                tag.awaiting = Some(name);
            }
            return Ok(value_text);
        }
        let (value, tail) = read_value(value_text);
        self.add_param(name, value);
        Ok(tail)
    }

    fn add_param(&mut self, name: String, value: MarkupValue) {
        if name == "trimwhitespace" {
            self.trim &= value.raw() != "false";
            return;
        }
        if let Some(tag) = &mut self.current {
            tag.params.push(MarkupParam { name, value });
        }
    }

    fn close_tag(&mut self, self_closing: bool) {
        let Some(tag) = self.current.take() else {
            return;
        };
        if tag.name == "nomarkup" {
            self.verbatim = true;
            return;
        }
        if !REWRITTEN.contains(&tag.name.as_str()) {
            self.ctx.markup_names.insert(tag.name.clone());
        }
        if !self_closing {
            self.active.push(tag.name.clone());
        }
        self.result.push(Expression::Markup(Markup {
            name: tag.name,
            is_start: true,
            params: tag.params,
        }));
    }

    fn push_text(&mut self, text: &str) {
        let text = unescape(text);
        if !text.is_empty() {
            self.result.push(Expression::Text(text));
        }
    }

    fn finish(self) -> Result<Vec<Expression>, CoreError> {
        if let Some(tag) = self.current {
            return Err(CoreError::Markup(format!("unterminated markup [{}", tag.name)));
        }
        Ok(self.result)
    }
}

/// Byte index of the first `[` not preceded by an escaping backslash.
fn find_unescaped_bracket(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'[' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn word_len(text: &str) -> usize {
    text.find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(text.len())
}

/// Read a parameter value: a quoted string with backslash escapes kept
/// intact, or a bare token ending at whitespace or the tag end.
fn read_value(text: &str) -> (MarkupValue, &str) {
    if let Some(quoted) = text.strip_prefix('"') {
        let bytes = quoted.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'"' => {
                    return (MarkupValue::Str(quoted[..i].to_string()), &quoted[i + 1..]);
                }
                _ => i += 1,
            }
        }
        let end = i.min(quoted.len());
        return (MarkupValue::Str(quoted[..end].to_string()), &quoted[end..]);
    }
    let mut end = text.len();
    for (i, c) in text.char_indices() {
        if c.is_whitespace() || c == ']' || text[i..].starts_with("/]") {
            end = i;
            break;
        }
    }
    (MarkupValue::Bare(text[..end].to_string()), &text[end..])
}

/// Resolve `\[`, `\]` and `\\`.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '[' | ']' | '\\') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

// ---------------------------------------------------------------------------
// Post-scan rewrites
// ---------------------------------------------------------------------------

fn rewrite_branching(result: &mut [Expression]) -> Result<(), CoreError> {
    for expr in result.iter_mut() {
        let Expression::Markup(markup) = expr else {
            continue;
        };
        if !markup.is_start {
            continue;
        }
        let rewritten = match markup.name.as_str() {
            "select" => Expression::Select(build_select(markup)?),
            "plural" => Expression::Plural(build_plural(markup, PluralKind::Cardinal)?),
            "ordinal" => Expression::Plural(build_plural(markup, PluralKind::Ordinal)?),
            _ => continue,
        };
        *expr = rewritten;
    }
    Ok(())
}

/// Split off the `value` parameter, returning the value text and the
/// remaining parameters.
fn take_value(markup: &Markup) -> Result<(String, Vec<&MarkupParam>), CoreError> {
    let value = markup
        .param("value")
        .ok_or_else(|| CoreError::Markup(format!("[{}] requires a value parameter", markup.name)))?;
    let value = value.raw().trim_matches(|c| c == '{' || c == '}').to_string();
    let rest = markup.params.iter().filter(|p| p.name != "value").collect();
    Ok((value, rest))
}

fn build_select(markup: &Markup) -> Result<Select, CoreError> {
    let (value, params) = take_value(markup)?;
    let numeric = !params.is_empty()
        && params
            .iter()
            .all(|p| p.name.parse::<i64>().is_ok() || p.name.contains("::"));
    let cases = params
        .iter()
        .map(|p| {
            let key = if p.name.contains("::") {
                format!("(int){}", p.name)
            } else {
                p.name.clone()
            };
            (key, p.value.render())
        })
        .collect();
    Ok(Select {
        value,
        cases,
        numeric,
    })
}

fn build_plural(markup: &Markup, kind: PluralKind) -> Result<Plural, CoreError> {
    let (value, params) = take_value(markup)?;
    let mut cases: Vec<(PluralCase, String)> = params
        .iter()
        .filter_map(|p| {
            let case = PluralCase::from_param(&p.name)?;
            let text = p.value.raw();
            (!text.is_empty()).then(|| (case, text.to_string()))
        })
        .collect();
    cases.sort_by_key(|(case, _)| *case);
    Ok(Plural { kind, value, cases })
}

/// Give a line its implicit `character` markup from a leading `name:`.
/// Returns true when markers were inserted.
///
/// The split happens at the first text chunk holding a `:`, wherever it
/// sits, so every chunk before it (interpolations included) becomes the
/// speaker.
fn split_character(result: &mut Vec<Expression>) -> bool {
    let has_character = result
        .iter()
        .any(|e| matches!(e, Expression::Markup(m) if m.name == "character"));
    if has_character {
        return false;
    }
    if let Some(Expression::Text(first)) = result.first_mut() {
        if let Some(stripped) = first.strip_prefix("\\:") {
            *first = format!(":{stripped}");
            return false;
        }
        if let Some(stripped) = first.strip_prefix(':') {
            *first = stripped.to_string();
            return false;
        }
    }

    let Some(i) = result
        .iter()
        .position(|e| matches!(e, Expression::Text(t) if t.contains(':')))
    else {
        return false;
    };
    let Expression::Text(text) = result.remove(i) else {
        return false;
    };
    let (speaker, line) = text.split_once(':').unwrap_or((text.as_str(), ""));
    let (speaker, line) = (speaker.trim(), line.trim());

    let mut inserted = Vec::with_capacity(3);
    if !speaker.is_empty() {
        inserted.push(Expression::text(speaker));
    }
    inserted.push(Expression::Markup(Markup::end("character")));
    if !line.is_empty() {
        inserted.push(Expression::text(line));
    }
    result.splice(i..i, inserted);
    result.insert(0, Expression::Markup(Markup::start("character")));
    true
}
