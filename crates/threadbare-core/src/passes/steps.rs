//! Second walk: statements to flat, labelled steps.
//!
//! Control flow is flattened into `If`/`GoTo`/`Label` triples and every
//! suspension point (line, wait, detour, option choice) gets a resume label
//! so the emitter can turn the node into one `switch`.

use indexmap::IndexMap;
use tracing::trace;

use super::definitions::compile_name;
use super::markup::extract_markup;
use crate::context::CompilationContext;
use crate::error::CoreError;
use crate::ir::tag::{is_line_id, line_id};
use crate::ir::{Command, Expression, Label, LineStep, Node, OptionStep, Step, Tag, TagLocation};
use crate::lower::{escape_cpp, lower_number, variable_name, ExprLowerer};
use crate::syntax::{
    Clause, Expr, Guard, JumpTarget, LineCondition, LineStatement, ShortcutOption, SourceFile,
    Statement, TextPart,
};

/// Build the steps of every node declared in `file`.
pub fn build_steps(
    ctx: &mut CompilationContext,
    file: &SourceFile,
    nodes: &mut IndexMap<String, Node>,
) -> Result<(), CoreError> {
    for decl in &file.nodes {
        let name = compile_name(decl, &file.filename);
        let Some(node) = nodes.get_mut(&name) else {
            return Err(CoreError::UnknownNode {
                target: name,
                from: file.filename.clone(),
            });
        };

        let mut builder = StepBuilder { ctx: &mut *ctx, node };
        if builder.node.is_group_member() {
            let mut conditions = Vec::new();
            for guard in decl.guards() {
                if let Guard::Expr(expr) = guard {
                    conditions.push(builder.lower(expr)?);
                }
            }
            if let Some(group) = &mut builder.node.group {
                group.conditions = conditions;
            }
        }
        builder.statements(&decl.body)?;
        trace!(node = %name, steps = builder.node.steps.len(), "built steps");
    }
    Ok(())
}

struct StepBuilder<'c, 'n> {
    ctx: &'c mut CompilationContext,
    node: &'n mut Node,
}

/// Per-item bookkeeping carried from an option list to its bodies.
struct PendingOption<'s> {
    target: Label,
    once: Option<String>,
    line_id: String,
    item: &'s ShortcutOption,
}

impl StepBuilder<'_, '_> {
    fn lower(&self, expr: &Expr) -> Result<String, CoreError> {
        ExprLowerer::new(self.ctx).lower(expr)
    }

    fn statements(&mut self, body: &[Statement]) -> Result<(), CoreError> {
        for stmt in body {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Statement) -> Result<(), CoreError> {
        match stmt {
            Statement::Line(line) => {
                let step = self.line(line)?;
                self.node.push(Step::Line(step));
            }
            Statement::Set {
                variable,
                operator,
                value,
            } => {
                let variable = variable_name(variable);
                if self.ctx.is_smart_variable(variable) {
                    return Err(CoreError::Unsupported(format!(
                        "assignment to smart variable `{variable}`"
                    )));
                }
                let expression = self.lower(value)?;
                self.node.push(Step::Set {
                    variable: variable.to_string(),
                    operation: operator.as_str().to_string(),
                    expression,
                });
            }
            Statement::Command { text, hashtags } => {
                if !hashtags.is_empty() {
                    return Err(CoreError::Unsupported("tags on command".to_string()));
                }
                let command = self.command(text)?;
                self.node.push(Step::Command(command));
            }
            Statement::Call { call } => {
                let text = self.lower(call)?;
                self.node.push(Step::Command(Command::Expression(text)));
            }
            Statement::If { clauses } => self.if_chain(clauses)?,
            Statement::Once {
                condition,
                body,
                alternate,
            } => {
                let key = self.ctx.register_once_block();
                let end = self.node.register_label("");
                let condition = condition.as_ref().map(|c| self.lower(c)).transpose()?;
                self.clause(&end, body, condition, Some(key))?;
                if let Some(alternate) = alternate {
                    self.clause(&end, alternate, None, None)?;
                }
                self.node.push(Step::Label(end));
            }
            Statement::Options { options } => self.options(options, false)?,
            Statement::LineGroup { items } => self.options(items, true)?,
            Statement::Jump { target } => {
                let target = self.jump_target(target)?;
                self.node.push(Step::Jump {
                    target,
                    safe: false,
                });
            }
            Statement::Detour { target } => {
                let target = self.jump_target(target)?;
                let resume = self.node.register_label(&format!("DetourContinue_{target}"));
                self.node.push(Step::Detour { target, resume });
            }
            Statement::Return => self.node.push(Step::FinishNode),
            Statement::Declare { .. } | Statement::Enum { .. } => {}
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lines
    // -----------------------------------------------------------------------

    /// Lower text parts, merging adjacent literal runs.
    fn text(&self, parts: &[TextPart]) -> Result<Vec<Expression>, CoreError> {
        let mut out: Vec<Expression> = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                TextPart::Text(text) => match out.last_mut() {
                    Some(Expression::Text(prev)) => prev.push_str(text),
                    _ => out.push(Expression::Text(text.clone())),
                },
                TextPart::Expr(expr) => out.push(Expression::Calculated(self.lower(expr)?)),
            }
        }
        Ok(out)
    }

    fn tags(&mut self, hashtags: &[String], location: TagLocation) -> Result<Vec<Tag>, CoreError> {
        let tags = hashtags
            .iter()
            .filter(|t| !is_line_id(t))
            .map(|t| Tag::parse(location, t))
            .collect::<Result<Vec<_>, _>>()?;
        self.ctx.record_line_tags(&tags, location == TagLocation::Option);
        Ok(tags)
    }

    fn line_id(&mut self, hashtags: &[String]) -> String {
        match line_id(hashtags) {
            Some(id) => id.to_string(),
            None => self.ctx.next_line_id(),
        }
    }

    fn line(&mut self, line: &LineStatement) -> Result<LineStep, CoreError> {
        let tags = self.tags(&line.hashtags, TagLocation::Line)?;
        let line_id = self.line_id(&line.hashtags);
        let chunks = self.text(&line.text)?;
        let content = extract_markup(self.ctx, chunks, true)?;

        let (condition, once) = match &line.condition {
            None => (None, None),
            Some(LineCondition::If(expr)) => (Some(self.lower(expr)?), None),
            Some(LineCondition::Once(expr)) => {
                let key = self.node.next_once_key();
                self.ctx.register_once_key(&key);
                let condition = expr.as_ref().map(|e| self.lower(e)).transpose()?;
                (condition, Some(key))
            }
        };
        let resume = self.node.register_label("");
        Ok(LineStep {
            line_id,
            content,
            tags,
            condition,
            once,
            resume,
        })
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn command(&mut self, text: &[TextPart]) -> Result<Command, CoreError> {
        let node = self.node.name.clone();
        let malformed = |message: &str| CoreError::MalformedCommand {
            node: node.clone(),
            message: message.to_string(),
        };

        let mut tokens: Vec<CommandToken> = Vec::new();
        for part in text {
            match part {
                TextPart::Text(text) => {
                    tokens.extend(command_words(text).into_iter().map(CommandToken::Word))
                }
                TextPart::Expr(expr) => tokens.push(CommandToken::Expr(self.lower(expr)?)),
            }
        }
        let mut tokens = tokens.into_iter();
        let name = match tokens.next() {
            Some(CommandToken::Word(name)) => name,
            Some(CommandToken::Expr(_)) => return Err(malformed("command name must be literal text")),
            None => return Err(malformed("empty command")),
        };
        let fixed = &self.ctx.config.fixed_point;
        let args = tokens
            .map(|t| t.render(fixed))
            .collect::<Result<Vec<String>, CoreError>>()?;

        match name.as_str() {
            "stop" => Ok(Command::Stop),
            "wait" => {
                let [duration] = <[String; 1]>::try_from(args)
                    .map_err(|_| malformed("`wait` takes exactly one duration"))?;
                let resume = self.node.register_label("waitContinue");
                Ok(Command::Wait { duration, resume })
            }
            _ => Ok(Command::Call { name, args }),
        }
    }

    // -----------------------------------------------------------------------
    // Control flow
    // -----------------------------------------------------------------------

    fn if_chain(&mut self, clauses: &[Clause]) -> Result<(), CoreError> {
        let end = self.node.register_label("");
        for clause in clauses {
            let condition = clause.condition.as_ref().map(|c| self.lower(c)).transpose()?;
            self.clause(&end, &clause.body, condition, None)?;
        }
        self.node.push(Step::Label(end));
        Ok(())
    }

    /// One guarded body ending in a jump to `end`. A clause with neither a
    /// condition nor a once key always runs and gets no skip label.
    fn clause(
        &mut self,
        end: &Label,
        body: &[Statement],
        condition: Option<String>,
        once: Option<String>,
    ) -> Result<(), CoreError> {
        let runner = &self.ctx.config.runner;
        let test = match (&once, condition) {
            (None, None) => None,
            (None, Some(cond)) => Some(cond),
            (Some(key), None) => Some(format!("!{runner}.Once(OnceKey::{key})")),
            (Some(key), Some(cond)) => Some(format!("!{runner}.Once(OnceKey::{key}) && {cond}")),
        };
        let skip = match test {
            Some(condition) => {
                let skip = self.node.register_label("skipclause");
                self.node.push(Step::If {
                    condition,
                    skip: skip.clone(),
                });
                Some(skip)
            }
            None => None,
        };
        if let Some(key) = once {
            self.node.push(Step::OnceIsSeen { key });
        }
        self.statements(body)?;
        self.node.push(Step::GoTo {
            target: end.clone(),
        });
        if let Some(skip) = skip {
            self.node.push(Step::Label(skip));
        }
        Ok(())
    }

    fn options(&mut self, items: &[ShortcutOption], line_group: bool) -> Result<(), CoreError> {
        let end = self.node.register_label("group_end");
        self.node.push(Step::StartOptions);

        let mut pending = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let hint = format!("shortcutoption_{}_{}", self.node.name, index + 1);
            let target = self.node.register_label(&hint);

            let mut conditions = Vec::new();
            let mut once = None;
            let mut complexity = 0;
            match &item.line.condition {
                None => {}
                Some(LineCondition::If(expr)) => {
                    conditions.push(self.lower(expr)?);
                    complexity += 1 + expr.boolean_connectives();
                }
                Some(LineCondition::Once(expr)) => {
                    once = Some(self.ctx.register_once_block());
                    complexity += 1;
                    if let Some(expr) = expr {
                        conditions.push(self.lower(expr)?);
                        complexity += 1 + expr.boolean_connectives();
                    }
                }
            }

            let line_id = self.line_id(&item.line.hashtags);
            let (tags, content) = if line_group {
                (Vec::new(), Vec::new())
            } else {
                let tags = self.tags(&item.line.hashtags, TagLocation::Option)?;
                let chunks = self.text(&item.line.text)?;
                (tags, extract_markup(self.ctx, chunks, false)?)
            };

            self.node.push(Step::Option(OptionStep {
                index,
                line_id: line_id.clone(),
                target: target.clone(),
                content,
                tags,
                conditions,
                once: once.clone(),
                complexity,
                line_group,
            }));
            pending.push(PendingOption {
                target,
                once,
                line_id,
                item,
            });
        }
        self.ctx.record_option_count(items.len());

        if line_group {
            self.node.push(Step::SendLineGroup {
                fallback: end.clone(),
            });
        } else {
            self.node.push(Step::SendOptions);
        }

        for option in pending {
            self.node.push(Step::Label(option.target));
            if let Some(key) = option.once {
                self.node.push(Step::OnceIsSeen { key });
            }
            if line_group {
                let line = &option.item.line;
                let tags = self.tags(&line.hashtags, TagLocation::Line)?;
                let chunks = self.text(&line.text)?;
                let content = extract_markup(self.ctx, chunks, true)?;
                let resume = self.node.register_label("");
                self.node.push(Step::Line(LineStep {
                    line_id: option.line_id,
                    content,
                    tags,
                    condition: None,
                    once: None,
                    resume,
                }));
            }
            self.statements(&option.item.body)?;
            self.node.push(Step::GoTo {
                target: end.clone(),
            });
        }
        self.node.push(Step::Label(end));
        Ok(())
    }

    fn jump_target(&self, target: &JumpTarget) -> Result<String, CoreError> {
        match target {
            JumpTarget::Node(name) if self.ctx.node_names.contains(name) => Ok(name.clone()),
            JumpTarget::Node(name) => Err(CoreError::UnknownNode {
                target: name.clone(),
                from: self.node.name.clone(),
            }),
            JumpTarget::Expr(_) => Err(CoreError::Unsupported(
                "jump or detour to a computed node name".to_string(),
            )),
        }
    }
}

enum CommandToken {
    Word(String),
    Expr(String),
}

impl CommandToken {
    /// Command arguments pass numbers, booleans, enum members and quoted
    /// text through; other words become string literals.
    fn render(self, fixed_point: &str) -> Result<String, CoreError> {
        match self {
            CommandToken::Expr(text) => Ok(text),
            CommandToken::Word(word) => {
                let numeric = word.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.');
                if let Some(value) = word.parse::<f64>().ok().filter(|_| numeric) {
                    lower_number(value, fixed_point)
                } else if word == "true"
                    || word == "false"
                    || word.contains("::")
                    || (word.len() >= 2 && word.starts_with('"') && word.ends_with('"'))
                {
                    Ok(word)
                } else {
                    Ok(format!("\"{}\"", escape_cpp(&word)))
                }
            }
        }
    }
}

/// Split command text on whitespace. A double-quoted run is one word,
/// quotes included, and a backslash inside it escapes the next character.
fn command_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if quoted => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
