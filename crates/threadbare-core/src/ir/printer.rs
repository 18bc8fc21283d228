use std::fmt;

use super::expr::{Expression, MarkupValue};
use super::node::Node;
use super::step::{Command, OptionStep, Step};
use super::tag::Tag;

fn fmt_content(content: &[Expression], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, expr) in content.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        match expr {
            Expression::Text(t) => write!(f, "{t:?}")?,
            Expression::Calculated(c) => write!(f, "{{{c}}}")?,
            Expression::Markup(m) => {
                write!(f, "[{}{}", if m.is_start { "" } else { "/" }, m.name)?;
                for p in &m.params {
                    match &p.value {
                        MarkupValue::Expr(e) => write!(f, " {}={{{e}}}", p.name)?,
                        other => write!(f, " {}={}", p.name, other.render())?,
                    }
                }
                write!(f, "]")?;
            }
            Expression::Select(s) => {
                write!(f, "select({})<", s.value)?;
                for (i, (key, value)) in s.cases.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, ">")?;
            }
            Expression::Plural(p) => {
                write!(f, "{}({})<", p.classifier(), p.value)?;
                for (i, (case, text)) in p.cases.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {text:?}", case.as_str())?;
                }
                write!(f, ">")?;
            }
        }
    }
    Ok(())
}

fn fmt_tags(tags: &[Tag], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for tag in tags {
        write!(f, " #{}", tag.name)?;
        if !tag.params.is_empty() {
            write!(f, ":{}", tag.params.join(","))?;
        }
    }
    Ok(())
}

fn fmt_option(opt: &OptionStep, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = if opt.line_group { "group-item" } else { "option" };
    write!(f, "    {kind} {} -> {} ", opt.index, opt.target)?;
    fmt_content(&opt.content, f)?;
    fmt_tags(&opt.tags, f)?;
    if !opt.conditions.is_empty() {
        write!(f, " if ({})", opt.conditions.join(") && ("))?;
    }
    if let Some(key) = &opt.once {
        write!(f, " once({key})")?;
    }
    writeln!(f, " complexity={}", opt.complexity)
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Line(line) => {
                write!(f, "    line {} ", line.line_id)?;
                fmt_content(&line.content, f)?;
                fmt_tags(&line.tags, f)?;
                if let Some(cond) = &line.condition {
                    write!(f, " if ({cond})")?;
                }
                if let Some(key) = &line.once {
                    write!(f, " once({key})")?;
                }
                writeln!(f, " => {}", line.resume)
            }
            Step::Command(cmd) => match cmd {
                Command::Stop => writeln!(f, "    stop"),
                Command::Wait { duration, resume } => {
                    writeln!(f, "    wait {duration} => {resume}")
                }
                Command::Call { name, args } => writeln!(f, "    command {name}({})", args.join(", ")),
                Command::Expression(e) => writeln!(f, "    call {e}"),
            },
            Step::Set {
                variable,
                operation,
                expression,
            } => writeln!(f, "    set {variable} {operation} {expression}"),
            Step::If { condition, skip } => writeln!(f, "    if !({condition}) goto {skip}"),
            Step::GoTo { target } => writeln!(f, "    goto {target}"),
            Step::Label(label) => writeln!(f, "  {label}:"),
            Step::Jump { target, safe } => {
                writeln!(f, "    {} {target}", if *safe { "safe-jump" } else { "jump" })
            }
            Step::Detour { target, resume } => writeln!(f, "    detour {target} => {resume}"),
            Step::Option(opt) => fmt_option(opt, f),
            Step::StartOptions => writeln!(f, "    start-options"),
            Step::SendOptions => writeln!(f, "    send-options"),
            Step::SendLineGroup { fallback } => writeln!(f, "    send-line-group else {fallback}"),
            Step::OnceIsSeen { key } => writeln!(f, "    once-seen {key}"),
            Step::FinishNode => writeln!(f, "    finish"),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.name)?;
        if self.name != self.title {
            write!(f, " (group {})", self.title)?;
        }
        write!(f, " [{}@{}]", self.filename, self.offset)?;
        fmt_tags(&self.tags, f)?;
        writeln!(f)?;
        if let Some(group) = &self.group {
            write!(f, "  when")?;
            if group.once {
                write!(f, " once")?;
            }
            for cond in &group.conditions {
                write!(f, " ({cond})")?;
            }
            writeln!(f, " complexity={}", group.complexity)?;
        }
        writeln!(f, "  nodestart:")?;
        for step in &self.steps {
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_labels_and_steps() {
        let mut node = Node::new("Start", "Start", "a.yarn", 0);
        let end = node.register_label("");
        node.push(Step::If {
            condition: "runner.variables.a".into(),
            skip: end.clone(),
        });
        node.push(Step::Jump {
            target: "Other".into(),
            safe: false,
        });
        node.push(Step::Label(end));
        let text = node.to_string();
        assert!(text.starts_with("node Start [a.yarn@0]"));
        assert!(text.contains("    if !(runner.variables.a) goto L1\n"));
        assert!(text.contains("    jump Other\n"));
        assert!(text.contains("  L1:\n"));
    }
}
