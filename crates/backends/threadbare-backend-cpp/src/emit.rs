//! Node functions and per-file `.cpp` sources.
//!
//! Each node becomes one `void Name(TBScriptRunner&, NodeState&)` whose body
//! is a `switch` on `nodeState.nextStep`. Suspending steps end their case
//! with `return` and open the next one at their resume label.

use std::fmt::Write;

use threadbare_core::context::CompilationContext;
use threadbare_core::ir::{
    Command, Expression, LineStep, Node, OptionStep, Plural, PluralPiece, Select, Step, Tag,
};
use threadbare_core::lower::escape_cpp;
use threadbare_core::pipeline::CompiledProgram;

/// Render the `.cpp` for one source file: its nodes, then any group
/// wrapper whose first member lives there.
pub fn emit_source_file(program: &CompiledProgram, filename: &str) -> String {
    let ctx = &program.context;
    let mut out = String::new();
    if let Some(include) = &ctx.config.include {
        let _ = writeln!(out, "#include \"{include}\"");
    }
    out.push_str("#include \"threadbare.h\"\n");
    out.push_str("#include <bn_math.h>\n");
    out.push_str("#include <bn_fixed.h>\n");
    let _ = writeln!(out, "namespace {} {{", ctx.config.namespace);
    for node in program.nodes_in(filename) {
        emit_node(ctx, node, &mut out);
    }
    out.push_str("}\n");
    out
}

/// Emit one node function.
pub fn emit_node(ctx: &CompilationContext, node: &Node, out: &mut String) {
    let _ = writeln!(out, "\tvoid {}(TBScriptRunner& runner, NodeState& nodeState)\n\t{{", node.name);
    if node.has_lines() {
        out.push_str("\t\tauto& currentLine = runner.currentLine;\n");
        if node.has_line_markup() {
            out.push_str("\t\tauto& markup = currentLine.markup;\n");
        }
    }

    out.push_str("\t\tenum NodeLabel { nodestart = 0");
    for label in node.labels() {
        let _ = write!(out, ", {label}");
    }
    out.push_str("};\n");

    out.push_str("\t\tswitch (nodeState.nextStep)\n");
    out.push_str("\t\t{\n");
    out.push_str("\t\tcase nodestart:\n");
    if node.visited {
        let _ = writeln!(out, "\t\t\trunner.SetVisitedState(VisitedNodeName::{});", node.name);
    }
    if node.visit_counted {
        let _ = writeln!(
            out,
            "\t\t\trunner.IncrementVisitCount(VisitCountedNodeName::{});",
            node.name
        );
    }
    if !node.tags.is_empty() {
        out.push_str("\t\t\t// Node Tags:\n");
        emit_tags(out, "\t\t\t", &node.tags, "NodeTag", "nodeState.tags", "nodeState.tagParams");
        out.push('\n');
    }

    for step in &node.steps {
        emit_step(ctx, step, out);
    }

    out.push_str("\t\t\trunner.EndNode();\n");
    out.push_str("\t\t\treturn;\n");
    out.push_str("\t\tdefault:\n");
    let _ = writeln!(
        out,
        "\t\t\tBN_ASSERT(false, \"invalid node step: \", nodeState.nextStep, \" in node {}\");",
        node.name
    );
    out.push_str("\t\t\tbreak;\n");
    out.push_str("\t\t}\n");
    out.push_str("\t}\n\n");
}

fn emit_step(ctx: &CompilationContext, step: &Step, out: &mut String) {
    match step {
        Step::Line(line) => emit_line(line, out),
        Step::Option(option) => emit_option(option, out),
        Step::Command(command) => emit_command(ctx, command, out),
        Step::Set {
            variable,
            operation,
            expression,
        } => {
            let _ = writeln!(
                out,
                "\t\t\t{}.{variable} {operation} {expression};\n",
                ctx.config.variables_path
            );
        }
        Step::If { condition, skip } => {
            let _ = writeln!(
                out,
                "\t\t\tif(!({condition})){{\n\t\t\t\trunner.ReturnAndGoto({skip});\n\t\t\t\treturn; }}"
            );
        }
        Step::GoTo { target } => {
            let _ = writeln!(out, "\t\t\trunner.ReturnAndGoto({target}); return;");
        }
        Step::Label(label) => {
            let _ = writeln!(out, "\t\tcase {label}:");
        }
        Step::Jump { target, safe } => {
            let call = if *safe { "SafeJump" } else { "Jump" };
            let _ = writeln!(out, "\t\t\trunner.{call}(&{target});");
            out.push_str("\t\t\treturn;\n");
        }
        Step::Detour { target, resume } => {
            let _ = writeln!(out, "\t\t\tnodeState.nextStep = {resume};");
            let _ = writeln!(out, "\t\t\trunner.Detour(&{target});");
            out.push_str("\t\t\treturn;\n");
            let _ = writeln!(out, "\t\tcase {resume}:\n");
        }
        Step::StartOptions => out.push_str("\n\t\t\trunner.options.clear();\n"),
        Step::SendOptions => out.push_str("\t\t\trunner.state = Options;\n\t\t\treturn;\n\n"),
        Step::SendLineGroup { fallback } => {
            let _ = writeln!(out, "\t\t\trunner.SetNoValidOption({fallback});");
            out.push_str("\t\t\trunner.state = LineGroup;\n\t\t\treturn;\n\n");
        }
        Step::OnceIsSeen { key } => {
            let _ = writeln!(out, "\t\t\trunner.SetOnce(OnceKey::{key});");
        }
        Step::FinishNode => out.push_str("\t\t\trunner.EndNode();\n\t\t\treturn;\n\n"),
    }
}

fn emit_command(ctx: &CompilationContext, command: &Command, out: &mut String) {
    match command {
        Command::Stop => out.push_str("\t\t\trunner.Stop();\n\t\t\treturn;\n"),
        Command::Wait { duration, resume } => {
            let _ = writeln!(out, "\t\t\trunner.StartTimer({duration}, {resume});");
            out.push_str("\t\t\treturn;\n");
            let _ = writeln!(out, "\t\tcase {resume}:\n");
        }
        Command::Call { name, args } => {
            let _ = writeln!(
                out,
                "\t\t\t{}.{name}({});\n",
                ctx.config.functions_path,
                args.join(", ")
            );
        }
        Command::Expression(text) => {
            let _ = writeln!(out, "\t\t\t{text};\n");
        }
    }
}

// ---------------------------------------------------------------------------
// Lines and options
// ---------------------------------------------------------------------------

/// Where content chunks are streamed to.
struct Sink {
    indent: &'static str,
    buffer: &'static str,
    markup: &'static str,
}

const LINE: Sink = Sink {
    indent: "\t\t\t",
    buffer: "currentLine",
    markup: "markup",
};

const OPTION: Sink = Sink {
    indent: "\t\t\t\t",
    buffer: "currentOption",
    markup: "optionMarkup",
};

fn emit_line(line: &LineStep, out: &mut String) {
    let _ = writeln!(out, "\t\t\t// {}", line.line_id);
    out.push_str("\t\t\tcurrentLine.StartNewLine();\n");
    emit_content(&LINE, &line.content, out);
    emit_tags(
        out,
        LINE.indent,
        &line.tags,
        "LineTag",
        "currentLine.markup.tags",
        "currentLine.markup.tagParams",
    );

    let mut conditions = Vec::new();
    if let Some(key) = &line.once {
        conditions.push(format!("!runner.Once(OnceKey::{key})"));
    }
    if let Some(condition) = &line.condition {
        conditions.push(condition.clone());
    }
    if !conditions.is_empty() {
        let _ = writeln!(out, "\t\t\tcurrentLine.condition = ({});", conditions.join(" && "));
    }
    if let Some(key) = &line.once {
        let _ = writeln!(
            out,
            "\t\t\tif(currentLine.condition) {{ runner.SetOnce(OnceKey::{key}); }}"
        );
    }
    let _ = writeln!(out, "\t\t\trunner.FinishLine({});", line.resume);
    out.push_str("\t\t\treturn;\n");
    let _ = writeln!(out, "\t\tcase {}:\n", line.resume);
}

fn emit_option(option: &OptionStep, out: &mut String) {
    let _ = writeln!(out, "\t\t\t// {}", option.line_id);
    out.push_str("\t\t\t{\n");
    let _ = writeln!(
        out,
        "\t\t\t\tauto currentOption = Option<OPTION_BUFFER_SIZE>({});",
        option.target
    );

    let count = option.condition_count();
    if count > 0 {
        out.push_str("\t\t\t\tauto trueConditionCount = 0;\n");
        for condition in &option.conditions {
            let _ = writeln!(out, "\t\t\t\tif({condition}){{trueConditionCount++;}}");
        }
        if let Some(key) = &option.once {
            let _ = writeln!(
                out,
                "\t\t\t\tif(!runner.Once(OnceKey::{key})){{trueConditionCount++;}}"
            );
        }
        let _ = writeln!(out, "\t\t\t\tcurrentOption.condition = trueConditionCount == {count};");
        out.push_str("\t\t\t\tcurrentOption.trueConditionCount = trueConditionCount;\n");
        let _ = writeln!(out, "\t\t\t\tcurrentOption.conditionCount = {count};");
        let _ = writeln!(out, "\t\t\t\tcurrentOption.complexity = {};", option.complexity);
    }

    if option.has_markup() {
        out.push_str("\t\t\t\tauto& optionMarkup = currentOption.markup;\n");
    }
    emit_content(&OPTION, &option.content, out);
    emit_tags(
        out,
        OPTION.indent,
        &option.tags,
        "LineTag",
        "optionMarkup.tags",
        "optionMarkup.tagParams",
    );
    out.push_str("\t\t\t\trunner.options.push_back(currentOption);\n");
    out.push_str("\t\t\t}\n\n");
}

fn emit_content(sink: &Sink, content: &[Expression], out: &mut String) {
    let Sink {
        indent,
        buffer,
        markup,
    } = sink;
    for expr in content {
        match expr {
            Expression::Text(text) => {
                let _ = writeln!(out, "{indent}{buffer} << \"{}\";", escape_cpp(text));
            }
            Expression::Calculated(text) => {
                let _ = writeln!(out, "{indent}{buffer} << {text};");
            }
            Expression::Markup(m) => {
                let close = if m.is_start { "" } else { "_" };
                let _ = writeln!(out, "{indent}{markup}.attributes.emplace_back(Attribute::{close}{});", m.name);
                let _ = writeln!(
                    out,
                    "{indent}{markup}.attributePositions.emplace_back({buffer}.length());"
                );
                for param in &m.params {
                    let _ = writeln!(
                        out,
                        "{indent}{markup}.attributeParams.emplace_back({}); // {}",
                        param.value.render(),
                        param.name
                    );
                }
            }
            Expression::Select(select) => emit_select(sink, select, out),
            Expression::Plural(plural) => emit_plural(sink, plural, out),
        }
    }
}

fn emit_select(sink: &Sink, select: &Select, out: &mut String) {
    let indent = sink.indent;
    if select.numeric {
        let _ = writeln!(out, "{indent}switch({}) {{", select.value);
    } else {
        let _ = writeln!(out, "{indent}switch(bn::make_hash({})) {{", select.value);
    }
    for (key, value) in &select.cases {
        let key = if select.numeric {
            key.clone()
        } else {
            format!("\"{key}\"_h")
        };
        let _ = writeln!(out, "{indent}\tcase {key}: {} << {value}; break;", sink.buffer);
    }
    let _ = writeln!(out, "{indent}\tdefault: break;");
    let _ = writeln!(out, "{indent}}}");
}

fn emit_plural(sink: &Sink, plural: &Plural, out: &mut String) {
    let indent = sink.indent;
    let _ = writeln!(out, "{indent}switch({}({})) {{", plural.classifier(), plural.value);
    for (case, text) in &plural.cases {
        let _ = writeln!(out, "{indent}\tcase PluralCase::{}: ", case.as_str());
        for piece in Plural::pieces(text) {
            match piece {
                PluralPiece::Value => {
                    let _ = writeln!(out, "{indent}\t\t{} << {};", sink.buffer, plural.value);
                }
                PluralPiece::Text(t) => {
                    let _ = writeln!(out, "{indent}\t\t{} << \"{t}\";", sink.buffer);
                }
            }
        }
        let _ = writeln!(out, "{indent}\t\tbreak;");
    }
    let _ = writeln!(out, "{indent}\tdefault: break;");
    let _ = writeln!(out, "{indent}}}");
}

/// Push tag ordinals, then the flattened parameters when any tag has some.
fn emit_tags(out: &mut String, indent: &str, tags: &[Tag], kind: &str, names: &str, params: &str) {
    if tags.is_empty() {
        return;
    }
    let joined: Vec<String> = tags.iter().map(|t| format!("{kind}::{}", t.name)).collect();
    let _ = writeln!(
        out,
        "{indent}for({kind} p : {{{}}}) {{ {names}.emplace_back(p);}}",
        joined.join(", ")
    );
    let tag_params: Vec<&str> = tags
        .iter()
        .flat_map(|t| t.params.iter().map(String::as_str))
        .collect();
    if !tag_params.is_empty() {
        let _ = writeln!(
            out,
            "{indent}for(int p : {{{}}}) {{ {params}.emplace_back(p);}}",
            tag_params.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadbare_core::ir::{Label, Markup, PluralCase, PluralKind, TagLocation};

    fn label(id: u32, hint: &str) -> Label {
        Label {
            id,
            name: format!("L{id}{hint}"),
        }
    }

    fn render(step: Step) -> String {
        let ctx = CompilationContext::default();
        let mut out = String::new();
        emit_step(&ctx, &step, &mut out);
        out
    }

    #[test]
    fn set_uses_variables_path() {
        let out = render(Step::Set {
            variable: "gold".into(),
            operation: "-=".into(),
            expression: "2".into(),
        });
        assert_eq!(out, "\t\t\trunner.variables.gold -= 2;\n\n");
    }

    #[test]
    fn if_returns_to_skip_label() {
        let out = render(Step::If {
            condition: "runner.variables.a".into(),
            skip: label(2, "skipclause"),
        });
        assert_eq!(
            out,
            "\t\t\tif(!(runner.variables.a)){\n\t\t\t\trunner.ReturnAndGoto(L2skipclause);\n\t\t\t\treturn; }\n"
        );
    }

    #[test]
    fn line_group_fallback_is_a_label() {
        let out = render(Step::SendLineGroup {
            fallback: label(1, "group_end"),
        });
        assert!(out.starts_with("\t\t\trunner.SetNoValidOption(L1group_end);\n"));
        assert!(out.contains("runner.state = LineGroup;"));
    }

    #[test]
    fn commands() {
        assert_eq!(render(Step::Command(Command::Stop)), "\t\t\trunner.Stop();\n\t\t\treturn;\n");
        let wait = render(Step::Command(Command::Wait {
            duration: "2".into(),
            resume: label(3, "waitContinue"),
        }));
        assert_eq!(
            wait,
            "\t\t\trunner.StartTimer(2, L3waitContinue);\n\t\t\treturn;\n\t\tcase L3waitContinue:\n\n"
        );
        let call = render(Step::Command(Command::Call {
            name: "shake".into(),
            args: vec!["\"Mae\"".into(), "3".into()],
        }));
        assert_eq!(call, "\t\t\trunner.variables.shake(\"Mae\", 3);\n\n");
    }

    #[test]
    fn once_line_marks_seen_when_shown() {
        let out = render(Step::Line(LineStep {
            line_id: "line0".into(),
            content: vec![Expression::text("Say \"hi\"")],
            tags: vec![Tag::parse(TagLocation::Line, "#pose:2").unwrap()],
            condition: Some("runner.variables.ready".into()),
            once: Some("Start_once_0".into()),
            resume: label(1, ""),
        }));
        let expected = "\t\t\t// line0\n\
            \t\t\tcurrentLine.StartNewLine();\n\
            \t\t\tcurrentLine << \"Say \\\"hi\\\"\";\n\
            \t\t\tfor(LineTag p : {LineTag::pose}) { currentLine.markup.tags.emplace_back(p);}\n\
            \t\t\tfor(int p : {2}) { currentLine.markup.tagParams.emplace_back(p);}\n\
            \t\t\tcurrentLine.condition = (!runner.Once(OnceKey::Start_once_0) && runner.variables.ready);\n\
            \t\t\tif(currentLine.condition) { runner.SetOnce(OnceKey::Start_once_0); }\n\
            \t\t\trunner.FinishLine(L1);\n\
            \t\t\treturn;\n\
            \t\tcase L1:\n\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn option_with_conditions_and_markup() {
        let out = render(Step::Option(OptionStep {
            index: 0,
            line_id: "line4".into(),
            target: label(2, "shortcutoption_Start_1"),
            content: vec![
                Expression::Markup(Markup::start("b")),
                Expression::text("Run"),
                Expression::Markup(Markup::end("b")),
            ],
            tags: vec![],
            conditions: vec!["runner.variables.brave".into()],
            once: Some("once0".into()),
            complexity: 2,
            line_group: false,
        }));
        assert!(out.contains("auto currentOption = Option<OPTION_BUFFER_SIZE>(L2shortcutoption_Start_1);"));
        assert!(out.contains("\t\t\t\tif(runner.variables.brave){trueConditionCount++;}\n"));
        assert!(out.contains("\t\t\t\tif(!runner.Once(OnceKey::once0)){trueConditionCount++;}\n"));
        assert!(out.contains("currentOption.condition = trueConditionCount == 2;"));
        assert!(out.contains("currentOption.complexity = 2;"));
        assert!(out.contains("auto& optionMarkup = currentOption.markup;"));
        assert!(out.contains("optionMarkup.attributes.emplace_back(Attribute::_b);"));
        assert!(out.contains("optionMarkup.attributePositions.emplace_back(currentOption.length());"));
        assert!(out.ends_with("\t\t\t\trunner.options.push_back(currentOption);\n\t\t\t}\n\n"));
    }

    #[test]
    fn select_and_plural_switches() {
        let select = Select {
            value: "runner.variables.g".into(),
            cases: vec![("m".into(), "\"he\"".into()), ("f".into(), "\"she\"".into())],
            numeric: false,
        };
        let mut out = String::new();
        emit_select(&LINE, &select, &mut out);
        assert_eq!(
            out,
            "\t\t\tswitch(bn::make_hash(runner.variables.g)) {\n\
             \t\t\t\tcase \"m\"_h: currentLine << \"he\"; break;\n\
             \t\t\t\tcase \"f\"_h: currentLine << \"she\"; break;\n\
             \t\t\t\tdefault: break;\n\
             \t\t\t}\n"
        );

        let plural = Plural {
            kind: PluralKind::Cardinal,
            value: "runner.variables.n".into(),
            cases: vec![
                (PluralCase::One, "% apple".into()),
                (PluralCase::Other, "% apples".into()),
            ],
        };
        let mut out = String::new();
        emit_plural(&LINE, &plural, &mut out);
        assert!(out.starts_with("\t\t\tswitch(GetCardinalPluralCase(runner.variables.n)) {\n"));
        assert!(out.contains("\t\t\t\tcase PluralCase::One: \n\t\t\t\t\tcurrentLine << runner.variables.n;\n\t\t\t\t\tcurrentLine << \" apple\";\n\t\t\t\t\tbreak;\n"));
        assert_eq!(out.matches("runner.variables.n;").count(), 2);
    }

    #[test]
    fn node_frame() {
        let ctx = CompilationContext::default();
        let mut node = Node::new("Start", "Start", "a.yarn", 0);
        node.visited = true;
        node.tags.push(Tag::parse(TagLocation::Node, "intro").unwrap());
        let end = node.register_label("");
        node.push(Step::GoTo { target: end.clone() });
        node.push(Step::Label(end));
        let mut out = String::new();
        emit_node(&ctx, &node, &mut out);
        assert!(out.starts_with("\tvoid Start(TBScriptRunner& runner, NodeState& nodeState)\n\t{\n\t\tenum NodeLabel { nodestart = 0, L1};\n"));
        assert!(!out.contains("currentLine"));
        assert!(out.contains("\t\tcase nodestart:\n\t\t\trunner.SetVisitedState(VisitedNodeName::Start);\n"));
        assert!(out.contains("\t\t\tfor(NodeTag p : {NodeTag::intro}) { nodeState.tags.emplace_back(p);}\n"));
        assert!(out.contains("\t\tcase L1:\n\t\t\trunner.EndNode();\n\t\t\treturn;\n\t\tdefault:\n"));
        assert!(out.contains("\" in node Start\");"));
        assert!(out.ends_with("\t\t}\n\t}\n\n"));
    }
}
