//! The shared declarations header.
//!
//! Aggregates the final registries and maxima of the whole compile-unit
//! into buffer constants, name-to-ordinal enums, user enums and forward
//! declarations of every node function.

use std::fmt::Write;

use threadbare_core::context::CompilationContext;
use threadbare_core::ir::{EnumDecl, EnumKind};

pub fn emit_header(ctx: &CompilationContext) -> String {
    let config = &ctx.config;
    let maxima = &ctx.maxima;
    let guard = include_guard(&config.header_name);
    let mut out = String::new();

    let _ = writeln!(out, "#ifndef {guard}");
    let _ = writeln!(out, "#define {guard}");
    out.push_str("#include \"plural_select.h\"\n");
    let _ = writeln!(out, "namespace {} {{", config.namespace);
    out.push_str("\tclass TBScriptRunner;\n");
    out.push_str("\tclass NodeState;\n");

    let constants = [
        ("MAX_OPTIONS_COUNT", maxima.options.max(1)),
        ("MAX_TAGS_COUNT", maxima.tags.max(1)),
        ("MAX_TAG_PARAMS_COUNT", maxima.tag_params.max(1)),
        ("MAX_NODE_TAGS_COUNT", maxima.node_tags.max(1)),
        ("MAX_NODE_TAG_PARAMS_COUNT", maxima.node_tag_params.max(1)),
        ("MAX_ATTRIBUTES_COUNT", maxima.markups.max(1)),
        ("MAX_ATTRIBUTE_PARAMS_COUNT", maxima.markup_params.max(1)),
        ("VISITED_NODE_COUNT", config.aligned_slots(ctx.visited.len())),
        ("VISIT_COUNT_NODE_COUNT", ctx.visit_counted.len().max(1)),
        ("ONCE_VARIABLE_COUNT", config.aligned_slots(ctx.once_keys.len())),
    ];
    for (name, value) in constants {
        let _ = writeln!(out, "\tconstexpr static int {name} = {value};");
    }

    out.push_str("\n\t// nodes names\n");
    emit_enum(&mut out, "Node", ctx.node_names.iter().map(String::as_str));
    out.push_str("\n\t// nodes:\n");
    emit_enum(&mut out, "NodeTag", ctx.node_tags.iter().map(String::as_str));
    emit_enum(&mut out, "VisitedNodeName", ctx.visited.iter().map(String::as_str));
    emit_enum(&mut out, "VisitCountedNodeName", ctx.visit_counted.iter().map(String::as_str));
    emit_enum(&mut out, "OnceKey", ctx.once_keys.iter().map(String::as_str));
    out.push_str("\n\t// tags:\n");
    emit_enum(&mut out, "LineTag", ctx.all_line_tags().into_iter());

    out.push_str("\n\t// attributes:\n");
    let attributes: Vec<String> = ctx
        .markup_names
        .iter()
        .flat_map(|m| [m.clone(), format!("_{m}")])
        .collect();
    emit_enum(&mut out, "Attribute", attributes.iter().map(String::as_str));

    out.push_str("\n\t// Nodes:\n");
    for name in &ctx.node_names {
        let _ = writeln!(out, "\tvoid {name}(TBScriptRunner& runner, NodeState& nodeState);");
    }

    out.push_str("\n\t// Enums\n");
    for decl in &ctx.enums {
        emit_user_enum(&mut out, decl);
    }

    out.push_str("}\n#endif\n");
    out
}

fn emit_enum<'a>(out: &mut String, name: &str, members: impl Iterator<Item = &'a str>) {
    let joined: Vec<&str> = members.collect();
    let _ = writeln!(out, "\tenum class {name} : int {{ {} }};", joined.join(", "));
}

fn emit_user_enum(out: &mut String, decl: &EnumDecl) {
    if decl.cases.is_empty() {
        return;
    }
    let name = &decl.name;
    match decl.kind() {
        EnumKind::Discriminant => {
            let cases: Vec<&str> = decl.cases.iter().map(|c| c.name.as_str()).collect();
            let _ = writeln!(out, "\tenum class {name} : int {{ {} }};", cases.join(", "));
        }
        EnumKind::Integer => {
            let cases: Vec<String> = decl
                .cases
                .iter()
                .map(|c| match &c.value {
                    Some(v) => format!("{} = {v}", c.name),
                    None => c.name.clone(),
                })
                .collect();
            let _ = writeln!(out, "\tenum class {name} : int {{ {} }};", cases.join(", "));
        }
        EnumKind::StringConstants => {
            let _ = write!(out, "\tstruct _{name} {{");
            for case in &decl.cases {
                let value = case.value.as_deref().unwrap_or("\"\"");
                let _ = write!(out, "\n\t\tconstexpr static bn::string_view {} = {value};", case.name);
            }
            out.push_str("};\n");
            let _ = writeln!(out, "\tconstexpr _{name} {name};");
        }
    }
}

/// `script.yarn.h` -> `SCRIPT_YARN_H`.
fn include_guard(header_name: &str) -> String {
    header_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}
