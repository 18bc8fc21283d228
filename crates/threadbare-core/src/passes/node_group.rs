//! Wrapper nodes for node groups.
//!
//! Every title shared by `when:`-guarded nodes gets a wrapper function under
//! the bare title. The wrapper offers each member as a line-group option and
//! safe-jumps to whichever the runner picks.

use indexmap::IndexMap;
use tracing::debug;

use crate::context::CompilationContext;
use crate::error::CoreError;
use crate::ir::{GroupMembership, Node, OptionStep, Step};

pub fn build_group_wrappers(
    ctx: &mut CompilationContext,
    nodes: &mut IndexMap<String, Node>,
) -> Result<(), CoreError> {
    let titles: Vec<String> = ctx.group_titles.iter().cloned().collect();
    for title in titles {
        let members: Vec<(String, GroupMembership)> = nodes
            .values()
            .filter(|n| n.title == title)
            .filter_map(|n| n.group.clone().map(|g| (n.name.clone(), g)))
            .collect();
        let Some((first, _)) = members.first() else {
            continue;
        };
        let (filename, offset) = match nodes.get(first) {
            Some(node) => (node.filename.clone(), node.offset),
            None => continue,
        };
        if nodes.contains_key(&title) {
            return Err(CoreError::DuplicateNode { name: title });
        }

        let wrapper = build_wrapper(ctx, &title, &filename, offset, &members);
        debug!(group = %title, members = members.len(), "built node group wrapper");
        nodes.insert(title, wrapper);
    }
    Ok(())
}

fn build_wrapper(
    ctx: &mut CompilationContext,
    title: &str,
    filename: &str,
    offset: usize,
    members: &[(String, GroupMembership)],
) -> Node {
    let mut wrapper = Node::new(title, title, filename, offset);
    let end = wrapper.register_label("group_end");
    wrapper.push(Step::StartOptions);

    let mut targets = Vec::with_capacity(members.len());
    for (index, (name, membership)) in members.iter().enumerate() {
        let target = wrapper.register_label(&format!("shortcutoption_{title}_{}", index + 1));
        let mut conditions = membership.conditions.clone();
        if membership.once {
            conditions.push(format!(
                "!{}.VisitedNode(VisitedNodeName::{name})",
                ctx.config.runner
            ));
        }
        wrapper.push(Step::Option(OptionStep {
            index,
            line_id: name.clone(),
            target: target.clone(),
            content: Vec::new(),
            tags: Vec::new(),
            conditions,
            once: None,
            complexity: membership.complexity,
            line_group: true,
        }));
        targets.push((target, name));
    }
    ctx.record_option_count(members.len());

    wrapper.push(Step::SendLineGroup {
        fallback: end.clone(),
    });
    for (target, name) in targets {
        wrapper.push(Step::Label(target));
        wrapper.push(Step::Jump {
            target: name.clone(),
            safe: true,
        });
    }
    wrapper.push(Step::Label(end));
    wrapper
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{build_steps, collect_definitions, resolve_smart_variables};
    use crate::syntax::{Expr, Guard, Header, NodeDecl, SourceFile, Statement};

    fn member(offset: usize, guard: Guard) -> NodeDecl {
        NodeDecl::new("Greet", vec![Statement::line("Hi")])
            .at(offset)
            .with_header(Header::When(guard))
    }

    #[test]
    fn three_member_group() {
        let file = SourceFile {
            filename: "town.yarn".into(),
            nodes: vec![
                member(10, Guard::Once),
                member(20, Guard::Expr(Expr::var("$met"))),
                member(30, Guard::Always),
            ],
        };
        let mut ctx = CompilationContext::default();
        let mut nodes = IndexMap::new();
        collect_definitions(&mut ctx, &file, &mut nodes).unwrap();
        resolve_smart_variables(&mut ctx).unwrap();
        build_steps(&mut ctx, &file, &mut nodes).unwrap();
        build_group_wrappers(&mut ctx, &mut nodes).unwrap();

        let wrapper = &nodes["Greet"];
        assert_eq!(wrapper.filename, "town.yarn");
        assert_eq!(wrapper.offset, 10);
        let options: Vec<&OptionStep> = wrapper
            .steps
            .iter()
            .filter_map(|s| match s {
                Step::Option(o) => Some(o),
                _ => None,
            })
            .collect();
        assert_eq!(
            options.iter().map(|o| o.complexity).collect::<Vec<_>>(),
            vec![1, 1, 0]
        );
        assert_eq!(
            options[0].conditions,
            vec!["!runner.VisitedNode(VisitedNodeName::_Greet_town_10)".to_string()]
        );
        assert_eq!(options[1].conditions, vec!["runner.variables.met".to_string()]);
        assert!(options[2].conditions.is_empty());
        assert!(wrapper.steps.contains(&Step::Jump {
            target: "_Greet_town_30".into(),
            safe: true
        }));
        assert!(matches!(
            wrapper.steps.last(),
            Some(Step::Label(l)) if l.name == "L1group_end"
        ));
        assert_eq!(ctx.maxima.options, 3);
    }
}
