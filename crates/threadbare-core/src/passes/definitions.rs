//! First walk: node identity, tags, declarations, enums and visited names.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::context::{CompilationContext, SmartVariable};
use crate::error::CoreError;
use crate::ir::{EnumCase, EnumDecl, GroupMembership, Node, Tag, TagLocation};
use crate::lower::{variable_name, visited_argument, ExprLowerer};
use crate::syntax::visit::{walk_expr, walk_statement};
use crate::syntax::{EnumCaseDecl, Expr, Guard, Header, NodeDecl, SourceFile, Statement, Visit};

/// Replace anything that is not a C++ identifier character with `_`.
pub fn sanitize_ident(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Compile name of a node: its title, or `_{title}_{file}_{offset}` for
/// node-group members.
pub fn compile_name(decl: &NodeDecl, filename: &str) -> String {
    if decl.is_group_member() {
        let stem = filename.strip_suffix(".yarn").unwrap_or(filename);
        format!("_{}_{}_{}", decl.title, sanitize_ident(stem), decl.offset)
    } else {
        decl.title.clone()
    }
}

/// Run the definitions pass over one file, creating its nodes.
pub fn collect_definitions(
    ctx: &mut CompilationContext,
    file: &SourceFile,
    nodes: &mut IndexMap<String, Node>,
) -> Result<(), CoreError> {
    for decl in &file.nodes {
        let node = define_node(ctx, decl, &file.filename, nodes)?;
        debug!(node = %node.name, file = %file.filename, "defined node");
        nodes.insert(node.name.clone(), node);

        let mut scan = DefinitionScan {
            ctx: &mut *ctx,
            error: None,
        };
        scan.visit_node(decl);
        if let Some(err) = scan.error {
            return Err(err);
        }
    }
    Ok(())
}

fn define_node(
    ctx: &mut CompilationContext,
    decl: &NodeDecl,
    filename: &str,
    nodes: &IndexMap<String, Node>,
) -> Result<Node, CoreError> {
    let name = compile_name(decl, filename);
    let duplicate = nodes.contains_key(&name)
        || if decl.is_group_member() {
            nodes.get(&decl.title).is_some_and(|n| !n.is_group_member())
        } else {
            ctx.group_titles.contains(&decl.title)
        };
    if duplicate {
        return Err(CoreError::DuplicateNode { name: decl.title.clone() });
    }

    let mut node = Node::new(&decl.title, &name, filename, decl.offset);
    if decl.is_group_member() {
        let mut group = GroupMembership::default();
        for guard in decl.guards() {
            match guard {
                Guard::Always => {}
                Guard::Once => {
                    group.once = true;
                    group.complexity += 1;
                }
                Guard::Expr(expr) => group.complexity += 1 + expr.boolean_connectives(),
            }
        }
        if group.once {
            ctx.visited.insert(name.clone());
        }
        ctx.group_titles.insert(decl.title.clone());
        ctx.node_names.insert(decl.title.clone());
        node.group = Some(group);
    }
    ctx.node_names.insert(name);

    for header in &decl.headers {
        if let Header::Tags(text) = header {
            for token in text.split_whitespace() {
                node.tags.push(Tag::parse(TagLocation::Node, token)?);
            }
        }
    }
    ctx.record_node_tags(&node.tags);
    Ok(node)
}

/// Collects declarations, enums and visited names; stops recording at the
/// first error.
struct DefinitionScan<'c> {
    ctx: &'c mut CompilationContext,
    error: Option<CoreError>,
}

impl DefinitionScan<'_> {
    fn record(&mut self, result: Result<(), CoreError>) {
        if let Err(err) = result {
            if self.error.is_none() {
                self.error = Some(err);
            }
        }
    }

    fn declare(&mut self, variable: &str, value: &Expr) -> Result<(), CoreError> {
        let name = variable_name(variable).to_string();
        if value.is_literal() {
            let text = ExprLowerer::new(self.ctx).lower(value)?;
            self.ctx.unresolved.shift_remove(&name);
            self.ctx.variables.insert(name, text);
        } else {
            let mut deps = DependencyScan::default();
            deps.visit_expr(value);
            debug!(variable = %name, dependencies = deps.names.len(), "queued smart variable");
            self.ctx.variables.shift_remove(&name);
            self.ctx.unresolved.insert(
                name.clone(),
                SmartVariable {
                    name,
                    dependencies: deps.names,
                    expression: value.clone(),
                },
            );
        }
        Ok(())
    }

    fn declare_enum(&mut self, name: &str, cases: &[EnumCaseDecl]) -> Result<(), CoreError> {
        let mut decl = EnumDecl {
            name: name.to_string(),
            cases: Vec::with_capacity(cases.len()),
        };
        for case in cases {
            let value = match &case.value {
                Some(expr) => Some(ExprLowerer::new(self.ctx).lower(expr)?),
                None => None,
            };
            decl.cases.push(EnumCase {
                name: case.name.clone(),
                value,
            });
        }
        self.ctx.enums.push(decl);
        Ok(())
    }
}

impl<'ast> Visit<'ast> for DefinitionScan<'_> {
    fn visit_statement(&mut self, stmt: &'ast Statement) {
        match stmt {
            Statement::Declare { variable, value } => {
                let result = self.declare(variable, value);
                self.record(result);
            }
            Statement::Enum { name, cases } => {
                let result = self.declare_enum(name, cases);
                self.record(result);
            }
            _ => {}
        }
        walk_statement(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'ast Expr) {
        if let Expr::Call { name, args } = expr {
            if name == "visited" || name == "visited_count" {
                match visited_argument(name, args) {
                    Ok(node) => {
                        let registry = if name == "visited" {
                            &mut self.ctx.visited
                        } else {
                            &mut self.ctx.visit_counted
                        };
                        registry.insert(node.to_string());
                    }
                    Err(err) => self.record(Err(err)),
                }
            }
        }
        walk_expr(self, expr);
    }
}

/// Free variables of an expression, without sigils.
#[derive(Default)]
pub struct DependencyScan {
    pub names: IndexSet<String>,
}

impl<'ast> Visit<'ast> for DependencyScan {
    fn visit_expr(&mut self, expr: &'ast Expr) {
        if let Expr::Variable { name } = expr {
            self.names.insert(variable_name(name).to_string());
        }
        walk_expr(self, expr);
    }
}
