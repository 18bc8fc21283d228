pub mod backend;
pub mod config;

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{info, warn};

pub use backend::{Backend, BackendInput, OutputFile};
pub use config::CodegenConfig;

use crate::context::CompilationContext;
use crate::error::CoreError;
use crate::ir::Node;
use crate::passes::{build_group_wrappers, build_steps, collect_definitions, resolve_smart_variables};
use crate::syntax::SourceFile;

/// A fully compiled compile-unit, ready for emission.
#[derive(Debug)]
pub struct CompiledProgram {
    /// Final registries and maxima. Read-only from here on.
    pub context: CompilationContext,
    /// Every node by compile name, group wrappers last.
    pub nodes: IndexMap<String, Node>,
    /// Source filenames in input order.
    pub files: Vec<String>,
}

impl CompiledProgram {
    /// Nodes defined in `filename`, including group wrappers whose first
    /// member lives there.
    pub fn nodes_in<'a>(&'a self, filename: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.values().filter(move |n| n.filename == filename)
    }
}

/// Compile every file of a compile-unit.
///
/// Every file finishes the definitions pass before any step is built, so
/// jumps, visited names and smart variables may reference other files.
pub fn compile(files: &[SourceFile], config: CodegenConfig) -> Result<CompiledProgram, CoreError> {
    let mut ctx = CompilationContext::new(config);
    let mut nodes = IndexMap::new();

    for file in files {
        collect_definitions(&mut ctx, file, &mut nodes)?;
    }
    resolve_smart_variables(&mut ctx)?;
    info!(
        files = files.len(),
        nodes = nodes.len(),
        variables = ctx.variables.len(),
        smart_variables = ctx.resolved.len(),
        "definitions collected"
    );

    for file in files {
        build_steps(&mut ctx, file, &mut nodes)?;
    }
    build_group_wrappers(&mut ctx, &mut nodes)?;

    for name in ctx.visited.iter().chain(ctx.visit_counted.iter()) {
        if !nodes.contains_key(name) {
            warn!(node = %name, "visited query names no node");
        }
    }
    for node in nodes.values_mut() {
        node.visited = ctx.visited.contains(&node.name);
        node.visit_counted = ctx.visit_counted.contains(&node.name);
    }
    info!(
        nodes = nodes.len(),
        groups = ctx.group_titles.len(),
        once_keys = ctx.once_keys.len(),
        "steps built"
    );

    Ok(CompiledProgram {
        context: ctx,
        nodes,
        files: files.iter().map(|f| f.filename.clone()).collect(),
    })
}

/// Read one syntax-tree document from disk.
pub fn read_source(path: &Path) -> Result<SourceFile, CoreError> {
    let text = fs::read_to_string(path).map_err(CoreError::Io)?;
    serde_json::from_str(&text).map_err(|e| CoreError::Parse {
        file: path.to_path_buf(),
        message: e.to_string(),
    })
}
