use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use threadbare_backend_cpp::CppBackend;
use threadbare_core::pipeline::{compile, read_source, Backend, BackendInput, CodegenConfig, CompiledProgram};
use threadbare_core::project::{ProjectManifest, MANIFEST_FILE};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "threadbare", about = "Dialogue script compiler for resumable C++ node functions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Display project manifest info.
    Info {
        /// Path to the project manifest.
        #[arg(long, default_value = MANIFEST_FILE)]
        manifest: PathBuf,
    },
    /// Compile syntax-tree documents and print every node's steps.
    PrintSteps {
        #[command(flatten)]
        sources: SourceArgs,
        /// Only print nodes whose name contains this substring.
        #[arg(long)]
        node: Option<String>,
    },
    /// Compile syntax-tree documents and write C++ sources plus the header.
    Compile {
        #[command(flatten)]
        sources: SourceArgs,
        /// Output directory for generated `.cpp` files.
        #[arg(long)]
        cpp_out: Option<PathBuf>,
        /// Output directory for the declarations header.
        #[arg(long)]
        header_out: Option<PathBuf>,
        /// Extra header included first by every generated `.cpp` file.
        #[arg(long)]
        include: Option<String>,
        /// C++ namespace wrapping the generated code.
        #[arg(long)]
        namespace: Option<String>,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Syntax-tree documents to compile. When empty, the manifest's source
    /// directory is used.
    files: Vec<PathBuf>,
    /// Path to the project manifest.
    #[arg(long, default_value = MANIFEST_FILE)]
    manifest: PathBuf,
}

/// Find `threadbare.json` by walking up from `start` through ancestor directories.
fn find_manifest_upward(start: &Path) -> Option<PathBuf> {
    let mut dir = if start.is_dir() {
        start.to_path_buf()
    } else {
        start.parent()?.to_path_buf()
    };
    loop {
        let candidate = dir.join(MANIFEST_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Resolve the manifest path: if the given path exists, use it directly;
/// otherwise search ancestor directories from cwd.
fn resolve_manifest_path(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    // Only search ancestors when using the default filename.
    if path.file_name().and_then(|f| f.to_str()) == Some(MANIFEST_FILE) {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        if let Some(found) = find_manifest_upward(&cwd) {
            info!(path = %found.display(), "found manifest");
            return Ok(found);
        }
    }
    bail!("manifest not found: {}", path.display())
}

fn load_manifest(path: &Path) -> Result<ProjectManifest> {
    let path = resolve_manifest_path(path)?;
    ProjectManifest::load(&path).with_context(|| format!("failed to load manifest: {}", path.display()))
}

/// Every `.json` document in `dir`, sorted by path.
fn source_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading source dir: {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Source documents and manifest for a command. The manifest is required
/// only when no files are given on the command line.
fn resolve_sources(args: &SourceArgs) -> Result<(Vec<PathBuf>, Option<ProjectManifest>)> {
    if !args.files.is_empty() {
        let manifest = match resolve_manifest_path(&args.manifest) {
            Ok(path) => Some(
                ProjectManifest::load(&path)
                    .with_context(|| format!("failed to load manifest: {}", path.display()))?,
            ),
            Err(_) => None,
        };
        return Ok((args.files.clone(), manifest));
    }
    let manifest = load_manifest(&args.manifest)?;
    let files = source_documents(&manifest.sources)?;
    if files.is_empty() {
        bail!("no syntax-tree documents in {}", manifest.sources.display());
    }
    Ok((files, Some(manifest)))
}

fn compile_documents(paths: &[PathBuf], config: CodegenConfig) -> Result<CompiledProgram> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = read_source(path).with_context(|| format!("failed to read {}", path.display()))?;
        files.push(file);
    }
    compile(&files, config).context("compilation failed")
}

fn cmd_info(manifest_path: &Path) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let documents = source_documents(&manifest.sources)?;
    println!("Project:   {}", manifest.name);
    println!("Sources:   {} ({} documents)", manifest.sources.display(), documents.len());
    println!("C++ out:   {}", manifest.cpp_out.display());
    println!("Header:    {}", manifest.header_dir().join(&manifest.codegen.header_name).display());
    println!("Namespace: {}", manifest.codegen.namespace);
    if let Some(include) = &manifest.codegen.include {
        println!("Include:   {include}");
    }
    Ok(())
}

fn cmd_print_steps(sources: &SourceArgs, filter: Option<&str>) -> Result<()> {
    let (paths, manifest) = resolve_sources(sources)?;
    let config = manifest.map(|m| m.codegen).unwrap_or_default();
    let program = compile_documents(&paths, config)?;
    for node in program.nodes.values() {
        if filter.is_some_and(|f| !node.name.contains(f)) {
            continue;
        }
        println!("{node}");
    }
    Ok(())
}

struct Overrides<'a> {
    cpp_out: Option<&'a PathBuf>,
    header_out: Option<&'a PathBuf>,
    include: Option<&'a String>,
    namespace: Option<&'a String>,
}

fn cmd_compile(sources: &SourceArgs, overrides: Overrides<'_>) -> Result<()> {
    let (paths, manifest) = resolve_sources(sources)?;

    let (mut config, manifest_cpp, manifest_header) = match manifest {
        Some(m) => (m.codegen, Some(m.cpp_out), m.header_out),
        None => (CodegenConfig::default(), None, None),
    };
    if let Some(include) = overrides.include {
        config.include = Some(include.clone());
    }
    if let Some(namespace) = overrides.namespace {
        config.namespace = namespace.clone();
    }

    let Some(cpp_dir) = overrides.cpp_out.cloned().or(manifest_cpp) else {
        bail!("no output directory: pass --cpp-out or use a manifest");
    };
    let header_dir = overrides
        .header_out
        .cloned()
        .or(manifest_header)
        .unwrap_or_else(|| cpp_dir.clone());

    let program = compile_documents(&paths, config)?;
    let backend = CppBackend;
    let written = backend
        .emit(BackendInput {
            program,
            cpp_dir: cpp_dir.clone(),
            header_dir,
        })
        .with_context(|| format!("{} backend failed", backend.name()))?;

    println!("Emitted {} files to {}", written.len(), cpp_dir.display());
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("threadbare=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Info { manifest } => cmd_info(manifest),
        Command::PrintSteps { sources, node } => cmd_print_steps(sources, node.as_deref()),
        Command::Compile {
            sources,
            cpp_out,
            header_out,
            include,
            namespace,
        } => cmd_compile(
            sources,
            Overrides {
                cpp_out: cpp_out.as_ref(),
                header_out: header_out.as_ref(),
                include: include.as_ref(),
                namespace: namespace.as_ref(),
            },
        ),
    }
}
