pub mod emit;
pub mod header;

use std::fs;
use std::path::{Path, PathBuf};

use threadbare_core::error::CoreError;
use threadbare_core::pipeline::{Backend, BackendInput, CompiledProgram, OutputFile};
use tracing::{debug, info};

/// Suffix shared by every generated source file.
const GENERATED_SUFFIX: &str = ".yarn.cpp";

/// C++ codegen backend.
pub struct CppBackend;

/// Render every output of a compiled program without touching the disk.
pub fn render(program: &CompiledProgram, cpp_dir: &Path, header_dir: &Path) -> Vec<OutputFile> {
    let mut outputs: Vec<OutputFile> = program
        .files
        .iter()
        .map(|filename| OutputFile {
            path: cpp_dir.join(format!("{filename}.cpp")),
            contents: emit::emit_source_file(program, filename),
        })
        .collect();
    outputs.push(OutputFile {
        path: header_dir.join(&program.context.config.header_name),
        contents: header::emit_header(&program.context),
    });
    outputs
}

impl Backend for CppBackend {
    fn name(&self) -> &str {
        "cpp"
    }

    fn emit(&self, input: BackendInput) -> Result<Vec<PathBuf>, CoreError> {
        let outputs = render(&input.program, &input.cpp_dir, &input.header_dir);

        fs::create_dir_all(&input.cpp_dir)?;
        fs::create_dir_all(&input.header_dir)?;
        remove_stale_sources(&input.cpp_dir, &outputs)?;

        let mut written = Vec::with_capacity(outputs.len());
        for output in outputs {
            fs::write(&output.path, &output.contents).map_err(CoreError::Io)?;
            debug!(path = %output.path.display(), bytes = output.contents.len(), "wrote");
            written.push(output.path);
        }
        info!(files = written.len(), "emitted C++ sources");
        Ok(written)
    }
}

/// Delete generated sources left over from source files that no longer
/// exist.
fn remove_stale_sources(cpp_dir: &Path, outputs: &[OutputFile]) -> Result<(), CoreError> {
    for entry in fs::read_dir(cpp_dir)? {
        let path = entry?.path();
        let generated = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(GENERATED_SUFFIX));
        if generated && !outputs.iter().any(|o| o.path == path) {
            debug!(path = %path.display(), "removing stale generated source");
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
