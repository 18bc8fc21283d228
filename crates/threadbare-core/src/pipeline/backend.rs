use std::path::PathBuf;

use super::CompiledProgram;
use crate::error::CoreError;

/// Input to a backend.
pub struct BackendInput {
    /// The compiled compile-unit.
    pub program: CompiledProgram,
    /// Output directory for per-file generated sources.
    pub cpp_dir: PathBuf,
    /// Output directory for the shared declarations header.
    pub header_dir: PathBuf,
}

/// One rendered output, written only after every output has rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Emits target code from a compiled program.
pub trait Backend {
    /// Name of this backend (e.g., "cpp").
    fn name(&self) -> &str;

    /// Render and write every output file.
    fn emit(&self, input: BackendInput) -> Result<Vec<PathBuf>, CoreError>;
}
