use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::pipeline::CodegenConfig;

/// Default manifest file name.
pub const MANIFEST_FILE: &str = "threadbare.json";

/// Top-level project manifest (threadbare.json).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub name: String,
    /// Directory of syntax-tree documents, one `.json` per source file.
    pub sources: PathBuf,
    /// Output directory for generated `.cpp` files.
    pub cpp_out: PathBuf,
    /// Output directory for the declarations header. Defaults to `cpp_out`.
    #[serde(default)]
    pub header_out: Option<PathBuf>,
    #[serde(default)]
    pub codegen: CodegenConfig,
}

impl ProjectManifest {
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&text).map_err(|e| CoreError::Parse {
            file: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let base = path.parent().unwrap_or(Path::new("."));
        Ok(manifest.resolve_relative_to(base))
    }

    /// Make every relative path relative to `base` instead.
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        let resolve = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
        self.sources = resolve(self.sources);
        self.cpp_out = resolve(self.cpp_out);
        self.header_out = self.header_out.map(resolve);
        self
    }

    pub fn header_dir(&self) -> &Path {
        self.header_out.as_deref().unwrap_or(&self.cpp_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_manifest_uses_defaults() {
        let json = r#"{"name": "demo", "sources": "yarn", "cpp_out": "src/gen"}"#;
        let manifest: ProjectManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.codegen, CodegenConfig::default());
        assert_eq!(manifest.header_dir(), Path::new("src/gen"));
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let json = r#"{
            "name": "demo",
            "sources": "yarn",
            "cpp_out": "/abs/gen",
            "header_out": "include",
            "codegen": {"namespace": "Demo"}
        }"#;
        let manifest: ProjectManifest = serde_json::from_str(json).unwrap();
        let manifest = manifest.resolve_relative_to(Path::new("/proj"));
        assert_eq!(manifest.sources, PathBuf::from("/proj/yarn"));
        assert_eq!(manifest.cpp_out, PathBuf::from("/abs/gen"));
        assert_eq!(manifest.header_dir(), Path::new("/proj/include"));
        assert_eq!(manifest.codegen.namespace, "Demo");
        assert_eq!(manifest.codegen.runner, "runner");
    }
}
