use serde::{Deserialize, Serialize};

/// Target-specific naming used by lowering and emission.
///
/// Every field has a default matching the stock C++ runtime, so a manifest
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// C++ namespace wrapping all generated code.
    pub namespace: String,
    /// File name of the shared declarations header.
    pub header_name: String,
    /// Extra header included first by every generated `.cpp` file.
    pub include: Option<String>,
    /// Expression naming the script runner inside node functions.
    pub runner: String,
    /// Member path holding script variables.
    pub variables_path: String,
    /// Member path holding user functions and commands.
    pub functions_path: String,
    /// Fixed-point constructor used for fractional literals.
    pub fixed_point: String,
    /// Storage alignment for the visited and once bitsets.
    pub slot_alignment: usize,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            namespace: "ThreadBare".to_string(),
            header_name: "script.yarn.h".to_string(),
            include: None,
            runner: "runner".to_string(),
            variables_path: "runner.variables".to_string(),
            functions_path: "runner.variables".to_string(),
            fixed_point: "bn::fixed".to_string(),
            slot_alignment: 8,
        }
    }
}

impl CodegenConfig {
    /// Round a slot count up to the alignment, never below one aligned
    /// block.
    pub fn aligned_slots(&self, count: usize) -> usize {
        let align = self.slot_alignment.max(1);
        count.div_ceil(align).max(1) * align
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_runtime() {
        let config = CodegenConfig::default();
        assert_eq!(config.namespace, "ThreadBare");
        assert_eq!(config.header_name, "script.yarn.h");
        assert_eq!(config.variables_path, "runner.variables");
        assert!(config.include.is_none());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: CodegenConfig =
            serde_json::from_str(r#"{"namespace": "Game", "include": "pch.h"}"#).unwrap();
        assert_eq!(config.namespace, "Game");
        assert_eq!(config.include.as_deref(), Some("pch.h"));
        assert_eq!(config.fixed_point, "bn::fixed");
    }

    #[test]
    fn slots_round_up() {
        let config = CodegenConfig::default();
        assert_eq!(config.aligned_slots(0), 8);
        assert_eq!(config.aligned_slots(8), 8);
        assert_eq!(config.aligned_slots(9), 16);
    }
}
