use std::path::PathBuf;

/// Core error type for the threadbare compiler.
///
/// Every pass fails fast with one of these; nothing is written to disk once
/// an error has been produced.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("duplicate node title: {name}")]
    DuplicateNode { name: String },

    #[error("unknown node `{target}` referenced from `{from}`")]
    UnknownNode { target: String, from: String },

    #[error("cyclic smart variable dependency among: {}", names.join(", "))]
    CyclicSmartVariables { names: Vec<String> },

    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("malformed tag `{text}`")]
    MalformedTag { text: String },

    #[error("markup error: {0}")]
    Markup(String),

    #[error("unknown enum member: {0}")]
    UnknownEnumMember(String),

    #[error("enum member `{member}` is ambiguous between {}", enums.join(", "))]
    AmbiguousEnumMember { member: String, enums: Vec<String> },

    #[error("malformed command in node `{node}`: {message}")]
    MalformedCommand { node: String, message: String },

    #[error("parse error in {file}: {message}")]
    Parse { file: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
