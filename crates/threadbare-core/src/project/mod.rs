pub mod manifest;

pub use manifest::{ProjectManifest, MANIFEST_FILE};
