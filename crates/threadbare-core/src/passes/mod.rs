//! Compilation passes, in the order the pipeline runs them.

pub mod definitions;
pub mod markup;
pub mod node_group;
pub mod smart_vars;
pub mod steps;

pub use definitions::collect_definitions;
pub use markup::extract_markup;
pub use node_group::build_group_wrappers;
pub use smart_vars::resolve_smart_variables;
pub use steps::build_steps;
