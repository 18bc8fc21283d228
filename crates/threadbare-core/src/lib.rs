pub mod context;
pub mod error;
pub mod ir;
pub mod lower;
pub mod passes;
pub mod pipeline;
pub mod project;
pub mod syntax;
