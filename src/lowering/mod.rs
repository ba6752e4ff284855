pub mod compiler;
pub mod context;

pub use compiler::GraphCompiler;
pub use context::LoweringContext;
