pub mod analysis;
pub mod interpreter;
pub mod operators;

pub use interpreter::Interpreter;
