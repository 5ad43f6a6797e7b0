//! Execution of the flattened code stream.

pub mod machine;
pub mod value;

pub use machine::{Machine, Registers, RuntimeError};
pub use value::Value;
