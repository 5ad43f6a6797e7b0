//! Oat: a small expression language compiled to a sectioned bytecode
//! stream and executed on a stack machine.
//!
//! The pipeline is a straight function-call chain: [`lexer::tokenize`]
//! turns source text into tokens, [`parser::parse`] builds the AST while
//! threading the operator table through any `operator` declarations it
//! meets, [`ir::typeless::lift`] lowers to the typeless IR,
//! [`ir::pass::dead_lambdas`] prunes, [`compiler::generate`] emits the
//! flat code stream, and [`runtime::Machine`] runs it.

pub mod compiler;
pub mod diagnostics;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod runtime;

pub use compiler::opcode::Code;
pub use compiler::GeneratorError;
pub use ir::Labels;
pub use parser::syntax::Syntax;
pub use parser::SyntaxError;
pub use runtime::{Machine, RuntimeError, Value};

/// Any failure the pipeline can produce, ready for the diagnostics
/// renderer. The first error wins; no stage recovers.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Source text to the final code stream.
pub fn compile(name: &str, src: &str) -> Result<Vec<Code>, Error> {
    let tree = parser::parse(name, src)?;
    let mut labels = Labels::default();
    let ir = ir::pass::dead_lambdas(ir::typeless::lift(&tree, &mut labels));
    Ok(compiler::generate(&ir, &mut labels)?)
}

/// Compile and run to completion, handing back the machine so callers can
/// look at what the program left behind.
pub fn interpret(name: &str, src: &str) -> Result<Machine, Error> {
    let mut machine = Machine::load(compile(name, src)?)?;
    machine.run()?;
    Ok(machine)
}
