//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be evolved
//! independently:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the program AST.
//! - `codegen` lowers the AST into NASM x86-64 assembly for one platform.
//! - `error` centralises the error type shared by the other modules.
//!
//! The library does no I/O: one source buffer in, one assembly buffer out.
//! Handing the output to an assembler and linker is the caller's job.

pub mod codegen;
pub mod error;
pub mod parser;
pub mod tokenizer;

pub use codegen::Platform;
pub use error::{CompileError, CompileResult};

/// Compile a source string into NASM assembly for the given platform.
pub fn compile(source: &str, platform: Platform) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  let program = parser::parse(tokens)?;
  codegen::generate(&program, platform)
}
