//! Shared error utilities used across the compilation pipeline.
//!
//! Every stage fails fast: the first error aborts the whole compilation and
//! is surfaced to the caller unchanged. There is no accumulation, recovery
//! or downgrading to warnings. Each variant carries the 1-based source line
//! the diagnostic points at.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum CompileError {
  /// The lexer hit a byte it has no rule for.
  #[snafu(display("line {line}: invalid character"))]
  InvalidCharacter { line: usize },

  /// Any grammar mismatch. Undifferentiated on purpose: the parser stops at
  /// the first unexpected token, so one message is all there ever is.
  #[snafu(display("line {line}: syntax error: {message}"))]
  Syntax { line: usize, message: String },

  /// A variable reference that no enclosing scope declares.
  #[snafu(display("line {line}: undeclared variable `{name}`"))]
  UndeclaredVariable { name: String, line: usize },
}

impl CompileError {
  /// Construct a syntax error anchored at a source line.
  pub fn syntax(line: usize, message: impl Into<String>) -> Self {
    Self::Syntax {
      line,
      message: message.into(),
    }
  }
}
