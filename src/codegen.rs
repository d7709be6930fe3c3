//! Code generation: lower the parsed AST into NASM x86-64 assembly.
//!
//! The emitter uses a simple stack machine: every expression leaves exactly
//! one value on the stack, and binary operators pop two values into scratch
//! registers and push the result. Locals are never given frame slots ahead
//! of time; the value a declaration pushes *is* the variable's storage, and
//! the generator tracks the virtual stack depth so later references can be
//! addressed relative to `rsp`. Block scopes map to frames of that virtual
//! stack and are deallocated wholesale when the block ends.

use std::collections::HashMap;

use crate::error::{CompileError, CompileResult};
use crate::parser::{BinaryOp, ElseBranch, Expr, Program, Stmt};

/// Target selector. Linux has the full assemble-and-link path; Windows is a
/// deliberately partial secondary target that only carries the exit
/// convention and has no link step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
  Linux,
  Windows,
}

impl Platform {
  /// Parse a platform name from the closed set accepted on the CLI.
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "linux" => Some(Platform::Linux),
      "windows" => Some(Platform::Windows),
      _ => None,
    }
  }
}

/// Variable bindings of one lexical block: name to absolute virtual-stack
/// slot, plus how many slots the block has accumulated.
struct ScopeFrame {
  vars: HashMap<String, usize>,
  size: usize,
}

impl ScopeFrame {
  fn new() -> Self {
    Self {
      vars: HashMap::new(),
      size: 0,
    }
  }
}

/// Emit assembly for a whole program.
pub fn generate(program: &Program, platform: Platform) -> CompileResult<String> {
  let mut generator = Generator::new(platform);
  generator.emit_prologue();
  // Top-level statements live in an implicit outermost scope.
  generator.begin_scope();
  for stmt in &program.stmts {
    generator.emit_stmt(stmt)?;
  }
  generator.end_scope();
  // A program that falls off the end still terminates cleanly.
  generator.emit_exit_value(0);
  Ok(generator.asm)
}

/// Per-compilation emitter state. Nothing here outlives one `generate`
/// call, so independent compilations never share state.
struct Generator {
  platform: Platform,
  asm: String,
  /// Virtual stack depth in 8-byte slots, mirroring the pushes and pops
  /// emitted so far.
  depth: usize,
  scopes: Vec<ScopeFrame>,
  labels: usize,
}

impl Generator {
  fn new(platform: Platform) -> Self {
    Self {
      platform,
      asm: String::new(),
      depth: 0,
      scopes: Vec::new(),
      labels: 0,
    }
  }

  fn emit(&mut self, line: &str) {
    self.asm.push_str("    ");
    self.asm.push_str(line);
    self.asm.push('\n');
  }

  fn emit_label(&mut self, label: &str) {
    self.asm.push_str(label);
    self.asm.push_str(":\n");
  }

  fn fresh_label(&mut self) -> String {
    let label = format!(".L{}", self.labels);
    self.labels += 1;
    label
  }

  fn push(&mut self, reg: &str) {
    self.emit(&format!("push {reg}"));
    self.depth += 1;
  }

  fn pop(&mut self, reg: &str) {
    self.emit(&format!("pop {reg}"));
    self.depth -= 1;
  }

  fn begin_scope(&mut self) {
    self.scopes.push(ScopeFrame::new());
  }

  /// Discard the innermost frame, releasing exactly the storage it
  /// accumulated.
  fn end_scope(&mut self) {
    let frame = self
      .scopes
      .pop()
      .expect("generate opens the outermost scope before any statement");
    if frame.size > 0 {
      self.emit(&format!("add rsp, {}", frame.size * 8));
      self.depth -= frame.size;
    }
  }

  /// Innermost-outward lookup; inner frames shadow outer ones.
  fn resolve(&self, name: &str) -> Option<usize> {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|frame| frame.vars.get(name).copied())
  }

  fn emit_prologue(&mut self) {
    match self.platform {
      Platform::Linux => {
        self.asm.push_str("global _start\n");
        self.asm.push_str("_start:\n");
      }
      Platform::Windows => {
        self.asm.push_str("bits 64\n");
        self.asm.push_str("default rel\n");
        self.asm.push_str("extern ExitProcess\n");
        self.asm.push_str("global main\n");
        self.asm.push_str("main:\n");
      }
    }
  }

  /// The platform's process-termination sequence, consuming the exit code
  /// from the top of the stack.
  fn emit_exit_sequence(&mut self) {
    match self.platform {
      Platform::Linux => {
        self.pop("rdi");
        self.emit("mov rax, 60");
        self.emit("syscall");
      }
      Platform::Windows => {
        self.pop("rcx");
        self.emit("call ExitProcess");
      }
    }
  }

  fn emit_exit_value(&mut self, value: i64) {
    self.emit(&format!("mov rax, {value}"));
    self.push("rax");
    self.emit_exit_sequence();
  }

  fn emit_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Exit(expr) => {
        self.emit_expr(expr)?;
        self.emit_exit_sequence();
        // Statements after an unconditional exit still get emitted; the
        // code is dead but harmless.
      }
      Stmt::Declare { name, value } => {
        self.emit_expr(value)?;
        // The pushed value is the variable's storage until the enclosing
        // block ends. A redeclaration rebinds the name; the old slot stays
        // allocated until the frame is released.
        let slot = self.depth;
        let frame = self
          .scopes
          .last_mut()
          .expect("generate opens the outermost scope before any statement");
        frame.vars.insert(name.clone(), slot);
        frame.size += 1;
      }
      Stmt::Block(stmts) => self.emit_block(stmts)?,
      Stmt::If {
        cond,
        then,
        or_else,
      } => {
        let end = self.fresh_label();
        self.emit_branch(cond, then, or_else.as_ref(), &end)?;
        self.emit_label(&end);
      }
    }
    Ok(())
  }

  fn emit_block(&mut self, stmts: &[Stmt]) -> CompileResult<()> {
    self.begin_scope();
    for stmt in stmts {
      self.emit_stmt(stmt)?;
    }
    self.end_scope();
    Ok(())
  }

  /// One alternative of an `if`/`elif`/`else` chain. A failed condition
  /// jumps to the next alternative's label, or straight to the shared end
  /// label when this alternative is the last. Every non-final body jumps to
  /// the end label so the chain has a single join point.
  fn emit_branch(
    &mut self,
    cond: &Expr,
    then: &[Stmt],
    or_else: Option<&ElseBranch>,
    end: &str,
  ) -> CompileResult<()> {
    let next = match or_else {
      Some(_) => self.fresh_label(),
      None => end.to_string(),
    };

    self.emit_expr(cond)?;
    self.pop("rax");
    self.emit("test rax, rax");
    self.emit(&format!("jz {next}"));
    self.emit_block(then)?;

    if let Some(branch) = or_else {
      self.emit(&format!("jmp {end}"));
      self.emit_label(&next);
      match branch {
        ElseBranch::Elif {
          cond,
          then,
          or_else,
        } => self.emit_branch(cond, then, or_else.as_deref(), end)?,
        ElseBranch::Else(stmts) => self.emit_block(stmts)?,
      }
    }
    Ok(())
  }

  /// Lower an expression; net effect is exactly one value pushed.
  fn emit_expr(&mut self, expr: &Expr) -> CompileResult<()> {
    match expr {
      Expr::IntLit { value } => {
        self.emit(&format!("mov rax, {value}"));
        self.push("rax");
      }
      Expr::Var { name, line } => {
        let slot = self
          .resolve(name)
          .ok_or_else(|| CompileError::UndeclaredVariable {
            name: name.clone(),
            line: *line,
          })?;
        // Copy the stored value to the top of the stack. `slot` is the
        // depth right after the variable's value was pushed, so the byte
        // offset from the current rsp is 8 * (depth - slot).
        let offset = (self.depth - slot) * 8;
        self.emit(&format!("push QWORD [rsp + {offset}]"));
        self.depth += 1;
      }
      Expr::Binary { op, lhs, rhs } => {
        self.emit_expr(lhs)?;
        self.emit_expr(rhs)?;
        self.pop("rbx");
        self.pop("rax");
        match op {
          BinaryOp::Add => self.emit("add rax, rbx"),
          BinaryOp::Sub => self.emit("sub rax, rbx"),
          BinaryOp::Mul => self.emit("imul rax, rbx"),
          BinaryOp::Div => {
            self.emit("cqo");
            self.emit("idiv rbx");
          }
        }
        self.push("rax");
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn generate_source(source: &str, platform: Platform) -> CompileResult<String> {
    let program = parse(tokenize(source).unwrap()).unwrap();
    generate(&program, platform)
  }

  fn linux(source: &str) -> String {
    generate_source(source, Platform::Linux).unwrap()
  }

  #[test]
  fn linux_exit_uses_syscall_convention() {
    let asm = linux("exit(0);");
    assert!(asm.starts_with("global _start\n_start:\n"));
    assert!(asm.contains("pop rdi"));
    assert!(asm.contains("mov rax, 60"));
    assert!(asm.contains("syscall"));
  }

  #[test]
  fn windows_exit_uses_exit_process() {
    let asm = generate_source("exit(0);", Platform::Windows).unwrap();
    assert!(asm.contains("extern ExitProcess"));
    assert!(asm.contains("pop rcx"));
    assert!(asm.contains("call ExitProcess"));
    assert!(!asm.contains("syscall"));
  }

  #[test]
  fn variable_reference_copies_its_slot() {
    let asm = linux("var x = 5; exit(x);");
    // x is on top of the stack when the reference is lowered.
    assert!(asm.contains("push QWORD [rsp + 0]"));
  }

  #[test]
  fn references_account_for_values_above_the_slot() {
    // By the time y is referenced, x's slot and the copy of x pushed for
    // the addition both sit above y's slot.
    let asm = linux("var y = 7; var x = y; exit(x+y);");
    assert!(asm.contains("push QWORD [rsp + 16]"));
  }

  #[test]
  fn block_frees_exactly_its_storage() {
    let asm = linux("{ var a = 1; var b = 2; }");
    assert!(asm.contains("add rsp, 16"));
  }

  #[test]
  fn platform_names_form_a_closed_set() {
    assert_eq!(Platform::from_name("linux"), Some(Platform::Linux));
    assert_eq!(Platform::from_name("windows"), Some(Platform::Windows));
    assert_eq!(Platform::from_name("macos"), None);
    assert_eq!(Platform::from_name("Linux"), None);
    assert_eq!(Platform::from_name(""), None);
  }

  #[test]
  fn redeclaration_rebinds_but_keeps_the_old_slot() {
    let asm = linux("var x = 1; var x = 2; exit(x);");
    // The reference reads the second binding, which is on top of the stack.
    assert!(asm.contains("push QWORD [rsp + 0]"));
    // Both slots stay allocated until the block ends.
    assert!(asm.contains("add rsp, 16"));
  }

  #[test]
  fn undeclared_variable_fails_generation() {
    let err = generate_source("exit(y);", Platform::Linux).unwrap_err();
    assert_eq!(
      err,
      CompileError::UndeclaredVariable {
        name: "y".to_string(),
        line: 1,
      }
    );
  }

  #[test]
  fn block_local_is_gone_after_the_block() {
    let err =
      generate_source("{ var inner = 1; } exit(inner);", Platform::Linux).unwrap_err();
    assert!(matches!(
      err,
      CompileError::UndeclaredVariable { name, .. } if name == "inner"
    ));
  }

  #[test]
  fn inner_declaration_shadows_outer() {
    let asm = linux("var x = 1; { var x = 2; exit(x); }");
    // The reference resolves to the inner slot, which is on top.
    assert!(asm.contains("push QWORD [rsp + 0]"));
  }

  #[test]
  fn conditional_chain_shares_one_end_label() {
    let asm = linux("if (1) { exit(1); } elif (2) { exit(2); } else { exit(3); }");
    // One end label, one label per non-final alternative.
    assert!(asm.contains("jz .L1"));
    assert!(asm.contains("jz .L2"));
    assert_eq!(asm.matches("jmp .L0").count(), 2);
    assert!(asm.contains(".L0:"));
  }

  #[test]
  fn if_without_else_branches_to_end() {
    let asm = linux("if (0) { exit(1); }");
    assert!(asm.contains("jz .L0"));
    assert!(!asm.contains("jmp"));
  }

  #[test]
  fn code_after_exit_is_still_emitted() {
    let asm = linux("exit(1); exit(2);");
    assert_eq!(asm.matches("syscall").count(), 3); // two exits plus epilogue
  }

  #[test]
  fn division_uses_sign_extension() {
    let asm = linux("exit(8/2);");
    assert!(asm.contains("cqo"));
    assert!(asm.contains("idiv rbx"));
  }

  #[test]
  fn end_to_end_exit_code_sequence() {
    // var x = 5; exit(x+1); must terminate with status 6: the emitted text
    // loads 5, copies the slot, adds 1 and feeds the sum to the syscall.
    let asm = linux("var x = 5; exit(x+1);");
    let expected = "\
global _start
_start:
    mov rax, 5
    push rax
    push QWORD [rsp + 0]
    mov rax, 1
    push rax
    pop rbx
    pop rax
    add rax, rbx
    push rax
    pop rdi
    mov rax, 60
    syscall
";
    assert!(asm.starts_with(expected));
  }
}
