//! Recursive-descent parser producing the program AST.
//!
//! Statements are parsed by plain recursive descent; expressions use
//! precedence climbing, so one loop handles every binary-operator level
//! instead of one grammar rule per level. The parser owns the token vector,
//! walks it exactly once, and aborts on the first mismatch: there is no
//! recovery and no partial tree.

use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind};

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
  IntLit {
    value: i64,
  },
  Var {
    name: String,
    line: usize,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
}

impl Expr {
  pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }
}

/// The `elif`/`else` continuation of a conditional statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElseBranch {
  Elif {
    cond: Expr,
    then: Vec<Stmt>,
    or_else: Option<Box<ElseBranch>>,
  },
  Else(Vec<Stmt>),
}

/// Statement forms of the language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
  Exit(Expr),
  Declare {
    name: String,
    value: Expr,
  },
  Block(Vec<Stmt>),
  If {
    cond: Expr,
    then: Vec<Stmt>,
    or_else: Option<ElseBranch>,
  },
}

/// Root of the AST: one source buffer parses to one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
  pub stmts: Vec<Stmt>,
}

/// Parse a whole token stream into a program.
pub fn parse(tokens: Vec<Token>) -> CompileResult<Program> {
  let mut parser = Parser::new(tokens);
  let mut stmts = Vec::new();
  while !parser.is_eof() {
    stmts.push(parser.parse_stmt()?);
  }
  Ok(Program { stmts })
}

/// Cursor over the token vector; owns the tokens for the whole parse.
struct Parser {
  tokens: Vec<Token>,
  pos: usize,
}

impl Parser {
  fn new(tokens: Vec<Token>) -> Self {
    Self { tokens, pos: 0 }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn advance(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).cloned();
    if token.is_some() {
      self.pos += 1;
    }
    token
  }

  fn is_eof(&self) -> bool {
    self.pos >= self.tokens.len()
  }

  /// Line to anchor a diagnostic at: the current token's, or the last
  /// token's when input ran out.
  fn current_line(&self) -> usize {
    match self.peek() {
      Some(token) => token.line,
      None => self.tokens.last().map(|token| token.line).unwrap_or(1),
    }
  }

  /// Consume the current token if it has the given kind.
  fn eat(&mut self, kind: TokenKind) -> bool {
    if self.peek().map(|token| token.kind) == Some(kind) {
      self.pos += 1;
      return true;
    }
    false
  }

  /// Consume a token of the given kind or fail the whole parse. There is
  /// no recovery, so a mismatched token need not be put back.
  fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
    let line = self.current_line();
    match self.advance() {
      Some(token) if token.kind == kind => Ok(token),
      Some(token) => Err(CompileError::syntax(
        token.line,
        format!("expected {}, found {}", kind.describe(), token.kind.describe()),
      )),
      None => Err(CompileError::syntax(
        line,
        format!("expected {}, found end of input", kind.describe()),
      )),
    }
  }

  fn parse_stmt(&mut self) -> CompileResult<Stmt> {
    match self.peek().map(|token| token.kind) {
      Some(TokenKind::Exit) => {
        self.pos += 1;
        self.expect(TokenKind::OpenParen)?;
        let expr = self.parse_expr(0)?;
        self.expect(TokenKind::CloseParen)?;
        self.expect(TokenKind::Semi)?;
        Ok(Stmt::Exit(expr))
      }
      Some(TokenKind::Var) => {
        self.pos += 1;
        let ident = self.expect(TokenKind::Ident)?;
        let name = ident.text.ok_or_else(|| {
          CompileError::syntax(ident.line, "identifier token is missing its text")
        })?;
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expr(0)?;
        self.expect(TokenKind::Semi)?;
        Ok(Stmt::Declare { name, value })
      }
      Some(TokenKind::OpenBrace) => Ok(Stmt::Block(self.parse_block()?)),
      Some(TokenKind::If) => {
        self.pos += 1;
        let (cond, then) = self.parse_guarded_block()?;
        let or_else = self.parse_else_branch()?;
        Ok(Stmt::If {
          cond,
          then,
          or_else,
        })
      }
      Some(kind) => Err(CompileError::syntax(
        self.current_line(),
        format!("expected a statement, found {}", kind.describe()),
      )),
      None => Err(CompileError::syntax(
        self.current_line(),
        "expected a statement, found end of input",
      )),
    }
  }

  /// `'{' Statement* '}'`
  fn parse_block(&mut self) -> CompileResult<Vec<Stmt>> {
    self.expect(TokenKind::OpenBrace)?;
    let mut stmts = Vec::new();
    while !self.eat(TokenKind::CloseBrace) {
      if self.is_eof() {
        return Err(CompileError::syntax(
          self.current_line(),
          "expected `}`, found end of input",
        ));
      }
      stmts.push(self.parse_stmt()?);
    }
    Ok(stmts)
  }

  /// `'(' Expr ')' Block` — shared by `if` and `elif`.
  fn parse_guarded_block(&mut self) -> CompileResult<(Expr, Vec<Stmt>)> {
    self.expect(TokenKind::OpenParen)?;
    let cond = self.parse_expr(0)?;
    self.expect(TokenKind::CloseParen)?;
    let then = self.parse_block()?;
    Ok((cond, then))
  }

  fn parse_else_branch(&mut self) -> CompileResult<Option<ElseBranch>> {
    if self.eat(TokenKind::Elif) {
      let (cond, then) = self.parse_guarded_block()?;
      let or_else = self.parse_else_branch()?.map(Box::new);
      return Ok(Some(ElseBranch::Elif {
        cond,
        then,
        or_else,
      }));
    }
    if self.eat(TokenKind::Else) {
      return Ok(Some(ElseBranch::Else(self.parse_block()?)));
    }
    Ok(None)
  }

  /// Precedence climbing: fold binary operators whose precedence is at
  /// least `min_prec` onto the left operand. Raising the minimum by one for
  /// the right operand makes every operator left-associative.
  fn parse_expr(&mut self, min_prec: u8) -> CompileResult<Expr> {
    let mut lhs = self.parse_atom()?;

    loop {
      let Some((op_kind, prec)) = self.peek().and_then(|token| {
        token
          .kind
          .binary_precedence()
          .map(|prec| (token.kind, prec))
      }) else {
        break;
      };
      if prec < min_prec {
        break;
      }
      self.pos += 1;

      let rhs = self.parse_expr(prec + 1)?;
      let op = match op_kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        _ => unreachable!("only binary operators carry a precedence"),
      };
      lhs = Expr::binary(op, lhs, rhs);
    }

    Ok(lhs)
  }

  /// `IntLit | Ident | '(' Expr ')'`
  fn parse_atom(&mut self) -> CompileResult<Expr> {
    let line = self.current_line();
    let Some(token) = self.advance() else {
      return Err(CompileError::syntax(
        line,
        "expected an expression, found end of input",
      ));
    };
    match token.kind {
      TokenKind::IntLit => {
        let text = token.text.as_deref().unwrap_or("");
        let value = text.parse::<i64>().map_err(|err| {
          CompileError::syntax(token.line, format!("invalid integer literal: {err}"))
        })?;
        Ok(Expr::IntLit { value })
      }
      TokenKind::Ident => {
        let line = token.line;
        let name = token
          .text
          .ok_or_else(|| CompileError::syntax(line, "identifier token is missing its text"))?;
        Ok(Expr::Var { name, line })
      }
      TokenKind::OpenParen => {
        let expr = self.parse_expr(0)?;
        self.expect(TokenKind::CloseParen)?;
        Ok(expr)
      }
      kind => Err(CompileError::syntax(
        token.line,
        format!("expected an expression, found {}", kind.describe()),
      )),
    }
  }
}
