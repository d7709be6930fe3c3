//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer scans a maximal identifier-shaped run first and only then
//! classifies it against the keyword table, so a keyword is always a whole
//! word and an identifier can never be spelled like one. Comments are
//! stripped here and never reach the parser. Each token remembers the
//! 1-based line it started on; the counter only moves forward.

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Exit,
  Var,
  If,
  Elif,
  Else,
  IntLit,
  Ident,
  OpenParen,
  CloseParen,
  OpenBrace,
  CloseBrace,
  Semi,
  Assign,
  Plus,
  Minus,
  Star,
  Slash,
}

impl TokenKind {
  /// Binding strength for binary operators; `None` for everything else.
  /// `*` and `/` bind tighter than `+` and `-`.
  pub fn binary_precedence(self) -> Option<u8> {
    match self {
      TokenKind::Plus | TokenKind::Minus => Some(0),
      TokenKind::Star | TokenKind::Slash => Some(1),
      _ => None,
    }
  }

  /// Human-friendly description used in diagnostics.
  pub fn describe(self) -> &'static str {
    match self {
      TokenKind::Exit => "`exit`",
      TokenKind::Var => "`var`",
      TokenKind::If => "`if`",
      TokenKind::Elif => "`elif`",
      TokenKind::Else => "`else`",
      TokenKind::IntLit => "integer literal",
      TokenKind::Ident => "identifier",
      TokenKind::OpenParen => "`(`",
      TokenKind::CloseParen => "`)`",
      TokenKind::OpenBrace => "`{`",
      TokenKind::CloseBrace => "`}`",
      TokenKind::Semi => "`;`",
      TokenKind::Assign => "`=`",
      TokenKind::Plus => "`+`",
      TokenKind::Minus => "`-`",
      TokenKind::Star => "`*`",
      TokenKind::Slash => "`/`",
    }
  }
}

/// Thin wrapper for lexical information needed by later stages.
/// `text` is present for integer literals and identifiers only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub line: usize,
  pub text: Option<String>,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  fn new(kind: TokenKind, line: usize) -> Self {
    Self {
      kind,
      line,
      text: None,
    }
  }

  fn with_text(kind: TokenKind, line: usize, text: &str) -> Self {
    Self {
      kind,
      line,
      text: Some(text.to_string()),
    }
  }
}

/// Lex the input into a flat vector of tokens.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;
  let mut line = 1;

  while i < bytes.len() {
    let c = bytes[i];

    if c.is_ascii_alphabetic() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
        i += 1;
      }
      // Classify only after the greedy scan: `exitcode` stays one identifier.
      let text = &input[start..i];
      let token = match text {
        "exit" => Token::new(TokenKind::Exit, line),
        "var" => Token::new(TokenKind::Var, line),
        "if" => Token::new(TokenKind::If, line),
        "elif" => Token::new(TokenKind::Elif, line),
        "else" => Token::new(TokenKind::Else, line),
        _ => Token::with_text(TokenKind::Ident, line, text),
      };
      tokens.push(token);
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      tokens.push(Token::with_text(TokenKind::IntLit, line, &input[start..i]));
      continue;
    }

    if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
      i += 2;
      while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
      }
      // The newline itself is left for the whitespace rule below.
      continue;
    }

    if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
      i += 2;
      while i < bytes.len() {
        if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
          i += 2;
          break;
        }
        i += 1;
      }
      // A comment left open swallows the rest of the input without error.
      continue;
    }

    let kind = match c {
      b'(' => Some(TokenKind::OpenParen),
      b')' => Some(TokenKind::CloseParen),
      b'{' => Some(TokenKind::OpenBrace),
      b'}' => Some(TokenKind::CloseBrace),
      b';' => Some(TokenKind::Semi),
      b'=' => Some(TokenKind::Assign),
      b'+' => Some(TokenKind::Plus),
      b'-' => Some(TokenKind::Minus),
      b'*' => Some(TokenKind::Star),
      b'/' => Some(TokenKind::Slash),
      _ => None,
    };
    if let Some(kind) = kind {
      tokens.push(Token::new(kind, line));
      i += 1;
      continue;
    }

    if c == b'\n' {
      line += 1;
      i += 1;
      continue;
    }

    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    return Err(CompileError::InvalidCharacter { line });
  }

  Ok(tokens)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(input: &str) -> Vec<TokenKind> {
    tokenize(input)
      .unwrap()
      .into_iter()
      .map(|token| token.kind)
      .collect()
  }

  #[test]
  fn lexes_exit_statement() {
    let tokens = tokenize("exit(0);").unwrap();
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
      kinds,
      vec![
        TokenKind::Exit,
        TokenKind::OpenParen,
        TokenKind::IntLit,
        TokenKind::CloseParen,
        TokenKind::Semi,
      ]
    );
    assert_eq!(tokens[2].text.as_deref(), Some("0"));
  }

  #[test]
  fn keywords_match_whole_words_only() {
    let tokens = tokenize("exitcode elsewhere iffy").unwrap();
    assert!(tokens.iter().all(|t| t.kind == TokenKind::Ident));
    assert_eq!(tokens[0].text.as_deref(), Some("exitcode"));
  }

  #[test]
  fn identifier_text_preserves_case() {
    let tokens = tokenize("var Foo9 = 1;").unwrap();
    assert_eq!(tokens[1].kind, TokenKind::Ident);
    assert_eq!(tokens[1].text.as_deref(), Some("Foo9"));
  }

  #[test]
  fn lines_are_one_based_and_non_decreasing() {
    let tokens = tokenize("var x = 1;\n\nexit(x);").unwrap();
    assert_eq!(tokens[0].line, 1);
    assert_eq!(tokens.last().unwrap().line, 3);
    assert!(tokens.windows(2).all(|w| w[0].line <= w[1].line));
  }

  #[test]
  fn strips_line_comments() {
    assert_eq!(
      kinds("// nothing here\nexit(1);"),
      kinds("exit(1);"),
    );
    let tokens = tokenize("// nothing\nexit(1);").unwrap();
    assert_eq!(tokens[0].line, 2);
  }

  #[test]
  fn strips_block_comments() {
    assert_eq!(kinds("/* a */ exit(/* b */0);"), kinds("exit(0);"));
  }

  #[test]
  fn unterminated_block_comment_lexes_to_nothing() {
    let tokens = tokenize("/* never closed").unwrap();
    assert!(tokens.is_empty());
  }

  #[test]
  fn rejects_unknown_characters() {
    assert_eq!(
      tokenize("var x = 1;\nexit(x@2);"),
      Err(CompileError::InvalidCharacter { line: 2 }),
    );
  }

  #[test]
  fn token_text_is_subsequence_of_source() {
    let source = "var abc = 12 + 34; { exit(abc); }";
    let tokens = tokenize(source).unwrap();
    let mut rest = source;
    for token in &tokens {
      let piece = match token.kind {
        TokenKind::IntLit | TokenKind::Ident => token.text.clone().unwrap(),
        TokenKind::Exit => "exit".to_string(),
        TokenKind::Var => "var".to_string(),
        kind => kind.describe().trim_matches('`').to_string(),
      };
      let at = rest.find(&piece).expect("token text must appear in order");
      rest = &rest[at + piece.len()..];
    }
  }
}
