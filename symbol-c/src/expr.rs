use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

/// Parser for the constant expressions that appear on the right hand side of
/// `#define` style declarations and enum initialisers. The grammar is the C
/// conditional-expression subset: literals, identifiers, unary and binary
/// operators, `?:`, and casts.
#[derive(Clone, PartialEq, Debug)]
pub enum ExprError {
  UnexpectedChar(char),
  UnterminatedLiteral,
  MalformedNumber(String),
  UnexpectedToken(String),
  UnexpectedEnd,
}

impl Display for ExprError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      ExprError::UnexpectedChar(c) => write!(f, "unexpected character `{}`", c),
      ExprError::UnterminatedLiteral => write!(f, "unterminated string or character literal"),
      ExprError::MalformedNumber(raw) => write!(f, "malformed number `{}`", raw),
      ExprError::UnexpectedToken(tok) => write!(f, "unexpected token `{}`", tok),
      ExprError::UnexpectedEnd => write!(f, "unexpected end of expression"),
    }
  }
}

impl Error for ExprError {}

/// A leaf of the expression tree.
#[derive(Clone, PartialEq, Debug)]
pub enum Leaf {
  Number(f64),
  Text(String),
  Character(char),
  Boolean(bool),
  /// An identifier, resolved later against constants and enum values.
  Symbol(String),
}

#[derive(Clone, PartialEq, Debug)]
pub enum ExprNode {
  Leaf(Leaf),
  Unary {
    op: &'static str,
    operand: Box<ExprNode>,
  },
  Binary {
    op: &'static str,
    left: Box<ExprNode>,
    right: Box<ExprNode>,
  },
  Ternary {
    cond: Box<ExprNode>,
    if_true: Box<ExprNode>,
    if_false: Box<ExprNode>,
  },
  Cast {
    target: String,
    operand: Box<ExprNode>,
  },
}

/// A value position in the tree, in source order. Cast targets count as
/// values because they resolve against the type namespaces.
#[derive(Clone, PartialEq, Debug)]
pub enum LeafValue<'a> {
  Leaf(&'a Leaf),
  CastTarget(&'a str),
}

/// Collects every value position of `node` in pre-order.
pub fn collect_leaves<'a>(node: &'a ExprNode, out: &mut Vec<LeafValue<'a>>) {
  match node {
    ExprNode::Leaf(leaf) => out.push(LeafValue::Leaf(leaf)),
    ExprNode::Unary { operand, .. } => collect_leaves(operand, out),
    ExprNode::Binary { left, right, .. } => {
      collect_leaves(left, out);
      collect_leaves(right, out);
    }
    ExprNode::Ternary {
      cond,
      if_true,
      if_false,
    } => {
      collect_leaves(cond, out);
      collect_leaves(if_true, out);
      collect_leaves(if_false, out);
    }
    ExprNode::Cast { target, operand } => {
      out.push(LeafValue::CastTarget(target));
      collect_leaves(operand, out);
    }
  }
}

#[derive(Clone, PartialEq, Debug)]
enum Tok {
  Num(f64),
  Str(String),
  Ch(char),
  Ident(String),
  Op(&'static str),
}

impl Tok {
  fn describe(&self) -> String {
    match self {
      Tok::Num(n) => n.to_string(),
      Tok::Str(s) => format!("\"{}\"", s),
      Tok::Ch(c) => format!("'{}'", c),
      Tok::Ident(id) => id.clone(),
      Tok::Op(op) => (*op).to_string(),
    }
  }
}

const TWO_CHAR_OPS: &[&str] = &["<<", ">>", "<=", ">=", "==", "!=", "&&", "||"];
const ONE_CHAR_OPS: &[&str] = &[
  "(", ")", "?", ":", "|", "^", "&", "<", ">", "+", "-", "*", "/", "%", "!", "~", ",",
];

fn lex(text: &str) -> Result<Vec<Tok>, ExprError> {
  let bytes = text.as_bytes();
  let mut toks = Vec::new();
  let mut i = 0;
  while i < bytes.len() {
    let c = bytes[i];
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }
    if c.is_ascii_digit() {
      let (tok, next) = lex_number(text, i)?;
      toks.push(tok);
      i = next;
      continue;
    }
    if c == b'"' || c == b'\'' {
      let (tok, next) = lex_quoted(text, i)?;
      toks.push(tok);
      i = next;
      continue;
    }
    if c.is_ascii_alphabetic() || c == b'_' {
      let start = i;
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
      }
      let ident = &text[start..i];
      // Wide literal prefix.
      if ident == "L" && i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
        let (tok, next) = lex_quoted(text, i)?;
        toks.push(tok);
        i = next;
      } else {
        toks.push(Tok::Ident(ident.to_string()));
      }
      continue;
    }
    if !c.is_ascii() {
      let ch = text[i..].chars().next().ok_or(ExprError::UnterminatedLiteral)?;
      return Err(ExprError::UnexpectedChar(ch));
    }
    if i + 1 < bytes.len() && bytes[i + 1].is_ascii() {
      let pair = &text[i..i + 2];
      if let Some(op) = TWO_CHAR_OPS.iter().find(|o| **o == pair).copied() {
        toks.push(Tok::Op(op));
        i += 2;
        continue;
      }
    }
    let single = &text[i..i + 1];
    if let Some(op) = ONE_CHAR_OPS.iter().find(|o| **o == single).copied() {
      toks.push(Tok::Op(op));
      i += 1;
      continue;
    }
    return Err(ExprError::UnexpectedChar(c as char));
  }
  Ok(toks)
}

fn lex_number(text: &str, start: usize) -> Result<(Tok, usize), ExprError> {
  let bytes = text.as_bytes();
  let mut i = start;
  let hex = bytes[i] == b'0' && i + 1 < bytes.len() && (bytes[i + 1] == b'x' || bytes[i + 1] == b'X');
  let value;
  if hex {
    i += 2;
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
      i += 1;
    }
    value = u64::from_str_radix(&text[digits_start..i], 16)
      .map(|v| v as f64)
      .map_err(|_| ExprError::MalformedNumber(text[start..i].to_string()))?;
  } else {
    while i < bytes.len() && bytes[i].is_ascii_digit() {
      i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
      i += 1;
      if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
      }
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
    }
    value = text[start..i]
      .parse::<f64>()
      .map_err(|_| ExprError::MalformedNumber(text[start..i].to_string()))?;
  }
  // Integer and float suffixes carry no value.
  while i < bytes.len() && matches!(bytes[i], b'u' | b'U' | b'l' | b'L' | b'f' | b'F') {
    i += 1;
  }
  Ok((Tok::Num(value), i))
}

fn lex_quoted(text: &str, start: usize) -> Result<(Tok, usize), ExprError> {
  let bytes = text.as_bytes();
  let quote = bytes[start];
  let mut out = String::new();
  let mut i = start + 1;
  loop {
    if i >= bytes.len() {
      return Err(ExprError::UnterminatedLiteral);
    }
    let c = bytes[i];
    if c == quote {
      i += 1;
      break;
    }
    if c == b'\\' {
      i += 1;
      if i >= bytes.len() {
        return Err(ExprError::UnterminatedLiteral);
      }
      let esc = bytes[i];
      i += 1;
      match esc {
        b'n' => out.push('\n'),
        b't' => out.push('\t'),
        b'r' => out.push('\r'),
        b'0' => out.push('\0'),
        b'x' => {
          let digits_start = i;
          while i < bytes.len() && bytes[i].is_ascii_hexdigit() && i - digits_start < 4 {
            i += 1;
          }
          let code = u32::from_str_radix(&text[digits_start..i], 16)
            .map_err(|_| ExprError::MalformedNumber(text[digits_start..i].to_string()))?;
          out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
        }
        other => out.push(other as char),
      }
      continue;
    }
    // Step over a full UTF-8 scalar, not a byte.
    let ch = text[i..].chars().next().ok_or(ExprError::UnterminatedLiteral)?;
    out.push(ch);
    i += ch.len_utf8();
  }
  if quote == b'\'' {
    let mut chars = out.chars();
    let first = chars.next().ok_or(ExprError::UnterminatedLiteral)?;
    if chars.next().is_some() {
      return Err(ExprError::UnexpectedToken(out));
    }
    Ok((Tok::Ch(first), i))
  } else {
    Ok((Tok::Str(out), i))
  }
}

const BINARY_LEVELS: &[&[&str]] = &[
  &["||"],
  &["&&"],
  &["|"],
  &["^"],
  &["&"],
  &["==", "!="],
  &["<", ">", "<=", ">="],
  &["<<", ">>"],
  &["+", "-"],
  &["*", "/", "%"],
];

const UNARY_OPS: &[&str] = &["!", "~", "-", "+"];

struct Parser {
  toks: Vec<Tok>,
  pos: usize,
}

impl Parser {
  fn peek(&self) -> Option<&Tok> {
    self.toks.get(self.pos)
  }

  fn advance(&mut self) -> Option<Tok> {
    let tok = self.toks.get(self.pos).cloned();
    if tok.is_some() {
      self.pos += 1;
    }
    tok
  }

  fn eat_op(&mut self, op: &str) -> bool {
    if matches!(self.peek(), Some(Tok::Op(o)) if *o == op) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn expect_op(&mut self, op: &str) -> Result<(), ExprError> {
    if self.eat_op(op) {
      Ok(())
    } else {
      match self.peek() {
        Some(tok) => Err(ExprError::UnexpectedToken(tok.describe())),
        None => Err(ExprError::UnexpectedEnd),
      }
    }
  }

  fn expr(&mut self) -> Result<ExprNode, ExprError> {
    let cond = self.binary(0)?;
    if self.eat_op("?") {
      let if_true = self.expr()?;
      self.expect_op(":")?;
      let if_false = self.expr()?;
      return Ok(ExprNode::Ternary {
        cond: Box::new(cond),
        if_true: Box::new(if_true),
        if_false: Box::new(if_false),
      });
    }
    Ok(cond)
  }

  fn binary(&mut self, level: usize) -> Result<ExprNode, ExprError> {
    if level == BINARY_LEVELS.len() {
      return self.unary();
    }
    let mut left = self.binary(level + 1)?;
    loop {
      let op = match self.peek() {
        Some(Tok::Op(o)) => BINARY_LEVELS[level].iter().find(|cand| *cand == o).copied(),
        _ => None,
      };
      let Some(op) = op else {
        return Ok(left);
      };
      self.pos += 1;
      let right = self.binary(level + 1)?;
      left = ExprNode::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
      };
    }
  }

  fn unary(&mut self) -> Result<ExprNode, ExprError> {
    if let Some(Tok::Op(o)) = self.peek() {
      if let Some(op) = UNARY_OPS.iter().find(|cand| *cand == o).copied() {
        self.pos += 1;
        let operand = self.unary()?;
        return Ok(ExprNode::Unary {
          op,
          operand: Box::new(operand),
        });
      }
    }
    self.primary()
  }

  fn primary(&mut self) -> Result<ExprNode, ExprError> {
    match self.advance() {
      Some(Tok::Num(n)) => Ok(ExprNode::Leaf(Leaf::Number(n))),
      Some(Tok::Str(s)) => Ok(ExprNode::Leaf(Leaf::Text(s))),
      Some(Tok::Ch(c)) => Ok(ExprNode::Leaf(Leaf::Character(c))),
      Some(Tok::Ident(id)) => match id.as_str() {
        "true" => Ok(ExprNode::Leaf(Leaf::Boolean(true))),
        "false" => Ok(ExprNode::Leaf(Leaf::Boolean(false))),
        _ => Ok(ExprNode::Leaf(Leaf::Symbol(id))),
      },
      Some(Tok::Op("(")) => {
        let inner = self.expr()?;
        self.expect_op(")")?;
        // A lone identifier in parens followed by the start of another
        // expression is a cast, e.g. `(DWORD)-1`.
        if let ExprNode::Leaf(Leaf::Symbol(name)) = &inner {
          if self.starts_expression() {
            let operand = self.unary()?;
            return Ok(ExprNode::Cast {
              target: name.clone(),
              operand: Box::new(operand),
            });
          }
        }
        Ok(inner)
      }
      Some(tok) => Err(ExprError::UnexpectedToken(tok.describe())),
      None => Err(ExprError::UnexpectedEnd),
    }
  }

  fn starts_expression(&self) -> bool {
    match self.peek() {
      Some(Tok::Num(_)) | Some(Tok::Str(_)) | Some(Tok::Ch(_)) | Some(Tok::Ident(_)) => true,
      Some(Tok::Op(o)) => *o == "(" || UNARY_OPS.contains(o),
      None => false,
    }
  }
}

/// Parses `text` into an expression tree. The whole input must be consumed.
pub fn parse(text: &str) -> Result<ExprNode, ExprError> {
  let toks = lex(text)?;
  if toks.is_empty() {
    return Err(ExprError::UnexpectedEnd);
  }
  let mut parser = Parser { toks, pos: 0 };
  let node = parser.expr()?;
  match parser.peek() {
    Some(tok) => Err(ExprError::UnexpectedToken(tok.describe())),
    None => Ok(node),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn leaves(text: &str) -> Vec<String> {
    let node = parse(text).unwrap();
    let mut out = Vec::new();
    collect_leaves(&node, &mut out);
    out
      .into_iter()
      .map(|v| match v {
        LeafValue::Leaf(Leaf::Number(n)) => n.to_string(),
        LeafValue::Leaf(Leaf::Text(s)) => format!("\"{}\"", s),
        LeafValue::Leaf(Leaf::Character(c)) => format!("'{}'", c),
        LeafValue::Leaf(Leaf::Boolean(b)) => b.to_string(),
        LeafValue::Leaf(Leaf::Symbol(s)) => s.clone(),
        LeafValue::CastTarget(t) => format!("cast:{}", t),
      })
      .collect()
  }

  #[test]
  fn numbers() {
    assert_eq!(parse("42").unwrap(), ExprNode::Leaf(Leaf::Number(42.0)));
    assert_eq!(parse("0x10").unwrap(), ExprNode::Leaf(Leaf::Number(16.0)));
    assert_eq!(parse("0x10UL").unwrap(), ExprNode::Leaf(Leaf::Number(16.0)));
    assert_eq!(parse("1.5e2").unwrap(), ExprNode::Leaf(Leaf::Number(150.0)));
    assert_eq!(parse("10L").unwrap(), ExprNode::Leaf(Leaf::Number(10.0)));
  }

  #[test]
  fn literals() {
    assert_eq!(
      parse("\"abc\"").unwrap(),
      ExprNode::Leaf(Leaf::Text("abc".to_string()))
    );
    assert_eq!(
      parse("L\"wide\"").unwrap(),
      ExprNode::Leaf(Leaf::Text("wide".to_string()))
    );
    assert_eq!(parse("'a'").unwrap(), ExprNode::Leaf(Leaf::Character('a')));
    assert_eq!(parse("'\\n'").unwrap(), ExprNode::Leaf(Leaf::Character('\n')));
    assert_eq!(parse("true").unwrap(), ExprNode::Leaf(Leaf::Boolean(true)));
  }

  #[test]
  fn precedence() {
    let node = parse("1 + 2 * 3").unwrap();
    let ExprNode::Binary { op, right, .. } = node else {
      panic!("expected binary node");
    };
    assert_eq!(op, "+");
    assert!(matches!(*right, ExprNode::Binary { op: "*", .. }));
  }

  #[test]
  fn shift_and_or() {
    assert_eq!(leaves("(1 << 4) | FLAG_B"), vec!["1", "4", "FLAG_B"]);
  }

  #[test]
  fn ternary() {
    let node = parse("A ? B : C").unwrap();
    assert!(matches!(node, ExprNode::Ternary { .. }));
    assert_eq!(leaves("A ? B : C"), vec!["A", "B", "C"]);
  }

  #[test]
  fn cast_of_negative_literal() {
    let node = parse("(DWORD)-1").unwrap();
    let ExprNode::Cast { target, operand } = node else {
      panic!("expected cast");
    };
    assert_eq!(target, "DWORD");
    assert!(matches!(*operand, ExprNode::Unary { op: "-", .. }));
    assert_eq!(leaves("(DWORD)-1"), vec!["cast:DWORD", "1"]);
  }

  #[test]
  fn parenthesised_symbol_alone_is_not_a_cast() {
    assert_eq!(parse("(X)").unwrap(), ExprNode::Leaf(Leaf::Symbol("X".to_string())));
  }

  #[test]
  fn rejects_garbage() {
    assert!(parse("").is_err());
    assert!(parse("1 +").is_err());
    assert!(parse("@").is_err());
    assert!(parse("\"open").is_err());
    assert!(parse("1 2").is_err());
  }
}
