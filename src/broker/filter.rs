//! Native filter evaluation
//!
//! A compact evaluator for the broker's filter syntax, enough for the
//! in-memory broker to count, list and remove messages. Supported:
//! - comparisons `=`, `<>`, `<`, `<=`, `>`, `>=` between an identifier and a literal
//! - `IS NULL` / `IS NOT NULL`
//! - `AND`, `OR`, `NOT` and parentheses
//!
//! Header identifiers: `AMQPriority`, `AMQDurable` (`'DURABLE'` / `'NON_DURABLE'`),
//! `AMQTimestamp`, `AMQExpiration`, `AMQUserID`, `AMQGroupID`. Any other
//! identifier is looked up in the message properties.

use super::{BrokerError, CoreMessage};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Cmp(CmpOp),
    LParen,
    RParen,
    And,
    Or,
    Not,
    Is,
    Null,
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Compare(String, CmpOp, Literal),
    IsNull(String, bool),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

/// Parsed native filter
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    expr: Expr,
}

impl Filter {
    /// Parse a filter expression
    pub fn parse(input: &str) -> Result<Self, BrokerError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(BrokerError::InvalidFilter(format!(
                "unexpected trailing input in '{}'",
                input
            )));
        }
        Ok(Self { expr })
    }

    /// Parse an optional filter; `None` or blank matches everything
    pub fn parse_optional(input: Option<&str>) -> Result<Option<Self>, BrokerError> {
        match input {
            Some(s) if !s.trim().is_empty() => Self::parse(s).map(Some),
            _ => Ok(None),
        }
    }

    /// Check whether a message matches
    pub fn matches(&self, message: &CoreMessage) -> bool {
        eval(&self.expr, message)
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, BrokerError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' => {
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(BrokerError::InvalidFilter(format!(
                                "unterminated string in '{}'",
                                input
                            )))
                        }
                        // '' is an escaped quote
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            value.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            '=' => {
                tokens.push(Token::Cmp(CmpOp::Eq));
                i += 1;
            }
            '<' | '>' | '!' => {
                let next = chars.get(i + 1).copied();
                let (op, len) = match (c, next) {
                    ('<', Some('>')) | ('!', Some('=')) => (CmpOp::Ne, 2),
                    ('<', Some('=')) => (CmpOp::Le, 2),
                    ('>', Some('=')) => (CmpOp::Ge, 2),
                    ('<', _) => (CmpOp::Lt, 1),
                    ('>', _) => (CmpOp::Gt, 1),
                    _ => {
                        return Err(BrokerError::InvalidFilter(format!(
                            "unexpected '{}' in '{}'",
                            c, input
                        )))
                    }
                };
                tokens.push(Token::Cmp(op));
                i += len;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse::<f64>().map_err(|_| {
                    BrokerError::InvalidFilter(format!("invalid number '{}'", text))
                })?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '$' | '.'))
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "IS" => Token::Is,
                    "NULL" => Token::Null,
                    "TRUE" => Token::Bool(true),
                    "FALSE" => Token::Bool(false),
                    _ => Token::Ident(word),
                };
                tokens.push(token);
            }
            _ => {
                return Err(BrokerError::InvalidFilter(format!(
                    "unexpected '{}' in '{}'",
                    c, input
                )))
            }
        }
    }

    if tokens.is_empty() {
        return Err(BrokerError::InvalidFilter("empty filter".to_string()));
    }
    Ok(tokens)
}

/// Deepest `NOT` / parenthesis nesting accepted
const MAX_NESTING: usize = 128;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Expr, BrokerError> {
        let mut terms = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.parse_and()?);
        }
        Ok(match terms.len() {
            1 => terms.remove(0),
            _ => Expr::Or(terms),
        })
    }

    fn parse_and(&mut self) -> Result<Expr, BrokerError> {
        let mut terms = vec![self.parse_unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.parse_unary()?);
        }
        Ok(match terms.len() {
            1 => terms.remove(0),
            _ => Expr::And(terms),
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, BrokerError> {
        match self.next() {
            Some(Token::Not) => {
                self.enter()?;
                let inner = self.parse_unary();
                self.depth -= 1;
                Ok(Expr::Not(Box::new(inner?)))
            }
            Some(Token::LParen) => {
                self.enter()?;
                let inner = self.parse_or();
                self.depth -= 1;
                let inner = inner?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(BrokerError::InvalidFilter("missing ')'".to_string())),
                }
            }
            Some(Token::Ident(name)) => self.parse_predicate(name),
            other => Err(BrokerError::InvalidFilter(format!(
                "expected identifier, found {:?}",
                other
            ))),
        }
    }

    fn enter(&mut self) -> Result<(), BrokerError> {
        if self.depth >= MAX_NESTING {
            return Err(BrokerError::InvalidFilter(
                "filter nested too deeply".to_string(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_predicate(&mut self, name: String) -> Result<Expr, BrokerError> {
        match self.next() {
            Some(Token::Cmp(op)) => {
                let literal = match self.next() {
                    Some(Token::Str(s)) => Literal::Str(s),
                    Some(Token::Num(n)) => Literal::Num(n),
                    Some(Token::Bool(b)) => Literal::Bool(b),
                    other => {
                        return Err(BrokerError::InvalidFilter(format!(
                            "expected literal after '{}', found {:?}",
                            name, other
                        )))
                    }
                };
                Ok(Expr::Compare(name, op, literal))
            }
            Some(Token::Is) => {
                let negated = self.peek() == Some(&Token::Not);
                if negated {
                    self.pos += 1;
                }
                match self.next() {
                    Some(Token::Null) => Ok(Expr::IsNull(name, !negated)),
                    _ => Err(BrokerError::InvalidFilter(format!(
                        "expected NULL after '{} IS'",
                        name
                    ))),
                }
            }
            other => Err(BrokerError::InvalidFilter(format!(
                "expected operator after '{}', found {:?}",
                name, other
            ))),
        }
    }
}

/// Value of an identifier for a message
enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

fn lookup(name: &str, message: &CoreMessage) -> Value {
    let opt_str = |v: &Option<String>| v.clone().map(Value::Str).unwrap_or(Value::Null);
    match name {
        "AMQPriority" => Value::Num(message.priority as f64),
        "AMQDurable" => Value::Str(if message.durable { "DURABLE" } else { "NON_DURABLE" }.into()),
        "AMQTimestamp" => Value::Num(message.timestamp as f64),
        "AMQExpiration" => Value::Num(message.expiration as f64),
        "AMQUserID" => opt_str(&message.user_id),
        "AMQGroupID" => opt_str(&message.group_id),
        _ => match message.properties.get(name) {
            Some(serde_json::Value::String(s)) => Value::Str(s.clone()),
            Some(serde_json::Value::Number(n)) => n.as_f64().map(Value::Num).unwrap_or(Value::Null),
            Some(serde_json::Value::Bool(b)) => Value::Bool(*b),
            _ => Value::Null,
        },
    }
}

fn eval(expr: &Expr, message: &CoreMessage) -> bool {
    match expr {
        Expr::And(terms) => terms.iter().all(|t| eval(t, message)),
        Expr::Or(terms) => terms.iter().any(|t| eval(t, message)),
        Expr::Not(inner) => !eval(inner, message),
        Expr::IsNull(name, want_null) => {
            matches!(lookup(name, message), Value::Null) == *want_null
        }
        Expr::Compare(name, op, literal) => match (lookup(name, message), literal) {
            (Value::Num(a), Literal::Num(b)) => compare(a.partial_cmp(b), *op),
            (Value::Str(a), Literal::Str(b)) => match op {
                CmpOp::Eq => a == *b,
                CmpOp::Ne => a != *b,
                _ => false,
            },
            (Value::Bool(a), Literal::Bool(b)) => match op {
                CmpOp::Eq => a == *b,
                CmpOp::Ne => a != *b,
                _ => false,
            },
            // Null or mismatched types never match
            _ => false,
        },
    }
}

fn compare(ordering: Option<std::cmp::Ordering>, op: CmpOp) -> bool {
    use std::cmp::Ordering::*;
    match (ordering, op) {
        (None, _) => false,
        (Some(o), CmpOp::Eq) => o == Equal,
        (Some(o), CmpOp::Ne) => o != Equal,
        (Some(o), CmpOp::Lt) => o == Less,
        (Some(o), CmpOp::Le) => o != Greater,
        (Some(o), CmpOp::Gt) => o == Greater,
        (Some(o), CmpOp::Ge) => o != Less,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> CoreMessage {
        CoreMessage::new("payload")
            .with_priority(7)
            .with_property("color", "red")
            .with_property("size", 12)
            .with_property("fragile", true)
    }

    #[test]
    fn test_header_comparisons() {
        let msg = message();
        assert!(Filter::parse("AMQPriority > 4").unwrap().matches(&msg));
        assert!(!Filter::parse("AMQPriority <= 4").unwrap().matches(&msg));
        assert!(Filter::parse("AMQDurable = 'DURABLE'").unwrap().matches(&msg));
        assert!(!Filter::parse("AMQDurable = 'DURABLE'")
            .unwrap()
            .matches(&msg.clone().non_durable()));
    }

    #[test]
    fn test_property_comparisons() {
        let msg = message();
        assert!(Filter::parse("color = 'red'").unwrap().matches(&msg));
        assert!(Filter::parse("color <> 'blue'").unwrap().matches(&msg));
        assert!(Filter::parse("size >= 12").unwrap().matches(&msg));
        assert!(Filter::parse("fragile = TRUE").unwrap().matches(&msg));
    }

    #[test]
    fn test_boolean_composition() {
        let msg = message();
        assert!(Filter::parse("color = 'blue' OR size = 12").unwrap().matches(&msg));
        assert!(!Filter::parse("color = 'blue' AND size = 12").unwrap().matches(&msg));
        assert!(Filter::parse("NOT (color = 'blue')").unwrap().matches(&msg));
        assert!(Filter::parse("(color = 'red' OR size = 1) AND AMQPriority = 7")
            .unwrap()
            .matches(&msg));
    }

    #[test]
    fn test_null_handling() {
        let msg = message();
        assert!(Filter::parse("missing IS NULL").unwrap().matches(&msg));
        assert!(Filter::parse("color IS NOT NULL").unwrap().matches(&msg));
        assert!(Filter::parse("AMQUserID IS NULL").unwrap().matches(&msg));
        // Comparisons against absent values never match
        assert!(!Filter::parse("missing = 'x'").unwrap().matches(&msg));
        assert!(!Filter::parse("missing <> 'x'").unwrap().matches(&msg));
    }

    #[test]
    fn test_escaped_quote_in_literal() {
        let msg = CoreMessage::new("x").with_property("name", "it's");
        assert!(Filter::parse("name = 'it''s'").unwrap().matches(&msg));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Filter::parse("").is_err());
        assert!(Filter::parse("color = 'red").is_err());
        assert!(Filter::parse("color =").is_err());
        assert!(Filter::parse("(color = 'red'").is_err());
        assert!(Filter::parse("color = 'red' extra").is_err());
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let nots = format!("{}color = 'red'", "NOT ".repeat(200_000));
        assert_eq!(
            Filter::parse(&nots),
            Err(BrokerError::InvalidFilter(
                "filter nested too deeply".to_string()
            ))
        );

        let parens = format!("{}color = 'red'{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(
            Filter::parse(&parens),
            Err(BrokerError::InvalidFilter(_))
        ));

        let shallow = format!("{}color = 'red'", "NOT ".repeat(MAX_NESTING));
        assert!(Filter::parse(&shallow).is_ok());
    }

    #[test]
    fn test_long_conjunction_is_flat() {
        let msg = message();
        let chain = vec!["color = 'red'"; 50_000].join(" AND ");
        assert!(Filter::parse(&chain).unwrap().matches(&msg));
        let chain = vec!["color = 'blue'"; 50_000].join(" OR ");
        assert!(!Filter::parse(&chain).unwrap().matches(&msg));
    }

    #[test]
    fn test_parse_optional_blank() {
        assert!(Filter::parse_optional(None).unwrap().is_none());
        assert!(Filter::parse_optional(Some("   ")).unwrap().is_none());
        assert!(Filter::parse_optional(Some("a = 1")).unwrap().is_some());
    }
}
