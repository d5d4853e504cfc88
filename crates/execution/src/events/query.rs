// Path: crates/execution/src/events/query.rs
//! The subscription query grammar.
//!
//! Tagged-attribute predicates: `tag op value` conditions with `=`, `<`,
//! `>`, `<=`, `>=` and `CONTAINS`, grouped by parentheses and combined
//! with `AND`, `OR` and `NOT`. String operands are single-quoted; bare
//! operands are compared numerically when both sides parse as integers.
//!
//! ```text
//! tx.hash = 'AB12' AND height > 10
//! NOT (tx.type = 'SendTx' OR tx.type = 'CallTx')
//! ```

use thiserror::Error;

/// A malformed query string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid query: {0}")]
pub struct QueryParseError(String);

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Exact match (numeric when both sides are integers).
    Equal,
    /// Numeric less-than.
    Less,
    /// Numeric greater-than.
    Greater,
    /// Numeric less-or-equal.
    LessOrEqual,
    /// Numeric greater-or-equal.
    GreaterOrEqual,
    /// Substring match.
    Contains,
}

/// One `tag op value` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// The tag key, e.g. `tx.hash`.
    pub tag: String,
    /// The comparison operator.
    pub op: Op,
    /// The right-hand operand, unquoted.
    pub operand: String,
}

impl Condition {
    fn matches(&self, value: &str) -> bool {
        match self.op {
            Op::Equal => match (value.parse::<i128>(), self.operand.parse::<i128>()) {
                (Ok(a), Ok(b)) => a == b,
                _ => value == self.operand,
            },
            Op::Contains => value.contains(&self.operand),
            numeric => match (value.parse::<i128>(), self.operand.parse::<i128>()) {
                (Ok(a), Ok(b)) => match numeric {
                    Op::Less => a < b,
                    Op::Greater => a > b,
                    Op::LessOrEqual => a <= b,
                    Op::GreaterOrEqual => a >= b,
                    _ => false,
                },
                _ => false,
            },
        }
    }
}

/// A parsed subscription query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// A leaf condition.
    Cond(Condition),
    /// Both sides must match.
    And(Box<Query>, Box<Query>),
    /// Either side must match.
    Or(Box<Query>, Box<Query>),
    /// The inner query must not match.
    Not(Box<Query>),
}

impl Query {
    /// The common case: `tag = 'value'`.
    pub fn equal(tag: impl Into<String>, operand: impl Into<String>) -> Self {
        Query::Cond(Condition {
            tag: tag.into(),
            op: Op::Equal,
            operand: operand.into(),
        })
    }

    /// Evaluates the query against a tag lookup. A condition on an absent
    /// tag does not match.
    pub fn matches<F>(&self, get_tag: &F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            Query::Cond(cond) => get_tag(&cond.tag).is_some_and(|v| cond.matches(&v)),
            Query::And(a, b) => a.matches(get_tag) && b.matches(get_tag),
            Query::Or(a, b) => a.matches(get_tag) || b.matches(get_tag),
            Query::Not(inner) => !inner.matches(get_tag),
        }
    }
}

impl std::str::FromStr for Query {
    type Err = QueryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(s)?;
        let mut parser = Parser { tokens, pos: 0 };
        let query = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(QueryParseError(format!(
                "unexpected trailing input at token {}",
                parser.pos
            )));
        }
        Ok(query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Op(Op),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(s: &str) -> Result<Vec<Token>, QueryParseError> {
    let mut tokens = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Op(Op::Equal));
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(Op::LessOrEqual));
                } else {
                    tokens.push(Token::Op(Op::Less));
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(Op::GreaterOrEqual));
                } else {
                    tokens.push(Token::Op(Op::Greater));
                }
            }
            '\'' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => value.push(c),
                        None => return Err(QueryParseError("unterminated string".into())),
                    }
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_alphanumeric() || c == '.' || c == '_' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '.' || c == '_' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "AND" => tokens.push(Token::And),
                    "OR" => tokens.push(Token::Or),
                    "NOT" => tokens.push(Token::Not),
                    "CONTAINS" => tokens.push(Token::Op(Op::Contains)),
                    _ => tokens.push(Token::Ident(word)),
                }
            }
            other => {
                return Err(QueryParseError(format!("unexpected character '{other}'")));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // or := and ( OR and )*
    fn parse_or(&mut self) -> Result<Query, QueryParseError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.parse_and()?;
            left = Query::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // and := unary ( AND unary )*
    fn parse_and(&mut self) -> Result<Query, QueryParseError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.parse_unary()?;
            left = Query::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // unary := NOT unary | '(' or ')' | condition
    fn parse_unary(&mut self) -> Result<Query, QueryParseError> {
        match self.peek() {
            Some(Token::Not) => {
                self.next();
                Ok(Query::Not(Box::new(self.parse_unary()?)))
            }
            Some(Token::LParen) => {
                self.next();
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(QueryParseError("expected ')'".into())),
                }
            }
            _ => self.parse_condition(),
        }
    }

    fn parse_condition(&mut self) -> Result<Query, QueryParseError> {
        let tag = match self.next() {
            Some(Token::Ident(tag)) => tag,
            other => return Err(QueryParseError(format!("expected tag, got {other:?}"))),
        };
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            other => return Err(QueryParseError(format!("expected operator, got {other:?}"))),
        };
        let operand = match self.next() {
            Some(Token::Str(s)) => s,
            Some(Token::Ident(s)) => s,
            other => return Err(QueryParseError(format!("expected operand, got {other:?}"))),
        };
        Ok(Query::Cond(Condition { tag, op, operand }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn matches(query: &str, pairs: &[(&str, &str)]) -> bool {
        let q: Query = query.parse().unwrap();
        let map = tags(pairs);
        q.matches(&|key: &str| map.get(key).cloned())
    }

    #[test]
    fn equality_and_height() {
        assert!(matches(
            "tx.hash = 'ab12' AND height > 10",
            &[("tx.hash", "ab12"), ("height", "11")]
        ));
        assert!(!matches(
            "tx.hash = 'ab12' AND height > 10",
            &[("tx.hash", "ab12"), ("height", "10")]
        ));
    }

    #[test]
    fn numeric_comparisons() {
        assert!(matches("height >= 7", &[("height", "7")]));
        assert!(matches("height <= 7", &[("height", "7")]));
        assert!(matches("height < 8", &[("height", "7")]));
        assert!(!matches("height < 7", &[("height", "7")]));
        // Non-numeric values never satisfy ordering operators.
        assert!(!matches("height < 8", &[("height", "high")]));
    }

    #[test]
    fn contains_and_not() {
        assert!(matches("tx.type CONTAINS 'Send'", &[("tx.type", "SendTx")]));
        assert!(matches("NOT tx.type = 'CallTx'", &[("tx.type", "SendTx")]));
        assert!(!matches("NOT tx.type = 'SendTx'", &[("tx.type", "SendTx")]));
    }

    #[test]
    fn parentheses_and_precedence() {
        // AND binds tighter than OR.
        let q = "a = '1' OR b = '2' AND c = '3'";
        assert!(matches(q, &[("a", "1")]));
        assert!(matches(q, &[("b", "2"), ("c", "3")]));
        assert!(!matches(q, &[("b", "2")]));

        let grouped = "(a = '1' OR b = '2') AND c = '3'";
        assert!(!matches(grouped, &[("a", "1")]));
        assert!(matches(grouped, &[("a", "1"), ("c", "3")]));
    }

    #[test]
    fn absent_tag_never_matches() {
        assert!(!matches("missing = '1'", &[("present", "1")]));
        // But NOT over an absent tag does.
        assert!(matches("NOT missing = '1'", &[("present", "1")]));
    }

    #[test]
    fn rejects_garbage() {
        assert!("= 'x'".parse::<Query>().is_err());
        assert!("a = ".parse::<Query>().is_err());
        assert!("a = 'x' b".parse::<Query>().is_err());
        assert!("(a = 'x'".parse::<Query>().is_err());
    }
}
