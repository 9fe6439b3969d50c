//! Boolean query parsing.
//!
//! Grammar, with `AND` and `OR` on a single precedence level folded left to right:
//!
//! ```text
//! expr    := term (("AND" | "OR") term)*
//! term    := "NOT" atom | atom
//! atom    := "(" expr ")" | literal
//! literal := [field ":"] (word | "\"" words "\"" | pattern)
//! ```
//!
//! Operator keywords are case-sensitive. The parser never looks at an index.

use std::fmt;

use crate::error::{QueryError, Result};
use crate::expansion::{WildcardKind, WildcardPattern};
use crate::index::Field;
use crate::tokenizer::{normalize_keyword, tokenize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    Term { field: Option<Field>, term: String },
    Phrase { field: Option<Field>, terms: Vec<String> },
    Wildcard { field: Option<Field>, pattern: WildcardPattern },
    Not(Box<QueryNode>),
    And(Box<QueryNode>, Box<QueryNode>),
    Or(Box<QueryNode>, Box<QueryNode>),
}

impl QueryNode {
    pub fn term(term: &str) -> Self {
        QueryNode::Term { field: None, term: term.to_string() }
    }

    pub fn and(left: QueryNode, right: QueryNode) -> Self {
        QueryNode::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: QueryNode, right: QueryNode) -> Self {
        QueryNode::Or(Box::new(left), Box::new(right))
    }

    pub fn not(child: QueryNode) -> Self {
        QueryNode::Not(Box::new(child))
    }

    /// Literal terms that are not under a `NOT`, with the field they target.
    pub fn positive_terms(&self) -> Vec<(Option<Field>, &str)> {
        let mut out = Vec::new();
        self.collect_positive(&mut out, false);
        out
    }

    fn collect_positive<'a>(&'a self, out: &mut Vec<(Option<Field>, &'a str)>, negated: bool) {
        match self {
            QueryNode::Term { field, term } if !negated => out.push((*field, term)),
            QueryNode::Phrase { field, terms } if !negated => {
                out.extend(terms.iter().map(|t| (*field, t.as_str())));
            }
            QueryNode::Not(child) => child.collect_positive(out, !negated),
            QueryNode::And(l, r) | QueryNode::Or(l, r) => {
                l.collect_positive(out, negated);
                r.collect_positive(out, negated);
            }
            _ => {}
        }
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn prefix(f: &mut fmt::Formatter<'_>, field: &Option<Field>) -> fmt::Result {
            match field {
                Some(field) => write!(f, "{field}:"),
                None => Ok(()),
            }
        }
        match self {
            QueryNode::Term { field, term } => {
                prefix(f, field)?;
                f.write_str(term)
            }
            QueryNode::Phrase { field, terms } => {
                prefix(f, field)?;
                write!(f, "\"{}\"", terms.join(" "))
            }
            QueryNode::Wildcard { field, pattern } => {
                prefix(f, field)?;
                let wc = match pattern.kind {
                    WildcardKind::Many => '*',
                    WildcardKind::One => '?',
                };
                write!(f, "{}{wc}{}", pattern.prefix, pattern.suffix)
            }
            QueryNode::Not(child) => write!(f, "NOT {child}"),
            QueryNode::And(l, r) => write!(f, "({l} AND {r})"),
            QueryNode::Or(l, r) => write!(f, "({l} OR {r})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Word { field: Option<Field>, text: String },
    Phrase { field: Option<Field>, text: String },
}

fn lex(query: &str) -> Result<Vec<(usize, Token)>> {
    let mut tokens = Vec::new();
    let mut chars = query.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((start, Token::LParen));
            }
            ')' => {
                chars.next();
                tokens.push((start, Token::RParen));
            }
            '"' => {
                chars.next();
                let text = read_phrase(&mut chars, start)?;
                tokens.push((start, Token::Phrase { field: None, text }));
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '"') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }

                let qualified = word
                    .split_once(':')
                    .and_then(|(name, rest)| Field::from_name(&name.to_lowercase()).map(|f| (f, rest.to_string())));
                let token = match qualified {
                    Some((field, rest)) if rest.is_empty() => {
                        if chars.peek().map(|&(_, c)| c) == Some('"') {
                            let (quote, _) = chars.next().expect("peeked");
                            let text = read_phrase(&mut chars, quote)?;
                            Token::Phrase { field: Some(field), text }
                        } else {
                            return Err(QueryError::parse(start, format!("missing literal after `{field}:`")));
                        }
                    }
                    Some((field, rest)) => Token::Word { field: Some(field), text: rest },
                    None => match word.as_str() {
                        "AND" => Token::And,
                        "OR" => Token::Or,
                        "NOT" => Token::Not,
                        _ => Token::Word { field: None, text: word },
                    },
                };
                tokens.push((start, token));
            }
        }
    }
    Ok(tokens)
}

fn read_phrase(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, quote: usize) -> Result<String> {
    let mut text = String::new();
    for (_, c) in chars.by_ref() {
        if c == '"' {
            return Ok(text);
        }
        text.push(c);
    }
    Err(QueryError::parse(quote, "unterminated phrase"))
}

/// Parse a query string into an expression tree.
pub fn parse(query: &str) -> Result<QueryNode> {
    let tokens = lex(query)?;
    if tokens.is_empty() {
        return Err(QueryError::parse(0, "empty query"));
    }
    let mut parser = Parser { tokens, pos: 0, end: query.len() };
    let node = parser.expr()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(node),
        Some((at, Token::RParen)) => Err(QueryError::parse(*at, "unbalanced `)`")),
        Some((at, _)) => Err(QueryError::parse(*at, "expected AND or OR between operands")),
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expr(&mut self) -> Result<QueryNode> {
        let mut left = self.term()?;
        loop {
            let combine: fn(QueryNode, QueryNode) -> QueryNode = match self.peek() {
                Some(Token::And) => QueryNode::and,
                Some(Token::Or) => QueryNode::or,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.term()?;
            left = combine(left, right);
        }
    }

    fn term(&mut self) -> Result<QueryNode> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(QueryNode::not(self.atom()?));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<QueryNode> {
        match self.next() {
            Some((at, Token::LParen)) => {
                let inner = self.expr()?;
                match self.next() {
                    Some((_, Token::RParen)) => Ok(inner),
                    _ => Err(QueryError::parse(at, "unbalanced `(`")),
                }
            }
            Some((at, Token::Word { field, text })) => word_literal(at, field, &text),
            Some((at, Token::Phrase { field: Some(Field::Date), text })) => {
                let term = normalize_keyword(&text);
                if term.is_empty() {
                    return Err(QueryError::parse(at, "empty phrase"));
                }
                Ok(QueryNode::Term { field: Some(Field::Date), term })
            }
            Some((at, Token::Phrase { field, text })) => {
                let terms = tokenize(&text);
                if terms.is_empty() {
                    return Err(QueryError::parse(at, "empty phrase"));
                }
                Ok(QueryNode::Phrase { field, terms })
            }
            Some((at, Token::RParen)) => Err(QueryError::parse(at, "missing operand before `)`")),
            Some((at, op)) => Err(QueryError::parse(at, format!("operator {} where an operand was expected", keyword(&op)))),
            None => Err(QueryError::parse(self.end, "missing operand at end of query")),
        }
    }
}

fn keyword(token: &Token) -> &'static str {
    match token {
        Token::And => "AND",
        Token::Or => "OR",
        _ => "NOT",
    }
}

fn word_literal(at: usize, field: Option<Field>, text: &str) -> Result<QueryNode> {
    let normalized = normalize_keyword(text);
    if WildcardPattern::contains_wildcard(&normalized) {
        let pattern = WildcardPattern::parse(&normalized, at)?;
        return Ok(QueryNode::Wildcard { field, pattern });
    }
    if field == Some(Field::Date) {
        return Ok(QueryNode::Term { field, term: normalized });
    }
    let mut terms = tokenize(text);
    match terms.len() {
        0 => Err(QueryError::parse(at, format!("`{text}` has no searchable characters"))),
        1 => Ok(QueryNode::Term { field, term: terms.remove(0) }),
        _ => Ok(QueryNode::Phrase { field, terms }),
    }
}
