use super::error::FilterParseError;
use regex::{Regex, RegexBuilder};
use std::cell::OnceCell;
use std::fmt;

/// A compiled content pattern.
///
/// Plain text matches as a case-insensitive substring. Text written as
/// `/.../` is compiled as a case-insensitive regular expression.
#[derive(Debug, Clone)]
pub struct ContentPattern {
    source: String,
    matcher: PatternMatcher,
}

#[derive(Debug, Clone)]
enum PatternMatcher {
    Substring(String),
    Regex(Regex),
}

impl ContentPattern {
    pub fn compile(source: &str, offset: usize) -> Result<Self, FilterParseError> {
        let matcher = match regex_body(source) {
            Some(body) => {
                let regex = RegexBuilder::new(body)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| FilterParseError::InvalidPattern {
                        pattern: source.to_string(),
                        offset,
                        reason: e.to_string(),
                    })?;
                PatternMatcher::Regex(regex)
            }
            None => PatternMatcher::Substring(source.to_lowercase()),
        };

        Ok(Self {
            source: source.to_string(),
            matcher,
        })
    }

    /// The pattern as written in the filter text
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_regex(&self) -> bool {
        matches!(self.matcher, PatternMatcher::Regex(_))
    }

    pub fn is_match(&self, text: &MatchText<'_>) -> bool {
        match &self.matcher {
            PatternMatcher::Substring(needle) => text.lowercase().contains(needle.as_str()),
            PatternMatcher::Regex(regex) => regex.is_match(text.raw()),
        }
    }
}

impl PartialEq for ContentPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for ContentPattern {}

fn regex_body(source: &str) -> Option<&str> {
    if source.len() >= 2 && source.starts_with('/') && source.ends_with('/') {
        Some(&source[1..source.len() - 1])
    } else {
        None
    }
}

/// Rendered record text under evaluation; the lowercase form is computed at
/// most once no matter how many leaves look at it.
pub struct MatchText<'a> {
    raw: &'a str,
    lower: OnceCell<String>,
}

impl<'a> MatchText<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            lower: OnceCell::new(),
        }
    }

    pub fn raw(&self) -> &str {
        self.raw
    }

    pub fn lowercase(&self) -> &str {
        self.lower.get_or_init(|| self.raw.to_lowercase())
    }
}

/// Filter expression tree produced by the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    ContentMatch(ContentPattern),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    /// Kept only so the tree prints the way it was written
    Parenthesised(Box<Expression>),
}

impl Expression {
    /// Evaluate the tree against a record's rendered text.
    ///
    /// `And` and `Or` short-circuit left to right.
    pub fn evaluate(&self, text: &MatchText<'_>) -> bool {
        match self {
            Expression::ContentMatch(pattern) => pattern.is_match(text),
            Expression::And(lhs, rhs) => lhs.evaluate(text) && rhs.evaluate(text),
            Expression::Or(lhs, rhs) => lhs.evaluate(text) || rhs.evaluate(text),
            Expression::Not(operand) => !operand.evaluate(text),
            Expression::Parenthesised(operand) => operand.evaluate(text),
        }
    }

    /// Prefix form that makes the tree shape explicit, e.g. `(or a (and b c))`.
    ///
    /// Parenthesised nodes are transparent here.
    pub fn to_sexpr(&self) -> String {
        match self {
            Expression::ContentMatch(pattern) => pattern.source().to_string(),
            Expression::And(lhs, rhs) => format!("(and {} {})", lhs.to_sexpr(), rhs.to_sexpr()),
            Expression::Or(lhs, rhs) => format!("(or {} {})", lhs.to_sexpr(), rhs.to_sexpr()),
            Expression::Not(operand) => format!("(not {})", operand.to_sexpr()),
            Expression::Parenthesised(operand) => operand.to_sexpr(),
        }
    }

    /// Number of content leaves in the tree
    pub fn leaf_count(&self) -> usize {
        match self {
            Expression::ContentMatch(_) => 1,
            Expression::And(lhs, rhs) | Expression::Or(lhs, rhs) => {
                lhs.leaf_count() + rhs.leaf_count()
            }
            Expression::Not(operand) | Expression::Parenthesised(operand) => operand.leaf_count(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::ContentMatch(pattern) => {
                let source = pattern.source();
                if source.is_empty() || source.contains(|c: char| c.is_whitespace() || "()!&|".contains(c)) {
                    write!(f, "\"{source}\"")
                } else {
                    write!(f, "{source}")
                }
            }
            Expression::And(lhs, rhs) => write!(f, "{lhs} && {rhs}"),
            Expression::Or(lhs, rhs) => write!(f, "{lhs} || {rhs}"),
            Expression::Not(operand) => write!(f, "!{operand}"),
            Expression::Parenthesised(operand) => write!(f, "({operand})"),
        }
    }
}
