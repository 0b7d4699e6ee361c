use super::error::FilterParseError;
use super::expression::{Expression, MatchText};
use super::parser::parse;
use crate::store::{LogRecord, LogStore};
use std::fmt;
use std::str::FromStr;

/// A compiled filter: the text the user typed and the tree built from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    text: String,
    expression: Expression,
}

impl Filter {
    pub fn new(text: &str) -> Result<Self, FilterParseError> {
        Ok(Self {
            text: text.to_string(),
            expression: parse(text)?,
        })
    }

    /// Parse optional filter text, treating blank text as "no filter"
    pub fn optional(text: &str) -> Result<Option<Self>, FilterParseError> {
        if text.trim().is_empty() {
            Ok(None)
        } else {
            Self::new(text).map(Some)
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Match already rendered record text
    pub fn matches_text(&self, text: &str) -> bool {
        self.expression.evaluate(&MatchText::new(text))
    }

    /// Match a record of `store`; its text is rendered once for the whole tree
    pub fn matches(&self, store: &LogStore, record: &LogRecord) -> bool {
        self.matches_text(&store.render_text(record))
    }

    /// Warnings for terms that are valid but probably not what the user meant
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        collect_warnings(&self.expression, &mut warnings);
        warnings
    }
}

fn collect_warnings(expr: &Expression, out: &mut Vec<String>) {
    match expr {
        Expression::ContentMatch(pattern) => {
            let source = pattern.source();
            if source == "&" || source == "|" {
                out.push(format!(
                    "Pattern '{source}' is matched as text; use '{source}{source}' for the logical operator"
                ));
            } else if source.is_empty() {
                out.push("Empty quoted pattern matches every record".to_string());
            }
        }
        Expression::And(lhs, rhs) | Expression::Or(lhs, rhs) => {
            collect_warnings(lhs, out);
            collect_warnings(rhs, out);
        }
        Expression::Not(operand) | Expression::Parenthesised(operand) => {
            collect_warnings(operand, out)
        }
    }
}

impl FromStr for Filter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Print filter warnings to stderr
pub fn print_filter_warnings(filter: &Filter) {
    for warning in filter.warnings() {
        eprintln!("Warning: {warning}");
    }
}
