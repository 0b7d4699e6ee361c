use super::token::TokenKind;
use thiserror::Error;

/// Errors that can occur when parsing filter expressions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error("Unexpected {found} at offset {offset}, expected {}", expected_list(expected))]
    UnexpectedToken {
        found: TokenKind,
        expected: Vec<TokenKind>,
        offset: usize,
    },

    #[error("Unterminated quote starting at offset {offset}")]
    UnterminatedQuote { offset: usize },

    #[error("Invalid pattern '{pattern}' at offset {offset}: {reason}")]
    InvalidPattern {
        pattern: String,
        offset: usize,
        reason: String,
    },

    #[error("Malformed filter expression at offset {offset}: {reason}")]
    Malformed { reason: String, offset: usize },
}

impl FilterParseError {
    /// Byte offset into the filter text the error points at
    pub fn offset(&self) -> usize {
        match self {
            FilterParseError::UnexpectedToken { offset, .. }
            | FilterParseError::UnterminatedQuote { offset }
            | FilterParseError::InvalidPattern { offset, .. }
            | FilterParseError::Malformed { offset, .. } => *offset,
        }
    }
}

fn expected_list(expected: &[TokenKind]) -> String {
    let names: Vec<String> = expected.iter().map(|k| k.to_string()).collect();
    match names.len() {
        0 => "nothing".to_string(),
        1 => names[0].clone(),
        n => format!("{} or {}", names[..n - 1].join(", "), names[n - 1]),
    }
}
