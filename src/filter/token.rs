use super::error::FilterParseError;
use std::fmt;

/// Kind of a filter token, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Content,
    And,
    Or,
    Not,
    Open,
    Close,
    EndOfInput,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Content => write!(f, "filter content"),
            TokenKind::And => write!(f, "'&&'"),
            TokenKind::Or => write!(f, "'||'"),
            TokenKind::Not => write!(f, "'!'"),
            TokenKind::Open => write!(f, "'('"),
            TokenKind::Close => write!(f, "')'"),
            TokenKind::EndOfInput => write!(f, "end of input"),
        }
    }
}

/// A token of the filter language together with its byte offset in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Free-text pattern matched against the rendered record text
    Content { pattern: String, offset: usize },
    And { offset: usize },
    Or { offset: usize },
    Not { offset: usize },
    Open { offset: usize },
    Close { offset: usize },
    EndOfInput { offset: usize },
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Content { .. } => TokenKind::Content,
            Token::And { .. } => TokenKind::And,
            Token::Or { .. } => TokenKind::Or,
            Token::Not { .. } => TokenKind::Not,
            Token::Open { .. } => TokenKind::Open,
            Token::Close { .. } => TokenKind::Close,
            Token::EndOfInput { .. } => TokenKind::EndOfInput,
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Token::Content { offset, .. }
            | Token::And { offset }
            | Token::Or { offset }
            | Token::Not { offset }
            | Token::Open { offset }
            | Token::Close { offset }
            | Token::EndOfInput { offset } => *offset,
        }
    }

    /// Whether this token can start a primary (`content`, `(` or `!`)
    pub fn starts_primary(&self) -> bool {
        matches!(
            self,
            Token::Content { .. } | Token::Open { .. } | Token::Not { .. }
        )
    }
}

/// Split filter text into tokens.
///
/// `&&`, `||`, `!`, `(` and `)` are reserved. Whitespace separates content
/// patterns, and a double-quoted segment is a single content pattern taken
/// verbatim, reserved characters included. The result always ends with
/// [`Token::EndOfInput`].
pub fn tokenize(text: &str) -> Result<Vec<Token>, FilterParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b if b.is_ascii_whitespace() => i += 1,
            b'(' => {
                tokens.push(Token::Open { offset: i });
                i += 1;
            }
            b')' => {
                tokens.push(Token::Close { offset: i });
                i += 1;
            }
            b'!' => {
                tokens.push(Token::Not { offset: i });
                i += 1;
            }
            b'&' if bytes.get(i + 1) == Some(&b'&') => {
                tokens.push(Token::And { offset: i });
                i += 2;
            }
            b'|' if bytes.get(i + 1) == Some(&b'|') => {
                tokens.push(Token::Or { offset: i });
                i += 2;
            }
            b'"' => {
                let close = text[i + 1..]
                    .find('"')
                    .ok_or(FilterParseError::UnterminatedQuote { offset: i })?;
                let end = i + 1 + close;
                tokens.push(Token::Content {
                    pattern: text[i + 1..end].to_string(),
                    offset: i,
                });
                i = end + 1;
            }
            _ => {
                let start = i;
                while i < bytes.len() && !is_content_boundary(bytes, i) {
                    i += 1;
                }
                tokens.push(Token::Content {
                    pattern: text[start..i].to_string(),
                    offset: start,
                });
            }
        }
    }

    tokens.push(Token::EndOfInput { offset: text.len() });
    Ok(tokens)
}

fn is_content_boundary(bytes: &[u8], i: usize) -> bool {
    match bytes[i] {
        b if b.is_ascii_whitespace() => true,
        b'(' | b')' | b'!' | b'"' => true,
        b'&' => bytes.get(i + 1) == Some(&b'&'),
        b'|' => bytes.get(i + 1) == Some(&b'|'),
        _ => false,
    }
}
