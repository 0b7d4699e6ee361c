//! Filter expression parsing and matching
//!
//! Filters are small boolean expressions over free-text patterns. Each
//! pattern is matched against the rendered text of a log record (the
//! template with its parameters substituted).
//!
//! # Syntax
//!
//! ```text
//! pattern              Case-insensitive substring match
//! "two words"          Quoted pattern, taken verbatim (may contain && ( ) ! ||)
//! /regex/              Case-insensitive regular expression
//! a && b               Both match
//! a || b               Either matches
//! !a                   Does not match
//! (a || b) c           Grouping; adjacent terms combine with &&
//! ```
//!
//! `!` binds tighter than `&&`, which binds tighter than `||`. Binary
//! operators are left-associative.
//!
//! # Examples
//!
//! ```text
//! timeout                                 # Records mentioning timeout
//! error !retry                            # Errors that are not retries
//! "connection reset" || refused           # Either failure
//! (socket || http) && /status=5\d\d/      # 5xx from socket or http layers
//! ```

pub mod error;
pub mod expression;
pub mod matcher;
pub mod parser;
pub mod token;

pub use error::FilterParseError;
pub use expression::{ContentPattern, Expression, MatchText};
pub use matcher::{Filter, print_filter_warnings};
pub use parser::{Parser, parse};
pub use token::{Token, TokenKind, tokenize};
