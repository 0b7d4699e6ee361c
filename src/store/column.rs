use super::entities::{LogLevel, LogRecord};
use serde::{Serialize, Serializer};
use std::fmt;

/// Display text of a record split into literal and substituted spans, so a
/// presentation layer can style parameters differently from the template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParametricString {
    spans: Vec<Span>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    /// True when the span came from a parameter rather than the template
    pub substituted: bool,
}

impl ParametricString {
    pub fn new<S: AsRef<str>>(template: &str, parameters: &[S]) -> Self {
        let mut spans: Vec<Span> = Vec::new();
        for_each_piece(template, parameters, |piece, substituted| {
            let extends_literal = !substituted && spans.last().is_some_and(|last| !last.substituted);
            if extends_literal {
                if let Some(last) = spans.last_mut() {
                    last.text.push_str(piece);
                }
            } else if substituted || !piece.is_empty() {
                spans.push(Span {
                    text: piece.to_string(),
                    substituted,
                });
            }
        });
        Self { spans }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }
}

impl fmt::Display for ParametricString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for span in &self.spans {
            f.write_str(&span.text)?;
        }
        Ok(())
    }
}

impl Serialize for ParametricString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Substitute `{n}` placeholders in `template` with `parameters[n]`.
pub fn render_template<S: AsRef<str>>(template: &str, parameters: &[S]) -> String {
    let mut out = String::with_capacity(template.len());
    for_each_piece(template, parameters, |piece, _| out.push_str(piece));
    out
}

/// Walk a template, reporting literal pieces and substituted parameters in
/// order. `{{` and `}}` stand for literal braces; a placeholder without a
/// matching parameter is kept as written.
fn for_each_piece<S: AsRef<str>>(template: &str, parameters: &[S], mut emit: impl FnMut(&str, bool)) {
    let bytes = template.as_bytes();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                emit(&template[literal_start..=i], false);
                i += 2;
                literal_start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                emit(&template[literal_start..=i], false);
                i += 2;
                literal_start = i;
            }
            b'{' => {
                let digits = bytes[i + 1..]
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                let close = i + 1 + digits;
                let parameter = (digits > 0 && bytes.get(close) == Some(&b'}'))
                    .then(|| template[i + 1..close].parse::<usize>().ok())
                    .flatten()
                    .and_then(|index| parameters.get(index));

                match parameter {
                    Some(value) => {
                        emit(&template[literal_start..i], false);
                        emit(value.as_ref(), true);
                        i = close + 1;
                        literal_start = i;
                    }
                    None => i += 1,
                }
            }
            _ => i += 1,
        }
    }

    emit(&template[literal_start..], false);
}

/// Value of one cell, typed so the presentation layer can style it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Text(ParametricString),
    Str(String),
    Number(u64),
    Level(LogLevel),
    /// Tag slots set on the record, ascending
    Tags(Vec<usize>),
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Text(text) => write!(f, "{text}"),
            ColumnValue::Str(s) => f.write_str(s),
            ColumnValue::Number(n) => write!(f, "{n}"),
            ColumnValue::Level(level) => write!(f, "{level}"),
            ColumnValue::Tags(slots) => {
                let slots: Vec<String> = slots.iter().map(|s| s.to_string()).collect();
                f.write_str(&slots.join(","))
            }
        }
    }
}

pub type FieldAccessor = fn(&LogRecord) -> ColumnValue;

#[derive(Debug, Clone, Copy)]
pub enum ColumnKind {
    /// Template rendered with parameters
    Text,
    /// Timestamp in sortable `YYYY-MM-DDTHH:MM:SS` form
    Time,
    /// Source file name resolved through the file table
    File,
    /// Tag overlay; only views carry tags, the store reports none
    Tags,
    /// Direct record field
    Field(FieldAccessor),
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }
}

fn record_id(record: &LogRecord) -> ColumnValue {
    ColumnValue::Number(record.id as u64)
}

fn process_id(record: &LogRecord) -> ColumnValue {
    ColumnValue::Number(u64::from(record.process_id))
}

fn thread_id(record: &LogRecord) -> ColumnValue {
    ColumnValue::Number(u64::from(record.thread_id))
}

fn level(record: &LogRecord) -> ColumnValue {
    ColumnValue::Level(record.level)
}

pub const DEFAULT_COLUMNS: &[Column] = &[
    Column::new("Id", ColumnKind::Field(record_id)),
    Column::new("Time", ColumnKind::Time),
    Column::new("Process", ColumnKind::Field(process_id)),
    Column::new("Thread", ColumnKind::Field(thread_id)),
    Column::new("Level", ColumnKind::Field(level)),
    Column::new("Text", ColumnKind::Text),
    Column::new("Tags", ColumnKind::Tags),
    Column::new("File", ColumnKind::File),
];
