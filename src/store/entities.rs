use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Severity of a log record. Each level is a distinct bit so sets of levels
/// can be expressed as masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    Critical = 1,
    Error = 2,
    Warning = 4,
    Info = 8,
    Verbose = 16,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Critical,
        LogLevel::Error,
        LogLevel::Warning,
        LogLevel::Info,
        LogLevel::Verbose,
    ];

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Whether this level is contained in a mask of level bits
    pub fn in_mask(self, mask: u8) -> bool {
        mask & self.bits() != 0
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Critical => "Critical",
            LogLevel::Error => "Error",
            LogLevel::Warning => "Warning",
            LogLevel::Info => "Info",
            LogLevel::Verbose => "Verbose",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" | "fatal" => Ok(LogLevel::Critical),
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "verbose" | "debug" | "trace" => Ok(LogLevel::Verbose),
            _ => Err(format!("Unknown log level '{s}'")),
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

/// Per-record metadata supplied by the ingestion side alongside the
/// template and parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    pub time: DateTime<Utc>,
    pub thread_id: u32,
    pub process_id: u32,
    pub level: LogLevel,
    /// Index into the store's file-name table
    pub file_index: usize,
}

/// A single record of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Position in the store, equal to append order
    pub id: usize,
    pub template_id: usize,
    /// Interned parameter values substituted into the template
    pub parameters: Box<[Arc<str>]>,
    pub time: DateTime<Utc>,
    pub thread_id: u32,
    pub process_id: u32,
    pub level: LogLevel,
    pub file_index: usize,
}

/// One record as handed over by an ingestion backend, before interning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub template: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub thread_id: u32,
    #[serde(default)]
    pub process_id: u32,
    pub level: LogLevel,
    #[serde(default)]
    pub file: String,
}
