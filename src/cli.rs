use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Browse structured log records through chained filter expressions
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML config file (checkpoint interval, tag slots, displayed columns)
    #[arg(long, global = true, env = "LOG_SIEVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print diagnostics to stderr; repeat for more
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress diagnostics and progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    pub color: ColorMode,

    #[arg(short = 'F', long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Also write the output to this file
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where records come from and which view they are read through
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// JSON-lines file of records (template, parameters, time, thread_id,
    /// process_id, level, file)
    pub file: PathBuf,

    /// Filter expression; each repetition creates a child of the previous view
    #[arg(short = 'f', long = "filter", value_name = "EXPR")]
    pub filters: Vec<String>,

    /// Skip records not matching this expression while loading
    #[arg(long, value_name = "EXPR")]
    pub ingest_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    pub slot: usize,
    pub expression: String,
}

fn parse_tag_spec(value: &str) -> Result<TagSpec, String> {
    let (slot, expression) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SLOT=EXPR, got '{value}'"))?;
    let slot = slot
        .trim()
        .parse()
        .map_err(|_| format!("invalid tag slot '{}'", slot.trim()))?;
    Ok(TagSpec {
        slot,
        expression: expression.to_string(),
    })
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the rows of the innermost filtered view
    View {
        #[command(flatten)]
        source: SourceArgs,

        /// Tag records matching EXPR with SLOT, e.g. --tag 0=error
        #[arg(long = "tag", value_name = "SLOT=EXPR", value_parser = parse_tag_spec)]
        tags: Vec<TagSpec>,

        /// Print at most this many rows (overrides the config)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// First row to print
        #[arg(long, default_value_t = 0)]
        from: usize,
    },
    /// Find the first row of the view matching an expression
    Find {
        #[command(flatten)]
        source: SourceArgs,

        /// Expression to search for
        #[arg(short = 'e', long = "expr", value_name = "EXPR")]
        expression: String,

        /// Row to start from, inclusive
        #[arg(long, default_value_t = 0)]
        from: usize,

        /// Search towards the first row
        #[arg(short, long)]
        backward: bool,
    },
    /// Count the rows of the view matching an expression
    Count {
        #[command(flatten)]
        source: SourceArgs,

        /// Expression to count; omit to count every row of the view
        #[arg(short = 'e', long = "expr", value_name = "EXPR")]
        expression: Option<String>,
    },
    /// Parse a filter expression and print its structure
    Check {
        expression: String,
    },
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}
