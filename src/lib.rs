pub mod cli;
pub mod config;
pub mod display;
pub mod filter;
pub mod store;
pub mod view;

use crate::config::ViewerConfig;
use crate::display::{
    drive_progress, format_filter_tree, format_parse_error, format_rows_json, format_rows_text,
    format_view_chain, resolve_columns,
};
use crate::filter::{Filter, print_filter_warnings};
use anyhow::{Context, anyhow, bail};
pub use cli::{Cli, ColorMode, Commands, OutputFormat, SourceArgs, TagSpec, cli_parse};
pub use store::{
    CancelToken, JsonLinesSource, LogLevel, LogRecord, LogStore, MemorySource, RawRecord,
    RecordSource,
};
pub use view::{FilteredView, ItemAdded, LogDocument, ResultSlot, ViewError, ViewId, ViewOptions};
use serde_json::json;
use std::path::Path;

/// Global switches shared by every command
struct Output<'a> {
    format: OutputFormat,
    file: Option<&'a Path>,
    verbose: u8,
    quiet: bool,
}

impl Output<'_> {
    fn diagnostics(&self, level: u8) -> bool {
        !self.quiet && self.verbose >= level
    }

    fn progress_visible(&self) -> bool {
        !self.quiet
    }

    /// Print `console` and write `plain` to the output file, if any
    fn emit(&self, console: &str, plain: &str) -> anyhow::Result<()> {
        print!("{console}");
        if let Some(path) = self.file {
            std::fs::write(path, plain)
                .with_context(|| format!("Failed to write output file '{}'", path.display()))?;
        }
        Ok(())
    }
}

fn parse_filter(text: &str, out: &Output<'_>) -> anyhow::Result<Filter> {
    let filter = Filter::new(text)
        .map_err(|e| anyhow!("Invalid filter expression:\n{}", format_parse_error(text, &e)))?;
    if !out.quiet {
        print_filter_warnings(&filter);
    }
    Ok(filter)
}

/// Load the record file and build the chain of views named on the command
/// line. The last id of the chain is the view commands operate on.
fn open_document(
    source: &SourceArgs,
    config: &ViewerConfig,
    out: &Output<'_>,
) -> anyhow::Result<(LogDocument, Vec<ViewId>)> {
    let options = config.view_options();
    let mut records = JsonLinesSource::open(&source.file)
        .with_context(|| format!("Failed to open record file '{}'", source.file.display()))?
        .with_checkpoint_interval(options.checkpoint_interval);
    let ingest_filter = source
        .ingest_filter
        .as_deref()
        .map(|text| parse_filter(text, out))
        .transpose()?;

    let mut doc = LogDocument::with_options(LogStore::new(), options);
    let cancel = CancelToken::new();
    drive_progress(
        doc.load(&mut records, ingest_filter.as_ref(), &cancel),
        "loading",
        out.progress_visible(),
    );

    let errors = records.take_errors();
    if out.diagnostics(1) {
        for error in &errors {
            eprintln!("Skipped: {error}");
        }
    } else if !errors.is_empty() && !out.quiet {
        eprintln!(
            "Warning: skipped {} malformed line(s) in '{}' (use -v for details)",
            errors.len(),
            source.file.display()
        );
    }
    if out.diagnostics(1) {
        eprintln!(
            "Loaded {} records ({} templates, {} distinct parameters)",
            doc.store().len(),
            doc.store().templates().len(),
            doc.store().interned_count()
        );
    }

    let mut chain = vec![LogDocument::ROOT];
    drive_progress(doc.initialize(LogDocument::ROOT)?, "indexing", out.progress_visible());

    for text in &source.filters {
        let filter = parse_filter(text, out)?;
        let parent = chain[chain.len() - 1];
        let child = doc.create_child(parent, Some(filter))?;
        drive_progress(doc.initialize(child)?, "filtering", out.progress_visible());
        chain.push(child);
    }

    if out.diagnostics(1) {
        eprint!("{}", format_view_chain(&doc, &chain));
    }
    Ok((doc, chain))
}

fn innermost(chain: &[ViewId]) -> ViewId {
    chain.last().copied().unwrap_or(LogDocument::ROOT)
}

pub fn run() -> anyhow::Result<()> {
    let cli = cli_parse();
    let config = crate::config::load_config(cli.config.as_deref()).context("Failed to load config")?;

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }

    let out = Output {
        format: cli.format,
        file: cli.output.as_deref(),
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    if out.diagnostics(1) {
        eprintln!("Verbosity level: {}", cli.verbose);
        eprintln!("Color mode: {:?}", cli.color);
        eprintln!("Config profile: {}", config.profile_name);
        if let Some(config_path) = &cli.config {
            eprintln!("Config file: {}", config_path.display());
        }
        if let Some(path) = out.file {
            eprintln!("Output will be written to: {}", path.display());
        }
    }

    match &cli.command {
        Commands::View {
            source,
            tags,
            limit,
            from,
        } => {
            let (mut doc, chain) = open_document(source, &config, &out)?;
            let view = innermost(&chain);

            for spec in tags {
                let filter = if spec.expression.trim().is_empty() {
                    None
                } else {
                    Some(parse_filter(&spec.expression, &out)?)
                };
                let tagged = doc.tag(view, spec.slot, filter)?;
                if out.diagnostics(1) {
                    eprintln!("Tag slot {}: {tagged} records", spec.slot);
                }
            }

            let total = doc.total_count(view)?;
            let start = (*from).min(total);
            let end = limit
                .or(config.display.max_rows)
                .map_or(total, |n| start.saturating_add(n).min(total));
            doc.view_mut(view)?.set_first_displayed_row(Some(start));

            let columns = resolve_columns(&doc, &config.display.show_columns);
            match out.format {
                OutputFormat::Text => {
                    let footer = format!("Showing rows {start}..{end} of {total} in view {view}\n");
                    let console = format_rows_text(&doc, view, &columns, start..end, true)?;
                    let plain = format_rows_text(&doc, view, &columns, start..end, false)?;
                    out.emit(&format!("{console}{footer}"), &format!("{plain}{footer}"))?;
                }
                OutputFormat::Json => {
                    let json = format_rows_json(&doc, view, &columns, start..end)?;
                    out.emit(&format!("{json}\n"), &json)?;
                }
            }
        }
        Commands::Find {
            source,
            expression,
            from,
            backward,
        } => {
            let (doc, chain) = open_document(source, &config, &out)?;
            let view = innermost(&chain);
            let filter = parse_filter(expression, &out)?;

            let result = ResultSlot::new();
            drive_progress(
                doc.find(view, &filter, *from, !*backward, result.clone())?,
                "searching",
                out.progress_visible(),
            );

            match (out.format, result.get()) {
                (OutputFormat::Text, Some(row)) => {
                    let columns = resolve_columns(&doc, &config.display.show_columns);
                    let footer = format!("Found at row {row} of view {view}\n");
                    let console = format_rows_text(&doc, view, &columns, row..row + 1, true)?;
                    let plain = format_rows_text(&doc, view, &columns, row..row + 1, false)?;
                    out.emit(&format!("{console}{footer}"), &format!("{plain}{footer}"))?;
                }
                (OutputFormat::Text, None) => {
                    let message = format!("No row of view {view} matches '{filter}'\n");
                    out.emit(&message, &message)?;
                }
                (OutputFormat::Json, row) => {
                    let record = row.map(|row| doc.view(view).and_then(|v| v.record_id(row))).transpose()?;
                    let json = serde_json::to_string_pretty(&json!({ "row": row, "record": record }))?;
                    out.emit(&format!("{json}\n"), &json)?;
                }
            }
        }
        Commands::Count { source, expression } => {
            let (doc, chain) = open_document(source, &config, &out)?;
            let view = innermost(&chain);
            let total = doc.total_count(view)?;

            let count = match expression {
                Some(text) => {
                    let filter = parse_filter(text, &out)?;
                    let result = ResultSlot::new();
                    drive_progress(
                        doc.count(view, &filter, result.clone())?,
                        "counting",
                        out.progress_visible(),
                    );
                    result
                        .get()
                        .ok_or_else(|| anyhow!("Counting stopped before the end of view {view}"))?
                }
                None => total,
            };

            match out.format {
                OutputFormat::Text => {
                    let line = format!("{count} of {total} rows\n");
                    out.emit(&line, &line)?;
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&json!({ "count": count, "total": total }))?;
                    out.emit(&format!("{json}\n"), &json)?;
                }
            }
        }
        Commands::Check { expression } => match Filter::new(expression) {
            Ok(filter) => {
                if !out.quiet {
                    print_filter_warnings(&filter);
                }
                match out.format {
                    OutputFormat::Text => {
                        let tree = format_filter_tree(&filter);
                        out.emit(&tree, &tree)?;
                    }
                    OutputFormat::Json => {
                        let json = serde_json::to_string_pretty(&json!({
                            "valid": true,
                            "expression": filter.expression().to_string(),
                            "tree": filter.expression().to_sexpr(),
                            "warnings": filter.warnings(),
                        }))?;
                        out.emit(&format!("{json}\n"), &json)?;
                    }
                }
            }
            Err(error) => {
                if out.format == OutputFormat::Json {
                    let json = serde_json::to_string_pretty(&json!({
                        "valid": false,
                        "offset": error.offset(),
                        "error": error.to_string(),
                    }))?;
                    out.emit(&format!("{json}\n"), &json)?;
                }
                bail!("Invalid filter expression:\n{}", format_parse_error(expression, &error));
            }
        },
    }

    Ok(())
}
