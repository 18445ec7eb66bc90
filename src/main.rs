//! # xlsx2csv
//!
//! Converts one worksheet of an xlsx workbook to CSV.

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use rusty_xlsx2csv::Criteria;
use rusty_xlsx2csv::CsvOptions;
use rusty_xlsx2csv::CsvRowWriter;
use rusty_xlsx2csv::XlsxWorkbook;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// xlsx as csv to stdout
#[derive(Parser)]
#[command(name = "xlsx2csv")]
#[command(version, about = "xlsx as csv to stdout", long_about = None)]
struct Cli {
    /// xlsx file path
    #[arg(value_name = "XLSXFILE")]
    xlsxfile: PathBuf,

    /// Rows to write
    #[arg(long)]
    limit: Option<usize>,

    /// Sheet name (glob pattern) to convert; may be repeated
    #[arg(long = "sheetname", value_name = "PATTERN")]
    sheet_names: Vec<String>,

    /// 1-based position of the sheet to convert
    #[arg(long = "sheet-index", value_name = "N")]
    sheet_index: Option<usize>,

    /// Write the column letters as a header line
    #[arg(long)]
    header: bool,

    /// Field delimiter
    #[arg(short, long, default_value_t = ',')]
    delimiter: char,

    /// Write to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr, stdout carries the CSV
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" })),
        )
        .init();

    if !cli.delimiter.is_ascii() {
        bail!("Delimiter must be a single ASCII character, got '{}'", cli.delimiter);
    }

    let criteria = Criteria::default()
        .with_sheet_names(cli.sheet_names.as_slice())
        .context("Invalid --sheetname pattern")?
        .with_sheet_index(cli.sheet_index)
        .with_rows_limit(cli.limit);
    let options = CsvOptions::default()
        .with_delimiter(cli.delimiter as u8)
        .with_header(cli.header);

    let output: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };

    let mut workbook = XlsxWorkbook::open(&cli.xlsxfile)
        .with_context(|| format!("Failed to open workbook: {}", cli.xlsxfile.display()))?;
    let mut writer = CsvRowWriter::new(output, options);
    let rows = workbook
        .convert(&criteria, &mut writer)
        .with_context(|| format!("Failed to convert workbook: {}", cli.xlsxfile.display()))?;
    writer.flush().context("Failed to flush output")?;

    info!("Wrote {} rows", rows);
    Ok(())
}
