//! # split_csv
//!
//! Splits a headered CSV into one file per distinct value of a field.

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// split csv by field
#[derive(Parser)]
#[command(name = "split_csv")]
#[command(version, about = "split csv by field", long_about = None)]
struct Cli {
    /// csv file path, - means from stdin
    #[arg(value_name = "CSVFILE")]
    csvfile: String,

    /// Field to split file
    #[arg(value_name = "FIELD")]
    field: String,

    /// Max files to write
    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Directory the split files are written to
    #[arg(long = "output-dir", value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" })),
        )
        .init();

    let input: Box<dyn Read> = if cli.csvfile == "-" {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(File::open(&cli.csvfile).with_context(|| format!("Failed to read file: {}", cli.csvfile))?)
    };

    let files = split_csv(input, &cli.field, cli.limit, &cli.output_dir)?;
    info!("Split into {} files", files);
    Ok(())
}

/// Writes every record of `input` to `<value>.csv` in `output_dir`, where value is the
/// record's `field`. At most `limit` files are created; records for further new values
/// are skipped. A record without a value for `field` stops the split; records whose value
/// cannot be used as a file name (path separators, `.` or `..`) are skipped.
///
/// # Returns
/// Number of files created
fn split_csv<R: Read>(input: R, field: &str, limit: usize, output_dir: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers().context("Failed to read csv header")?.clone();
    let position = headers.iter().position(|header| header == field);

    let mut writers: HashMap<String, csv::Writer<BufWriter<File>>> = HashMap::new();
    for result in reader.records() {
        let record = result.context("Failed to read csv record")?;
        let value = match position.and_then(|position| record.get(position)) {
            Some(value) if !value.is_empty() => value.to_owned(),
            _ => {
                warn!("Field '{}' not found, stopping", field);
                break;
            }
        };

        if !writers.contains_key(&value) {
            if writers.len() >= limit {
                continue;
            }
            if !is_safe_file_stem(&value) {
                warn!("Value '{}' is not a valid file name, skipping row", value);
                continue;
            }
            let path = output_dir.join(format!("{value}.csv"));
            let file = File::create(&path).with_context(|| format!("Failed to create file: {}", path.display()))?;
            let mut writer = csv::WriterBuilder::new()
                .terminator(csv::Terminator::CRLF)
                .from_writer(BufWriter::new(file));
            writer.write_record(&headers)?;
            info!("Created file {}", path.display());
            writers.insert(value.clone(), writer);
        }
        if let Some(writer) = writers.get_mut(&value) {
            writer.write_record(&record)?;
        }
    }

    for writer in writers.values_mut() {
        writer.flush()?;
    }
    Ok(writers.len())
}

/// A value names a file directly inside the output directory: no separators, no `.`/`..`.
fn is_safe_file_stem(value: &str) -> bool {
    !matches!(value, "." | "..") && !value.contains(['/', '\\']) && !value.contains('\0')
}
