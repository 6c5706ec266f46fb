//! CLI binary for conecta.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractConfig`, runs the extraction pipeline on one certificate and
//! prints the record as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use conecta::{extract, DocumentSource, ExtractConfig, FieldValue};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

/// Extract the structured record from a tax-status certificate PDF.
#[derive(Parser, Debug)]
#[command(name = "csf-extract", version, about, long_about = None)]
struct Cli {
    /// Path to the certificate PDF.
    pdf: PathBuf,

    /// Rendering DPI for page one (72–600).
    #[arg(long, default_value_t = 300)]
    dpi: u32,

    /// Navigation timeout for the verification page, in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    /// Label that terminates the table walk (layout-specific, e.g. "AL:").
    #[arg(long)]
    stop_label: Option<String>,

    /// Run the browser with a visible window (debugging aid).
    #[arg(long)]
    headed: bool,

    /// Print compact JSON instead of the human-readable field list.
    #[arg(long)]
    json: bool,

    /// Verbose logging (-v: info, -vv: debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info,conecta=info",
        _ => "debug,conecta=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut builder = ExtractConfig::builder()
        .dpi(cli.dpi)
        .timeout_ms(cli.timeout_ms)
        .headless(!cli.headed);
    if let Some(ref label) = cli.stop_label {
        builder = builder.stop_label(label);
    }
    let config = builder.build().context("invalid configuration")?;

    let source = DocumentSource::Path(cli.pdf.clone());
    let record = match extract(source, &config).await {
        Ok(record) => record,
        Err(e) => {
            eprintln!("{} {e}", red("error:"));
            std::process::exit(1);
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string(&record)?);
    } else {
        println!("{}", bold(&format!("{}", cli.pdf.display())));
        for (key, value) in record.iter() {
            match value {
                FieldValue::Text(text) => println!("  {key}: {text}"),
                FieldValue::Absent => println!("  {key}: {}", dim("—")),
            }
        }
    }

    Ok(())
}
