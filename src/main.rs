//! PII Redaction CLI Application.
//!
//! This binary provides a command-line interface for the pii_redactor
//! library: scanning documents for PII, redacting selected matches and
//! manual targets, and extracting text to verify the result.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use pii_redactor::{
    extract_text_from_pdf, list_categories, Document, ManualTarget, Match, RedactionRequest,
    RedactionService, Rect, Scanner, SecureRedactionStrategy, Tier,
};

/// PII Redaction Tool
///
/// Detect personally identifiable information in PDF documents and remove
/// it permanently from the text layer.
#[derive(Parser)]
#[command(name = "pii-redactor")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a PDF and print detected matches as JSON
    Scan {
        /// Input PDF file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Detection tier (free or premium)
        #[arg(long, default_value = "free")]
        tier: Tier,

        /// Write the JSON report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Redact detected PII and manual targets
    Redact {
        /// Input PDF file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output PDF file path
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Detection tier (free or premium)
        #[arg(long, default_value = "free")]
        tier: Tier,

        /// Use reviewed matches from a JSON file instead of scanning
        #[arg(long, value_name = "FILE")]
        matches: Option<PathBuf>,

        /// Literal text to redact (can be specified multiple times)
        #[arg(long, value_name = "TEXT")]
        text: Vec<String>,

        /// Regular expression to redact (can be specified multiple times)
        #[arg(long, value_name = "REGEX")]
        regex: Vec<String>,

        /// Rectangle to redact as PAGE:X0,Y0,X1,Y1 (0-based page, PDF points)
        #[arg(long, value_name = "REGION")]
        region: Vec<String>,

        /// Keep document info, XMP metadata and thumbnails
        #[arg(long)]
        keep_metadata: bool,

        /// Skip automatic detection; redact only manual targets
        #[arg(long, conflicts_with = "matches")]
        no_auto: bool,
    },

    /// Extract text from a PDF (for debugging and verification)
    Extract {
        /// Input PDF file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output text file (optional, defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List the PII categories available at a tier
    Categories {
        /// Detection tier (free or premium)
        #[arg(long, default_value = "premium")]
        tier: Tier,
    },
}

/// Options for a redact invocation.
struct RedactOptions<'a> {
    tier: Tier,
    matches: Option<&'a Path>,
    text: &'a [String],
    regex: &'a [String],
    region: &'a [String],
    keep_metadata: bool,
    no_auto: bool,
}

/// Command handler holding shared settings.
struct RedactionHandler {
    verbose: bool,
}

impl RedactionHandler {
    fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn read_input(input: &Path) -> Result<Vec<u8>> {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))
    }

    /// Scans a document and prints the report as JSON.
    fn scan(&self, input: &Path, tier: Tier, output: Option<&Path>) -> Result<()> {
        let bytes = Self::read_input(input)?;
        let report = RedactionService::with_secure_strategy()
            .scan(&bytes, tier)
            .with_context(|| "Scan failed")?;

        let json = serde_json::to_string_pretty(&report)?;
        match output {
            Some(path) => {
                std::fs::write(path, &json)
                    .with_context(|| format!("Failed to write to {}", path.display()))?;
                println!("✓ Found {} match(es) → {}", report.matches.len(), path.display());
            }
            None => println!("{}", json),
        }

        if self.verbose && !report.skipped_pages.is_empty() {
            eprintln!("Skipped {} unreadable page(s)", report.skipped_pages.len());
        }
        Ok(())
    }

    /// Executes a redaction operation.
    fn redact(&self, input: &Path, output: &Path, options: RedactOptions<'_>) -> Result<()> {
        let bytes = Self::read_input(input)?;
        let document = Document::from_bytes(bytes.as_slice()).with_context(|| "Failed to open PDF")?;

        let matches: Vec<Match> = match options.matches {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                load_matches(&json)?
            }
            None if options.no_auto => Vec::new(),
            None => Scanner::for_tier(options.tier).scan(&document).matches,
        };

        let mut manual = Vec::new();
        for text in options.text {
            manual.extend(Scanner::locate_text(&document, text)?);
        }
        for pattern in options.regex {
            manual.extend(Scanner::locate_pattern(&document, pattern)?);
        }
        for region in options.region {
            manual.push(parse_region(region)?);
        }
        drop(document);

        let request = RedactionRequest::from_selection(&matches, manual);
        if self.verbose {
            println!("Input:  {}", input.display());
            println!("Output: {}", output.display());
            println!("Entries: {} redaction entr(ies)", request.len());
        }

        let strategy = SecureRedactionStrategy::new().with_metadata_scrub(!options.keep_metadata);
        let result = RedactionService::new(Box::new(strategy))
            .redact(&bytes, &request)
            .with_context(|| "Redaction failed")?;
        std::fs::write(output, &result.output)
            .with_context(|| format!("Failed to write to {}", output.display()))?;

        // Report results
        if self.verbose {
            println!("\nRedaction Summary:");
            println!("  Pages processed: {}", result.pages_processed);
            println!("  Pages modified:  {}", result.pages_modified);
            println!("  Entries applied: {}", result.instances_redacted);
            println!("  Glyphs removed:  {}", result.glyphs_removed);
            println!("  Images removed:  {}", result.images_removed);
            println!("  Annotations removed: {}", result.annotations_removed);
        }
        for skipped in &result.skipped {
            eprintln!("⚠ Skipped entry {}: {}", skipped.index, skipped.error);
        }

        if result.has_redactions() {
            println!(
                "✓ Successfully redacted {} entr(ies) → {}",
                result.instances_redacted,
                output.display()
            );
        } else {
            println!("⚠ No instances found to redact");
        }
        Ok(())
    }

    /// Extracts text from a PDF.
    fn extract(&self, input: &Path, output: Option<&Path>) -> Result<()> {
        let bytes = Self::read_input(input)?;
        let text = extract_text_from_pdf(&bytes).with_context(|| "Text extraction failed")?;

        if let Some(output_path) = output {
            std::fs::write(output_path, &text)
                .with_context(|| format!("Failed to write to {}", output_path.display()))?;
            println!(
                "✓ Extracted {} characters → {}",
                text.len(),
                output_path.display()
            );
        } else {
            println!("{}", text);
        }
        Ok(())
    }

    fn categories(&self, tier: Tier) {
        for category in list_categories(tier) {
            println!(
                "{:<16} {:<18} {}",
                category.name(),
                category.display_label(),
                category.tier()
            );
        }
    }
}

/// Parses `PAGE:X0,Y0,X1,Y1` into a manual target.
fn parse_region(region: &str) -> Result<ManualTarget> {
    let (page, coords) = region
        .split_once(':')
        .with_context(|| format!("Region '{}' must look like PAGE:X0,Y0,X1,Y1", region))?;
    let page_index: usize = page
        .trim()
        .parse()
        .with_context(|| format!("Invalid page index in region '{}'", region))?;
    let values = coords
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid coordinates in region '{}'", region))?;
    let [x0, y0, x1, y1] = values[..] else {
        anyhow::bail!("Region '{}' needs exactly four coordinates", region);
    };
    Ok(ManualTarget {
        page_index,
        rectangle: Rect::new(x0, y0, x1, y1),
        text: None,
    })
}

/// Reads reviewed matches: either a bare array or a full scan report.
fn load_matches(json: &str) -> Result<Vec<Match>> {
    if let Ok(matches) = serde_json::from_str::<Vec<Match>>(json) {
        return Ok(matches);
    }
    let report: pii_redactor::ScanReport =
        serde_json::from_str(json).with_context(|| "Matches file is neither a match list nor a scan report")?;
    Ok(report.matches)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let handler = RedactionHandler::new(cli.verbose);

    match &cli.command {
        Commands::Scan {
            input,
            tier,
            output,
        } => handler.scan(input, *tier, output.as_deref())?,
        Commands::Redact {
            input,
            output,
            tier,
            matches,
            text,
            regex,
            region,
            keep_metadata,
            no_auto,
        } => {
            let options = RedactOptions {
                tier: *tier,
                matches: matches.as_deref(),
                text,
                regex,
                region,
                keep_metadata: *keep_metadata,
                no_auto: *no_auto,
            };
            handler.redact(input, output, options)?;
        }
        Commands::Extract { input, output } => handler.extract(input, output.as_deref())?,
        Commands::Categories { tier } => handler.categories(*tier),
    }

    Ok(())
}
