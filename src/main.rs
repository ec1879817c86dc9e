//! Consent validation CLI.
//!
//! Thin runner over the library: inspect the layout model of a PDF, or
//! validate one participant's uploads from a local directory tree.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use consent_validator::collaborators::{
    BlobStore, LocalBlobStore, MemoryParticipantFacts, ParticipantSummary,
};
use consent_validator::output::LogResultStrategy;
use consent_validator::pdf::ElementKind;
use consent_validator::{
    telemetry, ConsentType, ConsentValidator, ParticipantId, PdfDocument, SyncStatus,
    UploadSource, ValidationConfig, ValidationOutput,
};

/// Consent document validation tool
#[derive(Parser)]
#[command(name = "consent-validator")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the positioned elements of a PDF (for building layouts)
    Inspect {
        /// Input PDF file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Only this page (1-based)
        #[arg(short, long)]
        page: Option<usize>,
    },

    /// Validate one participant's consent files under a local bucket root
    Validate {
        /// Directory holding one subdirectory per bucket
        #[arg(long, value_name = "DIR")]
        root: PathBuf,

        /// Participant id, with or without the P prefix
        #[arg(long)]
        participant: ParticipantId,

        /// Consent type, e.g. PRIMARY or gror
        #[arg(long = "type", value_name = "TYPE")]
        consent_type: ConsentType,

        /// Upload source: vibrent or ce
        #[arg(long, default_value = "vibrent")]
        source: UploadSource,

        /// When the consent was authored (RFC 3339); sets the expected date
        #[arg(long, value_name = "TIMESTAMP")]
        authored: Option<DateTime<Utc>>,

        /// The participant is paired with the VA
        #[arg(long)]
        va: bool,

        /// Two-letter state of residence
        #[arg(long, value_name = "XX")]
        state: Option<String>,

        /// Include record ids and file links in the report
        #[arg(short, long)]
        verbose: bool,

        /// Print results as JSON instead of a report
        #[arg(long, conflicts_with = "verbose")]
        json: bool,
    },
}

fn inspect(input: &Path, page: Option<usize>) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let document = PdfDocument::parse(&bytes).with_context(|| "PDF parsing failed")?;

    if let Some(page) = page {
        if page == 0 || page > document.page_count() {
            anyhow::bail!(
                "Page {} out of range (document has {} page(s))",
                page,
                document.page_count()
            );
        }
    }

    for (index, content) in document.pages().iter().enumerate() {
        if page.is_some_and(|wanted| wanted != index + 1) {
            continue;
        }
        println!("page {} ({} x {})", index + 1, content.width, content.height);
        for element in &content.elements {
            let b = element.bbox;
            let kind = match &element.kind {
                ElementKind::Text(text) => format!("text  {text:?}"),
                ElementKind::Image => "image".to_string(),
                ElementKind::Curve => "curve".to_string(),
                ElementKind::Line => "line".to_string(),
                ElementKind::Rect => "rect".to_string(),
            };
            println!(
                "  [{:7.1} {:7.1} {:7.1} {:7.1}] {}",
                b.left, b.bottom, b.right, b.top, kind
            );
        }
    }
    Ok(())
}

struct ValidateArgs {
    root: PathBuf,
    participant: ParticipantId,
    consent_type: ConsentType,
    source: UploadSource,
    authored: Option<DateTime<Utc>>,
    va: bool,
    state: Option<String>,
    verbose: bool,
    json: bool,
}

fn validate(args: ValidateArgs, config: ValidationConfig) -> Result<()> {
    if !args.root.is_dir() {
        anyhow::bail!("Bucket root is not a directory: {}", args.root.display());
    }

    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&args.root));
    let facts = MemoryParticipantFacts::new();
    let mut summary = ParticipantSummary::new(args.participant, args.source);
    summary.is_va_participant = args.va;
    summary.state_of_residence = args.state.map(|state| state.to_ascii_uppercase());
    if let Some(authored) = args.authored {
        summary.authored.insert(args.consent_type, authored);
    }
    facts.insert(summary);

    let batch_size = config.batch_size;
    let validator = ConsentValidator::new(blobs.clone(), Arc::new(facts), config);
    let results = validator
        .validate(args.participant, args.consent_type, args.authored)
        .with_context(|| format!("Validation of {} failed", args.participant))?;

    if args.json {
        let json = serde_json::to_string_pretty(&results)
            .with_context(|| "Failed to serialize results")?;
        println!("{json}");
        return Ok(());
    }

    let mut report = LogResultStrategy::new(Box::new(std::io::stdout()));
    if args.verbose {
        report = report.verbose(blobs);
    }
    let ready = results
        .iter()
        .filter(|result| result.sync_status == SyncStatus::ReadyForSync)
        .count();
    let checked = results.len();

    let mut output = ValidationOutput::new(Box::new(report), batch_size);
    output.add_all(results)?;
    output.finish().with_context(|| "Failed to write report")?;

    if ready == checked {
        println!(
            "✓ {} {}: {} file(s) ready for sync",
            args.participant, args.consent_type, ready
        );
    } else {
        println!(
            "⚠ {} {}: {} of {} file(s) need correcting",
            args.participant,
            args.consent_type,
            checked - ready,
            checked
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ValidationConfig::load().with_context(|| "Invalid configuration")?;
    telemetry::init(&config.telemetry).with_context(|| "Failed to initialize logging")?;

    match cli.command {
        Commands::Inspect { input, page } => inspect(&input, page)?,
        Commands::Validate {
            root,
            participant,
            consent_type,
            source,
            authored,
            va,
            state,
            verbose,
            json,
        } => validate(
            ValidateArgs {
                root,
                participant,
                consent_type,
                source,
                authored,
                va,
                state,
                verbose,
                json,
            },
            config,
        )?,
    }

    Ok(())
}
