//! Process command - extract fields from a single receipt file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use recibo_core::{ExtractionSource, FieldId, ProcessedDocument};

use super::{build_engine, load_config, load_document};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (.txt recognized text, .pdf or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Receipt image for vision escalation when the input is text
    #[arg(long)]
    image: Option<PathBuf>,

    /// Recognized text for an image input
    #[arg(long)]
    text: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show confidence and escalation path
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let config = load_config(config_path)?;
    let engine = build_engine(config)?;

    info!(path = %args.input.display(), "Processing file");
    let input = load_document(&args.input, args.image.as_deref(), args.text.as_deref())?;
    let processed = engine.process(&input).await;

    let output = format_processed(&processed, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if !processed.outcome.accepted {
        eprintln!(
            "{} Extraction rejected (confidence {}%)",
            style("✗").red(),
            processed.outcome.overall_confidence
        );
    }

    if args.show_confidence {
        eprintln!();
        eprintln!(
            "{} Overall confidence: {}% via {}",
            style("ℹ").blue(),
            processed.outcome.overall_confidence,
            method_label(processed.outcome.method)
        );
        eprintln!(
            "{} Path: {}",
            style("ℹ").blue(),
            serde_json::to_string(&processed.outcome.path)?
        );
        if let Some(id) = processed.extraction_id {
            eprintln!("{} Extraction id: {}", style("ℹ").blue(), id);
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(())
}

pub fn method_label(method: ExtractionSource) -> &'static str {
    match method {
        ExtractionSource::Patterns => "patterns",
        ExtractionSource::EscalatedText => "escalated_text",
        ExtractionSource::EscalatedVision => "escalated_vision",
    }
}

pub fn format_processed(
    processed: &ProcessedDocument,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(processed)?),
        OutputFormat::Csv => format_csv(processed),
        OutputFormat::Text => Ok(format_text(processed)),
    }
}

/// Columns shared by single-file CSV output and the batch summary.
pub const RECORD_COLUMNS: [&str; 6] = ["tax_id", "issuer", "date", "subtotal", "tax", "total"];

/// Record values in `RECORD_COLUMNS` order, empty when rejected.
pub fn record_values(processed: &ProcessedDocument) -> [String; 6] {
    match &processed.outcome.record {
        Some(record) => [
            record.tax_id.clone(),
            record.issuer.clone().unwrap_or_default(),
            record.date.clone().unwrap_or_default(),
            record.subtotal.to_string(),
            record.tax.to_string(),
            record.total.to_string(),
        ],
        None => Default::default(),
    }
}

fn format_csv(processed: &ProcessedDocument) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["extraction_id", "accepted", "method", "confidence"];
    header.extend(RECORD_COLUMNS);
    wtr.write_record(&header)?;

    let mut row = vec![
        processed.extraction_id.map(|id| id.to_string()).unwrap_or_default(),
        processed.outcome.accepted.to_string(),
        method_label(processed.outcome.method).to_string(),
        processed.outcome.overall_confidence.to_string(),
    ];
    row.extend(record_values(processed));
    wtr.write_record(&row)?;

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(processed: &ProcessedDocument) -> String {
    let outcome = &processed.outcome;
    let mut output = String::new();

    let status = if outcome.accepted { "accepted" } else { "rejected" };
    output.push_str(&format!(
        "Receipt: {} ({}%, {})\n",
        status,
        outcome.overall_confidence,
        method_label(outcome.method)
    ));
    if let Some(id) = processed.extraction_id {
        output.push_str(&format!("Extraction: {}\n", id));
    }

    let Some(record) = &outcome.record else {
        return output;
    };

    output.push('\n');
    output.push_str(&format!("Issuer:   {}\n", record.issuer.as_deref().unwrap_or("-")));
    output.push_str(&format!("RFC:      {}\n", non_empty(&record.tax_id)));
    output.push_str(&format!("Date:     {}\n", record.date.as_deref().unwrap_or("-")));
    output.push('\n');
    output.push_str(&format!("Subtotal: {}\n", record.subtotal));
    output.push_str(&format!("IVA:      {}\n", record.tax));
    output.push_str(&format!("Total:    {}\n", record.total));

    if !outcome.fields.is_empty() {
        output.push('\n');
        output.push_str("Fields:\n");
        for field in FieldId::ALL {
            if let Some(value) = outcome.fields.get(&field) {
                output.push_str(&format!(
                    "  {:<9} {} ({:.0}%)\n",
                    field.as_str(),
                    value.value,
                    value.confidence
                ));
            }
        }
    }

    output
}

fn non_empty(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}
