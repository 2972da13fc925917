//! Correct command - feed a human correction back into the pattern store.

use clap::Args;
use console::style;

use recibo_core::{ExtractionRepository, FieldId, LearnOutcome};

use super::{build_engine, load_config};

/// Arguments for the correct command.
#[derive(Args)]
pub struct CorrectArgs {
    /// Extraction id printed by `process`
    extraction_id: u64,

    /// Field name (taxId, date, total, tax, subtotal, issuer)
    field: String,

    /// Correct value as it appears on the receipt
    value: String,

    /// Who supplied the correction
    #[arg(long, default_value = "manual")]
    source: String,
}

pub async fn run(args: CorrectArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let engine = build_engine(load_config(config_path)?)?;

    let extracted = match (
        engine.extractions().get(args.extraction_id)?,
        args.field.parse::<FieldId>(),
    ) {
        (Some(attempt), Ok(field)) => attempt
            .chosen
            .get(&field)
            .map(|candidate| candidate.value.clone())
            .unwrap_or_default(),
        _ => String::new(),
    };

    let outcome = engine.record_correction(
        args.extraction_id,
        &args.field,
        &extracted,
        &args.value,
        &args.source,
    )?;

    println!(
        "{} Stored correction {} for extraction {} ({}: {:?} -> {:?})",
        style("✓").green(),
        outcome.correction.id,
        args.extraction_id,
        args.field,
        extracted,
        args.value
    );

    if outcome.scored_patterns > 0 {
        println!(
            "{} Updated statistics of {} patterns",
            style("ℹ").blue(),
            outcome.scored_patterns
        );
    }

    match outcome.learned {
        Some(LearnOutcome::Created(pattern)) => println!(
            "{} Learned pattern {}: {}",
            style("✓").green(),
            pattern.id,
            pattern.matcher
        ),
        Some(LearnOutcome::Reinforced(pattern)) => println!(
            "{} Reinforced pattern {} ({} successes)",
            style("✓").green(),
            pattern.id,
            pattern.success_count
        ),
        Some(LearnOutcome::ValueNotFound) => println!(
            "{} Value not found in the receipt text, no pattern learned",
            style("⚠").yellow()
        ),
        Some(LearnOutcome::NoKeyword) => println!(
            "{} No keyword precedes the value, no pattern learned",
            style("⚠").yellow()
        ),
        None => {}
    }

    Ok(())
}
