//! Patterns command - inspect and seed the pattern store.

use clap::{Args, Subcommand};
use console::style;

use recibo_core::FieldId;

use super::{load_config, open_engine};

/// Arguments for the patterns command.
#[derive(Args)]
pub struct PatternsArgs {
    #[command(subcommand)]
    command: PatternsCommand,
}

#[derive(Subcommand)]
enum PatternsCommand {
    /// List stored patterns in priority order
    List {
        /// Only this field (taxId, date, total, tax, subtotal)
        #[arg(short, long)]
        field: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Seed the default patterns if the store holds too few
    Seed,
}

pub async fn run(args: PatternsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let engine = open_engine(load_config(config_path)?)?;

    match args.command {
        PatternsCommand::List { field, json } => {
            let fields = match field {
                Some(name) => vec![name.parse::<FieldId>()?],
                None => FieldId::ALL.to_vec(),
            };

            let mut patterns = Vec::new();
            for field in fields {
                patterns.extend(engine.patterns().list(field)?);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&patterns)?);
                return Ok(());
            }

            println!(
                "{:>4}  {:<9} {:>6} {:>8} {:>5} {:>5}  matcher",
                "id", "field", "weight", "accuracy", "ok", "fail"
            );
            for pattern in &patterns {
                let accuracy = pattern
                    .accuracy
                    .map(|a| format!("{a:.1}%"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>4}  {:<9} {:>6.2} {:>8} {:>5} {:>5}  {}",
                    pattern.id,
                    pattern.field.as_str(),
                    pattern.weight,
                    accuracy,
                    pattern.success_count,
                    pattern.failure_count,
                    pattern.matcher
                );
            }
        }
        PatternsCommand::Seed => {
            let min = engine.config().extraction.min_pattern_count;
            let seeded = engine.reseed_if_needed()?;
            let total = engine.patterns().count()?;
            if seeded > 0 {
                println!("{} Seeded {} default patterns", style("✓").green(), seeded);
            } else {
                println!(
                    "{} Store holds {} patterns (minimum {}), nothing to seed",
                    style("ℹ").blue(),
                    total,
                    min
                );
            }
        }
    }

    Ok(())
}
