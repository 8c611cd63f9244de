//! Batch command - verify many bundle directories.
//!
//! Each bundle is a directory holding `invoice.*`, `po.*` and `pod.*`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use tmatch_core::{InMemoryDuplicateStore, VerificationEngine, VerificationResult, VerificationStatus};

use super::verify::format_text;
use super::{load_config, load_seen_hashes, save_seen_hashes, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching bundle directories
    #[arg(required = true)]
    input: String,

    /// Output directory for per-bundle results
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each bundle
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Write a summary CSV to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Wallet address submitting the bundles
    #[arg(short, long, default_value = "local")]
    wallet: String,

    /// File of already financed invoice hashes
    #[arg(long)]
    seen_hashes: Option<PathBuf>,

    /// Record the invoice hash of every passed bundle
    #[arg(long)]
    record: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Outcome of one bundle directory.
struct BundleOutcome {
    path: PathBuf,
    result: Option<VerificationResult>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let bundles: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_dir())
        .collect();

    if bundles.is_empty() {
        anyhow::bail!("No bundle directories found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} bundles to verify",
        style("ℹ").blue(),
        bundles.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    // One store for the whole batch, so a bundle repeated within the batch
    // is caught as well.
    let store = match &args.seen_hashes {
        Some(path) => load_seen_hashes(path)?,
        None => Arc::new(InMemoryDuplicateStore::new()),
    };
    let engine = VerificationEngine::new(config)?.with_store(store.clone());

    let pb = ProgressBar::new(bundles.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} bundles")?
            .progress_chars("=>-"),
    );

    let mut outcomes = Vec::with_capacity(bundles.len());
    for path in bundles {
        let bundle_start = Instant::now();
        let verified = verify_directory(&engine, &path, &args.wallet);
        let processing_time_ms = bundle_start.elapsed().as_millis() as u64;

        match verified {
            Ok(result) => {
                if args.record
                    && result.status == VerificationStatus::Passed
                    && !engine.record_submission(&args.wallet, &result)
                {
                    warn!("Invoice in {} was already recorded", path.display());
                }
                outcomes.push(BundleOutcome {
                    path,
                    result: Some(result),
                    error: None,
                    processing_time_ms,
                });
            }
            Err(e) => {
                let error_msg = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to verify {}: {}", path.display(), error_msg);
                    outcomes.push(BundleOutcome {
                        path,
                        result: None,
                        error: Some(error_msg),
                        processing_time_ms,
                    });
                } else {
                    error!("Failed to verify {}: {}", path.display(), error_msg);
                    anyhow::bail!("Verification failed for {}: {}", path.display(), error_msg);
                }
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    if args.record {
        if let Some(path) = &args.seen_hashes {
            save_seen_hashes(path, &store)?;
        }
    }

    if let Some(output_dir) = &args.output_dir {
        for outcome in &outcomes {
            let Some(result) = &outcome.result else {
                continue;
            };
            let name = outcome
                .path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("bundle");
            let (extension, content) = match args.format {
                OutputFormat::Json => ("json", serde_json::to_string_pretty(result)?),
                OutputFormat::Text => ("txt", format_text(result)),
            };
            let output_path = output_dir.join(format!("{}.{}", name, extension));
            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if let Some(summary_path) = &args.summary {
        write_summary(summary_path, &outcomes)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let count = |status: VerificationStatus| {
        outcomes
            .iter()
            .filter(|o| o.result.as_ref().is_some_and(|r| r.status == status))
            .count()
    };
    let errors: Vec<_> = outcomes.iter().filter(|o| o.error.is_some()).collect();

    println!();
    println!(
        "{} Verified {} bundles in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} passed, {} failed, {} require review, {} errors",
        style(count(VerificationStatus::Passed)).green(),
        style(count(VerificationStatus::Failed)).red(),
        style(count(VerificationStatus::RequiresReview)).yellow(),
        style(errors.len()).red()
    );

    if !errors.is_empty() {
        println!();
        println!("{}", style("Errors:").red());
        for outcome in &errors {
            println!(
                "  - {}: {}",
                outcome.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// Find the single document named `stem.*` in `dir`.
fn find_document(dir: &Path, stem: &str) -> anyhow::Result<PathBuf> {
    let pattern = dir.join(format!("{}.*", stem));
    let pattern = pattern
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Non UTF-8 path: {}", dir.display()))?;
    let mut matches: Vec<PathBuf> = glob(pattern)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .collect();
    match matches.len() {
        0 => anyhow::bail!("No {}.* file in {}", stem, dir.display()),
        1 => Ok(matches.remove(0)),
        n => anyhow::bail!("{} {}.* files in {}", n, stem, dir.display()),
    }
}

fn verify_directory(
    engine: &VerificationEngine,
    dir: &Path,
    wallet: &str,
) -> anyhow::Result<VerificationResult> {
    let invoice = fs::read(find_document(dir, "invoice")?)?;
    let po = fs::read(find_document(dir, "po")?)?;
    let pod = fs::read(find_document(dir, "pod")?)?;
    Ok(engine.verify_bundle(&invoice, &po, &pod, wallet, false)?)
}

fn write_summary(path: &Path, outcomes: &[BundleOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "bundle",
        "status",
        "invoice_number",
        "total_amount",
        "currency",
        "failed_checks",
        "anomalies",
        "review_flags",
        "bundle_hash",
        "processing_time_ms",
        "error",
    ])?;

    for outcome in outcomes {
        let bundle = outcome
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        if let Some(result) = &outcome.result {
            let data = &result.extracted_data;
            let failed: Vec<&str> = result
                .checks
                .iter()
                .filter(|c| !c.passed)
                .map(|c| c.rule_name.as_str())
                .collect();
            let anomalies: Vec<&str> = result.anomalies.iter().map(|a| a.code.as_str()).collect();
            wtr.write_record([
                bundle,
                result.status.as_str(),
                data.invoice_number.as_deref().unwrap_or(""),
                data.total_amount.as_deref().unwrap_or(""),
                data.currency.as_deref().unwrap_or(""),
                &failed.join(";"),
                &anomalies.join(";"),
                &result.review_flags.join(";"),
                &result.bundle_hash,
                &outcome.processing_time_ms.to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                bundle,
                "error",
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                &outcome.processing_time_ms.to_string(),
                outcome.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
