//! Verify command - run the 3-way match on one bundle.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use tmatch_core::{TmatchError, VerificationEngine, VerificationResult, VerificationStatus};

use super::{load_config, load_seen_hashes, read_document, save_seen_hashes, OutputFormat};

/// Arguments for the verify command.
#[derive(Args)]
pub struct VerifyArgs {
    /// Invoice document
    #[arg(required = true)]
    invoice: PathBuf,

    /// Purchase order document
    #[arg(required = true)]
    purchase_order: PathBuf,

    /// Proof of delivery document
    #[arg(required = true)]
    proof_of_delivery: PathBuf,

    /// Wallet address submitting the bundle
    #[arg(short, long, default_value = "local")]
    wallet: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// File of already financed invoice hashes
    #[arg(long)]
    seen_hashes: Option<PathBuf>,

    /// Add the invoice hash to --seen-hashes when the bundle passes
    #[arg(long, requires = "seen_hashes")]
    record: bool,

    /// Do not reject invoices listed in --seen-hashes
    #[arg(long)]
    skip_duplicate_check: bool,
}

pub async fn run(args: VerifyArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let invoice = read_document(&args.invoice)?;
    let po = read_document(&args.purchase_order)?;
    let pod = read_document(&args.proof_of_delivery)?;

    let mut engine = VerificationEngine::new(config)?;
    let store = match &args.seen_hashes {
        Some(path) => {
            let store = load_seen_hashes(path)?;
            engine = engine.with_store(store.clone());
            Some((path, store))
        }
        None => None,
    };

    info!("Verifying {}", args.invoice.display());
    let result = match engine.verify_bundle(
        &invoice,
        &po,
        &pod,
        &args.wallet,
        args.skip_duplicate_check,
    ) {
        Ok(result) => result,
        Err(TmatchError::Duplicate(dup)) => {
            anyhow::bail!("Duplicate invoice rejected: {}", dup.invoice_hash)
        }
        Err(e) => return Err(e.into()),
    };

    if args.record && result.status == VerificationStatus::Passed {
        if let Some((path, store)) = &store {
            if engine.record_submission(&args.wallet, &result) {
                save_seen_hashes(path, store)?;
                eprintln!(
                    "{} Recorded invoice hash in {}",
                    style("✓").green(),
                    path.display()
                );
            }
        }
    }

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&result)?,
        OutputFormat::Text => format_text(&result),
    };

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

    debug!("Total verification time: {:?}", start.elapsed());

    Ok(())
}

pub fn status_label(status: VerificationStatus) -> String {
    match status {
        VerificationStatus::Passed => style("PASSED").green().bold().to_string(),
        VerificationStatus::Failed => style("FAILED").red().bold().to_string(),
        VerificationStatus::RequiresReview => style("REQUIRES REVIEW").yellow().bold().to_string(),
        other => other.to_string(),
    }
}

pub fn format_text(result: &VerificationResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Verification: {}\n", result.verification_id));
    output.push_str(&format!("Status: {}\n", status_label(result.status)));
    output.push('\n');

    output.push_str("Checks:\n");
    for check in &result.checks {
        let mark = if check.passed {
            style("✓").green()
        } else {
            style("✗").red()
        };
        output.push_str(&format!("  {} {}: {}\n", mark, check.rule_name, check.message));
    }

    if !result.anomalies.is_empty() {
        output.push('\n');
        output.push_str("Anomalies:\n");
        for anomaly in &result.anomalies {
            output.push_str(&format!(
                "  [{}] {} ({}): {}\n",
                anomaly.severity, anomaly.code, anomaly.field_path, anomaly.message
            ));
        }
    }

    if !result.review_flags.is_empty() {
        output.push('\n');
        output.push_str("Review:\n");
        for flag in &result.review_flags {
            output.push_str(&format!("  - {}\n", flag));
        }
    }

    let data = &result.extracted_data;
    output.push('\n');
    output.push_str("Invoice:\n");
    if let Some(number) = &data.invoice_number {
        output.push_str(&format!("  Number: {}\n", number));
    }
    if let Some(total) = &data.total_amount {
        output.push_str(&format!(
            "  Total:  {} {}\n",
            total,
            data.currency.as_deref().unwrap_or("")
        ));
    }
    if let Some(po) = &data.po_number {
        output.push_str(&format!("  PO:     {}\n", po));
    }

    output.push('\n');
    output.push_str(&format!("Invoice hash: {}\n", result.invoice_hash));
    output.push_str(&format!("PO hash:      {}\n", result.po_hash));
    output.push_str(&format!("POD hash:     {}\n", result.pod_hash));
    output.push_str(&format!("Bundle hash:  {}\n", result.bundle_hash));

    output
}
