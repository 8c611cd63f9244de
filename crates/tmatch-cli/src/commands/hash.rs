//! Hash command - print document and bundle hashes.

use std::path::PathBuf;

use clap::Args;
use console::style;

use tmatch_core::hashing::verify_hash;
use tmatch_core::BundleHashes;

use super::{read_document, OutputFormat};

/// Arguments for the hash command.
#[derive(Args)]
pub struct HashArgs {
    /// Invoice document
    #[arg(required = true)]
    invoice: PathBuf,

    /// Purchase order document
    #[arg(required = true)]
    purchase_order: PathBuf,

    /// Proof of delivery document
    #[arg(required = true)]
    proof_of_delivery: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Check the invoice against an expected hash
    #[arg(long)]
    expect_invoice: Option<String>,
}

pub async fn run(args: HashArgs) -> anyhow::Result<()> {
    let invoice = read_document(&args.invoice)?;
    let po = read_document(&args.purchase_order)?;
    let pod = read_document(&args.proof_of_delivery)?;

    if let Some(expected) = &args.expect_invoice {
        if !verify_hash(&invoice, expected) {
            anyhow::bail!(
                "Invoice {} does not match expected hash {}",
                args.invoice.display(),
                expected
            );
        }
        eprintln!("{} Invoice hash matches", style("✓").green());
    }

    let hashes = BundleHashes::compute(&invoice, &po, &pod);
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hashes)?),
        OutputFormat::Text => {
            println!("invoice  {}", hashes.invoice_hash);
            println!("po       {}", hashes.po_hash);
            println!("pod      {}", hashes.pod_hash);
            println!("bundle   {}", hashes.bundle_hash);
        }
    }

    Ok(())
}
