//! Transaction Classification Example
//!
//! Assigns categories and budgets to a few sample transactions using an
//! OpenAI-compatible endpoint.
//!
//! Required environment variables:
//! - CLASSIFIER_LLM_API_KEY
//!
//! Optional:
//! - CLASSIFIER_LLM_BASE_URL, CLASSIFIER_LLM_MODEL
//! - CLASSIFIER_MAX_CONCURRENT, CLASSIFIER_RATE_LIMIT_CAPACITY, ...
//!
//! Pass a path to a JSON array of records to classify your own data.

use std::env;
use std::fs;

use anyhow::Context;
use transaction_classifier::{openai_pipeline, ClassificationRecord, Vocabulary};

fn sample_records() -> Vec<ClassificationRecord> {
    vec![
        ClassificationRecord::new("tx-1001", "WHOLEFDS MKT #10234", "84.20", "2024-05-02")
            .with_source_account("Checking"),
        ClassificationRecord::new("tx-1002", "CVS/PHARMACY 04411", "12.99", "2024-05-03")
            .with_notes("prescription refill"),
        ClassificationRecord::new("tx-1003", "AMZN Mktp US*2K4L", "45.00", "2024-05-04"),
        ClassificationRecord::new("tx-1004", "Transfer to Savings", "500.00", "2024-05-05")
            .with_source_account("Checking")
            .with_destination_account("Savings"),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let records = match env::args().nth(1) {
        Some(path) => {
            let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing records in {}", path))?
        }
        None => sample_records(),
    };

    let categories = Vocabulary::new(["Food", "Medical", "Shopping", "Transfer"]);
    let budgets = Vocabulary::new(["Groceries", "Health", "Discretionary"]);

    let orchestrator = openai_pipeline().context("building the classification pipeline")?;

    println!("Classifying {} transactions...\n", records.len());
    let assignments = orchestrator
        .process_records(&records, Some(&categories), Some(&budgets))
        .await?;

    for record in &records {
        match assignments.get(&record.id) {
            Some(assignment) => println!(
                "{:<10} {:<28} category={:<10} budget={}",
                record.id,
                record.description,
                assignment.category.as_deref().unwrap_or("-"),
                assignment.budget.as_deref().unwrap_or("-"),
            ),
            None => println!("{:<10} {:<28} (no labels)", record.id, record.description),
        }
    }

    println!("\n{}", serde_json::to_string_pretty(&assignments)?);
    Ok(())
}
