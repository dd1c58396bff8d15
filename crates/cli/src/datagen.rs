use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

use linex_core::sample::sample_lineage;

#[derive(Debug, Clone, Serialize)]
struct Product {
    product_id: u32,
    name: &'static str,
    category: &'static str,
    base_cost: u32,
}

#[derive(Debug, Clone, Serialize)]
struct Customer {
    customer_id: u32,
    name: &'static str,
    segment: &'static str,
    country: &'static str,
    region: &'static str,
}

#[derive(Debug, Serialize)]
struct Expense {
    expense_id: u32,
    date: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    amount: u32,
    region: &'static str,
}

#[derive(Debug, Serialize)]
struct Transaction {
    transaction_id: usize,
    date: String,
    customer_id: u32,
    product_id: u32,
    amount: f64,
    currency: &'static str,
    region: &'static str,
    cost: f64,
}

const PRODUCTS: [Product; 3] = [
    Product { product_id: 1, name: "Widget", category: "Hardware", base_cost: 100 },
    Product { product_id: 2, name: "Gadget", category: "Electronics", base_cost: 150 },
    Product { product_id: 3, name: "Service A", category: "Services", base_cost: 20 },
];

const CUSTOMERS: [Customer; 4] = [
    Customer { customer_id: 1, name: "Alpha LLC", segment: "Enterprise", country: "Germany", region: "EU" },
    Customer { customer_id: 2, name: "Beta GmbH", segment: "SMB", country: "Germany", region: "EU" },
    Customer { customer_id: 3, name: "Gamma Inc", segment: "Enterprise", country: "USA", region: "US" },
    Customer { customer_id: 4, name: "Delta Ltd", segment: "SMB", country: "India", region: "APAC" },
];

const EXPENSES: [Expense; 3] = [
    Expense { expense_id: 1, date: "2023-03-15", kind: "Hosting", amount: 1200, region: "US" },
    Expense { expense_id: 2, date: "2023-04-20", kind: "Salaries", amount: 15000, region: "EU" },
    Expense { expense_id: 3, date: "2023-07-01", kind: "Marketing", amount: 4000, region: "APAC" },
];

/// Write the demo corpus: the five-metric lineage plus seeded fact tables.
/// The same seed always produces the same files.
pub fn generate(out_dir: &Path, transactions: usize, seed: u64) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output directory {out_dir:?}"))?;
    write_lineage(out_dir)?;
    write_csv(&out_dir.join("products.csv"), &PRODUCTS)?;
    write_csv(&out_dir.join("customers.csv"), &CUSTOMERS)?;
    write_csv(&out_dir.join("expenses.csv"), &EXPENSES)?;
    write_transactions(&out_dir.join("transactions.csv"), transactions, seed)?;
    info!(dir = ?out_dir, transactions, "generated demo corpus");
    println!(
        "Data generated in {} (transactions.csv, products.csv, customers.csv, expenses.csv, lineage.json)",
        out_dir.display()
    );
    Ok(())
}

fn write_lineage(out_dir: &Path) -> Result<()> {
    let lineage = sample_lineage();
    let path = out_dir.join("lineage.json");
    fs::write(&path, serde_json::to_string_pretty(&lineage)?)
        .with_context(|| format!("failed to write {path:?}"))?;
    Ok(())
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open {path:?} for writing"))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_transactions(path: &Path, count: usize, seed: u64) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let start =
        NaiveDate::from_ymd_opt(2023, 1, 1).context("start date out of range")?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open {path:?} for writing"))?;
    for transaction_id in 1..=count {
        let date = start
            .checked_add_days(Days::new(rng.gen_range(0..=700)))
            .context("date offset out of range")?;
        let product = &PRODUCTS[rng.gen_range(0..PRODUCTS.len())];
        let customer = &CUSTOMERS[rng.gen_range(0..CUSTOMERS.len())];
        let amount = round2(rng.gen_range(50.0..2000.0));
        let cost = round2(amount * rng.gen_range(0.3..0.8));
        writer.serialize(Transaction {
            transaction_id,
            date: date.format("%Y-%m-%d").to_string(),
            customer_id: customer.customer_id,
            product_id: product.product_id,
            amount,
            currency: if customer.region == "EU" { "EUR" } else { "USD" },
            region: customer.region,
            cost,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
