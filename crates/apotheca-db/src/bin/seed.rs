//! # Seed Data Generator
//!
//! Populates a fresh database with a demo pharmacy for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p apotheca-db --bin seed
//!
//! # Specify database path
//! cargo run -p apotheca-db --bin seed -- --db ./data/apotheca.db
//! ```
//!
//! ## Generated Data
//! - Branch `B01` (Main Branch)
//! - Admin `ADMIN-001` / `admin12345`, manager `MGR-001` / `manager12345`
//! - Pharmacist with PIN `1234` (id printed at the end)
//! - A small catalogue with stock at B01, two of them below critical level
//! - Loyalty customer on card `CARD-0001`

use std::env;

use apotheca_core::{Money, Role};
use apotheca_db::repository::branch::NewBranch;
use apotheca_db::repository::customer::NewCustomer;
use apotheca_db::repository::product::{ImportRow, NewProduct};
use apotheca_db::repository::staff::{NewPharmacist, NewUser};
use apotheca_db::{Database, DbConfig};
use chrono::{Months, Utc};

/// (name, brand, barcode, dosage, price, stock, prescription)
const CATALOGUE: &[(&str, &str, &str, &str, i64, i64, bool)] = &[
    ("Paracetamol 500mg", "Biogesic", "4800016641011", "500mg tablet", 550, 240, false),
    ("Ibuprofen 200mg", "Advil", "4800016641028", "200mg capsule", 975, 120, false),
    ("Amoxicillin 500mg", "Amoxil", "4800016641035", "500mg capsule", 1_200, 8, true),
    ("Cetirizine 10mg", "Virlix", "4800016641042", "10mg tablet", 1_850, 60, false),
    ("Losartan 50mg", "Cozaar", "4800016641059", "50mg tablet", 2_400, 45, true),
    ("Metformin 500mg", "Glucophage", "4800016641066", "500mg tablet", 650, 5, true),
    ("Ascorbic Acid 500mg", "Poten-Cee", "4800016641073", "500mg tablet", 700, 300, false),
    ("Loperamide 2mg", "Diatabs", "4800016641080", "2mg capsule", 800, 90, false),
    ("Oral Rehydration Salts", "Hydrite", "4800016641097", "sachet", 1_500, 40, false),
    ("Salbutamol Inhaler", "Ventolin", "4800016641103", "100mcg/dose", 38_500, 12, true),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./apotheca_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Apotheca POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./apotheca_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Apotheca POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    if !db.branches().list().await?.is_empty() {
        println!("⚠ Database already has branches; skipping seed.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let branch = db
        .branches()
        .create(&NewBranch {
            branch_code: "B01".to_string(),
            branch_name: "Main Branch".to_string(),
            address: Some("123 Rizal Avenue, Manila".to_string()),
        })
        .await?;
    println!("✓ Branch {} ({})", branch.branch_code, branch.id);

    for (employee_id, name, role, password) in [
        ("ADMIN-001", "Demo Admin", Role::Admin, "admin12345"),
        ("MGR-001", "Demo Manager", Role::Manager, "manager12345"),
    ] {
        db.staff()
            .create_user(&NewUser {
                employee_id: employee_id.to_string(),
                name: name.to_string(),
                email: None,
                role,
                branch_id: Some(branch.id.clone()),
                password: password.to_string(),
            })
            .await?;
        println!("✓ {} {}", role, employee_id);
    }

    let pharmacist = db
        .staff()
        .create_pharmacist(&NewPharmacist {
            name: "Maria Santos".to_string(),
            branch_id: branch.id.clone(),
            pin: "1234".to_string(),
        })
        .await?;
    println!("✓ Pharmacist {} (PIN 1234)", pharmacist.id);

    let expiry = Utc::now()
        .date_naive()
        .checked_add_months(Months::new(18));
    let mut rows = Vec::with_capacity(CATALOGUE.len());

    for (name, brand, barcode, dosage, price, stock, prescription) in CATALOGUE {
        db.products()
            .create(&NewProduct {
                name: name.to_string(),
                brand_name: Some(brand.to_string()),
                barcode: Some(barcode.to_string()),
                category: Some(if *prescription { "Rx" } else { "OTC" }.to_string()),
                dosage: Some(dosage.to_string()),
                price_cents: Money::from_cents(*price),
                markup_bps: 0,
                critical_level: 10,
                requires_prescription: *prescription,
            })
            .await?;

        rows.push(ImportRow {
            barcode: barcode.to_string(),
            name: None,
            brand_name: None,
            price_cents: None,
            quantity: *stock,
            expiry_date: expiry,
        });
    }

    let summary = db.products().bulk_import(&branch.id, &rows).await?;
    println!(
        "✓ {} products, {} stocked at {}",
        CATALOGUE.len(),
        summary.stocked,
        branch.branch_code
    );

    let customer = db
        .customers()
        .create_with_card(&NewCustomer {
            name: "Juan dela Cruz".to_string(),
            phone: Some("09171234567".to_string()),
            address: None,
            card_id: "CARD-0001".to_string(),
        })
        .await?;
    println!("✓ Customer {} on card {}", customer.customer.name, customer.account.card_id);

    println!();
    println!("✓ Seed complete!");
    println!("  POS login: staffId={} pin=1234", pharmacist.id);
    println!("  PMS login: employeeId=ADMIN-001 password=admin12345");

    db.close().await;
    Ok(())
}
