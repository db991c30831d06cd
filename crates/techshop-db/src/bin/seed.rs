//! # Seed Data Generator
//!
//! Populates the database with demo categories and products.
//!
//! ## Usage
//! ```bash
//! cargo run -p techshop-db --bin seed
//!
//! # Specify database path
//! cargo run -p techshop-db --bin seed -- --db ./data/techshop.db
//! ```

use chrono::Utc;
use std::env;
use techshop_core::{Category, Product};
use techshop_db::{Database, DbConfig};

/// (category id, category name, description)
const CATEGORIES: &[(&str, &str, &str)] = &[
    ("laptops", "Laptops", "Notebooks and ultrabooks"),
    ("phones", "Phones", "Smartphones"),
    ("tablets", "Tablets", "Tablets and e-readers"),
    ("accessories", "Accessories", "Chargers, cables and cases"),
];

/// (id, name, brand, price cents, stock, category id)
const PRODUCTS: &[(&str, &str, &str, i64, i64, &str)] = &[
    ("macbook-air-13", "MacBook Air 13", "Apple", 109_999, 8, "laptops"),
    ("xps-13", "XPS 13", "Dell", 99_900, 5, "laptops"),
    ("thinkpad-x1", "ThinkPad X1 Carbon", "Lenovo", 149_900, 3, "laptops"),
    ("iphone-15", "iPhone 15", "Apple", 79_999, 12, "phones"),
    ("galaxy-s24", "Galaxy S24", "Samsung", 84_999, 10, "phones"),
    ("pixel-8", "Pixel 8", "Google", 69_900, 1, "phones"),
    ("ipad-air", "iPad Air", "Apple", 59_900, 6, "tablets"),
    ("galaxy-tab-s9", "Galaxy Tab S9", "Samsung", 79_999, 0, "tablets"),
    ("usb-c-charger", "USB-C Charger 65W", "Anker", 4_999, 40, "accessories"),
    ("airpods-pro", "AirPods Pro", "Apple", 24_900, 15, "accessories"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./techshop.db");

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
                println!("TechShop Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./techshop.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("TechShop Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let now = Utc::now();

    for (id, name, description) in CATEGORIES {
        db.categories()
            .insert(&Category {
                id: id.to_string(),
                name: name.to_string(),
                description: Some(description.to_string()),
                created_at: now,
            })
            .await?;
    }
    println!("✓ Inserted {} categories", CATEGORIES.len());

    let mut inserted = 0;
    for (id, name, brand, price_cents, stock, category_id) in PRODUCTS {
        let product = Product {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            brand: brand.to_string(),
            price_cents: *price_cents,
            unit_in_stock: *stock,
            category_id: Some(category_id.to_string()),
            image_url: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", product.id, e);
            continue;
        }
        inserted += 1;
    }
    println!("✓ Inserted {} products", inserted);

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
