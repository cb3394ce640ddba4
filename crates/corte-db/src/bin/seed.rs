//! # Seed Data Generator
//!
//! Populates the database with demo products and an open shift for
//! development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p corte-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p corte-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p corte-db --bin seed -- --db ./data/corte.db
//! ```

use chrono::Utc;
use std::env;
use uuid::Uuid;

use corte_core::{Product, Turno, TurnoEstado, DEFAULT_TENANT_ID};
use corte_db::{Database, DbConfig};

/// Product families for realistic demo data.
const FAMILIES: &[(&str, &[&str])] = &[
    (
        "BEB",
        &[
            "Agua Mineral",
            "Refresco Cola",
            "Jugo de Naranja",
            "Café Molido",
            "Té Verde",
            "Limonada",
        ],
    ),
    (
        "ABA",
        &[
            "Arroz",
            "Frijol Negro",
            "Aceite Vegetal",
            "Azúcar",
            "Sal de Mesa",
            "Harina de Trigo",
        ],
    ),
    (
        "BOT",
        &[
            "Papas Fritas",
            "Cacahuates",
            "Galletas María",
            "Chocolate Amargo",
            "Gomitas",
            "Palomitas",
        ],
    ),
    (
        "LIM",
        &[
            "Jabón de Barra",
            "Detergente",
            "Cloro",
            "Escoba",
            "Papel Higiénico",
            "Servilletas",
        ],
    ),
];

/// Size variants with a price add-on in cents.
const SIZES: &[(&str, i64)] = &[
    ("Chico", 0),
    ("Mediano", 500),
    ("Grande", 1000),
    ("1kg", 800),
    ("6-Pack", 2500),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./corte_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Corte POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./corte_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Corte POS Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    println!();
    println!("Generating products...");

    let mut generated = 0usize;
    let start = std::time::Instant::now();

    'outer: for (family_idx, (family_code, names)) in FAMILIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, price_addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = family_idx * 1000 + name_idx * 10 + size_idx;
                let product = generate_product(family_code, name, size, *price_addon, seed);

                if let Err(e) = db.products().insert(&product).await {
                    eprintln!("Failed to insert {}: {}", product.sku, e);
                    continue;
                }

                generated += 1;
            }
        }
    }

    let elapsed = start.elapsed();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    // Open a demo shift so sales can be recorded right away.
    let now = Utc::now();
    let turno = Turno {
        id: Uuid::new_v4().to_string(),
        tenant_id: DEFAULT_TENANT_ID.to_string(),
        tienda_id: "tienda-demo".to_string(),
        user_id: "cajero-demo".to_string(),
        closed_by: None,
        station: "caja-1".to_string(),
        estado: TurnoEstado::Abierto,
        efectivo_inicial_cents: 100_000,
        efectivo_final_cents: None,
        notes: Some("demo shift".to_string()),
        opened_at: now,
        closed_at: None,
    };

    if db
        .turnos()
        .find_open_by_store(&turno.tienda_id)
        .await?
        .is_none()
    {
        db.turnos().insert(&turno).await?;
        println!("✓ Opened demo shift at tienda-demo / caja-1");
    } else {
        println!("⚠ tienda-demo already has an open shift, skipping");
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with plausible data.
fn generate_product(family: &str, name: &str, size: &str, price_addon: i64, seed: usize) -> Product {
    let now = Utc::now();

    let sku = format!("{}-{:04}", family, seed);

    // Base price $0.99 - $8.99 plus the size add-on
    let base_price = 99 + ((seed * 17) % 800) as i64;
    let price_cents = base_price + price_addon;

    let stock = (seed % 51) as i64;

    Product {
        id: Uuid::new_v4().to_string(),
        tenant_id: DEFAULT_TENANT_ID.to_string(),
        sku,
        name: format!("{} {}", name, size),
        price_cents,
        stock,
        created_at: now,
        updated_at: now,
    }
}
