//! # Seed Data
//!
//! Populates an empty database with a small bakery catalog for
//! development.
//!
//! ## Usage
//! ```bash
//! FORNERIA_DB_PATH=./dev.db forneria seed
//! ```
//!
//! Does nothing when the database already has products.

use chrono::{Days, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::ApiError;
use forneria_core::{NutritionInfo, ProductDraft};
use forneria_db::Database;

/// Category name and description.
const CATEGORIES: &[(&str, &str)] = &[
    ("Panadería", "Pan del día"),
    ("Pastelería", "Tortas, kuchenes y dulces"),
    ("Bebidas", "Café, té y jugos"),
];

struct SeedProduct {
    code: &'static str,
    name: &'static str,
    category: usize,
    price_cents: i64,
    stock: i64,
    stock_min: i64,
    shelf_days: u64,
}

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        code: "PAN-MARR",
        name: "Marraqueta",
        category: 0,
        price_cents: 250,
        stock: 120,
        stock_min: 30,
        shelf_days: 1,
    },
    SeedProduct {
        code: "PAN-HALL",
        name: "Hallulla",
        category: 0,
        price_cents: 230,
        stock: 100,
        stock_min: 30,
        shelf_days: 1,
    },
    SeedProduct {
        code: "PAN-INTE",
        name: "Pan integral",
        category: 0,
        price_cents: 1890,
        stock: 15,
        stock_min: 5,
        shelf_days: 4,
    },
    SeedProduct {
        code: "PAS-KUCH",
        name: "Kuchen de manzana",
        category: 1,
        price_cents: 6990,
        stock: 8,
        stock_min: 2,
        shelf_days: 3,
    },
    SeedProduct {
        code: "PAS-BERL",
        name: "Berlín de crema",
        category: 1,
        price_cents: 990,
        stock: 24,
        stock_min: 6,
        shelf_days: 2,
    },
    SeedProduct {
        code: "PAS-ALFA",
        name: "Alfajor",
        category: 1,
        price_cents: 750,
        stock: 40,
        stock_min: 10,
        shelf_days: 20,
    },
    SeedProduct {
        code: "BEB-CAFE",
        name: "Café de grano 250 g",
        category: 2,
        price_cents: 5490,
        stock: 12,
        stock_min: 3,
        shelf_days: 180,
    },
    SeedProduct {
        code: "BEB-JUGO",
        name: "Jugo natural 1 L",
        category: 2,
        price_cents: 2490,
        stock: 10,
        stock_min: 4,
        shelf_days: 7,
    },
];

/// Client name, RUT and email.
const CLIENTS: &[(&str, &str, &str)] = &[
    ("Cafetería El Molino", "76.123.456-7", "compras@elmolino.cl"),
    ("Hotel Puerto Sur", "96.555.333-K", "cocina@puertosur.cl"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSummary {
    pub categories: usize,
    pub products: usize,
    pub clients: usize,
    pub skipped: bool,
}

pub async fn run(db: &Database) -> Result<SeedSummary, ApiError> {
    let existing = db.products().count().await?;
    if existing > 0 {
        info!(existing, "Database already has products, skipping seed");
        return Ok(SeedSummary {
            skipped: true,
            ..SeedSummary::default()
        });
    }

    let mut category_ids = Vec::with_capacity(CATEGORIES.len());
    for (name, description) in CATEGORIES {
        let category = db.categories().insert(Some(*name), Some(*description)).await?;
        category_ids.push(category.id);
    }

    let today = Utc::now().date_naive();
    for seed in PRODUCTS {
        let nutrition_id = if seed.code == "PAN-MARR" {
            let info = NutritionInfo {
                calories: Some(270),
                proteins_centigrams: Some(900),
                fats_centigrams: Some(100),
                carbohydrates_centigrams: Some(5_600),
                sugars_centigrams: Some(150),
                sodium_centigrams: Some(55),
                ..NutritionInfo::default()
            };
            Some(db.nutrition().insert(&info).await?.id)
        } else {
            None
        };

        let draft = ProductDraft {
            code: Some(seed.code.to_string()),
            name: seed.name.to_string(),
            description: None,
            brand: Some("Forneria".to_string()),
            price_cents: seed.price_cents,
            expires_on: today.checked_add_days(Days::new(seed.shelf_days)).unwrap_or(today),
            made_on: Some(today),
            kind: None,
            stock_actual: seed.stock,
            stock_min: Some(seed.stock_min),
            stock_max: None,
            presentation: Some("unidad".to_string()),
            format: None,
            category_id: category_ids[seed.category].clone(),
            nutrition_id,
        };
        db.products().insert(&draft).await?;
    }

    for (name, tax_id, email) in CLIENTS {
        db.clients().insert(name, Some(*tax_id), Some(*email)).await?;
    }

    let summary = SeedSummary {
        categories: CATEGORIES.len(),
        products: PRODUCTS.len(),
        clients: CLIENTS.len(),
        skipped: false,
    };
    info!(
        categories = summary.categories,
        products = summary.products,
        clients = summary.clients,
        "Seed data inserted"
    );
    Ok(summary)
}
