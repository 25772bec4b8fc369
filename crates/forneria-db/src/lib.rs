//! # forneria-db: Storage and Transactions for Forneria
//!
//! SQLite persistence, the stock ledger and the sale transaction manager.
//! Pure rules (pricing, stock checks, validation) live in `forneria-core`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Forneria Data Flow                               │
//! │                                                                         │
//! │  CLI command (sale create)                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   forneria-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  SaleManager  │───►│  StockLedger  │───►│  StockLocks  │  │   │
//! │  │   │  (sales.rs)   │    │  (ledger.rs)  │    │  (locks.rs)  │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           │ CatalogLookup      │                               │   │
//! │  │           ▼                    ▼                               │   │
//! │  │   ┌───────────────────────────────────────┐  ┌──────────────┐  │   │
//! │  │   │  Repositories (repository/*.rs)       │  │  Migrations  │  │   │
//! │  │   └───────────────────┬───────────────────┘  └──────────────┘  │   │
//! │  └───────────────────────┼─────────────────────────────────────────┘   │
//! │                          ▼                                             │
//! │                  SQLite (WAL, foreign keys on)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use forneria_db::{Database, DbConfig, SalesConfig};
//!
//! let db = Database::new(DbConfig::new("forneria.db")).await?;
//! let sales = db.sale_manager(SalesConfig::default());
//! let sale_id = sales.create_sale(&new_sale).await?;
//! ```

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod sales;

pub use catalog::{CatalogLookup, SqliteCatalog};
pub use error::{DbError, DbResult, ServiceError, ServiceResult};
pub use ledger::{AdjustOutcome, BulkAdjustReport, StockLedger};
pub use locks::StockLocks;
pub use pool::{Database, DbConfig};
pub use sales::{SaleAttemptState, SaleManager, SalesConfig, TotalsCheck};

pub use repository::category::CategoryRepository;
pub use repository::client::ClientRepository;
pub use repository::movement::MovementRepository;
pub use repository::nutrition::NutritionRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use chrono::NaiveDate;
    use forneria_core::{Category, Product, ProductDraft};

    use crate::pool::{Database, DbConfig};

    pub const LOCK_TIMEOUT: Duration = Duration::from_secs(2);

    /// Fresh in-memory database with migrations applied.
    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn seed_category(db: &Database) -> Category {
        db.categories()
            .insert(Some("Panadería"), Some("Pan del día"))
            .await
            .unwrap()
    }

    pub fn draft(category_id: &str, code: &str, price_cents: i64, stock: i64) -> ProductDraft {
        ProductDraft {
            code: Some(code.to_string()),
            name: format!("Producto {code}"),
            description: None,
            brand: None,
            price_cents,
            expires_on: NaiveDate::from_ymd_opt(2099, 12, 31).unwrap(),
            made_on: None,
            kind: None,
            stock_actual: stock,
            stock_min: None,
            stock_max: None,
            presentation: None,
            format: None,
            category_id: category_id.to_string(),
            nutrition_id: None,
        }
    }

    /// Inserts a product in a fresh category.
    pub async fn seed_product(db: &Database, code: &str, price_cents: i64, stock: i64) -> Product {
        let category = seed_category(db).await;
        db.products()
            .insert(&draft(&category.id, code, price_cents, stock))
            .await
            .unwrap()
    }
}
