//! # Repository Module
//!
//! Database repository implementations for Forneria.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Ways In                                          │
//! │                                                                         │
//! │  Read / catalog CRUD                Inside a transaction                │
//! │  ───────────────────                ────────────────────                │
//! │  db.products().get_by_ref(..)       product::decrement(&mut conn, ..)   │
//! │  db.sales().list(20)                sale::insert_line(&mut conn, ..)    │
//! │       │                             movement::append(&mut conn, ..)     │
//! │       ▼                                   │                             │
//! │  SqlitePool                               ▼                             │
//! │                                     Transaction owned by StockLedger    │
//! │                                     or SaleManager                      │
//! │                                                                         │
//! │  SQL stays in this module either way.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`category::CategoryRepository`] - Categories (restrict delete)
//! - [`nutrition::NutritionRepository`] - Nutrition facts
//! - [`product::ProductRepository`] - Products, lookup by id or code
//! - [`client::ClientRepository`] - Clients (restrict delete)
//! - [`movement::MovementRepository`] - Stock movement history
//! - [`sale::SaleRepository`] - Sales and sale lines

pub mod category;
pub mod client;
pub mod movement;
pub mod nutrition;
pub mod product;
pub mod sale;
