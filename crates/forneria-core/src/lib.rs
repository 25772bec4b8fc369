//! # forneria-core: Pure Business Logic for Forneria
//!
//! The pricing engine, stock rules and cart validation of the bakery sale
//! engine, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Forneria Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Callers (CLI, seller screen, admin)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ NewSale / EditSale (serde)            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         forneria-db: SaleManager, StockLedger, Catalog           │   │
//! │  │         (locks, transactions, SQL)                               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ pure calls                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ forneria-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ │   │
//! │  │   │  money  │ │ pricing │ │  stock  │ │  cart   │ │validation│ │   │
//! │  │   │  Money  │ │ totals  │ │ deduct? │ │ NewSale │ │ products │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO LOCKS • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Sale, SaleLine, StockMovement...)
//! - [`money`] - Money in cents, decimal quantization
//! - [`pricing`] - Line subtotals and sale totals
//! - [`stock`] - Non-negative stock rules
//! - [`cart`] - Cart input schema and validation
//! - [`validation`] - Catalog record validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use forneria_core::money::Money;
//! use forneria_core::pricing::{line_subtotal, recalculate_totals};
//! use forneria_core::DEFAULT_TAX_RATE;
//!
//! let line = line_subtotal(2, Money::from_cents(1099), None).unwrap();
//! let totals = recalculate_totals(&[line], Money::zero(), DEFAULT_TAX_RATE, None).unwrap();
//!
//! // 21.98 + 19% = 26.16 (4.1762 tax rounded to 4.18)
//! assert_eq!(totals.total_gross.cents(), 2616);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod pricing;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{CartLine, CartLineInput, EditSale, NewSale};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{PaymentTerms, SaleTotals};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Chilean IVA, 19%.
pub const DEFAULT_TAX_RATE: TaxRate = TaxRate::from_bps(1900);

/// Id of the walk-in client ("Varios") seeded by the initial migration.
///
/// Sales recorded without a client are attached to it.
pub const WALK_IN_CLIENT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Maximum lines in a single cart.
pub const MAX_CART_LINES: usize = 200;

/// Maximum units on one cart line. Guards against typos such as 10000
/// instead of 100.
pub const MAX_LINE_QUANTITY: i64 = 100_000;

/// Highest `stock_actual` a product may hold. Entries that would pass it
/// are rejected with `InvalidQuantity`.
pub const MAX_STOCK_LEVEL: i64 = 1_000_000_000;
