//! # Domain Types
//!
//! Core domain types used throughout Forneria.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Category     │◄──│    Product      │──►│  NutritionInfo  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  (optional 1:1) │       │
//! │  │  name           │   │  code (unique)  │   └─────────────────┘       │
//! │  └─────────────────┘   │  price_cents    │                             │
//! │                        │  stock_actual   │──► StockMovement (1:N)      │
//! │                        └────────▲────────┘    ENTRY / EXIT, append-only│
//! │                                 │ restrict                              │
//! │  ┌─────────────────┐   ┌────────┴────────┐                             │
//! │  │     Client      │◄──│    SaleLine     │                             │
//! │  │  ─────────────  │   │  qty, price     │                             │
//! │  │  tax_id (RUT)   │   │  discount_bps   │                             │
//! │  └────────▲────────┘   └────────┬────────┘                             │
//! │           │                     │ cascade                               │
//! │           └─────────────┌───────▼─────────┐                             │
//! │                         │      Sale       │  totals derived from lines  │
//! │                         └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity is keyed by a UUID v4 string. Products may also carry a
//! human-facing `code`; sale carts may reference a product by either.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::stock;
use crate::validation::validate_tax_rate_bps;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1900 bps = 19% (Chilean IVA, the default)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a decimal percentage such as `19` or `8.25`.
    ///
    /// Returns `None` for negative values, rates above 100% or more than two
    /// fractional digits of percent.
    pub fn from_percent(pct: Decimal) -> Option<Self> {
        let bps = u32::try_from(Money::from_decimal_exact(pct)?.cents()).ok()?;
        validate_tax_rate_bps(bps).is_ok().then_some(TaxRate(bps))
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as an exact fraction (`1900` → `0.19`).
    #[inline]
    pub fn as_fraction(&self) -> Decimal {
        Decimal::new(i64::from(self.0), 4)
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        crate::DEFAULT_TAX_RATE
    }
}

// =============================================================================
// Category
// =============================================================================

/// A product category (e.g. "Breads", "Pastries").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

// =============================================================================
// Nutrition
// =============================================================================

/// Nutritional facts attached one-to-one to a product.
///
/// Gram amounts are stored in hundredths (`1250` = 12.50 g) so they stay
/// exact; sodium uses the same scale in milligrams.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct NutritionInfo {
    pub id: String,
    pub calories: Option<i64>,
    pub proteins_centigrams: Option<i64>,
    pub fats_centigrams: Option<i64>,
    pub carbohydrates_centigrams: Option<i64>,
    pub sugars_centigrams: Option<i64>,
    pub sodium_centigrams: Option<i64>,
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Optional unique business code, usable as a cart reference.
    pub code: Option<String>,

    /// Display name shown to the seller and on the receipt.
    pub name: String,

    pub description: Option<String>,
    pub brand: Option<String>,

    /// List price in cents. Sale lines capture their own price.
    pub price_cents: i64,

    /// Best-before date.
    #[ts(as = "String")]
    pub expires_on: NaiveDate,

    /// Baking / production date.
    #[ts(as = "Option<String>")]
    pub made_on: Option<NaiveDate>,

    pub kind: Option<String>,

    /// Units on hand. Never negative.
    pub stock_actual: i64,

    pub stock_min: Option<i64>,
    pub stock_max: Option<i64>,

    pub presentation: Option<String>,
    pub format: Option<String>,

    pub category_id: String,
    pub nutrition_id: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the list price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Whether `quantity` units can leave stock right now.
    pub fn can_sell(&self, quantity: i64) -> bool {
        stock::can_deduct(self.stock_actual, quantity)
    }

    /// True when a minimum is configured and stock sits at or below it.
    pub fn is_below_minimum(&self) -> bool {
        self.stock_min.is_some_and(|min| self.stock_actual <= min)
    }
}

/// Editable product fields, used for create and update.
///
/// Validated by [`crate::validation::validate_product_draft`] before any
/// storage call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductDraft {
    pub code: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub price_cents: i64,
    #[ts(as = "String")]
    pub expires_on: NaiveDate,
    #[ts(as = "Option<String>")]
    pub made_on: Option<NaiveDate>,
    pub kind: Option<String>,
    pub stock_actual: i64,
    pub stock_min: Option<i64>,
    pub stock_max: Option<i64>,
    pub presentation: Option<String>,
    pub format: Option<String>,
    pub category_id: String,
    pub nutrition_id: Option<String>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Direction of an inventory change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum MovementKind {
    /// Units added to stock (restock, sale reversal).
    Entry,
    /// Units removed from stock (sale, shrinkage).
    Exit,
}

/// Immutable audit record of one stock change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub kind: MovementKind,
    /// Always >= 1.
    pub quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Client
// =============================================================================

/// A customer. Anonymous counter sales use the walk-in client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Client {
    pub id: String,
    /// National tax id (RUT).
    pub tax_id: Option<String>,
    pub name: String,
    pub email: Option<String>,
}

// =============================================================================
// Sale Channel
// =============================================================================

/// Where a sale was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SaleChannel {
    /// Over the counter.
    #[default]
    Store,
    /// Ordered online.
    Online,
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale. Totals are always derived from its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub client_id: String,
    pub channel: SaleChannel,
    /// Receipt number.
    pub folio: String,
    /// Sum of line subtotals.
    pub total_net_cents: i64,
    pub total_tax_cents: i64,
    /// Sale-level discount, applied to the net before tax.
    pub discount_cents: i64,
    pub total_gross_cents: i64,
    pub amount_paid_cents: Option<i64>,
    pub change_cents: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total_gross(&self) -> Money {
        Money::from_cents(self.total_gross_cents)
    }

    #[inline]
    pub fn amount_paid(&self) -> Option<Money> {
        self.amount_paid_cents.map(Money::from_cents)
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line item in a sale.
///
/// The unit price is captured when the sale is made and never follows later
/// product price changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Zero-based position in the original cart.
    pub position: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Line discount in basis points of percent (1250 = 12.50%).
    pub discount_bps: Option<u32>,
    /// Quantized `qty × price × (100 − pct) / 100`.
    pub line_subtotal_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_subtotal(&self) -> Money {
        Money::from_cents(self.line_subtotal_cents)
    }
}

// =============================================================================
// Receipt
// =============================================================================

/// One printed receipt line, with the product resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReceiptLine {
    pub product_id: String,
    pub product_name: String,
    pub product_code: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_bps: Option<u32>,
    pub line_subtotal_cents: i64,
}

/// Read-only view of a finalized sale for the receipt renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub client_name: String,
    pub lines: Vec<ReceiptLine>,
    /// `max(gross − paid, 0)`; the full gross when nothing was paid.
    pub balance_due_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
