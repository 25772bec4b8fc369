//! # Cart Input
//!
//! The one cart schema accepted by the sale engine, and its validation into
//! typed lines.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  JSON / CLI args                                                        │
//! │      │ serde (camelCase)                                                │
//! │      ▼                                                                  │
//! │  NewSale { cart: [CartLineInput { productRef, quantity, unitPrice,      │
//! │                                    discountPct }], discount, ... }      │
//! │      │ NewSale::validate()                                              │
//! │      ▼                                                                  │
//! │  ValidatedSale { lines: [CartLine], discount: Money, payment }          │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  SaleManager (forneria-db): resolve refs, lock, deduct, price           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `productRef` is a product id or a product code; ids win when both match.
//! Amounts arrive as decimals (`"2.50"` or `2.5`) and are converted exactly;
//! anything finer than a cent is rejected, never rounded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, MONEY_SCALE};
use crate::pricing::{PaymentTerms, FULL_DISCOUNT_BPS};
use crate::types::SaleChannel;
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

const MAX_FOLIO_LEN: usize = 40;

// =============================================================================
// Input DTOs
// =============================================================================

/// One cart line as sent by the seller's screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLineInput {
    /// Product id or product code.
    pub product_ref: String,
    pub quantity: i64,
    /// Price per unit. Falls back to the product's list price when absent.
    #[serde(default)]
    #[ts(type = "string | number | null")]
    pub unit_price: Option<Decimal>,
    /// Line discount in percent, 0 to 100 with up to two decimals.
    #[serde(default)]
    #[ts(type = "string | number | null")]
    pub discount_pct: Option<Decimal>,
}

/// A request to record a new sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewSale {
    /// Absent means the walk-in client.
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub channel: SaleChannel,
    /// Receipt number; generated when absent.
    #[serde(default)]
    pub folio: Option<String>,
    pub cart: Vec<CartLineInput>,
    /// Sale-level discount amount, applied before tax.
    #[serde(default)]
    #[ts(type = "string | number | null")]
    pub discount: Option<Decimal>,
    #[serde(default)]
    #[ts(type = "string | number | null")]
    pub amount_paid: Option<Decimal>,
    /// Defaults to `true`: an unspecified payment means paid in full.
    #[serde(default)]
    pub full_payment: Option<bool>,
}

/// A request to replace the contents of an existing sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EditSale {
    pub cart: Vec<CartLineInput>,
    #[serde(default)]
    #[ts(type = "string | number | null")]
    pub discount: Option<Decimal>,
    #[serde(default)]
    #[ts(type = "string | number | null")]
    pub amount_paid: Option<Decimal>,
    #[serde(default)]
    pub full_payment: Option<bool>,
}

// =============================================================================
// Validated Output
// =============================================================================

/// A cart line that passed validation. The product is not resolved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product_ref: String,
    pub quantity: i64,
    pub unit_price: Option<Money>,
    pub discount_bps: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSale {
    pub client_id: Option<String>,
    pub channel: SaleChannel,
    pub folio: Option<String>,
    pub lines: Vec<CartLine>,
    pub discount: Money,
    pub payment: PaymentTerms,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEdit {
    pub lines: Vec<CartLine>,
    pub discount: Money,
    pub payment: PaymentTerms,
}

impl NewSale {
    /// Checks every field and converts amounts to [`Money`].
    ///
    /// ## Errors
    /// - `EmptyCart` when the cart has no lines
    /// - `InvalidQuantity` for quantity ≤ 0 or discount outside [0, 100]
    /// - `InvalidAmount` for negative or sub-cent amounts
    /// - `Validation` for blank product references or oversized folios
    pub fn validate(&self) -> CoreResult<ValidatedSale> {
        let lines = validate_cart(&self.cart)?;
        let discount = optional_amount("discount", self.discount)?.unwrap_or_default();
        let amount_paid = optional_amount("amountPaid", self.amount_paid)?;

        let folio = match non_blank(self.folio.as_deref()) {
            Some(f) if f.chars().count() > MAX_FOLIO_LEN => {
                return Err(ValidationError::TooLong {
                    field: "folio".to_string(),
                    max: MAX_FOLIO_LEN,
                }
                .into())
            }
            other => other,
        };

        Ok(ValidatedSale {
            client_id: non_blank(self.client_id.as_deref()),
            channel: self.channel,
            folio,
            lines,
            discount,
            payment: PaymentTerms::from_input(amount_paid, self.full_payment.unwrap_or(true)),
        })
    }
}

impl EditSale {
    /// Same rules as [`NewSale::validate`]; an edit may not empty a sale.
    pub fn validate(&self) -> CoreResult<ValidatedEdit> {
        let lines = validate_cart(&self.cart)?;
        let discount = optional_amount("discount", self.discount)?.unwrap_or_default();
        let amount_paid = optional_amount("amountPaid", self.amount_paid)?;

        Ok(ValidatedEdit {
            lines,
            discount,
            payment: PaymentTerms::from_input(amount_paid, self.full_payment.unwrap_or(true)),
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn validate_cart(cart: &[CartLineInput]) -> CoreResult<Vec<CartLine>> {
    if cart.is_empty() {
        return Err(CoreError::EmptyCart);
    }
    if cart.len() > MAX_CART_LINES {
        return Err(CoreError::invalid_quantity(
            "cart",
            format!("at most {MAX_CART_LINES} lines per sale"),
        ));
    }

    cart.iter()
        .enumerate()
        .map(|(i, line)| validate_line(i, line))
        .collect()
}

fn validate_line(index: usize, line: &CartLineInput) -> CoreResult<CartLine> {
    let field = |name: &str| format!("cart[{index}].{name}");

    let product_ref =
        non_blank(Some(line.product_ref.as_str())).ok_or_else(|| ValidationError::Required {
            field: field("productRef"),
        })?;

    if line.quantity <= 0 {
        return Err(CoreError::invalid_quantity(field("quantity"), "must be at least 1"));
    }
    if line.quantity > MAX_LINE_QUANTITY {
        return Err(CoreError::invalid_quantity(
            field("quantity"),
            format!("must not exceed {MAX_LINE_QUANTITY}"),
        ));
    }

    let unit_price = optional_amount(&field("unitPrice"), line.unit_price)?;
    let discount_bps = line
        .discount_pct
        .map(|pct| percent_to_bps(&field("discountPct"), pct))
        .transpose()?;

    Ok(CartLine {
        product_ref,
        quantity: line.quantity,
        unit_price,
        discount_bps,
    })
}

/// `12.5` → `1250`. Out of range or finer than 0.01% is `InvalidQuantity`.
pub fn percent_to_bps(field: &str, pct: Decimal) -> CoreResult<u32> {
    let reject = || {
        CoreError::invalid_quantity(field, "must be between 0 and 100 with at most two decimals")
    };
    let bps = Money::from_decimal_exact(pct).ok_or_else(reject)?.cents();
    u32::try_from(bps)
        .ok()
        .filter(|b| *b <= FULL_DISCOUNT_BPS)
        .ok_or_else(reject)
}

fn optional_amount(field: &str, value: Option<Decimal>) -> CoreResult<Option<Money>> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value.is_sign_negative() && !value.is_zero() {
        return Err(CoreError::invalid_amount(field, "must not be negative"));
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(CoreError::invalid_amount(field, "must have at most two decimals"));
    }
    Money::from_decimal_exact(value)
        .map(Some)
        .ok_or_else(|| CoreError::invalid_amount(field, "amount out of range"))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Unit Tests
// =============================================================================
