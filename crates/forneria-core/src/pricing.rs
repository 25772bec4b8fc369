//! # Pricing Engine
//!
//! Pure monetary computation for sale lines and sale totals.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  line_subtotal      = quantize(qty × unit_price × (100 − pct) / 100)   │
//! │                                                                         │
//! │  total_net          = Σ line_subtotal                                  │
//! │  net_after_discount = max(total_net − discount, 0)                     │
//! │  total_tax          = quantize(net_after_discount × tax_rate)          │
//! │  total_gross        = net_after_discount + total_tax                   │
//! │  change             = max(amount_paid − total_gross, 0)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All intermediate products are computed in [`Decimal`]; rounding happens
//! only through [`Money::quantize`] (two decimals, half-up).
//!
//! ## Example
//! ```rust
//! use forneria_core::money::Money;
//! use forneria_core::pricing::{line_subtotal, recalculate_totals};
//! use forneria_core::types::TaxRate;
//!
//! let line = line_subtotal(3, Money::from_cents(200), None).unwrap();
//! let totals = recalculate_totals(&[line], Money::zero(), TaxRate::from_bps(1900), None).unwrap();
//!
//! assert_eq!(totals.total_net.cents(), 600);
//! assert_eq!(totals.total_tax.cents(), 114);
//! assert_eq!(totals.total_gross.cents(), 714);
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::TaxRate;

/// 100.00% expressed in basis points of percent.
pub const FULL_DISCOUNT_BPS: u32 = 10_000;

// =============================================================================
// Sale Totals
// =============================================================================

/// Every derived monetary field of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleTotals {
    pub total_net: Money,
    pub discount: Money,
    pub net_after_discount: Money,
    pub total_tax: Money,
    pub total_gross: Money,
    pub amount_paid: Option<Money>,
    pub change: Option<Money>,
}

impl SaleTotals {
    /// Amount still owed on this sale.
    pub fn balance_due(&self) -> Money {
        balance_due(self.total_gross, self.amount_paid)
    }

    /// Applies payment terms to already computed totals.
    pub fn with_payment(mut self, terms: PaymentTerms) -> Self {
        match terms {
            PaymentTerms::Tendered(paid) => {
                self.amount_paid = Some(paid);
                self.change = Some(paid.saturating_sub_floor(self.total_gross));
            }
            PaymentTerms::Full => {
                self.amount_paid = Some(self.total_gross);
                self.change = Some(Money::zero());
            }
            PaymentTerms::Deferred => {
                self.amount_paid = None;
                self.change = None;
            }
        }
        self
    }
}

/// How a sale is being paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTerms {
    /// The customer handed over this amount; change is computed.
    Tendered(Money),
    /// Paid exactly in full: amount paid equals gross, no change.
    Full,
    /// Nothing recorded yet.
    Deferred,
}

impl PaymentTerms {
    /// Resolves caller input: an explicit amount wins, then the full-payment
    /// flag (which callers default to `true`).
    pub fn from_input(amount_paid: Option<Money>, full_payment: bool) -> Self {
        match (amount_paid, full_payment) {
            (Some(paid), _) => PaymentTerms::Tendered(paid),
            (None, true) => PaymentTerms::Full,
            (None, false) => PaymentTerms::Deferred,
        }
    }
}

// =============================================================================
// Line Pricing
// =============================================================================

/// Computes a line subtotal.
///
/// `discount_bps` is a percentage with two decimals stored as basis points
/// (`1250` = 12.50%). `None` means no discount.
///
/// ## Errors
/// - `InvalidQuantity` when `quantity <= 0` or the discount is above 100%
/// - `InvalidAmount` when the unit price is negative or the result overflows
///
/// ```rust
/// use forneria_core::money::Money;
/// use forneria_core::pricing::line_subtotal;
///
/// // 3 × 10.99 with 12.5% off = 28.84875 → 28.85
/// let sub = line_subtotal(3, Money::from_cents(1099), Some(1250)).unwrap();
/// assert_eq!(sub.cents(), 2885);
/// ```
pub fn line_subtotal(
    quantity: i64,
    unit_price: Money,
    discount_bps: Option<u32>,
) -> CoreResult<Money> {
    if quantity <= 0 {
        return Err(CoreError::invalid_quantity("quantity", "must be at least 1"));
    }
    if unit_price.is_negative() {
        return Err(CoreError::invalid_amount("unit_price", "must not be negative"));
    }
    let bps = discount_bps.unwrap_or(0);
    if bps > FULL_DISCOUNT_BPS {
        return Err(CoreError::invalid_quantity(
            "discount_pct",
            "must be between 0 and 100",
        ));
    }

    let remaining = Decimal::new(i64::from(FULL_DISCOUNT_BPS - bps), 4);
    Decimal::from(quantity)
        .checked_mul(unit_price.to_decimal())
        .and_then(|gross| gross.checked_mul(remaining))
        .and_then(Money::quantize)
        .ok_or_else(|| CoreError::invalid_amount("line_subtotal", "amount out of range"))
}

// =============================================================================
// Sale Totals
// =============================================================================

/// Recomputes every sale total from line subtotals.
///
/// A discount larger than the net floors the taxable base at zero. When
/// `amount_paid` is known the change is filled in; otherwise both payment
/// fields stay `None` (use [`SaleTotals::with_payment`] for other terms).
pub fn recalculate_totals(
    line_subtotals: &[Money],
    discount: Money,
    tax_rate: TaxRate,
    amount_paid: Option<Money>,
) -> CoreResult<SaleTotals> {
    if discount.is_negative() {
        return Err(CoreError::invalid_amount("discount", "must not be negative"));
    }

    let out_of_range = || CoreError::invalid_amount("total", "amount out of range");

    let sum = line_subtotals
        .iter()
        .try_fold(Decimal::ZERO, |acc, m| acc.checked_add(m.to_decimal()))
        .ok_or_else(out_of_range)?;
    let total_net = Money::quantize(sum).ok_or_else(out_of_range)?;

    let net_after_discount = total_net.saturating_sub_floor(discount);

    let total_tax = net_after_discount
        .to_decimal()
        .checked_mul(tax_rate.as_fraction())
        .and_then(Money::quantize)
        .ok_or_else(out_of_range)?;

    let total_gross = net_after_discount
        .to_decimal()
        .checked_add(total_tax.to_decimal())
        .and_then(Money::quantize)
        .ok_or_else(out_of_range)?;

    let totals = SaleTotals {
        total_net,
        discount,
        net_after_discount,
        total_tax,
        total_gross,
        amount_paid: None,
        change: None,
    };

    Ok(match amount_paid {
        Some(paid) => totals.with_payment(PaymentTerms::Tendered(paid)),
        None => totals,
    })
}

/// Amount still owed: `max(gross − paid, 0)`; unpaid sales owe the gross.
pub fn balance_due(total_gross: Money, amount_paid: Option<Money>) -> Money {
    total_gross.saturating_sub_floor(amount_paid.unwrap_or_default())
}

/// True when `gross == net_after_discount + tax` and the net matches the
/// lines; the invariant every stored sale must keep.
pub fn totals_consistent(stored: &SaleTotals, recomputed: &SaleTotals) -> bool {
    stored.total_net == recomputed.total_net
        && stored.total_tax == recomputed.total_tax
        && stored.total_gross == recomputed.total_gross
        && stored.total_gross == stored.net_after_discount + stored.total_tax
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const IVA: TaxRate = TaxRate::from_bps(1900);

    fn cents(c: i64) -> Money {
        Money::from_cents(c)
    }

    #[test]
    fn test_single_line_sale_totals() {
        let line = line_subtotal(3, cents(200), Some(0)).unwrap();
        assert_eq!(line, cents(600));

        let totals = recalculate_totals(&[line], Money::zero(), IVA, None).unwrap();
        assert_eq!(totals.total_net, cents(600));
        assert_eq!(totals.total_tax, cents(114));
        assert_eq!(totals.total_gross, cents(714));
        assert_eq!(totals.amount_paid, None);
        assert_eq!(totals.change, None);
    }

    #[test]
    fn test_line_discount_rounds_half_up() {
        // 3 × 10.99 × 0.875 = 28.84875
        assert_eq!(line_subtotal(3, cents(1099), Some(1250)).unwrap(), cents(2885));
        // 1 × 0.99 × 0.5 = 0.495
        assert_eq!(line_subtotal(1, cents(99), Some(5000)).unwrap(), cents(50));
        // full discount
        assert_eq!(line_subtotal(4, cents(350), Some(10_000)).unwrap(), Money::zero());
    }

    #[test]
    fn test_line_rejects_bad_input() {
        assert!(matches!(
            line_subtotal(0, cents(100), None),
            Err(CoreError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            line_subtotal(-2, cents(100), None),
            Err(CoreError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            line_subtotal(1, cents(100), Some(10_001)),
            Err(CoreError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            line_subtotal(1, cents(-1), None),
            Err(CoreError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_discount_larger_than_net_floors_at_zero() {
        let totals = recalculate_totals(&[cents(500)], cents(800), IVA, None).unwrap();
        assert_eq!(totals.net_after_discount, Money::zero());
        assert_eq!(totals.total_tax, Money::zero());
        assert_eq!(totals.total_gross, Money::zero());
    }

    #[test]
    fn test_discount_applied_before_tax() {
        // 10.00 - 1.00 = 9.00; tax 1.71; gross 10.71
        let totals = recalculate_totals(&[cents(600), cents(400)], cents(100), IVA, None).unwrap();
        assert_eq!(totals.total_net, cents(1000));
        assert_eq!(totals.net_after_discount, cents(900));
        assert_eq!(totals.total_tax, cents(171));
        assert_eq!(totals.total_gross, cents(1071));
    }

    #[test]
    fn test_tax_quantized() {
        // 10.99 × 0.19 = 2.0881 → 2.09
        let totals = recalculate_totals(&[cents(1099)], Money::zero(), IVA, None).unwrap();
        assert_eq!(totals.total_tax, cents(209));
        assert_eq!(totals.total_gross, cents(1308));
    }

    #[test]
    fn test_change_and_underpayment() {
        let paid =
            recalculate_totals(&[cents(600)], Money::zero(), IVA, Some(cents(1000))).unwrap();
        assert_eq!(paid.change, Some(cents(286)));
        assert_eq!(paid.balance_due(), Money::zero());

        let short =
            recalculate_totals(&[cents(600)], Money::zero(), IVA, Some(cents(500))).unwrap();
        assert_eq!(short.change, Some(Money::zero()));
        assert_eq!(short.balance_due(), cents(214));
    }

    #[test]
    fn test_payment_terms() {
        let totals = recalculate_totals(&[cents(600)], Money::zero(), IVA, None).unwrap();

        let full = totals.with_payment(PaymentTerms::from_input(None, true));
        assert_eq!(full.amount_paid, Some(cents(714)));
        assert_eq!(full.change, Some(Money::zero()));

        let deferred = totals.with_payment(PaymentTerms::from_input(None, false));
        assert_eq!(deferred.amount_paid, None);
        assert_eq!(deferred.balance_due(), cents(714));

        // An explicit amount wins over the flag.
        let tendered = totals.with_payment(PaymentTerms::from_input(Some(cents(2000)), true));
        assert_eq!(tendered.change, Some(cents(1286)));
    }

    #[test]
    fn test_empty_lines_and_zero_tax() {
        let totals = recalculate_totals(&[], Money::zero(), TaxRate::zero(), None).unwrap();
        assert_eq!(totals.total_gross, Money::zero());

        let totals =
            recalculate_totals(&[cents(999)], Money::zero(), TaxRate::zero(), None).unwrap();
        assert_eq!(totals.total_gross, cents(999));
    }

    #[test]
    fn test_negative_discount_rejected() {
        assert!(matches!(
            recalculate_totals(&[cents(100)], cents(-1), IVA, None),
            Err(CoreError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_overflow_is_an_error_not_a_panic() {
        assert!(line_subtotal(i64::MAX, Money::from_cents(i64::MAX), None).is_err());
    }

    #[test]
    fn test_totals_consistent() {
        let a = recalculate_totals(&[cents(600)], Money::zero(), IVA, None).unwrap();
        assert!(totals_consistent(&a, &a));

        let mut drifted = a;
        drifted.total_gross = cents(700);
        assert!(!totals_consistent(&drifted, &a));
    }
}
