//! # Stock Rules
//!
//! Pure rules behind every stock change. The ledger in `forneria-db` applies
//! them under a per-product lock; nothing here touches storage.
//!
//! ```text
//!   sale line / EXIT ──► can_deduct(stock, qty) ──► stock − qty ≥ 0 ?
//!   bulk / single EXIT ─► clamp_exit(stock, qty) ──► min(stock, qty)
//!   net change on edit ─► quantity_deltas(old, new) per product
//! ```

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::types::MovementKind;
use crate::MAX_STOCK_LEVEL;

/// True iff `quantity > 0` and `stock - quantity >= 0`.
///
/// ```rust
/// use forneria_core::stock::can_deduct;
///
/// assert!(can_deduct(10, 10));
/// assert!(!can_deduct(2, 5));
/// assert!(!can_deduct(5, 0));
/// ```
#[inline]
pub fn can_deduct(stock: i64, quantity: i64) -> bool {
    quantity > 0 && stock >= quantity
}

/// True iff `quantity > 0` and `stock + quantity` stays within
/// [`MAX_STOCK_LEVEL`].
///
/// ```rust
/// use forneria_core::stock::can_replenish;
///
/// assert!(can_replenish(10, 5));
/// assert!(!can_replenish(10, i64::MAX));
/// ```
#[inline]
pub fn can_replenish(stock: i64, quantity: i64) -> bool {
    quantity > 0 && stock.checked_add(quantity).is_some_and(|total| total <= MAX_STOCK_LEVEL)
}

/// Rejects non-positive quantities for a ledger movement.
pub fn ensure_positive(field: &str, quantity: i64) -> CoreResult<()> {
    if quantity <= 0 {
        return Err(CoreError::invalid_quantity(field, "must be at least 1"));
    }
    Ok(())
}

/// Quantity an EXIT may actually remove without going negative.
///
/// Zero means the product should be skipped.
#[inline]
pub fn clamp_exit(stock: i64, requested: i64) -> i64 {
    requested.min(stock).max(0)
}

/// Quantity a movement of `kind` will really apply to `stock`.
pub fn effective_quantity(kind: MovementKind, stock: i64, requested: i64) -> i64 {
    match kind {
        MovementKind::Entry => requested,
        MovementKind::Exit => clamp_exit(stock, requested),
    }
}

/// Signed per-product change needed to go from `old` lines to `new` lines.
///
/// Both inputs are `(product_id, quantity)` pairs; repeated products are
/// summed. Positive deltas must be deducted, negative ones replenished,
/// zero deltas are omitted. Output is ordered by product id.
pub fn quantity_deltas<'a, O, N>(old: O, new: N) -> BTreeMap<String, i64>
where
    O: IntoIterator<Item = (&'a str, i64)>,
    N: IntoIterator<Item = (&'a str, i64)>,
{
    let mut deltas: BTreeMap<String, i64> = BTreeMap::new();
    for (product, qty) in old {
        *deltas.entry(product.to_string()).or_default() -= qty;
    }
    for (product, qty) in new {
        *deltas.entry(product.to_string()).or_default() += qty;
    }
    deltas.retain(|_, delta| *delta != 0);
    deltas
}
