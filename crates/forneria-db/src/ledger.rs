//! # Stock Ledger
//!
//! Owns `products.stock_actual` and the append-only `stock_movements` log.
//! Every stock change writes exactly one movement in the same transaction.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  deduct(p, q)       q ≤ 0 → InvalidQuantity                             │
//! │                     !can_deduct(stock, q) → InsufficientStock           │
//! │                     stock −= q, EXIT movement                           │
//! │                                                                         │
//! │  replenish(p, q)    q ≤ 0 → InvalidQuantity                             │
//! │                     stock + q > MAX_STOCK_LEVEL → InvalidQuantity       │
//! │                     stock += q, ENTRY movement                          │
//! │                                                                         │
//! │  adjust(p, k, q)    ENTRY → replenish                                   │
//! │                     EXIT  → remove min(stock, q); nothing if stock = 0  │
//! │                                                                         │
//! │  bulk_adjust(ps, k, q)  adjust on each product, one transaction,        │
//! │                         report how many products actually moved         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The standalone methods take the product locks and run their own
//! transaction. [`StockLedger::deduct_in`] and [`StockLedger::replenish_in`]
//! run on a caller's connection so the sale manager can compose them into
//! its transaction; the caller must already hold the product locks.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::locks::StockLocks;
use crate::repository::{movement, product};
use forneria_core::stock::{can_deduct, can_replenish, effective_quantity, ensure_positive};
use forneria_core::{CoreError, MovementKind, StockMovement, MAX_STOCK_LEVEL};

/// Result of a single clamped adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustOutcome {
    pub product_id: String,
    pub kind: MovementKind,
    pub requested: i64,
    /// Units actually moved; less than `requested` for a clamped EXIT.
    pub applied: i64,
    pub stock_after: i64,
    pub movement: Option<StockMovement>,
}

/// Summary of a bulk adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAdjustReport {
    /// Products whose stock actually changed.
    pub adjusted: usize,
    pub units_moved: i64,
    pub outcomes: Vec<AdjustOutcome>,
}

/// Stock ledger service.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
    locks: Arc<StockLocks>,
    lock_timeout: Duration,
}

impl StockLedger {
    pub fn new(pool: SqlitePool, locks: Arc<StockLocks>, lock_timeout: Duration) -> Self {
        StockLedger {
            pool,
            locks,
            lock_timeout,
        }
    }

    // =========================================================================
    // Connection-scoped operations
    // =========================================================================

    /// Removes `quantity` units inside the caller's transaction.
    pub async fn deduct_in(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> ServiceResult<StockMovement> {
        ensure_positive("quantity", quantity)?;

        let (name, available) = product::stock_of(conn, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let insufficient = || CoreError::InsufficientStock {
            product: name.clone(),
            requested: quantity,
            available,
        };

        if !can_deduct(available, quantity) {
            return Err(insufficient().into());
        }

        // Conditional UPDATE; the CHECK constraint also forbids negatives.
        if !product::decrement(conn, product_id, quantity).await? {
            return Err(insufficient().into());
        }

        let movement = movement::append(conn, product_id, MovementKind::Exit, quantity).await?;
        debug!(
            product_id = %product_id,
            quantity,
            stock_after = available - quantity,
            "Stock deducted"
        );
        Ok(movement)
    }

    /// Adds `quantity` units inside the caller's transaction.
    pub async fn replenish_in(
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> ServiceResult<StockMovement> {
        ensure_positive("quantity", quantity)?;

        let (_, stock) = product::stock_of(conn, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let over_ceiling = || {
            CoreError::invalid_quantity(
                "quantity",
                format!("stock would exceed {MAX_STOCK_LEVEL} units"),
            )
        };

        if !can_replenish(stock, quantity) {
            return Err(over_ceiling().into());
        }

        // Conditional UPDATE; refuses to pass the ceiling even on a stale read.
        if !product::increment(conn, product_id, quantity).await? {
            return Err(over_ceiling().into());
        }

        let movement = movement::append(conn, product_id, MovementKind::Entry, quantity).await?;
        debug!(product_id = %product_id, quantity, "Stock replenished");
        Ok(movement)
    }

    /// Applies a clamped adjustment inside the caller's transaction.
    pub async fn adjust_in(
        conn: &mut SqliteConnection,
        product_id: &str,
        kind: MovementKind,
        quantity: i64,
    ) -> ServiceResult<AdjustOutcome> {
        ensure_positive("quantity", quantity)?;

        let (_, stock) = product::stock_of(conn, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let applied = effective_quantity(kind, stock, quantity);
        let movement = match (kind, applied) {
            (_, 0) => None,
            (MovementKind::Entry, q) => Some(Self::replenish_in(conn, product_id, q).await?),
            (MovementKind::Exit, q) => Some(Self::deduct_in(conn, product_id, q).await?),
        };

        let stock_after = match kind {
            MovementKind::Entry => stock + applied,
            MovementKind::Exit => stock - applied,
        };

        Ok(AdjustOutcome {
            product_id: product_id.to_string(),
            kind,
            requested: quantity,
            applied,
            stock_after,
            movement,
        })
    }

    // =========================================================================
    // Standalone operations (lock + own transaction)
    // =========================================================================

    /// Removes stock, failing on insufficient quantity.
    pub async fn deduct(&self, product_id: &str, quantity: i64) -> ServiceResult<StockMovement> {
        ensure_positive("quantity", quantity)?;
        let _guard = self.locks.lock_products([product_id], self.lock_timeout).await?;

        let mut tx = self.pool.begin().await?;
        open_write(&mut tx, product_id).await?;
        let movement = Self::deduct_in(&mut tx, product_id, quantity).await;
        let movement = finish(tx, movement).await?;

        info!(product_id = %product_id, quantity, "Stock exit recorded");
        Ok(movement)
    }

    /// Adds stock.
    pub async fn replenish(&self, product_id: &str, quantity: i64) -> ServiceResult<StockMovement> {
        ensure_positive("quantity", quantity)?;
        let _guard = self.locks.lock_products([product_id], self.lock_timeout).await?;

        let mut tx = self.pool.begin().await?;
        open_write(&mut tx, product_id).await?;
        let movement = Self::replenish_in(&mut tx, product_id, quantity).await;
        let movement = finish(tx, movement).await?;

        info!(product_id = %product_id, quantity, "Stock entry recorded");
        Ok(movement)
    }

    /// Single-product inventory movement. EXIT never takes more than is on
    /// hand.
    pub async fn adjust(
        &self,
        product_id: &str,
        kind: MovementKind,
        quantity: i64,
    ) -> ServiceResult<AdjustOutcome> {
        ensure_positive("quantity", quantity)?;
        let _guard = self.locks.lock_products([product_id], self.lock_timeout).await?;

        let mut tx = self.pool.begin().await?;
        open_write(&mut tx, product_id).await?;
        let outcome = Self::adjust_in(&mut tx, product_id, kind, quantity).await;
        let outcome = finish(tx, outcome).await?;

        if outcome.applied < outcome.requested {
            warn!(
                product_id = %product_id,
                requested = outcome.requested,
                applied = outcome.applied,
                "Exit clamped to available stock"
            );
        }
        info!(product_id = %product_id, kind = ?kind, applied = outcome.applied, "Stock adjusted");
        Ok(outcome)
    }

    /// Adjusts every listed product by `quantity` in one transaction.
    ///
    /// Duplicate ids are adjusted once. Products with zero stock are
    /// skipped on EXIT and do not count as adjusted.
    pub async fn bulk_adjust(
        &self,
        product_ids: &[String],
        kind: MovementKind,
        quantity: i64,
    ) -> ServiceResult<BulkAdjustReport> {
        ensure_positive("quantity", quantity)?;

        let _guard = self.locks.lock_products(product_ids, self.lock_timeout).await?;
        let mut tx = self.pool.begin().await?;
        let outcomes = Self::adjust_all(&mut tx, product_ids, kind, quantity).await;
        let outcomes = finish(tx, outcomes).await?;

        let report = BulkAdjustReport {
            adjusted: outcomes.iter().filter(|o| o.applied > 0).count(),
            units_moved: outcomes.iter().map(|o| o.applied).sum(),
            outcomes,
        };

        info!(
            kind = ?kind,
            quantity,
            adjusted = report.adjusted,
            units_moved = report.units_moved,
            "Bulk stock adjustment committed"
        );
        Ok(report)
    }

    async fn adjust_all(
        conn: &mut SqliteConnection,
        product_ids: &[String],
        kind: MovementKind,
        quantity: i64,
    ) -> ServiceResult<Vec<AdjustOutcome>> {
        let mut outcomes = Vec::with_capacity(product_ids.len());
        for product_id in unique_in_order(product_ids) {
            open_write(conn, product_id).await?;
            outcomes.push(Self::adjust_in(conn, product_id, kind, quantity).await?);
        }
        Ok(outcomes)
    }

    /// Newest-first movement history.
    pub async fn movements(
        &self,
        product_id: Option<&str>,
        limit: u32,
    ) -> ServiceResult<Vec<StockMovement>> {
        let repo = movement::MovementRepository::new(self.pool.clone());
        Ok(repo.list(product_id, limit).await?)
    }
}

/// First statement of a ledger transaction: a write on the product, so the
/// transaction holds SQLite's write lock before reading stock.
async fn open_write(conn: &mut SqliteConnection, product_id: &str) -> ServiceResult<()> {
    if !product::touch(conn, product_id).await? {
        return Err(CoreError::ProductNotFound(product_id.to_string()).into());
    }
    Ok(())
}

/// Commits on success, rolls back on failure.
pub(crate) async fn finish<T>(
    tx: sqlx::Transaction<'_, sqlx::Sqlite>,
    result: ServiceResult<T>,
) -> ServiceResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(ServiceError::from)?;
            Ok(value)
        }
        Err(e) => {
            tx.rollback().await.map_err(ServiceError::from)?;
            Err(e)
        }
    }
}

fn unique_in_order(ids: &[String]) -> impl Iterator<Item = &str> {
    let mut seen = std::collections::HashSet::new();
    ids.iter().map(String::as_str).filter(move |id| seen.insert(*id))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_product, test_db, LOCK_TIMEOUT};

    #[tokio::test]
    async fn test_deduct_and_replenish_write_movements() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 10).await;
        let ledger = db.ledger(LOCK_TIMEOUT);

        let exit = ledger.deduct(&p.id, 4).await.unwrap();
        assert_eq!(exit.kind, MovementKind::Exit);
        let entry = ledger.replenish(&p.id, 1).await.unwrap();
        assert_eq!(entry.kind, MovementKind::Entry);

        let stock = db.products().get_by_id(&p.id).await.unwrap().unwrap().stock_actual;
        assert_eq!(stock, 7);

        let history = ledger.movements(Some(&p.id), 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, entry.id, "newest first");
    }

    #[tokio::test]
    async fn test_deduct_insufficient_changes_nothing() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 2).await;
        let ledger = db.ledger(LOCK_TIMEOUT);

        let err = ledger.deduct(&p.id, 5).await.unwrap_err();
        assert_eq!(
            err.as_domain(),
            Some(&CoreError::InsufficientStock {
                product: "Producto PAN-01".to_string(),
                requested: 5,
                available: 2,
            })
        );

        let stock = db.products().get_by_id(&p.id).await.unwrap().unwrap().stock_actual;
        assert_eq!(stock, 2);
        assert!(ledger.movements(Some(&p.id), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_quantity_rejected() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 2).await;
        let ledger = db.ledger(LOCK_TIMEOUT);

        for qty in [0, -3] {
            assert!(matches!(
                ledger.deduct(&p.id, qty).await,
                Err(ServiceError::Domain(CoreError::InvalidQuantity { .. }))
            ));
            assert!(matches!(
                ledger.replenish(&p.id, qty).await,
                Err(ServiceError::Domain(CoreError::InvalidQuantity { .. }))
            ));
        }
    }

    #[tokio::test]
    async fn test_entry_past_stock_ceiling_rejected() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 10).await;
        let ledger = db.ledger(LOCK_TIMEOUT);

        for qty in [i64::MAX, MAX_STOCK_LEVEL] {
            assert!(matches!(
                ledger.adjust(&p.id, MovementKind::Entry, qty).await,
                Err(ServiceError::Domain(CoreError::InvalidQuantity { .. }))
            ));
            assert!(matches!(
                ledger.replenish(&p.id, qty).await,
                Err(ServiceError::Domain(CoreError::InvalidQuantity { .. }))
            ));
        }

        let ids = vec![p.id.clone()];
        assert!(ledger.bulk_adjust(&ids, MovementKind::Entry, i64::MAX).await.is_err());

        assert_eq!(db.products().get_by_id(&p.id).await.unwrap().unwrap().stock_actual, 10);
        assert!(ledger.movements(Some(&p.id), 10).await.unwrap().is_empty());

        let outcome = ledger
            .adjust(&p.id, MovementKind::Entry, MAX_STOCK_LEVEL - 10)
            .await
            .unwrap();
        assert_eq!(outcome.stock_after, MAX_STOCK_LEVEL);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let db = test_db().await;
        let err = db.ledger(LOCK_TIMEOUT).replenish("missing", 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_adjust_exit_clamps() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 3).await;
        let ledger = db.ledger(LOCK_TIMEOUT);

        let outcome = ledger.adjust(&p.id, MovementKind::Exit, 5).await.unwrap();
        assert_eq!(outcome.applied, 3);
        assert_eq!(outcome.stock_after, 0);
        assert_eq!(outcome.movement.map(|m| m.quantity), Some(3));

        let again = ledger.adjust(&p.id, MovementKind::Exit, 5).await.unwrap();
        assert_eq!(again.applied, 0);
        assert!(again.movement.is_none());
    }

    #[tokio::test]
    async fn test_bulk_adjust_report() {
        let db = test_db().await;
        let a = seed_product(&db, "A", 100, 10).await;
        let b = seed_product(&db, "B", 100, 2).await;
        let c = seed_product(&db, "C", 100, 0).await;
        let ledger = db.ledger(LOCK_TIMEOUT);
        let ids = vec![a.id.clone(), b.id.clone(), c.id.clone(), a.id.clone()];

        let report = ledger.bulk_adjust(&ids, MovementKind::Exit, 5).await.unwrap();
        assert_eq!(report.adjusted, 2);
        assert_eq!(report.units_moved, 7);
        assert_eq!(report.outcomes.len(), 3);

        let stock = |id: String| {
            let db = db.clone();
            async move { db.products().get_by_id(&id).await.unwrap().unwrap().stock_actual }
        };
        assert_eq!(stock(a.id.clone()).await, 5);
        assert_eq!(stock(b.id.clone()).await, 0);
        assert_eq!(stock(c.id.clone()).await, 0);

        let report = ledger.bulk_adjust(&ids, MovementKind::Entry, 5).await.unwrap();
        assert_eq!(report.adjusted, 3);
        assert_eq!(stock(c.id).await, 5);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["unitsMoved"], 15);
        assert_eq!(json["outcomes"][0]["kind"], "ENTRY");
    }

    #[tokio::test]
    async fn test_bulk_adjust_is_all_or_nothing() {
        let db = test_db().await;
        let a = seed_product(&db, "A", 100, 10).await;
        let ledger = db.ledger(LOCK_TIMEOUT);

        let ids = vec![a.id.clone(), "missing".to_string()];
        let err = ledger.bulk_adjust(&ids, MovementKind::Entry, 5).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(CoreError::ProductNotFound(_))));

        let stock = db.products().get_by_id(&a.id).await.unwrap().unwrap().stock_actual;
        assert_eq!(stock, 10);
    }

    #[tokio::test]
    async fn test_lock_timeout_is_concurrency_conflict() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 10).await;
        let _held = db.locks().lock_products([&p.id], LOCK_TIMEOUT).await.unwrap();

        let ledger = db.ledger(Duration::from_millis(20));
        let err = ledger.deduct(&p.id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::ConcurrencyConflict { .. })
        ));
    }
}
