//! # Stock Movement Repository
//!
//! Append-only history of stock changes. Rows are written only by the
//! ledger, inside the same transaction as the stock update they describe;
//! this repository exposes the read side.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use forneria_core::{MovementKind, StockMovement};

#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Newest-first history, for one product or all of them.
    pub async fn list(&self, product_id: Option<&str>, limit: u32) -> DbResult<Vec<StockMovement>> {
        debug!(product_id = ?product_id, limit, "Listing stock movements");

        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, kind, quantity, created_at
            FROM stock_movements
            WHERE ?1 IS NULL OR product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Number of movements of `kind` recorded for a product.
    pub async fn count(&self, product_id: &str, kind: MovementKind) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_movements WHERE product_id = ?1 AND kind = ?2",
        )
                .bind(product_id)
                .bind(kind)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

/// Appends one movement on the caller's connection.
pub(crate) async fn append(
    conn: &mut SqliteConnection,
    product_id: &str,
    kind: MovementKind,
    quantity: i64,
) -> DbResult<StockMovement> {
    let movement = StockMovement {
        id: Uuid::new_v4().to_string(),
        product_id: product_id.to_string(),
        kind,
        quantity,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO stock_movements (id, product_id, kind, quantity, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(movement.kind)
    .bind(movement.quantity)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(movement)
}
