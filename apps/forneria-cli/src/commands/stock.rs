//! # Stock Commands
//!
//! Manual inventory movements. Products are named by id or code.

use tracing::debug;

use crate::config::AppConfig;
use crate::error::ApiError;
use forneria_core::{CoreError, MovementKind, Product, StockMovement};
use forneria_db::{AdjustOutcome, BulkAdjustReport, Database};

async fn resolve(db: &Database, product_ref: &str) -> Result<Product, ApiError> {
    db.products()
        .get_by_ref(product_ref)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(product_ref.to_string()).into())
}

/// Single-product movement. EXIT removes at most what is on hand.
pub async fn adjust(
    db: &Database,
    config: &AppConfig,
    product_ref: &str,
    kind: MovementKind,
    quantity: i64,
) -> Result<AdjustOutcome, ApiError> {
    debug!(product_ref, ?kind, quantity, "stock adjust command");
    let product = resolve(db, product_ref).await?;
    Ok(db.ledger(config.lock_timeout).adjust(&product.id, kind, quantity).await?)
}

/// Same movement over several products, all or nothing.
pub async fn bulk(
    db: &Database,
    config: &AppConfig,
    product_refs: &[String],
    kind: MovementKind,
    quantity: i64,
) -> Result<BulkAdjustReport, ApiError> {
    debug!(products = product_refs.len(), ?kind, quantity, "stock bulk command");
    let mut ids = Vec::with_capacity(product_refs.len());
    for product_ref in product_refs {
        ids.push(resolve(db, product_ref).await?.id);
    }
    Ok(db.ledger(config.lock_timeout).bulk_adjust(&ids, kind, quantity).await?)
}

pub async fn history(
    db: &Database,
    config: &AppConfig,
    product_ref: Option<&str>,
    limit: u32,
) -> Result<Vec<StockMovement>, ApiError> {
    let product_id = match product_ref {
        Some(r) => Some(resolve(db, r).await?.id),
        None => None,
    };
    Ok(db
        .ledger(config.lock_timeout)
        .movements(product_id.as_deref(), limit)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::seed;
    use crate::error::ErrorCode;
    use forneria_db::DbConfig;

    async fn seeded() -> (Database, AppConfig) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed::run(&db).await.unwrap();
        (db, AppConfig::default())
    }

    #[tokio::test]
    async fn test_adjust_by_code() {
        let (db, config) = seeded().await;
        let before = resolve(&db, "PAN-MARR").await.unwrap().stock_actual;

        let outcome = adjust(&db, &config, "PAN-MARR", MovementKind::Entry, 12).await.unwrap();
        assert_eq!(outcome.stock_after, before + 12);

        let outcome = adjust(&db, &config, "PAN-MARR", MovementKind::Exit, before + 100)
            .await
            .unwrap();
        assert_eq!(outcome.applied, before + 12);
        assert_eq!(outcome.stock_after, 0);

        let movements = history(&db, &config, Some("PAN-MARR"), 10).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[0].kind, MovementKind::Exit);
    }

    #[tokio::test]
    async fn test_bulk_and_unknown_product() {
        let (db, config) = seeded().await;
        let refs = vec!["PAN-MARR".to_string(), "PAN-HALL".to_string()];

        let report = bulk(&db, &config, &refs, MovementKind::Entry, 3).await.unwrap();
        assert_eq!(report.adjusted, 2);
        assert_eq!(report.units_moved, 6);

        let err = adjust(&db, &config, "NO-EXISTE", MovementKind::Entry, 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = adjust(&db, &config, "PAN-MARR", MovementKind::Entry, 0).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidQuantity);

        let err = adjust(&db, &config, "PAN-MARR", MovementKind::Entry, i64::MAX)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidQuantity);
    }
}
