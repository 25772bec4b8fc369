//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Lookup by id, by code, or by either (`get_by_ref`)
//! - Catalog CRUD with validation and restrict-on-delete
//! - Connection-scoped stock reads and conditional updates used by the
//!   ledger inside its transactions
//!
//! ## Stock Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert()        sets the opening stock_actual                         │
//! │  update()        NEVER touches stock_actual                            │
//! │  decrement()     only via StockLedger / SaleManager, under lock:       │
//! │                  UPDATE ... SET stock_actual = stock_actual - ?        │
//! │                  WHERE id = ? AND stock_actual >= ?                    │
//! │  increment()     same, for ENTRY movements                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceError, ServiceResult};
use forneria_core::validation::validate_product_draft;
use forneria_core::{CoreError, Product, ProductDraft, MAX_STOCK_LEVEL};

const SELECT_PRODUCT: &str = r#"
    SELECT
        id, code, name, description, brand, price_cents,
        expires_on, made_on, kind,
        stock_actual, stock_min, stock_max,
        presentation, format, category_id, nutrition_id,
        created_at, updated_at
    FROM products
"#;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.get_by_ref("PAN-01").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Gets a product by its business code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE code = ?1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Resolves a cart reference: id first, then code.
    ///
    /// If one product's id equals another product's code, the id match wins.
    pub async fn get_by_ref(&self, reference: &str) -> DbResult<Option<Product>> {
        debug!(reference = %reference, "Resolving product reference");

        let product = sqlx::query_as::<_, Product>(&format!(
            "{SELECT_PRODUCT} WHERE id = ?1 OR code = ?1 ORDER BY (id = ?1) DESC LIMIT 1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    /// Lists products ordered by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!("{SELECT_PRODUCT} ORDER BY name LIMIT ?1");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Products at or below their configured minimum stock.
    pub async fn below_minimum(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{SELECT_PRODUCT} WHERE stock_min IS NOT NULL AND stock_actual <= stock_min \
             ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Creates a product from a validated draft.
    ///
    /// ## Errors
    /// - `Domain(Validation)` for bad fields
    /// - `Domain(CategoryNotFound)` when the category doesn't exist
    /// - `Storage(UniqueViolation)` for a duplicate code
    pub async fn insert(&self, draft: &ProductDraft) -> ServiceResult<Product> {
        validate_product_draft(draft)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            code: draft.code.as_ref().map(|c| c.trim().to_string()),
            name: draft.name.trim().to_string(),
            description: draft.description.clone(),
            brand: draft.brand.clone(),
            price_cents: draft.price_cents,
            expires_on: draft.expires_on,
            made_on: draft.made_on,
            kind: draft.kind.clone(),
            stock_actual: draft.stock_actual,
            stock_min: draft.stock_min,
            stock_max: draft.stock_max,
            presentation: draft.presentation.clone(),
            format: draft.format.clone(),
            category_id: draft.category_id.clone(),
            nutrition_id: draft.nutrition_id.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, code = ?product.code, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name, description, brand, price_cents,
                expires_on, made_on, kind,
                stock_actual, stock_min, stock_max,
                presentation, format, category_id, nutrition_id,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.brand)
        .bind(product.price_cents)
        .bind(product.expires_on)
        .bind(product.made_on)
        .bind(&product.kind)
        .bind(product.stock_actual)
        .bind(product.stock_min)
        .bind(product.stock_max)
        .bind(&product.presentation)
        .bind(&product.format)
        .bind(&product.category_id)
        .bind(&product.nutrition_id)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| missing_category(e.into(), &draft.category_id))?;

        Ok(product)
    }

    /// Updates catalog fields. `stock_actual` in the draft is ignored; stock
    /// only changes through the ledger.
    pub async fn update(&self, id: &str, draft: &ProductDraft) -> ServiceResult<Product> {
        validate_product_draft(draft)?;

        debug!(id = %id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                code = ?2, name = ?3, description = ?4, brand = ?5, price_cents = ?6,
                expires_on = ?7, made_on = ?8, kind = ?9,
                stock_min = ?10, stock_max = ?11,
                presentation = ?12, format = ?13, category_id = ?14, nutrition_id = ?15,
                updated_at = ?16
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(draft.code.as_ref().map(|c| c.trim().to_string()))
        .bind(draft.name.trim())
        .bind(&draft.description)
        .bind(&draft.brand)
        .bind(draft.price_cents)
        .bind(draft.expires_on)
        .bind(draft.made_on)
        .bind(&draft.kind)
        .bind(draft.stock_min)
        .bind(draft.stock_max)
        .bind(&draft.presentation)
        .bind(&draft.format)
        .bind(&draft.category_id)
        .bind(&draft.nutrition_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| missing_category(e.into(), &draft.category_id))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Deletes a product with its movements and nutrition record.
    ///
    /// ## Errors
    /// - `Domain(ProductInUse)` when a sale line references it
    /// - `Domain(ProductNotFound)` when it doesn't exist
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)
            .map_err(|e| -> ServiceError {
                if e.is_foreign_key() {
                    CoreError::ProductInUse(id.to_string()).into()
                } else {
                    e.into()
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }
        Ok(())
    }

    /// Gets total product count.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn missing_category(err: DbError, category_id: &str) -> ServiceError {
    if err.is_foreign_key() {
        CoreError::CategoryNotFound(category_id.to_string()).into()
    } else {
        err.into()
    }
}

// =============================================================================
// Connection-scoped stock access (used inside ledger / sale transactions)
// =============================================================================

/// Reads `(name, stock_actual)` for a product on the given connection.
pub(crate) async fn stock_of(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Option<(String, i64)>> {
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT name, stock_actual FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row)
}

/// Bumps `updated_at`. Returns `false` if the product doesn't exist.
///
/// Used as the opening write of ledger transactions so SQLite takes the
/// write lock before any stock is read.
pub(crate) async fn touch(conn: &mut SqliteConnection, product_id: &str) -> DbResult<bool> {
    let result = sqlx::query("UPDATE products SET updated_at = ?2 WHERE id = ?1")
        .bind(product_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Conditionally removes `quantity` units. Returns `false` (and changes
/// nothing) if that would take stock below zero.
pub(crate) async fn decrement(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_actual = stock_actual - ?2, updated_at = ?3
        WHERE id = ?1 AND stock_actual >= ?2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Adds `quantity` units as long as the result stays within
/// `MAX_STOCK_LEVEL`. Returns `false` if the product doesn't exist or the
/// ceiling would be passed.
pub(crate) async fn increment(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_actual = stock_actual + ?2, updated_at = ?3
        WHERE id = ?1 AND ?2 <= ?4 AND stock_actual <= ?4 - ?2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .bind(MAX_STOCK_LEVEL)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Unit Tests
// =============================================================================
