//! # Sale Repository
//!
//! Row-level operations for sales and sale lines.
//!
//! ## Who Writes What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SaleManager transaction                                                │
//! │                                                                         │
//! │  1. insert_shell()   → sales row, totals zero, folio assigned          │
//! │  2. insert_line() ×N → sale_lines rows (cart order = position)         │
//! │  3. update_totals()  → totals from the pricing engine                  │
//! │                                                                         │
//! │  delete:  touch() → lines_in() → replenish → delete_lines() → delete() │
//! │  edit:    touch() → lines_in() → deltas → delete_lines() → insert ...  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The write functions take a `&mut SqliteConnection` so they run inside the
//! manager's transaction. [`SaleRepository`] is the read side.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use forneria_core::{ReceiptLine, Sale, SaleLine, SaleTotals};

const SELECT_SALE: &str = r#"
    SELECT
        id, client_id, channel, folio,
        total_net_cents, total_tax_cents, discount_cents, total_gross_cents,
        amount_paid_cents, change_cents,
        created_at, updated_at
    FROM sales
"#;

const SELECT_LINE: &str = r#"
    SELECT
        id, sale_id, product_id, position, quantity,
        unit_price_cents, discount_bps, line_subtotal_cents, created_at
    FROM sale_lines
"#;

/// Repository for sale database reads.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!("{SELECT_SALE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    /// Gets all lines of a sale in cart order.
    pub async fn get_lines(&self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let sql = format!("{SELECT_LINE} WHERE sale_id = ?1 ORDER BY position");
        let lines = sqlx::query_as::<_, SaleLine>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(lines)
    }

    /// Lines with product names, for receipts.
    pub async fn get_receipt_lines(&self, sale_id: &str) -> DbResult<Vec<ReceiptLine>> {
        let lines = sqlx::query_as::<_, ReceiptLine>(
            r#"
            SELECT
                l.product_id, p.name AS product_name, p.code AS product_code,
                l.quantity, l.unit_price_cents, l.discount_bps, l.line_subtotal_cents
            FROM sale_lines l
            INNER JOIN products p ON p.id = l.product_id
            WHERE l.sale_id = ?1
            ORDER BY l.position
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    /// Most recent sales first.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Sale>> {
        debug!(limit, "Listing sales");
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "{SELECT_SALE} ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Connection-scoped writes (used inside SaleManager transactions)
// =============================================================================

/// Data for a new sale row; totals start at zero.
pub(crate) struct SaleShell<'a> {
    pub id: &'a str,
    pub client_id: &'a str,
    pub channel: forneria_core::SaleChannel,
    pub folio: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// Inserts the sale row and returns its folio.
///
/// Without an explicit folio one is generated as `F{YYYYMMDD}-{NNNN}`,
/// continuing the day's highest sequence. The INSERT is the first statement
/// of the transaction, so the sequence is read under SQLite's write lock.
pub(crate) async fn insert_shell(
    conn: &mut SqliteConnection,
    shell: &SaleShell<'_>,
) -> DbResult<String> {
    let prefix = format!("F{}-", shell.created_at.format("%Y%m%d"));

    let folio: String = sqlx::query_scalar(
        r#"
        INSERT INTO sales (
            id, client_id, channel, folio,
            total_net_cents, total_tax_cents, discount_cents, total_gross_cents,
            amount_paid_cents, change_cents, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3,
            COALESCE(?4, ?5 || printf('%04d', (
                SELECT COALESCE(MAX(CAST(substr(folio, length(?5) + 1) AS INTEGER)), 0) + 1
                FROM sales
                WHERE folio LIKE ?5 || '%'
            ))),
            0, 0, 0, 0,
            NULL, NULL, ?6, ?6
        )
        RETURNING folio
        "#,
    )
    .bind(shell.id)
    .bind(shell.client_id)
    .bind(shell.channel)
    .bind(shell.folio)
    .bind(&prefix)
    .bind(shell.created_at)
    .fetch_one(&mut *conn)
    .await?;

    debug!(id = %shell.id, folio = %folio, "Inserted sale shell");
    Ok(folio)
}

/// Bumps `updated_at`. Returns `false` if the sale doesn't exist.
///
/// Used as the opening write of delete/edit transactions.
pub(crate) async fn touch(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<bool> {
    let result = sqlx::query("UPDATE sales SET updated_at = ?2 WHERE id = ?1")
        .bind(sale_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn insert_line(conn: &mut SqliteConnection, line: &SaleLine) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_lines (
            id, sale_id, product_id, position, quantity,
            unit_price_cents, discount_bps, line_subtotal_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&line.id)
    .bind(&line.sale_id)
    .bind(&line.product_id)
    .bind(line.position)
    .bind(line.quantity)
    .bind(line.unit_price_cents)
    .bind(line.discount_bps)
    .bind(line.line_subtotal_cents)
    .bind(line.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn lines_in(
    conn: &mut SqliteConnection,
    sale_id: &str,
) -> DbResult<Vec<SaleLine>> {
    let sql = format!("{SELECT_LINE} WHERE sale_id = ?1 ORDER BY position");
    let lines = sqlx::query_as::<_, SaleLine>(&sql)
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(lines)
}

/// Persists every derived total and the payment fields.
pub(crate) async fn update_totals(
    conn: &mut SqliteConnection,
    sale_id: &str,
    totals: &SaleTotals,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE sales SET
            total_net_cents = ?2,
            total_tax_cents = ?3,
            discount_cents = ?4,
            total_gross_cents = ?5,
            amount_paid_cents = ?6,
            change_cents = ?7,
            updated_at = ?8
        WHERE id = ?1
        "#,
    )
    .bind(sale_id)
    .bind(totals.total_net.cents())
    .bind(totals.total_tax.cents())
    .bind(totals.discount.cents())
    .bind(totals.total_gross.cents())
    .bind(totals.amount_paid.map(|m| m.cents()))
    .bind(totals.change.map(|m| m.cents()))
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn delete_lines(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM sale_lines WHERE sale_id = ?1")
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}
