//! # Sale Transaction Manager
//!
//! Creates, edits and deletes sales as single units of work over the
//! catalog, the stock ledger and the pricing engine.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NewSale                                                                │
//! │     │ validate()                      EmptyCart / InvalidQuantity / ... │
//! │     ▼                                                                   │
//! │  resolve client (absent → walk-in)    ClientNotFound                    │
//! │  resolve products (id, then code)     ProductNotFound                   │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  lock products (ascending id)         ConcurrencyConflict               │
//! │     │                                                                   │
//! │  ┌──┴──────────────── one SQL transaction ──────────────────────────┐  │
//! │  │  insert sale shell (folio)                                        │  │
//! │  │  per cart line: deduct stock (EXIT) + insert line                 │  │
//! │  │  recalculate totals + payment → update sale                       │  │
//! │  └──┬────────────────────────────────────────────────────────────────┘  │
//! │     ▼                                                                   │
//! │  commit → sale id            (any error: rollback, nothing written)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every attempt moves through [`SaleAttemptState`] and logs each
//! transition.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::CatalogLookup;
use crate::error::{DbError, ServiceError, ServiceResult};
use crate::ledger::{finish, StockLedger};
use crate::pool::Database;
use crate::repository::sale::{self, SaleShell};
use forneria_core::cart::CartLine;
use forneria_core::pricing::{self, line_subtotal, recalculate_totals, totals_consistent};
use forneria_core::stock::quantity_deltas;
use forneria_core::{
    CoreError, EditSale, Money, NewSale, PaymentTerms, Product, Sale, SaleLine, SaleReceipt,
    SaleTotals, TaxRate, ValidationError,
};

// =============================================================================
// Configuration
// =============================================================================

/// Settings for the sale manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesConfig {
    pub tax_rate: TaxRate,
    /// How long to wait for product and sale locks.
    pub lock_timeout: Duration,
    /// Client used when a sale names none.
    pub walk_in_client_id: String,
}

impl Default for SalesConfig {
    fn default() -> Self {
        SalesConfig {
            tax_rate: forneria_core::DEFAULT_TAX_RATE,
            lock_timeout: Duration::from_secs(5),
            walk_in_client_id: forneria_core::WALK_IN_CLIENT_ID.to_string(),
        }
    }
}

impl SalesConfig {
    pub fn with_tax_rate(mut self, tax_rate: TaxRate) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

// =============================================================================
// Attempt State
// =============================================================================

/// Lifecycle of one create/edit/delete attempt.
///
/// ```text
/// Pending → Validating → Committing → Committed
///               │             │
///               └─────────────┴──────→ Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleAttemptState {
    Pending,
    Validating,
    Committing,
    Committed,
    Rejected,
}

impl fmt::Display for SaleAttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SaleAttemptState::Pending => "pending",
            SaleAttemptState::Validating => "validating",
            SaleAttemptState::Committing => "committing",
            SaleAttemptState::Committed => "committed",
            SaleAttemptState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Tracks and logs the state of a single attempt.
struct SaleAttempt<'a> {
    operation: &'static str,
    sale_id: &'a str,
    state: SaleAttemptState,
}

impl<'a> SaleAttempt<'a> {
    fn start(operation: &'static str, sale_id: &'a str) -> Self {
        debug!(
            operation,
            sale_id = %sale_id,
            state = %SaleAttemptState::Pending,
            "Sale attempt started"
        );
        SaleAttempt {
            operation,
            sale_id,
            state: SaleAttemptState::Pending,
        }
    }

    fn advance(&mut self, next: SaleAttemptState) {
        debug!(
            operation = self.operation,
            sale_id = %self.sale_id,
            from = %self.state,
            to = %next,
            "Sale attempt transition"
        );
        self.state = next;
    }

    /// Moves to `Committed` or `Rejected` depending on `result`.
    fn settle<T>(mut self, result: ServiceResult<T>) -> ServiceResult<T> {
        match &result {
            Ok(_) => self.advance(SaleAttemptState::Committed),
            Err(e) => {
                warn!(
                    operation = self.operation,
                    sale_id = %self.sale_id,
                    from = %self.state,
                    error = %e,
                    "Sale attempt rejected"
                );
                self.state = SaleAttemptState::Rejected;
            }
        }
        result
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Stored totals against totals recomputed from the current lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsCheck {
    pub sale_id: String,
    pub stored: SaleTotals,
    pub recomputed: SaleTotals,
    pub consistent: bool,
}

/// A cart line bound to its catalog product.
#[derive(Debug, Clone)]
struct ResolvedLine {
    product: Product,
    quantity: i64,
    unit_price: Money,
    discount_bps: Option<u32>,
}

// =============================================================================
// Sale Manager
// =============================================================================

/// Orchestrates sale creation, edit and deletion.
#[derive(Debug)]
pub struct SaleManager<C: CatalogLookup> {
    db: Database,
    catalog: C,
    config: SalesConfig,
}

impl<C: CatalogLookup> SaleManager<C> {
    pub fn new(db: Database, catalog: C, config: SalesConfig) -> Self {
        SaleManager { db, catalog, config }
    }

    pub fn config(&self) -> &SalesConfig {
        &self.config
    }

    /// Records a sale and deducts its stock, atomically.
    ///
    /// ## Errors
    /// - `EmptyCart`, `InvalidQuantity`, `InvalidAmount`, `Validation` for bad input
    /// - `ClientNotFound` / `ProductNotFound` for unknown references
    /// - `InsufficientStock` naming the first line that cannot be served
    /// - `ConcurrencyConflict` when the product locks can't be taken in time
    ///
    /// On any error no sale, line, stock change or movement is written.
    pub async fn create_sale(&self, input: &NewSale) -> ServiceResult<String> {
        let sale_id = Uuid::new_v4().to_string();
        let mut attempt = SaleAttempt::start("create", &sale_id);
        attempt.advance(SaleAttemptState::Validating);

        let result = self.try_create(&sale_id, input, &mut attempt).await;
        attempt.settle(result)
    }

    async fn try_create(
        &self,
        sale_id: &str,
        input: &NewSale,
        attempt: &mut SaleAttempt<'_>,
    ) -> ServiceResult<String> {
        let validated = input.validate()?;

        let client_id = validated
            .client_id
            .unwrap_or_else(|| self.config.walk_in_client_id.clone());
        if self.catalog.client(&client_id).await?.is_none() {
            return Err(CoreError::ClientNotFound(client_id).into());
        }

        let lines = self.resolve_lines(&validated.lines).await?;
        let _guard = self
            .db
            .locks()
            .lock_products(lines.iter().map(|l| l.product.id.as_str()), self.config.lock_timeout)
            .await?;

        let created_at = Utc::now();
        let shell = SaleShell {
            id: sale_id,
            client_id: &client_id,
            channel: validated.channel,
            folio: validated.folio.as_deref(),
            created_at,
        };

        let mut tx = self.db.begin().await?;
        let written = async {
            let folio = sale::insert_shell(&mut tx, &shell).await.map_err(folio_conflict)?;
            let subtotals = write_lines(&mut tx, sale_id, &lines).await?;
            let totals =
                recalculate_totals(&subtotals, validated.discount, self.config.tax_rate, None)?
                    .with_payment(validated.payment);
            sale::update_totals(&mut tx, sale_id, &totals).await?;
            Ok::<_, ServiceError>((folio, totals))
        }
        .await;

        if written.is_ok() {
            attempt.advance(SaleAttemptState::Committing);
        }
        let (folio, totals) = finish(tx, written).await?;

        info!(
            sale_id = %sale_id,
            folio = %folio,
            lines = lines.len(),
            gross_cents = totals.total_gross.cents(),
            "Sale created"
        );
        Ok(sale_id.to_string())
    }

    /// Deletes a sale and puts every line's quantity back in stock.
    pub async fn delete_sale(&self, sale_id: &str) -> ServiceResult<()> {
        let mut attempt = SaleAttempt::start("delete", sale_id);
        attempt.advance(SaleAttemptState::Validating);

        let result = self.try_delete(sale_id, &mut attempt).await;
        attempt.settle(result)
    }

    async fn try_delete(&self, sale_id: &str, attempt: &mut SaleAttempt<'_>) -> ServiceResult<()> {
        let locks = self.db.locks();
        let _sale_guard = locks.lock_sale(sale_id, self.config.lock_timeout).await?;

        let product_ids = self.product_ids_of(sale_id).await?;
        let _guard = locks.lock_products(&product_ids, self.config.lock_timeout).await?;

        let mut tx = self.db.begin().await?;
        let restored = async {
            if !sale::touch(&mut tx, sale_id).await? {
                return Err(CoreError::SaleNotFound(sale_id.to_string()).into());
            }
            let lines = sale::lines_in(&mut tx, sale_id).await?;
            let mut units = 0;
            for line in &lines {
                StockLedger::replenish_in(&mut tx, &line.product_id, line.quantity).await?;
                units += line.quantity;
            }
            sale::delete_lines(&mut tx, sale_id).await?;
            sale::delete(&mut tx, sale_id).await?;
            Ok::<_, ServiceError>(units)
        }
        .await;

        if restored.is_ok() {
            attempt.advance(SaleAttemptState::Committing);
        }
        let units = finish(tx, restored).await?;

        info!(sale_id = %sale_id, units_restored = units, "Sale deleted");
        Ok(())
    }

    /// Replaces a sale's cart, moving only the net stock difference.
    ///
    /// Per product, `new − old > 0` is deducted (with the usual stock
    /// check) and `new − old < 0` is replenished. Lines, discount, payment
    /// and totals are rewritten; folio, client and channel are kept.
    pub async fn edit_sale(&self, sale_id: &str, input: &EditSale) -> ServiceResult<()> {
        let mut attempt = SaleAttempt::start("edit", sale_id);
        attempt.advance(SaleAttemptState::Validating);

        let result = self.try_edit(sale_id, input, &mut attempt).await;
        attempt.settle(result)
    }

    async fn try_edit(
        &self,
        sale_id: &str,
        input: &EditSale,
        attempt: &mut SaleAttempt<'_>,
    ) -> ServiceResult<()> {
        let validated = input.validate()?;
        let lines = self.resolve_lines(&validated.lines).await?;

        let locks = self.db.locks();
        let _sale_guard = locks.lock_sale(sale_id, self.config.lock_timeout).await?;

        let mut product_ids = self.product_ids_of(sale_id).await?;
        product_ids.extend(lines.iter().map(|l| l.product.id.clone()));
        let _guard = locks.lock_products(&product_ids, self.config.lock_timeout).await?;

        let mut tx = self.db.begin().await?;
        let edited = async {
            if !sale::touch(&mut tx, sale_id).await? {
                return Err(CoreError::SaleNotFound(sale_id.to_string()).into());
            }
            let old_lines = sale::lines_in(&mut tx, sale_id).await?;
            let deltas = quantity_deltas(
                old_lines.iter().map(|l| (l.product_id.as_str(), l.quantity)),
                lines.iter().map(|l| (l.product.id.as_str(), l.quantity)),
            );

            for (product_id, delta) in &deltas {
                if *delta > 0 {
                    StockLedger::deduct_in(&mut tx, product_id, *delta).await?;
                } else {
                    StockLedger::replenish_in(&mut tx, product_id, -delta).await?;
                }
            }

            sale::delete_lines(&mut tx, sale_id).await?;
            let subtotals = insert_lines(&mut tx, sale_id, &lines).await?;
            let totals =
                recalculate_totals(&subtotals, validated.discount, self.config.tax_rate, None)?
                    .with_payment(validated.payment);
            sale::update_totals(&mut tx, sale_id, &totals).await?;
            Ok::<_, ServiceError>(deltas.len())
        }
        .await;

        if edited.is_ok() {
            attempt.advance(SaleAttemptState::Committing);
        }
        let products_moved = finish(tx, edited).await?;

        info!(sale_id = %sale_id, lines = lines.len(), products_moved, "Sale edited");
        Ok(())
    }

    /// A finalized sale with product names and balance due.
    pub async fn get_receipt(&self, sale_id: &str) -> ServiceResult<SaleReceipt> {
        let sales = self.db.sales();
        let sale = sales
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        let client = self
            .catalog
            .client(&sale.client_id)
            .await?
            .ok_or_else(|| CoreError::ClientNotFound(sale.client_id.clone()))?;
        let lines = sales.get_receipt_lines(sale_id).await?;

        Ok(SaleReceipt {
            balance_due_cents: pricing::balance_due(sale.total_gross(), sale.amount_paid()).cents(),
            sale,
            client_name: client.name,
            lines,
        })
    }

    /// Most recent sales first.
    pub async fn list_sales(&self, limit: u32) -> ServiceResult<Vec<Sale>> {
        Ok(self.db.sales().list(limit).await?)
    }

    /// Recomputes totals from the stored lines and compares them with the
    /// stored sale.
    pub async fn verify_totals(&self, sale_id: &str) -> ServiceResult<TotalsCheck> {
        let sales = self.db.sales();
        let sale = sales
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        let lines = sales.get_lines(sale_id).await?;

        let subtotals: Vec<Money> = lines
            .iter()
            .map(|l| Money::from_cents(l.line_subtotal_cents))
            .collect();
        let discount = Money::from_cents(sale.discount_cents);
        let recomputed = recalculate_totals(&subtotals, discount, self.config.tax_rate, None)?
            .with_payment(payment_of(&sale));

        let total_net = Money::from_cents(sale.total_net_cents);
        let stored = SaleTotals {
            total_net,
            discount,
            net_after_discount: total_net.saturating_sub_floor(discount),
            total_tax: Money::from_cents(sale.total_tax_cents),
            total_gross: sale.total_gross(),
            amount_paid: sale.amount_paid(),
            change: sale.change_cents.map(Money::from_cents),
        };

        let consistent = totals_consistent(&stored, &recomputed);
        if !consistent {
            warn!(sale_id = %sale_id, "Stored sale totals drifted from lines");
        }

        Ok(TotalsCheck {
            sale_id: sale_id.to_string(),
            stored,
            recomputed,
            consistent,
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn resolve_lines(&self, lines: &[CartLine]) -> ServiceResult<Vec<ResolvedLine>> {
        let mut resolved = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self
                .catalog
                .product_by_id_or_code(&line.product_ref)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(line.product_ref.clone()))?;
            resolved.push(ResolvedLine {
                unit_price: line.unit_price.unwrap_or_else(|| product.price()),
                quantity: line.quantity,
                discount_bps: line.discount_bps,
                product,
            });
        }
        Ok(resolved)
    }

    async fn product_ids_of(&self, sale_id: &str) -> ServiceResult<BTreeSet<String>> {
        let lines = self.db.sales().get_lines(sale_id).await?;
        Ok(lines.into_iter().map(|l| l.product_id).collect())
    }
}

/// Deducts stock and inserts a line for each cart entry, in cart order.
async fn write_lines(
    conn: &mut SqliteConnection,
    sale_id: &str,
    lines: &[ResolvedLine],
) -> ServiceResult<Vec<Money>> {
    for line in lines {
        StockLedger::deduct_in(conn, &line.product.id, line.quantity).await?;
    }
    insert_lines(conn, sale_id, lines).await
}

async fn insert_lines(
    conn: &mut SqliteConnection,
    sale_id: &str,
    lines: &[ResolvedLine],
) -> ServiceResult<Vec<Money>> {
    let now = Utc::now();
    let mut subtotals = Vec::with_capacity(lines.len());

    for (position, line) in lines.iter().enumerate() {
        let subtotal = line_subtotal(line.quantity, line.unit_price, line.discount_bps)?;
        let record = SaleLine {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.to_string(),
            product_id: line.product.id.clone(),
            position: i64::try_from(position).unwrap_or(i64::MAX),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            discount_bps: line.discount_bps,
            line_subtotal_cents: subtotal.cents(),
            created_at: now,
        };
        sale::insert_line(conn, &record).await?;
        subtotals.push(subtotal);
    }
    Ok(subtotals)
}

/// Payment terms as stored on a sale.
fn payment_of(sale: &Sale) -> PaymentTerms {
    match sale.amount_paid() {
        Some(paid) => PaymentTerms::Tendered(paid),
        None => PaymentTerms::Deferred,
    }
}

/// An explicit folio that is already taken is a validation error.
fn folio_conflict(err: DbError) -> ServiceError {
    match err {
        DbError::UniqueViolation { ref field, .. } if field == "sales.folio" => {
            ValidationError::Duplicate {
                field: "folio".to_string(),
                value: "given".to_string(),
            }
            .into()
        }
        other => other.into(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalog;
    use crate::pool::DbConfig;
    use crate::testing::{seed_product, test_db};
    use async_trait::async_trait;
    use forneria_core::{CartLineInput, Client, MovementKind, SaleChannel};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn line(product_ref: &str, quantity: i64) -> CartLineInput {
        CartLineInput {
            product_ref: product_ref.to_string(),
            quantity,
            unit_price: None,
            discount_pct: None,
        }
    }

    fn new_sale(cart: Vec<CartLineInput>) -> NewSale {
        NewSale {
            client_id: None,
            channel: SaleChannel::Store,
            folio: None,
            cart,
            discount: None,
            amount_paid: None,
            full_payment: None,
        }
    }

    fn manager(db: &Database) -> SaleManager<SqliteCatalog> {
        db.sale_manager(SalesConfig::default())
    }

    async fn stock(db: &Database, id: &str) -> i64 {
        db.products().get_by_id(id).await.unwrap().unwrap().stock_actual
    }

    #[tokio::test]
    async fn test_create_sale_scenario_a() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 10).await;
        let sales = manager(&db);

        let sale_id = sales.create_sale(&new_sale(vec![line(&p.id, 3)])).await.unwrap();

        let sale = db.sales().get_by_id(&sale_id).await.unwrap().unwrap();
        assert_eq!(sale.total_net_cents, 600);
        assert_eq!(sale.total_tax_cents, 114);
        assert_eq!(sale.total_gross_cents, 714);
        assert_eq!(sale.client_id, forneria_core::WALK_IN_CLIENT_ID);
        assert_eq!(stock(&db, &p.id).await, 7);

        let lines = db.sales().get_lines(&sale_id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line_subtotal_cents, 600);

        let movements = db.movements().list(Some(&p.id), 10).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, MovementKind::Exit);
        assert_eq!(movements[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_insufficient_stock_scenario_b() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 2).await;

        let err = manager(&db).create_sale(&new_sale(vec![line(&p.id, 5)])).await.unwrap_err();
        match err {
            ServiceError::Domain(CoreError::InsufficientStock { requested, available, .. }) => {
                assert_eq!(requested, 5);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stock(&db, &p.id).await, 2);
        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_racing_sales_scenario_c() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 10).await;
        let sales = Arc::new(manager(&db));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let sales = Arc::clone(&sales);
                let input = new_sale(vec![line(&p.id, 6)]);
                tokio::spawn(async move { sales.create_sale(&input).await })
            })
            .collect();

        let mut ok = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(ServiceError::Domain(CoreError::InsufficientStock { .. })) => insufficient += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!((ok, insufficient), (1, 1));
        assert_eq!(stock(&db, &p.id).await, 4);
        assert_eq!(db.sales().count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sales_and_bulk_exits_race_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("race.db")))
            .await
            .unwrap();
        let p = seed_product(&db, "PAN-01", 200, 50).await;
        let timeout = Duration::from_secs(10);
        let sales = Arc::new(db.sale_manager(SalesConfig::default().with_lock_timeout(timeout)));
        let ledger = db.ledger(timeout);

        let mut handles = Vec::new();
        for i in 0..12 {
            if i % 3 == 0 {
                let ledger = ledger.clone();
                let ids = vec![p.id.clone()];
                handles.push(tokio::spawn(async move {
                    ledger.bulk_adjust(&ids, MovementKind::Exit, 5).await.map(|_| ())
                }));
            } else {
                let sales = Arc::clone(&sales);
                let input = new_sale(vec![line(&p.id, 4)]);
                handles.push(tokio::spawn(async move {
                    sales.create_sale(&input).await.map(|_| ())
                }));
            }
        }

        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) | Err(ServiceError::Domain(CoreError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        let remaining = stock(&db, &p.id).await;
        assert!(remaining >= 0);

        let exits: i64 = ledger
            .movements(Some(&p.id), 1_000)
            .await
            .unwrap()
            .iter()
            .filter(|m| m.kind == MovementKind::Exit)
            .map(|m| m.quantity)
            .sum();
        assert_eq!(50 - exits, remaining);

        let sold: i64 = db.sales().count().await.unwrap() * 4;
        assert!(sold <= exits);
        db.close().await;
    }

    #[tokio::test]
    async fn test_delete_restores_stock_scenario_d() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 10).await;
        let sales = manager(&db);

        let sale_id = sales.create_sale(&new_sale(vec![line(&p.id, 3)])).await.unwrap();
        sales.delete_sale(&sale_id).await.unwrap();

        assert_eq!(stock(&db, &p.id).await, 10);
        assert!(db.sales().get_by_id(&sale_id).await.unwrap().is_none());
        assert!(db.sales().get_lines(&sale_id).await.unwrap().is_empty());

        let movements = db.movements().list(Some(&p.id), 10).await.unwrap();
        assert_eq!(movements[0].kind, MovementKind::Entry);
        assert_eq!(movements[0].quantity, 3);

        let again = sales.delete_sale(&sale_id).await.unwrap_err();
        assert_eq!(again.as_domain(), Some(&CoreError::SaleNotFound(sale_id.clone())));
    }

    #[tokio::test]
    async fn test_failure_on_later_line_rolls_back_everything() {
        let db = test_db().await;
        let a = seed_product(&db, "A", 100, 10).await;
        let b = seed_product(&db, "B", 100, 1).await;
        let sales = manager(&db);
        let input = new_sale(vec![line(&a.id, 2), line(&b.id, 5)]);

        for _ in 0..2 {
            let err = sales.create_sale(&input).await.unwrap_err();
            assert!(matches!(err, ServiceError::Domain(CoreError::InsufficientStock { .. })));
            assert_eq!(stock(&db, &a.id).await, 10);
            assert_eq!(stock(&db, &b.id).await, 1);
            assert_eq!(db.sales().count().await.unwrap(), 0);
            assert!(db.movements().list(None, 10).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_repeated_product_lines_share_stock() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 5).await;
        let sales = manager(&db);

        let err = sales
            .create_sale(&new_sale(vec![line(&p.id, 3), line("PAN-01", 3)]))
            .await
            .unwrap_err();
        assert_eq!(
            err.as_domain(),
            Some(&CoreError::InsufficientStock {
                product: p.name.clone(),
                requested: 3,
                available: 2,
            })
        );
        assert_eq!(stock(&db, &p.id).await, 5);
    }

    #[tokio::test]
    async fn test_rejects_bad_input_before_touching_storage() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 5).await;
        let sales = manager(&db);

        let err = sales.create_sale(&new_sale(vec![])).await.unwrap_err();
        assert_eq!(err.as_domain(), Some(&CoreError::EmptyCart));

        let err = sales.create_sale(&new_sale(vec![line(&p.id, 0)])).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(CoreError::InvalidQuantity { .. })));

        let err = sales.create_sale(&new_sale(vec![line("nope", 1)])).await.unwrap_err();
        assert_eq!(err.as_domain(), Some(&CoreError::ProductNotFound("nope".to_string())));

        let mut input = new_sale(vec![line(&p.id, 1)]);
        input.client_id = Some("ghost".to_string());
        let err = sales.create_sale(&input).await.unwrap_err();
        assert_eq!(err.as_domain(), Some(&CoreError::ClientNotFound("ghost".to_string())));

        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_folio_generated_in_sequence_and_explicit_kept() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 10).await;
        let sales = manager(&db);

        let first = sales.create_sale(&new_sale(vec![line(&p.id, 1)])).await.unwrap();
        let second = sales.create_sale(&new_sale(vec![line(&p.id, 1)])).await.unwrap();

        let prefix = format!("F{}-", Utc::now().format("%Y%m%d"));
        let folio = |id: String| {
            let db = db.clone();
            async move { db.sales().get_by_id(&id).await.unwrap().unwrap().folio }
        };
        assert_eq!(folio(first).await, format!("{prefix}0001"));
        assert_eq!(folio(second).await, format!("{prefix}0002"));

        let mut input = new_sale(vec![line(&p.id, 1)]);
        input.folio = Some("B-778".to_string());
        let third = sales.create_sale(&input).await.unwrap();
        assert_eq!(folio(third).await, "B-778");

        let err = sales.create_sale(&input).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));
        assert_eq!(stock(&db, &p.id).await, 7);
    }

    #[tokio::test]
    async fn test_payment_terms_and_receipt() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 10).await;
        let sales = manager(&db);

        let mut tendered = new_sale(vec![line(&p.id, 3)]);
        tendered.amount_paid = Some(Decimal::new(1000, 2));
        let id = sales.create_sale(&tendered).await.unwrap();
        let sale = db.sales().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(sale.amount_paid_cents, Some(1000));
        assert_eq!(sale.change_cents, Some(286));

        let full = sales.create_sale(&new_sale(vec![line(&p.id, 3)])).await.unwrap();
        let sale = db.sales().get_by_id(&full).await.unwrap().unwrap();
        assert_eq!(sale.amount_paid_cents, Some(714));
        assert_eq!(sale.change_cents, Some(0));

        let mut deferred = new_sale(vec![line(&p.id, 1)]);
        deferred.full_payment = Some(false);
        let id = sales.create_sale(&deferred).await.unwrap();
        let receipt = sales.get_receipt(&id).await.unwrap();
        assert_eq!(receipt.sale.amount_paid_cents, None);
        assert_eq!(receipt.balance_due_cents, 238);
        assert_eq!(receipt.client_name, "Varios");
        assert_eq!(receipt.lines.len(), 1);
        assert_eq!(receipt.lines[0].product_name, p.name);
        assert_eq!(receipt.lines[0].product_code.as_deref(), Some("PAN-01"));
    }

    #[tokio::test]
    async fn test_line_price_override_and_discounts() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 10).await;
        let sales = manager(&db);

        let mut input = new_sale(vec![CartLineInput {
            product_ref: "PAN-01".to_string(),
            quantity: 3,
            unit_price: Some(Decimal::new(1099, 2)),
            discount_pct: Some(Decimal::new(125, 1)),
        }]);
        input.discount = Some(Decimal::new(85, 2));
        let id = sales.create_sale(&input).await.unwrap();

        let sale = db.sales().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(sale.total_net_cents, 2885);
        assert_eq!(sale.discount_cents, 85);
        // (28.85 - 0.85) × 0.19 = 5.32
        assert_eq!(sale.total_tax_cents, 532);
        assert_eq!(sale.total_gross_cents, 3332);

        let lines = db.sales().get_lines(&id).await.unwrap();
        assert_eq!(lines[0].unit_price_cents, 1099);
        assert_eq!(lines[0].discount_bps, Some(1250));
        assert_eq!(stock(&db, &p.id).await, 7);
    }

    #[tokio::test]
    async fn test_edit_applies_signed_deltas() {
        let db = test_db().await;
        let a = seed_product(&db, "A", 100, 10).await;
        let b = seed_product(&db, "B", 250, 10).await;
        let c = seed_product(&db, "C", 300, 10).await;
        let sales = manager(&db);

        let id = sales
            .create_sale(&new_sale(vec![line(&a.id, 4), line(&b.id, 2)]))
            .await
            .unwrap();

        let edit = EditSale {
            cart: vec![line(&a.id, 1), line(&c.id, 5)],
            discount: None,
            amount_paid: None,
            full_payment: Some(false),
        };
        sales.edit_sale(&id, &edit).await.unwrap();

        assert_eq!(stock(&db, &a.id).await, 9);
        assert_eq!(stock(&db, &b.id).await, 10);
        assert_eq!(stock(&db, &c.id).await, 5);

        let sale = db.sales().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(sale.total_net_cents, 1600);
        assert_eq!(sale.total_tax_cents, 304);
        assert_eq!(sale.amount_paid_cents, None);

        let check = sales.verify_totals(&id).await.unwrap();
        assert!(check.consistent);
    }

    #[tokio::test]
    async fn test_edit_rejects_and_keeps_sale_when_stock_short() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 5).await;
        let sales = manager(&db);
        let id = sales.create_sale(&new_sale(vec![line(&p.id, 3)])).await.unwrap();

        let edit = EditSale {
            cart: vec![line(&p.id, 9)],
            discount: None,
            amount_paid: None,
            full_payment: None,
        };
        let err = sales.edit_sale(&id, &edit).await.unwrap_err();
        assert_eq!(
            err.as_domain(),
            Some(&CoreError::InsufficientStock {
                product: p.name.clone(),
                requested: 6,
                available: 2,
            })
        );

        assert_eq!(stock(&db, &p.id).await, 2);
        let lines = db.sales().get_lines(&id).await.unwrap();
        assert_eq!(lines[0].quantity, 3);

        let missing = sales.edit_sale("ghost", &edit).await.unwrap_err();
        assert_eq!(missing.as_domain(), Some(&CoreError::SaleNotFound("ghost".to_string())));
    }

    #[tokio::test]
    async fn test_verify_totals_detects_drift() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 10).await;
        let sales = manager(&db);
        let id = sales.create_sale(&new_sale(vec![line(&p.id, 3)])).await.unwrap();

        assert!(sales.verify_totals(&id).await.unwrap().consistent);

        sqlx::query("UPDATE sales SET total_gross_cents = 1 WHERE id = ?1")
            .bind(&id)
            .execute(db.pool())
            .await
            .unwrap();
        let check = sales.verify_totals(&id).await.unwrap();
        assert!(!check.consistent);
        assert_eq!(check.recomputed.total_gross.cents(), 714);
    }

    #[tokio::test]
    async fn test_sold_product_cannot_be_deleted() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 10).await;
        manager(&db).create_sale(&new_sale(vec![line(&p.id, 1)])).await.unwrap();

        let err = db.products().delete(&p.id).await.unwrap_err();
        assert_eq!(err.as_domain(), Some(&CoreError::ProductInUse(p.id.clone())));
    }

    #[tokio::test]
    async fn test_list_sales_newest_first() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 10).await;
        let sales = manager(&db);
        let first = sales.create_sale(&new_sale(vec![line(&p.id, 1)])).await.unwrap();
        let second = sales.create_sale(&new_sale(vec![line(&p.id, 1)])).await.unwrap();

        let listed = sales.list_sales(10).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![second, first]);
    }

    /// Catalog that knows products by a house alias instead of their code.
    struct AliasCatalog {
        alias: String,
        product: Product,
        client: Client,
    }

    #[async_trait]
    impl CatalogLookup for AliasCatalog {
        async fn product_by_id_or_code(
            &self,
            reference: &str,
        ) -> crate::error::DbResult<Option<Product>> {
            Ok((reference == self.alias).then(|| self.product.clone()))
        }

        async fn client(&self, id: &str) -> crate::error::DbResult<Option<Client>> {
            Ok((id == self.client.id).then(|| self.client.clone()))
        }
    }

    #[tokio::test]
    async fn test_manager_resolves_through_catalog_trait() {
        let db = test_db().await;
        let p = seed_product(&db, "PAN-01", 200, 10).await;
        let walk_in = db
            .clients()
            .get_by_id(forneria_core::WALK_IN_CLIENT_ID)
            .await
            .unwrap()
            .unwrap();

        let catalog = AliasCatalog {
            alias: "especial-de-la-casa".to_string(),
            product: p.clone(),
            client: walk_in,
        };
        let sales = SaleManager::new(db.clone(), catalog, SalesConfig::default());

        sales
            .create_sale(&new_sale(vec![line("especial-de-la-casa", 2)]))
            .await
            .unwrap();
        assert_eq!(stock(&db, &p.id).await, 8);

        let err = sales.create_sale(&new_sale(vec![line(&p.id, 1)])).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_attempt_state_display() {
        assert_eq!(SaleAttemptState::Committing.to_string(), "committing");
        assert_eq!(SaleAttemptState::Rejected.to_string(), "rejected");
    }
}
