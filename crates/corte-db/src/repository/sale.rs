//! # Sale Repository
//!
//! Database operations for sales, sale items, and payment legs.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (one transaction)                                            │
//! │     └── create_full() → sale + items + payment legs + stock deltas      │
//! │         Single-payment sales persist exactly ONE leg row, so cash       │
//! │         sums are one uniform query over sale_pagos.                     │
//! │                                                                         │
//! │  2. STATUS ADVANCE                                                      │
//! │     └── set_status(from, to) → guarded UPDATE, rows_affected == 0       │
//! │         means a concurrent writer won                                   │
//! │                                                                         │
//! │  3. CANCEL                                                              │
//! │     └── cancel() → status flip + restock in one transaction             │
//! │                                                                         │
//! │  4. RETURNS mutate sales too, but through DevolucionRepository so       │
//! │     the ceiling guard and the return rows share a transaction.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use crate::repository::product::adjust_stock_in_tx;
use corte_core::{PaymentLeg, Sale, SaleFull, SaleItem, SaleStatus};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Persists a complete sale atomically.
    ///
    /// ## What This Does (one transaction)
    /// 1. Inserts the sale row
    /// 2. Inserts every line item
    /// 3. Inserts every payment leg (one for single, N for mixed)
    /// 4. Applies the relative stock deltas for catalog-referenced items
    ///
    /// If anything fails, no sale and no stock movement is recorded.
    pub async fn create_full(
        &self,
        sale: &Sale,
        items: &[SaleItem],
        pagos: &[PaymentLeg],
        stock_deltas: &[(String, i64)],
    ) -> DbResult<()> {
        debug!(id = %sale.id, total = sale.total_cents, "Persisting sale");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, tenant_id, tienda_id, user_id, customer_id, courier_id,
                payment_type, fulfillment, status,
                discount_cents, total_cents, total_returned_cents,
                notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.tenant_id)
        .bind(&sale.tienda_id)
        .bind(&sale.user_id)
        .bind(&sale.customer_id)
        .bind(&sale.courier_id)
        .bind(sale.payment_type)
        .bind(sale.fulfillment)
        .bind(sale.status)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.total_returned_cents)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, name, quantity,
                    unit_price_cents, note, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(&item.note)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for pago in pagos {
            sqlx::query(
                r#"
                INSERT INTO sale_pagos (
                    id, sale_id, metodo, amount_cents, reference,
                    received_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&pago.id)
            .bind(&pago.sale_id)
            .bind(pago.metodo)
            .bind(pago.amount_cents)
            .bind(&pago.reference)
            .bind(pago.received_cents)
            .bind(pago.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for (product_id, delta) in stock_deltas {
            adjust_stock_in_tx(&mut tx, product_id, *delta).await?;
        }

        tx.commit().await?;

        info!(id = %sale.id, "Sale persisted");
        Ok(())
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, tenant_id, tienda_id, user_id, customer_id, courier_id,
                   payment_type, fulfillment, status,
                   discount_cents, total_cents, total_returned_cents,
                   notes, created_at, updated_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets a sale with its items and payment legs.
    pub async fn get_full(&self, id: &str) -> DbResult<Option<SaleFull>> {
        let Some(sale) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let items = self.get_items(id).await?;
        let pagos = self.get_pagos(id).await?;

        Ok(Some(SaleFull { sale, items, pagos }))
    }

    /// Gets all line items for a sale.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, name, quantity,
                   unit_price_cents, note, created_at
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets all payment legs for a sale.
    pub async fn get_pagos(&self, sale_id: &str) -> DbResult<Vec<PaymentLeg>> {
        let pagos = sqlx::query_as::<_, PaymentLeg>(
            r#"
            SELECT id, sale_id, metodo, amount_cents, reference,
                   received_cents, created_at
            FROM sale_pagos
            WHERE sale_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pagos)
    }

    /// Guarded status transition.
    ///
    /// Only flips the row if its current status is still `from`; returns
    /// whether the write landed. A `false` means a concurrent writer moved
    /// the sale first and the caller should re-read and re-decide.
    pub async fn set_status(&self, sale_id: &str, from: SaleStatus, to: SaleStatus) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sales
            SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(sale_id)
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Cancels a sale and restores stock in one transaction.
    ///
    /// The guard allows cancellation only from the pre-dispatch states;
    /// `rows_affected == 0` means the sale already moved on (or was already
    /// cancelled) and nothing is restocked.
    pub async fn cancel(&self, sale_id: &str, restock: &[(String, i64)]) -> DbResult<bool> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE sales
            SET status = 'cancelada', updated_at = ?2
            WHERE id = ?1 AND status IN ('en_preparacion', 'listo_para_envio')
            "#,
        )
        .bind(sale_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for (product_id, qty) in restock {
            adjust_stock_in_tx(&mut tx, product_id, *qty).await?;
        }

        tx.commit().await?;

        info!(id = %sale_id, "Sale cancelled");
        Ok(true)
    }

    /// Lists full sales created in `[start, end)`, optionally filtered by
    /// store. Feeds the cash cutoff and the shift-close cash window.
    pub async fn list_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tienda_id: Option<&str>,
    ) -> DbResult<Vec<SaleFull>> {
        let sales = match tienda_id {
            Some(tienda) => {
                sqlx::query_as::<_, Sale>(
                    r#"
                    SELECT id, tenant_id, tienda_id, user_id, customer_id, courier_id,
                           payment_type, fulfillment, status,
                           discount_cents, total_cents, total_returned_cents,
                           notes, created_at, updated_at
                    FROM sales
                    WHERE created_at >= ?1 AND created_at < ?2 AND tienda_id = ?3
                    ORDER BY created_at
                    "#,
                )
                .bind(start)
                .bind(end)
                .bind(tienda)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Sale>(
                    r#"
                    SELECT id, tenant_id, tienda_id, user_id, customer_id, courier_id,
                           payment_type, fulfillment, status,
                           discount_cents, total_cents, total_returned_cents,
                           notes, created_at, updated_at
                    FROM sales
                    WHERE created_at >= ?1 AND created_at < ?2
                    ORDER BY created_at
                    "#,
                )
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut out = Vec::with_capacity(sales.len());
        for sale in sales {
            let items = self.get_items(&sale.id).await?;
            let pagos = self.get_pagos(&sale.id).await?;
            out.push(SaleFull { sale, items, pagos });
        }

        Ok(out)
    }

    /// Sum of cash (`efectivo`) payment legs for sales in `[start, end)` for
    /// a store. No status filter: cancelled sales keep their cash legs in
    /// the drawer count, matching how the close-out is reconciled by hand.
    pub async fn cash_total_window(
        &self,
        tienda_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(p.amount_cents)
            FROM sale_pagos p
            JOIN sales s ON s.id = p.sale_id
            WHERE p.metodo = 'efectivo'
              AND s.tienda_id = ?1
              AND s.created_at >= ?2 AND s.created_at < ?3
            "#,
        )
        .bind(tienda_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }

    /// Deletes sales and their dependents, restoring stock for catalog-
    /// referenced items of sales that were not already cancelled (cancelled
    /// sales restocked at cancellation time).
    ///
    /// Administrative bulk cleanup; everything happens in one transaction.
    pub async fn purge(&self, sale_ids: &[String]) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut purged = 0u64;

        for sale_id in sale_ids {
            let sale = sqlx::query_as::<_, Sale>(
                r#"
                SELECT id, tenant_id, tienda_id, user_id, customer_id, courier_id,
                       payment_type, fulfillment, status,
                       discount_cents, total_cents, total_returned_cents,
                       notes, created_at, updated_at
                FROM sales
                WHERE id = ?1
                "#,
            )
            .bind(sale_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(sale) = sale else { continue };

            if sale.status != SaleStatus::Cancelada {
                let items = sqlx::query_as::<_, SaleItem>(
                    r#"
                    SELECT id, sale_id, product_id, name, quantity,
                           unit_price_cents, note, created_at
                    FROM sale_items
                    WHERE sale_id = ?1
                    "#,
                )
                .bind(sale_id)
                .fetch_all(&mut *tx)
                .await?;

                for item in items {
                    if let Some(product_id) = &item.product_id {
                        adjust_stock_in_tx(&mut tx, product_id, item.quantity).await?;
                    }
                }
            }

            // Returns reference sales without ON DELETE CASCADE; drop them
            // and their dependents first.
            sqlx::query(
                r#"
                DELETE FROM devolucion_items
                WHERE devolucion_id IN (SELECT id FROM devoluciones WHERE sale_id = ?1)
                "#,
            )
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                r#"
                DELETE FROM devolucion_pagos
                WHERE devolucion_id IN (SELECT id FROM devoluciones WHERE sale_id = ?1)
                "#,
            )
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;
            sqlx::query("DELETE FROM devoluciones WHERE sale_id = ?1")
                .bind(sale_id)
                .execute(&mut *tx)
                .await?;

            // sale_items and sale_pagos cascade
            let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
                .bind(sale_id)
                .execute(&mut *tx)
                .await?;
            purged += result.rows_affected();
        }

        tx.commit().await?;

        info!(purged = purged, "Sales purged");
        Ok(purged)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
