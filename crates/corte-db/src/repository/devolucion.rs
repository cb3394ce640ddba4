//! # Devolución (Return) Repository
//!
//! Database operations for returns, returned items, and refund legs.
//!
//! ## Refund Ceiling Under Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The sale's running total is bumped with ONE atomic relative UPDATE:    │
//! │                                                                         │
//! │    UPDATE sales SET                                                     │
//! │      total_returned_cents = total_returned_cents + Δ,                   │
//! │      status = CASE WHEN total_returned_cents + Δ >= total_cents         │
//! │                    THEN 'cancelada' ELSE 'parcialmente_devuelta' END    │
//! │    WHERE id = ? AND status IN (refundable)                              │
//! │      AND total_returned_cents + Δ <= total_cents                        │
//! │                                                                         │
//! │  Two racing 60% returns: the first lands, the second fails the ceiling  │
//! │  predicate and the whole transaction rolls back. The CASE reads the     │
//! │  OLD row values, so the status a return produces always matches the     │
//! │  total it actually produced.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::product::adjust_stock_in_tx;
use corte_core::validation::line_key;
use corte_core::{Devolucion, PaymentMethod, RefundLeg, ReturnStatus, ReturnedItem};

/// Repository for return database operations.
#[derive(Debug, Clone)]
pub struct DevolucionRepository {
    pool: SqlitePool,
}

impl DevolucionRepository {
    /// Creates a new DevolucionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DevolucionRepository { pool }
    }

    /// Persists a processed return atomically.
    ///
    /// ## What This Does (one transaction)
    /// 1. Bumps the sale's `total_returned_cents` with the guarded relative
    ///    UPDATE above, flipping its status in the same statement
    /// 2. Inserts the return row, its items, and its refund legs
    /// 3. Applies restock deltas for items in restockable condition
    ///
    /// ## Returns
    /// `Ok(false)` when the guard rejected the bump: the sale left a
    /// refundable state or the ceiling would be exceeded (a concurrent
    /// return won the race). Nothing is written in that case.
    pub async fn create_processed(
        &self,
        dev: &Devolucion,
        items: &[ReturnedItem],
        legs: &[RefundLeg],
        restock: &[(String, i64)],
    ) -> DbResult<bool> {
        debug!(id = %dev.id, sale_id = %dev.sale_id, amount = dev.refund_amount_cents, "Processing return");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE sales
            SET total_returned_cents = total_returned_cents + ?2,
                status = CASE WHEN total_returned_cents + ?2 >= total_cents
                              THEN 'cancelada' ELSE 'parcialmente_devuelta' END,
                updated_at = ?3
            WHERE id = ?1
              AND status IN ('entregado_y_cobrado', 'parcialmente_devuelta')
              AND total_returned_cents + ?2 <= total_cents
            "#,
        )
        .bind(&dev.sale_id)
        .bind(dev.refund_amount_cents)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO devoluciones (
                id, tenant_id, sale_id, refund_amount_cents, refund_method,
                status, user_id, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&dev.id)
        .bind(&dev.tenant_id)
        .bind(&dev.sale_id)
        .bind(dev.refund_amount_cents)
        .bind(dev.refund_method)
        .bind(dev.status)
        .bind(&dev.user_id)
        .bind(&dev.notes)
        .bind(dev.created_at)
        .bind(dev.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO devolucion_items (
                    id, devolucion_id, product_id, name, quantity,
                    original_price_cents, refund_price_cents, reason, condition
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&item.id)
            .bind(&item.devolucion_id)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.original_price_cents)
            .bind(item.refund_price_cents)
            .bind(&item.reason)
            .bind(item.condition)
            .execute(&mut *tx)
            .await?;
        }

        for leg in legs {
            sqlx::query(
                r#"
                INSERT INTO devolucion_pagos (id, devolucion_id, metodo, amount_cents)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&leg.id)
            .bind(&leg.devolucion_id)
            .bind(leg.metodo)
            .bind(leg.amount_cents)
            .execute(&mut *tx)
            .await?;
        }

        for (product_id, qty) in restock {
            adjust_stock_in_tx(&mut tx, product_id, *qty).await?;
        }

        tx.commit().await?;

        info!(id = %dev.id, sale_id = %dev.sale_id, "Return processed");
        Ok(true)
    }

    /// Gets a return by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Devolucion>> {
        let dev = sqlx::query_as::<_, Devolucion>(
            r#"
            SELECT id, tenant_id, sale_id, refund_amount_cents, refund_method,
                   status, user_id, notes, created_at, updated_at
            FROM devoluciones
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(dev)
    }

    /// Lists all returns against a sale, oldest first.
    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<Devolucion>> {
        let devs = sqlx::query_as::<_, Devolucion>(
            r#"
            SELECT id, tenant_id, sale_id, refund_amount_cents, refund_method,
                   status, user_id, notes, created_at, updated_at
            FROM devoluciones
            WHERE sale_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(devs)
    }

    /// Lists returns created in `[start, end)`, optionally filtered to the
    /// store of the parent sale. Keyed by the return's own timestamp, so a
    /// refund handed out today against an older sale lands in today's window.
    pub async fn list_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tienda_id: Option<&str>,
    ) -> DbResult<Vec<Devolucion>> {
        let devs = match tienda_id {
            Some(tienda) => {
                sqlx::query_as::<_, Devolucion>(
                    r#"
                    SELECT d.id, d.tenant_id, d.sale_id, d.refund_amount_cents,
                           d.refund_method, d.status, d.user_id, d.notes,
                           d.created_at, d.updated_at
                    FROM devoluciones d
                    JOIN sales s ON s.id = d.sale_id
                    WHERE d.created_at >= ?1 AND d.created_at < ?2 AND s.tienda_id = ?3
                    ORDER BY d.created_at
                    "#,
                )
                .bind(start)
                .bind(end)
                .bind(tienda)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Devolucion>(
                    r#"
                    SELECT id, tenant_id, sale_id, refund_amount_cents, refund_method,
                           status, user_id, notes, created_at, updated_at
                    FROM devoluciones
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

        Ok(devs)
    }

    /// Gets the item entries of a return.
    pub async fn get_items(&self, devolucion_id: &str) -> DbResult<Vec<ReturnedItem>> {
        let items = sqlx::query_as::<_, ReturnedItem>(
            r#"
            SELECT id, devolucion_id, product_id, name, quantity,
                   original_price_cents, refund_price_cents, reason, condition
            FROM devolucion_items
            WHERE devolucion_id = ?1
            "#,
        )
        .bind(devolucion_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets the refund legs of a mixed return.
    pub async fn get_legs(&self, devolucion_id: &str) -> DbResult<Vec<RefundLeg>> {
        let legs = sqlx::query_as::<_, RefundLeg>(
            r#"
            SELECT id, devolucion_id, metodo, amount_cents
            FROM devolucion_pagos
            WHERE devolucion_id = ?1
            "#,
        )
        .bind(devolucion_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(legs)
    }

    /// Cumulative returned quantity per sale line across all non-rejected
    /// returns, keyed by line identity (product ID, else frozen name).
    /// Feeds the per-item quantity ceiling.
    pub async fn returned_qty_by_line(&self, sale_id: &str) -> DbResult<HashMap<String, i64>> {
        let rows: Vec<(Option<String>, String, i64)> = sqlx::query_as(
            r#"
            SELECT di.product_id, di.name, SUM(di.quantity)
            FROM devolucion_items di
            JOIN devoluciones d ON d.id = di.devolucion_id
            WHERE d.sale_id = ?1 AND d.status != 'rechazada'
            GROUP BY di.product_id, di.name
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, name, qty)| (line_key(product_id.as_deref(), &name), qty))
            .collect())
    }

    /// Cumulative refunded amount per payment method across all non-rejected
    /// mixed returns of a sale. Feeds the per-leg refund cap.
    pub async fn refunded_by_method(
        &self,
        sale_id: &str,
    ) -> DbResult<HashMap<PaymentMethod, i64>> {
        let rows: Vec<(PaymentMethod, i64)> = sqlx::query_as(
            r#"
            SELECT dp.metodo, SUM(dp.amount_cents)
            FROM devolucion_pagos dp
            JOIN devoluciones d ON d.id = dp.devolucion_id
            WHERE d.sale_id = ?1 AND d.status != 'rechazada'
            GROUP BY dp.metodo
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Marks a return approved.
    pub async fn approve(&self, devolucion_id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE devoluciones
            SET status = 'aprobada', updated_at = ?2
            WHERE id = ?1 AND status = 'procesada'
            "#,
        )
        .bind(devolucion_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Devolucion (procesada)", devolucion_id));
        }

        Ok(())
    }

    /// Rejects a return after the fact, reversing all its effects.
    ///
    /// ## What This Does (one transaction)
    /// 1. Flips the return to `rechazada` (guard: not already rejected)
    /// 2. Winds the sale's `total_returned_cents` back down and recomputes
    ///    the status in the same statement: back to `entregado_y_cobrado`
    ///    when nothing remains returned, else `parcialmente_devuelta`
    /// 3. Reverses the restock deltas the return applied
    ///
    /// ## Returns
    /// `Ok(false)` if the return was already rejected (nothing reversed).
    pub async fn reject(
        &self,
        devolucion_id: &str,
        sale_id: &str,
        refund_amount_cents: i64,
        unstock: &[(String, i64)],
    ) -> DbResult<bool> {
        debug!(id = %devolucion_id, "Rejecting return");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE devoluciones
            SET status = 'rechazada', updated_at = ?2
            WHERE id = ?1 AND status != 'rechazada'
            "#,
        )
        .bind(devolucion_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        // The CASE reads the old row values: subtracting this refund down to
        // zero restores the delivered state, anything left keeps the sale
        // partially returned. Sales cancelled by a full return revert too.
        sqlx::query(
            r#"
            UPDATE sales
            SET total_returned_cents = MAX(0, total_returned_cents - ?2),
                status = CASE WHEN total_returned_cents - ?2 <= 0
                              THEN 'entregado_y_cobrado' ELSE 'parcialmente_devuelta' END,
                updated_at = ?3
            WHERE id = ?1
              AND status IN ('parcialmente_devuelta', 'cancelada')
            "#,
        )
        .bind(sale_id)
        .bind(refund_amount_cents)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (product_id, qty) in unstock {
            adjust_stock_in_tx(&mut tx, product_id, -qty).await?;
        }

        tx.commit().await?;

        info!(id = %devolucion_id, sale_id = %sale_id, "Return rejected");
        Ok(true)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use corte_core::{
        FulfillmentType, ItemCondition, PaymentLeg, PaymentType, RefundMethod, Sale, SaleStatus,
        DEFAULT_TENANT_ID,
    };
    use uuid::Uuid;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_delivered_sale(db: &Database, total_cents: i64) -> Sale {
        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            tienda_id: "store-1".to_string(),
            user_id: "user-1".to_string(),
            customer_id: None,
            courier_id: None,
            payment_type: PaymentType::Single,
            fulfillment: FulfillmentType::Mostrador,
            status: SaleStatus::EntregadoYCobrado,
            discount_cents: 0,
            total_cents,
            total_returned_cents: 0,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        let pago = PaymentLeg {
            id: Uuid::new_v4().to_string(),
            sale_id: sale.id.clone(),
            metodo: PaymentMethod::Efectivo,
            amount_cents: total_cents,
            reference: None,
            received_cents: Some(total_cents),
            created_at: now,
        };
        db.sales()
            .create_full(&sale, &[], &[pago], &[])
            .await
            .unwrap();
        sale
    }

    fn sample_return(sale_id: &str, amount_cents: i64) -> Devolucion {
        let now = Utc::now();
        Devolucion {
            id: Uuid::new_v4().to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            sale_id: sale_id.to_string(),
            refund_amount_cents: amount_cents,
            refund_method: RefundMethod::Efectivo,
            status: ReturnStatus::Procesada,
            user_id: "user-1".to_string(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_partial_return_flips_status() {
        let db = test_db().await;
        let sale = seed_delivered_sale(&db, 10000).await;

        let dev = sample_return(&sale.id, 4000);
        assert!(db
            .devoluciones()
            .create_processed(&dev, &[], &[], &[])
            .await
            .unwrap());

        let found = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(found.status, SaleStatus::ParcialmenteDevuelta);
        assert_eq!(found.total_returned_cents, 4000);
    }

    #[tokio::test]
    async fn test_full_return_cancels_sale() {
        let db = test_db().await;
        let sale = seed_delivered_sale(&db, 10000).await;

        let dev = sample_return(&sale.id, 10000);
        assert!(db
            .devoluciones()
            .create_processed(&dev, &[], &[], &[])
            .await
            .unwrap());

        let found = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(found.status, SaleStatus::Cancelada);
        assert_eq!(found.total_returned_cents, 10000);
    }

    #[tokio::test]
    async fn test_ceiling_rejects_over_refund() {
        let db = test_db().await;
        let sale = seed_delivered_sale(&db, 10000).await;

        let first = sample_return(&sale.id, 6000);
        assert!(db
            .devoluciones()
            .create_processed(&first, &[], &[], &[])
            .await
            .unwrap());

        // Second 60% return would breach the ceiling; guard rejects it and
        // nothing is written.
        let second = sample_return(&sale.id, 6000);
        assert!(!db
            .devoluciones()
            .create_processed(&second, &[], &[], &[])
            .await
            .unwrap());

        let found = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(found.total_returned_cents, 6000);
        assert!(db
            .devoluciones()
            .get_by_id(&second.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_return_restocks_items() {
        let db = test_db().await;
        let product = db
            .products()
            .create(DEFAULT_TENANT_ID, "SKU-R", "Returnable", 2500, 0)
            .await
            .unwrap();
        let sale = seed_delivered_sale(&db, 5000).await;

        let dev = sample_return(&sale.id, 5000);
        let item = ReturnedItem {
            id: Uuid::new_v4().to_string(),
            devolucion_id: dev.id.clone(),
            product_id: Some(product.id.clone()),
            name: "Returnable".to_string(),
            quantity: 2,
            original_price_cents: 2500,
            refund_price_cents: 2500,
            reason: "wrong size".to_string(),
            condition: ItemCondition::Nuevo,
        };
        db.devoluciones()
            .create_processed(&dev, &[item], &[], &[(product.id.clone(), 2)])
            .await
            .unwrap();

        assert_eq!(db.products().current_stock(&product.id).await.unwrap(), Some(2));

        let by_line = db
            .devoluciones()
            .returned_qty_by_line(&sale.id)
            .await
            .unwrap();
        assert_eq!(by_line.get(&line_key(Some(&product.id), "Returnable")), Some(&2));
    }

    #[tokio::test]
    async fn test_reject_reverses_everything() {
        let db = test_db().await;
        let product = db
            .products()
            .create(DEFAULT_TENANT_ID, "SKU-X", "Rejected", 2500, 0)
            .await
            .unwrap();
        let sale = seed_delivered_sale(&db, 10000).await;

        let dev = sample_return(&sale.id, 5000);
        db.devoluciones()
            .create_processed(&dev, &[], &[], &[(product.id.clone(), 2)])
            .await
            .unwrap();

        assert!(db
            .devoluciones()
            .reject(&dev.id, &sale.id, 5000, &[(product.id.clone(), 2)])
            .await
            .unwrap());

        let found = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(found.status, SaleStatus::EntregadoYCobrado);
        assert_eq!(found.total_returned_cents, 0);
        assert_eq!(db.products().current_stock(&product.id).await.unwrap(), Some(0));

        // Idempotent: a second reject is a no-op.
        assert!(!db
            .devoluciones()
            .reject(&dev.id, &sale.id, 5000, &[(product.id.clone(), 2)])
            .await
            .unwrap());
        assert_eq!(db.products().current_stock(&product.id).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_reject_partial_keeps_partial_status() {
        let db = test_db().await;
        let sale = seed_delivered_sale(&db, 10000).await;

        let first = sample_return(&sale.id, 3000);
        let second = sample_return(&sale.id, 4000);
        db.devoluciones()
            .create_processed(&first, &[], &[], &[])
            .await
            .unwrap();
        db.devoluciones()
            .create_processed(&second, &[], &[], &[])
            .await
            .unwrap();

        db.devoluciones()
            .reject(&second.id, &sale.id, 4000, &[])
            .await
            .unwrap();

        let found = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(found.status, SaleStatus::ParcialmenteDevuelta);
        assert_eq!(found.total_returned_cents, 3000);
    }

    #[tokio::test]
    async fn test_list_window_filters_by_store_and_time() {
        let db = test_db().await;
        let sale = seed_delivered_sale(&db, 10000).await;

        let dev = sample_return(&sale.id, 4000);
        db.devoluciones()
            .create_processed(&dev, &[], &[], &[])
            .await
            .unwrap();

        let start = Utc::now() - chrono::Duration::hours(1);
        let end = Utc::now() + chrono::Duration::hours(1);

        // seed_delivered_sale puts the sale in store-1
        let here = db
            .devoluciones()
            .list_window(start, end, Some("store-1"))
            .await
            .unwrap();
        assert_eq!(here.len(), 1);
        assert_eq!(here[0].id, dev.id);

        let elsewhere = db
            .devoluciones()
            .list_window(start, end, Some("store-2"))
            .await
            .unwrap();
        assert!(elsewhere.is_empty());

        let yesterday = db
            .devoluciones()
            .list_window(start - chrono::Duration::days(1), start, None)
            .await
            .unwrap();
        assert!(yesterday.is_empty());
    }

    #[tokio::test]
    async fn test_refunded_by_method_skips_rejected() {
        let db = test_db().await;
        let sale = seed_delivered_sale(&db, 10000).await;

        let dev = sample_return(&sale.id, 3000);
        let leg = RefundLeg {
            id: Uuid::new_v4().to_string(),
            devolucion_id: dev.id.clone(),
            metodo: PaymentMethod::Tarjeta,
            amount_cents: 3000,
        };
        db.devoluciones()
            .create_processed(&dev, &[], &[leg], &[])
            .await
            .unwrap();

        let by_method = db.devoluciones().refunded_by_method(&sale.id).await.unwrap();
        assert_eq!(by_method.get(&PaymentMethod::Tarjeta), Some(&3000));

        db.devoluciones()
            .reject(&dev.id, &sale.id, 3000, &[])
            .await
            .unwrap();

        let by_method = db.devoluciones().refunded_by_method(&sale.id).await.unwrap();
        assert!(by_method.is_empty());
    }
}
