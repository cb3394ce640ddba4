//! # Product Repository (Stock Ledger)
//!
//! Database operations for products and stock movements.
//!
//! ## Stock Ledger Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every stock write is RELATIVE:  UPDATE products SET stock = stock + Δ  │
//! │                                                                         │
//! │  sale of qty N            Δ = -N   (per item with a product reference)  │
//! │  cancellation w/ restock  Δ = +N                                        │
//! │  return, restockable      Δ = +N   (condition != 'Dañado')              │
//! │  return rejected          Δ = -N   (reverse the restock)                │
//! │                                                                         │
//! │  Absolute writes (stock = X) would clobber concurrent adjustments.      │
//! │  Stock MAY go negative transiently; the admission pre-check is soft.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use corte_core::Product;

/// Repository for product and stock operations.
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
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, tenant_id, sku, name, price_cents, stock,
                   created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, sku, name, price_cents, stock,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Creates a product with a fresh ID, returning it.
    pub async fn create(
        &self,
        tenant_id: &str,
        sku: &str,
        name: &str,
        price_cents: i64,
        stock: i64,
    ) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            price_cents,
            stock,
            created_at: now,
            updated_at: now,
        };
        self.insert(&product).await?;
        Ok(product)
    }

    /// Current on-hand stock for a product.
    pub async fn current_stock(&self, id: &str) -> DbResult<Option<i64>> {
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(stock)
    }

    /// Applies a relative stock adjustment.
    ///
    /// ## Arguments
    /// * `id` - Product ID
    /// * `delta` - Signed quantity change (negative for sales)
    ///
    /// ## Returns
    /// `DbError::NotFound` if no product matches.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<()> {
        debug!(id = %id, delta = delta, "Adjusting stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}

/// Relative stock adjustment inside an open transaction.
///
/// Used by the sale and return repositories so stock movements commit or
/// roll back together with the rows that caused them. Unknown product IDs
/// are skipped silently: line items snapshot their product reference and the
/// catalog row may have been purged since.
pub async fn adjust_stock_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: &str,
    delta: i64,
) -> DbResult<()> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE products
        SET stock = stock + ?2, updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(delta)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use corte_core::DEFAULT_TENANT_ID;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = test_db().await;
        let repo = db.products();

        let product = repo
            .create(DEFAULT_TENANT_ID, "SKU-1", "Widget", 1500, 10)
            .await
            .unwrap();

        let found = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.sku, "SKU-1");
        assert_eq!(found.stock, 10);
    }

    #[tokio::test]
    async fn test_adjust_stock_is_relative() {
        let db = test_db().await;
        let repo = db.products();

        let product = repo
            .create(DEFAULT_TENANT_ID, "SKU-2", "Gadget", 500, 5)
            .await
            .unwrap();

        repo.adjust_stock(&product.id, -3).await.unwrap();
        repo.adjust_stock(&product.id, 1).await.unwrap();

        assert_eq!(repo.current_stock(&product.id).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_stock_may_go_negative() {
        let db = test_db().await;
        let repo = db.products();

        let product = repo
            .create(DEFAULT_TENANT_ID, "SKU-3", "Scarce", 500, 1)
            .await
            .unwrap();

        // No floor: oversell leaves a negative balance rather than failing.
        repo.adjust_stock(&product.id, -4).await.unwrap();
        assert_eq!(repo.current_stock(&product.id).await.unwrap(), Some(-3));
    }

    #[tokio::test]
    async fn test_adjust_unknown_product_not_found() {
        let db = test_db().await;
        let repo = db.products();

        let err = repo.adjust_stock("missing", 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = test_db().await;
        let repo = db.products();

        repo.create(DEFAULT_TENANT_ID, "SKU-4", "One", 100, 1)
            .await
            .unwrap();
        let err = repo
            .create(DEFAULT_TENANT_ID, "SKU-4", "Two", 200, 2)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
