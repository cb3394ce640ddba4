//! # Expense Repository
//!
//! Read/write access to expense records. Expenses are managed elsewhere;
//! the cutoff only consumes them, so this repository stays small.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use corte_core::{Expense, ExpenseStatus, PaymentMethod};

/// Repository for expense database operations.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    /// Creates a new ExpenseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    /// Inserts an expense.
    pub async fn insert(&self, expense: &Expense) -> DbResult<()> {
        debug!(id = %expense.id, amount = expense.amount_cents, "Inserting expense");

        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, tenant_id, tienda_id, metodo, amount_cents, status,
                description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.tenant_id)
        .bind(&expense.tienda_id)
        .bind(expense.metodo)
        .bind(expense.amount_cents)
        .bind(expense.status)
        .bind(&expense.description)
        .bind(expense.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Creates an expense with a fresh ID, returning it.
    pub async fn create(
        &self,
        tenant_id: &str,
        tienda_id: &str,
        metodo: PaymentMethod,
        amount_cents: i64,
        status: ExpenseStatus,
        description: Option<&str>,
    ) -> DbResult<Expense> {
        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            tienda_id: tienda_id.to_string(),
            metodo,
            amount_cents,
            status,
            description: description.map(|s| s.to_string()),
            created_at: Utc::now(),
        };
        self.insert(&expense).await?;
        Ok(expense)
    }

    /// Lists expenses created in `[start, end)`, optionally filtered by
    /// store. All statuses; the cutoff filters to approved ones itself.
    pub async fn list_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tienda_id: Option<&str>,
    ) -> DbResult<Vec<Expense>> {
        let expenses = match tienda_id {
            Some(tienda) => {
                sqlx::query_as::<_, Expense>(
                    r#"
                    SELECT id, tenant_id, tienda_id, metodo, amount_cents, status,
                           description, created_at
                    FROM expenses
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
                sqlx::query_as::<_, Expense>(
                    r#"
                    SELECT id, tenant_id, tienda_id, metodo, amount_cents, status,
                           description, created_at
                    FROM expenses
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

        Ok(expenses)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use corte_core::DEFAULT_TENANT_ID;

    #[tokio::test]
    async fn test_insert_and_list_window() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.expenses();

        repo.create(
            DEFAULT_TENANT_ID,
            "store-1",
            PaymentMethod::Efectivo,
            2500,
            ExpenseStatus::Aprobado,
            Some("cleaning supplies"),
        )
        .await
        .unwrap();
        repo.create(
            DEFAULT_TENANT_ID,
            "store-2",
            PaymentMethod::Tarjeta,
            8000,
            ExpenseStatus::Pendiente,
            None,
        )
        .await
        .unwrap();

        let start = Utc::now() - chrono::Duration::hours(1);
        let end = Utc::now() + chrono::Duration::hours(1);

        let all = repo.list_window(start, end, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let store_1 = repo.list_window(start, end, Some("store-1")).await.unwrap();
        assert_eq!(store_1.len(), 1);
        assert_eq!(store_1[0].amount_cents, 2500);
    }
}
