//! # Turno (Shift) Repository
//!
//! Database operations for cash-drawer shifts.
//!
//! ## Close-Once Guarantee
//! The close is a guarded UPDATE on `estado = 'abierto'`. Whoever lands the
//! UPDATE first (manual close or the auto-close sweep) wins; the loser sees
//! `rows_affected == 0` and the final cash figure is never recomputed.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use corte_core::Turno;

const TURNO_COLUMNS: &str = r#"
    id, tenant_id, tienda_id, user_id, closed_by, station, estado,
    efectivo_inicial_cents, efectivo_final_cents, notes, opened_at, closed_at
"#;

/// Repository for shift database operations.
#[derive(Debug, Clone)]
pub struct TurnoRepository {
    pool: SqlitePool,
}

impl TurnoRepository {
    /// Creates a new TurnoRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TurnoRepository { pool }
    }

    /// Inserts a shift.
    pub async fn insert(&self, turno: &Turno) -> DbResult<()> {
        debug!(id = %turno.id, tienda_id = %turno.tienda_id, "Opening shift");

        sqlx::query(
            r#"
            INSERT INTO turnos (
                id, tenant_id, tienda_id, user_id, closed_by, station, estado,
                efectivo_inicial_cents, efectivo_final_cents, notes,
                opened_at, closed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&turno.id)
        .bind(&turno.tenant_id)
        .bind(&turno.tienda_id)
        .bind(&turno.user_id)
        .bind(&turno.closed_by)
        .bind(&turno.station)
        .bind(turno.estado)
        .bind(turno.efectivo_inicial_cents)
        .bind(turno.efectivo_final_cents)
        .bind(&turno.notes)
        .bind(turno.opened_at)
        .bind(turno.closed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a shift by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Turno>> {
        let sql = format!("SELECT {TURNO_COLUMNS} FROM turnos WHERE id = ?1");
        let turno = sqlx::query_as::<_, Turno>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(turno)
    }

    /// Finds the open shift for a store, if any (most recently opened wins
    /// if duplicates exist).
    pub async fn find_open_by_store(&self, tienda_id: &str) -> DbResult<Option<Turno>> {
        let sql = format!(
            r#"
            SELECT {TURNO_COLUMNS} FROM turnos
            WHERE tienda_id = ?1 AND estado = 'abierto'
            ORDER BY opened_at DESC
            LIMIT 1
            "#
        );
        let turno = sqlx::query_as::<_, Turno>(&sql)
            .bind(tienda_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(turno)
    }

    /// Finds the open shift opened by a user, if any. Admission fallback for
    /// administrators operating without a store context.
    pub async fn find_open_by_user(&self, user_id: &str) -> DbResult<Option<Turno>> {
        let sql = format!(
            r#"
            SELECT {TURNO_COLUMNS} FROM turnos
            WHERE user_id = ?1 AND estado = 'abierto'
            ORDER BY opened_at DESC
            LIMIT 1
            "#
        );
        let turno = sqlx::query_as::<_, Turno>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(turno)
    }

    /// Lists every open shift, oldest first. Input to the auto-close sweep.
    pub async fn list_open(&self) -> DbResult<Vec<Turno>> {
        let sql = format!(
            r#"
            SELECT {TURNO_COLUMNS} FROM turnos
            WHERE estado = 'abierto'
            ORDER BY opened_at
            "#
        );
        let turnos = sqlx::query_as::<_, Turno>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(turnos)
    }

    /// Guarded close: flips an open shift to `cerrado` with its final cash
    /// figure. Returns whether this call won the close.
    pub async fn close(
        &self,
        id: &str,
        closed_by: &str,
        efectivo_final_cents: i64,
        notes: Option<&str>,
        closed_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE turnos
            SET estado = 'cerrado',
                closed_by = ?2,
                efectivo_final_cents = ?3,
                notes = COALESCE(?4, notes),
                closed_at = ?5
            WHERE id = ?1 AND estado = 'abierto'
            "#,
        )
        .bind(id)
        .bind(closed_by)
        .bind(efectivo_final_cents)
        .bind(notes)
        .bind(closed_at)
        .execute(&self.pool)
        .await?;

        let won = result.rows_affected() > 0;
        if won {
            info!(id = %id, efectivo_final = efectivo_final_cents, "Shift closed");
        }
        Ok(won)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use corte_core::{TurnoEstado, DEFAULT_TENANT_ID};
    use uuid::Uuid;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sample_turno(tienda_id: &str, user_id: &str) -> Turno {
        Turno {
            id: Uuid::new_v4().to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            tienda_id: tienda_id.to_string(),
            user_id: user_id.to_string(),
            closed_by: None,
            station: "caja-1".to_string(),
            estado: TurnoEstado::Abierto,
            efectivo_inicial_cents: 50000,
            efectivo_final_cents: None,
            notes: None,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    #[tokio::test]
    async fn test_open_and_find() {
        let db = test_db().await;
        let repo = db.turnos();

        let turno = sample_turno("store-1", "user-1");
        repo.insert(&turno).await.unwrap();

        let by_store = repo.find_open_by_store("store-1").await.unwrap().unwrap();
        assert_eq!(by_store.id, turno.id);

        let by_user = repo.find_open_by_user("user-1").await.unwrap().unwrap();
        assert_eq!(by_user.id, turno.id);

        assert!(repo.find_open_by_store("store-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_wins_only_once() {
        let db = test_db().await;
        let repo = db.turnos();

        let turno = sample_turno("store-1", "user-1");
        repo.insert(&turno).await.unwrap();

        let now = Utc::now();
        assert!(repo
            .close(&turno.id, "user-1", 72000, Some("fin de día"), now)
            .await
            .unwrap());

        // Second close loses; the recorded figure stays.
        assert!(!repo
            .close(&turno.id, "user-2", 99999, None, now)
            .await
            .unwrap());

        let found = repo.get_by_id(&turno.id).await.unwrap().unwrap();
        assert_eq!(found.estado, TurnoEstado::Cerrado);
        assert_eq!(found.efectivo_final_cents, Some(72000));
        assert_eq!(found.closed_by.as_deref(), Some("user-1"));
        assert_eq!(found.notes.as_deref(), Some("fin de día"));
    }

    #[tokio::test]
    async fn test_list_open_excludes_closed() {
        let db = test_db().await;
        let repo = db.turnos();

        let a = sample_turno("store-1", "user-1");
        let b = sample_turno("store-2", "user-2");
        repo.insert(&a).await.unwrap();
        repo.insert(&b).await.unwrap();

        repo.close(&a.id, "user-1", 0, None, Utc::now()).await.unwrap();

        let open = repo.list_open().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, b.id);
    }
}
