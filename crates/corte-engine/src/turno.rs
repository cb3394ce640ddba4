//! # Shift Registry
//!
//! Owns the open/closed lifecycle of cash-drawer shifts.
//!
//! ## Closing Cash
//! ```text
//! efectivoFinal = efectivoInicial
//!               + Σ cash legs of sales created in [opened_at, closed_at)
//!                 for the shift's store
//! ```
//! No status filter and no expense netting at close time: the drawer is
//! counted as it stands; expenses only enter the math at cutoff-report time.
//! The figure is computed exactly once — the guarded close in corte-db makes
//! a second close lose rather than recompute.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use corte_core::validation::validate_opening_float;
use corte_core::{Actor, ShiftScope, Turno, TurnoEstado};
use corte_db::Database;

use crate::error::{EngineError, EngineResult};

/// Registry for shift lifecycle operations.
#[derive(Debug, Clone)]
pub struct ShiftRegistry {
    db: Database,
}

impl ShiftRegistry {
    /// Creates a new ShiftRegistry.
    pub fn new(db: Database) -> Self {
        ShiftRegistry { db }
    }

    /// Opens a shift for a store + cashier + station.
    ///
    /// ## Errors
    /// * `NegativeOpeningFloat` validation failure
    /// * `ShiftAlreadyOpen` if the store or the cashier already has one
    pub async fn open(
        &self,
        actor: &Actor,
        tienda_id: &str,
        station: &str,
        efectivo_inicial_cents: i64,
        notes: Option<String>,
    ) -> EngineResult<Turno> {
        validate_opening_float(efectivo_inicial_cents)?;

        let turnos = self.db.turnos();

        if let Some(existing) = turnos.find_open_by_store(tienda_id).await? {
            return Err(EngineError::ShiftAlreadyOpen { id: existing.id });
        }
        if let Some(existing) = turnos.find_open_by_user(&actor.user_id).await? {
            return Err(EngineError::ShiftAlreadyOpen { id: existing.id });
        }

        let turno = Turno {
            id: Uuid::new_v4().to_string(),
            tenant_id: actor.tenant_id.clone(),
            tienda_id: tienda_id.to_string(),
            user_id: actor.user_id.clone(),
            closed_by: None,
            station: station.to_string(),
            estado: TurnoEstado::Abierto,
            efectivo_inicial_cents,
            efectivo_final_cents: None,
            notes,
            opened_at: Utc::now(),
            closed_at: None,
        };

        turnos.insert(&turno).await?;

        info!(
            id = %turno.id,
            tienda_id = %tienda_id,
            float = efectivo_inicial_cents,
            "Shift opened"
        );

        Ok(turno)
    }

    /// Closes a shift, computing and recording its final cash figure.
    ///
    /// Idempotence: closing an already-closed shift returns
    /// `ShiftAlreadyClosed` and never recomputes `efectivoFinal`.
    pub async fn close(
        &self,
        turno_id: &str,
        closed_by: &str,
        notes: Option<&str>,
    ) -> EngineResult<Turno> {
        let turnos = self.db.turnos();
        let turno = turnos
            .get_by_id(turno_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Turno", turno_id))?;

        if turno.estado == TurnoEstado::Cerrado {
            return Err(EngineError::ShiftAlreadyClosed {
                id: turno_id.to_string(),
            });
        }

        let closed_at = Utc::now();
        let cash_sales = self
            .db
            .sales()
            .cash_total_window(&turno.tienda_id, turno.opened_at, closed_at)
            .await?;
        let efectivo_final = turno.efectivo_inicial_cents + cash_sales;

        let won = turnos
            .close(turno_id, closed_by, efectivo_final, notes, closed_at)
            .await?;

        if !won {
            // Lost a race against another close (manual or the sweep); the
            // recorded figure stands.
            return Err(EngineError::ShiftAlreadyClosed {
                id: turno_id.to_string(),
            });
        }

        turnos
            .get_by_id(turno_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Turno", turno_id))
    }

    /// Reads a shift by ID.
    pub async fn get(&self, turno_id: &str) -> EngineResult<Turno> {
        self.db
            .turnos()
            .get_by_id(turno_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Turno", turno_id))
    }

    /// Whether the scope currently admits sales (an open shift exists).
    pub async fn has_open_shift(&self, scope: &ShiftScope) -> EngineResult<bool> {
        let turnos = self.db.turnos();
        let found = match scope {
            ShiftScope::StoreScoped(tienda_id) => turnos.find_open_by_store(tienda_id).await?,
            ShiftScope::UserScoped(user_id) => turnos.find_open_by_user(user_id).await?,
        };
        Ok(found.is_some())
    }
}
