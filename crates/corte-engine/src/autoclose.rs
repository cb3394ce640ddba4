//! # Auto-Close Scheduler
//!
//! Force-closes every open shift once per calendar day at 23:59 local time.
//!
//! ## Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AutoCloseScheduler (owned component, constructed once at startup)      │
//! │                                                                         │
//! │  start() ──► tokio::spawn(run loop)                                     │
//! │                   │                                                     │
//! │                   ▼                                                     │
//! │          ┌─ sleep until next 23:59 local ─┐                             │
//! │          │                                │   shutdown_rx ──► break     │
//! │          └──────────► sweep() ◄───────────┘                             │
//! │                          │                                              │
//! │                          ▼                                              │
//! │   for each open shift: compute efectivoFinal, guarded close,            │
//! │   closer recorded as the ORIGINAL OPENER.                               │
//! │   Best effort: one failure never blocks the others; the result is       │
//! │   an aggregate SweepSummary { closed, failed }.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Shifts opened on an earlier calendar day are swept too: the predicate is
//! "currently open", nothing else.

use std::time::Duration;

use chrono::{Local, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use corte_core::{Turno, AUTO_CLOSE_NOTE};
use corte_db::{Database, DbError};

/// Aggregate result of one sweep over all open shifts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    /// Shifts this sweep closed.
    pub closed: usize,
    /// Shifts whose close failed (logged, not propagated).
    pub failed: usize,
}

/// Daily scheduler that sweeps open shifts closed at end of day.
pub struct AutoCloseScheduler {
    db: Database,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl AutoCloseScheduler {
    /// Creates a scheduler. Nothing runs until [`start`](Self::start).
    pub fn new(db: Database) -> Self {
        AutoCloseScheduler {
            db,
            shutdown_tx: None,
        }
    }

    /// Spawns the daily loop. Idempotent: a second call is a no-op while
    /// the loop is running.
    pub fn start(&mut self) {
        if self.shutdown_tx.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        let db = self.db.clone();
        tokio::spawn(async move {
            info!("Auto-close scheduler started");
            loop {
                let delay = delay_until_close();
                debug!(secs = delay.as_secs(), "Sleeping until next close boundary");

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        let summary = sweep(&db).await;
                        info!(
                            closed = summary.closed,
                            failed = summary.failed,
                            "End-of-day sweep finished"
                        );
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Auto-close scheduler shutting down");
                        break;
                    }
                }
            }
        });
    }

    /// Signals the loop to stop.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }

    /// Runs one sweep immediately, outside the daily schedule.
    pub async fn sweep_now(&self) -> SweepSummary {
        sweep(&self.db).await
    }
}

/// Closes every open shift, best effort. Each closure is isolated: a
/// failure is logged and counted, never propagated, so one broken shift
/// cannot block the rest of the sweep.
pub async fn sweep(db: &Database) -> SweepSummary {
    let open = match db.turnos().list_open().await {
        Ok(open) => open,
        Err(e) => {
            error!(error = %e, "Sweep could not list open shifts");
            return SweepSummary::default();
        }
    };

    let mut summary = SweepSummary::default();

    for turno in open {
        match close_one(db, &turno).await {
            Ok(true) => summary.closed += 1,
            Ok(false) => {
                // Manual close won the race; nothing left to do.
                debug!(id = %turno.id, "Shift already closed, skipping");
            }
            Err(e) => {
                warn!(id = %turno.id, error = %e, "Failed to auto-close shift");
                summary.failed += 1;
            }
        }
    }

    summary
}

/// Closes a single shift the same way a manual close does, recording the
/// original opener as the closer.
async fn close_one(db: &Database, turno: &Turno) -> Result<bool, DbError> {
    let closed_at = Utc::now();
    let cash_sales = db
        .sales()
        .cash_total_window(&turno.tienda_id, turno.opened_at, closed_at)
        .await?;
    let efectivo_final = turno.efectivo_inicial_cents + cash_sales;

    db.turnos()
        .close(
            &turno.id,
            &turno.user_id,
            efectivo_final,
            Some(AUTO_CLOSE_NOTE),
            closed_at,
        )
        .await
}

/// Duration until the next 23:59 local wall-clock boundary.
fn delay_until_close() -> Duration {
    let now = Local::now();
    let today = now
        .date_naive()
        .and_hms_opt(23, 59, 0)
        .expect("23:59 is a valid wall-clock time");

    let target = if now.naive_local() < today {
        today
    } else {
        today + chrono::Duration::days(1)
    };

    (target - now.naive_local())
        .to_std()
        .unwrap_or(Duration::from_secs(60))
}

// =============================================================================
// Unit Tests
// =============================================================================
