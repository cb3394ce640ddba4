//! # Cash-Cutoff Aggregator
//!
//! Read-only reconciliation: fetches the window's sales, expenses, and
//! returns and hands them to the pure math in [`corte_core::caja`]. No
//! mutation happens anywhere in this module.

use chrono::{DateTime, Utc};
use tracing::debug;

use corte_core::caja::{compute_corte, CorteReport, ReturnBreakdown};
use corte_core::{RefundMethod, ReturnStatus};
use corte_db::Database;

use crate::error::EngineResult;

/// Aggregator producing cash-cutoff reports.
#[derive(Debug, Clone)]
pub struct CajaAggregator {
    db: Database,
}

impl CajaAggregator {
    /// Creates a new CajaAggregator.
    pub fn new(db: Database) -> Self {
        CajaAggregator { db }
    }

    /// Builds the cutoff report for `[start, end)`, optionally filtered to
    /// one store.
    ///
    /// Sales enter with net amounts (their returned totals allocated
    /// proportionally across payment legs); approved expenses are
    /// subtracted per method; return totals are informational.
    pub async fn report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tienda_id: Option<String>,
    ) -> EngineResult<CorteReport> {
        let sales = self
            .db
            .sales()
            .list_window(start, end, tienda_id.as_deref())
            .await?;
        let expenses = self
            .db
            .expenses()
            .list_window(start, end, tienda_id.as_deref())
            .await?;

        // Returns are keyed by their own processing time: a refund handed
        // out today against last week's sale belongs to today's drawer.
        // Rejected returns reversed their effects and stay out.
        let devoluciones = self.db.devoluciones();
        let mut returns = Vec::new();
        for dev in devoluciones
            .list_window(start, end, tienda_id.as_deref())
            .await?
        {
            if dev.status == ReturnStatus::Rechazada {
                continue;
            }
            let legs = if dev.refund_method == RefundMethod::Mixto {
                devoluciones
                    .get_legs(&dev.id)
                    .await?
                    .into_iter()
                    .map(|leg| (leg.metodo, leg.amount_cents))
                    .collect()
            } else {
                Vec::new()
            };
            returns.push(ReturnBreakdown {
                refund_method: dev.refund_method,
                refund_amount_cents: dev.refund_amount_cents,
                legs,
            });
        }

        debug!(
            sales = sales.len(),
            expenses = expenses.len(),
            returns = returns.len(),
            "Computing corte"
        );

        Ok(compute_corte(
            start, end, tienda_id, &sales, &expenses, &returns,
        ))
    }
}
