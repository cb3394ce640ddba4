//! # Return Processor
//!
//! Validates returns against the original sale and applies their effects
//! atomically.
//!
//! ## Validation Sequence (fail fast, no writes before step 5 passes)
//! ```text
//! 1. Sale exists and is in a refundable state
//! 2. Refund method compatible with the original payment
//!    (cash-out policy; mixed sales need a capped per-leg breakdown)
//! 3. Items match original lines; cumulative quantities within sold amounts
//! 4. refundAmount ≤ Σ refundPrice × quantity
//! 5. refundAmount ≤ sale.total − sale.totalReturned
//! ```
//!
//! The same ceilings are enforced again inside the transaction by the
//! guarded UPDATE in corte-db, so two racing returns cannot both pass.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use corte_core::validation::{
    check_refund_balance, validate_refund_amount, validate_refund_method, validate_return_items,
};
use corte_core::{
    Actor, Devolucion, NewReturn, RefundLeg, RefundMethod, ReturnStatus, ReturnedItem,
};
use corte_db::Database;

use crate::error::{EngineError, EngineResult};

/// Processor for return creation, approval, and rejection.
#[derive(Debug, Clone)]
pub struct ReturnProcessor {
    db: Database,
}

impl ReturnProcessor {
    /// Creates a new ReturnProcessor.
    pub fn new(db: Database) -> Self {
        ReturnProcessor { db }
    }

    /// Processes a return: validates it against the original sale, then in
    /// one transaction persists it, restores stock for restockable items,
    /// bumps the sale's returned total, and flips the sale's status.
    pub async fn process(&self, actor: &Actor, request: NewReturn) -> EngineResult<Devolucion> {
        let sale = self
            .db
            .sales()
            .get_full(&request.sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", &request.sale_id))?;

        if !sale.sale.status.is_refundable() {
            return Err(EngineError::SaleNotRefundable {
                status: sale.sale.status,
            });
        }

        let devoluciones = self.db.devoluciones();
        let refunded_by_method = devoluciones.refunded_by_method(&request.sale_id).await?;
        validate_refund_method(&sale, &request, &refunded_by_method)?;

        let already_returned = devoluciones.returned_qty_by_line(&request.sale_id).await?;
        validate_return_items(&sale, &request.items, &already_returned)?;

        validate_refund_amount(&request.items, request.refund_amount_cents)?;
        check_refund_balance(&sale.sale, request.refund_amount_cents)?;

        let now = Utc::now();
        let dev_id = Uuid::new_v4().to_string();

        let dev = Devolucion {
            id: dev_id.clone(),
            tenant_id: actor.tenant_id.clone(),
            sale_id: request.sale_id.clone(),
            refund_amount_cents: request.refund_amount_cents,
            refund_method: request.refund_method,
            status: ReturnStatus::Procesada,
            user_id: actor.user_id.clone(),
            notes: request.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut items = Vec::with_capacity(request.items.len());
        let mut restock: Vec<(String, i64)> = Vec::new();

        for entry in &request.items {
            // Validated above; the line is guaranteed to exist.
            let line = sale
                .find_item(entry.product_id.as_deref(), &entry.name)
                .ok_or_else(|| EngineError::not_found("Sale line", &entry.name))?;

            if entry.condition.restocks() {
                if let Some(pid) = line.product_id.as_deref() {
                    match restock.iter_mut().find(|(p, _)| p == pid) {
                        Some((_, qty)) => *qty += entry.quantity,
                        None => restock.push((pid.to_string(), entry.quantity)),
                    }
                }
            }

            items.push(ReturnedItem {
                id: Uuid::new_v4().to_string(),
                devolucion_id: dev_id.clone(),
                product_id: line.product_id.clone(),
                name: line.name.clone(),
                quantity: entry.quantity,
                original_price_cents: line.unit_price_cents,
                refund_price_cents: entry.refund_price_cents,
                reason: entry.reason.clone(),
                condition: entry.condition,
            });
        }

        let legs: Vec<RefundLeg> = if request.refund_method == RefundMethod::Mixto {
            request
                .mixed_refunds
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|leg| RefundLeg {
                    id: Uuid::new_v4().to_string(),
                    devolucion_id: dev_id.clone(),
                    metodo: leg.metodo,
                    amount_cents: leg.amount_cents,
                })
                .collect()
        } else {
            Vec::new()
        };

        let applied = devoluciones
            .create_processed(&dev, &items, &legs, &restock)
            .await?;

        if !applied {
            // A concurrent return consumed the balance (or cancelled the
            // sale) between the validation read and the guarded write.
            return Err(EngineError::ConcurrentUpdate {
                entity: "Sale",
                id: request.sale_id,
            });
        }

        info!(
            id = %dev.id,
            sale_id = %dev.sale_id,
            refund = dev.refund_amount_cents,
            "Return processed"
        );

        Ok(dev)
    }

    /// Reads a return with its items.
    pub async fn get(&self, devolucion_id: &str) -> EngineResult<(Devolucion, Vec<ReturnedItem>)> {
        let repo = self.db.devoluciones();
        let dev = repo
            .get_by_id(devolucion_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Devolucion", devolucion_id))?;
        let items = repo.get_items(devolucion_id).await?;
        Ok((dev, items))
    }

    /// Marks a processed return approved. Approval has no financial effect;
    /// the return's effects were applied when it was processed.
    pub async fn approve(&self, devolucion_id: &str) -> EngineResult<Devolucion> {
        let repo = self.db.devoluciones();
        let dev = repo
            .get_by_id(devolucion_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Devolucion", devolucion_id))?;

        match dev.status {
            ReturnStatus::Procesada => {
                repo.approve(devolucion_id).await?;
            }
            ReturnStatus::Rechazada => {
                return Err(EngineError::ReturnAlreadyRejected {
                    id: devolucion_id.to_string(),
                })
            }
            // Already approved (or pendiente, which never applied effects):
            // approving again changes nothing.
            ReturnStatus::Aprobada | ReturnStatus::Pendiente => {}
        }

        repo.get_by_id(devolucion_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Devolucion", devolucion_id))
    }

    /// Rejects a return, reversing its effects: stock re-decremented, the
    /// sale's returned total wound back, and the sale status restored to
    /// `entregado_y_cobrado` only when the total returns to exactly zero.
    /// With other partial returns still approved the sale deliberately stays
    /// `parcialmente_devuelta`.
    pub async fn reject(&self, devolucion_id: &str) -> EngineResult<Devolucion> {
        let repo = self.db.devoluciones();
        let dev = repo
            .get_by_id(devolucion_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Devolucion", devolucion_id))?;

        if dev.status == ReturnStatus::Rechazada {
            return Err(EngineError::ReturnAlreadyRejected {
                id: devolucion_id.to_string(),
            });
        }

        // Only restockable items moved stock when the return was processed;
        // only those move back.
        let items = repo.get_items(devolucion_id).await?;
        let mut unstock: Vec<(String, i64)> = Vec::new();
        for item in &items {
            if item.condition.restocks() {
                if let Some(pid) = item.product_id.as_deref() {
                    match unstock.iter_mut().find(|(p, _)| p == pid) {
                        Some((_, qty)) => *qty += item.quantity,
                        None => unstock.push((pid.to_string(), item.quantity)),
                    }
                }
            }
        }

        let applied = repo
            .reject(devolucion_id, &dev.sale_id, dev.refund_amount_cents, &unstock)
            .await?;

        if !applied {
            return Err(EngineError::ReturnAlreadyRejected {
                id: devolucion_id.to_string(),
            });
        }

        info!(id = %devolucion_id, sale_id = %dev.sale_id, "Return rejected");

        repo.get_by_id(devolucion_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Devolucion", devolucion_id))
    }
}
