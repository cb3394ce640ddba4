//! # Sale Processor
//!
//! Validates and persists new sales, and drives the manual side of the sale
//! status machine.
//!
//! ## Create Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NewSale request                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. Pure validation (corte-core): items, discount, payment legs,        │
//! │     courier rule                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. Shift admission: resolve ShiftScope (store, or the admin's own      │
//! │     shift), require an open turno                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. Soft stock pre-check per catalog-referenced line                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  4. One transaction: sale + items + payment legs + stock decrements     │
//! │     (single-payment sales persist exactly one leg)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use corte_core::status::check_manual_transition;
use corte_core::validation::validate_new_sale;
use corte_core::{
    Actor, NewSale, PaymentLeg, PaymentMethod, PaymentSpec, Sale, SaleFull, SaleItem, SaleStatus,
    ShiftScope, Turno,
};
use corte_db::Database;

use crate::error::{EngineError, EngineResult};

/// Processor for sale creation and manual status transitions.
#[derive(Debug, Clone)]
pub struct SaleProcessor {
    db: Database,
}

impl SaleProcessor {
    /// Creates a new SaleProcessor.
    pub fn new(db: Database) -> Self {
        SaleProcessor { db }
    }

    /// Creates a sale.
    ///
    /// ## Returns
    /// The persisted sale with its items and payment legs.
    ///
    /// ## Errors
    /// * Validation failures from the request itself
    /// * `NoOpenShift` when the resolved scope has no open turno
    /// * `InsufficientStock` from the soft pre-check
    pub async fn create(&self, actor: &Actor, request: NewSale) -> EngineResult<SaleFull> {
        validate_new_sale(&request)?;

        let scope = resolve_scope(actor, request.tienda_id.as_deref())?;
        let turno = self.admit(&scope).await?;
        // Admin fallback: the sale lands in the store of the admin's own
        // open shift.
        let tienda_id = turno.tienda_id.clone();

        let stock_deltas = self.precheck_stock(&request).await?;

        let now = Utc::now();
        let sale_id = Uuid::new_v4().to_string();
        let total = request.total();

        let sale = Sale {
            id: sale_id.clone(),
            tenant_id: actor.tenant_id.clone(),
            tienda_id,
            user_id: actor.user_id.clone(),
            customer_id: request.customer_id.clone(),
            courier_id: request.courier_id.clone(),
            payment_type: request.payment.payment_type(),
            fulfillment: request.fulfillment,
            status: SaleStatus::EnPreparacion,
            discount_cents: request.discount_cents,
            total_cents: total.cents(),
            total_returned_cents: 0,
            notes: request.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        let items: Vec<SaleItem> = request
            .items
            .iter()
            .map(|i| SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: i.product_id.clone(),
                name: i.name.clone(),
                quantity: i.quantity,
                unit_price_cents: i.unit_price_cents,
                note: i.note.clone(),
                created_at: now,
            })
            .collect();

        let pagos = build_payment_legs(&sale_id, &request.payment, total.cents());

        self.db
            .sales()
            .create_full(&sale, &items, &pagos, &stock_deltas)
            .await?;

        info!(
            id = %sale.id,
            tienda_id = %sale.tienda_id,
            total = sale.total_cents,
            turno_id = %turno.id,
            "Sale created"
        );

        Ok(SaleFull { sale, items, pagos })
    }

    /// Reads a sale with its items and payment legs.
    pub async fn get(&self, sale_id: &str) -> EngineResult<SaleFull> {
        self.db
            .sales()
            .get_full(sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", sale_id))
    }

    /// Applies a user-driven status transition.
    ///
    /// Cancellation restores stock for every catalog-referenced line in the
    /// same transaction. Return-driven states (`parcialmente_devuelta`, the
    /// full-refund `cancelada`) are owned by the return processor and are
    /// rejected here.
    pub async fn set_status(&self, sale_id: &str, to: SaleStatus) -> EngineResult<Sale> {
        let current = self.get(sale_id).await?;
        let from = current.sale.status;

        check_manual_transition(from, to)?;

        let applied = if to == SaleStatus::Cancelada {
            let restock = restock_deltas(&current.items);
            self.db.sales().cancel(sale_id, &restock).await?
        } else {
            self.db.sales().set_status(sale_id, from, to).await?
        };

        if !applied {
            return Err(EngineError::ConcurrentUpdate {
                entity: "Sale",
                id: sale_id.to_string(),
            });
        }

        self.db
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Sale", sale_id))
    }

    /// Administrative bulk delete. Stock is restored first for sales that
    /// were not already cancelled; returns the number of sales removed.
    pub async fn purge(&self, sale_ids: &[String]) -> EngineResult<u64> {
        Ok(self.db.sales().purge(sale_ids).await?)
    }

    /// Finds the open shift the scope admits against.
    async fn admit(&self, scope: &ShiftScope) -> EngineResult<Turno> {
        let turnos = self.db.turnos();
        let found = match scope {
            ShiftScope::StoreScoped(tienda_id) => turnos.find_open_by_store(tienda_id).await?,
            ShiftScope::UserScoped(user_id) => turnos.find_open_by_user(user_id).await?,
        };

        found.ok_or_else(|| EngineError::NoOpenShift {
            scope: match scope {
                ShiftScope::StoreScoped(t) => format!("store {t}"),
                ShiftScope::UserScoped(u) => format!("user {u}"),
            },
        })
    }

    /// Soft stock pre-check over catalog-referenced lines. Quantities for
    /// the same product accumulate across lines. Lines whose product row no
    /// longer exists are skipped: the item data is snapshotted and the sale
    /// proceeds without a ledger movement.
    async fn precheck_stock(&self, request: &NewSale) -> EngineResult<Vec<(String, i64)>> {
        let mut required: HashMap<&str, (i64, &str)> = HashMap::new();
        for item in &request.items {
            if let Some(pid) = item.product_id.as_deref() {
                let entry = required.entry(pid).or_insert((0, item.name.as_str()));
                entry.0 += item.quantity;
            }
        }

        let products = self.db.products();
        let mut deltas = Vec::with_capacity(required.len());

        for (product_id, (quantity, name)) in required {
            match products.current_stock(product_id).await? {
                Some(available) => {
                    if available < quantity {
                        return Err(EngineError::InsufficientStock {
                            name: name.to_string(),
                            requested: quantity,
                            available,
                        });
                    }
                    deltas.push((product_id.to_string(), -quantity));
                }
                None => {
                    warn!(product_id = %product_id, "Sale line references unknown product, skipping stock movement");
                }
            }
        }

        Ok(deltas)
    }
}

/// Resolves the shift-admission scope: the request's store, else the actor's
/// store, else (administrators only) the actor's own open shift.
fn resolve_scope(actor: &Actor, requested_tienda: Option<&str>) -> EngineResult<ShiftScope> {
    match requested_tienda.or(actor.tienda_id.as_deref()) {
        Some(tienda_id) => Ok(ShiftScope::StoreScoped(tienda_id.to_string())),
        None if actor.is_admin() => Ok(ShiftScope::UserScoped(actor.user_id.clone())),
        None => Err(EngineError::StoreRequired),
    }
}

/// Builds persisted payment legs from the request descriptor. A single
/// payment becomes exactly one leg covering the total, so every cash sum
/// downstream is one uniform query over legs.
fn build_payment_legs(sale_id: &str, payment: &PaymentSpec, total_cents: i64) -> Vec<PaymentLeg> {
    let now = Utc::now();
    match payment {
        PaymentSpec::Single {
            metodo,
            reference,
            received_cents,
        } => vec![PaymentLeg {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.to_string(),
            metodo: *metodo,
            amount_cents: total_cents,
            reference: reference.clone(),
            received_cents: if *metodo == PaymentMethod::Efectivo {
                *received_cents
            } else {
                None
            },
            created_at: now,
        }],
        PaymentSpec::Mixed { legs } => legs
            .iter()
            .map(|leg| PaymentLeg {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.to_string(),
                metodo: leg.metodo,
                amount_cents: leg.amount_cents,
                reference: leg.reference.clone(),
                received_cents: if leg.metodo == PaymentMethod::Efectivo {
                    leg.received_cents
                } else {
                    None
                },
                created_at: now,
            })
            .collect(),
    }
}

/// Positive stock deltas for every catalog-referenced line of a sale,
/// aggregated per product. Used on cancellation.
pub(crate) fn restock_deltas(items: &[SaleItem]) -> Vec<(String, i64)> {
    let mut by_product: HashMap<&str, i64> = HashMap::new();
    for item in items {
        if let Some(pid) = item.product_id.as_deref() {
            *by_product.entry(pid).or_insert(0) += item.quantity;
        }
    }
    by_product
        .into_iter()
        .map(|(pid, qty)| (pid.to_string(), qty))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use corte_core::Role;

    fn actor(role: Role, tienda: Option<&str>) -> Actor {
        Actor {
            tenant_id: "t1".into(),
            user_id: "u1".into(),
            role,
            tienda_id: tienda.map(String::from),
        }
    }

    #[test]
    fn test_scope_prefers_request_store() {
        let scope = resolve_scope(&actor(Role::Cajero, Some("actor-store")), Some("req-store"));
        assert_eq!(scope.unwrap(), ShiftScope::StoreScoped("req-store".into()));
    }

    #[test]
    fn test_scope_falls_back_to_actor_store() {
        let scope = resolve_scope(&actor(Role::Cajero, Some("actor-store")), None);
        assert_eq!(scope.unwrap(), ShiftScope::StoreScoped("actor-store".into()));
    }

    #[test]
    fn test_admin_without_store_uses_own_shift() {
        let scope = resolve_scope(&actor(Role::Admin, None), None);
        assert_eq!(scope.unwrap(), ShiftScope::UserScoped("u1".into()));
    }

    #[test]
    fn test_cashier_without_store_rejected() {
        let err = resolve_scope(&actor(Role::Cajero, None), None).unwrap_err();
        assert!(matches!(err, EngineError::StoreRequired));
    }

    #[test]
    fn test_single_payment_persists_one_leg() {
        let legs = build_payment_legs(
            "s1",
            &PaymentSpec::Single {
                metodo: PaymentMethod::Efectivo,
                reference: None,
                received_cents: Some(25000),
            },
            20000,
        );
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].amount_cents, 20000);
        assert_eq!(legs[0].received_cents, Some(25000));
        assert_eq!(legs[0].change_cents(), 5000);
    }

    #[test]
    fn test_received_dropped_on_non_cash() {
        let legs = build_payment_legs(
            "s1",
            &PaymentSpec::Single {
                metodo: PaymentMethod::Tarjeta,
                reference: Some("AUTH-1".into()),
                received_cents: Some(25000),
            },
            20000,
        );
        assert_eq!(legs[0].received_cents, None);
    }

    #[test]
    fn test_restock_aggregates_per_product() {
        let now = Utc::now();
        let item = |pid: Option<&str>, qty: i64| SaleItem {
            id: Uuid::new_v4().to_string(),
            sale_id: "s1".into(),
            product_id: pid.map(String::from),
            name: "x".into(),
            quantity: qty,
            unit_price_cents: 100,
            note: None,
            created_at: now,
        };

        let mut deltas = restock_deltas(&[
            item(Some("p1"), 2),
            item(Some("p1"), 1),
            item(None, 5),
            item(Some("p2"), 4),
        ]);
        deltas.sort();
        assert_eq!(deltas, vec![("p1".to_string(), 3), ("p2".to_string(), 4)]);
    }
}
