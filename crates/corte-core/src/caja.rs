//! # Cash-Cutoff Math (Corte de Caja)
//!
//! Pure reconciliation math for the cutoff report. The aggregator in
//! corte-engine fetches the window's sales, expenses, and returns; this
//! module turns them into per-method totals and the final cutoff figure.
//!
//! ## Netting Rule
//! Sales enter the report with **net** amounts: each sale's `totalReturned`
//! is subtracted, allocated proportionally across its payment legs (largest
//! remainder, so the legs always re-sum exactly). Returns are therefore
//! reported informationally and NOT subtracted again from the per-method
//! cutoff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{Expense, ExpenseStatus, PaymentMethod, RefundMethod, SaleFull};

// =============================================================================
// Per-Method Totals
// =============================================================================

/// Cent totals broken down by payment method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodTotals {
    pub efectivo_cents: i64,
    pub transferencia_cents: i64,
    pub tarjeta_cents: i64,
}

impl MethodTotals {
    pub fn add(&mut self, metodo: PaymentMethod, cents: i64) {
        match metodo {
            PaymentMethod::Efectivo => self.efectivo_cents += cents,
            PaymentMethod::Transferencia => self.transferencia_cents += cents,
            PaymentMethod::Tarjeta => self.tarjeta_cents += cents,
        }
    }

    pub fn get(&self, metodo: PaymentMethod) -> i64 {
        match metodo {
            PaymentMethod::Efectivo => self.efectivo_cents,
            PaymentMethod::Transferencia => self.transferencia_cents,
            PaymentMethod::Tarjeta => self.tarjeta_cents,
        }
    }

    pub fn total(&self) -> i64 {
        self.efectivo_cents + self.transferencia_cents + self.tarjeta_cents
    }
}

/// Refund totals, which additionally track store credit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnTotals {
    pub efectivo_cents: i64,
    pub transferencia_cents: i64,
    pub tarjeta_cents: i64,
    pub credito_tienda_cents: i64,
}

impl ReturnTotals {
    fn add_method(&mut self, metodo: PaymentMethod, cents: i64) {
        match metodo {
            PaymentMethod::Efectivo => self.efectivo_cents += cents,
            PaymentMethod::Transferencia => self.transferencia_cents += cents,
            PaymentMethod::Tarjeta => self.tarjeta_cents += cents,
        }
    }

    pub fn total(&self) -> i64 {
        self.efectivo_cents + self.transferencia_cents + self.tarjeta_cents
            + self.credito_tienda_cents
    }
}

// =============================================================================
// Inputs & Report
// =============================================================================

/// A return as the report consumes it: the refund method, its amount, and
/// the per-method legs when the refund was mixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnBreakdown {
    pub refund_method: RefundMethod,
    pub refund_amount_cents: i64,
    /// Present only for `mixto` refunds.
    pub legs: Vec<(PaymentMethod, i64)>,
}

/// The cash-cutoff report for a time window and optional store filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorteReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tienda_id: Option<String>,

    /// Net sales per method (returns already subtracted proportionally).
    pub ventas_netas: MethodTotals,
    /// Approved expenses per method.
    pub gastos: MethodTotals,
    /// Per-method cutoff: net sales minus expenses.
    pub corte: MethodTotals,

    pub total_ventas_netas_cents: i64,
    pub total_gastos_cents: i64,
    /// Overall cutoff: total net sales minus total expenses.
    pub corte_final_cents: i64,

    /// Informational refund totals; not subtracted from the cutoff.
    pub devoluciones: ReturnTotals,
    pub total_devoluciones_cents: i64,

    pub num_ventas: usize,
    pub num_devoluciones: usize,
}

// =============================================================================
// Computation
// =============================================================================

/// Computes the cutoff report from pre-fetched inputs.
///
/// `sales` must already be limited to the window/store; only sales in
/// refundable states (`entregado_y_cobrado`, `parcialmente_devuelta`)
/// contribute, and only `aprobado` expenses count. Both filters are applied
/// again here so a broader fetch cannot skew the math.
pub fn compute_corte(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tienda_id: Option<String>,
    sales: &[SaleFull],
    expenses: &[Expense],
    returns: &[ReturnBreakdown],
) -> CorteReport {
    let mut ventas_netas = MethodTotals::default();
    let mut num_ventas = 0;

    for sale in sales {
        if !sale.sale.status.is_refundable() {
            continue;
        }
        num_ventas += 1;

        let weights: Vec<i64> = sale.pagos.iter().map(|p| p.amount_cents).collect();
        let returned_shares =
            Money::from_cents(sale.sale.total_returned_cents).allocate(&weights);

        for (leg, returned) in sale.pagos.iter().zip(returned_shares) {
            ventas_netas.add(leg.metodo, leg.amount_cents - returned);
        }
    }

    let mut gastos = MethodTotals::default();
    for expense in expenses {
        if expense.status == ExpenseStatus::Aprobado {
            gastos.add(expense.metodo, expense.amount_cents);
        }
    }

    let mut devoluciones = ReturnTotals::default();
    for ret in returns {
        match ret.refund_method {
            RefundMethod::Efectivo => devoluciones.add_method(PaymentMethod::Efectivo, ret.refund_amount_cents),
            RefundMethod::Transferencia => {
                devoluciones.add_method(PaymentMethod::Transferencia, ret.refund_amount_cents)
            }
            RefundMethod::Tarjeta => devoluciones.add_method(PaymentMethod::Tarjeta, ret.refund_amount_cents),
            RefundMethod::CreditoTienda => devoluciones.credito_tienda_cents += ret.refund_amount_cents,
            RefundMethod::Mixto => {
                for &(metodo, cents) in &ret.legs {
                    devoluciones.add_method(metodo, cents);
                }
            }
        }
    }

    let mut corte = MethodTotals::default();
    for metodo in PaymentMethod::ALL {
        corte.add(metodo, ventas_netas.get(metodo) - gastos.get(metodo));
    }

    CorteReport {
        start,
        end,
        tienda_id,
        ventas_netas,
        gastos,
        corte,
        total_ventas_netas_cents: ventas_netas.total(),
        total_gastos_cents: gastos.total(),
        corte_final_cents: ventas_netas.total() - gastos.total(),
        devoluciones,
        total_devoluciones_cents: devoluciones.total(),
        num_ventas,
        num_devoluciones: returns.len(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        FulfillmentType, PaymentLeg, PaymentType, Sale, SaleStatus,
    };

    fn sale_with(
        status: SaleStatus,
        total: i64,
        returned: i64,
        legs: Vec<(PaymentMethod, i64)>,
    ) -> SaleFull {
        let now = Utc::now();
        SaleFull {
            sale: Sale {
                id: "s1".into(),
                tenant_id: "t".into(),
                tienda_id: "tienda-1".into(),
                user_id: "u".into(),
                customer_id: None,
                courier_id: None,
                payment_type: if legs.len() > 1 {
                    PaymentType::Mixed
                } else {
                    PaymentType::Single
                },
                fulfillment: FulfillmentType::Mostrador,
                status,
                discount_cents: 0,
                total_cents: total,
                total_returned_cents: returned,
                notes: None,
                created_at: now,
                updated_at: now,
            },
            items: vec![],
            pagos: legs
                .into_iter()
                .enumerate()
                .map(|(n, (metodo, amount_cents))| PaymentLeg {
                    id: format!("p{n}"),
                    sale_id: "s1".into(),
                    metodo,
                    amount_cents,
                    reference: None,
                    received_cents: None,
                    created_at: now,
                })
                .collect(),
        }
    }

    fn expense(metodo: PaymentMethod, cents: i64, status: ExpenseStatus) -> Expense {
        Expense {
            id: "e1".into(),
            tenant_id: "t".into(),
            tienda_id: "tienda-1".into(),
            metodo,
            amount_cents: cents,
            status,
            description: None,
            created_at: Utc::now(),
        }
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let end = Utc::now();
        (end - chrono::Duration::days(1), end)
    }

    #[test]
    fn test_simple_cash_cutoff() {
        let (start, end) = window();
        let sales = vec![sale_with(
            SaleStatus::EntregadoYCobrado,
            20000,
            0,
            vec![(PaymentMethod::Efectivo, 20000)],
        )];
        let expenses = vec![expense(PaymentMethod::Efectivo, 5000, ExpenseStatus::Aprobado)];

        let report = compute_corte(start, end, None, &sales, &expenses, &[]);
        assert_eq!(report.ventas_netas.efectivo_cents, 20000);
        assert_eq!(report.gastos.efectivo_cents, 5000);
        assert_eq!(report.corte.efectivo_cents, 15000);
        assert_eq!(report.corte_final_cents, 15000);
        assert_eq!(report.num_ventas, 1);
    }

    #[test]
    fn test_proportional_netting_across_mixed_legs() {
        let (start, end) = window();
        // 100.00 sale, legs 60 cash / 40 card, 50.00 returned:
        // net cash = 60 - 30 = 30, net card = 40 - 20 = 20
        let sales = vec![sale_with(
            SaleStatus::ParcialmenteDevuelta,
            10000,
            5000,
            vec![
                (PaymentMethod::Efectivo, 6000),
                (PaymentMethod::Tarjeta, 4000),
            ],
        )];

        let report = compute_corte(start, end, None, &sales, &[], &[]);
        assert_eq!(report.ventas_netas.efectivo_cents, 3000);
        assert_eq!(report.ventas_netas.tarjeta_cents, 2000);
        assert_eq!(report.total_ventas_netas_cents, 5000);
    }

    #[test]
    fn test_netted_legs_resum_exactly() {
        let (start, end) = window();
        // An awkward split: 100.01 returned against legs of 33.34/33.34/33.33
        let sales = vec![sale_with(
            SaleStatus::ParcialmenteDevuelta,
            10001,
            10001,
            vec![
                (PaymentMethod::Efectivo, 3334),
                (PaymentMethod::Tarjeta, 3334),
                (PaymentMethod::Transferencia, 3333),
            ],
        )];

        let report = compute_corte(start, end, None, &sales, &[], &[]);
        // Fully returned nets to exactly zero overall
        assert_eq!(report.total_ventas_netas_cents, 0);
    }

    #[test]
    fn test_only_refundable_states_count() {
        let (start, end) = window();
        let sales = vec![
            sale_with(
                SaleStatus::EnPreparacion,
                10000,
                0,
                vec![(PaymentMethod::Efectivo, 10000)],
            ),
            sale_with(
                SaleStatus::Cancelada,
                10000,
                0,
                vec![(PaymentMethod::Efectivo, 10000)],
            ),
        ];

        let report = compute_corte(start, end, None, &sales, &[], &[]);
        assert_eq!(report.total_ventas_netas_cents, 0);
        assert_eq!(report.num_ventas, 0);
    }

    #[test]
    fn test_unapproved_expenses_ignored() {
        let (start, end) = window();
        let expenses = vec![
            expense(PaymentMethod::Efectivo, 5000, ExpenseStatus::Pendiente),
            expense(PaymentMethod::Efectivo, 2000, ExpenseStatus::Rechazado),
            expense(PaymentMethod::Efectivo, 1000, ExpenseStatus::Aprobado),
        ];

        let report = compute_corte(start, end, None, &[], &expenses, &[]);
        assert_eq!(report.total_gastos_cents, 1000);
    }

    #[test]
    fn test_returns_reported_not_subtracted() {
        let (start, end) = window();
        let sales = vec![sale_with(
            SaleStatus::ParcialmenteDevuelta,
            10000,
            4000,
            vec![(PaymentMethod::Efectivo, 10000)],
        )];
        let returns = vec![ReturnBreakdown {
            refund_method: RefundMethod::Efectivo,
            refund_amount_cents: 4000,
            legs: vec![],
        }];

        let report = compute_corte(start, end, None, &sales, &[], &returns);
        // Net sales already subtract the return; the return totals are
        // informational only.
        assert_eq!(report.ventas_netas.efectivo_cents, 6000);
        assert_eq!(report.corte.efectivo_cents, 6000);
        assert_eq!(report.devoluciones.efectivo_cents, 4000);
        assert_eq!(report.total_devoluciones_cents, 4000);
        assert_eq!(report.num_devoluciones, 1);
    }

    #[test]
    fn test_mixed_return_breakdown_by_leg() {
        let (start, end) = window();
        let returns = vec![ReturnBreakdown {
            refund_method: RefundMethod::Mixto,
            refund_amount_cents: 7000,
            legs: vec![
                (PaymentMethod::Efectivo, 3000),
                (PaymentMethod::Tarjeta, 4000),
            ],
        }];

        let report = compute_corte(start, end, None, &[], &[], &returns);
        assert_eq!(report.devoluciones.efectivo_cents, 3000);
        assert_eq!(report.devoluciones.tarjeta_cents, 4000);
    }

    #[test]
    fn test_store_credit_refund_bucket() {
        let (start, end) = window();
        let returns = vec![ReturnBreakdown {
            refund_method: RefundMethod::CreditoTienda,
            refund_amount_cents: 2500,
            legs: vec![],
        }];

        let report = compute_corte(start, end, None, &[], &[], &returns);
        assert_eq!(report.devoluciones.credito_tienda_cents, 2500);
        assert_eq!(report.total_devoluciones_cents, 2500);
    }
}
