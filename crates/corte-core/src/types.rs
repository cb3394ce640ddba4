//! # Domain Types
//!
//! Core domain types for the transaction & cash-reconciliation core.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Sale ──┬── SaleItem      (snapshot line items, optional product ref)   │
//! │         └── PaymentLeg    (one leg for single, N legs for mixed)        │
//! │                                                                         │
//! │  Devolucion ──┬── ReturnedItem  (per-item condition drives restock)     │
//! │               └── RefundLeg     (mixed-refund breakdown, leg-capped)    │
//! │                                                                         │
//! │  Turno     cash-drawer shift per store+cashier                          │
//! │  Expense   read-only collaborator, approved ones enter the cutoff       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Compatibility
//! The Spanish enum strings (`en_preparacion`, `efectivo`, `Usado - Bueno`,
//! ...) are the persisted values and must not change; serde and sqlx renames
//! pin them explicitly.
//!
//! ## Dual-Key Identity Pattern
//! Every entity has a UUID v4 `id` used for relations, plus its owning
//! `tenant_id`; all core entities are scoped to one tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Payment Enums
// =============================================================================

/// How a sale was settled: one method, or several at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Single,
    Mixed,
}

/// A settlement method for a sale payment leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Efectivo,
    Transferencia,
    Tarjeta,
}

impl PaymentMethod {
    /// All methods, in reporting order.
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Efectivo,
        PaymentMethod::Transferencia,
        PaymentMethod::Tarjeta,
    ];
}

/// How a refund is paid out. Mirrors [`PaymentMethod`] plus store credit and
/// the mixed marker used when a refund is split across the original legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum RefundMethod {
    Efectivo,
    Transferencia,
    Tarjeta,
    CreditoTienda,
    Mixto,
}

// =============================================================================
// Sale Status & Fulfillment
// =============================================================================

/// The fulfillment/payment state of a sale. See the status machine in
/// [`crate::status`] for the allowed transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Initial state: sale recorded, being prepared.
    EnPreparacion,
    /// Packed and ready to hand off.
    ListoParaEnvio,
    /// Out for delivery.
    Enviado,
    /// Delivered and collected. Terminal for fulfillment, refundable.
    EntregadoYCobrado,
    /// Cancelled. Terminal in every sense.
    Cancelada,
    /// One or more partial returns recorded; still refundable.
    ParcialmenteDevuelta,
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::EnPreparacion
    }
}

/// Where the customer receives the goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentType {
    /// Over the counter.
    Mostrador,
    /// Customer pickup.
    Recoger,
    /// Home delivery. Requires a courier reference.
    Domicilio,
}

// =============================================================================
// Return Enums
// =============================================================================

/// Physical condition of a returned item. `Danado` (damaged) items do not
/// restock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum ItemCondition {
    #[serde(rename = "Nuevo")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Nuevo"))]
    Nuevo,
    #[serde(rename = "Usado - Bueno")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Usado - Bueno"))]
    UsadoBueno,
    #[serde(rename = "Usado - Regular")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Usado - Regular"))]
    UsadoRegular,
    #[serde(rename = "Dañado")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Dañado"))]
    Danado,
}

impl ItemCondition {
    /// Whether a returned item in this condition goes back into stock.
    #[inline]
    pub fn restocks(&self) -> bool {
        !matches!(self, ItemCondition::Danado)
    }
}

/// Lifecycle status of a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    /// Created and effects applied (stock restored, sale updated).
    Procesada,
    /// Reviewed and confirmed by an administrator.
    Aprobada,
    /// Rejected after the fact: all effects reversed.
    Rechazada,
    /// Recorded but effects not yet applied.
    Pendiente,
}

// =============================================================================
// Shift & Expense Enums
// =============================================================================

/// Open/closed state of a cash-drawer shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TurnoEstado {
    Abierto,
    Cerrado,
}

/// Approval state of an expense. Only approved expenses enter the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Aprobado,
    Pendiente,
    Rechazado,
}

// =============================================================================
// Identity Context
// =============================================================================

/// Role of the acting user. Resolved upstream; the core trusts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Cajero,
}

/// The resolved identity context every core operation receives:
/// `(tenantId, userId, role, storeId?)`. Authentication happens upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub tenant_id: String,
    pub user_id: String,
    pub role: Role,
    /// Store the actor is operating in. Administrators may act without one.
    pub tienda_id: Option<String>,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// How the open-shift admission check is scoped.
///
/// A normal cashier is admitted against their store's open shift. An
/// administrator operating without a store context falls back to their own
/// open shift. The two paths are deliberately distinct variants rather than
/// one field with two meanings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShiftScope {
    /// Admission requires an open shift for this store.
    StoreScoped(String),
    /// Admission requires an open shift opened by this user.
    UserScoped(String),
}

// =============================================================================
// Product
// =============================================================================

/// A sellable product. The catalog CRUD lives elsewhere; the core only needs
/// the display fields and the on-hand stock the ledger adjusts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub tenant_id: String,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    /// Current on-hand quantity. May go negative transiently under races;
    /// the admission pre-check is soft.
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// A recorded sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    pub tienda_id: String,
    /// Cashier who recorded the sale.
    pub user_id: String,
    pub customer_id: Option<String>,
    /// Required when `fulfillment` is `domicilio`.
    pub courier_id: Option<String>,
    pub payment_type: PaymentType,
    pub fulfillment: FulfillmentType,
    pub status: SaleStatus,
    /// Absolute discount, not a percentage.
    pub discount_cents: i64,
    /// Sum of line items minus discount.
    pub total_cents: i64,
    /// Running sum of approved refund amounts. `0 <= total_returned <= total`.
    pub total_returned_cents: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Remaining refundable balance.
    #[inline]
    pub fn remaining_refundable(&self) -> Money {
        Money::from_cents(self.total_cents - self.total_returned_cents)
    }
}

/// A line item in a sale. Product data is snapshotted at sale time; the
/// product reference is optional for manually-entered items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: Option<String>,
    /// Display name at time of sale (frozen).
    pub name: String,
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents * self.quantity)
    }
}

/// One payment leg of a sale. Single-payment sales persist exactly one leg;
/// mixed sales persist one per method used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentLeg {
    pub id: String,
    pub sale_id: String,
    pub metodo: PaymentMethod,
    pub amount_cents: i64,
    /// External reference (transfer folio, card auth code).
    pub reference: Option<String>,
    /// Cash legs only: what the customer handed over.
    pub received_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl PaymentLeg {
    /// Change owed on this leg: `max(0, received - amount)` for cash, zero
    /// otherwise.
    pub fn change_cents(&self) -> i64 {
        match (self.metodo, self.received_cents) {
            (PaymentMethod::Efectivo, Some(received)) => (received - self.amount_cents).max(0),
            _ => 0,
        }
    }
}

/// A sale with its line items and payment legs, as read back for the
/// processors and the cutoff aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleFull {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub pagos: Vec<PaymentLeg>,
}

impl SaleFull {
    /// Derived: sum over cash legs of `max(0, received - amount)`.
    pub fn total_change_cents(&self) -> i64 {
        self.pagos.iter().map(|p| p.change_cents()).sum()
    }

    /// Finds the line item a return request targets, by product identity
    /// first, falling back to the frozen display name.
    pub fn find_item(&self, product_id: Option<&str>, name: &str) -> Option<&SaleItem> {
        if let Some(pid) = product_id {
            if let Some(item) = self
                .items
                .iter()
                .find(|i| i.product_id.as_deref() == Some(pid))
            {
                return Some(item);
            }
        }
        self.items.iter().find(|i| i.name == name)
    }
}

// =============================================================================
// Devolucion (Return)
// =============================================================================

/// A return against a sale. Many returns may reference one sale; the
/// cumulative ceilings are enforced at processing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Devolucion {
    pub id: String,
    pub tenant_id: String,
    pub sale_id: String,
    /// Approved refund amount. Capped by the item-level refund value and by
    /// the sale's remaining refundable balance.
    pub refund_amount_cents: i64,
    pub refund_method: RefundMethod,
    pub status: ReturnStatus,
    /// User who processed the return.
    pub user_id: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An item entry within a return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReturnedItem {
    pub id: String,
    pub devolucion_id: String,
    pub product_id: Option<String>,
    pub name: String,
    pub quantity: i64,
    /// Unit price on the original sale line.
    pub original_price_cents: i64,
    /// Unit amount refunded for this item (may be below the original price).
    pub refund_price_cents: i64,
    pub reason: String,
    pub condition: ItemCondition,
}

/// One leg of a mixed refund, capped by the corresponding original payment
/// leg minus amounts already refunded on that leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RefundLeg {
    pub id: String,
    pub devolucion_id: String,
    pub metodo: PaymentMethod,
    pub amount_cents: i64,
}

// =============================================================================
// Turno (Shift)
// =============================================================================

/// A cash-drawer shift for a store + cashier + station.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Turno {
    pub id: String,
    pub tenant_id: String,
    pub tienda_id: String,
    /// Cashier who opened the shift.
    pub user_id: String,
    /// Who closed it. May differ from the opener (auto-close records the
    /// opener here by design).
    pub closed_by: Option<String>,
    pub station: String,
    pub estado: TurnoEstado,
    /// Opening float, required >= 0.
    pub efectivo_inicial_cents: i64,
    /// Computed at close: opening float + cash legs of sales in the shift
    /// window. Never recomputed after close.
    pub efectivo_final_cents: Option<i64>,
    pub notes: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Expense (external collaborator, read-only here)
// =============================================================================

/// An expense record. Only `aprobado` expenses participate in the cutoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Expense {
    pub id: String,
    pub tenant_id: String,
    pub tienda_id: String,
    pub metodo: PaymentMethod,
    pub amount_cents: i64,
    pub status: ExpenseStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Input DTOs
// =============================================================================

/// Payment descriptor on a new-sale request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "paymentType")]
pub enum PaymentSpec {
    #[serde(rename = "single", rename_all = "camelCase")]
    Single {
        metodo: PaymentMethod,
        reference: Option<String>,
        /// Cash only: amount the customer handed over.
        received_cents: Option<i64>,
    },
    #[serde(rename = "mixed", rename_all = "camelCase")]
    Mixed { legs: Vec<NewPaymentLeg> },
}

impl PaymentSpec {
    pub fn payment_type(&self) -> PaymentType {
        match self {
            PaymentSpec::Single { .. } => PaymentType::Single,
            PaymentSpec::Mixed { .. } => PaymentType::Mixed,
        }
    }
}

/// One leg of a mixed payment on a new-sale request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPaymentLeg {
    pub metodo: PaymentMethod,
    pub amount_cents: i64,
    pub reference: Option<String>,
    pub received_cents: Option<i64>,
}

/// A line item on a new-sale request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSaleItem {
    /// Optional: manually-entered items carry no product reference and do
    /// not touch the stock ledger.
    pub product_id: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub note: Option<String>,
}

/// A new-sale request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSale {
    /// Target store. Administrators may omit it and are admitted against
    /// their own open shift instead.
    pub tienda_id: Option<String>,
    pub customer_id: Option<String>,
    pub courier_id: Option<String>,
    pub items: Vec<NewSaleItem>,
    pub discount_cents: i64,
    pub payment: PaymentSpec,
    pub fulfillment: FulfillmentType,
    pub notes: Option<String>,
}

impl NewSale {
    /// Sum of line items before discount.
    pub fn subtotal(&self) -> Money {
        self.items
            .iter()
            .map(|i| Money::from_cents(i.unit_price_cents * i.quantity))
            .sum()
    }

    /// Sum of line items minus the absolute discount.
    pub fn total(&self) -> Money {
        self.subtotal() - Money::from_cents(self.discount_cents)
    }
}

/// An item entry on a new-return request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReturnItem {
    pub product_id: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub refund_price_cents: i64,
    pub reason: String,
    pub condition: ItemCondition,
}

/// One leg of a mixed-refund breakdown on a new-return request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRefundLeg {
    pub metodo: PaymentMethod,
    pub amount_cents: i64,
}

/// A new-return request against a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReturn {
    pub sale_id: String,
    pub items: Vec<NewReturnItem>,
    pub refund_amount_cents: i64,
    pub refund_method: RefundMethod,
    /// Mandatory when the original sale was mixed-payment.
    pub mixed_refunds: Option<Vec<NewRefundLeg>>,
    pub notes: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
