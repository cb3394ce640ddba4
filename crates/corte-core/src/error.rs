//! # Error Types
//!
//! Domain errors for corte-core.
//!
//! ## Error Flow
//! ```text
//! ValidationError → CoreError → EngineError (corte-engine) → caller
//! ```
//!
//! ## Design Principles
//! 1. `thiserror` derive macros, never manual impls
//! 2. Context in every message (amounts, item names, statuses)
//! 3. Errors are enum variants, never strings
//! 4. Every variant carries a stable machine-readable reason code via
//!    `code()` so rejected operations surface the same identifier across
//!    releases

use thiserror::Error;

use crate::types::{RefundMethod, SaleStatus};

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation failures: malformed or out-of-range requests, detected
/// before any mutation. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A sale must have at least one line item.
    #[error("sale has no line items")]
    EmptyItems,

    /// Line quantities must be strictly positive.
    #[error("item '{name}' has non-positive quantity {quantity}")]
    NonPositiveQuantity { name: String, quantity: i64 },

    /// Line prices must be non-negative.
    #[error("item '{name}' has negative unit price")]
    NegativePrice { name: String },

    /// Discount must be between zero and the items subtotal.
    #[error("discount {discount_cents} out of range (subtotal {subtotal_cents})")]
    InvalidDiscount {
        discount_cents: i64,
        subtotal_cents: i64,
    },

    /// A mixed payment needs at least one leg.
    #[error("mixed payment has no legs")]
    MixedLegsEmpty,

    /// Every payment leg amount must be strictly positive.
    #[error("payment leg amount must be positive")]
    NonPositiveLegAmount,

    /// Mixed legs must sum to the sale total within one cent.
    #[error("mixed payment legs sum to {legs_cents}, expected total {total_cents}")]
    MixedSumMismatch { legs_cents: i64, total_cents: i64 },

    /// Delivery fulfillment requires a courier.
    #[error("domicilio fulfillment requires a courier")]
    CourierRequired,

    /// Refund amounts must be strictly positive.
    #[error("refund amount must be positive")]
    NonPositiveRefund,

    /// A return must list at least one item.
    #[error("return has no items")]
    EmptyReturnItems,

    /// Refund method incompatible with the original payment.
    #[error("refund method {requested:?} not allowed for this sale's payment")]
    RefundMethodMismatch { requested: RefundMethod },

    /// Mixed-payment sales require a mixed-refund breakdown.
    #[error("mixed-payment sale requires a mixedRefunds breakdown")]
    MixedRefundsRequired,

    /// A refund leg cannot exceed what was originally paid (minus prior
    /// refunds) on that method.
    #[error("refund leg for {metodo} of {requested_cents} exceeds remaining {available_cents} on that leg")]
    RefundLegExceedsOriginal {
        metodo: String,
        requested_cents: i64,
        available_cents: i64,
    },

    /// Mixed-refund legs must sum to the refund amount within one cent.
    #[error("mixed refund legs sum to {legs_cents}, expected refund {refund_cents}")]
    RefundLegSumMismatch { legs_cents: i64, refund_cents: i64 },

    /// Returned item does not match any line on the original sale.
    #[error("returned item '{name}' is not on the original sale")]
    ItemNotOnSale { name: String },

    /// Cumulative returned quantity would exceed what was sold.
    #[error("return of {requested} x '{name}' exceeds sold quantity {sold} (already returned {already_returned})")]
    QuantityExceedsSold {
        name: String,
        sold: i64,
        already_returned: i64,
        requested: i64,
    },

    /// The requested refund exceeds the item-level refund value.
    #[error("refund {refund_cents} exceeds item-level refund value {item_value_cents}")]
    RefundExceedsItemValue {
        item_value_cents: i64,
        refund_cents: i64,
    },

    /// Opening float for a shift must be >= 0.
    #[error("opening float must be >= 0")]
    NegativeOpeningFloat,
}

impl ValidationError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyItems => "EMPTY_ITEMS",
            ValidationError::NonPositiveQuantity { .. } => "NON_POSITIVE_QUANTITY",
            ValidationError::NegativePrice { .. } => "NEGATIVE_PRICE",
            ValidationError::InvalidDiscount { .. } => "INVALID_DISCOUNT",
            ValidationError::MixedLegsEmpty => "MIXED_LEGS_EMPTY",
            ValidationError::NonPositiveLegAmount => "NON_POSITIVE_LEG_AMOUNT",
            ValidationError::MixedSumMismatch { .. } => "MIXED_SUM_MISMATCH",
            ValidationError::CourierRequired => "COURIER_REQUIRED",
            ValidationError::NonPositiveRefund => "NON_POSITIVE_REFUND",
            ValidationError::EmptyReturnItems => "EMPTY_RETURN_ITEMS",
            ValidationError::RefundMethodMismatch { .. } => "REFUND_METHOD_MISMATCH",
            ValidationError::MixedRefundsRequired => "MIXED_REFUNDS_REQUIRED",
            ValidationError::RefundLegExceedsOriginal { .. } => "REFUND_LEG_EXCEEDS_ORIGINAL",
            ValidationError::RefundLegSumMismatch { .. } => "REFUND_LEG_SUM_MISMATCH",
            ValidationError::ItemNotOnSale { .. } => "ITEM_NOT_ON_SALE",
            ValidationError::QuantityExceedsSold { .. } => "QUANTITY_EXCEEDS_SOLD",
            ValidationError::RefundExceedsItemValue { .. } => "REFUND_EXCEEDS_ITEM_VALUE",
            ValidationError::NegativeOpeningFloat => "NEGATIVE_OPENING_FLOAT",
        }
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Business-rule violations above plain input validation: state-machine
/// conflicts and financial ceilings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Input validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The status machine rejects the transition.
    #[error("sale cannot transition from {from:?} to {to:?}")]
    InvalidTransition { from: SaleStatus, to: SaleStatus },

    /// `cancelada` is terminal: nothing moves a sale out of it.
    #[error("sale is cancelada; no further transitions allowed")]
    AlreadyCancelled,

    /// Returns are only accepted against refundable sales.
    #[error("sale with status {status:?} is not refundable")]
    SaleNotRefundable { status: SaleStatus },

    /// The refund would push `totalReturned` past the sale total.
    #[error("refund {requested_cents} exceeds remaining refundable balance {balance_cents}")]
    RefundExceedsBalance {
        balance_cents: i64,
        requested_cents: i64,
    },
}

impl CoreError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(v) => v.code(),
            CoreError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CoreError::AlreadyCancelled => "ALREADY_CANCELLED",
            CoreError::SaleNotRefundable { .. } => "SALE_NOT_REFUNDABLE",
            CoreError::RefundExceedsBalance { .. } => "REFUND_EXCEEDS_BALANCE",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================
