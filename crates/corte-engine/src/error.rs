//! # Engine Error Types
//!
//! The caller-facing error taxonomy: every rejected operation maps to one of
//! four kinds — validation, not-found, conflict, storage — and carries a
//! stable machine-readable reason code.
//!
//! ## Error Flow
//! ```text
//! ValidationError ─┐
//! CoreError ───────┼─► EngineError ─► caller (kind + code + message)
//! DbError ─────────┘
//! ```

use thiserror::Error;

use corte_core::{CoreError, SaleStatus, ValidationError};
use corte_db::DbError;

// =============================================================================
// Error Kind
// =============================================================================

/// The four top-level classes of rejection. Validation and not-found are
/// never retried; conflicts reflect a state the caller must re-read;
/// storage errors are transient and may be retried by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Storage,
}

// =============================================================================
// Engine Error
// =============================================================================

/// Errors surfaced by the processors, registry, aggregator, and scheduler.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or out-of-range input, rejected before any mutation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Soft stock pre-check failure: the catalog shows less on hand than
    /// the sale requests. A race can still drive stock negative after the
    /// check passes; that is accepted, not corrected.
    #[error("insufficient stock for '{name}': requested {requested}, available {available}")]
    InsufficientStock {
        name: String,
        requested: i64,
        available: i64,
    },

    /// Neither the request nor the actor names a store, and the actor is
    /// not an administrator with an open shift of their own.
    #[error("a store is required for this operation")]
    StoreRequired,

    /// Unknown sale/return/shift id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Sale admission requires an open shift for the resolved scope.
    #[error("no open shift for {scope}")]
    NoOpenShift { scope: String },

    /// A shift is already open for this store or cashier.
    #[error("shift already open: {id}")]
    ShiftAlreadyOpen { id: String },

    /// The shift was already closed; its final cash figure is never
    /// recomputed.
    #[error("shift already closed: {id}")]
    ShiftAlreadyClosed { id: String },

    /// The status machine rejects the transition.
    #[error("sale cannot transition from {from:?} to {to:?}")]
    InvalidTransition { from: SaleStatus, to: SaleStatus },

    /// `cancelada` is terminal.
    #[error("sale is cancelada; no further transitions allowed")]
    AlreadyCancelled,

    /// Returns are only accepted against refundable sales.
    #[error("sale with status {status:?} is not refundable")]
    SaleNotRefundable { status: SaleStatus },

    /// The refund would exceed the sale's remaining refundable balance.
    #[error("refund {requested_cents} exceeds remaining refundable balance {balance_cents}")]
    RefundExceedsBalance {
        balance_cents: i64,
        requested_cents: i64,
    },

    /// The return was already rejected; its effects were reversed once.
    #[error("return already rejected: {id}")]
    ReturnAlreadyRejected { id: String },

    /// A concurrent writer changed the row between read and write; the
    /// caller should re-read and re-decide.
    #[error("{entity} {id} was modified concurrently")]
    ConcurrentUpdate { entity: &'static str, id: String },

    /// Transient persistence failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// The top-level class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_)
            | EngineError::InsufficientStock { .. }
            | EngineError::StoreRequired
            | EngineError::InvalidTransition { .. } => ErrorKind::Validation,

            EngineError::NotFound { .. } => ErrorKind::NotFound,

            EngineError::NoOpenShift { .. }
            | EngineError::ShiftAlreadyOpen { .. }
            | EngineError::ShiftAlreadyClosed { .. }
            | EngineError::AlreadyCancelled
            | EngineError::SaleNotRefundable { .. }
            | EngineError::RefundExceedsBalance { .. }
            | EngineError::ReturnAlreadyRejected { .. }
            | EngineError::ConcurrentUpdate { .. } => ErrorKind::Conflict,

            EngineError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(v) => v.code(),
            EngineError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            EngineError::StoreRequired => "STORE_REQUIRED",
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::NoOpenShift { .. } => "NO_OPEN_SHIFT",
            EngineError::ShiftAlreadyOpen { .. } => "SHIFT_ALREADY_OPEN",
            EngineError::ShiftAlreadyClosed { .. } => "SHIFT_ALREADY_CLOSED",
            EngineError::InvalidTransition { .. } => "INVALID_TRANSITION",
            EngineError::AlreadyCancelled => "ALREADY_CANCELLED",
            EngineError::SaleNotRefundable { .. } => "SALE_NOT_REFUNDABLE",
            EngineError::RefundExceedsBalance { .. } => "REFUND_EXCEEDS_BALANCE",
            EngineError::ReturnAlreadyRejected { .. } => "RETURN_ALREADY_REJECTED",
            EngineError::ConcurrentUpdate { .. } => "CONCURRENT_UPDATE",
            EngineError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => EngineError::Validation(v),
            CoreError::InvalidTransition { from, to } => EngineError::InvalidTransition { from, to },
            CoreError::AlreadyCancelled => EngineError::AlreadyCancelled,
            CoreError::SaleNotRefundable { status } => EngineError::SaleNotRefundable { status },
            CoreError::RefundExceedsBalance {
                balance_cents,
                requested_cents,
            } => EngineError::RefundExceedsBalance {
                balance_cents,
                requested_cents,
            },
        }
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::Storage(format!(
                "unexpected missing row: {} {}",
                entity, id
            )),
            other => EngineError::Storage(other.to_string()),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            EngineError::Validation(ValidationError::EmptyItems).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            EngineError::not_found("Sale", "x").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            EngineError::RefundExceedsBalance {
                balance_cents: 0,
                requested_cents: 1
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            EngineError::Storage("disk full".into()).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn test_validation_codes_pass_through() {
        let err: EngineError = ValidationError::CourierRequired.into();
        assert_eq!(err.code(), "COURIER_REQUIRED");
    }

    #[test]
    fn test_core_error_mapping() {
        let err: EngineError = CoreError::AlreadyCancelled.into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.code(), "ALREADY_CANCELLED");
    }
}
