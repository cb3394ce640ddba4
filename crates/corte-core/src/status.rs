//! # Sale Status Machine
//!
//! Governs the fulfillment/payment state of a sale.
//!
//! ## State Diagram
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  en_preparacion ──► listo_para_envio ──► enviado ──► entregado_y_cobrado│
//! │        │                   │                                 │          │
//! │        │ (manual cancel)   │ (manual cancel)                 │ returns  │
//! │        ▼                   ▼                                 ▼          │
//! │    cancelada ◄──────── cancelada          parcialmente_devuelta         │
//! │                                                  │ (full refund)        │
//! │                                                  ▼                      │
//! │                                              cancelada                  │
//! │                                                                         │
//! │  cancelada is TERMINAL: no operation leaves it.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transitions to `parcialmente_devuelta` and the refund-driven `cancelada`
//! are applied exclusively by the return processor, never by direct user
//! action; [`manual_transition_allowed`] therefore excludes them.

use crate::error::{CoreError, CoreResult};
use crate::types::SaleStatus;

impl SaleStatus {
    /// `cancelada` is the only fully terminal state.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Cancelada)
    }

    /// Whether returns may be recorded against a sale in this state.
    #[inline]
    pub fn is_refundable(&self) -> bool {
        matches!(
            self,
            SaleStatus::EntregadoYCobrado | SaleStatus::ParcialmenteDevuelta
        )
    }

    /// Manual cancellation is only permitted before the goods leave.
    #[inline]
    pub fn allows_manual_cancel(&self) -> bool {
        matches!(
            self,
            SaleStatus::EnPreparacion | SaleStatus::ListoParaEnvio
        )
    }
}

/// Whether a user-driven transition `from -> to` is allowed.
///
/// Forward fulfillment moves one step at a time; cancellation is allowed
/// from the first two states only. Return-driven states are excluded here.
pub fn manual_transition_allowed(from: SaleStatus, to: SaleStatus) -> bool {
    use SaleStatus::*;
    matches!(
        (from, to),
        (EnPreparacion, ListoParaEnvio)
            | (ListoParaEnvio, Enviado)
            | (Enviado, EntregadoYCobrado)
            | (EnPreparacion, Cancelada)
            | (ListoParaEnvio, Cancelada)
    )
}

/// Checks a user-driven transition, with the terminal-state rule surfaced as
/// its own error.
pub fn check_manual_transition(from: SaleStatus, to: SaleStatus) -> CoreResult<()> {
    if from.is_terminal() {
        return Err(CoreError::AlreadyCancelled);
    }
    if !manual_transition_allowed(from, to) {
        return Err(CoreError::InvalidTransition { from, to });
    }
    Ok(())
}

/// The status a sale lands in after a return brings `totalReturned` to
/// `new_total_returned`: cancelled once the full total is refunded,
/// partially returned otherwise.
pub fn status_after_return(total_cents: i64, new_total_returned_cents: i64) -> SaleStatus {
    if new_total_returned_cents >= total_cents {
        SaleStatus::Cancelada
    } else {
        SaleStatus::ParcialmenteDevuelta
    }
}

/// The status a sale lands in after a return rejection decrements
/// `totalReturned`. Restores `entregado_y_cobrado` only when the counter is
/// back to exactly zero; with other partial returns still approved there is
/// deliberately no attempt to infer a "previous" state.
pub fn status_after_rejection(new_total_returned_cents: i64) -> SaleStatus {
    if new_total_returned_cents == 0 {
        SaleStatus::EntregadoYCobrado
    } else {
        SaleStatus::ParcialmenteDevuelta
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use SaleStatus::*;

    #[test]
    fn test_forward_chain() {
        assert!(manual_transition_allowed(EnPreparacion, ListoParaEnvio));
        assert!(manual_transition_allowed(ListoParaEnvio, Enviado));
        assert!(manual_transition_allowed(Enviado, EntregadoYCobrado));
        // No skipping steps
        assert!(!manual_transition_allowed(EnPreparacion, Enviado));
        assert!(!manual_transition_allowed(EnPreparacion, EntregadoYCobrado));
    }

    #[test]
    fn test_manual_cancel_window() {
        assert!(manual_transition_allowed(EnPreparacion, Cancelada));
        assert!(manual_transition_allowed(ListoParaEnvio, Cancelada));
        assert!(!manual_transition_allowed(Enviado, Cancelada));
        assert!(!manual_transition_allowed(EntregadoYCobrado, Cancelada));
        assert!(!manual_transition_allowed(ParcialmenteDevuelta, Cancelada));
    }

    #[test]
    fn test_cancelada_is_terminal() {
        for to in [
            EnPreparacion,
            ListoParaEnvio,
            Enviado,
            EntregadoYCobrado,
            ParcialmenteDevuelta,
            Cancelada,
        ] {
            assert_eq!(
                check_manual_transition(Cancelada, to),
                Err(CoreError::AlreadyCancelled)
            );
        }
    }

    #[test]
    fn test_return_driven_states_not_manual() {
        assert!(!manual_transition_allowed(
            EntregadoYCobrado,
            ParcialmenteDevuelta
        ));
        assert!(!manual_transition_allowed(ParcialmenteDevuelta, Cancelada));
    }

    #[test]
    fn test_status_after_return() {
        assert_eq!(status_after_return(20000, 10000), ParcialmenteDevuelta);
        assert_eq!(status_after_return(20000, 20000), Cancelada);
        assert_eq!(status_after_return(20000, 25000), Cancelada);
    }

    #[test]
    fn test_status_after_rejection() {
        assert_eq!(status_after_rejection(0), EntregadoYCobrado);
        assert_eq!(status_after_rejection(500), ParcialmenteDevuelta);
    }

    #[test]
    fn test_refundable_states() {
        assert!(EntregadoYCobrado.is_refundable());
        assert!(ParcialmenteDevuelta.is_refundable());
        assert!(!EnPreparacion.is_refundable());
        assert!(!Cancelada.is_refundable());
    }
}
