//! # corte-core: Pure Business Logic for Corte POS
//!
//! The heart of the transaction & cash-reconciliation core: every financial
//! rule lives here as a pure function with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Corte POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   corte-engine (Processors)                     │    │
//! │  │   SaleProcessor, ReturnProcessor, ShiftRegistry,                │    │
//! │  │   CajaAggregator, AutoCloseScheduler                            │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │               ★ corte-core (THIS CRATE) ★                       │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │    │
//! │  │   │   types   │  │   money   │  │  status   │  │ validation│   │    │
//! │  │   │ Sale/Turno│  │  Money    │  │  machine  │  │   rules   │   │    │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │    │
//! │  │                    ┌───────────┐                                │    │
//! │  │                    │   caja    │  cutoff math                   │    │
//! │  │                    └───────────┘                                │    │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │                   corte-db (Database Layer)                     │    │
//! │  │            SQLite queries, migrations, repositories             │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: deterministic, same input = same output
//! 2. **Integer Money**: every amount is cents (i64); the wire format's 0.01
//!    tolerance becomes a 1-cent tolerance
//! 3. **Explicit Errors**: typed errors with stable reason codes, never
//!    strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod caja;
pub mod error;
pub mod money;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError, ValidationResult};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default tenant ID for single-tenant deployments. The schema is
/// multi-tenant; runtime tenant resolution plugs in upstream.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Closing note stamped by the auto-close sweep.
pub const AUTO_CLOSE_NOTE: &str = "automatic end-of-day close";
