//! # corte-engine: Processors for Corte POS
//!
//! The orchestration layer of the transaction & cash-reconciliation core:
//! each processor owns one operational concern, calls the pure rules in
//! corte-core, and persists through corte-db.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     ★ corte-engine (THIS CRATE) ★                       │
//! │                                                                         │
//! │  ┌──────────────┐ ┌───────────────┐ ┌──────────────┐ ┌──────────────┐  │
//! │  │SaleProcessor │ │ReturnProcessor│ │ShiftRegistry │ │CajaAggregator│  │
//! │  │ create sales │ │ process /     │ │ open / close │ │ cutoff report│  │
//! │  │ status moves │ │ approve /     │ │ shifts       │ │ (read-only)  │  │
//! │  │              │ │ reject        │ │              │ │              │  │
//! │  └──────┬───────┘ └───────┬───────┘ └──────┬───────┘ └──────┬───────┘  │
//! │         │                 │                │                │          │
//! │  ┌──────┴─────────────────┴────────────────┴────────────────┴───────┐  │
//! │  │                    AutoCloseScheduler                            │  │
//! │  │        daily 23:59-local sweep over every open shift             │  │
//! │  └──────────────────────────────┬───────────────────────────────────┘  │
//! │                                 │                                      │
//! │            corte-core (rules)   │   corte-db (SQLite)                  │
//! └─────────────────────────────────┴──────────────────────────────────────┘
//! ```
//!
//! Every processor is an owned component constructed from a cloned
//! [`Database`](corte_db::Database) handle. There are no ambient singletons;
//! a test builds its own processors over an in-memory database.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod autoclose;
pub mod caja;
pub mod devolucion;
pub mod error;
pub mod sale;
pub mod turno;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use autoclose::{AutoCloseScheduler, SweepSummary};
pub use caja::CajaAggregator;
pub use devolucion::ReturnProcessor;
pub use error::{EngineError, EngineResult, ErrorKind};
pub use sale::SaleProcessor;
pub use turno::ShiftRegistry;
