//! # corte-db: Database Layer for Corte POS
//!
//! This crate provides database access for the Corte POS transaction core.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Corte POS Data Flow                              │
//! │                                                                         │
//! │  corte-engine processor (e.g. SaleProcessor::create)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     corte-db (THIS CRATE)                       │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐   │    │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │   │    │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │   │    │
//! │  │   │               │    │ ProductRepo    │    │              │   │    │
//! │  │   │ SqlitePool    │◄───│ SaleRepo       │    │ 001_init.sql │   │    │
//! │  │   │ Connection    │    │ DevolucionRepo │    │ ...          │   │    │
//! │  │   │ Management    │    │ TurnoRepo      │    │              │   │    │
//! │  │   └───────────────┘    │ ExpenseRepo    │    └──────────────┘   │    │
//! │  │                        └────────────────┘                       │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                        SQLite Database (WAL)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use corte_db::{Database, DbConfig};
//!
//! let config = DbConfig::new("path/to/corte.db");
//! let db = Database::new(config).await?;
//!
//! let sale = db.sales().get_full("some-id").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::devolucion::DevolucionRepository;
pub use repository::expense::ExpenseRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::turno::TurnoRepository;
