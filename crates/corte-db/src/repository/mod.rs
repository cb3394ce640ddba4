//! # Repository Layer
//!
//! One repository per aggregate. Repositories own SQL; the concurrency-
//! sensitive invariants (refund ceilings, guarded status transitions,
//! single-open-shift) are enforced here with atomic relative UPDATEs and
//! `rows_affected` checks, in addition to the pure checks in corte-core.

pub mod devolucion;
pub mod expense;
pub mod product;
pub mod sale;
pub mod turno;

pub use devolucion::DevolucionRepository;
pub use expense::ExpenseRepository;
pub use product::ProductRepository;
pub use sale::SaleRepository;
pub use turno::TurnoRepository;
