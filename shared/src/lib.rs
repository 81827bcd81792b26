//! Shared domain types for Stokku
//!
//! Models, the stock ledger arithmetic, the item lifecycle state machine and
//! pagination math. Nothing in this crate performs I/O; the backend persists
//! what these types describe.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
