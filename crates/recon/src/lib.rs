//! `cardrecon-recon`: employee card activity / receipt reconciliation engine.
//!
//! Pure engine crate: receives parsed CAR and receipt records, resolves
//! identities, returns flagged per-employee reconciliations.
//! No PDF or filesystem dependencies.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod identity;
pub mod model;
pub mod money;

pub use config::ReconConfig;
pub use engine::{reconcile, run};
pub use error::ReconError;
pub use identity::{AliasTable, IdentityResolver};
pub use model::{
    CarRecord, Classification, Coding, EmployeeKey, EmployeeReconciliation, PageRange,
    ReceiptRecord, ReconInput, ReconResult, ValidationFlag, ValidationFlags,
};
