//! Field parsers for the two source reports.
//!
//! Both parsers take extracted page text in page order and return parsed
//! records plus the record-level issues they hit. A bad record never aborts
//! the scan.

pub mod car;
pub mod receipt;

use cardrecon_recon::model::RecordIssue;

pub use car::parse_car;
pub use receipt::parse_receipts;

/// Records recovered from one source document.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub issues: Vec<RecordIssue>,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self { records: Vec::new(), issues: Vec::new() }
    }
}

/// Collapse runs of whitespace to single spaces.
pub(crate) fn squash(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
