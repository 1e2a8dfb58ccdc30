use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Canonical cross-document employee identity.
///
/// Ordering is (name, employee_id), which is the iteration order of every
/// keyed collection in a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EmployeeKey {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<u32>,
}

impl EmployeeKey {
    pub fn new(name: impl Into<String>, employee_id: Option<u32>) -> Self {
        Self { name: name.into(), employee_id }
    }

    /// Deterministic file stem: `NAME_ID` or `NAME`, restricted to `[A-Z0-9_]`.
    pub fn file_stem(&self) -> String {
        let name: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        let name = if name.is_empty() { "UNKNOWN".to_string() } else { name };
        match self.employee_id {
            Some(id) => format!("{name}_{id}"),
            None => name,
        }
    }
}

impl fmt::Display for EmployeeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.employee_id {
            Some(id) => write!(f, "{} ({})", self.name, id),
            None => write!(f, "{}", self.name),
        }
    }
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// Inclusive, 0-based page range within one source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PageRange {
    pub first: usize,
    pub last: usize,
}

impl PageRange {
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last: last.max(first) }
    }

    pub fn single(page: usize) -> Self {
        Self { first: page, last: page }
    }

    pub fn contains(&self, page: usize) -> bool {
        page >= self.first && page <= self.last
    }

    pub fn pages(&self) -> impl Iterator<Item = usize> {
        self.first..=self.last
    }

    pub fn fits(&self, page_count: usize) -> bool {
        self.last < page_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceDoc {
    Car,
    Receipts,
}

impl fmt::Display for SourceDoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Car => write!(f, "CAR"),
            Self::Receipts => write!(f, "Receipt Report"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsed records
// ---------------------------------------------------------------------------

/// One cardholder block from the CAR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarRecord {
    pub employee_id: u32,
    pub display_name: String,
    pub card_number: String,
    pub total_cents: i64,
    pub pages: PageRange,
}

impl CarRecord {
    /// Last four card digits, if the card number ends in four digits.
    pub fn card_last4(&self) -> Option<&str> {
        let digits = self.card_number.trim();
        let start = digits.len().checked_sub(4)?;
        let tail = digits.get(start..)?;
        tail.chars().all(|c| c.is_ascii_digit()).then_some(tail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ReceiptDate {
    Parsed(NaiveDate),
    /// Raw text kept when the fixed date format did not match.
    Unparsed(String),
}

impl ReceiptDate {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Parsed(d) => Some(*d),
            Self::Unparsed(_) => None,
        }
    }

    pub fn is_unparsed(&self) -> bool {
        matches!(self, Self::Unparsed(_))
    }
}

impl fmt::Display for ReceiptDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed(d) => write!(f, "{}", d.format("%m/%d/%Y")),
            Self::Unparsed(raw) => write!(f, "{raw}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobCoding {
    pub job: String,
    pub phase: String,
    pub cost_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlCoding {
    pub account: String,
    pub description: String,
}

/// Job-cost or general-ledger classification of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Coding {
    Job(JobCoding),
    Gl(GlCoding),
    /// Both variants populated on one transaction.
    Conflicting { job: JobCoding, gl: GlCoding },
    Missing,
}

impl Coding {
    pub fn from_parts(job: Option<JobCoding>, gl: Option<GlCoding>) -> Self {
        match (job, gl) {
            (Some(job), Some(gl)) => Self::Conflicting { job, gl },
            (Some(job), None) => Self::Job(job),
            (None, Some(gl)) => Self::Gl(gl),
            (None, None) => Self::Missing,
        }
    }

    /// Accounting pay-type code: 2 for job cost, 1 for GL.
    ///
    /// Conflicting coding routes to the job columns.
    pub fn pay_type(&self) -> Option<u8> {
        match self {
            Self::Job(_) | Self::Conflicting { .. } => Some(2),
            Self::Gl(_) => Some(1),
            Self::Missing => None,
        }
    }

    pub fn job(&self) -> Option<&JobCoding> {
        match self {
            Self::Job(job) | Self::Conflicting { job, .. } => Some(job),
            _ => None,
        }
    }

    pub fn gl(&self) -> Option<&GlCoding> {
        match self {
            Self::Gl(gl) => Some(gl),
            _ => None,
        }
    }
}

/// One transaction block from the Receipt Report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptRecord {
    pub transaction_id: String,
    pub employee_name: String,
    pub expense_type: String,
    pub date: ReceiptDate,
    pub amount_cents: i64,
    pub purpose: String,
    pub merchant_name: String,
    pub merchant_address: String,
    pub coding: Coding,
    pub has_attachment: bool,
    /// Page the block starts on.
    pub page: usize,
    /// Block page plus any receipt-image pages that follow it.
    pub pages: PageRange,
}

impl ReceiptRecord {
    /// Problems carried by this receipt alone, in report order.
    pub fn issue_labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        match self.coding {
            Coding::Missing => labels.push(ValidationFlag::MissingCodingInfo.label()),
            Coding::Conflicting { .. } => labels.push(ValidationFlag::ConflictingCoding.label()),
            _ => {}
        }
        if !self.has_attachment {
            labels.push(ValidationFlag::MissingReceipt.label());
        }
        if self.date.is_unparsed() {
            labels.push("unparsed_date");
        }
        labels
    }
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationFlag {
    MissingCodingInfo,
    MissingReceipt,
    MissingAllReceipts,
    TotalMismatch,
    ConflictingCoding,
    MalformedAmount,
    UnresolvedIdentity,
    PageRangeOutOfBounds,
}

impl ValidationFlag {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingCodingInfo => "missing_coding_info",
            Self::MissingReceipt => "missing_receipt",
            Self::MissingAllReceipts => "missing_all_receipts",
            Self::TotalMismatch => "total_mismatch",
            Self::ConflictingCoding => "conflicting_coding",
            Self::MalformedAmount => "malformed_amount",
            Self::UnresolvedIdentity => "unresolved_identity",
            Self::PageRangeOutOfBounds => "page_range_out_of_bounds",
        }
    }

    /// Flag raised by a record-level error, if the error is record-level.
    pub fn for_error(err: &ReconError) -> Option<Self> {
        match err {
            ReconError::MalformedAmount { .. } => Some(Self::MalformedAmount),
            ReconError::UnresolvableIdentity { .. } => Some(Self::UnresolvedIdentity),
            ReconError::PageRangeOutOfBounds { .. } => Some(Self::PageRangeOutOfBounds),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Set of active flags. Serializes as a list of labels, never a scalar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationFlags(BTreeSet<ValidationFlag>);

impl ValidationFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, flag: ValidationFlag, active: bool) {
        if active {
            self.0.insert(flag);
        }
    }

    pub fn insert(&mut self, flag: ValidationFlag) {
        self.0.insert(flag);
    }

    pub fn contains(&self, flag: ValidationFlag) -> bool {
        self.0.contains(&flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ValidationFlag> + '_ {
        self.0.iter().copied()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.0.iter().map(|f| f.label()).collect()
    }

    /// Delimited label list for single-cell renderings.
    pub fn join(&self, sep: &str) -> String {
        self.labels().join(sep)
    }
}

impl FromIterator<ValidationFlag> for ValidationFlags {
    fn from_iter<I: IntoIterator<Item = ValidationFlag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Finished,
    Unfinished,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished => write!(f, "finished"),
            Self::Unfinished => write!(f, "unfinished"),
        }
    }
}

/// A record-level failure attributed to an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordIssue {
    pub source: SourceDoc,
    pub raw_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<u32>,
    pub page: usize,
    /// Source pages of the rejected record, so they still reach the
    /// employee's combined PDF.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<PageRange>,
    pub flag: ValidationFlag,
    pub detail: String,
}

impl RecordIssue {
    /// Returns `None` for run-level errors, which never become issues.
    pub fn from_error(
        source: SourceDoc,
        raw_name: &str,
        employee_id: Option<u32>,
        page: usize,
        err: &ReconError,
    ) -> Option<Self> {
        let flag = ValidationFlag::for_error(err)?;
        Some(Self {
            source,
            raw_name: raw_name.to_string(),
            employee_id,
            page,
            pages: None,
            flag,
            detail: err.to_string(),
        })
    }

    pub fn with_pages(mut self, pages: PageRange) -> Self {
        self.pages = Some(pages);
        self
    }
}

// ---------------------------------------------------------------------------
// Engine input
// ---------------------------------------------------------------------------

/// Page counts of the two source documents, for range bounds checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceBounds {
    pub car_pages: usize,
    pub receipt_pages: usize,
}

/// Parsed records from both sources, before identity resolution.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub car: Vec<CarRecord>,
    pub receipts: Vec<ReceiptRecord>,
    pub issues: Vec<RecordIssue>,
    /// Unknown bounds skip the page range check.
    pub bounds: Option<SourceBounds>,
}

// ---------------------------------------------------------------------------
// Engine output
// ---------------------------------------------------------------------------

/// One employee's merged CAR + receipt state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeReconciliation {
    pub key: EmployeeKey,
    /// Usually zero or one; repeated CAR headers accumulate here.
    pub car_records: Vec<CarRecord>,
    pub receipts: Vec<ReceiptRecord>,
    pub car_total_cents: i64,
    pub receipt_total_cents: i64,
    pub missing_amount_cents: i64,
    pub flags: ValidationFlags,
    pub classification: Classification,
    pub issues: Vec<RecordIssue>,
}

impl EmployeeReconciliation {
    pub fn has_car(&self) -> bool {
        !self.car_records.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.classification == Classification::Finished
    }

    /// Display name from the CAR when present, else the canonical name.
    pub fn display_name(&self) -> &str {
        self.car_records
            .first()
            .map(|c| c.display_name.as_str())
            .or_else(|| self.receipts.first().map(|r| r.employee_name.as_str()))
            .unwrap_or(&self.key.name)
    }

    /// Card number of the first CAR block, for invoice synthesis.
    pub fn card_last4(&self) -> Option<&str> {
        self.car_records.iter().find_map(|c| c.card_last4())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconSummary {
    pub total_employees: usize,
    pub finished: usize,
    pub unfinished: usize,
    pub car_only: usize,
    pub receipt_only: usize,
    pub receipt_count: usize,
    pub car_total_cents: i64,
    pub receipt_total_cents: i64,
    pub flag_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    #[serde(serialize_with = "serialize_employees")]
    pub employees: BTreeMap<EmployeeKey, EmployeeReconciliation>,
    /// Issues that could not be attributed to any employee.
    pub unattributed_issues: Vec<RecordIssue>,
}

impl ReconResult {
    pub fn get(&self, key: &EmployeeKey) -> Option<&EmployeeReconciliation> {
        self.employees.get(key)
    }

    pub fn unfinished(&self) -> impl Iterator<Item = &EmployeeReconciliation> {
        self.employees.values().filter(|e| !e.is_finished())
    }
}

/// JSON object keys must be strings, so the map is emitted in key order as a list.
fn serialize_employees<S: Serializer>(
    employees: &BTreeMap<EmployeeKey, EmployeeReconciliation>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(employees.values())
}
