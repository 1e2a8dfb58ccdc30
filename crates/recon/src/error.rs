use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty alias, bad date format, etc.).
    ConfigValidation(String),
    /// Source document cannot be opened, is encrypted, or is not a PDF.
    UnreadablePdf { source: String, reason: String },
    /// An amount token could not be parsed as a 2-dp decimal.
    MalformedAmount { employee: String, value: String },
    /// A receipt names an employee with no CAR identity and no alias entry.
    UnresolvableIdentity { name: String },
    /// A recorded page range exceeds the source document's page count.
    PageRangeOutOfBounds { source: String, first: usize, last: usize, page_count: usize },
    /// Report destination cannot be written.
    ReportWriteError { path: String, reason: String },
    /// IO error (file read, directory create, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::UnreadablePdf { source, reason } => {
                write!(f, "unreadable PDF '{source}': {reason}")
            }
            Self::MalformedAmount { employee, value } => {
                write!(f, "employee '{employee}': cannot parse amount '{value}'")
            }
            Self::UnresolvableIdentity { name } => {
                write!(f, "receipt employee '{name}' has no CAR identity or alias")
            }
            Self::PageRangeOutOfBounds { source, first, last, page_count } => write!(
                f,
                "{source}: page range {}-{} exceeds page count {page_count}",
                first + 1,
                last + 1
            ),
            Self::ReportWriteError { path, reason } => {
                write!(f, "cannot write report '{path}': {reason}")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
