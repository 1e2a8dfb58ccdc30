//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | run              | Reconciliation outcome codes             |
//! | 10-19   | input            | Source document and config codes         |
//! | 20-29   | output           | Report / PDF / directory write codes     |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `exit_code_for` or the relevant command

use cardrecon_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success: every employee finished and every output was written.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Run (3-9)
// =============================================================================

/// Run completed; at least one employee is unfinished (carries a flag).
pub const EXIT_UNFINISHED: u8 = 3;

// =============================================================================
// Input (10-19)
// =============================================================================

/// A source PDF cannot be read, is not a PDF, or cannot be decrypted.
pub const EXIT_UNREADABLE_PDF: u8 = 10;

/// Config file cannot be read or parsed.
pub const EXIT_CONFIG_PARSE: u8 = 11;

/// Config parsed but failed validation.
pub const EXIT_CONFIG_INVALID: u8 = 12;

// =============================================================================
// Output (20-29)
// =============================================================================

/// Excel, CSV, JSON or an employee PDF could not be written.
pub const EXIT_OUTPUT_WRITE: u8 = 20;

/// Output directory or file cannot be created.
pub const EXIT_IO: u8 = 21;

/// Map a run-level engine error to its exit code.
pub fn exit_code_for(err: &ReconError) -> u8 {
    match err {
        ReconError::UnreadablePdf { .. } => EXIT_UNREADABLE_PDF,
        ReconError::ConfigParse(_) => EXIT_CONFIG_PARSE,
        ReconError::ConfigValidation(_) => EXIT_CONFIG_INVALID,
        ReconError::ReportWriteError { .. } => EXIT_OUTPUT_WRITE,
        ReconError::Io(_) => EXIT_IO,
        // Record-level errors never reach the CLI as run failures.
        ReconError::MalformedAmount { .. }
        | ReconError::UnresolvableIdentity { .. }
        | ReconError::PageRangeOutOfBounds { .. } => EXIT_ERROR,
    }
}
