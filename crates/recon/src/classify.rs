use crate::aggregate::EmployeeGroup;
use crate::config::ToleranceConfig;
use crate::error::ReconError;
use crate::model::{
    Classification, Coding, RecordIssue, SourceBounds, SourceDoc, ValidationFlag, ValidationFlags,
};

/// Evaluate every flag for one employee. All checks are independent and
/// run unconditionally; none short-circuits another.
pub fn evaluate_flags(
    group: &EmployeeGroup,
    missing_amount_cents: i64,
    tolerance: &ToleranceConfig,
) -> ValidationFlags {
    let mut flags = ValidationFlags::new();

    flags.set(
        ValidationFlag::MissingCodingInfo,
        group.receipts.iter().any(|r| r.coding == Coding::Missing),
    );
    flags.set(
        ValidationFlag::MissingReceipt,
        group.receipts.iter().any(|r| !r.has_attachment),
    );
    flags.set(
        ValidationFlag::MissingAllReceipts,
        !group.car_records.is_empty() && group.receipts.is_empty(),
    );
    flags.set(
        ValidationFlag::TotalMismatch,
        missing_amount_cents.abs() > tolerance.amount_cents,
    );
    flags.set(
        ValidationFlag::ConflictingCoding,
        group.receipts.iter().any(|r| matches!(r.coding, Coding::Conflicting { .. })),
    );

    for issue in &group.issues {
        flags.insert(issue.flag);
    }

    flags
}

/// Finished iff no flag is set.
pub fn classify(flags: &ValidationFlags) -> Classification {
    if flags.is_empty() {
        Classification::Finished
    } else {
        Classification::Unfinished
    }
}

/// Check recorded page ranges against source page counts.
///
/// Parser drift shows up here as out-of-range pages; each offending range
/// becomes a record-level issue instead of failing the run.
pub fn check_page_bounds(group: &EmployeeGroup, bounds: &SourceBounds) -> Vec<RecordIssue> {
    let mut issues = Vec::new();

    for car in &group.car_records {
        if !car.pages.fits(bounds.car_pages) {
            let err = ReconError::PageRangeOutOfBounds {
                source: SourceDoc::Car.to_string(),
                first: car.pages.first,
                last: car.pages.last,
                page_count: bounds.car_pages,
            };
            issues.extend(RecordIssue::from_error(
                SourceDoc::Car,
                &car.display_name,
                Some(car.employee_id),
                car.pages.first,
                &err,
            ));
        }
    }

    for receipt in &group.receipts {
        if !receipt.pages.fits(bounds.receipt_pages) {
            let err = ReconError::PageRangeOutOfBounds {
                source: SourceDoc::Receipts.to_string(),
                first: receipt.pages.first,
                last: receipt.pages.last,
                page_count: bounds.receipt_pages,
            };
            issues.extend(RecordIssue::from_error(
                SourceDoc::Receipts,
                &receipt.employee_name,
                None,
                receipt.page,
                &err,
            ));
        }
    }

    for issue in &group.issues {
        let Some(pages) = issue.pages else { continue };
        let page_count = match issue.source {
            SourceDoc::Car => bounds.car_pages,
            SourceDoc::Receipts => bounds.receipt_pages,
        };
        if !pages.fits(page_count) {
            let err = ReconError::PageRangeOutOfBounds {
                source: issue.source.to_string(),
                first: pages.first,
                last: pages.last,
                page_count,
            };
            issues.extend(RecordIssue::from_error(
                issue.source,
                &issue.raw_name,
                issue.employee_id,
                pages.first,
                &err,
            ));
        }
    }

    issues
}
