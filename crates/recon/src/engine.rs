use std::collections::BTreeMap;

use crate::aggregate::group_by_employee;
use crate::classify::{check_page_bounds, classify, evaluate_flags};
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::evidence::compute_summary;
use crate::identity::IdentityResolver;
use crate::model::{
    EmployeeKey, EmployeeReconciliation, ReceiptRecord, ReconInput, ReconMeta, ReconResult,
    RecordIssue,
};

/// Run reconciliation per config. Returns the per-employee set + summary.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    config.validate()?;

    let (employees, unattributed_issues) = reconcile(config, input);
    let summary = compute_summary(&employees);

    log::info!(
        "reconciled {} employees: {} finished, {} unfinished",
        summary.total_employees,
        summary.finished,
        summary.unfinished
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        employees,
        unattributed_issues,
    })
}

/// Merge CAR records and receipts into one reconciliation per employee key.
///
/// Deterministic: the same input always yields the same map, ordered by key,
/// with receipts in source page order. A fresh resolver is built per call so
/// nothing carries over between runs.
pub fn reconcile(
    config: &ReconConfig,
    input: &ReconInput,
) -> (BTreeMap<EmployeeKey, EmployeeReconciliation>, Vec<RecordIssue>) {
    let mut resolver = IdentityResolver::from_config(config);
    let grouped = group_by_employee(input, &mut resolver);

    let mut employees = BTreeMap::new();
    for (key, mut group) in grouped.groups {
        if let Some(bounds) = &input.bounds {
            let out_of_bounds = check_page_bounds(&group, bounds);
            for issue in &out_of_bounds {
                log::warn!("{key}: {}", issue.detail);
            }
            group.issues.extend(out_of_bounds);
        }

        let car_total_cents: i64 = group.car_records.iter().map(|c| c.total_cents).sum();
        let receipt_total_cents = receipt_total(&group.receipts);
        let missing_amount_cents = car_total_cents - receipt_total_cents;

        let flags = evaluate_flags(&group, missing_amount_cents, &config.tolerance);
        let classification = classify(&flags);

        log::debug!(
            "{key}: car={car_total_cents} receipts={receipt_total_cents} ({}) flags=[{}]",
            group.receipts.len(),
            flags.join(", ")
        );

        employees.insert(
            key.clone(),
            EmployeeReconciliation {
                key,
                car_records: group.car_records,
                receipts: group.receipts,
                car_total_cents,
                receipt_total_cents,
                missing_amount_cents,
                flags,
                classification,
                issues: group.issues,
            },
        );
    }

    (employees, grouped.unattributed)
}

/// Sum of receipt amounts in cents.
pub fn receipt_total(receipts: &[ReceiptRecord]) -> i64 {
    receipts.iter().map(|r| r.amount_cents).sum()
}
