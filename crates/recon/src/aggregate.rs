use std::collections::{BTreeMap, HashSet};

use crate::identity::IdentityResolver;
use crate::model::{
    CarRecord, EmployeeKey, ReceiptRecord, ReconInput, RecordIssue, SourceDoc,
};

/// Everything observed for one employee key, before flag evaluation.
#[derive(Debug, Clone, Default)]
pub struct EmployeeGroup {
    pub car_records: Vec<CarRecord>,
    pub receipts: Vec<ReceiptRecord>,
    pub issues: Vec<RecordIssue>,
}

/// Groups keyed by employee, plus issues that carry no usable name.
#[derive(Debug, Default)]
pub struct Grouped {
    pub groups: BTreeMap<EmployeeKey, EmployeeGroup>,
    pub unattributed: Vec<RecordIssue>,
}

/// Resolve every record to an employee key and group them.
///
/// CAR identities are registered first so receipts can join against them.
/// Every distinct key from either source gets a group; nothing is dropped
/// except exact duplicate transaction IDs, which would double-count.
pub fn group_by_employee(input: &ReconInput, resolver: &mut IdentityResolver) -> Grouped {
    let mut grouped = Grouped::default();

    for car in &input.car {
        let key = resolver.register_car(car);
        grouped.groups.entry(key).or_default().car_records.push(car.clone());
    }

    // Failed CAR headers still establish an identity.
    for issue in &input.issues {
        if issue.source == SourceDoc::Car {
            if let Some(id) = issue.employee_id {
                let key = resolver.register(&issue.raw_name, id);
                grouped.groups.entry(key).or_default();
            }
        }
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for receipt in &input.receipts {
        if !seen_ids.insert(receipt.transaction_id.as_str()) {
            log::warn!(
                "duplicate transaction ID {} on page {}; keeping the first occurrence",
                receipt.transaction_id,
                receipt.page + 1
            );
            continue;
        }

        let key = match resolver.resolve_receipt(&receipt.employee_name) {
            Ok(key) => key,
            Err(unresolved) => {
                log::warn!("{}; keeping under {}", unresolved.error, unresolved.key);
                let group = grouped.groups.entry(unresolved.key.clone()).or_default();
                let detail = unresolved.error.to_string();
                let already_flagged = group
                    .issues
                    .iter()
                    .any(|i| i.source == SourceDoc::Receipts && i.detail == detail);
                if !already_flagged {
                    if let Some(issue) = RecordIssue::from_error(
                        SourceDoc::Receipts,
                        &receipt.employee_name,
                        None,
                        receipt.page,
                        &unresolved.error,
                    ) {
                        group.issues.push(issue);
                    }
                }
                unresolved.key
            }
        };
        grouped.groups.entry(key).or_default().receipts.push(receipt.clone());
    }

    for issue in &input.issues {
        if issue.raw_name.trim().is_empty() {
            grouped.unattributed.push(issue.clone());
            continue;
        }
        let key = match (issue.source, issue.employee_id) {
            (SourceDoc::Car, Some(id)) => {
                EmployeeKey::new(resolver.canonical_name(&issue.raw_name), Some(id))
            }
            _ => match resolver.resolve_receipt(&issue.raw_name) {
                Ok(key) => key,
                Err(unresolved) => unresolved.key,
            },
        };
        grouped.groups.entry(key).or_default().issues.push(issue.clone());
    }

    for group in grouped.groups.values_mut() {
        group.car_records.sort_by_key(|c| c.pages.first);
        group
            .receipts
            .sort_by(|a, b| (a.page, &a.transaction_id).cmp(&(b.page, &b.transaction_id)));
        group.issues.sort_by(|a, b| (a.source, a.page).cmp(&(b.source, b.page)));
    }

    grouped
}
