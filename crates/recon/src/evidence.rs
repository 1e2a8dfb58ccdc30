use std::collections::BTreeMap;

use crate::model::{EmployeeKey, EmployeeReconciliation, ReconSummary};

/// Compute summary statistics from the reconciled set.
pub fn compute_summary(employees: &BTreeMap<EmployeeKey, EmployeeReconciliation>) -> ReconSummary {
    let mut flag_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut finished = 0;
    let mut car_only = 0;
    let mut receipt_only = 0;
    let mut receipt_count = 0;
    let mut car_total_cents = 0;
    let mut receipt_total_cents = 0;

    for e in employees.values() {
        for flag in e.flags.iter() {
            *flag_counts.entry(flag.label().to_string()).or_insert(0) += 1;
        }
        if e.is_finished() {
            finished += 1;
        }
        match (e.has_car(), e.receipts.is_empty()) {
            (true, true) => car_only += 1,
            (false, false) => receipt_only += 1,
            _ => {}
        }
        receipt_count += e.receipts.len();
        car_total_cents += e.car_total_cents;
        receipt_total_cents += e.receipt_total_cents;
    }

    ReconSummary {
        total_employees: employees.len(),
        finished,
        unfinished: employees.len() - finished,
        car_only,
        receipt_only,
        receipt_count,
        car_total_cents,
        receipt_total_cents,
        flag_counts,
    }
}
