// Accounting import CSV: one row per receipt in a fixed column layout.

use std::collections::BTreeMap;
use std::path::Path;

use cardrecon_recon::config::ExportConfig;
use cardrecon_recon::model::{EmployeeKey, EmployeeReconciliation, ReceiptRecord};
use cardrecon_recon::money::format_cents;
use cardrecon_recon::ReconError;

use crate::publish::publish_atomic;

pub const HEADERS: [&str; 15] = [
    "Transaction ID",
    "Date",
    "Amount",
    "Name",
    "Vendor Code",
    "Invoice",
    "Description",
    "Job",
    "Phase",
    "Cost Type",
    "GL Account",
    "GL Description",
    "UM",
    "Tax Code",
    "Pay Type",
];

/// Stand-in for the card digits when an employee has no CAR block.
const NO_CARD: &str = "0000";

/// Write the accounting CSV to `path`. Returns the number of receipt rows.
pub fn write_accounting_csv(
    employees: &BTreeMap<EmployeeKey, EmployeeReconciliation>,
    export: &ExportConfig,
    path: &Path,
) -> Result<usize, ReconError> {
    let mut rows = 0;
    publish_atomic(path, |tmp| {
        let mut writer = csv::WriterBuilder::new().from_path(tmp).map_err(|e| e.to_string())?;
        writer.write_record(HEADERS).map_err(|e| e.to_string())?;
        for e in employees.values() {
            for r in &e.receipts {
                writer.write_record(accounting_row(e, r, export)).map_err(|e| e.to_string())?;
                rows += 1;
            }
        }
        writer.flush().map_err(|e| e.to_string())
    })?;
    log::info!("wrote {} ({rows} row(s))", path.display());
    Ok(rows)
}

/// Field values for one receipt, in `HEADERS` order.
pub fn accounting_row(
    employee: &EmployeeReconciliation,
    receipt: &ReceiptRecord,
    export: &ExportConfig,
) -> Vec<String> {
    let job = receipt.coding.job();
    let gl = receipt.coding.gl();
    let description = if receipt.purpose.trim().is_empty() {
        &receipt.merchant_name
    } else {
        &receipt.purpose
    };

    vec![
        clean(&receipt.transaction_id),
        clean(&receipt.date.to_string()),
        format_cents(receipt.amount_cents),
        clean(employee.display_name()),
        export.vendor_code.clone(),
        invoice_number(employee, receipt, &export.invoice_date_format),
        clean(description),
        job.map(|j| clean(&j.job)).unwrap_or_default(),
        job.map(|j| clean(&j.phase)).unwrap_or_default(),
        job.map(|j| clean(&j.cost_type)).unwrap_or_default(),
        gl.map(|g| clean(&g.account)).unwrap_or_default(),
        gl.map(|g| clean(&g.description)).unwrap_or_default(),
        export.unit_of_measure.clone(),
        export.tax_code.clone(),
        receipt.coding.pay_type().map(|p| p.to_string()).unwrap_or_default(),
    ]
}

/// Last four card digits followed by the transaction date, e.g. `1234090326`.
/// An unparsed date contributes nothing.
pub fn invoice_number(
    employee: &EmployeeReconciliation,
    receipt: &ReceiptRecord,
    date_format: &str,
) -> String {
    let last4 = employee.card_last4().unwrap_or(NO_CARD);
    match receipt.date.date() {
        Some(d) => format!("{last4}{}", d.format(date_format)),
        None => last4.to_string(),
    }
}

/// Drop characters the accounting importer treats as structure.
fn clean(value: &str) -> String {
    let stripped: String = value
        .chars()
        .filter(|c| !matches!(c, ',' | '"'))
        .map(|c| if matches!(c, '\t' | '\r' | '\n') { ' ' } else { c })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
