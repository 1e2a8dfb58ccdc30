//! Excel report: a per-employee Summary sheet and a per-receipt
//! Receipt Issue Details sheet.

use std::collections::BTreeMap;
use std::path::Path;

use rust_xlsxwriter::{Format, FormatBorder, Workbook, Worksheet, XlsxError};

use cardrecon_recon::model::{EmployeeKey, EmployeeReconciliation};
use cardrecon_recon::money::cents_to_f64;
use cardrecon_recon::ReconError;

use crate::publish::publish_atomic;

pub const SUMMARY_SHEET: &str = "Summary";
pub const ISSUES_SHEET: &str = "Receipt Issue Details";

const SUMMARY_HEADERS: [&str; 8] = [
    "Employee",
    "Employee ID",
    "CAR Total",
    "Receipt Total",
    "Receipts",
    "Missing Amount",
    "Status",
    "Flags",
];

const ISSUE_HEADERS: [&str; 8] = [
    "Employee",
    "Transaction ID",
    "Expense Type",
    "Date",
    "Amount",
    "Business Purpose",
    "Merchant",
    "Status",
];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkbookStats {
    pub summary_rows: usize,
    pub issue_rows: usize,
}

struct Styles {
    header: Format,
    money: Format,
    total_label: Format,
    total_money: Format,
}

impl Styles {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold().set_border_bottom(FormatBorder::Thin),
            money: Format::new().set_num_format("#,##0.00"),
            total_label: Format::new().set_bold().set_border_top(FormatBorder::Thin),
            total_money: Format::new()
                .set_bold()
                .set_num_format("#,##0.00")
                .set_border_top(FormatBorder::Thin),
        }
    }
}

/// Write the workbook to `path` via a temp file; no partial workbook is
/// left behind on failure.
pub fn write_workbook(
    employees: &BTreeMap<EmployeeKey, EmployeeReconciliation>,
    path: &Path,
) -> Result<WorkbookStats, ReconError> {
    let mut stats = WorkbookStats::default();
    publish_atomic(path, |tmp| {
        stats = build_and_save(employees, tmp).map_err(|e| e.to_string())?;
        Ok(())
    })?;
    log::info!(
        "wrote {} ({} summary row(s), {} issue row(s))",
        path.display(),
        stats.summary_rows,
        stats.issue_rows
    );
    Ok(stats)
}

fn build_and_save(
    employees: &BTreeMap<EmployeeKey, EmployeeReconciliation>,
    path: &Path,
) -> Result<WorkbookStats, XlsxError> {
    let styles = Styles::new();
    let mut workbook = Workbook::new();

    let summary = workbook.add_worksheet().set_name(SUMMARY_SHEET)?;
    let summary_rows = write_summary(summary, employees, &styles)?;

    let issues = workbook.add_worksheet().set_name(ISSUES_SHEET)?;
    let issue_rows = write_issue_details(issues, employees, &styles)?;

    workbook.save(path)?;
    Ok(WorkbookStats { summary_rows, issue_rows })
}

fn write_headers(
    sheet: &mut Worksheet,
    headers: &[&str],
    styles: &Styles,
) -> Result<(), XlsxError> {
    for (col, title) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &styles.header)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn write_summary(
    sheet: &mut Worksheet,
    employees: &BTreeMap<EmployeeKey, EmployeeReconciliation>,
    styles: &Styles,
) -> Result<usize, XlsxError> {
    write_headers(sheet, &SUMMARY_HEADERS, styles)?;
    sheet.set_column_width(0, 28)?;
    sheet.set_column_width(1, 12)?;
    for col in 2..=5 {
        sheet.set_column_width(col, 14)?;
    }
    sheet.set_column_width(6, 12)?;
    sheet.set_column_width(7, 48)?;

    let mut row = 1u32;
    let (mut car, mut rec, mut missing, mut count) = (0i64, 0i64, 0i64, 0usize);
    for e in employees.values() {
        sheet.write_string(row, 0, e.display_name())?;
        if let Some(id) = e.key.employee_id {
            sheet.write_number(row, 1, id)?;
        }
        sheet.write_number_with_format(row, 2, cents_to_f64(e.car_total_cents), &styles.money)?;
        sheet.write_number_with_format(row, 3, cents_to_f64(e.receipt_total_cents), &styles.money)?;
        sheet.write_number(row, 4, e.receipts.len() as f64)?;
        let missing_amount = cents_to_f64(e.missing_amount_cents);
        sheet.write_number_with_format(row, 5, missing_amount, &styles.money)?;
        sheet.write_string(row, 6, status_label(e))?;
        sheet.write_string(row, 7, e.flags.join("; "))?;

        car += e.car_total_cents;
        rec += e.receipt_total_cents;
        missing += e.missing_amount_cents;
        count += e.receipts.len();
        row += 1;
    }

    sheet.write_string_with_format(row, 0, "Total", &styles.total_label)?;
    sheet.write_string_with_format(row, 1, "", &styles.total_label)?;
    sheet.write_number_with_format(row, 2, cents_to_f64(car), &styles.total_money)?;
    sheet.write_number_with_format(row, 3, cents_to_f64(rec), &styles.total_money)?;
    sheet.write_number_with_format(row, 4, count as f64, &styles.total_label)?;
    sheet.write_number_with_format(row, 5, cents_to_f64(missing), &styles.total_money)?;

    Ok(employees.len())
}

fn write_issue_details(
    sheet: &mut Worksheet,
    employees: &BTreeMap<EmployeeKey, EmployeeReconciliation>,
    styles: &Styles,
) -> Result<usize, XlsxError> {
    write_headers(sheet, &ISSUE_HEADERS, styles)?;
    sheet.set_column_width(0, 28)?;
    sheet.set_column_width(1, 18)?;
    sheet.set_column_width(2, 18)?;
    sheet.set_column_width(5, 36)?;
    sheet.set_column_width(6, 28)?;
    sheet.set_column_width(7, 40)?;

    let mut row = 1u32;
    for e in employees.values() {
        for r in &e.receipts {
            let labels = r.issue_labels();
            if labels.is_empty() {
                continue;
            }
            sheet.write_string(row, 0, e.display_name())?;
            sheet.write_string(row, 1, &r.transaction_id)?;
            sheet.write_string(row, 2, &r.expense_type)?;
            sheet.write_string(row, 3, r.date.to_string())?;
            sheet.write_number_with_format(row, 4, cents_to_f64(r.amount_cents), &styles.money)?;
            sheet.write_string(row, 5, &r.purpose)?;
            sheet.write_string(row, 6, &r.merchant_name)?;
            sheet.write_string(row, 7, labels.join("; "))?;
            row += 1;
        }
    }
    Ok(row as usize - 1)
}

fn status_label(e: &EmployeeReconciliation) -> &'static str {
    if e.is_finished() {
        "Finished"
    } else {
        "Unfinished"
    }
}
