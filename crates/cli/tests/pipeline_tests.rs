// End-to-end pipeline tests over synthetic PDFs.
// Run with: cargo test -p cardrecon-cli --test pipeline_tests

mod common;

use calamine::{open_workbook, Data, Reader, Xlsx};
use tempfile::tempdir;

use cardrecon_cli::parse::{parse_car, parse_receipts};
use cardrecon_cli::pipeline::{run, RunRequest, RunStatus};
use cardrecon_io::PdfSource;
use cardrecon_recon::model::{EmployeeKey, ValidationFlag};
use cardrecon_recon::{ReconConfig, ReconError};

use common::*;

fn request(dir: &std::path::Path, ann_attached: bool) -> RunRequest {
    let (car, receipts) = write_sources(dir, ann_attached);
    RunRequest { car_pdf: car, receipts_pdf: receipts, out_dir: dir.join("out"), password: None }
}

#[test]
fn full_run_reconciles_and_writes_outputs() {
    let dir = tempdir().unwrap();
    let out = run(&ReconConfig::default(), &request(dir.path(), false)).unwrap();

    let jdoe = out.dataset.get(&EmployeeKey::new("JDOE", Some(1023))).unwrap();
    assert_eq!(jdoe.car_total_cents, 52310);
    assert_eq!(jdoe.receipt_total_cents, 52310);
    assert!(jdoe.is_finished(), "flags: {:?}", jdoe.flags.labels());

    let ann = out.dataset.get(&EmployeeKey::new("ANNLEE", Some(2001))).unwrap();
    assert_eq!(ann.flags.labels(), vec!["missing_receipt"]);

    assert_eq!(out.report.status, RunStatus::Unfinished);
    assert_eq!(out.report.unfinished.len(), 1);
    assert_eq!(out.report.unfinished[0].display_name, "ANN LEE");
    assert_eq!(out.report.pdfs_written, 2);
    assert!(out.report.report_errors.is_empty());

    let out_dir = dir.path().join("out");
    assert!(out_dir.join("employees").join("JDOE_1023.pdf").exists());
    assert!(out_dir.join("employees").join("ANNLEE_2001.pdf").exists());
    assert!(out_dir.join("reconciliation.xlsx").exists());
    assert!(out_dir.join("accounting_export.csv").exists());
}

#[test]
fn all_attached_run_is_complete() {
    let dir = tempdir().unwrap();
    let out = run(&ReconConfig::default(), &request(dir.path(), true)).unwrap();
    assert_eq!(out.report.status, RunStatus::Complete);
    assert_eq!(out.report.summary.finished, 2);
}

#[test]
fn combined_pdf_reextracts_to_same_blocks() {
    let dir = tempdir().unwrap();
    run(&ReconConfig::default(), &request(dir.path(), true)).unwrap();

    let path = dir.path().join("out").join("employees").join("JDOE_1023.pdf");
    let combined = PdfSource::open(&path, None).unwrap();
    assert_eq!(combined.page_count(), 5);

    let car = parse_car(combined.pages());
    assert_eq!(car.records.len(), 1);
    assert_eq!(car.records[0].employee_id, 1023);
    assert_eq!(car.records[0].total_cents, 52310);

    let receipts = parse_receipts(combined.pages(), "%m/%d/%Y");
    let ids: Vec<&str> = receipts.records.iter().map(|r| r.transaction_id.as_str()).collect();
    assert_eq!(ids, vec!["T100", "T101", "T102"]);
    assert!(receipts.records.iter().all(|r| r.has_attachment));
}

#[test]
fn summary_sheet_lists_every_employee() {
    let dir = tempdir().unwrap();
    run(&ReconConfig::default(), &request(dir.path(), false)).unwrap();

    let path = dir.path().join("out").join("reconciliation.xlsx");
    let mut wb: Xlsx<_> = open_workbook(&path).unwrap();
    let summary = wb.worksheet_range("Summary").unwrap();
    assert_eq!(summary.get_value((1, 0)), Some(&Data::String("ANN LEE".into())));
    assert_eq!(summary.get_value((1, 7)), Some(&Data::String("missing_receipt".into())));
    assert_eq!(summary.get_value((2, 0)), Some(&Data::String("JDOE".into())));
    assert_eq!(summary.get_value((2, 6)), Some(&Data::String("Finished".into())));

    let issues = wb.worksheet_range("Receipt Issue Details").unwrap();
    assert_eq!(issues.get_value((1, 1)), Some(&Data::String("T200".into())));
}

#[test]
fn accounting_csv_has_one_row_per_receipt() {
    let dir = tempdir().unwrap();
    run(&ReconConfig::default(), &request(dir.path(), true)).unwrap();

    let path = dir.path().join("out").join("accounting_export.csv");
    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    assert_eq!(rows.len(), 4);
    let t100 = rows.iter().find(|r| r[0] == "T100").unwrap();
    assert_eq!(t100[2], "200.00");
    assert_eq!(t100[5], "1234090326");
    assert_eq!(t100[14], "2");
    let t101 = rows.iter().find(|r| r[0] == "T101").unwrap();
    assert_eq!(t101[10], "6100");
    assert_eq!(t101[14], "1");
}

#[test]
fn alias_from_config_merges_identities() {
    let dir = tempdir().unwrap();
    let mut req = request(dir.path(), true);
    let mut receipts = receipt_pages(true);
    receipts[3] = receipt_page("T200", "Annie Lee", "$75.00", GL, true);
    std::fs::write(&req.receipts_pdf, text_pdf(&receipts)).unwrap();
    req.out_dir = dir.path().join("aliased");

    let config = ReconConfig::from_toml("[aliases]\n\"Annie Lee\" = \"ANN LEE\"\n").unwrap();
    let out = run(&config, &req).unwrap();
    let ann = out.dataset.get(&EmployeeKey::new("ANNLEE", Some(2001))).unwrap();
    assert_eq!(ann.receipts.len(), 1);
    assert!(ann.is_finished());
    assert_eq!(out.dataset.employees.len(), 2);
}

#[test]
fn unknown_receipt_name_is_kept_and_flagged() {
    let dir = tempdir().unwrap();
    let req = request(dir.path(), true);
    let mut receipts = receipt_pages(true);
    receipts.push(receipt_page("T300", "Walk In", "$5.00", GL, true));
    std::fs::write(&req.receipts_pdf, text_pdf(&receipts)).unwrap();

    let out = run(&ReconConfig::default(), &req).unwrap();
    let walk_in = out.dataset.get(&EmployeeKey::new("WALKIN", None)).unwrap();
    assert!(walk_in.flags.contains(ValidationFlag::UnresolvedIdentity));
    assert!(walk_in.flags.contains(ValidationFlag::TotalMismatch));
    assert!(dir.path().join("out").join("employees").join("WALKIN.pdf").exists());
}

#[test]
fn unreadable_source_is_fatal() {
    let dir = tempdir().unwrap();
    let mut req = request(dir.path(), true);
    std::fs::write(&req.car_pdf, b"this is not a pdf").unwrap();
    let err = run(&ReconConfig::default(), &req).unwrap_err();
    assert!(matches!(err, ReconError::UnreadablePdf { .. }));

    req.car_pdf = dir.path().join("missing.pdf");
    let err = run(&ReconConfig::default(), &req).unwrap_err();
    assert!(matches!(err, ReconError::UnreadablePdf { .. }));
}

#[test]
fn json_dataset_written_when_configured() {
    let dir = tempdir().unwrap();
    let config = ReconConfig::from_toml("[output]\njson = \"dataset.json\"\n").unwrap();
    run(&config, &request(dir.path(), true)).unwrap();

    let text = std::fs::read_to_string(dir.path().join("out").join("dataset.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["employees"].as_array().unwrap().len(), 2);
    assert_eq!(json["summary"]["finished"], 2);
}

#[test]
fn rerun_produces_identical_dataset() {
    let dir = tempdir().unwrap();
    let req = request(dir.path(), false);
    let a = run(&ReconConfig::default(), &req).unwrap();
    let b = run(&ReconConfig::default(), &req).unwrap();
    assert_eq!(a.dataset.employees, b.dataset.employees);
}

#[test]
fn malformed_car_total_degrades_employee_only() {
    let dir = tempdir().unwrap();
    let req = request(dir.path(), true);
    let mut car = car_pages();
    car[2] = lines(&[
        "2001 ANN LEE 4246-XXXX-XXXX-5555",
        "09/20/2026 CHEVRON 75.00",
        "Totals For Card Nbr 4246-XXXX-XXXX-5555 pending",
        "End of Report",
    ]);
    std::fs::write(&req.car_pdf, text_pdf(&car)).unwrap();
    std::fs::write(&req.receipts_pdf, text_pdf(&receipt_pages(true)[..3])).unwrap();

    let out = run(&ReconConfig::default(), &req).unwrap();
    assert_eq!(out.report.status, RunStatus::Unfinished);
    assert!(out.report.pdf_failures.is_empty());
    assert!(out.report.report_errors.is_empty());

    let ann = out.dataset.get(&EmployeeKey::new("ANNLEE", Some(2001))).unwrap();
    assert_eq!(ann.flags.labels(), vec!["malformed_amount"]);
    assert_eq!(ann.car_total_cents, 0);

    // The rejected block's CAR page still lands in the employee's PDF.
    let path = dir.path().join("out").join("employees").join("ANNLEE_2001.pdf");
    let pdf = PdfSource::open(&path, None).unwrap();
    assert_eq!(pdf.page_count(), 1);
    assert!(pdf.page_text(0).contains("ANN LEE"));
}

#[test]
fn partial_job_coding_is_missing_coding_info() {
    let dir = tempdir().unwrap();
    let req = request(dir.path(), true);
    let mut receipts = receipt_pages(true);
    receipts[0] = receipt_page("T100", "JDOE", "$200.00", &["Job: 24-001"], true);
    std::fs::write(&req.receipts_pdf, text_pdf(&receipts)).unwrap();

    let out = run(&ReconConfig::default(), &req).unwrap();
    let jdoe = out.dataset.get(&EmployeeKey::new("JDOE", Some(1023))).unwrap();
    assert_eq!(jdoe.flags.labels(), vec!["missing_coding_info"]);
    let t100 = jdoe.receipts.iter().find(|r| r.transaction_id == "T100").unwrap();
    assert_eq!(t100.coding.pay_type(), None);
}
