use chrono::NaiveDate;

use cardrecon_recon::config::ReconConfig;
use cardrecon_recon::engine::run;
use cardrecon_recon::model::{
    CarRecord, Classification, Coding, EmployeeKey, GlCoding, JobCoding, PageRange, ReceiptDate,
    ReceiptRecord, ReconInput, ReconResult, ValidationFlag,
};

fn jdoe_car() -> CarRecord {
    CarRecord {
        employee_id: 1023,
        display_name: "JDOE".into(),
        card_number: "4246XXXXXXXX1234".into(),
        total_cents: 52310,
        pages: PageRange::new(0, 1),
    }
}

fn receipt(txn: &str, name: &str, amount_cents: i64, coding: Coding, page: usize) -> ReceiptRecord {
    ReceiptRecord {
        transaction_id: txn.into(),
        employee_name: name.into(),
        expense_type: "Materials".into(),
        date: ReceiptDate::Parsed(NaiveDate::from_ymd_opt(2026, 9, page as u32 + 1).unwrap()),
        amount_cents,
        purpose: "Jobsite supplies".into(),
        merchant_name: "HOME DEPOT #4411".into(),
        merchant_address: "100 Industrial Way".into(),
        coding,
        has_attachment: true,
        page,
        pages: PageRange::single(page),
    }
}

fn job() -> Coding {
    Coding::Job(JobCoding { job: "24-001".into(), phase: "0100".into(), cost_type: "M".into() })
}

fn gl() -> Coding {
    Coding::Gl(GlCoding { account: "6100".into(), description: "Office".into() })
}

fn run_default(input: &ReconInput) -> ReconResult {
    run(&ReconConfig::default(), input).unwrap()
}

fn jdoe_key() -> EmployeeKey {
    EmployeeKey::new("JDOE", Some(1023))
}

// -------------------------------------------------------------------------
// Scenarios
// -------------------------------------------------------------------------

#[test]
fn matching_coded_attached_receipts_finish() {
    let input = ReconInput {
        car: vec![jdoe_car()],
        receipts: vec![
            receipt("T100", "JDOE", 20000, job(), 0),
            receipt("T101", "JDOE", 30000, gl(), 1),
            receipt("T102", "JDOE", 2310, job(), 2),
        ],
        ..Default::default()
    };
    let result = run_default(&input);

    let e = result.get(&jdoe_key()).unwrap();
    assert!(e.flags.is_empty(), "unexpected flags: {:?}", e.flags.labels());
    assert_eq!(e.classification, Classification::Finished);
    assert_eq!(e.receipt_total_cents, 52310);
    assert_eq!(e.missing_amount_cents, 0);
    assert_eq!(result.summary.finished, 1);
    assert_eq!(result.summary.unfinished, 0);
}

#[test]
fn short_receipts_raise_total_mismatch() {
    let input = ReconInput {
        car: vec![jdoe_car()],
        receipts: vec![
            receipt("T100", "JDOE", 20000, job(), 0),
            receipt("T101", "JDOE", 30000, gl(), 1),
        ],
        ..Default::default()
    };
    let result = run_default(&input);

    let e = result.get(&jdoe_key()).unwrap();
    assert_eq!(e.receipt_total_cents, 50000);
    assert_eq!(e.missing_amount_cents, 2310);
    assert_eq!(e.flags.labels(), vec!["total_mismatch"]);
    assert_eq!(e.classification, Classification::Unfinished);
}

#[test]
fn uncoded_receipt_flags_even_when_totals_match() {
    let input = ReconInput {
        car: vec![jdoe_car()],
        receipts: vec![
            receipt("T100", "JDOE", 50000, job(), 0),
            receipt("T101", "JDOE", 2310, Coding::Missing, 1),
        ],
        ..Default::default()
    };
    let result = run_default(&input);

    let e = result.get(&jdoe_key()).unwrap();
    assert_eq!(e.missing_amount_cents, 0);
    assert!(e.flags.contains(ValidationFlag::MissingCodingInfo));
    assert!(!e.flags.contains(ValidationFlag::TotalMismatch));
}

#[test]
fn alias_merges_car_and_receipt_names() {
    let config = ReconConfig::from_toml("[aliases]\nJOSEARREDONDO = \"JOSEPEREZ\"\n").unwrap();
    let input = ReconInput {
        car: vec![CarRecord {
            employee_id: 2001,
            display_name: "JOSEARREDONDO".into(),
            card_number: "4246000011112222".into(),
            total_cents: 7500,
            pages: PageRange::single(0),
        }],
        receipts: vec![receipt("T1", "JOSEPEREZ", 7500, gl(), 0)],
        ..Default::default()
    };
    let result = run(&config, &input).unwrap();

    assert_eq!(result.employees.len(), 1);
    let e = result.get(&EmployeeKey::new("JOSEPEREZ", Some(2001))).unwrap();
    assert_eq!(e.car_records.len(), 1);
    assert_eq!(e.receipts.len(), 1);
    assert!(e.is_finished());
}

#[test]
fn car_only_employee_gets_missing_all_receipts_only() {
    let input = ReconInput {
        car: vec![CarRecord { total_cents: 0, ..jdoe_car() }],
        ..Default::default()
    };
    let result = run_default(&input);

    let e = result.get(&jdoe_key()).unwrap();
    assert_eq!(e.flags.labels(), vec!["missing_all_receipts"]);
    assert_eq!(result.summary.car_only, 1);
}

#[test]
fn unparsed_date_still_counts_toward_total() {
    let mut odd = receipt("T101", "JDOE", 2310, gl(), 1);
    odd.date = ReceiptDate::Unparsed("13/45/2026".into());
    let input = ReconInput {
        car: vec![jdoe_car()],
        receipts: vec![receipt("T100", "JDOE", 50000, job(), 0), odd],
        ..Default::default()
    };
    let result = run_default(&input);

    let e = result.get(&jdoe_key()).unwrap();
    assert_eq!(e.receipt_total_cents, 52310);
    assert!(e.is_finished());
}

#[test]
fn json_dataset_carries_structured_flags() {
    let input = ReconInput {
        car: vec![jdoe_car()],
        receipts: vec![receipt("T100", "JDOE", 100, Coding::Missing, 0)],
        ..Default::default()
    };
    let result = run_default(&input);
    let json = serde_json::to_value(&result).unwrap();

    let employees = json["employees"].as_array().unwrap();
    assert_eq!(employees.len(), 1);
    let flags = employees[0]["flags"].as_array().unwrap();
    assert!(flags.iter().all(|f| f.is_string()));
    assert!(flags.contains(&serde_json::json!("missing_coding_info")));
    assert_eq!(employees[0]["classification"], "unfinished");
    assert_eq!(employees[0]["receipts"][0]["coding"]["kind"], "missing");
}
