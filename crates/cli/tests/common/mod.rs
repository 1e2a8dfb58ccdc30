// Shared fixtures: synthetic CAR / Receipt Report PDFs with a real text layer.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// One BT/ET block per line, Helvetica, WinAnsi.
pub fn text_pdf(pages: &[Vec<String>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 9.into()]));
            operations.push(Operation::new("Td", vec![40.into(), (760 - 12 * i as i64).into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

pub fn lines(text: &[&str]) -> Vec<String> {
    text.iter().map(|s| s.to_string()).collect()
}

/// JDOE/1023 owes $523.10 over two pages; ANN LEE/2001 owes $75.00.
pub fn car_pages() -> Vec<Vec<String>> {
    vec![
        lines(&[
            "Card Activity Report",
            "1023 JDOE 4246-XXXX-XXXX-1234",
            "09/02/2026 HOME DEPOT 200.00",
            "09/10/2026 STAPLES 300.00",
        ]),
        lines(&["09/14/2026 SHELL 23.10", "Totals For Card Nbr 4246-XXXX-XXXX-1234 $523.10"]),
        lines(&[
            "2001 ANN LEE 4246-XXXX-XXXX-5555",
            "09/20/2026 CHEVRON 75.00",
            "Totals For Card Nbr 4246-XXXX-XXXX-5555 $75.00",
            "End of Report",
        ]),
    ]
}

pub fn receipt_page(
    id: &str,
    employee: &str,
    amount: &str,
    coding: &[&str],
    attached: bool,
) -> Vec<String> {
    let mut page = lines(&[
        &format!("Transaction ID: {id}"),
        &format!("Employee: {employee}"),
        "Expense Type: Materials",
        "Transaction Date: 09/03/2026",
        &format!("Amount: {amount}"),
        "Business Purpose: Jobsite supplies",
        "Merchant: HOME DEPOT #4411",
        "Merchant Address: 100 Industrial Way",
    ]);
    page.extend(coding.iter().map(|s| s.to_string()));
    page.push(if attached { "Receipt Image" } else { "No Receipt" }.to_string());
    page
}

pub const JOB: &[&str] = &["Job: 24-001", "Phase: 0100", "Cost Type: M"];
pub const GL: &[&str] = &["GL Account: 6100", "GL Description: Office"];

/// Three matching receipts for JDOE; ANN LEE's receipt is attached or not.
pub fn receipt_pages(ann_attached: bool) -> Vec<Vec<String>> {
    vec![
        receipt_page("T100", "JDOE", "$200.00", JOB, true),
        receipt_page("T101", "JDOE", "$300.00", GL, true),
        receipt_page("T102", "JDOE", "$23.10", JOB, true),
        receipt_page("T200", "Ann Lee", "$75.00", GL, ann_attached),
    ]
}

/// Write both source PDFs into `dir`; returns (car, receipts) paths.
pub fn write_sources(dir: &Path, ann_attached: bool) -> (PathBuf, PathBuf) {
    let car = dir.join("car.pdf");
    let receipts = dir.join("receipts.pdf");
    std::fs::write(&car, text_pdf(&car_pages())).unwrap();
    std::fs::write(&receipts, text_pdf(&receipt_pages(ann_attached))).unwrap();
    (car, receipts)
}
