//! End-to-end run: extract → parse → reconcile → combine PDFs + write reports.
//!
//! The CAR and Receipt Report are extracted and parsed on two scoped threads
//! and joined before identity resolution. Once the reconciliation set is
//! final, per-employee PDFs and the Excel/CSV reports are produced on two
//! more scoped threads. Each thread opens its own document handles from the
//! shared source bytes.

use std::path::{Path, PathBuf};
use std::thread;

use serde::Serialize;

use cardrecon_io::{csv, xlsx, write_employee_pdfs, PdfSource, SplitReport};
use cardrecon_recon::model::{
    CarRecord, EmployeeKey, ReceiptRecord, ReconInput, ReconResult, ReconSummary, SourceBounds,
    ValidationFlags,
};
use cardrecon_recon::{ReconConfig, ReconError};

use crate::parse::{parse_car, parse_receipts, Parsed};

/// Inputs for one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub car_pdf: PathBuf,
    pub receipts_pdf: PathBuf,
    pub out_dir: PathBuf,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every employee finished and every output was written.
    Complete,
    /// At least one employee carries a flag.
    Unfinished,
    /// Reconciliation finished but a report or PDF could not be written.
    OutputErrors,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnfinishedEmployee {
    pub key: EmployeeKey,
    pub display_name: String,
    pub flags: ValidationFlags,
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfFailure {
    pub key: EmployeeKey,
    pub error: String,
}

/// What a caller needs to act on: status, counts, unfinished employees
/// with their flags, and any output failures.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub summary: ReconSummary,
    pub unfinished: Vec<UnfinishedEmployee>,
    pub pdf_dir: String,
    pub pdfs_written: usize,
    pub pdf_failures: Vec<PdfFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workbook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv: Option<String>,
    pub report_errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub report: RunReport,
    pub dataset: ReconResult,
}

/// Run the whole pipeline.
///
/// Fatal errors (unreadable source, invalid config, output directory not
/// creatable) are returned as `Err`. Per-employee and per-report failures
/// land in the report instead.
pub fn run(config: &ReconConfig, request: &RunRequest) -> Result<RunOutput, ReconError> {
    config.validate()?;

    let car_bytes = read_source(&request.car_pdf)?;
    let receipt_bytes = read_source(&request.receipts_pdf)?;
    let car_label = request.car_pdf.display().to_string();
    let receipt_label = request.receipts_pdf.display().to_string();
    let password = request.password.as_deref();

    // Phase 1: extract + parse both sources, joined before resolution.
    let (car, receipts) = thread::scope(|s| {
        let car = s.spawn(|| extract_car(&car_label, &car_bytes, password));
        let receipts = s.spawn(|| {
            extract_receipts(&receipt_label, &receipt_bytes, password, &config.receipts.date_format)
        });
        (join(car, "CAR extraction"), join(receipts, "receipt extraction"))
    });
    let (car_pages, car) = car??;
    let (receipt_pages, receipts) = receipts??;

    // Phase 2: reconcile.
    let mut issues = car.issues;
    issues.extend(receipts.issues);
    let input = ReconInput {
        car: car.records,
        receipts: receipts.records,
        issues,
        bounds: Some(SourceBounds { car_pages, receipt_pages }),
    };
    let dataset = cardrecon_recon::run(config, &input)?;

    // Phase 3: outputs.
    std::fs::create_dir_all(&request.out_dir).map_err(|e| {
        ReconError::Io(format!(
            "cannot create output directory '{}': {e}",
            request.out_dir.display()
        ))
    })?;
    let pdf_dir = request.out_dir.join(&config.output.pdf_dir);
    let workbook_path = request.out_dir.join(&config.output.workbook);
    let csv_path = request.out_dir.join(&config.output.csv);

    let (split, reports) = thread::scope(|s| {
        let split = s.spawn(|| -> Result<SplitReport, ReconError> {
            let car = PdfSource::from_bytes(car_label.as_str(), &car_bytes, password)?;
            let receipts = PdfSource::from_bytes(receipt_label.as_str(), &receipt_bytes, password)?;
            write_employee_pdfs(&car, &receipts, &dataset.employees, &pdf_dir)
        });
        let reports = s.spawn(|| {
            let workbook = xlsx::write_workbook(&dataset.employees, &workbook_path).map(|_| ());
            let csv = csv::write_accounting_csv(&dataset.employees, &config.export, &csv_path)
                .map(|_| ());
            (workbook, csv)
        });
        (join(split, "PDF combining"), join(reports, "report writing"))
    });

    let mut report_errors = Vec::new();
    let (pdfs_written, pdf_failures) = match split.and_then(|r| r) {
        Ok(split) => (
            split.written.len(),
            split
                .skipped
                .into_iter()
                .map(|(key, err)| PdfFailure { key, error: err.to_string() })
                .collect(),
        ),
        Err(err) => {
            log::error!("employee PDFs: {err}");
            report_errors.push(err.to_string());
            (0, Vec::new())
        }
    };

    let mut workbook = None;
    let mut csv = None;
    match reports {
        Ok((workbook_result, csv_result)) => {
            match workbook_result {
                Ok(()) => workbook = Some(workbook_path.display().to_string()),
                Err(err) => report_errors.push(err.to_string()),
            }
            match csv_result {
                Ok(()) => csv = Some(csv_path.display().to_string()),
                Err(err) => report_errors.push(err.to_string()),
            }
        }
        Err(err) => report_errors.push(err.to_string()),
    }
    for err in &report_errors {
        log::error!("{err}");
    }

    if let Some(name) = &config.output.json {
        let path = request.out_dir.join(name);
        if let Err(err) = write_json(&dataset, &path) {
            log::error!("{err}");
            report_errors.push(err.to_string());
        }
    }

    let unfinished: Vec<UnfinishedEmployee> = dataset
        .unfinished()
        .map(|e| UnfinishedEmployee {
            key: e.key.clone(),
            display_name: e.display_name().to_string(),
            flags: e.flags.clone(),
        })
        .collect();

    let status = if !report_errors.is_empty() || !pdf_failures.is_empty() {
        RunStatus::OutputErrors
    } else if !unfinished.is_empty() {
        RunStatus::Unfinished
    } else {
        RunStatus::Complete
    };

    let report = RunReport {
        status,
        summary: dataset.summary.clone(),
        unfinished,
        pdf_dir: pdf_dir.display().to_string(),
        pdfs_written,
        pdf_failures,
        workbook,
        csv,
        report_errors,
    };
    Ok(RunOutput { report, dataset })
}

fn read_source(path: &Path) -> Result<Vec<u8>, ReconError> {
    std::fs::read(path).map_err(|e| ReconError::UnreadablePdf {
        source: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn extract_car(
    label: &str,
    bytes: &[u8],
    password: Option<&str>,
) -> Result<(usize, Parsed<CarRecord>), ReconError> {
    let source = PdfSource::from_bytes(label, bytes, password)?;
    Ok((source.page_count(), parse_car(source.pages())))
}

fn extract_receipts(
    label: &str,
    bytes: &[u8],
    password: Option<&str>,
    date_format: &str,
) -> Result<(usize, Parsed<ReceiptRecord>), ReconError> {
    let source = PdfSource::from_bytes(label, bytes, password)?;
    Ok((source.page_count(), parse_receipts(source.pages(), date_format)))
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>, phase: &str) -> Result<T, ReconError> {
    handle
        .join()
        .map_err(|_| ReconError::Io(format!("{phase} thread panicked")))
}

/// Pretty JSON, published atomically like every other output.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ReconError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ReconError::ReportWriteError {
        path: path.display().to_string(),
        reason: format!("JSON serialization error: {e}"),
    })?;
    cardrecon_io::publish::publish_atomic(path, |tmp| {
        std::fs::write(tmp, &json).map_err(|e| e.to_string())
    })
}
