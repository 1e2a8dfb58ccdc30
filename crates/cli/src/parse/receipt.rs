//! Receipt Report parser.
//!
//! Each transaction block starts at a `Transaction ID:` line and is made of
//! `Label: value` lines. A block owns every page up to the next block, so
//! receipt-image pages that follow it (text or not) stay with it. A repeated
//! Transaction ID continues the earlier block instead of starting a new one.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use cardrecon_io::PageText;
use cardrecon_recon::model::{
    Coding, GlCoding, JobCoding, PageRange, ReceiptDate, ReceiptRecord, RecordIssue, SourceDoc,
};
use cardrecon_recon::money::parse_amount;
use cardrecon_recon::ReconError;

use super::{squash, Parsed};

struct Patterns {
    transaction: Regex,
    field: Regex,
    attachment: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        transaction: Regex::new(r"(?i)^\s*Transaction\s+ID\s*:\s*(?P<id>\S+)")
            .expect("static pattern"),
        field: Regex::new(
            r"(?i)^\s*(?P<label>Employee|Expense\s+Type|Transaction\s+Date|Amount|Business\s+Purpose|Merchant\s+Address|Merchant|Job|Phase|Cost\s+Type|GL\s+Account|GL\s+Description)\s*:\s*(?P<value>.*?)\s*$",
        )
        .expect("static pattern"),
        // Anchored so "No Receipt ..." never counts.
        attachment: Regex::new(r"(?i)^\s*Receipt\s+(?:Image|Attached)\b").expect("static pattern"),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Employee,
    ExpenseType,
    TransactionDate,
    Amount,
    BusinessPurpose,
    Merchant,
    MerchantAddress,
    Job,
    Phase,
    CostType,
    GlAccount,
    GlDescription,
}

impl Field {
    fn from_label(label: &str) -> Option<Self> {
        let key: String =
            label.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase();
        Some(match key.as_str() {
            "employee" => Self::Employee,
            "expense type" => Self::ExpenseType,
            "transaction date" => Self::TransactionDate,
            "amount" => Self::Amount,
            "business purpose" => Self::BusinessPurpose,
            "merchant" => Self::Merchant,
            "merchant address" => Self::MerchantAddress,
            "job" => Self::Job,
            "phase" => Self::Phase,
            "cost type" => Self::CostType,
            "gl account" => Self::GlAccount,
            "gl description" => Self::GlDescription,
            _ => return None,
        })
    }
}

struct Block {
    transaction_id: String,
    fields: HashMap<Field, String>,
    first_page: usize,
    last_page: usize,
    has_attachment: bool,
}

impl Block {
    fn get(&self, field: Field) -> &str {
        self.fields.get(&field).map(String::as_str).unwrap_or("")
    }

    fn claim(&mut self, page: usize) {
        self.last_page = self.last_page.max(page);
    }
}

/// Scan Receipt Report page text for transaction blocks.
///
/// `date_format` is the chrono format of the Transaction Date field.
pub fn parse_receipts(
    pages: impl IntoIterator<Item = PageText>,
    date_format: &str,
) -> Parsed<ReceiptRecord> {
    let p = patterns();
    let mut blocks: Vec<Block> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut current: Option<usize> = None;

    for page in pages {
        let has_transaction_line = page.text.lines().any(|l| p.transaction.is_match(l));
        // A page with no block start belongs wholly to the running block,
        // including image-only pages with no text at all.
        if !has_transaction_line {
            if let Some(i) = current {
                blocks[i].claim(page.index);
            }
        }

        for line in page.text.lines() {
            if let Some(caps) = p.transaction.captures(line) {
                let id = caps["id"].to_string();
                let index = match by_id.get(&id) {
                    Some(&i) => {
                        log::debug!("receipts page {}: {id} continues", page.index + 1);
                        blocks[i].claim(page.index);
                        i
                    }
                    None => {
                        blocks.push(Block {
                            transaction_id: id.clone(),
                            fields: HashMap::new(),
                            first_page: page.index,
                            last_page: page.index,
                            has_attachment: false,
                        });
                        by_id.insert(id, blocks.len() - 1);
                        blocks.len() - 1
                    }
                };
                current = Some(index);
                continue;
            }

            let Some(i) = current else { continue };
            if line.trim().is_empty() {
                continue;
            }
            let block = &mut blocks[i];
            // Content before the first block start on a page is the tail of the running block.
            block.claim(page.index);

            if p.attachment.is_match(line) {
                block.has_attachment = true;
                continue;
            }
            if let Some(caps) = p.field.captures(line) {
                let Some(field) = Field::from_label(&caps["label"]) else { continue };
                let value = squash(&caps["value"]);
                if !value.is_empty() {
                    block.fields.entry(field).or_insert(value);
                }
            }
        }
    }

    let mut out = Parsed::default();
    for block in blocks {
        match build_record(&block, date_format) {
            Ok(record) => out.records.push(record),
            Err(err) => {
                let name = block.get(Field::Employee);
                log::warn!(
                    "receipts page {}: {}: {err}",
                    block.first_page + 1,
                    block.transaction_id
                );
                let range = PageRange::new(block.first_page, block.last_page);
                let issue = RecordIssue::from_error(
                    SourceDoc::Receipts,
                    name,
                    None,
                    block.first_page,
                    &err,
                );
                out.issues.extend(issue.map(|i| i.with_pages(range)));
            }
        }
    }

    let unparsed = out.records.iter().filter(|r| r.date.is_unparsed()).count();
    if unparsed > 0 {
        log::warn!("receipts: {unparsed} transaction date(s) did not match '{date_format}'");
    }
    log::info!(
        "receipts: {} transaction(s), {} issue(s)",
        out.records.len(),
        out.issues.len()
    );
    out
}

fn build_record(block: &Block, date_format: &str) -> Result<ReceiptRecord, ReconError> {
    let employee_name = block.get(Field::Employee).to_string();
    let raw_amount = block.get(Field::Amount);
    let amount_cents = parse_amount(raw_amount).map_err(|_| ReconError::MalformedAmount {
        employee: employee_name.clone(),
        value: if raw_amount.is_empty() {
            "missing Amount".to_string()
        } else {
            raw_amount.to_string()
        },
    })?;

    let raw_date = block.get(Field::TransactionDate);
    let date = match NaiveDate::parse_from_str(raw_date, date_format) {
        Ok(d) => ReceiptDate::Parsed(d),
        Err(_) => ReceiptDate::Unparsed(raw_date.to_string()),
    };

    let job = complete(block, &[Field::Job, Field::Phase, Field::CostType]).then(|| JobCoding {
        job: block.get(Field::Job).to_string(),
        phase: block.get(Field::Phase).to_string(),
        cost_type: block.get(Field::CostType).to_string(),
    });
    let gl = complete(block, &[Field::GlAccount, Field::GlDescription]).then(|| GlCoding {
        account: block.get(Field::GlAccount).to_string(),
        description: block.get(Field::GlDescription).to_string(),
    });

    Ok(ReceiptRecord {
        transaction_id: block.transaction_id.clone(),
        employee_name,
        expense_type: block.get(Field::ExpenseType).to_string(),
        date,
        amount_cents,
        purpose: block.get(Field::BusinessPurpose).to_string(),
        merchant_name: block.get(Field::Merchant).to_string(),
        merchant_address: block.get(Field::MerchantAddress).to_string(),
        coding: Coding::from_parts(job, gl),
        has_attachment: block.has_attachment,
        page: block.first_page,
        pages: PageRange::new(block.first_page, block.last_page),
    })
}

/// A coding variant counts only when every one of its fields is filled in.
/// A partial variant is treated as absent.
fn complete(block: &Block, fields: &[Field]) -> bool {
    let filled = fields.iter().filter(|f| !block.get(**f).is_empty()).count();
    if filled > 0 && filled < fields.len() {
        log::warn!(
            "receipts page {}: {}: incomplete coding {:?} ignored",
            block.first_page + 1,
            block.transaction_id,
            fields.iter().filter(|f| block.get(**f).is_empty()).collect::<Vec<_>>()
        );
    }
    filled == fields.len()
}
