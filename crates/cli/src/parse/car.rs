//! Card Activity Report parser.
//!
//! A cardholder block opens on an identity header line
//! (`<employee id> <NAME> <card number>`) and carries a
//! `Totals For Card Nbr` line whose last money token is the statement total.
//! `End of Report` stops the scan.

use std::sync::OnceLock;

use regex::Regex;

use cardrecon_io::PageText;
use cardrecon_recon::model::{CarRecord, PageRange, RecordIssue, SourceDoc};
use cardrecon_recon::money::parse_amount;
use cardrecon_recon::ReconError;

use super::{squash, Parsed};

struct Patterns {
    header: Regex,
    totals: Regex,
    money: Regex,
    end: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        header: Regex::new(
            r"^\s*(?P<id>\d{4,6})\s+(?P<name>[A-Za-z][A-Za-z.'\-]*(?:\s+[A-Za-z][A-Za-z.'\-]*)*?)\s+(?P<card>[0-9Xx*]{4}(?:[ \-]?[0-9Xx*]{4}){2}[ \-]?\d{4})(?:\s|$)",
        )
        .expect("static pattern"),
        totals: Regex::new(r"(?i)\bTotals?\s+For\s+Card\s+(?:Nbr|No\.?|Number)\b")
            .expect("static pattern"),
        money: Regex::new(r"\(?-?\$?\s?-?[\d,]*\d\.\d{2}\)?(?:\s?CR)?-?").expect("static pattern"),
        end: Regex::new(r"(?i)^\s*End\s+of\s+Report\b").expect("static pattern"),
    })
}

enum Total {
    Amount { cents: i64, page: usize },
    Malformed { raw: String, page: usize },
}

struct OpenBlock {
    employee_id: u32,
    name: String,
    card: String,
    start_page: usize,
    total: Option<Total>,
}

impl OpenBlock {
    /// Close the block. `last_page` is the last page it may claim.
    fn close(mut self, last_page: usize, out: &mut Parsed<CarRecord>) {
        let (cents, totals_page) = match self.total.take() {
            Some(Total::Amount { cents, page }) => (cents, page),
            Some(Total::Malformed { raw, page }) => {
                let last = last_page.max(self.start_page).max(page);
                let range = PageRange::new(self.start_page, last);
                self.reject(raw, page, range, out);
                return;
            }
            None => {
                let range = PageRange::new(self.start_page, last_page.max(self.start_page));
                self.reject("missing Totals For Card Nbr line".into(), self.start_page, range, out);
                return;
            }
        };

        let last = last_page.max(self.start_page).max(totals_page);
        log::debug!(
            "CAR: {} ({}) pages {}-{} total {cents}",
            self.name,
            self.employee_id,
            self.start_page + 1,
            last + 1
        );
        out.records.push(CarRecord {
            employee_id: self.employee_id,
            display_name: self.name,
            card_number: self.card,
            total_cents: cents,
            pages: PageRange::new(self.start_page, last),
        });
    }

    /// Record the failure. The block's pages ride along on the issue.
    fn reject(&self, value: String, page: usize, range: PageRange, out: &mut Parsed<CarRecord>) {
        let err = ReconError::MalformedAmount { employee: self.name.clone(), value };
        log::warn!("CAR page {}: {err}", page + 1);
        let issue =
            RecordIssue::from_error(SourceDoc::Car, &self.name, Some(self.employee_id), page, &err);
        out.issues.extend(issue.map(|i| i.with_pages(range)));
    }
}

/// Scan CAR page text for cardholder blocks.
pub fn parse_car(pages: impl IntoIterator<Item = PageText>) -> Parsed<CarRecord> {
    let p = patterns();
    let mut out = Parsed::default();
    let mut open: Option<OpenBlock> = None;
    let mut last_seen = 0;

    'pages: for page in pages {
        last_seen = page.index;
        for line in page.text.lines() {
            if p.end.is_match(line) {
                if let Some(block) = open.take() {
                    block.close(page.index, &mut out);
                }
                log::debug!("CAR: End of Report on page {}", page.index + 1);
                break 'pages;
            }

            if let Some(caps) = p.header.captures(line) {
                if let Some(block) = open.take() {
                    block.close(page.index.saturating_sub(1), &mut out);
                }
                let raw_id = &caps["id"];
                match raw_id.parse::<u32>() {
                    Ok(employee_id) => {
                        open = Some(OpenBlock {
                            employee_id,
                            name: squash(&caps["name"]),
                            card: caps["card"].to_string(),
                            start_page: page.index,
                            total: None,
                        });
                    }
                    Err(e) => {
                        log::warn!("CAR page {}: bad employee id {raw_id:?}: {e}", page.index + 1)
                    }
                }
                continue;
            }

            let Some(block) = open.as_mut() else { continue };
            let Some(label) = p.totals.find(line) else { continue };
            if block.total.is_some() {
                log::debug!("CAR: extra totals line for {} ignored", block.name);
                continue;
            }
            let rest = &line[label.end()..];
            block.total = Some(match p.money.find_iter(rest).last() {
                Some(token) => match parse_amount(token.as_str()) {
                    Ok(cents) => Total::Amount { cents, page: page.index },
                    Err(_) => Total::Malformed {
                        raw: token.as_str().trim().to_string(),
                        page: page.index,
                    },
                },
                None => Total::Malformed { raw: rest.trim().to_string(), page: page.index },
            });
        }
    }

    if let Some(block) = open.take() {
        block.close(last_seen, &mut out);
    }

    log::info!(
        "CAR: {} cardholder block(s), {} issue(s)",
        out.records.len(),
        out.issues.len()
    );
    out
}
