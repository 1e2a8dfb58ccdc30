use std::collections::BTreeMap;

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;

use crate::error::ReconError;
use crate::identity::normalize_name;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Raw name variant → canonical name. Applied before normalization.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub receipts: ReceiptConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_name() -> String {
    "card reconciliation".into()
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            aliases: BTreeMap::new(),
            tolerance: ToleranceConfig::default(),
            receipts: ReceiptConfig::default(),
            export: ExportConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tolerance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToleranceConfig {
    /// `total_mismatch` fires when |car_total - receipt_total| exceeds this.
    #[serde(default)]
    pub amount_cents: i64,
}

// ---------------------------------------------------------------------------
// Receipt parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptConfig {
    /// chrono format for the Transaction Date field.
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_date_format() -> String {
    "%m/%d/%Y".into()
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self { date_format: default_date_format() }
    }
}

// ---------------------------------------------------------------------------
// Accounting export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_vendor_code")]
    pub vendor_code: String,
    #[serde(default = "default_unit_of_measure")]
    pub unit_of_measure: String,
    #[serde(default = "default_tax_code")]
    pub tax_code: String,
    /// Date part of the synthesized invoice number.
    #[serde(default = "default_invoice_date_format")]
    pub invoice_date_format: String,
}

fn default_vendor_code() -> String {
    "CARD".into()
}

fn default_unit_of_measure() -> String {
    "LS".into()
}

fn default_tax_code() -> String {
    "E".into()
}

fn default_invoice_date_format() -> String {
    "%m%d%y".into()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            vendor_code: default_vendor_code(),
            unit_of_measure: default_unit_of_measure(),
            tax_code: default_tax_code(),
            invoice_date_format: default_invoice_date_format(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_workbook")]
    pub workbook: String,
    #[serde(default = "default_csv")]
    pub csv: String,
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: String,
    #[serde(default)]
    pub json: Option<String>,
}

fn default_workbook() -> String {
    "reconciliation.xlsx".into()
}

fn default_csv() -> String {
    "accounting_export.csv".into()
}

fn default_pdf_dir() -> String {
    "employees".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            workbook: default_workbook(),
            csv: default_csv(),
            pdf_dir: default_pdf_dir(),
            json: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.tolerance.amount_cents < 0 {
            return Err(ReconError::ConfigValidation(format!(
                "tolerance.amount_cents must be >= 0, got {}",
                self.tolerance.amount_cents
            )));
        }

        check_date_format("receipts.date_format", &self.receipts.date_format)?;
        check_date_format("export.invoice_date_format", &self.export.invoice_date_format)?;

        // Aliases: both sides must normalize to something, and no chains.
        let canonical: BTreeMap<String, String> = self
            .aliases
            .iter()
            .map(|(from, to)| (normalize_name(from), normalize_name(to)))
            .collect();
        for (from, to) in &self.aliases {
            if normalize_name(from).is_empty() || normalize_name(to).is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "alias '{from}' = '{to}': names must contain letters"
                )));
            }
            let target = normalize_name(to);
            if canonical.contains_key(&target) && canonical[&target] != target {
                return Err(ReconError::ConfigValidation(format!(
                    "alias '{from}' points at '{to}', which is itself an alias"
                )));
            }
        }

        for (field, value) in [
            ("output.workbook", &self.output.workbook),
            ("output.csv", &self.output.csv),
            ("output.pdf_dir", &self.output.pdf_dir),
        ] {
            if value.trim().is_empty() || value.contains(['/', '\\']) {
                return Err(ReconError::ConfigValidation(format!(
                    "{field} must be a plain file name, got '{value}'"
                )));
            }
        }

        Ok(())
    }
}

fn check_date_format(field: &str, fmt: &str) -> Result<(), ReconError> {
    if fmt.trim().is_empty() || StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        return Err(ReconError::ConfigValidation(format!(
            "{field}: invalid date format '{fmt}'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
