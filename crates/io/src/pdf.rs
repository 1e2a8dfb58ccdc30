//! Page-text extraction over an owned lopdf document.
//!
//! A [`PdfSource`] owns the parsed document for its whole lifetime; dropping
//! it releases everything, including on early-return error paths.

use std::path::Path;

use lopdf::Document;

use cardrecon_recon::ReconError;

/// Text of one page, 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub index: usize,
    pub text: String,
}

pub struct PdfSource {
    label: String,
    doc: Document,
    /// 1-based lopdf page numbers, in page order.
    page_numbers: Vec<u32>,
}

impl PdfSource {
    /// Parse a PDF held in memory. `label` names the source in errors and logs.
    pub fn from_bytes(
        label: impl Into<String>,
        bytes: &[u8],
        password: Option<&str>,
    ) -> Result<Self, ReconError> {
        let label = label.into();
        let unreadable =
            |reason: String| ReconError::UnreadablePdf { source: label.clone(), reason };

        let mut doc = Document::load_mem(bytes).map_err(|e| unreadable(e.to_string()))?;

        if doc.is_encrypted() {
            let pw = password.unwrap_or("");
            doc.decrypt(pw).map_err(|e| {
                if password.is_some() {
                    unreadable(format!("password does not decrypt document: {e}"))
                } else {
                    unreadable(format!("document is encrypted and no password was supplied: {e}"))
                }
            })?;
        }

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(unreadable("document has no pages".into()));
        }

        log::info!("{label}: opened {} page(s)", page_numbers.len());
        Ok(Self { label, doc, page_numbers })
    }

    pub fn open(path: &Path, password: Option<&str>) -> Result<Self, ReconError> {
        let bytes = std::fs::read(path).map_err(|e| ReconError::UnreadablePdf {
            source: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(path.display().to_string(), &bytes, password)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Text of a single page. A page whose content cannot be decoded yields
    /// empty text rather than failing the document.
    pub fn page_text(&self, index: usize) -> String {
        let Some(&number) = self.page_numbers.get(index) else {
            return String::new();
        };
        match self.doc.extract_text(&[number]) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("{}: page {}: text extraction failed: {e}", self.label, index + 1);
                String::new()
            }
        }
    }

    /// Lazy, in-order page iterator. Each call starts a fresh pass.
    pub fn pages(&self) -> Pages<'_> {
        Pages { source: self, next: 0, saw_text: false }
    }
}

pub struct Pages<'a> {
    source: &'a PdfSource,
    next: usize,
    saw_text: bool,
}

impl Iterator for Pages<'_> {
    type Item = PageText;

    fn next(&mut self) -> Option<PageText> {
        if self.next >= self.source.page_count() {
            if self.next == self.source.page_count() && !self.saw_text {
                log::warn!(
                    "{}: no extractable text on any page, document appears scanned/image-only",
                    self.source.label
                );
            }
            // Park past the end so the warning fires once.
            self.next = self.source.page_count() + 1;
            return None;
        }

        let index = self.next;
        self.next += 1;
        let text = self.source.page_text(index);
        if !text.trim().is_empty() {
            self.saw_text = true;
        }
        log::debug!("{}: page {} -> {} chars", self.source.label, index + 1, text.len());
        Some(PageText { index, text })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.source.page_count().saturating_sub(self.next);
        (left, Some(left))
    }
}
