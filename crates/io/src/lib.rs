// File I/O: source PDF text, per-employee PDFs, Excel and CSV reports

pub mod csv;
pub mod pdf;
pub mod publish;
pub mod split;
pub mod xlsx;

#[cfg(test)]
mod fixture;

pub use pdf::{PageText, PdfSource};
pub use split::{write_employee_pdfs, SplitReport};
