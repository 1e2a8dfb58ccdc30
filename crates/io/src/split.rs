//! Per-employee PDF assembly: the employee's CAR pages followed by their
//! receipt pages, copied out of the two source documents into one new file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId};

use cardrecon_recon::model::{
    EmployeeKey, EmployeeReconciliation, PageRange, SourceDoc, ValidationFlag,
};
use cardrecon_recon::ReconError;

use crate::pdf::PdfSource;
use crate::publish::{ensure_dir, publish_atomic};

/// Page attributes a page may inherit from its `Pages` ancestors.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed `Parent` cycles.
const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug, Default)]
pub struct SplitReport {
    pub written: Vec<(EmployeeKey, PathBuf)>,
    pub skipped: Vec<(EmployeeKey, ReconError)>,
    /// Employees with no source pages at all; nothing to write.
    pub without_pages: Vec<EmployeeKey>,
}

/// Write one combined PDF per employee into `out_dir`.
///
/// Employees flagged `page_range_out_of_bounds` are skipped and reported;
/// other failures are per-employee as well and never stop the batch. An
/// employee with no pages in either source gets no file and no failure.
pub fn write_employee_pdfs(
    car: &PdfSource,
    receipts: &PdfSource,
    employees: &BTreeMap<EmployeeKey, EmployeeReconciliation>,
    out_dir: &Path,
) -> Result<SplitReport, ReconError> {
    ensure_dir(out_dir)?;
    let mut report = SplitReport::default();

    for (key, employee) in employees {
        if employee.flags.contains(ValidationFlag::PageRangeOutOfBounds) {
            let err = first_bounds_error(employee, car, receipts);
            log::warn!("{key}: skipping PDF: {err}");
            report.skipped.push((key.clone(), err));
            continue;
        }
        if car_pages(employee).is_empty() && receipt_pages(employee).is_empty() {
            log::info!("{key}: no source pages, no PDF written");
            report.without_pages.push(key.clone());
            continue;
        }
        match combine_employee(car, receipts, employee, out_dir) {
            Ok(path) => report.written.push((key.clone(), path)),
            Err(err) => {
                log::warn!("{key}: PDF not written: {err}");
                report.skipped.push((key.clone(), err));
            }
        }
    }

    log::info!(
        "wrote {} employee PDF(s), skipped {}",
        report.written.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Build and publish `<out_dir>/<NAME>_<ID>.pdf` for one employee.
pub fn combine_employee(
    car: &PdfSource,
    receipts: &PdfSource,
    employee: &EmployeeReconciliation,
    out_dir: &Path,
) -> Result<PathBuf, ReconError> {
    let car_pages = car_pages(employee);
    let receipt_pages = receipt_pages(employee);
    check_bounds(SourceDoc::Car, &car_pages, car.page_count())?;
    check_bounds(SourceDoc::Receipts, &receipt_pages, receipts.page_count())?;

    let dest = out_dir.join(format!("{}.pdf", employee.key.file_stem()));
    let parts = [
        (car.document(), car_pages.as_slice()),
        (receipts.document(), receipt_pages.as_slice()),
    ];
    let mut doc = combine_pages(&parts).map_err(|reason| ReconError::ReportWriteError {
        path: dest.display().to_string(),
        reason,
    })?;

    publish_atomic(&dest, |tmp| doc.save(tmp).map(|_| ()).map_err(|e| e.to_string()))?;
    log::debug!(
        "{}: {} CAR + {} receipt page(s) -> {}",
        employee.key,
        car_pages.len(),
        receipt_pages.len(),
        dest.display()
    );
    Ok(dest)
}

/// CAR page indices in record order, each page once. Blocks whose total
/// failed to parse still contribute their pages.
pub fn car_pages(employee: &EmployeeReconciliation) -> Vec<usize> {
    let ranges = employee.car_records.iter().map(|c| c.pages).collect();
    merge_pages(ranges, issue_pages(employee, SourceDoc::Car))
}

/// Receipt page indices in record order, each page once, including the
/// pages of receipts dropped by the parser.
pub fn receipt_pages(employee: &EmployeeReconciliation) -> Vec<usize> {
    let ranges = employee.receipts.iter().map(|r| r.pages).collect();
    merge_pages(ranges, issue_pages(employee, SourceDoc::Receipts))
}

fn issue_pages(
    employee: &EmployeeReconciliation,
    source: SourceDoc,
) -> impl Iterator<Item = PageRange> + '_ {
    employee.issues.iter().filter(move |i| i.source == source).filter_map(|i| i.pages)
}

/// Slot each rejected range in ahead of the first record range that starts
/// after it; record ranges keep their order.
fn merge_pages(
    mut ranges: Vec<PageRange>,
    rejected: impl Iterator<Item = PageRange>,
) -> Vec<usize> {
    for range in rejected {
        let at = ranges.iter().position(|r| r.first > range.first).unwrap_or(ranges.len());
        ranges.insert(at, range);
    }
    dedup_in_order(ranges.iter().flat_map(|r| r.pages()))
}

fn dedup_in_order(pages: impl Iterator<Item = usize>) -> Vec<usize> {
    let mut seen = BTreeSet::new();
    pages.filter(|p| seen.insert(*p)).collect()
}

fn check_bounds(source: SourceDoc, pages: &[usize], page_count: usize) -> Result<(), ReconError> {
    let (Some(&first), Some(&last)) = (pages.iter().min(), pages.iter().max()) else {
        return Ok(());
    };
    if last >= page_count {
        return Err(ReconError::PageRangeOutOfBounds {
            source: source.to_string(),
            first,
            last,
            page_count,
        });
    }
    Ok(())
}

fn first_bounds_error(
    employee: &EmployeeReconciliation,
    car: &PdfSource,
    receipts: &PdfSource,
) -> ReconError {
    check_bounds(SourceDoc::Car, &car_pages(employee), car.page_count())
        .and_then(|_| {
            check_bounds(SourceDoc::Receipts, &receipt_pages(employee), receipts.page_count())
        })
        .err()
        .unwrap_or_else(|| ReconError::PageRangeOutOfBounds {
            source: "recorded range".into(),
            first: 0,
            last: 0,
            page_count: 0,
        })
}

/// Copy the selected 0-based pages out of each source, in the given order,
/// into a fresh document.
pub fn combine_pages(parts: &[(&Document, &[usize])]) -> Result<Document, String> {
    let mut next_id = 1;
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut kids: Vec<ObjectId> = Vec::new();

    for (source, indices) in parts {
        if indices.is_empty() {
            continue;
        }
        let mut doc = (*source).clone();

        let numbers: Vec<u32> = indices.iter().map(|i| *i as u32 + 1).collect();
        let page_ids = doc.get_pages();
        for number in &numbers {
            let id = *page_ids.get(number).ok_or_else(|| format!("page {number} not found"))?;
            inherit_page_attributes(&mut doc, id)?;
        }

        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let page_ids = doc.get_pages();
        let wanted: Vec<ObjectId> = numbers
            .iter()
            .map(|n| {
                page_ids.get(n).copied().ok_or_else(|| format!("page {n} lost in renumbering"))
            })
            .collect::<Result<_, _>>()?;
        let wanted_set: BTreeSet<ObjectId> = wanted.iter().copied().collect();

        for (id, object) in doc.objects {
            match type_name(&object) {
                Some(b"Catalog") | Some(b"Pages") | Some(b"Outlines") | Some(b"Outline") => {}
                Some(b"Page") if !wanted_set.contains(&id) => {}
                _ => {
                    objects.insert(id, object);
                }
            }
        }
        kids.extend(wanted);
    }

    if kids.is_empty() {
        return Err("no pages selected".into());
    }

    let mut out = Document::with_version("1.5");
    out.objects = objects;
    out.max_id = next_id.saturating_sub(1);

    let pages_id = out.new_object_id();
    for kid in &kids {
        out.get_object_mut(*kid)
            .and_then(Object::as_dict_mut)
            .map_err(|e| format!("page {kid:?}: {e}"))?
            .set("Parent", pages_id);
    }
    let mut pages = Dictionary::new();
    pages.set("Type", "Pages");
    pages.set("Count", kids.len() as i64);
    pages.set("Kids", kids.into_iter().map(Object::Reference).collect::<Vec<_>>());
    out.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", "Catalog");
    catalog.set("Pages", pages_id);
    let catalog_id = out.add_object(catalog);
    out.trailer.set("Root", catalog_id);

    out.prune_objects();
    out.compress();
    Ok(out)
}

fn type_name(object: &Object) -> Option<&[u8]> {
    object.as_dict().ok()?.get(b"Type").ok()?.as_name().ok()
}

/// Copy inherited attributes from `Pages` ancestors onto the page itself so
/// the page renders the same once it hangs off a new tree.
fn inherit_page_attributes(doc: &mut Document, page_id: ObjectId) -> Result<(), String> {
    let page = doc.get_dictionary(page_id).map_err(|e| e.to_string())?;
    let mut needed: Vec<&[u8]> = INHERITABLE.iter().copied().filter(|k| !page.has(k)).collect();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut inherited: Vec<(Vec<u8>, Object)> = Vec::new();

    let mut depth = 0;
    while let Some(parent_id) = parent {
        if needed.is_empty() || depth >= MAX_TREE_DEPTH {
            break;
        }
        let node = doc.get_dictionary(parent_id).map_err(|e| e.to_string())?;
        needed.retain(|key| match node.get(key) {
            Ok(value) => {
                inherited.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    let page = doc.get_dictionary_mut(page_id).map_err(|e| e.to_string())?;
    for (key, value) in inherited {
        page.set(key, value);
    }
    Ok(())
}
