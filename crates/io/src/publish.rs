// Atomic output publishing: write a hidden .tmp sibling, then rename over the target.

use std::fs;
use std::path::{Path, PathBuf};

use cardrecon_recon::ReconError;

/// Temp path used while `dest` is being written. Same directory, so the
/// final rename never crosses a filesystem boundary.
pub fn tmp_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    dest.with_file_name(format!(".{name}.tmp"))
}

/// Run `write` against a temp path and rename the result onto `dest`.
///
/// On any failure the temp file is removed and `dest` is left untouched.
pub fn publish_atomic<F>(dest: &Path, write: F) -> Result<(), ReconError>
where
    F: FnOnce(&Path) -> Result<(), String>,
{
    let tmp = tmp_path(dest);
    let fail = |reason: String| {
        let _ = fs::remove_file(&tmp);
        ReconError::ReportWriteError { path: dest.display().to_string(), reason }
    };

    write(&tmp).map_err(fail)?;
    fs::rename(&tmp, dest).map_err(|e| fail(format!("failed to rename tmp to output: {e}")))?;
    log::debug!("published {}", dest.display());
    Ok(())
}

/// Create `dir` (and parents) if missing.
pub fn ensure_dir(dir: &Path) -> Result<(), ReconError> {
    fs::create_dir_all(dir)
        .map_err(|e| ReconError::Io(format!("cannot create directory '{}': {e}", dir.display())))
}
