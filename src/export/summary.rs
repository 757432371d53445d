//! Tab-separated summary of produced artifacts.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::SummaryError;
use crate::headers::keywords::{
    KEY_DPR_CATG, KEY_DPR_TECH, KEY_DPR_TYPE, KEY_DRS_FILTER, KEY_DRS_IFU, KEY_DRS_MASK,
    KEY_DRS_SLIT, KEY_INS_MODE,
};
use crate::simulation::{ArtifactStore, Header};

const KEY_DET_DIT: &str = "HIERARCH ESO DET DIT";
const KEY_DET_NDIT: &str = "HIERARCH ESO DET NDIT";
const KEY_TPL_NAME: &str = "HIERARCH ESO TPL NAME";
const KEY_TPL_START: &str = "HIERARCH ESO TPL START";
const KEY_TPL_EXPNO: &str = "HIERARCH ESO TPL EXPNO";

/// Column titles, in output order.
pub const COLUMNS: [&str; 15] = [
    "Block",
    "File",
    "DIT",
    "NDIT",
    "TECH",
    "CATG",
    "TYPE",
    "INS.MODE",
    "TPL.NAME",
    "TPL.START",
    "TPL.EXPNO",
    "DRS.SLIT",
    "DRS.FILTER",
    "DRS.IFU",
    "DRS.MASK",
];

const HEADER_COLUMNS: [&str; 13] = [
    KEY_DET_DIT,
    KEY_DET_NDIT,
    KEY_DPR_TECH,
    KEY_DPR_CATG,
    KEY_DPR_TYPE,
    KEY_INS_MODE,
    KEY_TPL_NAME,
    KEY_TPL_START,
    KEY_TPL_EXPNO,
    KEY_DRS_SLIT,
    KEY_DRS_FILTER,
    KEY_DRS_IFU,
    KEY_DRS_MASK,
];

/// Lists `METIS*.fits` artifacts directly inside each directory, sorted.
pub fn collect_artifacts<P: AsRef<Path>>(dirs: &[P]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = dirs
        .iter()
        .flat_map(|dir| {
            WalkDir::new(dir.as_ref())
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(Result::ok)
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.starts_with("METIS") && name.ends_with(".fits")
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// One summary row; missing keywords render empty.
pub fn summary_row(path: &Path, header: &Header) -> Vec<String> {
    let block = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut row = Vec::with_capacity(COLUMNS.len());
    row.push(block);
    row.push(file);
    row.extend(
        HEADER_COLUMNS
            .iter()
            .map(|key| header.get(key).map(|v| v.render()).unwrap_or_default()),
    );
    row
}

/// Writes the summary table for `files` to `out_file`.
pub async fn write_summary(
    store: &dyn ArtifactStore,
    files: &[PathBuf],
    out_file: &Path,
) -> Result<usize, SummaryError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(out_file)?;
    writer.write_record(COLUMNS)?;

    let mut rows = 0;
    for path in files {
        debug!(file = %path.display(), "Summarizing artifact");
        let artifact = store.read(path).await?;
        let empty = Header::new();
        let header = artifact.primary().unwrap_or(&empty);
        writer.write_record(summary_row(path, header))?;
        rows += 1;
    }
    writer.flush()?;

    info!(rows, out_file = %out_file.display(), "Summary written");
    Ok(rows)
}
