//! Run exports: the taxonomy JSON and the classified table.
//!
//! Both are derived data. The tree itself is already persisted by the time
//! they are written, so a failed export is reported as a warning and nothing
//! more.

use crate::error::{RuntimeError, RuntimeResult};
use crate::orchestrator::{ClassificationOutcome, RunReport};
use crate::table::ContributionTable;
use anomtree_core::error::TaxonomyError;
use anomtree_core::tree::{RootView, TaxonomyTree};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CLASSIFIED_CSV: &str = "anomaly_results_classified.csv";
pub const DEFAULT_TREE_JSON: &str = "anomaly_results_classified_tree.json";

fn ensure_parent(path: &Path) -> RuntimeResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| RuntimeError::io(parent, e))
        }
        _ => Ok(()),
    }
}

/// Write the rootless tree view, re-read from storage, as pretty JSON.
pub fn export_tree_json(tree: &TaxonomyTree, path: &Path) -> RuntimeResult<RootView> {
    let view = tree.rescan()?.root_view(false);
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(&view).map_err(TaxonomyError::from)?;
    std::fs::write(path, json).map_err(|e| RuntimeError::io(path, e))?;
    info!(path = %path.display(), categories = view.len(), "taxonomy exported");
    Ok(view)
}

/// Append the table with `classification` and `template` columns.
///
/// The header is written only when the file is new or empty. Rows without a
/// classified outcome get empty cells. Returns the number of rows written.
pub fn write_classified_csv(
    table: &ContributionTable,
    outcomes: &[ClassificationOutcome],
    path: &Path,
) -> RuntimeResult<usize> {
    ensure_parent(path)?;
    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| RuntimeError::io(path, e))?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

    if is_new {
        let mut header: Vec<&str> = table.headers().iter().collect();
        header.extend(["classification", "template"]);
        writer.write_record(&header).map_err(|e| RuntimeError::csv(path, e))?;
    }

    let by_index: HashMap<usize, &ClassificationOutcome> =
        outcomes.iter().map(|o| (o.index(), o)).collect();

    let mut written = 0;
    for index in 0..table.len() {
        let Some(raw) = table.raw_row(index) else {
            continue;
        };
        let (classification, template) = by_index
            .get(&index)
            .map(|o| (o.classification_label(), o.template().to_string()))
            .unwrap_or_default();

        let mut cells: Vec<&str> = raw.iter().collect();
        cells.push(&classification);
        cells.push(&template);
        writer.write_record(&cells).map_err(|e| RuntimeError::csv(path, e))?;
        written += 1;
    }
    writer.flush().map_err(|e| RuntimeError::io(path, e))?;

    info!(path = %path.display(), rows = written, appended = !is_new, "classified table written");
    Ok(written)
}

/// Where a run's exports go; `None` skips that export.
#[derive(Debug, Clone, Default)]
pub struct ExportPaths {
    pub classified_csv: Option<PathBuf>,
    pub tree_json: Option<PathBuf>,
}

impl ExportPaths {
    /// Both exports under `dir` with their default file names.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            classified_csv: Some(dir.join(DEFAULT_CLASSIFIED_CSV)),
            tree_json: Some(dir.join(DEFAULT_TREE_JSON)),
        }
    }
}

/// Write every configured export, recording failures on the report.
pub fn write_exports(
    tree: &TaxonomyTree,
    table: &ContributionTable,
    report: &mut RunReport,
    paths: &ExportPaths,
) {
    if let Some(path) = &paths.classified_csv {
        if let Err(e) = write_classified_csv(table, &report.outcomes, path) {
            report.warn(format!("classified table not written: {e}"));
        }
    }
    if let Some(path) = &paths.tree_json {
        if let Err(e) = export_tree_json(tree, path) {
            report.warn(format!("taxonomy JSON not written: {e}"));
        }
    }
}
