//! NodeStore: the on-disk layout behind a taxonomy.
//!
//! One directory per node. Internal nodes hold only sub-directories, leaves
//! hold `<token>.txt` template files whose name is the sanitized timestamp and
//! whose content is the raw UTF-8 template text.
//!
//! Names starting with `.` are reserved for split bookkeeping and are never
//! treated as categories or templates.
//!
//! ## Split publication
//!
//! A leaf split touches many files, so it is staged next to the leaf and then
//! swapped in with two renames:
//!
//! 1. write `.split-<id>.json` (the pending marker) in the leaf's parent
//! 2. build `.staging-<id>/<first>/` (copies of the leaf's templates) and
//!    `.staging-<id>/<second>/` (the new template)
//! 3. rename `<leaf>` to `.retired-<id>`, rename `.staging-<id>` to `<leaf>`
//! 4. delete `.retired-<id>` and the marker
//!
//! [`recover_pending_splits`] finishes or undoes whatever a crash left behind.

use crate::error::{IoContext, Result, TaxonomyError};
use crate::node::TemplateRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File extension of template files.
pub const TEMPLATE_EXT: &str = "txt";

const MARKER_PREFIX: &str = ".split-";
const MARKER_SUFFIX: &str = ".json";
const MAX_CATEGORY_LEN: usize = 200;

/// Turn a timestamp into a filesystem-safe token.
///
/// Strips `:`, `-`, `/` and `\`, and replaces spaces with `_`. A token that
/// would be empty or start with `.` gets a `_` prefix so it never collides
/// with reserved names.
///
/// ```
/// use anomtree_core::store::sanitize_timestamp;
/// assert_eq!(sanitize_timestamp("2025-03-01 12:30:05"), "20250301_123005");
/// assert_eq!(sanitize_timestamp(".5"), "_.5");
/// ```
pub fn sanitize_timestamp(ts: &str) -> String {
    let token: String = ts
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '/' | '\\'))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();
    if token.is_empty() || is_reserved(&token) {
        format!("_{token}")
    } else {
        token
    }
}

/// True for entries the store keeps for itself.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with('.')
}

/// Check that a category name can safely become a directory name.
pub fn validate_category_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    let bad = trimmed.is_empty()
        || trimmed.len() > MAX_CATEGORY_LEN
        || is_reserved(trimmed)
        || trimmed.chars().any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control());
    if bad {
        return Err(TaxonomyError::invalid_category(name));
    }
    Ok(trimmed)
}

/// Template files of a directory, sorted by file name.
///
/// A missing directory yields an empty list.
pub fn template_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(TaxonomyError::io(dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.at(dir)?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if is_reserved(&name) || !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) == Some(TEMPLATE_EXT) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Read every template record stored in `dir`, in file-name order.
pub fn load_templates(dir: &Path) -> Result<Vec<TemplateRecord>> {
    template_files(dir)?
        .into_iter()
        .map(|path| {
            let text = fs::read_to_string(&path).at(&path)?;
            let key = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            Ok(TemplateRecord::new(key, text.trim()))
        })
        .collect()
}

/// Durably write one template keyed by its sanitized timestamp.
pub fn write_template(dir: &Path, key: &str, text: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).at(dir)?;
    let path = dir.join(format!("{key}.{TEMPLATE_EXT}"));
    if path.exists() {
        warn!(path = %path.display(), "template key already stored, overwriting");
    }
    fs::write(&path, text).at(&path)?;
    Ok(path)
}

/// Create the directory backing a new child category.
pub fn create_category_dir(parent: &Path, name: &str) -> Result<PathBuf> {
    let name = validate_category_name(name)?;
    let dir = parent.join(name);
    fs::create_dir_all(&dir).at(&dir)?;
    Ok(dir)
}

/// Category sub-directories of `dir`, sorted by name.
pub fn category_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(TaxonomyError::io(dir, e)),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.at(dir)?;
        let name = entry.file_name().to_string_lossy().to_string();
        if is_reserved(&name) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            dirs.push((name, path));
        }
    }
    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(dirs)
}

/// Bookkeeping for one in-flight split, stored as the pending marker.
///
/// All names are relative to the leaf's parent directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSplit {
    pub leaf: String,
    pub staging: String,
    pub retired: String,
    pub first: String,
    pub second: String,
}

impl PendingSplit {
    fn new(leaf: &str, first: &str, second: &str) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            leaf: leaf.to_string(),
            staging: format!(".staging-{id}"),
            retired: format!(".retired-{id}"),
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    // Marker, staging and retired names share one id.
    fn id(&self) -> &str {
        self.staging.trim_start_matches(".staging-")
    }

    fn marker_name(&self) -> String {
        format!("{MARKER_PREFIX}{}{MARKER_SUFFIX}", self.id())
    }
}

/// Split a leaf directory into two child categories.
///
/// Every existing template file ends up under `first`; the new template is
/// written under `second`. The leaf directory itself becomes the internal node.
pub fn split_leaf(
    leaf_dir: &Path,
    first: &str,
    second: &str,
    new_key: &str,
    new_text: &str,
) -> Result<(PathBuf, PathBuf)> {
    let first = validate_category_name(first)?;
    let second = validate_category_name(second)?;
    if first == second {
        return Err(TaxonomyError::InvalidArgument(format!(
            "split needs two distinct categories, got {first:?} twice"
        )));
    }
    let parent = leaf_dir.parent().ok_or_else(|| {
        TaxonomyError::InvalidState(format!("{} has no parent directory", leaf_dir.display()))
    })?;
    let leaf_name = leaf_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            TaxonomyError::InvalidState(format!("{} has no directory name", leaf_dir.display()))
        })?;

    let plan = PendingSplit::new(&leaf_name, first, second);
    write_marker(parent, &plan)?;

    let staging = parent.join(&plan.staging);
    stage(leaf_dir, &staging, &plan, new_key, new_text)?;
    publish(parent, &plan)?;

    debug!(leaf = %leaf_dir.display(), first, second, "split published");
    Ok((leaf_dir.join(first), leaf_dir.join(second)))
}

fn write_marker(parent: &Path, plan: &PendingSplit) -> Result<()> {
    let json = serde_json::to_string_pretty(plan)?;
    let marker = parent.join(plan.marker_name());
    let tmp = parent.join(format!("{}.tmp", plan.marker_name()));
    fs::write(&tmp, json).at(&tmp)?;
    fs::rename(&tmp, &marker).at(&marker)
}

fn stage(
    leaf_dir: &Path,
    staging: &Path,
    plan: &PendingSplit,
    new_key: &str,
    new_text: &str,
) -> Result<()> {
    let first_dir = staging.join(&plan.first);
    let second_dir = staging.join(&plan.second);
    fs::create_dir_all(&first_dir).at(&first_dir)?;
    fs::create_dir_all(&second_dir).at(&second_dir)?;

    for entry in fs::read_dir(leaf_dir).at(leaf_dir)? {
        let entry = entry.at(leaf_dir)?;
        let src = entry.path();
        if !src.is_file() {
            continue;
        }
        let is_template = src.extension().and_then(|e| e.to_str()) == Some(TEMPLATE_EXT);
        // Non-template files stay with the (now internal) node.
        let dest = if is_template {
            first_dir.join(entry.file_name())
        } else {
            staging.join(entry.file_name())
        };
        fs::copy(&src, &dest).at(&dest)?;
    }

    write_template(&second_dir, new_key, new_text)?;
    Ok(())
}

fn publish(parent: &Path, plan: &PendingSplit) -> Result<()> {
    let leaf = parent.join(&plan.leaf);
    let staging = parent.join(&plan.staging);
    let retired = parent.join(&plan.retired);
    let marker = parent.join(plan.marker_name());

    fs::rename(&leaf, &retired).at(&leaf)?;
    if let Err(e) = fs::rename(&staging, &leaf) {
        // Put the leaf back so the in-memory tree still matches storage.
        warn!(leaf = %leaf.display(), error = %e, "split publish failed, restoring leaf");
        fs::rename(&retired, &leaf).at(&retired)?;
        return Err(TaxonomyError::io(&staging, e));
    }
    fs::remove_dir_all(&retired).at(&retired)?;
    fs::remove_file(&marker).at(&marker)
}

/// Move files from `from` into `to`, keeping whatever `to` already holds.
fn restore_templates(from: &Path, to: &Path) -> Result<()> {
    for entry in fs::read_dir(from).at(from)? {
        let entry = entry.at(from)?;
        let src = entry.path();
        if !src.is_file() {
            continue;
        }
        let dest = to.join(entry.file_name());
        if dest.exists() {
            warn!(path = %dest.display(), "newer template kept over retired copy");
            continue;
        }
        fs::rename(&src, &dest).at(&dest)?;
    }
    Ok(())
}

/// What recovery did for one pending marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Staging was discarded; the leaf was never touched.
    RolledBack { leaf: PathBuf },
    /// The staged split was published.
    RolledForward { leaf: PathBuf },
    /// The split had completed; leftovers were removed.
    Cleaned { leaf: PathBuf },
    /// The marker could not be read and was removed.
    DiscardedMarker { marker: PathBuf },
}

/// Finish or undo interrupted splits anywhere under `root`.
pub fn recover_pending_splits(root: &Path) -> Result<Vec<RecoveryAction>> {
    let mut actions = Vec::new();
    recover_dir(root, &mut actions)?;
    Ok(actions)
}

fn recover_dir(dir: &Path, actions: &mut Vec<RecoveryAction>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(TaxonomyError::io(dir, e)),
    };

    let mut markers = Vec::new();
    for entry in entries {
        let entry = entry.at(dir)?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(MARKER_PREFIX) {
            continue;
        }
        if name.ends_with(".tmp") {
            // Crash before the marker was committed; nothing else was written.
            let path = entry.path();
            fs::remove_file(&path).at(&path)?;
        } else if name.ends_with(MARKER_SUFFIX) {
            markers.push(entry.path());
        }
    }
    markers.sort();

    for marker in markers {
        actions.push(recover_one(dir, &marker)?);
    }

    for (_, child) in category_dirs(dir)? {
        recover_dir(&child, actions)?;
    }
    Ok(())
}

fn recover_one(parent: &Path, marker: &Path) -> Result<RecoveryAction> {
    let plan: PendingSplit = match fs::read_to_string(marker)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
    {
        Some(plan) => plan,
        None => {
            warn!(marker = %marker.display(), "unreadable split marker, discarding");
            fs::remove_file(marker).at(marker)?;
            return Ok(RecoveryAction::DiscardedMarker {
                marker: marker.to_path_buf(),
            });
        }
    };

    let leaf = parent.join(&plan.leaf);
    let staging = parent.join(&plan.staging);
    let retired = parent.join(&plan.retired);

    let action = match (leaf.exists(), staging.exists(), retired.exists()) {
        // Swap never started: the staged copy may be partial, drop it.
        (true, true, false) => {
            fs::remove_dir_all(&staging).at(&staging)?;
            RecoveryAction::RolledBack { leaf: leaf.clone() }
        }
        // Leaf already retired: staging is complete, publish it.
        (false, true, _) => {
            fs::rename(&staging, &leaf).at(&staging)?;
            if retired.exists() {
                fs::remove_dir_all(&retired).at(&retired)?;
            }
            RecoveryAction::RolledForward { leaf: leaf.clone() }
        }
        // Retired but staging vanished: put the leaf back.
        (false, false, true) => {
            fs::rename(&retired, &leaf).at(&retired)?;
            RecoveryAction::RolledBack { leaf: leaf.clone() }
        }
        // The swap failed half way and the leaf was written to again since.
        // Retired holds the leaf's older templates; merge them back.
        (true, true, true) => {
            restore_templates(&retired, &leaf)?;
            fs::remove_dir_all(&retired).at(&retired)?;
            fs::remove_dir_all(&staging).at(&staging)?;
            RecoveryAction::RolledBack { leaf: leaf.clone() }
        }
        (_, _, retired_left) => {
            if retired_left {
                fs::remove_dir_all(&retired).at(&retired)?;
            }
            RecoveryAction::Cleaned { leaf: leaf.clone() }
        }
    };

    fs::remove_file(marker).at(marker)?;
    info!(?action, "recovered interrupted split");
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_timestamp() {
        assert_eq!(sanitize_timestamp("2025-03-01 12:30:05"), "20250301_123005");
        assert_eq!(sanitize_timestamp(" 2025/03/01\\x "), "20250301x");
        assert_eq!(
            sanitize_timestamp("2025-03-01T12:30:05-07:00"),
            "20250301T1230050700"
        );
        assert_eq!(sanitize_timestamp(".5"), "_.5");
        assert_eq!(sanitize_timestamp("::"), "_");
    }

    #[test]
    fn test_dot_timestamp_stays_visible() {
        let tmp = TempDir::new().unwrap();
        write_template(tmp.path(), &sanitize_timestamp(".5"), "fractional").unwrap();
        assert_eq!(load_templates(tmp.path()).unwrap()[0].text, "fractional");
    }

    #[test]
    fn test_validate_category_name() {
        assert_eq!(validate_category_name(" Temp-related ").unwrap(), "Temp-related");
        assert!(validate_category_name("").is_err());
        assert!(validate_category_name("   ").is_err());
        assert!(validate_category_name(".hidden").is_err());
        assert!(validate_category_name("a/b").is_err());
        assert!(validate_category_name("a\\b").is_err());
        assert!(validate_category_name("..").is_err());
    }

    #[test]
    fn test_missing_dir_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let templates = load_templates(&tmp.path().join("nope")).unwrap();
        assert!(templates.is_empty());
    }

    #[test]
    fn test_templates_sorted_and_reserved_skipped() {
        let tmp = TempDir::new().unwrap();
        write_template(tmp.path(), "20250102_000000", "second").unwrap();
        write_template(tmp.path(), "20250101_000000", "first").unwrap();
        fs::write(tmp.path().join(".hidden.txt"), "ignored").unwrap();
        fs::write(tmp.path().join("notes.md"), "ignored").unwrap();

        let templates = load_templates(tmp.path()).unwrap();
        let texts: Vec<&str> = templates.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(templates[0].key, "20250101_000000");
    }

    #[test]
    fn test_category_dirs_skip_reserved() {
        let tmp = TempDir::new().unwrap();
        create_category_dir(tmp.path(), "B").unwrap();
        create_category_dir(tmp.path(), "A").unwrap();
        fs::create_dir(tmp.path().join(".staging-x")).unwrap();

        let names: Vec<String> = category_dirs(tmp.path())
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_split_leaf_moves_templates() {
        let tmp = TempDir::new().unwrap();
        let leaf = create_category_dir(tmp.path(), "SingleSensorDrift").unwrap();
        write_template(&leaf, "t1", "old one").unwrap();
        write_template(&leaf, "t2", "old two").unwrap();

        let (first, second) =
            split_leaf(&leaf, "SuddenDrift", "SlowDrift", "t3", "new one").unwrap();

        assert!(template_files(&leaf).unwrap().is_empty());
        let moved: Vec<String> = load_templates(&first)
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(moved, vec!["old one", "old two"]);
        assert_eq!(load_templates(&second).unwrap()[0].text, "new one");

        // No bookkeeping left behind.
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| is_reserved(&e.file_name().to_string_lossy()))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_split_rejects_equal_names() {
        let tmp = TempDir::new().unwrap();
        let leaf = create_category_dir(tmp.path(), "Leaf").unwrap();
        assert!(split_leaf(&leaf, "Same", "Same", "k", "text").is_err());
    }

    fn half_split(parent: &Path) -> (PendingSplit, PathBuf) {
        let leaf = create_category_dir(parent, "Leaf").unwrap();
        write_template(&leaf, "t1", "old").unwrap();
        let plan = PendingSplit::new("Leaf", "A", "B");
        write_marker(parent, &plan).unwrap();
        stage(&leaf, &parent.join(&plan.staging), &plan, "t2", "new").unwrap();
        (plan, leaf)
    }

    #[test]
    fn test_recovery_rolls_back_unpublished_split() {
        let tmp = TempDir::new().unwrap();
        let (_plan, leaf) = half_split(tmp.path());

        let actions = recover_pending_splits(tmp.path()).unwrap();
        assert_eq!(actions, vec![RecoveryAction::RolledBack { leaf: leaf.clone() }]);
        assert_eq!(load_templates(&leaf).unwrap()[0].text, "old");
        assert!(category_dirs(&leaf).unwrap().is_empty());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_recovery_rolls_forward_after_retire() {
        let tmp = TempDir::new().unwrap();
        let (plan, leaf) = half_split(tmp.path());
        // Crash between the two renames.
        fs::rename(&leaf, tmp.path().join(&plan.retired)).unwrap();

        let actions = recover_pending_splits(tmp.path()).unwrap();
        assert_eq!(actions, vec![RecoveryAction::RolledForward { leaf: leaf.clone() }]);
        assert_eq!(load_templates(&leaf.join("A")).unwrap()[0].text, "old");
        assert_eq!(load_templates(&leaf.join("B")).unwrap()[0].text, "new");
        assert!(template_files(&leaf).unwrap().is_empty());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_recovery_restores_leaf_when_staging_lost() {
        let tmp = TempDir::new().unwrap();
        let (plan, leaf) = half_split(tmp.path());
        fs::rename(&leaf, tmp.path().join(&plan.retired)).unwrap();
        fs::remove_dir_all(tmp.path().join(&plan.staging)).unwrap();

        let actions = recover_pending_splits(tmp.path()).unwrap();
        assert_eq!(actions, vec![RecoveryAction::RolledBack { leaf: leaf.clone() }]);
        assert_eq!(load_templates(&leaf).unwrap()[0].text, "old");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_recovery_merges_retired_into_rewritten_leaf() {
        let tmp = TempDir::new().unwrap();
        let (plan, leaf) = half_split(tmp.path());
        // Swap stopped after retiring the leaf; a later append recreated it.
        fs::rename(&leaf, tmp.path().join(&plan.retired)).unwrap();
        write_template(&leaf, "t3", "later").unwrap();

        let actions = recover_pending_splits(tmp.path()).unwrap();
        assert_eq!(actions, vec![RecoveryAction::RolledBack { leaf: leaf.clone() }]);
        let texts: Vec<String> = load_templates(&leaf)
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["old", "later"]);
        assert!(category_dirs(&leaf).unwrap().is_empty());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_publish_puts_leaf_back() {
        let tmp = TempDir::new().unwrap();
        let leaf = create_category_dir(tmp.path(), "Leaf").unwrap();
        write_template(&leaf, "t1", "old").unwrap();
        let plan = PendingSplit::new("Leaf", "A", "B");
        write_marker(tmp.path(), &plan).unwrap();

        // Nothing staged, so the second rename fails.
        assert!(publish(tmp.path(), &plan).is_err());
        assert_eq!(load_templates(&leaf).unwrap()[0].text, "old");
        assert!(!tmp.path().join(&plan.retired).exists());
    }

    #[test]
    fn test_recovery_discards_uncommitted_marker() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".split-abc.json.tmp"), "{").unwrap();
        let actions = recover_pending_splits(tmp.path()).unwrap();
        assert!(actions.is_empty());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
