//! The taxonomy tree and its structural views.
//!
//! The tree is rehydrated from storage at startup and mutated in place, one
//! template at a time. Every mutation writes through to storage before the
//! in-memory structure changes, so re-scanning the base directory always
//! reproduces the same tree.

use crate::error::{Result, TaxonomyError};
use crate::node::TaxonomyNode;
use crate::store::{self, RecoveryAction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name given to the implicit root node.
pub const ROOT_NAME: &str = "root";

/// Nested structural view of a (sub)tree.
///
/// Leaves render as a list of template texts, internal nodes as a map from
/// child name to the child's view. This is the payload shown to the oracle
/// and written to the exported taxonomy JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StructureView {
    Leaf(Vec<String>),
    Internal(BTreeMap<String, StructureView>),
}

/// Rootless view: top-level category name to its view.
pub type RootView = BTreeMap<String, StructureView>;

/// Summary counts for a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub categories: usize,
    pub leaves: usize,
    pub templates: usize,
    pub depth: usize,
}

/// A persisted anomaly taxonomy.
#[derive(Debug, Clone)]
pub struct TaxonomyTree {
    root: TaxonomyNode,
    base_path: PathBuf,
}

impl TaxonomyTree {
    /// Load the tree stored under `base_path`.
    ///
    /// With `reset` the existing storage is wiped first. Interrupted splits
    /// are recovered before anything is read.
    pub fn load(base_path: impl Into<PathBuf>, reset: bool) -> Result<Self> {
        let base_path = base_path.into();
        if reset && base_path.exists() {
            std::fs::remove_dir_all(&base_path).map_err(|e| TaxonomyError::io(&base_path, e))?;
            info!(path = %base_path.display(), "taxonomy storage reset");
        }
        std::fs::create_dir_all(&base_path).map_err(|e| TaxonomyError::io(&base_path, e))?;

        let recovered = store::recover_pending_splits(&base_path)?;
        if !recovered.is_empty() {
            warn!(count = recovered.len(), "recovered interrupted splits while loading");
        }

        let root = build_node(ROOT_NAME, &base_path)?;
        Ok(Self { root, base_path })
    }

    /// Run split recovery without loading, reporting what was done.
    pub fn recover(base_path: &Path) -> Result<Vec<RecoveryAction>> {
        store::recover_pending_splits(base_path)
    }

    /// Re-derive a fresh tree from storage, leaving this one untouched.
    pub fn rescan(&self) -> Result<Self> {
        Ok(Self {
            root: build_node(ROOT_NAME, &self.base_path)?,
            base_path: self.base_path.clone(),
        })
    }

    pub fn root(&self) -> &TaxonomyNode {
        &self.root
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_leaf()
    }

    /// Structural view of `node`.
    ///
    /// In display mode a leaf shows only its most recent template.
    pub fn structure_view(&self, node: &TaxonomyNode, display_mode: bool) -> StructureView {
        structure_view(node, display_mode)
    }

    /// View of the whole tree without a root key; an empty tree is `{}`.
    pub fn root_view(&self, display_mode: bool) -> RootView {
        self.root
            .children
            .iter()
            .map(|(name, child)| (name.clone(), structure_view(child, display_mode)))
            .collect()
    }

    /// Category names from the root to the leaf holding `text`.
    ///
    /// Depth-first, exact match; empty when the text is not stored anywhere.
    pub fn find_path_by_template(&self, text: &str) -> Vec<String> {
        fn dfs(node: &TaxonomyNode, path: &mut Vec<String>, text: &str) -> bool {
            if node.templates().iter().any(|t| t.text == text) {
                return true;
            }
            for (name, child) in &node.children {
                path.push(name.clone());
                if dfs(child, path, text) {
                    return true;
                }
                path.pop();
            }
            false
        }

        let mut path = Vec::new();
        if dfs(&self.root, &mut path, text) {
            path
        } else {
            Vec::new()
        }
    }

    /// How many leading segments of `route` resolve to existing nodes.
    pub fn existing_prefix_len(&self, route: &[String]) -> usize {
        let mut node = &self.root;
        for (depth, segment) in route.iter().enumerate() {
            match node.child(segment) {
                Some(child) => node = child,
                None => return depth,
            }
        }
        route.len()
    }

    /// True when every segment of `route` exists, walking from the root.
    pub fn contains_route(&self, route: &[String]) -> bool {
        self.existing_prefix_len(route) == route.len()
    }

    pub fn node_at(&self, path: &[String]) -> Option<&TaxonomyNode> {
        path.iter().try_fold(&self.root, |node, name| node.child(name))
    }

    pub fn node_at_mut(&mut self, path: &[String]) -> Option<&mut TaxonomyNode> {
        path.iter()
            .try_fold(&mut self.root, |node, name| node.child_mut(name))
    }

    fn require_mut(&mut self, path: &[String]) -> Result<&mut TaxonomyNode> {
        self.node_at_mut(path)
            .ok_or_else(|| TaxonomyError::node_not_found(path))
    }

    /// Append a template to the leaf at `path`.
    pub fn append_at(&mut self, path: &[String], text: &str, ts: &str) -> Result<()> {
        if path.is_empty() {
            return Err(TaxonomyError::InvalidState(
                "templates cannot be stored on the root".to_string(),
            ));
        }
        self.require_mut(path)?.append_template(text, ts)
    }

    /// Create category `name` under `parent` and store the template in it.
    ///
    /// Returns the path of the new node.
    pub fn create_child(
        &mut self,
        parent: &[String],
        name: &str,
        text: &str,
        ts: &str,
    ) -> Result<Vec<String>> {
        let name = store::validate_category_name(name)?.to_string();
        if ts.trim().is_empty() {
            return Err(TaxonomyError::InvalidArgument(format!(
                "timestamp is required for new category '{name}'"
            )));
        }

        let parent_node = self.require_mut(parent)?;
        if parent_node.child(&name).is_some() {
            return Err(TaxonomyError::InvalidState(format!(
                "category '{name}' already exists"
            )));
        }
        if !parent_node.templates().is_empty() {
            return Err(TaxonomyError::InvalidState(format!(
                "'{}' holds templates; leaves grow by splitting",
                parent_node.name
            )));
        }
        let parent_dir = parent_node.location().map(Path::to_path_buf).ok_or_else(|| {
            TaxonomyError::InvalidState(format!(
                "storage location not set for node '{}'",
                parent_node.name
            ))
        })?;

        let dir = store::create_category_dir(&parent_dir, &name)?;
        let mut child = TaxonomyNode::with_location(name.clone(), dir);
        child.append_template(text, ts)?;
        parent_node.insert_child(child);

        let mut path = parent.to_vec();
        path.push(name);
        info!(path = %path.join(" -> "), "created category");
        Ok(path)
    }

    /// Split the leaf at `path` into `first` (existing templates) and
    /// `second` (the new template).
    ///
    /// Returns the path of `second`.
    pub fn split_leaf(
        &mut self,
        path: &[String],
        first: &str,
        second: &str,
        text: &str,
        ts: &str,
    ) -> Result<Vec<String>> {
        if path.is_empty() {
            return Err(TaxonomyError::InvalidState("the root cannot be split".to_string()));
        }
        if ts.trim().is_empty() {
            return Err(TaxonomyError::InvalidArgument(
                "timestamp is required for a split".to_string(),
            ));
        }

        let leaf = self.require_mut(path)?;
        if !leaf.is_leaf() {
            return Err(TaxonomyError::InvalidState(format!(
                "'{}' is not a leaf",
                leaf.name
            )));
        }
        let dir = leaf.location().map(Path::to_path_buf).ok_or_else(|| {
            TaxonomyError::InvalidState(format!("storage location not set for node '{}'", leaf.name))
        })?;

        let key = store::sanitize_timestamp(ts);
        let (first_dir, second_dir) = store::split_leaf(&dir, first, second, &key, text)?;

        let first = store::validate_category_name(first)?.to_string();
        let second = store::validate_category_name(second)?.to_string();
        let mut first_node = TaxonomyNode::with_location(first, first_dir);
        let mut second_node = TaxonomyNode::with_location(second.clone(), second_dir);
        first_node.reload_templates()?;
        second_node.reload_templates()?;
        leaf.adopt_split(first_node, second_node);

        let mut second_path = path.to_vec();
        second_path.push(second);
        info!(leaf = %path.join(" -> "), "split leaf");
        Ok(second_path)
    }

    pub fn stats(&self) -> TreeStats {
        fn walk(node: &TaxonomyNode, depth: usize, stats: &mut TreeStats) {
            stats.depth = stats.depth.max(depth);
            stats.templates += node.templates().len();
            if depth > 0 {
                stats.categories += 1;
                if node.is_leaf() {
                    stats.leaves += 1;
                }
            }
            for child in node.children.values() {
                walk(child, depth + 1, stats);
            }
        }

        let mut stats = TreeStats::default();
        walk(&self.root, 0, &mut stats);
        stats
    }
}

fn structure_view(node: &TaxonomyNode, display_mode: bool) -> StructureView {
    if node.is_leaf() {
        let texts = if display_mode {
            node.latest_template().map(|t| vec![t.to_string()]).unwrap_or_default()
        } else {
            node.template_texts()
        };
        return StructureView::Leaf(texts);
    }
    StructureView::Internal(
        node.children
            .iter()
            .map(|(name, child)| (name.clone(), structure_view(child, display_mode)))
            .collect(),
    )
}

fn build_node(name: &str, dir: &Path) -> Result<TaxonomyNode> {
    let mut node = TaxonomyNode::with_location(name, dir);
    for (child_name, child_dir) in store::category_dirs(dir)? {
        let child = build_node(&child_name, &child_dir)?;
        node.insert_child(child);
    }
    node.reload_templates()?;
    Ok(node)
}
