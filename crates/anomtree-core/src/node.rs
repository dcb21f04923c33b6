//! Taxonomy nodes.
//!
//! A node owns its children outright and, while it is a leaf, an ordered list
//! of template records mirrored from its storage directory.

use crate::error::{Result, TaxonomyError};
use crate::store;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One stored template: its identity key and text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    /// Sanitized timestamp token, also the file stem on disk.
    pub key: String,
    /// Raw template text.
    pub text: String,
}

impl TemplateRecord {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }
}

/// A category in the anomaly taxonomy.
#[derive(Debug, Clone)]
pub struct TaxonomyNode {
    /// Category label, unique among siblings.
    pub name: String,
    /// Children by name. Iteration follows name order, same as a storage scan.
    pub children: BTreeMap<String, TaxonomyNode>,
    templates: Vec<TemplateRecord>,
    location: Option<PathBuf>,
}

impl TaxonomyNode {
    /// Create a node with no storage behind it.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: BTreeMap::new(),
            templates: Vec::new(),
            location: None,
        }
    }

    /// Create a node backed by a storage directory.
    pub fn with_location(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        let mut node = Self::new(name);
        node.location = Some(location.into());
        node
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn templates(&self) -> &[TemplateRecord] {
        &self.templates
    }

    /// Template texts in storage order.
    pub fn template_texts(&self) -> Vec<String> {
        self.templates.iter().map(|t| t.text.clone()).collect()
    }

    /// Most recent template (last in file-name order).
    pub fn latest_template(&self) -> Option<&str> {
        self.templates.last().map(|t| t.text.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&TaxonomyNode> {
        self.children.get(name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut TaxonomyNode> {
        self.children.get_mut(name)
    }

    /// Re-read template records from storage, replacing the in-memory list.
    ///
    /// A node without a location, or whose directory does not exist yet,
    /// ends up with an empty list.
    pub fn reload_templates(&mut self) -> Result<()> {
        self.templates = match &self.location {
            Some(dir) => store::load_templates(dir)?,
            None => Vec::new(),
        };
        Ok(())
    }

    /// Durably store a template under this node, keyed by `ts`.
    ///
    /// Fails with `InvalidArgument` on a blank timestamp and `InvalidState`
    /// when the node has no storage location. On success the in-memory list
    /// is reloaded from storage.
    pub fn append_template(&mut self, text: &str, ts: &str) -> Result<()> {
        if ts.trim().is_empty() {
            return Err(TaxonomyError::InvalidArgument(format!(
                "timestamp is required for node '{}'",
                self.name
            )));
        }
        let dir = self.location.clone().ok_or_else(|| {
            TaxonomyError::InvalidState(format!("storage location not set for node '{}'", self.name))
        })?;
        if !self.is_leaf() {
            return Err(TaxonomyError::InvalidState(format!(
                "node '{}' has children and cannot hold templates",
                self.name
            )));
        }

        let key = store::sanitize_timestamp(ts);
        store::write_template(&dir, &key, text)?;
        debug!(node = %self.name, key = %key, "template appended");
        self.reload_templates()
    }

    /// Turn this leaf into an internal node with two freshly split children.
    ///
    /// Storage must already reflect the split (see [`store::split_leaf`]).
    pub(crate) fn adopt_split(&mut self, first: TaxonomyNode, second: TaxonomyNode) {
        self.templates.clear();
        self.children.clear();
        self.children.insert(first.name.clone(), first);
        self.children.insert(second.name.clone(), second);
    }

    /// Attach a child node, replacing any child of the same name.
    pub(crate) fn insert_child(&mut self, child: TaxonomyNode) -> &mut TaxonomyNode {
        match self.children.entry(child.name.clone()) {
            Entry::Occupied(mut slot) => {
                slot.insert(child);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(child),
        }
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_size(&self) -> usize {
        1 + self.children.values().map(|c| c.subtree_size()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_leaf_until_children() {
        let mut node = TaxonomyNode::new("Temp-related");
        assert!(node.is_leaf());
        node.insert_child(TaxonomyNode::new("SingleSensorDrift"));
        assert!(!node.is_leaf());
    }

    #[test]
    fn test_append_requires_timestamp() {
        let tmp = TempDir::new().unwrap();
        let mut node = TaxonomyNode::with_location("A", tmp.path().join("A"));
        let err = node.append_template("text", "   ").unwrap_err();
        assert!(matches!(err, TaxonomyError::InvalidArgument(_)));
        assert!(node.templates().is_empty());
    }

    #[test]
    fn test_append_requires_location() {
        let mut node = TaxonomyNode::new("A");
        let err = node.append_template("text", "2025-01-01 00:00:00").unwrap_err();
        assert!(matches!(err, TaxonomyError::InvalidState(_)));
    }

    #[test]
    fn test_append_then_reload_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut node = TaxonomyNode::with_location("A", tmp.path().join("A"));
        node.append_template("Temp1 jumps sharply", "2025-01-01 00:00:01").unwrap();
        node.append_template("Temp2 drifts", "2025-01-01 00:00:02").unwrap();

        assert_eq!(node.templates()[0].key, "20250101_000001");
        node.reload_templates().unwrap();
        assert!(node.template_texts().contains(&"Temp1 jumps sharply".to_string()));
        assert_eq!(node.latest_template(), Some("Temp2 drifts"));
    }

    #[test]
    fn test_dot_leading_timestamp_is_reloaded() {
        let tmp = TempDir::new().unwrap();
        let mut node = TaxonomyNode::with_location("A", tmp.path().join("A"));
        node.append_template("half a second in", ".5").unwrap();
        assert_eq!(node.template_texts(), vec!["half a second in"]);
    }

    #[test]
    fn test_reload_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut node = TaxonomyNode::with_location("A", tmp.path().join("A"));
        node.append_template("one", "b").unwrap();
        node.append_template("two", "a").unwrap();

        node.reload_templates().unwrap();
        let first = node.templates().to_vec();
        node.reload_templates().unwrap();
        assert_eq!(first, node.templates());
        assert_eq!(node.template_texts(), vec!["two", "one"]);
    }

    #[test]
    fn test_reload_missing_location_is_empty() {
        let tmp = TempDir::new().unwrap();
        let mut node = TaxonomyNode::with_location("A", tmp.path().join("never-created"));
        node.reload_templates().unwrap();
        assert!(node.templates().is_empty());
    }

    #[test]
    fn test_internal_node_rejects_templates() {
        let tmp = TempDir::new().unwrap();
        let mut node = TaxonomyNode::with_location("A", tmp.path().join("A"));
        node.insert_child(TaxonomyNode::new("B"));
        let err = node.append_template("text", "ts").unwrap_err();
        assert!(matches!(err, TaxonomyError::InvalidState(_)));
    }
}
