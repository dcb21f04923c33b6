//! ExpansionEngine: grows the tree by one template.
//!
//! Two moves exist. Branch creation walks an oracle-proposed path and creates
//! at most one new category per call. Leaf refinement asks whether a leaf
//! should split in two and otherwise appends to it. The pure `apply_*`
//! functions perform the mutation for an already parsed reply so they can be
//! exercised without an oracle.

use crate::error::RuntimeResult;
use anomtree_core::error::{Result, TaxonomyError};
use anomtree_core::tree::TaxonomyTree;
use anomtree_llm::{Oracle, SplitDecision};
use serde::Serialize;
use tracing::{debug, info, warn};

/// What a mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlacementKind {
    /// A new category was created to hold the template.
    CreatedCategory,
    /// The template joined an existing leaf.
    Appended,
    /// A leaf split; the template went to the second child.
    Split,
}

/// Where a template ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub path: Vec<String>,
    pub kind: PlacementKind,
}

impl Placement {
    fn new(path: Vec<String>, kind: PlacementKind) -> Self {
        Self { path, kind }
    }
}

/// Apply a branch-creation path.
///
/// Existing segments are descended; the first missing one is created under
/// the deepest existing node and receives the template. Later segments are
/// left for future records. When the whole path exists the template is
/// appended to its last node, which must be a leaf.
pub fn apply_addition(
    tree: &mut TaxonomyTree,
    segments: &[String],
    template: &str,
    ts: &str,
) -> Result<Placement> {
    if segments.is_empty() {
        return Err(TaxonomyError::InvalidArgument(
            "addition path is empty".to_string(),
        ));
    }

    let depth = tree.existing_prefix_len(segments);
    if depth == segments.len() {
        let target = tree
            .node_at(segments)
            .ok_or_else(|| TaxonomyError::node_not_found(segments))?;
        if !target.is_leaf() {
            return Err(TaxonomyError::InvalidState(format!(
                "'{}' has subcategories and cannot hold templates",
                target.name
            )));
        }
        tree.append_at(segments, template, ts)?;
        return Ok(Placement::new(segments.to_vec(), PlacementKind::Appended));
    }

    let parent = &segments[..depth];
    let parent_holds_templates = tree
        .node_at(parent)
        .map(|node| !node.templates().is_empty())
        .unwrap_or(false);
    if parent_holds_templates {
        // Leaves only grow children by splitting.
        warn!(
            leaf = %parent.join(" -> "),
            missing = %segments[depth],
            "addition path continues below a populated leaf; appending to the leaf"
        );
        tree.append_at(parent, template, ts)?;
        return Ok(Placement::new(parent.to_vec(), PlacementKind::Appended));
    }

    let path = tree.create_child(parent, &segments[depth], template, ts)?;
    if depth + 1 < segments.len() {
        debug!(
            skipped = %segments[depth + 1..].join(" -> "),
            "deeper segments deferred to later records"
        );
    }
    Ok(Placement::new(path, PlacementKind::CreatedCategory))
}

/// Apply a split decision to the leaf at `leaf_path`.
pub fn apply_split(
    tree: &mut TaxonomyTree,
    leaf_path: &[String],
    decision: &SplitDecision,
    template: &str,
    ts: &str,
) -> Result<Placement> {
    match decision {
        SplitDecision::Split { first, second } => {
            let path = tree.split_leaf(leaf_path, first, second, template, ts)?;
            Ok(Placement::new(path, PlacementKind::Split))
        }
        SplitDecision::Keep => {
            tree.append_at(leaf_path, template, ts)?;
            Ok(Placement::new(leaf_path.to_vec(), PlacementKind::Appended))
        }
    }
}

/// Oracle-driven expansion of one tree.
#[derive(Debug, Clone, Copy)]
pub struct ExpansionEngine<'a> {
    oracle: &'a Oracle,
}

impl<'a> ExpansionEngine<'a> {
    pub fn new(oracle: &'a Oracle) -> Self {
        Self { oracle }
    }

    /// Horizontal expansion: ask for an addition path and apply it.
    pub async fn create_branch(
        &self,
        tree: &mut TaxonomyTree,
        template: &str,
        ts: &str,
    ) -> RuntimeResult<Placement> {
        let reply = self
            .oracle
            .propose_addition(&tree.root_view(false), template)
            .await?;
        debug!(
            path = %reply.segments.join(" -> "),
            explanation = reply.explanation.as_deref().unwrap_or(""),
            "addition proposed"
        );

        let placement = apply_addition(tree, &reply.segments, template, ts)?;
        info!(path = %placement.path.join(" -> "), kind = ?placement.kind, "branch expansion");
        Ok(placement)
    }

    /// Vertical expansion: split the leaf or append to it.
    pub async fn refine_leaf(
        &self,
        tree: &mut TaxonomyTree,
        leaf_path: &[String],
        template: &str,
        ts: &str,
    ) -> RuntimeResult<Placement> {
        let leaf = tree
            .node_at(leaf_path)
            .ok_or_else(|| TaxonomyError::node_not_found(leaf_path))?;
        let existing = leaf.template_texts();
        let name = leaf.name.clone();

        let decision = if existing.is_empty() {
            SplitDecision::Keep
        } else {
            let reply = self.oracle.decide_split(&name, &existing, template).await?;
            debug!(
                leaf = %name,
                decision = ?reply.decision,
                explanation = reply.explanation.as_deref().unwrap_or(""),
                "split decided"
            );
            reply.decision
        };

        let placement = apply_split(tree, leaf_path, &decision, template, ts)?;
        info!(path = %placement.path.join(" -> "), kind = ?placement.kind, "leaf expansion");
        Ok(placement)
    }
}
