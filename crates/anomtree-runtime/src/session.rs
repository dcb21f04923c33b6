//! TaxonomySession: one tree, one oracle, one mutation at a time.

use crate::error::RuntimeResult;
use crate::expansion::{ExpansionEngine, Placement};
use crate::routing::{self, VerifiedRoute};
use anomtree_core::error::TaxonomyError;
use anomtree_core::tree::TaxonomyTree;
use anomtree_llm::Oracle;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Everything needed to place one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationEvent {
    pub template: String,
    /// Reconciled route; may be empty.
    pub route: Vec<String>,
    /// Whether the whole route was verified to exist.
    pub found: bool,
    pub timestamp: String,
}

impl ClassificationEvent {
    pub fn new(template: impl Into<String>, route: VerifiedRoute, timestamp: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            route: route.segments,
            found: route.found,
            timestamp: timestamp.into(),
        }
    }
}

/// Which expansion an event calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Ask for a new branch from the root.
    CreateBranch,
    /// Offer the leaf at this path a split.
    RefineLeaf(Vec<String>),
}

/// Owns a tree and the oracle that grows it.
///
/// Methods that mutate take `&mut self`, so a session applies events
/// strictly one after another.
#[derive(Debug)]
pub struct TaxonomySession {
    tree: TaxonomyTree,
    oracle: Oracle,
}

impl TaxonomySession {
    pub fn new(tree: TaxonomyTree, oracle: Oracle) -> Self {
        Self { tree, oracle }
    }

    /// Load (or reset) the tree stored at `base_path`.
    pub fn open(base_path: impl Into<PathBuf>, reset: bool, oracle: Oracle) -> RuntimeResult<Self> {
        let tree = TaxonomyTree::load(base_path, reset)?;
        Ok(Self::new(tree, oracle))
    }

    pub fn tree(&self) -> &TaxonomyTree {
        &self.tree
    }

    pub fn oracle(&self) -> &Oracle {
        &self.oracle
    }

    pub fn into_tree(self) -> TaxonomyTree {
        self.tree
    }

    /// Decide the expansion for an event against the current tree.
    pub fn decide(&self, event: &ClassificationEvent) -> Action {
        if event.route.is_empty() || !event.found {
            return Action::CreateBranch;
        }
        match self.tree.node_at(&event.route) {
            None => {
                warn!(route = %event.route.join(" -> "), "verified route vanished; creating a branch");
                Action::CreateBranch
            }
            Some(node) if node.is_leaf() => Action::RefineLeaf(event.route.clone()),
            Some(_) => Action::CreateBranch,
        }
    }

    /// Apply one event to the tree.
    pub async fn apply(&mut self, event: &ClassificationEvent) -> RuntimeResult<Placement> {
        if event.timestamp.trim().is_empty() {
            return Err(TaxonomyError::InvalidArgument(
                "a timestamp is required to store a template".to_string(),
            )
            .into());
        }

        let action = self.decide(event);
        debug!(?action, "expansion chosen");

        let engine = ExpansionEngine::new(&self.oracle);
        match action {
            Action::CreateBranch => {
                engine
                    .create_branch(&mut self.tree, &event.template, &event.timestamp)
                    .await
            }
            Action::RefineLeaf(path) => {
                engine
                    .refine_leaf(&mut self.tree, &path, &event.template, &event.timestamp)
                    .await
            }
        }
    }

    /// Route a template and apply it.
    pub async fn classify(&mut self, template: &str, timestamp: &str) -> RuntimeResult<Placement> {
        let route = routing::route(&self.tree, &self.oracle, template).await?;
        let event = ClassificationEvent::new(template, route, timestamp);
        self.apply(&event).await
    }
}
