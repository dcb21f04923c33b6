//! RoutingProtocol: ask the oracle where a template belongs, then check the
//! answer against the real tree.
//!
//! The oracle's `Found` claim is advisory. A route only counts as found when
//! every segment exists, and a multi-level route under a missing top-level
//! anchor is cut back to that anchor alone.

use crate::error::RuntimeResult;
use anomtree_core::tree::TaxonomyTree;
use anomtree_llm::Oracle;
use serde::Serialize;
use tracing::{debug, warn};

/// A route after reconciliation with the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedRoute {
    pub segments: Vec<String>,
    pub found: bool,
}

impl VerifiedRoute {
    pub fn display(&self) -> String {
        self.segments.join(" -> ")
    }
}

/// Reconcile a proposed route with the tree.
///
/// An empty route means "new top-level category" and is never found.
pub fn reconcile(tree: &TaxonomyTree, segments: Vec<String>, claimed: Option<bool>) -> VerifiedRoute {
    if segments.is_empty() {
        return VerifiedRoute {
            segments,
            found: false,
        };
    }

    if segments.len() > 1 && tree.root().child(&segments[0]).is_none() {
        warn!(
            route = %segments.join(" -> "),
            "route starts under a missing top-level category; truncating"
        );
        return VerifiedRoute {
            segments: vec![segments[0].clone()],
            found: false,
        };
    }

    let exists_all = tree.contains_route(&segments);
    let found = match claimed {
        None => exists_all,
        Some(claim) => {
            if claim && !exists_all {
                warn!(route = %segments.join(" -> "), "oracle claimed a route that does not exist");
            }
            claim && exists_all
        }
    };

    VerifiedRoute { segments, found }
}

/// Ask the oracle for a route and reconcile it.
pub async fn route(tree: &TaxonomyTree, oracle: &Oracle, template: &str) -> RuntimeResult<VerifiedRoute> {
    let reply = oracle.select_route(&tree.root_view(false), template).await?;
    debug!(
        route = %reply.segments.join(" -> "),
        claimed = ?reply.claimed_found,
        explanation = reply.explanation.as_deref().unwrap_or(""),
        "route proposed"
    );
    Ok(reconcile(tree, reply.segments, reply.claimed_found))
}
