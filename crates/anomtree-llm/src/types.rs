//! Typed oracle replies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four questions the engine puts to the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryKind {
    /// Turn a record into a one-sentence template.
    Template,
    /// Pick where a template belongs in the current tree.
    Route,
    /// Propose a new branch for a template.
    Addition,
    /// Decide whether a leaf should split in two.
    Split,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryKind::Template => "template",
            QueryKind::Route => "route",
            QueryKind::Addition => "addition",
            QueryKind::Split => "split",
        };
        f.write_str(s)
    }
}

/// Reply to a template-extraction query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateReply {
    pub template: String,
}

/// Reply to a route-selection query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteReply {
    pub explanation: Option<String>,
    /// Proposed category path; empty means "new top-level category".
    pub segments: Vec<String>,
    /// The oracle's own claim that the whole route exists, if it made one.
    pub claimed_found: Option<bool>,
}

/// Reply to a branch-creation query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionReply {
    pub explanation: Option<String>,
    /// Category path with the end sentinel removed; never empty.
    pub segments: Vec<String>,
}

/// Outcome of a split query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitDecision {
    /// Existing templates go to `first`, the new one to `second`.
    Split { first: String, second: String },
    /// Keep the leaf as it is and append the new template.
    Keep,
}

/// Reply to a split-decision query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitReply {
    pub explanation: Option<String>,
    pub decision: SplitDecision,
}

/// Any validated oracle reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleReply {
    Template(TemplateReply),
    Route(RouteReply),
    Addition(AdditionReply),
    Split(SplitReply),
}

impl OracleReply {
    pub fn kind(&self) -> QueryKind {
        match self {
            OracleReply::Template(_) => QueryKind::Template,
            OracleReply::Route(_) => QueryKind::Route,
            OracleReply::Addition(_) => QueryKind::Addition,
            OracleReply::Split(_) => QueryKind::Split,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_kind() {
        let reply = OracleReply::Split(SplitReply {
            explanation: None,
            decision: SplitDecision::Keep,
        });
        assert_eq!(reply.kind(), QueryKind::Split);
        assert_eq!(QueryKind::Addition.to_string(), "addition");
    }
}
