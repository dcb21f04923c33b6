//! anomtree Runtime Prelude.

pub use crate::error::{RuntimeError, RuntimeResult};
pub use crate::expansion::{ExpansionEngine, Placement, PlacementKind};
pub use crate::export::{export_tree_json, write_classified_csv, write_exports, ExportPaths};
pub use crate::orchestrator::{ClassificationOutcome, RunReport, TaxonomyOrchestrator};
pub use crate::routing::{reconcile, VerifiedRoute};
pub use crate::session::{Action, ClassificationEvent, TaxonomySession};
pub use crate::table::{ContributionRow, ContributionTable};
