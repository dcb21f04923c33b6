//! # anomtree
//!
//! Self-organizing anomaly taxonomies grown from natural-language templates.
//!
//! Each anomaly row is condensed into a [`Record`](prelude::Record), turned
//! into a one-sentence template by an external oracle, and filed into a
//! persisted category tree. A template either joins an existing leaf, opens
//! a new category, or splits a leaf into two finer categories. The oracle
//! only proposes; the tree checks every proposal against its own structure.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use anomtree::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let oracle = Oracle::new(Arc::new(MockBackend::new()));
//! let table = ContributionTable::from_path(Path::new("scores.csv"))?;
//! let session = TaxonomySession::open("templates_storage", false, oracle)?;
//!
//! let mut orchestrator = TaxonomyOrchestrator::new(session, table.record_builder());
//! let mut report = orchestrator.run(&table.rows()).await;
//!
//! let session = orchestrator.into_session();
//! write_exports(session.tree(), &table, &mut report, &ExportPaths::in_dir("out"));
//! println!("{} classified, {} skipped", report.processed(), report.skipped());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`anomtree_core`] - Taxonomy nodes, storage layout, tree views, records
//! - [`anomtree_llm`] - Oracle backends, prompts and strict reply parsing
//! - [`anomtree_runtime`] - Routing, expansion, sessions and batch runs
//!
//! ## Storage
//!
//! One directory per category, one `<timestamp>.txt` file per template.
//! Leaf splits are staged next to the leaf and published by rename; entries
//! whose names start with `.` belong to that machinery and are never read
//! as categories.

pub use anomtree_core as core;
pub use anomtree_llm as llm;
pub use anomtree_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust
/// use anomtree::prelude::*;
/// ```
pub mod prelude {
    pub use anomtree_core::prelude::*;
    pub use anomtree_llm::prelude::*;
    pub use anomtree_runtime::prelude::*;
}
