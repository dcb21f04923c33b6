//! anomtree Core Prelude: convenient imports for common usage.
//!
//! ```rust
//! use anomtree_core::prelude::*;
//! ```

pub use crate::error::TaxonomyError;
pub use crate::node::{TaxonomyNode, TemplateRecord};
pub use crate::record::{Domain, DomainGroup, DomainScore, Record, RecordBuilder, SensorValue};
pub use crate::store::{sanitize_timestamp, RecoveryAction};
pub use crate::tree::{RootView, StructureView, TaxonomyTree, TreeStats, ROOT_NAME};
