//! # anomtree Core
//!
//! Data model and storage for self-organizing anomaly taxonomies.
//!
//! - **TaxonomyNode** - a category; leaves carry template records
//! - **NodeStore** ([`store`]) - one directory per node, one file per template
//! - **TaxonomyTree** - rehydration, structural views, path lookup and the
//!   write-through mutations used by the expansion engine
//! - **RecordBuilder** - domain grouping and ranking of sensor contributions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use anomtree_core::prelude::*;
//!
//! let mut tree = TaxonomyTree::load("templates_storage", false)?;
//! tree.create_child(&[], "Temp-related", "Temp1 jumps sharply.", "2025-01-01 00:00:00")?;
//! println!("{}", serde_json::to_string_pretty(&tree.root_view(true))?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod node;
pub mod prelude;
pub mod record;
pub mod store;
pub mod tree;
