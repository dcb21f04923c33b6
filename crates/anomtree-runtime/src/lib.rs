//! # anomtree Runtime
//!
//! Drives a taxonomy with an oracle: routing with structural reconciliation,
//! branch and leaf expansion, the per-record orchestration loop, and the
//! contribution-table input and classified outputs around it.

pub mod error;
pub mod expansion;
pub mod export;
pub mod orchestrator;
pub mod prelude;
pub mod routing;
pub mod session;
pub mod table;
