//! TaxonomyOrchestrator: the per-record pipeline.
//!
//! For each row: build the record, ask for a template, route it, expand the
//! tree, then look up where the template landed. Rows run strictly in order
//! because each one sees the tree left by the previous. A failing row is
//! logged and skipped; the batch carries on.

use crate::error::RuntimeResult;
use crate::expansion::{Placement, PlacementKind};
use crate::session::TaxonomySession;
use crate::table::ContributionRow;
use anomtree_core::error::TaxonomyError;
use anomtree_core::record::RecordBuilder;
use serde::Serialize;
use tracing::{info, warn};

/// The result of one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassificationOutcome {
    Classified {
        index: usize,
        timestamp: String,
        /// Category path where the template was found after the mutation.
        classification: Vec<String>,
        template: String,
        placement: Placement,
    },
    Skipped {
        index: usize,
        timestamp: String,
        reason: String,
    },
}

impl ClassificationOutcome {
    pub fn index(&self) -> usize {
        match self {
            ClassificationOutcome::Classified { index, .. }
            | ClassificationOutcome::Skipped { index, .. } => *index,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ClassificationOutcome::Skipped { .. })
    }

    /// `a -> b -> c`, or empty for skipped rows.
    pub fn classification_label(&self) -> String {
        match self {
            ClassificationOutcome::Classified { classification, .. } => classification.join(" -> "),
            ClassificationOutcome::Skipped { .. } => String::new(),
        }
    }

    pub fn template(&self) -> &str {
        match self {
            ClassificationOutcome::Classified { template, .. } => template,
            ClassificationOutcome::Skipped { .. } => "",
        }
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<ClassificationOutcome>,
    /// Non-fatal problems such as failed exports.
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_skipped()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }

    /// How many rows ended in each kind of placement.
    pub fn count(&self, kind: PlacementKind) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(o, ClassificationOutcome::Classified { placement, .. } if placement.kind == kind)
            })
            .count()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }
}

/// Drives a session over a batch of rows.
#[derive(Debug)]
pub struct TaxonomyOrchestrator {
    session: TaxonomySession,
    builder: RecordBuilder,
}

impl TaxonomyOrchestrator {
    pub fn new(session: TaxonomySession, builder: RecordBuilder) -> Self {
        Self { session, builder }
    }

    pub fn session(&self) -> &TaxonomySession {
        &self.session
    }

    pub fn into_session(self) -> TaxonomySession {
        self.session
    }

    /// Run one row through the full pipeline.
    pub async fn process(&mut self, row: &ContributionRow) -> RuntimeResult<ClassificationOutcome> {
        if row.timestamp.trim().is_empty() {
            return Err(TaxonomyError::InvalidArgument(format!(
                "row {} has no timestamp",
                row.index
            ))
            .into());
        }
        let values = row.values()?;
        let record = self.builder.build(&values);
        let template = self.session.oracle().extract_template(&record).await?;
        let placement = self.session.classify(&template, &row.timestamp).await?;
        let classification = self.session.tree().find_path_by_template(&template);

        info!(
            row = row.index,
            classification = %classification.join(" -> "),
            "classified"
        );
        Ok(ClassificationOutcome::Classified {
            index: row.index,
            timestamp: row.timestamp.clone(),
            classification,
            template,
            placement,
        })
    }

    /// Process every row in order.
    pub async fn run(&mut self, rows: &[ContributionRow]) -> RunReport {
        self.run_with(rows, |_| {}).await
    }

    /// Process every row, calling `on_outcome` after each one.
    pub async fn run_with<F>(&mut self, rows: &[ContributionRow], mut on_outcome: F) -> RunReport
    where
        F: FnMut(&ClassificationOutcome),
    {
        let mut report = RunReport::default();
        for row in rows {
            let outcome = match self.process(row).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(row = row.index, error = %e, "skipping record");
                    ClassificationOutcome::Skipped {
                        index: row.index,
                        timestamp: row.timestamp.clone(),
                        reason: e.to_string(),
                    }
                }
            };
            on_outcome(&outcome);
            report.outcomes.push(outcome);
        }

        match serde_json::to_string_pretty(&self.session.tree().root_view(true)) {
            Ok(view) => info!("taxonomy after run:\n{view}"),
            Err(e) => warn!(error = %e, "could not render taxonomy view"),
        }
        info!(
            processed = report.processed(),
            skipped = report.skipped(),
            "run complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anomtree_llm::{MockBackend, Oracle};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn row(index: usize, ts: &str) -> ContributionRow {
        ContributionRow::new(index, ts, &[0.9, 0.1, 0.2])
    }

    fn orchestrator(dir: &TempDir, mock: Arc<MockBackend>) -> TaxonomyOrchestrator {
        let session = TaxonomySession::open(dir.path(), false, Oracle::new(mock)).unwrap();
        TaxonomyOrchestrator::new(session, RecordBuilder::new(&["t_ch0", "t_ch1", "v_ch0"]))
    }

    #[tokio::test]
    async fn test_blank_timestamp_skipped_without_oracle_calls() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockBackend::new());
        let mut orchestrator = orchestrator(&dir, mock.clone());

        let report = orchestrator.run(&[row(0, "  ")]).await;
        assert_eq!(report.skipped(), 1);
        assert!(mock.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_bad_score_skips_only_that_row() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(
            MockBackend::new()
                .then_reply(r#"{"template": "t_ch0 jumps alone."}"#)
                .then_reply("Route: (Temp-related)\nFound: NO")
                .then_reply("Addition: (Temp-related -> <END>)"),
        );
        let mut orchestrator = orchestrator(&dir, mock.clone());

        let mut bad = row(0, "2025-01-01 00:00:00");
        bad.cells[1] = "n/a".into();
        let report = orchestrator
            .run(&[bad, row(1, "2025-01-01 00:01:00")])
            .await;

        assert!(report.outcomes[0].is_skipped());
        assert_eq!(report.outcomes[1].classification_label(), "Temp-related");
        assert_eq!(mock.prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_bad_template_reply_skips_row() {
        let dir = TempDir::new().unwrap();
        let mock = MockBackend::new().then_reply("no json at all");
        let session =
            TaxonomySession::open(dir.path(), false, Oracle::new(Arc::new(mock))).unwrap();
        let builder = RecordBuilder::new(&["t_ch0", "t_ch1", "v_ch0"]);
        let mut orchestrator = TaxonomyOrchestrator::new(session, builder);

        let report = orchestrator.run(&[row(0, "2025-01-01 00:00:00")]).await;
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.processed(), 0);
        assert!(orchestrator.session().tree().is_empty());
        assert_eq!(report.outcomes[0].classification_label(), "");
    }

    #[test]
    fn test_outcome_serializes_with_status() {
        let outcome = ClassificationOutcome::Skipped {
            index: 3,
            timestamp: "t".into(),
            reason: "r".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["index"], 3);
    }
}
