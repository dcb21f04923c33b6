//! End-to-end taxonomy scenarios with a scripted oracle.

use anomtree_core::tree::TaxonomyTree;
use anomtree_llm::{MockBackend, Oracle};
use anomtree_runtime::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

const TS: &str = "2025-03-01 12:00:00";

fn segs(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn open(dir: &TempDir, mock: MockBackend) -> (TaxonomySession, Arc<MockBackend>) {
    let mock = Arc::new(mock);
    let session = TaxonomySession::open(dir.path(), false, Oracle::new(mock.clone())).unwrap();
    (session, mock)
}

/// `{"Temp-related": {"SingleSensorDrift": [..], "UniformGroupSpike": [..]}}`
fn seed_temp_tree(dir: &TempDir) {
    let mut tree = TaxonomyTree::load(dir.path(), false).unwrap();
    tree.create_child(&[], "Temp-related", "All Temp sensors spike together.", "2025-01-01 00:00:00")
        .unwrap();
    tree.split_leaf(
        &segs(&["Temp-related"]),
        "UniformGroupSpike",
        "SingleSensorDrift",
        "Only Temp1 rises sharply.",
        "2025-01-02 00:00:00",
    )
    .unwrap();
}

#[tokio::test]
async fn scenario_a_first_anchor_on_empty_tree() {
    let dir = TempDir::new().unwrap();
    let template = "Temp1 jumps sharply while Temp2 and Temp3 stay near baseline";
    let (mut session, mock) = open(
        &dir,
        MockBackend::new()
            .then_reply("Explanation: empty tree.\nRoute: (Temp-related)\nFound: NO")
            .then_reply("Addition: (Temp-related -> <END>)\nExplanation: Path not found: no anchor."),
    );

    let placement = session.classify(template, TS).await.unwrap();
    assert_eq!(placement.kind, PlacementKind::CreatedCategory);
    assert_eq!(mock.pending_replies(), 0);

    let tree = session.tree();
    assert_eq!(tree.root().children.len(), 1);
    let anchor = tree.node_at(&segs(&["Temp-related"])).unwrap();
    assert!(anchor.is_leaf());
    assert_eq!(anchor.template_texts(), vec![template]);

    let files: Vec<_> = std::fs::read_dir(dir.path().join("Temp-related"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), template);
}

#[tokio::test]
async fn scenario_b_equal_split_names_append() {
    let dir = TempDir::new().unwrap();
    seed_temp_tree(&dir);
    let (mut session, _) = open(
        &dir,
        MockBackend::new()
            .then_reply("Route: (Temp-related -> SingleSensorDrift)\nFound: YES")
            .then_reply("Explanation:\nsame.\nDetermination:\nList 1: <PartialGroupDrift>\nList 2: <PartialGroupDrift>"),
    );

    let placement = session.classify("Temp3 trends upward slowly.", TS).await.unwrap();
    assert_eq!(placement.kind, PlacementKind::Appended);

    let leaf = session
        .tree()
        .node_at(&segs(&["Temp-related", "SingleSensorDrift"]))
        .unwrap();
    assert!(leaf.is_leaf());
    assert_eq!(
        leaf.template_texts(),
        vec!["Only Temp1 rises sharply.", "Temp3 trends upward slowly."]
    );
}

#[tokio::test]
async fn scenario_c_distinct_names_split_leaf() {
    let dir = TempDir::new().unwrap();
    seed_temp_tree(&dir);
    let (mut session, mock) = open(
        &dir,
        MockBackend::new()
            .then_reply("Route: (Temp-related -> SingleSensorDrift)\nFound: YES")
            .then_reply("Determination:\nList 1: <SuddenDrift>\nList 2: <SlowDrift>"),
    );

    let placement = session.classify("Temp3 trends upward slowly.", TS).await.unwrap();
    assert_eq!(placement.kind, PlacementKind::Split);
    assert_eq!(
        placement.path,
        segs(&["Temp-related", "SingleSensorDrift", "SlowDrift"])
    );

    let prompts = mock.prompts();
    assert!(prompts[1].contains("Parent Category: SingleSensorDrift"));

    let check = |tree: &TaxonomyTree| {
        let parent = tree
            .node_at(&segs(&["Temp-related", "SingleSensorDrift"]))
            .unwrap();
        assert!(parent.templates().is_empty());
        assert_eq!(parent.children.len(), 2);
        assert_eq!(
            parent.child("SuddenDrift").unwrap().template_texts(),
            vec!["Only Temp1 rises sharply."]
        );
        assert_eq!(
            parent.child("SlowDrift").unwrap().template_texts(),
            vec!["Temp3 trends upward slowly."]
        );
    };
    check(session.tree());
    check(&session.tree().rescan().unwrap());
}

#[tokio::test]
async fn claimed_route_under_missing_anchor_creates_anchor_only() {
    let dir = TempDir::new().unwrap();
    seed_temp_tree(&dir);
    let (mut session, mock) = open(
        &dir,
        MockBackend::new()
            .then_reply("Route: (Volt-related -> SingleSensorDrift)\nFound: YES")
            .then_reply("Addition: (Volt-related -> SingleSensorDrift -> <END>)"),
    );

    let placement = session.classify("Volt1 drifts alone.", TS).await.unwrap();
    assert_eq!(placement.kind, PlacementKind::CreatedCategory);
    assert_eq!(placement.path, segs(&["Volt-related"]));
    assert!(session
        .tree()
        .node_at(&segs(&["Volt-related"]))
        .unwrap()
        .is_leaf());
    // The addition prompt carries the full view, not only the latest template.
    assert!(mock.prompts()[1].contains("All Temp sensors spike together."));
}

#[tokio::test]
async fn route_to_internal_node_falls_back_to_branch() {
    let dir = TempDir::new().unwrap();
    seed_temp_tree(&dir);
    let (mut session, _) = open(
        &dir,
        MockBackend::new()
            .then_reply("Route: (Temp-related)\nFound: YES")
            .then_reply("Addition: (Temp-related -> PartialGroupDrift -> <END>)\nExplanation: Internal node: no child fits."),
    );

    let placement = session
        .classify("Temp1 and Temp2 drift while Temp3 stays low.", TS)
        .await
        .unwrap();
    assert_eq!(placement.kind, PlacementKind::CreatedCategory);
    assert_eq!(placement.path, segs(&["Temp-related", "PartialGroupDrift"]));
    assert_eq!(
        session.tree().node_at(&segs(&["Temp-related"])).unwrap().children.len(),
        3
    );
}

#[tokio::test]
async fn malformed_route_reply_leaves_tree_untouched() {
    let dir = TempDir::new().unwrap();
    seed_temp_tree(&dir);
    let (mut session, _) = open(&dir, MockBackend::new().then_reply("I would file this under temperature."));

    let before = session.tree().root_view(false);
    let err = session.classify("Temp1 spikes.", TS).await.unwrap_err();
    assert!(err.is_protocol());
    assert_eq!(session.tree().root_view(false), before);
    assert_eq!(session.tree().rescan().unwrap().root_view(false), before);
}

#[tokio::test]
async fn batch_skips_bad_row_and_exports() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store");
    let out = dir.path().join("out");
    let csv_text = "\
ts,contribution_t_ch0,contribution_t_ch1,contribution_v_ch0
2025-01-01 00:00:00,0.9,0.1,0.2
2025-01-01 00:01:00,0.8,0.2,0.1
2025-01-01 00:02:00,0.95,0.05,0.1
";
    let table = ContributionTable::from_reader(csv_text.as_bytes()).unwrap();
    let rows = table.rows();

    let mock = Arc::new(
        MockBackend::new()
            // row 0
            .then_reply(r#"{"template": "t_ch0 jumps (~0.90) while others stay low."}"#)
            .then_reply("Route: (Temp-related)\nFound: NO")
            .then_reply("Addition: (Temp-related -> <END>)")
            // row 1
            .then_reply("template: none")
            // row 2
            .then_reply(r#"{"template": "t_ch0 spikes (~0.95) alone."}"#)
            .then_reply("Route: (Temp-related)\nFound: YES")
            .then_reply("List 1: <Temp-related>\nList 2: <Temp-related>"),
    );
    let session = TaxonomySession::open(&store, false, Oracle::new(mock.clone())).unwrap();
    let mut orchestrator = TaxonomyOrchestrator::new(session, table.record_builder());

    let mut seen = 0;
    let mut report = orchestrator.run_with(&rows, |_| seen += 1).await;
    assert_eq!(seen, 3);
    assert_eq!(report.processed(), 2);
    assert_eq!(report.skipped(), 1);
    assert!(report.outcomes[1].is_skipped());
    assert_eq!(report.count(PlacementKind::CreatedCategory), 1);
    assert_eq!(report.count(PlacementKind::Appended), 1);
    assert_eq!(mock.pending_replies(), 0);
    assert!(mock.prompts()[0].contains("\"ratio_2_over_1\""));

    let session = orchestrator.into_session();
    write_exports(session.tree(), &table, &mut report, &ExportPaths::in_dir(&out));
    assert!(report.warnings.is_empty());

    let mut rdr = csv::Reader::from_path(out.join("anomaly_results_classified.csv")).unwrap();
    let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 3);
    assert_eq!(&records[0][4], "Temp-related");
    assert_eq!(&records[1][4], "");
    assert_eq!(&records[2][5], "t_ch0 spikes (~0.95) alone.");

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out.join("anomaly_results_classified_tree.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["Temp-related"].as_array().unwrap().len(), 2);
}
