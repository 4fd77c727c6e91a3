pub mod actions_db;
pub mod aggregator;
pub mod context;
pub mod finding;
pub mod graph;
pub mod model;
pub mod parser;
pub mod reachability;
pub mod rules;

pub use actions_db::KnownActionsDb;
pub use context::{WorkflowContext, WorkflowType};
pub use finding::{AnalysisReport, Finding, FindingKind, Location, Severity, Summary};
pub use graph::CallGraphData;
pub use model::{Dialect, Job, Step, WorkflowDocument};
pub use parser::{parse, ParseError};
pub use reachability::{ReachabilityData, Verdict};

/// Analyze an already-parsed workflow with the bundled actions database.
pub fn analyze(doc: &WorkflowDocument, source: &str, file_name: &str) -> AnalysisReport {
    analyze_with(doc, source, file_name, &KnownActionsDb::bundled())
}

/// Full analysis pipeline over one parsed workflow: rules, call graph,
/// context classification, reachability, then aggregation.
pub fn analyze_with(
    doc: &WorkflowDocument,
    source: &str,
    file_name: &str,
    db: &KnownActionsDb,
) -> AnalysisReport {
    let rule_findings = rules::run_all(doc, source, file_name, db);
    let (call_graph, graph_findings) = graph::build(doc, file_name);
    let context = context::classify(doc, source);
    aggregator::aggregate(
        doc,
        file_name,
        rule_findings,
        graph_findings,
        &context,
        call_graph,
    )
}

/// Parse and analyze in one call. A file that fails to parse still yields
/// a report, carrying the error message instead of findings.
pub fn scan_source(source: &str, file_name: &str, dialect: Dialect) -> AnalysisReport {
    match parse(source, file_name, dialect) {
        Ok(doc) => analyze(&doc, source, file_name),
        Err(err) => AnalysisReport::failed(file_name, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_source_survives_invalid_yaml() {
        let report = scan_source("on: [push\n", "broken.yml", Dialect::GithubActions);
        assert!(report.error.is_some());
        assert!(report.findings.is_empty());
        assert_eq!(report.summary.score, 100);
    }

    #[test]
    fn test_scan_source_end_to_end() {
        let yaml = r#"
on: push
jobs:
  build:
    steps:
      - uses: actions/checkout@v4
      - run: cargo test
"#;
        let report = scan_source(yaml, "ci.yml", Dialect::GithubActions);
        assert!(report.error.is_none());
        assert!(report.call_graph.is_some());
        assert!(report.reachability.is_some());
        assert!(report
            .findings
            .iter()
            .any(|f| f.title.contains("not pinned")));
    }
}
