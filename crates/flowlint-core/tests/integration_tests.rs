use flowlint_core::finding::FindingKind;
use flowlint_core::{parse, scan_source, Dialect, Severity};

const RISKY_WORKFLOW: &str = r#"
name: PR Greeter
on: pull_request_target
permissions: write-all
jobs:
  greet:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - run: echo "Thanks for ${{ github.event.pull_request.title }}"
        env:
          TOKEN: ${{ secrets.BOT_TOKEN }}
      - run: curl https://example.com/setup.sh | bash
"#;

#[test]
fn summary_counts_always_add_up() {
    let report = scan_source(RISKY_WORKFLOW, "greeter.yml", Dialect::GithubActions);
    assert_eq!(report.summary.total_issues, report.findings.len());
    assert_eq!(
        report.summary.error_count + report.summary.warning_count + report.summary.info_count,
        report.summary.total_issues
    );
}

#[test]
fn score_stays_within_bounds() {
    let dirty = scan_source(RISKY_WORKFLOW, "greeter.yml", Dialect::GithubActions);
    assert!(dirty.summary.score <= 100);

    let clean = scan_source(
        r#"
name: CI
on: push
permissions:
  contents: read
jobs:
  test:
    name: Test
    runs-on: ubuntu-latest
    timeout-minutes: 15
    steps:
      - name: Checkout
        uses: actions/checkout@11bd71901bbe5b1630ceea73d27597364c9af683
      - name: Cache
        uses: actions/cache@v4
      - name: Test
        run: cargo test
"#,
        "ci.yml",
        Dialect::GithubActions,
    );
    assert!(clean.summary.score <= 100);
    assert!(clean.summary.score > dirty.summary.score);
}

#[test]
fn every_job_has_an_edge_or_is_isolated_never_both() {
    let report = scan_source(
        r#"
on: push
jobs:
  build:
    steps:
      - run: make
  test:
    needs: build
    steps:
      - run: make check
  docs:
    steps:
      - run: make docs
  cleanup:
    steps:
      - run: make clean
"#,
        "ci.yml",
        Dialect::GithubActions,
    );
    let graph = report.call_graph.unwrap();
    let with_edges: std::collections::HashSet<&str> = graph
        .job_dependencies
        .iter()
        .flat_map(|e| [e.from.as_str(), e.to.as_str()])
        .collect();
    for job in ["build", "test", "docs", "cleanup"] {
        let has_edge = with_edges.contains(job);
        let isolated = graph.isolated_jobs.iter().any(|j| j == job);
        assert!(
            has_edge != isolated,
            "job {job}: edge={has_edge} isolated={isolated}"
        );
    }
    assert_eq!(graph.isolated_jobs.len(), 2);
}

#[test]
fn reachability_is_scoped_to_security_findings() {
    let report = scan_source(RISKY_WORKFLOW, "greeter.yml", Dialect::GithubActions);
    let security_count = report
        .findings
        .iter()
        .filter(|f| f.kind == FindingKind::Security)
        .count();
    let reach = report.reachability.unwrap();
    assert_eq!(reach.stats.total_issues, security_count);
    assert!(reach.stats.reachable_issues <= reach.stats.total_issues);
    assert!(reach.stats.high_risk_issues <= reach.stats.reachable_issues);
}

#[test]
fn analysis_is_idempotent_including_ids() {
    let first = scan_source(RISKY_WORKFLOW, "greeter.yml", Dialect::GithubActions);
    let second = scan_source(RISKY_WORKFLOW, "greeter.yml", Dialect::GithubActions);
    assert_eq!(first.findings.len(), second.findings.len());
    for (a, b) in first.findings.iter().zip(&second.findings) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.title, b.title);
        assert_eq!(a.severity, b.severity);
        assert_eq!(a.location, b.location);
    }
    assert_eq!(first.summary, second.summary);
}

#[test]
fn needs_relationships_survive_parsing() {
    let doc = parse(
        r#"
on: push
jobs:
  a:
    steps:
      - run: echo a
  b:
    needs: a
    steps:
      - run: echo b
  c:
    needs: [a, b]
    steps:
      - run: echo c
"#,
        "ci.yml",
        Dialect::GithubActions,
    )
    .unwrap();
    assert_eq!(doc.jobs["b"].needs, vec!["a"]);
    assert_eq!(doc.jobs["c"].needs, vec!["a", "b"]);
}

#[test]
fn curl_pipe_bash_yields_security_error_at_step_line() {
    let report = scan_source(RISKY_WORKFLOW, "greeter.yml", Dialect::GithubActions);
    let finding = report
        .findings
        .iter()
        .find(|f| f.title.contains("remote script"))
        .expect("remote script finding");
    assert_eq!(finding.kind, FindingKind::Security);
    assert_eq!(finding.severity, Severity::Error);
    let location = finding.location.as_ref().unwrap();
    assert_eq!(location.job.as_deref(), Some("greet"));
    assert_eq!(location.line, Some(13));
}

#[test]
fn tag_pinned_action_flagged_sha_pinned_not() {
    let tag = scan_source(
        "on: push\njobs:\n  a:\n    steps:\n      - uses: actions/checkout@v4\n",
        "ci.yml",
        Dialect::GithubActions,
    );
    assert!(tag.findings.iter().any(|f| f.title.contains("not pinned")));

    let sha = scan_source(
        "on: push\njobs:\n  a:\n    steps:\n      - uses: actions/checkout@11bd71901bbe5b1630ceea73d27597364c9af683\n",
        "ci.yml",
        Dialect::GithubActions,
    );
    assert!(!sha.findings.iter().any(|f| f.title.contains("not pinned")));
}

#[test]
fn needs_cycle_terminates_with_one_structure_finding() {
    let report = scan_source(
        r#"
on: push
jobs:
  a:
    needs: b
    steps:
      - run: echo a
  b:
    needs: a
    steps:
      - run: echo b
"#,
        "ci.yml",
        Dialect::GithubActions,
    );
    let cycle_findings: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.title.contains("circular"))
        .collect();
    assert_eq!(cycle_findings.len(), 1);
    assert_eq!(cycle_findings[0].kind, FindingKind::Structure);
    assert_eq!(cycle_findings[0].severity, Severity::Error);

    let graph = report.call_graph.unwrap();
    assert!(!graph.cycles.is_empty());
}

#[test]
fn gitlab_pipeline_maps_onto_the_same_model() {
    let report = scan_source(
        r#"
stages:
  - build
  - deploy

compile:
  stage: build
  script:
    - make
    - curl https://example.com/tool.sh | sh

ship:
  stage: deploy
  script:
    - ./deploy.sh
"#,
        ".gitlab-ci.yml",
        Dialect::GitlabCi,
    );
    assert!(report.error.is_none());
    assert!(report
        .findings
        .iter()
        .any(|f| f.title.contains("remote script")));
    let graph = report.call_graph.unwrap();
    assert!(graph
        .job_dependencies
        .iter()
        .any(|e| e.from == "compile" && e.to == "ship"));
}

#[test]
fn report_serializes_to_json() {
    let report = scan_source(RISKY_WORKFLOW, "greeter.yml", Dialect::GithubActions);
    let json = serde_json::to_string_pretty(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["file_name"], "greeter.yml");
    assert_eq!(
        value["findings"].as_array().unwrap().len(),
        report.findings.len()
    );
    assert!(value["reachability"]["stats"]["total_issues"].is_number());
}

#[test]
fn parse_failure_yields_report_with_error() {
    let report = scan_source("jobs: [not, a, map\n", "bad.yml", Dialect::GithubActions);
    assert!(report.error.is_some());
    assert!(report.findings.is_empty());
    assert!(report.call_graph.is_none());
}
