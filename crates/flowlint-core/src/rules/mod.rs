pub mod caching;
pub mod credentials;
pub mod permissions;
pub mod pinning;
pub mod scripts;
pub mod structure;

use crate::actions_db::KnownActionsDb;
use crate::finding::Finding;
use crate::model::WorkflowDocument;
use std::collections::HashSet;

/// A single rule evaluator. Rules are independent, order-insensitive pure
/// functions over the canonical model and raw text; each owns its severity
/// assignment at authoring time.
pub trait Rule {
    fn id(&self) -> &'static str;

    fn evaluate(
        &self,
        doc: &WorkflowDocument,
        source: &str,
        file_name: &str,
    ) -> anyhow::Result<Vec<Finding>>;
}

/// All registered rules.
pub fn registry(db: &KnownActionsDb) -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(credentials::CredentialExposure),
        Box::new(pinning::UnpinnedActions { db: db.clone() }),
        Box::new(permissions::PermissionOverreach),
        Box::new(scripts::UnsafeScriptExecution),
        Box::new(caching::MissingDependencyCache),
        Box::new(structure::StructureChecks),
    ]
}

/// Run every registered rule and concatenate the results.
///
/// A rule that fails internally is logged and contributes zero findings;
/// one broken rule never aborts the scan of a file. Exact duplicates
/// (same kind, title, and location) are suppressed, and surviving findings
/// get deterministic per-rule ids.
pub fn run_all(
    doc: &WorkflowDocument,
    source: &str,
    file_name: &str,
    db: &KnownActionsDb,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for rule in registry(db) {
        match rule.evaluate(doc, source, file_name) {
            Ok(batch) => {
                for (i, mut finding) in batch.into_iter().enumerate() {
                    finding.id = format!("{}-{:03}", rule.id(), i + 1);
                    findings.push(finding);
                }
            }
            Err(err) => {
                log::warn!("rule '{}' failed on {}: {:#}", rule.id(), file_name, err);
            }
        }
    }

    let mut seen = HashSet::new();
    findings.retain(|f| seen.insert(f.dedup_key()));
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dialect;
    use crate::parser::parse;

    #[test]
    fn test_rules_are_idempotent() {
        let yaml = r#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - run: curl https://example.com/install.sh | bash
"#;
        let doc = parse(yaml, "ci.yml", Dialect::GithubActions).unwrap();
        let db = KnownActionsDb::bundled();
        let first = run_all(&doc, yaml, "ci.yml", &db);
        let second = run_all(&doc, yaml, "ci.yml", &db);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.title, b.title);
            assert_eq!(a.severity, b.severity);
            assert_eq!(a.location, b.location);
        }
    }

    #[test]
    fn test_duplicate_findings_suppressed() {
        let yaml = r#"
on: push
jobs:
  a:
    steps:
      - run: echo ok
"#;
        let doc = parse(yaml, "ci.yml", Dialect::GithubActions).unwrap();
        let findings = run_all(&doc, yaml, "ci.yml", &KnownActionsDb::empty());
        let mut keys = HashSet::new();
        for f in &findings {
            assert!(keys.insert(f.dedup_key()), "duplicate finding: {}", f.title);
        }
    }
}
