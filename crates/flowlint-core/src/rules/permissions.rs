use crate::context::PRIVILEGED_TRIGGERS;
use crate::finding::{Finding, FindingKind, Location, Severity};
use crate::model::{Permissions, WorkflowDocument};
use crate::rules::Rule;

/// Flags broad token permissions, escalating when combined with triggers
/// that run against untrusted input.
pub struct PermissionOverreach;

impl Rule for PermissionOverreach {
    fn id(&self) -> &'static str {
        "permission-overreach"
    }

    fn evaluate(
        &self,
        doc: &WorkflowDocument,
        source: &str,
        file_name: &str,
    ) -> anyhow::Result<Vec<Finding>> {
        let mut findings = Vec::new();
        let has_privileged = doc
            .triggers
            .events()
            .iter()
            .any(|t| PRIVILEGED_TRIGGERS.contains(&t.as_str()));

        let mut check_write_all = |perms: &Permissions, owner: &str, location: Location| {
            if !perms.is_write_all() {
                return;
            }
            if has_privileged {
                findings.push(
                    Finding::new(
                        FindingKind::Security,
                        Severity::Error,
                        format!("write-all permissions on privileged trigger ({owner})"),
                        format!(
                            "{owner} grants `write-all` while the workflow runs on a \
                             privileged trigger. Untrusted input can reach a token \
                             with full write access to the repository."
                        ),
                        file_name,
                    )
                    .at(location)
                    .suggest(
                        "Replace `write-all` with the minimal scopes each job needs, \
                         e.g. `contents: read`.",
                    )
                    .with_snippet(source),
                );
            } else {
                findings.push(
                    Finding::new(
                        FindingKind::Security,
                        Severity::Warning,
                        format!("write-all permissions ({owner})"),
                        format!(
                            "{owner} grants `write-all`. Every step, including \
                             third-party actions, receives a token with full write \
                             access."
                        ),
                        file_name,
                    )
                    .at(location)
                    .suggest("Scope permissions down to what the jobs actually use.")
                    .with_snippet(source),
                );
            }
        };

        if let Some(perms) = &doc.permissions {
            check_write_all(perms, "the workflow", Location::default());
        }
        for (job_id, job) in &doc.jobs {
            if let Some(perms) = &job.permissions {
                check_write_all(
                    perms,
                    &format!("job '{job_id}'"),
                    Location::job(job_id, job.line),
                );
            }
        }

        // A missing permissions block leaves the default (often broad) token
        // grant in place.
        if doc.permissions.is_none()
            && doc.jobs.values().all(|j| j.permissions.is_none())
            && !doc.jobs.is_empty()
        {
            findings.push(
                Finding::new(
                    FindingKind::BestPractice,
                    Severity::Info,
                    "no explicit permissions block",
                    "The workflow declares no `permissions` block, so the token \
                     falls back to the repository default, which may be broader \
                     than needed."
                        .to_string(),
                    file_name,
                )
                .suggest("Add `permissions:\n  contents: read` at the workflow level."),
            );
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dialect;
    use crate::parser::parse;

    fn run(yaml: &str) -> Vec<Finding> {
        let doc = parse(yaml, "ci.yml", Dialect::GithubActions).unwrap();
        PermissionOverreach.evaluate(&doc, yaml, "ci.yml").unwrap()
    }

    #[test]
    fn test_write_all_on_privileged_trigger_is_error() {
        let findings = run(r#"
on: pull_request_target
permissions: write-all
jobs:
  greet:
    steps:
      - run: echo hi
"#);
        assert!(findings
            .iter()
            .any(|f| f.severity == Severity::Error && f.title.contains("write-all")));
    }

    #[test]
    fn test_write_all_on_push_is_warning() {
        let findings = run(r#"
on: push
permissions: write-all
jobs:
  build:
    steps:
      - run: echo hi
"#);
        let write_all: Vec<_> = findings
            .iter()
            .filter(|f| f.title.contains("write-all"))
            .collect();
        assert_eq!(write_all.len(), 1);
        assert_eq!(write_all[0].severity, Severity::Warning);
    }

    #[test]
    fn test_missing_permissions_is_info() {
        let findings = run(r#"
on: push
jobs:
  build:
    steps:
      - run: echo hi
"#);
        assert!(findings
            .iter()
            .any(|f| f.severity == Severity::Info && f.title.contains("no explicit permissions")));
    }

    #[test]
    fn test_scoped_permissions_clean() {
        let findings = run(r#"
on: push
permissions:
  contents: read
jobs:
  build:
    steps:
      - run: echo hi
"#);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_job_level_write_all_detected() {
        let findings = run(r#"
on: pull_request_target
jobs:
  risky:
    permissions: write-all
    steps:
      - run: echo hi
"#);
        assert!(findings
            .iter()
            .any(|f| f.severity == Severity::Error && f.title.contains("job 'risky'")));
    }
}
