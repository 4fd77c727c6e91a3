use crate::model::WorkflowDocument;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Coarse classification of what a workflow is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowType {
    Ci,
    Cd,
    Automation,
    Utility,
    Unknown,
}

impl WorkflowType {
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowType::Ci => "continuous-integration",
            WorkflowType::Cd => "continuous-deployment",
            WorkflowType::Automation => "automation",
            WorkflowType::Utility => "utility",
            WorkflowType::Unknown => "unknown",
        }
    }
}

/// Trigger types that run with elevated token scope or against untrusted
/// input.
pub const PRIVILEGED_TRIGGERS: &[&str] =
    &["workflow_run", "pull_request_target", "repository_dispatch"];

const AUTOMATION_TRIGGERS: &[&str] = &["schedule", "workflow_dispatch", "repository_dispatch"];

// Leading word boundary only, so "deployment" and "testing" count while
// "ubuntu-latest" does not trip the `test` keyword.
fn cd_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(deploy|publish|release)").unwrap())
}

fn ci_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(test|lint|build)").unwrap())
}

/// The trigger/privilege/secrets profile of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub triggers: Vec<String>,
    pub has_privileged_triggers: bool,
    pub has_secrets: bool,
    pub conditional_jobs: usize,
    pub has_production_indicators: bool,
}

/// Classifier output: the workflow type plus its execution context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub workflow_type: WorkflowType,
    pub execution: ExecutionContext,
}

fn secrets_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{\{\s*secrets\.").unwrap())
}

/// Classify a workflow from its canonical model and raw text.
///
/// Classification order, first match wins: deployment keywords, CI
/// keywords, automation triggers, trivial size, unknown.
pub fn classify(doc: &WorkflowDocument, source: &str) -> WorkflowContext {
    let triggers = doc.triggers.events();
    let lower_source = source.to_lowercase();

    let mentions = |re: &Regex| -> bool {
        let in_steps = doc.jobs.values().flat_map(|j| &j.steps).any(|step| {
            step.uses
                .as_ref()
                .is_some_and(|u| re.is_match(&u.raw.to_lowercase()))
                || step.run.as_ref().is_some_and(|r| re.is_match(&r.to_lowercase()))
        });
        in_steps || re.is_match(&lower_source)
    };

    let has_production_indicators = mentions(cd_re());

    let workflow_type = if has_production_indicators {
        WorkflowType::Cd
    } else if mentions(ci_re()) {
        WorkflowType::Ci
    } else if triggers.iter().any(|t| AUTOMATION_TRIGGERS.contains(&t.as_str())) {
        WorkflowType::Automation
    } else if doc.job_count() == 1 && doc.step_count() <= 5 {
        WorkflowType::Utility
    } else {
        WorkflowType::Unknown
    };

    let has_privileged_triggers = triggers
        .iter()
        .any(|t| PRIVILEGED_TRIGGERS.contains(&t.as_str()));
    let has_secrets = secrets_re().is_match(source);
    let conditional_jobs = doc
        .jobs
        .values()
        .filter(|j| j.condition.as_deref().is_some_and(|c| !c.trim().is_empty()))
        .count();

    WorkflowContext {
        workflow_type,
        execution: ExecutionContext {
            triggers,
            has_privileged_triggers,
            has_secrets,
            conditional_jobs,
            has_production_indicators,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dialect;
    use crate::parser::parse;

    fn classify_yaml(yaml: &str) -> WorkflowContext {
        let doc = parse(yaml, "ci.yml", Dialect::GithubActions).unwrap();
        classify(&doc, yaml)
    }

    #[test]
    fn test_deploy_keyword_wins_over_ci() {
        let ctx = classify_yaml(
            r#"
on: push
jobs:
  release:
    steps:
      - run: npm test
      - run: npm run deploy
"#,
        );
        assert_eq!(ctx.workflow_type, WorkflowType::Cd);
        assert!(ctx.execution.has_production_indicators);
    }

    #[test]
    fn test_ci_classification() {
        let ctx = classify_yaml(
            r#"
on: push
jobs:
  check:
    steps:
      - run: cargo test
"#,
        );
        assert_eq!(ctx.workflow_type, WorkflowType::Ci);
    }

    #[test]
    fn test_automation_classification() {
        let ctx = classify_yaml(
            r#"
on:
  schedule:
    - cron: '0 3 * * *'
jobs:
  sweep:
    steps:
      - run: ./close-stale.sh
      - run: ./rotate.sh
      - run: ./notify.sh
      - run: ./archive.sh
      - run: ./report.sh
      - run: ./cleanup.sh
"#,
        );
        assert_eq!(ctx.workflow_type, WorkflowType::Automation);
    }

    #[test]
    fn test_utility_classification() {
        let ctx = classify_yaml(
            r#"
on: push
jobs:
  hello:
    steps:
      - run: echo hi
"#,
        );
        assert_eq!(ctx.workflow_type, WorkflowType::Utility);
    }

    #[test]
    fn test_privileged_trigger_and_secrets() {
        let ctx = classify_yaml(
            r#"
on: pull_request_target
jobs:
  greet:
    if: github.actor != 'bot'
    steps:
      - run: echo "${{ secrets.TOKEN }}"
"#,
        );
        assert!(ctx.execution.has_privileged_triggers);
        assert!(ctx.execution.has_secrets);
        assert_eq!(ctx.execution.conditional_jobs, 1);
    }

    #[test]
    fn test_no_privileged_trigger_on_push() {
        let ctx = classify_yaml(
            r#"
on: push
jobs:
  a:
    steps:
      - run: echo hi
"#,
        );
        assert!(!ctx.execution.has_privileged_triggers);
        assert!(!ctx.execution.has_secrets);
    }
}
