use crate::finding::{Finding, FindingKind, Location, Severity};
use crate::model::WorkflowDocument;
use crate::rules::Rule;
use regex::Regex;

/// Above this many jobs a workflow is usually better split up.
const JOB_COUNT_LIMIT: usize = 15;

/// Steps whose failure deserves explicit handling.
const RISKY_STEP_PATTERN: &str = r"\b(deploy|publish|release|terraform\s+apply|kubectl\s+apply)";

/// Commands that tend to run for minutes rather than seconds.
const LONG_RUNNING_PATTERN: &str =
    r"\b(build|test|install|compile|deploy|publish|docker|terraform|gradle|mvn)\b";

/// Steps at or above this count suggest a job long enough to need a timeout.
const LONG_JOB_STEP_COUNT: usize = 4;

/// Naming, sizing, timeout, and error-handling checks.
pub struct StructureChecks;

impl Rule for StructureChecks {
    fn id(&self) -> &'static str {
        "structure"
    }

    fn evaluate(
        &self,
        doc: &WorkflowDocument,
        _source: &str,
        file_name: &str,
    ) -> anyhow::Result<Vec<Finding>> {
        let mut findings = Vec::new();
        let risky_re = Regex::new(RISKY_STEP_PATTERN)?;
        let long_re = Regex::new(LONG_RUNNING_PATTERN)?;

        if doc.job_count() > JOB_COUNT_LIMIT {
            findings.push(
                Finding::new(
                    FindingKind::Structure,
                    Severity::Warning,
                    format!("workflow defines {} jobs", doc.job_count()),
                    format!(
                        "More than {JOB_COUNT_LIMIT} jobs in one workflow makes the \
                         dependency structure hard to follow and slows scheduling."
                    ),
                    file_name,
                )
                .suggest("Split the workflow by concern, or fold related jobs into a matrix."),
            );
        }

        for (job_id, job) in &doc.jobs {
            if job.name.is_none() {
                findings.push(
                    Finding::new(
                        FindingKind::BestPractice,
                        Severity::Info,
                        format!("job '{job_id}' has no display name"),
                        format!(
                            "Job '{job_id}' relies on its id for display. A `name` \
                             makes run logs and required-check lists readable."
                        ),
                        file_name,
                    )
                    .at(Location::job(job_id, job.line))
                    .suggest("Add a `name:` field to the job."),
                );
            }

            let unnamed_runs = job
                .steps
                .iter()
                .filter(|s| s.name.is_none() && s.run.is_some())
                .count();
            if unnamed_runs > 0 {
                findings.push(
                    Finding::new(
                        FindingKind::BestPractice,
                        Severity::Info,
                        format!("{unnamed_runs} unnamed run step(s) in job '{job_id}'"),
                        format!(
                            "Job '{job_id}' has {unnamed_runs} run step(s) without a \
                             `name`, which show up in logs as raw commands."
                        ),
                        file_name,
                    )
                    .at(Location::job(job_id, job.line))
                    .suggest("Name each run step after what it does."),
                );
            }

            let looks_long_running = job.steps.len() >= LONG_JOB_STEP_COUNT
                || job.steps.iter().any(|s| {
                    s.run
                        .as_ref()
                        .is_some_and(|r| long_re.is_match(&r.to_lowercase()))
                });
            if job.timeout_minutes.is_none() && looks_long_running {
                findings.push(
                    Finding::new(
                        FindingKind::BestPractice,
                        Severity::Info,
                        format!("job '{job_id}' has no timeout"),
                        format!(
                            "Job '{job_id}' has no `timeout-minutes`; a hung step \
                             blocks the runner for the platform default (hours)."
                        ),
                        file_name,
                    )
                    .at(Location::job(job_id, job.line))
                    .suggest("Set `timeout-minutes` to a value just above the normal runtime."),
                );
            }

            let has_risky_step = job.steps.iter().any(|s| {
                s.run
                    .as_ref()
                    .is_some_and(|r| risky_re.is_match(&r.to_lowercase()))
            });
            let has_failure_handling = job.steps.iter().any(|s| {
                s.condition
                    .as_ref()
                    .is_some_and(|c| c.contains("failure()") || c.contains("always()"))
            });
            if has_risky_step && !has_failure_handling {
                findings.push(
                    Finding::new(
                        FindingKind::BestPractice,
                        Severity::Info,
                        format!("no failure handling around risky step in job '{job_id}'"),
                        format!(
                            "Job '{job_id}' runs a deployment-like command but has no \
                             step gated on `failure()` or `always()` to roll back or \
                             notify when it breaks."
                        ),
                        file_name,
                    )
                    .at(Location::job(job_id, job.line))
                    .suggest("Add a cleanup or notification step with `if: failure()`."),
                );
            }
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
        StructureChecks.evaluate(&doc, yaml, "ci.yml").unwrap()
    }

    #[test]
    fn test_unnamed_job_and_steps_reported() {
        let findings = run(r#"
on: push
jobs:
  build:
    steps:
      - run: make
      - run: make check
"#);
        assert!(findings.iter().any(|f| f.title.contains("no display name")));
        assert!(findings.iter().any(|f| f.title.contains("2 unnamed run step")));
    }

    #[test]
    fn test_named_job_with_timeout_has_fewer_findings() {
        let findings = run(r#"
on: push
jobs:
  build:
    name: Build
    timeout-minutes: 15
    steps:
      - name: Compile
        run: make
"#);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_excessive_job_count() {
        let mut yaml = String::from("on: push\njobs:\n");
        for i in 0..16 {
            yaml.push_str(&format!("  job{i}:\n    name: j{i}\n    timeout-minutes: 5\n    steps: []\n"));
        }
        let findings = run(&yaml);
        assert!(findings.iter().any(|f| f.title.contains("16 jobs")));
    }

    #[test]
    fn test_short_job_without_timeout_not_flagged() {
        let findings = run(r#"
on: push
jobs:
  notify:
    name: Notify
    steps:
      - name: Ping
        run: echo done
"#);
        assert!(!findings.iter().any(|f| f.title.contains("no timeout")));
    }

    #[test]
    fn test_long_running_job_without_timeout_flagged() {
        let findings = run(r#"
on: push
jobs:
  compile:
    name: Compile
    steps:
      - name: Build
        run: cargo build --release
"#);
        assert!(findings.iter().any(|f| f.title.contains("no timeout")));
    }

    #[test]
    fn test_many_step_job_without_timeout_flagged() {
        let findings = run(r#"
on: push
jobs:
  pipeline:
    name: Pipeline
    steps:
      - name: A
        run: ./a.sh
      - name: B
        run: ./b.sh
      - name: C
        run: ./c.sh
      - name: D
        run: ./d.sh
"#);
        assert!(findings.iter().any(|f| f.title.contains("no timeout")));
    }

    #[test]
    fn test_risky_step_without_failure_handling() {
        let findings = run(r#"
on: push
jobs:
  ship:
    name: Ship
    timeout-minutes: 30
    steps:
      - name: Deploy
        run: ./deploy.sh production
"#);
        assert!(findings
            .iter()
            .any(|f| f.title.contains("no failure handling")));
    }

    #[test]
    fn test_risky_step_with_failure_handler_clean() {
        let findings = run(r#"
on: push
jobs:
  ship:
    name: Ship
    timeout-minutes: 30
    steps:
      - name: Deploy
        run: ./deploy.sh production
      - name: Rollback
        if: failure()
        run: ./rollback.sh
"#);
        assert!(!findings
            .iter()
            .any(|f| f.title.contains("no failure handling")));
    }
}
