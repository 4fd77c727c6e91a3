use crate::finding::{Finding, FindingKind, Location, Severity};
use crate::model::WorkflowDocument;
use crate::rules::Rule;
use regex::Regex;

/// Remote-script execution: a download piped straight into a shell.
const REMOTE_SCRIPT_PATTERN: &str =
    r"(curl|wget)\s+[^|\n]*\|\s*(sudo\s+)?(bash|sh|zsh|python3?|node)\b";

/// Expression contexts that carry attacker-controlled text.
const UNTRUSTED_CONTEXTS: &[&str] = &[
    "github.event.issue.title",
    "github.event.issue.body",
    "github.event.pull_request.title",
    "github.event.pull_request.body",
    "github.event.comment.body",
    "github.event.review.body",
    "github.event.head_commit.message",
    "github.head_ref",
    "github.event.workflow_run.head_branch",
    "github.event.discussion.title",
    "github.event.discussion.body",
];

/// Flags remote-script execution and command-injection-prone use of
/// untrusted event data inside `run` blocks.
pub struct UnsafeScriptExecution;

impl Rule for UnsafeScriptExecution {
    fn id(&self) -> &'static str {
        "unsafe-script"
    }

    fn evaluate(
        &self,
        doc: &WorkflowDocument,
        source: &str,
        file_name: &str,
    ) -> anyhow::Result<Vec<Finding>> {
        let mut findings = Vec::new();
        let remote_re = Regex::new(REMOTE_SCRIPT_PATTERN)?;

        for (job_id, job) in &doc.jobs {
            for (i, step) in job.steps.iter().enumerate() {
                let Some(run) = &step.run else { continue };
                let location = Location::step(job_id, i, step.line);

                if let Some(m) = remote_re.find(run) {
                    findings.push(
                        Finding::new(
                            FindingKind::Security,
                            Severity::Error,
                            "unsafe remote script execution",
                            format!(
                                "Step {} in job '{job_id}' pipes a download directly \
                                 into a shell (`{}`). The fetched script runs \
                                 unverified and can change between runs.",
                                i + 1,
                                m.as_str().trim()
                            ),
                            file_name,
                        )
                        .at(location.clone())
                        .suggest(
                            "Download to a file, verify a checksum or signature, then \
                             execute the verified copy.",
                        )
                        .with_snippet(source),
                    );
                }

                for ctx in UNTRUSTED_CONTEXTS {
                    let expression = format!("${{{{ {ctx} }}}}");
                    if run.contains(&expression) || run.contains(&format!("${{{{{ctx}}}}}")) {
                        findings.push(
                            Finding::new(
                                FindingKind::Security,
                                Severity::Error,
                                format!("command injection via {ctx}"),
                                format!(
                                    "Step {} in job '{job_id}' interpolates `{ctx}` \
                                     directly into a shell command. The value is \
                                     attacker-controlled and can execute arbitrary code.",
                                    i + 1
                                ),
                                file_name,
                            )
                            .at(location.clone())
                            .suggest(format!(
                                "Assign the value to an env var first:\n  env:\n    \
                                 SAFE_VALUE: ${{{{ {ctx} }}}}\nthen use \"$SAFE_VALUE\" \
                                 in the script."
                            ))
                            .reference("https://securitylab.github.com/research/github-actions-untrusted-input/")
                            .with_snippet(source),
                        );
                    }
                }
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
        UnsafeScriptExecution.evaluate(&doc, yaml, "ci.yml").unwrap()
    }

    #[test]
    fn test_curl_pipe_bash_flagged() {
        let findings = run(r#"
on: push
jobs:
  setup:
    steps:
      - run: curl https://example.com/install.sh | bash
"#);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
        assert!(findings[0].title.contains("remote script"));
        assert_eq!(findings[0].location.as_ref().unwrap().line, Some(6));
    }

    #[test]
    fn test_wget_pipe_sudo_sh_flagged() {
        let findings = run(r#"
on: push
jobs:
  setup:
    steps:
      - run: wget -qO- https://get.example.com | sudo sh
"#);
        assert!(!findings.is_empty());
    }

    #[test]
    fn test_plain_curl_not_flagged() {
        let findings = run(r#"
on: push
jobs:
  fetch:
    steps:
      - run: curl -o data.json https://api.example.com/data
"#);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_pr_title_injection_flagged() {
        let findings = run(r#"
on: pull_request_target
jobs:
  greet:
    steps:
      - run: echo "Thanks for ${{ github.event.pull_request.title }}"
"#);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].title.contains("command injection"));
    }

    #[test]
    fn test_safe_context_not_flagged() {
        let findings = run(r#"
on: push
jobs:
  build:
    steps:
      - run: echo "${{ github.sha }}"
"#);
        assert!(findings.is_empty());
    }
}
