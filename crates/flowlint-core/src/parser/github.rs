use crate::model::{
    ActionRef, Dialect, Job, Permissions, Step, TriggerSpec, WorkflowDocument,
};
use crate::parser::{scalar_map, string_or_list, LineIndex, ParseError};
use indexmap::IndexMap;
use serde_yaml::Value;

/// Build the canonical model from a parsed GitHub Actions workflow.
pub(crate) fn build(
    yaml: &Value,
    source: &str,
    file_name: &str,
) -> Result<WorkflowDocument, ParseError> {
    let name = yaml
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(file_name)
        .to_string();

    let mut doc = WorkflowDocument::new(name, Dialect::GithubActions);
    doc.triggers = parse_triggers(yaml);
    doc.permissions = yaml.get("permissions").map(parse_permissions);
    if let Some(env) = yaml.get("env") {
        doc.env = scalar_map(env);
    }

    let jobs = yaml
        .get("jobs")
        .and_then(|v| v.as_mapping())
        .ok_or_else(|| ParseError::structure("no 'jobs' section found in workflow"))?;

    let index = LineIndex::new(source);
    for (job_id, config) in jobs {
        let Some(job_id) = job_id.as_str() else {
            continue;
        };
        let line = index.nested_job_key(job_id).unwrap_or(0);
        let job = parse_job(config, line, index.step_lines(line));
        doc.jobs.insert(job_id.to_string(), job);
    }

    Ok(doc)
}

/// `on:` may be a string, a list of events, or a map with per-event config.
fn parse_triggers(yaml: &Value) -> TriggerSpec {
    // serde_yaml reads a bare `on` key as the boolean `true`
    let on = yaml.get("on").or_else(|| yaml.get(Value::Bool(true)));
    match on {
        None => TriggerSpec::None,
        Some(Value::String(event)) => TriggerSpec::Single(event.clone()),
        Some(Value::Sequence(events)) => TriggerSpec::List(
            events
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        ),
        Some(Value::Mapping(map)) => {
            let mut specs = IndexMap::new();
            for (event, config) in map {
                if let Some(event) = event.as_str() {
                    specs.insert(event.to_string(), config.clone());
                }
            }
            TriggerSpec::Map(specs)
        }
        Some(_) => TriggerSpec::None,
    }
}

/// `permissions:` is either the `write-all`/`read-all` shorthand, an empty
/// map (everything disabled), or a scope-to-access map.
fn parse_permissions(value: &Value) -> Permissions {
    match value {
        Value::String(s) if s == "write-all" => Permissions::WriteAll,
        Value::String(s) if s == "read-all" => Permissions::ReadAll,
        Value::Mapping(map) if map.is_empty() => Permissions::Disabled,
        Value::Mapping(_) => Permissions::Scoped(scalar_map(value)),
        _ => Permissions::Disabled,
    }
}

fn parse_job(config: &Value, line: usize, step_lines: Vec<usize>) -> Job {
    let mut job = Job {
        line,
        ..Job::default()
    };

    job.name = config
        .get("name")
        .and_then(|v| v.as_str())
        .map(String::from);
    if let Some(runs_on) = config.get("runs-on") {
        job.runs_on = string_or_list(runs_on);
    }
    if let Some(needs) = config.get("needs") {
        job.needs = string_or_list(needs);
    }
    job.permissions = config.get("permissions").map(parse_permissions);
    if let Some(env) = config.get("env") {
        job.env = scalar_map(env);
    }
    job.condition = config
        .get("if")
        .and_then(|v| v.as_str())
        .map(String::from);
    job.concurrency_group = config
        .get("concurrency")
        .map(|c| match c {
            Value::String(s) => s.clone(),
            _ => c
                .get("group")
                .and_then(|g| g.as_str())
                .unwrap_or_default()
                .to_string(),
        })
        .filter(|g| !g.is_empty());
    job.timeout_minutes = config.get("timeout-minutes").and_then(|v| v.as_u64());

    if let Some(steps) = config.get("steps").and_then(|v| v.as_sequence()) {
        for (i, step) in steps.iter().enumerate() {
            let step_line = step_lines.get(i).copied().unwrap_or(line);
            job.steps.push(parse_step(step, step_line));
        }
    }

    job
}

fn parse_step(step: &Value, line: usize) -> Step {
    Step {
        name: step.get("name").and_then(|v| v.as_str()).map(String::from),
        id: step.get("id").and_then(|v| v.as_str()).map(String::from),
        uses: step
            .get("uses")
            .and_then(|v| v.as_str())
            .map(ActionRef::parse),
        run: step.get("run").and_then(|v| v.as_str()).map(String::from),
        with: step.get("with").map(scalar_map).unwrap_or_default(),
        env: step.get("env").map(scalar_map).unwrap_or_default(),
        condition: step.get("if").and_then(|v| v.as_str()).map(String::from),
        line,
    }
}
