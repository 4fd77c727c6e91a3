pub mod github;
pub mod gitlab;
mod lines;

use crate::model::{Dialect, WorkflowDocument};
use serde_yaml::Value;
use thiserror::Error;

pub(crate) use lines::LineIndex;

/// Structured parse failure. Analysis does not proceed for the file; the
/// caller gets a message and, where determinable, a best-guess line number.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid YAML: {message}")]
    Yaml {
        message: String,
        line: Option<usize>,
    },

    #[error("invalid workflow structure: {message}")]
    InvalidStructure {
        message: String,
        line: Option<usize>,
    },
}

impl ParseError {
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Yaml { line, .. } => *line,
            ParseError::InvalidStructure { line, .. } => *line,
        }
    }

    pub(crate) fn structure(message: impl Into<String>) -> Self {
        ParseError::InvalidStructure {
            message: message.into(),
            line: None,
        }
    }
}

impl From<serde_yaml::Error> for ParseError {
    fn from(err: serde_yaml::Error) -> Self {
        ParseError::Yaml {
            message: err.to_string(),
            line: err.location().map(|l| l.line()),
        }
    }
}

/// Parse workflow source text into the canonical model.
pub fn parse(
    source: &str,
    file_name: &str,
    dialect: Dialect,
) -> Result<WorkflowDocument, ParseError> {
    let yaml: Value = serde_yaml::from_str(source)?;
    match dialect {
        Dialect::GithubActions => github::build(&yaml, source, file_name),
        Dialect::GitlabCi => gitlab::build(&yaml, source, file_name),
    }
}

/// Read a string-or-list YAML value into a plain list.
pub(crate) fn string_or_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

/// Read a YAML mapping of scalars into an ordered string map. Non-scalar
/// values are skipped rather than rejected.
pub(crate) fn scalar_map(value: &Value) -> indexmap::IndexMap<String, String> {
    let mut map = indexmap::IndexMap::new();
    if let Some(mapping) = value.as_mapping() {
        for (k, v) in mapping {
            let Some(key) = k.as_str() else { continue };
            let val = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            map.insert(key.to_string(), val);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_yaml_is_an_error_not_a_crash() {
        let err = parse("jobs: [unclosed", "ci.yml", Dialect::GithubActions).unwrap_err();
        assert!(matches!(err, ParseError::Yaml { .. }));
    }

    #[test]
    fn test_missing_jobs_is_structural() {
        let err = parse("name: empty\non: push\n", "ci.yml", Dialect::GithubActions).unwrap_err();
        assert!(matches!(err, ParseError::InvalidStructure { .. }));
        assert!(err.to_string().contains("jobs"));
    }

    #[test]
    fn test_unknown_top_level_keys_tolerated() {
        let yaml = r#"
name: CI
on: push
x-custom-extension: true
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: make
"#;
        let doc = parse(yaml, "ci.yml", Dialect::GithubActions).unwrap();
        assert_eq!(doc.job_count(), 1);
    }
}
