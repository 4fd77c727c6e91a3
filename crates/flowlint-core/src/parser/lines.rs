/// Line-oriented scanner used to recover source positions.
///
/// serde_yaml discards node position metadata, so job and step lines are
/// re-derived by scanning the original text for the defining keys. All line
/// numbers are 1-based.
pub(crate) struct LineIndex<'a> {
    lines: Vec<&'a str>,
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines().collect(),
        }
    }

    fn matches_key(line: &str, key: &str) -> bool {
        let trimmed = line.trim_start();
        trimmed.strip_prefix(key).is_some_and(|rest| {
            rest.starts_with(':')
        }) || trimmed
            .strip_prefix(&format!("\"{key}\""))
            .or_else(|| trimmed.strip_prefix(&format!("'{key}'")))
            .is_some_and(|rest| rest.starts_with(':'))
    }

    /// Line of `key:` at indentation zero.
    pub fn top_level_key(&self, key: &str) -> Option<usize> {
        self.lines.iter().position(|line| {
            indent_of(line) == 0 && Self::matches_key(line, key)
        }).map(|i| i + 1)
    }

    /// Line of a job's defining key nested under a top-level `jobs:` block.
    ///
    /// Only keys at the job indentation level count; a `with:` parameter or
    /// env var deeper in the block that shares the job's name must not match.
    pub fn nested_job_key(&self, job_id: &str) -> Option<usize> {
        let jobs_line = self.top_level_key("jobs")?;
        let mut job_indent = None;
        for (i, line) in self.lines.iter().enumerate().skip(jobs_line) {
            if is_blank_or_comment(line) {
                continue;
            }
            let indent = indent_of(line);
            if indent == 0 {
                break;
            }
            let expected = *job_indent.get_or_insert(indent);
            if indent != expected {
                continue;
            }
            if Self::matches_key(line, job_id) {
                return Some(i + 1);
            }
        }
        None
    }

    /// Line of `key:` nested anywhere inside the block opened at
    /// `parent_line`.
    pub fn nested_key(&self, parent_line: usize, key: &str) -> Option<usize> {
        if parent_line == 0 || parent_line > self.lines.len() {
            return None;
        }
        let parent_indent = indent_of(self.lines[parent_line - 1]);
        for (i, line) in self.lines.iter().enumerate().skip(parent_line) {
            if is_blank_or_comment(line) {
                continue;
            }
            if indent_of(line) <= parent_indent {
                break;
            }
            if Self::matches_key(line, key) {
                return Some(i + 1);
            }
        }
        None
    }

    /// Lines of each `- ` step opener in the job's `steps:` sequence.
    pub fn step_lines(&self, job_line: usize) -> Vec<usize> {
        let mut result = Vec::new();
        if job_line == 0 || job_line > self.lines.len() {
            return result;
        }
        let job_indent = indent_of(self.lines[job_line - 1]);

        let mut steps_line = None;
        for (i, line) in self.lines.iter().enumerate().skip(job_line) {
            if is_blank_or_comment(line) {
                continue;
            }
            let indent = indent_of(line);
            if indent <= job_indent {
                break;
            }
            if Self::matches_key(line, "steps") {
                steps_line = Some(i + 1);
                break;
            }
        }
        let Some(steps_line) = steps_line else {
            return result;
        };

        let mut item_indent = None;
        for (i, line) in self.lines.iter().enumerate().skip(steps_line) {
            if is_blank_or_comment(line) {
                continue;
            }
            let indent = indent_of(line);
            let trimmed = line.trim_start();
            match item_indent {
                None => {
                    if trimmed.starts_with('-') {
                        item_indent = Some(indent);
                        result.push(i + 1);
                    } else {
                        break;
                    }
                }
                Some(expected) => {
                    if indent < expected {
                        break;
                    }
                    if indent == expected && trimmed.starts_with('-') {
                        result.push(i + 1);
                    }
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"name: CI
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - name: Build
        run: make
  test:
    needs: build
    steps:
      - run: make test
"#;

    #[test]
    fn test_top_level_key() {
        let index = LineIndex::new(SAMPLE);
        assert_eq!(index.top_level_key("jobs"), Some(3));
        assert_eq!(index.top_level_key("missing"), None);
    }

    #[test]
    fn test_job_lines() {
        let index = LineIndex::new(SAMPLE);
        assert_eq!(index.nested_job_key("build"), Some(4));
        assert_eq!(index.nested_job_key("test"), Some(10));
    }

    #[test]
    fn test_step_lines() {
        let index = LineIndex::new(SAMPLE);
        assert_eq!(index.step_lines(4), vec![7, 8]);
        assert_eq!(index.step_lines(10), vec![13]);
    }

    #[test]
    fn test_nested_parameter_does_not_shadow_job_key() {
        let source = r#"jobs:
  build:
    steps:
      - uses: actions/setup-node@v4
        with:
          cache: npm
  cache:
    steps:
      - run: echo hi
"#;
        let index = LineIndex::new(source);
        assert_eq!(index.nested_job_key("cache"), Some(7));
        assert_eq!(index.nested_job_key("build"), Some(2));
    }

    #[test]
    fn test_quoted_job_key() {
        let source = "jobs:\n  \"deploy prod\":\n    steps:\n      - run: ship\n";
        let index = LineIndex::new(source);
        assert_eq!(index.nested_job_key("deploy prod"), Some(2));
    }
}
