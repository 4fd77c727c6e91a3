use serde::{Deserialize, Serialize};

/// Severity of an analysis finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn priority(&self) -> u8 {
        match self {
            Severity::Error => 3,
            Severity::Warning => 2,
            Severity::Info => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

/// The five finding categories. Hosts are expected to match exhaustively so
/// new categories cannot be silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingKind {
    Security,
    Performance,
    BestPractice,
    Dependency,
    Structure,
}

impl FindingKind {
    pub fn label(&self) -> &'static str {
        match self {
            FindingKind::Security => "security",
            FindingKind::Performance => "performance",
            FindingKind::BestPractice => "best-practice",
            FindingKind::Dependency => "dependency",
            FindingKind::Structure => "structure",
        }
    }
}

/// Where in the source file a finding points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub job: Option<String>,
    /// 0-based step index within the job.
    pub step: Option<usize>,
    /// 1-based source line.
    pub line: Option<usize>,
}

impl Location {
    pub fn job(id: &str, line: usize) -> Self {
        Location {
            job: Some(id.to_string()),
            step: None,
            line: Some(line),
        }
    }

    pub fn step(job: &str, index: usize, line: usize) -> Self {
        Location {
            job: Some(job.to_string()),
            step: Some(index),
            line: Some(line),
        }
    }
}

/// A raw text span extracted as evidence for a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub start_line: usize,
    pub end_line: usize,
    pub highlight: Option<usize>,
    pub text: String,
}

impl CodeSnippet {
    /// Extract the lines around `line` (1-based) with `context` lines of
    /// surrounding text on each side.
    pub fn extract(source: &str, line: usize, context: usize) -> Option<Self> {
        if line == 0 {
            return None;
        }
        let lines: Vec<&str> = source.lines().collect();
        if line > lines.len() {
            return None;
        }
        let start = line.saturating_sub(context).max(1);
        let end = (line + context).min(lines.len());
        let text = lines[start - 1..end].join("\n");
        Some(CodeSnippet {
            start_line: start,
            end_line: end,
            highlight: Some(line),
            text,
        })
    }
}

/// A single reported issue.
///
/// Severity and kind are fixed at creation; the aggregator's context-based
/// escalation (info to warning) is the only mutation allowed afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub kind: FindingKind,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub file_name: String,
    pub location: Option<Location>,
    pub suggestion: Option<String>,
    pub references: Vec<String>,
    pub snippet: Option<CodeSnippet>,
    /// True for advisories synthesized by the aggregator from workflow
    /// context rather than emitted by a rule.
    pub context_derived: bool,
}

impl Finding {
    pub fn new(
        kind: FindingKind,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Finding {
            id: String::new(),
            kind,
            severity,
            title: title.into(),
            description: description.into(),
            file_name: file_name.into(),
            location: None,
            suggestion: None,
            references: Vec::new(),
            snippet: None,
            context_derived: false,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn reference(mut self, url: impl Into<String>) -> Self {
        self.references.push(url.into());
        self
    }

    pub fn with_snippet(mut self, source: &str) -> Self {
        if let Some(line) = self.location.as_ref().and_then(|l| l.line) {
            self.snippet = CodeSnippet::extract(source, line, 2);
        }
        self
    }

    /// Key used for exact-duplicate suppression.
    pub fn dedup_key(&self) -> (FindingKind, String, Option<Location>) {
        (self.kind, self.title.clone(), self.location.clone())
    }
}

/// Per-file severity totals and the 0-100 score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_issues: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub score: u32,
}

impl Summary {
    /// Score formula: 100 for a clean file, otherwise a severity-weighted
    /// deduction clamped to [0, 100].
    pub fn compute(findings: &[Finding]) -> Self {
        let error_count = findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .count();
        let warning_count = findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count();
        let info_count = findings
            .iter()
            .filter(|f| f.severity == Severity::Info)
            .count();
        let total_issues = findings.len();

        let score = if total_issues == 0 {
            100
        } else {
            let penalty = (error_count * 10 + warning_count * 5) as f64 / 50.0;
            ((1.0 - penalty) * 100.0).round().max(0.0) as u32
        };

        Summary {
            total_issues,
            error_count,
            warning_count,
            info_count,
            score,
        }
    }
}

/// The complete analysis report for a single workflow file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub file_id: String,
    pub file_name: String,
    pub findings: Vec<Finding>,
    pub call_graph: Option<crate::graph::CallGraphData>,
    pub reachability: Option<crate::reachability::ReachabilityData>,
    pub summary: Summary,
    /// Set when the file could not be analyzed; findings are empty then.
    pub error: Option<String>,
}

impl AnalysisReport {
    /// Report for a file whose parse failed. The file stays in the batch
    /// with an attached error message instead of being dropped.
    pub fn failed(file_name: &str, message: String) -> Self {
        AnalysisReport {
            file_id: file_name.to_string(),
            file_name: file_name.to_string(),
            findings: Vec::new(),
            call_graph: None,
            reachability: None,
            summary: Summary::compute(&[]),
            error: Some(message),
        }
    }
}
