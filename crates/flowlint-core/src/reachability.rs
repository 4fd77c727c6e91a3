use crate::context::ExecutionContext;
use crate::finding::{Finding, FindingKind};
use crate::graph::CallGraphData;
use crate::model::WorkflowDocument;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reachability verdict for a security finding, derived from a fixed table
/// over (privileged trigger, secrets presence, static guard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Reachable under a privileged trigger with secrets in scope.
    ReachableHighRisk,
    /// Reachable with either elevated privilege or secrets in scope.
    Reachable,
    /// Reachable, but with neither privilege nor secrets the impact is low.
    ReachableLowImpact,
    /// Statically guarded by an always-false condition.
    Mitigated,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::ReachableHighRisk => "reachable, high-risk",
            Verdict::Reachable => "reachable",
            Verdict::ReachableLowImpact => "reachable, low impact",
            Verdict::Mitigated => "mitigated",
        }
    }
}

/// A security finding annotated with its reachability narrative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub finding_id: String,
    pub title: String,
    pub verdict: Verdict,
    /// Where the triggering input originates.
    pub source: String,
    /// Job chain leading to the finding, ending at its step when known.
    pub path: Vec<String>,
    /// Impact category.
    pub sink: String,
}

/// Counts over the security-type findings of one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReachabilityStats {
    pub total_issues: usize,
    pub reachable_issues: usize,
    pub high_risk_issues: usize,
    pub mitigated_issues: usize,
}

/// Reachability analysis output, scoped to security findings only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachabilityData {
    pub stats: ReachabilityStats,
    pub execution_context: ExecutionContext,
    pub insights: Vec<Insight>,
}

/// Annotate security findings with reachability verdicts.
///
/// This is a lookup pass over signals the rule engine already extracted,
/// not a taint-tracking engine; expressions are never evaluated beyond the
/// statically-false guard check.
pub fn analyze(
    doc: &WorkflowDocument,
    findings: &[Finding],
    execution: &ExecutionContext,
    call_graph: Option<&CallGraphData>,
) -> ReachabilityData {
    let mut insights = Vec::new();
    let mut stats = ReachabilityStats::default();

    for finding in findings.iter().filter(|f| f.kind == FindingKind::Security) {
        stats.total_issues += 1;

        let guarded = finding_guard(doc, finding).is_some_and(always_false);
        let verdict = if guarded {
            Verdict::Mitigated
        } else {
            match (execution.has_privileged_triggers, execution.has_secrets) {
                (true, true) => Verdict::ReachableHighRisk,
                (true, false) | (false, true) => Verdict::Reachable,
                (false, false) => Verdict::ReachableLowImpact,
            }
        };

        match verdict {
            Verdict::Mitigated => stats.mitigated_issues += 1,
            Verdict::ReachableHighRisk => {
                stats.reachable_issues += 1;
                stats.high_risk_issues += 1;
            }
            _ => stats.reachable_issues += 1,
        }

        insights.push(Insight {
            finding_id: finding.id.clone(),
            title: finding.title.clone(),
            verdict,
            source: describe_source(execution),
            path: dependency_path(finding, call_graph),
            sink: describe_sink(finding),
        });
    }

    ReachabilityData {
        stats,
        execution_context: execution.clone(),
        insights,
    }
}

/// The `if` guard covering the finding's location: the step's condition if
/// it has one, else the job's.
fn finding_guard<'a>(doc: &'a WorkflowDocument, finding: &Finding) -> Option<&'a str> {
    let location = finding.location.as_ref()?;
    let job_id = location.job.as_ref()?;
    let job = doc.jobs.get(job_id)?;
    if let Some(step_index) = location.step {
        if let Some(step) = job.steps.get(step_index) {
            if let Some(cond) = &step.condition {
                return Some(cond);
            }
        }
    }
    job.condition.as_deref()
}

/// Statically provable always-false guards. Anything beyond a literal
/// `false` is treated as potentially true.
fn always_false(cond: &str) -> bool {
    matches!(
        cond.trim(),
        "false" | "'false'" | "\"false\"" | "${{ false }}" | "${{false}}"
    )
}

fn describe_source(execution: &ExecutionContext) -> String {
    let privileged: Vec<&str> = execution
        .triggers
        .iter()
        .filter(|t| crate::context::PRIVILEGED_TRIGGERS.contains(&t.as_str()))
        .map(String::as_str)
        .collect();
    if !privileged.is_empty() {
        format!("privileged trigger: {}", privileged.join(", "))
    } else if let Some(first) = execution.triggers.first() {
        format!("trigger: {first}")
    } else {
        "manual invocation".to_string()
    }
}

fn describe_sink(finding: &Finding) -> String {
    let title = finding.title.to_lowercase();
    if title.contains("injection") {
        "arbitrary code execution on the runner".to_string()
    } else if title.contains("credential")
        || title.contains("secret")
        || title.contains("entropy")
    {
        "credential disclosure".to_string()
    } else if title.contains("remote script") || title.contains("compromised action") {
        "supply-chain compromise of the build".to_string()
    } else if title.contains("permissions") || title.contains("write-all") {
        "repository write access abuse".to_string()
    } else {
        "workflow compromise".to_string()
    }
}

/// Job chain from a dependency root to the finding's job, reproduced from
/// the call graph edges; falls back to just the job itself.
fn dependency_path(finding: &Finding, call_graph: Option<&CallGraphData>) -> Vec<String> {
    let Some(location) = finding.location.as_ref() else {
        return Vec::new();
    };
    let Some(job_id) = location.job.clone() else {
        return Vec::new();
    };

    let mut path = vec![job_id.clone()];
    if let Some(graph) = call_graph {
        let mut preds: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &graph.job_dependencies {
            preds.entry(edge.to.as_str()).or_default().push(edge.from.as_str());
        }
        let mut current = job_id;
        let mut hops = 0;
        while let Some(parents) = preds.get(current.as_str()) {
            // Lexically smallest predecessor keeps the narrative stable.
            let Some(&next) = parents.iter().min() else { break };
            if path.iter().any(|p| p == next) || hops > graph.job_dependencies.len() {
                break;
            }
            path.insert(0, next.to_string());
            current = next.to_string();
            hops += 1;
        }
    }
    if let Some(step_index) = location.step {
        path.push(format!("step {}", step_index + 1));
    }
    path
}
