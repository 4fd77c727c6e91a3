use crate::context::{WorkflowContext, WorkflowType};
use crate::finding::{AnalysisReport, Finding, FindingKind, Severity, Summary};
use crate::graph::CallGraphData;
use crate::model::WorkflowDocument;

/// Merge rule and graph findings into the final per-file report.
///
/// Context shapes the result three ways: utility and small automation
/// workflows get documentation nits suppressed, production workflows get
/// operational Info findings escalated to Warning, and the classifier can
/// contribute advisories of its own. Severity never de-escalates.
/// Reachability runs over the merged finding set, so its totals always
/// match the security findings of the finished report.
pub fn aggregate(
    doc: &WorkflowDocument,
    file_name: &str,
    rule_findings: Vec<Finding>,
    graph_findings: Vec<Finding>,
    context: &WorkflowContext,
    call_graph: CallGraphData,
) -> AnalysisReport {
    let mut findings = rule_findings;
    for (i, mut finding) in graph_findings.into_iter().enumerate() {
        if finding.id.is_empty() {
            finding.id = format!("graph-{:03}", i + 1);
        }
        findings.push(finding);
    }

    findings.retain(|f| !suppressed(f, context, doc));
    for finding in &mut findings {
        escalate(finding, context);
    }

    for (i, mut advisory) in context_advisories(doc, file_name, context)
        .into_iter()
        .enumerate()
    {
        advisory.id = format!("context-{:03}", i + 1);
        findings.push(advisory);
    }

    findings.sort_by(|a, b| {
        b.severity
            .priority()
            .cmp(&a.severity.priority())
            .then_with(|| {
                let line = |f: &Finding| {
                    f.location
                        .as_ref()
                        .and_then(|l| l.line)
                        .unwrap_or(usize::MAX)
                };
                line(a).cmp(&line(b))
            })
            .then_with(|| a.title.cmp(&b.title))
    });

    let reachability =
        crate::reachability::analyze(doc, &findings, &context.execution, Some(&call_graph));

    let summary = Summary::compute(&findings);
    AnalysisReport {
        file_id: file_name.to_string(),
        file_name: file_name.to_string(),
        findings,
        call_graph: Some(call_graph),
        reachability: Some(reachability),
        summary,
        error: None,
    }
}

/// Documentation nits that do not pay their way in trivial workflows.
fn suppressed(finding: &Finding, context: &WorkflowContext, doc: &WorkflowDocument) -> bool {
    if finding.kind != FindingKind::BestPractice || finding.severity != Severity::Info {
        return false;
    }
    let naming_nit = finding.title.contains("display name")
        || finding.title.contains("unnamed run step");
    match context.workflow_type {
        WorkflowType::Utility => naming_nit || finding.title.contains("no timeout"),
        // Larger automation workflows keep their naming findings.
        WorkflowType::Automation => naming_nit && doc.step_count() <= 3,
        _ => false,
    }
}

/// In production-facing workflows an operational Info is worth acting on.
fn escalate(finding: &mut Finding, context: &WorkflowContext) {
    if !context.execution.has_production_indicators || finding.severity != Severity::Info {
        return;
    }
    let operational = finding.kind == FindingKind::Security
        || finding.title.contains("no failure handling")
        || finding.title.contains("no timeout");
    if operational {
        finding.severity = Severity::Warning;
    }
}

fn context_advisories(
    doc: &WorkflowDocument,
    file_name: &str,
    context: &WorkflowContext,
) -> Vec<Finding> {
    let mut advisories = Vec::new();

    if context.workflow_type == WorkflowType::Cd {
        let gated = doc.triggers.contains("workflow_dispatch")
            || context.execution.conditional_jobs > 0;
        if !gated {
            let mut finding = Finding::new(
                FindingKind::BestPractice,
                Severity::Info,
                "deployment workflow runs without a gate",
                "This workflow deploys or publishes, yet every job runs \
                 unconditionally on its trigger. A bad merge goes straight to \
                 production."
                    .to_string(),
                file_name,
            )
            .suggest(
                "Gate the deploy job on an environment with required reviewers, \
                 or switch the trigger to `workflow_dispatch`.",
            );
            finding.context_derived = true;
            advisories.push(finding);
        }
    }

    if context.execution.has_privileged_triggers && context.execution.has_secrets {
        let mut finding = Finding::new(
            FindingKind::Security,
            Severity::Info,
            "secrets exposed under a privileged trigger",
            "The workflow combines a privileged trigger with secret access. \
             Review every step that handles untrusted input, since the token \
             and secrets are live in that context."
                .to_string(),
            file_name,
        )
        .suggest("Split the privileged handling into a separate minimal workflow.");
        finding.context_derived = true;
        advisories.push(finding);
    }

    advisories
}
