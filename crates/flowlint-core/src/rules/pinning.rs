use crate::actions_db::KnownActionsDb;
use crate::finding::{Finding, FindingKind, Location, Severity};
use crate::model::WorkflowDocument;
use crate::rules::Rule;

/// Flags `uses:` references whose ref is not a full commit SHA, plus any
/// reference to an action with a published supply-chain advisory.
pub struct UnpinnedActions {
    pub db: KnownActionsDb,
}

impl Rule for UnpinnedActions {
    fn id(&self) -> &'static str {
        "unpinned-action"
    }

    fn evaluate(
        &self,
        doc: &WorkflowDocument,
        source: &str,
        file_name: &str,
    ) -> anyhow::Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for (job_id, job) in &doc.jobs {
            for (i, step) in job.steps.iter().enumerate() {
                let Some(uses) = &step.uses else { continue };
                if !uses.is_pinnable() {
                    continue;
                }
                let location = Location::step(job_id, i, step.line);
                let slug = uses.slug();

                if let Some(advisory) = self.db.advisory(&slug) {
                    findings.push(
                        Finding::new(
                            FindingKind::Security,
                            Severity::Error,
                            format!("known compromised action '{slug}'"),
                            format!(
                                "Job '{job_id}' uses '{}': {advisory}.",
                                uses.raw
                            ),
                            file_name,
                        )
                        .at(location.clone())
                        .suggest(format!("Pin '{slug}' to a verified full commit SHA."))
                        .with_snippet(source),
                    );
                }

                if uses.is_sha_pinned() {
                    continue;
                }

                let ref_kind = if uses.reference.is_empty() {
                    "has no version ref at all"
                } else {
                    "is pinned to a mutable ref"
                };
                let suggestion = match self.db.lookup(&slug) {
                    Some(known) => format!(
                        "Pin to the latest release commit: `{slug}@{}` ({}).",
                        known.sha, known.latest_tag
                    ),
                    None => format!(
                        "Pin to a full 40-character commit SHA: `{slug}@<commit-sha>`."
                    ),
                };

                findings.push(
                    Finding::new(
                        FindingKind::Dependency,
                        Severity::Warning,
                        format!("action '{slug}' is not pinned to a commit SHA"),
                        format!(
                            "Job '{job_id}' uses '{}', which {ref_kind}. Tags and \
                             branches can be moved by the action maintainer, allowing \
                             code injection into this workflow.",
                            uses.raw
                        ),
                        file_name,
                    )
                    .at(location)
                    .suggest(suggestion)
                    .reference("https://docs.github.com/en/actions/security-guides/security-hardening-for-github-actions#using-third-party-actions")
                    .with_snippet(source),
                );
            }
        }

        Ok(findings)
    }
}
