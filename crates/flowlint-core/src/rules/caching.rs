use crate::finding::{Finding, FindingKind, Location, Severity};
use crate::model::{Job, WorkflowDocument};
use crate::rules::Rule;
use regex::Regex;

struct PackageManager {
    label: &'static str,
    install_pattern: &'static str,
    cache_hint: &'static str,
}

const PACKAGE_MANAGERS: &[PackageManager] = &[
    PackageManager {
        label: "npm/yarn/pnpm",
        install_pattern: r"\b(npm\s+(ci|install)|yarn\s+install|pnpm\s+install)\b",
        cache_hint: "cache node_modules keyed on the lockfile hash, or use \
                     setup-node's built-in `cache: npm`",
    },
    PackageManager {
        label: "pip",
        install_pattern: r"\bpip3?\s+install\b",
        cache_hint: "cache the pip download cache keyed on requirements.txt",
    },
    PackageManager {
        label: "cargo",
        install_pattern: r"\bcargo\s+(build|test|clippy|install)\b",
        cache_hint: "cache target/ and ~/.cargo/registry, e.g. with \
                     Swatinem/rust-cache",
    },
    PackageManager {
        label: "gradle/maven",
        install_pattern: r"(\./gradlew|\bgradle\s|\bmvn\s|\./mvnw)",
        cache_hint: "cache ~/.gradle/caches or ~/.m2/repository",
    },
    PackageManager {
        label: "bundler",
        install_pattern: r"\bbundle\s+install\b",
        cache_hint: "cache vendor/bundle keyed on Gemfile.lock",
    },
];

/// Flags dependency installs in jobs that configure no cache.
pub struct MissingDependencyCache;

fn job_has_cache(job: &Job) -> bool {
    job.steps.iter().any(|s| {
        s.uses.as_ref().is_some_and(|u| {
            u.slug() == "actions/cache"
                || u.repo == "rust-cache"
                || (u.owner == "actions"
                    && u.repo.starts_with("setup-")
                    && s.with.contains_key("cache"))
        })
    })
}

impl Rule for MissingDependencyCache {
    fn id(&self) -> &'static str {
        "missing-cache"
    }

    fn evaluate(
        &self,
        doc: &WorkflowDocument,
        source: &str,
        file_name: &str,
    ) -> anyhow::Result<Vec<Finding>> {
        let mut findings = Vec::new();
        let patterns: Vec<(usize, Regex)> = PACKAGE_MANAGERS
            .iter()
            .enumerate()
            .map(|(i, pm)| Ok((i, Regex::new(pm.install_pattern)?)))
            .collect::<Result<_, regex::Error>>()?;

        for (job_id, job) in &doc.jobs {
            if job_has_cache(job) {
                continue;
            }
            // One finding per package manager per job.
            let mut flagged = [false; PACKAGE_MANAGERS.len()];
            for (i, step) in job.steps.iter().enumerate() {
                let Some(run) = &step.run else { continue };
                let cmd = run.to_lowercase();
                for (pm_index, re) in &patterns {
                    if flagged[*pm_index] || !re.is_match(&cmd) {
                        continue;
                    }
                    flagged[*pm_index] = true;
                    let pm = &PACKAGE_MANAGERS[*pm_index];
                    findings.push(
                        Finding::new(
                            FindingKind::Performance,
                            Severity::Warning,
                            format!("no dependency cache for {}", pm.label),
                            format!(
                                "Job '{job_id}' installs {} dependencies without a \
                                 cache step, re-downloading everything on every run.",
                                pm.label
                            ),
                            file_name,
                        )
                        .at(Location::step(job_id, i, step.line))
                        .suggest(format!("Add a cache step: {}.", pm.cache_hint))
                        .with_snippet(source),
                    );
                }
            }
        }

        Ok(findings)
    }
}
