mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flowlint_core::{scan_source, AnalysisReport, Dialect, Severity};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "flowlint",
    version,
    about = "flowlint — CI/CD workflow security and quality analyzer",
    long_about = "Scan GitHub Actions and GitLab CI definitions for security issues, \
                  performance problems, and structural defects before they ship."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan workflow files and report findings
    Scan {
        /// Path to a workflow file or a directory to search
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { path, format } => cmd_scan(&path, &format),
    }
}

/// Well-known workflow locations under a directory, plus any YAML directly
/// inside it.
fn discover_workflow_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if path.is_dir() {
        let patterns = [
            format!("{}/.github/workflows/*.yml", path.display()),
            format!("{}/.github/workflows/*.yaml", path.display()),
            format!("{}/.gitlab-ci.yml", path.display()),
            format!("{}/*.yml", path.display()),
            format!("{}/*.yaml", path.display()),
        ];
        let mut files = Vec::new();
        for pattern in &patterns {
            for entry in glob::glob(pattern).context("Failed to read glob pattern")? {
                let file = entry?;
                if !files.contains(&file) {
                    files.push(file);
                }
            }
        }
        files.sort();
        return Ok(files);
    }

    anyhow::bail!("Path '{}' does not exist", path.display());
}

fn cmd_scan(path: &Path, format: &str) -> Result<()> {
    let files = discover_workflow_files(path)?;

    if files.is_empty() {
        anyhow::bail!(
            "No workflow files found at '{}'. \
            Point flowlint at a YAML workflow file or a repository root.",
            path.display()
        );
    }

    log::debug!("scanning {} workflow file(s)", files.len());

    let mut reports = Vec::new();
    for file in &files {
        let source = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let file_name = file.to_string_lossy();
        let dialect = Dialect::from_file_name(&file_name);
        reports.push(scan_source(&source, &file_name, dialect));
    }

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&reports)?;
            println!("{}", json);
        }
        _ => {
            for report in &reports {
                display::print_report(report);
            }
        }
    }

    std::process::exit(exit_code(&reports));
}

/// 2 if any Error finding, 1 if any Warning or unreadable file, else 0.
fn exit_code(reports: &[AnalysisReport]) -> i32 {
    let mut code = 0;
    for report in reports {
        if report.error.is_some() {
            code = code.max(1);
        }
        for finding in &report.findings {
            match finding.severity {
                Severity::Error => code = 2,
                Severity::Warning => code = code.max(1),
                Severity::Info => {}
            }
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_finds_workflow_dir_and_gitlab_file() {
        let dir = TempDir::new().unwrap();
        let workflows = dir.path().join(".github/workflows");
        fs::create_dir_all(&workflows).unwrap();
        fs::write(workflows.join("ci.yml"), "on: push\njobs: {}\n").unwrap();
        fs::write(dir.path().join(".gitlab-ci.yml"), "stages: [build]\n").unwrap();

        let files = discover_workflow_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_discover_single_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("pipeline.yml");
        fs::write(&file, "on: push\njobs: {}\n").unwrap();
        let files = discover_workflow_files(&file).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn test_exit_code_reflects_worst_severity() {
        let clean = scan_source(
            "on: push\njobs:\n  a:\n    steps:\n      - run: echo hi\n",
            "ci.yml",
            Dialect::GithubActions,
        );
        let broken = scan_source("on: [push\n", "bad.yml", Dialect::GithubActions);
        let risky = scan_source(
            "on: push\njobs:\n  a:\n    steps:\n      - run: curl https://x.sh | sh\n",
            "ci.yml",
            Dialect::GithubActions,
        );

        assert_eq!(exit_code(&[clean.clone()]), 0);
        assert_eq!(exit_code(&[clean.clone(), broken]), 1);
        assert_eq!(exit_code(&[clean, risky]), 2);
    }
}
