use colored::*;
use flowlint_core::finding::Finding;
use flowlint_core::reachability::Verdict;
use flowlint_core::{AnalysisReport, Severity};

/// Print a full scan report to the terminal.
pub fn print_report(report: &AnalysisReport) {
    println!();
    println!(
        "{}",
        format!(
            " flowlint v{} — {}",
            env!("CARGO_PKG_VERSION"),
            report.file_name
        )
        .bold()
    );
    println!();

    if let Some(error) = &report.error {
        println!(" {} {}", " PARSE ERROR ".on_red().white().bold(), error);
        println!();
        return;
    }

    if let Some(graph) = &report.call_graph {
        println!(" {}", "Structure".bold().underline());
        println!(
            " {} {} job dependencies, {} isolated job(s)",
            "|-".dimmed(),
            graph.job_dependencies.len(),
            graph.isolated_jobs.len()
        );
        if let Some(path) = graph.critical_paths.first() {
            println!(" {} Critical path: {}", "|-".dimmed(), path.join(" -> "));
        }
        println!();
    }

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    if report.findings.is_empty() {
        println!(" {} No issues found.", "OK".green().bold());
    } else {
        for finding in &report.findings {
            print_finding(finding);
            println!();
        }
    }

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    if let Some(reach) = &report.reachability {
        let high_risk = reach
            .insights
            .iter()
            .filter(|i| i.verdict == Verdict::ReachableHighRisk)
            .collect::<Vec<_>>();
        if !high_risk.is_empty() {
            println!(" {}", "High-Risk Paths".bold().underline());
            for insight in high_risk {
                println!(
                    " {} {} via {}",
                    "|-".dimmed(),
                    insight.title.red(),
                    insight.source
                );
                if !insight.path.is_empty() {
                    println!(
                        " {}   {} -> {}",
                        "|".dimmed(),
                        insight.path.join(" -> "),
                        insight.sink.dimmed()
                    );
                }
            }
            println!();
        }
    }

    println!(" {}", "Summary".bold().underline());
    println!(
        " {} Findings: {} errors, {} warnings, {} info",
        "|-".dimmed(),
        if report.summary.error_count > 0 {
            report.summary.error_count.to_string().red().bold().to_string()
        } else {
            "0".to_string()
        },
        if report.summary.warning_count > 0 {
            report
                .summary
                .warning_count
                .to_string()
                .yellow()
                .bold()
                .to_string()
        } else {
            "0".to_string()
        },
        report.summary.info_count,
    );
    let score = report.summary.score;
    let score_display = if score >= 80 {
        score.to_string().green().bold().to_string()
    } else if score >= 50 {
        score.to_string().yellow().bold().to_string()
    } else {
        score.to_string().red().bold().to_string()
    };
    println!(" {} Score: {}/100", "|-".dimmed(), score_display);
    println!();
}

fn print_finding(finding: &Finding) {
    let tag = match finding.severity {
        Severity::Error => " ERROR ".on_red().white().bold().to_string(),
        Severity::Warning => " WARN ".on_yellow().black().bold().to_string(),
        Severity::Info => " INFO ".on_blue().white().to_string(),
    };

    println!(
        " {} [{}] {}",
        tag,
        finding.kind.label().dimmed(),
        finding.title.bold()
    );
    if let Some(location) = &finding.location {
        let mut parts = Vec::new();
        if let Some(job) = &location.job {
            parts.push(format!("job {}", job));
        }
        if let Some(step) = location.step {
            parts.push(format!("step {}", step + 1));
        }
        if let Some(line) = location.line {
            parts.push(format!("line {}", line));
        }
        if !parts.is_empty() {
            println!("   {} {}", "|".dimmed(), parts.join(", ").dimmed());
        }
    }
    println!("   {} {}", "|".dimmed(), finding.description);

    if let Some(snippet) = &finding.snippet {
        for (offset, text) in snippet.text.lines().enumerate() {
            let line_no = snippet.start_line + offset;
            let marker = if Some(line_no) == snippet.highlight {
                ">".red().bold().to_string()
            } else {
                " ".to_string()
            };
            println!("   {} {:>4} {} {}", "|".dimmed(), line_no, marker, text);
        }
    }

    if let Some(suggestion) = &finding.suggestion {
        println!("   {} Fix: {}", "|".dimmed(), suggestion.cyan());
    }
    for reference in &finding.references {
        println!("   {} See: {}", "|".dimmed(), reference.dimmed());
    }
}
