//! Terminal output for runs, builds and validation issues.

use apkforge_pipeline::{PipelineFailure, PipelineRun, PipelineStage};
use apkforge_project::ValidationIssue;
use apkforge_protocol::{Build, BuildStatus};
use colored::*;

const BAR_WIDTH: usize = 30;

/// `[#######.......]  42%`
pub fn progress_bar(percent: f64) -> String {
    let clamped = percent.clamp(0.0, 100.0);
    let filled = ((clamped / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:>3.0}%",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        clamped
    )
}

/// One line describing a run snapshot.
pub fn run_line(run: &PipelineRun) -> String {
    match run.stage {
        PipelineStage::Uploading if run.upload_total > 0 => format!(
            "{} {}",
            run.stage.label(),
            progress_bar(run.upload_percentage())
        ),
        PipelineStage::Building => match &run.build {
            Some(build) => format!("{} (build {})", run.stage.label(), build.id),
            None => run.stage.label().to_string(),
        },
        _ => run.stage.label().to_string(),
    }
}

pub fn print_run(run: &PipelineRun) {
    println!("{} {}", "::".cyan().bold(), run_line(run));
}

pub fn print_failure(failure: &PipelineFailure) {
    eprintln!("{} {}", "error:".red().bold(), failure.message);
    eprintln!("       {}", failure.cause.dimmed());
}

pub fn print_issues(issues: &[ValidationIssue]) {
    eprintln!(
        "{}",
        format!("The project has {} blocking issue(s):", issues.len())
            .red()
            .bold()
    );
    for issue in issues {
        eprintln!("  {} {}", "-".red(), issue);
    }
}

pub fn status_label(status: BuildStatus) -> ColoredString {
    match status {
        BuildStatus::Pending => "pending".yellow(),
        BuildStatus::Complete => "complete".green(),
        BuildStatus::Error => "error".red(),
        BuildStatus::Unknown => "unknown".dimmed(),
    }
}

/// Epoch milliseconds as a local `YYYY-MM-DD HH:MM:SS`, or `-` when unset.
pub fn timestamp(millis: i64) -> String {
    if millis == 0 {
        return "-".into();
    }
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "-".into())
}

pub fn print_build(build: &Build) {
    println!(
        "{} build {} is {} (updated {})",
        "::".cyan().bold(),
        build.id.bold(),
        status_label(build.status),
        timestamp(build.updated_at)
    );
}

pub fn print_artifact(label: &str, url: Option<&str>) {
    match url {
        Some(url) => println!("   {:<5} {}", label, url.underline()),
        None => println!("   {:<5} {}", label, "not available".dimmed()),
    }
}
