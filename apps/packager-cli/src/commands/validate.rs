use std::path::Path;

use anyhow::{Context, Result, bail};
use apkforge_project::{Project, validate_project};
use colored::*;

use crate::render;

pub fn run(project_dir: &Path) -> Result<()> {
    let project = Project::load(project_dir)
        .with_context(|| format!("failed to open project at {}", project_dir.display()))?;

    let issues = validate_project(&project);
    if !issues.is_empty() {
        render::print_issues(&issues);
        bail!("{} blocking issue(s) in {}", issues.len(), project.name());
    }

    println!(
        "{} {} is ready to package.",
        "ok".green().bold(),
        project.name().bold()
    );
    Ok(())
}
