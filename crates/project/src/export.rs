//! Directory export of a project's web build.
//!
//! For a Cordova build the sources land under `www/` next to a generated
//! `config.xml`; otherwise they are copied as-is into the output directory.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::ProjectError;
use crate::manifest::{Orientation, Project};
use crate::scanner::scan_files;

/// Options for [`export_project`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub export_for_cordova: bool,
}

/// Creates `output_dir` if needed and removes everything inside it.
pub fn prepare_output_dir(output_dir: &Path) -> Result<(), ProjectError> {
    fs::create_dir_all(output_dir)?;
    for entry in fs::read_dir(output_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Exports `project` into `output_dir` and returns the number of files written.
pub fn export_project(
    project: &Project,
    output_dir: &Path,
    options: &ExportOptions,
) -> Result<usize, ProjectError> {
    let source_dir = project.source_dir();
    if !source_dir.is_dir() {
        return Err(ProjectError::SourceMissing(source_dir));
    }

    prepare_output_dir(output_dir)?;

    let (files, total_size) = scan_files(&source_dir, Some(output_dir))?;
    let dest_root = if options.export_for_cordova {
        output_dir.join("www")
    } else {
        output_dir.to_path_buf()
    };

    for file in &files {
        let dest = dest_root.join(&file.relative_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source_dir.join(&file.relative_path), &dest)?;
    }

    let mut written = files.len();
    if options.export_for_cordova {
        fs::write(output_dir.join("config.xml"), cordova_config(project))?;
        written += 1;
    }

    debug!(files = written, bytes = total_size, "copied project sources");
    info!(
        project = %project.name(),
        output = %output_dir.display(),
        cordova = options.export_for_cordova,
        "project exported"
    );
    Ok(written)
}

/// Renders the Cordova `config.xml` for a project.
fn cordova_config(project: &Project) -> String {
    let m = project.manifest();
    let mut xml = String::new();
    xml.push_str("<?xml version='1.0' encoding='utf-8'?>\n");
    xml.push_str(&format!(
        "<widget id=\"{}\" version=\"{}\" xmlns=\"http://www.w3.org/ns/widgets\" xmlns:cdv=\"http://cordova.apache.org/ns/1.0\">\n",
        escape_xml(&m.package_name),
        escape_xml(&m.version)
    ));
    xml.push_str(&format!("    <name>{}</name>\n", escape_xml(&m.name)));
    if !m.author.is_empty() {
        xml.push_str(&format!("    <author>{}</author>\n", escape_xml(&m.author)));
    }
    xml.push_str("    <content src=\"index.html\" />\n");
    xml.push_str("    <access origin=\"*\" />\n");
    if m.orientation != Orientation::Default {
        xml.push_str(&format!(
            "    <preference name=\"Orientation\" value=\"{}\" />\n",
            m.orientation.as_str()
        ));
    }
    xml.push_str("    <preference name=\"Fullscreen\" value=\"true\" />\n");
    xml.push_str("</widget>\n");
    xml
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
