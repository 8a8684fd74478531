use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::TemplateError;
use crate::helpers::schema::{self, CANONICAL_HEADERS};
use crate::models::Weekday;

/// A project row as listed by the TMS table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectData {
    pub project_number: String,
    #[serde(default, alias = "project_text")]
    pub project_name: String,
    #[serde(default, alias = "task")]
    pub project_task: String,
}

impl ProjectData {
    pub fn new(project_number: &str, project_name: &str, project_task: &str) -> Self {
        Self {
            project_number: project_number.trim().to_string(),
            project_name: project_name.trim().to_string(),
            project_task: project_task.trim().to_string(),
        }
    }
}

pub fn validate_project_data(projects: &[ProjectData]) -> Result<(), TemplateError> {
    if projects.is_empty() {
        return Err(TemplateError::NoProjects);
    }
    match projects
        .iter()
        .position(|p| p.project_number.trim().is_empty())
    {
        Some(index) => Err(TemplateError::EmptyProjectNumber { index }),
        None => Ok(()),
    }
}

fn ensure_writable(path: &Path, force: bool) -> Result<(), TemplateError> {
    if path.exists() && !force {
        return Err(TemplateError::Exists(path.to_path_buf()));
    }
    Ok(())
}

/// Write a zero-filled template CSV with one row per project.
///
/// Returns the absolute path of the written file.
pub fn write_template(
    path: impl AsRef<Path>,
    projects: &[ProjectData],
    force: bool,
) -> Result<PathBuf, TemplateError> {
    let path = path.as_ref();
    ensure_writable(path, force)?;
    validate_project_data(projects)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = WriterBuilder::new()
        .delimiter(schema::DELIMITER)
        .from_path(path)?;
    writer.write_record(CANONICAL_HEADERS)?;

    for project in projects {
        let mut record = vec![
            project.project_number.as_str(),
            project.project_name.as_str(),
            project.project_task.as_str(),
        ];
        record.extend(Weekday::ALL.iter().map(|_| "0"));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    info!(
        "Wrote template with {} project(s) to {}",
        projects.len(),
        path.display()
    );
    Ok(std::path::absolute(path)?)
}
