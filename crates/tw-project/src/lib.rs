//! tw-project: turbine project files.
//!
//! A project is read from YAML (the usual case) or JSON, brought up to the
//! current schema version and validated before anything else sees it.
//! Saving validates first so an invalid project never reaches disk.

pub mod migrate;
pub mod schema;
pub mod validate;

use std::path::Path;

pub use migrate::{LATEST_VERSION, migrate_to_latest};
pub use schema::*;
pub use validate::{ValidationError, validate_project};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Migration error: {what}")]
    Migration { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk encoding of a project file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFormat {
    Yaml,
    Json,
}

impl ProjectFormat {
    /// `.json` selects JSON, anything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ProjectFormat::Json,
            _ => ProjectFormat::Yaml,
        }
    }
}

/// Decode, migrate and validate project text.
pub fn parse(content: &str, format: ProjectFormat) -> ProjectResult<Project> {
    let raw: Project = match format {
        ProjectFormat::Yaml => serde_yaml::from_str(content)?,
        ProjectFormat::Json => serde_json::from_str(content)?,
    };
    let project = migrate_to_latest(raw)?;
    validate_project(&project)?;
    Ok(project)
}

pub fn render(project: &Project, format: ProjectFormat) -> ProjectResult<String> {
    validate_project(project)?;
    Ok(match format {
        ProjectFormat::Yaml => serde_yaml::to_string(project)?,
        ProjectFormat::Json => serde_json::to_string_pretty(project)?,
    })
}

/// Load a project, picking the format from the file extension.
pub fn load(path: &Path) -> ProjectResult<Project> {
    let content = std::fs::read_to_string(path)?;
    parse(&content, ProjectFormat::from_path(path))
}

pub fn save(path: &Path, project: &Project) -> ProjectResult<()> {
    let content = render(project, ProjectFormat::from_path(path))?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn from_yaml_str(content: &str) -> ProjectResult<Project> {
    parse(content, ProjectFormat::Yaml)
}

pub fn load_yaml(path: &Path) -> ProjectResult<Project> {
    parse(&std::fs::read_to_string(path)?, ProjectFormat::Yaml)
}

pub fn save_yaml(path: &Path, project: &Project) -> ProjectResult<()> {
    std::fs::write(path, render(project, ProjectFormat::Yaml)?)?;
    Ok(())
}

pub fn load_json(path: &Path) -> ProjectResult<Project> {
    parse(&std::fs::read_to_string(path)?, ProjectFormat::Json)
}

pub fn save_json(path: &Path, project: &Project) -> ProjectResult<()> {
    std::fs::write(path, render(project, ProjectFormat::Json)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(ProjectFormat::from_path(Path::new("a/b.json")), ProjectFormat::Json);
        assert_eq!(ProjectFormat::from_path(Path::new("a/b.JSON")), ProjectFormat::Json);
        assert_eq!(ProjectFormat::from_path(Path::new("a/b.yaml")), ProjectFormat::Yaml);
        assert_eq!(ProjectFormat::from_path(Path::new("project")), ProjectFormat::Yaml);
    }
}
