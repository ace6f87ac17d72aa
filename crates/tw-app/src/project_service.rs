//! Project loading, saving, validation, and introspection.

use std::path::Path;
use tw_project::ProjectFormat;
use tw_project::schema::{Project, StructureDef, TurbineDef};

use crate::error::{AppError, AppResult};
use crate::lock::ProjectLock;

/// Summary of a turbine for listing.
#[derive(Debug, Clone)]
pub struct TurbineSummary {
    pub id: String,
    pub name: String,
    pub blade_count: usize,
    pub tip_radius_m: f64,
    pub hub_height_m: f64,
    pub structure: &'static str,
    pub has_controller: bool,
}

/// Load, migrate and validate a project file (YAML, or JSON by extension).
pub fn load_project(path: &Path) -> AppResult<Project> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::ProjectFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(tw_project::parse(&content, ProjectFormat::from_path(path))?)
}

/// Save a project. Refused while a simulation holds the project.
pub fn save_project(path: &Path, project: &Project, lock: &ProjectLock) -> AppResult<()> {
    lock.ensure_writable()?;
    tw_project::save(path, project)?;
    Ok(())
}

pub fn validate_project(project: &Project) -> AppResult<()> {
    tw_project::validate_project(project).map_err(|e| AppError::Validation(e.to_string()))
}

pub fn list_turbines(project: &Project) -> Vec<TurbineSummary> {
    project
        .turbines
        .iter()
        .map(|t| TurbineSummary {
            id: t.id.clone(),
            name: t.name.clone(),
            blade_count: t.blades.count,
            tip_radius_m: t.blades.stations.last().map_or(0.0, |s| s.radius_m),
            hub_height_m: t.hub_height_m,
            structure: match t.structure {
                StructureDef::Prescribed => "prescribed",
                StructureDef::RigidDrivetrain { .. } => "rigid drivetrain",
            },
            has_controller: t.controller.is_some(),
        })
        .collect()
}

pub fn get_turbine<'a>(project: &'a Project, turbine_id: &str) -> AppResult<&'a TurbineDef> {
    project
        .turbines
        .iter()
        .find(|t| t.id == turbine_id)
        .ok_or_else(|| AppError::TurbineNotFound(turbine_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> Project {
        tw_project::from_yaml_str(include_str!("../../../demos/projects/single_turbine.yaml")).unwrap()
    }

    #[test]
    fn turbine_lookup_by_id() {
        let project = demo();
        let summaries = list_turbines(&project);
        assert_eq!(summaries.len(), project.turbines.len());
        let first = &summaries[0];
        assert_eq!(get_turbine(&project, &first.id).unwrap().name, first.name);
        assert!(matches!(
            get_turbine(&project, "no-such-turbine"),
            Err(AppError::TurbineNotFound(_))
        ));
    }

    #[test]
    fn save_refused_while_running() {
        let project = demo();
        let lock = ProjectLock::new();
        let _guard = lock.acquire().unwrap();
        let path = std::env::temp_dir().join("tw_app_save_refused.yaml");
        assert!(matches!(save_project(&path, &project, &lock), Err(AppError::Busy)));
        assert!(!path.exists());
    }
}
