//! Schema migration framework.

use crate::ProjectError;
use crate::schema::{IntegrationDef, Project};

pub const LATEST_VERSION: u32 = 2;

pub fn migrate_to_latest(mut project: Project) -> Result<Project, ProjectError> {
    while project.version < LATEST_VERSION {
        project = migrate_one_version(project)?;
    }
    Ok(project)
}

fn migrate_one_version(project: Project) -> Result<Project, ProjectError> {
    match project.version {
        0 => migrate_v0_to_v1(project),
        1 => migrate_v1_to_v2(project),
        v => Err(ProjectError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

fn migrate_v0_to_v1(mut project: Project) -> Result<Project, ProjectError> {
    project.version = 1;
    Ok(project)
}

/// Version 1 stored the wake scheme as `predictor_corrector: bool`.
fn migrate_v1_to_v2(mut project: Project) -> Result<Project, ProjectError> {
    if let Some(pc) = project.wake.predictor_corrector.take() {
        project.wake.integration = if pc {
            IntegrationDef::PC
        } else {
            IntegrationDef::Euler
        };
    }
    project.version = 2;
    Ok(project)
}
