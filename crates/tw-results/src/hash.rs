//! Content-based hashing for run IDs.

use sha2::{Digest, Sha256};
use tw_project::schema::Project;

/// Run id over the project configuration, the induction device and the
/// solver version.
pub fn compute_run_id(project: &Project, device: &str, solver_version: &str) -> String {
    let mut hasher = Sha256::new();

    let project_json = serde_json::to_string(project).unwrap_or_default();
    hasher.update(project_json.as_bytes());
    hasher.update(device.as_bytes());
    hasher.update(solver_version.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}
