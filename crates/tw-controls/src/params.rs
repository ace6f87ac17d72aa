//! Controller configuration and plugin loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bladed::BladedLayout;
use crate::dtu;
use crate::error::{ControlError, ControlResult};
use crate::library::{LibraryDtuEntry, LibrarySwapEntry};
use crate::plugin::{BladedController, ControllerKind, ControllerPlugin, DtuController};

/// Where a turbine's controller comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub kind: ControllerKind,
    /// Shared library with the controller entry points
    pub library: PathBuf,
    /// Parameter file handed to the controller
    pub parameter_file: PathBuf,
}

fn read_parameter_file(path: &Path) -> ControlResult<String> {
    std::fs::read_to_string(path).map_err(|e| ControlError::ParameterFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Open the library, resolve its entry points and check the parameter file.
///
/// Every failure here disables the controller for the whole run.
pub fn load_plugin(config: &ControllerConfig) -> ControlResult<Box<dyn ControllerPlugin>> {
    let text = read_parameter_file(&config.parameter_file)?;
    match config.kind {
        ControllerKind::Bladed | ControllerKind::BladedExtended => {
            let layout = if config.kind == ControllerKind::Bladed {
                BladedLayout::Standard
            } else {
                BladedLayout::Extended
            };
            let entry = LibrarySwapEntry::load(&config.library)?;
            let infile = config.parameter_file.to_string_lossy();
            let controller = BladedController::new(entry, layout, &infile, "")?;
            Ok(Box::new(controller))
        }
        ControllerKind::Dtu => {
            let init = dtu::parse_parameters(&text).map_err(|e| match e {
                ControlError::ParameterFile { message, .. } => ControlError::ParameterFile {
                    path: config.parameter_file.display().to_string(),
                    message,
                },
                other => other,
            })?;
            let entry = LibraryDtuEntry::load(&config.library)?;
            Ok(Box::new(DtuController::new(entry, init)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameter_file_is_reported_first() {
        let config = ControllerConfig {
            kind: ControllerKind::Bladed,
            library: PathBuf::from("/nonexistent/lib.so"),
            parameter_file: PathBuf::from("/nonexistent/params.in"),
        };
        let err = load_plugin(&config).err().unwrap();
        assert!(matches!(err, ControlError::ParameterFile { .. }));
    }

    #[test]
    fn malformed_dtu_parameters_name_the_file() {
        let dir = std::env::temp_dir().join(format!("tw-controls-params-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("bad.prm");
        std::fs::write(&file, "constant one 2.0 ;").unwrap();
        let config = ControllerConfig {
            kind: ControllerKind::Dtu,
            library: PathBuf::from("/nonexistent/lib.so"),
            parameter_file: file.clone(),
        };
        match load_plugin(&config).err().unwrap() {
            ControlError::ParameterFile { path, .. } => assert!(path.ends_with("bad.prm")),
            other => panic!("unexpected error {other}"),
        }
        std::fs::remove_dir_all(&dir).ok();
    }
}
