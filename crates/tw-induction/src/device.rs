//! Compute device enumeration and selection.
//!
//! Device 0 is always the CPU thread-pool path. Accelerator devices follow in
//! enumeration order starting at 1.

use std::fmt;

use crate::error::{InductionError, InductionResult};

/// Work-group size used when none is requested.
pub const DEFAULT_WORK_GROUP_SIZE: usize = 32;

/// Description of one enumerated compute device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub compute_units: usize,
    pub max_work_group_size: usize,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({} compute units, max work group {})",
            self.index, self.name, self.compute_units, self.max_work_group_size
        )
    }
}

/// Which induction backend a run uses. Built once from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeviceSelection {
    #[default]
    Cpu,
    Accelerator {
        index: usize,
        work_group_size: usize,
    },
}

impl DeviceSelection {
    /// Map the headless `-dN` / `-gNN` flags onto a selection.
    ///
    /// `device == 0` (or absent) selects the CPU path; any other value is an
    /// accelerator index in enumeration order.
    pub fn from_flags(device: Option<usize>, work_group: Option<usize>) -> InductionResult<Self> {
        let work_group_size = work_group.unwrap_or(DEFAULT_WORK_GROUP_SIZE);
        if work_group_size == 0 {
            return Err(InductionError::InvalidArg {
                what: "work group size must be positive",
            });
        }
        Ok(match device.unwrap_or(0) {
            0 => DeviceSelection::Cpu,
            index => DeviceSelection::Accelerator {
                index,
                work_group_size,
            },
        })
    }

    pub fn device_index(&self) -> usize {
        match self {
            DeviceSelection::Cpu => 0,
            DeviceSelection::Accelerator { index, .. } => *index,
        }
    }
}

impl fmt::Display for DeviceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelection::Cpu => write!(f, "cpu"),
            DeviceSelection::Accelerator {
                index,
                work_group_size,
            } => write!(f, "accelerator {index} (work group {work_group_size})"),
        }
    }
}

/// All devices visible to this process, CPU first.
pub fn enumerate_devices() -> Vec<DeviceInfo> {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    vec![
        DeviceInfo {
            index: 0,
            name: "CPU thread pool".to_string(),
            compute_units: cpus,
            max_work_group_size: 1,
        },
        DeviceInfo {
            index: 1,
            name: "host kernel emulation".to_string(),
            compute_units: cpus,
            max_work_group_size: 1024,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_selection() {
        assert_eq!(DeviceSelection::from_flags(None, None).unwrap(), DeviceSelection::Cpu);
        assert_eq!(DeviceSelection::from_flags(Some(0), Some(64)).unwrap(), DeviceSelection::Cpu);
        assert_eq!(
            DeviceSelection::from_flags(Some(1), None).unwrap(),
            DeviceSelection::Accelerator {
                index: 1,
                work_group_size: DEFAULT_WORK_GROUP_SIZE
            }
        );
        assert!(DeviceSelection::from_flags(Some(1), Some(0)).is_err());
    }

    #[test]
    fn cpu_is_always_device_zero() {
        let devices = enumerate_devices();
        assert_eq!(devices[0].index, 0);
        assert!(devices.iter().any(|d| d.index == 1));
    }
}
