//! Per-turbine controller coupling that never fails the run.

use tracing::warn;
use tw_core::timing::{Timer, phase_timing};

use crate::error::ControlError;
use crate::params::{ControllerConfig, load_plugin};
use crate::plugin::{ControllerKind, ControllerPlugin};
use crate::signals::{ControlCommands, TurbineInputs};

#[derive(Clone, Debug, PartialEq)]
pub enum BridgeState {
    /// Loaded, first call not made yet
    Ready,
    Active,
    /// Controller disabled for the rest of the run
    Disabled { reason: String },
    ShutDown,
}

/// Drives one turbine's controller.
///
/// Any load, initialisation or fail-flag error disables the controller for
/// the rest of the run; from then on the held commands are returned. The
/// failure is logged once.
pub struct ControllerBridge {
    plugin: Option<Box<dyn ControllerPlugin>>,
    state: BridgeState,
    last: Option<ControlCommands>,
}

impl ControllerBridge {
    pub fn new(plugin: Box<dyn ControllerPlugin>) -> Self {
        Self {
            plugin: Some(plugin),
            state: BridgeState::Ready,
            last: None,
        }
    }

    /// Load from configuration. A load failure yields a disabled bridge.
    pub fn load(config: &ControllerConfig) -> Self {
        match load_plugin(config) {
            Ok(plugin) => Self::new(plugin),
            Err(e) => Self::disabled_by(e),
        }
    }

    /// A turbine without a controller: commands are always held.
    pub fn none() -> Self {
        Self {
            plugin: None,
            state: BridgeState::Disabled {
                reason: "no controller configured".to_string(),
            },
            last: None,
        }
    }

    fn disabled_by(error: ControlError) -> Self {
        warn!(error = %error, "controller disabled for this run");
        Self {
            plugin: None,
            state: BridgeState::Disabled {
                reason: error.to_string(),
            },
            last: None,
        }
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.state, BridgeState::Ready | BridgeState::Active)
    }

    pub fn kind(&self) -> Option<ControllerKind> {
        self.plugin.as_ref().map(|p| p.kind())
    }

    pub fn disabled_reason(&self) -> Option<&str> {
        match &self.state {
            BridgeState::Disabled { reason } => Some(reason),
            _ => None,
        }
    }

    fn disable(&mut self, error: ControlError) {
        warn!(error = %error, "controller disabled for this run");
        self.plugin = None;
        self.state = BridgeState::Disabled {
            reason: error.to_string(),
        };
    }

    /// One controller exchange. Never fails.
    pub fn advance(&mut self, inputs: &TurbineInputs) -> ControlCommands {
        let held = ControlCommands::hold(inputs);
        let Some(plugin) = self.plugin.as_mut() else {
            return held;
        };
        let timer = Timer::start();
        let result = match self.state {
            BridgeState::Ready => plugin.initialize(inputs),
            BridgeState::Active => plugin.advance(inputs),
            _ => return held,
        };
        timer.stop_into(&phase_timing::CONTROLLER);
        match result {
            Ok(cmd) if cmd.pitch.iter().all(|p| p.is_finite()) && cmd.generator_torque.is_finite() => {
                self.state = BridgeState::Active;
                self.last = Some(cmd.clone());
                cmd
            }
            Ok(_) => {
                self.disable(ControlError::FailFlag {
                    code: -1,
                    message: "non-finite controller demand".to_string(),
                });
                held
            }
            Err(e) => {
                self.disable(e);
                held
            }
        }
    }

    /// Final call; the controller is unloaded afterwards.
    pub fn shutdown(&mut self, inputs: &TurbineInputs) {
        if let Some(mut plugin) = self.plugin.take() {
            if self.state == BridgeState::Active {
                if let Err(e) = plugin.shutdown(inputs) {
                    warn!(error = %e, "controller shutdown failed");
                }
            }
            self.state = BridgeState::ShutDown;
        }
    }

    /// Last commands the controller produced, if any.
    pub fn last_commands(&self) -> Option<&ControlCommands> {
        self.last.as_ref()
    }
}

impl std::fmt::Debug for ControllerBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerBridge")
            .field("kind", &self.kind())
            .field("state", &self.state)
            .finish()
    }
}
