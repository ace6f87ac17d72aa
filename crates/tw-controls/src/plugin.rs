//! Controller plugin trait and one adapter per ABI family.

use std::ffi::CString;

use tracing::warn;

use crate::bladed::{self, BladedLayout, CallStatus, StringLengths};
use crate::dtu;
use crate::error::{ControlError, ControlResult};
use crate::signals::{ControlCommands, TurbineInputs};

/// Capacity of the message buffer handed to Bladed-style controllers.
pub const MESSAGE_CAPACITY: usize = 1024;

/// Controller ABI family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ControllerKind {
    Bladed,
    Dtu,
    /// Bladed layout plus the smart-actuator block
    BladedExtended,
}

/// A control law the simulation can drive.
pub trait ControllerPlugin: Send {
    fn kind(&self) -> ControllerKind;

    /// First call of the run.
    fn initialize(&mut self, inputs: &TurbineInputs) -> ControlResult<ControlCommands>;

    /// One control step.
    fn advance(&mut self, inputs: &TurbineInputs) -> ControlResult<ControlCommands>;

    /// Final call of the run.
    fn shutdown(&mut self, inputs: &TurbineInputs) -> ControlResult<()>;
}

/// Raw Bladed-style entry point:
/// `(float* swap, int* fail, char* infile, char* outname, char* message)`.
pub trait SwapEntryPoint: Send {
    /// Call the controller. Returns the fail flag.
    fn call(&mut self, swap: &mut [f32], infile: &CString, outname: &CString, message: &mut [u8]) -> i32;
}

/// Raw DTU-style entry points.
pub trait DtuEntryPoints: Send {
    fn init(&mut self, array1: &mut [f64], array2: &mut [f64]);
    fn update(&mut self, array1: &mut [f64], array2: &mut [f64]);
}

fn message_text(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).trim().to_string()
}

/// Adapter for the Bladed and extended Bladed ABIs.
pub struct BladedController<E> {
    entry: E,
    layout: BladedLayout,
    infile: CString,
    outname: CString,
    held: ControlCommands,
}

impl<E: SwapEntryPoint> BladedController<E> {
    pub fn new(entry: E, layout: BladedLayout, parameter_file: &str, outname: &str) -> ControlResult<Self> {
        let to_c = |s: &str| {
            CString::new(s).map_err(|_| ControlError::InvalidArg {
                what: "controller path contains a NUL byte",
            })
        };
        Ok(Self {
            entry,
            layout,
            infile: to_c(parameter_file)?,
            outname: to_c(outname)?,
            held: ControlCommands::default(),
        })
    }

    fn exchange(&mut self, inputs: &TurbineInputs, status: CallStatus) -> ControlResult<ControlCommands> {
        let strings = StringLengths {
            message_capacity: MESSAGE_CAPACITY,
            infile: self.infile.as_bytes().len(),
            outname: self.outname.as_bytes().len(),
        };
        let mut swap = bladed::build_swap(inputs, status, self.layout, strings);
        let mut message = vec![0_u8; MESSAGE_CAPACITY];
        let fail = self.entry.call(&mut swap, &self.infile, &self.outname, &mut message);
        let text = message_text(&message);
        if fail < 0 {
            return Err(ControlError::FailFlag {
                code: fail,
                message: text,
            });
        }
        if fail > 0 {
            warn!(code = fail, message = %text, "controller warning");
        }
        let held = ControlCommands::hold(inputs);
        self.held = bladed::parse_swap(&swap, self.layout, &held);
        Ok(self.held.clone())
    }
}

impl<E: SwapEntryPoint> ControllerPlugin for BladedController<E> {
    fn kind(&self) -> ControllerKind {
        match self.layout {
            BladedLayout::Standard => ControllerKind::Bladed,
            BladedLayout::Extended => ControllerKind::BladedExtended,
        }
    }

    fn initialize(&mut self, inputs: &TurbineInputs) -> ControlResult<ControlCommands> {
        self.exchange(inputs, CallStatus::First)
    }

    fn advance(&mut self, inputs: &TurbineInputs) -> ControlResult<ControlCommands> {
        self.exchange(inputs, CallStatus::Running)
    }

    fn shutdown(&mut self, inputs: &TurbineInputs) -> ControlResult<()> {
        self.exchange(inputs, CallStatus::Last).map(|_| ())
    }
}

/// Adapter for the DTU ABI.
pub struct DtuController<E> {
    entry: E,
    init: Vec<f64>,
}

impl<E: DtuEntryPoints> DtuController<E> {
    /// `init` is the parsed parameter array handed to the init entry point.
    pub fn new(entry: E, init: Vec<f64>) -> Self {
        Self { entry, init }
    }
}

impl<E: DtuEntryPoints> ControllerPlugin for DtuController<E> {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Dtu
    }

    fn initialize(&mut self, inputs: &TurbineInputs) -> ControlResult<ControlCommands> {
        let mut array1 = self.init.clone();
        array1.resize(dtu::DTU_ARRAY_LEN, 0.0);
        let mut array2 = vec![0.0; dtu::DTU_ARRAY_LEN];
        self.entry.init(&mut array1, &mut array2);
        self.advance(inputs)
    }

    fn advance(&mut self, inputs: &TurbineInputs) -> ControlResult<ControlCommands> {
        let mut array1 = dtu::build_array1(inputs);
        let mut array2 = vec![0.0; dtu::DTU_ARRAY_LEN];
        self.entry.update(&mut array1, &mut array2);
        if !array2.iter().all(|v| v.is_finite()) {
            return Err(ControlError::FailFlag {
                code: -1,
                message: "non-finite controller output".to_string(),
            });
        }
        Ok(dtu::parse_array2(&array2, &ControlCommands::hold(inputs)))
    }

    fn shutdown(&mut self, _inputs: &TurbineInputs) -> ControlResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bladed::record;

    /// Torque-only controller that fails when asked to.
    struct Scripted {
        fail: i32,
        calls: Vec<f32>,
    }

    impl SwapEntryPoint for Scripted {
        fn call(&mut self, swap: &mut [f32], _infile: &CString, _outname: &CString, message: &mut [u8]) -> i32 {
            self.calls.push(swap[0]);
            bladed::write(swap, record::GENERATOR_TORQUE_DEMAND, 321.0);
            bladed::write(swap, record::COLLECTIVE_PITCH_DEMAND, 0.25);
            message[..4].copy_from_slice(b"oops");
            self.fail
        }
    }

    #[test]
    fn status_codes_follow_call_sequence() {
        let mut c = BladedController::new(
            Scripted { fail: 0, calls: vec![] },
            BladedLayout::Standard,
            "params.in",
            "",
        )
        .unwrap();
        let inputs = TurbineInputs::default();
        c.initialize(&inputs).unwrap();
        let cmd = c.advance(&inputs).unwrap();
        c.shutdown(&inputs).unwrap();
        assert_eq!(c.entry.calls, vec![0.0, 1.0, -1.0]);
        assert_eq!(cmd.generator_torque, 321.0);
        assert_eq!(cmd.pitch, [0.25; 3]);
    }

    #[test]
    fn negative_fail_flag_is_an_error_positive_is_not() {
        let inputs = TurbineInputs::default();
        let mut bad = BladedController::new(
            Scripted { fail: -1, calls: vec![] },
            BladedLayout::Standard,
            "p",
            "",
        )
        .unwrap();
        let err = bad.advance(&inputs).unwrap_err();
        assert_eq!(
            err,
            ControlError::FailFlag {
                code: -1,
                message: "oops".to_string()
            }
        );

        let mut soft = BladedController::new(
            Scripted { fail: 1, calls: vec![] },
            BladedLayout::Standard,
            "p",
            "",
        )
        .unwrap();
        assert!(soft.advance(&inputs).is_ok());
    }

    struct EchoDtu;

    impl DtuEntryPoints for EchoDtu {
        fn init(&mut self, array1: &mut [f64], _array2: &mut [f64]) {
            assert_eq!(array1[0], 7.0);
        }
        fn update(&mut self, array1: &mut [f64], array2: &mut [f64]) {
            array2[0] = array1[dtu::input::GENERATOR_SPEED] * 10.0;
        }
    }

    #[test]
    fn dtu_adapter_passes_init_array() {
        let mut init = vec![0.0; 3];
        init[0] = 7.0;
        let mut c = DtuController::new(EchoDtu, init);
        let inputs = TurbineInputs {
            generator_speed: 12.0,
            ..Default::default()
        };
        let cmd = c.initialize(&inputs).unwrap();
        assert_eq!(cmd.generator_torque, 120.0);
        assert_eq!(c.kind(), ControllerKind::Dtu);
    }
}
