use std::ffi::CString;

use tw_controls::bladed::{self, StringLengths, record};
use tw_controls::{
    BladedController, BladedLayout, CallStatus, ControlCommands, ControllerBridge,
    ControllerPlugin, DtuController, DtuEntryPoints, SwapEntryPoint, TurbineInputs,
    dtu,
};

fn measured() -> TurbineInputs {
    TurbineInputs {
        time: 12.5,
        dt: 0.025,
        blade_count: 3,
        pitch: [0.0625, 0.125, 0.25],
        generator_speed: 120.5,
        rotor_speed: 1.25,
        generator_torque: 40_000.0,
        electrical_power: 4.5e6,
        hub_wind_speed: 11.5,
        azimuth: 3.0,
        yaw: 0.0,
        out_of_plane_moments: [1.0e6, 1.5e6, 2.0e6],
        grid_connected: true,
        wave_predictions: vec![],
        actuator_states: vec![vec![0.5], vec![0.25], vec![0.125]],
    }
}

/// Individual pitch controller with a brake: echoes what it measured into
/// its demands so the round trip can be checked exactly.
struct EchoController;

impl SwapEntryPoint for EchoController {
    fn call(&mut self, swap: &mut [f32], _infile: &CString, _outname: &CString, _message: &mut [u8]) -> i32 {
        let speed = bladed::read(swap, record::GENERATOR_SPEED);
        bladed::write(swap, record::INDIVIDUAL_PITCH, 1.0);
        bladed::write(swap, record::PITCH_DEMAND_1, bladed::read(swap, record::PITCH_1) * 2.0);
        bladed::write(swap, record::PITCH_DEMAND_2, bladed::read(swap, record::PITCH_2) * 2.0);
        bladed::write(swap, record::PITCH_DEMAND_3, bladed::read(swap, record::PITCH_3) * 2.0);
        bladed::write(swap, record::GENERATOR_TORQUE_DEMAND, speed * 256.0);
        bladed::write(swap, record::SHAFT_BRAKE, 1.0);
        let n = bladed::read(swap, record::ACTUATOR_COUNT) as usize;
        for k in 0..3 * n {
            let state = bladed::read(swap, record::ACTUATOR_STATE_START + k);
            bladed::write(swap, record::ACTUATOR_DEMAND_START + k, -state);
        }
        0
    }
}

#[test]
fn bladed_swap_round_trip_reproduces_commands() {
    let inputs = measured();
    let swap = bladed::build_swap(
        &inputs,
        CallStatus::Running,
        BladedLayout::Standard,
        StringLengths {
            message_capacity: 1024,
            infile: 0,
            outname: 0,
        },
    );
    assert_eq!(bladed::read(&swap, record::GENERATOR_SPEED), 120.5);
    assert_eq!(bladed::read(&swap, record::HUB_WIND_SPEED), 11.5);

    let mut controller =
        BladedController::new(EchoController, BladedLayout::Standard, "ctrl.in", "").expect("controller");
    let cmd = controller.advance(&inputs).expect("advance");
    assert_eq!(
        cmd,
        ControlCommands {
            pitch: [0.125, 0.25, 0.5],
            generator_torque: 120.5 * 256.0,
            yaw_rate: 0.0,
            brake: true,
            actuator_demands: inputs.actuator_states.clone(),
        }
    );
}

#[test]
fn extended_layout_round_trips_actuator_block() {
    let inputs = measured();
    let mut controller =
        BladedController::new(EchoController, BladedLayout::Extended, "ctrl.in", "").expect("controller");
    let cmd = controller.initialize(&inputs).expect("initialize");
    assert_eq!(cmd.actuator_demands, vec![vec![-0.5], vec![-0.25], vec![-0.125]]);
    assert_eq!(cmd.pitch, [0.125, 0.25, 0.5]);
}

struct DtuEcho;

impl DtuEntryPoints for DtuEcho {
    fn init(&mut self, _array1: &mut [f64], _array2: &mut [f64]) {}

    fn update(&mut self, array1: &mut [f64], array2: &mut [f64]) {
        array2[dtu::output::GENERATOR_TORQUE] = array1[dtu::input::GENERATOR_SPEED] * 256.0;
        for b in 0..3 {
            array2[dtu::output::PITCH_1 + b] = array1[dtu::input::PITCH_1 + b] * 2.0;
        }
        array2[dtu::output::BRAKE] = 1.0;
    }
}

#[test]
fn dtu_round_trip_reproduces_commands() {
    let inputs = measured();
    let mut controller = DtuController::new(DtuEcho, vec![0.0; dtu::DTU_ARRAY_LEN]);
    let cmd = controller.initialize(&inputs).expect("initialize");
    assert_eq!(cmd.pitch, [0.125, 0.25, 0.5]);
    assert_eq!(cmd.generator_torque, 120.5 * 256.0);
    assert!(cmd.brake);
}

#[test]
fn bridge_keeps_layout_shape_across_calls() {
    struct LengthCheck(Vec<usize>);
    impl SwapEntryPoint for LengthCheck {
        fn call(&mut self, swap: &mut [f32], _i: &CString, _o: &CString, _m: &mut [u8]) -> i32 {
            self.0.push(swap.len());
            bladed::write(swap, record::COLLECTIVE_PITCH_DEMAND, 0.5);
            0
        }
    }
    let controller =
        BladedController::new(LengthCheck(Vec::new()), BladedLayout::Standard, "p", "").expect("controller");
    let mut bridge = ControllerBridge::new(Box::new(controller));
    for _ in 0..5 {
        let cmd = bridge.advance(&measured());
        assert_eq!(cmd.pitch, [0.5; 3]);
    }
    assert!(bridge.is_enabled());
}
