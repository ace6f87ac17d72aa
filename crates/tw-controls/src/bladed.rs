//! Bladed-style swap array layout.
//!
//! Record numbers below are the ABI's native 1-based numbers. The buffer is
//! staged the way the legacy interface expects: the first three records at
//! their 0-based slots and every later record one slot too far, followed by a
//! left shift of everything from slot 3 on. The extended layout carries an
//! extra smart-actuator block from record 200 and is staged the same way.

use crate::signals::{ControlCommands, MAX_BLADES, TurbineInputs};

/// Length of the swap array handed to the controller.
pub const SWAP_LEN: usize = 1000;

/// 1-based record numbers.
pub mod record {
    pub const STATUS: usize = 1;
    pub const TIME: usize = 2;
    pub const DT: usize = 3;
    pub const PITCH_1: usize = 4;
    pub const PITCH_CONTROL_TYPE: usize = 10;
    pub const ELECTRICAL_POWER: usize = 15;
    pub const GENERATOR_SPEED: usize = 20;
    pub const ROTOR_SPEED: usize = 21;
    pub const GENERATOR_TORQUE: usize = 23;
    pub const HUB_WIND_SPEED: usize = 27;
    pub const INDIVIDUAL_PITCH: usize = 28;
    pub const OOP_MOMENT_1: usize = 30;
    pub const OOP_MOMENT_2: usize = 31;
    pub const OOP_MOMENT_3: usize = 32;
    pub const PITCH_2: usize = 33;
    pub const PITCH_3: usize = 34;
    pub const GENERATOR_CONTACTOR: usize = 35;
    pub const SHAFT_BRAKE: usize = 36;
    pub const YAW_ANGLE: usize = 37;
    pub const YAW_TORQUE_DEMAND: usize = 41;
    pub const PITCH_DEMAND_1: usize = 42;
    pub const PITCH_DEMAND_2: usize = 43;
    pub const PITCH_DEMAND_3: usize = 44;
    pub const COLLECTIVE_PITCH_DEMAND: usize = 45;
    pub const PITCH_RATE_DEMAND: usize = 46;
    pub const GENERATOR_TORQUE_DEMAND: usize = 47;
    pub const YAW_RATE_DEMAND: usize = 48;
    pub const MESSAGE_CAPACITY: usize = 49;
    pub const INFILE_LENGTH: usize = 50;
    pub const OUTNAME_LENGTH: usize = 51;
    pub const PITCH_OVERRIDE: usize = 55;
    pub const TORQUE_OVERRIDE: usize = 56;
    pub const AZIMUTH: usize = 60;
    pub const BLADE_COUNT: usize = 61;
    /// Extended layout: smart actuators per blade
    pub const ACTUATOR_COUNT: usize = 200;
    /// Extended layout: actuator states, blade-major
    pub const ACTUATOR_STATE_START: usize = 201;
    /// Extended layout: actuator demands, blade-major
    pub const ACTUATOR_DEMAND_START: usize = 301;
    pub const WAVE_PREDICTION_START: usize = 500;
}

/// Maximum smart actuators per blade the extended block can carry.
pub const MAX_ACTUATORS_PER_BLADE: usize =
    (record::ACTUATOR_DEMAND_START - record::ACTUATOR_STATE_START) / MAX_BLADES;

/// Which Bladed-style layout a controller speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BladedLayout {
    Standard,
    /// Standard records plus the smart-actuator block from record 200
    Extended,
}

/// Call status written into record 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallStatus {
    First,
    Running,
    Last,
}

impl CallStatus {
    pub fn code(self) -> f32 {
        match self {
            CallStatus::First => 0.0,
            CallStatus::Running => 1.0,
            CallStatus::Last => -1.0,
        }
    }
}

/// String lengths the controller may rely on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StringLengths {
    pub message_capacity: usize,
    pub infile: usize,
    pub outname: usize,
}

/// Staging buffer with the legacy one-slot offset for records past 3.
struct Staging {
    raw: Vec<f32>,
}

impl Staging {
    fn new() -> Self {
        Self {
            raw: vec![0.0; SWAP_LEN + 1],
        }
    }

    fn put(&mut self, rec: usize, value: f64) {
        let slot = if rec <= 3 { rec - 1 } else { rec };
        if let Some(s) = self.raw.get_mut(slot) {
            *s = value as f32;
        }
    }

    /// Apply `a[i] = a[i + 1]` for `i >= 3` and drop the spare slot.
    fn finish(mut self) -> Vec<f32> {
        for i in 3..SWAP_LEN {
            self.raw[i] = self.raw[i + 1];
        }
        self.raw.truncate(SWAP_LEN);
        self.raw
    }
}

/// Build a fresh swap array for one controller call.
pub fn build_swap(
    inputs: &TurbineInputs,
    status: CallStatus,
    layout: BladedLayout,
    strings: StringLengths,
) -> Vec<f32> {
    use record::*;

    let mut s = Staging::new();
    s.put(STATUS, status.code() as f64);
    s.put(TIME, inputs.time);
    s.put(DT, inputs.dt);
    s.put(PITCH_1, inputs.pitch[0]);
    s.put(PITCH_2, inputs.pitch[1]);
    s.put(PITCH_3, inputs.pitch[2]);
    s.put(ELECTRICAL_POWER, inputs.electrical_power);
    s.put(GENERATOR_SPEED, inputs.generator_speed);
    s.put(ROTOR_SPEED, inputs.rotor_speed);
    s.put(GENERATOR_TORQUE, inputs.generator_torque);
    s.put(HUB_WIND_SPEED, inputs.hub_wind_speed);
    s.put(OOP_MOMENT_1, inputs.out_of_plane_moments[0]);
    s.put(OOP_MOMENT_2, inputs.out_of_plane_moments[1]);
    s.put(OOP_MOMENT_3, inputs.out_of_plane_moments[2]);
    s.put(YAW_ANGLE, inputs.yaw);
    s.put(GENERATOR_CONTACTOR, if inputs.grid_connected { 1.0 } else { 0.0 });
    s.put(MESSAGE_CAPACITY, strings.message_capacity as f64);
    s.put(INFILE_LENGTH, strings.infile as f64);
    s.put(OUTNAME_LENGTH, strings.outname as f64);
    s.put(AZIMUTH, inputs.azimuth);
    s.put(BLADE_COUNT, inputs.blade_count as f64);

    if layout == BladedLayout::Extended {
        let per_blade = inputs
            .actuator_states
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .min(MAX_ACTUATORS_PER_BLADE);
        s.put(ACTUATOR_COUNT, per_blade as f64);
        for (b, states) in inputs.actuator_states.iter().take(MAX_BLADES).enumerate() {
            for (k, v) in states.iter().take(per_blade).enumerate() {
                s.put(ACTUATOR_STATE_START + b * per_blade + k, *v);
            }
        }
    }

    for (k, v) in inputs.wave_predictions.iter().enumerate() {
        let rec = WAVE_PREDICTION_START + k;
        if rec > SWAP_LEN {
            break;
        }
        s.put(rec, *v);
    }
    s.finish()
}

/// Value of a 1-based record in a finished swap array.
pub fn read(swap: &[f32], rec: usize) -> f64 {
    swap.get(rec.wrapping_sub(1)).copied().unwrap_or(0.0) as f64
}

/// Write a 1-based record into a finished swap array, as a controller does.
pub fn write(swap: &mut [f32], rec: usize, value: f64) {
    if let Some(s) = swap.get_mut(rec.wrapping_sub(1)) {
        *s = value as f32;
    }
}

/// Interpret the controller's demands. Overridden or absent demands fall
/// back to `held`.
pub fn parse_swap(swap: &[f32], layout: BladedLayout, held: &ControlCommands) -> ControlCommands {
    use record::*;

    let mut out = held.clone();
    if read(swap, TORQUE_OVERRIDE) == 0.0 {
        out.generator_torque = read(swap, GENERATOR_TORQUE_DEMAND);
    }
    if read(swap, PITCH_OVERRIDE) == 0.0 {
        if read(swap, INDIVIDUAL_PITCH) == 1.0 {
            out.pitch = [
                read(swap, PITCH_DEMAND_1),
                read(swap, PITCH_DEMAND_2),
                read(swap, PITCH_DEMAND_3),
            ];
        } else {
            out.pitch = [read(swap, COLLECTIVE_PITCH_DEMAND); MAX_BLADES];
        }
    }
    out.yaw_rate = read(swap, YAW_RATE_DEMAND);
    out.brake = read(swap, SHAFT_BRAKE) != 0.0;

    if layout == BladedLayout::Extended {
        let per_blade = (read(swap, ACTUATOR_COUNT).max(0.0) as usize).min(MAX_ACTUATORS_PER_BLADE);
        if per_blade > 0 {
            out.actuator_demands = (0..MAX_BLADES)
                .map(|b| {
                    (0..per_blade)
                        .map(|k| read(swap, ACTUATOR_DEMAND_START + b * per_blade + k))
                        .collect()
                })
                .collect();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings() -> StringLengths {
        StringLengths {
            message_capacity: 256,
            infile: 12,
            outname: 4,
        }
    }

    #[test]
    fn records_land_at_zero_based_slots_after_shift() {
        let inputs = TurbineInputs {
            time: 2.5,
            dt: 0.05,
            blade_count: 3,
            pitch: [0.5, 0.25, 0.125],
            generator_speed: 100.0,
            ..Default::default()
        };
        let swap = build_swap(&inputs, CallStatus::Running, BladedLayout::Standard, strings());
        assert_eq!(swap.len(), SWAP_LEN);
        assert_eq!(swap[0], 1.0);
        assert_eq!(swap[1], 2.5);
        assert_eq!(swap[2], 0.05);
        assert_eq!(swap[3], 0.5);
        assert_eq!(swap[19], 100.0);
        assert_eq!(swap[32], 0.25);
        assert_eq!(swap[33], 0.125);
        assert_eq!(swap[60], 3.0);
        assert_eq!(read(&swap, record::INFILE_LENGTH), 12.0);
    }

    #[test]
    fn extended_block_is_written_only_for_extended_layout() {
        let inputs = TurbineInputs {
            blade_count: 3,
            actuator_states: vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
            ..Default::default()
        };
        let std = build_swap(&inputs, CallStatus::Running, BladedLayout::Standard, strings());
        assert_eq!(read(&std, record::ACTUATOR_COUNT), 0.0);

        let ext = build_swap(&inputs, CallStatus::Running, BladedLayout::Extended, strings());
        assert_eq!(read(&ext, record::ACTUATOR_COUNT), 2.0);
        assert_eq!(read(&ext, record::ACTUATOR_STATE_START + 3), 4.0);
        assert_eq!(read(&ext, record::ACTUATOR_STATE_START + 5), 6.0);
    }

    #[test]
    fn wave_predictions_fill_from_record_500() {
        let inputs = TurbineInputs {
            wave_predictions: vec![0.5, -0.5, 1.5],
            ..Default::default()
        };
        let swap = build_swap(&inputs, CallStatus::First, BladedLayout::Standard, strings());
        assert_eq!(swap[499], 0.5);
        assert_eq!(swap[501], 1.5);
        assert_eq!(swap[0], 0.0);
    }

    #[test]
    fn collective_demand_applies_to_all_blades() {
        let mut swap = vec![0.0_f32; SWAP_LEN];
        write(&mut swap, record::COLLECTIVE_PITCH_DEMAND, 0.0625);
        write(&mut swap, record::GENERATOR_TORQUE_DEMAND, 4096.0);
        let cmd = parse_swap(&swap, BladedLayout::Standard, &ControlCommands::default());
        assert_eq!(cmd.pitch, [0.0625; 3]);
        assert_eq!(cmd.generator_torque, 4096.0);
        assert!(!cmd.brake);
    }

    #[test]
    fn overrides_keep_held_values() {
        let held = ControlCommands {
            pitch: [0.1, 0.1, 0.1],
            generator_torque: 10.0,
            ..Default::default()
        };
        let mut swap = vec![0.0_f32; SWAP_LEN];
        write(&mut swap, record::PITCH_OVERRIDE, 1.0);
        write(&mut swap, record::TORQUE_OVERRIDE, 1.0);
        write(&mut swap, record::GENERATOR_TORQUE_DEMAND, 999.0);
        let cmd = parse_swap(&swap, BladedLayout::Standard, &held);
        assert_eq!(cmd.pitch, held.pitch);
        assert_eq!(cmd.generator_torque, 10.0);
    }
}
