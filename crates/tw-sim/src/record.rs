//! Result channels stored per timestep.
//!
//! Channel names are `time`, then per turbine `T<n> <quantity>` and per blade
//! `T<n> B<b> span <quantity>`, then the ice throw channels when enabled.

use tw_core::to_array_f32;
use tw_core::units::{rad_s_to_rpm, rad_to_deg};
use tw_results::WakeFrame;
use tw_wake::WakeSystem;

use crate::aero::RotorSolution;
use crate::ice::IceThrow;
use crate::structural::{DrivetrainSignals, RotorKinematics};

const TURBINE_SCALARS: [&str; 12] = [
    "power",
    "aero torque",
    "thrust",
    "rotor speed rpm",
    "azimuth deg",
    "tsr",
    "cp",
    "ct",
    "hub wind speed",
    "generator torque",
    "generator speed",
    "electrical power",
];

const TURBINE_TAIL: [&str; 5] = ["pitch deg", "yaw deg", "wake lines", "wake particles", "gamma iterations"];

const SPAN: [&str; 3] = ["span gamma", "span alpha deg", "span cl"];

const ICE: [&str; 3] = ["ice airborne", "ice landed x", "ice landed y"];

pub fn channel_names(blade_counts: &[usize], ice: bool) -> Vec<String> {
    let mut names = vec!["time".to_string()];
    for (t, &blades) in blade_counts.iter().enumerate() {
        let prefix = format!("T{}", t + 1);
        for q in TURBINE_SCALARS.iter().chain(&TURBINE_TAIL) {
            names.push(format!("{prefix} {q}"));
        }
        for b in 0..blades {
            for q in SPAN {
                names.push(format!("{prefix} B{} {q}", b + 1));
            }
        }
    }
    if ice {
        names.extend(ICE.iter().map(|s| s.to_string()));
    }
    names
}

/// What one turbine contributes to a stored row.
pub struct TurbineRecord<'a> {
    pub solution: &'a RotorSolution,
    pub kinematics: RotorKinematics,
    pub drivetrain: DrivetrainSignals,
    pub blade_count: usize,
    pub wake_lines: usize,
    pub wake_particles: usize,
}

/// One row in the order of [`channel_names`].
pub fn build_row(time: f64, turbines: &[TurbineRecord<'_>], ice: Option<&IceThrow>) -> Vec<Vec<f32>> {
    let mut row = vec![vec![time as f32]];
    for t in turbines {
        let l = &t.solution.loads;
        let k = &t.kinematics;
        let d = &t.drivetrain;
        let azimuth = rad_to_deg(k.azimuth).rem_euclid(360.0);
        for v in [
            l.power,
            l.aero_torque,
            l.thrust,
            rad_s_to_rpm(k.rotor_speed),
            azimuth,
            l.tsr,
            l.cp,
            l.ct,
            l.hub_wind_speed,
            d.generator_torque,
            d.generator_speed,
            d.electrical_power,
        ] {
            row.push(vec![v as f32]);
        }
        row.push(k.pitch[..t.blade_count].iter().map(|p| rad_to_deg(*p) as f32).collect());
        row.push(vec![rad_to_deg(k.yaw) as f32]);
        row.push(vec![t.wake_lines as f32]);
        row.push(vec![t.wake_particles as f32]);
        row.push(vec![t.solution.iterations as f32]);
        for b in 0..t.blade_count {
            let panels = t.solution.blades.get(b).map(Vec::as_slice).unwrap_or(&[]);
            row.push(panels.iter().map(|p| p.gamma as f32).collect());
            row.push(panels.iter().map(|p| rad_to_deg(p.alpha) as f32).collect());
            row.push(panels.iter().map(|p| p.cl as f32).collect());
        }
    }
    if let Some(ice) = ice {
        row.push(vec![ice.airborne().len() as f32]);
        row.push(ice.landings().iter().map(|l| l.position.x as f32).collect());
        row.push(ice.landings().iter().map(|l| l.position.y as f32).collect());
    }
    row
}

/// Current wake geometry of all turbines.
pub fn wake_frame(system: &WakeSystem) -> WakeFrame {
    let mut frame = WakeFrame::default();
    for wake in system.turbines() {
        for line in wake.lines() {
            if let Some((a, b)) = wake.line_endpoints(line) {
                let (a, b) = (to_array_f32(&a), to_array_f32(&b));
                frame.segments.push([a[0], a[1], a[2], b[0], b[1], b[2]]);
            }
        }
        frame
            .particles
            .extend(wake.particles().iter().map(|p| to_array_f32(&p.position)));
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aero::PanelSolution;
    use tw_core::vec3;

    #[test]
    fn row_matches_channel_layout() {
        let names = channel_names(&[2], true);
        let solution = RotorSolution {
            blades: vec![vec![PanelSolution::default(); 4]; 2],
            iterations: 7,
            ..Default::default()
        };
        let record = TurbineRecord {
            solution: &solution,
            kinematics: RotorKinematics {
                azimuth: -0.5 * std::f64::consts::PI,
                rotor_speed: std::f64::consts::PI,
                pitch: [0.0; 3],
                yaw: 0.0,
                hub: vec3(0.0, 0.0, 0.0),
            },
            drivetrain: DrivetrainSignals::default(),
            blade_count: 2,
            wake_lines: 10,
            wake_particles: 3,
        };
        let row = build_row(0.5, &[record], None);
        // ice channels only when an ice throw is passed
        assert_eq!(row.len() + ICE.len(), names.len());
        let at = |name: &str| names.iter().position(|n| n == name).unwrap();
        assert_eq!(row[at("T1 rotor speed rpm")], vec![30.0]);
        assert_eq!(row[at("T1 azimuth deg")], vec![270.0]);
        assert_eq!(row[at("T1 pitch deg")].len(), 2);
        assert_eq!(row[at("T1 gamma iterations")], vec![7.0]);
        assert_eq!(row[at("T1 B2 span cl")].len(), 4);
    }

    #[test]
    fn names_are_unique() {
        let names = channel_names(&[3, 3], true);
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
    }
}
