//! Ice throw: fragments shed from the blades and tracked to the ground.
//!
//! Fragments are spheres released with the local blade velocity. They fly
//! under gravity and quadratic drag in the undisturbed inflow; the ground is
//! the plane `z = 0`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tw_core::units::constants::G0_MPS2;
use tw_core::{Vec3, vec3};
use tw_project::schema::IceThrowDef;

use crate::inflow::Inflow;
use crate::rotor::RotorGeometry;

#[derive(Clone, Debug, PartialEq)]
pub struct IceFragment {
    pub turbine: usize,
    pub mass: f64,
    /// Frontal area (m^2)
    pub area: f64,
    pub position: Vec3,
    pub velocity: Vec3,
    pub released_at: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landing {
    pub turbine: usize,
    pub position: Vec3,
    pub time: f64,
    pub mass: f64,
}

#[derive(Debug, Clone)]
pub struct IceThrow {
    config: IceThrowDef,
    density: f64,
    rng: StdRng,
    airborne: Vec<IceFragment>,
    landings: Vec<Landing>,
}

impl IceThrow {
    pub fn new(config: IceThrowDef, air_density: f64) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            density: air_density,
            rng,
            airborne: Vec::new(),
            landings: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone(), self.density);
    }

    pub fn airborne(&self) -> &[IceFragment] {
        &self.airborne
    }

    pub fn landings(&self) -> &[Landing] {
        &self.landings
    }

    /// Release new fragments (once `start_time_s` is reached) and move every
    /// airborne fragment by `dt`.
    pub fn advance(&mut self, time: f64, dt: f64, rotors: &[RotorGeometry], inflow: &Inflow) {
        if time >= self.config.start_time_s {
            for _ in 0..self.config.fragments_per_step {
                if let Some(f) = self.release(time, rotors) {
                    self.airborne.push(f);
                }
            }
        }

        let rho = self.density;
        let cd = self.config.drag_coefficient;
        let mut still_airborne = Vec::with_capacity(self.airborne.len());
        for mut f in self.airborne.drain(..) {
            let start = f.position;
            let relative = inflow.velocity_at(&f.position, time) - f.velocity;
            let drag = relative * (0.5 * rho * cd * f.area * relative.norm() / f.mass);
            f.velocity += (drag + vec3(0.0, 0.0, -G0_MPS2)) * dt;
            f.position += f.velocity * dt;
            if f.position.z <= 0.0 {
                let s = if start.z > f.position.z { start.z / (start.z - f.position.z) } else { 1.0 };
                let mut at = start + (f.position - start) * s;
                at.z = 0.0;
                self.landings.push(Landing {
                    turbine: f.turbine,
                    position: at,
                    time: time + s * dt,
                    mass: f.mass,
                });
            } else if f.position.iter().all(|v| v.is_finite()) {
                still_airborne.push(f);
            }
        }
        self.airborne = still_airborne;
    }

    fn release(&mut self, time: f64, rotors: &[RotorGeometry]) -> Option<IceFragment> {
        if rotors.is_empty() {
            return None;
        }
        let turbine = self.rng.gen_range(0..rotors.len());
        let rotor = &rotors[turbine];
        let blade = self.rng.gen_range(0..rotor.blade_count().max(1));
        let panels = rotor.blade_panels(blade);
        if panels.is_empty() {
            return None;
        }
        let panel = &panels[self.rng.gen_range(0..panels.len())];
        let mass = if self.config.max_mass_kg > self.config.min_mass_kg {
            self.rng.gen_range(self.config.min_mass_kg..self.config.max_mass_kg)
        } else {
            self.config.min_mass_kg
        };
        let radius = (3.0 * mass / (4.0 * std::f64::consts::PI * self.config.density_kg_m3)).cbrt();
        Some(IceFragment {
            turbine,
            mass,
            area: std::f64::consts::PI * radius * radius,
            position: panel.control_point,
            velocity: panel.motion,
            released_at: time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airfoil::Polar;
    use crate::inflow::UniformInflow;
    use crate::rotor::{RotorDef, Station};
    use crate::structural::RotorKinematics;

    fn config(seed: u64) -> IceThrowDef {
        IceThrowDef {
            start_time_s: 0.0,
            fragments_per_step: 2,
            min_mass_kg: 0.5,
            max_mass_kg: 1.0,
            density_kg_m3: 900.0,
            drag_coefficient: 1.0,
            seed,
        }
    }

    fn rotor() -> RotorGeometry {
        let def = RotorDef {
            blade_count: 3,
            stations: (0..3)
                .map(|i| Station {
                    radius: 5.0 + 10.0 * i as f64,
                    chord: 1.0,
                    twist: 0.0,
                    polar: 0,
                })
                .collect(),
            struts: Vec::new(),
            polars: vec![Polar::new("p", vec![-1.0, 1.0], vec![0.0, 0.0], vec![0.0, 0.0]).unwrap()],
        };
        RotorGeometry::build(
            &def,
            &RotorKinematics {
                azimuth: 0.3,
                rotor_speed: 1.5,
                pitch: [0.0; 3],
                yaw: 0.0,
                hub: vec3(0.0, 0.0, 60.0),
            },
        )
        .unwrap()
    }

    fn wind() -> Inflow {
        Inflow::Uniform(UniformInflow {
            speed: 10.0,
            direction: 0.0,
            shear_exponent: 0.0,
            reference_height: 60.0,
        })
    }

    fn run(seed: u64) -> Vec<Landing> {
        let rotors = vec![rotor()];
        let mut ice = IceThrow::new(config(seed), 1.225);
        ice.advance(0.0, 0.05, &rotors, &wind());
        let mut cfg_off = ice.clone();
        cfg_off.config.fragments_per_step = 0;
        for k in 1..400 {
            cfg_off.advance(0.05 * k as f64, 0.05, &rotors, &wind());
        }
        cfg_off.landings().to_vec()
    }

    #[test]
    fn fragments_land_downwind() {
        let landings = run(7);
        assert_eq!(landings.len(), 2);
        for l in &landings {
            assert_eq!(l.position.z, 0.0);
            assert!(l.position.x > 0.0, "landed at {:?}", l.position);
        }
    }

    #[test]
    fn same_seed_same_landings() {
        assert_eq!(run(3), run(3));
    }
}
