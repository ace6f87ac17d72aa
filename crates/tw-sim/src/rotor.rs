//! Rotor definition and per-step geometry reconstruction.
//!
//! Frame: the rotor axis is +x rotated by the yaw about +z. Blade `b` sits at
//! azimuth `psi = azimuth + 2 pi b / B` with radial unit vector
//! `e_r = (0, -sin psi, cos psi)` and moves along `e_t = axis x e_r`.
//! Chord runs from the leading edge towards `-e_t`, tilted towards the axis by
//! twist plus pitch. Bound vortices lie on the quarter chord line.

use std::collections::HashMap;
use std::f64::consts::TAU;

use tw_controls::MAX_BLADES;
use tw_core::units::deg_to_rad;
use tw_core::{Vec3, is_finite_vec, vec3};
use tw_induction::{VortexField, VortexSegment};
use tw_project::schema::TurbineDef;
use tw_wake::state::trailing_strength;

use crate::airfoil::Polar;
use crate::error::{SimError, SimResult};
use crate::structural::RotorKinematics;

/// One resolved blade station.
#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    pub radius: f64,
    pub chord: f64,
    /// Twist (rad)
    pub twist: f64,
    /// Index into [`RotorDef::polars`]
    pub polar: usize,
}

/// Drag-only radial member.
#[derive(Clone, Debug, PartialEq)]
pub struct StrutSpec {
    pub name: String,
    pub root_radius: f64,
    pub tip_radius: f64,
    pub chord: f64,
    pub drag_coefficient: f64,
    pub azimuth_offset: f64,
    pub axial_offset: f64,
    pub panels: usize,
}

/// Static rotor description, resolved from the project once per run.
#[derive(Clone, Debug, PartialEq)]
pub struct RotorDef {
    pub blade_count: usize,
    pub stations: Vec<Station>,
    pub struts: Vec<StrutSpec>,
    pub polars: Vec<Polar>,
}

impl RotorDef {
    pub fn from_def(def: &TurbineDef, polars: &[Polar]) -> SimResult<Self> {
        let by_id: HashMap<&str, usize> = polars.iter().enumerate().map(|(i, p)| (p.id.as_str(), i)).collect();
        let stations = def
            .blades
            .stations
            .iter()
            .map(|s| {
                let polar = by_id.get(s.airfoil.as_str()).copied().ok_or_else(|| SimError::Configuration {
                    message: format!("turbine {}: unknown airfoil {}", def.id, s.airfoil),
                })?;
                Ok(Station {
                    radius: s.radius_m,
                    chord: s.chord_m,
                    twist: deg_to_rad(s.twist_deg),
                    polar,
                })
            })
            .collect::<SimResult<Vec<_>>>()?;
        let struts = def
            .struts
            .iter()
            .map(|s| StrutSpec {
                name: s.name.clone(),
                root_radius: s.root_radius_m,
                tip_radius: s.tip_radius_m,
                chord: s.chord_m,
                drag_coefficient: s.drag_coefficient,
                azimuth_offset: deg_to_rad(s.azimuth_offset_deg),
                axial_offset: s.axial_offset_m,
                panels: s.panels,
            })
            .collect();
        let rotor = Self {
            blade_count: def.blades.count,
            stations,
            struts,
            polars: polars.to_vec(),
        };
        rotor.check()?;
        Ok(rotor)
    }

    fn check(&self) -> SimResult<()> {
        if self.blade_count == 0 || self.blade_count > MAX_BLADES {
            return Err(SimError::InvalidArg {
                what: "blade count must be between 1 and 3",
            });
        }
        if self.stations.len() < 2 {
            return Err(SimError::InvalidArg {
                what: "a blade needs at least two stations",
            });
        }
        if self.stations.windows(2).any(|w| w[1].radius <= w[0].radius) {
            return Err(SimError::InvalidArg {
                what: "station radii must be strictly increasing",
            });
        }
        if self.stations.iter().any(|s| s.polar >= self.polars.len()) {
            return Err(SimError::InvalidArg {
                what: "station polar index out of range",
            });
        }
        Ok(())
    }

    pub fn panels_per_blade(&self) -> usize {
        self.stations.len() - 1
    }

    pub fn tip_radius(&self) -> f64 {
        self.stations.last().map_or(0.0, |s| s.radius)
    }

    pub fn swept_area(&self) -> f64 {
        std::f64::consts::PI * self.tip_radius().powi(2)
    }

    /// Mean of the two bounding station polars of panel `j`.
    pub fn panel_coefficients(&self, panel: usize, alpha: f64) -> (f64, f64) {
        let (a, b) = (&self.stations[panel], &self.stations[panel + 1]);
        let (cl_a, cd_a) = self.polars[a.polar].coefficients(alpha);
        let (cl_b, cd_b) = self.polars[b.polar].coefficients(alpha);
        (0.5 * (cl_a + cl_b), 0.5 * (cd_a + cd_b))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelKind {
    /// Lifting panel of blade `blade`, span index `index`
    Blade { blade: usize, index: usize },
    /// Drag-only panel of strut `strut` on blade `blade`
    Strut { strut: usize, blade: usize },
}

/// Geometry and motion of one panel at the current step.
#[derive(Clone, Debug, PartialEq)]
pub struct BladePanel {
    pub kind: PanelKind,
    pub control_point: Vec3,
    /// Unit vector root to tip
    pub span: Vec3,
    pub width: f64,
    pub chord: f64,
    /// Twist plus pitch (rad); zero for struts
    pub theta: f64,
    /// Structural velocity of the control point
    pub motion: Vec3,
    pub drag_coefficient: f64,
}

/// Rotor geometry at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct RotorGeometry {
    pub hub: Vec3,
    pub axis: Vec3,
    pub rotor_speed: f64,
    /// `[blade][station]`
    pub quarter_chord: Vec<Vec<Vec3>>,
    /// `[blade][station]`
    pub trailing_edge: Vec<Vec<Vec3>>,
    /// Blade panels blade by blade, then strut panels
    pub panels: Vec<BladePanel>,
    panels_per_blade: usize,
}

impl RotorGeometry {
    /// Place every station and panel for the given pose. A non-finite pose
    /// or result is reported as [`SimError::NonFinite`].
    pub fn build(def: &RotorDef, k: &RotorKinematics) -> SimResult<Self> {
        let pose_finite = k.azimuth.is_finite()
            && k.rotor_speed.is_finite()
            && k.yaw.is_finite()
            && k.pitch.iter().all(|p| p.is_finite())
            && is_finite_vec(&k.hub);
        if !pose_finite {
            return Err(SimError::NonFinite {
                what: "rotor pose",
                step: 0,
            });
        }
        let (sy, cy) = k.yaw.sin_cos();
        let yaw = |v: Vec3| vec3(cy * v.x - sy * v.y, sy * v.x + cy * v.y, v.z);
        let axis = yaw(vec3(1.0, 0.0, 0.0));
        let omega = axis * k.rotor_speed;
        let motion = |p: &Vec3| omega.cross(&(p - k.hub));

        let b_count = def.blade_count;
        let mut quarter_chord = Vec::with_capacity(b_count);
        let mut trailing_edge = Vec::with_capacity(b_count);
        let mut panels = Vec::new();

        for b in 0..b_count {
            let psi = k.azimuth + TAU * b as f64 / b_count as f64;
            let (s, c) = psi.sin_cos();
            let e_r = yaw(vec3(0.0, -s, c));
            let e_t = axis.cross(&e_r);
            let pitch = k.pitch[b];
            let mut qc = Vec::with_capacity(def.stations.len());
            let mut te = Vec::with_capacity(def.stations.len());
            for st in &def.stations {
                let theta = st.twist + pitch;
                let chord_dir = -e_t * theta.cos() + axis * theta.sin();
                let q = k.hub + e_r * st.radius;
                qc.push(q);
                te.push(q + chord_dir * (0.75 * st.chord));
            }
            for j in 0..def.panels_per_blade() {
                let (a, bb) = (&def.stations[j], &def.stations[j + 1]);
                let cp = 0.5 * (qc[j] + qc[j + 1]);
                panels.push(BladePanel {
                    kind: PanelKind::Blade { blade: b, index: j },
                    control_point: cp,
                    span: e_r,
                    width: bb.radius - a.radius,
                    chord: 0.5 * (a.chord + bb.chord),
                    theta: 0.5 * (a.twist + bb.twist) + pitch,
                    motion: motion(&cp),
                    drag_coefficient: 0.0,
                });
            }
            quarter_chord.push(qc);
            trailing_edge.push(te);
        }

        for (si, strut) in def.struts.iter().enumerate() {
            let n = strut.panels.max(1);
            let dr = (strut.tip_radius - strut.root_radius) / n as f64;
            for b in 0..b_count {
                let psi = k.azimuth + strut.azimuth_offset + TAU * b as f64 / b_count as f64;
                let (s, c) = psi.sin_cos();
                let e_r = yaw(vec3(0.0, -s, c));
                for p in 0..n {
                    let r = strut.root_radius + dr * (p as f64 + 0.5);
                    let cp = k.hub + axis * strut.axial_offset + e_r * r;
                    panels.push(BladePanel {
                        kind: PanelKind::Strut { strut: si, blade: b },
                        control_point: cp,
                        span: e_r,
                        width: dr.abs(),
                        chord: strut.chord,
                        theta: 0.0,
                        motion: motion(&cp),
                        drag_coefficient: strut.drag_coefficient,
                    });
                }
            }
        }

        let geometry = Self {
            hub: k.hub,
            axis,
            rotor_speed: k.rotor_speed,
            quarter_chord,
            trailing_edge,
            panels,
            panels_per_blade: def.panels_per_blade(),
        };
        if !geometry.is_finite() {
            return Err(SimError::NonFinite {
                what: "rotor geometry",
                step: 0,
            });
        }
        Ok(geometry)
    }

    fn is_finite(&self) -> bool {
        self.quarter_chord.iter().chain(&self.trailing_edge).flatten().all(is_finite_vec)
            && self
                .panels
                .iter()
                .all(|p| is_finite_vec(&p.control_point) && is_finite_vec(&p.motion) && p.theta.is_finite())
    }

    pub fn blade_count(&self) -> usize {
        self.quarter_chord.len()
    }

    pub fn panels_per_blade(&self) -> usize {
        self.panels_per_blade
    }

    pub fn blade_panels(&self, blade: usize) -> &[BladePanel] {
        let n = self.panels_per_blade;
        &self.panels[blade * n..(blade + 1) * n]
    }

    pub fn control_points(&self) -> Vec<Vec3> {
        self.panels.iter().map(|p| p.control_point).collect()
    }

    /// Bound vortices on the quarter chord line plus the chordwise legs that
    /// carry the circulation differences to the trailing edge.
    ///
    /// `gamma[b][j]` is the circulation of panel `j` of blade `b`.
    pub fn bound_field(&self, gamma: &[Vec<f64>], core: f64) -> VortexField {
        let stations = self.panels_per_blade + 1;
        let mut field = VortexField::with_capacity(self.blade_count() * (2 * stations - 1), 0);
        for (b, g) in gamma.iter().enumerate().take(self.blade_count()) {
            let qc = &self.quarter_chord[b];
            let te = &self.trailing_edge[b];
            for (j, &gj) in g.iter().enumerate().take(self.panels_per_blade) {
                field.push_segment(VortexSegment {
                    start: qc[j],
                    end: qc[j + 1],
                    gamma: gj,
                    core,
                });
            }
            for s in 0..stations {
                let strength = trailing_strength(g, s);
                if strength != 0.0 {
                    field.push_segment(VortexSegment {
                        start: qc[s],
                        end: te[s],
                        gamma: strength,
                        core,
                    });
                }
            }
        }
        field
    }
}
