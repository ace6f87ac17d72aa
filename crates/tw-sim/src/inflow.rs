//! Boundary conditions: the undisturbed inflow.
//!
//! The wind blows along +x when the direction is zero; directions rotate the
//! horizontal component about +z.

use std::path::Path;

use serde::Deserialize;
use tw_core::{Vec3, interp_clamped, vec3};
use tw_wake::FreeStream;

use crate::error::{SimError, SimResult};

/// Uniform inflow with a power-law shear profile.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformInflow {
    pub speed: f64,
    /// Horizontal direction (rad)
    pub direction: f64,
    pub shear_exponent: f64,
    pub reference_height: f64,
}

impl UniformInflow {
    pub fn velocity_at(&self, position: &Vec3) -> Vec3 {
        let factor = shear_factor(position.z, self.reference_height, self.shear_exponent);
        horizontal(self.speed * factor, self.direction)
    }
}

fn shear_factor(z: f64, reference_height: f64, exponent: f64) -> f64 {
    if exponent == 0.0 {
        1.0
    } else if z <= 0.0 {
        0.0
    } else {
        (z / reference_height).powf(exponent)
    }
}

fn horizontal(speed: f64, direction: f64) -> Vec3 {
    vec3(speed * direction.cos(), speed * direction.sin(), 0.0)
}

/// One row of a hub height wind file.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HubHeightSample {
    pub time: f64,
    pub speed: f64,
    /// Horizontal direction (rad)
    pub direction: f64,
    pub vertical_speed: f64,
    /// Linear horizontal shear across the reference length
    pub horizontal_shear: f64,
    pub shear_exponent: f64,
    /// Linear vertical shear across the reference length
    pub linear_vertical_shear: f64,
    pub gust: f64,
}

/// Hub height time series, interpolated linearly and clamped at both ends.
#[derive(Clone, Debug, PartialEq)]
pub struct HubHeightSeries {
    times: Vec<f64>,
    /// speed, direction, vertical speed, horizontal shear, shear exponent,
    /// linear vertical shear, gust; one entry per sample
    columns: [Vec<f64>; 7],
    /// Hub position the shear terms are measured from
    pub reference_point: Vec3,
    /// Length the linear shears are normalised by (rotor diameter)
    pub reference_length: f64,
}

impl HubHeightSeries {
    /// Parse whitespace separated columns: time, speed, direction (deg),
    /// vertical speed, horizontal shear, shear exponent, linear vertical
    /// shear, gust. Lines starting with `!` or `#` are comments; missing
    /// trailing columns are zero.
    pub fn parse(text: &str) -> SimResult<Vec<HubHeightSample>> {
        let mut samples: Vec<HubHeightSample> = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('!') || line.starts_with('#') {
                continue;
            }
            let values = line
                .split_whitespace()
                .map(str::parse::<f64>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| SimError::Configuration {
                    message: format!("hub height wind line {}: {e}", lineno + 1),
                })?;
            if values.len() < 2 || values.iter().any(|v| !v.is_finite()) {
                return Err(SimError::Configuration {
                    message: format!(
                        "hub height wind line {}: expected at least time and speed",
                        lineno + 1
                    ),
                });
            }
            let col = |i: usize| values.get(i).copied().unwrap_or(0.0);
            let sample = HubHeightSample {
                time: col(0),
                speed: col(1),
                direction: tw_core::units::deg_to_rad(col(2)),
                vertical_speed: col(3),
                horizontal_shear: col(4),
                shear_exponent: col(5),
                linear_vertical_shear: col(6),
                gust: col(7),
            };
            if samples.last().is_some_and(|s| sample.time <= s.time) {
                return Err(SimError::Configuration {
                    message: format!("hub height wind line {}: time must increase", lineno + 1),
                });
            }
            samples.push(sample);
        }
        if samples.is_empty() {
            return Err(SimError::Configuration {
                message: "hub height wind file has no samples".to_string(),
            });
        }
        Ok(samples)
    }

    pub fn new(samples: Vec<HubHeightSample>, reference_point: Vec3, reference_length: f64) -> SimResult<Self> {
        if samples.is_empty() {
            return Err(SimError::InvalidArg {
                what: "hub height series needs samples",
            });
        }
        let column = |f: fn(&HubHeightSample) -> f64| samples.iter().map(f).collect::<Vec<f64>>();
        Ok(Self {
            times: column(|s| s.time),
            columns: [
                column(|s| s.speed),
                column(|s| s.direction),
                column(|s| s.vertical_speed),
                column(|s| s.horizontal_shear),
                column(|s| s.shear_exponent),
                column(|s| s.linear_vertical_shear),
                column(|s| s.gust),
            ],
            reference_point,
            reference_length,
        })
    }

    /// Conditions at `time`, clamped to the first and last sample.
    pub fn sample_at(&self, time: f64) -> HubHeightSample {
        let at = |c: usize| interp_clamped(&self.times, &self.columns[c], time).unwrap_or(0.0);
        HubHeightSample {
            time,
            speed: at(0),
            direction: at(1),
            vertical_speed: at(2),
            horizontal_shear: at(3),
            shear_exponent: at(4),
            linear_vertical_shear: at(5),
            gust: at(6),
        }
    }

    pub fn velocity_at(&self, position: &Vec3, time: f64) -> Vec3 {
        let h = self.sample_at(time);
        let rel = position - self.reference_point;
        let lateral = -rel.x * h.direction.sin() + rel.y * h.direction.cos();
        let hub_height = self.reference_point.z;
        let length = self.reference_length.max(f64::EPSILON);
        let profile = shear_factor(position.z, hub_height, h.shear_exponent)
            + h.linear_vertical_shear * rel.z / length
            + h.horizontal_shear * lateral / length;
        let mut v = horizontal(h.speed * profile + h.gust, h.direction);
        v.z = h.vertical_speed;
        v
    }
}

/// Frozen turbulent wind field on a rotor-plane grid.
///
/// `u[t][iz][iy]` etc. Between grid points the field is bilinear, between
/// time slices linear; outside the grid and the time range it is clamped.
/// Downstream points see the field convected at the mean speed.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WindField {
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub times: Vec<f64>,
    pub mean_speed_m_s: f64,
    #[serde(default)]
    pub x_origin_m: f64,
    pub u: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    pub v: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    pub w: Vec<Vec<Vec<f64>>>,
}

impl WindField {
    pub fn from_json(text: &str) -> SimResult<Self> {
        let field: Self = serde_json::from_str(text).map_err(|e| SimError::Configuration {
            message: format!("wind field: {e}"),
        })?;
        field.check()?;
        Ok(field)
    }

    fn check(&self) -> SimResult<()> {
        let bad = |message: &str| {
            Err(SimError::Configuration {
                message: format!("wind field: {message}"),
            })
        };
        if self.y.is_empty() || self.z.is_empty() || self.times.is_empty() {
            return bad("grid and time axes must not be empty");
        }
        for axis in [&self.y, &self.z, &self.times] {
            if axis.windows(2).any(|w| w[1] <= w[0]) {
                return bad("axes must be strictly increasing");
            }
        }
        if !(self.mean_speed_m_s.is_finite() && self.mean_speed_m_s > 0.0) {
            return bad("mean speed must be positive");
        }
        for (name, comp, required) in [("u", &self.u, true), ("v", &self.v, false), ("w", &self.w, false)] {
            if comp.is_empty() && !required {
                continue;
            }
            let shaped = comp.len() == self.times.len()
                && comp.iter().all(|slice| {
                    slice.len() == self.z.len()
                        && slice
                            .iter()
                            .all(|row| row.len() == self.y.len() && row.iter().all(|v| v.is_finite()))
                });
            if !shaped {
                return bad(&format!("component {name} does not match the grid"));
            }
        }
        Ok(())
    }

    pub fn velocity_at(&self, position: &Vec3, time: f64) -> Vec3 {
        let t = time - (position.x - self.x_origin_m) / self.mean_speed_m_s;
        let (t0, t1, wt) = bracket(&self.times, t);
        let (y0, y1, wy) = bracket(&self.y, position.y);
        let (z0, z1, wz) = bracket(&self.z, position.z);
        let sample = |comp: &Vec<Vec<Vec<f64>>>| {
            if comp.is_empty() {
                return 0.0;
            }
            let plane = |k: usize| {
                let s = &comp[k];
                let lower = s[z0][y0] + wy * (s[z0][y1] - s[z0][y0]);
                let upper = s[z1][y0] + wy * (s[z1][y1] - s[z1][y0]);
                lower + wz * (upper - lower)
            };
            let a = plane(t0);
            a + wt * (plane(t1) - a)
        };
        vec3(sample(&self.u), sample(&self.v), sample(&self.w))
    }
}

/// Bracketing indices and weight of `x` on a sorted axis, clamped.
fn bracket(axis: &[f64], x: f64) -> (usize, usize, f64) {
    let n = axis.len();
    if n == 1 || x <= axis[0] {
        return (0, 0, 0.0);
    }
    if x >= axis[n - 1] {
        return (n - 1, n - 1, 0.0);
    }
    let i = axis.partition_point(|&a| a <= x);
    let (a, b) = (axis[i - 1], axis[i]);
    (i - 1, i, (x - a) / (b - a))
}

/// The inflow model of a run.
#[derive(Clone, Debug, PartialEq)]
pub enum Inflow {
    Uniform(UniformInflow),
    HubHeight(HubHeightSeries),
    WindField(WindField),
}

impl Inflow {
    pub fn velocity_at(&self, position: &Vec3, time: f64) -> Vec3 {
        match self {
            Inflow::Uniform(u) => u.velocity_at(position),
            Inflow::HubHeight(h) => h.velocity_at(position, time),
            Inflow::WindField(w) => w.velocity_at(position, time),
        }
    }
}

impl FreeStream for Inflow {
    fn velocity_at(&self, position: &Vec3, time: f64) -> Vec3 {
        Inflow::velocity_at(self, position, time)
    }
}

/// Read an inflow input file; a missing file is a configuration error.
pub fn read_input_file(path: &Path) -> SimResult<String> {
    std::fs::read_to_string(path).map_err(|e| SimError::Configuration {
        message: format!("cannot read {}: {e}", path.display()),
    })
}
