//! Append-only, time-indexed result storage.
//!
//! One row per stored timestep. Every row holds one `Vec<f32>` per channel;
//! scalar channels have length one, span distributions one value per panel.
//! Lookups by time are tolerance based.

use serde::{Deserialize, Serialize};

use crate::{ResultsError, ResultsResult};

/// Wake geometry of one stored step, all turbines flattened.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WakeFrame {
    /// Filament end points `[x0, y0, z0, x1, y1, z1]`
    pub segments: Vec<[f32; 6]>,
    pub particles: Vec<[f32; 3]>,
}

impl WakeFrame {
    pub fn element_count(&self) -> usize {
        self.segments.len() + self.particles.len()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplayStore {
    channels: Vec<String>,
    times: Vec<f64>,
    /// `rows[step][channel]`
    rows: Vec<Vec<Vec<f32>>>,
    frames: Vec<Option<WakeFrame>>,
}

impl ReplayStore {
    pub fn new(channels: Vec<String>) -> ResultsResult<Self> {
        for (i, name) in channels.iter().enumerate() {
            if channels[..i].contains(name) {
                return Err(ResultsError::DuplicateChannel { name: name.clone() });
            }
        }
        Ok(Self {
            channels,
            ..Default::default()
        })
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channels
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn last_time(&self) -> Option<f64> {
        self.times.last().copied()
    }

    /// Append one stored step. Rejects rows that are out of order, have the
    /// wrong shape or contain non-finite values; the store is unchanged then.
    pub fn append(
        &mut self,
        time: f64,
        row: Vec<Vec<f32>>,
        frame: Option<WakeFrame>,
    ) -> ResultsResult<usize> {
        if row.len() != self.channels.len() {
            return Err(ResultsError::ChannelCount {
                expected: self.channels.len(),
                got: row.len(),
            });
        }
        if !time.is_finite() {
            return Err(ResultsError::NonFinite {
                channel: "time".to_string(),
            });
        }
        if let Some(last) = self.last_time()
            && time <= last
        {
            return Err(ResultsError::TimeNotIncreasing { last, time });
        }
        if let Some(c) = row.iter().position(|v| !v.iter().all(|x| x.is_finite())) {
            return Err(ResultsError::NonFinite {
                channel: self.channels[c].clone(),
            });
        }
        if let Some(f) = &frame {
            let finite = f.segments.iter().flatten().all(|x| x.is_finite())
                && f.particles.iter().flatten().all(|x| x.is_finite());
            if !finite {
                return Err(ResultsError::NonFinite {
                    channel: "wake frame".to_string(),
                });
            }
        }
        self.times.push(time);
        self.rows.push(row);
        self.frames.push(frame);
        Ok(self.times.len() - 1)
    }

    /// Values of one channel at one stored step.
    pub fn value(&self, channel: &str, index: usize) -> Option<&[f32]> {
        let c = self.channel_index(channel)?;
        self.rows.get(index).map(|row| row[c].as_slice())
    }

    /// Component `component` of a channel over all stored steps. Steps where
    /// the channel is shorter yield NaN.
    pub fn series(&self, channel: &str, component: usize) -> Option<Vec<f32>> {
        let c = self.channel_index(channel)?;
        Some(
            self.rows
                .iter()
                .map(|row| row[c].get(component).copied().unwrap_or(f32::NAN))
                .collect(),
        )
    }

    pub fn row(&self, index: usize) -> Option<&[Vec<f32>]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn frame(&self, index: usize) -> Option<&WakeFrame> {
        self.frames.get(index).and_then(Option::as_ref)
    }

    pub fn has_frames(&self) -> bool {
        self.frames.iter().any(Option::is_some)
    }

    /// Stored step whose time is closest to `time`.
    pub fn nearest_index(&self, time: f64) -> Option<usize> {
        if self.times.is_empty() || time.is_nan() {
            return None;
        }
        let i = self.times.partition_point(|&t| t < time);
        if i == 0 {
            return Some(0);
        }
        if i == self.times.len() {
            return Some(i - 1);
        }
        if time - self.times[i - 1] <= self.times[i] - time {
            Some(i - 1)
        } else {
            Some(i)
        }
    }

    /// Stored step within `tolerance` of `time`.
    pub fn index_at(&self, time: f64, tolerance: f64) -> Option<usize> {
        self.nearest_index(time)
            .filter(|&i| (self.times[i] - time).abs() <= tolerance)
    }

    pub fn clear(&mut self) {
        self.times.clear();
        self.rows.clear();
        self.frames.clear();
    }

    pub(crate) fn from_parts(
        channels: Vec<String>,
        times: Vec<f64>,
        rows: Vec<Vec<Vec<f32>>>,
        frames: Vec<Option<WakeFrame>>,
    ) -> Self {
        Self {
            channels,
            times,
            rows,
            frames,
        }
    }

    pub(crate) fn rows(&self) -> &[Vec<Vec<f32>>] {
        &self.rows
    }

    pub(crate) fn frames(&self) -> &[Option<WakeFrame>] {
        &self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ReplayStore {
        let mut s = ReplayStore::new(vec!["power".into(), "gamma".into()]).unwrap();
        for k in 0..5 {
            let t = 0.1 * (k + 1) as f64;
            s.append(t, vec![vec![k as f32], vec![1.0, 2.0, k as f32]], None)
                .unwrap();
        }
        s
    }

    #[test]
    fn duplicate_channels_rejected() {
        assert!(matches!(
            ReplayStore::new(vec!["a".into(), "a".into()]),
            Err(ResultsError::DuplicateChannel { .. })
        ));
    }

    #[test]
    fn append_rejects_bad_rows_without_side_effects() {
        let mut s = store();
        let before = s.clone();
        assert!(matches!(
            s.append(0.3, vec![vec![0.0], vec![0.0]], None),
            Err(ResultsError::TimeNotIncreasing { .. })
        ));
        assert!(matches!(
            s.append(1.0, vec![vec![0.0]], None),
            Err(ResultsError::ChannelCount { expected: 2, got: 1 })
        ));
        match s.append(1.0, vec![vec![0.0], vec![f32::NAN]], None) {
            Err(ResultsError::NonFinite { channel }) => assert_eq!(channel, "gamma"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s, before);
    }

    #[test]
    fn nearest_and_tolerant_lookup() {
        let s = store();
        assert_eq!(s.nearest_index(0.0), Some(0));
        assert_eq!(s.nearest_index(0.26), Some(2));
        assert_eq!(s.nearest_index(0.34), Some(2));
        assert_eq!(s.nearest_index(9.0), Some(4));
        assert_eq!(s.index_at(0.3 + 1e-9, 1e-6), Some(2));
        assert_eq!(s.index_at(0.35, 1e-3), None);
        assert_eq!(ReplayStore::default().nearest_index(1.0), None);
    }

    #[test]
    fn series_and_values() {
        let s = store();
        assert_eq!(s.series("power", 0).unwrap(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(s.series("gamma", 2).unwrap()[3], 3.0);
        assert!(s.series("gamma", 5).unwrap().iter().all(|v| v.is_nan()));
        assert_eq!(s.value("gamma", 1).unwrap(), &[1.0, 2.0, 1.0]);
        assert!(s.value("missing", 0).is_none());
    }
}
