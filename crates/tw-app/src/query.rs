//! Query helpers for extracting data from loaded runs.

use std::fmt::Write as _;

use tw_results::ReplayStore;

use crate::error::{AppError, AppResult};

/// Summary of a run's time range and data.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub time_range: (f64, f64),
    pub record_count: usize,
    pub channel_count: usize,
    pub turbine_count: usize,
    pub has_wake_frames: bool,
}

pub fn get_run_summary(replay: &ReplayStore) -> AppResult<RunSummary> {
    let times = replay.times();
    let (Some(first), Some(last)) = (times.first(), times.last()) else {
        return Err(AppError::InvalidInput("No records in run".to_string()));
    };
    Ok(RunSummary {
        time_range: (*first, *last),
        record_count: replay.len(),
        channel_count: replay.channel_names().len(),
        turbine_count: list_turbine_prefixes(replay).len(),
        has_wake_frames: replay.has_frames(),
    })
}

pub fn list_channels(replay: &ReplayStore) -> Vec<String> {
    replay.channel_names().to_vec()
}

/// `T1`, `T2`, ... in channel order.
pub fn list_turbine_prefixes(replay: &ReplayStore) -> Vec<String> {
    let mut prefixes: Vec<String> = Vec::new();
    for name in replay.channel_names() {
        if let Some((prefix, _)) = name.split_once(' ')
            && prefix.starts_with('T')
            && prefix[1..].chars().all(|c| c.is_ascii_digit())
            && !prefixes.iter().any(|p| p == prefix)
        {
            prefixes.push(prefix.to_string());
        }
    }
    prefixes
}

/// `(time, value)` pairs of one component of a channel.
pub fn extract_series(replay: &ReplayStore, channel: &str, index: usize) -> AppResult<Vec<(f64, f64)>> {
    if replay.channel_index(channel).is_none() {
        return Err(AppError::InvalidInput(format!("Unknown channel: {channel}")));
    }
    let mut series = Vec::with_capacity(replay.len());
    for (i, t) in replay.times().iter().enumerate() {
        if let Some(v) = replay.value(channel, i).and_then(|row| row.get(index)) {
            series.push((*t, f64::from(*v)));
        }
    }
    if series.is_empty() && !replay.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "Channel {channel} has no component {index}"
        )));
    }
    Ok(series)
}

pub fn series_to_csv(series: &[(f64, f64)]) -> String {
    let mut csv = String::from("time_s,value\n");
    for (t, v) in series {
        let _ = writeln!(csv, "{t},{v}");
    }
    csv
}
