//! Wall-clock accounting for the phases of a run.
//!
//! Off by default. `TW_TIMING` in the environment or [`enable_timing`]
//! switches it on; while off, [`Timer`] records nothing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var_os("TW_TIMING").is_some()
}

/// Measures one call. Started disarmed when timing is off.
pub struct Timer {
    start: Option<Instant>,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: is_enabled().then(Instant::now),
        }
    }

    /// Seconds since [`Timer::start`], `None` when timing is off.
    pub fn stop(self) -> Option<f64> {
        self.start.map(|s| s.elapsed().as_secs_f64())
    }

    pub fn stop_into(self, phase: &PhaseTimer) {
        if let Some(elapsed) = self.stop() {
            phase.record(elapsed);
        }
    }
}

/// Total and call count of one phase, shared across threads.
pub struct PhaseTimer {
    name: &'static str,
    total_ns: AtomicU64,
    calls: AtomicU64,
}

impl PhaseTimer {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            total_ns: AtomicU64::new(0),
            calls: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn record(&self, seconds: f64) {
        self.total_ns.fetch_add((seconds * 1e9) as u64, Ordering::Relaxed);
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_seconds(&self) -> f64 {
        self.total_ns.load(Ordering::Relaxed) as f64 * 1e-9
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn mean_seconds(&self) -> f64 {
        match self.calls() {
            0 => 0.0,
            n => self.total_seconds() / n as f64,
        }
    }

    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.calls.store(0, Ordering::Relaxed);
    }
}

/// Phases of the aero-structural loop.
pub mod phase_timing {
    use super::PhaseTimer;

    /// Induced velocity evaluations on any backend.
    pub static INDUCTION: PhaseTimer = PhaseTimer::new("induction");
    pub static WAKE_LIFECYCLE: PhaseTimer = PhaseTimer::new("wake lifecycle");
    pub static REMESH: PhaseTimer = PhaseTimer::new("remesh");
    /// Fixed-point iteration on the bound circulation.
    pub static BOUND_CIRCULATION: PhaseTimer = PhaseTimer::new("bound circulation");
    pub static CONTROLLER: PhaseTimer = PhaseTimer::new("controller");

    pub fn all() -> [&'static PhaseTimer; 5] {
        [&INDUCTION, &WAKE_LIFECYCLE, &REMESH, &BOUND_CIRCULATION, &CONTROLLER]
    }

    pub fn reset_all() {
        for phase in all() {
            phase.reset();
        }
    }

    pub fn print_summary() {
        if !super::is_enabled() {
            return;
        }
        println!("\nphase               calls     total [s]   mean [ms]");
        for phase in all().into_iter().filter(|p| p.calls() > 0) {
            println!(
                "{:<18} {:>6} {:>13.3} {:>11.4}",
                phase.name(),
                phase.calls(),
                phase.total_seconds(),
                phase.mean_seconds() * 1e3
            );
        }
    }
}

/// Wall-clock cost of one run, split by stage.
#[derive(Default, Debug, Clone)]
pub struct PerfStats {
    pub setup_time_s: f64,
    pub run_time_s: f64,
    pub steps: usize,
    pub save_time_s: f64,
    pub load_time_s: f64,
}

impl PerfStats {
    pub fn mean_step_time_s(&self) -> Option<f64> {
        (self.steps > 0).then(|| self.run_time_s / self.steps as f64)
    }

    /// Prints the per-step cost and the phase table when timing is on.
    pub fn print_summary(&self) {
        if !is_enabled() {
            return;
        }
        if let Some(mean) = self.mean_step_time_s() {
            println!("  Mean step: {:.4}s", mean);
        }
        phase_timing::print_summary();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_timer_averages() {
        let t = PhaseTimer::new("test");
        t.record(0.5);
        t.record(1.5);
        assert_eq!(t.calls(), 2);
        assert!((t.mean_seconds() - 1.0).abs() < 1e-6);
        t.reset();
        assert_eq!(t.calls(), 0);
        assert_eq!(t.mean_seconds(), 0.0);
    }

    #[test]
    fn mean_step_needs_steps() {
        let mut stats = PerfStats {
            run_time_s: 2.0,
            ..PerfStats::default()
        };
        assert_eq!(stats.mean_step_time_s(), None);
        stats.steps = 4;
        assert_eq!(stats.mean_step_time_s(), Some(0.5));
    }
}
