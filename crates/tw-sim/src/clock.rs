//! Simulation clock.

use crate::error::{SimError, SimResult};

/// Logical time of a run. Only the driver mutates it; the step counter never
/// decreases except on [`SimulationClock::reset`].
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationClock {
    pub current_time: f64,
    pub current_time_step: usize,
    pub number_of_timesteps: usize,
    pub timestep_size: f64,
    /// First step whose results are stored
    pub store_output_from: usize,
}

impl SimulationClock {
    pub fn new(timestep_size: f64, number_of_timesteps: usize, store_output_from: usize) -> SimResult<Self> {
        if !(timestep_size.is_finite() && timestep_size > 0.0) {
            return Err(SimError::InvalidArg {
                what: "timestep size must be positive",
            });
        }
        Ok(Self {
            current_time: 0.0,
            current_time_step: 0,
            number_of_timesteps,
            timestep_size,
            store_output_from,
        })
    }

    /// Step 1 of every timestep.
    pub fn advance(&mut self) {
        self.current_time_step += 1;
        // multiply rather than accumulate so stored times stay evenly spaced
        self.current_time = self.current_time_step as f64 * self.timestep_size;
    }

    pub fn reset(&mut self) {
        self.current_time = 0.0;
        self.current_time_step = 0;
    }

    pub fn is_finished(&self) -> bool {
        self.current_time_step >= self.number_of_timesteps
    }

    pub fn should_store(&self) -> bool {
        self.current_time_step >= self.store_output_from
    }

    /// Fraction of the run completed.
    pub fn progress(&self) -> f64 {
        if self.number_of_timesteps == 0 {
            1.0
        } else {
            self.current_time_step as f64 / self.number_of_timesteps as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_are_multiples_of_the_step() {
        let mut c = SimulationClock::new(0.1, 3, 0).unwrap();
        c.advance();
        c.advance();
        c.advance();
        assert_eq!(c.current_time, 3.0 * 0.1);
        assert!(c.is_finished());
        c.reset();
        assert_eq!(c.current_time_step, 0);
    }

    #[test]
    fn storage_threshold() {
        let mut c = SimulationClock::new(0.5, 10, 2).unwrap();
        c.advance();
        assert!(!c.should_store());
        c.advance();
        assert!(c.should_store());
    }

    #[test]
    fn rejects_bad_step() {
        assert!(SimulationClock::new(0.0, 1, 0).is_err());
        assert!(SimulationClock::new(f64::NAN, 1, 0).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn steps_are_monotonic_and_evenly_spaced(dt in 1.0e-4_f64..10.0, n in 1_usize..500) {
            let mut c = SimulationClock::new(dt, n, 0).unwrap();
            let mut last = (0, 0.0);
            while !c.is_finished() {
                c.advance();
                prop_assert_eq!(c.current_time_step, last.0 + 1);
                prop_assert!(c.current_time > last.1);
                prop_assert_eq!(c.current_time, c.current_time_step as f64 * dt);
                last = (c.current_time_step, c.current_time);
            }
            prop_assert_eq!(c.current_time_step, n);
            prop_assert!((c.progress() - 1.0).abs() < 1e-12);
        }
    }
}
