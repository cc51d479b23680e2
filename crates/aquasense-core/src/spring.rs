//! Damped spring used to animate gauge needles.
//!
//! [`step_spring`] is a pure function; [`SpringInterpolator`] wraps it with
//! a target for callers that drive it from a frame clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Integration step. Frames are split into substeps of this size.
const SUBSTEP_SECS: f64 = 0.001;

/// Longest frame integrated in one call. Longer gaps (a stalled frame clock)
/// are treated as this long so the spring cannot jump.
pub const MAX_FRAME: Duration = Duration::from_millis(64);

/// Spring constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpringConfig {
    pub tension: f64,
    pub friction: f64,
    pub mass: f64,
    /// Distance and speed below which the spring snaps to rest.
    pub precision: f64,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            tension: 120.0,
            friction: 20.0,
            mass: 1.0,
            precision: 0.01,
        }
    }
}

impl SpringConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.tension) || !positive(self.mass) || !positive(self.precision) {
            return Err(Error::invalid_config(
                "spring tension, mass and precision must be positive",
            ));
        }
        if !self.friction.is_finite() || self.friction < 0.0 {
            return Err(Error::invalid_config("spring friction must not be negative"));
        }
        Ok(())
    }
}

/// Position and velocity of a spring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpringState {
    pub current: f64,
    pub velocity: f64,
}

impl SpringState {
    pub fn at(value: f64) -> Self {
        Self {
            current: value,
            velocity: 0.0,
        }
    }

    pub fn is_at_rest(&self, target: f64, config: &SpringConfig) -> bool {
        self.velocity.abs() < config.precision && (self.current - target).abs() < config.precision
    }
}

/// Advance `state` by `dt` towards `target`.
///
/// Uses semi-implicit Euler in 1 ms substeps; `dt` is capped at
/// [`MAX_FRAME`]. Once both distance and speed are under
/// `config.precision` the state snaps exactly onto `target`.
#[must_use]
pub fn step_spring(state: SpringState, dt: Duration, target: f64, config: &SpringConfig) -> SpringState {
    if !target.is_finite() || !state.current.is_finite() {
        return SpringState::at(target);
    }
    let dt = dt.min(MAX_FRAME).as_secs_f64();
    let SpringState {
        mut current,
        mut velocity,
    } = state;

    let mut remaining = dt;
    while remaining > 0.0 {
        let h = remaining.min(SUBSTEP_SECS);
        let force = -config.tension * (current - target) - config.friction * velocity;
        velocity += force / config.mass * h;
        current += velocity * h;
        remaining -= h;
    }

    let next = SpringState { current, velocity };
    if next.is_at_rest(target, config) {
        SpringState::at(target)
    } else {
        next
    }
}

/// A spring chasing a movable target.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use aquasense_core::spring::{SpringConfig, SpringInterpolator};
///
/// let mut spring = SpringInterpolator::new(0.0, SpringConfig::default());
/// spring.set_target(7.0);
/// for _ in 0..180 {
///     spring.step(Duration::from_millis(16));
/// }
/// assert_eq!(spring.value(), 7.0);
/// assert!(spring.is_at_rest());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SpringInterpolator {
    config: SpringConfig,
    state: SpringState,
    target: f64,
}

impl SpringInterpolator {
    /// A spring resting at `initial`.
    pub fn new(initial: f64, config: SpringConfig) -> Self {
        Self {
            config,
            state: SpringState::at(initial),
            target: initial,
        }
    }

    /// Advance by `dt` and return the new value.
    pub fn step(&mut self, dt: Duration) -> f64 {
        self.state = step_spring(self.state, dt, self.target, &self.config);
        self.state.current
    }

    /// Redirect towards `target`. Velocity is kept so the motion bends
    /// instead of restarting.
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    /// Place the spring at `value`, at rest.
    pub fn jump_to(&mut self, value: f64) {
        self.state = SpringState::at(value);
        self.target = value;
    }

    pub fn value(&self) -> f64 {
        self.state.current
    }

    pub fn velocity(&self) -> f64 {
        self.state.velocity
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn state(&self) -> SpringState {
        self.state
    }

    pub fn is_at_rest(&self) -> bool {
        self.state.is_at_rest(self.target, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    #[test]
    fn test_default_config() {
        let config = SpringConfig::default();
        assert_eq!(config.tension, 120.0);
        assert_eq!(config.friction, 20.0);
        assert_eq!(config.mass, 1.0);
        assert!(config.validate().is_ok());
        let bad = SpringConfig {
            mass: 0.0,
            ..config
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_zero_dt_is_identity() {
        let state = SpringState {
            current: 1.0,
            velocity: 2.0,
        };
        assert_eq!(
            step_spring(state, Duration::ZERO, 5.0, &SpringConfig::default()),
            state
        );
    }

    #[test]
    fn test_moves_towards_target() {
        let config = SpringConfig::default();
        let next = step_spring(SpringState::at(0.0), FRAME, 10.0, &config);
        assert!(next.current > 0.0 && next.current < 10.0);
        assert!(next.velocity > 0.0);
    }

    #[test]
    fn test_long_gap_is_capped() {
        let config = SpringConfig::default();
        let long = step_spring(SpringState::at(0.0), Duration::from_secs(5), 10.0, &config);
        let capped = step_spring(SpringState::at(0.0), MAX_FRAME, 10.0, &config);
        assert_eq!(long, capped);
    }

    #[test]
    fn test_retarget_keeps_velocity() {
        let mut spring = SpringInterpolator::new(0.0, SpringConfig::default());
        spring.set_target(10.0);
        spring.step(FRAME);
        spring.step(FRAME);
        let velocity = spring.velocity();
        assert!(velocity > 0.0);

        spring.set_target(-10.0);
        assert_eq!(spring.velocity(), velocity);
        // Still moving up for a moment before turning around.
        let before = spring.value();
        assert!(spring.step(Duration::from_millis(1)) > before);
    }

    #[test]
    fn test_rest_snaps_to_target() {
        let mut spring = SpringInterpolator::new(0.0, SpringConfig::default());
        spring.set_target(3.0);
        for _ in 0..300 {
            spring.step(FRAME);
        }
        assert_eq!(spring.value(), 3.0);
        assert_eq!(spring.velocity(), 0.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// From rest the distance to the target never grows, overshoot stays
        /// under 1% of the starting distance, and the spring settles.
        #[test]
        fn converges_without_large_overshoot(
            start in -1000.0f64..1000.0,
            target in -1000.0f64..1000.0,
            frame_ms in 1u64..64,
        ) {
            let config = SpringConfig::default();
            let initial = (start - target).abs();
            let mut state = SpringState::at(start);
            let dt = Duration::from_millis(frame_ms);

            let mut elapsed = Duration::ZERO;
            while elapsed < Duration::from_secs(3) {
                state = step_spring(state, dt, target, &config);
                let error = state.current - target;
                prop_assert!(error.abs() <= initial + 1e-9);
                if (start - target).signum() != error.signum() && error != 0.0 {
                    prop_assert!(error.abs() <= initial * 0.01 + 1e-9);
                }
                elapsed += dt;
            }
            prop_assert!(state.is_at_rest(target, &config));
        }
    }
}
