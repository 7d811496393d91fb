//! Classic cart-pole balancing task.
//!
//! A pole is hinged to a cart moving along a frictionless track. Each step
//! pushes the cart left or right with a fixed force; the episode ends when
//! the pole tilts past the angle threshold or the cart leaves the track.

use crate::env::{Environment, Step};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

const TRACK_WIDTH: usize = 41;

/// Physical constants and episode limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartPoleConfig {
    pub gravity: f64,
    pub cart_mass: f64,
    pub pole_mass: f64,
    /// Half the pole length in meters
    pub half_length: f64,
    pub force_magnitude: f64,
    /// Seconds between state updates
    pub tau: f64,
    /// Failure angle in radians
    pub theta_threshold: f64,
    /// Failure distance from the track center in meters
    pub x_threshold: f64,
    pub max_steps: usize,
}

impl Default for CartPoleConfig {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            cart_mass: 1.0,
            pole_mass: 0.1,
            half_length: 0.5,
            force_magnitude: 10.0,
            tau: 0.02,
            theta_threshold: 12.0_f64.to_radians(),
            x_threshold: 2.4,
            max_steps: 500,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Push {
    Left = 0,
    Right = 1,
}

impl Push {
    pub const ALL: [Push; 2] = [Push::Left, Push::Right];
}

impl fmt::Display for Push {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Push::Left => f.write_str("left"),
            Push::Right => f.write_str("right"),
        }
    }
}

/// Cart position and velocity, pole angle and angular velocity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CartPoleState {
    pub x: f64,
    pub x_dot: f64,
    pub theta: f64,
    pub theta_dot: f64,
}

impl CartPoleState {
    pub fn to_array(self) -> [f64; 4] {
        [self.x, self.x_dot, self.theta, self.theta_dot]
    }
}

pub struct CartPole {
    config: CartPoleConfig,
    state: CartPoleState,
    steps: usize,
    done: bool,
    rng: StdRng,
}

impl CartPole {
    pub fn new(config: CartPoleConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        CartPole {
            config,
            state: CartPoleState::default(),
            steps: 0,
            done: false,
            rng,
        }
    }

    pub fn state(&self) -> CartPoleState {
        self.state
    }
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn close(&mut self) {
        tracing::debug!(steps = self.steps, "cart-pole closed");
    }

    fn failed(&self) -> bool {
        let s = &self.state;
        s.x.abs() > self.config.x_threshold || s.theta.abs() > self.config.theta_threshold
    }
}

impl Environment for CartPole {
    type Observation = CartPoleState;
    type Action = Push;

    fn reset(&mut self) -> CartPoleState {
        let [x, x_dot, theta, theta_dot] = [(); 4].map(|_| self.rng.gen_range(-0.05..0.05));
        self.state = CartPoleState {
            x,
            x_dot,
            theta,
            theta_dot,
        };
        self.steps = 0;
        self.done = false;
        self.state
    }

    fn step(&mut self, action: Push) -> Step<CartPoleState> {
        if self.done {
            tracing::warn!("step called on a finished cart-pole episode; call reset first");
        }
        let c = &self.config;
        let total_mass = c.cart_mass + c.pole_mass;
        let pole_mass_length = c.pole_mass * c.half_length;
        let force = match action {
            Push::Left => -c.force_magnitude,
            Push::Right => c.force_magnitude,
        };

        let CartPoleState {
            x,
            x_dot,
            theta,
            theta_dot,
        } = self.state;
        let (sin_theta, cos_theta) = theta.sin_cos();
        let temp = (force + pole_mass_length * theta_dot * theta_dot * sin_theta) / total_mass;
        let theta_acc = (c.gravity * sin_theta - cos_theta * temp)
            / (c.half_length * (4.0 / 3.0 - c.pole_mass * cos_theta * cos_theta / total_mass));
        let x_acc = temp - pole_mass_length * theta_acc * cos_theta / total_mass;

        self.state = CartPoleState {
            x: x + c.tau * x_dot,
            x_dot: x_dot + c.tau * x_acc,
            theta: theta + c.tau * theta_dot,
            theta_dot: theta_dot + c.tau * theta_acc,
        };
        self.steps += 1;

        let terminated = self.failed();
        let truncated = !terminated && self.steps >= self.config.max_steps;
        self.done = terminated || truncated;
        Step {
            observation: self.state,
            reward: 1.0,
            terminated,
            truncated,
        }
    }

    fn render(&self) -> String {
        let limit = self.config.x_threshold;
        let ratio = ((self.state.x + limit) / (2.0 * limit)).clamp(0.0, 1.0);
        let cart = (ratio * (TRACK_WIDTH - 1) as f64).round() as usize;
        let track: String = (0..TRACK_WIDTH)
            .map(|i| if i == cart { '#' } else { '-' })
            .collect();
        format!(
            "|{track}| x={:+.3} theta={:+.1}deg step={}",
            self.state.x,
            self.state.theta.to_degrees(),
            self.steps
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_is_small_and_seeded() {
        let mut a = CartPole::new(CartPoleConfig::default(), Some(11));
        let mut b = CartPole::new(CartPoleConfig::default(), Some(11));
        let sa = a.reset();
        assert_eq!(sa, b.reset());
        assert!(sa.to_array().iter().all(|v| v.abs() < 0.05));
    }

    #[test]
    fn push_right_accelerates_cart_right() {
        let mut env = CartPole::new(CartPoleConfig::default(), Some(1));
        env.reset();
        env.state = CartPoleState::default();
        env.step(Push::Right);
        let s = env.step(Push::Right).observation;
        assert!(s.x_dot > 0.0);
        assert!(s.x > 0.0);
        // The pole lags behind the cart.
        assert!(s.theta_dot < 0.0);
    }

    #[test]
    fn single_step_matches_reference_dynamics() {
        let mut env = CartPole::new(CartPoleConfig::default(), None);
        env.state = CartPoleState::default();
        let s = env.step(Push::Right).observation;
        // temp = 10 / 1.1; x_acc = temp - 0.05 * theta_acc / 1.1
        let temp = 10.0 / 1.1;
        let theta_acc = -temp / (0.5 * (4.0 / 3.0 - 0.1 / 1.1));
        let x_acc = temp - 0.05 * theta_acc / 1.1;
        assert_eq!(s.x, 0.0);
        assert!((s.x_dot - 0.02 * x_acc).abs() < 1e-12);
        assert!((s.theta_dot - 0.02 * theta_acc).abs() < 1e-12);
    }

    #[test]
    fn constant_push_terminates_with_unit_rewards() {
        let mut env = CartPole::new(CartPoleConfig::default(), Some(5));
        env.reset();
        let mut total = 0.0;
        let last = loop {
            let step = env.step(Push::Left);
            total += step.reward;
            if step.is_done() {
                break step;
            }
        };
        assert!(last.terminated);
        assert!(!last.truncated);
        assert_eq!(total, env.steps() as f64);
        assert!(env.steps() < 100);
    }

    #[test]
    fn step_limit_truncates() {
        let config = CartPoleConfig {
            max_steps: 3,
            ..CartPoleConfig::default()
        };
        let mut env = CartPole::new(config, Some(2));
        env.reset();
        env.state = CartPoleState::default();
        let steps: Vec<_> = Push::ALL
            .into_iter()
            .cycle()
            .take(3)
            .map(|p| env.step(p))
            .collect();
        assert!(steps[2].truncated);
        assert!(!steps[1].is_done());
    }

    #[test]
    fn render_places_cart_on_track() {
        let mut env = CartPole::new(CartPoleConfig::default(), None);
        env.state = CartPoleState::default();
        let line = env.render();
        assert!(line.starts_with(&format!("|{}#{}|", "-".repeat(20), "-".repeat(20))));
        env.state.x = 10.0;
        assert!(env.render().starts_with(&format!("|{}#|", "-".repeat(40))));
    }
}
