use crate::error::{Error, Result};
use crate::grid::{Orientation, Position};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const GRID_SIZE: usize = 5;
pub const NUM_EPISODES: usize = 1_000;
pub const REPORT_EVERY: usize = 100;

pub const LEARNING_RATE: f64 = 0.1;
pub const DISCOUNT_RATE: f64 = 0.9;
pub const EXPLORATION_RATE: f64 = 0.1;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid: GridConfig,
    pub learner: LearnerConfig,
    pub training: TrainingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
    pub start: Position,
    /// Defaults to the corner opposite the origin.
    pub goal: Option<Position>,
    pub orientation: Orientation,
    pub step_reward: f64,
    pub goal_reward: f64,
    pub max_steps: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    pub alpha: f64,
    pub gamma: f64,
    pub epsilon: f64,
    /// Multiplied into epsilon after every training episode.
    pub epsilon_decay: f64,
    pub min_epsilon: f64,
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub episodes: usize,
    pub report_every: usize,
    /// Render every step of the reported episodes.
    pub verbose: bool,
    pub render_delay_ms: u64,
    pub test_delay_ms: u64,
    /// Hard cap on each training episode.
    pub max_episode_steps: usize,
    /// Hard cap on the greedy test episode.
    pub max_test_steps: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            width: GRID_SIZE,
            height: GRID_SIZE,
            start: Position::new(0, 0),
            goal: None,
            orientation: Orientation::Matrix,
            step_reward: -1.0,
            goal_reward: 10.0,
            max_steps: None,
        }
    }
}

impl Default for LearnerConfig {
    fn default() -> Self {
        LearnerConfig {
            alpha: LEARNING_RATE,
            gamma: DISCOUNT_RATE,
            epsilon: EXPLORATION_RATE,
            epsilon_decay: 1.0,
            min_epsilon: 0.0,
            seed: None,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            episodes: NUM_EPISODES,
            report_every: REPORT_EVERY,
            verbose: false,
            render_delay_ms: 500,
            test_delay_ms: 800,
            max_episode_steps: 10_000,
            max_test_steps: 1_000,
        }
    }
}

impl GridConfig {
    pub fn goal(&self) -> Position {
        self.goal.unwrap_or_else(|| match self.orientation {
            Orientation::Matrix => {
                Position::new(self.height.saturating_sub(1), self.width.saturating_sub(1))
            }
            Orientation::Cartesian => {
                Position::new(self.width.saturating_sub(1), self.height.saturating_sub(1))
            }
        })
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config> {
        let file = File::open(path)
            .map_err(|e| Error::io(format!("open config {}", path.display()), e))?;
        let config: Config = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let l = &self.learner;
        if !(l.alpha > 0.0 && l.alpha <= 1.0) {
            return Err(Error::config(format!("alpha must be in (0, 1], got {}", l.alpha)));
        }
        if !(0.0..=1.0).contains(&l.gamma) {
            return Err(Error::config(format!("gamma must be in [0, 1], got {}", l.gamma)));
        }
        if !(0.0..=1.0).contains(&l.epsilon) {
            return Err(Error::config(format!("epsilon must be in [0, 1], got {}", l.epsilon)));
        }
        if !(l.epsilon_decay > 0.0 && l.epsilon_decay <= 1.0) {
            return Err(Error::config(format!(
                "epsilon_decay must be in (0, 1], got {}",
                l.epsilon_decay
            )));
        }
        if !(0.0..=1.0).contains(&l.min_epsilon) {
            return Err(Error::config(format!(
                "min_epsilon must be in [0, 1], got {}",
                l.min_epsilon
            )));
        }
        if self.training.episodes == 0 {
            return Err(Error::config("episodes must be positive"));
        }
        if self.training.report_every == 0 {
            return Err(Error::config("report_every must be positive"));
        }
        if self.training.max_episode_steps == 0 {
            return Err(Error::config("max_episode_steps must be positive"));
        }
        if self.training.max_test_steps == 0 {
            return Err(Error::config("max_test_steps must be positive"));
        }
        if self.grid.max_steps == Some(0) {
            return Err(Error::config("max_steps must be positive when set"));
        }
        // Geometry errors come from the grid itself.
        crate::grid::GridWorld::new(&self.grid).map(|_| ())
    }
}
