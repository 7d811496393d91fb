use crate::config::GridConfig;
use crate::env::{Environment, Step};
use crate::error::{Error, Result};
use itertools::Itertools;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
}

/// How actions map onto the two coordinates of a [`Position`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// `x` is the row (top to bottom), `y` the column. Up decreases `x`.
    #[default]
    Matrix,
    /// `x` is horizontal, `y` vertical. Up increases `y`.
    Cartesian,
}

#[derive(Debug, Clone)]
pub struct GridWorld {
    width: usize,
    height: usize,
    start: Position,
    goal: Position,
    orientation: Orientation,
    step_reward: f64,
    goal_reward: f64,
    max_steps: Option<usize>,
    state: Position,
    steps: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl Action {
    /// Fixed order used for tie-breaking between equally valued actions.
    pub const ALL: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Up => "up",
            Action::Down => "down",
            Action::Left => "left",
            Action::Right => "right",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown action '{s}' (expected up, down, left or right)"))
    }
}

impl FromStr for Orientation {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "matrix" | "row-col" => Ok(Orientation::Matrix),
            "cartesian" | "xy" => Ok(Orientation::Cartesian),
            other => Err(format!(
                "unknown orientation '{other}' (expected matrix or cartesian)"
            )),
        }
    }
}

impl Default for GridWorld {
    fn default() -> Self {
        GridWorld::unchecked(&GridConfig::default())
    }
}

impl GridWorld {
    pub fn new(config: &GridConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(Error::EmptyGrid {
                width: config.width,
                height: config.height,
            });
        }
        let grid = GridWorld::unchecked(config);
        for (what, position) in [("start", grid.start), ("goal", grid.goal)] {
            if !grid.contains(position) {
                return Err(Error::OutOfBounds {
                    what,
                    position,
                    width: grid.width,
                    height: grid.height,
                });
            }
        }
        Ok(grid)
    }

    fn unchecked(config: &GridConfig) -> Self {
        GridWorld {
            width: config.width,
            height: config.height,
            start: config.start,
            goal: config.goal(),
            orientation: config.orientation,
            step_reward: config.step_reward,
            goal_reward: config.goal_reward,
            max_steps: config.max_steps,
            state: config.start,
            steps: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }
    pub fn start(&self) -> Position {
        self.start
    }
    pub fn goal(&self) -> Position {
        self.goal
    }
    pub fn state(&self) -> Position {
        self.state
    }
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Upper bounds (exclusive) for `x` and `y`.
    fn limits(&self) -> (usize, usize) {
        match self.orientation {
            Orientation::Matrix => (self.height, self.width),
            Orientation::Cartesian => (self.width, self.height),
        }
    }

    pub fn contains(&self, p: Position) -> bool {
        let (x_max, y_max) = self.limits();
        p.x < x_max && p.y < y_max
    }

    /// Where `action` leads from `from`; moves off the edge leave the agent in place.
    pub fn moved(&self, from: Position, action: Action) -> Position {
        let (x_max, y_max) = self.limits();
        let Position { mut x, mut y } = from;
        match (self.orientation, action) {
            (Orientation::Matrix, Action::Up) => x = x.saturating_sub(1),
            (Orientation::Matrix, Action::Down) => x = (x + 1).min(x_max - 1),
            (Orientation::Matrix, Action::Left) => y = y.saturating_sub(1),
            (Orientation::Matrix, Action::Right) => y = (y + 1).min(y_max - 1),
            (Orientation::Cartesian, Action::Up) => y = (y + 1).min(y_max - 1),
            (Orientation::Cartesian, Action::Down) => y = y.saturating_sub(1),
            (Orientation::Cartesian, Action::Right) => x = (x + 1).min(x_max - 1),
            (Orientation::Cartesian, Action::Left) => x = x.saturating_sub(1),
        }
        Position { x, y }
    }

    /// Every cell, `x` outer and `y` inner.
    pub fn positions(&self) -> Vec<Position> {
        let (x_max, y_max) = self.limits();
        (0..x_max)
            .cartesian_product(0..y_max)
            .map(|(x, y)| Position::new(x, y))
            .collect()
    }

    /// Screen cell (row, column) of a position; row 0 is drawn at the top.
    fn screen_index(&self, p: Position) -> [usize; 2] {
        match self.orientation {
            Orientation::Matrix => [p.x, p.y],
            Orientation::Cartesian => [self.height - 1 - p.y, p.x],
        }
    }

    fn cells(&self) -> Array2<&'static str> {
        let mut cells = Array::from_elem((self.height, self.width), "[ ]");
        cells[self.screen_index(self.goal)] = "[G]";
        cells[self.screen_index(self.state)] = "[A]";
        cells
    }
}

impl fmt::Display for GridWorld {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let border = format!("+{}", "---+".repeat(self.width));
        writeln!(f, "{border}")?;
        for row in self.cells().rows() {
            writeln!(f, "| {} |", row.iter().join(" "))?;
            writeln!(f, "{border}")?;
        }
        Ok(())
    }
}

impl Environment for GridWorld {
    type Observation = Position;
    type Action = Action;

    fn reset(&mut self) -> Position {
        self.state = self.start;
        self.steps = 0;
        self.state
    }

    fn step(&mut self, action: Action) -> Step<Position> {
        self.state = self.moved(self.state, action);
        self.steps += 1;
        let terminated = self.state == self.goal;
        let reward = if terminated {
            self.goal_reward
        } else {
            self.step_reward
        };
        let truncated = !terminated && self.max_steps.is_some_and(|limit| self.steps >= limit);
        Step {
            observation: self.state,
            reward,
            terminated,
            truncated,
        }
    }

    fn render(&self) -> String {
        self.to_string()
    }
}
