use crate::config::LearnerConfig;
use crate::env::Step;
use crate::error::{Error, Result};
use crate::grid::{Action, Position};
use crate::q_table::QTable;
use rand::rngs::StdRng;
use itertools::Itertools;
use rand::{Rng, SeedableRng};

pub trait Agent<S, A> {
    fn name(&self) -> &str;
    fn select_action(&mut self, state: &S) -> A;
    /// Called with every transition the chosen action produced.
    fn observe(&mut self, _state: &S, _action: A, _step: &Step<S>) {}
    fn end_episode(&mut self) {}
}

fn build_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Picks uniformly among a fixed action list, ignoring the state.
#[derive(Debug, Clone)]
pub struct RandomAgent<A> {
    actions: Vec<A>,
    rng: StdRng,
}

impl<A: Copy> RandomAgent<A> {
    pub fn new(actions: Vec<A>, seed: Option<u64>) -> Result<Self> {
        if actions.is_empty() {
            return Err(Error::config("a random agent needs at least one action"));
        }
        Ok(RandomAgent {
            actions,
            rng: build_rng(seed),
        })
    }

    pub fn actions(&self) -> &[A] {
        &self.actions
    }
}

impl<S, A: Copy> Agent<S, A> for RandomAgent<A> {
    fn name(&self) -> &str {
        "random"
    }
    fn select_action(&mut self, _state: &S) -> A {
        self.actions[self.rng.gen_range(0..self.actions.len())]
    }
}

/// Epsilon-greedy learner over a [`QTable`].
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    q_table: QTable,
    epsilon: f64,
    epsilon_decay: f64,
    min_epsilon: f64,
    rng: StdRng,
}

impl QLearningAgent {
    pub fn new(config: &LearnerConfig) -> Self {
        Self::with_q_table(QTable::from(config), config)
    }

    /// Continues learning from an existing table, e.g. one loaded from disk.
    pub fn with_q_table(q_table: QTable, config: &LearnerConfig) -> Self {
        QLearningAgent {
            q_table,
            epsilon: config.epsilon,
            epsilon_decay: config.epsilon_decay,
            min_epsilon: config.min_epsilon,
            rng: build_rng(config.seed),
        }
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }
    pub fn into_q_table(self) -> QTable {
        self.q_table
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Overrides the exploration rate and returns the previous one.
    pub fn set_epsilon(&mut self, epsilon: f64) -> f64 {
        std::mem::replace(&mut self.epsilon, epsilon)
    }

    pub fn best_action(&self, state: Position) -> Action {
        self.q_table.best_action(state)
    }

    pub fn q_values_report(&self, state: Position) -> String {
        let values = self
            .q_table
            .action_values(state)
            .iter()
            .map(|(action, value)| format!("  {action}: {value:.2}"))
            .join("\n");
        format!("Q-values at state {state}:\n{values}")
    }
}

impl Agent<Position, Action> for QLearningAgent {
    fn name(&self) -> &str {
        "q-learning"
    }

    fn select_action(&mut self, state: &Position) -> Action {
        if self.rng.gen::<f64>() < self.epsilon {
            Action::ALL[self.rng.gen_range(0..Action::ALL.len())]
        } else {
            self.q_table.best_action(*state)
        }
    }

    fn observe(&mut self, state: &Position, action: Action, step: &Step<Position>) {
        self.q_table.update(*state, action, step.reward, step.observation);
    }

    fn end_episode(&mut self) {
        self.epsilon = (self.epsilon * self.epsilon_decay).max(self.min_epsilon);
    }
}
