//! Tabular reinforcement learning on a small grid world.
//!
//! The programs here mirror the classic tutorial sequence: a random walk
//! baseline, epsilon-greedy Q-learning with a greedy test episode and the
//! learned policy, and a random-action loop over a cart-pole task.

use crate::agents::{QLearningAgent, RandomAgent};
use crate::cartpole::{CartPole, CartPoleConfig, Push};
use crate::config::Config;
use crate::env::Environment;
use crate::episode::{EpisodeOptions, EpisodeSummary, TrainingReport};
use crate::error::Result;
use crate::grid::{Action, GridWorld};
use crate::q_table::QTable;
use std::path::{Path, PathBuf};

pub mod agents;
pub mod cartpole;
pub mod config;
pub mod env;
pub mod episode;
pub mod error;
pub mod grid;
pub mod q_table;

pub use error::Error;

/// Result of [`train_q_agent`].
#[derive(Debug)]
pub struct TrainingOutcome {
    pub report: TrainingReport,
    pub test: EpisodeSummary,
    pub q_table: QTable,
    /// Pickle and JSON archive paths when the table was saved.
    pub saved: Option<(PathBuf, PathBuf)>,
}

/// One episode of uniformly random moves, printing every transition.
pub fn random_walk(config: &Config) -> Result<EpisodeSummary> {
    config.validate()?;
    let mut env = GridWorld::new(&config.grid)?;
    let mut agent = RandomAgent::new(Action::ALL.to_vec(), config.learner.seed)?;
    println!("Starting episode...");
    let summary = episode::run_episode(
        &mut env,
        &mut agent,
        EpisodeOptions::default(),
        |_, _, action, step| {
            println!(
                "Action: {action}, New State: {}, Reward: {}",
                step.observation, step.reward
            );
        },
    );
    println!("Episode finished with total reward: {}", summary.total_reward);
    Ok(summary)
}

/// Trains a Q-learning agent, runs a greedy test episode and prints the learned policy.
///
/// When `save_dir` is given the table is archived there afterwards.
pub fn train_q_agent(config: &Config, save_dir: Option<&Path>) -> Result<TrainingOutcome> {
    config.validate()?;
    let mut env = GridWorld::new(&config.grid)?;
    let mut agent = QLearningAgent::new(&config.learner);
    tracing::info!(
        episodes = config.training.episodes,
        alpha = config.learner.alpha,
        gamma = config.learner.gamma,
        epsilon = config.learner.epsilon,
        "training Q-learning agent"
    );
    let report = episode::train(&mut env, &mut agent, &config.training);
    tracing::info!(
        total_steps = report.total_steps,
        states = agent.q_table().len(),
        "training finished"
    );

    let test = episode::evaluate(&mut env, &mut agent, &config.training, true);
    episode::print_policy(&episode::learned_policy(&env, &agent));

    let saved = save_dir
        .map(|dir| q_table::q_table_to_disk(dir, agent.q_table()))
        .transpose()?;
    Ok(TrainingOutcome {
        report,
        test,
        q_table: agent.into_q_table(),
        saved,
    })
}

/// Greedy test episode and policy from an archived Q-table.
pub fn play_saved(config: &Config, q_file: &Path) -> Result<EpisodeSummary> {
    config.validate()?;
    let q = q_table::q_table_from_disk(q_file)?;
    tracing::info!(file = %q_file.display(), entries = q.len(), "loaded Q-table");
    let mut env = GridWorld::new(&config.grid)?;
    let mut agent = QLearningAgent::with_q_table(q, &config.learner);
    let summary = episode::evaluate(&mut env, &mut agent, &config.training, true);
    episode::print_policy(&episode::learned_policy(&env, &agent));
    Ok(summary)
}

/// Drives the cart-pole with random pushes, rendering each step.
pub fn run_cartpole(
    episodes: usize,
    seed: Option<u64>,
    delay_ms: u64,
) -> Result<Vec<EpisodeSummary>> {
    let mut env = CartPole::new(CartPoleConfig::default(), seed);
    let mut agent = RandomAgent::new(Push::ALL.to_vec(), seed.map(|s| s.wrapping_add(1)))?;
    let mut summaries = Vec::with_capacity(episodes);
    for episode in 0..episodes {
        let summary = episode::run_episode(
            &mut env,
            &mut agent,
            EpisodeOptions::default(),
            |env, _, _, _| {
                env.draw();
                episode::pause(delay_ms);
            },
        );
        tracing::info!(
            episode,
            steps = summary.steps,
            reward = summary.total_reward,
            truncated = summary.truncated,
            "cart-pole episode finished"
        );
        summaries.push(summary);
    }
    env.close();
    Ok(summaries)
}
