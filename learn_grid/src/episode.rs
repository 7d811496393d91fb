use crate::agents::{Agent, QLearningAgent};
use crate::config::TrainingConfig;
use crate::env::{Environment, Step};
use crate::grid::{Action, GridWorld, Position};
use std::thread;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EpisodeOptions {
    /// Feed transitions back to the agent.
    pub learn: bool,
    /// Stop after this many steps even if the environment never finishes.
    pub max_steps: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeSummary {
    pub steps: usize,
    pub total_reward: f64,
    pub truncated: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainingReport {
    pub episodes: usize,
    pub total_steps: usize,
    pub rewards: Vec<f64>,
    pub final_epsilon: f64,
}

impl TrainingReport {
    /// Mean reward of the last `window` episodes.
    pub fn recent_mean_reward(&self, window: usize) -> f64 {
        let tail = &self.rewards[self.rewards.len().saturating_sub(window)..];
        if tail.is_empty() {
            0.0
        } else {
            tail.iter().sum::<f64>() / tail.len() as f64
        }
    }
}

/// Runs one episode from `reset()` until the environment reports done.
///
/// `on_step` sees the environment and agent after every transition.
pub fn run_episode<E, G, F>(
    env: &mut E,
    agent: &mut G,
    options: EpisodeOptions,
    mut on_step: F,
) -> EpisodeSummary
where
    E: Environment,
    G: Agent<E::Observation, E::Action>,
    F: FnMut(&E, &G, E::Action, &Step<E::Observation>),
{
    let mut state = env.reset();
    let mut summary = EpisodeSummary {
        steps: 0,
        total_reward: 0.0,
        truncated: false,
    };
    loop {
        let action = agent.select_action(&state);
        let step = env.step(action);
        if options.learn {
            agent.observe(&state, action, &step);
        }
        summary.steps += 1;
        summary.total_reward += step.reward;
        on_step(env, agent, action, &step);
        if step.is_done() {
            summary.truncated = step.truncated;
            break;
        }
        if options.max_steps.is_some_and(|cap| summary.steps >= cap) {
            tracing::warn!(steps = summary.steps, agent = agent.name(), "episode hit the step cap");
            summary.truncated = true;
            break;
        }
        state = step.observation;
    }
    if options.learn {
        agent.end_episode();
    }
    summary
}

pub(crate) fn pause(ms: u64) {
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}

fn print_grid_and_values(env: &GridWorld, agent: &QLearningAgent, state: Position) {
    env.draw();
    println!("{}", agent.q_values_report(state));
}

/// Trains `agent` for `config.episodes` episodes.
pub fn train(
    env: &mut GridWorld,
    agent: &mut QLearningAgent,
    config: &TrainingConfig,
) -> TrainingReport {
    let mut report = TrainingReport {
        episodes: config.episodes,
        total_steps: 0,
        rewards: Vec::with_capacity(config.episodes),
        final_epsilon: agent.epsilon(),
    };
    for episode in 1..=config.episodes {
        let reported = episode % config.report_every == 0;
        let show = config.verbose && reported;
        if show {
            println!("\nEpisode {episode} visualization:");
        }
        let options = EpisodeOptions {
            learn: true,
            max_steps: Some(config.max_episode_steps),
        };
        let summary = run_episode(env, agent, options, |env, agent, action, step| {
            tracing::trace!(episode, %action, state = %step.observation, reward = step.reward);
            if show {
                println!("\nAction: {action}, Reward: {}", step.reward);
                print_grid_and_values(env, agent, step.observation);
                pause(config.render_delay_ms);
            }
        });
        report.total_steps += summary.steps;
        report.rewards.push(summary.total_reward);
        if reported {
            tracing::info!(
                epsilon = agent.epsilon(),
                mean_reward = report.recent_mean_reward(config.report_every),
                "Episode {episode}/{} completed",
                config.episodes
            );
        }
    }
    report.final_epsilon = agent.epsilon();
    report
}

/// Runs one greedy episode without learning, printing every step when `render` is set.
///
/// The agent's exploration rate is restored afterwards.
pub fn evaluate(
    env: &mut GridWorld,
    agent: &mut QLearningAgent,
    config: &TrainingConfig,
    render: bool,
) -> EpisodeSummary {
    let original_epsilon = agent.set_epsilon(0.0);
    if render {
        println!("\nStarting test episode visualization:");
        env.reset();
        env.draw();
    }
    let options = EpisodeOptions {
        learn: false,
        max_steps: Some(config.max_test_steps),
    };
    let mut step_counter = 0;
    let summary = run_episode(env, agent, options, |env, agent, action, step| {
        step_counter += 1;
        if render {
            println!("\nStep {step_counter}:");
            println!(
                "Action: {action}, New State: {}, Reward: {}",
                step.observation, step.reward
            );
            print_grid_and_values(env, agent, step.observation);
            pause(config.test_delay_ms);
        }
    });
    agent.set_epsilon(original_epsilon);
    if render {
        println!("\nEpisode finished with total reward: {}", summary.total_reward);
    }
    summary
}

/// Best known action for every cell of the grid.
pub fn learned_policy(env: &GridWorld, agent: &QLearningAgent) -> Vec<(Position, Action)> {
    env.positions()
        .into_iter()
        .map(|state| (state, agent.best_action(state)))
        .collect()
}

pub fn print_policy(policy: &[(Position, Action)]) {
    println!("\nLearned policy:");
    for (state, action) in policy {
        println!("At state {state}, best action: {action}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::RandomAgent;
    use crate::config::{GridConfig, LearnerConfig};

    fn quiet_training(episodes: usize) -> TrainingConfig {
        TrainingConfig {
            episodes,
            render_delay_ms: 0,
            test_delay_ms: 0,
            ..TrainingConfig::default()
        }
    }

    fn seeded_agent() -> QLearningAgent {
        QLearningAgent::new(&LearnerConfig {
            seed: Some(42),
            ..LearnerConfig::default()
        })
    }

    #[test]
    fn random_walk_reaches_goal() {
        let mut env = GridWorld::default();
        let mut agent = RandomAgent::new(Action::ALL.to_vec(), Some(9)).unwrap();
        let mut last = None;
        let summary = run_episode(&mut env, &mut agent, EpisodeOptions::default(), |_, _, _, step| {
            last = Some(step.observation);
        });
        assert_eq!(last, Some(Position::new(4, 4)));
        assert!(!summary.truncated);
        // Every step costs 1 except the final +10.
        assert_eq!(summary.total_reward, 10.0 - (summary.steps as f64 - 1.0));
    }

    #[test]
    fn step_cap_truncates() {
        let mut env = GridWorld::default();
        let mut agent = RandomAgent::new(vec![Action::Up], None).unwrap();
        let options = EpisodeOptions {
            learn: false,
            max_steps: Some(25),
        };
        let summary = run_episode(&mut env, &mut agent, options, |_, _, _, _| {});
        assert_eq!(summary.steps, 25);
        assert!(summary.truncated);
        assert_eq!(summary.total_reward, -25.0);
    }

    #[test]
    fn training_reaches_goal_greedily() {
        let mut env = GridWorld::default();
        let mut agent = seeded_agent();
        let report = train(&mut env, &mut agent, &quiet_training(1_000));
        assert_eq!(report.rewards.len(), 1_000);
        assert!(report.recent_mean_reward(100) > 0.0);

        let summary = evaluate(&mut env, &mut agent, &quiet_training(1), false);
        assert!(!summary.truncated);
        // Eight moves is the shortest route from (0, 0) to (4, 4).
        assert!(summary.steps >= 8 && summary.steps <= 10);
        assert_eq!(summary.total_reward, 11.0 - summary.steps as f64);
        assert_eq!(agent.epsilon(), 0.1);
    }

    #[test]
    fn training_caps_episodes_that_never_finish() {
        let grid = GridConfig {
            step_reward: 0.0,
            ..GridConfig::default()
        };
        let mut env = GridWorld::new(&grid).unwrap();
        let mut agent = QLearningAgent::new(&LearnerConfig {
            epsilon: 0.0,
            seed: Some(1),
            ..LearnerConfig::default()
        });
        let config = TrainingConfig {
            max_episode_steps: 50,
            ..quiet_training(2)
        };
        // Greedy with no step penalty keeps walking into the top wall.
        let report = train(&mut env, &mut agent, &config);
        assert_eq!(report.total_steps, 100);
        assert_eq!(report.rewards, vec![0.0, 0.0]);
    }

    #[test]
    fn verbose_training_decays_epsilon_per_episode() {
        let mut env = GridWorld::default();
        let mut agent = QLearningAgent::new(&LearnerConfig {
            epsilon: 0.5,
            epsilon_decay: 0.5,
            min_epsilon: 0.1,
            seed: Some(3),
            ..LearnerConfig::default()
        });
        let config = TrainingConfig {
            verbose: true,
            report_every: 1,
            max_episode_steps: 200,
            ..quiet_training(2)
        };
        let report = train(&mut env, &mut agent, &config);
        assert_eq!(report.final_epsilon, 0.125);
        assert_eq!(agent.epsilon(), 0.125);

        let report = train(&mut env, &mut agent, &config);
        // 0.0625 would fall below the floor.
        assert_eq!(report.final_epsilon, 0.1);
        assert_eq!(report.rewards.len(), 2);
    }

    #[test]
    fn evaluation_does_not_learn() {
        let mut env = GridWorld::default();
        let mut agent = seeded_agent();
        let config = TrainingConfig {
            max_test_steps: 10,
            ..quiet_training(1)
        };
        let summary = evaluate(&mut env, &mut agent, &config, false);
        // An untrained greedy agent keeps bumping into the top wall.
        assert!(summary.truncated);
        assert!(agent.q_table().is_empty());
    }

    #[test]
    fn policy_covers_every_cell() {
        let env = GridWorld::default();
        let mut agent = seeded_agent();
        let policy = learned_policy(&env, &agent);
        assert_eq!(policy.len(), 25);
        assert_eq!(policy[0], (Position::new(0, 0), Action::Up));
        assert_eq!(policy[24].0, Position::new(4, 4));

        let mut env = env;
        train(&mut env, &mut agent, &quiet_training(1_000));
        let policy = learned_policy(&env, &agent);
        let at_start = policy[0].1;
        assert!(matches!(at_start, Action::Down | Action::Right));
    }
}
