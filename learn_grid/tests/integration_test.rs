use learn_grid::config::{Config, GridConfig, LearnerConfig, TrainingConfig};
use learn_grid::env::Environment;
use learn_grid::grid::{Action, GridWorld, Orientation, Position};
use learn_grid::q_table::q_table_from_disk;

fn quiet(episodes: usize, seed: u64) -> Config {
    Config {
        learner: LearnerConfig {
            seed: Some(seed),
            ..LearnerConfig::default()
        },
        training: TrainingConfig {
            episodes,
            render_delay_ms: 0,
            test_delay_ms: 0,
            ..TrainingConfig::default()
        },
        ..Config::default()
    }
}

#[test]
fn random_walk_program() {
    let summary = learn_grid::random_walk(&quiet(1, 3)).unwrap();
    assert!(summary.steps >= 8);
    assert_eq!(summary.total_reward, 11.0 - summary.steps as f64);
}

#[test]
fn cartesian_random_walk_program() {
    let mut config = quiet(1, 4);
    config.grid.orientation = Orientation::Cartesian;
    let summary = learn_grid::random_walk(&config).unwrap();
    assert!(!summary.truncated);
}

#[test]
fn train_save_and_replay() {
    let dir = tempfile::tempdir().unwrap();
    let config = quiet(1_000, 17);
    let outcome = learn_grid::train_q_agent(&config, Some(dir.path())).unwrap();
    assert_eq!(outcome.report.rewards.len(), 1_000);
    assert!(!outcome.test.truncated);

    let (pickle, json) = outcome.saved.expect("table was saved");
    let from_pickle = q_table_from_disk(&pickle).unwrap();
    let from_json = q_table_from_disk(&json).unwrap();
    assert_eq!(from_pickle.len(), outcome.q_table.len());
    assert_eq!(from_json.len(), outcome.q_table.len());
    let start = Position::new(0, 0);
    assert_eq!(from_pickle.best_action(start), outcome.q_table.best_action(start));

    let replay = learn_grid::play_saved(&config, &pickle).unwrap();
    assert_eq!(replay, outcome.test);
}

#[test]
fn invalid_config_is_rejected_before_running() {
    let mut config = quiet(10, 1);
    config.learner.gamma = 2.0;
    assert!(learn_grid::train_q_agent(&config, None).is_err());
    assert!(learn_grid::random_walk(&config).is_err());
}

#[test]
fn cartpole_program_runs_to_completion() {
    let summaries = learn_grid::run_cartpole(3, Some(8), 0).unwrap();
    assert_eq!(summaries.len(), 3);
    for summary in &summaries {
        assert!(summary.steps > 0 && summary.steps <= 500);
        assert_eq!(summary.total_reward, summary.steps as f64);
    }
    // Same seed, same pushes and resets.
    assert_eq!(learn_grid::run_cartpole(3, Some(8), 0).unwrap(), summaries);
}

#[test]
fn custom_goal_and_rewards() {
    let grid = GridConfig {
        width: 3,
        height: 3,
        goal: Some(Position::new(0, 2)),
        goal_reward: 1.0,
        step_reward: 0.0,
        ..GridConfig::default()
    };
    let mut env = GridWorld::new(&grid).unwrap();
    env.reset();
    assert_eq!(env.step(Action::Right).reward, 0.0);
    let last = env.step(Action::Right);
    assert!(last.terminated);
    assert_eq!(last.reward, 1.0);
}
