mod common;

use approx::assert_relative_eq;
use common::TestEngine;
use crazyflie_environment::{
    actor_index, CrazyflieEnvironment, CrazyflieEnvironmentConfig, DRONE_SLOT, MARKER_SLOT,
};
use nalgebra::Vector3;

fn config(num_envs: usize, max_episode_length: u32) -> CrazyflieEnvironmentConfig {
    let mut config = CrazyflieEnvironmentConfig::default();
    config.env.num_envs = num_envs;
    config.env.max_episode_length = max_episode_length;
    config
}

fn hover(num_envs: usize) -> Vec<[f64; 4]> {
    vec![[0.0; 4]; num_envs]
}

#[test]
fn episodes_run_to_the_step_cap_and_restart() {
    let num_envs = 4;
    let mut env = CrazyflieEnvironment::new(config(num_envs, 5)).unwrap();
    let mut engine = TestEngine::new(num_envs);
    env.reset(&mut engine).unwrap();

    // Hovering at spawn keeps every environment alive until the cap.
    for _ in 0..3 {
        let outcome = env.step(&hover(num_envs), &mut engine).unwrap();
        assert!(outcome.resets.iter().all(|&r| !r));
    }
    let outcome = env.step(&hover(num_envs), &mut engine).unwrap();
    assert!(outcome.resets.iter().all(|&r| r));

    // The following step consumes every flag and starts fresh episodes.
    let outcome = env.step(&hover(num_envs), &mut engine).unwrap();
    assert!(outcome.resets.iter().all(|&r| !r));
    assert!(env.progress().iter().all(|&p| p == 1));
    assert_eq!(engine.steps_taken, 5);
}

#[test]
fn divergence_terminates_only_the_affected_environment() {
    let num_envs = 3;
    let mut env = CrazyflieEnvironment::new(config(num_envs, 500)).unwrap();
    let mut engine = TestEngine::new(num_envs);
    env.reset(&mut engine).unwrap();

    engine.states[actor_index(2, DRONE_SLOT)].position = Vector3::new(0.0, 0.8, 1.0);
    let outcome = env.step(&hover(num_envs), &mut engine).unwrap();

    assert_eq!(outcome.resets, vec![false, false, true]);
    assert!(outcome.rewards[2] < outcome.rewards[0]);
}

#[test]
fn sinking_below_the_floor_terminates() {
    let num_envs = 2;
    let mut env = CrazyflieEnvironment::new(config(num_envs, 500)).unwrap();
    let mut engine = TestEngine::new(num_envs);
    env.reset(&mut engine).unwrap();

    engine.states[actor_index(0, DRONE_SLOT)].position = Vector3::new(0.0, 0.0, 0.2);
    let outcome = env.step(&hover(num_envs), &mut engine).unwrap();

    assert!(outcome.resets[0]);
    assert!(!outcome.resets[1]);
    // The flag is raised after actuation; hover thrust still reached the engine.
    assert!(engine.last_forces[actor_index(1, DRONE_SLOT)].z > 0.0);
    assert_relative_eq!(engine.last_torques[1].norm(), 0.0, epsilon = 1e-12);
}

#[test]
fn reset_pushes_drone_and_marker_states_into_the_engine() {
    let num_envs = 3;
    let mut env = CrazyflieEnvironment::new(config(num_envs, 500)).unwrap();
    let mut engine = TestEngine::new(num_envs);
    env.reset(&mut engine).unwrap();

    // One write per actor, drones and markers both.
    assert_eq!(engine.written_indices.len(), num_envs * 2);
    for i in 0..num_envs {
        assert_relative_eq!(
            engine.states[actor_index(i, MARKER_SLOT)].position,
            env.target_positions()[i],
            epsilon = 1e-12
        );
        assert_relative_eq!(
            engine.states[actor_index(i, DRONE_SLOT)].position,
            Vector3::new(0.0, 0.0, 1.0),
            epsilon = 1e-12
        );
    }
}

#[test]
fn marker_follows_every_target_draw() {
    let num_envs = 2;
    let mut env = CrazyflieEnvironment::new(config(num_envs, 500)).unwrap();
    let mut engine = TestEngine::new(num_envs);
    env.reset(&mut engine).unwrap();

    // Drive env 0 out of bounds; its reset re-draws the target and the marker
    // write lands in the engine with it.
    engine.states[actor_index(0, DRONE_SLOT)].position = Vector3::new(2.0, 0.0, 1.0);
    env.step(&hover(num_envs), &mut engine).unwrap();
    engine.written_indices.clear();
    env.step(&hover(num_envs), &mut engine).unwrap();

    assert!(engine.written_indices.contains(&actor_index(0, DRONE_SLOT)));
    assert!(engine.written_indices.contains(&actor_index(0, MARKER_SLOT)));
    assert_relative_eq!(
        engine.states[actor_index(0, MARKER_SLOT)].position,
        env.target_positions()[0],
        epsilon = 1e-12
    );
}

#[test]
fn identical_seeds_reproduce_the_whole_rollout() {
    let num_envs = 4;
    let mut first = CrazyflieEnvironment::new(config(num_envs, 500)).unwrap();
    let mut second = CrazyflieEnvironment::new(config(num_envs, 500)).unwrap();
    let mut first_engine = TestEngine::new(num_envs);
    let mut second_engine = TestEngine::new(num_envs);

    first.reset(&mut first_engine).unwrap();
    second.reset(&mut second_engine).unwrap();

    for _ in 0..10 {
        let a = first.step(&hover(num_envs), &mut first_engine).unwrap();
        let b = second.step(&hover(num_envs), &mut second_engine).unwrap();
        assert_eq!(a.rewards, b.rewards);
        assert_eq!(a.resets, b.resets);
    }
    assert_eq!(first.target_positions(), second.target_positions());
}

#[test]
fn long_episodes_redraw_targets_at_the_periodic_boundary() {
    let num_envs = 2;
    let mut env = CrazyflieEnvironment::new(config(num_envs, 1000)).unwrap();
    let mut engine = TestEngine::new(num_envs);
    env.reset(&mut engine).unwrap();

    // First step re-draws (fresh episodes sit on the boundary), then nothing
    // until step 501.
    env.step(&hover(num_envs), &mut engine).unwrap();
    assert_eq!(env.get_information().retargets_this_step, num_envs);

    for _ in 0..499 {
        env.step(&hover(num_envs), &mut engine).unwrap();
        assert_eq!(env.get_information().retargets_this_step, 0);
    }

    env.step(&hover(num_envs), &mut engine).unwrap();
    assert_eq!(env.get_information().retargets_this_step, num_envs);
    assert_eq!(env.get_information().resets_this_step, 0);
}

#[test]
fn information_tracks_reset_counts() {
    let num_envs = 3;
    let mut env = CrazyflieEnvironment::new(config(num_envs, 500)).unwrap();
    let mut engine = TestEngine::new(num_envs);
    env.reset(&mut engine).unwrap();

    engine.states[actor_index(1, DRONE_SLOT)].position = Vector3::new(3.0, 0.0, 1.0);
    env.step(&hover(num_envs), &mut engine).unwrap();
    env.step(&hover(num_envs), &mut engine).unwrap();

    let info = env.get_information();
    assert_eq!(info.resets_this_step, 1);
    assert_eq!(info.retargets_this_step, 1);
    assert!(info.mean_target_distance < 0.1);
}
