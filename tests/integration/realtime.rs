//! Realtime group integration tests
//!
//! Drives `MasterSlaveGroup` the way an audio callback would: one
//! `realtime_process_start`, one `realtime_process` per channel group and
//! one `realtime_process_end` per cycle.

use crate::helpers::tolerances::FLOAT_EPSILON;
use crate::helpers::*;
use approx::assert_relative_eq;
use fxhost::prelude::*;
use fxhost::HostError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Handle 0 is the master, handle `i + 1` is slave `i`.
fn start(channel_groups: &[u32]) -> (FxHost, MasterSlaveGroup, Handles) {
    let (host, handles) = test_host();
    let delay = host.open(DELAY_PATH).unwrap();
    let group = host.start_realtime(delay, channel_groups).unwrap();
    (host, group, handles)
}

/// Run one cycle with a constant per-slave input level.
fn cycle(group: &mut MasterSlaveGroup, levels: &[f32]) -> Vec<[Vec<f32>; 2]> {
    assert!(group.realtime_process_start());
    let mut rendered = Vec::new();
    for (index, &level) in levels.iter().enumerate() {
        let input = constant(level, TEST_BLOCK_SIZE);
        let mut left = vec![0.0; TEST_BLOCK_SIZE];
        let mut right = vec![0.0; TEST_BLOCK_SIZE];
        let produced = group.realtime_process(
            index,
            &[&input[..], &input[..]],
            &mut [&mut left[..], &mut right[..]],
            TEST_BLOCK_SIZE,
        );
        assert_eq!(produced, TEST_BLOCK_SIZE);
        rendered.push([left, right]);
    }
    assert_eq!(group.realtime_process_end(), TEST_BLOCK_SIZE);
    rendered
}

#[test]
fn test_slaves_start_as_master_snapshot() {
    let (host, handles) = test_host();
    let mut delay = host.open(DELAY_PATH).unwrap();
    delay.set_parameter(0, 0.6).unwrap();
    handle(&handles, 0).set_internal(b"warm-tape");

    let group = host.start_realtime(delay, &[2, 2]).unwrap();
    assert_eq!(group.slave_count(), 2);
    assert_eq!(group.master().state(), InstanceState::Ready);

    for index in 1..=2 {
        let slave = handle(&handles, index);
        assert_eq!(slave.parameter(0), Some(0.6));
        assert_eq!(slave.internal(), b"warm-tape");
        assert_eq!(slave.sample_rate(fxhost::plugin::abi::Scope::Global), Some(TEST_SAMPLE_RATE));
    }
    assert_eq!(group.slave(0).unwrap().member().unwrap().index, 0);
    assert_eq!(group.slave(1).unwrap().member().unwrap().group, group.id());
}

#[test]
fn test_control_edits_apply_at_cycle_start() {
    let (_host, mut group, handles) = start(&[2, 2]);
    let control = group.control();

    assert!(control.set_parameter(1, 0.9));
    for index in 0..3 {
        assert_eq!(handle(&handles, index).parameter(1), Some(0.5));
    }

    cycle(&mut group, &[0.1, 0.1]);
    for index in 0..3 {
        assert_eq!(handle(&handles, index).parameter(1), Some(0.9));
    }
}

#[test]
fn test_master_ui_change_follows_to_slaves() {
    let (_host, mut group, handles) = start(&[2, 2]);
    let control = group.control();

    handle(&handles, 0).twiddle(0, 0.75);
    assert_eq!(control.pump_events(), 1);
    assert_eq!(handle(&handles, 1).parameter(0), Some(0.25));

    cycle(&mut group, &[0.0, 0.0]);
    assert_eq!(handle(&handles, 1).parameter(0), Some(0.75));
    assert_eq!(handle(&handles, 2).parameter(0), Some(0.75));
}

#[test]
fn test_master_hears_sum_of_slaves() {
    let (_host, mut group, handles) = start(&[2, 2]);

    let rendered = cycle(&mut group, &[0.25, 0.5]);
    assert_relative_eq!(rendered[0][0][0], 0.25, epsilon = FLOAT_EPSILON);
    assert_relative_eq!(rendered[1][1][TEST_BLOCK_SIZE - 1], 0.5, epsilon = FLOAT_EPSILON);

    let master_inputs = handle(&handles, 0).last_inputs();
    assert_eq!(master_inputs.len(), 2);
    for channel in &master_inputs {
        assert_eq!(channel.len(), TEST_BLOCK_SIZE);
        assert_relative_eq!(peak(channel), 0.75, epsilon = FLOAT_EPSILON);
    }
    for out in group.summing_output() {
        assert_relative_eq!(out[0], 0.75, epsilon = FLOAT_EPSILON);
    }

    // the next cycle starts from clean sums
    cycle(&mut group, &[0.125]);
    for channel in handle(&handles, 0).last_inputs() {
        assert_relative_eq!(channel[0], 0.125, epsilon = FLOAT_EPSILON);
    }
}

#[test]
fn test_extra_input_channels_not_summed() {
    let (_host, mut group, _handles) = start(&[4]);
    let wide = constant(1.0, TEST_BLOCK_SIZE);
    let mut left = vec![0.0; TEST_BLOCK_SIZE];
    let mut right = vec![0.0; TEST_BLOCK_SIZE];

    group.realtime_process_start();
    group.realtime_process(
        0,
        &[&wide[..], &wide[..], &wide[..], &wide[..]],
        &mut [&mut left[..], &mut right[..]],
        TEST_BLOCK_SIZE,
    );

    assert_eq!(group.summing_input().len(), 2);
    assert_relative_eq!(group.summing_input()[1][0], 1.0, epsilon = FLOAT_EPSILON);
}

#[test]
fn test_suspend_and_resume() {
    let (_host, mut group, handles) = start(&[2]);
    let before: Vec<usize> = (0..2).map(|i| handle(&handles, i).reset_count()).collect();

    assert!(group.realtime_suspend());
    assert!(group.is_suspended());
    assert!(group.realtime_resume());
    assert!(!group.is_suspended());

    for (index, count) in before.into_iter().enumerate() {
        assert_eq!(handle(&handles, index).reset_count(), count + 1);
    }
    cycle(&mut group, &[0.5]);
}

#[test]
fn test_finalize_then_restart() {
    let (host, mut group, handles) = start(&[2, 2]);

    assert!(group.realtime_finalize());
    assert!(!group.realtime_finalize());
    assert!(!group.realtime_process_start());
    assert_eq!(group.slave_count(), 0);

    let master = group.into_master();
    assert_eq!(master.state(), InstanceState::Finalized);

    let mut again = host.start_realtime(master, &[2]).unwrap();
    assert_eq!(again.master().state(), InstanceState::Ready);
    cycle(&mut again, &[0.25]);
    assert!(handle(&handles, 3).is_initialized());
}

#[test]
fn test_group_preset_reaches_slaves() {
    let (host, mut group, handles) = start(&[2, 2]);

    handle(&handles, 0).set_parameter(0, 0.4);
    host.save_user_preset(&mut group, "Live").unwrap();
    handle(&handles, 0).set_parameter(0, 0.0);

    host.load_user_preset(&mut group, "Live").unwrap();
    for index in 0..3 {
        assert_eq!(handle(&handles, index).parameter(0), Some(0.4));
    }
}

#[test]
fn test_failed_start_keeps_instance() {
    init_tracing();
    let created = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&created);
    let registry = ComponentRegistry::new();
    registry.register(EffectDescriptor::parse(DELAY_PATH).unwrap(), 1, move || {
        // the master is the only unit available
        if count.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err("instance limit reached".to_string());
        }
        Ok(Box::new(MockUnit::effect()) as Box<dyn NativeUnit>)
    });
    let host = FxHost::builder().registry(registry).build().unwrap();
    let delay = host.open(DELAY_PATH).unwrap();

    let failed = match host.start_realtime(delay, &[2]) {
        Err(Error::Realtime(failed)) => failed,
        other => panic!("expected a realtime start failure, got {:?}", other),
    };
    assert!(matches!(failed.error, HostError::InstantiationFailed { .. }));
    assert_eq!(created.load(Ordering::SeqCst), 2);

    let delay = failed.master;
    assert_eq!(delay.state(), InstanceState::Finalized);
    let group = host.start_realtime(delay, &[]).unwrap();
    assert_eq!(group.master().state(), InstanceState::Ready);
}
