//! Scheduling on one simulated core, driven tick by tick

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

mod common;

use std::collections::HashMap;

use common::{scheduler, task};
use tandem::{
    Error, TaskHandle, TaskState,
    config::{HEARTBEAT_TASK_NAME, IDLE_TASK_NAME, MAX_TASKS_PER_CORE},
};

/// A tiny linear congruential generator, so runs repeat exactly
struct Lcg(u32);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.0 >> 16
    }
}

#[test]
fn ready_list_follows_creation_order_for_every_count() {
    for count in 1..=MAX_TASKS_PER_CORE {
        let (scheduler, _) = scheduler();
        let handles: Vec<TaskHandle> = (0..count)
            .map(|i| scheduler.create_task(1, task, "t", 256, i, 1).unwrap())
            .collect();
        assert_eq!(scheduler.task_count(1), count);
        assert_eq!(scheduler.ready_tasks(1).as_slice(), handles.as_slice());
    }
}

#[test]
fn delayed_task_is_never_picked_early() {
    for ticks in 1..20 {
        let (scheduler, port) = scheduler();
        let sleeper = scheduler.create_task(0, task, "sleeper", 256, 0, 3).unwrap();
        scheduler.create_task(0, task, "other", 256, 0, 3).unwrap();
        scheduler.prepare_start().unwrap();

        let start = scheduler.now(0);
        scheduler.delay(0, ticks);
        assert_eq!(port.switch_requests(), 1);

        while scheduler.now(0) < start + ticks {
            assert_ne!(scheduler.current_task(0), Some(sleeper));
            assert_eq!(scheduler.task_state(sleeper), Some(TaskState::Blocked));
            scheduler.tick_isr(0);
        }
        assert_eq!(scheduler.now(0), start + ticks);
        assert_ne!(scheduler.task_state(sleeper), Some(TaskState::Blocked));
        assert!(scheduler.ready_tasks(0).contains(&sleeper));
    }
}

#[test]
fn every_task_sits_in_exactly_one_list() {
    let (scheduler, _) = scheduler();
    for (i, priority) in [2, 2, 3, 1, 2].into_iter().enumerate() {
        scheduler.create_task(0, task, "worker", 256, i, priority).unwrap();
    }
    scheduler
        .create_task(0, task, HEARTBEAT_TASK_NAME, 256, 0, 1)
        .unwrap();
    scheduler.prepare_start().unwrap();

    let mut rng = Lcg(7);
    let mut release_at: HashMap<TaskHandle, u32> = HashMap::new();
    for _ in 0..5_000 {
        scheduler.tick_isr(0);
        let now = scheduler.now(0);
        let current = scheduler.current_task(0).unwrap();

        if let Some(&release) = release_at.get(&current) {
            assert!(now >= release, "{current} picked at {now}, before {release}");
        }

        let ready = scheduler.ready_tasks(0);
        let delayed = scheduler.delayed_tasks(0);
        assert_eq!(ready.len() + delayed.len(), scheduler.task_count(0));
        assert!(ready.contains(&current));
        for info in scheduler.task_list(0) {
            let in_ready = ready.contains(&info.handle);
            let in_delayed = delayed.contains(&info.handle);
            assert!(in_ready != in_delayed);
            assert_eq!(info.state == TaskState::Blocked, in_delayed);
        }

        if scheduler.task_name(current).unwrap().as_str() != IDLE_TASK_NAME && rng.next() % 4 == 0 {
            let ticks = 1 + rng.next() % 50;
            release_at.insert(current, now + ticks);
            scheduler.delay(0, ticks);
        }
    }
}

#[test]
fn heartbeat_leaves_core_out_of_the_barrier() {
    let (scheduler, _) = scheduler();
    scheduler
        .create_task(2, task, HEARTBEAT_TASK_NAME, 256, 0, 1)
        .unwrap();
    assert_eq!(scheduler.core_state(2), tandem::CoreState::Inactive);
}

#[test]
fn create_task_rejects_bad_cores_and_full_cores() {
    let (scheduler, _) = scheduler();
    assert_eq!(
        scheduler.create_task(17, task, "nowhere", 256, 0, 1),
        Err(Error::InvalidCore)
    );
    for _ in 0..MAX_TASKS_PER_CORE {
        scheduler.create_task(3, task, "t", 256, 0, 1).unwrap();
    }
    assert_eq!(
        scheduler.create_task(3, task, "t", 256, 0, 1),
        Err(Error::ResourceExhausted)
    );
    // no room for an idle task either
    assert_eq!(scheduler.prepare_start(), Err(Error::ResourceExhausted));
}

#[test]
fn long_names_are_truncated() {
    let (scheduler, _) = scheduler();
    let handle = scheduler
        .create_task(0, task, "a_very_long_task_name", 256, 0, 1)
        .unwrap();
    assert_eq!(scheduler.task_name(handle).unwrap().as_str(), "a_very_long_tas");
}

#[test]
fn tick_divisor_comes_from_the_port_clock() {
    let (scheduler, _) = scheduler();
    assert_eq!(scheduler.prepare_start(), Ok(100));
    assert_eq!(scheduler.tick_divisor(), 100);
}

// End of File
