//! The Raft-specific literal end-to-end scenarios from spec.md §8
//! ("Leader election convergence" and "Replication and crash recovery"),
//! run directly against `Replica` with the in-memory harness in
//! `tests/common`. Scenarios 1-4 (single-node insert/delete/update/k-NN)
//! need a real vector index to mean anything and are instead covered at
//! the full `QuartzNode` level in `quartz-server/tests/cluster_test.rs`.

mod common;

use common::{spawn_replica, spawn_replica_with_store, wait_for_leader, InMemoryHub};
use quartz_core::command::Command;
use quartz_core::raft::RaftConfig;
use quartz_core::ServerId;
use std::time::Duration;

fn cluster(names: &[&str]) -> Vec<ServerId> {
    names.iter().map(|s| ServerId::new(*s)).collect()
}

/// Scenario 5: start a 3-replica cluster with empty logs and identical
/// configuration; within 10 * electionTimeoutMax, exactly one replica is
/// leader and the other two name it as the current leader.
#[tokio::test]
async fn leader_election_converges_within_ten_times_the_max_timeout() {
    let hub = InMemoryHub::new();
    let config = RaftConfig::fast_test();
    let bound = config.election_timeout_max * 10;
    let ids = cluster(&["r1", "r2", "r3"]);

    let mut replicas = Vec::new();
    for id in &ids {
        replicas.push(spawn_replica(id.clone(), ids.clone(), RaftConfig::fast_test(), &hub).await);
    }

    let leader_id = wait_for_leader(&replicas, bound).await;
    assert!(ids.contains(&leader_id));

    for r in &replicas {
        assert_eq!(
            r.handle.status().current_leader.as_ref(),
            Some(&leader_id),
            "replica {} does not agree on the elected leader",
            r.id
        );
    }

    for r in replicas {
        let _ = r.shutdown.send(());
        let _ = r.join.await;
    }
}

/// Scenario 6: 3 replicas, leader L. Insert a vector (modeled here as a
/// command submission, since this suite has no real vector index) and wait
/// for acknowledgement; crash L with storage preserved; one of the other
/// two becomes leader within the timeout; after L restarts from its
/// preserved store, every replica (including the restarted L) agrees on
/// the same applied command for the original submission.
#[tokio::test]
async fn replication_survives_a_leader_crash_and_restart() {
    let hub = InMemoryHub::new();
    let config = RaftConfig::fast_test();
    let bound = config.election_timeout_max * 10;
    let ids = cluster(&["r1", "r2", "r3"]);

    let mut replicas = Vec::new();
    for id in &ids {
        replicas.push(spawn_replica(id.clone(), ids.clone(), RaftConfig::fast_test(), &hub).await);
    }

    let leader_id = wait_for_leader(&replicas, bound).await;
    let submitted = Command::Insert {
        vector: vec![1.0, 0.0, 0.0, 0.0],
        id: Some(7),
        level: 0,
    };
    {
        let leader = replicas.iter().find(|r| r.id == leader_id).unwrap();
        leader
            .handle
            .submit(submitted.clone())
            .await
            .expect("the leader commits the insert before crashing");
    }

    // Crash L: stop its task, disconnect it from the hub, but keep its
    // persistent store so it can recover on restart.
    let crashed_index = replicas.iter().position(|r| r.id == leader_id).unwrap();
    let crashed = replicas.remove(crashed_index);
    hub.disconnect(&crashed.id);
    let _ = crashed.shutdown.send(());
    let _ = crashed.join.await;
    let preserved_store = crashed.store;

    let new_leader = wait_for_leader(&replicas, bound).await;
    assert_ne!(new_leader, leader_id, "one of the surviving replicas must take over");

    // Restart L against its preserved store and rejoin the cluster.
    let restarted = spawn_replica_with_store(
        crashed.id.clone(),
        ids.clone(),
        RaftConfig::fast_test(),
        &hub,
        preserved_store,
    )
    .await;
    replicas.push(restarted);

    tokio::time::timeout(bound, async {
        loop {
            if replicas.iter().all(|r| r.applied_commands().contains(&submitted)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("every replica, including the restarted leader, must apply the original insert");

    for r in replicas {
        let _ = r.shutdown.send(());
        let _ = r.join.await;
    }
}
