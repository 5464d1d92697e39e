// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::cast_possible_truncation)] // Test data conversions
#![allow(clippy::cast_possible_wrap)] // Test data conversions

//! Request and pool integration tests over the local fabric.

use meshpass::{
    Error, LocalFabric, PersistentRequestPool, RequestPool, Result, Source, Tag, TestAny,
    TestResult,
};
use std::collections::BTreeSet;

#[test]
fn test_wait_all_twice_returns_nothing_second_time() {
    let fabric = LocalFabric::new(1).unwrap();
    let comm = fabric.communicator(0).unwrap();
    let payload = [10u32, 20, 30];
    let mut slots = [0u32; 3];

    let mut pool = RequestPool::new();
    for (i, slot) in slots.iter_mut().enumerate() {
        pool.push(comm.irecv(slot, Source::Rank(0), Tag::new(i as i32)).unwrap());
    }
    for (i, value) in payload.iter().enumerate() {
        pool.push(comm.isend(value, 0, Tag::new(i as i32)).unwrap());
    }

    let first = pool.wait_all();
    assert_eq!(first.len(), 6);
    assert_eq!(
        first.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
        (0..6).collect::<Vec<_>>()
    );
    assert!(pool.wait_all().is_empty());
    assert_eq!(pool.test_all().map(|v| v.len()), Some(0));
    drop(pool);
    assert_eq!(slots, payload);
}

#[test]
fn test_test_agrees_with_wait() {
    let fabric = LocalFabric::new(1).unwrap();
    let comm = fabric.communicator(0).unwrap();
    let mut got = 0i8;
    let mut recv = comm.irecv(&mut got, Source::Any, Tag::new(1)).unwrap();
    assert!(recv.test().unwrap().is_none());
    assert!(recv.status().is_none());

    comm.send(&-3i8, 0, Tag::new(1)).unwrap();
    let tested = recv.test().unwrap().expect("complete after matching send");
    let waited = recv.wait().unwrap();
    assert_eq!(tested.source(), waited.source());
    assert_eq!(tested.tag(), waited.tag());
    assert_eq!(tested.primitive_count(), waited.primitive_count());
    drop(recv);
    assert_eq!(got, -3);
}

#[test]
fn test_wait_any_reports_each_entry_once() {
    let results = LocalFabric::run(3, |comm| -> Result<Vec<usize>> {
        let mut order = Vec::new();
        if comm.rank() == 0 {
            let mut slots = [0u64; 4];
            let mut pool = RequestPool::new();
            for slot in slots.iter_mut() {
                pool.push(comm.irecv(slot, Source::Any, Tag::new(5))?);
            }
            comm.barrier()?;
            while let Some((index, status)) = pool.wait_any() {
                status.into_result()?;
                order.push(index);
            }
            assert!(matches!(pool.test_any(), TestAny::NoActiveRequests));
            drop(pool);
            let senders: BTreeSet<u64> = slots.iter().copied().collect();
            assert_eq!(senders, BTreeSet::from([1, 2]));
        } else {
            comm.barrier()?;
            let me = comm.rank() as u64;
            comm.send(&me, 0, Tag::new(5))?;
            comm.send(&me, 0, Tag::new(5))?;
        }
        Ok(order)
    })
    .unwrap();

    let mut order = results[0].as_ref().unwrap().clone();
    order.sort_unstable();
    assert_eq!(order, vec![0, 1, 2, 3]);
}

#[test]
fn test_wait_some_and_test_some() {
    let results = LocalFabric::run(2, |comm| -> Result<usize> {
        let mut reported = 0;
        if comm.rank() == 0 {
            let mut slots = [0i32; 3];
            let mut pool = RequestPool::new();
            for (i, slot) in slots.iter_mut().enumerate() {
                pool.push(comm.irecv(slot, Source::Rank(1), Tag::new(i as i32))?);
            }
            assert_eq!(pool.test_some().0, TestResult::NoCompleted);
            comm.barrier()?;
            // Rank 1 sent tags 0 and 2 before this barrier.
            comm.barrier()?;
            let some = pool.wait_some();
            assert_eq!(some.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 2]);
            reported += some.len();

            comm.barrier()?;
            let (result, rest) = loop {
                let (result, rest) = pool.test_some();
                if result != TestResult::NoCompleted {
                    break (result, rest);
                }
                std::thread::yield_now();
            };
            assert_eq!(result, TestResult::Completed);
            assert_eq!(rest.len(), 1);
            reported += rest.len();
            assert_eq!(pool.test_some().0, TestResult::NoActiveRequests);
            drop(pool);
            assert_eq!(slots, [100, 101, 102]);
        } else {
            comm.barrier()?;
            comm.send(&100i32, 0, Tag::new(0))?;
            comm.send(&102i32, 0, Tag::new(2))?;
            comm.barrier()?;
            comm.barrier()?;
            comm.send(&101i32, 0, Tag::new(1))?;
        }
        Ok(reported)
    })
    .unwrap();
    assert_eq!(*results[0].as_ref().unwrap(), 3);
}

#[test]
fn test_cancel_unmatched_receive_in_pool() {
    let fabric = LocalFabric::new(2).unwrap();
    let comm = fabric.communicator(0).unwrap();
    let mut a = 0u8;
    let mut b = 0u8;
    let mut pool = RequestPool::new();
    pool.push(comm.irecv(&mut a, Source::Rank(1), Tag::new(1)).unwrap());
    pool.push(comm.irecv(&mut b, Source::Rank(1), Tag::new(2)).unwrap());

    assert_eq!(pool.cancel_all(), 2);
    let statuses = pool.wait_all();
    assert!(statuses.iter().all(|(_, s)| s.is_cancelled()));
    assert!(!pool.cancel(0).unwrap());
    assert!(pool.wait(0).unwrap().is_cancelled());
    assert!(matches!(pool.wait(9), Err(Error::InvalidArgument(_))));
    assert_eq!(fabric.queue_depth(0), Some((0, 0)));
}

#[test]
fn test_persistent_pool_start_all() {
    let results = LocalFabric::run(2, |comm| -> Result<Vec<i64>> {
        let mut seen = Vec::new();
        if comm.rank() == 0 {
            let values = [1i64, 2];
            let mut pool = PersistentRequestPool::new();
            for (i, v) in values.iter().enumerate() {
                pool.push(comm.send_init(
                    meshpass::SendMode::Standard,
                    v,
                    1,
                    Tag::new(i as i32),
                )?);
            }
            for _ in 0..3 {
                pool.start_all()?;
                assert_eq!(pool.active_len(), 2);
                assert!(matches!(pool.start(0), Err(Error::InvalidState(_))));
                assert_eq!(pool.wait_all().len(), 2);
            }
        } else {
            let mut slots = [0i64; 2];
            {
                let (first, second) = slots.split_at_mut(1);
                let mut pool = PersistentRequestPool::new();
                pool.push(comm.recv_init(&mut first[0], Source::Rank(0), Tag::new(0))?);
                pool.push(comm.recv_init(&mut second[0], Source::Rank(0), Tag::new(1))?);
                for _ in 0..3 {
                    pool.start_all()?;
                    while let Some((_, status)) = pool.wait_any() {
                        status.into_result()?;
                    }
                }
                assert_eq!(pool.active_len(), 0);
            }
            seen.extend_from_slice(&slots);
        }
        Ok(seen)
    })
    .unwrap();
    assert_eq!(results[1].as_ref().unwrap(), &vec![1, 2]);
}

#[test]
fn test_dropping_pool_waits_for_pending_entries() {
    let results = LocalFabric::run(2, |comm| -> Result<u16> {
        let mut slot = 0u16;
        if comm.rank() == 0 {
            {
                let mut pool = RequestPool::new();
                pool.push(comm.irecv(&mut slot, Source::Rank(1), Tag::new(4))?);
                comm.barrier()?;
                // Dropped while pending: blocks until rank 1 sends.
            }
        } else {
            comm.barrier()?;
            std::thread::sleep(std::time::Duration::from_millis(20));
            comm.send(&77u16, 0, Tag::new(4))?;
        }
        Ok(slot)
    })
    .unwrap();
    assert_eq!(*results[0].as_ref().unwrap(), 77);
}
