// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;
use crate::comm::Tag;
use crate::datatype::Transferred;
use crate::transport::LocalFabric;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn transport() -> Arc<dyn Transport> {
    LocalFabric::new(1).expect("fabric")
}

fn moved(bytes: usize) -> Status {
    Status::new(
        Some(0),
        Tag::new(9),
        Transferred {
            primitives: bytes,
            bytes,
        },
    )
}

#[test]
fn test_wait_caches_result() {
    let c = Completion::new();
    let mut req = Request::new(vec![Arc::clone(&c)], transport());
    assert!(req.test().expect("pending").is_none());
    assert!(!req.is_complete());
    c.complete(moved(3));
    assert_eq!(req.wait().expect("ok").byte_count(), 3);
    assert_eq!(req.wait().expect("ok").byte_count(), 3);
    assert_eq!(req.test().expect("ok").map(|s| s.byte_count()), Some(3));
}

#[test]
fn test_failure_stays_err() {
    let c = Completion::finished(Status::failed(Error::TypeMismatch));
    let mut req = Request::new(vec![c], transport());
    assert!(matches!(req.wait(), Err(Error::TypeMismatch)));
    assert!(matches!(req.test(), Err(Error::TypeMismatch)));
    assert!(req.status().is_some());
}

#[test]
fn test_compound_request_waits_for_all_parts() {
    let a = Completion::new();
    let b = Completion::new();
    let mut req = Request::new(vec![Arc::clone(&a), Arc::clone(&b)], transport());
    a.complete(moved(2));
    assert!(req.status().is_none());
    b.complete(moved(5));
    let st = req.wait().expect("ok");
    assert_eq!(st.byte_count(), 7);
    assert_eq!(st.source(), None);
}

#[test]
fn test_drop_blocks_until_complete() {
    let c = Completion::new();
    let req = Request::new(vec![Arc::clone(&c)], transport());
    let remote = Arc::clone(&c);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        remote.complete(moved(1));
    });
    drop(req);
    assert!(c.is_complete());
    handle.join().expect("completer");
}

#[test]
fn test_persistent_lifecycle() {
    let starts = AtomicUsize::new(0);
    let mut req = PersistentRequest::new(
        Box::new(|| {
            let n = starts.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Completion::finished(moved(n + 1))])
        }),
        transport(),
    );
    assert!(!req.is_active());
    assert!(req.wait().expect("inactive").is_ok());

    req.start().expect("first start");
    assert!(req.is_active());
    assert!(matches!(req.start(), Err(Error::InvalidState(_))));
    assert_eq!(req.wait().expect("ok").byte_count(), 1);
    assert!(!req.is_active());

    req.start().expect("second start");
    assert_eq!(req.test().expect("ok").map(|s| s.byte_count()), Some(2));
    assert_eq!(req.status().map(|s| s.byte_count()), Some(2));
    drop(req);
    assert_eq!(starts.load(Ordering::SeqCst), 2);
}
