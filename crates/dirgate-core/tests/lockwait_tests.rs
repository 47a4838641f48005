#![cfg(feature = "async")]

//! Lock discovery and the joint-wait races, on a paused tokio clock.

mod common;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use common::{readable, DirSpec, FakeTree};
use dirgate_core::{
    CancellationSource, CancellationToken, LockProbe, LockWaitError, LockWaiter, ProcessId,
    ProcessWatch,
};
use futures::future::BoxFuture;

/// Scripted per-file lock ownership.
#[derive(Debug, Default)]
struct FakeLocks {
    held: Mutex<HashMap<PathBuf, Vec<ProcessId>>>,
}

impl FakeLocks {
    fn lock_file(&self, file: impl Into<PathBuf>, pids: &[u32]) {
        self.held
            .lock()
            .unwrap()
            .insert(file.into(), pids.iter().copied().map(ProcessId).collect());
    }
}

impl LockProbe for FakeLocks {
    fn is_locked(&self, file: &Path) -> bool {
        self.held.lock().unwrap().contains_key(file)
    }

    fn locking_processes(&self, file: &Path) -> Vec<ProcessId> {
        self.held.lock().unwrap().get(file).cloned().unwrap_or_default()
    }
}

/// Processes that exit after a scripted delay; unknown pids are treated
/// as already gone.
#[derive(Debug, Default)]
struct FakeProcs {
    exits: Mutex<HashMap<ProcessId, Duration>>,
}

impl FakeProcs {
    fn exits_after(&self, pid: u32, delay: Duration) {
        self.exits.lock().unwrap().insert(ProcessId(pid), delay);
    }
}

impl ProcessWatch for FakeProcs {
    fn wait_exit(&self, pid: ProcessId) -> BoxFuture<'static, ()> {
        let delay = self
            .exits
            .lock()
            .unwrap()
            .get(&pid)
            .copied()
            .unwrap_or(Duration::ZERO);
        Box::pin(async move {
            tokio::time::sleep(delay).await;
        })
    }
}

/// One directory `/work` with a nested subtree and two files.
fn work_tree() -> FakeTree {
    let tree = FakeTree::new();
    tree.add_dir(
        "/work",
        DirSpec {
            files: vec!["a.db".into()],
            ..readable()
        },
    );
    tree.add_dir(
        "/work/sub",
        DirSpec {
            files: vec!["b.db".into()],
            ..readable()
        },
    );
    tree
}

#[test]
fn locked_descendants_are_detected_at_any_depth() {
    let tree = work_tree();
    let locks = FakeLocks::default();
    let procs = FakeProcs::default();
    let waiter = LockWaiter::new(&tree, &locks, &procs);

    assert!(!waiter.has_locked_descendant(Path::new("/work")).unwrap());

    locks.lock_file("/work/sub/b.db", &[41]);
    assert!(waiter.has_locked_descendant(Path::new("/work")).unwrap());
}

#[test]
fn missing_directory_fails_fast() {
    let tree = FakeTree::new();
    let locks = FakeLocks::default();
    let procs = FakeProcs::default();
    let waiter = LockWaiter::new(&tree, &locks, &procs);

    assert!(matches!(
        waiter.has_locked_descendant(Path::new("/gone")),
        Err(LockWaitError::NotFound { .. })
    ));
    assert!(matches!(
        waiter.locking_processes(Path::new("/gone")),
        Err(LockWaitError::NotFound { .. })
    ));
}

#[test]
fn locking_processes_are_deduplicated() {
    let tree = work_tree();
    let locks = FakeLocks::default();
    let procs = FakeProcs::default();
    let waiter = LockWaiter::new(&tree, &locks, &procs);

    // The same process holds both files; another holds just one.
    locks.lock_file("/work/a.db", &[7, 9]);
    locks.lock_file("/work/sub/b.db", &[7]);

    let mut pids = waiter.locking_processes(Path::new("/work")).unwrap();
    pids.sort();
    assert_eq!(pids, vec![ProcessId(7), ProcessId(9)]);
}

#[tokio::test(start_paused = true)]
async fn wait_returns_once_the_locker_exits() {
    let tree = work_tree();
    let locks = FakeLocks::default();
    let procs = FakeProcs::default();
    locks.lock_file("/work/a.db", &[7]);
    procs.exits_after(7, Duration::from_millis(200));

    let waiter = LockWaiter::new(&tree, &locks, &procs);
    let unlocked = waiter
        .wait_unlocked_timeout(
            Path::new("/work"),
            Duration::from_millis(1000),
            &CancellationToken::none(),
        )
        .await
        .unwrap();
    assert!(unlocked);
}

#[tokio::test(start_paused = true)]
async fn wait_times_out_while_the_locker_lives() {
    let tree = work_tree();
    let locks = FakeLocks::default();
    let procs = FakeProcs::default();
    locks.lock_file("/work/a.db", &[7]);
    procs.exits_after(7, Duration::from_millis(200));

    let waiter = LockWaiter::new(&tree, &locks, &procs);
    let unlocked = waiter
        .wait_unlocked_timeout(
            Path::new("/work"),
            Duration::from_millis(50),
            &CancellationToken::none(),
        )
        .await
        .unwrap();
    assert!(!unlocked);
}

#[tokio::test(start_paused = true)]
async fn joint_wait_covers_every_locker() {
    let tree = work_tree();
    let locks = FakeLocks::default();
    let procs = FakeProcs::default();
    locks.lock_file("/work/a.db", &[1]);
    locks.lock_file("/work/sub/b.db", &[2]);
    procs.exits_after(1, Duration::from_millis(100));
    procs.exits_after(2, Duration::from_millis(400));

    let waiter = LockWaiter::new(&tree, &locks, &procs);

    // The slower of the two lockers decides the outcome.
    assert!(!waiter
        .wait_unlocked_timeout(
            Path::new("/work"),
            Duration::from_millis(300),
            &CancellationToken::none(),
        )
        .await
        .unwrap());
    assert!(waiter
        .wait_unlocked_timeout(
            Path::new("/work"),
            Duration::from_millis(500),
            &CancellationToken::none(),
        )
        .await
        .unwrap());
}

#[tokio::test]
async fn unlocked_directory_needs_no_waiting() {
    let tree = work_tree();
    let locks = FakeLocks::default();
    let procs = FakeProcs::default();
    let waiter = LockWaiter::new(&tree, &locks, &procs);

    waiter
        .wait_unlocked(Path::new("/work"), &CancellationToken::none())
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancellation_beats_the_joint_wait() {
    let tree = work_tree();
    let locks = FakeLocks::default();
    let procs = FakeProcs::default();
    locks.lock_file("/work/a.db", &[7]);
    procs.exits_after(7, Duration::from_secs(3600));

    let waiter = LockWaiter::new(&tree, &locks, &procs);
    let source = CancellationSource::new();
    let token = source.token();

    let (result, ()) = tokio::join!(waiter.wait_unlocked(Path::new("/work"), &token), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        source.cancel();
    });

    assert!(matches!(result, Err(LockWaitError::Cancelled)));
}

#[tokio::test]
async fn a_pre_cancelled_wait_never_starts() {
    let tree = work_tree();
    let locks = FakeLocks::default();
    let procs = FakeProcs::default();
    let waiter = LockWaiter::new(&tree, &locks, &procs);

    let source = CancellationSource::new();
    source.cancel();

    let listings_before = tree.listings();
    let result = waiter
        .wait_unlocked_timeout(
            Path::new("/work"),
            Duration::from_millis(100),
            &source.token(),
        )
        .await;

    assert!(matches!(result, Err(LockWaitError::Cancelled)));
    // Discovery never ran.
    assert_eq!(tree.listings(), listings_before);
}

#[tokio::test(start_paused = true)]
async fn discovery_is_a_snapshot() {
    let tree = work_tree();
    let locks = FakeLocks::default();
    let procs = FakeProcs::default();
    locks.lock_file("/work/a.db", &[7]);
    procs.exits_after(7, Duration::from_millis(100));
    // pid 8 never exits within the test horizon.
    procs.exits_after(8, Duration::from_secs(3600));

    let waiter = LockWaiter::new(&tree, &locks, &procs);
    let cancel = CancellationToken::none();

    let (unlocked, ()) = tokio::join!(
        waiter.wait_unlocked_timeout(
            Path::new("/work"),
            Duration::from_millis(1000),
            &cancel,
        ),
        async {
            // A new locker arrives after discovery; the running wait
            // must not pick it up.
            tokio::time::sleep(Duration::from_millis(10)).await;
            locks.lock_file("/work/sub/b.db", &[8]);
        }
    );

    assert!(unlocked.unwrap());
}
