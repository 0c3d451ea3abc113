//! Concurrency tests for the record store.
//!
//! The command path and the status publisher share one [`RecordStore`].
//! These tests hammer it from several threads and check that readers only
//! ever see whole operations: the count never goes backwards while records
//! are only being added, and a read issued during a slow save waits for the
//! save instead of observing the half-applied change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use gate_server::application::record_store::RecordStore;
use gate_server::application::status::free_capacity;
use gate_server::infrastructure::storage::memory::MemoryRecordFile;

fn store_over(file: &Arc<MemoryRecordFile>) -> Arc<RecordStore> {
    Arc::new(RecordStore::open(Box::new(Arc::clone(file))).expect("open store"))
}

#[test]
fn test_concurrent_adds_and_counts_are_never_torn() {
    // Arrange
    const WRITERS: usize = 4;
    const PER_WRITER: usize = 50;
    let file = Arc::new(MemoryRecordFile::new());
    let store = store_over(&file);
    let done = Arc::new(AtomicBool::new(false));

    // Act: one reader samples the count while writers add records
    let reader = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut samples = Vec::new();
            while !done.load(Ordering::SeqCst) {
                samples.push(store.count());
            }
            samples.push(store.count());
            samples
        })
    };
    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..PER_WRITER {
                    store
                        .insert(&format!("W{w}-{i}"), "holder")
                        .expect("insert");
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer thread");
    }
    done.store(true, Ordering::SeqCst);
    let samples = reader.join().expect("reader thread");

    // Assert
    assert!(samples.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(store.count(), WRITERS * PER_WRITER);
    assert_eq!(file.snapshot().len(), WRITERS * PER_WRITER);
    assert_eq!(file.save_count(), WRITERS * PER_WRITER);
}

#[test]
fn test_racing_adds_of_same_uid_admit_exactly_one() {
    // Arrange
    let store = store_over(&Arc::new(MemoryRecordFile::new()));

    // Act
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.insert("AB12", &format!("holder-{i}")).is_ok())
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .filter(|ok| *ok)
        .count();

    // Assert
    assert_eq!(successes, 1);
    assert_eq!(store.count(), 1);
}

#[test]
fn test_count_during_slow_save_waits_for_the_save() {
    // Arrange: each save takes 200 ms
    let file = Arc::new(MemoryRecordFile::new().with_save_delay(Duration::from_millis(200)));
    let store = store_over(&file);

    // Act: start an insert, then read while its save is in progress
    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || store.insert("AB12", "Alice").expect("insert"))
    };
    thread::sleep(Duration::from_millis(50));
    let observed = store.count();
    writer.join().expect("writer thread");

    // Assert: the read saw the committed state, not the pre-insert one
    assert_eq!(observed, 1);
}

#[test]
fn test_free_capacity_tracks_store_from_async_context() {
    let store = store_over(&Arc::new(MemoryRecordFile::new()));
    for i in 0..3 {
        store.insert(&format!("UID{i}"), "x").expect("insert");
    }

    let occupancy = tokio_test::block_on(async {
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || store.count())
            .await
            .expect("blocking task")
    });

    assert_eq!(free_capacity(10, occupancy), 7);
}
