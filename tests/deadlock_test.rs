// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! These tests hammer real stores with crossing transfers from many threads.
//! With the `deadlock_detection` feature enabled, parking_lot tracks every
//! ledger lock, and a background thread fails the test as soon as a cycle in
//! the lock graph appears.

use parking_lot::deadlock;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use warehouse_rs::{MaterialType, Store, StoreError, StoreObserver};

// === Deadlock Detection Infrastructure ===

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150)); // Let detector thread exit
}

// === Fixtures ===

fn materials() -> Vec<MaterialType> {
    ["Iron", "Copper", "Tin"]
        .iter()
        .map(|name| MaterialType::new(*name, "metal", "icon", 1_000_000).unwrap())
        .collect()
}

fn stocked_stores(count: usize, materials: &[MaterialType], quantity: i64) -> Vec<Arc<Store>> {
    (0..count)
        .map(|_| {
            let store = Store::new();
            for material in materials {
                store.add_material(material, quantity).unwrap();
            }
            Arc::new(store)
        })
        .collect()
}

fn total(stores: &[Arc<Store>], material: &MaterialType) -> i64 {
    stores.iter().map(|store| store.quantity(material)).sum()
}

/// Tracks the net amount notified across all stores.
#[derive(Default)]
struct NetObserver {
    net: AtomicI64,
}

impl StoreObserver for NetObserver {
    fn on_added(&self, _material: &MaterialType, quantity: i64) {
        self.net.fetch_add(quantity, Ordering::SeqCst);
    }

    fn on_removed(&self, _material: &MaterialType, quantity: i64) {
        self.net.fetch_sub(quantity, Ordering::SeqCst);
    }
}

// === Tests ===

/// Two threads transfer the same material in opposite directions between
/// the same pair of stores, the textbook lock-order inversion.
#[test]
fn no_deadlock_opposing_transfers() {
    let detector = start_deadlock_detector();
    let materials = materials();
    let iron = materials[0].clone();
    let stores = stocked_stores(2, &materials[..1], 500_000);
    let barrier = Arc::new(Barrier::new(2));

    const OPS_PER_THREAD: usize = 20_000;

    let handles: Vec<_> = [(0usize, 1usize), (1, 0)]
        .into_iter()
        .map(|(from, to)| {
            let source = Arc::clone(&stores[from]);
            let destination = Arc::clone(&stores[to]);
            let iron = iron.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..OPS_PER_THREAD {
                    source.put_to(&destination, &iron, 3).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(stores[0].quantity(&iron), 500_000);
    assert_eq!(stores[1].quantity(&iron), 500_000);
}

/// Many threads transfer among many stores and materials in a ring and
/// against it. Material is conserved and every thread finishes.
#[test]
fn no_deadlock_transfer_mesh() {
    let detector = start_deadlock_detector();
    let materials = materials();

    const NUM_THREADS: usize = 16;
    const NUM_STORES: usize = 6;
    const OPS_PER_THREAD: usize = 2_000;
    const INITIAL: i64 = 10_000;

    let stores = stocked_stores(NUM_STORES, &materials, INITIAL);
    let observer = Arc::new(NetObserver::default());
    for store in &stores {
        store.register_observer(observer.clone());
    }

    let started = Instant::now();
    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|thread_id| {
            let stores = stores.clone();
            let materials = materials.clone();
            thread::spawn(move || {
                for i in 0..OPS_PER_THREAD {
                    let from = (thread_id + i) % NUM_STORES;
                    let step = 1 + (thread_id * 7 + i) % (NUM_STORES - 1);
                    let to = (from + step) % NUM_STORES;
                    let material = &materials[(thread_id + i * 3) % materials.len()];
                    let quantity = ((thread_id * 31 + i * 17) % 50) as i64;

                    match stores[from].put_to(&stores[to], material, quantity) {
                        Ok(moved) => assert!(moved <= quantity),
                        Err(StoreError::InsufficientQuantity(_)) => {}
                        Err(e) => panic!("unexpected transfer error: {e}"),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    for material in &materials {
        assert_eq!(total(&stores, material), INITIAL * NUM_STORES as i64);
        for store in &stores {
            let snapshot = store.material(material).unwrap();
            assert!(snapshot.quantity >= 0);
            assert!(snapshot.quantity <= snapshot.capacity);
        }
    }
    assert_eq!(observer.net.load(Ordering::SeqCst), 0);
    println!(
        "Transfer mesh passed: {} threads × {} ops in {:?}",
        NUM_THREADS,
        OPS_PER_THREAD,
        started.elapsed()
    );
}

/// Transfers race with adds, removes, reads and capacity changes on the
/// same ledgers.
#[test]
fn no_deadlock_mixed_operations() {
    let detector = start_deadlock_detector();
    let materials = materials();
    let iron = materials[0].clone();

    const NUM_THREADS: usize = 12;
    const OPS_PER_THREAD: usize = 1_000;

    let stores = stocked_stores(4, &materials[..1], 1_000);

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|thread_id| {
            let stores = stores.clone();
            let iron = iron.clone();
            thread::spawn(move || {
                for i in 0..OPS_PER_THREAD {
                    let a = &stores[(thread_id + i) % stores.len()];
                    let b = &stores[(thread_id + i + 1) % stores.len()];
                    match (thread_id + i) % 5 {
                        0 => {
                            let _ = a.add_material(&iron, 2);
                        }
                        1 => {
                            let _ = a.remove_material(&iron, 1);
                        }
                        2 => {
                            let _ = b.take_from(a, &iron, 5);
                        }
                        3 => {
                            let _ = a.take_all_from(b, &iron);
                        }
                        _ => {
                            let _ = a.available_space(&iron);
                            let _ = a.materials();
                            let capacity = a.material(&iron).map_or(0, |s| s.capacity);
                            let _ = a.increase_capacity(&iron, capacity + 1);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    for store in &stores {
        let snapshot = store.material(&iron).unwrap();
        assert!(snapshot.quantity >= 0);
        assert!(snapshot.quantity <= snapshot.capacity);
    }
}

/// Concurrent transfers into a store that has never held the material
/// create exactly one destination ledger.
#[test]
fn no_duplicate_destination_ledger() {
    let detector = start_deadlock_detector();
    let materials = materials();
    let iron = materials[0].clone();

    const NUM_SOURCES: usize = 8;

    let sources = stocked_stores(NUM_SOURCES, &materials[..1], 100);
    let destination = Arc::new(Store::new());
    let barrier = Arc::new(Barrier::new(NUM_SOURCES));

    let handles: Vec<_> = sources
        .iter()
        .map(|source| {
            let source = Arc::clone(source);
            let destination = Arc::clone(&destination);
            let iron = iron.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                source.put_all_to(&destination, &iron).unwrap()
            })
        })
        .collect();

    let moved: i64 = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .sum();

    stop_deadlock_detector(detector);

    assert_eq!(moved, 100 * NUM_SOURCES as i64);
    assert_eq!(destination.materials().len(), 1);
    assert_eq!(destination.quantity(&iron), moved);
}
