//! Bounded worker pool for batches
//!
//! Workers pull the next index from a shared counter, so a slow dataset
//! does not hold back the others. Results come back in input order.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Apply `work` to every item on at most `max_workers` threads.
///
/// With one worker (or one item) everything runs on the calling thread.
pub fn run_bounded<T, R, F>(items: &[T], max_workers: usize, work: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = max_workers.min(items.len());
    if workers <= 1 {
        return items.iter().map(&work).collect();
    }

    let next = AtomicUsize::new(0);
    let slots: Vec<Mutex<Option<R>>> = items.iter().map(|_| Mutex::new(None)).collect();
    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let item = match items.get(index) {
                    Some(item) => item,
                    None => break,
                };
                let result = work(item);
                *slots[index].lock() = Some(result);
            });
        }
    });

    // Scoped threads are joined above and a panicking worker re-panics
    // there, so every slot is filled.
    slots.into_iter().filter_map(|slot| slot.into_inner()).collect()
}
