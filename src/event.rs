//! Wake event for sleeping workers.
//!
//! The event is level-less: `signal` wakes every thread currently blocked in
//! `wait` but leaves no state behind, so a wait that starts after a signal
//! blocks until the next one. Submitters therefore signal *after* placing
//! work, and woken workers re-check their pipes before sleeping again.

use std::sync::{Condvar, Mutex};

pub(crate) struct SignalEvent {
    generation: Mutex<u64>,
    cond: Condvar,
}

impl SignalEvent {
    pub(crate) fn new() -> Self {
        SignalEvent {
            generation: Mutex::new(0),
            cond: Condvar::new(),
        }
    }

    /// Wakes all current waiters.
    pub(crate) fn signal(&self) {
        let mut generation = self.generation.lock().unwrap();
        *generation = generation.wrapping_add(1);
        self.cond.notify_all();
    }

    /// Blocks until the next signal.
    pub(crate) fn wait(&self) {
        let mut generation = self.generation.lock().unwrap();
        let observed = *generation;
        while *generation == observed {
            generation = self.cond.wait(generation).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_signal_wakes_waiter() {
        let event = Arc::new(SignalEvent::new());
        let woke = Arc::new(AtomicBool::new(false));

        let handle = {
            let event = Arc::clone(&event);
            let woke = Arc::clone(&woke);
            thread::spawn(move || {
                event.wait();
                woke.store(true, Ordering::SeqCst);
            })
        };

        // Give the waiter time to block, then keep signalling until it is
        // through (a signal sent before it blocked does not persist).
        while !woke.load(Ordering::SeqCst) {
            event.signal();
            thread::sleep(Duration::from_millis(1));
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_signal_does_not_persist() {
        let event = Arc::new(SignalEvent::new());
        event.signal();

        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let handle = {
            let event = Arc::clone(&event);
            let started = Arc::clone(&started);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                started.store(true, Ordering::SeqCst);
                event.wait();
                finished.store(true, Ordering::SeqCst);
            })
        };

        while !started.load(Ordering::SeqCst) {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(20));
        assert!(
            !finished.load(Ordering::SeqCst),
            "a signal sent before the wait must not satisfy it"
        );

        while !finished.load(Ordering::SeqCst) {
            event.signal();
            thread::sleep(Duration::from_millis(1));
        }
        handle.join().unwrap();
    }
}
