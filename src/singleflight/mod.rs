// Keyed request coalescing
//
// Collapses concurrent calls for the same key into one execution whose
// result every caller shares. There is no memoization: once the in-flight
// call finishes, the next caller for that key executes again.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;

struct Call<T> {
    result: Mutex<Option<Result<T>>>,
    done: Condvar,
}

/// Deduplicates concurrent calls on the same key
///
/// The first caller for a key becomes the leader and runs the closure; every
/// caller that arrives while the leader is still running blocks on the
/// call's latch and receives a clone of the leader's result.
pub struct SingleFlight<T> {
    calls: Mutex<HashMap<String, Arc<Call<T>>>>,
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        SingleFlight {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` for `key`, unless an identical call is already in flight
    ///
    /// The latch is released on every exit path: if `f` panics, waiting
    /// callers receive [`Error::Aborted`] and the panic resumes unwinding in
    /// the leader.
    pub fn run<F>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let call = {
            let mut calls = self.calls.lock();
            if let Some(existing) = calls.get(key) {
                let call = Arc::clone(existing);
                drop(calls);
                let mut result = call.result.lock();
                while result.is_none() {
                    call.done.wait(&mut result);
                }
                return result.clone().expect("completed call holds a result");
            }
            let call = Arc::new(Call {
                result: Mutex::new(None),
                done: Condvar::new(),
            });
            calls.insert(key.to_string(), Arc::clone(&call));
            call
        };

        let guard = FlightGuard {
            flight: self,
            call: &call,
            key,
            completed: false,
        };
        let result = f();
        guard.complete(result.clone());
        result
    }

    /// Publish the result and retire the in-flight entry
    ///
    /// The entry is removed before the latch opens, so a caller arriving
    /// after completion always starts a fresh call.
    fn finish(&self, key: &str, call: &Call<T>, result: Result<T>) {
        self.calls.lock().remove(key);
        *call.result.lock() = Some(result);
        call.done.notify_all();
    }
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        SingleFlight::new()
    }
}

struct FlightGuard<'a, T: Clone> {
    flight: &'a SingleFlight<T>,
    call: &'a Arc<Call<T>>,
    key: &'a str,
    completed: bool,
}

impl<T: Clone> FlightGuard<'_, T> {
    fn complete(mut self, result: Result<T>) {
        self.completed = true;
        self.flight.finish(self.key, self.call, result);
    }
}

impl<T: Clone> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        if !self.completed {
            self.flight.finish(self.key, self.call, Err(Error::Aborted));
        }
    }
}
