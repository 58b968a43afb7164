use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

/// Single-owner token serializing access to one engine.
///
/// Unlike a mutex guard the token can be handed back temporarily with
/// [`Gate::suspend`] while host code runs in the middle of an engine call,
/// and picked up again afterwards. Taking the gate from the thread that
/// already owns it would deadlock, so it panics instead.
pub struct Gate {
    owner: Mutex<Option<ThreadId>>,
    freed: Condvar,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    pub fn new() -> Self {
        Self {
            owner: Mutex::new(None),
            freed: Condvar::new(),
        }
    }

    /// Blocks until the gate is free and takes it for the current thread.
    pub fn enter(&self) -> GateGuard<'_> {
        self.acquire();
        GateGuard { gate: self }
    }

    /// Whether the current thread owns the gate right now.
    pub fn held_by_current(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    /// Gives the gate up until the returned guard is dropped.
    ///
    /// Must be called by the owning thread, typically from an engine
    /// callback that is about to run host code.
    pub fn suspend(&self) -> Suspended<'_> {
        debug_assert!(self.held_by_current(), "suspending a gate this thread does not hold");
        trace!("engine gate suspended");
        self.release();
        Suspended { gate: self }
    }

    fn acquire(&self) {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        loop {
            match *owner {
                None => {
                    *owner = Some(me);
                    return;
                }
                Some(holder) if holder == me => {
                    drop(owner);
                    panic!("engine gate entered again by the thread that already holds it");
                }
                Some(_) => self.freed.wait(&mut owner),
            }
        }
    }

    fn release(&self) {
        *self.owner.lock() = None;
        self.freed.notify_one();
    }
}

/// Owns the gate until dropped, including during unwinding.
pub struct GateGuard<'a> {
    gate: &'a Gate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

/// Re-takes a suspended gate when dropped.
pub struct Suspended<'a> {
    gate: &'a Gate,
}

impl Drop for Suspended<'_> {
    fn drop(&mut self) {
        self.gate.acquire();
        trace!("engine gate resumed");
    }
}
