use std::cell::Cell;
use std::ops::Deref;
use std::rc::Rc;

/// Counts heap objects owned by one engine.
///
/// Every heap value is wrapped in [`Tracked`], which bumps the counter on
/// allocation and drops it again when the last `Rc` goes away.
#[derive(Debug, Clone, Default)]
pub struct LiveCounter {
    live: Rc<Cell<usize>>,
    allocated: Rc<Cell<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveStats {
    pub live: usize,
    pub allocated: usize,
}

impl LiveCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track<T>(&self, value: T) -> Rc<Tracked<T>> {
        self.live.set(self.live.get() + 1);
        self.allocated.set(self.allocated.get() + 1);
        Rc::new(Tracked {
            value,
            _token: LiveToken {
                live: Rc::clone(&self.live),
            },
        })
    }

    pub fn live(&self) -> usize {
        self.live.get()
    }

    pub fn snapshot(&self) -> LiveStats {
        LiveStats {
            live: self.live.get(),
            allocated: self.allocated.get(),
        }
    }
}

#[derive(Debug)]
struct LiveToken {
    live: Rc<Cell<usize>>,
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.live.set(self.live.get().saturating_sub(1));
    }
}

/// A heap value counted by a [`LiveCounter`].
#[derive(Debug)]
pub struct Tracked<T> {
    value: T,
    _token: LiveToken,
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}
