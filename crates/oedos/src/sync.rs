//! Locking that works in both `std` and `no_std` builds.
//!
//! The two backends disagree on guard types and on poisoning, so the lock
//! is not handed out as a guard at all: [`Lock::with`] runs a closure under
//! the lock and returns its result. The core only ever needs scoped access
//! to its state, and the closure shape makes it impossible to hold the
//! critical section across a dispatch by accident.

#[cfg(not(feature = "std"))]
pub use alloc::sync::Arc;
#[cfg(feature = "std")]
pub use std::sync::Arc;

/// Closure-scoped mutual exclusion.
///
/// Backed by `std::sync::Mutex` when the `std` feature is enabled and by
/// `spin::Mutex` otherwise. A poisoned lock is recovered, not propagated:
/// the routing state is a plain value with no invariants that a panicking
/// handler could have half-applied, and one crashed kernel thread must not
/// wedge every other kernel's send path.
pub struct Lock<T> {
    #[cfg(feature = "std")]
    inner: std::sync::Mutex<T>,
    #[cfg(not(feature = "std"))]
    inner: spin::Mutex<T>,
}

impl<T> Lock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            #[cfg(feature = "std")]
            inner: std::sync::Mutex::new(value),
            #[cfg(not(feature = "std"))]
            inner: spin::Mutex::new(value),
        }
    }

    /// Runs `f` with exclusive access to the protected value.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        #[cfg(feature = "std")]
        {
            let mut guard = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            f(&mut guard)
        }
        #[cfg(not(feature = "std"))]
        {
            f(&mut self.inner.lock())
        }
    }
}
