//! Spinlock guarding the console sink.
//!
//! Releasing is explicit: call [`SpinLockGuard::unlock`]. A guard that is
//! dropped while still held panics with the location that took the lock.

use core::{
    cell::UnsafeCell,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};

/// Returned by [`SpinLock::try_lock`] when the lock is held.
#[derive(Debug)]
pub struct WouldBlock;

/// A busy-waiting mutual exclusion lock.
pub struct SpinLock<T: ?Sized> {
    held: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates a new unlocked spinlock.
    pub const fn new(t: T) -> SpinLock<T> {
        SpinLock {
            held: AtomicBool::new(false),
            data: UnsafeCell::new(t),
        }
    }
}

impl<T: ?Sized> SpinLock<T> {
    fn acquire(&self, caller: &'static core::panic::Location<'static>) -> SpinLockGuard<'_, T> {
        SpinLockGuard {
            caller,
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Acquires the lock, spinning until it is free.
    #[track_caller]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let caller = core::panic::Location::caller();
        loop {
            match self.try_acquire() {
                true => return self.acquire(caller),
                false => core::hint::spin_loop(),
            }
        }
    }

    /// Acquires the lock if it is free.
    #[track_caller]
    pub fn try_lock(&self) -> Result<SpinLockGuard<'_, T>, WouldBlock> {
        let caller = core::panic::Location::caller();
        if self.try_acquire() {
            Ok(self.acquire(caller))
        } else {
            Err(WouldBlock)
        }
    }

    fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

/// Access to the data of a held [`SpinLock`].
pub struct SpinLockGuard<'a, T: ?Sized + 'a> {
    caller: &'static core::panic::Location<'static>,
    lock: &'a SpinLock<T>,
    _not_send: PhantomData<*const ()>,
}

impl<T: ?Sized> SpinLockGuard<'_, T> {
    /// Releases the lock.
    pub fn unlock(self) {
        self.lock.held.store(false, Ordering::Release);
        core::mem::forget(self);
    }
}

impl<T: ?Sized> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        panic!(
            "SpinLockGuard taken at {} dropped without `.unlock()`.",
            self.caller
        );
    }
}
