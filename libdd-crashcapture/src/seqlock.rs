// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A single-writer, many-reader sequence lock whose readers never block.
//!
//! The counter is even while the protected data is stable and odd while a write is in progress.
//! Readers take a token with [SeqLock::optimistic_read], look at the data, and then
//! [SeqLock::validate] the token. Unlike a textbook seqlock, a failed validation is not retried:
//! the reader may be a signal handler that interrupted the very writer holding the lock, so
//! looping would never terminate. The read is abandoned instead.

use std::cell::UnsafeCell;
use std::hint;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use std::sync::atomic::{fence, AtomicU64};

/// Token returned by [SeqLock::optimistic_read] when a write is in progress. It never
/// validates once any write has started.
pub const INVALID_TOKEN: u64 = 0;

#[derive(Debug, Default)]
pub struct SeqLock {
    counter: AtomicU64,
}

impl SeqLock {
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Spins until no write is in progress, then marks one as started.
    ///
    /// SIGNAL SAFETY:
    ///     Never call this from a signal handler. If the interrupted thread holds the lock, this
    ///     spins forever.
    pub fn acquire_write(&self) {
        loop {
            let current = self.counter.load(Relaxed);
            if current & 1 == 1 {
                hint::spin_loop();
                continue;
            }
            if self
                .counter
                .compare_exchange_weak(current, current + 1, Acquire, Relaxed)
                .is_ok()
            {
                break;
            }
        }
        // Data writes must not become visible before the odd counter.
        fence(Release);
    }

    /// Ends the write section started by [SeqLock::acquire_write].
    pub fn release_write(&self) {
        let mut current = self.counter.load(Relaxed);
        debug_assert!(current & 1 == 1, "release_write without acquire_write");
        while let Err(actual) =
            self.counter
                .compare_exchange_weak(current, current.wrapping_add(1), Release, Relaxed)
        {
            current = actual;
        }
        fence(Release);
    }

    /// Returns a token to validate after reading, or [INVALID_TOKEN] if a write is in progress.
    /// Async-signal-safe.
    pub fn optimistic_read(&self) -> u64 {
        let current = self.counter.load(Acquire);
        if current & 1 == 1 {
            INVALID_TOKEN
        } else {
            current
        }
    }

    /// True if no write started since `token` was handed out. Async-signal-safe.
    pub fn validate(&self, token: u64) -> bool {
        fence(Acquire);
        self.counter.load(Relaxed) == token
    }
}

/// Ends a write section when dropped, so a panicking writer cannot leave the lock odd.
pub struct WriteGuard<'a> {
    lock: &'a SeqLock,
}

impl<'a> WriteGuard<'a> {
    pub fn new(lock: &'a SeqLock) -> Self {
        lock.acquire_write();
        Self { lock }
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

/// A value guarded by a [SeqLock].
pub struct SeqLocked<T> {
    lock: SeqLock,
    value: UnsafeCell<T>,
}

// SAFETY: writers are serialised by the lock; readers only keep what validated.
unsafe impl<T: Send> Sync for SeqLocked<T> {}

impl<T> SeqLocked<T> {
    pub fn new(value: T) -> Self {
        Self {
            lock: SeqLock::new(),
            value: UnsafeCell::new(value),
        }
    }

    pub fn lock(&self) -> &SeqLock {
        &self.lock
    }

    /// Runs `f` inside a write section.
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _guard = WriteGuard::new(&self.lock);
        // SAFETY: the write section excludes other writers.
        f(unsafe { &mut *self.value.get() })
    }

    /// A reference that bypasses the lock.
    ///
    /// # Safety
    /// The referenced data may be mutated concurrently. Callers must bracket every use with
    /// [SeqLock::optimistic_read] and [SeqLock::validate] and discard whatever they derived from
    /// it when validation fails. Values must only be read, never trusted structurally: a pointer
    /// read during a torn write may dangle.
    pub unsafe fn read_unsynchronized(&self) -> &T {
        &*self.value.get()
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Copy> SeqLocked<T> {
    /// Copies the value out without blocking. Returns `None` if a write overlapped the copy.
    /// Async-signal-safe for `T` without interior pointers.
    pub fn try_read(&self) -> Option<T> {
        let token = self.lock.optimistic_read();
        // SAFETY: the copy is kept uninitialised until validation proves it was not torn.
        let copy = unsafe { ptr::read_volatile(self.value.get() as *const MaybeUninit<T>) };
        if !self.lock.validate(token) {
            return None;
        }
        // SAFETY: validated above.
        Some(unsafe { copy.assume_init() })
    }
}

impl<T: Default> Default for SeqLocked<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counter_transitions() {
        let lock = SeqLock::new();
        let token = lock.optimistic_read();
        assert_eq!(token, 0);
        assert!(lock.validate(token));

        lock.acquire_write();
        assert_eq!(lock.optimistic_read(), INVALID_TOKEN);
        assert!(!lock.validate(token));
        lock.release_write();

        let token = lock.optimistic_read();
        assert_eq!(token, 2);
        assert!(lock.validate(token));
    }

    #[test]
    fn test_invalid_token_never_validates_after_write() {
        let lock = SeqLock::new();
        lock.acquire_write();
        let token = lock.optimistic_read();
        lock.release_write();
        assert!(!lock.validate(token));
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let value = Arc::new(SeqLocked::new(0u64));
        let cloned = Arc::clone(&value);
        let result = thread::spawn(move || {
            cloned.write(|_| panic!("writer failed"));
        })
        .join();
        assert!(result.is_err());
        assert_eq!(value.lock().optimistic_read() & 1, 0);
        assert_eq!(value.try_read(), Some(0));
    }

    #[test]
    fn test_write_then_read() {
        let value = SeqLocked::new([0u32; 4]);
        value.write(|v| v[2] = 7);
        assert_eq!(value.try_read(), Some([0, 0, 7, 0]));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_no_torn_read_validates() {
        const WORDS: usize = 32;
        let shared = Arc::new(SeqLocked::new([0u64; WORDS]));
        let done = Arc::new(AtomicBool::new(false));

        let writers: Vec<_> = (0..2)
            .map(|seed| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for i in 0..20_000u64 {
                        shared.write(|words| {
                            for word in words.iter_mut() {
                                *word = i * 2 + seed;
                            }
                        });
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let shared = Arc::clone(&shared);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    while !done.load(Relaxed) {
                        if let Some(words) = shared.try_read() {
                            assert!(words.iter().all(|w| *w == words[0]), "torn read");
                        }
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Relaxed);
        for reader in readers {
            reader.join().unwrap();
        }
        // After the writers finish every read succeeds.
        let words = shared.try_read().unwrap();
        assert!(words.iter().all(|w| *w == words[0]));
    }
}
