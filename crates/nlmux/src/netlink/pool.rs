//! Reuse pools for decoded messages and attribute storage.
//!
//! Every message kind, and every boxed attribute record, draws its objects
//! from its own process-wide [`Pool`]. A [`Pooled`] guard owns one object;
//! [`Pooled::release`] hands it back explicitly. Dropping a guard without
//! releasing it still returns the object, but the return is counted as
//! implicit and traced so that missing releases show up in [`stats`].
//!
//! Attribute byte buffers come from one [`BytePool`] per value kind:
//! [`STRINGS`], [`OPAQUE`] and [`LINK_ADDRS`].

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Free objects retained per pool.
pub const POOL_RETAIN: usize = 256;

/// Free byte buffers retained by each byte pool.
pub const BYTES_RETAIN: usize = 1024;

/// Buffers with more capacity than this are not retained.
pub const BYTES_MAX_CAPACITY: usize = 4096;

static ACQUIRED: AtomicU64 = AtomicU64::new(0);
static REUSED: AtomicU64 = AtomicU64::new(0);
static RELEASED: AtomicU64 = AtomicU64::new(0);
static RECLAIMED: AtomicU64 = AtomicU64::new(0);

/// Buffers for string attributes.
pub static STRINGS: BytePool = BytePool::new("strings");

/// Buffers for opaque attribute payloads.
pub static OPAQUE: BytePool = BytePool::new("opaque");

/// Buffers for link-layer addresses.
pub static LINK_ADDRS: BytePool = BytePool::new("link addresses");

/// Pool counters, process-wide or for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects handed out.
    pub acquired: u64,
    /// Objects handed out from a free list rather than freshly allocated.
    pub reused: u64,
    /// Objects returned through an explicit release.
    pub released: u64,
    /// Objects returned because their guard was dropped unreleased.
    pub reclaimed: u64,
}

impl PoolStats {
    /// Guards currently outstanding.
    pub fn outstanding(&self) -> u64 {
        self.acquired
            .saturating_sub(self.released)
            .saturating_sub(self.reclaimed)
    }
}

/// Snapshot of the process-wide counters.
pub fn stats() -> PoolStats {
    PoolStats {
        acquired: ACQUIRED.load(Ordering::Relaxed),
        reused: REUSED.load(Ordering::Relaxed),
        released: RELEASED.load(Ordering::Relaxed),
        reclaimed: RECLAIMED.load(Ordering::Relaxed),
    }
}

/// An object that lives in a per-kind pool.
pub trait Poolable: Default + Send + 'static {
    /// The pool objects of this kind return to.
    fn pool() -> &'static Pool<Self>;

    /// Restore the freshly-constructed state, releasing any heap-backed
    /// attribute values to their own pools.
    fn reset(&mut self);
}

struct Counters {
    acquired: AtomicU64,
    reused: AtomicU64,
    released: AtomicU64,
    reclaimed: AtomicU64,
}

impl Counters {
    const fn new() -> Self {
        Self {
            acquired: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            released: AtomicU64::new(0),
            reclaimed: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> PoolStats {
        PoolStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
        }
    }
}

/// A mutex-guarded free list of boxed objects.
pub struct Pool<T> {
    name: &'static str,
    free: Mutex<Vec<Box<T>>>,
    counters: Counters,
}

impl<T: Poolable> Pool<T> {
    /// Create an empty pool.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            free: Mutex::new(Vec::new()),
            counters: Counters::new(),
        }
    }

    /// Pool name used in traces.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of idle objects.
    pub fn idle(&self) -> usize {
        self.free.lock().map(|free| free.len()).unwrap_or(0)
    }

    /// Counters of this pool alone.
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    fn take(&self) -> Box<T> {
        ACQUIRED.fetch_add(1, Ordering::Relaxed);
        self.counters.acquired.fetch_add(1, Ordering::Relaxed);
        let reused = self.free.lock().ok().and_then(|mut free| free.pop());
        match reused {
            Some(obj) => {
                REUSED.fetch_add(1, Ordering::Relaxed);
                self.counters.reused.fetch_add(1, Ordering::Relaxed);
                obj
            }
            None => Box::default(),
        }
    }

    fn put(&self, mut obj: Box<T>) {
        obj.reset();
        if let Ok(mut free) = self.free.lock() {
            if free.len() < POOL_RETAIN {
                free.push(obj);
            }
        }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}

/// Exclusive owner of one pooled object.
pub struct Pooled<T: Poolable> {
    // Always `Some` until the guard is dropped.
    value: Option<Box<T>>,
    released: bool,
}

impl<T: Poolable> Pooled<T> {
    /// Take a reset object from the kind's pool.
    pub fn acquire() -> Self {
        Self {
            value: Some(T::pool().take()),
            released: false,
        }
    }

    /// Return the object to its pool.
    pub fn release(mut self) {
        self.released = true;
    }
}

impl<T: Poolable> Drop for Pooled<T> {
    fn drop(&mut self) {
        let Some(value) = self.value.take() else {
            return;
        };
        let pool = T::pool();
        if self.released {
            RELEASED.fetch_add(1, Ordering::Relaxed);
            pool.counters.released.fetch_add(1, Ordering::Relaxed);
        } else {
            RECLAIMED.fetch_add(1, Ordering::Relaxed);
            pool.counters.reclaimed.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(pool = pool.name(), "object reclaimed without release");
        }
        pool.put(value);
    }
}

impl<T: Poolable> Default for Pooled<T> {
    fn default() -> Self {
        Self::acquire()
    }
}

impl<T: Poolable> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("pooled object used during drop"),
        }
    }
}

impl<T: Poolable> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("pooled object used during drop"),
        }
    }
}

impl<T: Poolable + Clone> Clone for Pooled<T> {
    fn clone(&self) -> Self {
        let mut copy = Self::acquire();
        (*copy).clone_from(&**self);
        copy
    }
}

impl<T: Poolable + PartialEq> PartialEq for Pooled<T> {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl<T: Poolable + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

/// A free list of byte buffers for one kind of attribute value.
pub struct BytePool {
    name: &'static str,
    free: Mutex<Vec<Vec<u8>>>,
    counters: Counters,
}

impl BytePool {
    /// Create an empty byte pool.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            free: Mutex::new(Vec::new()),
            counters: Counters::new(),
        }
    }

    /// Pool name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of idle buffers.
    pub fn idle(&self) -> usize {
        self.free.lock().map(|free| free.len()).unwrap_or(0)
    }

    /// Counters of this pool. Buffers never handed back are not counted
    /// as reclaimed.
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Copy `data` into a buffer drawn from this pool.
    pub fn take(&self, data: &[u8]) -> Vec<u8> {
        self.counters.acquired.fetch_add(1, Ordering::Relaxed);
        let mut buf = match self.free.lock().ok().and_then(|mut free| free.pop()) {
            Some(buf) => {
                self.counters.reused.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => Vec::new(),
        };
        buf.extend_from_slice(data);
        buf
    }

    /// Return a buffer to this pool.
    pub fn give(&self, mut buf: Vec<u8>) {
        self.counters.released.fetch_add(1, Ordering::Relaxed);
        if buf.capacity() == 0 || buf.capacity() > BYTES_MAX_CAPACITY {
            return;
        }
        buf.clear();
        if let Ok(mut free) = self.free.lock() {
            if free.len() < BYTES_RETAIN {
                free.push(buf);
            }
        }
    }
}

impl fmt::Debug for BytePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BytePool")
            .field("name", &self.name)
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Scratch {
        nsid: i32,
        words: Vec<String>,
    }

    impl Default for Scratch {
        fn default() -> Self {
            Self {
                nsid: -1,
                words: Vec::new(),
            }
        }
    }

    impl Poolable for Scratch {
        fn pool() -> &'static Pool<Self> {
            static POOL: Pool<Scratch> = Pool::new("scratch");
            &POOL
        }

        fn reset(&mut self) {
            self.nsid = -1;
            self.words.clear();
        }
    }

    #[test]
    fn test_release_resets_object() {
        let mut obj = Pooled::<Scratch>::acquire();
        obj.nsid = 7;
        obj.words.push("eth0".into());
        obj.release();

        let again = Pooled::<Scratch>::acquire();
        assert_eq!(again.nsid, -1);
        assert!(again.words.is_empty());
        again.release();
    }

    #[test]
    fn test_drop_is_counted_as_reclaim() {
        let before = stats();
        {
            let mut obj = Pooled::<Scratch>::acquire();
            obj.nsid = 3;
        }
        let after = stats();
        assert!(after.reclaimed > before.reclaimed);
        assert!(after.acquired > before.acquired);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut a = Pooled::<Scratch>::acquire();
        a.words.push("lo".into());
        let b = a.clone();
        a.words.clear();
        assert_eq!(b.words, vec!["lo".to_string()]);
        a.release();
        b.release();
    }

    #[test]
    fn test_byte_pool_copies() {
        let buf = OPAQUE.take(b"abc");
        assert_eq!(buf, b"abc");
        OPAQUE.give(buf);
        let buf = OPAQUE.take(b"x");
        assert_eq!(buf, b"x");
        OPAQUE.give(buf);
    }

    #[test]
    fn test_byte_pools_are_separate() {
        static NAMES: BytePool = BytePool::new("names");
        static PAYLOADS: BytePool = BytePool::new("payloads");

        let buf = NAMES.take(b"eth0");
        NAMES.give(buf);
        assert_eq!(NAMES.idle(), 1);
        assert_eq!(PAYLOADS.idle(), 0);

        let buf = PAYLOADS.take(b"\x01\x02");
        assert_eq!(PAYLOADS.stats().reused, 0);
        assert_eq!(NAMES.idle(), 1);
        PAYLOADS.give(buf);

        let buf = NAMES.take(b"lo");
        assert_eq!(buf, b"lo");
        assert_eq!(NAMES.stats().reused, 1);
        assert_eq!(NAMES.stats().acquired, 2);
        NAMES.give(buf);
    }

    #[test]
    fn test_per_pool_stats_count_reuse() {
        let before = Scratch::pool().stats();
        Pooled::<Scratch>::acquire().release();
        let obj = Pooled::<Scratch>::acquire();
        obj.release();
        let after = Scratch::pool().stats();
        assert!(after.acquired >= before.acquired + 2);
        assert!(after.reused > before.reused);
        assert!(after.released >= before.released + 2);
    }
}
