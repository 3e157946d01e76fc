// SPDX-License-Identifier: Apache-2.0

//! Process-wide recycling of backing byte arrays.
//!
//! Scratch buffers and source windows borrow their arrays from a
//! [`BufferPool`] and hand them back when closed. The pool keeps two size
//! classes (`chunk` and `2 * chunk` bytes) with `groups` slots each; the
//! slot is picked by a per-thread affinity hash so that threads rarely
//! touch the same slot. Slots are only ever `try_lock`ed: a busy or empty
//! slot means a fresh allocation, never a wait.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

/// Environment variable overriding [`PoolConfig::chunk`] for the global pool.
pub const CHUNK_ENV: &str = "KATFLOW_POOL_CHUNK";
/// Environment variable overriding [`PoolConfig::groups`] for the global pool.
pub const GROUPS_ENV: &str = "KATFLOW_POOL_GROUPS";

/// Number of pooled size classes.
const CLASSES: usize = 2;

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Size of the smallest pooled array, rounded up to a power of two.
    pub chunk: usize,
    /// Slots per size class, rounded up to a power of two.
    pub groups: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            chunk: 8192,
            groups: 8,
        }
    }
}

impl PoolConfig {
    /// Defaults, overridden by `KATFLOW_POOL_CHUNK` / `KATFLOW_POOL_GROUPS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(chunk) = env_usize(CHUNK_ENV) {
            config.chunk = chunk;
        }
        if let Some(groups) = env_usize(GROUPS_ENV) {
            config.groups = groups;
        }
        config.normalized()
    }

    /// Rounds both fields up to powers of two, with sane minimums.
    pub fn normalized(self) -> Self {
        Self {
            chunk: self.chunk.max(64).next_power_of_two(),
            groups: self.groups.max(1).next_power_of_two(),
        }
    }
}

fn env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            log::warn!("ignoring {name}={raw:?}: expected a positive integer");
            None
        }
    }
}

/// Counters describing how well the pool is doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Acquisitions served from a slot.
    pub hits: usize,
    /// Acquisitions that allocated.
    pub misses: usize,
    /// Releases that found a free slot.
    pub recycled: usize,
}

/// Fixed slot storage for recycled arrays.
#[derive(Debug)]
pub struct BufferPool {
    chunk: usize,
    mask: usize,
    /// Each slot stands in for an atomic swap cell: it is only ever
    /// `try_lock`ed, so a contended slot counts as empty and never blocks.
    slots: Box<[Mutex<Option<Vec<u8>>>]>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    recycled: AtomicUsize,
}

thread_local! {
    static AFFINITY: usize = {
        let mut hasher = DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        hasher.finish() as usize
    };
}

static GLOBAL: OnceLock<BufferPool> = OnceLock::new();

impl BufferPool {
    pub fn new(config: PoolConfig) -> Self {
        let config = config.normalized();
        let slots = (0..CLASSES * config.groups)
            .map(|_| Mutex::new(None))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            chunk: config.chunk,
            mask: config.groups - 1,
            slots,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            recycled: AtomicUsize::new(0),
        }
    }

    /// The shared pool, configured from the environment on first use.
    pub fn global() -> &'static BufferPool {
        GLOBAL.get_or_init(|| BufferPool::new(PoolConfig::from_env()))
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }

    /// Size class serving a request of `min` bytes, if it is pooled at all.
    fn class_for(&self, min: usize) -> Option<usize> {
        if min < self.chunk / 8 {
            return None;
        }
        let class = min.div_ceil(self.chunk).max(1) - 1;
        (class < CLASSES).then_some(class)
    }

    fn slot(&self, class: usize) -> &Mutex<Option<Vec<u8>>> {
        let group = AFFINITY.with(|hash| *hash) & self.mask;
        &self.slots[class * (self.mask + 1) + group]
    }

    /// Returns an array of at least `min` bytes. Recycled arrays keep
    /// whatever their previous owner wrote.
    ///
    /// Pooled requests are rounded up to their class size; the returned
    /// `len()` is the usable capacity.
    pub fn acquire(&self, min: usize) -> Vec<u8> {
        let Some(class) = self.class_for(min) else {
            return vec![0; min];
        };
        if let Ok(mut slot) = self.slot(class).try_lock() {
            if let Some(array) = slot.take() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return array;
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        log::trace!("pool miss: allocating {} bytes", (class + 1) * self.chunk);
        vec![0; (class + 1) * self.chunk]
    }

    /// Offers `array` back to the pool. Returns whether it was kept.
    ///
    /// Only arrays of exactly a class size are kept, and only when the
    /// slot is free; everything else is dropped.
    pub fn release(&self, array: Vec<u8>) -> bool {
        let len = array.len();
        if len == 0 || len % self.chunk != 0 {
            return false;
        }
        let class = len / self.chunk - 1;
        if class >= CLASSES {
            return false;
        }
        match self.slot(class).try_lock() {
            Ok(mut slot) if slot.is_none() => {
                *slot = Some(array);
                self.recycled.fetch_add(1, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}
