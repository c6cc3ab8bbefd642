// src/telemetry/system.rs
use serde::{Deserialize, Serialize};
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process figures attached to every readiness report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub version: String,
    /// Live tasks on the current tokio runtime.
    pub goroutines_count: u64,
    pub total_alloc_bytes: u64,
    pub heap_objects_count: u64,
    pub alloc_bytes: u64,
}

pub trait SystemCollector: Send + Sync {
    fn snapshot(&self) -> SystemSnapshot;
}

/// Reads the tokio runtime metrics and the [`CountingAllocator`] counters.
///
/// Allocation figures stay at zero unless the binary installs
/// `CountingAllocator` as its `#[global_allocator]`.
#[derive(Debug, Clone, Default)]
pub struct RuntimeCollector;

impl SystemCollector for RuntimeCollector {
    fn snapshot(&self) -> SystemSnapshot {
        let tasks = tokio::runtime::Handle::try_current()
            .map(|handle| handle.metrics().num_alive_tasks() as u64)
            .unwrap_or(0);
        let allocs = CountingAllocator::stats();

        SystemSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            goroutines_count: tasks,
            total_alloc_bytes: allocs.total_bytes,
            heap_objects_count: allocs.live_objects,
            alloc_bytes: allocs.live_bytes,
        }
    }
}

static TOTAL_BYTES: AtomicU64 = AtomicU64::new(0);
static LIVE_BYTES: AtomicU64 = AtomicU64::new(0);
static LIVE_OBJECTS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Bytes allocated since start, never decreases.
    pub total_bytes: u64,
    pub live_bytes: u64,
    pub live_objects: u64,
}

/// System allocator wrapper that keeps allocation counters.
///
/// ```ignore
/// #[global_allocator]
/// static ALLOC: CountingAllocator = CountingAllocator;
/// ```
pub struct CountingAllocator;

impl CountingAllocator {
    pub fn stats() -> AllocStats {
        AllocStats {
            total_bytes: TOTAL_BYTES.load(Ordering::Relaxed),
            live_bytes: LIVE_BYTES.load(Ordering::Relaxed),
            live_objects: LIVE_OBJECTS.load(Ordering::Relaxed),
        }
    }

    fn on_alloc(size: usize) {
        TOTAL_BYTES.fetch_add(size as u64, Ordering::Relaxed);
        LIVE_BYTES.fetch_add(size as u64, Ordering::Relaxed);
        LIVE_OBJECTS.fetch_add(1, Ordering::Relaxed);
    }

    fn on_dealloc(size: usize) {
        LIVE_BYTES.fetch_sub(size as u64, Ordering::Relaxed);
        LIVE_OBJECTS.fetch_sub(1, Ordering::Relaxed);
    }
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            Self::on_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            Self::on_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        Self::on_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            // Counted as a move: the object count is unchanged.
            if new_size > layout.size() {
                let grown = (new_size - layout.size()) as u64;
                TOTAL_BYTES.fetch_add(grown, Ordering::Relaxed);
                LIVE_BYTES.fetch_add(grown, Ordering::Relaxed);
            } else {
                LIVE_BYTES.fetch_sub((layout.size() - new_size) as u64, Ordering::Relaxed);
            }
        }
        new_ptr
    }
}
