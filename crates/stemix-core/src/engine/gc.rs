//! Deferred deallocation for rendered buffers
//!
//! Rendered track buffers are shared with the audio callback through
//! `basedrop::Shared`. When the control thread swaps in a new render, the
//! callback may still hold the old one; whichever side drops the last
//! reference only enqueues it. The memory is freed on the collector thread
//! below, so a full-song buffer is never released inside an audio callback.
//!
//! ```ignore
//! use basedrop::Shared;
//! use stemix_core::engine::gc::gc_handle;
//!
//! let buffer = Shared::new(&gc_handle(), Some(rendered));
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// How often the collector thread frees queued buffers
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("stemix-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives and dies on this thread
            let mut collector = Collector::new();
            tx.send(collector.handle())
                .expect("GC handle receiver dropped during startup");

            log::debug!("Buffer collector thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn buffer collector thread");

    rx.recv().expect("Buffer collector thread exited during startup")
}

/// Get a handle for creating `Shared<T>` allocations
///
/// The collector thread is started on first use.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::{Shared, SharedCell};

    #[test]
    fn test_shared_cell_swap() {
        let handle = gc_handle();
        let cell = SharedCell::new(Shared::new(&handle, vec![1.0f32; 16]));

        let held = cell.get();
        cell.set(Shared::new(&handle, vec![2.0f32; 8]));

        // Old reference stays valid after the swap
        assert_eq!(held.len(), 16);
        assert_eq!(cell.get().len(), 8);
    }
}
