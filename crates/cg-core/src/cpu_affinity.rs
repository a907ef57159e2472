//! Pinning for the event dispatch thread.
//!
//! Handlers run on a single dispatch thread, so its scheduling jitter is
//! seen by every consumer. `engine.dispatch_cpu_core` pins it through the
//! `core_affinity` crate; a negative or unknown core leaves it floating.

use tracing::{info, warn};

/// Pin the calling thread to `core`. Returns whether the thread is now
/// pinned.
pub fn pin_current(core: Option<i32>) -> bool {
    let Some(index) = core.and_then(|c| usize::try_from(c).ok()) else {
        return false;
    };

    let available = core_affinity::get_core_ids().unwrap_or_default();
    let Some(id) = available.iter().find(|id| id.id == index).copied() else {
        warn!("[affinity] core {index} not found among {} cores, thread left unpinned", available.len());
        return false;
    };

    let thread = std::thread::current();
    let name = thread.name().unwrap_or("unnamed");
    if core_affinity::set_for_current(id) {
        info!("[affinity] {name} pinned to core {index}");
        true
    } else {
        warn!("[affinity] os refused to pin {name} to core {index}");
        false
    }
}
