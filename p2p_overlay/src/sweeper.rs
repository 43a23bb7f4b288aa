//! Periodic cache eviction, run on its own thread by the runtime.

use std::sync::Arc;
use std::time::Duration;

use crate::Overlay;

/// Sleeps `cache_check_secs`, then sweeps both query caches, forever. Intended to
/// run on a dedicated thread; the caller decides when to stop spawning more of
/// these (there is no cooperative shutdown signal here, since a sleeping thread
/// blocks nothing else and is reaped at process exit).
pub fn run(overlay: Arc<Overlay>) {
    loop {
        std::thread::sleep(Duration::from_secs(overlay.config().cache_check_secs));
        let evicted = overlay.sweep_once();
        if evicted > 0 {
            log::debug!("cache sweep evicted {} expired quer(y/ies)", evicted);
        }
    }
}
