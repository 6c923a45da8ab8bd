//! Paint statistics for debugging and performance analysis.
//!
//! Enable by compiling with the `paint-stats` feature:
//! ```bash
//! cargo test --features paint-stats
//! ```
//!
//! A summary is logged at most once per second from [`end_flush`], showing:
//! - Immediate paints drawn directly or through a buffer
//! - Requests skipped, by reason
//! - Nodes drawn and children skipped as hidden by siblings

use crate::paint::SkipReason;

/// Snapshot of accumulated paint statistics.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub painted_direct: u64,
    pub painted_buffered: u64,
    pub skipped_not_showing: u64,
    pub skipped_empty: u64,
    pub skipped_clipped: u64,
    pub skipped_obscured: u64,
    pub skipped_detached: u64,
    pub nodes_painted: u64,
    pub children_obscured: u64,
}

impl StatsSnapshot {
    pub fn skipped_total(&self) -> u64 {
        self.skipped_not_showing
            + self.skipped_empty
            + self.skipped_clipped
            + self.skipped_obscured
            + self.skipped_detached
    }
}

#[cfg(feature = "paint-stats")]
mod inner {
    use super::{SkipReason, StatsSnapshot};
    use std::cell::RefCell;
    use std::time::Instant;

    thread_local! {
        static STATS: RefCell<PaintStats> = RefCell::new(PaintStats::new());
    }

    struct PaintStats {
        counters: StatsSnapshot,
        last_report: Instant,
    }

    impl PaintStats {
        fn new() -> Self {
            Self {
                counters: StatsSnapshot::default(),
                last_report: Instant::now(),
            }
        }

        fn reset(&mut self) {
            self.counters = StatsSnapshot::default();
            self.last_report = Instant::now();
        }
    }

    fn with_counters(f: impl FnOnce(&mut StatsSnapshot)) {
        STATS.with(|s| f(&mut s.borrow_mut().counters));
    }

    #[inline]
    pub fn record_painted_direct() {
        with_counters(|c| c.painted_direct += 1);
    }

    #[inline]
    pub fn record_painted_buffered() {
        with_counters(|c| c.painted_buffered += 1);
    }

    /// Record an immediate request that drew nothing.
    #[inline]
    pub fn record_skipped(reason: SkipReason) {
        with_counters(|c| match reason {
            SkipReason::NotShowing => c.skipped_not_showing += 1,
            SkipReason::EmptyDamage => c.skipped_empty += 1,
            SkipReason::ClippedAway => c.skipped_clipped += 1,
            SkipReason::Obscured => c.skipped_obscured += 1,
            SkipReason::Detached => c.skipped_detached += 1,
        });
    }

    #[inline]
    pub fn record_node_painted() {
        with_counters(|c| c.nodes_painted += 1);
    }

    /// Record a child left out because siblings above it hide it.
    #[inline]
    pub fn record_child_obscured() {
        with_counters(|c| c.children_obscured += 1);
    }

    /// Return a snapshot of the current stats (for testing).
    pub fn get_stats() -> StatsSnapshot {
        STATS.with(|s| s.borrow().counters.clone())
    }

    /// Reset all stats to zero (for test isolation).
    pub fn reset_stats() {
        STATS.with(|s| s.borrow_mut().reset());
    }

    /// Called after each damage flush; logs and resets once a second.
    pub fn end_flush() {
        STATS.with(|s| {
            let mut stats = s.borrow_mut();
            if stats.last_report.elapsed().as_secs() < 1 {
                return;
            }

            let c = &stats.counters;
            let requests = c.painted_direct + c.painted_buffered + c.skipped_total();
            log::info!(
                "[Paint Stats] requests={} direct={} buffered={} skipped={}",
                requests,
                c.painted_direct,
                c.painted_buffered,
                c.skipped_total()
            );
            log::info!(
                "  skipped: not_showing={} empty={} clipped={} obscured={} detached={}",
                c.skipped_not_showing,
                c.skipped_empty,
                c.skipped_clipped,
                c.skipped_obscured,
                c.skipped_detached
            );
            log::info!(
                "  nodes: painted={} children_obscured={}",
                c.nodes_painted,
                c.children_obscured
            );

            stats.reset();
        });
    }
}

#[cfg(feature = "paint-stats")]
pub use inner::*;

// No-op implementations when the feature is disabled

#[cfg(not(feature = "paint-stats"))]
#[inline(always)]
pub fn get_stats() -> StatsSnapshot {
    StatsSnapshot::default()
}

#[cfg(not(feature = "paint-stats"))]
#[inline(always)]
pub fn reset_stats() {}

#[cfg(not(feature = "paint-stats"))]
#[inline(always)]
pub fn record_painted_direct() {}

#[cfg(not(feature = "paint-stats"))]
#[inline(always)]
pub fn record_painted_buffered() {}

#[cfg(not(feature = "paint-stats"))]
#[inline(always)]
pub fn record_skipped(_reason: SkipReason) {}

#[cfg(not(feature = "paint-stats"))]
#[inline(always)]
pub fn record_node_painted() {}

#[cfg(not(feature = "paint-stats"))]
#[inline(always)]
pub fn record_child_obscured() {}

#[cfg(not(feature = "paint-stats"))]
#[inline(always)]
pub fn end_flush() {}
