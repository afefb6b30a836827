//! A single tracked line of work inside a [`Surface`](crate::Surface).
//!
//! A [`Row`] follows a "Hot/Cold" split:
//!
//! * **Hot Data:** Completed count, total, finished and visibility flags live in atomics so
//!   an iterator can advance its row on every element without contending for a lock.
//! * **Cold Data:** The label and stop time sit behind an [`RwLock`](parking_lot::RwLock).
//!
//! Every row also owns an [`indicatif::ProgressBar`] that mirrors its state. The row is the
//! source of truth; the bar is only what gets drawn.
//!
//! Rows are created by [`Surface::add_row`](crate::Surface::add_row) and mutated through the
//! surface so that read-modify-write sequences can be coordinated under the surface lock.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use compact_str::CompactString;
use indicatif::{ProgressBar, ProgressDrawTarget};
use parking_lot::RwLock;
use web_time::Instant;

use crate::builder::RowStyles;

/// Sentinel stored in the total atomic while the total is unknown.
const UNKNOWN_TOTAL: u64 = u64::MAX;

/// Largest total a row can hold; known totals are clamped below the sentinel.
const MAX_TOTAL: u64 = UNKNOWN_TOTAL - 1;

/// Opaque identifier of a row within its surface.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowId(pub(crate) u64);

/// Defines how a row is drawn.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RowKind {
    /// A spinner, used while the total number of items is unknown.
    #[default]
    Spinner,
    /// A bar, used once the total is known.
    Bar,
}

/// A thread-safe, cloneable handle to one row of a progress surface.
///
/// Cloning a `Row` is cheap (Arc bump) and points to the same underlying state.
#[derive(Clone)]
pub struct Row {
    pub(crate) inner: Arc<RowInner>,
}

pub(crate) struct RowInner {
    id: RowId,
    start: Instant,
    cold: RwLock<Cold>,

    completed: AtomicU64,
    total: AtomicU64,
    finished: AtomicBool,
    visible: AtomicBool,

    bar: ProgressBar,
    styles: Arc<RowStyles>,
}

/// "Cold" storage for metadata that changes infrequently.
struct Cold {
    label: CompactString,
    stopped: Option<Instant>,
}

impl core::fmt::Debug for Row {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Row")
            .field("id", &self.inner.id)
            .field("label", &self.label())
            .field("completed", &self.completed())
            .field("total", &self.total())
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

impl Row {
    pub(crate) fn new(
        id: RowId,
        label: CompactString,
        total: Option<u64>,
        styles: Arc<RowStyles>,
    ) -> Self {
        let total = total.map(|total| total.min(MAX_TOTAL));
        let style = if total.is_some() {
            styles.bar.clone()
        } else {
            styles.spinner.clone()
        };
        let bar =
            ProgressBar::with_draw_target(total, ProgressDrawTarget::hidden()).with_style(style);
        bar.set_message(label.to_string());
        if let Some(interval) = styles.steady_tick {
            bar.enable_steady_tick(interval);
        }

        Self {
            inner: Arc::new(RowInner {
                id,
                start: Instant::now(),
                cold: RwLock::new(Cold { label, stopped: None }),
                completed: AtomicU64::new(0),
                total: AtomicU64::new(total.unwrap_or(UNKNOWN_TOTAL)),
                finished: AtomicBool::new(false),
                visible: AtomicBool::new(true),
                bar,
                styles,
            }),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the identifier of this row within its surface.
    #[must_use]
    pub fn id(&self) -> RowId {
        self.inner.id
    }

    /// Gets the label drawn in front of the row.
    #[must_use]
    pub fn label(&self) -> CompactString {
        self.inner.cold.read().label.clone()
    }

    /// Replaces the label drawn in front of the row.
    pub fn set_label(&self, label: impl Into<CompactString>) {
        let label = label.into();
        self.inner.bar.set_message(label.to_string());
        self.inner.cold.write().label = label;
    }

    /// Number of items completed so far.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// The expected number of items, or `None` while unknown.
    #[must_use]
    pub fn total(&self) -> Option<u64> {
        match self.inner.total.load(Ordering::Acquire) {
            UNKNOWN_TOTAL => None,
            total => Some(total),
        }
    }

    /// Whether the row draws as a bar or a spinner right now.
    #[must_use]
    pub fn kind(&self) -> RowKind {
        if self.total().is_some() {
            RowKind::Bar
        } else {
            RowKind::Spinner
        }
    }

    /// Checks if the row has been finalized.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::Acquire)
    }

    /// Checks if the row is currently attached to the display.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.inner.visible.load(Ordering::Acquire)
    }

    /// Duration since the row was created, frozen once it finishes.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        let cold = self.inner.cold.read();
        cold.stopped.map_or_else(
            || self.inner.start.elapsed(),
            |stopped| stopped.duration_since(self.inner.start),
        )
    }

    /// Returns the current completion percentage (0.0 to 100.0).
    ///
    /// Returns `0.0` while the total is unknown or zero.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn percent(&self) -> f64 {
        match self.total() {
            Some(total) if total > 0 => (self.completed() as f64 / total as f64) * 100.0,
            _ => 0.0,
        }
    }

    /// Creates a consistent snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> RowSnapshot {
        self.into()
    }

    // ========================================================================
    // Mutation (driven by the owning surface)
    // ========================================================================

    pub(crate) fn bar(&self) -> &ProgressBar {
        &self.inner.bar
    }

    /// Advances the completed count, growing a known total so it is never exceeded.
    pub(crate) fn advance(&self, amount: u64) {
        let completed = self.inner.completed.fetch_add(amount, Ordering::AcqRel) + amount;
        self.inner.bar.inc(amount);
        self.grow_total_to(completed);
    }

    pub(crate) fn set_completed(&self, completed: u64) {
        self.inner.completed.store(completed, Ordering::Release);
        self.inner.bar.set_position(completed);
        self.grow_total_to(completed);
    }

    /// Sets a known total. A total below the completed count is raised to it.
    pub(crate) fn set_total(&self, total: u64) {
        let total = total.max(self.completed()).min(MAX_TOTAL);
        let previous = self.inner.total.swap(total, Ordering::AcqRel);
        if previous == UNKNOWN_TOTAL {
            self.inner.bar.set_style(self.inner.styles.bar.clone());
        }
        self.inner.bar.set_length(total);
    }

    /// Flips the visibility flag, returning the previous value.
    pub(crate) fn swap_visible(&self, visible: bool) -> bool {
        self.inner.visible.swap(visible, Ordering::AcqRel)
    }

    /// Marks the row finished, records the stop time and freezes the drawn bar.
    pub(crate) fn finish(&self) {
        if self.inner.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.inner.cold.write().stopped.replace(Instant::now());
        self.inner.bar.finish();
    }

    fn grow_total_to(&self, completed: u64) {
        let completed = completed.min(MAX_TOTAL);
        let mut current = self.inner.total.load(Ordering::Acquire);
        while current != UNKNOWN_TOTAL && current < completed {
            match self.inner.total.compare_exchange_weak(
                current,
                completed,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.inner.bar.set_length(completed);
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }
}

/// A plain-data snapshot of a [`Row`] at a specific point in time.
///
/// Holds owned data and requires no locking to access.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowSnapshot {
    kind: RowKind,
    label: CompactString,
    elapsed: Duration,
    completed: u64,
    total: Option<u64>,
    finished: bool,
    visible: bool,
}

impl From<&Row> for RowSnapshot {
    fn from(row: &Row) -> Self {
        Self {
            kind: row.kind(),
            label: row.label(),
            elapsed: row.elapsed(),
            completed: row.completed(),
            total: row.total(),
            finished: row.is_finished(),
            visible: row.is_visible(),
        }
    }
}

impl RowSnapshot {
    /// Returns how the row was being drawn.
    #[must_use]
    pub const fn kind(&self) -> RowKind {
        self.kind
    }

    /// Returns the label of the row.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the elapsed duration.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns the completed count.
    #[must_use]
    pub const fn completed(&self) -> u64 {
        self.completed
    }

    /// Returns the total, if known.
    #[must_use]
    pub const fn total(&self) -> Option<u64> {
        self.total
    }

    /// Returns whether the row was finished.
    #[must_use]
    pub const fn finished(&self) -> bool {
        self.finished
    }

    /// Returns whether the row was attached to the display.
    #[must_use]
    pub const fn visible(&self) -> bool {
        self.visible
    }

    /// Estimates the time remaining (ETA) based on average speed since start.
    ///
    /// Returns `None` if:
    /// * No progress has been made.
    /// * The total is unknown or zero.
    /// * The row is finished.
    /// * Elapsed time is effectively zero.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn eta(&self) -> Option<Duration> {
        let total = self.total?;
        if self.completed == 0 || total == 0 || self.finished {
            return None;
        }

        let secs = self.elapsed.as_secs_f64();
        if secs <= 1e-6 {
            return None;
        }

        let rate = self.completed as f64 / secs;
        let remaining = total.saturating_sub(self.completed) as f64;
        Some(Duration::from_secs_f64(remaining / rate))
    }

    /// Average throughput (items per second) over the lifetime of the row.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.completed as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::{MAX_TOTAL, Row, RowId, RowKind, RowSnapshot};
    use crate::builder::SurfaceBuilder;

    fn row(total: Option<u64>) -> Row {
        let styles = SurfaceBuilder::hidden().styles().unwrap();
        Row::new(RowId(0), "row".into(), total, Arc::new(styles))
    }

    /// Basic Lifecycle
    /// Verifies the fundamental state machine: New -> Advance -> Finish.
    #[test]
    #[allow(clippy::float_cmp)]
    fn test_basic_lifecycle() {
        let r = row(Some(100));

        assert_eq!(r.completed(), 0);
        assert_eq!(r.kind(), RowKind::Bar);
        assert!(!r.is_finished());
        assert_eq!(r.percent(), 0.0);

        r.advance(50);
        assert_eq!(r.completed(), 50);
        assert_eq!(r.percent(), 50.0);

        r.finish();
        assert!(r.is_finished());
        let frozen = r.elapsed();
        assert_eq!(r.elapsed(), frozen, "elapsed is frozen once finished");
    }

    /// Total Never Exceeded
    /// Advancing past a known total raises the total instead.
    #[test]
    fn test_advance_grows_total() {
        let r = row(Some(2));
        r.advance(3);
        assert_eq!(r.completed(), 3);
        assert_eq!(r.total(), Some(3));

        r.set_total(1);
        assert_eq!(r.total(), Some(3), "total is clamped up to completed");
    }

    /// Spinner Promotion
    /// A row without a total becomes a bar once a total is set.
    #[test]
    fn test_spinner_becomes_bar() {
        let r = row(None);
        r.advance(4);
        assert_eq!(r.kind(), RowKind::Spinner);
        assert_eq!(r.total(), None, "unknown totals are not grown");

        r.set_total(r.completed());
        assert_eq!(r.kind(), RowKind::Bar);
        assert_eq!(r.total(), Some(4));
    }

    /// Concurrency & Atomics
    /// Ensures that high-contention updates from multiple threads are lossless.
    #[test]
    fn test_concurrency_atomics() {
        let r = row(None);
        let mut handles = vec![];

        for _ in 0..10 {
            let r_ref = r.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    r_ref.advance(1);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(r.completed(), 1000, "Atomic updates should be lossless");
    }

    /// Snapshot Metadata
    /// Verifies that cold data and derived metrics reach snapshots.
    #[allow(clippy::float_cmp)]
    #[test]
    fn test_snapshot_metadata() {
        let r = row(Some(10));
        r.set_label("renamed");

        let snap = r.snapshot();
        assert_eq!(snap.label(), "renamed");
        assert_eq!(snap.total(), Some(10));
        assert!(snap.visible());
        assert!(snap.eta().is_none(), "no progress means no ETA");

        r.finish();
        assert!(r.snapshot().eta().is_none(), "finished rows have no ETA");
    }

    /// Largest Total
    /// A total of `u64::MAX` is still a known total, not the unknown marker.
    #[test]
    fn test_max_total_stays_known() {
        let r = row(Some(u64::MAX));
        assert_eq!(r.kind(), RowKind::Bar);
        assert_eq!(r.total(), Some(MAX_TOTAL));

        let r = row(None);
        r.set_total(u64::MAX);
        assert_eq!(r.kind(), RowKind::Bar);
        assert_eq!(r.total(), Some(MAX_TOTAL));
    }

    /// Throughput
    /// Items per second over the elapsed time, zero before any time has passed.
    #[allow(clippy::float_cmp)]
    #[test]
    fn test_throughput() {
        let idle = RowSnapshot::default();
        assert_eq!(idle.throughput(), 0.0);

        let snap = RowSnapshot {
            completed: 30,
            elapsed: Duration::from_secs(3),
            ..RowSnapshot::default()
        };
        assert_eq!(snap.throughput(), 10.0);
    }
}
