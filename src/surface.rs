//! A multi-row progress display.
//!
//! The [`Surface`] is the registry behind one visible block of progress rows. Drawing is
//! delegated to an [`indicatif::MultiProgress`]; the surface only keeps the list of rows and
//! decides when the display is started, updated and stopped.
//!
//! # Synchronization Strategy
//!
//! The list of rows is protected by a coarse-grained [`Mutex`](parking_lot::Mutex), the
//! surface's update lock. Advancing a row does **not** take the lock; it only touches the
//! row's atomics. Anything that reads a row and then writes it back based on what it read
//! (finalizing a row, checking whether the whole surface is done) goes through
//! [`Surface::lock`] so it cannot interleave with another writer.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use compact_str::CompactString;
use indicatif::{MultiProgress, ProgressDrawTarget};
use parking_lot::{Mutex, MutexGuard};

use crate::{
    builder::{DrawTarget, RowStyles, SurfaceBuilder},
    row::{Row, RowId, RowSnapshot},
};

/// A thread-safe, shared-clonable progress display made of rows.
///
/// Cloning is cheap (pointer copy), and mutations on one clone are visible to all others.
/// A surface starts out stopped: nothing is drawn until [`start`](Self::start).
#[derive(Clone)]
pub struct Surface {
    inner: Arc<Inner>,
}

struct Inner {
    rows: Mutex<Vec<Row>>,
    multi: MultiProgress,
    styles: Arc<RowStyles>,
    target: DrawTarget,
    refresh_hz: u8,
    transient: bool,
    started: AtomicBool,
    next_id: AtomicU64,
}

impl core::fmt::Debug for Surface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Only metadata; row state is available through `snapshot`.
        f.debug_struct("Surface")
            .field("rows", &self.inner.rows.lock().len())
            .field("target", &self.inner.target)
            .field("transient", &self.inner.transient)
            .field("started", &self.is_started())
            .finish()
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

/// A batch of changes applied to one row by [`Surface::update`].
///
/// Fields are applied in a fixed order: total, completed, advance, visibility.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RowUpdate {
    advance: Option<u64>,
    completed: Option<u64>,
    total: Option<u64>,
    visible: Option<bool>,
}

impl RowUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            advance: None,
            completed: None,
            total: None,
            visible: None,
        }
    }

    /// Adds `amount` to the completed count.
    #[must_use]
    pub const fn advance(mut self, amount: u64) -> Self {
        self.advance = Some(amount);
        self
    }

    /// Sets the completed count.
    #[must_use]
    pub const fn completed(mut self, completed: u64) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Sets the total. A total below the completed count is raised to it.
    #[must_use]
    pub const fn total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    /// Attaches the row to, or detaches it from, the display.
    #[must_use]
    pub const fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }
}

impl Surface {
    /// Creates a stopped surface with the default columns, drawing to stderr once started.
    #[must_use]
    pub fn new() -> Self {
        SurfaceBuilder::new().build_or_default()
    }

    pub(crate) fn from_parts(builder: &SurfaceBuilder, styles: Arc<RowStyles>) -> Self {
        log::debug!(
            "creating progress surface (target: {:?}, transient: {})",
            builder.target,
            builder.transient
        );
        Self {
            inner: Arc::new(Inner {
                rows: Mutex::new(Vec::new()),
                multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
                styles,
                target: builder.target,
                refresh_hz: builder.refresh_hz,
                transient: builder.transient,
                started: AtomicBool::new(false),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Returns `true` if both handles refer to the same surface.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Starts drawing to the configured target. Does nothing if already started.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!("starting progress surface");
        self.inner
            .multi
            .set_draw_target(self.inner.target.to_indicatif(self.inner.refresh_hz));
    }

    /// Stops drawing. Does nothing if not started.
    ///
    /// A transient surface clears what it drew; otherwise the last frame stays on screen.
    pub fn stop(&self) {
        if !self.inner.started.swap(false, Ordering::AcqRel) {
            return;
        }
        log::debug!("stopping progress surface");
        if self.inner.transient {
            if let Err(err) = self.inner.multi.clear() {
                log::debug!("could not clear progress surface: {err}");
            }
        }
        self.inner.multi.set_draw_target(ProgressDrawTarget::hidden());
    }

    /// Checks if the surface is currently drawing.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// Whether this surface clears itself when stopped.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.inner.transient
    }

    /// Starts the surface and returns a guard that stops it when dropped.
    #[must_use]
    pub fn activate(self) -> ActiveSurface {
        self.start();
        ActiveSurface(self)
    }

    // ========================================================================
    // Rows
    // ========================================================================

    /// Creates a new row, adds it to the surface, and returns the handle.
    ///
    /// A `None` total draws the row as a spinner until a total is set.
    pub fn add_row(&self, label: impl Into<CompactString>, total: Option<u64>) -> Row {
        let id = RowId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let row = Row::new(id, label.into(), total, Arc::clone(&self.inner.styles));
        log::trace!("adding progress row {id:?} ({:?}, total: {total:?})", row.label());

        let mut rows = self.inner.rows.lock();
        let _ = self.inner.multi.add(row.bar().clone());
        rows.push(row.clone());
        row
    }

    /// Adds `amount` to a row's completed count without taking the update lock.
    pub fn advance(&self, row: &Row, amount: u64) {
        row.advance(amount);
    }

    /// Applies `update` to `row` under the update lock.
    pub fn update(&self, row: &Row, update: RowUpdate) {
        self.lock().update(row, update);
    }

    /// Marks `row` finished under the update lock.
    pub fn finish_row(&self, row: &Row) {
        self.lock().finish(row);
    }

    /// Removes `row` from the surface. Returns `false` if it was not registered.
    pub fn remove_row(&self, row: &Row) -> bool {
        self.lock().remove(row)
    }

    /// Acquires the update lock for a coordinated read-modify-write of rows.
    ///
    /// The other row-mutating methods on `Surface` take this lock themselves, so do not
    /// call them while holding the guard; use the guard's methods instead.
    pub fn lock(&self) -> SurfaceLock<'_> {
        SurfaceLock {
            rows: self.inner.rows.lock(),
            inner: &self.inner,
        }
    }

    /// Checks if every row on the surface is finished.
    ///
    /// Returns `true` if the surface has no rows.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.lock().is_finished()
    }

    /// Returns the number of rows on the surface.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.rows.lock().len()
    }

    /// Returns `true` if the surface has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.rows.lock().is_empty()
    }

    /// Returns a list of handles to all rows on the surface.
    #[must_use]
    pub fn rows(&self) -> Vec<Row> {
        self.inner.rows.lock().clone()
    }

    /// Returns a snapshot of every row, in the order they were added.
    #[must_use]
    pub fn snapshot(&self) -> SurfaceSnapshot {
        // Quick lock just to clone the handles, then read each row without it.
        let rows = self.rows();
        SurfaceSnapshot(rows.iter().map(Row::snapshot).collect())
    }

    /// Prints a line above the surface without tearing the rows.
    pub fn println(&self, line: impl AsRef<str>) {
        if let Err(err) = self.inner.multi.println(line) {
            log::debug!("could not print above progress surface: {err}");
        }
    }
}

/// Exclusive access to a surface's rows, obtained from [`Surface::lock`].
pub struct SurfaceLock<'a> {
    rows: MutexGuard<'a, Vec<Row>>,
    inner: &'a Inner,
}

impl core::fmt::Debug for SurfaceLock<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SurfaceLock")
            .field("rows", &self.rows.len())
            .finish()
    }
}

impl SurfaceLock<'_> {
    /// Rows on the surface, in the order they were added.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Finds a row by id.
    #[must_use]
    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.iter().find(|row| row.id() == id)
    }

    /// Applies `update` to `row`.
    pub fn update(&self, row: &Row, update: RowUpdate) {
        if let Some(total) = update.total {
            row.set_total(total);
        }
        if let Some(completed) = update.completed {
            row.set_completed(completed);
        }
        if let Some(amount) = update.advance {
            row.advance(amount);
        }
        if let Some(visible) = update.visible {
            self.set_visible(row, visible);
        }
    }

    /// Marks `row` finished, freezing its elapsed time and bar.
    pub fn finish(&self, row: &Row) {
        log::trace!("finishing progress row {:?}", row.id());
        row.finish();
    }

    /// Removes `row`, detaching it from the display.
    pub fn remove(&mut self, row: &Row) -> bool {
        let Some(index) = self.rows.iter().position(|r| r.id() == row.id()) else {
            return false;
        };
        log::trace!("removing progress row {:?}", row.id());
        let removed = self.rows.remove(index);
        if removed.swap_visible(false) {
            self.inner.multi.remove(removed.bar());
        }
        true
    }

    /// Checks if every row is finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.rows.iter().all(Row::is_finished)
    }

    fn set_visible(&self, row: &Row, visible: bool) {
        if row.swap_visible(visible) == visible {
            return;
        }
        if visible {
            let _ = self.inner.multi.add(row.bar().clone());
        } else {
            self.inner.multi.remove(row.bar());
        }
    }
}

/// A started surface that stops itself when dropped.
///
/// Dereferences to the wrapped [`Surface`].
#[derive(Debug)]
pub struct ActiveSurface(Surface);

impl core::ops::Deref for ActiveSurface {
    type Target = Surface;

    fn deref(&self) -> &Surface {
        &self.0
    }
}

impl Drop for ActiveSurface {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// A snapshot of every row on a surface at a specific point in time.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceSnapshot(pub Vec<RowSnapshot>);

impl SurfaceSnapshot {
    /// Finds the first row with the given label.
    #[must_use]
    pub fn find(&self, label: &str) -> Option<&RowSnapshot> {
        self.0.iter().find(|row| row.label() == label)
    }
}

#[cfg(test)]
mod tests {
    use super::{RowUpdate, Surface};
    use crate::SurfaceBuilder;

    fn hidden() -> Surface {
        SurfaceBuilder::hidden().build().unwrap()
    }

    /// Surface Management
    /// Verifies adding rows and checking aggregate state.
    #[test]
    fn test_surface_operations() {
        let surface = hidden();
        assert!(surface.is_empty());
        assert!(surface.is_finished(), "an empty surface is finished");

        let bar = surface.add_row("bar", Some(100));
        let spin = surface.add_row("spin", None);

        assert_eq!(surface.len(), 2);
        assert_ne!(bar.id(), spin.id());
        assert!(!surface.is_finished());

        surface.finish_row(&bar);
        assert!(!surface.is_finished());
        surface.finish_row(&spin);
        assert!(surface.is_finished());
    }

    /// Update Ordering
    /// Total is applied before completed so a final total can be written in one update.
    #[test]
    fn test_update_fields() {
        let surface = hidden();
        let row = surface.add_row("row", None);

        surface.advance(&row, 7);
        surface.update(&row, RowUpdate::new().total(7).visible(false));
        assert_eq!(row.total(), Some(7));
        assert!(!row.is_visible());

        surface.update(&row, RowUpdate::new().completed(3).visible(true));
        assert_eq!(row.completed(), 3);
        assert!(row.is_visible());
    }

    /// Read-Modify-Write
    /// The lock guard exposes rows and applies updates while held.
    #[test]
    fn test_locked_finalize() {
        let surface = hidden();
        let row = surface.add_row("row", Some(10));
        surface.advance(&row, 4);

        {
            let guard = surface.lock();
            let completed = guard.get(row.id()).unwrap().completed();
            guard.update(&row, RowUpdate::new().total(completed));
            guard.finish(&row);
            assert!(guard.is_finished());
        }

        let snap = surface.snapshot();
        assert_eq!(snap.find("row").unwrap().total(), Some(4));
        assert!(snap.find("row").unwrap().finished());
    }

    /// Removal
    /// Removed rows no longer count toward the finished check.
    #[test]
    fn test_remove_row() {
        let surface = hidden();
        let done = surface.add_row("done", Some(1));
        let pending = surface.add_row("pending", Some(1));
        surface.finish_row(&done);

        assert!(!surface.is_finished());
        assert!(surface.remove_row(&pending));
        assert!(!surface.remove_row(&pending), "second removal is a no-op");
        assert!(surface.is_finished());
        assert!(!pending.is_visible());
    }

    /// Locked Row Listing
    /// The guard lists rows in the order they were added.
    #[test]
    fn test_locked_rows() {
        let surface = hidden();
        let first = surface.add_row("first", Some(1));
        let second = surface.add_row("second", None);

        let guard = surface.lock();
        let ids: Vec<_> = guard.rows().iter().map(|row| row.id()).collect();
        assert_eq!(ids, [first.id(), second.id()]);
        assert!(guard.get(second.id()).is_some_and(|row| row.label() == "second"));
    }

    /// Printing Above Rows
    /// Lines can be printed whether or not the surface is drawing.
    #[test]
    fn test_println() {
        let surface = hidden();
        surface.println("before start");

        let active = surface.clone().activate();
        let row = active.add_row("row", Some(2));
        active.println(format!("{} of {}", row.completed(), 2));
        drop(active);

        assert_eq!(surface.len(), 1, "printing does not add rows");
    }

    /// Start/Stop
    /// Lifecycle calls are idempotent and the guard stops on drop.
    #[test]
    fn test_lifecycle() {
        let surface = hidden();
        assert!(!surface.is_started());

        let active = surface.clone().activate();
        assert!(surface.is_started());
        active.start();
        assert!(active.is_started());

        drop(active);
        assert!(!surface.is_started());
        surface.stop();
        assert!(!surface.is_started());
    }
}
