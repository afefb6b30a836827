//! The "current surface" shared by wrapped iterators.
//!
//! Wrapped iterators do not own a display. They borrow whichever [`Surface`] their
//! [`SurfaceSlot`] currently holds, creating and starting one only when the slot is empty.
//! That is what lets a loop nested inside another loop, or two loops running on different
//! threads, draw their rows in the same block.
//!
//! The slot is emptied again by the wrapper whose finalization leaves every row on the
//! surface finished, so the next unrelated loop starts from a fresh display.
//!
//! # Locking
//!
//! The slot lock is always taken before the surface's update lock. Both "acquire a surface
//! and add a row" and "finalize a row and maybe tear the surface down" run entirely under
//! the slot lock, so a wrapper can never be handed a surface that is being stopped.

use std::sync::{Arc, LazyLock};

use compact_str::CompactString;
use parking_lot::Mutex;

use crate::{
    builder::SurfaceBuilder,
    row::Row,
    surface::{RowUpdate, Surface},
};

static GLOBAL: LazyLock<SurfaceSlot> = LazyLock::new(SurfaceSlot::new);

/// A cheaply cloneable holder for the surface that wrapped iterators draw into.
///
/// Use [`SurfaceSlot::global`] for the process-wide slot, or create private slots to keep
/// groups of iterators (or tests) apart.
#[derive(Clone, Default)]
pub struct SurfaceSlot {
    current: Arc<Mutex<Option<Surface>>>,
}

impl core::fmt::Debug for SurfaceSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SurfaceSlot")
            .field("occupied", &self.is_occupied())
            .finish()
    }
}

impl SurfaceSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide slot.
    ///
    /// Used by [`ProgressIteratorExt::progress_bar`] and the free function
    /// [`progress_bar`](crate::progress_bar).
    ///
    /// [`ProgressIteratorExt::progress_bar`]: crate::ProgressIteratorExt::progress_bar
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Returns the surface currently held, if any.
    #[must_use]
    pub fn current(&self) -> Option<Surface> {
        self.current.lock().clone()
    }

    /// Checks if the slot currently holds a surface.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Adds a row to the current surface, creating and starting one from `builder` if the
    /// slot is empty.
    pub(crate) fn attach(
        &self,
        builder: &SurfaceBuilder,
        label: CompactString,
        total: Option<u64>,
    ) -> (Surface, Row) {
        let mut current = self.current.lock();
        let surface = match current.as_ref() {
            Some(surface) => surface.clone(),
            None => {
                let surface = builder.clone().build_or_default();
                surface.start();
                *current = Some(surface.clone());
                surface
            }
        };

        let row = surface.add_row(label, total);
        (surface, row)
    }

    /// Finalizes `row` and tears the surface down if that was its last unfinished row.
    ///
    /// The row's total is pinned to what was actually completed, so a loop left early
    /// still draws as complete. A transient row is removed outright.
    pub(crate) fn detach(&self, surface: &Surface, row: &Row, transient: bool) {
        let mut current = self.current.lock();

        let finished = {
            let mut rows = surface.lock();
            let completed = row.completed();
            rows.update(row, RowUpdate::new().total(completed).visible(!transient));
            rows.finish(row);
            if transient {
                let _ = rows.remove(row);
            }
            rows.is_finished()
        };

        if finished {
            surface.stop();
            if current.as_ref().is_some_and(|held| held.ptr_eq(surface)) {
                log::debug!("all progress rows finished, releasing surface");
                *current = None;
            }
        }
    }
}
