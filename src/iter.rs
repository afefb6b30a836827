//! Iterator adapters that draw a progress row while being consumed.
//!
//! This module provides the [`ProgressIteratorExt`] trait, which adds helper methods to any
//! Rust [`Iterator`]. Each wrapped iterator gets its own row on the shared surface held by a
//! [`SurfaceSlot`], so loops nested inside other loops draw together.
//!
//! # Totals
//!
//! * An explicit total from [`IterOptions::with_total`] wins.
//! * Otherwise, if [`Iterator::size_hint`] gives an exact length, that is the total.
//! * Otherwise the row is drawn as a spinner.
//!
//! # Finalization
//!
//! When the iterator is exhausted, or dropped early (a `break`, an early `return`, a panic
//! unwinding through the loop), its row is pinned to the number of elements the caller came
//! back from and marked finished. An element still held when the iterator is dropped is not
//! counted. If that was the last unfinished row, the surface stops and the slot is emptied.
//!
//! # Example
//!
//! ```
//! use stacked_progress::{IterOptions, ProgressIteratorExt as _, SurfaceBuilder, SurfaceSlot};
//!
//! let slot = SurfaceSlot::new();
//! let options = |label: &str| IterOptions::new(label).with_surface(SurfaceBuilder::hidden());
//!
//! let mut sum = 0;
//! for i in (0..3).progress_bar_in(&slot, options("outer")) {
//!     for j in (0..10).progress_bar_in(&slot, options("inner").with_transient(i % 2 == 1)) {
//!         sum += i * j;
//!     }
//! }
//! assert_eq!(sum, 135);
//! assert!(!slot.is_occupied());
//! ```

use core::iter::FusedIterator;

use compact_str::CompactString;

use crate::{builder::SurfaceBuilder, row::Row, slot::SurfaceSlot, surface::Surface};

/// How a wrapped iterator is labelled and drawn.
#[derive(Clone, Debug, Default)]
pub struct IterOptions {
    label: CompactString,
    transient: bool,
    total: Option<u64>,
    surface: SurfaceBuilder,
}

impl IterOptions {
    /// Options with the given label, a persistent row, and the default surface.
    #[must_use]
    pub fn new(label: impl Into<CompactString>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Removes the row from the surface once the iterator finishes.
    ///
    /// If this iterator is the one that creates the surface, the surface is transient too.
    #[must_use]
    pub const fn with_transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    /// Uses an explicit total instead of the iterator's size hint.
    #[must_use]
    pub const fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    /// Configuration for the surface, used only if the slot is empty.
    #[must_use]
    pub fn with_surface(mut self, surface: SurfaceBuilder) -> Self {
        self.surface = surface;
        self
    }
}

impl From<&str> for IterOptions {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for IterOptions {
    fn from(label: String) -> Self {
        Self::new(label)
    }
}

/// An iterator adapter that forwards every element and advances a progress row.
///
/// An element counts as consumed once the caller comes back for the next one. The element
/// held when the iterator is dropped early never counts.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct ProgressIter<I> {
    iter: I,
    slot: SurfaceSlot,
    surface: Surface,
    row: Row,
    transient: bool,
    pending: bool,
    done: bool,
}

impl<I> core::fmt::Debug for ProgressIter<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressIter")
            .field("row", &self.row)
            .field("transient", &self.transient)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<I: Iterator> ProgressIter<I> {
    /// Attaches a new row for `iter` to the surface held by `slot`.
    ///
    /// Note: This is usually constructed via [`ProgressIteratorExt`] methods.
    pub fn new(iter: I, slot: &SurfaceSlot, options: IterOptions) -> Self {
        let total = options.total.or_else(|| exact_len(&iter));
        let builder = if options.transient {
            options.surface.with_transient(true)
        } else {
            options.surface
        };
        let (surface, row) = slot.attach(&builder, options.label, total);

        Self {
            iter,
            slot: slot.clone(),
            surface,
            row,
            transient: options.transient,
            pending: false,
            done: false,
        }
    }
}

impl<I> ProgressIter<I> {
    /// The row this iterator advances.
    pub const fn row(&self) -> &Row {
        &self.row
    }

    /// The surface the row is drawn on.
    pub const fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Counts the element handed out by the previous `next` call.
    fn settle(&mut self) {
        if core::mem::take(&mut self.pending) {
            self.surface.advance(&self.row, 1);
        }
    }

    fn finalize(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        self.slot.detach(&self.surface, &self.row, self.transient);
    }
}

impl<I: Iterator> Iterator for ProgressIter<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.settle();

        let item = self.iter.next();
        if item.is_some() {
            self.pending = true;
        } else {
            self.finalize();
        }
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            self.iter.size_hint()
        }
    }
}

impl<I: Iterator> FusedIterator for ProgressIter<I> {}

impl<I> Drop for ProgressIter<I> {
    fn drop(&mut self) {
        // The body for the held element did not complete.
        self.pending = false;
        self.finalize();
    }
}

/// Extension trait to attach a progress row to any Iterator.
pub trait ProgressIteratorExt: Iterator + Sized {
    /// Wraps the iterator in a row on the process-wide surface.
    fn progress_bar(self, label: impl Into<CompactString>) -> ProgressIter<Self>;

    /// Wraps the iterator in a row on the process-wide surface, with full options.
    fn progress_bar_with(self, options: IterOptions) -> ProgressIter<Self>;

    /// Wraps the iterator in a row on the surface held by `slot`.
    fn progress_bar_in(self, slot: &SurfaceSlot, options: IterOptions) -> ProgressIter<Self>;
}

impl<I: Iterator> ProgressIteratorExt for I {
    fn progress_bar(self, label: impl Into<CompactString>) -> ProgressIter<Self> {
        self.progress_bar_with(IterOptions::new(label))
    }

    fn progress_bar_with(self, options: IterOptions) -> ProgressIter<Self> {
        ProgressIter::new(self, SurfaceSlot::global(), options)
    }

    fn progress_bar_in(self, slot: &SurfaceSlot, options: IterOptions) -> ProgressIter<Self> {
        ProgressIter::new(self, slot, options)
    }
}

/// Wraps anything iterable in a row on the process-wide surface.
///
/// Accepts a label or full [`IterOptions`].
pub fn progress_bar<T: IntoIterator>(
    iterable: T,
    options: impl Into<IterOptions>,
) -> ProgressIter<T::IntoIter> {
    ProgressIter::new(iterable.into_iter(), SurfaceSlot::global(), options.into())
}

/// The exact number of remaining elements, if the size hint pins it down.
fn exact_len<I: Iterator>(iter: &I) -> Option<u64> {
    match iter.size_hint() {
        (lower, Some(upper)) if lower == upper => u64::try_from(upper).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::{panic, thread};

    use super::{IterOptions, ProgressIteratorExt as _};
    use crate::{RowKind, SurfaceBuilder, SurfaceSlot};

    fn opts(label: &str) -> IterOptions {
        IterOptions::new(label).with_surface(SurfaceBuilder::hidden())
    }

    /// Iterator Integration
    /// Elements pass through untouched and the total is inferred from the length.
    #[test]
    fn test_iterator_adapter() {
        let slot = SurfaceSlot::new();
        let data = [1, 2, 3, 4, 5];

        let iter = data.iter().progress_bar_in(&slot, opts("iter_test"));
        let row = iter.row().clone();
        let surface = iter.surface().clone();
        assert_eq!(row.total(), Some(5), "Total should be inferred from slice len");
        assert_eq!(row.kind(), RowKind::Bar);

        let seen: Vec<_> = iter.copied().collect();
        assert_eq!(seen, data);
        assert_eq!(row.completed(), 5);
        assert!(row.is_finished());
        assert!(!surface.is_started(), "last row finished stops the surface");
        assert!(!slot.is_occupied());
    }

    /// Unknown Length
    /// Without a size hint the row is a spinner until it finishes with the consumed count.
    #[test]
    fn test_unknown_length() {
        let slot = SurfaceSlot::new();
        let source = (0..10).filter(|n| n % 3 != 0);

        let iter = source.progress_bar_in(&slot, opts("filtered"));
        let row = iter.row().clone();
        assert_eq!(row.kind(), RowKind::Spinner);

        assert_eq!(iter.count(), 6);
        assert_eq!(row.total(), Some(6));
        assert_eq!(row.kind(), RowKind::Bar);
    }

    /// Explicit Total
    /// An explicit total overrides the size hint.
    #[test]
    fn test_explicit_total() {
        let slot = SurfaceSlot::new();
        let iter = (0..4).progress_bar_in(&slot, opts("explicit").with_total(40));
        let row = iter.row().clone();
        assert_eq!(row.total(), Some(40));

        drop(iter);
        assert_eq!(row.total(), Some(0), "nothing consumed");
    }

    /// Advance After Consumption
    /// The row lags one behind while the caller holds an element.
    #[test]
    fn test_advance_after_consumption() {
        let slot = SurfaceSlot::new();
        let mut iter = (0..3).progress_bar_in(&slot, opts("lag"));
        let row = iter.row().clone();

        assert_eq!(iter.next(), Some(0));
        assert_eq!(row.completed(), 0);
        assert_eq!(iter.next(), Some(1));
        assert_eq!(row.completed(), 1);
    }

    /// Early Break
    /// A loop abandoned after k completed bodies finishes its row at k of k.
    #[test]
    fn test_early_break() {
        let slot = SurfaceSlot::new();
        let iter = (0..100).progress_bar_in(&slot, opts("early"));
        let row = iter.row().clone();
        let surface = iter.surface().clone();

        for i in iter {
            if i == 6 {
                break;
            }
        }

        assert_eq!(row.completed(), 6, "the element held at the break is not counted");
        assert_eq!(row.total(), Some(6));
        assert!(row.is_finished());
        assert!(!surface.is_started());
        assert!(!slot.is_occupied());
    }

    /// Dropped Mid-Iteration
    /// Dropping the wrapper while holding an element counts only the elements before it.
    #[test]
    fn test_drop_while_holding() {
        let slot = SurfaceSlot::new();
        let mut iter = (0..10).progress_bar_in(&slot, opts("held"));
        let row = iter.row().clone();

        assert_eq!(iter.next(), Some(0));
        assert_eq!(iter.next(), Some(1));
        assert_eq!(iter.next(), Some(2));
        drop(iter);

        assert_eq!(row.completed(), 2);
        assert_eq!(row.total(), Some(2));
        assert!(row.is_finished());
    }

    /// Fused After Finalization
    /// The wrapper is one-shot even if the source would yield again.
    #[test]
    fn test_fused() {
        let slot = SurfaceSlot::new();
        let mut flip = false;
        let source = core::iter::from_fn(move || {
            flip = !flip;
            if flip { None } else { Some(()) }
        });

        let mut iter = source.progress_bar_in(&slot, opts("fused"));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
        assert_eq!(iter.size_hint(), (0, Some(0)));
    }

    /// Nesting
    /// Inner rows share the outer surface, which outlives every inner loop.
    #[test]
    fn test_nesting() {
        let slot = SurfaceSlot::new();
        let outer = (0..3).progress_bar_in(&slot, opts("outer"));
        let surface = outer.surface().clone();

        for i in outer {
            let options = opts(&format!("sub {i}")).with_transient(i % 2 == 1);
            let inner = (0..10).progress_bar_in(&slot, options);
            assert!(inner.surface().ptr_eq(&surface), "nested rows share one surface");
            for _ in inner {}
            assert!(surface.is_started(), "outer loop still running");
            assert!(slot.is_occupied());
        }

        assert!(!surface.is_started());
        assert!(!slot.is_occupied());

        let snap = surface.snapshot();
        let labels: Vec<_> = snap.0.iter().map(|row| row.label()).collect();
        assert_eq!(labels, ["outer", "sub 0", "sub 2"], "transient sub 1 was removed");
        assert!(snap.0.iter().all(|row| row.finished() && row.visible()));
        assert_eq!(snap.find("outer").unwrap().total(), Some(3));
        assert_eq!(snap.find("sub 2").unwrap().completed(), 10);
    }

    /// Fresh Surface
    /// A loop started after the previous surface was released gets a new one.
    #[test]
    fn test_fresh_surface_after_release() {
        let slot = SurfaceSlot::new();
        let first = (0..2).progress_bar_in(&slot, opts("first"));
        let first_surface = first.surface().clone();
        first.for_each(drop);

        let second = (0..2).progress_bar_in(&slot, opts("second"));
        assert!(!second.surface().ptr_eq(&first_surface));
        assert_eq!(second.surface().len(), 1);
    }

    /// Panics Still Clean Up
    /// A panicking source unwinds through the wrapper, which still finalizes its row.
    #[test]
    fn test_panic_in_source() {
        let slot = SurfaceSlot::new();
        let observer = slot.clone();

        let result = panic::catch_unwind(panic::AssertUnwindSafe(move || {
            let source = (0..5).map(|n| {
                assert!(n != 3, "boom");
                n
            });
            source.progress_bar_in(&slot, opts("panics")).for_each(drop);
        }));

        assert!(result.is_err());
        assert!(!observer.is_occupied(), "surface released during unwinding");
    }

    /// Threads Sharing A Surface
    /// Rows driven from several threads share one surface, torn down after the last one.
    #[test]
    fn test_threads_share_surface() {
        let slot = SurfaceSlot::new();
        let anchor = (0..1).progress_bar_in(&slot, opts("anchor"));
        let surface = anchor.surface().clone();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let slot = slot.clone();
                thread::spawn(move || {
                    (0..50u32)
                        .progress_bar_in(&slot, opts(&format!("worker {t}")))
                        .sum::<u32>()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1225);
        }

        assert!(surface.is_started(), "anchor row keeps the surface alive");
        assert_eq!(surface.len(), 5);
        drop(anchor);
        assert!(!surface.is_started());
        assert!(!slot.is_occupied());
    }
}
