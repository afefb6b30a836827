//! Run a batch of futures concurrently behind one progress row.
//!
//! [`Gather`] drives every future to completion on the caller's task (through
//! [`futures::future::join_all`]) and advances its row each time one settles, whichever
//! order that happens in. Results always come back in submission order.
//!
//! Unlike wrapped iterators, a gather never shares the process-wide surface: each call
//! builds a private surface that is stopped when the call returns, fails, or is dropped.
//!
//! ```
//! # futures::executor::block_on(async {
//! use stacked_progress::{Gather, SurfaceBuilder};
//!
//! let ops = (1..=3).map(|n| async move {
//!     if n == 2 { Err(format!("op {n} failed")) } else { Ok(n * 10) }
//! });
//!
//! let results = Gather::new("checking")
//!     .with_capture_errors(true)
//!     .with_surface(SurfaceBuilder::hidden())
//!     .run(ops)
//!     .await
//!     .unwrap();
//!
//! assert_eq!(results, [Ok(10), Err("op 2 failed".to_string()), Ok(30)]);
//! # });
//! ```

use core::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};

use compact_str::CompactString;
use futures::future::join_all;

use crate::{
    builder::SurfaceBuilder,
    row::Row,
    surface::{RowUpdate, Surface},
};

/// Settled outcome of one operation, tagged with the order it settled in (1-based).
type Settled<T, E> = (u64, Result<T, E>);

/// Configuration for one concurrent batch.
#[derive(Clone, Debug)]
pub struct Gather {
    label: CompactString,
    capture_errors: bool,
    surface: SurfaceBuilder,
}

impl Default for Gather {
    fn default() -> Self {
        Self::new("Processing...")
    }
}

impl Gather {
    /// A batch drawn under `label` that fails on the first error.
    #[must_use]
    pub fn new(label: impl Into<CompactString>) -> Self {
        Self {
            label: label.into(),
            capture_errors: false,
            surface: SurfaceBuilder::new(),
        }
    }

    /// Keeps failures as result values instead of failing the whole batch.
    #[must_use]
    pub const fn with_capture_errors(mut self, capture_errors: bool) -> Self {
        self.capture_errors = capture_errors;
        self
    }

    /// Configuration for the private surface.
    #[must_use]
    pub fn with_surface(mut self, surface: SurfaceBuilder) -> Self {
        self.surface = surface;
        self
    }

    /// Runs every operation to completion on a private surface.
    ///
    /// The result has one entry per operation, in submission order. With error capture
    /// enabled this never returns `Err`. Otherwise, once every operation has settled, the
    /// error of the operation that failed first is returned.
    ///
    /// An empty batch returns immediately without creating a surface.
    pub async fn run<I, F, T, E>(&self, ops: I) -> Result<Vec<Result<T, E>>, E>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, E>>,
    {
        let settled = self.settle(ops).await;
        self.collect(settled)
    }

    /// Like [`run`](Self::run), but draws on a caller-provided surface.
    ///
    /// The surface is neither started nor stopped; its new row is finished on return.
    pub async fn run_on<I, F, T, E>(
        &self,
        surface: &Surface,
        ops: I,
    ) -> Result<Vec<Result<T, E>>, E>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, E>>,
    {
        let ops: Vec<F> = ops.into_iter().collect();
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        let settled = self.track(surface, ops).await;
        self.collect(settled)
    }

    async fn settle<I, F, T, E>(&self, ops: I) -> Vec<Settled<T, E>>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, E>>,
    {
        let ops: Vec<F> = ops.into_iter().collect();
        if ops.is_empty() {
            return Vec::new();
        }

        self.run_with(self.surface.clone().build_or_default(), ops).await
    }

    /// Tracks `ops` on `surface`, which is started for as long as the batch runs.
    async fn run_with<F, T, E>(&self, surface: Surface, ops: Vec<F>) -> Vec<Settled<T, E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        let surface = surface.activate();
        self.track(&surface, ops).await
    }

    async fn track<F, T, E>(&self, surface: &Surface, ops: Vec<F>) -> Vec<Settled<T, E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        let total = ops.len() as u64;
        log::debug!("gathering {total} operations ({:?})", self.label);
        let row = surface.add_row(self.label.clone(), Some(total));
        let _finish = FinishRow {
            surface,
            row: &row,
        };
        let completed = AtomicU64::new(0);

        let tracked = ops.into_iter().map(|op| {
            let (row, completed) = (&row, &completed);
            async move {
                let outcome = op.await;
                let order = completed.fetch_add(1, Ordering::AcqRel) + 1;
                surface.update(row, RowUpdate::new().completed(order));
                (order, outcome)
            }
        });

        join_all(tracked).await
    }

    fn collect<T, E>(&self, settled: Vec<Settled<T, E>>) -> Result<Vec<Result<T, E>>, E> {
        if self.capture_errors {
            Ok(settled.into_iter().map(|(_, outcome)| outcome).collect())
        } else {
            first_failure(settled).map(|values| values.into_iter().map(Ok).collect())
        }
    }
}

/// Finishes a batch row however the batch ends, including when its future is dropped.
struct FinishRow<'a> {
    surface: &'a Surface,
    row: &'a Row,
}

impl Drop for FinishRow<'_> {
    fn drop(&mut self) {
        self.surface.finish_row(self.row);
    }
}

/// Unwraps every success, or returns the error that settled first.
fn first_failure<T, E>(settled: Vec<Settled<T, E>>) -> Result<Vec<T>, E> {
    let mut values = Vec::with_capacity(settled.len());
    let mut first: Option<(u64, E)> = None;

    for (order, outcome) in settled {
        match outcome {
            Ok(value) => values.push(value),
            Err(err) => {
                if first.as_ref().is_none_or(|(seen, _)| order < *seen) {
                    first = Some((order, err));
                }
            }
        }
    }

    match first {
        Some((_, err)) => Err(err),
        None => Ok(values),
    }
}

/// Runs `ops` concurrently under `label` and returns their values in submission order.
///
/// Every operation runs to completion; then the first error to have occurred, if any, is
/// returned.
pub async fn gather<I, F, T, E>(label: impl Into<CompactString>, ops: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let settled = Gather::new(label).settle(ops).await;
    first_failure(settled)
}

/// Runs `ops` concurrently under `label` and returns every outcome in submission order.
pub async fn gather_settled<I, F, T, E>(
    label: impl Into<CompactString>,
    ops: I,
) -> Vec<Result<T, E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let settled = Gather::new(label).settle(ops).await;
    settled.into_iter().map(|(_, outcome)| outcome).collect()
}
