//! # `stacked_progress`
//!
//! Terminal progress rows for loops and for batches of futures.
//!
//! `stacked_progress` does no drawing of its own; rendering is delegated to
//! [`indicatif`]. What it adds is the bookkeeping around one shared display:
//!
//! * **Wrapped iterators** ([`ProgressIteratorExt`]) borrow the surface held by a
//!   [`SurfaceSlot`], creating it on first use. Nested and concurrent loops each add a row
//!   to that same surface, and the surface is stopped only once every row on it is finished.
//! * **Gathered futures** ([`Gather`], [`gather()`], [`gather_settled`]) run a batch
//!   concurrently on a private surface with one row that advances as each future settles.
//!
//! ## Modules
//!
//! * [`builder`]: Fluent configuration passed through to the renderer.
//! * [`gather`](mod@gather): Concurrent batches of futures with a completion count.
//! * [`iter`]: Extension traits for tracking progress on Iterators.
//! * [`row`]: One tracked line of work and its snapshots.
//! * [`slot`]: The shared "current surface" used by wrapped iterators.
//! * [`surface`]: The multi-row display and its update lock.
//!
//! ## Example
//!
//! ```no_run
//! use stacked_progress::ProgressIteratorExt as _;
//!
//! for file in ["a.txt", "b.txt"].iter().progress_bar("files") {
//!     for _chunk in (0..64).progress_bar(format!("reading {file}")) {
//!         // ...
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod builder;
pub mod error;
pub mod gather;
pub mod iter;
pub mod row;
pub mod slot;
pub mod surface;

pub use builder::{DrawTarget, SurfaceBuilder};
pub use error::{Error, Result};
pub use gather::{Gather, gather, gather_settled};
pub use iter::{IterOptions, ProgressIter, ProgressIteratorExt, progress_bar};
pub use row::{Row, RowId, RowKind, RowSnapshot};
pub use slot::SurfaceSlot;
pub use surface::{ActiveSurface, RowUpdate, Surface, SurfaceLock, SurfaceSnapshot};
