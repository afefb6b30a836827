//! Fluent configuration for [`Surface`] instances.
//!
//! Everything here is passed through to the rendering engine (`indicatif`). The defaults
//! draw one line per row with these columns:
//!
//! * label
//! * spinner
//! * completed/total
//! * bar
//! * percentage
//! * elapsed time
//! * remaining time
//!
//! Rows whose total is unknown use a reduced spinner template until a total is set.
//!
//! ```
//! use stacked_progress::{DrawTarget, SurfaceBuilder};
//!
//! let surface = SurfaceBuilder::new()
//!     .with_draw_target(DrawTarget::Hidden)
//!     .with_transient(true)
//!     .build()
//!     .unwrap();
//! assert!(surface.is_finished());
//! ```

use std::{sync::Arc, time::Duration};

use compact_str::CompactString;
use indicatif::{ProgressDrawTarget, ProgressStyle};

use crate::{
    error::{Error, Result},
    surface::Surface,
};

/// Template for rows with a known total.
pub const DEFAULT_BAR_TEMPLATE: &str = concat!(
    "{msg} {spinner:.green} {pos}/{len} {wide_bar:.cyan/blue} ",
    "{percent:>3}% {elapsed_precise} {eta_precise}",
);

/// Template for rows whose total is unknown.
pub const DEFAULT_SPINNER_TEMPLATE: &str = "{msg} {spinner:.green} {pos}/? {elapsed_precise}";

const DEFAULT_REFRESH_HZ: u8 = 10;
const DEFAULT_STEADY_TICK: Duration = Duration::from_millis(100);

/// Where a surface draws once started.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DrawTarget {
    /// Draw to standard error.
    #[default]
    Stderr,
    /// Draw to standard output.
    Stdout,
    /// Draw nothing. State is still tracked.
    Hidden,
}

impl DrawTarget {
    pub(crate) fn to_indicatif(self, refresh_hz: u8) -> ProgressDrawTarget {
        match self {
            Self::Stderr => ProgressDrawTarget::stderr_with_hz(refresh_hz),
            Self::Stdout => ProgressDrawTarget::stdout_with_hz(refresh_hz),
            Self::Hidden => ProgressDrawTarget::hidden(),
        }
    }
}

/// Parsed row styles shared by every row of one surface.
#[derive(Clone)]
pub(crate) struct RowStyles {
    pub(crate) bar: ProgressStyle,
    pub(crate) spinner: ProgressStyle,
    pub(crate) steady_tick: Option<Duration>,
}

impl core::fmt::Debug for RowStyles {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RowStyles")
            .field("steady_tick", &self.steady_tick)
            .finish_non_exhaustive()
    }
}

/// A builder for constructing [`Surface`] instances.
#[derive(Clone, Debug)]
pub struct SurfaceBuilder {
    pub(crate) target: DrawTarget,
    pub(crate) refresh_hz: u8,
    pub(crate) transient: bool,
    bar_template: CompactString,
    spinner_template: CompactString,
    progress_chars: Option<CompactString>,
    tick_chars: Option<CompactString>,
    steady_tick: Option<Duration>,
}

impl Default for SurfaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceBuilder {
    /// Starts from the default columns, drawing to stderr.
    #[must_use]
    pub fn new() -> Self {
        Self {
            target: DrawTarget::Stderr,
            refresh_hz: DEFAULT_REFRESH_HZ,
            transient: false,
            bar_template: DEFAULT_BAR_TEMPLATE.into(),
            spinner_template: DEFAULT_SPINNER_TEMPLATE.into(),
            progress_chars: None,
            tick_chars: None,
            steady_tick: Some(DEFAULT_STEADY_TICK),
        }
    }

    /// Starts from the default columns with nothing drawn and no ticker threads.
    ///
    /// Useful for tests and non-interactive environments.
    #[must_use]
    pub fn hidden() -> Self {
        Self::new()
            .with_draw_target(DrawTarget::Hidden)
            .with_steady_tick(None)
    }

    /// Sets where the surface draws once started.
    #[must_use]
    pub const fn with_draw_target(mut self, target: DrawTarget) -> Self {
        self.target = target;
        self
    }

    /// Sets the maximum redraw rate. Zero is raised to one.
    #[must_use]
    pub fn with_refresh_rate(mut self, hz: u8) -> Self {
        self.refresh_hz = hz.max(1);
        self
    }

    /// Clears the whole display when the surface stops instead of leaving the final frame.
    #[must_use]
    pub const fn with_transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    /// Overrides the template for rows with a known total.
    #[must_use]
    pub fn with_bar_template(mut self, template: impl Into<CompactString>) -> Self {
        self.bar_template = template.into();
        self
    }

    /// Overrides the template for rows whose total is unknown.
    #[must_use]
    pub fn with_spinner_template(mut self, template: impl Into<CompactString>) -> Self {
        self.spinner_template = template.into();
        self
    }

    /// Characters used for the filled, current and empty parts of the bar.
    ///
    /// Needs at least two characters of equal display width.
    #[must_use]
    pub fn with_progress_chars(mut self, chars: impl Into<CompactString>) -> Self {
        self.progress_chars = Some(chars.into());
        self
    }

    /// Spinner frames, the last one shown once a row finishes.
    ///
    /// Needs at least two characters of equal display width.
    #[must_use]
    pub fn with_tick_chars(mut self, chars: impl Into<CompactString>) -> Self {
        self.tick_chars = Some(chars.into());
        self
    }

    /// Redraw interval for spinners, or `None` to only redraw on updates.
    #[must_use]
    pub const fn with_steady_tick(mut self, interval: Option<Duration>) -> Self {
        self.steady_tick = interval;
        self
    }

    /// Parses templates and characters into row styles.
    pub(crate) fn styles(&self) -> Result<RowStyles> {
        let bar = ProgressStyle::with_template(&self.bar_template)
            .map_err(|source| Error::InvalidTemplate { which: "bar", source })?;
        let spinner = ProgressStyle::with_template(&self.spinner_template)
            .map_err(|source| Error::InvalidTemplate { which: "spinner", source })?;

        let (bar, spinner) = match &self.tick_chars {
            Some(chars) => {
                check_chars("tick", chars)?;
                (bar.tick_chars(chars), spinner.tick_chars(chars))
            }
            None => (bar, spinner),
        };
        let bar = match &self.progress_chars {
            Some(chars) => {
                check_chars("progress", chars)?;
                bar.progress_chars(chars)
            }
            None => bar,
        };

        Ok(RowStyles {
            bar,
            spinner,
            steady_tick: self.steady_tick,
        })
    }

    /// Consumes the builder and returns a new, not yet started [`Surface`].
    pub fn build(self) -> Result<Surface> {
        let styles = self.styles()?;
        Ok(Surface::from_parts(&self, Arc::new(styles)))
    }

    /// Like [`build`](Self::build), falling back to the default columns if the
    /// configured templates are rejected.
    #[must_use]
    pub fn build_or_default(self) -> Surface {
        match self.styles() {
            Ok(styles) => Surface::from_parts(&self, Arc::new(styles)),
            Err(err) => {
                log::warn!("falling back to default progress columns: {err}");
                Surface::from_parts(&self, Arc::new(default_styles(self.steady_tick)))
            }
        }
    }
}

fn check_chars(which: &'static str, chars: &str) -> Result<()> {
    if chars.chars().count() < 2 {
        return Err(Error::InvalidChars {
            which,
            chars: chars.into(),
        });
    }
    Ok(())
}

/// Styles for the built-in templates, which are known to parse.
fn default_styles(steady_tick: Option<Duration>) -> RowStyles {
    RowStyles {
        bar: ProgressStyle::with_template(DEFAULT_BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        spinner: ProgressStyle::with_template(DEFAULT_SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        steady_tick,
    }
}
