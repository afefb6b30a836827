//! Error type for surface construction.

use compact_str::CompactString;
use indicatif::style::TemplateError;

/// Errors produced while configuring a [`Surface`](crate::Surface).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A row template could not be parsed by the rendering engine.
    #[error("invalid {which} template: {source}")]
    InvalidTemplate {
        /// Which template failed (`"bar"` or `"spinner"`).
        which: &'static str,
        /// The parse error reported by `indicatif`.
        #[source]
        source: TemplateError,
    },

    /// Bar or spinner characters were unusable.
    #[error("{which} characters need at least two glyphs, got {chars:?}")]
    InvalidChars {
        /// Which character set failed (`"progress"` or `"tick"`).
        which: &'static str,
        /// The rejected characters.
        chars: CompactString,
    },
}

/// Convenience alias for results carrying [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;
