// SPDX-License-Identifier: MIT

pub use crate::core::errors::{FormatterError, FormatterResult};

/// A Formatter for a filesystem type.
///
/// Implementations encapsulate all required state (I/O backend, layout parameters)
/// and lay down the low-level structure of an empty volume.
///
/// The formatter must perform a *full format* if `full_format` is `true`,
/// or a quick format otherwise.
pub trait FsFormatter {
    /// Format the filesystem.
    ///
    /// - `full_format`: if `true`, also zero the data region
    #[must_use = "format result must be checked for errors"]
    fn format(&mut self, full_format: bool) -> FormatterResult;

    /// Flush any buffered writes to disk.
    #[must_use = "flush result must be checked for errors"]
    fn flush(&mut self) -> FormatterResult {
        Ok(())
    }
}
