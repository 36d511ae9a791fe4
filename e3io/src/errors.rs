// SPDX-License-Identifier: MIT

use core::fmt;

/// Result of a sector transfer.
pub type IoResult<T = ()> = core::result::Result<T, IoError>;

/// Why a transfer against the image failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoError {
    /// Backend-specific failure (host I/O error text).
    Other(&'static str),
    /// The request reaches past the end of the image.
    OutOfBounds,
    /// A multi-sector buffer is not a whole number of sectors.
    Unaligned,
    Unsupported,
}

impl IoError {
    pub fn msg(&self) -> &'static str {
        match self {
            IoError::Other(msg) => msg,
            IoError::OutOfBounds => "access past the end of the image",
            IoError::Unaligned => "buffer is not a whole number of sectors",
            IoError::Unsupported => "not supported by this image backend",
        }
    }

    /// `true` when the image is shorter than the request.
    #[inline]
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, IoError::OutOfBounds)
    }
}

impl From<&'static str> for IoError {
    #[inline]
    fn from(msg: &'static str) -> Self {
        IoError::Other(msg)
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.msg())
    }
}

#[cfg(all(test, feature = "std"))]
mod test {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(IoError::OutOfBounds.to_string(), "access past the end of the image");
        assert_eq!(IoError::from("host said no").to_string(), "host said no");
        assert!(IoError::OutOfBounds.is_out_of_bounds());
        assert!(!IoError::Unaligned.is_out_of_bounds());
    }
}
