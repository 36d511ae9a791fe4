// SPDX-License-Identifier: MIT

pub use e3io::errors::*;

/// Flat classification of every failure the driver can report.
///
/// VFS glue maps these onto its own error codes; the layered enums below keep
/// the detail for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidFormat,
    CorruptLayout,
    OutOfSpace,
    NotFound,
    AlreadyExists,
    CrossDirectoryRenameUnsupported,
    NotEmpty,
    OutOfBounds,
    NameTooLong,
    InvalidName,
    NotADirectory,
    IsADirectory,
    PermissionDenied,
    Corrupted,
    Io,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    IO(IoError),
    /// Signature mismatch or undecodable superblock field.
    InvalidFormat,
    /// A region lies outside the device or overlaps another one.
    CorruptLayout(&'static str),
    Other(&'static str),
}

impl GeometryError {
    pub fn msg(&self) -> &'static str {
        match self {
            GeometryError::IO(_) => "IO error",
            GeometryError::InvalidFormat => "Volume is not an EMU3 disk",
            GeometryError::CorruptLayout(msg) => msg,
            GeometryError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<E3Error> {
        match self {
            GeometryError::IO(e) => Some(E3Error::IO(*e)),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GeometryError::IO(_) => ErrorKind::Io,
            GeometryError::InvalidFormat => ErrorKind::InvalidFormat,
            GeometryError::CorruptLayout(_) => ErrorKind::CorruptLayout,
            GeometryError::Other(_) => ErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterError {
    /// No free cluster left in the table.
    OutOfSpace,
    /// Chain ended before the requested position.
    NotFound,
    /// A link points outside `1..=clusters`.
    InvalidCluster(u16),
    LoopDetected,
    Other(&'static str),
}

impl ClusterError {
    pub fn msg(&self) -> &'static str {
        match self {
            ClusterError::OutOfSpace => "No free cluster",
            ClusterError::NotFound => "Cluster chain too short",
            ClusterError::InvalidCluster(_) => "Invalid cluster in chain",
            ClusterError::LoopDetected => "Loop detected in cluster chain",
            ClusterError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<E3Error> {
        None
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClusterError::OutOfSpace => ErrorKind::OutOfSpace,
            ClusterError::NotFound => ErrorKind::NotFound,
            ClusterError::InvalidCluster(_) | ClusterError::LoopDetected => ErrorKind::Corrupted,
            ClusterError::Other(_) => ErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryError {
    IO(IoError),
    OutOfSpace,
    NotFound,
    AlreadyExists,
    NotEmpty,
    NameTooLong,
    InvalidName,
    NotADirectory,
    IsADirectory,
    /// Files at root or directories below root.
    PermissionDenied,
    CrossDirectoryRenameUnsupported,
    Corrupted(&'static str),
    Other(&'static str),
}

impl DirectoryError {
    pub fn msg(&self) -> &'static str {
        match self {
            DirectoryError::IO(_) => "IO error",
            DirectoryError::OutOfSpace => "No free directory slot",
            DirectoryError::NotFound => "Entry not found",
            DirectoryError::AlreadyExists => "Entry already exists",
            DirectoryError::NotEmpty => "Directory not empty",
            DirectoryError::NameTooLong => "Name too long",
            DirectoryError::InvalidName => "Invalid name",
            DirectoryError::NotADirectory => "Not a directory",
            DirectoryError::IsADirectory => "Is a directory",
            DirectoryError::PermissionDenied => "Operation not permitted at this level",
            DirectoryError::CrossDirectoryRenameUnsupported => {
                "Rename across directories is not supported"
            }
            DirectoryError::Corrupted(msg) => msg,
            DirectoryError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<E3Error> {
        match self {
            DirectoryError::IO(e) => Some(E3Error::IO(*e)),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DirectoryError::IO(_) => ErrorKind::Io,
            DirectoryError::OutOfSpace => ErrorKind::OutOfSpace,
            DirectoryError::NotFound => ErrorKind::NotFound,
            DirectoryError::AlreadyExists => ErrorKind::AlreadyExists,
            DirectoryError::NotEmpty => ErrorKind::NotEmpty,
            DirectoryError::NameTooLong => ErrorKind::NameTooLong,
            DirectoryError::InvalidName => ErrorKind::InvalidName,
            DirectoryError::NotADirectory => ErrorKind::NotADirectory,
            DirectoryError::IsADirectory => ErrorKind::IsADirectory,
            DirectoryError::PermissionDenied => ErrorKind::PermissionDenied,
            DirectoryError::CrossDirectoryRenameUnsupported => {
                ErrorKind::CrossDirectoryRenameUnsupported
            }
            DirectoryError::Corrupted(_) => ErrorKind::Corrupted,
            DirectoryError::Other(_) => ErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatterError {
    IO(IoError),
    Geometry(GeometryError),
    Invalid(&'static str),
    Other(&'static str),
}

impl FormatterError {
    pub fn msg(&self) -> &'static str {
        match self {
            FormatterError::IO(_) => "IO error",
            FormatterError::Geometry(_) => "Geometry error",
            FormatterError::Invalid(msg) => msg,
            FormatterError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<E3Error> {
        match self {
            FormatterError::IO(e) => Some(E3Error::IO(*e)),
            FormatterError::Geometry(e) => Some(E3Error::Geometry(*e)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerError {
    IO(IoError),
    Geometry(GeometryError),
    Directory(DirectoryError),
    Invalid(&'static str),
    Other(&'static str),
}

impl CheckerError {
    pub fn msg(&self) -> &'static str {
        match self {
            CheckerError::IO(_) => "IO error",
            CheckerError::Geometry(_) => "Geometry error",
            CheckerError::Directory(_) => "Directory error",
            CheckerError::Invalid(msg) => msg,
            CheckerError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<E3Error> {
        match self {
            CheckerError::IO(e) => Some(E3Error::IO(*e)),
            CheckerError::Geometry(e) => Some(E3Error::Geometry(*e)),
            CheckerError::Directory(e) => Some(E3Error::Directory(*e)),
            _ => None,
        }
    }
}

/// Top-level error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum E3Error {
    IO(IoError),
    Geometry(GeometryError),
    Cluster(ClusterError),
    Directory(DirectoryError),
    Formatter(FormatterError),
    Checker(CheckerError),
    /// Access beyond the region allocated to an entry.
    OutOfBounds,
    Other(&'static str),
}

impl E3Error {
    pub fn msg(&self) -> &'static str {
        match self {
            E3Error::IO(e) => e.msg(),
            E3Error::Geometry(e) => e.msg(),
            E3Error::Cluster(e) => e.msg(),
            E3Error::Directory(e) => e.msg(),
            E3Error::Formatter(e) => e.msg(),
            E3Error::Checker(e) => e.msg(),
            E3Error::OutOfBounds => "Access outside the allocated region",
            E3Error::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<E3Error> {
        match self {
            E3Error::Geometry(e) => e.source(),
            E3Error::Directory(e) => e.source(),
            E3Error::Formatter(e) => e.source(),
            E3Error::Checker(e) => e.source(),
            E3Error::Cluster(_) | E3Error::IO(_) | E3Error::OutOfBounds | E3Error::Other(_) => {
                None
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            E3Error::IO(_) => ErrorKind::Io,
            E3Error::Geometry(e) => e.kind(),
            E3Error::Cluster(e) => e.kind(),
            E3Error::Directory(e) => e.kind(),
            E3Error::Formatter(FormatterError::Geometry(e)) => e.kind(),
            E3Error::Formatter(FormatterError::IO(_)) => ErrorKind::Io,
            E3Error::Formatter(_) => ErrorKind::Other,
            E3Error::Checker(CheckerError::IO(_)) => ErrorKind::Io,
            E3Error::Checker(_) => ErrorKind::Corrupted,
            E3Error::OutOfBounds => ErrorKind::OutOfBounds,
            E3Error::Other(_) => ErrorKind::Other,
        }
    }
}

// === type *Result ===

pub type E3Result<T = ()> = Result<T, E3Error>;
pub type GeometryResult<T = ()> = Result<T, GeometryError>;
pub type ClusterResult<T = ()> = Result<T, ClusterError>;
pub type DirectoryResult<T = ()> = Result<T, DirectoryError>;
pub type FormatterResult<T = ()> = Result<T, FormatterError>;
pub type CheckerResult<T = ()> = Result<T, CheckerError>;

crate::e3_error_layers! {
    top => E3Error {
        IoError        => IO,
        GeometryError  => Geometry,
        ClusterError   => Cluster,
        DirectoryError => Directory,
        FormatterError => Formatter,
        CheckerError   => Checker,
    },
    messages => [
        GeometryError,
        ClusterError,
        DirectoryError,
        FormatterError,
        CheckerError,
    ],
    nested => {
        IoError        => [ GeometryError::IO, DirectoryError::IO, FormatterError::IO, CheckerError::IO ],
        GeometryError  => [ FormatterError::Geometry, CheckerError::Geometry ],
        DirectoryError => [ CheckerError::Directory ],
    },
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_display() {
        let low = IoError::OutOfBounds;
        let dir = DirectoryError::IO(low);
        let top = E3Error::Directory(dir);

        let text = format!("{top}");
        assert!(text.starts_with("IO error"));
        assert!(text.contains("caused by: access past the end of the image"));
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(E3Error::from(ClusterError::OutOfSpace).kind(), ErrorKind::OutOfSpace);
        assert_eq!(E3Error::from(DirectoryError::OutOfSpace).kind(), ErrorKind::OutOfSpace);
        assert_eq!(E3Error::from(GeometryError::InvalidFormat).kind(), ErrorKind::InvalidFormat);
        assert_eq!(
            E3Error::from(GeometryError::CorruptLayout("x")).kind(),
            ErrorKind::CorruptLayout
        );
        assert_eq!(E3Error::from(ClusterError::LoopDetected).kind(), ErrorKind::Corrupted);
        assert_eq!(E3Error::OutOfBounds.kind(), ErrorKind::OutOfBounds);
        assert_eq!(E3Error::from(IoError::Unsupported).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_str_into() {
        let e: DirectoryError = "boom".into();
        assert_eq!(e, DirectoryError::Other("boom"));
        let top: E3Error = "boom".into();
        assert_eq!(top.kind(), ErrorKind::Other);
    }
}
