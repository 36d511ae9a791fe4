// SPDX-License-Identifier: MIT

pub mod checker;
pub mod cluster;
pub mod constant;
pub mod directory;
pub mod formatter;
pub mod geometry;
pub mod pool;
pub mod readdir;
pub mod translator;
pub mod types;
pub mod volume;

pub mod prelude {
    pub use super::checker::E3Checker;
    pub use super::cluster::{ClusterLink, ClusterTable};
    pub use super::constant::*;
    pub use super::directory::{DirRef, EntryLocation};
    pub use super::formatter::{E3Formatter, FormatParams};
    pub use super::geometry::Geometry;
    pub use super::readdir::{DirEntry, ReadDir};
    pub use super::translator::BlockMapping;
    pub use super::types::*;
    pub use super::volume::{DirtyFlags, E3Volume, FileKind, Ino, Stat, VolumeStats};

    pub use crate::core::checker::{
        Finding, Severity, VerifyOptions, VerifyPhases, VerifyReport,
    };
    pub use crate::core::errors::*;
    pub use crate::core::traits::*;

    pub use e3io::prelude::*;
}
